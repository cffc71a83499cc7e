// OpenAI 兼容 API 客户端
//
// 供未匹配行的后备转换使用（OpenAI、DeepSeek、智谱 GLM 等兼容服务）

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

/// 消息
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// 聊天请求参数
#[derive(Debug, Clone, Copy)]
pub struct ChatOptions {
    pub max_tokens: u32,
    /// 使用 f64 避免 0.1 序列化成 0.10000000149011612
    pub temperature: f64,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.3,
        }
    }
}

impl ChatOptions {
    /// 脚本转换：低温度，输出长度随批次大小增长
    pub fn for_conversion(batch_size: usize) -> Self {
        Self {
            max_tokens: (256 * batch_size.max(1)).min(8192) as u32,
            temperature: 0.1,
        }
    }
}

/// 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiClientConfig {
    /// 完整端点（如 https://api.openai.com/v1/chat/completions）
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl OpenAiClientConfig {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: normalize_chat_completions_endpoint(&endpoint.into()),
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: 60,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// 端点既可以是 Base URL，也可以是完整的 `/chat/completions` 地址
pub fn normalize_chat_completions_endpoint(endpoint: &str) -> String {
    let e = endpoint.trim().trim_end_matches('/');
    if e.is_empty() || e.ends_with("/chat/completions") {
        return e.to_string();
    }
    format!("{}/chat/completions", e)
}

/// OpenAI 兼容客户端
#[derive(Clone)]
pub struct OpenAiClient {
    config: OpenAiClientConfig,
    client: Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(4)
            .build()
            .context("创建 HTTP 客户端失败")?;

        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// 发送一次聊天请求，返回第一条回复的文本
    pub async fn chat(&self, messages: &[Message], options: ChatOptions) -> Result<String> {
        if messages.is_empty() {
            return Ok(String::new());
        }

        let messages_json: Vec<Value> = messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": m.role.as_str(),
                    "content": m.content
                })
            })
            .collect();

        let request_body = serde_json::json!({
            "model": self.config.model,
            "messages": messages_json,
            "max_tokens": options.max_tokens,
            "temperature": options.temperature
        });

        tracing::debug!(
            "LLM 请求: endpoint={}, model={}, api_key_len={}, max_tokens={}, messages={}",
            self.config.endpoint,
            self.config.model,
            self.config.api_key.len(),
            options.max_tokens,
            messages.len()
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .context("LLM 请求发送失败")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM API 请求失败 ({}): {}", status, text);
        }

        let payload: Value = response.json().await.context("LLM 响应不是合法 JSON")?;
        extract_content(&payload)
    }
}

/// 解析 OpenAI 格式的响应：`choices[0].message.content`
fn extract_content(payload: &Value) -> Result<String> {
    let content = payload["choices"]
        .as_array()
        .and_then(|arr| arr.first())
        .and_then(|choice| choice["message"]["content"].as_str())
        .ok_or_else(|| anyhow::anyhow!("LLM API 返回格式不可解析: {}", payload))?;

    Ok(content.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let sys = Message::system("变换规则");
        assert_eq!(sys.role, Role::System);
        assert_eq!(sys.role.as_str(), "system");

        let user = Message::user("[]");
        assert_eq!(user.role.as_str(), "user");
        assert_eq!(user.content, "[]");
    }

    #[test]
    fn test_conversion_options() {
        let options = ChatOptions::for_conversion(10);
        assert_eq!(options.max_tokens, 2560);
        assert_eq!(options.temperature, 0.1);
        assert_eq!(ChatOptions::for_conversion(1000).max_tokens, 8192);
        assert_eq!(ChatOptions::for_conversion(0).max_tokens, 256);
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(
            normalize_chat_completions_endpoint("https://api.openai.com/v1/"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            normalize_chat_completions_endpoint("https://api.deepseek.com/chat/completions"),
            "https://api.deepseek.com/chat/completions"
        );
        assert_eq!(normalize_chat_completions_endpoint("  "), "");
    }

    #[test]
    fn test_extract_content() {
        let payload = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "  [\"元気\"]\n"}}]
        });
        assert_eq!(extract_content(&payload).unwrap(), "[\"元気\"]");

        let bad = serde_json::json!({"error": "quota"});
        assert!(extract_content(&bad).is_err());
    }
}
