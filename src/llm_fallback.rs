// LLM 后备转换
//
// 语料无法匹配的行按批发送给 OpenAI 兼容模型转换，
// 结果必须保留全部变量与换行，否则丢弃

use anyhow::{anyhow, Result};
use tokio::time::{sleep, Duration};

use crate::align::Tokenizer;
use crate::config::LlmConfig;
use crate::openai_client::{ChatOptions, Message, OpenAiClient, OpenAiClientConfig};

const SYSTEM_PROMPT: &str = r#"你是日文游戏脚本的转换助手。输入是假名书写的台词，请改写为自然的汉字假名混写。

规则：
1. 只把应当写成汉字的词改为汉字，不改变语气、标点和措辞
2. `{00}` 这类花括号变量、`[VAR ...]` 变量和 `\n` 换行必须原样保留，顺序不变
3. 行首的说话人名与「保持不变
4. 输出条数必须与输入一致

输入是 JSON 数组，每项为 {"id": 序号, "text": 台词}。
只返回 JSON 字符串数组，按序号顺序给出转换后的台词，不要任何解释。"#;

/// LLM 后备转换器
pub struct LlmFallback {
    client: OpenAiClient,
    config: LlmConfig,
}

impl LlmFallback {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if !config.is_valid() {
            anyhow::bail!("LLM 配置不完整（endpoint / api_key / model）");
        }
        let client_config =
            OpenAiClientConfig::new(&config.endpoint, &config.api_key, &config.model)
                .with_timeout(config.timeout_secs);

        Ok(Self {
            client: OpenAiClient::new(client_config)?,
            config: config.clone(),
        })
    }

    /// 转换多行，结果与输入一一对应；失败或破坏结构的行为 `None`
    pub async fn convert_lines(&self, lines: &[String]) -> Vec<Option<String>> {
        let batch_size = self.config.batch_size.max(1);
        let mut results = Vec::with_capacity(lines.len());

        for (batch_idx, batch) in lines.chunks(batch_size).enumerate() {
            match self.convert_batch_with_retry(batch).await {
                Ok(outputs) => {
                    for (source, output) in batch.iter().zip(outputs) {
                        if preserves_structure(source, &output) {
                            results.push(Some(output));
                        } else {
                            tracing::warn!(
                                "LLM 输出破坏了变量或换行，保留原文: hash={}",
                                short_hash(source)
                            );
                            results.push(None);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "LLM 批次 {} 失败（{} 行保持未转换）: {}",
                        batch_idx,
                        batch.len(),
                        e
                    );
                    results.extend(std::iter::repeat(None).take(batch.len()));
                }
            }
        }

        let converted = results.iter().filter(|r| r.is_some()).count();
        tracing::info!("LLM 后备转换完成: {}/{} 行", converted, lines.len());
        results
    }

    async fn convert_batch_with_retry(&self, batch: &[String]) -> Result<Vec<String>> {
        let delay = Duration::from_millis(self.config.retry_delay_ms);
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match self.request_batch(batch).await {
                Ok(outputs) => return Ok(outputs),
                Err(e) => {
                    tracing::warn!(
                        "LLM 请求失败 (尝试 {}/{}): {}",
                        attempt + 1,
                        self.config.max_retries + 1,
                        e
                    );
                    last_error = Some(e);
                    if attempt < self.config.max_retries {
                        sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("LLM 请求未执行")))
    }

    async fn request_batch(&self, batch: &[String]) -> Result<Vec<String>> {
        let messages = vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(build_batch_prompt(batch)?),
        ];
        let options = ChatOptions::for_conversion(batch.len());

        tracing::debug!(
            "发送 LLM 批次: model={}, lines={}",
            self.client.model(),
            batch.len()
        );
        let response = self.client.chat(&messages, options).await?;
        parse_batch_response(&response, batch.len())
    }
}

/// 带序号的 JSON 数组
fn build_batch_prompt(batch: &[String]) -> Result<String> {
    let items: Vec<serde_json::Value> = batch
        .iter()
        .enumerate()
        .map(|(i, text)| serde_json::json!({ "id": i + 1, "text": text }))
        .collect();
    Ok(serde_json::to_string(&items)?)
}

/// 解析回复中的 JSON 字符串数组，条数必须与请求一致
fn parse_batch_response(text: &str, expected: usize) -> Result<Vec<String>> {
    let parsed = match serde_json::from_str::<Vec<String>>(text.trim()) {
        Ok(parsed) => parsed,
        Err(_) => extract_array(text)?,
    };

    if parsed.len() != expected {
        anyhow::bail!("LLM 返回条数不一致: 期望 {}, 实际 {}", expected, parsed.len());
    }
    Ok(parsed)
}

/// 从第一个 '[' 开始，逐个尝试到每个 ']' 结束的片段
fn extract_array(text: &str) -> Result<Vec<String>> {
    let start = text.find('[').ok_or_else(|| anyhow!("LLM 响应缺少 JSON 数组"))?;

    let mut last_error = None;
    for (idx, _) in text[start..].match_indices(']') {
        let json = &text[start..=start + idx];
        match serde_json::from_str::<Vec<String>>(json) {
            Ok(parsed) => return Ok(parsed),
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "LLM 响应解析失败: {}",
        last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "未找到有效 JSON".to_string())
    ))
}

/// 变量与换行的数量和顺序都未改变
pub fn preserves_structure(source: &str, converted: &str) -> bool {
    Tokenizer::structural_skeleton(&Tokenizer::tokenize(source))
        == Tokenizer::structural_skeleton(&Tokenizer::tokenize(converted))
}

fn short_hash(text: &str) -> String {
    let hash = format!("{:x}", md5::compute(text));
    hash[..8].to_string()
}
