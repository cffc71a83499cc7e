// 应用配置
//
// JSON 文件，所有字段都有默认值；单个分区解析失败时只回退该分区

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::align::{ConverterConfig, IndexConfig};
use crate::corpus_io::CorpusConfig;
use crate::script::ScriptConfig;

/// API Key 环境变量（优先于配置文件）
pub const API_KEY_ENV: &str = "KANA2KANJI_API_KEY";

// ============================================================================
// LLM 后备配置
// ============================================================================

/// LLM 后备转换配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    /// OpenAI 兼容端点（Base URL 或完整 `/chat/completions` 地址）
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    /// 每次请求的行数
    pub batch_size: usize,
    /// 单批失败后的重试次数
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_llm_endpoint(),
            api_key: String::new(),
            model: default_llm_model(),
            batch_size: 20,
            max_retries: 3,
            retry_delay_ms: 2000,
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    /// 端点、Key、模型都已填写
    pub fn is_valid(&self) -> bool {
        !self.endpoint.trim().is_empty()
            && !self.api_key.trim().is_empty()
            && !self.model.trim().is_empty()
    }
}

fn default_llm_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

// ============================================================================
// 应用配置
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub corpus: CorpusConfig,
    pub index: IndexConfig,
    pub converter: ConverterConfig,
    pub script: ScriptConfig,
    pub llm: LlmConfig,
    /// 批量转换的工作线程数，0 表示按 CPU 核数
    pub workers: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            corpus: CorpusConfig::default(),
            index: IndexConfig::default(),
            converter: ConverterConfig::default(),
            script: ScriptConfig::default(),
            llm: LlmConfig::default(),
            workers: 0,
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法获取配置目录"))?;
        let app_dir = config_dir.join("Kana2Kanji");
        std::fs::create_dir_all(&app_dir)?;
        Ok(app_dir.join("config.json"))
    }

    /// 从默认路径加载；文件不存在时返回默认配置
    pub fn load() -> Result<Self> {
        Self::load_or_default(&Self::config_path()?)
    }

    /// 文件不存在时返回默认配置（环境变量仍然生效）
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!("配置文件不存在，使用默认配置: {:?}", path);
            let mut config = Self::new();
            config.apply_env();
            return Ok(config);
        }
        Self::load_from(path)
    }

    /// 从指定路径加载
    pub fn load_from(path: &Path) -> Result<Self> {
        tracing::info!("尝试从以下路径加载配置: {:?}", path);
        let content =
            std::fs::read_to_string(path).with_context(|| format!("读取配置失败: {:?}", path))?;

        // 先解析为 Value，整体解析失败时按分区恢复
        let v: serde_json::Value =
            serde_json::from_str(&content).with_context(|| format!("配置不是合法 JSON: {:?}", path))?;

        let mut config: AppConfig = match serde_json::from_value(v.clone()) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("直接解析配置失败，尝试按分区恢复: {}", e);
                let mut cfg = AppConfig::new();
                recover(&v, "corpus", &mut cfg.corpus);
                recover(&v, "index", &mut cfg.index);
                recover(&v, "converter", &mut cfg.converter);
                recover(&v, "script", &mut cfg.script);
                recover(&v, "llm", &mut cfg.llm);
                recover(&v, "workers", &mut cfg.workers);
                cfg
            }
        };

        config.apply_env();
        tracing::info!("配置加载成功");
        Ok(config)
    }

    /// 环境变量覆盖 API Key
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                tracing::info!("使用环境变量 {} 中的 API Key", API_KEY_ENV);
                self.llm.api_key = key.trim().to_string();
            }
        }
    }

    /// 工作线程数（0 时取可用并行度）
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    /// 保存到默认路径，返回实际写入的路径
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// 写入配置文件
    ///
    /// 内容先写到同目录的 `.json.tmp`，再整体替换目标文件，替换失败时原文件不变。
    /// 来自环境变量的 API Key 不落盘
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let mut persisted = self.clone();
        if std::env::var(API_KEY_ENV).is_ok_and(|key| key.trim() == persisted.llm.api_key) {
            persisted.llm.api_key.clear();
        }
        let content = serde_json::to_string_pretty(&persisted)?;

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).with_context(|| format!("创建配置目录失败: {:?}", dir))?;
        }

        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, &content)
            .with_context(|| format!("写入临时配置失败: {:?}", temp_path))?;
        if let Err(e) = std::fs::rename(&temp_path, path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e).with_context(|| format!("替换配置文件失败: {:?}", path));
        }

        let hash = format!("{:x}", md5::compute(&content));
        tracing::info!("配置已写入: {:?} (hash={})", path, &hash[..8]);
        Ok(())
    }
}

/// 从原始 JSON 中恢复单个分区
fn recover<T: DeserializeOwned>(v: &serde_json::Value, key: &str, target: &mut T) {
    let Some(section) = v.get(key) else {
        return;
    };
    match serde_json::from_value(section.clone()) {
        Ok(value) => {
            tracing::info!("成功恢复 {}", key);
            *target = value;
        }
        Err(e) => tracing::warn!("分区 {} 无法解析，使用默认值: {}", key, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::ReconstructMode;

    #[test]
    fn test_defaults() {
        let config = AppConfig::new();
        assert_eq!(config.index.min_key_chars, 3);
        assert_eq!(config.converter.mode, ReconstructMode::Diff);
        assert_eq!(config.script.start_marker, "\"");
        assert_eq!(config.llm.batch_size, 20);
        assert!(!config.llm.is_valid());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"converter": {"mode": "replace"}, "workers": 2}"#).unwrap();
        assert_eq!(config.converter.mode, ReconstructMode::Replace);
        assert_eq!(config.converter.matcher.max_single_break_segments, 10);
        assert_eq!(config.workers, 2);
        assert_eq!(config.effective_workers(), 2);
    }

    #[test]
    fn test_section_recovery() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"index": {"min_key_chars": 4}, "converter": {"mode": "sideways"}}"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.index.min_key_chars, 4);
        assert_eq!(config.converter.mode, ReconstructMode::Diff);
    }

    #[test]
    fn test_invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::new();
        config.workers = 3;
        config.corpus.header_lines = 1;
        config.save_to(&path).unwrap();
        // 第二次保存覆盖旧文件
        config.workers = 5;
        config.save_to(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: AppConfig = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded, config);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_save_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let missing = AppConfig::load_or_default(&path).unwrap();
        assert_eq!(missing.converter, AppConfig::new().converter);

        let mut config = missing;
        config.converter.mode = ReconstructMode::Replace;
        config.corpus.kana_path = Some(PathBuf::from("kana.txt"));
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.converter.mode, ReconstructMode::Replace);
        assert_eq!(loaded.corpus.kana_path, Some(PathBuf::from("kana.txt")));
    }
}
