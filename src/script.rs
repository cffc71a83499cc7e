// 脚本文本抽取与回写
//
// 每行在起止标记之间的部分是可转换文本，其余内容原样保留

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 脚本标记配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// 文本开始标记（行内第一次出现）
    pub start_marker: String,
    /// 文本结束标记（行内最后一次出现）
    pub end_marker: String,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            start_marker: "\"".to_string(),
            end_marker: "\"".to_string(),
        }
    }
}

/// 脚本中的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    /// 整行原文（含行尾换行符）
    raw: String,
    /// 可转换文本在 `raw` 中的字节区间
    span: Option<(usize, usize)>,
}

impl ScriptLine {
    fn parse(raw: &str, config: &ScriptConfig) -> Self {
        let body_len = raw.trim_end_matches(['\r', '\n']).len();
        Self {
            raw: raw.to_string(),
            span: find_span(&raw[..body_len], config),
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.span.map(|(start, end)| &self.raw[start..end])
    }

    fn replace_text(&mut self, text: &str) {
        if let Some((start, end)) = self.span {
            self.raw.replace_range(start..end, text);
            self.span = Some((start, start + text.len()));
        }
    }
}

fn find_span(body: &str, config: &ScriptConfig) -> Option<(usize, usize)> {
    if config.start_marker.is_empty() || config.end_marker.is_empty() {
        return None;
    }
    let start = body.find(config.start_marker.as_str())? + config.start_marker.len();
    let end = body[start..].rfind(config.end_marker.as_str())? + start;
    Some((start, end))
}

/// 脚本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    lines: Vec<ScriptLine>,
}

impl Script {
    pub fn parse(content: &str, config: &ScriptConfig) -> Self {
        let lines = content
            .split_inclusive('\n')
            .map(|raw| ScriptLine::parse(raw, config))
            .collect();
        Self { lines }
    }

    pub fn load(path: &Path, config: &ScriptConfig) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("读取脚本失败: {:?}", path))?;
        let script = Self::parse(&content, config);
        tracing::info!(
            "脚本加载完成: {:?}, 总行数={}, 文本行={}",
            path,
            script.lines.len(),
            script.text_count()
        );
        Ok(script)
    }

    /// 所有可转换文本（按出现顺序）
    pub fn texts(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter_map(|l| l.text().map(str::to_string))
            .collect()
    }

    /// 可转换文本所在的行号（从 1 开始），与 `texts()` 一一对应
    pub fn text_line_numbers(&self) -> Vec<usize> {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, l)| l.span.is_some())
            .map(|(i, _)| i + 1)
            .collect()
    }

    pub fn text_count(&self) -> usize {
        self.lines.iter().filter(|l| l.span.is_some()).count()
    }

    /// 按顺序回写文本，数量必须与 `texts()` 一致
    pub fn replace_texts(&mut self, texts: &[String]) -> Result<()> {
        let expected = self.text_count();
        if texts.len() != expected {
            anyhow::bail!("回写文本数量不一致: 期望 {}, 实际 {}", expected, texts.len());
        }

        let mut iter = texts.iter();
        for line in self.lines.iter_mut().filter(|l| l.span.is_some()) {
            if let Some(text) = iter.next() {
                line.replace_text(text);
            }
        }
        Ok(())
    }

    pub fn render(&self) -> String {
        self.lines.iter().map(|l| l.raw.as_str()).collect()
    }

    /// 原子写入（临时文件 + 重命名）
    pub fn save(&self, path: &Path) -> Result<()> {
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, self.render())
            .with_context(|| format!("写入临时文件失败: {:?}", temp_path))?;
        std::fs::rename(&temp_path, path)
            .with_context(|| format!("重命名输出文件失败: {:?}", path))?;
        tracing::info!("脚本已写入: {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# header\r\nmsg 1 \"げんき？\"\r\nwait 10\nmsg 2 \"{00}の\\nすなあらし！\" ; note\n";

    #[test]
    fn test_extract_texts() {
        let script = Script::parse(SAMPLE, &ScriptConfig::default());
        assert_eq!(script.texts(), vec!["げんき？", "{00}の\\nすなあらし！"]);
        assert_eq!(script.text_line_numbers(), vec![2, 4]);
    }

    #[test]
    fn test_untouched_round_trip() {
        let script = Script::parse(SAMPLE, &ScriptConfig::default());
        assert_eq!(script.render(), SAMPLE);
    }

    #[test]
    fn test_replace_texts() {
        let mut script = Script::parse(SAMPLE, &ScriptConfig::default());
        script
            .replace_texts(&["元気？".to_string(), "{00}の\\n砂嵐！".to_string()])
            .unwrap();
        assert_eq!(
            script.render(),
            "# header\r\nmsg 1 \"元気？\"\r\nwait 10\nmsg 2 \"{00}の\\n砂嵐！\" ; note\n"
        );
    }

    #[test]
    fn test_replace_count_mismatch() {
        let mut script = Script::parse(SAMPLE, &ScriptConfig::default());
        assert!(script.replace_texts(&["元気？".to_string()]).is_err());
    }

    #[test]
    fn test_last_end_marker() {
        let script = Script::parse("say \"a \"quoted\" b\"\n", &ScriptConfig::default());
        assert_eq!(script.texts(), vec!["a \"quoted\" b"]);
    }

    #[test]
    fn test_custom_markers() {
        let config = ScriptConfig {
            start_marker: "<t>".to_string(),
            end_marker: "</t>".to_string(),
        };
        let script = Script::parse("<t>げんき</t>\n\"no\"\n", &config);
        assert_eq!(script.texts(), vec!["げんき"]);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let script = Script::parse(SAMPLE, &ScriptConfig::default());
        script.save(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), SAMPLE);
    }
}
