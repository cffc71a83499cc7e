// 平行语料加载
//
// 两个 UTF-8 文本文件（假名版 / 汉字版），每行一条，行号一一对应

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::align::{CorpusIndex, IndexConfig};

/// 语料配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// 假名版语料路径（命令行参数优先）
    pub kana_path: Option<PathBuf>,
    /// 汉字版语料路径（命令行参数优先）
    pub kanji_path: Option<PathBuf>,
    /// 两个文件开头各自跳过的行数（表头）
    pub header_lines: usize,
}

/// 平行语料
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParallelCorpus {
    pub phonetic: Vec<String>,
    pub logographic: Vec<String>,
}

impl ParallelCorpus {
    /// 从两个文件加载
    pub fn load(kana_path: &Path, kanji_path: &Path, header_lines: usize) -> Result<Self> {
        let kana = std::fs::read_to_string(kana_path)
            .with_context(|| format!("读取假名语料失败: {:?}", kana_path))?;
        let kanji = std::fs::read_to_string(kanji_path)
            .with_context(|| format!("读取汉字语料失败: {:?}", kanji_path))?;

        let corpus = Self::from_strs(&kana, &kanji, header_lines);
        tracing::info!(
            "语料加载完成: kana={:?} ({} 行), kanji={:?} ({} 行)",
            kana_path,
            corpus.phonetic.len(),
            kanji_path,
            corpus.logographic.len()
        );
        Ok(corpus)
    }

    pub fn from_strs(kana: &str, kanji: &str, header_lines: usize) -> Self {
        let phonetic = split_lines(kana, header_lines);
        let logographic = split_lines(kanji, header_lines);

        if phonetic.len() != logographic.len() {
            tracing::warn!(
                "语料行数不一致 (kana={}, kanji={}), 仅使用前 {} 行",
                phonetic.len(),
                logographic.len(),
                phonetic.len().min(logographic.len())
            );
        }

        Self {
            phonetic,
            logographic,
        }
    }

    /// 成对的行数
    pub fn len(&self) -> usize {
        self.phonetic.len().min(self.logographic.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn build_index(&self, config: IndexConfig) -> CorpusIndex {
        CorpusIndex::build_with_config(&self.phonetic, &self.logographic, config)
    }
}

/// 去 BOM、兼容 CRLF、跳过表头
fn split_lines(text: &str, header_lines: usize) -> Vec<String> {
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
    text.lines()
        .skip(header_lines)
        .map(|l| l.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_split_lines() {
        let lines = split_lines("\u{FEFF}kana\r\nげんき？\r\nもどる\r\n", 1);
        assert_eq!(lines, vec!["げんき？", "もどる"]);
    }

    #[test]
    fn test_keeps_blank_lines_aligned() {
        let corpus = ParallelCorpus::from_strs("あいう\n\nかきく\n", "亜伊宇\n\n火気区\n", 0);
        assert_eq!(corpus.len(), 3);
        assert_eq!(corpus.phonetic[1], "");
        assert_eq!(corpus.logographic[2], "火気区");
    }

    #[test]
    fn test_load_and_build() {
        let dir = tempfile::tempdir().unwrap();
        let kana_path = dir.path().join("kana.txt");
        let kanji_path = dir.path().join("kanji.txt");

        let mut kana = std::fs::File::create(&kana_path).unwrap();
        writeln!(kana, "げんき？\n\nすなあらし！").unwrap();
        let mut kanji = std::fs::File::create(&kanji_path).unwrap();
        writeln!(kanji, "元気？\n\n砂嵐！").unwrap();

        let corpus = ParallelCorpus::load(&kana_path, &kanji_path, 0).unwrap();
        assert_eq!(corpus.len(), 3);

        let index = corpus.build_index(IndexConfig::default());
        assert_eq!(index.get("すなあらし"), Some("砂嵐！"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("none.txt");
        assert!(ParallelCorpus::load(&missing, &missing, 0).is_err());
    }
}
