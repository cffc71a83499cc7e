//! 语料索引
//!
//! 规范化假名 → 原始汉字文本，构建一次后只读共享

use std::collections::{hash_map::Entry, HashMap};

use aho_corasick::AhoCorasick;
use serde::{Deserialize, Serialize};

use crate::align::normalizer::canonicalize;

/// 索引构建参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// 规范键最少字符数（过短无法可靠区分）
    pub min_key_chars: usize,
    /// 语料行内的分段符
    pub segment_delimiter: String,
    /// 多行组合的最大前瞻行数
    pub max_window: usize,
    /// 多行组合使用的连接符
    pub joiner: String,
    /// 参与子串覆盖扫描的键最少字符数（不含）
    pub fuzzy_min_key_chars: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            min_key_chars: 3,
            segment_delimiter: "\\n".to_string(),
            max_window: 5,
            joiner: "\\n\\n".to_string(),
            fuzzy_min_key_chars: 20,
        }
    }
}

/// 构建统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    /// 处理的语料行对
    pub pairs: usize,
    /// 写入的条目总数
    pub inserted: usize,
    /// 键已存在被忽略的次数
    pub duplicates: usize,
    /// 任一侧为空
    pub blank: usize,
    /// 规范键过短
    pub too_short: usize,
    /// 分段数量不一致被丢弃
    pub segment_mismatches: usize,
    /// 分段条目
    pub segment_entries: usize,
    /// 多行组合条目
    pub combined_entries: usize,
}

/// 单次写入的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Insertion {
    Inserted,
    Duplicate,
    Blank,
    TooShort,
}

/// 长键命中
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyHit {
    /// 条目序号（插入顺序）
    pub entry: usize,
    /// 规范行中的字节区间
    pub start: usize,
    pub end: usize,
}

/// 长键扫描器
#[derive(Debug)]
struct LongKeyScanner {
    automaton: AhoCorasick,
    /// 模式序号 → 条目序号
    entry_ids: Vec<usize>,
}

/// 语料索引
///
/// 同键先写入者优先，迭代顺序即插入顺序
#[derive(Debug)]
pub struct CorpusIndex {
    entries: Vec<(String, String)>,
    lookup: HashMap<String, usize>,
    scanner: Option<LongKeyScanner>,
    config: IndexConfig,
    stats: BuildStats,
}

impl CorpusIndex {
    /// 使用默认参数构建
    pub fn build<P: AsRef<str>, L: AsRef<str>>(phonetic: &[P], logographic: &[L]) -> Self {
        Self::build_with_config(phonetic, logographic, IndexConfig::default())
    }

    /// 构建索引
    ///
    /// 两侧按行号同步处理，截止到较短一侧；每行依次写入：
    /// 整行、分段条目、多行组合条目
    pub fn build_with_config<P: AsRef<str>, L: AsRef<str>>(
        phonetic: &[P],
        logographic: &[L],
        config: IndexConfig,
    ) -> Self {
        if phonetic.len() != logographic.len() {
            tracing::warn!(
                "语料行数不一致 (kana={}, kanji={}), 按较短一侧处理",
                phonetic.len(),
                logographic.len()
            );
        }

        let mut index = Self {
            entries: Vec::new(),
            lookup: HashMap::new(),
            scanner: None,
            config,
            stats: BuildStats::default(),
        };

        let count = phonetic.len().min(logographic.len());
        for i in 0..count {
            let phon = phonetic[i].as_ref();
            let logo = logographic[i].as_ref();
            index.stats.pairs += 1;

            match index.insert_pair(phon, logo) {
                Insertion::Blank => {
                    index.stats.blank += 1;
                    continue;
                }
                Insertion::TooShort => {
                    index.stats.too_short += 1;
                    continue;
                }
                Insertion::Duplicate => index.stats.duplicates += 1,
                Insertion::Inserted => {}
            }

            index.insert_segments(phon, logo);
            index.insert_windows(phonetic, logographic, i, count);
        }

        index.scanner = index.build_scanner();

        tracing::info!(
            "语料索引构建完成: 行对={}, 条目={}, 重复={}, 过短={}, 空行={}, 分段不一致={}, 分段条目={}, 组合条目={}",
            index.stats.pairs,
            index.entries.len(),
            index.stats.duplicates,
            index.stats.too_short,
            index.stats.blank,
            index.stats.segment_mismatches,
            index.stats.segment_entries,
            index.stats.combined_entries
        );

        index
    }

    /// 写入一对（先写入者优先）
    fn insert_pair(&mut self, phonetic: &str, logographic: &str) -> Insertion {
        if phonetic.trim().is_empty() || logographic.trim().is_empty() {
            return Insertion::Blank;
        }

        let key = canonicalize(phonetic);
        if key.chars().count() < self.config.min_key_chars {
            return Insertion::TooShort;
        }

        match self.lookup.entry(key) {
            Entry::Occupied(_) => Insertion::Duplicate,
            Entry::Vacant(e) => {
                let id = self.entries.len();
                self.entries.push((e.key().clone(), logographic.to_string()));
                e.insert(id);
                self.stats.inserted += 1;
                Insertion::Inserted
            }
        }
    }

    /// 分段条目：两侧分段数一致才写入
    fn insert_segments(&mut self, phonetic: &str, logographic: &str) {
        let delimiter = self.config.segment_delimiter.clone();
        if delimiter.is_empty() || !phonetic.contains(delimiter.as_str()) {
            return;
        }

        let phon_parts: Vec<&str> = phonetic.split(delimiter.as_str()).collect();
        let logo_parts: Vec<&str> = logographic.split(delimiter.as_str()).collect();
        if phon_parts.len() != logo_parts.len() {
            tracing::debug!(
                "分段数量不一致 (kana={}, kanji={}), 丢弃",
                phon_parts.len(),
                logo_parts.len()
            );
            self.stats.segment_mismatches += 1;
            return;
        }

        for (phon, logo) in phon_parts.into_iter().zip(logo_parts) {
            match self.insert_pair(phon, logo) {
                Insertion::Inserted => self.stats.segment_entries += 1,
                Insertion::Duplicate => self.stats.duplicates += 1,
                Insertion::Blank | Insertion::TooShort => {}
            }
        }
    }

    /// 多行组合条目：当前行 + 后续 1..=max_window 行
    ///
    /// 空行作为空片段参与拼接
    fn insert_windows<P: AsRef<str>, L: AsRef<str>>(
        &mut self,
        phonetic: &[P],
        logographic: &[L],
        start: usize,
        count: usize,
    ) {
        let joiner = self.config.joiner.clone();
        for k in 1..=self.config.max_window {
            let end = start + k;
            if end >= count {
                break;
            }

            let phon = join_lines(&phonetic[start..=end], &joiner);
            let logo = join_lines(&logographic[start..=end], &joiner);
            match self.insert_pair(&phon, &logo) {
                Insertion::Inserted => self.stats.combined_entries += 1,
                Insertion::Duplicate => self.stats.duplicates += 1,
                Insertion::Blank | Insertion::TooShort => {}
            }
        }
    }

    fn build_scanner(&self) -> Option<LongKeyScanner> {
        let mut patterns = Vec::new();
        let mut entry_ids = Vec::new();
        for (id, (key, _)) in self.entries.iter().enumerate() {
            if key.chars().count() > self.config.fuzzy_min_key_chars {
                patterns.push(key.as_str());
                entry_ids.push(id);
            }
        }

        if patterns.is_empty() {
            return None;
        }

        match AhoCorasick::new(&patterns) {
            Ok(automaton) => {
                tracing::debug!("长键扫描器构建完成: 模式数={}", patterns.len());
                Some(LongKeyScanner {
                    automaton,
                    entry_ids,
                })
            }
            Err(e) => {
                tracing::warn!("长键扫描器构建失败，子串覆盖匹配不可用: {}", e);
                None
            }
        }
    }

    /// 按规范键查找
    pub fn get(&self, canonical: &str) -> Option<&str> {
        self.lookup
            .get(canonical)
            .map(|&id| self.entries[id].1.as_str())
    }

    /// 先规范化原文再查找
    pub fn lookup_raw(&self, raw: &str) -> Option<&str> {
        self.get(&canonicalize(raw))
    }

    /// 在规范行中查找所有出现的长键（允许重叠）
    pub fn find_long_keys(&self, canonical: &str) -> Vec<KeyHit> {
        let Some(scanner) = &self.scanner else {
            return Vec::new();
        };

        scanner
            .automaton
            .find_overlapping_iter(canonical)
            .map(|m| KeyHit {
                entry: scanner.entry_ids[m.pattern().as_usize()],
                start: m.start(),
                end: m.end(),
            })
            .collect()
    }

    /// 按序号取条目 (规范键, 汉字原文)
    pub fn entry(&self, id: usize) -> Option<(&str, &str)> {
        self.entries
            .get(id)
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 按插入顺序迭代
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// 索引内容指纹（用于日志和报告，不记录原文）
    pub fn fingerprint(&self) -> String {
        let mut context = md5::Context::new();
        for (key, value) in &self.entries {
            context.consume(key.as_bytes());
            context.consume([0u8]);
            context.consume(value.as_bytes());
            context.consume([0xFFu8]);
        }
        format!("{:x}", context.compute())
    }
}

fn join_lines<S: AsRef<str>>(lines: &[S], joiner: &str) -> String {
    lines
        .iter()
        .map(|l| l.as_ref())
        .collect::<Vec<_>>()
        .join(joiner)
}
