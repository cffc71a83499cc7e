//! 多策略匹配
//!
//! 按优先级依次尝试，先成功者胜出：
//! 精确 → 双换行分段 → 单换行分段 → 短前缀 → 子串覆盖

use serde::{Deserialize, Serialize};

use crate::align::corpus_index::CorpusIndex;
use crate::align::normalizer::canonicalize;
use crate::align::types::{MatchResult, SegmentPart, SegmentStrategy};

/// 转义换行
const ESCAPED_BREAK: &str = "\\n";
/// 字面换行
const LITERAL_BREAK: &str = "\n";

/// 匹配参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// 单换行分段的最大段数
    pub max_single_break_segments: usize,
    /// 短前缀策略中第一段的长度上限（不含）
    pub short_prefix_max_chars: usize,
    /// 是否启用子串覆盖策略
    pub enable_fuzzy: bool,
    /// 子串覆盖策略要求的规范行最小长度（不含）
    pub fuzzy_min_line_chars: usize,
    /// 子串覆盖率阈值
    pub fuzzy_min_coverage: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            max_single_break_segments: 10,
            short_prefix_max_chars: 20,
            enable_fuzzy: true,
            fuzzy_min_line_chars: 50,
            fuzzy_min_coverage: 0.6,
        }
    }
}

/// 使用默认参数匹配一行
pub fn match_line(raw: &str, index: &CorpusIndex) -> MatchResult {
    let config = MatcherConfig::default();
    Matcher::new(index, &config).match_line(raw)
}

/// 匹配器（借用只读索引，可跨线程并行使用）
pub struct Matcher<'a> {
    index: &'a CorpusIndex,
    config: &'a MatcherConfig,
}

impl<'a> Matcher<'a> {
    pub fn new(index: &'a CorpusIndex, config: &'a MatcherConfig) -> Self {
        Self { index, config }
    }

    /// 匹配一行
    ///
    /// 不会失败：未命中是常见结果，返回 `NoMatch`
    pub fn match_line(&self, raw: &str) -> MatchResult {
        let canonical = canonicalize(raw);
        if canonical.is_empty() {
            return MatchResult::NoMatch;
        }

        // 1. 精确
        if let Some(replacement) = self.index.get(&canonical) {
            return MatchResult::Exact {
                replacement: replacement.to_string(),
            };
        }

        let marker = break_marker(raw);
        let double = marker.repeat(2);

        // 2. 双换行分段
        if raw.contains(double.as_str()) {
            let pieces: Vec<&str> = raw.split(double.as_str()).collect();
            if let Some(result) =
                self.try_segments(&pieces, &double, SegmentStrategy::MultiSegment)
            {
                return result;
            }
        }

        if raw.contains(marker) {
            let pieces: Vec<&str> = raw.split(marker).collect();

            // 3. 单换行分段
            if pieces.len() <= self.config.max_single_break_segments {
                if let Some(result) =
                    self.try_segments(&pieces, marker, SegmentStrategy::SingleBreak)
                {
                    return result;
                }
            }

            // 4. 短前缀
            if let Some(result) = self.try_short_prefix(&pieces, marker) {
                return result;
            }
        }

        // 5. 子串覆盖
        if self.config.enable_fuzzy && raw.contains(double.as_str()) {
            if let Some(result) = self.try_fuzzy(&canonical) {
                return result;
            }
        }

        MatchResult::NoMatch
    }

    /// 分段查找：所有非空段都命中才算成功
    ///
    /// 规范形式为空的段（纯空白、纯变量）原样保留
    fn try_segments(
        &self,
        pieces: &[&str],
        delimiter: &str,
        strategy: SegmentStrategy,
    ) -> Option<MatchResult> {
        let mut parts = Vec::with_capacity(pieces.len());
        let mut resolved = 0usize;

        for piece in pieces {
            let key = canonicalize(piece);
            if key.is_empty() {
                parts.push(SegmentPart::kept(*piece));
                continue;
            }
            let replacement = self.index.get(&key)?;
            parts.push(SegmentPart::replaced(*piece, replacement));
            resolved += 1;
        }

        if resolved == 0 {
            return None;
        }

        tracing::debug!(
            "分段匹配成功: strategy={:?}, segments={}, resolved={}",
            strategy,
            pieces.len(),
            resolved
        );

        Some(MatchResult::Segmented {
            parts,
            delimiter: delimiter.to_string(),
            strategy,
        })
    }

    /// 短前缀：两段且第一段较短时，只解析第二段
    ///
    /// 用于“名字 + の + 换行 + 招式名”一类模板消息
    fn try_short_prefix(&self, pieces: &[&str], marker: &str) -> Option<MatchResult> {
        if pieces.len() != 2 || pieces[0].chars().count() >= self.config.short_prefix_max_chars {
            return None;
        }

        let replacement = self.index.lookup_raw(pieces[1])?;
        Some(MatchResult::Segmented {
            parts: vec![
                SegmentPart::kept(pieces[0]),
                SegmentPart::replaced(pieces[1], replacement),
            ],
            delimiter: marker.to_string(),
            strategy: SegmentStrategy::ShortPrefix,
        })
    }

    /// 子串覆盖：长键在规范行中的覆盖率达到阈值即接受
    ///
    /// 近似策略：只返回（插入顺序）第一个命中长键的替换文本，不拼接多个片段
    fn try_fuzzy(&self, canonical: &str) -> Option<MatchResult> {
        let total = canonical.chars().count();
        if total <= self.config.fuzzy_min_line_chars {
            return None;
        }

        let hits = self.index.find_long_keys(canonical);
        if hits.is_empty() {
            return None;
        }

        let mut ranges: Vec<(usize, usize)> = hits.iter().map(|h| (h.start, h.end)).collect();
        ranges.sort_unstable();
        let covered = covered_chars(canonical, &ranges);
        let coverage = covered as f64 / total as f64;

        if coverage < self.config.fuzzy_min_coverage {
            tracing::debug!(
                "子串覆盖不足: coverage={:.2}, hits={}",
                coverage,
                hits.len()
            );
            return None;
        }

        let first = hits.iter().map(|h| h.entry).min()?;
        let (_, replacement) = self.index.entry(first)?;
        tracing::debug!(
            "子串覆盖匹配成功: coverage={:.2}, hits={}, entry={}",
            coverage,
            hits.len(),
            first
        );

        Some(MatchResult::Fuzzy {
            replacement: replacement.to_string(),
            coverage,
        })
    }
}

/// 行内使用的换行标记：有转义 `\n` 时用转义，否则用字面 LF
pub fn break_marker(raw: &str) -> &'static str {
    if raw.contains(ESCAPED_BREAK) {
        ESCAPED_BREAK
    } else {
        LITERAL_BREAK
    }
}

/// 合并已排序的字节区间，返回覆盖的字符数
fn covered_chars(text: &str, sorted: &[(usize, usize)]) -> usize {
    let mut covered = 0;
    let mut current: Option<(usize, usize)> = None;

    for &(start, end) in sorted {
        match current {
            Some((cs, ce)) if start <= ce => current = Some((cs, ce.max(end))),
            Some((cs, ce)) => {
                covered += text[cs..ce].chars().count();
                current = Some((start, end));
            }
            None => current = Some((start, end)),
        }
    }

    if let Some((cs, ce)) = current {
        covered += text[cs..ce].chars().count();
    }
    covered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::corpus_index::IndexConfig;
    use crate::align::types::MatchOutcome;

    const KANA: [&str; 4] = ["げんき？", "つぎはどこへいく？", "すなあらし！", "もどる"];
    const KANJI: [&str; 4] = ["元気？", "次は何処へ行く？", "砂嵐！", "戻る"];

    // 不生成多行组合条目，只测分段策略
    fn index() -> CorpusIndex {
        CorpusIndex::build_with_config(
            &KANA,
            &KANJI,
            IndexConfig {
                max_window: 0,
                ..IndexConfig::default()
            },
        )
    }

    #[test]
    fn test_exact() {
        let index = index();
        let result = match_line("げんき！", &index);
        assert_eq!(
            result,
            MatchResult::Exact {
                replacement: "元気？".to_string()
            }
        );
    }

    #[test]
    fn test_window_entry_is_exact() {
        let index = CorpusIndex::build(&KANA, &KANJI);
        let result = match_line("すなあらし！\\n\\nもどる", &index);
        assert_eq!(
            result,
            MatchResult::Exact {
                replacement: "砂嵐！\\n\\n戻る".to_string()
            }
        );
    }

    #[test]
    fn test_multi_segment_literal_breaks() {
        // 语料顺序与台词相反，不会命中组合条目
        let index = CorpusIndex::build(
            &["次はどこへ行く？", "げんき？"],
            &["次は何処へ行く？", "元気？"],
        );
        let result = match_line("げんき？\n\n次はどこへ行く？", &index);
        assert_eq!(result.outcome(), MatchOutcome::MultiSegment);
        assert_eq!(result.joined().as_deref(), Some("元気？\n\n次は何処へ行く？"));
    }

    #[test]
    fn test_multi_segment_requires_all() {
        let index = index();
        let result = match_line("げんき？\\n\\nしらないことば", &index);
        assert_eq!(result, MatchResult::NoMatch);
    }

    #[test]
    fn test_single_break_segments() {
        let index = index();
        let result = match_line("げんき？\\nすなあらし！\\nもどる", &index);
        assert_eq!(result.outcome(), MatchOutcome::SingleBreak);
        assert_eq!(result.joined().as_deref(), Some("元気？\\n砂嵐！\\n戻る"));
    }

    #[test]
    fn test_single_break_segment_limit() {
        let index = index();
        let line = vec!["もどる"; 11].join("\\n");
        assert_eq!(match_line(&line, &index), MatchResult::NoMatch);

        let line = vec!["もどる"; 10].join("\\n");
        assert_eq!(match_line(&line, &index).outcome(), MatchOutcome::SingleBreak);
    }

    #[test]
    fn test_short_prefix() {
        let index = index();
        let result = match_line("{00}の\\nすなあらし！", &index);
        assert_eq!(result.outcome(), MatchOutcome::ShortPrefix);
        assert_eq!(result.joined().as_deref(), Some("{00}の\\n砂嵐！"));
    }

    #[test]
    fn test_short_prefix_too_long() {
        let index = index();
        let line = format!("{}\\nすなあらし！", "ながいなまえ".repeat(4));
        assert_eq!(match_line(&line, &index), MatchResult::NoMatch);
    }

    #[test]
    fn test_pure_variable_segment_kept() {
        let index = index();
        let result = match_line("{01}\\nすなあらし！\\nもどる", &index);
        assert_eq!(result.outcome(), MatchOutcome::SingleBreak);
        assert_eq!(result.joined().as_deref(), Some("{01}\\n砂嵐！\\n戻る"));
    }

    #[test]
    fn test_fuzzy_coverage() {
        let first = "あいうえおかきくけこさしすせそたちつてとなにぬねの";
        let second = "はひふへほまみむめもやゆよらりるれろわをんがぎぐげご";
        let index = CorpusIndex::build(&[first, second], &["一番目", "二番目"]);

        // 第三段未知，分段匹配失败，但覆盖率 > 60%
        let line = format!("{}\\n\\n{}\\n\\nざじずぜぞ", first, second);
        match match_line(&line, &index) {
            MatchResult::Fuzzy {
                replacement,
                coverage,
            } => {
                assert_eq!(replacement, "一番目");
                assert!(coverage >= 0.6);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_fuzzy_low_coverage() {
        let first = "あいうえおかきくけこさしすせそたちつてとなにぬねの";
        let index = CorpusIndex::build(&[first], &["一番目"]);
        let line = format!(
            "{}\\n\\n{}",
            first, "ざじずぜぞだぢづでどばびぶべぼぱぴぷぺぽぁぃぅぇぉっゃゅょ"
        );
        assert_eq!(match_line(&line, &index), MatchResult::NoMatch);
    }

    #[test]
    fn test_fuzzy_disabled() {
        let first = "あいうえおかきくけこさしすせそたちつてとなにぬねの";
        let second = "はひふへほまみむめもやゆよらりるれろわをんがぎぐげご";
        let index = CorpusIndex::build(&[first, second], &["一番目", "二番目"]);
        let line = format!("{}\\n\\n{}\\n\\nざじずぜぞ", first, second);

        let config = MatcherConfig {
            enable_fuzzy: false,
            ..MatcherConfig::default()
        };
        assert_eq!(
            Matcher::new(&index, &config).match_line(&line),
            MatchResult::NoMatch
        );
    }

    #[test]
    fn test_no_overlap_no_match() {
        let index = index();
        assert_eq!(match_line("ぜんぜんちがう", &index), MatchResult::NoMatch);
        assert_eq!(match_line("", &index), MatchResult::NoMatch);
        assert_eq!(match_line("{00}", &index), MatchResult::NoMatch);
    }

    #[test]
    fn test_covered_chars_merges_overlaps() {
        let text = "あいうえおかきく";
        // あいう(0..9) + うえお(6..15) + きく(18..24)
        let ranges = vec![(0, 9), (6, 15), (18, 24)];
        assert_eq!(covered_chars(text, &ranges), 7);
    }
}
