// 转换统计与报告

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::align::{BuildStats, LineConversion, MatchOutcome};

/// 各分类的行数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total: usize,
    pub exact: usize,
    pub multi_segment: usize,
    pub single_break: usize,
    pub short_prefix: usize,
    pub fuzzy: usize,
    pub no_match: usize,
    /// 只应用了部分映射的行数
    #[serde(default)]
    pub partial: usize,
    /// 未匹配行中由 LLM 后备转换成功的行数
    pub llm_converted: usize,
}

impl ConversionStats {
    pub fn from_conversions(conversions: &[LineConversion]) -> Self {
        let mut stats = Self::default();
        for conversion in conversions {
            stats.record(conversion.outcome);
            if conversion.is_partial() {
                stats.partial += 1;
            }
        }
        stats
    }

    pub fn record(&mut self, outcome: MatchOutcome) {
        self.total += 1;
        *self.slot(outcome) += 1;
    }

    pub fn count(&self, outcome: MatchOutcome) -> usize {
        match outcome {
            MatchOutcome::Exact => self.exact,
            MatchOutcome::MultiSegment => self.multi_segment,
            MatchOutcome::SingleBreak => self.single_break,
            MatchOutcome::ShortPrefix => self.short_prefix,
            MatchOutcome::Fuzzy => self.fuzzy,
            MatchOutcome::NoMatch => self.no_match,
        }
    }

    fn slot(&mut self, outcome: MatchOutcome) -> &mut usize {
        match outcome {
            MatchOutcome::Exact => &mut self.exact,
            MatchOutcome::MultiSegment => &mut self.multi_segment,
            MatchOutcome::SingleBreak => &mut self.single_break,
            MatchOutcome::ShortPrefix => &mut self.short_prefix,
            MatchOutcome::Fuzzy => &mut self.fuzzy,
            MatchOutcome::NoMatch => &mut self.no_match,
        }
    }

    /// 语料匹配命中的行数
    pub fn matched(&self) -> usize {
        self.total - self.no_match
    }

    /// 语料匹配覆盖率（0.0-1.0），空脚本为 0
    pub fn coverage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.matched() as f64 / self.total as f64
    }

    pub fn log_summary(&self) {
        tracing::info!(
            "转换完成: 总计={}, 覆盖率={:.1}%, 部分映射={}, LLM 转换={}",
            self.total,
            self.coverage() * 100.0,
            self.partial,
            self.llm_converted
        );
        for outcome in MatchOutcome::ALL {
            tracing::info!("  {}: {}", outcome.display_name(), self.count(outcome));
        }
    }
}

/// 未匹配行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedLine {
    /// 脚本中的行号（从 1 开始）
    pub line_number: usize,
    pub text: String,
    /// LLM 后备转换结果（未启用或失败时为空）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_output: Option<String>,
}

/// 部分映射未应用的行，需要人工检查
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialLine {
    pub line_number: usize,
    pub text: String,
    pub output: String,
    pub skipped_mappings: usize,
}

/// 转换报告（JSON）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionReport {
    pub stats: ConversionStats,
    pub index: BuildStats,
    /// 语料索引指纹，用于确认两次运行使用同一份语料
    pub corpus_fingerprint: String,
    pub unmatched: Vec<UnmatchedLine>,
    #[serde(default)]
    pub partial: Vec<PartialLine>,
}

impl ConversionReport {
    /// 由转换结果生成报告
    ///
    /// `line_numbers` 与 `conversions` 一一对应
    pub fn new(
        conversions: &[LineConversion],
        line_numbers: &[usize],
        index: BuildStats,
        corpus_fingerprint: String,
    ) -> Self {
        let unmatched = conversions
            .iter()
            .zip(line_numbers)
            .filter(|(c, _)| c.outcome == MatchOutcome::NoMatch)
            .map(|(c, n)| UnmatchedLine {
                line_number: *n,
                text: c.source.clone(),
                llm_output: None,
            })
            .collect();

        let partial = conversions
            .iter()
            .zip(line_numbers)
            .filter(|(c, _)| c.is_partial())
            .map(|(c, n)| PartialLine {
                line_number: *n,
                text: c.source.clone(),
                output: c.output.clone(),
                skipped_mappings: c.skipped_mappings,
            })
            .collect();

        Self {
            stats: ConversionStats::from_conversions(conversions),
            index,
            corpus_fingerprint,
            unmatched,
            partial,
        }
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("写入报告失败: {:?}", path))?;
        tracing::info!("报告已写入: {:?} (未匹配 {} 行)", path, self.unmatched.len());
        Ok(())
    }
}
