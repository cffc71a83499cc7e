//! 转换引擎：匹配 + 重建

use std::sync::Arc;

use crossbeam_channel::{bounded, unbounded};
use serde::{Deserialize, Serialize};

use crate::align::corpus_index::CorpusIndex;
use crate::align::diff::{diff, mappings};
use crate::align::matcher::{Matcher, MatcherConfig};
use crate::align::normalizer::canonicalize;
use crate::align::reconstructor::{reconstruct, reconstruct_with_stats, Replacement};
use crate::align::tokenizer::Tokenizer;
use crate::align::types::{MatchOutcome, MatchResult};

/// 重建方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconstructMode {
    /// 差异映射（没有可应用映射时回退到整体替换）
    #[default]
    Diff,
    /// 整体替换
    Replace,
}

/// 转换参数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub mode: ReconstructMode,
    pub matcher: MatcherConfig,
}

/// 单行转换结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineConversion {
    pub source: String,
    pub output: String,
    pub outcome: MatchOutcome,
    /// 差异模式下实际应用的映射数
    pub applied_mappings: usize,
    /// 差异模式下未能应用的映射数，大于 0 时输出可能混有未转换的假名
    pub skipped_mappings: usize,
}

impl LineConversion {
    pub fn changed(&self) -> bool {
        self.source != self.output
    }

    /// 部分映射未能应用
    pub fn is_partial(&self) -> bool {
        self.applied_mappings > 0 && self.skipped_mappings > 0
    }
}

/// 单段重建结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rebuilt {
    pub output: String,
    pub applied: usize,
    pub skipped: usize,
}

impl Rebuilt {
    fn full(output: String) -> Self {
        Self {
            output,
            applied: 0,
            skipped: 0,
        }
    }
}

/// 转换器
///
/// 索引只读共享，可在多个线程中同时使用
#[derive(Debug, Clone)]
pub struct Converter {
    index: Arc<CorpusIndex>,
    config: ConverterConfig,
}

impl Converter {
    pub fn new(index: Arc<CorpusIndex>, config: ConverterConfig) -> Self {
        Self { index, config }
    }

    pub fn index(&self) -> &CorpusIndex {
        &self.index
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// 转换一行
    pub fn convert_line(&self, raw: &str) -> LineConversion {
        let result = Matcher::new(&self.index, &self.config.matcher).match_line(raw);
        let outcome = result.outcome();

        let rebuilt = match &result {
            MatchResult::Exact { replacement } | MatchResult::Fuzzy { replacement, .. } => {
                self.rebuild(raw, replacement)
            }
            MatchResult::Segmented {
                parts, delimiter, ..
            } => {
                let mut applied = 0;
                let mut skipped = 0;
                let pieces: Vec<String> = parts
                    .iter()
                    .map(|part| match &part.replacement {
                        Some(replacement) => {
                            let piece = self.rebuild(&part.source, replacement);
                            applied += piece.applied;
                            skipped += piece.skipped;
                            piece.output
                        }
                        None => part.source.clone(),
                    })
                    .collect();
                Rebuilt {
                    output: pieces.join(delimiter),
                    applied,
                    skipped,
                }
            }
            MatchResult::NoMatch => Rebuilt::full(raw.to_string()),
        };

        if tracing::enabled!(tracing::Level::DEBUG) {
            let hash = format!("{:x}", md5::compute(raw));
            tracing::debug!(
                "行转换: hash={}, outcome={:?}, mappings={}/{}",
                &hash[..8],
                outcome,
                rebuilt.applied,
                rebuilt.applied + rebuilt.skipped
            );
        }

        LineConversion {
            source: raw.to_string(),
            output: rebuilt.output,
            outcome,
            applied_mappings: rebuilt.applied,
            skipped_mappings: rebuilt.skipped,
        }
    }

    /// 把替换文本写回原文（保持结构）
    pub fn rebuild(&self, source: &str, replacement: &str) -> Rebuilt {
        let tokens = Tokenizer::tokenize(source);
        let full = Replacement::Full(replacement.to_string());

        match self.config.mode {
            ReconstructMode::Replace => Rebuilt::full(reconstruct(&tokens, &full)),
            ReconstructMode::Diff => {
                let canonical_source = canonicalize(source);
                let canonical_replacement = canonicalize(replacement);
                let maps = mappings(&diff(&canonical_source, &canonical_replacement));
                let total = maps.len();
                let (output, applied) =
                    reconstruct_with_stats(&tokens, &Replacement::Mappings(maps));

                if applied == 0 && canonical_source != canonical_replacement {
                    tracing::debug!("无可应用映射，回退到整体替换");
                    return Rebuilt::full(reconstruct(&tokens, &full));
                }
                if applied < total {
                    tracing::debug!("部分映射未应用: {}/{}", applied, total);
                }
                Rebuilt {
                    output,
                    applied,
                    skipped: total - applied,
                }
            }
        }
    }

    /// 批量转换
    ///
    /// 固定数量的工作线程从任务队列取行，结果按输入顺序返回
    pub fn convert_batch(&self, lines: &[String], workers: usize) -> Vec<LineConversion> {
        if lines.is_empty() {
            return Vec::new();
        }

        let workers = workers.clamp(1, lines.len());
        if workers == 1 {
            return lines.iter().map(|l| self.convert_line(l)).collect();
        }

        let (job_tx, job_rx) = bounded::<(usize, &str)>(workers * 4);
        let (result_tx, result_rx) = unbounded::<(usize, LineConversion)>();

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for (idx, line) in job_rx {
                        if result_tx.send((idx, self.convert_line(line))).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(result_tx);

            for (idx, line) in lines.iter().enumerate() {
                if job_tx.send((idx, line.as_str())).is_err() {
                    tracing::warn!("任务队列已关闭，停止分发: idx={}", idx);
                    break;
                }
            }
            drop(job_tx);
        });

        let mut slots: Vec<Option<LineConversion>> = vec![None; lines.len()];
        for (idx, conversion) in result_rx.try_iter() {
            slots[idx] = Some(conversion);
        }

        slots
            .into_iter()
            .zip(lines)
            .map(|(slot, line)| slot.unwrap_or_else(|| self.convert_line(line)))
            .collect()
    }
}
