//! 假名 → 汉字对齐引擎
//!
//! 用平行语料（同一份脚本的假名版与汉字版）把假名脚本行转换为汉字版，
//! 同时保留行内的说话人前缀、变量与换行。
//!
//! ## 处理流程
//! 1. 语料行对规范化后写入索引（整行、分段、多行组合）
//! 2. 脚本行按策略匹配（精确 / 分段 / 短前缀 / 子串覆盖）
//! 3. 命中后通过 LCS 差异映射或整体替换重建，结构 token 原位保留

mod corpus_index;
mod diff;
mod engine;
mod matcher;
mod normalizer;
mod reconstructor;
mod tokenizer;
mod types;

pub use corpus_index::{BuildStats, CorpusIndex, IndexConfig, KeyHit};
pub use diff::{apply_mappings, apply_mappings_from, diff, mappings};
pub use engine::{Converter, ConverterConfig, LineConversion, ReconstructMode, Rebuilt};
pub use matcher::{break_marker, match_line, Matcher, MatcherConfig};
pub use normalizer::{canonical_len, canonicalize};
pub use reconstructor::{reconstruct, reconstruct_with_stats, Replacement};
pub use tokenizer::Tokenizer;
pub use types::{
    BreakKind, DiffSegment, MatchOutcome, MatchResult, SegmentPart, SegmentStrategy, Token,
};
