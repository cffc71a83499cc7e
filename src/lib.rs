//! 基于平行语料的假名 → 汉字脚本转换
//!
//! 核心引擎在 [`align`]，其余模块是文件读写、配置与 LLM 后备等外围层

pub mod align;
pub mod config;
pub mod corpus_io;
pub mod llm_fallback;
pub mod openai_client;
pub mod report;
pub mod runner;
pub mod script;

pub use align::{
    canonicalize, match_line, CorpusIndex, Converter, ConverterConfig, LineConversion,
    MatchOutcome, MatchResult, ReconstructMode,
};
pub use config::AppConfig;
pub use runner::{run, RunOptions};
