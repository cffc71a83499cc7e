// 一次完整的脚本转换
//
// 语料 → 索引 → 抽取脚本文本 → 批量转换 →（可选）LLM 后备 → 回写 + 报告

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::align::{Converter, LineConversion, MatchOutcome};
use crate::config::AppConfig;
use crate::corpus_io::ParallelCorpus;
use crate::llm_fallback::LlmFallback;
use crate::report::ConversionReport;
use crate::script::Script;

/// 单次运行的输入输出
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub kana: PathBuf,
    pub kanji: PathBuf,
    pub input: PathBuf,
    pub output: PathBuf,
    pub report: Option<PathBuf>,
    /// 对未匹配行启用 LLM 后备
    pub use_llm: bool,
}

/// 执行转换，返回报告
pub async fn run(options: &RunOptions, config: &AppConfig) -> Result<ConversionReport> {
    let started = Instant::now();

    let corpus = ParallelCorpus::load(&options.kana, &options.kanji, config.corpus.header_lines)?;
    let index = Arc::new(corpus.build_index(config.index.clone()));
    let converter = Converter::new(index.clone(), config.converter.clone());

    let mut script = Script::load(&options.input, &config.script)?;
    let texts = script.texts();
    let line_numbers = script.text_line_numbers();

    // 纯 CPU 任务，放到阻塞线程池中执行
    let workers = config.effective_workers();
    let conversions = {
        let converter = converter.clone();
        let texts = texts.clone();
        tokio::task::spawn_blocking(move || converter.convert_batch(&texts, workers))
            .await
            .context("批量转换线程异常退出")?
    };
    tracing::info!(
        "语料匹配完成: 行数={}, 线程={}, 耗时={}ms",
        conversions.len(),
        workers,
        started.elapsed().as_millis()
    );

    let mut outputs: Vec<String> = conversions.iter().map(|c| c.output.clone()).collect();
    let mut report = ConversionReport::new(
        &conversions,
        &line_numbers,
        index.stats().clone(),
        index.fingerprint(),
    );

    if options.use_llm {
        apply_llm_fallback(config, &conversions, &mut outputs, &mut report).await?;
    }

    script.replace_texts(&outputs)?;
    script.save(&options.output)?;

    if let Some(path) = &options.report {
        report.write_to(path)?;
    }

    report.stats.log_summary();
    tracing::info!("总耗时: {}ms", started.elapsed().as_millis());
    Ok(report)
}

async fn apply_llm_fallback(
    config: &AppConfig,
    conversions: &[LineConversion],
    outputs: &mut [String],
    report: &mut ConversionReport,
) -> Result<()> {
    let pending: Vec<usize> = conversions
        .iter()
        .enumerate()
        .filter(|(_, c)| c.outcome == MatchOutcome::NoMatch)
        .map(|(i, _)| i)
        .collect();

    if pending.is_empty() {
        tracing::info!("没有未匹配行，跳过 LLM 后备");
        return Ok(());
    }

    let fallback = LlmFallback::new(&config.llm).context("无法启用 LLM 后备")?;
    let sources: Vec<String> = pending
        .iter()
        .map(|&i| conversions[i].source.clone())
        .collect();
    let results = fallback.convert_lines(&sources).await;

    // report.unmatched 与 pending 顺序一致
    for ((&idx, result), unmatched) in pending.iter().zip(results).zip(report.unmatched.iter_mut()) {
        if let Some(text) = result {
            outputs[idx] = text.clone();
            unmatched.llm_output = Some(text);
            report.stats.llm_converted += 1;
        }
    }
    Ok(())
}
