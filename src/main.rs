use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use kana2kanji_lib::{run, AppConfig, ReconstructMode, RunOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// 差异映射，没有可应用映射时整体替换
    Diff,
    /// 整体替换
    Replace,
}

impl From<ModeArg> for ReconstructMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Diff => ReconstructMode::Diff,
            ModeArg::Replace => ReconstructMode::Replace,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "kana2kanji")]
#[command(about = "用平行语料把假名脚本转换为汉字版，保留变量与换行")]
#[command(version)]
struct Args {
    /// 假名版语料（每行一条）
    #[arg(long, value_name = "FILE")]
    kana: Option<PathBuf>,

    /// 汉字版语料（与假名版逐行对应）
    #[arg(long, value_name = "FILE")]
    kanji: Option<PathBuf>,

    /// 待转换脚本
    #[arg(long, short = 'i', value_name = "FILE")]
    input: PathBuf,

    /// 输出脚本
    #[arg(long, short = 'o', value_name = "FILE")]
    output: PathBuf,

    /// JSON 报告输出路径
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// 配置文件（默认使用用户配置目录下的 Kana2Kanji/config.json）
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// 工作线程数（覆盖配置）
    #[arg(long)]
    workers: Option<usize>,

    /// 重建方式（覆盖配置）
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// 未匹配行交给 LLM 转换
    #[arg(long)]
    llm: bool,

    /// 把合并了命令行参数的配置写回配置文件
    #[arg(long)]
    write_config: bool,

    /// 输出调试日志
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    // 写回配置时允许指定尚不存在的文件
    let mut config = match &args.config {
        Some(path) if args.write_config => AppConfig::load_or_default(path)?,
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(mode) = args.mode {
        config.converter.mode = mode.into();
    }
    if args.llm {
        config.llm.enabled = true;
    }

    let kana = args
        .kana
        .or_else(|| config.corpus.kana_path.clone())
        .ok_or_else(|| anyhow::anyhow!("缺少假名语料路径（--kana 或配置 corpus.kana_path）"))?;
    let kanji = args
        .kanji
        .or_else(|| config.corpus.kanji_path.clone())
        .ok_or_else(|| anyhow::anyhow!("缺少汉字语料路径（--kanji 或配置 corpus.kanji_path）"))?;

    if args.write_config {
        config.corpus.kana_path = Some(kana.clone());
        config.corpus.kanji_path = Some(kanji.clone());
        match &args.config {
            Some(path) => config.save_to(path)?,
            None => {
                config.save()?;
            }
        }
    }

    let options = RunOptions {
        kana,
        kanji,
        input: args.input,
        output: args.output,
        report: args.report,
        use_llm: config.llm.enabled,
    };

    run(&options, &config).await?;
    Ok(())
}
