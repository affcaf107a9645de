//! collection-rag CLI 진입점

use anyhow::{Context, Result};
use clap::Parser;
use collection_rag::RagConfig;

fn main() -> Result<()> {
    let cli = collection_rag::cli::Cli::parse();

    let config = RagConfig::load(cli.config.as_deref()).context("설정 로드 실패")?;

    // 로깅 초기화 (RUST_LOG가 있으면 우선)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(collection_rag::cli::run(cli, config))
}
