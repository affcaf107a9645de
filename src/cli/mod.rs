//! CLI 모듈
//!
//! collection-rag CLI 명령어 정의 및 구현

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::agent::{build_agent, load_tools, respond};
use crate::config::{AgentMode, RagConfig};
use crate::embedding::has_api_key;
use crate::knowledge::{format_collection_name, CollectionStore, DocumentBatch, SourceType};
use crate::models::UserModels;
use crate::retrieval::HybridQueryEngine;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "collection-rag")]
#[command(version, about = "컬렉션 기반 하이브리드 RAG 지식베이스", long_about = None)]
pub struct Cli {
    /// 설정 파일 경로 (기본: ./collection-rag.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// JSON 문서 묶음으로 컬렉션 생성
    Create {
        /// 입력 JSON 파일 ({description, data: [{Name, Link, Content}]})
        #[arg(short, long)]
        file: PathBuf,

        /// 소스 종류 (webpages | pdfs)
        #[arg(short, long, default_value = "webpages")]
        source_type: String,

        /// 컬렉션 이름 (기본: 파일 이름)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// 컬렉션 삭제
    Delete {
        /// 삭제할 컬렉션 이름
        name: String,
    },

    /// 컬렉션 목록
    List {
        /// 이름 필터 (쉼표 구분)
        #[arg(long, value_delimiter = ',')]
        names: Vec<String>,
    },

    /// 컬렉션 하나에 하이브리드 질의
    Query {
        /// 컬렉션 이름
        collection: String,

        /// 질문
        question: String,
    },

    /// 에이전트와 대화 (/reset, /exit)
    Chat {
        /// 사용할 컬렉션 (쉼표 구분)
        #[arg(short, long, value_delimiter = ',', required = true)]
        collections: Vec<String>,

        /// 에이전트 모드 (react | router | sub-question)
        #[arg(short, long)]
        mode: Option<String>,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli, config: RagConfig) -> Result<()> {
    match cli.command {
        Commands::Create {
            file,
            source_type,
            name,
        } => cmd_create(&config, file, &source_type, name).await,
        Commands::Delete { name } => cmd_delete(&config, &name).await,
        Commands::List { names } => cmd_list(&config, &names),
        Commands::Query {
            collection,
            question,
        } => cmd_query(&config, &collection, &question).await,
        Commands::Chat { collections, mode } => cmd_chat(&config, &collections, mode).await,
        Commands::Status => cmd_status(&config),
    }
}

fn open_store(config: &RagConfig) -> Result<CollectionStore> {
    CollectionStore::open(&config.storage, &config.retrieval).context("CollectionStore 열기 실패")
}

/// 모델 구성 (`system_prompt`는 채팅에서만 넘김)
fn load_models(config: &RagConfig, system_prompt: Option<&str>) -> Result<UserModels> {
    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export OPENAI_API_KEY=your-api-key\n  \
             또는\n  \
             export COLLECTION_RAG_API_KEY=your-api-key\n\n\
             API 키 발급: https://platform.openai.com/api-keys"
        );
    }

    UserModels::from_config(&config.models, system_prompt)
        .context("모델 초기화 실패")
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 컬렉션 생성 명령어 (create)
async fn cmd_create(
    config: &RagConfig,
    file: PathBuf,
    source_type: &str,
    name: Option<String>,
) -> Result<()> {
    let source_type: SourceType = source_type.parse()?;
    let models = load_models(config, None)?;
    let store = open_store(config)?;

    println!("[*] 컬렉션 생성 중: {} ({})", file.display(), source_type);

    let record = match name {
        Some(name) => {
            let batch = DocumentBatch::from_file(&file).context("입력 파일 읽기 실패")?;
            store.create(&format_collection_name(&name), &batch, &models).await
        }
        None => store.create_new_collection(&models, &file, source_type).await,
    }
    .context("컬렉션 생성 실패")?;

    println!("[OK] 컬렉션 '{}' 생성됨", record.name);
    println!("     설명: {}", truncate_text(&record.description, 80));
    println!("     임베딩: {}", record.embedding_name);

    Ok(())
}

/// 삭제 명령어 (delete)
async fn cmd_delete(config: &RagConfig, name: &str) -> Result<()> {
    let store = open_store(config)?;

    if store.delete_by_name(name).await.context("컬렉션 삭제 실패")? {
        println!("[OK] 컬렉션 '{}' 삭제됨", name);
    } else {
        println!("[!] 컬렉션 '{}'을(를) 찾을 수 없습니다", name);
    }

    Ok(())
}

/// 목록 명령어 (list)
fn cmd_list(config: &RagConfig, names: &[String]) -> Result<()> {
    let store = open_store(config)?;

    let records = if names.is_empty() {
        store.get_all()
    } else {
        store.get_by_names(names)
    }
    .context("컬렉션 목록 조회 실패")?;

    if records.is_empty() {
        println!("[!] 저장된 컬렉션이 없습니다.");
        return Ok(());
    }

    println!("[OK] 컬렉션 ({} 개):\n", records.len());

    for record in records {
        let created = record
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());

        println!("  {} [{}]", record.name, record.embedding_name);
        println!("        {}", truncate_text(&record.description, 80));
        println!("        생성: {}", created);
        println!();
    }

    Ok(())
}

/// 질의 명령어 (query)
async fn cmd_query(config: &RagConfig, collection: &str, question: &str) -> Result<()> {
    let models = load_models(config, None)?;
    let store = open_store(config)?;

    let engine = HybridQueryEngine::open(&store, collection, &models)
        .await
        .context("질의 엔진 로드 실패")?
        .ok_or_else(|| anyhow::anyhow!("컬렉션 '{}'을(를) 찾을 수 없습니다", collection))?;

    println!("[*] 질의 중: {}", question);
    let response = engine.query(question).await.context("질의 실패")?;

    println!("\n[OK] 답변:\n\n{}\n", response.response);

    if response.source_nodes.is_empty() {
        println!("[!] 출처가 없습니다.");
        return Ok(());
    }

    println!("[OK] 출처 ({} 건):\n", response.source_nodes.len());

    for (i, source) in response.source_nodes.iter().enumerate() {
        println!(
            "{}. [점수: {}] {}",
            i + 1,
            format_score(source.score),
            truncate_text(&source.name, 60)
        );
        println!("   URL: {}", source.link);
        println!("   내용: {}", truncate_text(&source.text, 200));
        println!();
    }

    Ok(())
}

/// 대화 명령어 (chat)
async fn cmd_chat(config: &RagConfig, collections: &[String], mode: Option<String>) -> Result<()> {
    let models = load_models(config, config.agent.system_prompt())?;
    let store = open_store(config)?;

    let mut agent_config = config.agent.clone();
    if let Some(mode) = mode {
        agent_config.mode = mode.parse::<AgentMode>()?;
    }

    let tools = load_tools(&store, collections, &models)
        .await
        .context("질의 엔진 로드 실패")?;
    let loaded: Vec<String> = tools.iter().map(|t| t.name.clone()).collect();

    let mut agent = build_agent(
        &agent_config,
        models.llm.clone(),
        tools,
        config.retrieval.context_window_tokens,
    )
    .context("에이전트 생성 실패")?;

    println!(
        "[OK] {} 에이전트 준비됨 (컬렉션: {})",
        agent.name(),
        loaded.join(", ")
    );
    println!("     /reset: 대화 기록 초기화, /exit: 종료\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "" => continue,
            "/exit" => break,
            "/reset" => {
                agent.reset();
                println!("[OK] 대화 기록 초기화\n");
            }
            query => {
                let message = respond(agent.as_mut(), query).await;
                println!("\n{}\n", message);
            }
        }
    }

    Ok(())
}

/// 상태 명령어 (status)
fn cmd_status(config: &RagConfig) -> Result<()> {
    println!("collection-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", config.storage.data_dir.display());
    println!(
        "[*] 모델: {} / {}",
        config.models.llm, config.models.embedding
    );

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export OPENAI_API_KEY=your-key");
    }

    match open_store(config).and_then(|store| store.stats().map_err(Into::into)) {
        Ok(stats) => {
            let catalog_bytes = std::fs::metadata(&stats.catalog_path)
                .map(|m| m.len() as usize)
                .unwrap_or(0);
            println!(
                "[OK] 컬렉션: {} 개 ({})",
                stats.collection_count,
                format_bytes(catalog_bytes)
            );
        }
        Err(e) => {
            println!("[!] 카탈로그 조회 실패: {}", e);
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 유사도 표시 (키워드 검색 결과는 점수 없음)
fn format_score(score: Option<f32>) -> String {
    match score {
        Some(score) => format!("{:.4}", score),
        None => "-".to_string(),
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        assert_eq!(truncate_text("hello\nworld", 20), "hello world");
    }

    #[test]
    fn test_truncate_unicode() {
        assert_eq!(truncate_text("안녕하세요 세계", 5), "안녕하세요...");
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(Some(0.83456)), "0.8346");
        assert_eq!(format_score(None), "-");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }

    #[test]
    fn test_parse_chat_collections() {
        let cli = Cli::try_parse_from([
            "collection-rag",
            "chat",
            "--collections",
            "tokio_notes,storage_notes",
            "--mode",
            "router",
        ])
        .unwrap();

        match cli.command {
            Commands::Chat { collections, mode } => {
                assert_eq!(collections, vec!["tokio_notes", "storage_notes"]);
                assert_eq!(mode.as_deref(), Some("router"));
            }
            _ => panic!("expected chat command"),
        }
    }

    #[test]
    fn test_parse_create_defaults() {
        let cli = Cli::try_parse_from([
            "collection-rag",
            "--config",
            "custom.toml",
            "create",
            "--file",
            "Async Rust.json",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        match cli.command {
            Commands::Create {
                file,
                source_type,
                name,
            } => {
                assert_eq!(file, PathBuf::from("Async Rust.json"));
                assert_eq!(source_type, "webpages");
                assert!(name.is_none());
            }
            _ => panic!("expected create command"),
        }
    }

    #[test]
    fn test_chat_requires_collections() {
        assert!(Cli::try_parse_from(["collection-rag", "chat"]).is_err());
    }
}
