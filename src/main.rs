use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::{error, info};
use std::io::{self, Write};
use std::path::Path;

use study_rag::database::{IndexConfig, VectorIndex};
use study_rag::document::Document;
use study_rag::embeddings::EncoderConfig;
use study_rag::explain::{self, ExplanationLevel};
use study_rag::gemini::{GeminiClient, GeminiConfig};
use study_rag::quiz::{self, QuestionType, QuizParams};
use study_rag::retriever::DEFAULT_TOP_K;
use study_rag::session::Session;

/// A document study assistant: index a PDF or PNG locally, then ask
/// questions, request tiered explanations, or generate practice questions
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive Q&A loop over an indexed document
    Chat {
        /// Path to the document to process (PDF or PNG)
        file_path: String,
        /// Number of context chunks retrieved per question
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },
    /// Explain the whole document at a chosen prior-knowledge level
    Explain {
        /// Path to the document to process (PDF or PNG)
        file_path: String,
        #[arg(long, value_enum, default_value_t = ExplanationLevel::Beginner)]
        level: ExplanationLevel,
    },
    /// Generate practice questions from the document
    Quiz {
        /// Path to the document to process (PDF or PNG)
        file_path: String,
        #[arg(long, value_enum, default_value_t = QuestionType::Subjective)]
        kind: QuestionType,
        /// Number of questions (1-50)
        #[arg(long, default_value_t = 10)]
        count: usize,
        /// Difficulty (1-10)
        #[arg(long, default_value_t = 5)]
        difficulty: u8,
    },
    /// Delete persisted index data. Destructive and idempotent
    Wipe {
        /// Document whose collection should be deleted
        file_path: Option<String>,
        /// Delete every collection under the storage root
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let index_config = IndexConfig::from_env();

    match cli.command {
        Command::Chat { file_path, top_k } => {
            let document = load_document(&file_path)?;
            let session = Session::create(
                document,
                index_config,
                EncoderConfig::from_env(),
                gemini_client()?,
                top_k,
            )
            .await?;
            run_chat_loop(&session).await
        }
        Command::Explain { file_path, level } => {
            let document = load_document(&file_path)?;
            let gemini = gemini_client()?;
            info!("Generating {} explanation for {}", level, document.document_id);
            let explanation = explain::explain(&gemini, &document.content, level).await?;
            println!("{}", explanation);
            Ok(())
        }
        Command::Quiz {
            file_path,
            kind,
            count,
            difficulty,
        } => {
            let params = QuizParams::new(kind, count, difficulty)?;
            let document = load_document(&file_path)?;
            let gemini = gemini_client()?;
            info!(
                "Generating {} {} questions for {}",
                params.count, params.question_type, document.document_id
            );
            let questions =
                quiz::generate_questions(&gemini, &document.content, params).await?;
            for question in questions {
                println!("{}", question);
            }
            Ok(())
        }
        Command::Wipe { file_path, all } => wipe(&index_config, file_path.as_deref(), all),
    }
}

/// Load and validate a document from disk
fn load_document(file_path: &str) -> Result<Document> {
    let path = Path::new(file_path);
    if !path.exists() {
        error!("File not found: {}", file_path);
        return Err(anyhow::anyhow!("File not found"));
    }

    info!("Processing file: {}", file_path);
    let document = Document::from_file(path).context("Failed to process document")?;
    info!("Document type: {}", document.mime_type);

    if document.is_empty() {
        return Err(anyhow::anyhow!(
            "No text could be extracted from {}",
            file_path
        ));
    }
    Ok(document)
}

/// Build the Gemini client; a missing API key is fatal at startup
fn gemini_client() -> Result<GeminiClient> {
    let config = GeminiConfig::from_env().context("Missing GEMINI_API_KEY")?;
    Ok(GeminiClient::new(config))
}

/// Interactive Q&A loop. Type 'exit' to quit
async fn run_chat_loop(session: &Session) -> Result<()> {
    info!(
        "Ready to answer questions about {}. Type 'exit' to quit.",
        session.document().document_id
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut buffer = String::new();

    loop {
        print!("\nYour question: ");
        stdout.flush()?;

        buffer.clear();
        if stdin.read_line(&mut buffer)? == 0 {
            break;
        }

        let question = buffer.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") {
            info!("Goodbye!");
            break;
        }

        match session.ask(question).await {
            Ok(answer) => println!("\n{}", answer),
            Err(e) => error!("Failed to answer: {:#}", e),
        }
    }

    Ok(())
}

/// Operator data reset: delete one collection or the whole store
fn wipe(config: &IndexConfig, file_path: Option<&str>, all: bool) -> Result<()> {
    if all {
        VectorIndex::wipe_all(config)?;
        info!("Deleted all persisted index data");
        return Ok(());
    }

    match file_path {
        Some(file_path) => {
            let document_id = Path::new(file_path)
                .file_name()
                .context("Invalid file name")?
                .to_str()
                .context("Invalid file name encoding")?;
            VectorIndex::wipe(config, document_id)?;
            info!("Deleted collection for {}", document_id);
            Ok(())
        }
        None => Err(anyhow::anyhow!("Specify a document to wipe, or --all")),
    }
}
