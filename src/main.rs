use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::{error, info};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use file_gpt::config::Config;
use file_gpt::document::Document;
use file_gpt::llm::WriterSink;
use file_gpt::quiz::QuizGenerator;
use file_gpt::rag::ChatSession;
use file_gpt::wikipedia::WikipediaLoader;

/// Ask questions about your files, or turn them into a quiz
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chat with a .txt, .pdf or .docx file
    Chat {
        /// Path to the document to ask about
        file_path: PathBuf,
    },
    /// Generate a 10 question quiz from a file or a Wikipedia topic
    Quiz {
        /// Path to a .txt, .pdf or .docx file
        #[arg(long, conflicts_with = "topic", required_unless_present = "topic")]
        file: Option<PathBuf>,
        /// Topic to search Wikipedia for
        #[arg(long)]
        topic: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let config = Config::from_env().context("Invalid configuration")?;

    match args.command {
        Command::Chat { file_path } => run_chat(&config, &file_path).await,
        Command::Quiz { file, topic } => run_quiz(&config, file.as_deref(), topic.as_deref()).await,
    }
}

fn load_file(file_path: &Path) -> Result<Document> {
    info!("Processing file: {}", file_path.display());

    if !file_path.exists() {
        error!("File not found: {}", file_path.display());
        return Err(anyhow::anyhow!("File not found"));
    }

    Document::from_file(file_path).context("Failed to process document")
}

async fn run_chat(config: &Config, file_path: &Path) -> Result<()> {
    let embedder = config.embedder().context("Failed to create embedding client")?;
    let model = config
        .chat_model(&config.chat)
        .context("Failed to create chat model client")?;
    let mut session = ChatSession::new(config, embedder, model);

    let document = load_file(file_path)?;
    session
        .load(&document)
        .await
        .context("Failed to embed file")?;

    println!("I'm ready! Ask away! Type 'exit' to quit.");

    let stdin = io::stdin();
    let mut buffer = String::new();

    loop {
        print!("\nYour question: ");
        io::stdout().flush()?;

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

        let mut sink = WriterSink::new(io::stdout());
        match session.ask(question, &mut sink).await {
            Ok(_) => println!(),
            // Leave the session usable so the question can be asked again
            Err(e) => error!("Failed to answer: {}", e),
        }
    }

    Ok(())
}

async fn run_quiz(config: &Config, file: Option<&Path>, topic: Option<&str>) -> Result<()> {
    let model = config
        .chat_model(&config.quiz)
        .context("Failed to create quiz model client")?;
    let generator = QuizGenerator::new(model, config.chunking.clone());

    let chunks = match (file, topic) {
        (Some(file_path), _) => {
            let document = load_file(file_path)?;
            generator
                .file_chunks(&document)
                .context("Failed to split file")?
        }
        (None, Some(topic)) => {
            let documents = WikipediaLoader::new(config.wikipedia.clone())
                .load(topic)
                .await
                .context("Failed to search Wikipedia")?;
            generator.article_chunks(&documents)
        }
        (None, None) => return Err(anyhow::anyhow!("Either --file or --topic is required")),
    };

    let mut sink = WriterSink::new(io::stdout());
    generator
        .generate(&chunks, &mut sink)
        .await
        .context("Failed to generate quiz")?;
    println!();

    Ok(())
}
