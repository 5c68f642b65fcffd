//! ragcorpus CLI
//!
//! Local corpus engine for retrieval-augmented chat.
//!
//! Commands:
//!   init    - Configure backend URLs and models, write config.toml
//!   ingest  - Add a PDF file or directory of PDFs to the corpus
//!   query   - Ask a question against the ingested corpus
//!   info    - Show configuration and corpus size

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use ragcorpus::path_util::expand_path;
use ragcorpus::{cleanup_system, initialize_system, Config};

#[derive(Parser)]
#[command(name = "ragcorpus")]
#[command(about = "Local corpus engine for retrieval-augmented chat")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config.toml if none exists, and report its path
    Init,

    /// Add a PDF file or a directory of PDFs to the corpus
    Ingest {
        /// Path to a PDF file, or a directory to scan recursively
        path: PathBuf,
    },

    /// Ask a question against the ingested corpus
    Query {
        /// The question to ask
        question: String,

        /// Print the full RagResult (response, context chunks, counts) as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show configuration and corpus size
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => run_init(),
        Commands::Ingest { path } => run_ingest(&path),
        Commands::Query { question, json } => run_query(&question, json),
        Commands::Info => run_info(),
    }
}

fn run_init() -> Result<()> {
    match Config::load()? {
        Some(config) => {
            println!("{} config already exists at {}", "info:".blue(), config_path_hint());
            println!("  corpus_dir: {}", config.corpus_dir.display());
        }
        None => {
            let config = Config::default();
            config.save()?;
            println!("{} wrote default config to {}", "✓".green(), config_path_hint());
        }
    }
    Ok(())
}

fn run_ingest(path: &PathBuf) -> Result<()> {
    let expanded = PathBuf::from(expand_path(&path.display().to_string()));
    let container = initialize_system(None, None)?;
    let result = container.add_corpus(&expanded);
    cleanup_system(&container);

    if result.is_error {
        println!("{} {}", "error:".red(), result.result_message);
        if let Some(detail) = result.error_message {
            eprintln!("{detail}");
        }
        std::process::exit(1);
    } else {
        println!("{} {}", "✓".green(), result.result_message);
    }
    Ok(())
}

fn run_query(question: &str, json: bool) -> Result<()> {
    let container = initialize_system(None, None)?;
    let result = container.query(question);
    cleanup_system(&container);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{}", result.response);
    println!();
    println!(
        "{} {} chunk(s) from {} document(s)",
        "—".dimmed(),
        result.context_chunks.len(),
        result.referenced_document_count
    );
    Ok(())
}

fn run_info() -> Result<()> {
    let config = Config::load()?.unwrap_or_default();
    println!("corpus_dir:      {}", config.corpus_dir.display());
    println!("sqlite_path:     {}", config.sqlite_path.display());
    println!("embeddings_url:  {}", config.embeddings_url);
    println!("chat_url:        {}", config.chat_url);
    println!("embedding_dim:   {}", config.embedding_dim);
    println!("k_similar_chunks:{}", config.k_similar_chunks);
    Ok(())
}

fn config_path_hint() -> String {
    dirs::home_dir()
        .map(|h| h.join(".ragcorpus").join("config.toml").display().to_string())
        .unwrap_or_else(|| "~/.ragcorpus/config.toml".to_string())
}
