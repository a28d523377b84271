//! linkgarden CLI — add, batch-ingest, browse, and export the link graph.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use linkgarden_lib::db::Database;
use linkgarden_lib::ingest::IngestOutcome;
use linkgarden_lib::ollama::OllamaClient;
use linkgarden_lib::{batch, export, ingest, settings};

#[derive(Parser)]
#[command(name = "linkgarden", about = "A personal knowledge garden for web links")]
struct Cli {
    /// Database path (default: $LINKGARDEN_DB or the app data directory)
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest one URL: fetch, classify, and store it
    Add {
        url: String,
    },
    /// Ingest links from a CSV file (required column: url)
    Batch {
        file: String,
        /// Stop after this many rows; the rest stay for a later run
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// List stored links with their categories
    List,
    /// Delete a link (its relation edges go with it)
    Delete {
        url: String,
    },
    /// Print the visualization graph as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<String>,
    },
    /// Show store counts and Ollama availability
    Status,
    /// Set the Ollama model used for classification
    SetModel {
        model: String,
    },
}

fn find_database(db_arg: Option<&str>) -> PathBuf {
    if let Some(path) = db_arg {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var("LINKGARDEN_DB") {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = settings::get_custom_db_path() {
        return PathBuf::from(path);
    }

    dirs::data_dir()
        .map(|p| p.join("linkgarden/linkgarden.db"))
        .unwrap_or_else(|| PathBuf::from("linkgarden.db"))
}

fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("linkgarden"))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    settings::init(app_data_dir());

    let db_path = find_database(cli.db.as_deref());
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let db = match Database::new(&db_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            eprintln!("Failed to open database {}: {}", db_path.display(), e);
            std::process::exit(1);
        }
    };

    if let Err(e) = db.seed_if_empty() {
        eprintln!("Warning: failed to seed sample data: {}", e);
    }

    let ollama = OllamaClient::from_settings();

    let result = run_command(cli.command, &db, &ollama).await;
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_command(
    command: Commands,
    db: &Database,
    ollama: &OllamaClient,
) -> Result<(), String> {
    match command {
        Commands::Add { url } => {
            match ingest::add_link(db, ollama, &url)
                .await
                .map_err(|e| e.to_string())?
            {
                IngestOutcome::Added(link) => {
                    println!("Added: {} ({})", link.url, link.title);
                }
                IngestOutcome::Duplicate(url) => {
                    println!("Already stored: {}", url);
                }
            }
            Ok(())
        }

        Commands::Batch { file, limit } => {
            let result = batch::ingest_csv_file(db, ollama, &file, limit).await?;
            println!(
                "Batch complete: {} added, {} skipped, {} errors",
                result.processed,
                result.skipped,
                result.errors.len()
            );
            for reason in &result.skip_reasons {
                println!("  skipped {}", reason);
            }
            for error in &result.errors {
                println!("  error {}", error);
            }
            Ok(())
        }

        Commands::List => {
            let links = db.get_links_with_categories().map_err(|e| e.to_string())?;
            if links.is_empty() {
                println!("No links stored yet.");
                return Ok(());
            }
            for link in links {
                println!("{}  [{}]  {}", link.url, link.category, link.title);
            }
            Ok(())
        }

        Commands::Delete { url } => {
            let canonical = linkgarden_lib::canonical::canonicalize(&url)
                .map_err(|e| e.to_string())?;
            if db.delete_link(&canonical).map_err(|e| e.to_string())? {
                println!("Deleted: {}", canonical);
            } else {
                println!("Not found: {}", canonical);
            }
            Ok(())
        }

        Commands::Export { out } => {
            let view = export::export_graph(db).map_err(|e| e.to_string())?;
            let json = serde_json::to_string_pretty(&view)
                .map_err(|e| format!("Failed to serialize graph: {}", e))?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)
                        .map_err(|e| format!("Failed to write {}: {}", path, e))?;
                    println!(
                        "Exported {} nodes, {} edges to {}",
                        view.nodes.len(),
                        view.edges.len(),
                        path
                    );
                }
                None => println!("{}", json),
            }
            Ok(())
        }

        Commands::Status => {
            let links = db.count_links().map_err(|e| e.to_string())?;
            let categories = db.count_categories().map_err(|e| e.to_string())?;
            let keywords = db.count_keywords().map_err(|e| e.to_string())?;
            let edges = db.count_edges().map_err(|e| e.to_string())?;

            println!("Database: {}", db.get_path());
            println!("Links: {}", links);
            println!("Categories: {}", categories);
            println!("Keywords: {}", keywords);
            println!("Edges: {}", edges);

            let available = ollama.probe().await;
            println!(
                "Ollama ({}): {}",
                ollama.model(),
                if available { "available" } else { "unreachable" }
            );
            Ok(())
        }

        Commands::SetModel { model } => {
            settings::set_ollama_model(&model)?;
            println!("Ollama model set to: {}", model);
            Ok(())
        }
    }
}
