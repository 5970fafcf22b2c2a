use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::process::ExitCode;
use std::sync::Arc;

use mindforge_backend::config::Config;
use mindforge_backend::db::Database;
use mindforge_backend::error::EntityKind;
use mindforge_backend::models::Topic;
use mindforge_backend::notebook::{seed, NoteStore, SearchIndex, TagIndex, TopicStore};
use mindforge_backend::{StoreError, StoreResult};

/// Mindforge notebook: browse topics, tags and notes from the terminal
#[derive(Parser, Debug)]
#[command(name = "mindforge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Browse and search a Mindforge notebook")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Print the topic tree with note counts (default)
    Tree,

    /// List tags by usage
    Tags,

    /// Print one note as JSON
    Show {
        /// Note id
        #[arg(value_name = "NOTE_ID")]
        note_id: i64,
    },

    /// Find notes by text, tag, or both
    Search {
        /// Words to look for in titles and block text
        #[arg(value_name = "QUERY")]
        query: Vec<String>,

        /// Only notes carrying this tag
        #[arg(long, value_name = "TAG")]
        tag: Option<String>,
    },
}

fn print_topics(topics: &[Topic], depth: usize) {
    for topic in topics {
        println!("{}{} ({})", "  ".repeat(depth), topic.name, topic.note_count);
        print_topics(&topic.children, depth + 1);
    }
}

fn run(command: Command, db: Arc<Database>) -> StoreResult<()> {
    match command {
        Command::Tree => {
            let forest = TopicStore::new(db.clone()).tree()?;
            if forest.is_empty() {
                println!("(no topics)");
            }
            print_topics(&forest, 0);
            let unfiled = NoteStore::new(db)
                .list(None)?
                .into_iter()
                .filter(|n| n.topic_id.is_none())
                .count();
            if unfiled > 0 {
                println!("{} unfiled note(s)", unfiled);
            }
        }
        Command::Tags => {
            for tag in TagIndex::new(db).all()? {
                println!("{:<30} {}", tag.name, tag.usage_count);
            }
        }
        Command::Show { note_id } => {
            let note = NoteStore::new(db)
                .get(note_id)?
                .ok_or_else(|| StoreError::not_found(EntityKind::Note, note_id))?;
            println!("{}", serde_json::to_string_pretty(&note)?);
        }
        Command::Search { query, tag } => {
            let hits = SearchIndex::new(db).search(&query.join(" "), tag.as_deref())?;
            for hit in &hits {
                println!(
                    "{:>6}  {}  [{}]  {}  {}",
                    hit.id,
                    hit.title,
                    hit.topic_name.as_deref().unwrap_or("unfiled"),
                    hit.updated_at.format("%Y-%m-%d %H:%M"),
                    hit.tags.iter().map(|t| format!("#{}", t)).collect::<Vec<_>>().join(" ")
                );
            }
            println!("{} match(es)", hits.len());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    dotenv().ok();
    env_logger::init();

    log::info!("Mindforge v{}", env!("CARGO_PKG_VERSION"));

    let command = Cli::parse().command.unwrap_or(Command::Tree);

    let config = Config::from_env();
    log::info!("Initializing database at {}", config.database_url);
    let db = match Database::with_pool_size(&config.database_url, config.pool_size) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            eprintln!("Failed to open database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if config.seed_welcome_note {
        if let Err(e) = seed::ensure_welcome(&db) {
            log::error!("Failed to seed welcome note: {}", e);
        }
    }

    match run(command, db) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
