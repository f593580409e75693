use anyhow::Result;
use clap::{Parser, Subcommand};
use gesture_core::persistence::PROGRESS_KEY_PREFIX;
use storage::{KeyValueStore, Storage};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/gesture.db")]
    database_url: String,
    #[arg(long, default_value = "gesture-flash:")]
    key_prefix: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prints the raw value stored under a key (without the prefix).
    Get { key: String },
    /// Lists saved progress for every category.
    ListProgress,
    /// Removes a key (without the prefix).
    Clear { key: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::Get { key } => {
            let full_key = format!("{}{key}", cli.key_prefix);
            match storage.get(&full_key).await? {
                Some(value) => println!("{value}"),
                None => println!("no value for {full_key}"),
            }
        }
        Command::ListProgress => {
            let prefix = format!("{}{PROGRESS_KEY_PREFIX}", cli.key_prefix);
            let entries = storage.entries_with_prefix(&prefix).await?;
            if entries.is_empty() {
                println!("no saved progress");
            }
            for entry in entries {
                let category = entry.key.strip_prefix(&prefix).unwrap_or(&entry.key);
                println!(
                    "{category}\t{}\tupdated_at={}",
                    entry.value,
                    entry.updated_at.to_rfc3339()
                );
            }
        }
        Command::Clear { key } => {
            let full_key = format!("{}{key}", cli.key_prefix);
            storage.remove(&full_key).await?;
            println!("cleared {full_key}");
        }
    }

    Ok(())
}
