use clap::{Parser, Subcommand, ValueEnum};
use local_rag::Result;
use local_rag::commands::{ingest, load_config, query, show_configuration, show_status};
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser)]
#[command(name = "local-rag")]
#[command(about = "Ask questions about local text documents with a locally-run language model")]
#[command(version)]
struct Cli {
    /// Path to a local-rag.toml configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the documents in the source directory
    Ingest {
        /// "y" deletes and rebuilds the store first, "n" appends to it
        #[arg(value_enum, ignore_case = true, default_value = "n")]
        wipe: WipeFlag,
    },
    /// Answer questions interactively; type "exit" to quit
    Query,
    /// Show the effective configuration
    Config,
    /// Show the state of the store and the model runtimes
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum WipeFlag {
    Y,
    N,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = dotenvy::dotenv() {
        debug!("No .env file loaded: {}", e);
    }

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest { wipe } => {
            ingest(&config, wipe == WipeFlag::Y).await?;
        }
        Commands::Query => {
            query(&config).await?;
        }
        Commands::Config => {
            show_configuration(&config);
        }
        Commands::Status => {
            show_status(&config).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn query_command() {
        let cli = Cli::try_parse_from(["local-rag", "query"]).expect("should parse");
        assert!(matches!(cli.command, Commands::Query));
        assert_eq!(cli.config, None);
    }

    #[test]
    fn ingest_defaults_to_append() {
        let cli = Cli::try_parse_from(["local-rag", "ingest"]).expect("should parse");
        assert!(matches!(
            cli.command,
            Commands::Ingest {
                wipe: WipeFlag::N
            }
        ));
    }

    #[test]
    fn ingest_wipe_flag_ignores_case() {
        for arg in ["y", "Y"] {
            let cli = Cli::try_parse_from(["local-rag", "ingest", arg]).expect("should parse");
            assert!(matches!(
                cli.command,
                Commands::Ingest {
                    wipe: WipeFlag::Y
                }
            ));
        }

        let cli = Cli::try_parse_from(["local-rag", "ingest", "N"]).expect("should parse");
        assert!(matches!(
            cli.command,
            Commands::Ingest {
                wipe: WipeFlag::N
            }
        ));
    }

    #[test]
    fn ingest_rejects_other_flags() {
        let cli = Cli::try_parse_from(["local-rag", "ingest", "yes"]);
        assert!(matches!(cli, Err(err) if err.kind() == ErrorKind::InvalidValue));
    }

    #[test]
    fn global_config_option() {
        let cli = Cli::try_parse_from(["local-rag", "status", "--config", "rag/local-rag.toml"])
            .expect("should parse");
        assert!(matches!(cli.command, Commands::Status));
        assert_eq!(cli.config, Some(PathBuf::from("rag/local-rag.toml")));
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["local-rag", "invalid"]);
        assert!(matches!(cli, Err(err) if err.kind() == ErrorKind::InvalidSubcommand));
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["local-rag", "--help"]);
        assert!(matches!(cli, Err(err) if err.kind() == ErrorKind::DisplayHelp));
    }
}
