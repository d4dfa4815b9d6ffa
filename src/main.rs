use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kb_search::Result;
use kb_search::commands::{
    import_articles, rebuild_index, search, show_config, show_stats, write_config,
};
use kb_search::config::{Config, get_config_dir};

#[derive(Parser)]
#[command(name = "kb-search")]
#[command(about = "Chunking and full-text retrieval for a knowledge base of articles")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and knowledge.db
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or write the configuration file
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Import articles from a JSON array of {id, headline, text, active}
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },
    /// Re-chunk all active articles and rebuild the full-text index
    Rebuild {
        /// Override the configured maximum tokens per chunk
        #[arg(long)]
        max_tokens: Option<usize>,
        /// Override the configured overlap between chunks
        #[arg(long)]
        overlap_tokens: Option<usize>,
    },
    /// Retrieve the chunks most relevant to a prompt
    Search {
        prompt: String,
        /// Maximum number of chunks to return
        #[arg(long)]
        limit: Option<usize>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show article and chunk statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir().map_err(|e| kb_search::KbError::Config(e.to_string()))?,
    };
    let config = Config::load(&config_dir)?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config)?;
            } else {
                write_config(&config)?;
            }
        }
        Commands::Import { file } => {
            import_articles(&config, &file).await?;
        }
        Commands::Rebuild {
            max_tokens,
            overlap_tokens,
        } => {
            rebuild_index(&config, max_tokens, overlap_tokens).await?;
        }
        Commands::Search {
            prompt,
            limit,
            json,
        } => {
            search(&config, &prompt, limit, json).await?;
        }
        Commands::Stats => {
            show_stats(&config).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["kb-search", "stats"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Stats));
            assert_eq!(parsed.config_dir, None);
        }
    }

    #[test]
    fn global_config_dir() {
        let cli = Cli::try_parse_from(["kb-search", "stats", "--config-dir", "/tmp/kb"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert_eq!(parsed.config_dir, Some(PathBuf::from("/tmp/kb")));
        }
    }

    #[test]
    fn rebuild_overrides() {
        let cli = Cli::try_parse_from([
            "kb-search",
            "rebuild",
            "--max-tokens",
            "500",
            "--overlap-tokens",
            "0",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Rebuild {
                max_tokens,
                overlap_tokens,
            } = parsed.command
            {
                assert_eq!(max_tokens, Some(500));
                assert_eq!(overlap_tokens, Some(0));
            }
        }
    }

    #[test]
    fn search_command_with_limit() {
        let cli = Cli::try_parse_from([
            "kb-search",
            "search",
            "Wann hat die Mensa geöffnet?",
            "--limit",
            "3",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Search {
                prompt,
                limit,
                json,
            } = parsed.command
            {
                assert_eq!(prompt, "Wann hat die Mensa geöffnet?");
                assert_eq!(limit, Some(3));
                assert!(!json);
            }
        }
    }

    #[test]
    fn import_requires_file() {
        let cli = Cli::try_parse_from(["kb-search", "import"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["kb-search", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["kb-search", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }
}
