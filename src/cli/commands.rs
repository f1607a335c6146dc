//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - pull: fetch a feed URL through the pulling queue
//! - config: print the effective configuration

use clap::{Parser, Subcommand};
use feedpull::domain::Priority;
use std::path::PathBuf;

/// feedpull - rate-limited, prioritised feed puller
#[derive(Parser, Debug)]
#[command(name = "feedpull")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pull a feed URL, once or a bounded number of times
    Pull {
        /// URL to pull
        url: String,

        /// Logical feed name used in request ids and statistics
        #[arg(short, long, default_value = "cli")]
        name: String,

        /// Additional pulls after the first one
        #[arg(short, long, default_value_t = 0)]
        times: u32,

        /// Delay between pulls in milliseconds
        #[arg(short, long, default_value_t = 1000)]
        interval_ms: u64,

        /// Request priority (highest, high, medium, low, lowest)
        #[arg(short, long, default_value = "medium")]
        priority: Priority,

        /// Retry budget per pull
        #[arg(short, long, default_value_t = 3)]
        retries: u32,

        /// Extra header as "Name: value" (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },

    /// Print the effective configuration as YAML
    Config,
}

/// Split a "Name: value" header argument
pub fn parse_header(raw: &str) -> Option<(String, String)> {
    let (name, value) = raw.split_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pull_defaults() {
        let cli = Cli::parse_from(["feedpull", "pull", "http://feeds.test/a"]);
        match cli.command {
            Commands::Pull {
                url,
                name,
                times,
                interval_ms,
                priority,
                retries,
                headers,
            } => {
                assert_eq!(url, "http://feeds.test/a");
                assert_eq!(name, "cli");
                assert_eq!(times, 0);
                assert_eq!(interval_ms, 1000);
                assert_eq!(priority, Priority::Medium);
                assert_eq!(retries, 3);
                assert!(headers.is_empty());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_pull_with_options() {
        let cli = Cli::parse_from([
            "feedpull",
            "--verbose",
            "pull",
            "http://feeds.test/a",
            "--times",
            "5",
            "--priority",
            "highest",
            "-H",
            "Accept: application/xml",
        ]);
        assert!(cli.is_verbose());
        match cli.command {
            Commands::Pull {
                times,
                priority,
                headers,
                ..
            } => {
                assert_eq!(times, 5);
                assert_eq!(priority, Priority::Highest);
                assert_eq!(headers, vec!["Accept: application/xml".to_string()]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_config_command_with_global_path() {
        let cli = Cli::parse_from(["feedpull", "config", "--config", "/tmp/feedpull.yml"]);
        assert!(matches!(cli.command, Commands::Config));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/feedpull.yml")));
    }

    #[test]
    fn test_invalid_priority_is_rejected() {
        assert!(Cli::try_parse_from(["feedpull", "pull", "http://x", "--priority", "urgent"]).is_err());
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("Accept: text/xml"),
            Some(("Accept".to_string(), "text/xml".to_string()))
        );
        assert_eq!(
            parse_header("X-Url:http://a:b"),
            Some(("X-Url".to_string(), "http://a:b".to_string()))
        );
        assert_eq!(parse_header("no-colon"), None);
        assert_eq!(parse_header(": value"), None);
    }
}
