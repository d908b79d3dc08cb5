//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Taskbreaker - break a task into timed microtasks
#[derive(Debug, Parser)]
#[command(
    name = "tb",
    about = "Break a task into timed microtasks and extract them as a checklist",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "Logs are written to: ~/.local/share/taskbreaker/logs/taskbreaker.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, help = "Log level (trace, debug, info, warn, error)")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Break down one task and print the extracted steps
    Breakdown {
        /// Task request, e.g. "Study for Math Exam, 1 hour"
        task: String,

        /// Session id for conversation context
        #[arg(short, long)]
        session: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Interactive multi-turn session
    Repl {
        /// Session id (a fresh one is generated if omitted)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Decode extraction output from a file or stdin (no network)
    Parse {
        /// File to read; stdin when omitted
        file: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the resolved prompt template
    Prompts {
        /// Template name (breakdown, extract, correction)
        name: String,
    },
}

/// Output format for breakdown/parse results
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_breakdown() {
        let cli = Cli::parse_from(["tb", "breakdown", "Clean my room, 1 hour"]);
        if let Command::Breakdown { task, session, format } = cli.command {
            assert_eq!(task, "Clean my room, 1 hour");
            assert!(session.is_none());
            assert_eq!(format, OutputFormat::Text);
        } else {
            panic!("Expected Breakdown command");
        }
    }

    #[test]
    fn test_cli_parse_breakdown_with_session_and_json() {
        let cli = Cli::parse_from(["tb", "breakdown", "Taxes", "-s", "abc", "--format", "json"]);
        assert!(matches!(
            cli.command,
            Command::Breakdown {
                session: Some(ref s),
                format: OutputFormat::Json,
                ..
            } if s == "abc"
        ));
    }

    #[test]
    fn test_cli_parse_repl() {
        let cli = Cli::parse_from(["tb", "repl"]);
        assert!(matches!(cli.command, Command::Repl { session: None }));
    }

    #[test]
    fn test_cli_parse_parse_stdin() {
        let cli = Cli::parse_from(["tb", "parse"]);
        assert!(matches!(cli.command, Command::Parse { file: None, .. }));
    }

    #[test]
    fn test_cli_parse_prompts() {
        let cli = Cli::parse_from(["tb", "prompts", "extract"]);
        assert!(matches!(cli.command, Command::Prompts { ref name } if name == "extract"));
    }

    #[test]
    fn test_output_format_from_str() {
        assert!(matches!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text)));
        assert!(matches!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!("table".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_cli_with_config_and_log_level() {
        let cli = Cli::parse_from(["tb", "-c", "/path/to/config.yml", "--log-level", "debug", "prompts", "breakdown"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.yml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }
}
