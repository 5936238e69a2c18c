//! Command-line argument parsing for lexrag
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;

/// lexrag - Ask grounded questions about Turkish occupational safety law
#[derive(Parser, Debug)]
#[command(name = "lexrag")]
#[command(version)]
#[command(about = "Retrieval-augmented Q&A over the Law 6331 corpus", long_about = None)]
pub struct Args {
    /// Question to answer once; starts the REPL when omitted
    #[arg(value_name = "QUESTION")]
    pub question: Option<String>,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Chat model override
    #[arg(short, long)]
    pub model: Option<String>,

    /// Vector collection override
    #[arg(long)]
    pub collection: Option<String>,

    /// Only retrieve passages from this source directory
    #[arg(long)]
    pub source_dir: Option<String>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress all output except final result)
    #[arg(short, long)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start interactive REPL mode
    Start,

    /// Answer one question and exit
    Ask {
        /// The question
        question: String,

        /// Print the answer payload as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run vector store and chat endpoint diagnostics
    Doctor,

    /// Show vector collection statistics
    Stats,

    /// Display current configuration
    Config,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }

    /// A bare question and a subcommand are mutually exclusive
    pub fn validate(&self) -> Result<(), String> {
        if self.command.is_some() && self.question.is_some() {
            return Err("Cannot specify a question with a subcommand. Use 'lexrag ask <QUESTION>'.".to_string());
        }

        if let Some(question) = &self.question {
            if question.trim().is_empty() {
                return Err("Question cannot be empty.".to_string());
            }
        }

        Ok(())
    }

    /// What to run: bare question becomes `ask`, nothing becomes `start`
    pub fn resolved_command(&self) -> Commands {
        match (&self.command, &self.question) {
            (Some(command), _) => command.clone(),
            (None, Some(question)) => Commands::Ask {
                question: question.clone(),
                json: false,
            },
            (None, None) => Commands::Start,
        }
    }

    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.chat.model = model.clone();
        }
        if let Some(collection) = &self.collection {
            config.vector_store.collection = collection.clone();
        }
        if let Some(dir) = &self.source_dir {
            config.retrieval.source_dir = Some(dir.clone());
        }
    }
}

impl Verbosity {
    /// Default log filter when `RUST_LOG` is unset
    pub fn log_directive(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "lexrag=info,warn",
            Verbosity::VeryVerbose => "lexrag=debug,info",
        }
    }

    /// Check if should show progress spinners
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }

    /// Check if should show stage details after each answer
    pub fn show_details(&self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::VeryVerbose)
    }
}
