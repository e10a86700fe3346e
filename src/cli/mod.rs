//! CLI module for docqa
//!
//! Command-line parsing for the docqa-server binary. Uses clap for argument
//! parsing and owo-colors for colored terminal output.

pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// docqa - answers questions about product documentation
#[derive(Parser, Debug)]
#[command(
    name = "docqa-server",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "Retrieval-augmented question answering over product documentation",
    long_about = "Answers questions about product documentation by retrieving relevant chunks\n\
                  from a Qdrant collection and asking an LLM to answer from them only.\n\n\
                  Run without arguments to start the HTTP server.",
    after_help = "EXAMPLES:\n    \
                  docqa-server                                  # Start the server (reads docqa.toml)\n    \
                  docqa-server ask \"What is the reset procedure?\"\n    \
                  docqa-server config --validate                # Check configuration and secrets\n    \
                  docqa-server --config prod.toml serve --port 8080"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "docqa.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve {
        /// Override server.host
        #[arg(long)]
        host: Option<String>,

        /// Override server.port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Answer a single question and exit
    Ask {
        /// The question to answer
        question: String,

        /// Print the answer as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show configuration information
    Config {
        /// Also check that required secrets are present in the environment
        #[arg(long)]
        validate: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The command to run, `serve` when none was given.
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve {
            host: None,
            port: None,
        })
    }
}
