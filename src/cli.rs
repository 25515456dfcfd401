//! Command-line argument parsing for Sentra.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Natural-language analytics agent over Athena catalogs.
#[derive(Parser, Debug)]
#[command(name = "sentra")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true, value_name = "PATH", env = "SENTRA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Use in-memory query, memory, identity and LLM backends
    #[arg(long, global = true)]
    pub mock: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        /// Address to bind (overrides [server] host and port)
        #[arg(long, value_name = "HOST:PORT")]
        bind: Option<String>,
    },

    /// Ask the agent one question and print the response JSON
    Ask {
        #[arg(long, value_name = "USER_ID")]
        user: String,

        #[arg(long, value_name = "SESSION_ID", default_value = "cli")]
        session: String,

        /// The question
        #[arg(value_name = "QUESTION", required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Run one SQL statement through the poller and print the rows
    Query {
        /// Catalog database to run against
        #[arg(long, value_name = "NAME")]
        catalog: String,

        /// User whose record scope applies; unrestricted when omitted
        #[arg(long, value_name = "USER_ID")]
        user: Option<String>,

        #[arg(value_name = "SQL")]
        sql: String,
    },

    /// Log in and print the issued tokens
    Login {
        #[arg(long)]
        username: String,

        #[arg(long, env = "SENTRA_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Inspect or clear conversation memory
    Memory {
        #[command(subcommand)]
        command: MemoryCommand,
    },

    /// Copy a table schema from the Glue catalog into memory
    SyncSchema {
        #[arg(long)]
        database: String,

        #[arg(long)]
        table: String,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum MemoryCommand {
    /// Show the most recent turns of a session
    Turns {
        /// User id; sanitized into an actor id
        #[arg(long)]
        actor: String,

        #[arg(long)]
        session: String,

        #[arg(short = 'k', long, default_value_t = crate::memory::DEFAULT_HISTORY_TURNS)]
        k: usize,
    },

    /// List the sessions of an actor
    Sessions {
        #[arg(long)]
        actor: String,
    },

    /// Delete every event of a session
    Clear {
        #[arg(long)]
        actor: String,

        #[arg(long)]
        session: String,
    },
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::config::Config::default_path)
    }
}
