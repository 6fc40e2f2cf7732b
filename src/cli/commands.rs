use crate::session::UserType;
use clap::{Parser, Subcommand};

/// `InternHub` - AI-assisted candidate search for the internship marketplace.
#[derive(Parser, Debug)]
#[command(name = "internhub")]
#[command(version)]
#[command(about = "AI-assisted candidate search for the InternHub marketplace.", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chat with the AI search assistant
    Chat {
        /// Audience for the conversation (student, company)
        #[arg(short, long)]
        user_type: Option<UserType>,

        /// Resume a saved session instead of starting a new one
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Manage locally saved chat sessions
    Sessions {
        #[command(subcommand)]
        session_command: SessionCommands,
    },

    /// Browse the candidate directory
    Candidates {
        /// Free-text filter (name, skill, university)
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show evaluations saved from previous searches
    History,

    /// Show effective configuration
    Status,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// List saved sessions, most recently updated first
    List {
        /// Only sessions for this audience
        #[arg(short, long)]
        user_type: Option<UserType>,
    },

    /// Print a saved session transcript
    Show {
        /// Session id
        id: String,
    },

    /// Delete a saved session and its messages
    Delete {
        /// Session id
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}
