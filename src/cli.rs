use std::path::PathBuf;

use clap::Parser;

use crate::config::API_URL_ENV;

#[derive(Parser, Debug)]
#[command(name = "navigator")]
#[command(version)]
#[command(about = "Ask questions about the federal budget and read streamed, cited answers")]
pub struct Args {
    /// Backend origin, e.g. http://localhost:8000
    #[arg(long, env = API_URL_ENV)]
    pub api_url: Option<String>,

    /// TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Register with this name instead of prompting for one
    #[arg(long)]
    pub name: Option<String>,

    /// Give up on a stream that sends nothing for this many seconds
    #[arg(long)]
    pub stream_timeout: Option<u64>,

    /// Log at debug level (RUST_LOG still wins when set)
    #[arg(long, short)]
    pub verbose: bool,
}

/// A line typed at the chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    Logout,
    Quit,
    History,
    Help,
    Ask(&'a str),
    Blank,
}

pub fn parse_command(line: &str) -> Command<'_> {
    let trimmed = line.trim();
    match trimmed {
        "" => Command::Blank,
        "/logout" => Command::Logout,
        "/quit" | "/exit" => Command::Quit,
        "/history" => Command::History,
        "/help" => Command::Help,
        _ => Command::Ask(line),
    }
}

pub const HELP_TEXT: &str = "Type a question and press Enter.\n  \
/history  show the conversation so far\n  \
/logout   end this session and start a new one\n  \
/quit     leave";
