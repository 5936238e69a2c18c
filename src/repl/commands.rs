//! REPL input classification
//!
//! Slash commands, the bare words `quit`/`exit`/`q`/`reset`, or a question.

/// Parsed REPL input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    /// Clear this session's conversation
    Reset,
    /// Conversation memory statistics
    Memory,
    /// Vector collection statistics
    Stats,
    /// Vector store health
    Health,
    /// End this session and start a fresh one
    New,
    Exit,
    Ask { question: String },
    Empty,
    Unknown { input: String },
}

pub fn parse(input: &str) -> Command {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Command::Empty;
    }

    if let Some(rest) = trimmed.strip_prefix('/') {
        let name = rest.split_whitespace().next().unwrap_or("").to_lowercase();
        return match name.as_str() {
            "help" | "h" => Command::Help,
            "reset" => Command::Reset,
            "memory" | "mem" => Command::Memory,
            "stats" => Command::Stats,
            "health" => Command::Health,
            "new" => Command::New,
            "exit" | "quit" | "q" => Command::Exit,
            _ => Command::Unknown {
                input: trimmed.to_string(),
            },
        };
    }

    match trimmed.to_lowercase().as_str() {
        "quit" | "exit" | "q" => Command::Exit,
        "reset" => Command::Reset,
        _ => Command::Ask {
            question: trimmed.to_string(),
        },
    }
}

/// (command, description) rows for `/help`
pub const HELP: &[(&str, &str)] = &[
    ("/help, /h", "Show this help message"),
    ("/memory", "Show conversation memory usage"),
    ("/stats", "Show vector collection statistics"),
    ("/health", "Check vector store connectivity"),
    ("/reset, reset", "Forget the conversation so far"),
    ("/new", "Start a new session"),
    ("/exit, quit, q", "Exit"),
];
