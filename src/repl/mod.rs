//! REPL (Read-Eval-Print Loop) for interactive question answering
//!
//! One REPL owns one session in the registry; `/new` swaps it for a fresh
//! one. Questions go through the session's pipeline, commands are handled
//! locally.

pub mod commands;
pub mod display;
pub mod input;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::Verbosity;
use crate::rag::RagServices;
pub use crate::repl::commands::{parse, Command};
pub use crate::repl::display::DisplayManager;
use crate::repl::input::{InputEvent, InputHandler};
use crate::session::SessionRegistry;

/// REPL session coordinator
pub struct ReplSession {
    input_handler: InputHandler,
    display: DisplayManager,
    registry: SessionRegistry,
    session_id: String,
    verbosity: Verbosity,
}

impl ReplSession {
    pub async fn new(
        services: Arc<RagServices>,
        verbosity: Verbosity,
        history_file: Option<PathBuf>,
    ) -> Result<Self> {
        let input_handler = match history_file {
            Some(path) => InputHandler::with_history(path)?,
            None => InputHandler::new()?,
        };
        let registry = SessionRegistry::new(services);
        let session_id = registry.create().await;

        Ok(ReplSession {
            input_handler,
            display: DisplayManager::new(verbosity.show_progress()),
            registry,
            session_id,
            verbosity,
        })
    }

    /// Read and answer until `quit` or Ctrl-D
    pub async fn run(&mut self, version: &str) -> Result<()> {
        let config = self.registry.services().config();
        self.display
            .show_banner(version, &config.chat.model, &config.vector_store.collection);

        loop {
            match self.input_handler.read_line()? {
                InputEvent::Line(line) => {
                    if !self.handle_input(&line).await? {
                        break;
                    }
                }
                InputEvent::Interrupted => {
                    self.display.show_info("Çıkmak için 'quit' yazın veya Ctrl-D'ye basın.");
                }
                InputEvent::Eof => break,
            }
        }

        self.display.show_goodbye();
        if let Err(e) = self.input_handler.save_history() {
            tracing::warn!(error = %e, "Could not save REPL history");
        }
        Ok(())
    }

    /// Handle one line. Returns false when the REPL should exit.
    pub async fn handle_input(&mut self, input: &str) -> Result<bool> {
        match parse(input) {
            Command::Empty => {}
            Command::Exit => return Ok(false),
            Command::Help => self.display.show_help(),
            Command::Ask { question } => self.ask(&question).await,
            Command::Reset => {
                self.registry.reset(&self.session_id).await?;
                self.display.show_info("🔄 Konuşma geçmişi temizlendi.");
            }
            Command::Memory => {
                let stats = self.registry.stats(&self.session_id).await?;
                self.display.show_memory_stats(&stats);
            }
            Command::Stats => match self.registry.services().store().collection_stats().await {
                Ok(stats) => self.display.show_collection_stats(&stats),
                Err(e) => self.display.show_error(&e.to_string()),
            },
            Command::Health => {
                let report = self.registry.services().store().health_check().await;
                self.display.show_health(&report);
            }
            Command::New => {
                self.registry.end(&self.session_id).await;
                self.session_id = self.registry.create().await;
                self.display.show_info("🆕 Yeni oturum başlatıldı.");
            }
            Command::Unknown { input } => {
                self.display.show_error(&format!("Unknown command: {}", input));
                self.display.show_info("Type /help for available commands");
            }
        }
        Ok(true)
    }

    async fn ask(&mut self, question: &str) {
        let pb = self.display.start_thinking();
        let payload = self.registry.answer(&self.session_id, question).await;
        pb.finish_and_clear();

        if payload.is_success() {
            self.display.show_answer(&payload.answer);
        } else {
            self.display.show_error(&payload.answer);
        }

        if self.verbosity.show_details() {
            if let Ok(stats) = self.registry.stats(&self.session_id).await {
                self.display.show_memory_stats(&stats);
            }
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }
}

/// Default REPL history location: `~/.lexrag/history`
pub fn default_history_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".lexrag").join("history"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::pipeline::fakes::services;

    async fn repl() -> ReplSession {
        ReplSession::new(services(false), Verbosity::Quiet, None).await.unwrap()
    }

    #[tokio::test]
    async fn test_exit_words_stop_loop() {
        let mut session = repl().await;
        assert!(session.handle_input("/help").await.unwrap());
        assert!(session.handle_input("   ").await.unwrap());
        assert!(!session.handle_input("quit").await.unwrap());
        assert!(!session.handle_input("/exit").await.unwrap());
    }

    #[tokio::test]
    async fn test_question_then_reset() {
        let mut session = repl().await;
        session.handle_input("İşveren ne yapmalı?").await.unwrap();

        let id = session.session_id().to_string();
        assert_eq!(session.registry().stats(&id).await.unwrap().total_messages, 2);

        session.handle_input("reset").await.unwrap();
        assert_eq!(session.registry().stats(&id).await.unwrap().total_messages, 0);
    }

    #[tokio::test]
    async fn test_new_replaces_session() {
        let mut session = repl().await;
        let first = session.session_id().to_string();
        session.handle_input("/new").await.unwrap();

        assert_ne!(session.session_id(), first);
        assert_eq!(session.registry().len().await, 1);
        assert!(session.registry().stats(&first).await.is_err());
    }
}
