//! Terminal output for the REPL and one-shot mode

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::repl::commands::HELP;
use crate::types::{CollectionStats, HealthReport, MemoryStats};

const WIDTH: usize = 70;

/// Colored output plus a spinner while a question is in flight
pub struct DisplayManager {
    show_progress: bool,
    tick: Duration,
}

impl DisplayManager {
    pub fn new(show_progress: bool) -> Self {
        DisplayManager {
            show_progress,
            tick: Duration::from_millis(100),
        }
    }

    pub fn show_banner(&self, version: &str, model: &str, collection: &str) {
        let rule = "=".repeat(WIDTH);
        println!("\n{}", rule.cyan());
        println!("{}", format!("  ⚖️  lexrag {} - 6331 İş Sağlığı ve Güvenliği Kanunu", version).bold().cyan());
        println!("{}", format!("  Model: {} | Collection: {}", model, collection).dimmed());
        println!("{}\n", rule.cyan());
        println!(
            "Sorunuzu yazın ({} komutlar, {} çıkış)\n",
            "/help".green(),
            "quit".green()
        );
    }

    /// Spinner shown until the returned bar is finished; hidden in quiet mode
    pub fn start_thinking(&self) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg} [{elapsed}]") {
            pb.set_style(style);
        }
        pb.set_message("Kaynaklar aranıyor ve cevap hazırlanıyor...");
        pb.enable_steady_tick(self.tick);
        pb
    }

    pub fn show_answer(&self, answer: &str) {
        println!("\n{} {}\n", "💬 Cevap:".bold().green(), answer);
    }

    pub fn show_error(&self, error: &str) {
        eprintln!("{} {}", "✗".red().bold(), error.red());
    }

    pub fn show_warning(&self, warning: &str) {
        eprintln!("{} {}", "⚠".yellow().bold(), warning.yellow());
    }

    pub fn show_info(&self, info: &str) {
        println!("{} {}", "ℹ".cyan(), info);
    }

    pub fn show_help(&self) {
        println!("\n{}", "Available Commands:".bold().cyan());
        println!("{}", "=".repeat(60).cyan());
        for (cmd, desc) in HELP {
            println!("  {:<20} {}", cmd.green(), desc);
        }
        println!("\n  Anything else is sent as a question.\n");
    }

    pub fn show_memory_stats(&self, stats: &MemoryStats) {
        println!("\n{}", "🧠 Conversation Memory".bold().cyan());
        println!("  Messages:  {}/{}", stats.total_messages, stats.max_allowed);
        println!("  Strategy:  {}", stats.memory_strategy);
        println!("  Usage:     {:.1}%\n", stats.memory_usage_percent);
    }

    pub fn show_collection_stats(&self, stats: &CollectionStats) {
        println!("\n{}", "📚 Vector Collection".bold().cyan());
        println!("  Documents:  {}", stats.total_documents);
        println!("  Database:   {}", stats.database_id);
        println!("  Collection: {}\n", stats.collection_id);
    }

    pub fn show_health(&self, report: &HealthReport) {
        if report.is_healthy() {
            println!(
                "{} Vector store {} ({} documents)",
                "✓".green().bold(),
                report.connectivity.green(),
                report.document_count.unwrap_or(0)
            );
        } else {
            println!(
                "{} Vector store {}: {}",
                "✗".red().bold(),
                report.connectivity.red(),
                report.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    pub fn show_goodbye(&self) {
        println!("{}", "👋 Görüşmek üzere!".green());
    }
}
