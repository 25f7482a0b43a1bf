//! Terminal rendering for answers, transcripts and errors.

use std::io::{self, Write};

use colored::*;

use crate::dialogue::ConversationTurn;
use crate::error::ChatError;
use crate::providers::ModelInfo;

pub fn print_header(title: &str, model: &str) {
    println!("{}", title.bright_cyan().bold());
    println!("{}: {}", "Model".bright_yellow(), model);
    println!("{}", "=".repeat(50).bright_blue());
}

pub fn print_footer() {
    println!("\n{}", "=".repeat(50).bright_blue());
}

/// Write one streamed fragment without a newline.
pub fn print_fragment(fragment: &str) {
    print!("{fragment}");
    let _ = io::stdout().flush();
}

/// One transcript entry. Role A is blue, role B green, the scenario yellow.
pub fn format_turn(turn: &ConversationTurn, role_a: &str) -> String {
    if turn.is_scenario() {
        return format!("{}\n{}", "Scenario:".yellow().bold(), turn.message.yellow());
    }
    let speaker = format!("{}:", turn.speaker);
    let speaker = if turn.speaker == role_a {
        speaker.bright_blue().bold()
    } else {
        speaker.bright_green().bold()
    };
    format!("{speaker}\n{}", turn.message)
}

pub fn print_turn(turn: &ConversationTurn, role_a: &str) {
    println!("{}\n", format_turn(turn, role_a));
}

pub fn format_error(err: &ChatError) -> String {
    if err.is_precondition() {
        format!("{} {}", "[blocked]".bright_yellow().bold(), err)
    } else {
        format!("{} {}", "[error]".bright_red().bold(), err)
    }
}

pub fn print_error(err: &ChatError) {
    eprintln!("{}", format_error(err));
}

pub fn format_model(model: &ModelInfo) -> String {
    let vision = if model.supports_image { "image+text" } else { "text" };
    format!("{:<24} {:<48} {}", model.label, model.id, vision)
}

pub fn print_models(models: &[ModelInfo]) {
    println!("{}", format!("{:<24} {:<48} {}", "LABEL", "ID", "INPUT").bright_yellow());
    for model in models {
        println!("{}", format_model(model));
    }
}
