//! Colored terminal rendering for matchcal results.

use matchcal_core::{EventCandidate, ReconcileError, ReconciliationResult};
use owo_colors::OwoColorize;

pub trait Render {
    fn render(&self) -> String;
}

impl Render for EventCandidate {
    fn render(&self) -> String {
        let mut when = self.start_local.clone();
        if let Some(end) = self.end_local.as_deref().filter(|e| !e.trim().is_empty()) {
            when = format!("{when} - {end}");
        }

        let mut line = format!("{} {} {}", "+".green(), self.title, when.dimmed());
        if let Some(league) = &self.league {
            line = format!("{line} {}", format!("[{league}]").dimmed());
        }
        line
    }
}

impl Render for ReconcileError {
    fn render(&self) -> String {
        format!("{} {}: {}", "!".red(), self.candidate_title, self.message.red())
    }
}

impl Render for ReconciliationResult {
    fn render(&self) -> String {
        let mut lines: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("   {}", e.render()))
            .collect();

        if !lines.is_empty() {
            lines.push(String::new());
        }

        let summary = format!(
            "{} created, {} deleted",
            self.inserted.green(),
            self.deleted.yellow()
        );
        if self.has_errors() {
            lines.push(format!(
                "{summary}, {} {}",
                self.errors.len().red(),
                pluralize("error", self.errors.len()).red()
            ));
        } else {
            lines.push(summary);
        }

        lines.join("\n")
    }
}

fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}
