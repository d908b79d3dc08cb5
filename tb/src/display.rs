//! Terminal rendering of pipeline results

use colored::Colorize;

use crate::pipeline::{BreakdownOutcome, CoreError, ExtractedTask, total_minutes};

/// One checkbox line per task, then the summed time when every time is readable
pub fn print_tasks(tasks: &[ExtractedTask]) {
    for task in tasks {
        let time = if task.has_time() {
            task.time.bright_blue()
        } else {
            task.time.dimmed()
        };
        println!("[ ] {}. {} ({})", task.index, task.task.bold(), time);
    }
    if let Some(total) = total_minutes(tasks) {
        println!("{} {}", "Total:".bright_cyan(), total);
    }
}

/// Breakdown text followed by the checklist, or the raw breakdown when nothing was extracted
pub fn print_outcome(outcome: &BreakdownOutcome) {
    if outcome.is_degraded() {
        print_degraded(&outcome.breakdown, "no tasks could be extracted");
        return;
    }
    println!("{}", outcome.breakdown);
    println!();
    println!("{}", "Checklist:".bright_cyan().bold());
    print_tasks(&outcome.tasks);
    for warning in &outcome.warnings {
        println!("{} {}", "Warning:".yellow(), warning);
    }
}

pub fn print_degraded(breakdown: &str, reason: &str) {
    println!("{}", breakdown);
    eprintln!("{} {}", "Note:".yellow(), reason);
}

/// Short note for a failed request whose breakdown is still shown
pub fn degraded_reason(err: &CoreError) -> String {
    match err {
        CoreError::Decode { source, .. } => format!("could not extract tasks ({})", source),
        CoreError::Extraction { source, .. } => match source.retry_after() {
            Some(wait) => format!("task extraction failed ({}), try again in {}s", source, wait.as_secs()),
            None => format!("task extraction failed ({})", source),
        },
        other => other.to_string(),
    }
}
