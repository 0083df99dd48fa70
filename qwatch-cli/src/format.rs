//! Terminal output for wait results

use colored::*;
use qwatch_core::domain::poll::{PollerState, WaitOutcome};
use qwatch_runner::WatchSummary;

/// Prints one line per outcome, with the failure reason underneath
pub fn print_outcome(outcome: &WaitOutcome) {
    let label = match &outcome.state {
        PollerState::Succeeded => "SUCCEEDED".green(),
        PollerState::Failed { .. } => "FAILED".red(),
        PollerState::TimedOut { .. } => "TIMED OUT".yellow(),
        PollerState::Pending | PollerState::Running => "UNRESOLVED".yellow(),
    };

    println!(
        "{} {} {}",
        outcome.handle.to_string().bold(),
        label,
        format!(
            "({} poll(s), {})",
            outcome.polls,
            format_duration(outcome.elapsed.as_secs())
        )
        .dimmed()
    );

    if let PollerState::Failed { reason } = &outcome.state {
        println!("  {}", reason);
    }
}

pub fn print_summary(summary: &WatchSummary) {
    println!();
    println!(
        "{}",
        format!(
            "{} succeeded, {} failed, {} timed out",
            summary.succeeded, summary.failed, summary.timed_out
        )
        .bold()
    );
}

/// Formats seconds as e.g. `2d 3h 4m 5s`
fn format_duration(secs: u64) -> String {
    let (days, rest) = (secs / 86_400, secs % 86_400);
    let (hours, rest) = (rest / 3_600, rest % 3_600);
    let (minutes, seconds) = (rest / 60, rest % 60);

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{}s", seconds));
    }
    parts.join(" ")
}
