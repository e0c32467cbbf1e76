//! Shared output helpers for CLI commands

use chrono::{DateTime, Utc};
use kbpick_core::{Resource, ResourceStatus};
use kbpick_state::{Notice, NoticeLevel};
use kbpick_sync::{Outcome, PollFinish, PollReport};
use owo_colors::OwoColorize;

/// Status label padded and colored for a listing column
pub fn status_cell(status: ResourceStatus) -> String {
    let label = format!("{:<13}", status.label());
    match status {
        ResourceStatus::Indexed => label.green().to_string(),
        ResourceStatus::Pending | ResourceStatus::Processing => label.yellow().to_string(),
        ResourceStatus::Error => label.red().to_string(),
        ResourceStatus::NotIndexed => label.dimmed().to_string(),
    }
}

/// Format timestamp as absolute time ("2024-01-03 14:30")
pub fn format_timestamp(ts: Option<&DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => ts.format("%Y-%m-%d %H:%M").to_string(),
        None => "-".to_string(),
    }
}

/// Print one resource per line: status, name, modification time
pub fn print_resources(resources: &[Resource], statuses_loaded: bool) {
    if resources.is_empty() {
        println!("{}", "(empty folder)".dimmed());
        return;
    }

    for resource in resources {
        let name = if resource.is_directory() {
            format!("{}/", resource.name).blue().bold().to_string()
        } else {
            resource.name.clone()
        };
        let status = if statuses_loaded {
            status_cell(resource.status)
        } else {
            format!("{:<13}", "…").dimmed().to_string()
        };
        println!(
            "  {} {:<40} {}",
            status,
            name,
            format_timestamp(resource.modified_at.as_ref()).dimmed()
        );
    }
}

pub fn print_notice(notice: &Notice) {
    match notice.level {
        NoticeLevel::Info => println!("{} {}", "•".cyan(), notice.message),
        NoticeLevel::Success => println!("{} {}", "✓".green(), notice.message),
        NoticeLevel::Error => eprintln!("{} {}", "✗".red(), notice.message),
    }
}

pub fn print_outcome(outcome: &Outcome) {
    if outcome.is_success() {
        println!("{} {}", "✓".green(), outcome.message());
    } else {
        eprintln!("{} {}", "✗".red(), outcome.message().red());
    }
    println!("  {}", format!("mutation {}", outcome.mutation_id).dimmed());
}

pub fn print_poll_report(report: &PollReport) {
    let attempts = format!("after {} attempt(s)", report.attempts);
    match report.finish {
        PollFinish::Converged => println!("{} Indexing visible {}", "✓".green(), attempts.dimmed()),
        PollFinish::Exhausted => println!(
            "{} Gave up waiting for indexing {}",
            "!".yellow(),
            attempts.dimmed()
        ),
        PollFinish::Cancelled => println!("{} Poll cancelled {}", "!".yellow(), attempts.dimmed()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 14, 15, 45, 0).unwrap();
        assert_eq!(format_timestamp(Some(&ts)), "2024-01-14 15:45");
        assert_eq!(format_timestamp(None), "-");
    }

    #[test]
    fn test_status_cell_uses_display_label() {
        assert!(status_cell(ResourceStatus::Pending).contains("Processing"));
        assert!(status_cell(ResourceStatus::NotIndexed).contains("Not indexed"));
    }
}
