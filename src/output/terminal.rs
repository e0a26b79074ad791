// Colored terminal output for the `analyze` dry run and `status` command.

use colored::Colorize;

use crate::db::models::CursorSummary;
use crate::models::AnalysisResult;

/// Print the selections and the thread that would be posted.
pub fn display_analysis(handle: &str, post_count: usize, result: &AnalysisResult, thread: &[String]) {
    println!(
        "\n{}",
        format!("=== Engagement report for @{handle} ({post_count} posts) ===").bold()
    );
    println!();

    let rows = [
        ("Top recent", &result.top_recent),
        ("Top all-time", &result.top_all_time),
        ("Most ratioed", &result.most_controversial),
    ];
    for (label, post) in rows {
        match post {
            Some(p) => println!(
                "  {:<14} {:>6} engagement  {:>5.1} ratio  {}",
                label,
                p.engagement(),
                p.controversy(),
                p.uri.dimmed()
            ),
            None => println!("  {:<14} {}", label, "none".dimmed()),
        }
    }

    println!("\n{}", "Thread preview (not posted):".bold());
    for (i, segment) in thread.iter().enumerate() {
        println!(
            "{}",
            format!("--- Post {} ({} chars) ---", i + 1, segment.chars().count()).dimmed()
        );
        println!("{segment}");
        println!();
    }
}

/// Print the persisted cursor.
pub fn display_cursor(summary: &CursorSummary) {
    match &summary.watermark {
        Some(ts) => println!("Watermark: {ts}"),
        None => println!("Watermark: {}", "not set (bot has never run)".yellow()),
    }
    println!("Handled notifications tracked: {}", summary.handled);
    if summary.pending_retries == 0 {
        println!("Pending retries: none");
    } else {
        println!(
            "Pending retries: {}",
            summary.pending_retries.to_string().yellow()
        );
    }
    match &summary.last_poll_at {
        Some(ts) => println!("Last successful poll: {ts}"),
        None => println!("Last successful poll: never"),
    }
}
