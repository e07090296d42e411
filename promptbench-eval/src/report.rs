//! Human-readable rendering of an [`EvaluationReport`].
//!
//! Everything here only reads the report.

use crate::results::EvaluationReport;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const RULE_WIDTH: usize = 50;
const TRANSCRIPT_TEXT_CHARS: usize = 100;

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// The framed score block.
pub fn render_score(report: &EvaluationReport) -> String {
    format!(
        "{rule}\n  FINAL SCORE: {} / {} CORRECT  ({:.2}%)\n{rule}",
        report.correct_count,
        report.total_count,
        report.score_percent,
        rule = rule()
    )
}

fn render_header(report: &EvaluationReport) -> String {
    format!(
        "Prompt: \"{}\"\nModel: {}\nMatch Method: {}\n",
        report.prompt, report.model_id, report.match_method
    )
}

/// Run header followed by the framed score.
pub fn render_summary(report: &EvaluationReport) -> String {
    let mut out = String::from("= Evaluation Results =\n");
    out.push_str(&render_header(report));
    out.push_str(&render_score(report));
    out.push('\n');
    if report.error_count > 0 {
        let _ = writeln!(
            out,
            "  ({} item(s) could not be evaluated and were marked ERROR)",
            report.error_count
        );
    }
    out
}

/// One `Song i:` block per item.
pub fn render_details(report: &EvaluationReport) -> String {
    let mut out = String::from("Detailed Results:\n");
    for item in &report.items {
        let _ = write!(
            out,
            "\nSong {}:\nExpected Genre: {}\nPredicted Genre: {}\nCorrect: {}\n",
            item.index + 1,
            item.expected_label,
            item.predicted_label,
            yes_no(item.is_correct)
        );
    }
    out
}

/// The text persisted by [`write_transcript`].
pub fn render_transcript(report: &EvaluationReport) -> String {
    let mut out = String::from("= Prompt Engineering Competition Results =\n");
    out.push_str(&render_header(report));
    out.push_str(&render_score(report));
    out.push_str("\n\nDetailed Results:\n");

    for item in &report.items {
        let _ = write!(
            out,
            "\nSong {}:\nLyrics: {}...\nExpected Genre: {}\nPredicted Genre: {}\nCorrect: {}\n",
            item.index + 1,
            truncate_chars(&item.original_text, TRANSCRIPT_TEXT_CHARS),
            item.expected_label,
            item.predicted_label,
            yes_no(item.is_correct)
        );
    }
    out
}

/// `prompt_results_<unix_secs>.txt`
pub fn transcript_file_name(unix_secs: u64) -> String {
    format!("prompt_results_{}.txt", unix_secs)
}

/// Write the transcript into `dir` and return the file path.
pub fn write_transcript(report: &EvaluationReport, dir: &Path) -> std::io::Result<PathBuf> {
    let unix_secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let path = dir.join(transcript_file_name(unix_secs));
    std::fs::write(&path, render_transcript(report))?;
    Ok(path)
}

/// Print the summary, and the per-item details when asked, to stdout.
pub fn print_report(report: &EvaluationReport, show_details: bool) {
    println!();
    print!("{}", render_summary(report));
    println!("Duration: {:.1}s", report.total_duration.as_secs_f64());
    if show_details {
        println!();
        print!("{}", render_details(report));
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

/// First `max_chars` characters of `text`.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
