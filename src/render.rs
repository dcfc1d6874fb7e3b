use crate::agent::extract::{Confidence, ScopingResult};
use crate::platform::types::Issue;

/// Print open issues as an aligned table.
pub fn issue_table(repo: &str, issues: &[Issue]) {
    println!("{repo} \u{2022} {} open issues\n", issues.len());

    if issues.is_empty() {
        return;
    }

    let rows: Vec<[String; 4]> = issues
        .iter()
        .map(|issue| {
            [
                format!("#{}", issue.number),
                issue.title.clone(),
                issue.labels.join(","),
                issue.url.clone(),
            ]
        })
        .collect();

    let headers = ["#", "title", "labels", "url"];
    let widths = column_widths(&headers, &rows);

    print_row(&headers.map(String::from), &widths);
    println!(
        "{}",
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  ")
    );
    for row in &rows {
        print_row(row, &widths);
    }
}

/// A horizontal rule with a title, separating stages of the flow.
pub fn rule(title: &str) {
    println!("\n\u{2500}\u{2500} {title} {}", "\u{2500}".repeat(40));
}

pub fn section(title: &str, body: &str) {
    rule(title);
    println!("{body}");
}

/// Present a scoping block: the agent's text verbatim, the parsed file list
/// when one was recovered, and the confidence summary line.
pub fn scoping_result(result: &ScopingResult) {
    tracing::debug!(
        has_current = result.current_behavior.is_some(),
        has_requested = result.requested_change.is_some(),
        has_tests = result.tests_needed.is_some(),
        files = result.files.len(),
        confidence = %result.confidence,
        "Parsed scoping fields"
    );

    println!("{}", result.raw.trim());

    if !result.files.is_empty() {
        println!("\nFiles to modify:");
        for file in &result.files {
            println!("  - {file}");
        }
    }

    let level = match result.confidence {
        Confidence::Unknown => "-".to_string(),
        level => level.to_string(),
    };
    match &result.rationale {
        Some(why) => println!("\nConfidence: {level} \u{2014} {why}"),
        None => println!("\nConfidence: {level}"),
    }
}

fn column_widths(headers: &[&str; 4], rows: &[[String; 4]]) -> [usize; 4] {
    let mut widths = headers.map(str::len);
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }
    widths
}

fn print_row(row: &[String; 4], widths: &[usize; 4]) {
    let cells: Vec<String> = row
        .iter()
        .zip(widths.iter())
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    println!("{}", cells.join("  ").trim_end());
}
