use chrono::{DateTime, Utc};
use colored::*;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::analysis::VariantGroup;
use crate::inventory::{format_bytes, AgeCategory, ModelRecord};
use crate::session::DeletionReport;
use crate::usage::format_last_used;

fn header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(label).fg(Color::Cyan).add_attribute(Attribute::Bold))
        .collect()
}

fn new_table(labels: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .set_header(header(labels))
        .load_preset(comfy_table::presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn age_color(age: AgeCategory) -> Color {
    match age {
        AgeCategory::Recent => Color::Green,
        AgeCategory::Moderate => Color::Yellow,
        AgeCategory::Old => Color::Red,
        AgeCategory::Unknown => Color::DarkGrey,
    }
}

/// Short markers for the boolean flags of a record.
pub fn flag_labels(record: &ModelRecord) -> String {
    let mut flags = Vec::new();
    if record.is_starred {
        flags.push("★");
    }
    if record.is_queued_for_deletion {
        flags.push("DEL");
    }
    if record.is_duplicate {
        flags.push("DUP");
    }
    if record.is_special_variant {
        flags.push("VAR");
    }
    if record.is_liberated {
        flags.push("LIB");
    }
    flags.join(" ")
}

/// Usage column text: chat count and last use, or "Never used".
pub fn usage_label(record: &ModelRecord, now: DateTime<Utc>) -> String {
    match &record.usage {
        Some(usage) if usage.count > 0 => format!(
            "{} chats, {}",
            usage.count,
            format_last_used(usage.last_used, now)
        ),
        _ => "Never used".to_string(),
    }
}

/// Builds the numbered model table. Numbers are 1-based positions in `records`.
pub fn models_table(records: &[&ModelRecord], now: DateTime<Utc>) -> Table {
    let mut table = new_table(&["#", "Name", "Size", "Modified", "Capabilities", "Flags", "Usage"]);

    for (i, record) in records.iter().enumerate() {
        let name_color = if record.is_queued_for_deletion {
            Color::Red
        } else if record.is_starred {
            Color::Yellow
        } else {
            Color::Green
        };

        table.add_row(vec![
            Cell::new(i + 1).fg(Color::White).set_alignment(CellAlignment::Center),
            Cell::new(&record.name).fg(name_color),
            Cell::new(&record.size).fg(Color::Blue).set_alignment(CellAlignment::Right),
            Cell::new(&record.modified).fg(age_color(record.age)),
            Cell::new(record.capability_labels()).fg(Color::Magenta),
            Cell::new(flag_labels(record)).fg(Color::Yellow).set_alignment(CellAlignment::Center),
            Cell::new(usage_label(record, now)).fg(Color::DarkGrey),
        ]);
    }
    table
}

pub fn print_models(records: &[&ModelRecord], total: usize, now: DateTime<Utc>) {
    if records.is_empty() {
        println!("{}", "No models match the current search and filter".yellow());
        return;
    }
    println!("\n{}", models_table(records, now));
    println!("{}", "=".repeat(100).bright_black());
    println!(
        "{}",
        format!("Showing {} of {} models", records.len(), total).bright_green()
    );
}

/// Families with their variants and duplicates.
pub fn families_table(groups: &[&VariantGroup]) -> Table {
    let mut table = new_table(&["Family", "Models", "Variants", "Duplicates"]);
    for group in groups {
        table.add_row(vec![
            Cell::new(&group.base_name).fg(Color::Green),
            Cell::new(group.total_count).set_alignment(CellAlignment::Center),
            Cell::new(group.special_variants.join("\n")).fg(Color::Magenta),
            Cell::new(group.regular_duplicates.join("\n")).fg(Color::Yellow),
        ]);
    }
    table
}

pub fn print_families(groups: &[&VariantGroup]) {
    if groups.is_empty() {
        println!("{}", "No model families with more than one member".yellow());
        return;
    }
    println!("\n{}", families_table(groups));
    println!("{}", format!("Families: {}", groups.len()).bright_green());
}

/// Open WebUI statistics for every model that has any.
pub fn usage_table(records: &[&ModelRecord], now: DateTime<Utc>) -> Table {
    let mut table = new_table(&["Name", "Chats", "Tokens", "First used", "Last used", "Stored as"]);
    for record in records {
        let Some(usage) = &record.usage else { continue };
        let first = usage
            .first_used_at()
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(&record.name).fg(Color::Green),
            Cell::new(usage.count).set_alignment(CellAlignment::Right),
            Cell::new(usage.total_tokens).set_alignment(CellAlignment::Right),
            Cell::new(first).fg(Color::DarkGrey),
            Cell::new(format_last_used(usage.last_used, now)),
            Cell::new(&usage.original_name).fg(Color::DarkGrey),
        ]);
    }
    table
}

pub fn print_storage(total_bytes: f64, model_count: usize, queued_bytes: f64, queued: usize) {
    println!(
        "{} {} across {} models",
        "Total storage:".cyan().bold(),
        format_bytes(total_bytes),
        model_count
    );
    if queued > 0 {
        println!(
            "{} {} from {} queued models",
            "Reclaimable:".cyan().bold(),
            format_bytes(queued_bytes),
            queued
        );
    }
}

pub fn print_deletion_report(report: &DeletionReport) {
    if !report.deleted.is_empty() {
        println!(
            "{}",
            format!("Deleted {} models: {}", report.deleted.len(), report.deleted.join(", ")).green()
        );
    }
    for (name, error) in &report.failed {
        println!("{}", format!("Failed to delete {}: {}", name, error).red());
    }
}

/// Spinner shown while the manager is working.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.into());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

pub fn print_status(message: &str) {
    println!("{}", message.bright_black());
}

pub fn print_success(message: &str) {
    println!("{}", message.green());
}

pub fn print_warning(message: &str) {
    println!("{}", message.yellow());
}

pub fn print_error(message: &str) {
    eprintln!("{}", message.red());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use crate::usage::UsageInfo;

    fn record(name: &str) -> ModelRecord {
        ModelRecord {
            name: name.to_string(),
            id: "abc".to_string(),
            size: "4.1 GB".to_string(),
            modified: "2 days ago".to_string(),
            capabilities: BTreeSet::new(),
            age: AgeCategory::Recent,
            is_starred: false,
            is_queued_for_deletion: false,
            is_liberated: false,
            is_duplicate: false,
            is_special_variant: false,
            variant_info: None,
            usage: None,
        }
    }

    #[test]
    fn test_flag_labels() {
        let mut r = record("llama3:8b");
        assert_eq!(flag_labels(&r), "");
        r.is_starred = true;
        r.is_duplicate = true;
        assert_eq!(flag_labels(&r), "★ DUP");
    }

    #[test]
    fn test_usage_label() {
        let now = Utc::now();
        let mut r = record("llama3:8b");
        assert_eq!(usage_label(&r, now), "Never used");
        r.usage = Some(UsageInfo {
            count: 3,
            last_used: Some((now - chrono::Duration::days(2)).timestamp()),
            first_used: None,
            total_tokens: 0,
            original_name: "llama3:8b".to_string(),
        });
        assert_eq!(usage_label(&r, now), "3 chats, 2 days ago");
    }

    #[test]
    fn test_models_table_rows() {
        let a = record("a:1");
        let b = record("b:1");
        let table = models_table(&[&a, &b], Utc::now());
        assert_eq!(table.row_iter().count(), 2);
        assert!(table.to_string().contains("b:1"));
    }
}
