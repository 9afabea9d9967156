use std::fmt::Display;

use clap::ValueEnum;
use comfy_table::{presets, Cell, Table};
use owo_colors::OwoColorize;
use serde::Serialize;

use reelmark_api::tmdb::types::CatalogItem;
use reelmark_core::library::{Bucket, BucketCounts};
use reelmark_core::models::WatchlistEntry;
use reelmark_core::progress::{self, WatchState};
use reelmark_runtime::{Notice, NoticeKind};

pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    #[value(name = "json-pretty")]
    JsonPretty,
}

pub struct Output {
    format: OutputFormat,
    quiet: bool,
}

impl Output {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }

    pub fn is_human(&self) -> bool {
        self.format == OutputFormat::Human
    }

    pub fn success(&self, msg: impl AsRef<str>) {
        if self.quiet {
            return;
        }
        match self.format {
            OutputFormat::Human => println!("{} {}", "✓".green(), msg.as_ref()),
            _ => self.print_json(&serde_json::json!({"type": "success", "message": msg.as_ref()})),
        }
    }

    /// Shown even in quiet mode.
    pub fn error(&self, msg: impl AsRef<str>) {
        match self.format {
            OutputFormat::Human => eprintln!("{} {}", "✗".red(), msg.as_ref()),
            _ => self.print_json(&serde_json::json!({"type": "error", "message": msg.as_ref()})),
        }
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        if self.quiet {
            return;
        }
        match self.format {
            OutputFormat::Human => println!("{} {}", "•".cyan(), msg.as_ref()),
            _ => self.print_json(&serde_json::json!({"type": "info", "message": msg.as_ref()})),
        }
    }

    /// Plain text in human mode; ignored in JSON mode.
    pub fn println(&self, msg: impl AsRef<str>) {
        if self.quiet || !self.is_human() {
            return;
        }
        println!("{}", msg.as_ref());
    }

    /// Structured value in JSON mode; ignored in human mode.
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) {
        if self.is_human() {
            return;
        }
        match serde_json::to_value(value) {
            Ok(json) => self.print_json(&json),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize output"),
        }
    }

    fn print_json(&self, data: &serde_json::Value) {
        let text = match self.format {
            OutputFormat::JsonPretty => serde_json::to_string_pretty(data),
            _ => serde_json::to_string(data),
        };
        println!("{}", text.unwrap_or_default());
    }

    pub fn notices(&self, notices: Vec<Notice>) {
        for notice in notices {
            match notice.kind {
                NoticeKind::Success => self.success(&notice.message),
                NoticeKind::Error => self.error(&notice.message),
                NoticeKind::Info => self.info(&notice.message),
            }
        }
    }
}

// ── Formatting ──────────────────────────────────────────────────

pub fn or_na<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string())
}

pub fn rating(vote_average: Option<f32>) -> String {
    match vote_average {
        Some(v) if v > 0.0 => format!("{v:.1}"),
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// First `max` characters of `text`, with an ellipsis if cut.
pub fn truncate(text: &str, max: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}…", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

/// Filter tabs with counts; the active tab is bracketed.
pub fn tabs(counts: &BucketCounts, active: Bucket) -> String {
    Bucket::ALL
        .iter()
        .map(|&b| {
            let label = format!("{} ({})", b.as_str(), counts.get(b));
            if b == active {
                format!("[{label}]")
            } else {
                label
            }
        })
        .collect::<Vec<_>>()
        .join("  ")
}

/// "Seen"/"Not seen" for movies, "seen/total" for TV.
pub fn entry_progress(entry: &WatchlistEntry) -> String {
    if entry.is_movie() {
        return if entry.is_seen { "Seen" } else { "Not seen" }.to_string();
    }
    progress::progress(entry).to_string()
}

fn state_cell(state: WatchState) -> Cell {
    let cell = Cell::new(state.as_str());
    match state {
        WatchState::Watched => cell.fg(comfy_table::Color::Green),
        WatchState::Watching => cell.fg(comfy_table::Color::Yellow),
        WatchState::Planned => cell,
    }
}

pub fn entry_table(entries: &[WatchlistEntry]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_header(vec!["ID", "Title", "Type", "Released", "Rating", "Progress", "State"]);
    for entry in entries {
        table.add_row(vec![
            Cell::new(&entry.id),
            Cell::new(entry.display_title().unwrap_or(NOT_AVAILABLE)),
            Cell::new(entry.media_type.as_str()),
            Cell::new(or_na(entry.snapshot.release_date(entry.media_type))),
            Cell::new(rating(entry.snapshot.vote_average)),
            Cell::new(entry_progress(entry)),
            state_cell(progress::watch_state(entry)),
        ]);
    }
    table
}

pub fn catalog_table(items: &[CatalogItem]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_header(vec!["TMDB ID", "Type", "Title", "Year", "Rating"]);
    for item in items {
        let kind = item.media_type.map_or(NOT_AVAILABLE, |k| k.as_str());
        table.add_row(vec![
            Cell::new(item.id),
            Cell::new(kind),
            Cell::new(item.display_title()),
            Cell::new(or_na(item.year())),
            Cell::new(rating(item.vote_average)),
        ]);
    }
    table
}
