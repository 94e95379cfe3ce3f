//! Table output formatting for CLI commands
//!
//! Renders retrieved sources and index statistics with comfy-table.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use super::truncate;
use crate::domain::models::{RecordKind, ScoredRecord};
use crate::infrastructure::vector::IndexStats;

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<u16>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// Format ranked search hits as a table
    pub fn format_sources(&self, hits: &[ScoredRecord]) -> String {
        let mut table = self.create_base_table();

        table.set_header(vec![
            Cell::new("#").add_attribute(Attribute::Bold),
            Cell::new("Type").add_attribute(Attribute::Bold),
            Cell::new("Source").add_attribute(Attribute::Bold),
            Cell::new("Score").add_attribute(Attribute::Bold),
            Cell::new("Content").add_attribute(Attribute::Bold),
        ]);

        for (rank, hit) in hits.iter().enumerate() {
            let kind = hit.record.kind;
            let kind_cell = if self.use_colors {
                Cell::new(kind).fg(kind_color(kind))
            } else {
                Cell::new(kind)
            };

            table.add_row(vec![
                Cell::new(rank + 1),
                kind_cell,
                Cell::new(truncate(&hit.record.citation(), 48)),
                Cell::new(format!("{:.3}", hit.score)),
                Cell::new(truncate(&hit.record.content.replace('\n', " "), 80)),
            ]);
        }

        table.to_string()
    }

    /// Format index statistics as a two-column table
    pub fn format_stats(&self, index_path: &str, stats: &IndexStats, provider: &str) -> String {
        let mut table = self.create_base_table();

        table.set_header(vec![
            Cell::new("Property").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);

        let rows = [
            ("Index", index_path.to_string()),
            ("Provider", provider.to_string()),
            ("Dimension", stats.dimension.to_string()),
            ("Records", stats.count.to_string()),
            ("Text chunks", stats.text_records.to_string()),
            ("Images", stats.image_records.to_string()),
            ("Sources", stats.sources.to_string()),
        ];
        for (name, value) in rows {
            table.add_row(vec![Cell::new(name), Cell::new(value)]);
        }

        table.to_string()
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();

        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(width);
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if color output is supported
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }

    if let Ok(term) = env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    true
}

const fn kind_color(kind: RecordKind) -> Color {
    match kind {
        RecordKind::Text => Color::Cyan,
        RecordKind::Image => Color::Magenta,
    }
}
