//! Table output formatting for CLI commands
//!
//! Renders technique states and the technique list using comfy-table.
//! Colors are dropped when the terminal does not support them.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};

use crate::domain::models::TechniqueState;

/// One row of the status table.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatusRow {
    pub id: String,
    pub name: String,
    pub platform: String,
    pub state: TechniqueState,
}

/// One row of the technique list.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TechniqueRow {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub platform: String,
    pub idempotent: bool,
    pub slow: bool,
    pub prerequisites: bool,
    pub revert: bool,
}

/// Table formatter for CLI output
pub struct TableFormatter {
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<usize>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: console::colors_enabled(),
            max_width: None,
        }
    }

    pub fn with_config(use_colors: bool, max_width: Option<usize>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    pub fn format_status(&self, rows: &[StatusRow]) -> String {
        let mut table = self.create_base_table();

        table.set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Platform").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
        ]);

        for row in rows {
            let state_cell = if self.use_colors {
                Cell::new(row.state.as_str()).fg(state_color(row.state))
            } else {
                Cell::new(row.state.as_str())
            };

            table.add_row(vec![
                Cell::new(&row.id),
                Cell::new(truncate_text(&row.name, 50)),
                Cell::new(&row.platform),
                state_cell,
            ]);
        }

        table.to_string()
    }

    pub fn format_techniques(&self, rows: &[TechniqueRow]) -> String {
        let mut table = self.create_base_table();

        table.set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Description").add_attribute(Attribute::Bold),
            Cell::new("Platform").add_attribute(Attribute::Bold),
            Cell::new("Idempotent").add_attribute(Attribute::Bold),
            Cell::new("Slow").add_attribute(Attribute::Bold),
            Cell::new("Prerequisites").add_attribute(Attribute::Bold),
            Cell::new("Revert").add_attribute(Attribute::Bold),
        ]);

        for row in rows {
            table.add_row(vec![
                Cell::new(&row.id),
                Cell::new(truncate_text(&row.name, 50)),
                Cell::new(&row.platform),
                Cell::new(yes_no(row.idempotent)),
                Cell::new(yes_no(row.slow)),
                Cell::new(yes_no(row.prerequisites)),
                Cell::new(yes_no(row.revert)),
            ]);
        }

        table.to_string()
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();

        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(u16::try_from(width).unwrap_or(u16::MAX));
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn state_color(state: TechniqueState) -> Color {
    match state {
        TechniqueState::Cold => Color::DarkGrey,
        TechniqueState::Warm => Color::Yellow,
        TechniqueState::Detonated => Color::Red,
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
