//! Result printing for the table and JSON output formats.

use comfy_table::{
    modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table,
};
use serde::Serialize;

use crate::OutputFormat;

/// Prints `value` as pretty JSON, or `rows` as a two-column table.
pub fn emit<T: Serialize>(
    format: OutputFormat,
    value: &T,
    rows: &[(&str, String)],
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Table => println!("{}", render_table(rows)),
    }
    Ok(())
}

fn render_table(rows: &[(&str, String)]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Field", "Value"]);
    for (key, value) in rows {
        table.add_row(vec![*key, value.as_str()]);
    }
    table
}
