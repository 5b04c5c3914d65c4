//! Plain-text table rendering for CLI output.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::{data::Row, state::ProjectMetadataState};

/// Cells wider than this are cut and suffixed with `...`.
const MAX_CELL_WIDTH: usize = 40;

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(&clip(cell)));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let rule = widths
        .iter()
        .map(|w| "-".repeat((*w).max(3)))
        .collect::<Vec<_>>();
    let rule_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &rule_widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

/// Headers and display cells for the loaded columns of a snapshot.
pub fn snapshot_table(
    state: &ProjectMetadataState,
    limit: Option<usize>,
) -> (Vec<String>, Vec<Vec<String>>) {
    let headers = state
        .loaded_columns()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let rows = state
        .metadata()
        .unwrap_or_default()
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|row| row_cells(row, &headers))
        .collect();
    (headers, rows)
}

pub fn row_cells(row: &Row, columns: &[String]) -> Vec<String> {
    columns
        .iter()
        .map(|column| row.get(column).map(|v| v.as_display()).unwrap_or_default())
        .collect()
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let cell = clip(&sanitize_cell(value)).into_owned();
            let padding = width.saturating_sub(display_width(&cell));
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}

fn clip(value: &str) -> Cow<'_, str> {
    if value.chars().count() <= MAX_CELL_WIDTH {
        return Cow::Borrowed(value);
    }
    let mut clipped = value.chars().take(MAX_CELL_WIDTH - 3).collect::<String>();
    clipped.push_str("...");
    Cow::Owned(clipped)
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
