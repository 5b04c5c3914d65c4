//! Per-view row normalization.
//!
//! Every fetched view passes through [`normalize_view`] before it replaces the
//! project's snapshot. The steps run in a fixed order: `Has_sequences` repair,
//! null-to-blank replacement, empty-column detection, date parsing and the
//! default sample-id sort.

use log::debug;

use crate::{
    collate::natural_cmp,
    data::{Row, Value, parse_wire_date},
    fields::{HAS_SEQUENCES_FIELD, SAMPLE_ID_FIELD, ViewField},
};

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedView {
    pub rows: Vec<Row>,
    pub empty_columns: Vec<String>,
}

pub fn normalize_view(
    mut rows: Vec<Row>,
    view_columns: &[String],
    fields: &[ViewField],
) -> NormalizedView {
    if view_columns.iter().any(|c| c == HAS_SEQUENCES_FIELD) {
        replace_has_sequences_blanks_with_false(&mut rows);
    }
    replace_nulls_with_blank(&mut rows);
    let empty_columns = empty_string_columns(&rows, view_columns);
    parse_date_columns(&mut rows, fields, view_columns);
    sort_by_sample_id(&mut rows);
    NormalizedView {
        rows,
        empty_columns,
    }
}

pub fn replace_has_sequences_blanks_with_false(rows: &mut [Row]) {
    for row in rows {
        if let Some(value) = row.get_mut(HAS_SEQUENCES_FIELD)
            && (value.is_null() || value.is_blank())
        {
            *value = Value::Boolean(false);
        }
    }
}

pub fn replace_nulls_with_blank(rows: &mut [Row]) {
    for row in rows {
        replace_nulls_in_row(row);
    }
}

fn replace_nulls_in_row(row: &mut Row) {
    for value in row.values_mut() {
        replace_nulls_in_value(value);
    }
}

fn replace_nulls_in_value(value: &mut Value) {
    match value {
        Value::Null => *value = Value::blank(),
        Value::Object(inner) => replace_nulls_in_row(inner),
        Value::Array(items) => items.iter_mut().for_each(replace_nulls_in_value),
        _ => {}
    }
}

/// Columns whose value is blank in every row. A row missing the column does
/// not count as blank.
pub fn empty_string_columns(rows: &[Row], columns: &[String]) -> Vec<String> {
    if rows.is_empty() {
        return Vec::new();
    }
    columns
        .iter()
        .filter(|column| {
            rows.iter()
                .all(|row| row.get(column.as_str()).is_some_and(Value::is_blank))
        })
        .cloned()
        .collect()
}

/// Converts date-typed cells of the given view columns into [`Value::Date`].
pub fn parse_date_columns(rows: &mut [Row], fields: &[ViewField], view_columns: &[String]) {
    let date_columns = fields
        .iter()
        .filter(|f| f.is_date() && view_columns.contains(&f.column_name))
        .map(|f| f.column_name.as_str())
        .collect::<Vec<_>>();
    if date_columns.is_empty() {
        return;
    }
    let mut failures = 0usize;
    for row in rows.iter_mut() {
        for column in &date_columns {
            let parsed = match row.get(*column) {
                Some(Value::String(raw)) if !raw.is_empty() => parse_wire_date(raw),
                _ => continue,
            };
            match parsed {
                Ok(parsed) => {
                    row.insert(column.to_string(), Value::Date(parsed));
                }
                Err(err) => {
                    failures += 1;
                    debug!("Leaving date cell in column '{column}' unparsed: {err}");
                }
            }
        }
    }
    if failures > 0 {
        debug!(
            "{failures} date cell(s) across {} column(s) could not be parsed",
            date_columns.len()
        );
    }
}

/// Stable natural sort by the sample id column, when rows carry one.
pub fn sort_by_sample_id(rows: &mut [Row]) {
    let has_ids = rows
        .first()
        .is_some_and(|row| row.contains_key(SAMPLE_ID_FIELD));
    if !has_ids {
        return;
    }
    rows.sort_by(|a, b| natural_cmp(&sample_id(a), &sample_id(b)));
}

fn sample_id(row: &Row) -> String {
    row.get(SAMPLE_ID_FIELD)
        .map(Value::as_display)
        .unwrap_or_default()
}
