//! Per-column aggregates derived from a project's current row snapshot.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;

use crate::{
    collate::sort_natural,
    data::{Row, Value},
    fields::ViewField,
    maps::{SupportedMap, calculate_supported_maps},
};

/// Distinct display values of each column across all rows, blank included,
/// in natural order. A row without the column contributes a blank.
pub fn calculate_unique_values(columns: &[String], rows: &[Row]) -> BTreeMap<String, Vec<String>> {
    let mut sets = columns
        .iter()
        .map(|column| (column.as_str(), BTreeSet::new()))
        .collect::<BTreeMap<_, _>>();
    for row in rows {
        for (column, set) in sets.iter_mut() {
            let value = row.get(*column).map(Value::as_display).unwrap_or_default();
            set.insert(value);
        }
    }
    sets.into_iter()
        .map(|(column, set)| {
            let mut values = set.into_iter().collect_vec();
            sort_natural(&mut values);
            (column.to_string(), values)
        })
        .collect()
}

/// Physical columns flagged as geographic.
pub fn geo_columns(fields: &[ViewField]) -> Vec<String> {
    fields
        .iter()
        .filter(|f| f.is_geo())
        .map(|f| f.column_name.clone())
        .unique()
        .collect()
}

/// Supported maps given whatever unique values are known so far.
pub fn supported_maps_for(
    fields: &[ViewField],
    unique_values: &BTreeMap<String, Option<Vec<String>>>,
) -> Vec<SupportedMap> {
    let known = unique_values
        .iter()
        .filter_map(|(column, values)| values.as_ref().map(|v| (column.clone(), v.clone())))
        .collect::<BTreeMap<_, _>>();
    calculate_supported_maps(&known, &geo_columns(fields))
}
