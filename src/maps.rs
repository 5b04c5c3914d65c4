//! Map background eligibility from geographic column values.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MapKey {
    AusNz,
    Malaysia,
    World,
}

impl MapKey {
    pub fn as_str(self) -> &'static str {
        match self {
            MapKey::AusNz => "AUS_NZ",
            MapKey::Malaysia => "MALAYSIA",
            MapKey::World => "WORLD",
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A usable map and whether its regional (subdivision) view applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedMap {
    pub map: MapKey,
    pub regional: bool,
}

impl SupportedMap {
    pub fn new(map: MapKey, regional: bool) -> Self {
        Self { map, regional }
    }
}

/// Regional maps in the order they are offered, with the country codes
/// (ISO 3166 alpha-2 and alpha-3) each one covers.
const REGIONAL_MAPS: &[(MapKey, &[&str])] = &[
    (MapKey::AusNz, &["AU", "NZ", "AUS", "NZL"]),
    (MapKey::Malaysia, &["MY", "MYS"]),
];

/// Reduces a geographic value to an upper-case country code.
///
/// `AU-NSW` style subdivisions yield their two-letter prefix, bare two- or
/// three-letter alphabetic codes yield themselves, anything else is `None`.
pub fn country_code(value: &str) -> Option<String> {
    let trimmed = value.trim().to_ascii_uppercase();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains('-') {
        let prefix = trimmed.get(..2)?;
        return prefix
            .chars()
            .all(|c| c.is_ascii_alphabetic())
            .then(|| prefix.to_string());
    }
    let is_code = matches!(trimmed.len(), 2 | 3) && trimmed.chars().all(|c| c.is_ascii_alphabetic());
    is_code.then_some(trimmed)
}

fn is_subdivision(value: &str) -> bool {
    value.trim().contains('-')
}

/// Determines the maps supported by the values of the given geo columns.
pub fn calculate_supported_maps(
    unique_values: &BTreeMap<String, Vec<String>>,
    geo_columns: &[String],
) -> Vec<SupportedMap> {
    let mut matched = REGIONAL_MAPS
        .iter()
        .map(|(key, _)| (*key, None::<bool>))
        .collect::<Vec<_>>();
    let mut has_top_level_country = false;

    let values = geo_columns
        .iter()
        .filter_map(|column| unique_values.get(column))
        .flatten();
    for value in values {
        let Some(code) = country_code(value) else {
            continue;
        };
        let subdivision = is_subdivision(value);
        if !subdivision {
            has_top_level_country = true;
        }
        for ((_, codes), (_, regional)) in REGIONAL_MAPS.iter().zip(matched.iter_mut()) {
            if codes.contains(&code.as_str()) {
                *regional = Some(regional.unwrap_or(false) || subdivision);
            }
        }
    }

    let mut supported = matched
        .into_iter()
        .filter_map(|(key, regional)| regional.map(|r| SupportedMap::new(key, r)))
        .collect::<Vec<_>>();
    if has_top_level_country {
        supported.push(SupportedMap::new(MapKey::World, false));
    }
    supported
}
