//! Field, view and project-detail models as served by the metadata API, and the
//! projection of logical fields onto physical view columns.

use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};

/// Sample identifier column used for the default row order.
pub const SAMPLE_ID_FIELD: &str = "Seq_ID";
/// Boolean-like column where a missing value means "no sequences".
pub const HAS_SEQUENCES_FIELD: &str = "Has_sequences";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    String,
    Number,
    Double,
    Boolean,
    Date,
    Categorical,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PrimitiveType::String => "string",
            PrimitiveType::Number => "number",
            PrimitiveType::Double => "double",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Date => "date",
            PrimitiveType::Categorical => "categorical",
            PrimitiveType::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldSource {
    #[default]
    Sample,
    Dataset,
    Both,
}

/// How a project combines sample-level and dataset-level values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MergeAlgorithm {
    /// Dataset fields get one column per analysis label.
    ShowAll,
    Override,
    Other(String),
}

impl MergeAlgorithm {
    pub fn as_str(&self) -> &str {
        match self {
            MergeAlgorithm::ShowAll => "show_all",
            MergeAlgorithm::Override => "override",
            MergeAlgorithm::Other(raw) => raw,
        }
    }
}

impl From<String> for MergeAlgorithm {
    fn from(raw: String) -> Self {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "show_all" | "showall" => MergeAlgorithm::ShowAll,
            "override" => MergeAlgorithm::Override,
            _ => MergeAlgorithm::Other(raw),
        }
    }
}

impl From<MergeAlgorithm> for String {
    fn from(value: MergeAlgorithm) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for MergeAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logical metadata column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub field_name: String,
    #[serde(default)]
    pub primitive_type: Option<PrimitiveType>,
    #[serde(default)]
    pub meta_data_column_type_name: Option<String>,
    #[serde(default)]
    pub field_source: FieldSource,
    #[serde(default)]
    pub column_order: i64,
    #[serde(default)]
    pub can_visualise: bool,
    #[serde(default, alias = "isGeoField")]
    pub geo_field: bool,
    #[serde(default)]
    pub meta_data_column_valid_values: Option<Vec<String>>,
    #[serde(default)]
    pub analysis_labels: Option<Vec<String>>,
}

impl Field {
    pub fn new(name: impl Into<String>, primitive_type: Option<PrimitiveType>) -> Self {
        Self {
            field_name: name.into(),
            primitive_type,
            meta_data_column_type_name: None,
            field_source: FieldSource::Sample,
            column_order: 0,
            can_visualise: false,
            geo_field: false,
            meta_data_column_valid_values: None,
            analysis_labels: None,
        }
    }

    pub fn is_date(&self) -> bool {
        self.primitive_type == Some(PrimitiveType::Date)
    }

    pub fn type_label(&self) -> String {
        match (&self.primitive_type, &self.meta_data_column_type_name) {
            (Some(primitive), _) => primitive.to_string(),
            (None, Some(type_name)) => type_name.clone(),
            (None, None) => "categorical".to_string(),
        }
    }
}

/// A [`Field`] projected onto one physical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewField {
    pub column_name: String,
    pub field: Field,
}

impl ViewField {
    pub fn is_date(&self) -> bool {
        self.field.is_date()
    }

    pub fn is_geo(&self) -> bool {
        self.field.geo_field
    }
}

/// A view definition as served by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    #[serde(alias = "datasetViewId")]
    pub id: i64,
    #[serde(default)]
    pub view_name: Option<String>,
    pub fields: Vec<String>,
}

/// A view after schema load: logical field names plus the physical columns
/// the server returns for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub view_id: i64,
    pub name: Option<String>,
    pub fields: Vec<String>,
    pub view_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetails {
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub abbreviation: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_merge_algorithm")]
    pub merge_algorithm: MergeAlgorithm,
}

fn default_merge_algorithm() -> MergeAlgorithm {
    MergeAlgorithm::Override
}

/// Physical column names for a field under the given merge algorithm.
pub fn view_column_names(field: &Field, merge_algorithm: &MergeAlgorithm) -> Vec<String> {
    if *merge_algorithm == MergeAlgorithm::ShowAll && field.field_source == FieldSource::Dataset {
        return field
            .analysis_labels
            .iter()
            .flatten()
            .map(|label| format!("{}_{}", field.field_name, label))
            .collect();
    }
    vec![field.field_name.clone()]
}

/// Orders fields by `columnOrder`, then case-insensitively by name.
pub fn sort_project_fields(fields: &mut [Field]) {
    fields.sort_by(compare_fields);
}

fn compare_fields(a: &Field, b: &Field) -> Ordering {
    a.column_order.cmp(&b.column_order).then_with(|| {
        a.field_name
            .to_lowercase()
            .cmp(&b.field_name.to_lowercase())
    })
}
