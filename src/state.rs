//! Per-project metadata state and its schema-phase transitions.
//!
//! A [`ProjectMetadataState`] is only ever changed through the transition
//! methods here and in [`crate::sequencer`]. Each load cycle carries an epoch;
//! completions from an earlier cycle are rejected so a reset state never mixes
//! stale and fresh data.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    data::Row,
    error::SchemaError,
    fields::{Field, MergeAlgorithm, View, ViewField},
    loading::{LoadingState, MetadataLoadingState},
    maps::SupportedMap,
    schema_loader::ProjectSchema,
};

/// Identifies one load cycle of one project.
pub type Epoch = u64;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectMetadataState {
    pub(crate) project_abbrev: String,
    pub(crate) loading_state: MetadataLoadingState,
    pub(crate) merge_algorithm: Option<MergeAlgorithm>,
    pub(crate) project_fields: Option<Vec<Field>>,
    pub(crate) fields: Option<Vec<ViewField>>,
    pub(crate) views: BTreeMap<usize, View>,
    pub(crate) view_loading_states: BTreeMap<usize, LoadingState>,
    pub(crate) view_to_fetch: usize,
    pub(crate) metadata: Option<Vec<Row>>,
    pub(crate) field_loading_states: BTreeMap<String, LoadingState>,
    pub(crate) field_unique_values: BTreeMap<String, Option<Vec<String>>>,
    pub(crate) empty_columns: Vec<String>,
    pub(crate) supported_maps: Vec<SupportedMap>,
    pub(crate) error_message: Option<String>,
    pub(crate) epoch: Epoch,
}

impl ProjectMetadataState {
    pub fn new(project_abbrev: impl Into<String>) -> Self {
        Self::with_epoch(project_abbrev, 0)
    }

    fn with_epoch(project_abbrev: impl Into<String>, epoch: Epoch) -> Self {
        Self {
            project_abbrev: project_abbrev.into(),
            loading_state: MetadataLoadingState::Idle,
            merge_algorithm: None,
            project_fields: None,
            fields: None,
            views: BTreeMap::new(),
            view_loading_states: BTreeMap::new(),
            view_to_fetch: 0,
            metadata: None,
            field_loading_states: BTreeMap::new(),
            field_unique_values: BTreeMap::new(),
            empty_columns: Vec::new(),
            supported_maps: Vec::new(),
            error_message: None,
            epoch,
        }
    }

    pub fn project_abbrev(&self) -> &str {
        &self.project_abbrev
    }

    pub fn loading_state(&self) -> MetadataLoadingState {
        self.loading_state
    }

    pub fn merge_algorithm(&self) -> Option<&MergeAlgorithm> {
        self.merge_algorithm.as_ref()
    }

    pub fn project_fields(&self) -> Option<&[Field]> {
        self.project_fields.as_deref()
    }

    pub fn fields(&self) -> Option<&[ViewField]> {
        self.fields.as_deref()
    }

    pub fn views(&self) -> &BTreeMap<usize, View> {
        &self.views
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    pub fn view_loading_states(&self) -> &BTreeMap<usize, LoadingState> {
        &self.view_loading_states
    }

    pub fn view_to_fetch(&self) -> usize {
        self.view_to_fetch
    }

    pub fn metadata(&self) -> Option<&[Row]> {
        self.metadata.as_deref()
    }

    pub fn field_loading_states(&self) -> &BTreeMap<String, LoadingState> {
        &self.field_loading_states
    }

    pub fn field_loading_state(&self, column: &str) -> Option<LoadingState> {
        self.field_loading_states.get(column).copied()
    }

    pub fn field_unique_values(&self) -> &BTreeMap<String, Option<Vec<String>>> {
        &self.field_unique_values
    }

    pub fn unique_values(&self, column: &str) -> Option<&[String]> {
        self.field_unique_values
            .get(column)
            .and_then(|values| values.as_deref())
    }

    pub fn empty_columns(&self) -> &[String] {
        &self.empty_columns
    }

    pub fn supported_maps(&self) -> &[SupportedMap] {
        &self.supported_maps
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Columns whose data is loaded, in schema order.
    pub fn loaded_columns(&self) -> Vec<&str> {
        self.fields
            .iter()
            .flatten()
            .map(|f| f.column_name.as_str())
            .filter(|c| self.field_loading_state(c) == Some(LoadingState::Success))
            .collect()
    }

    pub(crate) fn is_current(&self, epoch: Epoch) -> bool {
        if self.epoch != epoch {
            warn!(
                "Discarding stale completion for project '{}' (epoch {epoch}, current {})",
                self.project_abbrev, self.epoch
            );
            return false;
        }
        true
    }

    /// Accepts a load request when idle or failed. A failed state is first
    /// reset to its initial form. Returns whether the request was accepted.
    pub(crate) fn request_load(&mut self) -> bool {
        if !self.loading_state.accepts_load_request() {
            debug!(
                "Ignoring load request for '{}' in state {}",
                self.project_abbrev, self.loading_state
            );
            return false;
        }
        let next_epoch = self.epoch + 1;
        if self.loading_state != MetadataLoadingState::Idle {
            info!(
                "Resetting project '{}' after {} before reloading",
                self.project_abbrev, self.loading_state
            );
            *self = Self::with_epoch(self.project_abbrev.clone(), next_epoch);
        } else {
            self.epoch = next_epoch;
        }
        self.loading_state = MetadataLoadingState::FetchRequested;
        true
    }

    pub(crate) fn begin_schema_fetch(&mut self, epoch: Epoch) -> bool {
        if !self.is_current(epoch) || self.loading_state != MetadataLoadingState::FetchRequested {
            return false;
        }
        self.loading_state = MetadataLoadingState::AwaitingFields;
        true
    }

    pub(crate) fn apply_schema(&mut self, epoch: Epoch, schema: ProjectSchema) -> bool {
        if !self.is_current(epoch) || self.loading_state != MetadataLoadingState::AwaitingFields {
            return false;
        }
        let ProjectSchema {
            merge_algorithm,
            project_fields,
            fields,
            views,
        } = schema;

        self.field_unique_values.clear();
        self.field_loading_states.clear();
        for field in &fields {
            self.field_unique_values
                .insert(field.column_name.clone(), None);
            self.field_loading_states
                .insert(field.column_name.clone(), LoadingState::Idle);
        }
        self.views.clear();
        self.view_loading_states.clear();
        for (index, view) in views.into_iter().enumerate() {
            self.views.insert(index, view);
            self.view_loading_states.insert(index, LoadingState::Idle);
        }
        info!(
            "Project '{}' schema loaded: {} field(s), {} column(s), {} view(s), merge algorithm {}",
            self.project_abbrev,
            project_fields.len(),
            fields.len(),
            self.views.len(),
            merge_algorithm
        );
        self.merge_algorithm = Some(merge_algorithm);
        self.project_fields = Some(project_fields);
        self.fields = Some(fields);
        self.loading_state = MetadataLoadingState::FieldsLoaded;
        true
    }

    pub(crate) fn fail_schema(&mut self, epoch: Epoch, error: &SchemaError) -> bool {
        if !self.is_current(epoch) || self.loading_state != MetadataLoadingState::AwaitingFields {
            return false;
        }
        warn!("Project '{}': {error}", self.project_abbrev);
        self.error_message = Some(error.to_string());
        self.loading_state = MetadataLoadingState::Error;
        true
    }
}
