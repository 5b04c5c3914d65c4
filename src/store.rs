//! The project metadata store and its read-only selectors.

use std::collections::{BTreeMap, HashMap};

use log::info;

use crate::{
    fields::ViewField,
    loading::MetadataLoadingState,
    state::ProjectMetadataState,
};

#[derive(Debug, Default)]
pub struct ProjectMetadataStore {
    projects: HashMap<String, ProjectMetadataState>,
    /// Bearer token from the most recent accepted request.
    token: Option<String>,
}

/// Field catalogue, unique values and loading state for one project.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectFieldsView<'a> {
    pub fields: Option<&'a [ViewField]>,
    pub field_unique_values: Option<&'a BTreeMap<String, Option<Vec<String>>>>,
    pub loading_state: MetadataLoadingState,
}

impl ProjectMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a load request, creating the project's entry on first use.
    /// Returns `false` when the project is busy and the request is ignored.
    pub fn request_load(&mut self, project: &str, token: &str) -> bool {
        let state = self
            .projects
            .entry(project.to_string())
            .or_insert_with(|| ProjectMetadataState::new(project));
        if !state.request_load() {
            return false;
        }
        info!("Load requested for project '{project}' (epoch {})", state.epoch());
        self.token = Some(token.to_string());
        true
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub(crate) fn state_mut(&mut self, project: &str) -> Option<&mut ProjectMetadataState> {
        self.projects.get_mut(project)
    }

    pub fn projects(&self) -> impl Iterator<Item = &ProjectMetadataState> {
        self.projects.values()
    }

    pub fn project_metadata(&self, project: &str) -> Option<&ProjectMetadataState> {
        self.projects.get(project)
    }

    pub fn loading_state(&self, project: &str) -> MetadataLoadingState {
        self.projects
            .get(project)
            .map(ProjectMetadataState::loading_state)
            .unwrap_or_default()
    }

    pub fn project_metadata_fields(&self, project: &str) -> ProjectFieldsView<'_> {
        match self.projects.get(project) {
            Some(state) => ProjectFieldsView {
                fields: state.fields(),
                field_unique_values: Some(state.field_unique_values()),
                loading_state: state.loading_state(),
            },
            None => ProjectFieldsView {
                fields: None,
                field_unique_values: None,
                loading_state: MetadataLoadingState::Idle,
            },
        }
    }

    pub fn project_metadata_error(&self, project: &str) -> Option<&str> {
        self.projects
            .get(project)
            .and_then(ProjectMetadataState::error_message)
    }

    /// True until some data is usable (or the load failed).
    pub fn awaiting_project_metadata(&self, project: &str) -> bool {
        self.loading_state(project).is_awaiting_data()
    }

    pub fn merge_algorithm(&self, project: &str) -> Option<&str> {
        self.projects
            .get(project)
            .and_then(ProjectMetadataState::merge_algorithm)
            .map(|m| m.as_str())
    }
}
