//! View fetching and the view-phase transitions of [`ProjectMetadataState`].
//!
//! Views are fetched strictly one at a time in index order. Each successful
//! view is a column superset of the previous one, so its rows replace the
//! snapshot wholesale and every aggregate for its columns is recomputed.

use log::{debug, info, warn};

use crate::{
    aggregate::{calculate_unique_values, supported_maps_for},
    api::MetadataApi,
    data::Row,
    error::ApiResult,
    loading::{LoadingState, MetadataLoadingState},
    normalize::normalize_view,
    state::{Epoch, ProjectMetadataState},
};

pub async fn fetch_view_rows(
    api: &dyn MetadataApi,
    project: &str,
    view_id: i64,
    token: &str,
) -> ApiResult<Vec<Row>> {
    let rows = api.get_project_view_data(project, view_id, token).await?;
    debug!("View {view_id} of '{project}' returned {} row(s)", rows.len());
    Ok(rows)
}

impl ProjectMetadataState {
    /// Server id of the view at `index`, if the view may be dispatched now.
    pub(crate) fn dispatchable_view(&self, index: usize) -> Option<i64> {
        if index != self.view_to_fetch {
            return None;
        }
        if !matches!(
            self.loading_state,
            MetadataLoadingState::FieldsLoaded | MetadataLoadingState::PartialDataLoaded
        ) {
            return None;
        }
        if self.view_loading_states.get(&index) != Some(&LoadingState::Idle) {
            return None;
        }
        self.views.get(&index).map(|view| view.view_id)
    }

    /// Marks a view and its not-yet-loaded columns as loading.
    pub(crate) fn begin_view(&mut self, epoch: Epoch, index: usize) -> bool {
        if !self.is_current(epoch) {
            return false;
        }
        if self.dispatchable_view(index).is_none() {
            warn!(
                "Refusing to dispatch view {index} of '{}' (next is {}, state {})",
                self.project_abbrev, self.view_to_fetch, self.loading_state
            );
            return false;
        }
        let columns = self.views[&index].view_fields.clone();
        self.view_loading_states.insert(index, LoadingState::Loading);
        for column in columns {
            let entry = self
                .field_loading_states
                .entry(column)
                .or_insert(LoadingState::Idle);
            if *entry != LoadingState::Success {
                *entry = LoadingState::Loading;
            }
        }
        if index == 0 {
            self.loading_state = MetadataLoadingState::AwaitingData;
        }
        true
    }

    fn view_in_flight(&self, epoch: Epoch, index: usize) -> bool {
        if !self.is_current(epoch) {
            return false;
        }
        if self.view_loading_states.get(&index) != Some(&LoadingState::Loading) {
            warn!(
                "Ignoring completion for view {index} of '{}' which is not loading",
                self.project_abbrev
            );
            return false;
        }
        true
    }

    pub(crate) fn complete_view(&mut self, epoch: Epoch, index: usize, rows: Vec<Row>) -> bool {
        if !self.view_in_flight(epoch, index) {
            return false;
        }
        let columns = self.views[&index].view_fields.clone();
        let fields = self.fields.clone().unwrap_or_default();

        let normalized = normalize_view(rows, &columns, &fields);
        let unique_values = calculate_unique_values(&columns, &normalized.rows);
        for (column, values) in unique_values {
            self.field_unique_values.insert(column, Some(values));
        }
        self.supported_maps = supported_maps_for(&fields, &self.field_unique_values);
        self.empty_columns = normalized.empty_columns;
        let row_count = normalized.rows.len();
        self.metadata = Some(normalized.rows);

        self.view_loading_states.insert(index, LoadingState::Success);
        for column in columns {
            self.field_loading_states
                .insert(column, LoadingState::Success);
        }
        self.view_to_fetch = index + 1;
        self.loading_state = if index + 1 == self.views.len() {
            MetadataLoadingState::DataLoaded
        } else {
            MetadataLoadingState::PartialDataLoaded
        };
        info!(
            "Project '{}' view {}/{} loaded: {row_count} row(s), state {}",
            self.project_abbrev,
            index + 1,
            self.views.len(),
            self.loading_state
        );
        true
    }

    pub(crate) fn fail_view(&mut self, epoch: Epoch, index: usize, message: &str) -> bool {
        if !self.view_in_flight(epoch, index) {
            return false;
        }
        let columns = self.views[&index].view_fields.clone();
        self.view_loading_states.insert(index, LoadingState::Error);
        for column in columns {
            let entry = self
                .field_loading_states
                .entry(column)
                .or_insert(LoadingState::Idle);
            if *entry != LoadingState::Success {
                *entry = LoadingState::Error;
            }
        }
        self.view_to_fetch = index + 1;
        if index == 0 {
            self.loading_state = MetadataLoadingState::Error;
            self.error_message = Some(format!("Unable to load project data: {message}"));
        } else {
            self.loading_state = MetadataLoadingState::PartialLoadError;
            self.error_message = Some(format!(
                "Unable to complete loading project data: {message}"
            ));
        }
        warn!(
            "Project '{}' view {index} failed: {message}",
            self.project_abbrev
        );
        true
    }
}
