//! Loading state enums shared by the store, sequencer and orchestrator.
//!
//! [`LoadingState`] is the fine-grained status of a single view or physical
//! column. [`MetadataLoadingState`] is the coarse project-level phase of the
//! pipeline and is the value downstream consumers should trust.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingState {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

impl fmt::Display for LoadingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LoadingState::Idle => "idle",
            LoadingState::Loading => "loading",
            LoadingState::Success => "success",
            LoadingState::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataLoadingState {
    #[default]
    Idle,
    FetchRequested,
    AwaitingFields,
    FieldsLoaded,
    AwaitingData,
    PartialDataLoaded,
    DataLoaded,
    /// Failure with no usable data.
    Error,
    /// Failure after at least one view loaded; earlier data remains usable.
    PartialLoadError,
}

impl MetadataLoadingState {
    /// States from which a new load request is accepted.
    pub fn accepts_load_request(self) -> bool {
        matches!(
            self,
            MetadataLoadingState::Idle
                | MetadataLoadingState::Error
                | MetadataLoadingState::PartialLoadError
        )
    }

    /// True while no row data is usable yet.
    pub fn is_awaiting_data(self) -> bool {
        matches!(
            self,
            MetadataLoadingState::Idle
                | MetadataLoadingState::FetchRequested
                | MetadataLoadingState::AwaitingFields
                | MetadataLoadingState::FieldsLoaded
                | MetadataLoadingState::AwaitingData
        )
    }

    pub fn is_error(self) -> bool {
        matches!(
            self,
            MetadataLoadingState::Error | MetadataLoadingState::PartialLoadError
        )
    }

    pub fn has_data(self) -> bool {
        matches!(
            self,
            MetadataLoadingState::PartialDataLoaded
                | MetadataLoadingState::DataLoaded
                | MetadataLoadingState::PartialLoadError
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetadataLoadingState::Idle => "idle",
            MetadataLoadingState::FetchRequested => "fetch_requested",
            MetadataLoadingState::AwaitingFields => "awaiting_fields",
            MetadataLoadingState::FieldsLoaded => "fields_loaded",
            MetadataLoadingState::AwaitingData => "awaiting_data",
            MetadataLoadingState::PartialDataLoaded => "partial_data_loaded",
            MetadataLoadingState::DataLoaded => "data_loaded",
            MetadataLoadingState::Error => "error",
            MetadataLoadingState::PartialLoadError => "partial_load_error",
        }
    }
}

impl fmt::Display for MetadataLoadingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
