//! Request orchestration.
//!
//! [`next_command`] is the single place that decides what to fetch next: it
//! maps a completion [`Signal`] plus the current store contents to at most one
//! [`Command`]. [`MetadataEngine`] owns the store, runs commands as spawned
//! tasks and feeds their completions back, one at a time, over a channel.

use std::sync::Arc;

use log::{debug, warn};
use tokio::{
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
    task::JoinError,
};

use crate::{
    api::MetadataApi,
    data::Row,
    error::{ApiError, ApiResult, SchemaAspect, SchemaError},
    loading::MetadataLoadingState,
    schema_loader::{ProjectSchema, load_schema},
    sequencer::fetch_view_rows,
    state::Epoch,
    store::ProjectMetadataStore,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    LoadRequested { project: String },
    SchemaCompleted { project: String },
    ViewCompleted { project: String, index: usize },
}

impl Signal {
    pub fn project(&self) -> &str {
        match self {
            Signal::LoadRequested { project }
            | Signal::SchemaCompleted { project }
            | Signal::ViewCompleted { project, .. } => project,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    FetchSchema {
        project: String,
        epoch: Epoch,
    },
    FetchView {
        project: String,
        epoch: Epoch,
        index: usize,
        view_id: i64,
    },
}

pub fn next_command(store: &ProjectMetadataStore, signal: &Signal) -> Option<Command> {
    let project = signal.project();
    let state = store.project_metadata(project)?;
    match signal {
        Signal::LoadRequested { .. } => (state.loading_state()
            == MetadataLoadingState::FetchRequested)
            .then(|| Command::FetchSchema {
                project: project.to_string(),
                epoch: state.epoch(),
            }),
        Signal::SchemaCompleted { .. } | Signal::ViewCompleted { .. } => {
            if state.loading_state().is_error() {
                return None;
            }
            let index = state.view_to_fetch();
            let view_id = state.dispatchable_view(index)?;
            Some(Command::FetchView {
                project: project.to_string(),
                epoch: state.epoch(),
                index,
                view_id,
            })
        }
    }
}

/// A fetch task that panicked or was cancelled still completes, as a failure.
fn task_failure(project: &str, err: JoinError) -> ApiError {
    warn!("Fetch task for '{project}' did not finish: {err}");
    ApiError::Transport(err.to_string())
}

#[derive(Debug)]
enum Completion {
    Schema {
        project: String,
        epoch: Epoch,
        result: Result<ProjectSchema, SchemaError>,
    },
    View {
        project: String,
        epoch: Epoch,
        index: usize,
        result: ApiResult<Vec<Row>>,
    },
}

#[derive(Debug)]
pub struct MetadataEngine {
    api: Arc<dyn MetadataApi>,
    store: ProjectMetadataStore,
    completions_tx: UnboundedSender<Completion>,
    completions_rx: UnboundedReceiver<Completion>,
    in_flight: usize,
}

impl MetadataEngine {
    pub fn new(api: Arc<dyn MetadataApi>) -> Self {
        let (completions_tx, completions_rx) = unbounded_channel();
        Self {
            api,
            store: ProjectMetadataStore::new(),
            completions_tx,
            completions_rx,
            in_flight: 0,
        }
    }

    pub fn store(&self) -> &ProjectMetadataStore {
        &self.store
    }

    /// Number of fetches dispatched whose completion has not been processed.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Requests a (re)load of a project. The schema fetch is dispatched before
    /// this returns. Returns `false` when the project was busy.
    ///
    /// Must be called from within a tokio runtime.
    pub fn request_load(&mut self, project: &str, token: &str) -> bool {
        if !self.store.request_load(project, token) {
            return false;
        }
        self.react(&Signal::LoadRequested {
            project: project.to_string(),
        });
        true
    }

    /// Waits for one completion, applies it and dispatches whatever follows.
    /// Returns the resulting signal, or `None` when nothing is in flight or the
    /// completion belonged to a superseded load cycle.
    pub async fn process_next(&mut self) -> Option<Signal> {
        if self.in_flight == 0 {
            return None;
        }
        let completion = self.completions_rx.recv().await?;
        self.in_flight -= 1;
        let signal = self.apply(completion)?;
        self.react(&signal);
        Some(signal)
    }

    pub async fn run_until_idle(&mut self) {
        while self.in_flight > 0 {
            self.process_next().await;
        }
    }

    /// Requests a load and drives every project until no fetch is in flight.
    pub async fn load(&mut self, project: &str, token: &str) -> MetadataLoadingState {
        self.request_load(project, token);
        self.run_until_idle().await;
        self.store.loading_state(project)
    }

    fn react(&mut self, signal: &Signal) {
        if let Some(command) = next_command(&self.store, signal) {
            self.dispatch(command);
        }
    }

    fn dispatch(&mut self, command: Command) {
        let token = self.store.token().unwrap_or_default().to_string();
        let api = Arc::clone(&self.api);
        let tx = self.completions_tx.clone();
        match command {
            Command::FetchSchema { project, epoch } => {
                let Some(state) = self.store.state_mut(&project) else {
                    return;
                };
                if !state.begin_schema_fetch(epoch) {
                    return;
                }
                debug!("Dispatching schema fetch for '{project}' (epoch {epoch})");
                self.in_flight += 1;
                let fetch = {
                    let project = project.clone();
                    tokio::spawn(async move { load_schema(api.as_ref(), &project, &token).await })
                };
                tokio::spawn(async move {
                    let result = fetch.await.unwrap_or_else(|err| {
                        Err(SchemaError::new(SchemaAspect::Schema, task_failure(&project, err)))
                    });
                    let _ = tx.send(Completion::Schema {
                        project,
                        epoch,
                        result,
                    });
                });
            }
            Command::FetchView {
                project,
                epoch,
                index,
                view_id,
            } => {
                let Some(state) = self.store.state_mut(&project) else {
                    return;
                };
                if !state.begin_view(epoch, index) {
                    return;
                }
                debug!("Dispatching view {index} (id {view_id}) for '{project}' (epoch {epoch})");
                self.in_flight += 1;
                let fetch = {
                    let project = project.clone();
                    tokio::spawn(
                        async move { fetch_view_rows(api.as_ref(), &project, view_id, &token).await },
                    )
                };
                tokio::spawn(async move {
                    let result = fetch
                        .await
                        .unwrap_or_else(|err| Err(task_failure(&project, err)));
                    let _ = tx.send(Completion::View {
                        project,
                        epoch,
                        index,
                        result,
                    });
                });
            }
        }
    }

    fn apply(&mut self, completion: Completion) -> Option<Signal> {
        match completion {
            Completion::Schema {
                project,
                epoch,
                result,
            } => {
                let state = self.store.state_mut(&project)?;
                let applied = match result {
                    Ok(schema) => state.apply_schema(epoch, schema),
                    Err(err) => state.fail_schema(epoch, &err),
                };
                applied.then_some(Signal::SchemaCompleted { project })
            }
            Completion::View {
                project,
                epoch,
                index,
                result,
            } => {
                let state = self.store.state_mut(&project)?;
                let applied = match result {
                    Ok(rows) => state.complete_view(epoch, index, rows),
                    Err(err) => state.fail_view(epoch, index, &err.to_string()),
                };
                applied.then_some(Signal::ViewCompleted { project, index })
            }
        }
    }
}
