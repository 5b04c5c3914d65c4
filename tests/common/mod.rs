#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cohort_metadata::{
    api::MetadataApi,
    data::Row,
    error::{ApiError, ApiResult},
    fields::{Field, MergeAlgorithm, ProjectDetails, ProjectView},
};
use tempfile::{TempDir, tempdir};

pub const PROJECT: &str = "PRJ";
pub const TOKEN: &str = "test-token";

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

pub fn read_fixture<T: serde::de::DeserializeOwned>(name: &str) -> T {
    let raw = fs::read_to_string(fixture_path(name)).expect("read fixture");
    serde_json::from_str(&raw).expect("parse fixture")
}

/// One collaborator call as seen by [`FakeApi`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Call {
    Fields,
    Views,
    Details,
    ViewData(i64),
}

/// In-memory metadata API. Records every call with the token it carried and
/// answers from canned payloads, or with a configured failure.
#[derive(Debug)]
pub struct FakeApi {
    fields: Vec<Field>,
    views: Vec<ProjectView>,
    merge_algorithm: MergeAlgorithm,
    view_rows: HashMap<i64, Vec<Row>>,
    failures: Mutex<HashMap<Call, ApiError>>,
    panics: Mutex<HashSet<Call>>,
    calls: Mutex<Vec<(Call, String)>>,
}

impl FakeApi {
    pub fn empty() -> Self {
        Self {
            fields: Vec::new(),
            views: Vec::new(),
            merge_algorithm: MergeAlgorithm::Override,
            view_rows: HashMap::new(),
            failures: Mutex::new(HashMap::new()),
            panics: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// The `PRJ` fixture project: two usable views (ids 20 then 30) and one
    /// view without fields.
    pub fn fixture() -> Self {
        Self {
            fields: read_fixture("prj_fields.json"),
            views: read_fixture("prj_views.json"),
            view_rows: HashMap::from([
                (20, read_fixture("prj_view_20.json")),
                (30, read_fixture("prj_view_30.json")),
            ]),
            ..Self::empty()
        }
    }

    pub fn with_fields(mut self, fields: Vec<Field>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_view(mut self, id: i64, fields: &[&str], rows: Vec<Row>) -> Self {
        self.views.push(ProjectView {
            id,
            view_name: None,
            fields: fields.iter().map(|f| f.to_string()).collect(),
        });
        self.view_rows.insert(id, rows);
        self
    }

    pub fn with_merge_algorithm(mut self, merge_algorithm: MergeAlgorithm) -> Self {
        self.merge_algorithm = merge_algorithm;
        self
    }

    pub fn failing(self, call: Call, error: ApiError) -> Self {
        self.fail(call, error);
        self
    }

    pub fn fail(&self, call: Call, error: ApiError) {
        self.failures.lock().unwrap().insert(call, error);
    }

    /// Makes `call` panic instead of answering.
    pub fn panicking(self, call: Call) -> Self {
        self.panics.lock().unwrap().insert(call);
        self
    }

    pub fn heal(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(call, _)| call.clone())
            .collect()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, token)| token.clone())
            .collect()
    }

    fn record(&self, call: Call, token: &str) -> ApiResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push((call.clone(), token.to_string()));
        let panics = self.panics.lock().unwrap().contains(&call);
        if panics {
            panic!("collaborator blew up on {call:?}");
        }
        match self.failures.lock().unwrap().get(&call) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MetadataApi for FakeApi {
    async fn get_project_fields(&self, _project: &str, token: &str) -> ApiResult<Vec<Field>> {
        self.record(Call::Fields, token)?;
        Ok(self.fields.clone())
    }

    async fn get_project_views(&self, _project: &str, token: &str) -> ApiResult<Vec<ProjectView>> {
        self.record(Call::Views, token)?;
        Ok(self.views.clone())
    }

    async fn get_project_details(&self, project: &str, token: &str) -> ApiResult<ProjectDetails> {
        self.record(Call::Details, token)?;
        Ok(ProjectDetails {
            project_id: Some(1),
            abbreviation: Some(project.to_string()),
            name: None,
            merge_algorithm: self.merge_algorithm.clone(),
        })
    }

    async fn get_project_view_data(
        &self,
        _project: &str,
        view_id: i64,
        token: &str,
    ) -> ApiResult<Vec<Row>> {
        self.record(Call::ViewData(view_id), token)?;
        Ok(self.view_rows.get(&view_id).cloned().unwrap_or_default())
    }
}

pub fn shared(api: FakeApi) -> Arc<FakeApi> {
    Arc::new(api)
}

pub fn server_error(message: &str) -> ApiError {
    ApiError::Server {
        status: 500,
        message: message.to_string(),
    }
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}
