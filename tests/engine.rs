mod common;

use cohort_metadata::{
    data::{Row, Value},
    error::ApiError,
    fields::{Field, FieldSource, MergeAlgorithm, PrimitiveType},
    loading::{LoadingState, MetadataLoadingState},
    maps::{MapKey, SupportedMap},
    orchestrator::{MetadataEngine, Signal},
};
use common::{Call, FakeApi, PROJECT, TOKEN, server_error, shared};

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn ids(state: &cohort_metadata::state::ProjectMetadataState) -> Vec<String> {
    state
        .metadata()
        .unwrap_or_default()
        .iter()
        .map(|row| row["Seq_ID"].as_display())
        .collect()
}

#[tokio::test]
async fn fixture_project_loads_views_in_order_and_aggregates() {
    let api = shared(FakeApi::fixture());
    let mut engine = MetadataEngine::new(api.clone());

    let outcome = engine.load(PROJECT, TOKEN).await;

    assert_eq!(outcome, MetadataLoadingState::DataLoaded);
    assert_eq!(
        api.calls(),
        vec![
            Call::Fields,
            Call::Views,
            Call::Details,
            Call::ViewData(20),
            Call::ViewData(30),
        ]
    );
    assert!(api.tokens().iter().all(|t| t == TOKEN));

    let state = engine.store().project_metadata(PROJECT).unwrap();
    assert_eq!(state.view_count(), 2);
    assert_eq!(state.view_to_fetch(), 2);
    assert_eq!(ids(state), vec!["S1", "S2", "S10"]);
    assert_eq!(
        state.unique_values("Country"),
        Some(&strings(&["", "AU", "NZ"])[..])
    );
    assert_eq!(
        state.unique_values("Date_coll"),
        Some(&strings(&["", "2020-12-31", "2021-03-04"])[..])
    );
    assert_eq!(
        state.unique_values("Has_sequences"),
        Some(&strings(&["false", "true"])[..])
    );
    assert_eq!(
        state.supported_maps(),
        &[
            SupportedMap::new(MapKey::AusNz, true),
            SupportedMap::new(MapKey::World, false),
        ]
    );
    assert!(state.empty_columns().is_empty());
    assert!(
        state
            .field_loading_states()
            .values()
            .all(|s| *s == LoadingState::Success)
    );
    assert!(!engine.store().awaiting_project_metadata(PROJECT));
    assert_eq!(engine.in_flight(), 0);
}

#[tokio::test]
async fn states_advance_one_fetch_at_a_time() {
    let api = shared(FakeApi::fixture());
    let mut engine = MetadataEngine::new(api.clone());

    assert!(engine.request_load(PROJECT, TOKEN));
    assert_eq!(
        engine.store().loading_state(PROJECT),
        MetadataLoadingState::AwaitingFields
    );
    assert!(engine.store().awaiting_project_metadata(PROJECT));
    assert!(!engine.request_load(PROJECT, TOKEN));

    let signal = engine.process_next().await;
    assert_eq!(
        signal,
        Some(Signal::SchemaCompleted {
            project: PROJECT.into()
        })
    );
    // View 0 is dispatched as soon as the schema lands.
    assert_eq!(
        engine.store().loading_state(PROJECT),
        MetadataLoadingState::AwaitingData
    );
    assert_eq!(engine.in_flight(), 1);
    let state = engine.store().project_metadata(PROJECT).unwrap();
    assert_eq!(state.view_loading_states()[&0], LoadingState::Loading);
    assert_eq!(state.view_loading_states()[&1], LoadingState::Idle);
    assert_eq!(state.field_loading_state("State"), Some(LoadingState::Idle));

    let signal = engine.process_next().await;
    assert_eq!(
        signal,
        Some(Signal::ViewCompleted {
            project: PROJECT.into(),
            index: 0
        })
    );
    let state = engine.store().project_metadata(PROJECT).unwrap();
    assert_eq!(
        state.loading_state(),
        MetadataLoadingState::PartialDataLoaded
    );
    assert!(!engine.store().awaiting_project_metadata(PROJECT));
    assert_eq!(state.field_loading_state("Seq_ID"), Some(LoadingState::Success));
    assert_eq!(state.field_loading_state("State"), Some(LoadingState::Loading));
    assert_eq!(state.unique_values("State"), None);
    assert_eq!(
        state.supported_maps(),
        &[
            SupportedMap::new(MapKey::AusNz, false),
            SupportedMap::new(MapKey::World, false),
        ]
    );
    assert_eq!(engine.in_flight(), 1);

    engine.process_next().await;
    assert_eq!(
        engine.store().loading_state(PROJECT),
        MetadataLoadingState::DataLoaded
    );
    assert_eq!(engine.process_next().await, None);
}

#[tokio::test]
async fn schema_failure_names_the_failed_call() {
    let api = shared(FakeApi::fixture().failing(Call::Views, server_error("No such project")));
    let mut engine = MetadataEngine::new(api.clone());

    let outcome = engine.load(PROJECT, TOKEN).await;

    assert_eq!(outcome, MetadataLoadingState::Error);
    assert_eq!(
        engine.store().project_metadata_error(PROJECT),
        Some("Unable to load project views: No such project")
    );
    assert_eq!(api.calls(), vec![Call::Fields, Call::Views]);
    assert!(!engine.store().awaiting_project_metadata(PROJECT));
}

#[tokio::test]
async fn expired_token_surfaces_refresh_message() {
    let api = shared(FakeApi::fixture().failing(Call::Fields, ApiError::TokenExpired));
    let mut engine = MetadataEngine::new(api);

    engine.load(PROJECT, TOKEN).await;

    assert_eq!(
        engine.store().project_metadata_error(PROJECT),
        Some("Unable to load project fields: Your session has expired. Please refresh.")
    );
}

#[tokio::test]
async fn first_view_failure_is_a_full_error() {
    let api = shared(FakeApi::fixture().failing(Call::ViewData(20), server_error("boom")));
    let mut engine = MetadataEngine::new(api.clone());

    let outcome = engine.load(PROJECT, TOKEN).await;

    assert_eq!(outcome, MetadataLoadingState::Error);
    let state = engine.store().project_metadata(PROJECT).unwrap();
    assert_eq!(
        state.error_message(),
        Some("Unable to load project data: boom")
    );
    assert!(state.metadata().is_none());
    assert_eq!(state.view_loading_states()[&0], LoadingState::Error);
    assert_eq!(state.view_loading_states()[&1], LoadingState::Idle);
    assert_eq!(state.field_loading_state("Country"), Some(LoadingState::Error));
    assert_eq!(state.field_loading_state("State"), Some(LoadingState::Idle));
    assert!(!api.calls().contains(&Call::ViewData(30)));
}

#[tokio::test]
async fn later_view_failure_keeps_partial_data() {
    let api = shared(FakeApi::fixture().failing(Call::ViewData(30), server_error("timeout")));
    let mut engine = MetadataEngine::new(api);

    let outcome = engine.load(PROJECT, TOKEN).await;

    assert_eq!(outcome, MetadataLoadingState::PartialLoadError);
    let state = engine.store().project_metadata(PROJECT).unwrap();
    assert_eq!(
        state.error_message(),
        Some("Unable to complete loading project data: timeout")
    );
    assert_eq!(ids(state), vec!["S1", "S2", "S10"]);
    assert_eq!(state.field_loading_state("Seq_ID"), Some(LoadingState::Success));
    assert_eq!(state.field_loading_state("State"), Some(LoadingState::Error));
    assert_eq!(
        state.unique_values("Country"),
        Some(&strings(&["", "AU", "NZ"])[..])
    );
    assert!(!engine.store().awaiting_project_metadata(PROJECT));
}

#[tokio::test]
async fn retry_after_error_starts_from_scratch() {
    let api = shared(FakeApi::fixture().failing(Call::ViewData(20), server_error("boom")));
    let mut engine = MetadataEngine::new(api.clone());
    engine.load(PROJECT, TOKEN).await;
    let first_epoch = engine.store().project_metadata(PROJECT).unwrap().epoch();

    api.heal();
    let outcome = engine.load(PROJECT, "fresh-token").await;

    assert_eq!(outcome, MetadataLoadingState::DataLoaded);
    let state = engine.store().project_metadata(PROJECT).unwrap();
    assert_eq!(state.epoch(), first_epoch + 1);
    assert!(state.error_message().is_none());
    assert_eq!(api.calls().iter().filter(|c| **c == Call::Fields).count(), 2);
    assert_eq!(api.tokens().last().map(String::as_str), Some("fresh-token"));
}

#[tokio::test]
async fn loaded_project_ignores_further_requests() {
    let api = shared(FakeApi::fixture());
    let mut engine = MetadataEngine::new(api.clone());
    engine.load(PROJECT, TOKEN).await;
    let calls = api.calls().len();

    assert!(!engine.request_load(PROJECT, TOKEN));
    engine.run_until_idle().await;

    assert_eq!(api.calls().len(), calls);
    assert_eq!(
        engine.store().loading_state(PROJECT),
        MetadataLoadingState::DataLoaded
    );
}

#[tokio::test]
async fn project_without_views_stops_after_schema() {
    let api = shared(FakeApi::empty().with_fields(vec![Field::new("Seq_ID", None)]));
    let mut engine = MetadataEngine::new(api.clone());

    let outcome = engine.load(PROJECT, TOKEN).await;

    assert_eq!(outcome, MetadataLoadingState::FieldsLoaded);
    assert_eq!(api.calls(), vec![Call::Fields, Call::Views, Call::Details]);
    let fields = engine.store().project_metadata_fields(PROJECT);
    assert_eq!(fields.fields.map(<[_]>::len), Some(1));
    assert!(engine.store().awaiting_project_metadata(PROJECT));
}

#[tokio::test]
async fn empty_columns_follow_the_latest_view() {
    let row = |id: &str, note: Value| Row::from([("Seq_ID".into(), Value::from(id)), ("Note".into(), note)]);
    let api = shared(
        FakeApi::empty()
            .with_fields(vec![
                Field::new("Seq_ID", Some(PrimitiveType::String)),
                Field::new("Note", Some(PrimitiveType::String)),
            ])
            .with_view(5, &["Seq_ID", "Note"], vec![
                row("A", Value::Null),
                row("B", Value::from("")),
            ]),
    );
    let mut engine = MetadataEngine::new(api);

    engine.load(PROJECT, TOKEN).await;

    let state = engine.store().project_metadata(PROJECT).unwrap();
    assert_eq!(state.empty_columns(), &strings(&["Note"])[..]);
    assert_eq!(state.unique_values("Note"), Some(&strings(&[""])[..]));
}

#[tokio::test]
async fn show_all_projects_request_expanded_columns() {
    let lineage = Field {
        field_source: FieldSource::Dataset,
        analysis_labels: Some(strings(&["pangolin", "nextclade"])),
        column_order: 2,
        ..Field::new("Lineage", Some(PrimitiveType::String))
    };
    let seq = Field {
        column_order: 1,
        ..Field::new("Seq_ID", Some(PrimitiveType::String))
    };
    let rows = vec![Row::from([
        ("Seq_ID".into(), Value::from("S1")),
        ("Lineage_pangolin".into(), Value::from("B.1")),
        ("Lineage_nextclade".into(), Value::from("20A")),
    ])];
    let api = shared(
        FakeApi::empty()
            .with_fields(vec![lineage, seq])
            .with_view(1, &["Seq_ID", "Lineage"], rows)
            .with_merge_algorithm(MergeAlgorithm::ShowAll),
    );
    let mut engine = MetadataEngine::new(api);

    engine.load(PROJECT, TOKEN).await;

    let store = engine.store();
    assert_eq!(store.merge_algorithm(PROJECT), Some("show_all"));
    let state = store.project_metadata(PROJECT).unwrap();
    assert_eq!(
        state.loaded_columns(),
        vec!["Seq_ID", "Lineage_pangolin", "Lineage_nextclade"]
    );
    assert_eq!(
        state.unique_values("Lineage_pangolin"),
        Some(&strings(&["B.1"])[..])
    );
}

#[tokio::test]
async fn projects_load_independently() {
    let api = shared(FakeApi::fixture());
    let mut engine = MetadataEngine::new(api.clone());

    assert!(engine.request_load("A", TOKEN));
    assert!(engine.request_load("B", TOKEN));
    engine.run_until_idle().await;

    assert_eq!(engine.store().loading_state("A"), MetadataLoadingState::DataLoaded);
    assert_eq!(engine.store().loading_state("B"), MetadataLoadingState::DataLoaded);
    assert_eq!(api.calls().iter().filter(|c| **c == Call::ViewData(30)).count(), 2);
}

#[tokio::test]
async fn wider_view_supersedes_narrower_snapshot() {
    let seq = |id: &str| Row::from([("Seq_ID".into(), Value::from(id))]);
    let with_country = |id: &str, country: Value| {
        Row::from([("Seq_ID".into(), Value::from(id)), ("Country".into(), country)])
    };
    let api = shared(
        FakeApi::empty()
            .with_fields(vec![
                Field {
                    column_order: 1,
                    ..Field::new("Seq_ID", Some(PrimitiveType::String))
                },
                Field {
                    column_order: 2,
                    ..Field::new("Country", Some(PrimitiveType::String))
                },
            ])
            .with_view(1, &["Seq_ID"], vec![seq("A"), seq("B")])
            .with_view(2, &["Seq_ID", "Country"], vec![
                with_country("C", Value::Null),
                with_country("A", Value::from("AU")),
                with_country("B", Value::Null),
            ]),
    );
    let mut engine = MetadataEngine::new(api);

    engine.request_load(PROJECT, TOKEN);
    engine.process_next().await;
    engine.process_next().await;
    let state = engine.store().project_metadata(PROJECT).unwrap();
    assert_eq!(state.loading_state(), MetadataLoadingState::PartialDataLoaded);
    assert_eq!(state.unique_values("Seq_ID"), Some(&strings(&["A", "B"])[..]));
    assert_ne!(state.field_loading_state("Country"), Some(LoadingState::Success));
    assert_eq!(state.unique_values("Country"), None);

    engine.run_until_idle().await;
    let state = engine.store().project_metadata(PROJECT).unwrap();
    assert_eq!(state.loading_state(), MetadataLoadingState::DataLoaded);
    assert_eq!(ids(state), vec!["A", "B", "C"]);
    assert_eq!(
        state.unique_values("Seq_ID"),
        Some(&strings(&["A", "B", "C"])[..])
    );
    assert_eq!(state.unique_values("Country"), Some(&strings(&["", "AU"])[..]));
    assert!(!state.empty_columns().contains(&"Country".to_string()));
    assert_eq!(state.field_loading_state("Country"), Some(LoadingState::Success));
}

#[tokio::test]
async fn panicking_view_fetch_ends_in_error_instead_of_hanging() {
    let api = shared(FakeApi::fixture().panicking(Call::ViewData(20)));
    let mut engine = MetadataEngine::new(api);

    let outcome = engine.load(PROJECT, TOKEN).await;

    assert_eq!(outcome, MetadataLoadingState::Error);
    assert_eq!(engine.in_flight(), 0);
    let message = engine.store().project_metadata_error(PROJECT).unwrap();
    assert!(message.starts_with("Unable to load project data: "));
}

#[tokio::test]
async fn panicking_schema_fetch_ends_in_error_instead_of_hanging() {
    let api = shared(FakeApi::fixture().panicking(Call::Details));
    let mut engine = MetadataEngine::new(api);

    let outcome = engine.load(PROJECT, TOKEN).await;

    assert_eq!(outcome, MetadataLoadingState::Error);
    assert_eq!(engine.in_flight(), 0);
    let message = engine.store().project_metadata_error(PROJECT).unwrap();
    assert!(message.starts_with("Unable to load project schema: "));
}
