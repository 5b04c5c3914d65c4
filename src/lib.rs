pub mod aggregate;
pub mod api;
pub mod cli;
pub mod collate;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod fields;
pub mod loading;
pub mod maps;
pub mod normalize;
pub mod orchestrator;
pub mod schema_loader;
pub mod sequencer;
pub mod state;
pub mod store;
pub mod table;

use std::{env, sync::Arc, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    api::HttpMetadataApi,
    cli::{Cli, Commands, ProjectArgs},
    config::LoaderConfig,
    loading::MetadataLoadingState,
    orchestrator::MetadataEngine,
    state::ProjectMetadataState,
    table::{render_table, snapshot_table},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("cohort_metadata", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Starting async runtime")?;
    runtime.block_on(async {
        match cli.command {
            Commands::Load(args) => handle_load(&args.project, args.json).await,
            Commands::Fields(args) => handle_fields(&args).await,
            Commands::Preview(args) => handle_preview(&args.project, args.limit).await,
            Commands::Unique(args) => handle_unique(&args.project, &args.column).await,
            Commands::Export(args) => handle_export(&args).await,
        }
    })
}

struct Session {
    engine: MetadataEngine,
    project: String,
    token: String,
}

fn connect(args: &ProjectArgs) -> Result<Session> {
    let config = match &args.config {
        Some(path) => LoaderConfig::load(path)?,
        None => LoaderConfig::default(),
    }
    .with_overrides(args.base_url.as_deref(), args.token.as_deref());
    config.validate().context("Validating loader configuration")?;
    let token = config.require_token()?.to_string();
    let api = HttpMetadataApi::from_config(&config).context("Building HTTP client")?;
    debug!("Using metadata API at {}", config.base_url);
    Ok(Session {
        engine: MetadataEngine::new(Arc::new(api)),
        project: args.project.trim().to_string(),
        token,
    })
}

/// Loads every view and returns the final state, failing when nothing could be
/// loaded at all.
async fn load_project(session: &mut Session) -> Result<&ProjectMetadataState> {
    let outcome = session.engine.load(&session.project, &session.token).await;
    let state = session
        .engine
        .store()
        .project_metadata(&session.project)
        .with_context(|| format!("Project '{}' was never requested", session.project))?;
    match outcome {
        MetadataLoadingState::Error => bail!(
            "{}",
            state.error_message().unwrap_or(error::GENERIC_ERROR_MESSAGE)
        ),
        MetadataLoadingState::PartialLoadError => {
            warn!(
                "{}",
                state.error_message().unwrap_or(error::GENERIC_ERROR_MESSAGE)
            );
        }
        _ => {}
    }
    Ok(state)
}

async fn handle_load(args: &ProjectArgs, json: bool) -> Result<()> {
    let mut session = connect(args)?;
    let outcome = session.engine.load(&session.project, &session.token).await;
    let state = session
        .engine
        .store()
        .project_metadata(&session.project)
        .with_context(|| format!("Project '{}' was never requested", session.project))?;
    if json {
        let rendered = serde_json::to_string_pretty(state).context("Serializing project state")?;
        println!("{rendered}");
    } else {
        print!("{}", render_summary(state));
    }
    if outcome == MetadataLoadingState::Error {
        bail!("Loading project '{}' failed", session.project);
    }
    Ok(())
}

pub fn render_summary(state: &ProjectMetadataState) -> String {
    let mut out = format!(
        "Project: {}\nState: {}\n",
        state.project_abbrev(),
        state.loading_state()
    );
    if let Some(merge) = state.merge_algorithm() {
        out.push_str(&format!("Merge algorithm: {merge}\n"));
    }
    if let Some(message) = state.error_message() {
        out.push_str(&format!("Error: {message}\n"));
    }
    if !state.views().is_empty() {
        let headers = ["View", "Id", "Columns", "State"].map(String::from).to_vec();
        let rows = state
            .views()
            .iter()
            .map(|(index, view)| {
                vec![
                    index.to_string(),
                    view.view_id.to_string(),
                    view.view_fields.len().to_string(),
                    state
                        .view_loading_states()
                        .get(index)
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                ]
            })
            .collect::<Vec<_>>();
        out.push('\n');
        out.push_str(&render_table(&headers, &rows));
    }
    if let Some(rows) = state.metadata() {
        out.push_str(&format!("\nRows: {}\n", rows.len()));
    }
    if !state.empty_columns().is_empty() {
        out.push_str(&format!(
            "Empty columns: {}\n",
            state.empty_columns().join(", ")
        ));
    }
    if !state.supported_maps().is_empty() {
        let maps = state
            .supported_maps()
            .iter()
            .map(|m| {
                if m.regional {
                    format!("{} (regional)", m.map.as_str())
                } else {
                    m.map.as_str().to_string()
                }
            })
            .collect::<Vec<_>>();
        out.push_str(&format!("Supported maps: {}\n", maps.join(", ")));
    }
    out
}

async fn handle_fields(args: &ProjectArgs) -> Result<()> {
    let mut session = connect(args)?;
    session.engine.request_load(&session.project, &session.token);
    // The first completion is always the schema.
    session.engine.process_next().await;
    let state = session
        .engine
        .store()
        .project_metadata(&session.project)
        .with_context(|| format!("Project '{}' was never requested", session.project))?;
    if state.loading_state() == MetadataLoadingState::Error {
        bail!(
            "{}",
            state.error_message().unwrap_or(error::GENERIC_ERROR_MESSAGE)
        );
    }
    let headers = ["Column", "Field", "Type", "Source", "Geo", "Visualise"]
        .map(String::from)
        .to_vec();
    let rows = state
        .fields()
        .unwrap_or_default()
        .iter()
        .map(|vf| {
            vec![
                vf.column_name.clone(),
                vf.field.field_name.clone(),
                vf.field.type_label(),
                format!("{:?}", vf.field.field_source).to_lowercase(),
                vf.is_geo().to_string(),
                vf.field.can_visualise.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    print!("{}", render_table(&headers, &rows));
    info!(
        "Project '{}' has {} column(s) across {} view(s)",
        session.project,
        rows.len(),
        state.view_count()
    );
    Ok(())
}

async fn handle_preview(args: &ProjectArgs, limit: usize) -> Result<()> {
    let mut session = connect(args)?;
    let state = load_project(&mut session).await?;
    let (headers, rows) = snapshot_table(state, Some(limit));
    print!("{}", render_table(&headers, &rows));
    let total = state.metadata().map(<[_]>::len).unwrap_or_default();
    if total > rows.len() {
        info!("Showing {} of {total} row(s)", rows.len());
    }
    Ok(())
}

async fn handle_unique(args: &ProjectArgs, column: &str) -> Result<()> {
    let mut session = connect(args)?;
    let state = load_project(&mut session).await?;
    if !state.field_unique_values().contains_key(column) {
        bail!(
            "Column '{column}' not found in project '{}'",
            state.project_abbrev()
        );
    }
    let Some(values) = state.unique_values(column) else {
        bail!(
            "Column '{column}' has not been loaded (state {})",
            state
                .field_loading_state(column)
                .map(|s| s.to_string())
                .unwrap_or_default()
        );
    };
    for value in values {
        if value.is_empty() {
            println!("<blank>");
        } else {
            println!("{value}");
        }
    }
    Ok(())
}

async fn handle_export(args: &cli::ExportArgs) -> Result<()> {
    let mut session = connect(&args.project)?;
    let state = load_project(&mut session).await?;
    let summary = export::export_snapshot(state, args.output.as_deref(), args.delimiter)?;
    info!(
        "Wrote {} row(s) and {} column(s)",
        summary.rows, summary.columns
    );
    Ok(())
}
