//! Schema loading: fields, views and merge algorithm for a project, with the
//! logical-to-physical column projection applied.

use std::collections::HashMap;

use log::{debug, info};

use crate::{
    api::MetadataApi,
    error::{SchemaAspect, SchemaError},
    fields::{
        Field, MergeAlgorithm, ProjectView, View, ViewField, sort_project_fields,
        view_column_names,
    },
};

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSchema {
    pub merge_algorithm: MergeAlgorithm,
    /// Logical fields in display order.
    pub project_fields: Vec<Field>,
    /// Physical columns, one per derived column name.
    pub fields: Vec<ViewField>,
    /// Non-empty views, fewest fields first; position is the view index.
    pub views: Vec<View>,
}

/// Fetches fields, views and project details, in that order, stopping at the
/// first failure.
pub async fn load_schema(
    api: &dyn MetadataApi,
    project: &str,
    token: &str,
) -> Result<ProjectSchema, SchemaError> {
    let fields = api
        .get_project_fields(project, token)
        .await
        .map_err(|e| SchemaError::new(SchemaAspect::Fields, e))?;
    let views = api
        .get_project_views(project, token)
        .await
        .map_err(|e| SchemaError::new(SchemaAspect::Views, e))?;
    let details = api
        .get_project_details(project, token)
        .await
        .map_err(|e| SchemaError::new(SchemaAspect::Details, e))?;
    info!(
        "Fetched schema for '{project}': {} field(s), {} view(s)",
        fields.len(),
        views.len()
    );
    Ok(build_schema(details.merge_algorithm, fields, views))
}

pub fn build_schema(
    merge_algorithm: MergeAlgorithm,
    mut project_fields: Vec<Field>,
    views: Vec<ProjectView>,
) -> ProjectSchema {
    sort_project_fields(&mut project_fields);

    let column_map = project_fields
        .iter()
        .map(|field| {
            (
                field.field_name.clone(),
                view_column_names(field, &merge_algorithm),
            )
        })
        .collect::<HashMap<_, _>>();

    let fields = project_fields
        .iter()
        .flat_map(|field| {
            column_map
                .get(&field.field_name)
                .into_iter()
                .flatten()
                .map(move |column| ViewField {
                    column_name: column.clone(),
                    field: field.clone(),
                })
        })
        .collect::<Vec<_>>();

    let mut eligible = views
        .into_iter()
        .filter(|view| !view.fields.is_empty())
        .collect::<Vec<_>>();
    eligible.sort_by_key(|view| view.fields.len());

    let views = eligible
        .into_iter()
        .map(|view| {
            let view_fields = view
                .fields
                .iter()
                .flat_map(|name| match column_map.get(name) {
                    Some(columns) => columns.clone(),
                    None => {
                        debug!("View {} names unknown field '{name}'", view.id);
                        vec![name.clone()]
                    }
                })
                .collect();
            View {
                view_id: view.id,
                name: view.view_name,
                fields: view.fields,
                view_fields,
            }
        })
        .collect();

    ProjectSchema {
        merge_algorithm,
        project_fields,
        fields,
        views,
    }
}
