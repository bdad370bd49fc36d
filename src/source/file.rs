//! JSON file graph source.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{GraphQuery, GraphResponse, GraphStatistics};

use super::GraphSource;

/// Serves `<data_dir>/<project>.json`, each a serialized [`GraphResponse`].
#[derive(Debug, Clone)]
pub struct FileGraphSource {
    data_dir: PathBuf,
}

impl FileGraphSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn project_path(&self, project: &str) -> Result<PathBuf, AppError> {
        let valid = !project.is_empty()
            && project
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !project.starts_with('.');
        if !valid {
            return Err(AppError::ProjectNotFound(project.to_string()));
        }
        Ok(self.data_dir.join(format!("{}.json", project)))
    }

    async fn read_project(&self, project: &str) -> Result<GraphResponse, AppError> {
        let path = self.project_path(project)?;
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::ProjectNotFound(project.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let graph: GraphResponse = serde_json::from_str(&raw)?;
        tracing::debug!(
            project,
            path = %path.display(),
            entities = graph.entities.len(),
            relations = graph.relations.len(),
            "Project graph read"
        );
        Ok(graph)
    }
}

#[async_trait]
impl GraphSource for FileGraphSource {
    async fn query_graph(
        &self,
        project: &str,
        query: &GraphQuery,
    ) -> Result<GraphResponse, AppError> {
        let graph = self.read_project(project).await?;
        Ok(apply_query(graph, query))
    }

    async fn statistics(&self, project: &str) -> Result<GraphStatistics, AppError> {
        let graph = self.read_project(project).await?;
        Ok(GraphStatistics::from_parts(&graph.entities, &graph.relations))
    }
}

/// Apply type filters, search and limit, then drop relations left without both endpoints.
fn apply_query(graph: GraphResponse, query: &GraphQuery) -> GraphResponse {
    let needle = query.search.as_deref().map(str::to_lowercase);

    let entities: Vec<_> = graph
        .entities
        .into_iter()
        .filter(|e| {
            query
                .entity_types
                .as_ref()
                .map_or(true, |types| types.contains(&e.entity_type))
        })
        .filter(|e| needle.as_deref().map_or(true, |n| e.matches(n)))
        .take(query.limit)
        .collect();

    let kept: HashSet<&str> = entities.iter().map(|e| e.id.as_str()).collect();
    let relations = graph
        .relations
        .into_iter()
        .filter(|r| {
            query
                .relation_types
                .as_ref()
                .map_or(true, |types| types.contains(&r.relation_type))
        })
        .filter(|r| kept.contains(r.source.as_str()) && kept.contains(r.target.as_str()))
        .collect();

    GraphResponse {
        entities,
        relations,
    }
}
