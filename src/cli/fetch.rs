//! Fetch subcommand - query a project graph with filters and export it.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;

use crate::config::Config;
use crate::models::FilterOptions;
use crate::source::FileGraphSource;
use crate::visualization::{Engine, HeadlessMount, LoadOptions};

use super::{present, ViewArgs};

/// Fetch a project graph from the data directory.
#[derive(Parser)]
pub struct FetchCommand {
    /// Project identifier (`<data_dir>/<project>.json`).
    pub project: String,

    /// Only request entities of this type (repeatable).
    #[arg(long = "entity-type")]
    pub entity_types: Vec<String>,

    /// Only request relations of this type (repeatable).
    #[arg(long = "relation-type")]
    pub relation_types: Vec<String>,

    /// Hide entities with fewer connections than this.
    #[arg(long, default_value_t = 0)]
    pub min_connections: usize,

    /// Maximum number of entities to request (0 uses the configured default).
    #[arg(long, default_value_t = 0)]
    pub max_nodes: usize,

    /// Free-text filter applied by the source.
    #[arg(long)]
    pub query: Option<String>,

    /// Directory holding project graph files.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[command(flatten)]
    pub view: ViewArgs,
}

impl FetchCommand {
    pub fn filters(&self) -> FilterOptions {
        FilterOptions {
            entity_types: self.entity_types.iter().cloned().collect(),
            relation_types: self.relation_types.iter().cloned().collect(),
            min_connections: self.min_connections,
            max_nodes: self.max_nodes,
            search_query: self.query.clone().unwrap_or_default(),
        }
    }

    /// Run the fetch command.
    pub async fn run(self) -> Result<()> {
        let config = Config::load()?;
        let data_dir = self
            .data_dir
            .clone()
            .unwrap_or_else(|| config.source.data_dir.clone());
        let source = Arc::new(FileGraphSource::new(data_dir));
        tracing::info!("Reading project '{}' from {}", self.project, source.data_dir().display());

        let mount = Arc::new(HeadlessMount::new("fetch", self.view.width, self.view.height));
        let engine = Engine::with_source(config, mount, source);

        let mut options = LoadOptions::project(&self.project).with_filters(self.filters());
        options.layout = self.view.layout.clone();

        present(&engine, options, &self.view).await
    }
}
