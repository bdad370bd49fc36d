//! Render subcommand - lay out a graph from a JSON file and export it.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;

use crate::config::Config;
use crate::models::GraphData;
use crate::visualization::{Engine, HeadlessMount, LoadOptions};

use super::{present, ViewArgs};

/// Render a graph supplied as `{ "nodes": [...], "edges": [...] }`.
#[derive(Parser)]
pub struct RenderCommand {
    /// Path to the graph JSON file.
    pub input: PathBuf,

    #[command(flatten)]
    pub view: ViewArgs,
}

impl RenderCommand {
    /// Run the render command.
    pub async fn run(self) -> Result<()> {
        let config = Config::load()?;
        let content = tokio::fs::read_to_string(&self.input)
            .await
            .wrap_err_with(|| format!("Failed to read {}", self.input.display()))?;
        let data: GraphData = serde_json::from_str(&content)
            .wrap_err_with(|| format!("Could not parse {} as graph data", self.input.display()))?;
        tracing::info!(
            nodes = data.nodes.len(),
            edges = data.edges.len(),
            "Loaded graph from {}",
            self.input.display()
        );

        // The file stem names the export.
        let name = self
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mount = Arc::new(HeadlessMount::new("render", self.view.width, self.view.height));
        let engine = Engine::new(config, mount);
        let mut options = LoadOptions::external(data);
        options.project_id = Some(name);
        options.layout = self.view.layout.clone();

        present(&engine, options, &self.view).await
    }
}
