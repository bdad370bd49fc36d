//! CLI module for Graphlens.
//!
//! Subcommands:
//! - `render`: Lay out and export a graph from a JSON file
//! - `fetch`: Query a project from the data directory, then lay out and export it
//! - `stats`: Print per-type counts for a project

mod fetch;
mod render;
mod stats;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::eyre;
use color_eyre::Result;

use crate::visualization::{DirectorySink, Engine, ImageFormat, LoadOptions, LoadOutcome};

pub use fetch::FetchCommand;
pub use render::RenderCommand;

/// Graphlens - Interactive Entity-Relation Graph Viewer
#[derive(Parser)]
#[command(name = "graphlens")]
#[command(about = "Lay out, search and export entity-relation graphs")]
#[command(version)]
pub struct App {
    /// Run in verbose mode
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Render a host-supplied graph ({nodes, edges} JSON) to an image
    Render(RenderCommand),

    /// Fetch a project graph with filters and render it to an image
    Fetch(FetchCommand),

    /// Print entity and relation counts by type for a project
    Stats {
        /// Project identifier (`<data_dir>/<project>.json`)
        project: String,

        /// Directory holding project graph files
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

impl App {
    /// Run the CLI application.
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Render(cmd) => cmd.run().await,
            Command::Fetch(cmd) => cmd.run().await,
            Command::Stats {
                ref project,
                ref data_dir,
            } => self.run_stats(project, data_dir.clone()).await,
        }
    }
}

/// Options shared by the commands that produce an image.
#[derive(Args, Debug, Clone)]
pub struct ViewArgs {
    /// Layout to apply (force-directed, circular, grid, random, concentric, breadth-first)
    #[arg(short, long)]
    pub layout: Option<String>,

    /// Highlight entities whose label or type contains this text
    #[arg(short, long)]
    pub search: Option<String>,

    /// Image format (png or jpeg)
    #[arg(short, long, default_value = "png", value_parser = parse_format)]
    pub format: ImageFormat,

    /// Directory to write the image into
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Surface width in pixels
    #[arg(long, default_value_t = 1280.0)]
    pub width: f64,

    /// Surface height in pixels
    #[arg(long, default_value_t = 720.0)]
    pub height: f64,
}

fn parse_format(s: &str) -> std::result::Result<ImageFormat, String> {
    s.parse()
}

/// Load into `engine`, apply the search, export, and tear down.
async fn present(engine: &Engine, options: LoadOptions, view: &ViewArgs) -> Result<()> {
    let outcome = engine.load(options).await;
    match outcome {
        LoadOutcome::Rendered {
            nodes,
            edges,
            dropped_relations,
            layout,
        } => {
            tracing::info!(nodes, edges, dropped_relations, %layout, "Graph laid out");
        }
        LoadOutcome::Empty => {
            tracing::warn!("Graph is empty, nothing to export");
            engine.unmount();
            return Ok(());
        }
        other => {
            engine.unmount();
            return Err(eyre!("Graph was not rendered: {:?}", other));
        }
    }

    if let Some(query) = &view.search {
        let matches = engine.search(query);
        tracing::info!(query = %query, matches = matches.len(), "Search applied");
    }

    let sink = DirectorySink::new(&view.output);
    let delivered = engine.export_to(view.format, &sink).await;
    engine.unmount();

    let path = delivered.ok_or_else(|| eyre!("Export failed"))?;
    println!("{}", path.display());
    Ok(())
}
