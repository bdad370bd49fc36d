//! Stats command handler.

use std::path::PathBuf;

use color_eyre::eyre::eyre;
use color_eyre::Result;

use crate::config::Config;
use crate::source::{FileGraphSource, GraphSource};

use super::App;

impl App {
    /// Print entity and relation counts by type.
    pub async fn run_stats(&self, project: &str, data_dir: Option<PathBuf>) -> Result<()> {
        let config = Config::load()?;
        let data_dir = data_dir.unwrap_or(config.source.data_dir);
        let source = FileGraphSource::new(data_dir);

        let stats = source
            .statistics(project)
            .await
            .map_err(|e| eyre!("Failed to read project '{}': {}", project, e))?;

        println!("{}", serde_json::to_string_pretty(&stats)?);
        Ok(())
    }
}
