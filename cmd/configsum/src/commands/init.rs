//! Init command implementation.

use anyhow::{Context, Result};
use configsum_store::Fixtures;
use std::fs;
use std::path::Path;
use tracing::info;

/// Runs the init command.
pub fn run(path: &str) -> Result<()> {
    let path = Path::new(path);

    if path.exists() {
        info!("Skipped: {} (already exists)", path.display());
        return Ok(());
    }

    let fixtures = Fixtures::example().with_context(|| "Failed to build example fixtures")?;
    let content = if path.extension().is_some_and(|e| e == "json") {
        serde_json::to_string_pretty(&fixtures).with_context(|| "Failed to serialize fixtures")?
    } else {
        fixtures
            .to_yaml()
            .with_context(|| "Failed to serialize fixtures")?
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(path, content)
        .with_context(|| format!("Failed to write fixture file: {}", path.display()))?;

    info!("Created: {}", path.display());
    info!("Next steps:");
    info!("  configsum validate --fixtures {}", path.display());
    info!(
        "  configsum render --fixtures {} --client client-1 --base app --user u1 --age 30",
        path.display()
    );
    Ok(())
}
