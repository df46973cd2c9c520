//! Validate command implementation.

use anyhow::{Context, Result};
use configsum_store::{Fixtures, InMemoryBaseRepo, InMemoryRuleRepo, RuleRepo};
use tracing::info;

/// Runs the validate command.
pub fn run(fixtures_path: &str) -> Result<()> {
    info!("Validating fixtures: {}", fixtures_path);

    let fixtures = Fixtures::load_file(fixtures_path)
        .with_context(|| format!("Failed to load fixtures: {fixtures_path}"))?;

    // Seeding catches duplicates and rules pointing at unknown configs.
    let bases = InMemoryBaseRepo::new();
    let rules = InMemoryRuleRepo::new();
    fixtures
        .seed(&bases, &rules)
        .with_context(|| "Fixtures are inconsistent")?;

    for base in &fixtures.base_configs {
        let all = rules.list_all(&base.id)?;
        let live = all.iter().filter(|r| r.is_active()).count();
        info!(
            "{}/{}: {} parameters, {} rules ({} active)",
            base.client_id,
            base.name,
            base.parameters.len(),
            all.len(),
            live
        );
    }

    info!(
        "Fixtures valid: {} base configs, {} rules",
        fixtures.base_configs.len(),
        fixtures.rules.len()
    );
    Ok(())
}
