//! Render command implementation.

use anyhow::{Context, Result};
use configsum_render::{RenderConfig, UserService};
use configsum_rule::{Context as RenderContext, FixedPercentage};
use configsum_store::{
    Fixtures, InMemoryBaseRepo, InMemoryRuleRepo, InMemoryUserRepo, UserConfig, UserRepo,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Arguments of the render command.
pub struct RenderArgs<'a> {
    pub fixtures: &'a str,
    pub client: &'a str,
    pub base: &'a str,
    pub user: &'a str,
    pub age: u8,
    pub subscription: i64,
    pub locale: &'a str,
    pub seed: Option<u64>,
    pub roll: Option<u8>,
    pub state: Option<&'a str>,
    pub skip_malformed: bool,
}

/// Runs the render command.
pub fn run(args: &RenderArgs<'_>) -> Result<()> {
    let fixtures = Fixtures::load_file(args.fixtures)
        .with_context(|| format!("Failed to load fixtures: {}", args.fixtures))?;

    let bases = Arc::new(InMemoryBaseRepo::new());
    let rules = Arc::new(InMemoryRuleRepo::new());
    fixtures
        .seed(bases.as_ref(), rules.as_ref())
        .with_context(|| "Fixtures are inconsistent")?;

    let users = Arc::new(match args.state {
        Some(path) => load_state(path)?,
        None => InMemoryUserRepo::new(),
    });

    let mut config = RenderConfig::new().with_fail_on_type_mismatch(!args.skip_malformed);
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }

    let mut service = UserService::new(bases, rules, users.clone(), &config);
    if let Some(roll) = args.roll {
        service = service.with_source(FixedPercentage(roll));
    }

    let ctx = RenderContext::for_user(args.user)
        .with_age(args.age)
        .with_subscription(args.subscription)
        .with_locale(args.locale);

    let rendered = service
        .render(args.client, args.base, args.user, &ctx)
        .with_context(|| format!("Failed to render {}/{} for {}", args.client, args.base, args.user))?;

    info!(
        "Rendered {} parameters with {} recorded decisions",
        rendered.rendered.len(),
        rendered.decisions.len()
    );

    if let Some(path) = args.state {
        save_state(path, users.as_ref())?;
    }

    let output = serde_json::to_string_pretty(&rendered)
        .with_context(|| "Failed to serialize rendered config")?;
    println!("{output}");
    Ok(())
}

fn load_state(path: &str) -> Result<InMemoryUserRepo> {
    if !Path::new(path).exists() {
        warn!("State file not found, starting empty: {}", path);
        return Ok(InMemoryUserRepo::new());
    }

    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read state file: {path}"))?;
    let records: Vec<UserConfig> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse state file: {path}"))?;

    info!("Loaded {} previous renders from {}", records.len(), path);
    InMemoryUserRepo::from_records(records)
        .with_context(|| format!("Failed to restore state file: {path}"))
}

fn save_state(path: &str, users: &InMemoryUserRepo) -> Result<()> {
    let records = users.records()?;
    let content = serde_json::to_string_pretty(&records)
        .with_context(|| "Failed to serialize state")?;
    fs::write(path, content).with_context(|| format!("Failed to write state file: {path}"))?;

    info!("Saved {} renders to {}", records.len(), path);
    Ok(())
}
