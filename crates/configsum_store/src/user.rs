//! Rendered user config repository.
//!
//! User configs are append-only: every render adds a record and the newest
//! record per (base config, user) carries the decisions to replay.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use configsum_rule::{Decisions, Parameters, Rendered};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tracing::debug;

/// One rendered config for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    /// Record id.
    pub id: String,
    /// Base config the render started from.
    pub base_id: String,
    /// User the config was rendered for.
    pub user_id: String,
    /// Recorded rolls, keyed by rule name.
    #[serde(default)]
    pub decisions: Decisions,
    /// Final parameters.
    #[serde(default)]
    pub rendered: Parameters,
    /// Render time.
    pub created_at: DateTime<Utc>,
    /// Insertion sequence, breaks ties between equal timestamps.
    pub seq: u64,
}

/// Append-only storage for user configs.
pub trait UserRepo: Send + Sync {
    /// Appends a rendered config for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written or has run out of
    /// sequence numbers.
    fn append(&self, base_id: &str, user_id: &str, rendered: Rendered) -> Result<UserConfig>;

    /// Returns the newest config of a user for a base config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the user was never rendered.
    fn get_latest(&self, base_id: &str, user_id: &str) -> Result<UserConfig>;

    /// Returns every stored record in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn records(&self) -> Result<Vec<UserConfig>>;
}

#[derive(Debug, Default)]
struct UserState {
    records: Vec<UserConfig>,
    next_seq: u64,
}

/// In-memory [`UserRepo`].
#[derive(Debug, Default)]
pub struct InMemoryUserRepo {
    state: RwLock<UserState>,
}

impl InMemoryUserRepo {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a repository from previously exported records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SequenceExhausted`] if the newest record already
    /// holds the last sequence number.
    pub fn from_records(mut records: Vec<UserConfig>) -> Result<Self> {
        records.sort_by_key(|r| r.seq);
        let next_seq = match records.last() {
            Some(last) => last.seq.checked_add(1).ok_or(Error::SequenceExhausted)?,
            None => 0,
        };

        Ok(Self {
            state: RwLock::new(UserState { records, next_seq }),
        })
    }
}

impl UserRepo for InMemoryUserRepo {
    fn append(&self, base_id: &str, user_id: &str, rendered: Rendered) -> Result<UserConfig> {
        let mut state = self.state.write().map_err(|_| Error::Lock("user configs"))?;

        let seq = state.next_seq;
        state.next_seq = seq.checked_add(1).ok_or(Error::SequenceExhausted)?;

        let config = UserConfig {
            id: format!("uc-{seq}"),
            base_id: base_id.to_string(),
            user_id: user_id.to_string(),
            decisions: rendered.decisions,
            rendered: rendered.parameters,
            created_at: Utc::now(),
            seq,
        };
        state.records.push(config.clone());

        debug!(base = base_id, user = user_id, seq, "user config appended");
        Ok(config)
    }

    fn get_latest(&self, base_id: &str, user_id: &str) -> Result<UserConfig> {
        let state = self.state.read().map_err(|_| Error::Lock("user configs"))?;

        state
            .records
            .iter()
            .filter(|r| r.base_id == base_id && r.user_id == user_id)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.seq.cmp(&b.seq)))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("user config '{base_id}/{user_id}'")))
    }

    fn records(&self) -> Result<Vec<UserConfig>> {
        let state = self.state.read().map_err(|_| Error::Lock("user configs"))?;
        Ok(state.records.clone())
    }
}
