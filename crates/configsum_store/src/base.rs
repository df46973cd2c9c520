//! Base config repository.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use configsum_rule::Parameters;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// The default parameter set of a client config, before any rule applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseConfig {
    /// Unique id. Rules reference it as their `config_id`.
    pub id: String,
    /// Owning client.
    pub client_id: String,
    /// Name, unique per client.
    pub name: String,
    /// Default parameters.
    #[serde(default)]
    pub parameters: Parameters,
    /// Soft delete flag.
    #[serde(default)]
    pub deleted: bool,
    /// Creation time.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl BaseConfig {
    /// Creates a base config stamped with the current time.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        client_id: impl Into<String>,
        name: impl Into<String>,
        parameters: Parameters,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            client_id: client_id.into(),
            name: name.into(),
            parameters,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Storage for base configs.
pub trait BaseRepo: Send + Sync {
    /// Stores a new base config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Exists`] if the id or the (client, name) pair is taken.
    fn create(&self, config: BaseConfig) -> Result<BaseConfig>;

    /// Returns the base config with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if it does not exist or was deleted.
    fn get_by_id(&self, id: &str) -> Result<BaseConfig>;

    /// Returns the base config with the given name for a client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if it does not exist or was deleted.
    fn get_by_name(&self, client_id: &str, name: &str) -> Result<BaseConfig>;

    /// Returns all non-deleted base configs of a client, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list(&self, client_id: &str) -> Result<Vec<BaseConfig>>;

    /// Replaces the parameters of a base config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if it does not exist or was deleted.
    fn update_parameters(&self, id: &str, parameters: Parameters) -> Result<BaseConfig> {
        self.update_parameters_with(id, parameters, &|_, _| Ok(()))
    }

    /// Replaces the parameters of a base config if `check` accepts the
    /// change. `check` sees the stored and the new parameters and runs under
    /// the same write as the replacement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if it does not exist or was deleted and
    /// [`Error::Rejected`] with the reason given by `check`.
    fn update_parameters_with(
        &self,
        id: &str,
        parameters: Parameters,
        check: &ParameterCheck<'_>,
    ) -> Result<BaseConfig>;
}

/// Decides whether stored parameters may be replaced; `Err` carries the reason.
pub type ParameterCheck<'a> =
    dyn Fn(&Parameters, &Parameters) -> std::result::Result<(), String> + 'a;

/// In-memory [`BaseRepo`].
#[derive(Debug, Default)]
pub struct InMemoryBaseRepo {
    configs: RwLock<HashMap<String, BaseConfig>>,
}

impl InMemoryBaseRepo {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(what: &str) -> Error {
    Error::NotFound(format!("base config '{what}'"))
}

impl BaseRepo for InMemoryBaseRepo {
    fn create(&self, config: BaseConfig) -> Result<BaseConfig> {
        let mut configs = self.configs.write().map_err(|_| Error::Lock("base configs"))?;

        if configs.contains_key(&config.id) {
            return Err(Error::Exists(format!("base config id '{}'", config.id)));
        }
        if configs
            .values()
            .any(|c| c.client_id == config.client_id && c.name == config.name)
        {
            return Err(Error::Exists(format!(
                "base config '{}' for client '{}'",
                config.name, config.client_id
            )));
        }

        configs.insert(config.id.clone(), config.clone());
        debug!(id = %config.id, client = %config.client_id, "base config created");
        Ok(config)
    }

    fn get_by_id(&self, id: &str) -> Result<BaseConfig> {
        let configs = self.configs.read().map_err(|_| Error::Lock("base configs"))?;

        configs
            .get(id)
            .filter(|c| !c.deleted)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    fn get_by_name(&self, client_id: &str, name: &str) -> Result<BaseConfig> {
        let configs = self.configs.read().map_err(|_| Error::Lock("base configs"))?;

        configs
            .values()
            .find(|c| !c.deleted && c.client_id == client_id && c.name == name)
            .cloned()
            .ok_or_else(|| not_found(&format!("{client_id}/{name}")))
    }

    fn list(&self, client_id: &str) -> Result<Vec<BaseConfig>> {
        let configs = self.configs.read().map_err(|_| Error::Lock("base configs"))?;

        let mut out: Vec<BaseConfig> = configs
            .values()
            .filter(|c| !c.deleted && c.client_id == client_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn update_parameters_with(
        &self,
        id: &str,
        parameters: Parameters,
        check: &ParameterCheck<'_>,
    ) -> Result<BaseConfig> {
        let mut configs = self.configs.write().map_err(|_| Error::Lock("base configs"))?;

        let config = configs
            .get_mut(id)
            .filter(|c| !c.deleted)
            .ok_or_else(|| not_found(id))?;
        check(&config.parameters, &parameters).map_err(Error::Rejected)?;
        config.parameters = parameters;
        config.updated_at = Utc::now();

        debug!(id, "base config parameters updated");
        Ok(config.clone())
    }
}
