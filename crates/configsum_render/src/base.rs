//! Base config service.

use crate::error::{Error, Result};
use configsum_rule::Parameters;
use configsum_store::{BaseConfig, BaseRepo, Error as StoreError};
use std::sync::Arc;
use tracing::info;

/// Checks that `new` can replace `base` without breaking clients.
///
/// Every key of `base` must still be present in `new` with a value of the
/// same type. Keys may be added.
///
/// # Errors
///
/// Returns [`Error::ParametersInvalid`] naming the first offending key.
pub fn validate_param_delta(base: &Parameters, new: &Parameters) -> Result<()> {
    check_delta(base, new).map_err(Error::ParametersInvalid)
}

fn check_delta(base: &Parameters, new: &Parameters) -> std::result::Result<(), String> {
    for (key, old) in base {
        let Some(value) = new.get(key) else {
            return Err(format!("missing key '{key}'"));
        };
        if !old.same_kind(value) {
            return Err(format!(
                "'{key}' changed from {} to {}",
                old.type_name(),
                value.type_name()
            ));
        }
    }
    Ok(())
}

/// Manages base configs.
#[derive(Clone)]
pub struct BaseService {
    repo: Arc<dyn BaseRepo>,
}

impl BaseService {
    /// Creates a service over the given repository.
    #[must_use]
    pub fn new(repo: Arc<dyn BaseRepo>) -> Self {
        Self { repo }
    }

    /// Stores a new base config.
    ///
    /// # Errors
    ///
    /// Returns an exists error if the id or the client's name is taken.
    pub fn create(&self, config: BaseConfig) -> Result<BaseConfig> {
        let config = self.repo.create(config)?;
        info!(id = %config.id, client = %config.client_id, name = %config.name, "base config created");
        Ok(config)
    }

    /// Returns the base config with the given id.
    ///
    /// # Errors
    ///
    /// Returns a not found error if it does not exist.
    pub fn get(&self, id: &str) -> Result<BaseConfig> {
        Ok(self.repo.get_by_id(id)?)
    }

    /// Returns the base config with the given name for a client.
    ///
    /// # Errors
    ///
    /// Returns a not found error if it does not exist.
    pub fn get_by_name(&self, client_id: &str, name: &str) -> Result<BaseConfig> {
        Ok(self.repo.get_by_name(client_id, name)?)
    }

    /// Returns the base configs of a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    pub fn list(&self, client_id: &str) -> Result<Vec<BaseConfig>> {
        Ok(self.repo.list(client_id)?)
    }

    /// Replaces the parameters of a base config.
    ///
    /// # Errors
    ///
    /// Returns a not found error if the config does not exist and
    /// [`Error::ParametersInvalid`] if the new parameters drop a key or
    /// change a value's type.
    pub fn update(&self, id: &str, parameters: Parameters) -> Result<BaseConfig> {
        let config = self
            .repo
            .update_parameters_with(id, parameters, &check_delta)
            .map_err(|err| match err {
                StoreError::Rejected(reason) => Error::ParametersInvalid(reason),
                other => other.into(),
            })?;

        info!(id, "base config updated");
        Ok(config)
    }
}
