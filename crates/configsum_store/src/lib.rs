//! Persistence for Configsum.
//!
//! This crate provides:
//! - Repository traits for rules, base configs and rendered user configs
//! - Thread-safe in-memory implementations of each
//! - Fixture loading from JSON or YAML files
//!
//! # Example
//!
//! ```rust,ignore
//! use configsum_store::{Fixtures, InMemoryBaseRepo, InMemoryRuleRepo};
//!
//! let fixtures = Fixtures::load_file("configsum.yaml")?;
//! let (bases, rules) = (InMemoryBaseRepo::new(), InMemoryRuleRepo::new());
//! fixtures.seed(&bases, &rules)?;
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod base;
pub mod error;
pub mod fixtures;
pub mod rule;
pub mod user;

pub use base::{BaseConfig, BaseRepo, InMemoryBaseRepo, ParameterCheck};
pub use error::{Error, Result};
pub use fixtures::Fixtures;
pub use rule::{InMemoryRuleRepo, RuleRepo};
pub use user::{InMemoryUserRepo, UserConfig, UserRepo};
