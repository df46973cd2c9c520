//! Services for Configsum.
//!
//! This crate provides:
//! - Rule lifecycle operations on top of a rule repository
//! - Base config management with parameter delta validation
//! - User rendering: base parameters folded through the active rules with
//!   sticky rollout decisions
//!
//! # Example
//!
//! ```rust,ignore
//! use configsum_render::{RenderConfig, UserService};
//! use configsum_rule::Context;
//!
//! let service = UserService::new(bases, rules, users, &RenderConfig::default());
//! let ctx = Context::for_user("user-1").with_age(30).with_locale("en-GB");
//! let config = service.render("client-1", "app", "user-1", &ctx)?;
//! println!("{:?}", config.rendered);
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod base;
pub mod config;
pub mod error;
pub mod rules;
pub mod user;

pub use base::{validate_param_delta, BaseService};
pub use config::RenderConfig;
pub use error::{Error, Result};
pub use rules::RuleService;
pub use user::UserService;
