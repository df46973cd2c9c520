//! Rule model and decision engine for Configsum.
//!
//! This crate provides:
//! - Typed parameters (the closed set of values a config can carry)
//! - Matchers and criteria for targeting users
//! - The rule entity with its construction invariants
//! - The decision engine that applies a rule for one user
//! - The JSON wire representation of rules
//!
//! Everything here is **pure**: no I/O, and randomness only through an
//! injected [`PercentageSource`].
//!
//! # Example
//!
//! ```rust,ignore
//! use configsum_rule::{Bucket, Context, FixedPercentage, Kind, Parameters, Rule};
//!
//! let rule = Rule::builder("r1", "base-1", "half-rollout", Kind::Rollout)
//!     .bucket(Bucket::new("default", Parameters::from([("feature_x", true)])))
//!     .rollout(50)
//!     .build()?;
//!
//! let base = Parameters::from([("feature_x", false)]);
//! let evaluation = rule.run(&base, &Context::default(), &[], &mut FixedPercentage(10))?;
//! assert_eq!(evaluation.decisions, vec![10]);
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod context;
pub mod criteria;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod params;
pub mod percentage;
pub mod rule;
pub mod wire;

pub use context::{Context, ContextUser};
pub use criteria::{Criteria, CriteriaUser, CriterionError, Verdict};
pub use engine::{fold, fold_with, Decisions, Evaluation, MismatchPolicy, Rendered};
pub use error::{Error, MatchError, Result};
pub use matcher::{Comparator, IntMatcher, MatchValue, Matcher};
pub use params::{ParameterValue, Parameters};
pub use percentage::{FixedPercentage, PercentageSource, SeededPercentage};
pub use rule::{Bucket, Kind, Rule, RuleBuilder, RuleUpdate};
