//! Targeting criteria for rules.
//!
//! Criteria hold optional matchers over fixed context fields. Every present
//! matcher must match; absent matchers impose no constraint, so empty
//! criteria match everything.
//!
//! Fields accept any [`Matcher`] shape when a rule is built or decoded. A
//! shape that does not fit its field (a string matcher on `user.age`, say)
//! only surfaces at evaluation, as a [`CriterionError`].

use crate::context::Context;
use crate::error::MatchError;
use crate::matcher::{MatchValue, Matcher};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Field names used in diagnostics.
pub mod field {
    /// `user.age`
    pub const USER_AGE: &str = "user.age";
    /// `user.id`
    pub const USER_ID: &str = "user.id";
    /// `user.subscription`
    pub const USER_SUBSCRIPTION: &str = "user.subscription";
    /// `locale`
    pub const LOCALE: &str = "locale";
}

/// Composite targeting predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criteria {
    /// Matchers over user attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<CriteriaUser>,
    /// Matcher over the locale tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<Matcher>,
}

/// Matchers over user attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriteriaUser {
    /// Matcher over the user's age.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<Matcher>,
    /// Matcher over the user id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Matcher>,
    /// Matcher over the subscription tier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Matcher>,
}

/// Outcome of evaluating criteria against a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Every present matcher matched.
    Match,
    /// The named field did not match.
    Miss(&'static str),
}

impl Verdict {
    /// Returns true on a match.
    #[must_use]
    pub const fn is_match(self) -> bool {
        matches!(self, Self::Match)
    }
}

/// A matcher in the criteria failed with a type error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {source}")]
pub struct CriterionError {
    /// Context field the matcher was applied to.
    pub field: &'static str,
    /// The matcher failure.
    #[source]
    pub source: MatchError,
}

impl Criteria {
    /// Creates empty criteria (matches everything).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the user id matcher.
    #[must_use]
    pub fn with_user_id(mut self, matcher: Matcher) -> Self {
        self.user.get_or_insert_with(CriteriaUser::default).id = Some(matcher);
        self
    }

    /// Sets the user age matcher.
    #[must_use]
    pub fn with_user_age(mut self, matcher: Matcher) -> Self {
        self.user.get_or_insert_with(CriteriaUser::default).age = Some(matcher);
        self
    }

    /// Sets the subscription matcher.
    #[must_use]
    pub fn with_subscription(mut self, matcher: Matcher) -> Self {
        self.user.get_or_insert_with(CriteriaUser::default).subscription = Some(matcher);
        self
    }

    /// Sets the locale matcher.
    #[must_use]
    pub fn with_locale(mut self, matcher: Matcher) -> Self {
        self.locale = Some(matcher);
        self
    }

    /// Returns true if no matcher is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locale.is_none()
            && self.user.as_ref().map_or(true, |u| {
                u.age.is_none() && u.id.is_none() && u.subscription.is_none()
            })
    }

    /// Evaluates the criteria against a context.
    ///
    /// Matchers run in a fixed order (user age, user id, subscription,
    /// locale) and evaluation stops at the first miss.
    ///
    /// # Errors
    ///
    /// Returns a [`CriterionError`] as soon as any matcher is handed a value
    /// of the wrong type.
    pub fn evaluate(&self, ctx: &Context) -> Result<Verdict, CriterionError> {
        let user = self.user.as_ref();
        let checks: [(&'static str, Option<&Matcher>, MatchValue<'_>); 4] = [
            (field::USER_AGE, user.and_then(|u| u.age.as_ref()), ctx.age()),
            (field::USER_ID, user.and_then(|u| u.id.as_ref()), ctx.user_id()),
            (
                field::USER_SUBSCRIPTION,
                user.and_then(|u| u.subscription.as_ref()),
                ctx.subscription(),
            ),
            (field::LOCALE, self.locale.as_ref(), ctx.locale()),
        ];

        for (name, matcher, value) in checks {
            let Some(matcher) = matcher else {
                continue;
            };

            let matched = matcher
                .matches(value)
                .map_err(|source| CriterionError { field: name, source })?;

            if !matched {
                return Ok(Verdict::Miss(name));
            }
        }

        Ok(Verdict::Match)
    }
}
