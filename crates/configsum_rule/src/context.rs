//! Evaluation-time facts about the requesting user.

use crate::matcher::MatchValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Facts a rule's criteria are matched against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// The requesting user.
    #[serde(default)]
    pub user: ContextUser,
    /// Locale tag of the device, e.g. `en-GB`.
    #[serde(default)]
    pub locale: String,
}

/// User information carried by a [`Context`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextUser {
    /// User identifier.
    #[serde(default)]
    pub id: String,
    /// Age in years.
    #[serde(default)]
    pub age: u8,
    /// Subscription tier.
    #[serde(default)]
    pub subscription: i64,
    /// When the user registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered: Option<DateTime<Utc>>,
}

impl Context {
    /// Creates a context for the given user id.
    #[must_use]
    pub fn for_user(id: impl Into<String>) -> Self {
        Self {
            user: ContextUser {
                id: id.into(),
                ..ContextUser::default()
            },
            locale: String::new(),
        }
    }

    /// Sets the user's age.
    #[must_use]
    pub const fn with_age(mut self, age: u8) -> Self {
        self.user.age = age;
        self
    }

    /// Sets the user's subscription tier.
    #[must_use]
    pub const fn with_subscription(mut self, subscription: i64) -> Self {
        self.user.subscription = subscription;
        self
    }

    /// Sets the registration time.
    #[must_use]
    pub const fn with_registered(mut self, registered: DateTime<Utc>) -> Self {
        self.user.registered = Some(registered);
        self
    }

    /// Sets the locale tag.
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub(crate) fn age(&self) -> MatchValue<'_> {
        MatchValue::Int(i64::from(self.user.age))
    }

    pub(crate) fn user_id(&self) -> MatchValue<'_> {
        MatchValue::Str(&self.user.id)
    }

    pub(crate) const fn subscription(&self) -> MatchValue<'_> {
        MatchValue::Int(self.user.subscription)
    }

    pub(crate) fn locale(&self) -> MatchValue<'_> {
        MatchValue::Str(&self.locale)
    }
}
