//! User render service.

use crate::config::RenderConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use configsum_rule::{fold_with, Context, Decisions, MismatchPolicy, PercentageSource};
use configsum_store::{BaseRepo, RuleRepo, UserConfig, UserRepo};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Renders the config of one user: base parameters folded through the
/// active rules, with rollout rolls replayed from the user's last render.
pub struct UserService {
    bases: Arc<dyn BaseRepo>,
    rules: Arc<dyn RuleRepo>,
    users: Arc<dyn UserRepo>,
    source: Mutex<Box<dyn PercentageSource + Send>>,
    policy: MismatchPolicy,
}

impl UserService {
    /// Creates a service with the percentage source described by `config`.
    #[must_use]
    pub fn new(
        bases: Arc<dyn BaseRepo>,
        rules: Arc<dyn RuleRepo>,
        users: Arc<dyn UserRepo>,
        config: &RenderConfig,
    ) -> Self {
        Self {
            bases,
            rules,
            users,
            source: Mutex::new(Box::new(config.percentage_source())),
            policy: config.mismatch_policy(),
        }
    }

    /// Replaces the percentage source.
    #[must_use]
    pub fn with_source(mut self, source: impl PercentageSource + Send + 'static) -> Self {
        self.source = Mutex::new(Box::new(source));
        self
    }

    /// Renders and stores the config of `user_id` for a client's base config.
    ///
    /// # Errors
    ///
    /// See [`UserService::render_at`].
    pub fn render(
        &self,
        client_id: &str,
        base_name: &str,
        user_id: &str,
        ctx: &Context,
    ) -> Result<UserConfig> {
        self.render_at(client_id, base_name, user_id, ctx, Utc::now())
    }

    /// Renders with the rules that are live at `as_of`.
    ///
    /// # Errors
    ///
    /// - not found if the base config does not exist
    /// - [`configsum_rule::Error::InvalidTypeToMatch`] for malformed criteria
    ///   unless the service skips them
    /// - [`configsum_rule::Error::ExperimentNotImplemented`] if an experiment
    ///   rule is live
    /// - any repository error
    pub fn render_at(
        &self,
        client_id: &str,
        base_name: &str,
        user_id: &str,
        ctx: &Context,
        as_of: DateTime<Utc>,
    ) -> Result<UserConfig> {
        let base = self.bases.get_by_name(client_id, base_name)?;

        let history = match self.users.get_latest(&base.id, user_id) {
            Ok(latest) => latest.decisions,
            Err(err) if err.is_not_found() => Decisions::new(),
            Err(err) => return Err(err.into()),
        };

        let rules = self.rules.list_active(&base.id, as_of)?;
        debug!(
            base = %base.id,
            user = user_id,
            rules = rules.len(),
            recorded = history.len(),
            "rendering user config"
        );

        let rendered = {
            let mut source = self.source.lock().map_err(|_| Error::Lock("percentage source"))?;
            fold_with(
                self.policy,
                &rules,
                &base.parameters,
                ctx,
                &history,
                &mut **source,
            )?
        };

        let config = self.users.append(&base.id, user_id, rendered)?;
        info!(
            base = %base.id,
            user = user_id,
            seq = config.seq,
            "user config rendered"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use configsum_rule::{
        Bucket, Criteria, FixedPercentage, Kind, Matcher, Parameters, Rule, SeededPercentage,
    };
    use configsum_store::{BaseConfig, InMemoryBaseRepo, InMemoryRuleRepo, InMemoryUserRepo};
    use proptest::prelude::*;

    struct Harness {
        rules: Arc<InMemoryRuleRepo>,
        users: Arc<InMemoryUserRepo>,
        service: UserService,
    }

    fn harness(config: &RenderConfig) -> Harness {
        let bases = Arc::new(InMemoryBaseRepo::new());
        let rules = Arc::new(InMemoryRuleRepo::new());
        let users = Arc::new(InMemoryUserRepo::new());
        bases
            .create(BaseConfig::new(
                "base",
                "client",
                "app",
                Parameters::from([("feature_x", false)]),
            ))
            .unwrap();

        let service = UserService::new(bases, rules.clone(), users.clone(), config);
        Harness {
            rules,
            users,
            service,
        }
    }

    /// Hands out the given rolls in order.
    struct Rolls(Vec<u8>);

    impl PercentageSource for Rolls {
        fn roll(&mut self) -> u8 {
            self.0.remove(0)
        }
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    fn rule(id: &str, name: &str, kind: Kind, key: &str) -> Rule {
        Rule::builder(id, "base", name, kind)
            .bucket(Bucket::new("default", Parameters::from([(key, true)])))
            .active(true)
            .created_at(at(1))
            .build()
            .unwrap()
    }

    fn rollout(id: &str, name: &str, percentage: u8, key: &str) -> Rule {
        Rule::builder(id, "base", name, Kind::Rollout)
            .bucket(Bucket::new("default", Parameters::from([(key, true)])))
            .rollout(percentage)
            .active(true)
            .created_at(at(10))
            .build()
            .unwrap()
    }

    #[test]
    fn missing_base_config() {
        let h = harness(&RenderConfig::default());

        let err = h
            .service
            .render("client", "nope", "u1", &Context::for_user("u1"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn no_rules_renders_base() {
        let h = harness(&RenderConfig::default());

        let config = h
            .service
            .render("client", "app", "u1", &Context::for_user("u1"))
            .unwrap();

        assert_eq!(config.rendered, Parameters::from([("feature_x", false)]));
        assert!(config.decisions.is_empty());
        assert_eq!(config.base_id, "base");
    }

    #[test]
    fn override_then_rollout() {
        let h = harness(&RenderConfig::default());
        h.rules.create(rule("a", "A", Kind::Override, "feature_x")).unwrap();
        h.rules.create(rollout("bb", "B", 30, "feature_y")).unwrap();
        let service = h.service.with_source(FixedPercentage(10));

        let config = service
            .render_at("client", "app", "u1", &Context::for_user("u1"), at(100))
            .unwrap();

        assert_eq!(
            config.rendered,
            Parameters::from([("feature_x", true), ("feature_y", true)])
        );
        assert_eq!(config.decisions, Decisions::from([("B".to_string(), vec![10])]));
    }

    #[test]
    fn lost_roll_sticks_after_rollout_increase() {
        let h = harness(&RenderConfig::default());
        h.rules.create(rollout("r", "beta", 30, "feature_y")).unwrap();
        let service = h.service.with_source(FixedPercentage(50));
        let ctx = Context::for_user("u1");

        let first = service.render_at("client", "app", "u1", &ctx, at(100)).unwrap();
        assert_eq!(first.rendered.get("feature_y"), None);
        assert_eq!(first.decisions["beta"], vec![50]);

        // Raising the rollout admits the recorded roll without rolling again.
        let mut widened = h.rules.get_by_id("r").unwrap();
        widened.set_rollout(60).unwrap();
        h.rules.update_with(widened).unwrap();

        let second = service.render_at("client", "app", "u1", &ctx, at(101)).unwrap();
        assert_eq!(second.rendered.get("feature_y"), Some(&true.into()));
        assert_eq!(second.decisions["beta"], vec![50]);
        assert_eq!(h.users.records().unwrap().len(), 2);
    }

    #[test]
    fn lost_roll_survives_deactivation() {
        let h = harness(&RenderConfig::default());
        h.rules.create(rollout("r", "beta", 30, "feature_y")).unwrap();
        let service = h.service.with_source(Rolls(vec![80, 5]));
        let ctx = Context::for_user("u1");

        let first = service.render_at("client", "app", "u1", &ctx, at(100)).unwrap();
        assert_eq!(first.decisions["beta"], vec![80]);

        let mut paused = h.rules.get_by_id("r").unwrap();
        paused.deactivate();
        h.rules.update_with(paused).unwrap();

        let while_off = service.render_at("client", "app", "u1", &ctx, at(101)).unwrap();
        assert_eq!(while_off.decisions["beta"], vec![80]);

        let mut resumed = h.rules.get_by_id("r").unwrap();
        resumed.activate(at(102));
        h.rules.update_with(resumed).unwrap();

        let after = service.render_at("client", "app", "u1", &ctx, at(103)).unwrap();
        assert_eq!(after.rendered.get("feature_y"), None);
        assert_eq!(after.decisions["beta"], vec![80]);
    }

    #[test]
    fn lost_roll_survives_criteria_miss() {
        let h = harness(&RenderConfig::default());
        let british = Rule::builder("r", "base", "beta", Kind::Rollout)
            .bucket(Bucket::new("default", Parameters::from([("feature_y", true)])))
            .criteria(Criteria::new().with_locale(Matcher::equals("en-GB")))
            .rollout(30)
            .active(true)
            .created_at(at(10))
            .build()
            .unwrap();
        h.rules.create(british).unwrap();
        let service = h.service.with_source(Rolls(vec![80, 5]));
        let uk = Context::for_user("u1").with_locale("en-GB");
        let de = Context::for_user("u1").with_locale("de-DE");

        let first = service.render_at("client", "app", "u1", &uk, at(100)).unwrap();
        assert_eq!(first.decisions["beta"], vec![80]);

        let abroad = service.render_at("client", "app", "u1", &de, at(101)).unwrap();
        assert_eq!(abroad.decisions["beta"], vec![80]);

        let back = service.render_at("client", "app", "u1", &uk, at(102)).unwrap();
        assert_eq!(back.rendered.get("feature_y"), None);
        assert_eq!(back.decisions["beta"], vec![80]);
    }

    #[test]
    fn lost_roll_survives_window_gap() {
        let h = harness(&RenderConfig::default());
        let windowed = Rule::builder("r", "base", "beta", Kind::Rollout)
            .bucket(Bucket::new("default", Parameters::from([("feature_y", true)])))
            .window(Some(at(50)), Some(at(200)))
            .rollout(30)
            .active(true)
            .created_at(at(10))
            .build()
            .unwrap();
        h.rules.create(windowed).unwrap();
        let service = h.service.with_source(Rolls(vec![80, 5]));
        let ctx = Context::for_user("u1");

        service.render_at("client", "app", "u1", &ctx, at(100)).unwrap();
        let outside = service.render_at("client", "app", "u1", &ctx, at(300)).unwrap();
        assert_eq!(outside.decisions["beta"], vec![80]);

        let inside = service.render_at("client", "app", "u1", &ctx, at(150)).unwrap();
        assert_eq!(inside.rendered.get("feature_y"), None);
        assert_eq!(inside.decisions["beta"], vec![80]);
    }

    #[test]
    fn inactive_rules_are_ignored() {
        let h = harness(&RenderConfig::default());
        let mut off = rule("a", "A", Kind::Override, "feature_x");
        off.deactivate();
        h.rules.create(off).unwrap();

        let config = h
            .service
            .render_at("client", "app", "u1", &Context::for_user("u1"), at(100))
            .unwrap();
        assert_eq!(config.rendered.get("feature_x"), Some(&false.into()));
    }

    #[test]
    fn criteria_miss_is_not_an_error() {
        let h = harness(&RenderConfig::default());
        let adults = Rule::builder("a", "base", "adults", Kind::Override)
            .bucket(Bucket::new("default", Parameters::from([("feature_x", true)])))
            .criteria(Criteria::new().with_user_age(Matcher::greater_than(17)))
            .active(true)
            .created_at(at(1))
            .build()
            .unwrap();
        h.rules.create(adults).unwrap();

        let kid = h
            .service
            .render_at("client", "app", "kid", &Context::for_user("kid").with_age(12), at(100))
            .unwrap();
        let adult = h
            .service
            .render_at("client", "app", "adult", &Context::for_user("adult").with_age(30), at(100))
            .unwrap();

        assert_eq!(kid.rendered.get("feature_x"), Some(&false.into()));
        assert_eq!(adult.rendered.get("feature_x"), Some(&true.into()));
    }

    #[test]
    fn type_mismatch_policy() {
        let broken = Rule::builder("a", "base", "broken", Kind::Override)
            .bucket(Bucket::new("default", Parameters::from([("feature_x", true)])))
            .criteria(Criteria::new().with_locale(Matcher::greater_than(3)))
            .active(true)
            .created_at(at(1))
            .build()
            .unwrap();
        let ctx = Context::for_user("u1").with_locale("en-GB");

        let strict = harness(&RenderConfig::default());
        strict.rules.create(broken.clone()).unwrap();
        let err = strict
            .service
            .render_at("client", "app", "u1", &ctx, at(100))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Rule(configsum_rule::Error::InvalidTypeToMatch { .. })
        ));
        assert!(strict.users.records().unwrap().is_empty());

        let lenient = harness(&RenderConfig::new().with_fail_on_type_mismatch(false));
        lenient.rules.create(broken).unwrap();
        let config = lenient
            .service
            .render_at("client", "app", "u1", &ctx, at(100))
            .unwrap();
        assert_eq!(config.rendered.get("feature_x"), Some(&false.into()));
    }

    #[test]
    fn experiment_fails_render() {
        let h = harness(&RenderConfig::default());
        h.rules.create(rule("a", "exp", Kind::Experiment, "feature_x")).unwrap();

        let err = h
            .service
            .render_at("client", "app", "u1", &Context::for_user("u1"), at(100))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Rule(configsum_rule::Error::ExperimentNotImplemented { .. })
        ));
    }

    proptest! {
        #[test]
        fn rerender_is_stable(seed in any::<u64>(), percentage in 0u8..=100) {
            let h = harness(&RenderConfig::default());
            h.rules.create(rollout("r", "beta", percentage, "feature_y")).unwrap();
            let service = h.service.with_source(SeededPercentage::new(seed));
            let ctx = Context::for_user("u1");

            let first = service.render_at("client", "app", "u1", &ctx, at(100)).unwrap();
            for offset in 1..4 {
                let next = service.render_at("client", "app", "u1", &ctx, at(100 + offset)).unwrap();
                prop_assert_eq!(&next.rendered, &first.rendered);
                prop_assert_eq!(&next.decisions, &first.decisions);
            }
        }
    }
}
