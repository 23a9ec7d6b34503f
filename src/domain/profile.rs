use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::{Stage, Threshold};
use crate::error::LoadError;
use crate::metrics::{
    MetricKind, MetricRegistry, BURN_ERRORS, BURN_LATENCY, HTTP_REQ_DURATION, HTTP_REQ_FAILED,
};

/// In-cluster burn service targeted by the basic profile.
pub const BASIC_DEFAULT_TARGET: &str =
    "http://flask-load.monitoring.svc.cluster.local:5050/burn?seconds=3&work=1";
/// The validated profile targets the service on its second port.
pub const VALIDATED_DEFAULT_TARGET: &str =
    "http://flask-load.monitoring.svc.cluster.local:5051/burn?seconds=3&work=1";

/// Which built-in load profile to run.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProfileKind {
    /// Ramp and record latency only.
    Basic,
    /// Ramp, record latency, validate every response and count failures.
    #[default]
    Validated,
}

impl ProfileKind {
    pub fn default_target(self) -> &'static str {
        match self {
            ProfileKind::Basic => BASIC_DEFAULT_TARGET,
            ProfileKind::Validated => VALIDATED_DEFAULT_TARGET,
        }
    }
}

/// Ramp to 10, climb to 50, spike to 200 to trigger the autoscaler, cool
/// down to 50, then drain.
pub fn default_stages() -> Vec<Stage> {
    vec![
        Stage::new(Duration::from_secs(30), 10),
        Stage::new(Duration::from_secs(60), 50),
        Stage::new(Duration::from_secs(60), 200),
        Stage::new(Duration::from_secs(30), 50),
        Stage::new(Duration::from_secs(30), 0),
    ]
}

pub fn default_thresholds(kind: ProfileKind) -> BTreeMap<String, Vec<String>> {
    let mut thresholds = BTreeMap::new();
    thresholds.insert(HTTP_REQ_DURATION.to_string(), vec!["p(95)<2000".to_string()]);
    if kind == ProfileKind::Validated {
        thresholds.insert(HTTP_REQ_FAILED.to_string(), vec!["rate<0.10".to_string()]);
        thresholds.insert(BURN_LATENCY.to_string(), vec!["p(95)<3500".to_string()]);
    }
    thresholds
}

/// Load shape, pass/fail criteria and default target of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadProfile {
    pub kind: ProfileKind,
    pub stages: Vec<Stage>,
    pub thresholds: Vec<Threshold>,
    pub default_target: String,
}

impl LoadProfile {
    pub fn new(
        kind: ProfileKind,
        stages: Vec<Stage>,
        thresholds: &BTreeMap<String, Vec<String>>,
        default_target: impl Into<String>,
    ) -> Result<Self, LoadError> {
        let thresholds = thresholds
            .iter()
            .map(|(metric, exprs)| Threshold::parse(metric, exprs))
            .collect::<Result<Vec<_>, _>>()?;
        let profile = Self {
            kind,
            stages,
            thresholds,
            default_target: default_target.into(),
        };
        profile.validate()?;
        Ok(profile)
    }

    pub fn builtin(kind: ProfileKind) -> Result<Self, LoadError> {
        Self::new(kind, default_stages(), &default_thresholds(kind), kind.default_target())
    }

    pub fn validates_responses(&self) -> bool {
        self.kind == ProfileKind::Validated
    }

    /// Metrics this profile produces: the built-ins plus its custom metrics.
    pub fn registry(&self) -> Result<MetricRegistry, LoadError> {
        let mut registry = MetricRegistry::with_builtins();
        let mut custom = vec![(BURN_LATENCY, MetricKind::Trend)];
        if self.validates_responses() {
            custom.push((BURN_ERRORS, MetricKind::Counter));
        }
        for (name, kind) in custom {
            registry.declare(name, kind)?;
        }
        Ok(registry)
    }

    pub fn validate(&self) -> Result<(), LoadError> {
        if self.stages.is_empty() {
            return Err(LoadError::EmptyProfile);
        }
        let registry = self.registry()?;
        for threshold in &self.thresholds {
            threshold.validate(&registry)?;
        }
        Ok(())
    }

    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|stage| stage.duration).sum()
    }

    /// Target URL for the run: a non-empty override verbatim, otherwise the
    /// profile default.
    pub fn resolve_target(&self, override_url: Option<&str>) -> String {
        match override_url {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => self.default_target.clone(),
        }
    }
}
