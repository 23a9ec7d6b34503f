use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::domain::{default_stages, default_thresholds, LoadProfile, ProfileKind, Stage};
use crate::driver::{CheckLimits, IterationSettings};
use crate::runner::{RunPlan, RunnerSettings};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
/// Environment variable overriding the request URL, read verbatim.
pub const TARGET_ENV: &str = "TARGET";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub profile: ProfileConfig,
    pub iteration: IterationConfig,
    pub http: HttpConfig,
    pub runner: RunnerConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub name: ProfileKind,
    /// Replaces the built-in stages when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stages: Option<Vec<Stage>>,
    /// Replaces the built-in thresholds when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<BTreeMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_target: Option<String>,
}

impl ProfileConfig {
    pub fn build(&self, kind: ProfileKind) -> Result<LoadProfile> {
        let stages = self.stages.clone().unwrap_or_else(default_stages);
        let thresholds = self
            .thresholds
            .clone()
            .unwrap_or_else(|| default_thresholds(kind));
        let default_target = match kind {
            ProfileKind::Basic => self.basic_target.as_deref(),
            ProfileKind::Validated => self.validated_target.as_deref(),
        }
        .unwrap_or(kind.default_target());

        LoadProfile::new(kind, stages, &thresholds, default_target)
            .with_context(|| format!("invalid {kind} profile"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationConfig {
    pub pause_ms: u64,
    pub max_duration_ms: u64,
    pub body_preview_chars: usize,
}

impl Default for IterationConfig {
    fn default() -> Self {
        Self {
            pause_ms: 50,
            max_duration_ms: 5000,
            body_preview_chars: 100,
        }
    }
}

impl IterationConfig {
    pub fn settings(&self, validate: bool) -> IterationSettings {
        IterationSettings {
            pause: Duration::from_millis(self.pause_ms),
            validation: validate.then(|| CheckLimits {
                max_duration: Duration::from_millis(self.max_duration_ms),
            }),
            body_preview_chars: self.body_preview_chars,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 60,
            user_agent: concat!("burn-load/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    pub tick_ms: u64,
    pub graceful_stop_seconds: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            graceful_stop_seconds: 30,
        }
    }
}

impl RunnerConfig {
    pub fn settings(&self) -> RunnerSettings {
        RunnerSettings {
            tick: Duration::from_millis(self.tick_ms.max(1)),
            graceful_stop: Duration::from_secs(self.graceful_stop_seconds),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5051,
            request_timeout_secs: 120,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

impl Config {
    /// Defaults, then the TOML file (if present), then `BURNLOAD__*` env vars.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("BURNLOAD__").split("__"));
        figment
            .extract()
            .with_context(|| format!("failed to load configuration from {}", path.as_ref().display()))
    }

    /// Resolve the profile and target for a run. `profile` overrides the
    /// configured profile name; `target_override` is the raw `TARGET` value.
    pub fn run_plan(&self, profile: Option<ProfileKind>, target_override: Option<&str>) -> Result<RunPlan> {
        let kind = profile.unwrap_or(self.profile.name);
        let profile = self.profile.build(kind)?;
        let target = profile.resolve_target(target_override);
        let iteration = self.iteration.settings(profile.validates_responses());
        Ok(RunPlan {
            profile,
            target,
            iteration,
            runner: self.runner.settings(),
        })
    }
}
