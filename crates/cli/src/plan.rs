//! Load test plans: a list of timed probe events plus optional config overrides.
//!
//! ```toml
//! [run]
//! max_workers = 50
//!
//! [http]
//! cookie = "MoodleSession=abc"
//!
//! [[event]]
//! offset_ms = 0
//! url = "https://example.com/login"
//! expect = "Log in"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use stampede_core::{Config, StampedeError};
use stampede_probe::{HttpProbe, ProbeClient, ProbeError};

/// Upper bound on events in one plan.
pub const MAX_PLAN_EVENTS: usize = 100_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    #[serde(default)]
    pub run: RunOverrides,
    #[serde(default)]
    pub http: HttpOverrides,
    #[serde(default, rename = "event")]
    pub events: Vec<PlanEvent>,
}

/// One probe: GET `url` at `offset_ms` after start and match `expect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanEvent {
    pub offset_ms: u64,
    pub url: String,
    pub expect: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunOverrides {
    pub max_workers: Option<usize>,
    pub assumed_task_ms: Option<u64>,
    pub sample_interval_ms: Option<u64>,
    pub display_scale_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpOverrides {
    pub connect_timeout_ms: Option<u64>,
    pub read_timeout_ms: Option<u64>,
    pub user_agent: Option<String>,
    pub cookie: Option<String>,
}

impl Plan {
    pub fn load(path: &Path) -> Result<Self, StampedeError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
            .map_err(|e| StampedeError::Plan(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(text: &str) -> Result<Self, StampedeError> {
        let plan: Plan = toml::from_str(text).map_err(|e| StampedeError::Plan(e.to_string()))?;
        plan.validate()?;
        Ok(plan)
    }

    /// One event per offset in `from..=to`, `step` apart, all probing `url`.
    pub fn from_range(
        url: &str,
        expect: &str,
        from: u64,
        to: u64,
        step: u64,
    ) -> Result<Self, StampedeError> {
        if step == 0 {
            return Err(StampedeError::Plan("step must be greater than 0".into()));
        }
        if from > to {
            return Err(StampedeError::Plan(format!(
                "range start {from} is after range end {to}"
            )));
        }
        let count = (to - from) / step + 1;
        if count > MAX_PLAN_EVENTS as u64 {
            return Err(StampedeError::Plan(format!(
                "range yields {count} events, limit is {MAX_PLAN_EVENTS}"
            )));
        }
        let step = usize::try_from(step)
            .map_err(|_| StampedeError::Plan(format!("step {step} is too large")))?;
        let events = (from..=to)
            .step_by(step)
            .map(|offset_ms| PlanEvent {
                offset_ms,
                url: url.to_string(),
                expect: expect.to_string(),
            })
            .collect();
        let plan = Self {
            events,
            ..Self::default()
        };
        plan.validate()?;
        Ok(plan)
    }

    pub fn validate(&self) -> Result<(), StampedeError> {
        if self.events.is_empty() {
            return Err(StampedeError::Plan("plan has no events".into()));
        }
        if self.events.len() > MAX_PLAN_EVENTS {
            return Err(StampedeError::Plan(format!(
                "plan has {} events, limit is {MAX_PLAN_EVENTS}",
                self.events.len()
            )));
        }
        for (i, event) in self.events.iter().enumerate() {
            if event.url.trim().is_empty() {
                return Err(StampedeError::Plan(format!("event {i}: url is empty")));
            }
            if event.expect.is_empty() {
                return Err(StampedeError::Plan(format!("event {i}: expect is empty")));
            }
        }
        Ok(())
    }

    /// Latest offset in the plan.
    pub fn span_ms(&self) -> u64 {
        self.events.iter().map(|e| e.offset_ms).max().unwrap_or(0)
    }

    /// Layer the plan's `[run]` and `[http]` sections over `config`.
    pub fn apply_overrides(&self, config: &mut Config) {
        let run = &self.run;
        if let Some(v) = run.max_workers {
            config.run.max_workers = v;
        }
        if let Some(v) = run.assumed_task_ms {
            config.run.assumed_task_ms = v;
        }
        if let Some(v) = run.sample_interval_ms {
            config.run.sample_interval_ms = v;
        }
        if let Some(v) = run.display_scale_ms {
            config.run.display_scale_ms = v;
        }

        let http = &self.http;
        if let Some(v) = http.connect_timeout_ms {
            config.http.connect_timeout_ms = v;
        }
        if let Some(v) = http.read_timeout_ms {
            config.http.read_timeout_ms = v;
        }
        if let Some(v) = &http.user_agent {
            config.http.user_agent = v.clone();
        }
        if let Some(v) = &http.cookie {
            config.http.set_cookie(v);
        }
    }

    /// Build a probe per event, in plan order, failing on the first bad
    /// URL or pattern.
    pub fn build_probes(&self, client: &ProbeClient) -> Result<Vec<(u64, HttpProbe)>, ProbeError> {
        self.events
            .iter()
            .map(|e| Ok((e.offset_ms, HttpProbe::new(&e.url, &e.expect, client)?)))
            .collect()
    }
}
