//! Job definition and related types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What to do when a firing finds the same job already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyPolicy {
    /// Run regardless; executions of the same job may overlap.
    #[default]
    AllowOverlap,
    /// Skip the new firing while a previous execution is still running.
    SkipIfRunning,
}

impl ConcurrencyPolicy {
    /// Stable string form used in the store layer.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConcurrencyPolicy::AllowOverlap => "allow",
            ConcurrencyPolicy::SkipIfRunning => "skip",
        }
    }

    /// Parse the stable string form. Unknown values fall back to the
    /// default so old rows stay readable.
    pub fn parse(s: &str) -> Self {
        match s {
            "skip" => ConcurrencyPolicy::SkipIfRunning,
            _ => ConcurrencyPolicy::AllowOverlap,
        }
    }
}

/// How an execution was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionKind {
    /// Fired by the trigger engine on its cron cadence.
    Scheduled,
    /// Triggered on demand through the controller.
    Manual,
}

impl ExecutionKind {
    /// Label used in log lines and default result messages.
    pub fn label(&self) -> &'static str {
        match self {
            ExecutionKind::Scheduled => "scheduled run",
            ExecutionKind::Manual => "manual run",
        }
    }
}

/// Input value for creating or updating a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    /// Human-readable job name.
    pub name: String,
    /// Key of the registered runnable this job executes.
    pub registry_key: String,
    /// Cron expression (six fields, seconds first).
    pub cron_expression: String,
    /// Whether the job should be scheduled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Optional free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Overlap policy for this job.
    #[serde(default)]
    pub concurrency: ConcurrencyPolicy,
}

fn default_enabled() -> bool {
    true
}

impl JobSpec {
    /// Create a new spec, enabled by default.
    pub fn new(
        name: impl Into<String>,
        registry_key: impl Into<String>,
        cron_expression: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            registry_key: registry_key.into(),
            cron_expression: cron_expression.into(),
            enabled: true,
            description: None,
            concurrency: ConcurrencyPolicy::default(),
        }
    }

    /// Add a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the concurrency policy.
    pub fn with_concurrency(mut self, concurrency: ConcurrencyPolicy) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Persisted job definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefinition {
    /// Stable job id.
    pub id: String,
    /// Human-readable job name.
    pub name: String,
    /// Key of the registered runnable this job executes.
    pub registry_key: String,
    /// Cron expression.
    pub cron_expression: String,
    /// Whether the job is scheduled.
    pub enabled: bool,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Overlap policy.
    pub concurrency: ConcurrencyPolicy,
    /// When the definition was created.
    pub created_at: DateTime<Utc>,
    /// When the definition was last modified.
    pub updated_at: DateTime<Utc>,
}

impl JobDefinition {
    /// Materialize a definition from a spec with a fresh id.
    pub fn from_spec(id: impl Into<String>, spec: JobSpec) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: spec.name,
            registry_key: spec.registry_key,
            cron_expression: spec.cron_expression,
            enabled: spec.enabled,
            description: spec.description,
            concurrency: spec.concurrency,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a spec to an existing definition, bumping `updated_at`.
    pub fn apply_spec(&mut self, spec: JobSpec) {
        self.name = spec.name;
        self.registry_key = spec.registry_key;
        self.cron_expression = spec.cron_expression;
        self.enabled = spec.enabled;
        self.description = spec.description;
        self.concurrency = spec.concurrency;
        self.updated_at = Utc::now();
    }
}
