use crate::TaskError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Running,
    Retrying,
    Success,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }
}

/// Which failures a retry policy reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryOn {
    /// Every failure except a defined negative outcome is retried.
    AnyError,
    /// Only failures classified as transient are retried.
    Transient,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub retry_on: RetryOn,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
            retry_on: RetryOn::Transient,
        }
    }

    /// Single attempt, no retry.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn with_retry_on(mut self, retry_on: RetryOn) -> Self {
        self.retry_on = retry_on;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Whether a failure on the given 1-based attempt earns another attempt.
    pub fn allows_retry(&self, error: &TaskError, attempt: u32) -> bool {
        if error.is_defined_outcome() || attempt >= self.max_attempts() {
            return false;
        }

        match self.retry_on {
            RetryOn::AnyError => true,
            RetryOn::Transient => error.is_transient(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Static description of a unit of pipeline work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub name: String,
    pub description: String,
    /// Audit-log module tag the task reports under
    pub module: String,
    pub policy: RetryPolicy,
}

impl TaskDescriptor {
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            module: module.into(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// State of one execution of a [`TaskDescriptor`].
///
/// `Pending -> Running -> {Success, Retrying, Failed}`, with `Retrying`
/// looping back to `Running` after the policy delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRun {
    pub id: String,
    pub name: String,
    pub status: TaskStatus,
    pub attempts: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl TaskRun {
    pub fn new(descriptor: &TaskDescriptor) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: descriptor.name.clone(),
            status: TaskStatus::Pending,
            attempts: 0,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    pub fn start(&mut self) {
        self.status = TaskStatus::Running;
        self.attempts += 1;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
    }

    pub fn retry(&mut self, error: String) {
        self.status = TaskStatus::Retrying;
        self.error = Some(error);
    }

    pub fn succeed(&mut self) {
        self.status = TaskStatus::Success;
        self.completed_at = Some(Utc::now());
        self.error = None;
    }

    pub fn fail(&mut self, error: String) {
        self.status = TaskStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error);
    }
}
