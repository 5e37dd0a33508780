//! Dispatch configuration.

use crate::error::ConfigError;
use crate::violation::ViolationPolicy;
use serde::{Deserialize, Serialize};

/// How a queue lock waits while another worker holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LockStrategy {
    /// Busy-wait on compare-exchange with a CPU spin hint, no backoff.
    #[default]
    Spin,
    /// Exponential spinning that falls back to yielding the thread.
    Backoff,
}

/// What a dispatch does when a worker thread cannot be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpawnFailurePolicy {
    /// Release the started workers without work, join them and return
    /// [`crate::DispatchError::ThreadSpawn`].
    #[default]
    Abort,
    /// Run with the workers that did start. Their stealing sweeps drain the
    /// queues of the workers that never started.
    Degrade,
}

/// Which thread-launch backend a [`crate::Dispatcher`] uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackendKind {
    /// Platform default, see [`crate::backend::native`].
    #[default]
    Native,
    /// `std::thread::scope`.
    Std,
    /// `crossbeam::thread::scope`.
    Crossbeam,
}

/// Configuration for a [`crate::Dispatcher`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Requested worker count. `None` uses the host logical core count.
    pub workers: Option<usize>,
    /// Check after join that the workers completed exactly `N` elements.
    pub verify_completion: bool,
    pub lock: LockStrategy,
    pub on_violation: ViolationPolicy,
    pub on_spawn_failure: SpawnFailurePolicy,
    pub backend: BackendKind,
    /// Worker threads are named `{prefix}-{id}`.
    pub thread_name_prefix: String,
    /// Stack size for worker threads in bytes. `None` keeps the platform default.
    pub stack_size: Option<usize>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: None,
            verify_completion: true,
            lock: LockStrategy::Spin,
            on_violation: ViolationPolicy::Abort,
            on_spawn_failure: SpawnFailurePolicy::Abort,
            backend: BackendKind::Native,
            thread_name_prefix: "parvec-worker".to_string(),
            stack_size: None,
        }
    }
}

impl DispatchConfig {
    pub const ENV_NUM_THREADS: &'static str = "PARVEC_NUM_THREADS";
    pub const ENV_VERIFY: &'static str = "PARVEC_VERIFY";
    pub const ENV_LOCK: &'static str = "PARVEC_LOCK";

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_verify_completion(mut self, verify: bool) -> Self {
        self.verify_completion = verify;
        self
    }

    pub fn with_lock(mut self, lock: LockStrategy) -> Self {
        self.lock = lock;
        self
    }

    pub fn with_violation_policy(mut self, policy: ViolationPolicy) -> Self {
        self.on_violation = policy;
        self
    }

    pub fn with_spawn_failure_policy(mut self, policy: SpawnFailurePolicy) -> Self {
        self.on_spawn_failure = policy;
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Worker count requested for a call: the configured value, or the
    /// number of logical cores on the host.
    pub fn requested_workers(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get)
    }

    /// Defaults overridden by `PARVEC_NUM_THREADS`, `PARVEC_VERIFY` and
    /// `PARVEC_LOCK`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(Self::ENV_NUM_THREADS) {
            match value.trim().parse::<usize>() {
                Ok(0) => config.workers = None,
                Ok(n) => config.workers = Some(n),
                Err(_) => {
                    return Err(ConfigError::InvalidEnv {
                        key: Self::ENV_NUM_THREADS,
                        value,
                    });
                }
            }
        }

        if let Some(value) = lookup(Self::ENV_VERIFY) {
            config.verify_completion = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => true,
                "0" | "false" | "off" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        key: Self::ENV_VERIFY,
                        value,
                    });
                }
            };
        }

        if let Some(value) = lookup(Self::ENV_LOCK) {
            config.lock = match value.trim().to_ascii_lowercase().as_str() {
                "spin" => LockStrategy::Spin,
                "backoff" => LockStrategy::Backoff,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        key: Self::ENV_LOCK,
                        value,
                    });
                }
            };
        }

        Ok(config)
    }
}
