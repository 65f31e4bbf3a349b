//! Engine configuration.
//!
//! [`EngineConfig`] carries everything a context tree needs besides the host
//! object: the representation chain, view mappings, the inclusion policy,
//! and the task runner limits. It is built once, usually through
//! [`EngineConfigBuilder`], and shared by `Arc` between trees.
//!
//! [`EngineSettings`] is the serializable subset, loadable from JSON or
//! TOML. Missing keys take their defaults.
//!
//! ```
//! use horizon_autogui_core::config::EngineSettings;
//!
//! let settings = EngineSettings::from_toml_str(r#"
//!     history_limit = 5
//!     fast_wait_ms = 250
//!
//!     [inclusion]
//!     mode = "strict"
//! "#).unwrap();
//! let config = settings.into_config().unwrap();
//! assert_eq!(config.history_limit(), 5);
//! ```

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dispatch::{ImmediateDispatcher, InteractiveDispatcher};
use crate::error::{AutoGuiError, ConfigError};
use crate::executor::{DEFAULT_QUEUE_CAPACITY, ExecutorBuilder};
use crate::preferences::DEFAULT_HISTORY_LIMIT;
use crate::repr::{Representation, RepresentationSet};
use crate::task_runner::{DEFAULT_FAST_WAIT, TaskRunner};
use crate::threadpool::{DEFAULT_WAITER_THREADS, WaiterPool, WaiterPoolConfig};
use crate::type_model::InclusionPolicy;
use crate::view::{MatchType, ViewKind, ViewMappingSet};

/// Configuration shared by the context trees of one application.
pub struct EngineConfig {
    representations: RepresentationSet,
    view_mappings: ViewMappingSet,
    inclusion: InclusionPolicy,
    fast_wait: Duration,
    history_limit: usize,
    waiter_threads: usize,
    executor_queue_capacity: usize,
    dispatcher: Arc<dyn InteractiveDispatcher>,
    waiters: OnceLock<Arc<WaiterPool>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            representations: RepresentationSet::standard(),
            view_mappings: ViewMappingSet::standard(),
            inclusion: InclusionPolicy::default(),
            fast_wait: DEFAULT_FAST_WAIT,
            history_limit: DEFAULT_HISTORY_LIMIT,
            waiter_threads: DEFAULT_WAITER_THREADS,
            executor_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            dispatcher: Arc::new(ImmediateDispatcher),
            waiters: OnceLock::new(),
        }
    }
}

impl EngineConfig {
    /// Start from the defaults.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// The representation chain.
    pub fn representations(&self) -> &RepresentationSet {
        &self.representations
    }

    /// The view mappings.
    pub fn view_mappings(&self) -> &ViewMappingSet {
        &self.view_mappings
    }

    /// Which members become elements.
    pub fn inclusion(&self) -> InclusionPolicy {
        self.inclusion
    }

    /// How long the interactive thread waits for a task before a progress
    /// wait takes over.
    pub fn fast_wait(&self) -> Duration {
        self.fast_wait
    }

    /// History entries kept per context.
    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Waiter pool size.
    pub fn waiter_threads(&self) -> usize {
        self.waiter_threads
    }

    /// Bound of each executor queue.
    pub fn executor_queue_capacity(&self) -> usize {
        self.executor_queue_capacity
    }

    /// Dispatcher for continuations and queued listeners.
    pub fn dispatcher(&self) -> &Arc<dyn InteractiveDispatcher> {
        &self.dispatcher
    }

    /// The waiter pool of this configuration. The default size reuses the
    /// process-wide pool; other sizes get a pool of their own, created on
    /// first use.
    pub fn waiter_pool(&self) -> Result<Arc<WaiterPool>, ConfigError> {
        if let Some(pool) = self.waiters.get() {
            return Ok(pool.clone());
        }
        let pool = if self.waiter_threads == DEFAULT_WAITER_THREADS {
            WaiterPool::shared_default()?
        } else {
            Arc::new(WaiterPool::new(WaiterPoolConfig::with_threads(self.waiter_threads))?)
        };
        Ok(self.waiters.get_or_init(|| pool).clone())
    }

    /// Create a task runner with a dedicated executor thread named `name`.
    pub fn create_task_runner(&self, name: &str) -> Result<TaskRunner, AutoGuiError> {
        let executor = ExecutorBuilder::new()
            .name(name)
            .queue_capacity(self.executor_queue_capacity)
            .build()?;
        Ok(TaskRunner::new(
            Arc::new(executor),
            self.waiter_pool()?,
            self.dispatcher.clone(),
            self.fast_wait,
        ))
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("representations", &self.representations)
            .field("inclusion", &self.inclusion)
            .field("fast_wait", &self.fast_wait)
            .field("history_limit", &self.history_limit)
            .field("waiter_threads", &self.waiter_threads)
            .field("executor_queue_capacity", &self.executor_queue_capacity)
            .finish_non_exhaustive()
    }
}

/// Builder for [`EngineConfig`].
#[derive(Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Replace the representation chain.
    pub fn representations(mut self, representations: RepresentationSet) -> Self {
        self.config.representations = representations;
        self
    }

    /// Put a representation ahead of the standard ones.
    pub fn prepend_representation(mut self, representation: impl Representation + 'static) -> Self {
        self.config.representations.insert(0, representation);
        self
    }

    /// Replace the view mappings.
    pub fn view_mappings(mut self, view_mappings: ViewMappingSet) -> Self {
        self.config.view_mappings = view_mappings;
        self
    }

    /// Register one view mapping.
    pub fn view(mut self, representation: &'static str, match_type: MatchType, kind: ViewKind) -> Self {
        self.config.view_mappings.register(representation, match_type, kind);
        self
    }

    /// Set the inclusion policy.
    pub fn inclusion(mut self, inclusion: InclusionPolicy) -> Self {
        self.config.inclusion = inclusion;
        self
    }

    /// Set the fast-wait bound.
    pub fn fast_wait(mut self, fast_wait: Duration) -> Self {
        self.config.fast_wait = fast_wait;
        self
    }

    /// Set the per-context history limit.
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.config.history_limit = limit;
        self
    }

    /// Set the waiter pool size.
    pub fn waiter_threads(mut self, threads: usize) -> Self {
        self.config.waiter_threads = threads;
        self
    }

    /// Set the executor queue bound.
    pub fn executor_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.executor_queue_capacity = capacity;
        self
    }

    /// Set the dispatcher for continuations.
    pub fn dispatcher(mut self, dispatcher: Arc<dyn InteractiveDispatcher>) -> Self {
        self.config.dispatcher = dispatcher;
        self
    }

    /// Validate and finish.
    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        let config = self.config;
        if config.waiter_threads == 0 {
            return Err(ConfigError::InvalidValue {
                key: "waiter_threads",
                message: "at least one waiter thread is required".into(),
            });
        }
        if config.executor_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "executor_queue_capacity",
                message: "queue capacity must be positive".into(),
            });
        }
        if config.fast_wait.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "fast_wait",
                message: "fast wait must be positive".into(),
            });
        }
        Ok(config)
    }
}

/// Serializable inclusion policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InclusionSettings {
    Strict,
    Relaxed {
        #[serde(default)]
        include_crate_visible: bool,
    },
}

impl Default for InclusionSettings {
    fn default() -> Self {
        Self::Relaxed {
            include_crate_visible: false,
        }
    }
}

impl From<InclusionSettings> for InclusionPolicy {
    fn from(settings: InclusionSettings) -> Self {
        match settings {
            InclusionSettings::Strict => InclusionPolicy::Strict,
            InclusionSettings::Relaxed { include_crate_visible } => {
                InclusionPolicy::Relaxed { include_crate_visible }
            }
        }
    }
}

/// Engine settings as stored in a settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub inclusion: InclusionSettings,
    pub fast_wait_ms: u64,
    pub history_limit: usize,
    pub waiter_threads: usize,
    pub executor_queue_capacity: usize,
    /// Minimum composite members for the tabbed object pane.
    pub min_tabs: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            inclusion: InclusionSettings::default(),
            fast_wait_ms: DEFAULT_FAST_WAIT.as_millis() as u64,
            history_limit: DEFAULT_HISTORY_LIMIT,
            waiter_threads: DEFAULT_WAITER_THREADS,
            executor_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            min_tabs: 2,
        }
    }
}

impl EngineSettings {
    /// Parse JSON settings.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parse TOML settings.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build a validated configuration with the standard representations.
    pub fn into_config(self) -> Result<EngineConfig, ConfigError> {
        EngineConfig::builder()
            .representations(RepresentationSet::with_min_tabs(self.min_tabs))
            .inclusion(self.inclusion.into())
            .fast_wait(Duration::from_millis(self.fast_wait_ms))
            .history_limit(self.history_limit)
            .waiter_threads(self.waiter_threads)
            .executor_queue_capacity(self.executor_queue_capacity)
            .build()
    }
}
