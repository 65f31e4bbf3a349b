//! Core engine for Horizon AutoGui.
//!
//! This crate turns plain Rust types into a tree of bindable GUI contexts:
//!
//! - **Describe**: Member listings of host types, written by hand or
//!   generated by `#[derive(Describe)]`
//! - **Type Model**: Element trees built from descriptions under an
//!   inclusion policy
//! - **Representations**: An ordered chain of matchers choosing how each
//!   element is presented and converted
//! - **Context Tree**: Live bindings of elements to host values, with task
//!   clocks, listeners, selections, and history
//! - **Task Runner**: Host access off the interactive thread with a bounded
//!   fast wait and delayed delivery
//! - **Views and Sessions**: Widget-facing bindings, context menus, and
//!   teardown
//! - **Preferences**: Per-context value history and layout state persisted
//!   as JSON
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use horizon_autogui_core::{ContextTree, Describe, EngineConfig, MemberAttrs, TypeInfo, Value, Visibility, shared};
//!
//! struct Player {
//!     name: String,
//!     lives: u8,
//! }
//!
//! impl Describe for Player {
//!     fn describe() -> TypeInfo {
//!         TypeInfo::builder::<Self>()
//!             .field::<String>("name", |p| &p.name, |p| &mut p.name, MemberAttrs::new(), Visibility::Public)
//!             .field::<u8>("lives", |p| &p.lives, |p| &mut p.lives, MemberAttrs::new(), Visibility::Public)
//!             .build()
//!     }
//! }
//!
//! let player = shared(Player { name: "ada".into(), lives: 3 });
//! let tree = ContextTree::for_object(Arc::new(EngineConfig::default()), player.clone()).unwrap();
//! tree.populate();
//!
//! let lives = tree.root().member("lives").unwrap();
//! assert_eq!(lives.source_value(), Value::Integer(3));
//!
//! lives.set_value_from_gui(Value::Integer(2), lives.clock()).unwrap();
//! assert_eq!(player.read().lives, 2);
//! ```

pub mod clock;
pub mod config;
pub mod context;
pub mod describe;
pub mod dispatch;
mod error;
pub mod executor;
pub mod logging;
pub mod menu;
pub mod preferences;
pub mod progress;
pub mod repr;
pub mod session;
pub mod signal;
pub mod task_runner;
pub mod thread_check;
pub mod threadpool;
pub mod type_model;
pub mod value;
pub mod view;

pub use clock::{SharedTaskClock, TaskClock};
pub use config::{EngineConfig, EngineConfigBuilder, EngineSettings, InclusionSettings};
pub use context::{ContextTree, ContextTreeBuilder, MappingContext, SourceUpdate, UpdateOutcome};
pub use describe::{
    Describe, DescribeActions, MemberAccess, MemberAttrs, MemberDescriptor, MemberKind, TypeInfo,
    TypeInfoBuilder, Visibility,
};
pub use dispatch::{ImmediateDispatcher, InteractiveDispatcher, QueuedDispatcher};
pub use error::{
    AccessError, AutoGuiError, ConfigError, PreferencesError, Result, TaskError, ValueError,
};
pub use executor::{ContextExecutor, ExecutorBuilder};
pub use logging::{ContextTreeDebug, DisplayTree, PerfSpan, TreeFormatOptions, TreeStyle};
pub use menu::{
    MemoryClipboard, MenuEnvironment, MenuItem, MenuOutcome, TextTransfer, perform_menu_action,
    static_menu_items,
};
pub use preferences::{ContextPreferences, HistoryValueEntry, LayoutState, PreferencesStore};
pub use progress::{ProgressMonitor, ProgressReporter};
pub use repr::{Representation, RepresentationSet};
pub use session::{ActionBinding, Control, ControlId, Session};
pub use signal::{ConnectionId, Signal};
pub use task_runner::{ActionGuard, TaskKind, TaskResult, TaskRunner, TaskTicket};
pub use threadpool::{CancellationToken, TaskHandle, WaiterPool};
pub use type_model::{ElementId, ElementKind, InclusionPolicy, TypeElement, TypeModel};
pub use value::{Choice, EnumInfo, HostValue, ObjectRef, Shared, Value, ValueType, shared};
pub use view::{CommitCallback, MatchType, ValueBinding, ViewKind, ViewMappingSet};
