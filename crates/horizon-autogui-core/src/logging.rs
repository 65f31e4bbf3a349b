//! Logging and debugging facilities.
//!
//! All subsystems log through `tracing` with the targets listed in
//! [`targets`]. Install a subscriber in the application to see them:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("horizon_autogui_core::task=debug")
//!     .init();
//! ```
//!
//! [`ContextTreeDebug`] renders a context tree with representation names,
//! clocks, and current values.

use std::fmt::{self, Write as FmtWrite};

use crate::context::{ContextTree, MappingContext};
use crate::value::short_type_name;

/// Target names for log filtering.
pub mod targets {
    /// Crate root target.
    pub const CORE: &str = "horizon_autogui_core";
    /// Type model construction.
    pub const TYPE_MODEL: &str = "horizon_autogui_core::type_model";
    /// Context tree reads, writes, and notifications.
    pub const CONTEXT: &str = "horizon_autogui_core::context";
    /// Representation resolution.
    pub const REPR: &str = "horizon_autogui_core::repr";
    /// Task submission, waits, and continuations.
    pub const TASK: &str = "horizon_autogui_core::task";
    /// Executor threads.
    pub const EXECUTOR: &str = "horizon_autogui_core::executor";
    /// Interactive-thread checks.
    pub const THREAD: &str = "horizon_autogui_core::thread";
    /// Timed operations from [`PerfSpan`](super::PerfSpan).
    pub const PERF: &str = "horizon_autogui_core::perf";
    /// Listener emission.
    pub const SIGNAL: &str = "horizon_autogui_core::signal";
    /// Preferences and history.
    pub const PREFERENCES: &str = "horizon_autogui_core::preferences";
    /// Progress waits.
    pub const PROGRESS: &str = "horizon_autogui_core::progress";
    /// Widget bindings.
    pub const VIEW: &str = "horizon_autogui_core::view";
    /// Menu actions.
    pub const MENU: &str = "horizon_autogui_core::menu";
    /// Session lifecycle.
    pub const SESSION: &str = "horizon_autogui_core::session";
}

/// Style options for context tree visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Compact single-line representation.
    Compact,
}

/// Configuration for context tree debug output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    /// The style of tree visualization.
    pub style: TreeStyle,
    /// Whether to show representation names.
    pub show_representations: bool,
    /// Whether to show clocks.
    pub show_clocks: bool,
    /// Whether to show current values.
    pub show_values: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
    /// Indent size for each level.
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_representations: true,
            show_clocks: false,
            show_values: true,
            max_depth: None,
            indent_size: 2,
        }
    }
}

impl TreeFormatOptions {
    /// Everything shown.
    pub fn detailed() -> Self {
        Self {
            show_clocks: true,
            ..Default::default()
        }
    }

    /// Names only.
    pub fn minimal() -> Self {
        Self {
            show_representations: false,
            show_clocks: false,
            show_values: false,
            ..Default::default()
        }
    }
}

/// Renders a context tree.
#[derive(Debug, Clone, Default)]
pub struct ContextTreeDebug {
    options: TreeFormatOptions,
}

impl ContextTreeDebug {
    /// A formatter with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// A formatter with custom options.
    pub fn with_options(options: TreeFormatOptions) -> Self {
        Self { options }
    }

    /// Format a whole tree.
    pub fn format_tree(&self, tree: &ContextTree) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Context Tree ({} contexts):", tree.contexts().len());
        self.format_into(tree.root(), 0, true, &mut output);
        output
    }

    /// Format the subtree below `context`.
    pub fn format_subtree(&self, context: &MappingContext) -> String {
        let mut output = String::new();
        self.format_into(context, 0, true, &mut output);
        output
    }

    fn format_into(&self, context: &MappingContext, depth: usize, is_last: bool, output: &mut String) {
        if self.options.max_depth.is_some_and(|max| depth > max) {
            return;
        }

        output.push_str(&self.build_prefix(depth, is_last));
        output.push_str(context.name());
        let _ = write!(output, " <{:?}>", context.kind());
        if self.options.show_representations {
            let _ = write!(output, " [{}]", context.representation().name());
        }
        if self.options.show_clocks {
            let _ = write!(output, " @{}", context.clock());
        }
        if self.options.show_values && !context.is_row_template() && context.has_been_read() {
            let value = context.source_value();
            let text = match value.as_object() {
                Some(object) => short_type_name(object.type_name()).to_string(),
                None => context.to_display_string(&value),
            };
            let _ = write!(output, " = {text}");
        }
        output.push('\n');

        let children = context.children();
        for (i, child) in children.iter().enumerate() {
            self.format_into(child, depth + 1, i + 1 == children.len(), output);
        }
    }

    fn build_prefix(&self, depth: usize, is_last: bool) -> String {
        if depth == 0 {
            return String::new();
        }

        let (branch, corner, last) = match self.options.style {
            TreeStyle::Ascii => ("|", "+-- ", "`-- "),
            TreeStyle::Unicode => ("\u{2502}", "\u{251c}\u{2500}\u{2500} ", "\u{2514}\u{2500}\u{2500} "),
            TreeStyle::Compact => ("", "- ", "- "),
        };

        let mut prefix = String::new();
        for _ in 0..(depth - 1) {
            prefix.push_str(branch);
            prefix.push_str(&" ".repeat(self.options.indent_size));
        }
        prefix.push_str(if is_last { last } else { corner });
        prefix
    }
}

/// Adapter rendering a tree with [`fmt::Display`].
pub struct DisplayTree<'a> {
    tree: &'a ContextTree,
    debug: ContextTreeDebug,
}

impl<'a> DisplayTree<'a> {
    /// Display `tree` with the given options.
    pub fn new(tree: &'a ContextTree, options: TreeFormatOptions) -> Self {
        Self {
            tree,
            debug: ContextTreeDebug::with_options(options),
        }
    }
}

impl fmt::Display for DisplayTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.debug.format_tree(self.tree))
    }
}

/// A guard that keeps a tracing span entered until dropped.
#[derive(Debug)]
pub struct PerfSpan {
    _span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Enter a span named after `operation`.
    pub fn new(operation: &'static str) -> Self {
        let span = tracing::info_span!(target: targets::PERF, "perf", operation);
        Self { _span: span.entered() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::describe::{Describe, MemberAttrs, TypeInfo, Visibility};
    use crate::value::shared;
    use std::sync::Arc;

    struct Point {
        x: i32,
        y: i32,
    }

    impl Describe for Point {
        fn describe() -> TypeInfo {
            TypeInfo::builder::<Self>()
                .field::<i32>("x", |p| &p.x, |p| &mut p.x, MemberAttrs::new(), Visibility::Public)
                .field::<i32>("y", |p| &p.y, |p| &mut p.y, MemberAttrs::new(), Visibility::Public)
                .build()
        }
    }

    fn tree() -> ContextTree {
        let tree = ContextTree::for_object(Arc::new(EngineConfig::default()), shared(Point { x: 1, y: 2 })).unwrap();
        tree.populate();
        tree
    }

    struct TargetRecorder(Arc<parking_lot::Mutex<Vec<String>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for TargetRecorder {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
            self.0.lock().push(event.metadata().target().to_string());
        }

        fn on_new_span(
            &self,
            attrs: &tracing::span::Attributes<'_>,
            _id: &tracing::span::Id,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            self.0.lock().push(attrs.metadata().target().to_string());
        }
    }

    #[test]
    fn test_events_use_declared_targets() {
        use tracing_subscriber::layer::SubscriberExt;

        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(TargetRecorder(seen.clone()));
        tracing::subscriber::with_default(subscriber, || {
            crate::thread_check::set_interactive_thread();
            crate::thread_check::clear_interactive_thread();
            crate::preferences::PreferencesStore::new(1).load_str("not json");
            let _span = PerfSpan::new("populate");
        });

        let seen = seen.lock();
        for target in [targets::THREAD, targets::PREFERENCES, targets::PERF] {
            assert!(seen.iter().any(|t| t == target), "{target} not seen in {seen:?}");
            assert!(target.starts_with(targets::CORE));
        }
    }

    #[test]
    fn test_default_format() {
        let output = ContextTreeDebug::new().format_tree(&tree());
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "Context Tree (3 contexts):");
        assert_eq!(lines[1], "Point <Object> [object-pane] = Point");
        assert_eq!(lines[2], "\u{251c}\u{2500}\u{2500} x <Property> [number] = 1");
        assert_eq!(lines[3], "\u{2514}\u{2500}\u{2500} y <Property> [number] = 2");
    }

    #[test]
    fn test_minimal_ascii_format() {
        let options = TreeFormatOptions {
            style: TreeStyle::Ascii,
            ..TreeFormatOptions::minimal()
        };
        let tree = tree();
        let output = DisplayTree::new(&tree, options).to_string();
        assert!(output.contains("+-- x <Property>\n"));
        assert!(output.contains("`-- y <Property>\n"));
    }

    #[test]
    fn test_max_depth() {
        let options = TreeFormatOptions {
            max_depth: Some(0),
            ..Default::default()
        };
        let tree = tree();
        let output = ContextTreeDebug::with_options(options).format_subtree(tree.root());
        assert_eq!(output.lines().count(), 1);
    }

    #[test]
    fn test_detailed_shows_clocks() {
        let tree = tree();
        let output = ContextTreeDebug::with_options(TreeFormatOptions::detailed()).format_subtree(tree.root());
        assert!(output.contains(" @0:1"));
    }
}
