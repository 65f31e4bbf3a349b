//! Per-context value history and layout state.
//!
//! Each context owns a [`ContextPreferences`] addressed by its path, the
//! `/`-joined names of the context and its ancestors. The
//! [`PreferencesStore`] persists all of them as one JSON object tree that
//! mirrors the paths:
//!
//! ```json
//! {
//!   "Settings": {
//!     "$tab": { "selected_index": 1 },
//!     "name": {
//!       "history": [
//!         { "value": "draft", "time": "2026-01-02T03:04:05+00:00", "index": 0 }
//!       ]
//!     }
//!   }
//! }
//! ```
//!
//! Child names that collide with the reserved keys (`history`, anything
//! starting with `$`) or that start with `~` are stored with a `~` prefix,
//! so a member called `history` lands under `"~history"`.
//!
//! Loading is tolerant: malformed nodes, entries, and layout fields fall
//! back to defaults and are logged. Saving is explicit; the store's
//! `changed` signal reports layout changes so the host can decide when to
//! save.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::error::PreferencesError;
use crate::logging::targets;
use crate::signal::Signal;

/// Default number of history entries kept per context.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Reserved key holding [`LayoutState`].
pub const LAYOUT_KEY: &str = "$tab";

/// Reserved key holding the history list.
pub const HISTORY_KEY: &str = "history";

/// Separator between names in a context path.
pub const PATH_SEPARATOR: char = '/';

/// Prefix marking an escaped child name.
pub const ESCAPE_PREFIX: char = '~';

/// The JSON key of a child node named `name`.
pub fn child_key(name: &str) -> Cow<'_, str> {
    if name == HISTORY_KEY || name.starts_with('$') || name.starts_with(ESCAPE_PREFIX) {
        Cow::Owned(format!("{ESCAPE_PREFIX}{name}"))
    } else {
        Cow::Borrowed(name)
    }
}

/// One committed value in a context history.
///
/// An entry whose index is `-1` or whose value is null is a tombstone: it
/// keeps its slot but is never shown.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryValueEntry {
    /// The value as persisted JSON.
    pub value: Json,
    /// When the value was last committed.
    pub time: DateTime<Utc>,
    /// Stable slot index.
    pub index: i64,
}

impl Default for HistoryValueEntry {
    fn default() -> Self {
        Self {
            value: Json::Null,
            time: DateTime::<Utc>::UNIX_EPOCH,
            index: -1,
        }
    }
}

impl HistoryValueEntry {
    /// Returns true if this entry is hidden from history menus.
    pub fn is_tombstone(&self) -> bool {
        self.index < 0 || self.value.is_null()
    }

    fn to_json(&self) -> Json {
        serde_json::json!({
            "value": self.value,
            "time": self.time.to_rfc3339(),
            "index": self.index,
        })
    }

    /// Read an entry, keeping defaults for missing or malformed fields.
    fn from_json_tolerant(json: &Json) -> Self {
        let mut entry = Self::default();
        let Some(object) = json.as_object() else {
            tracing::warn!(target: targets::PREFERENCES, "history entry is not an object");
            return entry;
        };
        if let Some(value) = object.get("value") {
            entry.value = value.clone();
        }
        if let Some(time) = object.get("time").and_then(Json::as_str) {
            match DateTime::parse_from_rfc3339(time) {
                Ok(parsed) => entry.time = parsed.with_timezone(&Utc),
                Err(e) => tracing::warn!(
                    target: targets::PREFERENCES,
                    time,
                    error = %e,
                    "malformed history time"
                ),
            }
        }
        if let Some(index) = object.get("index").and_then(Json::as_i64) {
            entry.index = index;
        }
        entry
    }
}

/// Structural widget state stored under `"$tab"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutState {
    /// Selected tab or row.
    pub selected_index: Option<usize>,
    /// Table column widths.
    pub column_widths: Vec<u32>,
    /// Free-form entries owned by widget adapters.
    pub entries: BTreeMap<String, Json>,
}

impl LayoutState {
    /// Read the layout field by field; a malformed field keeps its default
    /// without affecting the others.
    fn from_json_tolerant(json: &Json, path: &str) -> Self {
        let mut layout = Self::default();
        let Some(object) = json.as_object() else {
            tracing::warn!(target: targets::PREFERENCES, path, "layout state is not an object");
            return layout;
        };
        for (field, value) in object {
            let value = value.clone();
            let result = match field.as_str() {
                "selected_index" => serde_json::from_value(value).map(|v| layout.selected_index = v),
                "column_widths" => serde_json::from_value(value).map(|v| layout.column_widths = v),
                "entries" => serde_json::from_value(value).map(|v| layout.entries = v),
                _ => continue,
            };
            if let Err(e) = result {
                tracing::warn!(
                    target: targets::PREFERENCES,
                    path,
                    field = %field,
                    error = %e,
                    "malformed layout field; using default"
                );
            }
        }
        layout
    }
}

#[derive(Debug, Default)]
struct PreferencesState {
    history: Vec<HistoryValueEntry>,
    layout: LayoutState,
}

/// History and layout state of one context.
#[derive(Debug)]
pub struct ContextPreferences {
    path: String,
    history_limit: usize,
    state: Mutex<PreferencesState>,
    changed: Arc<Signal<String>>,
}

impl ContextPreferences {
    fn new(path: String, history_limit: usize, changed: Arc<Signal<String>>) -> Self {
        Self {
            path,
            history_limit: history_limit.max(1),
            state: Mutex::new(PreferencesState::default()),
            changed,
        }
    }

    /// The context path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Maximum number of history slots.
    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Record a committed value.
    ///
    /// An equal visible entry only has its time refreshed. Otherwise the
    /// value takes a new slot while below the limit, or replaces the oldest
    /// slot (tombstones first) once the limit is reached. Null values are
    /// ignored.
    pub fn add_history_value(&self, value: Json) {
        if value.is_null() {
            return;
        }
        let now = Utc::now();
        let mut state = self.state.lock();
        let history = &mut state.history;

        if let Some(existing) = history.iter_mut().find(|e| !e.is_tombstone() && e.value == value) {
            existing.time = now;
            return;
        }

        if history.len() < self.history_limit {
            let index = history.len() as i64;
            history.push(HistoryValueEntry { value, time: now, index });
            return;
        }

        let oldest = history
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| (!e.is_tombstone(), e.time))
            .map(|(slot, _)| slot);
        if let Some(slot) = oldest {
            history[slot] = HistoryValueEntry {
                value,
                time: now,
                index: slot as i64,
            };
        }
    }

    /// All entries in slot order, tombstones included.
    pub fn history_entries(&self) -> Vec<HistoryValueEntry> {
        self.state.lock().history.clone()
    }

    /// Visible values, most recent first.
    pub fn history_values(&self) -> Vec<Json> {
        let mut visible: Vec<_> = self
            .state
            .lock()
            .history
            .iter()
            .filter(|e| !e.is_tombstone())
            .cloned()
            .collect();
        visible.sort_by(|a, b| b.time.cmp(&a.time).then(a.index.cmp(&b.index)));
        visible.into_iter().map(|e| e.value).collect()
    }

    /// Turn the entry in `slot` into a tombstone. Later slots keep their
    /// indices.
    pub fn remove_history_slot(&self, slot: usize) -> bool {
        let mut state = self.state.lock();
        match state.history.get_mut(slot) {
            Some(entry) if !entry.is_tombstone() => {
                entry.value = Json::Null;
                entry.index = -1;
                true
            }
            _ => false,
        }
    }

    /// Drop all history.
    pub fn clear_history(&self) {
        self.state.lock().history.clear();
    }

    /// The layout state.
    pub fn layout(&self) -> LayoutState {
        self.state.lock().layout.clone()
    }

    /// Change the layout state and notify the store if it differs.
    pub fn update_layout(&self, update: impl FnOnce(&mut LayoutState)) {
        let changed = {
            let mut state = self.state.lock();
            let before = state.layout.clone();
            update(&mut state.layout);
            state.layout != before
        };
        if changed {
            self.changed.emit(self.path.clone());
        }
    }

    fn load_node(&self, node: &Json) {
        let Some(object) = node.as_object() else {
            tracing::warn!(
                target: targets::PREFERENCES,
                path = %self.path,
                "preferences node is not an object; using defaults"
            );
            return;
        };
        let mut state = self.state.lock();
        if let Some(layout) = object.get(LAYOUT_KEY) {
            state.layout = LayoutState::from_json_tolerant(layout, &self.path);
        }
        match object.get(HISTORY_KEY) {
            Some(Json::Array(entries)) => {
                let mut history: Vec<_> = entries.iter().map(HistoryValueEntry::from_json_tolerant).collect();
                history.truncate(self.history_limit);
                state.history = history;
            }
            Some(_) => tracing::warn!(
                target: targets::PREFERENCES,
                path = %self.path,
                "history is not a list; ignoring"
            ),
            None => {}
        }
    }

    fn write_node(&self, node: &mut Map<String, Json>) {
        let state = self.state.lock();
        if state.layout != LayoutState::default() {
            if let Ok(layout) = serde_json::to_value(&state.layout) {
                node.insert(LAYOUT_KEY.to_string(), layout);
            }
        } else {
            node.remove(LAYOUT_KEY);
        }
        if state.history.is_empty() {
            node.remove(HISTORY_KEY);
        } else {
            node.insert(
                HISTORY_KEY.to_string(),
                Json::Array(state.history.iter().map(HistoryValueEntry::to_json).collect()),
            );
        }
    }
}

/// The persisted preferences of one context tree.
pub struct PreferencesStore {
    history_limit: usize,
    contexts: Mutex<HashMap<String, Arc<ContextPreferences>>>,
    loaded: Mutex<Json>,
    changed: Arc<Signal<String>>,
}

impl PreferencesStore {
    /// Create an empty store.
    pub fn new(history_limit: usize) -> Self {
        Self {
            history_limit,
            contexts: Mutex::new(HashMap::new()),
            loaded: Mutex::new(Json::Object(Map::new())),
            changed: Arc::new(Signal::new()),
        }
    }

    /// The preferences of the context at `path`, created on first use from
    /// whatever was loaded for it.
    pub fn context(&self, path: &str) -> Arc<ContextPreferences> {
        let mut contexts = self.contexts.lock();
        if let Some(existing) = contexts.get(path) {
            return existing.clone();
        }
        let preferences = Arc::new(ContextPreferences::new(
            path.to_string(),
            self.history_limit,
            self.changed.clone(),
        ));
        if let Some(node) = node_at(&self.loaded.lock(), path) {
            preferences.load_node(node);
        }
        contexts.insert(path.to_string(), preferences.clone());
        preferences
    }

    /// Emitted with the context path whenever layout state changes.
    pub fn on_changed(&self) -> &Signal<String> {
        &self.changed
    }

    /// Load a persisted blob. Never fails: invalid JSON leaves the store
    /// empty and is logged. Live contexts are reloaded from the blob.
    pub fn load_str(&self, text: &str) {
        let json = match serde_json::from_str::<Json>(text) {
            Ok(json @ Json::Object(_)) => json,
            Ok(_) => {
                tracing::warn!(target: targets::PREFERENCES, "preferences root is not an object");
                Json::Object(Map::new())
            }
            Err(e) => {
                tracing::warn!(target: targets::PREFERENCES, error = %e, "invalid preferences JSON");
                Json::Object(Map::new())
            }
        };
        *self.loaded.lock() = json;

        let contexts: Vec<_> = self.contexts.lock().values().cloned().collect();
        let loaded = self.loaded.lock();
        for preferences in contexts {
            *preferences.state.lock() = PreferencesState::default();
            if let Some(node) = node_at(&loaded, preferences.path()) {
                preferences.load_node(node);
            }
        }
    }

    /// Load a preferences file. Only I/O failures are errors.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<(), PreferencesError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PreferencesError::io(path, e))?;
        self.load_str(&text);
        Ok(())
    }

    /// The persisted form of all contexts, merged over what was loaded.
    pub fn to_json(&self) -> Json {
        let mut root = self.loaded.lock().clone();
        let mut contexts: Vec<_> = self.contexts.lock().values().cloned().collect();
        contexts.sort_by(|a, b| a.path().cmp(b.path()));
        for preferences in contexts {
            if let Some(node) = node_at_mut(&mut root, preferences.path()) {
                preferences.write_node(node);
            }
        }
        root
    }

    /// Serialize to a pretty-printed JSON string.
    pub fn save_to_string(&self) -> Result<String, PreferencesError> {
        Ok(serde_json::to_string_pretty(&self.to_json())?)
    }

    /// Write the preferences file.
    pub fn save_file(&self, path: impl AsRef<Path>) -> Result<(), PreferencesError> {
        let path = path.as_ref();
        let text = self.save_to_string()?;
        std::fs::write(path, text).map_err(|e| PreferencesError::io(path, e))
    }
}

impl std::fmt::Debug for PreferencesStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferencesStore")
            .field("history_limit", &self.history_limit)
            .field("contexts", &self.contexts.lock().len())
            .finish()
    }
}

fn node_at<'a>(root: &'a Json, path: &str) -> Option<&'a Json> {
    path.split(PATH_SEPARATOR)
        .filter(|s| !s.is_empty())
        .try_fold(root, |node, name| node.get(child_key(name).as_ref()))
}

fn node_at_mut<'a>(root: &'a mut Json, path: &str) -> Option<&'a mut Map<String, Json>> {
    let mut node = root;
    for name in path.split(PATH_SEPARATOR).filter(|s| !s.is_empty()) {
        let object = node.as_object_mut()?;
        let child = object
            .entry(child_key(name).into_owned())
            .or_insert_with(|| Json::Object(Map::new()));
        if !child.is_object() {
            *child = Json::Object(Map::new());
        }
        node = child;
    }
    node.as_object_mut()
}

static_assertions::assert_impl_all!(PreferencesStore: Send, Sync);
