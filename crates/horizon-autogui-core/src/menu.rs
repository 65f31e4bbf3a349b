//! Static context menu items.
//!
//! Every context offers a fixed set of menu entries depending on its
//! representation: refresh, copy/paste through a [`TextTransfer`], loading
//! and saving its text form from a file, and picking a recent value from
//! its history. [`perform_menu_action`] carries an entry out; entries that
//! read or write the host object go through the context's task runner.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::{MappingContext, UpdateOutcome};
use crate::error::{AccessError, AutoGuiError, PreferencesError};
use crate::logging::targets;
use crate::task_runner::{TaskResult, TaskTicket};
use crate::type_model::ElementKind;
use crate::value::Value;

/// A text transfer channel such as the system clipboard.
pub trait TextTransfer: Send + Sync {
    /// Read the current text. `None` if the channel holds no text.
    fn get_text(&self) -> Result<Option<String>, AccessError>;

    /// Replace the current text.
    fn set_text(&self, text: &str) -> Result<(), AccessError>;
}

/// An in-process clipboard.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    text: Mutex<Option<String>>,
}

impl MemoryClipboard {
    /// Create an empty clipboard.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TextTransfer for MemoryClipboard {
    fn get_text(&self) -> Result<Option<String>, AccessError> {
        Ok(self.text.lock().clone())
    }

    fn set_text(&self, text: &str) -> Result<(), AccessError> {
        *self.text.lock() = Some(text.to_string());
        Ok(())
    }
}

/// A context menu entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuItem {
    /// Re-read the context subtree.
    Refresh,
    /// Put the value's text on the transfer channel.
    CopyAsString,
    /// Parse the transfer channel's text and commit it.
    PasteFromString,
    /// Parse a text file and commit it.
    LoadText,
    /// Write the value's text to a file.
    SaveText,
    /// Commit the history value at the given position, most recent first.
    SetFromHistory(usize),
}

impl MenuItem {
    /// Label for the menu entry.
    pub fn label(&self) -> String {
        match self {
            MenuItem::Refresh => "Refresh".into(),
            MenuItem::CopyAsString => "Copy".into(),
            MenuItem::PasteFromString => "Paste".into(),
            MenuItem::LoadText => "Load...".into(),
            MenuItem::SaveText => "Save...".into(),
            MenuItem::SetFromHistory(index) => format!("Recent value {}", index + 1),
        }
    }

    /// Whether the item needs a file path.
    pub fn needs_file(&self) -> bool {
        matches!(self, MenuItem::LoadText | MenuItem::SaveText)
    }
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// The entries applicable to `context`.
pub fn static_menu_items(context: &MappingContext) -> Vec<MenuItem> {
    if context.is_row_template() {
        return Vec::new();
    }
    let mut items = vec![MenuItem::Refresh];
    if matches!(context.kind(), ElementKind::Action | ElementKind::ActionList) {
        return items;
    }

    items.push(MenuItem::CopyAsString);
    let editable = context.is_editable();
    if editable {
        items.push(MenuItem::PasteFromString);
        items.push(MenuItem::LoadText);
    }
    items.push(MenuItem::SaveText);
    if editable {
        let recent = context.history().len();
        items.extend((0..recent).map(MenuItem::SetFromHistory));
    }
    items
}

/// Collaborators a menu action may need.
#[derive(Clone, Copy)]
pub struct MenuEnvironment<'a> {
    /// Channel used by copy and paste.
    pub transfer: &'a dyn TextTransfer,
    /// File used by load and save.
    pub file: Option<&'a Path>,
}

/// What a menu action did.
#[derive(Debug, Clone)]
pub enum MenuOutcome {
    /// A refresh or a commit was submitted to the task runner. Its result
    /// goes to the continuation.
    Submitted(TaskTicket),
    /// Text was written to the transfer channel or a file.
    Exported(String),
    /// Nothing to do, e.g. an empty clipboard.
    Nothing,
}

/// Carry out `item` on `context`.
///
/// `done` is only called for [`MenuOutcome::Submitted`] work: with `None`
/// after a refresh and with the update outcome after a commit.
#[tracing::instrument(skip_all, target = "horizon_autogui_core::menu", level = "trace", fields(item = %item))]
pub fn perform_menu_action<C>(
    context: &Arc<MappingContext>,
    item: &MenuItem,
    env: MenuEnvironment<'_>,
    mut done: C,
) -> Result<MenuOutcome, AutoGuiError>
where
    C: FnMut(TaskResult<Option<UpdateOutcome>>) + Send + 'static,
{
    match item {
        MenuItem::Refresh => Ok(MenuOutcome::Submitted(
            context.update_source_sub_tree_async(move |result| done(result.map(|()| None))),
        )),
        MenuItem::CopyAsString => {
            let text = context.to_display_string(&context.source_value());
            env.transfer.set_text(&text)?;
            Ok(MenuOutcome::Exported(text))
        }
        MenuItem::PasteFromString => match env.transfer.get_text()? {
            Some(text) => commit_text(context, &text, done),
            None => {
                tracing::debug!(target: targets::MENU, context = %context.path(), "nothing to paste");
                Ok(MenuOutcome::Nothing)
            }
        },
        MenuItem::LoadText => {
            let path = required_file(context, env)?;
            let text = std::fs::read_to_string(path).map_err(|e| PreferencesError::io(path, e))?;
            commit_text(context, text.trim_end_matches(['\r', '\n']), done)
        }
        MenuItem::SaveText => {
            let path = required_file(context, env)?;
            let text = context.to_display_string(&context.source_value());
            std::fs::write(path, &text).map_err(|e| PreferencesError::io(path, e))?;
            Ok(MenuOutcome::Exported(text))
        }
        MenuItem::SetFromHistory(index) => {
            let history = context.history();
            let len = history.len();
            let value = history
                .into_iter()
                .nth(*index)
                .ok_or(AccessError::RowOutOfBounds { row: *index, len })?;
            Ok(commit(context, value, done))
        }
    }
}

fn commit_text<C>(context: &Arc<MappingContext>, text: &str, done: C) -> Result<MenuOutcome, AutoGuiError>
where
    C: FnMut(TaskResult<Option<UpdateOutcome>>) + Send + 'static,
{
    let value = context.from_display_string(text)?;
    Ok(commit(context, value, done))
}

fn commit<C>(context: &Arc<MappingContext>, value: Value, mut done: C) -> MenuOutcome
where
    C: FnMut(TaskResult<Option<UpdateOutcome>>) + Send + 'static,
{
    MenuOutcome::Submitted(context.set_value_from_gui_async(value, context.clock(), move |result| {
        done(result.map(Some))
    }))
}

fn required_file<'a>(context: &MappingContext, env: MenuEnvironment<'a>) -> Result<&'a Path, AccessError> {
    env.file
        .ok_or_else(|| AccessError::Host(format!("no file given for '{}'", context.name())))
}
