// Table State
//
// Derives each table's schema and file set from a sequence of actions.
// This module is pure and deterministic: the log is the only catalog.

use std::collections::BTreeMap;

use tracing::warn;

use crate::log::{Action, DataObjectAction, FileAction};

/// Replayed snapshot of every table, keyed by name.
pub type Tables = BTreeMap<String, Table>;

/// Derived view of one table as of a transaction's start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    files: Vec<String>,
    actions: Vec<Action>,
}

impl Table {
    /// A table declared in the current transaction, with no files yet.
    pub(crate) fn declared(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            files: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Data object keys, oldest commit first.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Actions that produced this state, in replay order.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }
}

/// Folds actions for a single table.
#[derive(Debug)]
pub struct TableBuilder {
    name: String,
    columns: Vec<String>,
    files: Vec<String>,
    actions: Vec<Action>,
}

impl TableBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            files: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Apply one action.
    ///
    /// Anything other than a metadata change or a file add is skipped with a
    /// warning; it never aborts the build.
    pub fn add(&mut self, action: Action) -> &mut Self {
        match &action {
            Action::ChangeMetadata(cm) => {
                self.columns = cm.columns.clone();
            }
            Action::DataObject(DataObjectAction {
                action: FileAction::Add,
                file,
                ..
            }) => {
                self.files.push(file.clone());
            }
            other => {
                warn!(table = %self.name, action = ?other, "unsupported action, skipping");
                return self;
            }
        }
        self.actions.push(action);
        self
    }

    pub fn build(self) -> Table {
        Table {
            name: self.name,
            columns: self.columns,
            files: self.files,
            actions: self.actions,
        }
    }
}

/// Group a flat, replay-ordered action sequence by table and build each.
///
/// Relative order of one table's actions is preserved.
pub fn build_tables(actions: impl IntoIterator<Item = Action>) -> Tables {
    let mut builders: BTreeMap<String, TableBuilder> = BTreeMap::new();

    for action in actions {
        builders
            .entry(action.table().to_string())
            .or_insert_with_key(|name| TableBuilder::new(name.clone()))
            .add(action);
    }

    builders
        .into_iter()
        .map(|(name, builder)| (name, builder.build()))
        .collect()
}
