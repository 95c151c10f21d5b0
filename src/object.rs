//! Descriptors for the schema objects a clone moves around.

use std::fmt;

use mysql_ddl::{quote_ident, TriggerParts};
use serde::Deserialize;

/// Kind of schema object, doubling as its DDL keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Table,
    View,
    Trigger,
    Function,
    Procedure,
}

impl ObjectKind {
    pub fn keyword(self) -> &'static str {
        match self {
            ObjectKind::Table => "TABLE",
            ObjectKind::View => "VIEW",
            ObjectKind::Trigger => "TRIGGER",
            ObjectKind::Function => "FUNCTION",
            ObjectKind::Procedure => "PROCEDURE",
        }
    }

    pub fn drop_statement(self, name: &str) -> String {
        format!("DROP {} IF EXISTS {}", self.keyword(), quote_ident(name))
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A table to clone and whether its rows come along.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TableCloneOption {
    pub name: String,
    #[serde(default = "default_copy_data")]
    pub copy_data: bool,
}

fn default_copy_data() -> bool {
    true
}

impl TableCloneOption {
    pub fn new(name: impl Into<String>, copy_data: bool) -> Self {
        Self {
            name: name.into(),
            copy_data,
        }
    }
}

/// A catalog entry from `information_schema.TABLES`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: String,
    pub is_base_table: bool,
}

impl TableDescriptor {
    pub fn from_catalog(name: String, table_type: &str) -> Self {
        Self {
            name,
            is_base_table: table_type.eq_ignore_ascii_case("BASE TABLE"),
        }
    }
}

/// A named create-statement read from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDefinition {
    pub name: String,
    pub create_statement: String,
}

impl ObjectDefinition {
    pub fn new(name: impl Into<String>, create_statement: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            create_statement: create_statement.into(),
        }
    }
}

/// Stored routine flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineKind {
    Function,
    Procedure,
}

impl RoutineKind {
    /// `ROUTINE_TYPE` from the catalog; anything but `FUNCTION` is a procedure.
    pub fn from_catalog(routine_type: &str) -> Self {
        if routine_type.trim().eq_ignore_ascii_case("FUNCTION") {
            RoutineKind::Function
        } else {
            RoutineKind::Procedure
        }
    }

    pub fn object_kind(self) -> ObjectKind {
        match self {
            RoutineKind::Function => ObjectKind::Function,
            RoutineKind::Procedure => ObjectKind::Procedure,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineDescriptor {
    pub name: String,
    pub kind: RoutineKind,
}

/// A trigger as discrete catalog fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerDescriptor {
    pub name: String,
    pub schema: Option<String>,
    pub table: String,
    pub timing: String,
    pub event: String,
    pub body: String,
}

impl TriggerDescriptor {
    pub fn parts(&self) -> TriggerParts<'_> {
        TriggerParts {
            name: &self.name,
            timing: &self.timing,
            event: &self.event,
            schema: self.schema.as_deref(),
            table: &self.table,
            body: &self.body,
        }
    }
}

/// Current-database names on both sides of a clone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaNames {
    pub source: Option<String>,
    pub destination: Option<String>,
}

impl SchemaNames {
    pub fn new(source: Option<String>, destination: Option<String>) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// `(source, destination)` when both are known and differ (ignoring case).
    pub fn rename(&self) -> Option<(&str, &str)> {
        match (self.source.as_deref(), self.destination.as_deref()) {
            (Some(source), Some(destination)) if !source.eq_ignore_ascii_case(destination) => {
                Some((source, destination))
            }
            _ => None,
        }
    }
}
