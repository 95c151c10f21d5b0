//! `CREATE TRIGGER` reconstruction.
//!
//! `SHOW CREATE TRIGGER` output is tied to the source schema and definer, so
//! triggers are rebuilt from their discrete catalog fields instead.

use crate::ident::{qualify, quote_ident};

/// The catalog fields of one trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerParts<'a> {
    pub name: &'a str,
    /// `BEFORE` or `AFTER`
    pub timing: &'a str,
    /// `INSERT`, `UPDATE` or `DELETE`
    pub event: &'a str,
    /// Schema of the table the trigger is defined on, if known.
    pub schema: Option<&'a str>,
    pub table: &'a str,
    pub body: &'a str,
}

impl TriggerParts<'_> {
    /// Build the create-statement.
    ///
    /// `rename` is `(source_schema, destination_schema)`: when the trigger's
    /// table lives in `source_schema` (case-insensitive), the reference is
    /// moved to `destination_schema`. Pass `None` when either name is unknown
    /// or both are equal.
    pub fn to_create_statement(&self, rename: Option<(&str, &str)>) -> String {
        let schema = match (self.schema, rename) {
            (Some(schema), Some((from, to))) if schema.eq_ignore_ascii_case(from) => Some(to),
            (schema, _) => schema,
        };

        format!(
            "CREATE TRIGGER {} {} {} ON {} FOR EACH ROW {};",
            quote_ident(self.name),
            self.timing.trim(),
            self.event.trim(),
            qualify(schema, self.table),
            self.body.trim().trim_end_matches(';'),
        )
    }
}
