//! Constraints deferred out of table definitions
//!
//! Constraint clauses are removed from the `CREATE TABLE` statements of the temporary copies
//! and re-applied once the copies have been renamed into place. The store keeps them per table
//! in definition order and regenerates the statements that move them from the retiring table
//! to the new one.

use std::collections::HashMap;

use crate::parser::constraint_clause;
use crate::util::quote_ident;

/// Kind of a named constraint, which decides how it is dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    ForeignKey,
    Check,
    Other,
}

impl ConstraintKind {
    /// `ALTER TABLE ... DROP <clause>` keyword for this kind
    pub fn drop_keyword(&self) -> &'static str {
        match self {
            ConstraintKind::ForeignKey => "FOREIGN KEY",
            ConstraintKind::Check => "CHECK",
            ConstraintKind::Other => "CONSTRAINT",
        }
    }
}

/// One constraint clause extracted from a table definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintRecord {
    /// Table whose definition carried the clause
    pub table: String,
    /// Unquoted constraint name
    pub name: String,
    pub kind: ConstraintKind,
    /// Verbatim clause, without the trailing separator
    pub clause: String,
}

/// Per-table, ordered constraint clauses for one run
#[derive(Debug, Default, Clone)]
pub struct ConstraintStore {
    by_table: HashMap<String, Vec<ConstraintRecord>>,
    /// Tables in the order their first constraint was recorded
    order: Vec<String>,
}

impl ConstraintStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a constraint clause for `table`.
    ///
    /// Returns `None` without recording anything when the clause carries no constraint name.
    pub fn record(&mut self, table: &str, clause: &str) -> Option<&ConstraintRecord> {
        let parsed = constraint_clause(clause)?;
        let name = parsed.name?;
        let record = ConstraintRecord {
            table: table.to_string(),
            name,
            kind: parsed.kind,
            clause: parsed.text.to_string(),
        };

        if !self.by_table.contains_key(table) {
            self.order.push(table.to_string());
        }
        let records = self.by_table.entry(table.to_string()).or_default();
        records.push(record);
        records.last()
    }

    /// Constraints recorded for `table`, in definition order.
    pub fn constraints_for(&self, table: &str) -> &[ConstraintRecord] {
        self.by_table.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tables that have at least one recorded constraint.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Total number of recorded constraints.
    pub fn len(&self) -> usize {
        self.by_table.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_table.is_empty()
    }

    /// One statement per constraint dropping it from `table + old_suffix`.
    pub fn drop_statements_for(&self, table: &str, old_suffix: &str) -> Vec<String> {
        let retiring = quote_ident(&format!("{}{}", table, old_suffix));
        self.constraints_for(table)
            .iter()
            .map(|c| {
                format!(
                    "ALTER TABLE {} DROP {} {};",
                    retiring,
                    c.kind.drop_keyword(),
                    quote_ident(&c.name)
                )
            })
            .collect()
    }

    /// A single statement adding every constraint of `table` back, or `None` if it had none.
    pub fn add_statement_for(&self, table: &str) -> Option<String> {
        let constraints = self.constraints_for(table);
        if constraints.is_empty() {
            return None;
        }
        let additions = constraints
            .iter()
            .map(|c| format!("ADD {}", c.clause))
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!("ALTER TABLE {} {};", quote_ident(table), additions))
    }
}
