//! Swap script assembly
//!
//! The script is laid out so that nothing touches the live tables until every temporary copy
//! has been created and loaded:
//!
//! 1. foreign key checks off
//! 2. drop `*__swapold` leftovers from an interrupted run
//! 3. the rewritten dump (creates and loads `*__swaptmp`)
//! 4. one `RENAME TABLE` per target
//! 5. drop the deferred constraints from `*__swapold`
//! 6. add them back to the live tables
//! 7. foreign key checks on

use std::io::{BufRead, Write};

use crate::error::SwapCopyError;
use crate::model::{old_name, swap_name, ConstraintStore, TargetTables, OLD_SUFFIX};
use crate::parser::{RewriteEngine, RewriteStats};
use crate::util::quote_ident;

pub const DISABLE_FK_CHECKS: &str = "SET FOREIGN_KEY_CHECKS=0;";
pub const ENABLE_FK_CHECKS: &str = "SET FOREIGN_KEY_CHECKS=1;";

/// What went into a generated script
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptSummary {
    pub rewrite: RewriteStats,
    pub renames: usize,
    pub constraint_drops: usize,
    pub constraint_adds: usize,
}

/// Sequences the statements around the rewritten dump
#[derive(Debug, Clone, Copy)]
pub struct SwapScriptBuilder<'a> {
    targets: &'a TargetTables,
}

impl<'a> SwapScriptBuilder<'a> {
    pub fn new(targets: &'a TargetTables) -> Self {
        Self { targets }
    }

    /// Statements that precede the dump (steps 1 and 2).
    pub fn preamble(&self) -> Vec<String> {
        let mut statements = vec![DISABLE_FK_CHECKS.to_string()];
        statements.extend(
            self.targets
                .iter()
                .map(|t| format!("DROP TABLE IF EXISTS {};", quote_ident(&old_name(t)))),
        );
        statements
    }

    /// The rename that swaps the loaded copy of `table` into place.
    pub fn rename_statement(&self, table: &str) -> String {
        format!(
            "RENAME TABLE {} TO {}, {} TO {};",
            quote_ident(table),
            quote_ident(&old_name(table)),
            quote_ident(&swap_name(table)),
            quote_ident(table)
        )
    }

    /// Statements that follow the dump (steps 4 to 7).
    pub fn swap_statements(&self, constraints: &ConstraintStore) -> Vec<String> {
        let mut statements: Vec<String> = self
            .targets
            .iter()
            .map(|t| self.rename_statement(t))
            .collect();
        for table in self.targets.iter() {
            statements.extend(constraints.drop_statements_for(table, OLD_SUFFIX));
        }
        statements.extend(
            self.targets
                .iter()
                .filter_map(|t| constraints.add_statement_for(t)),
        );
        statements.push(ENABLE_FK_CHECKS.to_string());
        statements
    }

    pub fn write_preamble<W: Write>(&self, out: &mut W) -> Result<(), SwapCopyError> {
        write_lines(out, &self.preamble())
    }

    pub fn write_swap<W: Write>(
        &self,
        out: &mut W,
        constraints: &ConstraintStore,
    ) -> Result<(), SwapCopyError> {
        write_lines(out, &self.swap_statements(constraints))
    }

    /// Assemble the full script around an already rewritten dump body.
    pub fn build(&self, body: &str, constraints: &ConstraintStore) -> String {
        let mut script = self.preamble().join("\n");
        script.push('\n');
        script.push_str(body);
        if !body.is_empty() && !body.ends_with('\n') {
            script.push('\n');
        }
        script.push_str(&self.swap_statements(constraints).join("\n"));
        script.push('\n');
        script
    }
}

fn write_lines<W: Write>(out: &mut W, lines: &[String]) -> Result<(), SwapCopyError> {
    for line in lines {
        writeln!(out, "{}", line).map_err(|e| SwapCopyError::io("writing the swap script", e))?;
    }
    Ok(())
}

/// Rewrite `dump` and stream the complete swap script into `out`.
///
/// Nothing but the script is produced; on error `out` holds a partial script that must not be
/// executed.
pub fn generate_swap_script<R: BufRead, W: Write>(
    targets: &TargetTables,
    dump: R,
    mut out: W,
) -> Result<(W, ScriptSummary), SwapCopyError> {
    let builder = SwapScriptBuilder::new(targets);
    builder.write_preamble(&mut out)?;

    let rewritten = RewriteEngine::new(targets, out).run(dump)?;
    let mut out = rewritten.out;
    let constraints = rewritten.constraints;

    builder.write_swap(&mut out, &constraints)?;
    out.flush()
        .map_err(|e| SwapCopyError::io("writing the swap script", e))?;

    let summary = ScriptSummary {
        rewrite: rewritten.stats,
        renames: targets.len(),
        constraint_drops: constraints.len(),
        constraint_adds: targets
            .iter()
            .filter(|t| !constraints.constraints_for(t).is_empty())
            .count(),
    };
    Ok((out, summary))
}

/// Generate the swap script for a dump held in memory.
pub fn generate_swap_script_string(
    targets: &TargetTables,
    dump: &str,
) -> Result<String, SwapCopyError> {
    let (bytes, _) = generate_swap_script(targets, dump.as_bytes(), Vec::new())?;
    String::from_utf8(bytes).map_err(|e| {
        SwapCopyError::io(
            "collecting the swap script",
            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        )
    })
}
