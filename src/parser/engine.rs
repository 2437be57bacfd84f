//! Dump rewriting
//!
//! [`RewriteEngine`] turns the dump of the target tables into the body of the swap script:
//! every target is recreated under its swap name, constraint clauses are moved out of the
//! `CREATE TABLE` statements into a [`ConstraintStore`], and definer annotations are dropped.
//!
//! Output goes through a one-line lookback buffer. When a constraint clause is diverted, the
//! member before it is left with a dangling comma; the buffered line is corrected when the
//! definition's trailer arrives, before anything is written.

use std::io::{BufRead, Write};

use crate::error::SwapCopyError;
use crate::model::{ConstraintStore, TargetTables};
use crate::util::strip_trailing_separator;

use super::lexer::{
    begin_table_definition, constraint_clause, end_table_definition, is_blank, is_data_line,
    strip_definer,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParseState {
    Outside,
    InTableDefinition { table: String },
}

/// Counters reported after a rewrite
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteStats {
    pub lines_read: usize,
    pub lines_written: usize,
    pub blank_lines_dropped: usize,
    pub definers_stripped: usize,
    /// Tables whose definitions were rewritten, in dump order
    pub tables: Vec<String>,
    pub constraints_deferred: usize,
}

/// Result of a completed rewrite
#[derive(Debug)]
pub struct RewriteOutput<W> {
    pub out: W,
    pub constraints: ConstraintStore,
    pub stats: RewriteStats,
}

/// Line-at-a-time rewriter for one run
pub struct RewriteEngine<'a, W: Write> {
    targets: &'a TargetTables,
    out: W,
    state: ParseState,
    /// Last produced line, not yet written
    pending: Option<String>,
    constraints: ConstraintStore,
    line_no: usize,
    stats: RewriteStats,
}

impl<'a, W: Write> RewriteEngine<'a, W> {
    pub fn new(targets: &'a TargetTables, out: W) -> Self {
        Self {
            targets,
            out,
            state: ParseState::Outside,
            pending: None,
            constraints: ConstraintStore::new(),
            line_no: 0,
            stats: RewriteStats::default(),
        }
    }

    /// Name of the table whose definition is being read, if any.
    pub fn current_table(&self) -> Option<&str> {
        match &self.state {
            ParseState::InTableDefinition { table } => Some(table),
            ParseState::Outside => None,
        }
    }

    /// Feed one dump line (with or without its line terminator).
    pub fn feed_line(&mut self, line: &str) -> Result<(), SwapCopyError> {
        self.line_no += 1;
        self.stats.lines_read += 1;
        let line = line.trim_end_matches(['\n', '\r']);

        if is_blank(line) {
            self.stats.blank_lines_dropped += 1;
            return Ok(());
        }

        match self.current_table().map(str::to_string) {
            None => {
                if let Some(header) = begin_table_definition(line) {
                    let table = header.name.ok_or_else(|| {
                        SwapCopyError::MalformedTableDefinition {
                            line: self.line_no,
                            text: line.trim().to_string(),
                        }
                    })?;
                    if !self.targets.contains(&table) {
                        return Err(SwapCopyError::UnexpectedTable {
                            table,
                            line: self.line_no,
                        });
                    }
                    tracing::debug!(table = %table, line = self.line_no, "rewriting table definition");
                    self.stats.tables.push(table.clone());
                    self.state = ParseState::InTableDefinition { table };
                }
                self.emit_ordinary(line)
            }
            Some(table) => {
                if constraint_clause(line).is_some() {
                    return self.defer_constraint(&table, line);
                }
                if let Some(trailer) = end_table_definition(line) {
                    tracing::debug!(
                        table = %table,
                        options = trailer.options,
                        constraints = self.constraints.constraints_for(&table).len(),
                        "table definition complete"
                    );
                    if let Some(pending) = self.pending.as_mut() {
                        let fixed_len = strip_trailing_separator(pending.as_str()).len();
                        pending.truncate(fixed_len);
                    }
                    self.state = ParseState::Outside;
                }
                self.emit_ordinary(line)
            }
        }
    }

    /// Feed every line of `input`, then finish the rewrite.
    pub fn run<R: BufRead>(mut self, mut input: R) -> Result<RewriteOutput<W>, SwapCopyError> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = input
                .read_until(b'\n', &mut buf)
                .map_err(|e| SwapCopyError::io("reading the dump", e))?;
            if read == 0 {
                break;
            }
            let line = std::str::from_utf8(&buf).map_err(|_| SwapCopyError::DumpEncoding {
                line: self.line_no + 1,
            })?;
            self.feed_line(line)?;
        }
        self.finish()
    }

    /// Flush the lookback buffer and hand back the output and the deferred constraints.
    pub fn finish(mut self) -> Result<RewriteOutput<W>, SwapCopyError> {
        if let ParseState::InTableDefinition { table } = &self.state {
            return Err(SwapCopyError::UnterminatedTableDefinition {
                table: table.clone(),
            });
        }
        for table in self.targets.iter() {
            if !self.stats.tables.iter().any(|t| t == table) {
                return Err(SwapCopyError::MissingTableDefinition {
                    table: table.to_string(),
                });
            }
        }

        self.flush_pending()?;
        self.out
            .flush()
            .map_err(|e| SwapCopyError::io("writing the rewritten dump", e))?;

        Ok(RewriteOutput {
            out: self.out,
            constraints: self.constraints,
            stats: self.stats,
        })
    }

    fn defer_constraint(&mut self, table: &str, line: &str) -> Result<(), SwapCopyError> {
        match self.constraints.record(table, line) {
            Some(record) => {
                tracing::debug!(table = %table, constraint = %record.name, "deferring constraint");
                self.stats.constraints_deferred += 1;
                Ok(())
            }
            None => Err(SwapCopyError::MalformedConstraint {
                table: table.to_string(),
                line: self.line_no,
                text: line.trim().to_string(),
            }),
        }
    }

    fn emit_ordinary(&mut self, line: &str) -> Result<(), SwapCopyError> {
        let substituted = self.targets.substitute(line);
        // Row data is copied as is, even when a value looks like a definer clause
        let cleaned = if is_data_line(&substituted) {
            substituted.into_owned()
        } else {
            let stripped = strip_definer(&substituted);
            if stripped.len() != substituted.len() {
                self.stats.definers_stripped += 1;
            }
            stripped.into_owned()
        };

        self.flush_pending()?;
        self.pending = Some(cleaned);
        Ok(())
    }

    fn flush_pending(&mut self) -> Result<(), SwapCopyError> {
        if let Some(line) = self.pending.take() {
            writeln!(self.out, "{}", line)
                .map_err(|e| SwapCopyError::io("writing the rewritten dump", e))?;
            self.stats.lines_written += 1;
        }
        Ok(())
    }
}

/// Rewrite a whole dump held in memory.
pub fn rewrite_dump(
    targets: &TargetTables,
    dump: &str,
) -> Result<(String, ConstraintStore), SwapCopyError> {
    let output = RewriteEngine::new(targets, Vec::new()).run(dump.as_bytes())?;
    let text = String::from_utf8(output.out).map_err(|e| {
        SwapCopyError::io(
            "collecting the rewritten dump",
            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        )
    })?;
    Ok((text, output.constraints))
}
