//! Target table set and the suffixed names derived from it

use std::borrow::Cow;

use regex::Regex;

use crate::error::SwapCopyError;

/// Suffix of the freshly loaded copy of a table, before the swap
pub const SWAP_SUFFIX: &str = "__swaptmp";

/// Suffix of the previous incarnation of a table, after the swap
pub const OLD_SUFFIX: &str = "__swapold";

/// Name of the temporary copy of `table`.
pub fn swap_name(table: &str) -> String {
    format!("{}{}", table, SWAP_SUFFIX)
}

/// Name the live `table` is moved to by the swap.
pub fn old_name(table: &str) -> String {
    format!("{}{}", table, OLD_SUFFIX)
}

/// The ordered set of tables being copied in one run.
///
/// Substitution is global: any back-quoted reference to any of these names is rewritten,
/// wherever it appears in the dump.
#[derive(Debug, Clone)]
pub struct TargetTables {
    names: Vec<String>,
    /// Matches a back-quoted reference to any target name, capturing the bare name
    reference: Regex,
}

impl TargetTables {
    /// Validate and collect the target names, dropping repeated names.
    pub fn new<I, S>(names: I) -> Result<Self, SwapCopyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            validate_name(&name)?;
            if unique.contains(&name) {
                tracing::debug!(table = %name, "ignoring repeated table name");
                continue;
            }
            unique.push(name);
        }

        if unique.is_empty() {
            return Err(SwapCopyError::NoTables);
        }

        let alternation = unique
            .iter()
            .map(|name| regex::escape(name))
            .collect::<Vec<_>>()
            .join("|");
        let reference = Regex::new(&format!("`({})`", alternation)).map_err(|e| {
            SwapCopyError::InvalidTableName {
                name: unique.join(", "),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            names: unique,
            reference,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false; construction rejects an empty set.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Rewrite every back-quoted target reference in `line` to its swap name.
    pub fn substitute<'a>(&self, line: &'a str) -> Cow<'a, str> {
        self.reference
            .replace_all(line, format!("`${{1}}{}`", SWAP_SUFFIX).as_str())
    }
}

fn validate_name(name: &str) -> Result<(), SwapCopyError> {
    let invalid = |reason: &str| SwapCopyError::InvalidTableName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.contains('`') {
        return Err(invalid("name contains a back-quote"));
    }
    for suffix in [SWAP_SUFFIX, OLD_SUFFIX] {
        if name.contains(suffix) {
            return Err(invalid(&format!(
                "name already contains the reserved suffix {}",
                suffix
            )));
        }
    }
    Ok(())
}
