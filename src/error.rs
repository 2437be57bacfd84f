//! Error types for mysql-swapcopy

use thiserror::Error;

/// Exit code used when the pre-flight version guard fails.
pub const VERSION_MISMATCH_EXIT_CODE: i32 = 4;

/// Errors that can occur while copying and swapping tables
#[derive(Error, Debug)]
pub enum SwapCopyError {
    #[error("Invalid table name `{name}`: {reason}")]
    InvalidTableName { name: String, reason: String },

    #[error("No tables were given to copy")]
    NoTables,

    #[error("Dump line {line} is not valid UTF-8 (re-dump with --hex-blob for binary columns)")]
    DumpEncoding { line: usize },

    #[error("Malformed table definition at dump line {line}: {text}")]
    MalformedTableDefinition { line: usize, text: String },

    #[error("Malformed constraint clause in `{table}` at dump line {line}: {text}")]
    MalformedConstraint {
        table: String,
        line: usize,
        text: String,
    },

    #[error("Dump line {line} defines table `{table}`, which is not one of the requested tables")]
    UnexpectedTable { table: String, line: usize },

    #[error("Dump ended inside the definition of `{table}`")]
    UnterminatedTableDefinition { table: String },

    #[error("Dump contains no definition for table `{table}`")]
    MissingTableDefinition { table: String },

    #[error("I/O error while {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start `{program}` ({stage} stage)")]
    SpawnFailed {
        program: String,
        stage: Stage,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` failed to dump the source tables ({status})")]
    DumpFailed { program: String, status: ExitStatusCode },

    #[error(
        "`{program}` failed while applying the swap script ({status}); the destination may \
         require manual cleanup of `*__swapold`/`*__swaptmp` tables"
    )]
    ApplyFailed { program: String, status: ExitStatusCode },

    #[error("Schema versions differ for {} module(s): {}", .modules.len(), .modules.join(", "))]
    VersionMismatch { modules: Vec<String> },

    #[error("Failed to read module versions from {endpoint}: {message}")]
    VersionQuery { endpoint: String, message: String },
}

/// Exit status of an external process, `None` when it was killed by a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatusCode(pub Option<i32>);

impl std::fmt::Display for ExitStatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(code) => write!(f, "exit code {}", code),
            None => write!(f, "terminated by signal"),
        }
    }
}

impl From<std::process::ExitStatus> for ExitStatusCode {
    fn from(status: std::process::ExitStatus) -> Self {
        ExitStatusCode(status.code())
    }
}

/// Pipeline stage an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Arguments,
    VersionGuard,
    Dump,
    Rewrite,
    Apply,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Arguments => "arguments",
            Stage::VersionGuard => "version guard",
            Stage::Dump => "dump",
            Stage::Rewrite => "rewrite",
            Stage::Apply => "apply",
        };
        f.write_str(name)
    }
}

impl SwapCopyError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        SwapCopyError::Io {
            context: context.into(),
            source,
        }
    }

    /// The stage of the run that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            SwapCopyError::InvalidTableName { .. } | SwapCopyError::NoTables => Stage::Arguments,
            SwapCopyError::VersionMismatch { .. } | SwapCopyError::VersionQuery { .. } => {
                Stage::VersionGuard
            }
            SwapCopyError::SpawnFailed { stage, .. } => *stage,
            SwapCopyError::DumpFailed { .. } => Stage::Dump,
            SwapCopyError::ApplyFailed { .. } => Stage::Apply,
            SwapCopyError::DumpEncoding { .. }
            | SwapCopyError::MalformedTableDefinition { .. }
            | SwapCopyError::MalformedConstraint { .. }
            | SwapCopyError::UnexpectedTable { .. }
            | SwapCopyError::UnterminatedTableDefinition { .. }
            | SwapCopyError::MissingTableDefinition { .. }
            | SwapCopyError::Io { .. } => Stage::Rewrite,
        }
    }

    /// Process exit code for this error.
    ///
    /// Subprocess failures propagate the subprocess's own status.
    pub fn exit_code(&self) -> i32 {
        match self {
            SwapCopyError::VersionMismatch { .. } => VERSION_MISMATCH_EXIT_CODE,
            SwapCopyError::DumpFailed { status, .. } | SwapCopyError::ApplyFailed { status, .. } => {
                match status.0 {
                    Some(code) if code != 0 => code,
                    _ => 1,
                }
            }
            _ => 1,
        }
    }
}
