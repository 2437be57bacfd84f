//! External processes at both ends of the pipeline
//!
//! `mysqldump` produces the dump and the `mysql` client applies the finished script. Both run
//! to completion with their output/input attached to files, so the rewrite never sees a
//! partial dump and the destination never sees a partial script.

use std::fs::File;
use std::process::{Command, Stdio};

use crate::config::ConnectionConfig;
use crate::error::{SwapCopyError, Stage};
use crate::model::TargetTables;

pub const DEFAULT_MYSQLDUMP: &str = "mysqldump";
pub const DEFAULT_MYSQL: &str = "mysql";

/// Produces the structural dump of the target tables
pub trait DumpSource {
    fn describe(&self) -> String;

    /// Write the dump of `tables` into `out`.
    fn dump(&self, tables: &TargetTables, out: File) -> Result<(), SwapCopyError>;
}

/// Executes a finished script against the destination
pub trait ScriptSink {
    fn describe(&self) -> String;

    /// Execute the script read from `script`, positioned at its start.
    fn apply(&self, script: File) -> Result<(), SwapCopyError>;
}

/// Connection arguments shared by `mysqldump` and `mysql`.
///
/// The password travels in `MYSQL_PWD` so it never shows up in the process list.
fn connection_args(config: &ConnectionConfig) -> Vec<String> {
    vec![
        "-h".to_string(),
        config.host.clone(),
        "-P".to_string(),
        config.port.to_string(),
        "-u".to_string(),
        config.user.clone(),
    ]
}

fn display_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `mysqldump` against the source server
#[derive(Debug, Clone)]
pub struct MysqlDump {
    pub program: String,
    pub config: ConnectionConfig,
    /// Extra options passed before the schema name, e.g. `--single-transaction`
    pub extra_args: Vec<String>,
}

impl MysqlDump {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            program: DEFAULT_MYSQLDUMP.to_string(),
            config,
            extra_args: Vec::new(),
        }
    }

    pub fn args(&self, tables: &TargetTables) -> Vec<String> {
        let mut args = connection_args(&self.config);
        args.extend(self.extra_args.iter().cloned());
        args.push(self.config.schema.clone());
        args.extend(tables.iter().map(str::to_string));
        args
    }
}

impl DumpSource for MysqlDump {
    fn describe(&self) -> String {
        self.config.describe()
    }

    fn dump(&self, tables: &TargetTables, out: File) -> Result<(), SwapCopyError> {
        let args = self.args(tables);
        tracing::info!(command = %display_command(&self.program, &args), "running dump");

        let status = Command::new(&self.program)
            .args(&args)
            .env("MYSQL_PWD", &self.config.password)
            .stdin(Stdio::null())
            .stdout(Stdio::from(out))
            .status()
            .map_err(|source| SwapCopyError::SpawnFailed {
                program: self.program.clone(),
                stage: Stage::Dump,
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(SwapCopyError::DumpFailed {
                program: self.program.clone(),
                status: status.into(),
            })
        }
    }
}

/// `mysql` client against the destination server
#[derive(Debug, Clone)]
pub struct MysqlClient {
    pub program: String,
    pub config: ConnectionConfig,
}

impl MysqlClient {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            program: DEFAULT_MYSQL.to_string(),
            config,
        }
    }

    pub fn args(&self) -> Vec<String> {
        let mut args = connection_args(&self.config);
        args.push(self.config.schema.clone());
        args
    }
}

impl ScriptSink for MysqlClient {
    fn describe(&self) -> String {
        self.config.describe()
    }

    fn apply(&self, script: File) -> Result<(), SwapCopyError> {
        let args = self.args();
        tracing::info!(command = %display_command(&self.program, &args), "applying swap script");

        let status = Command::new(&self.program)
            .args(&args)
            .env("MYSQL_PWD", &self.config.password)
            .stdin(Stdio::from(script))
            .status()
            .map_err(|source| SwapCopyError::SpawnFailed {
                program: self.program.clone(),
                stage: Stage::Apply,
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(SwapCopyError::ApplyFailed {
                program: self.program.clone(),
                status: status.into(),
            })
        }
    }
}
