//! Pre-flight schema version guard
//!
//! Magento records the schema and data version of every installed module in `setup_module`.
//! Copying tables between installations whose shared modules are at different versions can
//! leave the destination with tables its code does not expect, so the copy can be made
//! conditional on those versions matching.

use std::collections::HashMap;

use mysql_async::prelude::*;
use mysql_async::{Conn, OptsBuilder};

use crate::config::ConnectionConfig;
use crate::error::SwapCopyError;

pub const MODULE_VERSION_QUERY: &str =
    "SELECT module, schema_version, data_version FROM setup_module";

/// One row of `setup_module`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleVersion {
    pub module: String,
    pub schema_version: Option<String>,
    pub data_version: Option<String>,
}

impl ModuleVersion {
    pub fn new(
        module: impl Into<String>,
        schema_version: impl Into<String>,
        data_version: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            schema_version: Some(schema_version.into()),
            data_version: Some(data_version.into()),
        }
    }

    fn versions(&self) -> (Option<&str>, Option<&str>) {
        (self.schema_version.as_deref(), self.data_version.as_deref())
    }
}

/// A module present on both sides at different versions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleMismatch {
    pub source: ModuleVersion,
    pub destination: ModuleVersion,
}

impl ModuleMismatch {
    pub fn module(&self) -> &str {
        &self.source.module
    }
}

/// Outcome of comparing the two module lists
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionReport {
    /// Modules present on both sides
    pub compared: usize,
    pub mismatches: Vec<ModuleMismatch>,
    /// Present only on the destination; not a failure
    pub destination_only: Vec<String>,
    /// Present only on the source; not a failure
    pub source_only: Vec<String>,
}

impl VersionReport {
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Compare module versions; only modules present on both sides can fail the guard.
pub fn compare_module_versions(
    source: &[ModuleVersion],
    destination: &[ModuleVersion],
) -> VersionReport {
    let by_module: HashMap<&str, &ModuleVersion> =
        source.iter().map(|m| (m.module.as_str(), m)).collect();

    let mut report = VersionReport::default();
    for dest in destination {
        match by_module.get(dest.module.as_str()) {
            Some(src) => {
                report.compared += 1;
                if src.versions() != dest.versions() {
                    report.mismatches.push(ModuleMismatch {
                        source: (*src).clone(),
                        destination: dest.clone(),
                    });
                }
            }
            None => report.destination_only.push(dest.module.clone()),
        }
    }

    report.source_only = source
        .iter()
        .filter(|s| !destination.iter().any(|d| d.module == s.module))
        .map(|s| s.module.clone())
        .collect();
    report
}

/// Something that can list installed module versions
pub trait VersionSource {
    /// Human-readable endpoint name for logs and errors
    fn describe(&self) -> String;

    fn module_versions(&self) -> Result<Vec<ModuleVersion>, SwapCopyError>;
}

/// Reads `setup_module` from a MySQL server
#[derive(Debug, Clone)]
pub struct MysqlVersionSource {
    config: ConnectionConfig,
}

impl MysqlVersionSource {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    async fn fetch(&self) -> Result<Vec<ModuleVersion>, mysql_async::Error> {
        let opts = OptsBuilder::default()
            .ip_or_hostname(self.config.host.clone())
            .tcp_port(self.config.port)
            .user(Some(self.config.user.clone()))
            .pass(Some(self.config.password.clone()))
            .db_name(Some(self.config.schema.clone()));

        let mut conn = Conn::new(opts).await?;
        let rows: Vec<(String, Option<String>, Option<String>)> =
            conn.query(MODULE_VERSION_QUERY).await?;
        conn.disconnect().await?;

        Ok(rows
            .into_iter()
            .map(|(module, schema_version, data_version)| ModuleVersion {
                module,
                schema_version,
                data_version,
            })
            .collect())
    }
}

impl VersionSource for MysqlVersionSource {
    fn describe(&self) -> String {
        self.config.describe()
    }

    fn module_versions(&self) -> Result<Vec<ModuleVersion>, SwapCopyError> {
        let query_error = |message: String| SwapCopyError::VersionQuery {
            endpoint: self.describe(),
            message,
        };

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| query_error(e.to_string()))?;
        runtime
            .block_on(self.fetch())
            .map_err(|e| query_error(e.to_string()))
    }
}

/// Run the guard against both endpoints.
///
/// Fails with [`SwapCopyError::VersionMismatch`] when any shared module differs.
pub fn check_versions(
    source: &dyn VersionSource,
    destination: &dyn VersionSource,
) -> Result<VersionReport, SwapCopyError> {
    tracing::info!(
        source = %source.describe(),
        destination = %destination.describe(),
        "checking module versions"
    );
    let source_versions = source.module_versions()?;
    let destination_versions = destination.module_versions()?;

    let report = compare_module_versions(&source_versions, &destination_versions);
    for mismatch in &report.mismatches {
        tracing::warn!(
            module = %mismatch.module(),
            source_schema = ?mismatch.source.schema_version,
            source_data = ?mismatch.source.data_version,
            destination_schema = ?mismatch.destination.schema_version,
            destination_data = ?mismatch.destination.data_version,
            "module version mismatch"
        );
    }

    if report.passed() {
        tracing::info!(compared = report.compared, "module versions match");
        Ok(report)
    } else {
        Err(SwapCopyError::VersionMismatch {
            modules: report
                .mismatches
                .iter()
                .map(|m| m.module().to_string())
                .collect(),
        })
    }
}
