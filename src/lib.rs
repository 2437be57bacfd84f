//! mysql-swapcopy: copy MySQL tables between servers with a minimal-downtime swap
//!
//! The named tables are dumped from the source, the dump is rewritten so the tables are
//! created under temporary `__swaptmp` names with their constraints deferred, and the result
//! is applied to the destination followed by one atomic `RENAME TABLE` per table that moves
//! the previous version aside to `__swapold`.

pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod process;
pub mod script;
pub mod util;
pub mod version;

use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};

pub use config::ConnectionConfig;
pub use error::SwapCopyError;
pub use model::TargetTables;
pub use script::{generate_swap_script, generate_swap_script_string, ScriptSummary};
pub use version::VersionReport;

use process::{DumpSource, MysqlClient, MysqlDump, ScriptSink};
use version::{check_versions, MysqlVersionSource, VersionSource};

/// Options for copying tables from one server to another
#[derive(Debug, Clone)]
pub struct CopyOptions {
    /// Tables to copy, in the order they are swapped
    pub tables: Vec<String>,
    pub source: ConnectionConfig,
    pub destination: ConnectionConfig,
    /// Refuse to copy unless shared Magento module versions match
    pub version_match: bool,
    /// `mysqldump` executable
    pub mysqldump_program: String,
    /// `mysql` client executable
    pub mysql_program: String,
    /// Extra `mysqldump` options
    pub dump_args: Vec<String>,
}

/// Options for rewriting an existing dump file into a swap script
#[derive(Debug, Clone)]
pub struct ScriptOptions {
    pub tables: Vec<String>,
    /// Dump produced by `mysqldump` for exactly these tables
    pub input: PathBuf,
    /// Where to write the script; stdout when `None`
    pub output: Option<PathBuf>,
}

/// What a completed copy did
#[derive(Debug, Clone)]
pub struct CopyReport {
    pub versions: Option<VersionReport>,
    pub script: ScriptSummary,
}

/// The external collaborators of one copy run
pub struct Endpoints<'a> {
    /// Source and destination version readers, when the guard is enabled
    pub version_guard: Option<(&'a dyn VersionSource, &'a dyn VersionSource)>,
    pub dump: &'a dyn DumpSource,
    pub sink: &'a dyn ScriptSink,
}

/// Copy the tables described by `options` using `mysqldump` and `mysql`.
pub fn copy_tables(options: CopyOptions) -> Result<CopyReport> {
    let targets = TargetTables::new(options.tables.iter().cloned())?;

    let dump = MysqlDump {
        program: options.mysqldump_program.clone(),
        config: options.source.clone(),
        extra_args: options.dump_args.clone(),
    };
    let sink = MysqlClient {
        program: options.mysql_program.clone(),
        config: options.destination.clone(),
    };
    let source_versions = MysqlVersionSource::new(options.source.clone());
    let destination_versions = MysqlVersionSource::new(options.destination.clone());

    let endpoints = Endpoints {
        version_guard: options.version_match.then_some((
            &source_versions as &dyn VersionSource,
            &destination_versions as &dyn VersionSource,
        )),
        dump: &dump,
        sink: &sink,
    };
    run_copy(&targets, &endpoints)
}

/// Run the guard, dump, rewrite and apply stages in order.
///
/// Every stage before the apply fails without touching the destination.
pub fn run_copy(targets: &TargetTables, endpoints: &Endpoints<'_>) -> Result<CopyReport> {
    // Step 1: Optional version guard
    let versions = match endpoints.version_guard {
        Some((source, destination)) => Some(check_versions(source, destination)?),
        None => None,
    };

    // Step 2: Dump the source tables to a scratch file
    let mut dump_file = tempfile::tempfile().context("Failed to create dump file")?;
    tracing::info!(
        source = %endpoints.dump.describe(),
        tables = ?targets.names(),
        "dumping tables"
    );
    endpoints
        .dump
        .dump(targets, dump_file.try_clone().context("Failed to open dump file")?)?;
    dump_file
        .seek(SeekFrom::Start(0))
        .context("Failed to rewind dump file")?;

    // Step 3: Rewrite the dump into the complete swap script
    let mut script_file = tempfile::tempfile().context("Failed to create script file")?;
    let writer = BufWriter::new(
        script_file
            .try_clone()
            .context("Failed to open script file")?,
    );
    let (writer, summary) = generate_swap_script(targets, BufReader::new(dump_file), writer)?;
    drop(writer);
    script_file
        .seek(SeekFrom::Start(0))
        .context("Failed to rewind script file")?;
    tracing::info!(
        lines = summary.rewrite.lines_written,
        constraints = summary.rewrite.constraints_deferred,
        definers_stripped = summary.rewrite.definers_stripped,
        "swap script ready"
    );

    // Step 4: Apply it to the destination
    tracing::info!(destination = %endpoints.sink.describe(), "swapping tables");
    if let Err(err) = endpoints.sink.apply(script_file) {
        tracing::error!(
            "apply failed; check the destination for leftover `*__swapold`/`*__swaptmp` tables"
        );
        return Err(err.into());
    }
    tracing::info!(tables = targets.len(), "swap complete");

    Ok(CopyReport {
        versions,
        script: summary,
    })
}

/// Rewrite an existing dump file into a swap script without executing anything.
pub fn write_script(options: ScriptOptions) -> Result<ScriptSummary> {
    let targets = TargetTables::new(options.tables.iter().cloned())?;
    let input = File::open(&options.input)
        .with_context(|| format!("Failed to open dump file: {}", options.input.display()))?;

    let summary = match &options.output {
        Some(path) => {
            let out = File::create(path)
                .with_context(|| format!("Failed to create script file: {}", path.display()))?;
            let (writer, summary) =
                generate_swap_script(&targets, BufReader::new(input), BufWriter::new(out))?;
            writer
                .into_inner()
                .map_err(|e| e.into_error())
                .with_context(|| format!("Failed to write script file: {}", path.display()))?;
            summary
        }
        None => {
            let stdout = std::io::stdout();
            let (mut writer, summary) =
                generate_swap_script(&targets, BufReader::new(input), stdout.lock())?;
            writer.flush().context("Failed to write script")?;
            summary
        }
    };

    tracing::info!(
        tables = summary.rewrite.tables.len(),
        constraints = summary.rewrite.constraints_deferred,
        "swap script written"
    );
    Ok(summary)
}

/// Check module versions between two servers without copying anything.
pub fn check_module_versions(
    source: ConnectionConfig,
    destination: ConnectionConfig,
) -> Result<VersionReport> {
    let source = MysqlVersionSource::new(source);
    let destination = MysqlVersionSource::new(destination);
    Ok(check_versions(&source, &destination)?)
}

/// Exit code for an error returned by this crate.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|e| e.downcast_ref::<SwapCopyError>())
        .map(SwapCopyError::exit_code)
        .unwrap_or(1)
}
