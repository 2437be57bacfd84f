use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mysql_swapcopy::config::DEFAULT_PORT;
use mysql_swapcopy::process::{DEFAULT_MYSQL, DEFAULT_MYSQLDUMP};
use mysql_swapcopy::{
    check_module_versions, copy_tables, exit_code, write_script, ConnectionConfig, CopyOptions,
    ScriptOptions,
};

#[derive(Parser)]
#[command(name = "mysql-swapcopy")]
#[command(author, version, about = "Copy MySQL tables between servers and swap them into place")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump tables from the source and swap them into the destination
    Copy {
        /// The name of one or more tables to copy
        #[arg(required = true)]
        tables: Vec<String>,

        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        destination: DestinationArgs,

        /// (Magento 2 only) all shared module versions must match for the copy to run
        #[arg(short = 'm', long)]
        version_match: bool,

        /// mysqldump executable
        #[arg(long, default_value = DEFAULT_MYSQLDUMP, env = "SWAPCOPY_MYSQLDUMP")]
        mysqldump_bin: String,

        /// mysql client executable
        #[arg(long, default_value = DEFAULT_MYSQL, env = "SWAPCOPY_MYSQL")]
        mysql_bin: String,

        /// Extra option passed to mysqldump (repeatable), e.g. --dump-arg=--single-transaction
        #[arg(long = "dump-arg", allow_hyphen_values = true)]
        dump_args: Vec<String>,
    },

    /// Rewrite an existing dump into a swap script without running it
    Script {
        /// The tables contained in the dump
        #[arg(required = true)]
        tables: Vec<String>,

        /// Dump file produced by mysqldump
        #[arg(short, long)]
        input: PathBuf,

        /// Output path for the script (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare Magento module versions between source and destination
    CheckVersions {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        destination: DestinationArgs,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// The mysql source host name
    #[arg(long, env = "SWAPCOPY_SOURCE_HOST")]
    shost: String,

    /// The mysql source port
    #[arg(long, default_value_t = DEFAULT_PORT, env = "SWAPCOPY_SOURCE_PORT")]
    sport: u16,

    /// The mysql source schema name
    #[arg(long, env = "SWAPCOPY_SOURCE_SCHEMA")]
    sschema: String,

    /// The username to use for the mysql source
    #[arg(long, env = "SWAPCOPY_SOURCE_USER")]
    suser: String,

    /// The password to use for the mysql source
    #[arg(long, env = "SWAPCOPY_SOURCE_PASSWORD", hide_env_values = true)]
    spass: String,
}

#[derive(Args)]
struct DestinationArgs {
    /// The mysql destination host name
    #[arg(long, env = "SWAPCOPY_DEST_HOST")]
    dhost: String,

    /// The mysql destination port
    #[arg(long, default_value_t = DEFAULT_PORT, env = "SWAPCOPY_DEST_PORT")]
    dport: u16,

    /// The mysql destination schema name
    #[arg(long, env = "SWAPCOPY_DEST_SCHEMA")]
    dschema: String,

    /// The username to use for the mysql destination
    #[arg(long, env = "SWAPCOPY_DEST_USER")]
    duser: String,

    /// The password to use for the mysql destination
    #[arg(long, env = "SWAPCOPY_DEST_PASSWORD", hide_env_values = true)]
    dpass: String,
}

impl From<SourceArgs> for ConnectionConfig {
    fn from(args: SourceArgs) -> Self {
        ConnectionConfig {
            host: args.shost,
            port: args.sport,
            user: args.suser,
            password: args.spass,
            schema: args.sschema,
        }
    }
}

impl From<DestinationArgs> for ConnectionConfig {
    fn from(args: DestinationArgs) -> Self {
        ConnectionConfig {
            host: args.dhost,
            port: args.dport,
            user: args.duser,
            password: args.dpass,
            schema: args.dschema,
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Copy {
            tables,
            source,
            destination,
            version_match,
            mysqldump_bin,
            mysql_bin,
            dump_args,
        } => {
            let options = CopyOptions {
                tables,
                source: source.into(),
                destination: destination.into(),
                version_match,
                mysqldump_program: mysqldump_bin,
                mysql_program: mysql_bin,
                dump_args,
            };

            copy_tables(options)?;
        }
        Commands::Script {
            tables,
            input,
            output,
        } => {
            write_script(ScriptOptions {
                tables,
                input,
                output,
            })?;
        }
        Commands::CheckVersions {
            source,
            destination,
        } => {
            check_module_versions(source.into(), destination.into())?;
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            let code = exit_code(&err);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
