//! Command-line tests against the built binary

use std::process::Command;

use pretty_assertions::assert_eq;

use mysql_swapcopy::{generate_swap_script_string, TargetTables};

use crate::common::{dump_fixture, fixture_path, read_file, TestContext};

fn swapcopy() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_mysql-swapcopy"));
    // Keep connection settings from the developer's shell out of the tests
    for (key, _) in std::env::vars() {
        if key.starts_with("SWAPCOPY_") {
            cmd.env_remove(key);
        }
    }
    cmd.env_remove("RUST_LOG");
    cmd
}

fn expected_orders_script() -> String {
    let tables = TargetTables::new(["orders", "order_items"]).unwrap();
    generate_swap_script_string(&tables, &dump_fixture("orders.sql")).unwrap()
}

// ============================================================================
// script
// ============================================================================

#[test]
fn test_script_to_stdout() {
    let output = swapcopy()
        .args(["script", "orders", "order_items", "--input"])
        .arg(fixture_path("orders.sql"))
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(String::from_utf8(output.stdout).unwrap(), expected_orders_script());
}

#[test]
fn test_script_to_file() {
    let ctx = TestContext::new();
    let out = ctx.path("swap.sql");

    let status = swapcopy()
        .args(["script", "orders", "order_items", "-i"])
        .arg(fixture_path("orders.sql"))
        .arg("-o")
        .arg(&out)
        .status()
        .unwrap();

    assert!(status.success());
    assert_eq!(read_file(&out), expected_orders_script());
}

#[test]
fn test_script_rejects_dump_with_other_table() {
    let output = swapcopy()
        .args(["script", "orders", "--input"])
        .arg(fixture_path("orders.sql"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("order_items"), "stderr: {}", stderr);
    assert!(!String::from_utf8_lossy(&output.stdout).contains("RENAME TABLE"));
}

#[test]
fn test_script_rejects_suffixed_table_name() {
    let output = swapcopy()
        .args(["script", "orders__swaptmp", "--input"])
        .arg(fixture_path("orders.sql"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
}

// ============================================================================
// Argument handling
// ============================================================================

#[test]
fn test_copy_requires_tables() {
    let output = swapcopy()
        .args([
            "copy", "--shost", "a", "--sschema", "s", "--suser", "u", "--spass", "p", "--dhost",
            "b", "--dschema", "d", "--duser", "u", "--dpass", "p",
        ])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("<TABLES>"));
}

#[test]
fn test_copy_requires_connection_settings() {
    let output = swapcopy().args(["copy", "orders"]).output().unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--shost"));
}

// ============================================================================
// copy with stand-in client programs
// ============================================================================

#[cfg(unix)]
fn copy_args(dump_bin: &std::path::Path, mysql_bin: &std::path::Path) -> Vec<std::ffi::OsString> {
    let mut args: Vec<std::ffi::OsString> = [
        "copy", "orders", "order_items", "--shost", "source.db", "--sschema", "shop", "--suser",
        "reader", "--spass", "s3cret", "--dhost", "dest.db", "--dschema", "shop", "--duser",
        "writer", "--dpass", "s3cret",
    ]
    .iter()
    .map(Into::into)
    .collect();
    args.push("--mysqldump-bin".into());
    args.push(dump_bin.into());
    args.push("--mysql-bin".into());
    args.push(mysql_bin.into());
    args
}

#[cfg(unix)]
#[test]
fn test_copy_pipes_rewritten_dump_into_client() {
    let ctx = TestContext::new();
    let applied = ctx.path("applied.sql");
    let dump_args = ctx.path("dump_args.txt");
    let dump_bin = ctx.write_script(
        "fake-mysqldump",
        &format!(
            "printf '%s ' \"$@\" > '{}'\ncat '{}'",
            dump_args.display(),
            fixture_path("orders.sql").display()
        ),
    );
    let mysql_bin = ctx.write_script(
        "fake-mysql",
        &format!("[ \"$MYSQL_PWD\" = s3cret ] || exit 9\ncat > '{}'", applied.display()),
    );

    let output = swapcopy().args(copy_args(&dump_bin, &mysql_bin)).output().unwrap();

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(read_file(&applied), expected_orders_script());
    assert_eq!(
        read_file(&dump_args).trim_end(),
        "-h source.db -P 3306 -u reader shop orders order_items"
    );
}

#[cfg(unix)]
#[test]
fn test_copy_propagates_dump_exit_code() {
    let ctx = TestContext::new();
    let applied = ctx.path("applied.sql");
    let dump_bin = ctx.write_script("fake-mysqldump", "echo 'Access denied' >&2\nexit 2");
    let mysql_bin = ctx.write_script("fake-mysql", &format!("cat > '{}'", applied.display()));

    let output = swapcopy().args(copy_args(&dump_bin, &mysql_bin)).output().unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(!applied.exists());
}

#[cfg(unix)]
#[test]
fn test_copy_propagates_client_exit_code() {
    let ctx = TestContext::new();
    let dump_bin = ctx.write_script(
        "fake-mysqldump",
        &format!("cat '{}'", fixture_path("orders.sql").display()),
    );
    let mysql_bin = ctx.write_script("fake-mysql", "cat > /dev/null\nexit 3");

    let output = swapcopy().args(copy_args(&dump_bin, &mysql_bin)).output().unwrap();

    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("__swaptmp"));
}
