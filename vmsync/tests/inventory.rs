//! GcloudInventory tests against a stub `gcloud` binary.

use std::collections::HashSet;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use vmsync::error::{InventoryError, ToolError};
use vmsync::inventory::{GcloudInventory, Inventory};

fn write_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

#[tokio::test]
async fn lists_instance_names() {
    let dir = tempfile::tempdir().unwrap();
    let gcloud = write_tool(
        dir.path(),
        "gcloud",
        r#"echo '[{"name":"vm-a","status":"RUNNING"},{"name":"vm-b","status":"RUNNING"}]'"#,
    );

    let inventory = GcloudInventory::new("test-project", gcloud, Duration::from_secs(5));
    let names = inventory.list_instances().await.unwrap();
    assert_eq!(
        names,
        HashSet::from(["vm-a".to_string(), "vm-b".to_string()])
    );
}

#[tokio::test]
async fn receives_the_expected_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let argv_log = dir.path().join("argv.log");
    let gcloud = write_tool(
        dir.path(),
        "gcloud",
        &format!("echo \"$@\" > {}\necho '[]'", argv_log.display()),
    );

    let inventory = GcloudInventory::new("test-project", gcloud, Duration::from_secs(5));
    assert!(inventory.list_instances().await.unwrap().is_empty());

    let argv = fs::read_to_string(&argv_log).unwrap();
    assert_eq!(
        argv.trim(),
        "compute instances list --project test-project --format=json"
    );
}

#[tokio::test]
async fn nonzero_exit_is_a_tool_failure() {
    let dir = tempfile::tempdir().unwrap();
    let gcloud = write_tool(dir.path(), "gcloud", "echo 'permission denied' >&2\nexit 1");

    let inventory = GcloudInventory::new("test-project", gcloud, Duration::from_secs(5));
    match inventory.list_instances().await {
        Err(InventoryError::Tool(ToolError::Failed { stderr, .. })) => {
            assert!(stderr.contains("permission denied"));
        }
        other => panic!("expected tool failure, got {other:?}"),
    }
}

#[tokio::test]
async fn garbage_output_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let gcloud = write_tool(dir.path(), "gcloud", "echo 'ERROR: not json'");

    let inventory = GcloudInventory::new("test-project", gcloud, Duration::from_secs(5));
    assert!(matches!(
        inventory.list_instances().await,
        Err(InventoryError::Parse(_))
    ));
}

#[tokio::test]
async fn hung_tool_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let gcloud = write_tool(dir.path(), "gcloud", "sleep 5");

    let inventory = GcloudInventory::new("test-project", gcloud, Duration::from_millis(200));
    assert!(matches!(
        inventory.list_instances().await,
        Err(InventoryError::Tool(ToolError::Timeout { .. }))
    ));
}

#[tokio::test]
async fn missing_binary_is_a_spawn_failure() {
    let dir = tempfile::tempdir().unwrap();
    let inventory = GcloudInventory::new(
        "test-project",
        dir.path().join("no-such-gcloud"),
        Duration::from_secs(5),
    );
    assert!(matches!(
        inventory.list_instances().await,
        Err(InventoryError::Tool(ToolError::Spawn { .. }))
    ));
}
