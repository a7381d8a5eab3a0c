use std::path::Path;
use std::process::Command;

fn workspace(storage: &Path) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".lumen.toml"),
        format!(
            "[storage]\ndir = {:?}\n\n[service]\nprogram = \"/nonexistent/lumen-agent\"\nstart_timeout_ms = 200\n",
            storage.to_string_lossy()
        ),
    )
    .unwrap();
    std::fs::write(dir.path().join("cart.ts"), "export function total() {\n  return \n}\n").unwrap();
    dir
}

#[test]
fn complete_without_service_prints_null() {
    let storage = tempfile::tempdir().unwrap();
    let dir = workspace(storage.path());

    let output = Command::new(env!("CARGO_BIN_EXE_lumen"))
        .args(["complete", "cart.ts", "--at", "2:10", "--format", "json"])
        .current_dir(dir.path())
        .env("LUMEN_LOG", "off")
        .output()
        .unwrap();

    assert!(output.status.success(), "lumen complete failed: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "null");
}

#[test]
fn embed_without_service_prints_an_empty_list() {
    let storage = tempfile::tempdir().unwrap();
    let dir = workspace(storage.path());

    let output = Command::new(env!("CARGO_BIN_EXE_lumen"))
        .args(["embed", "cart total", "--format", "json"])
        .current_dir(dir.path())
        .env("LUMEN_LOG", "off")
        .output()
        .unwrap();

    assert!(output.status.success(), "lumen embed failed: {}", String::from_utf8_lossy(&output.stderr));
    let items: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(items, serde_json::json!([]));
}

#[test]
fn complete_rejects_a_zero_position() {
    let storage = tempfile::tempdir().unwrap();
    let dir = workspace(storage.path());

    let output = Command::new(env!("CARGO_BIN_EXE_lumen"))
        .args(["complete", "cart.ts", "--at", "0:1"])
        .current_dir(dir.path())
        .env("LUMEN_LOG", "off")
        .output()
        .unwrap();

    assert!(!output.status.success());
}
