use std::process::Command;

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_lumen"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "lumen init failed: {}", String::from_utf8_lossy(&output.stderr));

    let config_path = dir.path().join(".lumen.toml");
    assert!(config_path.exists(), ".lumen.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[recall]"));
    assert!(content.contains("[service]"));

    // Every option is commented out, so it parses to the defaults
    let config: lumen_core::LumenConfig = toml::from_str(&content).unwrap();
    assert!(config.recall.local_rag);
    assert_eq!(config.index.interval_secs, 900);
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".lumen.toml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_lumen"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let content = std::fs::read_to_string(dir.path().join(".lumen.toml")).unwrap();
    assert_eq!(content, "# existing");
}
