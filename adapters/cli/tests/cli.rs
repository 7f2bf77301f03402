use std::{path::PathBuf, process::Command};

fn barn_defence() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_barn-defence"));
    let _ = command.env("RUST_LOG", "warn");
    command
}

fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("barn-defence-{}-{name}", std::process::id()))
}

fn digest_line(stdout: &[u8]) -> String {
    String::from_utf8_lossy(stdout)
        .lines()
        .find(|line| line.starts_with("event digest:"))
        .map(str::to_owned)
        .expect("simulate prints an event digest")
}

#[test]
fn simulation_is_reproducible_for_a_seed() {
    let run = || {
        barn_defence()
            .args(["simulate", "--seed", "11", "--frames", "60", "--posts", "12"])
            .output()
            .expect("failed to run barn-defence simulate")
    };

    let first = run();
    let second = run();

    assert!(first.status.success());
    assert_eq!(digest_line(&first.stdout), digest_line(&second.stdout));
}

#[test]
fn exported_transfer_string_passes_the_check() {
    let path = scratch("export.txt");
    let export = barn_defence()
        .args(["export-graph", "--frames", "0", "--posts", "8", "--format", "transfer"])
        .arg("--output")
        .arg(&path)
        .status()
        .expect("failed to run barn-defence export-graph");
    assert!(export.success());

    let check = barn_defence()
        .arg("check-graph")
        .arg(&path)
        .arg("--strict")
        .output()
        .expect("failed to run barn-defence check-graph");
    let _ = std::fs::remove_file(&path);

    assert!(check.status.success());
    let stdout = String::from_utf8_lossy(&check.stdout);
    assert!(stdout.contains("pieces:   16"), "{stdout}");
    assert!(stdout.contains("every piece reaches the ground"), "{stdout}");
}

#[test]
fn strict_check_rejects_floating_pieces() {
    let path = scratch("floating.json");
    std::fs::write(
        &path,
        r#"{
            "pieces": [
                {"id": 1, "position": null, "type": "foundation", "isGrounded": true},
                {"id": 2, "position": null, "type": "roof", "isGrounded": false}
            ],
            "edges": [],
            "grounded": [1]
        }"#,
    )
    .expect("scratch file is writable");

    let check = barn_defence()
        .arg("check-graph")
        .arg(&path)
        .arg("--strict")
        .output()
        .expect("failed to run barn-defence check-graph");
    let _ = std::fs::remove_file(&path);

    assert!(!check.status.success());
    assert!(String::from_utf8_lossy(&check.stdout).contains("floating: #2"));
}
