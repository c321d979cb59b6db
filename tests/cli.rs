use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn snapship_cmd() -> Command {
    Command::cargo_bin("snapship").expect("binary exists")
}

/// Config home with notifications and URL copying off, so nothing reaches D-Bus.
fn quiet_config_home() -> TempDir {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("snapship");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("config.toml"),
        "[general]\nnotifications = false\ncopy_url_to_clipboard = false\n",
    )
    .unwrap();
    temp
}

#[test]
fn help_lists_capture_commands() {
    let assert = snapship_cmd().arg("--help").assert().success();
    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    for word in ["files", "region", "screen", "clipboard", "--daemon"] {
        assert!(output.contains(word), "help is missing {word}:\n{output}");
    }
}

#[test]
fn screen_capture_requires_wayland_env() {
    let home = quiet_config_home();
    snapship_cmd()
        .env_remove("WAYLAND_DISPLAY")
        .env("XDG_CONFIG_HOME", home.path())
        .arg("screen")
        .assert()
        .failure()
        .stderr(predicate::str::contains("WAYLAND_DISPLAY not set"));
}

#[test]
fn unreadable_file_fails_before_connecting() {
    let home = quiet_config_home();
    let missing = home.path().join("nope.png");

    snapship_cmd()
        .env_remove("WAYLAND_DISPLAY")
        .env("XDG_CONFIG_HOME", home.path())
        .arg("files")
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Read error"))
        .stderr(predicate::str::contains("nope.png"));
}

#[test]
fn malformed_geometry_is_rejected() {
    snapship_cmd()
        .args(["region", "--geometry", "10x10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected \"x,y WxH\""));
}

#[test]
fn init_config_writes_once() {
    let temp = TempDir::new().unwrap();

    snapship_cmd()
        .env("XDG_CONFIG_HOME", temp.path())
        .arg("--init-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote default configuration"));
    let written = temp.path().join("snapship/config.toml");
    assert!(written.exists());
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&written).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    snapship_cmd()
        .env("XDG_CONFIG_HOME", temp.path())
        .arg("--init-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn invalid_config_is_reported() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("broken.toml");
    std::fs::write(&path, "[destination\nport = ").unwrap();

    snapship_cmd()
        .arg("--config")
        .arg(&path)
        .arg("screen")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config"));
}
