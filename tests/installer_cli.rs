use std::process::Command;

const HELPER: &str = env!("CARGO_BIN_EXE_update-installer");

#[test]
fn test_missing_artifact_exits_with_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("foo-1.1");

    let output = Command::new(HELPER).arg(&missing).output().unwrap();
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("file not found"), "{}", stderr);
    assert!(stderr.contains(&*missing.to_string_lossy()), "{}", stderr);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Updater version "), "{}", stdout);
}

#[test]
fn test_no_arguments_prints_usage() {
    let output = Command::new(HELPER).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
}

#[test]
fn test_help_exits_cleanly() {
    let output = Command::new(HELPER).arg("--help").output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("-d"));
}

#[cfg(unix)]
#[test]
fn test_launches_new_version_and_deletes_old() {
    use std::time::{Duration, Instant};

    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("launched");
    let new_version = dir.path().join("foo-1.1");
    let old_version = dir.path().join("foo-1.0");

    std::fs::write(&new_version, format!("#!/bin/sh\ntouch '{}'\n", marker.display())).unwrap();
    std::fs::write(&old_version, b"old").unwrap();

    let output = Command::new(HELPER)
        .arg("-d")
        .arg(&old_version)
        .arg(&new_version)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Launching new version..."));
    assert!(stdout.contains("Deleting old version..."));
    assert!(!old_version.exists());

    let deadline = Instant::now() + Duration::from_secs(5);
    while !marker.exists() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }
    assert!(marker.exists(), "new version was not started");
}

#[cfg(unix)]
#[test]
fn test_missing_old_version_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let new_version = dir.path().join("foo-1.1");
    std::fs::write(&new_version, "#!/bin/sh\nexit 0\n").unwrap();

    let output = Command::new(HELPER)
        .arg("-d")
        .arg(dir.path().join("gone"))
        .arg(&new_version)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("gone"));
}

#[cfg(unix)]
#[test]
fn test_waits_for_exited_parent() {
    let dir = tempfile::tempdir().unwrap();
    let new_version = dir.path().join("foo-1.1");
    std::fs::write(&new_version, "#!/bin/sh\nexit 0\n").unwrap();

    let mut parent = Command::new("true").spawn().unwrap();
    let pid = parent.id();
    parent.wait().unwrap();

    let output = Command::new(HELPER)
        .arg("-w")
        .arg(pid.to_string())
        .arg(&new_version)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));
}

#[cfg(unix)]
#[test]
fn test_arguments_after_separator_reach_new_version() {
    use std::time::{Duration, Instant};

    let dir = tempfile::tempdir().unwrap();
    let recorded = dir.path().join("args.txt");
    let new_version = dir.path().join("foo-1.1");
    std::fs::write(
        &new_version,
        format!("#!/bin/sh\necho \"$@\" > '{}'\n", recorded.display()),
    )
    .unwrap();

    let output = Command::new(HELPER)
        .arg(&new_version)
        .args(["--", "--restart", "foo"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));

    let deadline = Instant::now() + Duration::from_secs(5);
    while !std::fs::read_to_string(&recorded).is_ok_and(|s| s.ends_with('\n'))
        && Instant::now() < deadline
    {
        std::thread::sleep(Duration::from_millis(50));
    }
    assert_eq!(std::fs::read_to_string(&recorded).unwrap().trim(), "--restart foo");
}

#[test]
fn test_failure_is_reported_once() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("foo-1.1");

    let output = Command::new(HELPER).arg(&missing).env("RUST_LOG", "info").output().unwrap();
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("file not found").count(), 1, "{}", stderr);
}
