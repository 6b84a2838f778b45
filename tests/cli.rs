use assert_cmd::Command;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::path::Path;
use tempfile::TempDir;

fn vrckit(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("vrckit").expect("binary builds");
    cmd.current_dir(dir.path())
        .env_remove("DISCORD_WEBHOOK_URL")
        .env_remove("VRCHAT_SCREENSHOTS_DIR")
        .env("RUST_LOG", "vrckit=warn");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

fn write_package(path: &Path, members: &[(&str, &str)]) {
    let file = File::create(path).expect("create package");
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    for (name, data) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, name, data.as_bytes())
            .expect("append member");
    }
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip");
}

#[test]
fn help_lists_every_subcommand() {
    let dir = TempDir::new().unwrap();
    let output = vrckit(&dir).arg("--help").output().expect("--help runs");
    assert!(output.status.success());
    let text = combined_output(&output);
    for sub in [
        "extract",
        "blur",
        "convert",
        "pipeline",
        "unpack",
        "booth",
        "sort",
        "discord",
        "detect",
        "interactive",
    ] {
        assert!(text.contains(sub), "help text missing {sub}: {text}");
    }
}

#[test]
fn convert_rejects_unsafe_session_names() {
    let dir = TempDir::new().unwrap();
    for bad in ["../x", "a/b", "C:evil"] {
        let output = vrckit(&dir)
            .args(["convert", bad])
            .output()
            .expect("convert runs");
        assert_eq!(output.status.code(), Some(1), "{bad}");
        let text = combined_output(&output);
        assert!(text.contains("Rejected session folder"), "{bad}: {text}");
    }
}

#[test]
fn blur_on_missing_session_fails() {
    let dir = TempDir::new().unwrap();
    let output = vrckit(&dir)
        .args(["blur", "output/not_there"])
        .output()
        .expect("blur runs");
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("not found"));
}

#[test]
fn extract_reports_missing_video() {
    let dir = TempDir::new().unwrap();
    let output = vrckit(&dir)
        .args(["extract", "missing.mp4"])
        .output()
        .expect("extract runs");
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("missing.mp4"));
}

#[test]
fn discord_without_webhook_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    let output = vrckit(&dir)
        .args(["discord", "--screenshots-dir", "."])
        .output()
        .expect("discord runs");
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("--webhook-url"));
}

#[test]
fn discord_dry_run_lists_batches_without_posting() {
    let dir = TempDir::new().unwrap();
    let shots = dir.path().join("shots");
    fs::create_dir(&shots).unwrap();
    for i in 0..3 {
        fs::write(shots.join(format!("VRChat_{i}.png")), vec![0u8; 1024]).unwrap();
    }

    let output = vrckit(&dir)
        .args([
            "discord",
            "--webhook-url",
            "http://127.0.0.1:9/unused",
            "--screenshots-dir",
            "shots",
            "--max-files",
            "2",
            "--dry-run",
        ])
        .output()
        .expect("discord dry run");
    assert!(output.status.success(), "{}", combined_output(&output));
    let text = combined_output(&output);
    assert!(text.contains("will send 2 post(s)"), "{text}");
    assert!(text.contains("VRChat_2.png"), "{text}");
}

#[test]
fn unpack_restores_package_layout() {
    let dir = TempDir::new().unwrap();
    write_package(
        &dir.path().join("Props.unitypackage"),
        &[
            ("1111/pathname", "Assets/Props/Chair.prefab"),
            ("1111/asset", "prefab"),
            ("2222/pathname", "Assets/Props"),
        ],
    );

    let output = vrckit(&dir)
        .args(["unpack", "Props.unitypackage"])
        .output()
        .expect("unpack runs");
    assert!(output.status.success(), "{}", combined_output(&output));

    let restored = dir.path().join("unipack_Props/Assets/Props/Chair.prefab");
    assert_eq!(fs::read(restored).unwrap(), b"prefab");
}

#[test]
fn detect_prints_json() {
    let dir = TempDir::new().unwrap();
    let output = vrckit(&dir).arg("detect").output().expect("detect runs");
    assert!(output.status.success());
    let info: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("detect prints JSON");
    assert_eq!(info["os"], std::env::consts::OS);
}

#[test]
fn discord_huge_since_days_keeps_every_image() {
    let dir = TempDir::new().unwrap();
    let shots = dir.path().join("shots");
    fs::create_dir(&shots).unwrap();
    fs::write(shots.join("VRChat_0.png"), vec![0u8; 16]).unwrap();

    let output = vrckit(&dir)
        .args([
            "discord",
            "--webhook-url",
            "http://127.0.0.1:9/unused",
            "--screenshots-dir",
            "shots",
            "--since-days",
            "18446744073709551615",
            "--dry-run",
        ])
        .output()
        .expect("discord dry run");
    assert!(output.status.success(), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("VRChat_0.png"));
}
