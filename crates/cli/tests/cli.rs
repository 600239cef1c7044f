use std::path::Path;
use std::process::Output;

use tempfile::TempDir;

const MDOC: &str = "PixelSpacing = 1.63
Voltage = 300
ImageFile = Position_1_3.mrc
TiltAxisAngle = 85.3

[ZValue = 0]
TiltAngle = 20.00
SubFramePath = X:\\Data\\Position_1_3_001_Fractions.tiff
NumSubFrames = 8

[ZValue = 1]
TiltAngle = -20.00
SubFramePath = X:\\Data\\Position_1_3_002_Fractions.tiff
NumSubFrames = 8
";

/// Writes a config rooted at `root` and returns its path.
fn write_config(root: &Path, extra: &str) -> std::path::PathBuf {
    let frames = root.join("frames");
    std::fs::create_dir_all(&frames).unwrap();
    let config = format!(
        r#"
[paths]
mdoc_directory = "{}"
processing_directory = "{}"

[acquisition]
file_type = "mrc"
{}
"#,
        frames.display(),
        root.join("proc").display(),
        extra
    );
    let path = root.join("tomoprep.toml");
    std::fs::write(&path, config).unwrap();
    path
}

async fn tomoprep(args: &[&str], config: &Path) -> Output {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_tomoprep"))
        .args(args)
        .env("TOMOPREP_CONFIG", config)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .output()
        .await
        .expect("Failed to run tomoprep")
}

#[tokio::test]
async fn test_check_lists_planned_units() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");
    let frames = dir.path().join("frames");
    std::fs::write(frames.join("Position_1_3.mrc.mdoc"), MDOC).unwrap();
    std::fs::write(frames.join("Position_1_3_override.mrc.mdoc"), MDOC).unwrap();

    let output = tomoprep(&["check"], &config).await;

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 1);
    assert!(stdout.contains("Position_1_3.mrc.mdoc -> Position_1_3"));
    assert!(!dir.path().join("proc").exists());
}

#[tokio::test]
async fn test_check_reports_rejected_files() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");
    std::fs::write(
        dir.path().join("frames/broken.mrc.mdoc"),
        "ImageFile = broken.mrc\n",
    )
    .unwrap();

    let output = tomoprep(&["check"], &config).await;

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("broken.mrc.mdoc -> error:"));
}

#[tokio::test]
async fn test_check_rejects_invalid_config() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        "\n[stages]\nmotion_correction = true\n",
    );

    let output = tomoprep(&["check"], &config).await;

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[tokio::test]
async fn test_missing_config_fails() {
    let dir = TempDir::new().unwrap();
    let output = tomoprep(&["run"], &dir.path().join("absent.toml")).await;
    assert!(!output.status.success());
}

#[tokio::test]
async fn test_parse_without_config() {
    let dir = TempDir::new().unwrap();
    let mdoc = dir.path().join("Position_1_3.mrc.mdoc");
    std::fs::write(&mdoc, MDOC).unwrap();

    let output = tomoprep(
        &["parse", mdoc.to_str().unwrap()],
        &dir.path().join("absent.toml"),
    )
    .await;

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["header"]["image_file"], "Position_1_3.mrc");
    let tilts = json["tilts"].as_array().unwrap();
    assert_eq!(tilts.len(), 2);
    assert_eq!(tilts[1]["tilt_angle"], -20.0);
    assert_eq!(tilts[0]["subframe"], "Position_1_3_001_Fractions.tiff");
}

#[tokio::test]
async fn test_parse_applies_configured_rename() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "modify_subframe_path = true\n");
    let mdoc = dir.path().join("Position_1_3.mrc.mdoc");
    std::fs::write(&mdoc, MDOC).unwrap();

    let output = tomoprep(&["parse", mdoc.to_str().unwrap()], &config).await;

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["tilts"][0]["subframe"], "Position_1_3_001_fractions.tiff");
}
