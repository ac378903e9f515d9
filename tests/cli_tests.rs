use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const BIRTHDAY: &str = r##"{
  "width": 1080,
  "height": 1920,
  "duration": 4.0,
  "background": { "source": "bg.mp4", "loop": true },
  "layers": [
    { "kind": "text", "id": "title", "text": "HAPPY BIRTHDAY", "font": "Tourney", "size": 120 },
    { "kind": "overlay", "source": "sparkle.mp4", "mask": "title" }
  ],
  "audio": { "source": "song.mp3", "fade_out": 1.0 },
  "profile": "preview"
}"##;

/// Working directory with fonts, assets and no configuration file
fn workspace() -> TempDir {
    let temp = TempDir::new().unwrap();
    let fonts = temp.path().join("fonts");
    let assets = temp.path().join("assets");
    std::fs::create_dir_all(&fonts).unwrap();
    std::fs::create_dir_all(&assets).unwrap();
    std::fs::write(fonts.join("Tourney.ttf"), b"font").unwrap();
    for name in ["bg.mp4", "sparkle.mp4", "song.mp3"] {
        std::fs::write(assets.join(name), b"media").unwrap();
    }
    std::fs::write(temp.path().join("birthday.json"), BIRTHDAY).unwrap();
    temp
}

fn reelgen(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("reelgen").unwrap();
    cmd.current_dir(dir)
        .env_remove("RUST_LOG")
        .env_remove("REELGEN_CONFIG")
        .env("REELGEN_FONT_DIRS", dir.join("fonts"))
        .env("REELGEN_ASSET_DIRS", dir.join("assets"));
    cmd
}

#[test]
fn test_compile_prints_engine_command_line() {
    let dir = workspace();
    reelgen(dir.path())
        .args(["compile", "--composition", "birthday.json", "--output", "card.mp4"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("ffmpeg -hide_banner"))
        .stdout(predicate::str::contains("-filter_complex"))
        .stdout(predicate::str::contains("alphamerge"))
        .stdout(predicate::str::contains("-preset ultrafast"))
        .stdout(predicate::str::contains("card.mp4"));
}

#[test]
fn test_compile_json_and_profile_override() {
    let dir = workspace();
    reelgen(dir.path())
        .args([
            "compile",
            "--composition",
            "birthday.json",
            "--profile",
            "final",
            "--json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"glyph_mask\""))
        .stdout(predicate::str::contains("\"preset\": \"slow\""));
}

#[test]
fn test_yaml_composition() {
    let dir = workspace();
    std::fs::write(
        dir.path().join("plain.yml"),
        "width: 640\nheight: 360\nduration: 2\nbackground:\n  source: bg.mp4\n",
    )
    .unwrap();

    reelgen(dir.path())
        .args(["compile", "--composition", "plain.yml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[outv]"));
}

#[test]
fn test_unknown_font_fails() {
    let dir = workspace();
    let composition = BIRTHDAY.replace("Tourney", "Papyrus");
    std::fs::write(dir.path().join("bad.json"), composition).unwrap();

    reelgen(dir.path())
        .args(["compile", "--composition", "bad.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Papyrus"));
}

#[test]
fn test_malformed_composition_fails() {
    let dir = workspace();
    std::fs::write(dir.path().join("broken.json"), "{ \"width\": 1080,").unwrap();

    reelgen(dir.path())
        .args(["compile", "--composition", "broken.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load composition"));
}

#[test]
fn test_invalid_config_file_fails() {
    let dir = workspace();
    std::fs::write(dir.path().join("reelgen.toml"), "[runner]\nworkers = 3\n").unwrap();

    reelgen(dir.path())
        .args(["compile", "--composition", "birthday.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_check_reports_missing_engine() {
    let dir = workspace();
    reelgen(dir.path())
        .env("REELGEN_ENGINE_BINARY", dir.path().join("no-such-ffmpeg"))
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Encoding engine"));
}
