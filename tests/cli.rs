use std::path::Path;
use std::process::{Command, Output};

use beatsync::audio::synth::{write_wav, ClickTrack};
use serde_json::Value;
use tempfile::tempdir;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_beatsync"))
}

fn record(output: &Output) -> Value {
    let stdout = String::from_utf8(output.stdout.clone()).expect("stdout utf8");
    assert_eq!(stdout.lines().count(), 1, "expected one record, got {stdout}");
    serde_json::from_str(stdout.trim()).expect("stdout should be JSON")
}

fn write_clicks(path: &Path) {
    let waveform = ClickTrack::new(120.0, 6.0, 22050).render().unwrap();
    write_wav(&waveform, path).unwrap();
}

#[test]
fn missing_argument_prints_usage_record() {
    let output = cli().output().expect("run beatsync");

    assert_eq!(output.status.code(), Some(1));
    let value = record(&output);
    assert_eq!(value["success"], false);
    assert_eq!(value["error"], "Usage: beatsync <audio_file_path>");
}

#[test]
fn usage_errors_print_failure_record() {
    for args in [vec!["--bogus"], vec!["one.wav", "two.wav"]] {
        let output = cli().args(&args).output().expect("run beatsync");

        assert_eq!(output.status.code(), Some(1), "args {:?}", args);
        let value = record(&output);
        assert_eq!(value["success"], false);
        assert!(!value["error"].as_str().unwrap().is_empty());
    }
}

#[test]
fn help_is_plain_text() {
    let output = cli().arg("--help").output().expect("run beatsync");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Usage"));
}

#[cfg(not(feature = "symphonia"))]
#[test]
fn compressed_input_without_decoder_exits_non_zero() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("song.mp3");
    std::fs::write(&path, b"ID3").unwrap();

    let output = cli().arg(&path).output().expect("run beatsync");

    assert_eq!(output.status.code(), Some(1));
    let value = record(&output);
    assert_eq!(value["success"], false);
    assert!(value["error"].as_str().unwrap().contains("symphonia"));
}

#[test]
fn wav_input_prints_success_record() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("clicks.wav");
    write_clicks(&path);

    let output = cli().arg(&path).output().expect("run beatsync");

    assert!(output.status.success(), "exited with {:?}", output.status.code());
    let value = record(&output);
    assert_eq!(value["success"], true);
    for key in ["duration", "bpm", "beats", "onsets", "peaks", "spectral", "energy"] {
        assert!(value.get(key).is_some(), "missing {key}");
    }
    assert!(value["beats"].as_array().unwrap().len() > 4);
}

#[test]
fn analysis_error_is_reported_in_record() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("notes.xyz");
    std::fs::write(&path, b"not audio").unwrap();

    let output = cli().arg(&path).output().expect("run beatsync");

    assert_eq!(output.status.code(), Some(0));
    let value = record(&output);
    assert_eq!(value["success"], false);
    assert!(value["error"].as_str().unwrap().contains("xyz"));
}

#[test]
fn bad_config_exits_non_zero() {
    let dir = tempdir().unwrap();
    let audio = dir.path().join("clicks.wav");
    write_clicks(&audio);
    let config = dir.path().join("beatsync.toml");
    std::fs::write(&config, "[analysis]\nhop_length = 0\n").unwrap();

    let output = cli()
        .arg("--config")
        .arg(&config)
        .arg(&audio)
        .output()
        .expect("run beatsync");

    assert_eq!(output.status.code(), Some(1));
    let value = record(&output);
    assert_eq!(value["success"], false);
    assert!(value["error"].as_str().unwrap().contains("hop_length"));
}

#[test]
fn check_reports_decoders() {
    let output = cli().arg("--check").output().expect("run beatsync");
    let value = record(&output);

    if cfg!(feature = "symphonia") {
        assert!(output.status.success());
        assert_eq!(value["success"], true);
    } else {
        assert_eq!(output.status.code(), Some(1));
        assert_eq!(value["success"], false);
    }
}

#[test]
fn logs_stay_off_stdout() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("clicks.wav");
    write_clicks(&path);

    let output = cli().arg("--verbose").arg(&path).output().expect("run beatsync");

    assert!(output.status.success());
    assert_eq!(record(&output)["success"], true);
    assert!(!output.stderr.is_empty());
}
