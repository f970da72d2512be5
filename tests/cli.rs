//! Command line tests of the util_spectral_scan binary. None of them reach a concentrator.

use std::io::Write;
use std::process::Output;
use std::str::from_utf8;

use assert_cmd::{output::OutputError, Command};
use tempfile::TempDir;

fn spectral_scan() -> Command {
    Command::cargo_bin("util_spectral_scan").unwrap()
}

fn get_cmd_output(result: Result<Output, OutputError>) -> (String, String) {
    let output = match result {
        Ok(o) => o,
        Err(o) => o.as_output().unwrap().clone(),
    };
    (
        from_utf8(&output.stdout).unwrap().to_string(),
        from_utf8(&output.stderr).unwrap().to_string(),
    )
}

#[test]
fn help_lists_scan_options() {
    let (stdout, _) = get_cmd_output(spectral_scan().arg("-h").ok());
    for flag in ["-f", "-n", "-r", "-l", "-d", "-c", "-t"] {
        assert!(stdout.contains(flag), "missing {} in help:\n{}", flag, stdout);
    }
}

#[test]
fn rejects_bad_arguments_before_scanning() {
    for args in [
        &["-f", "700:0.2:870"][..],
        &["-f", "863:0.001:870"],
        &["-f", "863:0.2"],
        &["-n", "0"],
        &["-n", "70000"],
        &["-r", "0"],
        &["-t", "0"],
    ] {
        let dir = TempDir::new().unwrap();
        let result = spectral_scan().current_dir(dir.path()).args(args).ok();
        assert!(result.is_err(), "{:?} should fail", args);
        let (stdout, _) = get_cmd_output(result);
        assert!(!stdout.contains("+++ Start spectral scan"), "{:?} reached the scan", args);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

#[test]
fn stop_below_start_fails() {
    let dir = TempDir::new().unwrap();
    let result = spectral_scan()
        .current_dir(dir.path())
        .args(["-f", "870:0.2:868", "-d", "/nonexistent/ttyACM9"])
        .ok();
    assert!(result.is_err());
    let (stdout, _) = get_cmd_output(result);
    assert!(stdout.starts_with("ERROR:"), "{}", stdout);
    assert!(!stdout.contains("+++ Start spectral scan"));
}

#[test]
fn spi_configuration_is_rejected() {
    let dir = TempDir::new().unwrap();
    let conf_path = dir.path().join("spectral_scan.json");
    let mut conf = std::fs::File::create(&conf_path).unwrap();
    write!(conf, r#"{{"board": {{"com_type": "SPI", "com_path": "/dev/spidev0.0"}}}}"#).unwrap();

    let result = spectral_scan().current_dir(dir.path()).arg("-c").arg(&conf_path).ok();
    assert!(result.is_err());
    let (stdout, _) = get_cmd_output(result);
    assert!(stdout.contains("ERROR:"));
    assert!(stdout.contains("USB"), "{}", stdout);
}

#[test]
fn unknown_configuration_key_is_rejected() {
    let dir = TempDir::new().unwrap();
    let conf_path = dir.path().join("spectral_scan.json");
    std::fs::write(&conf_path, r#"{"scan": {"nb_sample": 10}}"#).unwrap();

    let result = spectral_scan().arg("-c").arg(&conf_path).ok();
    assert!(result.is_err());
    let (stdout, _) = get_cmd_output(result);
    assert!(stdout.contains("configuration"), "{}", stdout);
}

#[test]
fn missing_device_fails_after_banner() {
    let dir = TempDir::new().unwrap();
    let result = spectral_scan()
        .current_dir(dir.path())
        .args(["-d", "/nonexistent/ttyACM9", "-f", "868:1:870"])
        .ok();
    assert!(result.is_err());
    let (stdout, _) = get_cmd_output(result);
    assert!(stdout.starts_with("+++ Start spectral scan of LoRa gateway channels +++"));
    assert!(stdout.contains("ERROR:"));
    assert!(!dir.path().join("rssi_histogram.csv").exists());
}
