use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn combined_output(output: &std::process::Output) -> String {
    let mut combined = String::new();
    combined.push_str(&String::from_utf8_lossy(&output.stdout));
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

fn blowout_bin() -> &'static str {
    option_env!("CARGO_BIN_EXE_blowout").expect("blowout test binary not built")
}

fn write_pcm(name: &str, samples: &[f32]) -> PathBuf {
    let path = env::temp_dir().join(format!("blowout_cli_{name}_{}.f32", std::process::id()));
    let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    fs::write(&path, bytes).expect("write pcm fixture");
    path
}

fn noise(samples: usize, amplitude: f32) -> Vec<f32> {
    let mut seed: u32 = 0x1234_5678;
    (0..samples)
        .map(|_| {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            ((seed >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0) * amplitude
        })
        .collect()
}

#[test]
fn help_mentions_candles() {
    let output = Command::new(blowout_bin())
        .arg("--help")
        .output()
        .expect("run blowout --help");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("candles"));
    assert!(combined.contains("--policy"));
}

#[test]
fn list_input_devices_uses_test_override() {
    let output = Command::new(blowout_bin())
        .arg("--list-input-devices")
        .env("BLOWOUT_TEST_DEVICES", "Desk Mic, Headset")
        .output()
        .expect("run blowout --list-input-devices");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("Available audio input devices"));
    assert!(combined.contains("  - Headset"));
}

#[test]
fn rejects_invalid_fft_size() {
    let output = Command::new(blowout_bin())
        .args(["--fft-size", "300"])
        .output()
        .expect("run blowout --fft-size 300");
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("--fft-size"));
}

#[test]
fn replay_of_silence_keeps_candles_lit() {
    let path = write_pcm("silence", &vec![0.0; 48_000]);
    let output = Command::new(blowout_bin())
        .arg("--replay-pcm")
        .arg(&path)
        .output()
        .expect("run blowout replay");
    let _ = fs::remove_file(&path);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("status: listening"));
    assert!(stdout.contains("result: candles still lit"));
}

#[test]
fn replay_of_loud_breath_blows_out_candles() {
    let path = write_pcm("noise", &noise(96_000, 0.9));
    let output = Command::new(blowout_bin())
        .arg("--replay-pcm")
        .arg(&path)
        .output()
        .expect("run blowout replay");
    let _ = fs::remove_file(&path);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("status: blown-out"));
    assert!(stdout.contains("result: candles blown out"));
}

#[test]
fn replay_json_status_is_one_object_per_line() {
    let path = write_pcm("json", &noise(96_000, 0.9));
    let output = Command::new(blowout_bin())
        .arg("--replay-pcm")
        .arg(&path)
        .arg("--json-status")
        .output()
        .expect("run blowout replay --json-status");
    let _ = fs::remove_file(&path);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert!(!lines.is_empty());
    assert!(lines.iter().all(|line| line.starts_with('{') && line.ends_with('}')));
    let last = lines.last().copied().unwrap_or_default();
    assert!(last.contains("\"blown_out\":true"));
    assert!(last.contains("\"event\":\"blown-out\""));
}
