use std::io::Write;
use std::process::Command;

fn pcisim() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pcisim"));
    cmd.env_remove("PCISIM_REGISTER_SIZE")
        .env_remove("PCISIM_WAVEFORM_OFFSET")
        .env_remove("PCISIM_WAVEFORM_NUMBER")
        .env_remove("PCISIM_WAVEFORM_POINT")
        .env("RUST_LOG", "warn");
    cmd
}

fn script_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn runs_a_script_file() {
    let script = script_file("wr16 0x20 0xbeef\nrd16 0x20\n");
    let output = pcisim().arg("script").arg(script.path()).output().unwrap();
    assert!(output.status.success(), "{output:?}");

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("RD_VALUE_16    addr = 0x00000020    data = 0xBEEF"));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("2 command(s), 0 failure(s)"));
}

#[test]
fn failing_commands_set_the_exit_status() {
    let script = script_file("rd32 0xfffff\n");
    let output = pcisim().arg("script").arg(script.path()).output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8(output.stdout)
        .unwrap()
        .contains("error: OutOfRange"));
}

#[test]
fn device_flags_override_the_environment() {
    let script = script_file("rd8 0x80\n");
    let output = pcisim()
        .env("PCISIM_REGISTER_SIZE", "0x100000")
        .args(["--register-size", "0x80", "--waveform-offset", "0", "--waveform-number", "1"])
        .args(["--waveform-point", "4", "script"])
        .arg(script.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8(output.stdout)
        .unwrap()
        .contains("error: OutOfRange"));
}

#[test]
fn invalid_layout_is_rejected_at_startup() {
    let script = script_file("");
    let output = pcisim()
        .args(["--register-size", "16", "script"])
        .arg(script.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8(output.stderr)
        .unwrap()
        .contains("invalid device configuration"));
}
