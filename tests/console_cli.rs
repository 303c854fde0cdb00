use std::process::Command;

fn combined_output(output: &std::process::Output) -> String {
    let mut combined = String::new();
    combined.push_str(&String::from_utf8_lossy(&output.stdout));
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

fn overwire_bin() -> &'static str {
    option_env!("CARGO_BIN_EXE_overwire").expect("overwire test binary not built")
}

#[test]
fn help_mentions_console_options() {
    let output = Command::new(overwire_bin())
        .arg("--help")
        .output()
        .expect("run overwire --help");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("overwire"));
    assert!(combined.contains("--port"));
    assert!(combined.contains("--config"));
}

#[test]
fn version_flag_works() {
    let output = Command::new(overwire_bin())
        .arg("--version")
        .output()
        .expect("run overwire --version");
    assert!(output.status.success());
    assert!(combined_output(&output).contains("overwire"));
}
