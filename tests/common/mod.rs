use std::fs;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_shufv") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "shufv.exe" } else { "shufv" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve shufv binary path for integration test"),
    }
}

/// Run `shufv` with `args` inside an isolated `home`, forcing JSON output
/// unless `env` overrides it.
pub fn run_cli_case_in(
    case_name: &str,
    home: &std::path::Path,
    args: &[&str],
    env: &[(&str, &str)],
) -> CmdResult {
    let root = std::env::temp_dir().join("shufv-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let mut command = Command::new(&bin_path);
    command
        .args(args)
        .env("HOME", home)
        .env("SUV_OUTPUT_FORMAT", "json")
        .env("RUST_BACKTRACE", "1");
    for (key, value) in env {
        command.env(key, value);
    }
    let output = command.output().expect("execute shufv command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("env={env:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let home = tempfile::tempdir().expect("create isolated home");
    run_cli_case_in(case_name, home.path(), args, &[])
}

/// All 24 orderings of `1 2 3 4` in lexicographic order.
pub fn permutations_of_four() -> Vec<[u8; 4]> {
    let mut out = Vec::with_capacity(24);
    for a in 1..=4u8 {
        for b in 1..=4u8 {
            for c in 1..=4u8 {
                for d in 1..=4u8 {
                    let p = [a, b, c, d];
                    let mut sorted = p;
                    sorted.sort_unstable();
                    if sorted == [1, 2, 3, 4] {
                        out.push(p);
                    }
                }
            }
        }
    }
    out
}

/// A `-v 3` style transcript: list build-up, one dump per shuffle, teardown.
pub fn transcript_from(rounds: usize, skew: Option<[u8; 4]>) -> String {
    let mut text = String::from(
        "cmd> new\nl = []\ncmd> it 1\nl = [1]\ncmd> it 2\nl = [1 2]\n\
         cmd> it 3\nl = [1 2 3]\ncmd> it 4\nl = [1 2 3 4]\n",
    );
    for _ in 0..rounds {
        for p in permutations_of_four() {
            let shown = skew.unwrap_or(p);
            text.push_str(&format!(
                "cmd> shuffle\nl = [{} {} {} {}]\n",
                shown[0], shown[1], shown[2], shown[3]
            ));
        }
    }
    text.push_str("cmd> free\nl = NULL\ncmd> quit\nFreeing queue\n");
    text
}
