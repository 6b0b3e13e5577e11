// tests/cli_tests.rs
use assert_cmd::Command;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use predicates::prelude::*;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::{NamedTempFile, TempDir};

const API_LINE: &str = r#"10.0.0.1 - - [15/Jan/2024:10:00:00 +0000]  "GET /api/widgets?page=2 HTTP/1.1" 200 512 "-" "Mozilla/5.0 (Windows NT 10.0) Chrome/120 Safari/537" 0.010 0.008 ."#;
const AJAX_LINE: &str = r#"10.0.0.2 - - [15/Jan/2024:10:00:01 +0000]  "POST /ajax/save HTTP/1.1" 200 64 "-" "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15) Firefox/121.0" 0.004 0.003 ."#;

fn log_file(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file.flush().unwrap();
    file
}

fn logfollow(pid_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("logfollow").unwrap();
    cmd.env_remove("RUST_LOG")
        .arg("--pid-file")
        .arg(pid_dir.path().join("logfollow.pid"));
    cmd
}

#[test]
fn test_batch_mode_emits_metrics_to_stdout() {
    let log = log_file(&[API_LINE, AJAX_LINE]);
    let pid_dir = TempDir::new().unwrap();

    logfollow(&pid_dir)
        .arg("--log-file")
        .arg(log.path())
        .arg("--batch-mode")
        .arg("--output")
        .arg("stdout")
        .assert()
        .success()
        .stdout(predicate::str::contains("call.api:1|c"))
        .stdout(predicate::str::contains("call.ajax:1|c"))
        .stdout(predicate::str::contains("browser_request.firefox."));

    assert!(!pid_dir.path().join("logfollow.pid").exists());
}

#[test]
fn test_statsd_prefix_applies_to_stdout_output() {
    let log = log_file(&[API_LINE]);
    let pid_dir = TempDir::new().unwrap();

    logfollow(&pid_dir)
        .args(["-b", "--output", "stdout", "--statsd-prefix", "web"])
        .arg("-l")
        .arg(log.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("web.call.api:1|c"));
}

#[test]
fn test_unparseable_lines_do_not_fail_the_run() {
    let log = log_file(&["not an access log line", "", API_LINE]);
    let pid_dir = TempDir::new().unwrap();

    logfollow(&pid_dir)
        .args(["-b", "--output", "stdout"])
        .arg("-l")
        .arg(log.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("call.api:1|c").count(1));
}

#[test]
fn test_missing_log_file_exits_with_error() {
    let dir = TempDir::new().unwrap();
    let pid_dir = TempDir::new().unwrap();

    logfollow(&pid_dir)
        .arg("--log-file")
        .arg(dir.path().join("nope.log"))
        .args(["--batch-mode", "--output", "stdout"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("nope.log"));

    assert!(!pid_dir.path().join("logfollow.pid").exists());
}

#[test]
fn test_unknown_parser_exits_with_error() {
    let log = log_file(&[API_LINE]);
    let pid_dir = TempDir::new().unwrap();

    logfollow(&pid_dir)
        .arg("--log-file")
        .arg(log.path())
        .args(["--parser", "parse_apache", "-b", "--output", "stdout"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("parse_apache"));

    assert!(!pid_dir.path().join("logfollow.pid").exists());
}

#[test]
fn test_explicit_parser_selection() {
    let log = log_file(&[
        "Mon Jan 15 10:00:00 2024 1 10.0.0.5 2048 /srv/ftp/report.pdf b _ o r alice ftp 0 * c",
    ]);
    let pid_dir = TempDir::new().unwrap();

    // xferlog records carry no path, so the url processors stay quiet
    logfollow(&pid_dir)
        .arg("--log-file")
        .arg(log.path())
        .args(["--parser", "parse_proftpd_xfrlog", "-b", "--output", "stdout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("call.").not());
}

#[test]
fn test_log_file_is_required() {
    let pid_dir = TempDir::new().unwrap();

    logfollow(&pid_dir)
        .arg("--batch-mode")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("log file is required"));
}

#[test]
fn test_list_plugins() {
    Command::cargo_bin("logfollow")
        .unwrap()
        .arg("--list-plugins")
        .assert()
        .success()
        .stdout(predicate::str::contains("parse_nginx"))
        .stdout(predicate::str::contains("parse_proftpd_xfrlog"))
        .stdout(predicate::str::contains("process_os_and_user_agent_request"));
}

#[test]
fn test_config_file_values_with_flag_override() {
    let log = log_file(&[API_LINE]);
    let pid_dir = TempDir::new().unwrap();
    let mut config = NamedTempFile::new().unwrap();
    writeln!(config, "log_file: {}", log.path().display()).unwrap();
    writeln!(config, "batch: true").unwrap();
    writeln!(config, "output: stdout").unwrap();
    writeln!(config, "statsd_prefix: fromfile").unwrap();
    config.flush().unwrap();

    logfollow(&pid_dir)
        .arg("--config")
        .arg(config.path())
        .args(["--statsd-prefix", "fromflag"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fromflag.call.api:1|c"))
        .stdout(predicate::str::contains("fromfile").not());
}

#[test]
fn test_invalid_poll_interval() {
    let log = log_file(&[API_LINE]);
    let pid_dir = TempDir::new().unwrap();

    logfollow(&pid_dir)
        .arg("--log-file")
        .arg(log.path())
        .args(["--poll-interval", "soon"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("poll interval"));
}

#[test]
fn test_usage_error_exits_with_one() {
    Command::cargo_bin("logfollow")
        .unwrap()
        .arg("--no-such-flag")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--no-such-flag"));
}

#[test]
fn test_help_exits_cleanly() {
    Command::cargo_bin("logfollow")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-file"));
}

/// Forward each line of a child pipe into a channel
fn lines_of<R: std::io::Read + Send + 'static>(pipe: R) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in BufReader::new(pipe).lines().map_while(Result::ok) {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn wait_for_line(rx: &Receiver<String>, wanted: &str, times: usize) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut seen = 0;
    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        match rx.recv_timeout(left) {
            Ok(line) if line.contains(wanted) => {
                seen += 1;
                if seen == times {
                    return true;
                }
            }
            Ok(_) => {}
            Err(_) => return false,
        }
    }
    false
}

fn wait_for_exit(child: &mut Child) -> Option<i32> {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if let Some(status) = child.try_wait().unwrap() {
            return status.code();
        }
        thread::sleep(Duration::from_millis(20));
    }
    let _ = child.kill();
    None
}

#[test]
fn test_reload_and_terminate_signals() {
    let log = log_file(&[API_LINE]);
    let pid_dir = TempDir::new().unwrap();
    let pid_path = pid_dir.path().join("logfollow.pid");

    let mut child = std::process::Command::new(assert_cmd::cargo::cargo_bin("logfollow"))
        .env_remove("RUST_LOG")
        .arg("--log-file")
        .arg(log.path())
        .arg("--pid-file")
        .arg(&pid_path)
        .args(["--output", "stdout", "--poll-interval", "10ms"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    let stdout = lines_of(child.stdout.take().unwrap());
    let stderr = lines_of(child.stderr.take().unwrap());

    // Handlers are bound once the file is being followed
    assert!(wait_for_line(&stderr, "following log file", 1));
    let pid: i32 = std::fs::read_to_string(&pid_path)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert_eq!(pid as u32, child.id());
    let pid = Pid::from_raw(pid);

    // Tail mode skips the existing line and picks up the new one
    let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
    writeln!(file, "{}", API_LINE).unwrap();
    assert!(wait_for_line(&stdout, "call.api:1|c", 1));

    // Reload starts over: both lines are read again
    kill(pid, Signal::SIGUSR1).unwrap();
    assert!(wait_for_line(&stdout, "call.api:1|c", 2));

    kill(pid, Signal::SIGTERM).unwrap();
    assert_eq!(wait_for_exit(&mut child), Some(0));
    assert!(!pid_path.exists());
}
