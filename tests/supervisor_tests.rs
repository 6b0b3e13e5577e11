// tests/supervisor_tests.rs
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use logfollow::plugins::builtin_locations;
use logfollow::{
    discover, DispatchPipeline, MemorySink, PluginContext, RunConfiguration, Signals, Supervisor,
    SupervisorState,
};
use tempfile::TempDir;

const API_LINE: &str = r#"10.0.0.1 - - [15/Jan/2024:10:00:00 +0000]  "GET /api/widgets HTTP/1.1" 200 512 "-" "curl/8.0" 0.010 0.008 ."#;

fn config(dir: &TempDir) -> RunConfiguration {
    let mut config = RunConfiguration::new(dir.path().join("access.log"));
    config.pid_file = dir.path().join("logfollow.pid");
    config.poll_interval = Duration::from_millis(5);
    config
}

fn pipeline_for(sink: &Arc<MemorySink>) -> (logfollow::ParserHandle, DispatchPipeline) {
    let ctx = PluginContext { sink: sink.clone() };
    let found = discover(builtin_locations(), &ctx).unwrap();
    let (name, parser, processors) = found.select_parser(None).unwrap();
    assert_eq!(name, "parse_nginx");
    (parser, DispatchPipeline::new(processors))
}

#[test]
fn test_batch_run_with_builtin_plugins() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    std::fs::write(&config.log_file, format!("{}\n{}\n", API_LINE, API_LINE)).unwrap();
    let pid_path = config.pid_file.clone();

    let sink = Arc::new(MemorySink::new());
    let (parser, pipeline) = pipeline_for(&sink);

    let mut config = config;
    config.batch = true;
    let summary = Supervisor::new(config).start(parser, pipeline).unwrap();

    assert_eq!(summary.exit_code, 0);
    assert_eq!(summary.stats.records_dispatched, 2);
    let api_calls = sink.lines().iter().filter(|l| *l == "call.api:1|c").count();
    assert_eq!(api_calls, 2);
    assert_eq!(summary.transitions.last(), Some(&SupervisorState::Terminated));
    assert!(!pid_path.exists());
}

#[test]
fn test_tail_mode_picks_up_appended_lines() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    // Existing content is skipped when tailing
    std::fs::write(&config.log_file, format!("{}\n", API_LINE)).unwrap();
    let log_path = config.log_file.clone();

    let sink = Arc::new(MemorySink::new());
    let (parser, pipeline) = pipeline_for(&sink);
    let signals = Signals::detached();

    let writer = {
        let sink = sink.clone();
        let shutdown = signals.shutdown.clone();
        thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(10);
            while Instant::now() < deadline {
                let mut file = OpenOptions::new().append(true).open(&log_path).unwrap();
                writeln!(file, "{}", API_LINE).unwrap();
                thread::sleep(Duration::from_millis(20));
                if sink.lines().iter().any(|l| l == "call.api:1|c") {
                    break;
                }
            }
            shutdown.request();
        })
    };

    let summary = Supervisor::new(config)
        .with_signals(signals)
        .start(parser, pipeline)
        .unwrap();
    writer.join().unwrap();

    assert_eq!(summary.exit_code, 0);
    assert!(summary.stats.records_dispatched >= 1);
    assert!(sink.lines().iter().any(|l| l == "call.api:1|c"));
}
