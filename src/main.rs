use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use logfollow::config::{FileConfig, LogFormat, OutputKind};
use logfollow::logging;
use logfollow::plugins::builtin_locations;
use logfollow::plugins::outputs::{build_sink, MemorySink};
use logfollow::{discover, DispatchPipeline, PluginContext, Supervisor};

#[derive(Parser)]
#[command(name = "logfollow")]
#[command(about = "Tail a log file, parse each new line and emit metrics from it")]
#[command(version)]
struct Args {
    /// Log file to follow
    #[arg(short = 'l', long = "log-file", value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Parser to use (default: first parser by name)
    #[arg(short = 'p', long = "parser", value_name = "NAME")]
    parser: Option<String>,

    /// Where to write our process id
    #[arg(short = 'f', long = "pid-file", value_name = "PATH")]
    pid_file: Option<PathBuf>,

    /// Debug logging, including processor failures
    #[arg(short = 'd', long)]
    debug: bool,

    /// Process the file from the start once, then exit
    #[arg(short = 'b', long = "batch-mode")]
    batch: bool,

    /// Reopen the file when it is rotated
    #[arg(short = 'a', long = "auto-reload")]
    auto_reload: bool,

    /// YAML configuration file; flags override its values
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Sleep between polls when no new data is available (e.g. 100ms)
    #[arg(long, value_name = "DURATION")]
    poll_interval: Option<String>,

    /// Idle polls before checking for rotation
    #[arg(long, value_name = "N")]
    reload_threshold: Option<u32>,

    /// Log progress every N lines (0 disables)
    #[arg(long, value_name = "N")]
    progress_interval: Option<u64>,

    /// Metric output
    #[arg(long, value_enum)]
    output: Option<OutputKind>,

    /// statsd host:port
    #[arg(long, value_name = "ADDR")]
    statsd_addr: Option<String>,

    /// Prefix prepended to every metric name
    #[arg(long, value_name = "PREFIX")]
    statsd_prefix: Option<String>,

    /// Diagnostic log format on stderr
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Print the available parsers and processors and exit
    #[arg(long)]
    list_plugins: bool,
}

impl Args {
    /// Flags as a partial config; unset switches stay `None` so the file can
    /// provide them
    fn overrides(&self) -> FileConfig {
        FileConfig {
            log_file: self.log_file.clone(),
            parser: self.parser.clone(),
            pid_file: self.pid_file.clone(),
            debug: self.debug.then_some(true),
            batch: self.batch.then_some(true),
            auto_reload: self.auto_reload.then_some(true),
            poll_interval: self.poll_interval.clone(),
            reload_threshold: self.reload_threshold,
            progress_interval: self.progress_interval,
            output: self.output,
            statsd_addr: self.statsd_addr.clone(),
            statsd_prefix: self.statsd_prefix.clone(),
            log_format: self.log_format,
        }
    }
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version land here too and are not failures
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    match run(args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn list_plugins() -> anyhow::Result<i32> {
    let ctx = PluginContext {
        sink: Arc::new(MemorySink::new()),
    };
    let found = discover(builtin_locations(), &ctx)?;

    println!("Parsers:");
    for name in found.parser_names() {
        println!("  {}", name);
    }
    println!("Processors:");
    for name in found.processor_names() {
        println!("  {}", name);
    }
    Ok(0)
}

fn run(args: Args) -> anyhow::Result<i32> {
    if args.list_plugins {
        return list_plugins();
    }

    let file_config = match &args.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    let config = args.overrides().overlay(file_config).resolve()?;

    logging::init_logging(config.log_format, config.debug);

    let sink = build_sink(&config).context("Failed to set up metric output")?;
    let found = discover(builtin_locations(), &PluginContext { sink })
        .context("Failed to load plugins")?;
    let (_, parser, processors) = found.select_parser(config.parser.as_deref())?;

    let pipeline = DispatchPipeline::new(processors).with_debug(config.debug);
    let summary = Supervisor::new(config)
        .with_os_signals()
        .start(parser, pipeline)?;

    if let Some(e) = &summary.error {
        eprintln!("Error: {}", e);
    }

    Ok(summary.exit_code)
}
