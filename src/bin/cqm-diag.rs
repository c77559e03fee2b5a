use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use call_quality_meter::capture::{CaptureDevice, Recording, StubCapture, Track};
use call_quality_meter::config::{AppConfig, DEFAULT_CONFIG_PATH};
use call_quality_meter::report::{read_metrics_log, LogReporter, LogSummary, ReportSink};
use call_quality_meter::session::{
    run_live, run_synthetic, LogDisplay, MetricsSession, Pacer, RunOptions, DEFAULT_STEP_MS,
};
use call_quality_meter::source::{LiveStatsSource, ReplayStatsProvider, SampleSource, SyntheticSource};
use call_quality_meter::telemetry;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::sync::watch;

#[path = "cqm_diag/report.rs"]
mod report;
use report::{print_summary_json, print_summary_table, RunReport};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("cqm-diag error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(name = "cqm-diag", about = "Call quality metrics simulator and log inspector")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn execute(self) -> Result<()> {
        match self.command {
            Command::Simulate(args) => simulate_command(args),
            Command::Replay(args) => replay_command(args),
            Command::Summarize(args) => summarize_command(args),
            Command::Serve(args) => serve_command(args),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture audio and simulate network conditions per chunk.
    Simulate(SimulateArgs),
    /// Score a recorded sequence of transport statistics snapshots.
    Replay(ReplayArgs),
    /// Summarize a metrics CSV log.
    Summarize(SummarizeArgs),
    /// Run a simulation behind the debug HTTP server (requires debug_http feature).
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
struct SessionArgs {
    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Wall-clock pacing or instant virtual time.
    #[arg(long, value_enum, default_value_t = PaceArg::Realtime)]
    pace: PaceArg,
    /// Stop after this many milliseconds.
    #[arg(long)]
    duration_ms: Option<u64>,
    /// Audio capture backend.
    #[arg(long, value_enum, default_value_t = CaptureArg::Stub)]
    capture: CaptureArg,
    /// Write one CSV row per flushed window.
    #[arg(long)]
    metrics_log: Option<PathBuf>,
    /// Export original.wav and received.wav into this directory.
    #[arg(long)]
    wav_dir: Option<PathBuf>,
    /// POST every sample to this URL (requires http_report feature).
    #[arg(long)]
    report_endpoint: Option<String>,
    /// Output format for the run report.
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
struct SimulateArgs {
    #[command(flatten)]
    session: SessionArgs,
    /// Fixed RNG seed for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,
    /// Upper bound of the jitter draw.
    #[arg(long)]
    max_jitter_ms: Option<f64>,
    /// Upper bound of the packet loss draw.
    #[arg(long)]
    max_loss_percent: Option<f64>,
}

#[derive(Args, Debug, Clone)]
struct ReplayArgs {
    #[command(flatten)]
    session: SessionArgs,
    /// JSON array of statistics snapshots.
    #[arg(long)]
    stats: PathBuf,
    /// Override the polling interval (milliseconds).
    #[arg(long)]
    poll_interval_ms: Option<u64>,
}

#[derive(Args, Debug, Clone)]
struct SummarizeArgs {
    /// Metrics CSV produced with --metrics-log.
    #[arg(long)]
    log: PathBuf,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
struct ServeArgs {
    /// Host interface for the HTTP diagnostics server.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    /// Port to expose HTTP metrics on.
    #[arg(long, default_value_t = 8_787)]
    port: u16,
    /// Token required by HTTP consumers.
    #[arg(long, default_value = "cqm-debug")]
    token: String,
    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum PaceArg {
    Realtime,
    Virtual,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum CaptureArg {
    Stub,
    Mic,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Json,
    Table,
}

impl SessionArgs {
    fn load_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => {
                if !path.exists() {
                    bail!("config file {} does not exist", path.display());
                }
                AppConfig::load_from_file(path)
            }
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => AppConfig::load(),
            None => AppConfig::default(),
        };
        if let Some(path) = &self.metrics_log {
            config.report.metrics_log = Some(path.clone());
        }
        if let Some(endpoint) = &self.report_endpoint {
            config.report.endpoint = Some(endpoint.clone());
        }
        Ok(config.validated())
    }

    fn pacer(&self) -> Pacer {
        match self.pace {
            PaceArg::Realtime => Pacer::realtime(DEFAULT_STEP_MS),
            PaceArg::Virtual => Pacer::virtual_clock(DEFAULT_STEP_MS),
        }
    }

    fn run_options(&self, poll_interval_ms: u64) -> RunOptions {
        let shutdown = (self.pace == PaceArg::Realtime).then(ctrl_c_shutdown);
        RunOptions {
            duration_ms: self.duration_ms,
            poll_interval_ms,
            shutdown,
        }
    }

    fn capture_device(&self, config: &AppConfig) -> Result<Box<dyn CaptureDevice>> {
        match self.capture {
            CaptureArg::Stub => Ok(Box::new(StubCapture::new(
                config.capture.sample_rate,
                config.capture.tone_hz,
            ))),
            CaptureArg::Mic => mic_capture(),
        }
    }

    fn emit(&self, report: RunReport) -> Result<()> {
        match self.format {
            OutputFormat::Json => report.print_json(),
            OutputFormat::Table => {
                report.print_table();
                Ok(())
            }
        }
    }
}

#[cfg(feature = "mic")]
fn mic_capture() -> Result<Box<dyn CaptureDevice>> {
    Ok(Box::new(call_quality_meter::capture::CpalCapture::new()))
}

#[cfg(not(feature = "mic"))]
fn mic_capture() -> Result<Box<dyn CaptureDevice>> {
    bail!("--capture mic requires the mic feature");
}

/// Flip the returned receiver to `true` on Ctrl+C.
fn ctrl_c_shutdown() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(true);
        }
    });
    rx
}

fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building session runtime")
}

fn reporter(config: &AppConfig) -> Result<Box<dyn ReportSink>> {
    match &config.report.endpoint {
        None => Ok(Box::new(LogReporter)),
        Some(endpoint) => http_reporter(endpoint),
    }
}

#[cfg(feature = "http_report")]
fn http_reporter(endpoint: &str) -> Result<Box<dyn ReportSink>> {
    Ok(Box::new(call_quality_meter::report::HttpReporter::new(endpoint)))
}

#[cfg(not(feature = "http_report"))]
fn http_reporter(_endpoint: &str) -> Result<Box<dyn ReportSink>> {
    bail!("--report-endpoint requires the http_report feature");
}

fn configure<S: SampleSource>(
    session: MetricsSession<S>,
    config: &AppConfig,
    keep_audio: bool,
) -> Result<MetricsSession<S>> {
    let session = session
        .with_display(LogDisplay)
        .with_reporter(reporter(config)?);
    let session = if keep_audio {
        session
    } else {
        session.without_recording()
    };

    match &config.report.metrics_log {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).context("creating metrics log directory")?;
            }
            let file = File::create(path)
                .with_context(|| format!("creating metrics log {}", path.display()))?;
            session
                .with_metrics_log(file)
                .context("writing metrics log header")
        }
        None => Ok(session),
    }
}

fn export_wav(dir: &Path, recording: &Recording) -> Result<()> {
    fs::create_dir_all(dir).context("creating WAV output directory")?;
    for (track, name) in [(Track::Original, "original.wav"), (Track::Received, "received.wav")] {
        let path = dir.join(name);
        let samples = recording
            .write_wav(&path, track)
            .with_context(|| format!("writing {}", path.display()))?;
        tracing::info!("wrote {samples} samples to {}", path.display());
    }
    Ok(())
}

fn simulate_command(args: SimulateArgs) -> Result<()> {
    let mut config = args.session.load_config()?;
    if args.seed.is_some() {
        config.synthetic.seed = args.seed;
    }
    if let Some(max) = args.max_jitter_ms {
        config.synthetic.max_jitter_ms = max;
    }
    if let Some(max) = args.max_loss_percent {
        config.synthetic.max_loss_percent = max;
    }
    let config = config.validated();

    let runtime = build_runtime()?;
    let summary = runtime.block_on(async {
        let mut session = configure(
            MetricsSession::new(SyntheticSource::from_config(&config.synthetic), &config),
            &config,
            args.session.wav_dir.is_some(),
        )?;
        let mut capture = args.session.capture_device(&config)?;
        let mut pacer = args.session.pacer();
        let options = args
            .session
            .run_options(config.live.poll_interval_ms);

        run_synthetic(&mut session, capture.as_mut(), &mut pacer, options)
            .await
            .context("starting capture")
    })?;

    if let (Some(dir), Some(recording)) = (&args.session.wav_dir, &summary.recording) {
        export_wav(dir, recording)?;
    }

    let report = RunReport::new("synthetic", &summary, &telemetry::hub().snapshot());
    args.session.emit(report)
}

fn replay_command(args: ReplayArgs) -> Result<()> {
    let config = args.session.load_config()?;
    let mut provider = ReplayStatsProvider::from_file(&args.stats)
        .with_context(|| format!("loading statistics from {}", args.stats.display()))?;
    let poll_interval_ms = args
        .poll_interval_ms
        .unwrap_or(config.live.poll_interval_ms)
        .max(1);

    let runtime = build_runtime()?;
    let summary = runtime.block_on(async {
        let mut session = configure(
            MetricsSession::new(LiveStatsSource::new(), &config),
            &config,
            args.session.wav_dir.is_some(),
        )?;
        let mut capture = args.session.capture_device(&config)?;
        let mut pacer = args.session.pacer();
        let options = args.session.run_options(poll_interval_ms);

        run_live(
            &mut session,
            capture.as_mut(),
            &mut provider,
            &mut pacer,
            options,
        )
        .await
        .context("starting capture")
    })?;

    if let (Some(dir), Some(recording)) = (&args.session.wav_dir, &summary.recording) {
        export_wav(dir, recording)?;
    }

    let report = RunReport::new("live", &summary, &telemetry::hub().snapshot());
    args.session.emit(report)
}

fn summarize_command(args: SummarizeArgs) -> Result<()> {
    let rows = read_metrics_log(&args.log)
        .with_context(|| format!("reading metrics log {}", args.log.display()))?;
    let Some(summary) = LogSummary::from_rows(&rows) else {
        bail!("metrics log {} has no rows", args.log.display());
    };

    match args.format {
        OutputFormat::Json => print_summary_json(&summary),
        OutputFormat::Table => {
            print_summary_table(&summary);
            Ok(())
        }
    }
}

fn serve_command(args: ServeArgs) -> Result<()> {
    #[cfg(feature = "debug_http")]
    {
        serve_impl(args)
    }

    #[cfg(not(feature = "debug_http"))]
    {
        let _ = args;
        bail!("cqm-diag serve requires the debug_http feature");
    }
}

#[cfg(feature = "debug_http")]
fn serve_impl(args: ServeArgs) -> Result<()> {
    use call_quality_meter::http;
    use call_quality_meter::session::SharedChart;

    let config = match &args.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::default(),
    }
    .validated();

    std::env::set_var("CQM_DEBUG_HTTP_ADDR", format!("{}:{}", args.host, args.port));
    std::env::set_var("CQM_DEBUG_TOKEN", &args.token);

    let chart = SharedChart::new();
    if !http::spawn_debug_server(chart.clone(), telemetry::hub()) {
        bail!("debug HTTP server already running");
    }
    println!(
        "Debug HTTP server running on {} (token prefix {}***)",
        http::addr_from_env(),
        args.token.chars().take(4).collect::<String>()
    );
    println!("Press Ctrl+C to stop.");

    let runtime = build_runtime()?;
    let summary = runtime.block_on(async {
        let mut session = MetricsSession::new(SyntheticSource::from_config(&config.synthetic), &config)
            .with_chart(chart)
            .with_display(LogDisplay)
            .without_recording();
        let mut capture = StubCapture::new(config.capture.sample_rate, config.capture.tone_hz);
        let mut pacer = Pacer::realtime(DEFAULT_STEP_MS);
        let options = RunOptions {
            duration_ms: None,
            poll_interval_ms: config.live.poll_interval_ms,
            shutdown: Some(ctrl_c_shutdown()),
        };
        run_synthetic(&mut session, &mut capture, &mut pacer, options)
            .await
            .context("starting capture")
    })?;

    RunReport::new("synthetic", &summary, &telemetry::hub().snapshot()).print_table();
    Ok(())
}
