mod record;
mod view;

use anyhow::{anyhow, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{self, Clear, ClearType};
use hopline_model::{COMMAND_START_TRACE, COMMAND_STOP_TRACE, EVENT_HOP_LIST, EVENT_PING};
use hopline_state::{TraceAggregator, TraceViews};
use hopline_transport::{select_transport, Event, EventCallback, TransportConfig};
use parking_lot::Mutex;
use record::{read_events, EventRecorder};
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;
use view::{render_views, DrawOpts};

#[derive(Parser)]
#[command(name = "hopline", version, about = "Live per-hop latency for a network path")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Watch(WatchArgs),
    Start(StartArgs),
    Stop(StopArgs),
    Replay(ReplayArgs),
}

#[derive(Args, Clone)]
struct ServerArgs {
    /// Relay server base URL (defaults to HOPLINE_SERVER or http://127.0.0.1:8080).
    #[arg(long)]
    server: Option<String>,

    #[arg(long)]
    reconnect_ms: Option<u64>,
}

impl ServerArgs {
    fn config(&self) -> Result<TransportConfig> {
        let mut config = TransportConfig::from_env()?;
        if let Some(server) = &self.server {
            let url = Url::parse(server.trim())
                .map_err(|err| anyhow!("invalid --server {server:?}: {err}"))?;
            config = config.with_base_url(url);
        }
        if let Some(ms) = self.reconnect_ms {
            config = config.with_reconnect_delay(Duration::from_millis(ms));
        }
        Ok(config)
    }
}

#[derive(Args)]
#[command(
    about = "Start a trace and render live hop latency. Only target networks you own or have permission to test."
)]
struct WatchArgs {
    #[arg(long)]
    host: String,

    #[command(flatten)]
    server: ServerArgs,

    #[arg(long, default_value_t = 500)]
    refresh_ms: u64,

    #[arg(long)]
    plain: bool,

    /// Append every received event to this NDJSON file.
    #[arg(long)]
    record: Option<PathBuf>,
}

#[derive(Args)]
struct StartArgs {
    #[arg(long)]
    host: String,

    #[command(flatten)]
    server: ServerArgs,
}

#[derive(Args)]
struct StopArgs {
    #[command(flatten)]
    server: ServerArgs,
}

#[derive(Args)]
struct ReplayArgs {
    #[arg(long = "in")]
    in_path: PathBuf,

    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() {
    init_logging();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("warn,hopline=info,hopline_transport=info,hopline_state=info")
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Watch(args) => block_on(run_watch(args)),
        Commands::Start(args) => block_on(run_command(
            &args.server,
            COMMAND_START_TRACE,
            json!({ "host": args.host }),
        )),
        Commands::Stop(args) => block_on(run_command(&args.server, COMMAND_STOP_TRACE, json!({}))),
        Commands::Replay(args) => run_replay(args),
    }
}

fn block_on<F: Future<Output = Result<()>>>(future: F) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| anyhow!("failed to create runtime: {err}"))?;
    runtime.block_on(future)
}

async fn run_command(server: &ServerArgs, command: &str, args: serde_json::Value) -> Result<()> {
    let transport = select_transport(&server.config()?)?;
    match transport.invoke(command, args).await? {
        Some(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        None => Err(anyhow!("{command} is not available over this transport")),
    }
}

async fn run_watch(args: WatchArgs) -> Result<()> {
    let transport = select_transport(&args.server.config()?)?;
    let aggregator = Arc::new(Mutex::new(TraceAggregator::new()));
    let mut views = aggregator.lock().subscribe();
    aggregator.lock().reset();

    let recorder = match &args.record {
        Some(path) => Some(Arc::new(EventRecorder::create(path)?)),
        None => None,
    };

    let mut subscriptions = Vec::new();
    for event in [EVENT_HOP_LIST, EVENT_PING] {
        let callback = ingest_callback(event, aggregator.clone(), recorder.clone());
        subscriptions.push(transport.listen(event, callback).await?);
    }

    let (stop_tx, mut stop_rx) = tokio::sync::mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })?;

    match transport
        .invoke(COMMAND_START_TRACE, json!({ "host": args.host }))
        .await?
    {
        Some(_) => info!(host = %args.host, "trace started"),
        None => warn!("start_trace is not available over this transport"),
    }

    let opts = DrawOpts { plain: args.plain };
    let mut ticker = tokio::time::interval(Duration::from_millis(args.refresh_ms.max(50)));
    let mut drawn_revision = None;
    loop {
        tokio::select! {
            _ = stop_rx.recv() => break,
            _ = ticker.tick() => {
                let current = views.borrow_and_update().clone();
                if drawn_revision != Some(current.revision) {
                    draw(&args.host, &current, &opts)?;
                    drawn_revision = Some(current.revision);
                }
            }
        }
    }

    info!(host = %args.host, "stopping trace");
    if let Err(err) = transport.invoke(COMMAND_STOP_TRACE, json!({})).await {
        warn!(%err, "stop_trace failed");
    }
    for subscription in subscriptions {
        subscription.unlisten();
    }
    Ok(())
}

fn ingest_callback(
    event: &'static str,
    aggregator: Arc<Mutex<TraceAggregator>>,
    recorder: Option<Arc<EventRecorder>>,
) -> EventCallback {
    Arc::new(move |delivered: &Event| {
        if let Some(recorder) = &recorder {
            recorder.record(event, &delivered.payload);
        }
        if let Err(err) = aggregator.lock().ingest(event, &delivered.payload) {
            warn!(event, %err, "dropping malformed payload");
        }
    })
}

fn draw(target: &str, views: &TraceViews, opts: &DrawOpts) -> Result<()> {
    let width = terminal::size().map(|(w, _)| w).unwrap_or(80);
    let updated_at = Local::now().format("%H:%M:%S").to_string();
    let frame = render_views(target, views, &updated_at, width);

    let mut stdout = std::io::stdout();
    if !opts.plain {
        execute!(stdout, Clear(ClearType::All), MoveTo(0, 0))?;
    }
    writeln!(stdout, "{frame}")?;
    if opts.plain {
        writeln!(stdout)?;
    }
    stdout.flush()?;
    Ok(())
}

fn run_replay(args: ReplayArgs) -> Result<()> {
    let events = read_events(&args.in_path)?;
    let mut aggregator = TraceAggregator::new();
    aggregator.reset();

    let mut skipped = 0;
    for envelope in &events {
        match aggregator.ingest(&envelope.event, &envelope.payload) {
            Ok(_) => {}
            Err(err) => {
                skipped += 1;
                warn!(event = %envelope.event, %err, "skipping malformed event");
            }
        }
    }
    info!(events = events.len(), skipped, "replay finished");

    let views = aggregator.views();
    match args.out {
        Some(path) => write_json(&path, &views),
        None => {
            println!("{}", serde_json::to_string_pretty(&views)?);
            Ok(())
        }
    }
}

fn write_json<T: Serialize>(path: &PathBuf, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    atomic_write(path, &json)
}

fn atomic_write(path: &PathBuf, data: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| std::path::Path::new("."));
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .map_err(|err| anyhow!("failed to create output directory {:?}: {}", parent, err))?;
    }

    let tmp_path = temp_path(path);
    let mut file = fs::File::create(&tmp_path)
        .map_err(|err| anyhow!("failed to create temp file {:?}: {}", tmp_path, err))?;
    file.write_all(data)
        .map_err(|err| anyhow!("failed to write temp file {:?}: {}", tmp_path, err))?;
    file.sync_all()
        .map_err(|err| anyhow!("failed to sync temp file {:?}: {}", tmp_path, err))?;

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(anyhow!("failed to replace output {:?}: {}", path, err));
    }

    Ok(())
}

fn temp_path(path: &PathBuf) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| std::path::Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("output");
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let pid = std::process::id();
    let tmp_name = format!(".{}.part-{}-{}", file_name, pid, stamp);
    parent.join(tmp_name)
}
