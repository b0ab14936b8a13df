//! Live remote probe.
//!
//! Sends single queries to a running remote, watches a set of tags, or runs a
//! headless live view over a tree snapshot with every decoration call logged.

use std::net::SocketAddr;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use alv_live::sink::TracingSink;
use alv_live::{DocumentEvent, LiveClient, LiveConfig, LiveDocument, LiveView, SyntaxNode, Tag};
use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Probe command line arguments.
#[derive(Parser, Debug)]
#[command(name = "alv-probe")]
#[command(about = "Query a live remote or run a headless live view")]
struct Args {
	/// Remote endpoint, overriding the configuration file
	#[arg(short, long, global = true, value_name = "ADDR")]
	remote: Option<SocketAddr>,

	/// TOML configuration file
	#[arg(short, long, global = true, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Verbose logging
	#[arg(short, long, global = true)]
	verbose: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Print the info reply for a tag
	Info {
		/// Tag number
		tag: u64,
	},
	/// Print the legacy state reply for a tag
	State {
		/// Tag number
		tag: u64,
	},
	/// Print the remote's tick counter
	Tick,
	/// Poll tags and print each reply as a JSON line until interrupted
	Watch {
		/// Tag numbers
		#[arg(required = true)]
		tags: Vec<u64>,

		/// Pause between rounds
		#[arg(long, default_value_t = 500)]
		interval_ms: u64,
	},
	/// Run a live view over a JSON tree snapshot until interrupted
	View {
		/// Tree snapshot file
		tree: PathBuf,
	},
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	setup_tracing(args.verbose);

	let mut config = match &args.config {
		Some(path) => LiveConfig::load(path)?,
		None => LiveConfig::default(),
	};
	if let Some(remote) = args.remote {
		config = config.remote(remote);
	}

	match args.command {
		Command::Info { tag } => {
			let client = connect(&config).await?;
			let info = client.info(Tag(tag)).await.with_context(|| format!("info {}", Tag(tag)))?;
			println!("{}", serde_json::to_string(&info)?);
		}
		Command::State { tag } => {
			let client = connect(&config).await?;
			let state = client.state(Tag(tag)).await.with_context(|| format!("state {}", Tag(tag)))?;
			println!("{}", serde_json::to_string(&state)?);
		}
		Command::Tick => {
			let client = connect(&config).await?;
			println!("{}", client.tick().await.context("tick")?);
		}
		Command::Watch { tags, interval_ms } => {
			let client = connect(&config).await?;
			watch(&client, &tags, Duration::from_millis(interval_ms), tokio::signal::ctrl_c()).await?;
		}
		Command::View { tree } => run_view(&tree, config).await?,
	}
	Ok(())
}

/// Starts a multiplexer that lives as long as the returned client.
async fn connect(config: &LiveConfig) -> anyhow::Result<LiveClient> {
	let (client, _mux) = LiveClient::connect(config, CancellationToken::new()).await?;
	Ok(client)
}

/// Polls `tags` every `interval` until `stop` resolves, including mid-round.
async fn watch(
	client: &LiveClient,
	tags: &[u64],
	interval: Duration,
	stop: impl Future<Output = std::io::Result<()>>,
) -> anyhow::Result<()> {
	tokio::pin!(stop);
	loop {
		tokio::select! {
			res = &mut stop => return Ok(res?),
			res = watch_round(client, tags) => res?,
		}
		tokio::select! {
			res = &mut stop => return Ok(res?),
			_ = tokio::time::sleep(interval) => {}
		}
	}
}

async fn watch_round(client: &LiveClient, tags: &[u64]) -> anyhow::Result<()> {
	for &tag in tags {
		match client.info(Tag(tag)).await {
			Ok(info) => println!("{}", serde_json::to_string(&info)?),
			Err(e) => println!("{}", serde_json::json!({ "tag": tag, "error": e.to_string() })),
		}
	}
	match client.tick().await {
		Ok(tick) => println!("{}", serde_json::json!({ "tick": tick })),
		Err(e) => println!("{}", serde_json::json!({ "error": e.to_string() })),
	}
	Ok(())
}

/// A tree snapshot loaded from disk. Never changes and never closes.
struct SnapshotDocument {
	tree: SyntaxNode,
	_events: Option<mpsc::UnboundedSender<DocumentEvent>>,
}

impl SnapshotDocument {
	fn load(path: &Path) -> anyhow::Result<Self> {
		let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
		let tree = serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
		Ok(Self { tree, _events: None })
	}
}

impl LiveDocument for SnapshotDocument {
	fn syntax_tree(&self) -> SyntaxNode {
		self.tree.clone()
	}

	fn subscribe(&mut self) -> mpsc::UnboundedReceiver<DocumentEvent> {
		let (tx, rx) = mpsc::unbounded_channel();
		self._events = Some(tx);
		rx
	}
}

async fn run_view(path: &Path, config: LiveConfig) -> anyhow::Result<()> {
	let document = SnapshotDocument::load(path)?;
	let view = LiveView::spawn(document, Arc::new(TracingSink::default()), config).await?;
	info!(view = view.id(), tree = %path.display(), "probe.view.started");

	tokio::select! {
		res = tokio::signal::ctrl_c() => res?,
		_ = view.destroyed() => {}
	}

	view.destroy();
	view.destroyed().await;
	info!(state = ?view.state(), "probe.view.stopped");
	Ok(())
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_env("ALV_LOG").unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("alv_live=trace,alv_rpc=trace,debug")
		} else {
			EnvFilter::new("alv_live=info,warn")
		}
	});

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}
