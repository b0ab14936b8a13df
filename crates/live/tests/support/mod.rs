//! Shared fixtures: a scripted remote on loopback UDP and an in-memory document.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use alv_live::{DocumentEvent, LiveConfig, LiveDocument, SourceRange, SyntaxNode};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// How the fake remote answers `info` for a tag.
#[derive(Debug, Clone)]
pub enum Behavior {
	/// Reply with these fields.
	Info(Value),
	/// Reply with `{id, error}`.
	Error(String),
	/// Never reply until released.
	Hold,
}

#[derive(Default)]
struct RemoteState {
	behaviors: HashMap<u64, Behavior>,
	held: Vec<(u64, u64, SocketAddr)>,
	info_requests: HashMap<u64, usize>,
}

/// Scripted remote execution engine.
pub struct FakeRemote {
	pub addr: SocketAddr,
	socket: Arc<UdpSocket>,
	state: Arc<Mutex<RemoteState>>,
	tick: Arc<AtomicU64>,
	tick_requests: Arc<AtomicUsize>,
}

impl FakeRemote {
	pub async fn start() -> Self {
		let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
		let addr = socket.local_addr().unwrap();
		let remote = Self {
			addr,
			socket: socket.clone(),
			state: Arc::default(),
			tick: Arc::new(AtomicU64::new(0)),
			tick_requests: Arc::default(),
		};

		let state = remote.state.clone();
		let tick = remote.tick.clone();
		let tick_requests = remote.tick_requests.clone();
		tokio::spawn(async move {
			let mut buf = vec![0u8; 64 * 1024];
			loop {
				let Ok((len, from)) = socket.recv_from(&mut buf).await else {
					return;
				};
				let Ok(req) = serde_json::from_slice::<Value>(&buf[..len]) else {
					continue;
				};
				let id = req["id"].as_u64().unwrap_or(0);
				let reply = match req["type"].as_str() {
					Some("tick") => {
						tick_requests.fetch_add(1, Ordering::SeqCst);
						Some(json!({"id": id, "tick": tick.load(Ordering::SeqCst)}))
					}
					Some("state") => Some(json!({"id": id, "value": 3, "state": {"phase": 1}})),
					Some("info") => {
						let tag = req["tag"].as_u64().unwrap_or(0);
						let mut state = state.lock();
						*state.info_requests.entry(tag).or_default() += 1;
						match state.behaviors.get(&tag).cloned() {
							Some(Behavior::Info(fields)) => Some(with_id(id, fields)),
							Some(Behavior::Error(message)) => Some(json!({"id": id, "error": message})),
							Some(Behavior::Hold) => {
								state.held.push((tag, id, from));
								None
							}
							None => Some(json!({"id": id, "error": "unknown tag"})),
						}
					}
					_ => Some(json!({"id": id, "error": "bad request"})),
				};
				if let Some(reply) = reply {
					let _ = socket.send_to(reply.to_string().as_bytes(), from).await;
				}
			}
		});

		remote
	}

	pub fn set(&self, tag: u64, behavior: Behavior) {
		self.state.lock().behaviors.insert(tag, behavior);
	}

	pub fn set_tick(&self, tick: u64) {
		self.tick.store(tick, Ordering::SeqCst);
	}

	pub fn tick_requests(&self) -> usize {
		self.tick_requests.load(Ordering::SeqCst)
	}

	pub fn info_requests(&self, tag: u64) -> usize {
		self.state.lock().info_requests.get(&tag).copied().unwrap_or(0)
	}

	pub fn held(&self, tag: u64) -> usize {
		self.state.lock().held.iter().filter(|(t, ..)| *t == tag).count()
	}

	/// Answers every held request for `tag` with `fields`.
	pub async fn release(&self, tag: u64, fields: Value) {
		let released: Vec<_> = {
			let mut state = self.state.lock();
			let (matching, rest): (Vec<_>, Vec<_>) = state.held.drain(..).partition(|(t, ..)| *t == tag);
			state.held = rest;
			matching
		};
		for (_, id, to) in released {
			let reply = with_id(id, fields.clone());
			self.socket.send_to(reply.to_string().as_bytes(), to).await.unwrap();
		}
	}

	pub fn config(&self) -> LiveConfig {
		LiveConfig::default()
			.remote(self.addr)
			.bind("127.0.0.1:0".parse().unwrap())
			.poll_interval(Duration::from_millis(10))
			.query_timeout(Duration::from_millis(500))
	}
}

fn with_id(id: u64, fields: Value) -> Value {
	let mut fields = match fields {
		Value::Object(map) => map,
		_ => serde_json::Map::new(),
	};
	fields.insert("id".to_string(), json!(id));
	Value::Object(fields)
}

/// Document whose tree and events are driven by the test.
#[derive(Clone, Default)]
pub struct TestDocument {
	tree: Arc<Mutex<Option<SyntaxNode>>>,
	events: Arc<Mutex<Option<mpsc::UnboundedSender<DocumentEvent>>>>,
}

impl TestDocument {
	pub fn new(tree: SyntaxNode) -> Self {
		let doc = Self::default();
		doc.set_tree(tree);
		doc
	}

	pub fn set_tree(&self, tree: SyntaxNode) {
		*self.tree.lock() = Some(tree);
	}

	pub fn emit(&self, event: DocumentEvent) {
		if let Some(tx) = self.events.lock().as_ref() {
			let _ = tx.send(event);
		}
	}
}

impl LiveDocument for TestDocument {
	fn syntax_tree(&self) -> SyntaxNode {
		self.tree.lock().clone().unwrap_or_else(|| document(Vec::new()))
	}

	fn subscribe(&mut self) -> mpsc::UnboundedReceiver<DocumentEvent> {
		let (tx, rx) = mpsc::unbounded_channel();
		*self.events.lock() = Some(tx);
		rx
	}
}

pub fn document(cells: Vec<SyntaxNode>) -> SyntaxNode {
	SyntaxNode::new("source_file", "", SourceRange::on_row(0, 0, 100)).with_children(cells)
}

/// A cell on `row` holding one tag literal.
pub fn tagged_cell(row: u32, tag: u64) -> SyntaxNode {
	let text = format!("!{tag}!");
	let end = text.len() as u32 + 1;
	SyntaxNode::new("cell", "", SourceRange::on_row(row, 0, 40))
		.with_children([SyntaxNode::new("tag", text, SourceRange::on_row(row, 1, end))])
}

/// Polls `cond` until it holds or two seconds pass.
pub async fn eventually(what: &str, mut cond: impl FnMut() -> bool) {
	let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
	while !cond() {
		assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
}
