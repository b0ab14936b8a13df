use std::time::Duration;

use tokio::task::JoinHandle;

use super::*;
use crate::CounterIdGen;

#[derive(Debug)]
struct TextRequest {
	id: u64,
	body: String,
}

impl TextRequest {
	fn new(body: impl Into<String>) -> Self {
		Self { id: 0, body: body.into() }
	}
}

#[derive(Debug)]
struct TextResponse {
	id: u64,
	ok: bool,
	body: String,
}

/// `id|body` requests, `id|ok|body` or `id|err|message` responses.
struct TextProtocol;

impl Protocol for TextProtocol {
	type Id = u64;
	type Request = TextRequest;
	type Response = TextResponse;
	type CodecError = String;
	type IdGen = CounterIdGen;

	fn next_id(id_gen: &mut CounterIdGen) -> u64 {
		id_gen.next()
	}

	fn set_request_id(req: &mut TextRequest, id: u64) {
		req.id = id;
	}

	fn encode_request(&mut self, req: &TextRequest) -> std::result::Result<Vec<u8>, String> {
		Ok(format!("{}|{}", req.id, req.body).into_bytes())
	}

	fn decode_response(&mut self, datagram: &[u8]) -> std::result::Result<TextResponse, String> {
		let text = std::str::from_utf8(datagram).map_err(|e| e.to_string())?;
		let mut parts = text.splitn(3, '|');
		let id = parts
			.next()
			.and_then(|s| s.parse().ok())
			.ok_or_else(|| "missing id".to_string())?;
		let ok = match parts.next() {
			Some("ok") => true,
			Some("err") => false,
			_ => return Err("missing status".to_string()),
		};
		let body = parts.next().unwrap_or_default().to_string();
		Ok(TextResponse { id, ok, body })
	}

	fn response_id(resp: &TextResponse) -> u64 {
		resp.id
	}

	fn into_result(resp: TextResponse) -> std::result::Result<TextResponse, String> {
		if resp.ok { Ok(resp) } else { Err(resp.body) }
	}
}

/// Loopback peer that answers whatever the test scripts.
struct FakeRemote {
	socket: UdpSocket,
}

impl FakeRemote {
	async fn bind() -> Self {
		let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind fake remote");
		Self { socket }
	}

	fn addr(&self) -> SocketAddr {
		self.socket.local_addr().expect("fake remote addr")
	}

	async fn recv(&self) -> (u64, String, SocketAddr) {
		let mut buf = [0u8; 1024];
		let (len, from) = tokio::time::timeout(Duration::from_secs(2), self.socket.recv_from(&mut buf))
			.await
			.expect("request arrives")
			.expect("recv");
		let text = std::str::from_utf8(&buf[..len]).expect("utf8").to_string();
		let (id, body) = text.split_once('|').expect("id|body");
		(id.parse().expect("numeric id"), body.to_string(), from)
	}

	async fn send(&self, to: SocketAddr, payload: &str) {
		self.socket.send_to(payload.as_bytes(), to).await.expect("send");
	}
}

struct Harness {
	tx: TxSocket<TextProtocol>,
	remote: FakeRemote,
	shutdown: CancellationToken,
	task: JoinHandle<Result<()>>,
}

async fn start(orphan_ttl: Option<Duration>) -> Harness {
	let remote = FakeRemote::bind().await;
	let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind client");
	let (main_loop, tx) = MainLoop::new(TextProtocol, CounterIdGen::new());
	let main_loop = main_loop.with_orphan_ttl(orphan_ttl);
	let shutdown = CancellationToken::new();
	let task = tokio::spawn(main_loop.run(socket, remote.addr(), shutdown.clone()));
	Harness {
		tx,
		remote,
		shutdown,
		task,
	}
}

async fn settle<T>(handle: JoinHandle<T>) -> T {
	tokio::time::timeout(Duration::from_secs(2), handle)
		.await
		.expect("call settles")
		.expect("task completes")
}

#[test]
fn counter_id_gen_starts_at_one() {
	let mut id_gen = CounterIdGen::new();
	assert_eq!(id_gen.next(), 1);
	assert_eq!(id_gen.next(), 2);
	assert_eq!(id_gen.next(), 3);
}

#[tokio::test]
async fn responses_in_any_order_settle_their_own_caller() {
	let h = start(None).await;

	let calls: Vec<_> = (0..5)
		.map(|i| {
			let tx = h.tx.clone();
			tokio::spawn(async move { tx.send_tx(TextRequest::new(format!("q{i}"))).await })
		})
		.collect();

	let mut received = Vec::new();
	for _ in 0..5 {
		received.push(h.remote.recv().await);
	}
	let mut ids: Vec<u64> = received.iter().map(|(id, _, _)| *id).collect();
	ids.sort_unstable();
	assert_eq!(ids, vec![1, 2, 3, 4, 5]);

	for (id, body, from) in received.iter().rev() {
		h.remote.send(*from, &format!("{id}|ok|re-{body}")).await;
	}

	for (i, call) in calls.into_iter().enumerate() {
		let resp = settle(call).await.expect("response");
		assert_eq!(resp.body, format!("re-q{i}"));
	}
}

#[tokio::test]
async fn unknown_ids_and_garbage_are_discarded() {
	let h = start(None).await;

	let tx = h.tx.clone();
	let call = tokio::spawn(async move { tx.send_tx(TextRequest::new("ping")).await });
	let (id, _, from) = h.remote.recv().await;

	h.remote.send(from, "999|ok|stray").await;
	h.remote.send(from, "not a response").await;
	h.remote.send(from, &format!("{id}|ok|pong")).await;
	// Duplicate of an already settled id.
	h.remote.send(from, &format!("{id}|ok|again")).await;

	let resp = settle(call).await.expect("response");
	assert_eq!(resp.id, id);
	assert_eq!(resp.body, "pong");

	let tx = h.tx.clone();
	let call = tokio::spawn(async move { tx.send_tx(TextRequest::new("still alive")).await });
	let (next_id, _, from) = h.remote.recv().await;
	assert_eq!(next_id, id + 1);
	h.remote.send(from, &format!("{next_id}|ok|yes")).await;
	assert_eq!(settle(call).await.expect("response").body, "yes");
}

#[tokio::test]
async fn remote_error_rejects_only_its_caller() {
	let h = start(None).await;

	let tx = h.tx.clone();
	let failing = tokio::spawn(async move { tx.send_tx(TextRequest::new("bad")).await });
	let tx = h.tx.clone();
	let passing = tokio::spawn(async move { tx.send_tx(TextRequest::new("good")).await });

	for _ in 0..2 {
		let (id, body, from) = h.remote.recv().await;
		let reply = if body == "bad" { format!("{id}|err|boom") } else { format!("{id}|ok|fine") };
		h.remote.send(from, &reply).await;
	}

	match settle(failing).await {
		Err(Error::Remote(msg)) => assert_eq!(msg, "boom"),
		other => panic!("expected remote error, got {other:?}"),
	}
	assert_eq!(settle(passing).await.expect("response").body, "fine");
}

#[tokio::test]
async fn orphan_sweep_reclaims_unanswered_records() {
	let h = start(Some(Duration::from_millis(30))).await;

	let tx = h.tx.clone();
	let call = tokio::spawn(async move { tx.send_tx(TextRequest::new("lost")).await });
	let (id, _, from) = h.remote.recv().await;

	match settle(call).await {
		Err(Error::Orphaned(orphan)) => assert_eq!(orphan, id.to_string()),
		other => panic!("expected orphaned, got {other:?}"),
	}

	// A late reply for the reclaimed id is just an unknown id now.
	h.remote.send(from, &format!("{id}|ok|late")).await;

	let tx = h.tx.clone();
	let call = tokio::spawn(async move { tx.send_tx(TextRequest::new("next")).await });
	let (next_id, _, from) = h.remote.recv().await;
	h.remote.send(from, &format!("{next_id}|ok|on time")).await;
	assert_eq!(settle(call).await.expect("response").body, "on time");
}

#[tokio::test]
async fn shutdown_stops_pending_and_future_transactions() {
	let h = start(None).await;

	let tx = h.tx.clone();
	let call = tokio::spawn(async move { tx.send_tx(TextRequest::new("never answered")).await });
	let _ = h.remote.recv().await;

	h.shutdown.cancel();
	settle(h.task).await.expect("loop exits cleanly");

	assert!(matches!(settle(call).await, Err(Error::ServiceStopped)));
	assert!(h.tx.is_closed());
	assert!(matches!(h.tx.send_tx(TextRequest::new("late")).await, Err(Error::ServiceStopped)));
}

#[tokio::test]
async fn closed_socket_rejects_immediately() {
	let socket = TxSocket::<TextProtocol>::new_closed();
	assert!(socket.is_closed());
	assert!(matches!(socket.send_tx(TextRequest::new("x")).await, Err(Error::ServiceStopped)));
}
