//! End-to-end view scenarios over loopback UDP.

mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use alv_live::sink::{Highlight, Overlay, RecordingSink, Style};
use alv_live::{DocumentEvent, LiveView, Sessions, SourceRange, SyntaxNode, ViewState};
use pretty_assertions::assert_eq;
use serde_json::json;
use support::{Behavior, FakeRemote, TestDocument, document, eventually, init_tracing, tagged_cell};

async fn spawn(remote: &FakeRemote, doc: &TestDocument, sink: &Arc<RecordingSink>) -> LiveView {
	LiveView::spawn(doc.clone(), sink.clone(), remote.config()).await.unwrap()
}

#[tokio::test]
async fn bar_annotation_renders_fill_without_widget_swap() {
	init_tracing();
	let remote = FakeRemote::start().await;
	remote.set(5, Behavior::Info(json!({"tag": 5, "vis": {"type": "bar", "bar": 0.25}})));
	let doc = TestDocument::new(document(vec![tagged_cell(0, 5)]));
	let sink = Arc::new(RecordingSink::new());

	let view = spawn(&remote, &doc, &sink).await;
	eventually("active", || view.state() == ViewState::Active).await;

	let label = sink.label_region("!5!").expect("tag label is bound");
	view.toggle_label(label);
	eventually("bar mounted", || sink.overlays(|o| matches!(o, Overlay::Bar)).len() == 1).await;
	let (_, bar) = sink.overlays(|o| matches!(o, Overlay::Bar))[0];
	eventually("several polls", || sink.styles(bar).len() >= 3).await;

	assert!(sink.styles(bar).iter().all(|s| *s == Style::Fill(0.25)));
	assert_eq!(sink.overlays(|o| matches!(o, Overlay::Bar)).len(), 1, "no widget swap across polls");

	view.destroy();
	view.destroyed().await;
}

#[tokio::test]
async fn failed_rebuild_stays_idle_until_next_change() {
	init_tracing();
	let remote = FakeRemote::start().await;
	remote.set(5, Behavior::Error("no such tag".to_string()));
	let doc = TestDocument::new(document(vec![tagged_cell(0, 5)]));
	let sink = Arc::new(RecordingSink::new());

	let view = spawn(&remote, &doc, &sink).await;
	eventually("info query", || remote.info_requests(5) == 1).await;
	eventually("idle", || view.state() == ViewState::Idle).await;

	tokio::time::sleep(Duration::from_millis(50)).await;
	assert!(sink.live_regions().is_empty());
	assert_eq!(remote.tick_requests(), 0, "poll loop does not start after a failed rebuild");
	assert_eq!(remote.info_requests(5), 1, "no automatic retry");

	remote.set(5, Behavior::Info(json!({"tag": 5})));
	doc.emit(DocumentEvent::Saved);
	eventually("active", || view.state() == ViewState::Active).await;
	assert_eq!(sink.live_regions().len(), 1);
	eventually("polling", || remote.tick_requests() > 0).await;

	view.destroy();
	view.destroyed().await;
}

#[tokio::test]
async fn event_flash_follows_tick_baseline() {
	init_tracing();
	let remote = FakeRemote::start().await;
	remote.set_tick(8);
	remote.set(7, Behavior::Info(json!({"tag": 7, "result": {"value": 1, "metatype": "!", "updated": 10}})));
	let doc = TestDocument::new(document(vec![tagged_cell(0, 7)]));
	let sink = Arc::new(RecordingSink::new());

	let view = spawn(&remote, &doc, &sink).await;
	eventually("active", || view.state() == ViewState::Active).await;
	view.toggle_label(sink.label_region("!7!").unwrap());
	eventually("event mounted", || !sink.highlights(Highlight::Event).is_empty()).await;
	let (_, deco) = sink.highlights(Highlight::Event)[0];

	eventually("fresh update flashes", || sink.flash_count(deco) > 0).await;

	remote.set_tick(12);
	let before = remote.tick_requests();
	eventually("baseline advanced", || remote.tick_requests() >= before + 2).await;
	let flashes = sink.flash_count(deco);
	let settled = remote.tick_requests();
	eventually("more cycles", || remote.tick_requests() >= settled + 3).await;

	assert_eq!(sink.flash_count(deco), flashes, "stale updates never flash");

	view.destroy();
	view.destroyed().await;
}

#[tokio::test]
async fn event_flashes_again_after_remote_counter_restarts() {
	init_tracing();
	let remote = FakeRemote::start().await;
	remote.set_tick(100);
	remote.set(7, Behavior::Info(json!({"tag": 7, "result": {"value": 1, "metatype": "!", "updated": 3}})));
	let doc = TestDocument::new(document(vec![tagged_cell(0, 7)]));
	let sink = Arc::new(RecordingSink::new());

	let view = spawn(&remote, &doc, &sink).await;
	eventually("active", || view.state() == ViewState::Active).await;
	view.toggle_label(sink.label_region("!7!").unwrap());
	eventually("event mounted", || !sink.highlights(Highlight::Event).is_empty()).await;
	let (_, deco) = sink.highlights(Highlight::Event)[0];

	let mounted = remote.tick_requests();
	eventually("baseline at 100", || remote.tick_requests() >= mounted + 2).await;
	let flashes = sink.flash_count(deco);
	let settled = remote.tick_requests();
	eventually("stale cycles", || remote.tick_requests() >= settled + 3).await;
	assert_eq!(sink.flash_count(deco), flashes, "updates older than the baseline stay idle");

	remote.set_tick(3);
	eventually("flash after counter restart", || sink.flash_count(deco) > flashes).await;

	view.destroy();
	view.destroyed().await;
}

#[tokio::test]
async fn destroy_releases_everything_once_and_notifies() {
	init_tracing();
	let remote = FakeRemote::start().await;
	remote.set(1, Behavior::Info(json!({"tag": 1, "vis": {"type": "bool"}, "result": {"value": true}})));
	remote.set(2, Behavior::Info(json!({"tag": 2, "vis": {"type": "rgb", "rgb": [0.5, 0.5, 0.5]}})));
	let doc = TestDocument::new(document(vec![tagged_cell(0, 1), tagged_cell(1, 2)]));
	let sink = Arc::new(RecordingSink::new());

	let view = spawn(&remote, &doc, &sink).await;
	eventually("active", || view.state() == ViewState::Active).await;
	let regions = sink.live_regions();
	assert_eq!(regions.len(), 2);

	let notified = Arc::new(AtomicUsize::new(0));
	let counter = notified.clone();
	view.on_destroyed(move || {
		counter.fetch_add(1, Ordering::SeqCst);
	});

	view.destroy();
	view.destroy();
	tokio::time::timeout(Duration::from_secs(2), view.destroyed()).await.unwrap();

	assert_eq!(view.state(), ViewState::Destroyed);
	assert_eq!(notified.load(Ordering::SeqCst), 1);
	for region in regions {
		assert_eq!(sink.destroy_count(region), 1);
	}
	assert!(sink.live_regions().is_empty());

	let calls = sink.calls().len();
	let ticks = remote.tick_requests();
	tokio::time::sleep(Duration::from_millis(50)).await;
	assert_eq!(sink.calls().len(), calls, "no rendering after teardown");
	assert_eq!(remote.tick_requests(), ticks, "polling stopped");

	let counter = notified.clone();
	view.on_destroyed(move || {
		counter.fetch_add(1, Ordering::SeqCst);
	});
	assert_eq!(notified.load(Ordering::SeqCst), 2, "late subscribers are called immediately");
}

#[tokio::test]
async fn closed_document_tears_the_view_down() {
	init_tracing();
	let remote = FakeRemote::start().await;
	remote.set(3, Behavior::Info(json!({"tag": 3})));
	let doc = TestDocument::new(document(vec![tagged_cell(0, 3)]));
	let sink = Arc::new(RecordingSink::new());

	let view = spawn(&remote, &doc, &sink).await;
	eventually("active", || view.state() == ViewState::Active).await;

	doc.emit(DocumentEvent::Closed);
	tokio::time::timeout(Duration::from_secs(2), view.destroyed()).await.unwrap();
	assert!(view.is_destroyed());
	assert!(sink.live_regions().is_empty());
}

#[tokio::test]
async fn superseded_rebuild_reply_is_ignored() {
	init_tracing();
	let remote = FakeRemote::start().await;
	remote.set(5, Behavior::Hold);
	remote.set(6, Behavior::Info(json!({"tag": 6, "vis": {"type": "bar", "bar": 0.5}})));
	let doc = TestDocument::new(document(vec![tagged_cell(0, 5)]));
	let sink = Arc::new(RecordingSink::new());

	let view = spawn(&remote, &doc, &sink).await;
	eventually("held info query", || remote.held(5) == 1).await;
	assert_eq!(view.state(), ViewState::Rebuilding);

	view.document_changed(document(vec![tagged_cell(0, 6)]));
	eventually("active", || view.state() == ViewState::Active).await;

	remote.release(5, json!({"tag": 5, "vis": {"type": "bar", "bar": 0.9}})).await;
	eventually("more cycles", || remote.tick_requests() >= 3).await;

	assert_eq!(sink.label_region("!5!"), None);
	assert!(sink.label_region("!6!").is_some());
	assert_eq!(sink.live_regions().len(), 1);

	view.destroy();
	view.destroyed().await;
}

#[tokio::test]
async fn empty_document_still_polls_the_tick() {
	init_tracing();
	let remote = FakeRemote::start().await;
	remote.set_tick(4);
	let doc = TestDocument::new(document(Vec::new()));
	let sink = Arc::new(RecordingSink::new());

	let view = spawn(&remote, &doc, &sink).await;
	eventually("active", || view.state() == ViewState::Active).await;
	eventually("tick polled", || remote.tick_requests() >= 2).await;
	assert!(sink.calls().is_empty());

	view.destroy();
	view.destroyed().await;
}

#[tokio::test]
async fn malformed_cell_does_not_block_its_siblings() {
	init_tracing();
	let remote = FakeRemote::start().await;
	remote.set(2, Behavior::Info(json!({"tag": 2})));
	let broken = SyntaxNode::new("cell", "", SourceRange::on_row(0, 0, 10))
		.with_children([SyntaxNode::new("tag", "!?!", SourceRange::on_row(0, 1, 4))]);
	let doc = TestDocument::new(document(vec![broken, tagged_cell(1, 2)]));
	let sink = Arc::new(RecordingSink::new());

	let view = spawn(&remote, &doc, &sink).await;
	eventually("active", || view.state() == ViewState::Active).await;
	assert!(sink.label_region("!2!").is_some());
	assert_eq!(sink.live_regions().len(), 1);

	view.destroy();
	view.destroyed().await;
}

#[tokio::test]
async fn sessions_toggle_and_self_remove() {
	init_tracing();
	let remote = FakeRemote::start().await;
	remote.set(1, Behavior::Info(json!({"tag": 1})));
	let sink = Arc::new(RecordingSink::new());
	let sessions: Sessions<&'static str> = Sessions::new(sink.clone(), remote.config());

	let a = TestDocument::new(document(vec![tagged_cell(0, 1)]));
	let b = TestDocument::new(document(vec![tagged_cell(0, 1)]));

	assert!(sessions.toggle("a.alv", a.clone()).await.unwrap());
	assert!(sessions.toggle("b.alv", b.clone()).await.unwrap());
	assert_eq!(sessions.len(), 2);

	let view_a = sessions.get(&"a.alv").unwrap();
	assert!(!sessions.toggle("a.alv", a.clone()).await.unwrap());
	assert!(!sessions.contains(&"a.alv"));
	tokio::time::timeout(Duration::from_secs(2), view_a.destroyed()).await.unwrap();

	let view_b = sessions.get(&"b.alv").unwrap();
	eventually("b active", || view_b.state() == ViewState::Active).await;
	b.emit(DocumentEvent::Closed);
	eventually("b removed itself", || !sessions.contains(&"b.alv")).await;

	assert!(sessions.toggle("a.alv", a).await.unwrap());
	sessions.shutdown_all().await;
	assert!(sessions.is_empty());
	assert!(sink.live_regions().is_empty());
}

#[tokio::test]
async fn sessions_remove_destroys_only_known_views() {
	init_tracing();
	let remote = FakeRemote::start().await;
	remote.set(1, Behavior::Info(json!({"tag": 1})));
	let sink = Arc::new(RecordingSink::new());
	let sessions: Sessions<&'static str> = Sessions::new(sink.clone(), remote.config());

	let doc = TestDocument::new(document(vec![tagged_cell(0, 1)]));
	assert!(sessions.toggle("a.alv", doc).await.unwrap());
	let view = sessions.get(&"a.alv").unwrap();

	assert!(!sessions.remove(&"missing.alv"));
	assert!(sessions.remove(&"a.alv"));
	assert!(!sessions.remove(&"a.alv"));
	tokio::time::timeout(Duration::from_secs(2), view.destroyed()).await.unwrap();
	assert!(sessions.is_empty());
	assert!(sink.live_regions().is_empty());
}
