use super::*;
use std::sync::mpsc;

const WINDOW: Duration = Duration::from_millis(40);

fn create_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap()
}

fn spawn_events(rt: &tokio::runtime::Runtime) -> (SearchEvents, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let events = SearchEvents::spawn(rt.handle(), WINDOW, move |text| {
        let _ = lock(&tx).send(text);
    });
    (events, rx)
}

fn assert_quiet(rx: &mpsc::Receiver<String>) {
    assert!(rx.recv_timeout(WINDOW * 4).is_err());
}

#[test]
fn test_rapid_edits_deliver_only_last_text() {
    let rt = create_runtime();
    let (events, rx) = spawn_events(&rt);
    for text in ["M", "Ma", "Mai", "Main"] {
        events.text_changed(text);
    }

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "Main");
    assert_quiet(&rx);
    assert_eq!(events.current_text(), "Main");
}

#[test]
fn test_separate_bursts_deliver_separately() {
    let rt = create_runtime();
    let (events, rx) = spawn_events(&rt);
    events.text_changed("first");
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "first");
    events.text_changed("second");
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "second");
}

#[test]
fn test_repeated_text_is_dropped_but_emit_search_is_not() {
    let rt = create_runtime();
    let (events, rx) = spawn_events(&rt);
    events.text_changed("same");
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "same");

    events.text_changed("same");
    assert_quiet(&rx);

    events.emit_search();
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "same");
}

#[test]
fn test_emit_search_merges_with_edits() {
    let rt = create_runtime();
    let (events, rx) = spawn_events(&rt);
    events.text_changed("a");
    events.emit_search();
    events.text_changed("ab");
    events.emit_search();

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "ab");
    assert_quiet(&rx);
}

#[test]
fn test_disabled_events_are_dropped() {
    let rt = create_runtime();
    let (events, rx) = spawn_events(&rt);
    events.set_enabled(false);
    assert!(!events.is_enabled());
    events.text_changed("ignored");
    events.emit_search();
    assert_quiet(&rx);

    events.set_enabled(true);
    events.emit_search();
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "ignored");
}

#[test]
fn test_close_discards_pending_text() {
    let rt = create_runtime();
    let (events, rx) = spawn_events(&rt);
    events.text_changed("pending");
    events.close();
    assert_quiet(&rx);
}
