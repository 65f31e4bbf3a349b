//! Integration tests for slow host code: fast-wait timeouts, delayed
//! delivery through a queued dispatcher, and action re-entrancy.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use horizon_autogui_core::{
    EngineConfig, QueuedDispatcher, Session, TaskError, TaskResult, Value, shared,
};
use horizon_autogui_macros::{Describe, actions};
use parking_lot::Mutex;

#[derive(Describe)]
#[autogui(actions)]
struct Report {
    pub pages: u32,
    pub delay_ms: u64,
}

#[actions]
impl Report {
    #[action]
    pub fn render(&mut self) -> u32 {
        thread::sleep(Duration::from_millis(self.delay_ms));
        self.pages += 1;
        self.pages
    }
}

fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

fn session(delay_ms: u64, fast_wait: Duration) -> (Arc<QueuedDispatcher>, Session) {
    let dispatcher = QueuedDispatcher::new();
    let config = EngineConfig::builder()
        .fast_wait(fast_wait)
        .dispatcher(dispatcher.clone())
        .build()
        .unwrap();
    let report = shared(Report { pages: 0, delay_ms });
    let session = Session::for_object(Arc::new(config), report).unwrap();
    (dispatcher, session)
}

#[test]
fn test_fast_action_is_present() {
    let (dispatcher, session) = session(0, Duration::from_secs(2));
    let render = session.tree().root().member("render").unwrap();

    let results = Arc::new(Mutex::new(Vec::new()));
    let sink = results.clone();
    let ticket = render.activate_action(move |result| sink.lock().push(result)).unwrap();

    assert!(!ticket.is_delayed());
    assert_eq!(results.lock().as_slice(), &[TaskResult::Present(Value::Integer(1))]);
    assert!(!dispatcher.has_pending());
}

#[test]
fn test_slow_action_times_out_then_delivers_later() {
    let (dispatcher, session) = session(200, Duration::from_millis(20));
    let render = session.tree().root().member("render").unwrap();

    let results = Arc::new(Mutex::new(Vec::new()));
    let sink = results.clone();
    let ticket = render.activate_action(move |result| sink.lock().push(result)).unwrap();

    assert!(ticket.is_delayed());
    assert_eq!(results.lock().as_slice(), &[TaskResult::Timeout]);

    // The delayed result waits in the dispatcher queue until the
    // interactive thread drains it.
    assert!(wait_until(|| dispatcher.has_pending()));
    assert_eq!(results.lock().len(), 1);
    dispatcher.process_pending();

    let results = results.lock();
    assert_eq!(results.len(), 2);
    assert_eq!(results[1], TaskResult::PresentedWithDelay(Value::Integer(1)));
    assert_eq!(session.tree().root().member("pages").unwrap().source_value(), Value::Integer(1));
}

#[test]
fn test_action_rejects_reactivation_while_running() {
    let (dispatcher, session) = session(200, Duration::from_millis(10));
    let render = session.tree().root().member("render").unwrap();

    render.activate_action(|_| {}).unwrap();
    assert!(matches!(render.activate_action(|_| {}), Err(TaskError::AlreadyRunning(_))));

    assert!(wait_until(|| !render.action_guard().unwrap().is_running()));
    dispatcher.process_pending();
    assert!(render.activate_action(|_| {}).is_ok());
}

#[test]
fn test_close_stops_further_binding() {
    let (_dispatcher, session) = session(0, Duration::from_secs(2));
    let ids = session.bind_all().unwrap();
    // Report, pages, delay_ms, render
    assert_eq!(ids.len(), 4);
    session.close();
    assert!(session.is_empty());
    assert!(session.bind(session.tree().root()).is_err());
}
