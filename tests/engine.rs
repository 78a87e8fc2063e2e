//! End-to-end engine behaviour over the virtual device layer.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use padwatch::backends::virtual_input::VirtualPort;
use padwatch::config::ARCADE_STICK_GUID;
use padwatch::{Button, Controller, ControllerListener, Engine, EngineConfig, EngineStatusListener, Error};
use parking_lot::Mutex;

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.events.lock())
    }

    fn snapshot(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn push(&self, s: String) {
        self.events.lock().push(s);
    }
}

impl ControllerListener for Recorder {
    fn connected(&self, c: &Controller) {
        self.push(format!("connect {} {}", c.id, c.name));
    }
    fn disconnected(&self, c: &Controller) {
        self.push(format!("disconnect {}", c.id));
    }
    fn pressed(&self, c: &Controller, b: Button) {
        self.push(format!("press {} {b}", c.id));
    }
    fn released(&self, c: &Controller, b: Button) {
        self.push(format!("release {} {b}", c.id));
    }
}

/// Status listener that also records how many times the port was terminated
/// when `closed` fires.
struct Lifecycle {
    port: VirtualPort,
    events: Mutex<Vec<String>>,
}

impl EngineStatusListener for Lifecycle {
    fn started(&self) {
        self.events.lock().push("started".into());
    }
    fn closed(&self) {
        let terminated = self.port.terminate_calls();
        self.events.lock().push(format!("closed after {terminated} terminate"));
    }
}

struct FailsOnButton1;

impl ControllerListener for FailsOnButton1 {
    fn pressed(&self, _c: &Controller, b: Button) {
        if b == Button::Button1 {
            panic!("listener blew up on Button1");
        }
    }
}

fn engine(port: &VirtualPort, cfg: EngineConfig) -> (Engine<VirtualPort>, Arc<Recorder>) {
    let engine = Engine::new(port.clone(), cfg);
    let rec = Arc::new(Recorder::default());
    engine.handle().add_controller_listener(rec.clone());
    (engine, rec)
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

#[test]
fn hot_plug_reports_disconnect_then_connect() {
    let port = VirtualPort::new();
    port.plug(5, "g5", "Five");
    port.plug(7, "g7", "Seven");
    let (mut engine, rec) = engine(&port, EngineConfig::default());

    engine.poll_once();
    assert_eq!(rec.take(), vec!["connect 5 Five", "connect 7 Seven"]);

    port.unplug(5);
    port.plug(9, "g9", "Nine");
    engine.poll_once();
    assert_eq!(rec.take(), vec!["disconnect 5", "connect 9 Nine"]);
    assert_eq!(engine.registry().ids(), vec![7, 9]);
}

#[test]
fn replugged_id_reports_both_devices() {
    let port = VirtualPort::new();
    port.plug(0, "aaaa", "Pad A");
    let (mut engine, rec) = engine(&port, EngineConfig::default());
    engine.poll_once();
    assert_eq!(rec.take(), vec!["connect 0 Pad A"]);

    port.unplug(0);
    port.plug(0, "bbbb", "Pad B");
    engine.poll_once();
    assert_eq!(rec.take(), vec!["disconnect 0"]);
    engine.poll_once();
    assert_eq!(rec.take(), vec!["connect 0 Pad B"]);
    assert_eq!(engine.registry().get(0).unwrap().name, "Pad B");
}

#[test]
fn name_override_wins_over_reported_name() {
    let port = VirtualPort::new();
    port.plug(0, ARCADE_STICK_GUID, "Pro Controller");
    let (mut engine, rec) = engine(&port, EngineConfig::default());

    engine.poll_once();
    assert_eq!(rec.take(), vec!["connect 0 8BitDo Arcade Stick Switch"]);
}

#[test]
fn edges_dispatch_once_per_transition() {
    let port = VirtualPort::new();
    port.plug(1, "g", "Pad");
    let (mut engine, rec) = engine(&port, EngineConfig::default());
    engine.poll_once();
    rec.take();

    // Button1 and L1 down
    port.set_state(1, (1 << 0) | (1 << 9));
    engine.poll_once();
    assert_eq!(rec.take(), vec!["press 1 1", "press 1 L1"]);

    // same sample again: nothing
    engine.poll_once();
    assert!(rec.take().is_empty());

    // Button1 up, Start down
    port.set_state(1, (1 << 9) | (1 << 6));
    engine.poll_once();
    assert_eq!(rec.take(), vec!["press 1 Start", "release 1 1"]);
}

#[test]
fn unknown_bit_dispatches_nothing() {
    let port = VirtualPort::new();
    port.plug(1, "g", "Pad");
    let (mut engine, rec) = engine(&port, EngineConfig::default());
    engine.poll_once();
    rec.take();

    port.set_state(1, 1 << 31);
    engine.poll_once();
    port.set_state(1, 0);
    engine.poll_once();
    assert!(rec.take().is_empty());
}

#[test]
fn failing_listener_does_not_stall_the_tick() {
    let port = VirtualPort::new();
    port.plug(1, "a", "A");
    port.plug(2, "b", "B");
    let mut engine = Engine::new(port.clone(), EngineConfig::default());
    let rec = Arc::new(Recorder::default());
    engine
        .handle()
        .add_controller_listener(Arc::new(FailsOnButton1))
        .add_controller_listener(rec.clone());
    engine.poll_once();
    rec.take();

    port.set_state(1, 0b11);
    port.set_state(2, 0b11);
    engine.poll_once();
    assert_eq!(
        rec.take(),
        vec!["press 1 1", "press 1 2", "press 2 1", "press 2 2"]
    );
}

#[test]
fn snapshot_tracks_registry() {
    let port = VirtualPort::new();
    port.plug(3, "g", "Pad");
    let (mut engine, _rec) = engine(&port, EngineConfig::default());
    let handle = engine.handle();
    assert!(handle.controllers().is_empty());

    engine.poll_once();
    port.set_state(3, 1 << 2);
    engine.poll_once();
    let snap = handle.controllers();
    assert_eq!(snap.len(), 1);
    let c = snap.get(3).unwrap();
    assert_eq!(c.state, 1 << 2);
    assert!(engine.config().buttons.is_pressed(c, Button::Button3));

    port.unplug(3);
    engine.poll_once();
    assert!(handle.controllers().is_empty());
}

#[test]
fn initialization_failure_aborts_start() {
    let port = VirtualPort::new();
    port.fail_initialize(true);
    let engine = Engine::new(port.clone(), EngineConfig::default());
    let handle = engine.handle();
    let life = Arc::new(Lifecycle {
        port: port.clone(),
        events: Mutex::new(Vec::new()),
    });
    handle.add_engine_status_listener(life.clone());

    let err = engine.start().err().expect("start must fail");
    assert!(matches!(err, Error::Initialization(_)));
    assert!(!handle.is_running());
    assert!(life.events.lock().is_empty());
    assert_eq!(port.initialize_calls(), 1);
    assert_eq!(port.terminate_calls(), 0);
}

#[test]
fn threaded_run_delivers_events_and_stops() {
    let port = VirtualPort::new();
    port.plug(0, "g", "Pad");
    let cfg = EngineConfig::default().with_tick(Duration::from_millis(5));
    let (engine, rec) = engine(&port, cfg);
    let handle = engine.handle();
    let life = Arc::new(Lifecycle {
        port: port.clone(),
        events: Mutex::new(Vec::new()),
    });
    handle.add_engine_status_listener(life.clone());

    let running = engine.start().expect("start");
    assert!(handle.is_running());
    assert!(wait_until(Duration::from_secs(2), || !rec.snapshot().is_empty()));

    port.press_button(0, 11);
    assert!(wait_until(Duration::from_secs(2), || rec
        .snapshot()
        .contains(&"press 0 Up".to_string())));

    // listener added while the loop runs
    let late = Arc::new(Recorder::default());
    handle.add_controller_listener(late.clone());
    port.release_button(0, 11);
    assert!(wait_until(Duration::from_secs(2), || late
        .snapshot()
        .contains(&"release 0 Up".to_string())));

    let stopper = {
        let handle = handle.clone();
        thread::spawn(move || handle.stop())
    };
    stopper.join().unwrap();
    let engine = running.join().expect("join");

    assert!(!handle.is_running());
    assert_eq!(
        *life.events.lock(),
        vec!["started".to_string(), "closed after 1 terminate".to_string()]
    );
    assert_eq!(port.initialize_calls(), 1);
    assert!(engine.registry().is_empty());
    assert!(handle.controllers().is_empty());
}

#[test]
fn run_blocks_until_stopped() {
    let port = VirtualPort::new();
    let cfg = EngineConfig::default().with_tick(Duration::from_millis(5));
    let mut engine = Engine::new(port.clone(), cfg);
    let handle = engine.handle();

    let stopper = {
        let handle = handle.clone();
        thread::spawn(move || {
            assert!(wait_until(Duration::from_secs(2), || handle.is_running()));
            handle.stop();
        })
    };
    engine.run().expect("run");
    stopper.join().unwrap();
    assert_eq!(port.terminate_calls(), 1);

    // the engine can be run again
    let again = {
        let handle = handle.clone();
        thread::spawn(move || {
            assert!(wait_until(Duration::from_secs(2), || handle.is_running()));
            handle.stop();
        })
    };
    engine.run().expect("second run");
    again.join().unwrap();
    assert_eq!(port.initialize_calls(), 2);
}

#[test]
fn reopen_does_not_restart() {
    let port = VirtualPort::new();
    let cfg = EngineConfig::default().with_tick(Duration::from_millis(5));
    let mut engine = Engine::new(port, cfg);
    let handle = engine.handle();

    let stopper = {
        let handle = handle.clone();
        thread::spawn(move || {
            assert!(wait_until(Duration::from_secs(2), || handle.is_running()));
            handle.stop();
        })
    };
    engine.run().unwrap();
    stopper.join().unwrap();

    // reopen is a no-op and does not restart anything
    handle.reopen();
    assert!(!handle.is_running());
}

#[test]
fn stop_is_observed_within_a_tick() {
    let port = VirtualPort::new();
    port.plug(0, "g", "Pad");
    let cfg = EngineConfig::default().with_tick(Duration::from_millis(50));
    let period = cfg.tick_period();
    let (engine, _rec) = engine(&port, cfg);

    let running = engine.start().expect("start");
    assert!(wait_until(Duration::from_secs(2), || port.state_calls() >= 2));

    let asked = Instant::now();
    running.stop();
    let reads_at_stop = port.state_calls();
    running.join().expect("join");

    assert!(asked.elapsed() < period * 3 + Duration::from_millis(50));
    // at most the tick already in flight reads the pad again
    assert!(port.state_calls() <= reads_at_stop + 1);
}

#[test]
fn panic_while_onboarding_connects_everyone_next_tick() {
    let port = VirtualPort::new();
    port.plug(1, "g1", "One");
    port.plug(2, "g2", "Two");
    port.panic_on_guid(2);
    let cfg = EngineConfig::default().with_tick(Duration::from_millis(5));
    let (engine, rec) = engine(&port, cfg);
    let handle = engine.handle();

    let running = engine.start().expect("start");
    assert!(wait_until(Duration::from_secs(2), || handle.controllers().len() == 2));
    running.shutdown().expect("join");

    assert_eq!(rec.snapshot(), vec!["connect 1 One", "connect 2 Two"]);
}

#[test]
fn panicking_state_read_aborts_only_that_tick() {
    let port = VirtualPort::new();
    port.plug(1, "g1", "One");
    port.plug(2, "g2", "Two");
    let cfg = EngineConfig::default().with_tick(Duration::from_millis(5));
    let (engine, rec) = engine(&port, cfg);
    let handle = engine.handle();

    let running = engine.start().expect("start");
    assert!(wait_until(Duration::from_secs(2), || rec.snapshot().len() == 2));

    port.panic_on_state(1);
    port.set_state(1, 0b1);
    port.set_state(2, 0b1);
    assert!(wait_until(Duration::from_secs(2), || {
        let events = rec.snapshot();
        events.contains(&"press 1 1".to_string()) && events.contains(&"press 2 1".to_string())
    }));
    assert!(handle.is_running());
    assert_eq!(handle.controllers().len(), 2);

    running.shutdown().expect("join");
    let presses = rec.take().into_iter().filter(|e| e.starts_with("press")).count();
    assert_eq!(presses, 2);
}
