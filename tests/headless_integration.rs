use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use reflex::{
    runtime::{ChannelEventSource, FixedTicker, ReflexEvent, Runner},
    storage::HistoryFilter,
    timer::{ManualClock, TimerQueue},
    App, AppState, ResultStore, SessionState, TestSession,
};

fn key(c: char) -> ReflexEvent {
    ReflexEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
}

// Headless run of the real event loop shape: a channel stands in for the
// terminal and a manual clock stands in for wall time.
#[test]
fn headless_visual_test_records_reaction() {
    let clock = ManualClock::new();
    let session = TestSession::new(clock.clone(), TimerQueue::new()).with_seed(5);
    let mut app = App::new(session, ResultStore::in_memory());

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        ChannelEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(1)),
    );

    tx.send(key('1')).unwrap();
    tx.send(key(' ')).unwrap();

    let mut responded = false;
    for _ in 0..500u32 {
        match runner.step_within(app.session.next_timer_in()) {
            ReflexEvent::Key(k) => app.on_key(k),
            ReflexEvent::Tick => {
                clock.advance_ms(50);
                app.on_tick();
                if app.session.state() == SessionState::Active && !responded {
                    clock.advance_ms(180);
                    tx.send(key(' ')).unwrap();
                    responded = true;
                }
            }
            ReflexEvent::Resize => {}
        }
        if app.last_result.is_some() {
            break;
        }
    }

    let result = app.last_result.clone().expect("test should finish");
    assert_eq!(result.reaction_time_ms(), 180);
    assert!(result.success());
    assert_eq!(app.session.state(), SessionState::Complete);
    assert_eq!(app.store.load_history(&HistoryFilter::all()).len(), 1);

    // escape back to the menu and quit
    tx.send(ReflexEvent::Key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)))
        .unwrap();
    tx.send(key('q')).unwrap();
    for _ in 0..2 {
        if let ReflexEvent::Key(k) = runner.step() {
            app.on_key(k);
        }
    }
    assert_eq!(app.state, AppState::Menu);
    assert!(app.should_quit);
}

#[test]
fn headless_timeout_without_input() {
    let clock = ManualClock::new();
    let session = TestSession::new(clock.clone(), TimerQueue::new()).with_seed(9);
    let mut app = App::new(session, ResultStore::in_memory());

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        ChannelEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(1)),
    );
    tx.send(key('a')).unwrap();
    tx.send(key(' ')).unwrap();

    for _ in 0..500u32 {
        match runner.step() {
            ReflexEvent::Key(k) => app.on_key(k),
            ReflexEvent::Tick => {
                clock.advance_ms(100);
                app.on_tick();
            }
            ReflexEvent::Resize => {}
        }
        if app.last_result.is_some() {
            break;
        }
    }

    let result = app.last_result.clone().expect("window should expire");
    assert!(result.is_timeout());
    assert!(!result.success());
    assert_eq!(app.session.pending_timers(), 0);
    assert_eq!(app.store.user_stats().tests_by_type.audio, 1);
}
