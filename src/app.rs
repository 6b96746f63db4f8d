use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::io::Write;
use tracing::{info, warn};

use crate::{
    config::Preferences,
    result::TestResult,
    session::{EventLog, SessionEvent, SessionState, StimulusSink, TestSession},
    stats::{self, Summary},
    storage::{HistoryFilter, ResultStore},
    test_type::{Choice, Stimulus, TestType},
    timer::{Clock, SystemClock, TimerQueue},
    user_stats::UserStats,
};

/// Number of recent results plotted on the trend chart
pub const TREND_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Menu,
    Arena,
    Stats,
}

/// Rings the terminal bell for the audio stimulus
#[derive(Debug, Clone, Copy)]
pub struct TerminalBell {
    pub enabled: bool,
}

impl StimulusSink for TerminalBell {
    fn emit_stimulus(&mut self, stimulus: &Stimulus) {
        if let (true, Stimulus::Tone(_)) = (self.enabled, stimulus) {
            let mut out = std::io::stdout();
            if out.write_all(b"\x07").and_then(|_| out.flush()).is_err() {
                warn!("could not ring terminal bell");
            }
        }
    }
}

/// Cached numbers for the statistics screen, refreshed when it is opened
#[derive(Debug, Clone, PartialEq)]
pub struct StatsView {
    pub user_stats: UserStats,
    pub summary: Option<Summary>,
    pub trend: Vec<(f64, f64)>,
}

/// Everything the terminal front end owns: the session, the store and what
/// the screens need to draw
#[derive(Debug)]
pub struct App<C: Clock = SystemClock> {
    pub session: TestSession<C, TimerQueue>,
    pub store: ResultStore,
    pub preferences: Preferences,
    pub state: AppState,
    pub selected: TestType,
    pub last_result: Option<TestResult>,
    pub notice: Option<String>,
    pub stats_view: Option<StatsView>,
    pub should_quit: bool,
    events: EventLog,
}

impl<C: Clock> App<C> {
    pub fn new(mut session: TestSession<C, TimerQueue>, store: ResultStore) -> Self {
        let events = EventLog::new();
        session.add_observer(Box::new(events.clone()));
        session.add_stimulus_sink(Box::new(events.clone()));
        let preferences = store.preferences();

        Self {
            session,
            store,
            preferences,
            state: AppState::Menu,
            selected: TestType::Visual,
            last_result: None,
            notice: None,
            stats_view: None,
            should_quit: false,
            events,
        }
    }

    pub fn start_test(&mut self, test_type: TestType) {
        self.session.stop();
        self.selected = test_type;
        self.last_result = None;
        self.notice = None;
        if self.session.start(test_type).is_ok() {
            self.state = AppState::Arena;
        }
        self.process_events();
    }

    pub fn open_stats(&mut self) {
        let history = self.store.load_history(&HistoryFilter::all());
        self.stats_view = Some(StatsView {
            user_stats: self.store.user_stats(),
            summary: stats::compute(&history),
            trend: stats::trend(&history, TREND_LIMIT),
        });
        self.state = AppState::Stats;
    }

    pub fn back_to_menu(&mut self) {
        self.session.stop();
        self.notice = None;
        self.state = AppState::Menu;
        self.process_events();
    }

    pub fn on_tick(&mut self) {
        self.session.tick();
        self.process_events();
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.session.stop();
            self.should_quit = true;
            return;
        }

        match self.state {
            AppState::Menu => self.on_menu_key(key.code),
            AppState::Arena => self.on_arena_key(key.code),
            AppState::Stats => match key.code {
                KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('b') | KeyCode::Char('m') => {
                    self.state = AppState::Menu
                }
                KeyCode::Char('q') => self.should_quit = true,
                _ => {}
            },
        }
        self.process_events();
    }

    fn on_menu_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('1') | KeyCode::Char('v') => self.start_test(TestType::Visual),
            KeyCode::Char('2') | KeyCode::Char('a') => self.start_test(TestType::Audio),
            KeyCode::Char('3') | KeyCode::Char('c') => self.start_test(TestType::Choice),
            KeyCode::Enter | KeyCode::Char(' ') => self.start_test(self.selected),
            KeyCode::Up => self.selected = cycle(self.selected, -1),
            KeyCode::Down | KeyCode::Tab => self.selected = cycle(self.selected, 1),
            KeyCode::Char('s') => self.open_stats(),
            KeyCode::Esc | KeyCode::Char('q') => self.should_quit = true,
            _ => {}
        }
    }

    fn on_arena_key(&mut self, code: KeyCode) {
        if code == KeyCode::Esc {
            self.back_to_menu();
            return;
        }

        // Fire anything already due first. A key that raced a timer was aimed
        // at a screen the user never saw change, so it is dropped.
        let before = self.session.state();
        self.session.tick();
        self.process_events();
        if self.session.state() != before {
            return;
        }

        match self.session.state() {
            SessionState::Complete => match code {
                KeyCode::Char('r') | KeyCode::Char(' ') | KeyCode::Enter => {
                    self.notice = None;
                    self.last_result = None;
                    let _ = self.session.restart();
                }
                KeyCode::Char('m') => self.back_to_menu(),
                KeyCode::Char('s') => {
                    self.session.stop();
                    self.open_stats();
                }
                _ => {}
            },
            SessionState::Ready => {
                if is_trigger(code) {
                    self.notice = None;
                    self.session.input(None);
                }
            }
            SessionState::Waiting => {
                if is_trigger(code) || arrow_choice(code).is_some() {
                    self.session.input(None);
                }
            }
            SessionState::Active => match self.session.test_type() {
                Some(TestType::Choice) => {
                    if let Some(choice) = arrow_choice(code) {
                        self.session.input(Some(choice));
                    }
                }
                Some(_) => {
                    if is_trigger(code) {
                        self.session.input(None);
                    }
                }
                None => {}
            },
            SessionState::Idle | SessionState::Error => {}
        }
    }

    /// Drain session notifications: persist finished results and surface
    /// premature input and achievements to the screen
    pub fn process_events(&mut self) {
        for event in self.events.drain() {
            match event {
                SessionEvent::StateChanged(SessionState::Error) => {
                    self.notice = Some("Too early! Wait for the signal.".to_string());
                }
                SessionEvent::ResultReady(result) => self.record(result),
                SessionEvent::StateChanged(_) | SessionEvent::Stimulus(_) => {}
            }
        }
    }

    fn record(&mut self, result: TestResult) {
        // the measured time is shown whether or not it could be stored
        let Some(saved) = self.store.save_result(result.clone()) else {
            warn!("result shown but not recorded");
            self.last_result = Some(result);
            return;
        };
        self.last_result = Some(saved.result);

        if !saved.unlocked.is_empty() {
            let names: Vec<String> = saved.unlocked.into_iter().map(|a| a.name).collect();
            info!(?names, "new achievements");
            self.notice = Some(format!("Achievement unlocked: {}", names.join(", ")));
        }
    }
}

fn is_trigger(code: KeyCode) -> bool {
    matches!(code, KeyCode::Char(' ') | KeyCode::Enter)
}

fn arrow_choice(code: KeyCode) -> Option<Choice> {
    match code {
        KeyCode::Left | KeyCode::Char('h') => Some(Choice::Left),
        KeyCode::Right | KeyCode::Char('l') => Some(Choice::Right),
        KeyCode::Up | KeyCode::Char('k') => Some(Choice::Up),
        KeyCode::Down | KeyCode::Char('j') => Some(Choice::Down),
        _ => None,
    }
}

fn cycle(current: TestType, step: isize) -> TestType {
    let all = TestType::ALL;
    let idx = all.iter().position(|t| *t == current).unwrap_or(0) as isize;
    all[(idx + step).rem_euclid(all.len() as isize) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::StorageError,
        storage::KeyValueStore,
        timer::ManualClock,
    };
    use serde_json::Value;

    #[derive(Debug)]
    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn read(&self, _key: &str) -> Result<Option<Value>, StorageError> {
            Err(StorageError::Unavailable("offline".into()))
        }

        fn write(&mut self, _key: &str, _value: &Value) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("offline".into()))
        }

        fn delete(&mut self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("offline".into()))
        }
    }

    fn app() -> (App<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let session = TestSession::new(clock.clone(), TimerQueue::new()).with_seed(3);
        (App::new(session, ResultStore::in_memory()), clock)
    }

    fn press(app: &mut App<ManualClock>, code: KeyCode) {
        app.on_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn wait_for_stimulus(app: &mut App<ManualClock>, clock: &ManualClock) {
        clock.advance(app.session.delay().unwrap());
        app.on_tick();
        assert_eq!(app.session.state(), SessionState::Active);
    }

    #[test]
    fn test_menu_selection_cycles() {
        let (mut app, _) = app();
        press(&mut app, KeyCode::Up);
        assert_eq!(app.selected, TestType::Choice);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        assert_eq!(app.selected, TestType::Audio);
    }

    #[test]
    fn test_visual_run_is_saved() {
        let (mut app, clock) = app();
        press(&mut app, KeyCode::Char('1'));
        assert_eq!(app.state, AppState::Arena);

        press(&mut app, KeyCode::Char(' '));
        wait_for_stimulus(&mut app, &clock);
        clock.advance_ms(245);
        press(&mut app, KeyCode::Char(' '));

        let shown = app.last_result.clone().unwrap();
        assert_eq!(shown.reaction_time_ms(), 245);
        assert!(shown.id().is_some());
        assert_eq!(app.store.load_history(&HistoryFilter::all()), vec![shown]);
        assert_eq!(
            app.notice.as_deref(),
            Some("Achievement unlocked: First Steps")
        );
    }

    #[test]
    fn test_premature_press_shows_notice() {
        let (mut app, _) = app();
        press(&mut app, KeyCode::Char('1'));
        press(&mut app, KeyCode::Char(' '));
        press(&mut app, KeyCode::Char(' '));

        assert_eq!(app.session.state(), SessionState::Ready);
        assert!(app.notice.as_deref().unwrap().starts_with("Too early"));
        assert!(app.store.load_history(&HistoryFilter::all()).is_empty());
    }

    #[test]
    fn test_choice_uses_arrows() {
        let (mut app, clock) = app();
        press(&mut app, KeyCode::Char('3'));
        press(&mut app, KeyCode::Enter);
        wait_for_stimulus(&mut app, &clock);

        // space is not an answer
        press(&mut app, KeyCode::Char(' '));
        assert_eq!(app.session.state(), SessionState::Active);

        let target = app.session.correct_choice().unwrap();
        let key = match target {
            Choice::Left => KeyCode::Left,
            Choice::Right => KeyCode::Right,
            Choice::Up => KeyCode::Up,
            Choice::Down => KeyCode::Down,
        };
        clock.advance_ms(410);
        press(&mut app, key);

        let result = app.last_result.clone().unwrap();
        assert!(result.success());
        assert_eq!(result.chosen_answer(), Some(target));
    }

    #[test]
    fn test_timeout_is_saved() {
        let (mut app, clock) = app();
        press(&mut app, KeyCode::Char('2'));
        press(&mut app, KeyCode::Char(' '));
        wait_for_stimulus(&mut app, &clock);

        clock.advance_ms(3000);
        app.on_tick();

        assert!(app.last_result.as_ref().unwrap().is_timeout());
        assert_eq!(app.store.user_stats().total_tests, 1);
        assert_eq!(app.store.user_stats().streaks.current, 0);
    }

    #[test]
    fn test_retry_and_escape() {
        let (mut app, clock) = app();
        press(&mut app, KeyCode::Char('1'));
        press(&mut app, KeyCode::Char(' '));
        wait_for_stimulus(&mut app, &clock);
        clock.advance_ms(300);
        press(&mut app, KeyCode::Char(' '));
        assert_eq!(app.session.state(), SessionState::Complete);

        press(&mut app, KeyCode::Char('r'));
        assert_eq!(app.session.state(), SessionState::Ready);
        assert!(app.last_result.is_none());

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.state, AppState::Menu);
        assert_eq!(app.session.state(), SessionState::Idle);
        assert_eq!(app.session.pending_timers(), 0);
    }

    #[test]
    fn test_stats_screen_loads_summary() {
        let (mut app, clock) = app();
        press(&mut app, KeyCode::Char('s'));
        assert_eq!(app.state, AppState::Stats);
        assert_eq!(app.stats_view.as_ref().unwrap().summary, None);

        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Char('1'));
        press(&mut app, KeyCode::Char(' '));
        wait_for_stimulus(&mut app, &clock);
        clock.advance_ms(220);
        press(&mut app, KeyCode::Char(' '));
        press(&mut app, KeyCode::Char('s'));

        let view = app.stats_view.as_ref().unwrap();
        assert_eq!(view.summary.as_ref().unwrap().best_reaction_time, Some(220));
        assert_eq!(view.trend, vec![(1.0, 220.0)]);
        assert_eq!(app.state, AppState::Stats);
    }

    #[test]
    fn test_ctrl_c_quits() {
        let (mut app, _) = app();
        press(&mut app, KeyCode::Char('1'));
        app.on_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
        assert_eq!(app.session.state(), SessionState::Idle);
    }

    #[test]
    fn test_key_racing_stimulus_is_dropped() {
        let (mut app, clock) = app();
        press(&mut app, KeyCode::Char('1'));
        press(&mut app, KeyCode::Char(' '));

        // stimulus is due but no tick has run yet: not premature, and not a
        // reaction to a stimulus that was never drawn
        clock.advance(app.session.delay().unwrap());
        press(&mut app, KeyCode::Char(' '));

        assert_eq!(app.session.state(), SessionState::Active);
        assert_eq!(app.notice, None);
        assert_eq!(app.session.attempts(), 1);

        clock.advance_ms(150);
        press(&mut app, KeyCode::Char(' '));
        assert_eq!(app.last_result.as_ref().unwrap().reaction_time_ms(), 150);
    }

    #[test]
    fn test_unrecorded_result_is_still_shown() {
        let (mut app, clock) = app();
        app.store = ResultStore::with_backend(Box::new(FailingStore));
        press(&mut app, KeyCode::Char('1'));
        press(&mut app, KeyCode::Char(' '));
        wait_for_stimulus(&mut app, &clock);
        clock.advance_ms(260);
        press(&mut app, KeyCode::Char(' '));

        let shown = app.last_result.clone().unwrap();
        assert_eq!(shown.reaction_time_ms(), 260);
        assert!(shown.id().is_none());
        assert_eq!(app.notice, None);
    }
}
