use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{cell::RefCell, collections::VecDeque, fmt, rc::Rc, str::FromStr, time::Duration};
use tracing::{debug, info, trace};

use crate::{
    error::SessionError,
    result::{ResultBuilder, TestResult},
    test_type::{Choice, Stimulus, StimulusKind, TestType},
    timer::{Clock, Scheduler, SystemClock, TimerEvent, TimerHandle, TimerQueue},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SessionState {
    Idle,
    Ready,
    Waiting,
    Active,
    Complete,
    Error,
}

/// Presentation side of the session: told about every transition and result
pub trait SessionObserver {
    fn on_state_change(&mut self, _state: SessionState) {}
    fn on_result_ready(&mut self, _result: &TestResult) {}
}

/// Plays the stimulus (sound, flash, prompt). Fire-and-forget.
pub trait StimulusSink {
    fn emit_stimulus(&mut self, stimulus: &Stimulus);
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    ResultReady(TestResult),
    Stimulus(Stimulus),
}

/// Observer and stimulus sink that queues everything for the owner to drain.
/// Clones share one queue.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<VecDeque<SessionEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<SessionEvent> {
        self.events.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    /// Every result currently queued, without draining
    pub fn results(&self) -> Vec<TestResult> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                SessionEvent::ResultReady(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn states(&self) -> Vec<SessionState> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                SessionEvent::StateChanged(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: SessionEvent) {
        self.events.borrow_mut().push_back(event);
    }
}

impl SessionObserver for EventLog {
    fn on_state_change(&mut self, state: SessionState) {
        self.push(SessionEvent::StateChanged(state));
    }

    fn on_result_ready(&mut self, result: &TestResult) {
        self.push(SessionEvent::ResultReady(result.clone()));
    }
}

impl StimulusSink for EventLog {
    fn emit_stimulus(&mut self, stimulus: &Stimulus) {
        self.push(SessionEvent::Stimulus(stimulus.clone()));
    }
}

/// One reaction test attempt: `Idle → Ready → Waiting → Active → Complete`,
/// with premature input bouncing `Waiting → Error → Ready`.
///
/// Timer-driven transitions always re-check the current state and the armed
/// handle, so a timer that fires after it was cancelled changes nothing.
pub struct TestSession<C: Clock = SystemClock, S: Scheduler = TimerQueue> {
    clock: C,
    scheduler: S,
    rng: StdRng,
    state: SessionState,
    test_type: Option<TestType>,
    attempts: u32,
    started_at: Option<DateTime<Utc>>,
    delay: Option<Duration>,
    onset: Option<Duration>,
    correct_choice: Option<Choice>,
    stimulus_timer: Option<TimerHandle>,
    timeout_timer: Option<TimerHandle>,
    last_result: Option<TestResult>,
    observers: Vec<Box<dyn SessionObserver>>,
    stimulus_sinks: Vec<Box<dyn StimulusSink>>,
}

impl TestSession<SystemClock, TimerQueue> {
    pub fn with_system_clock() -> Self {
        Self::new(SystemClock::new(), TimerQueue::new())
    }
}

impl<C: Clock, S: Scheduler> TestSession<C, S> {
    pub fn new(clock: C, scheduler: S) -> Self {
        Self {
            clock,
            scheduler,
            rng: StdRng::from_entropy(),
            state: SessionState::Idle,
            test_type: None,
            attempts: 0,
            started_at: None,
            delay: None,
            onset: None,
            correct_choice: None,
            stimulus_timer: None,
            timeout_timer: None,
            last_result: None,
            observers: Vec::new(),
            stimulus_sinks: Vec::new(),
        }
    }

    /// Reproducible delays and choice targets
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn add_observer(&mut self, observer: Box<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    pub fn add_stimulus_sink(&mut self, sink: Box<dyn StimulusSink>) {
        self.stimulus_sinks.push(sink);
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn test_type(&self) -> Option<TestType> {
        self.test_type
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay sampled by the latest `begin()`
    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    /// Target of the running choice test, known once the stimulus is shown
    pub fn correct_choice(&self) -> Option<Choice> {
        match self.state {
            SessionState::Active | SessionState::Complete => self.correct_choice,
            _ => None,
        }
    }

    pub fn last_result(&self) -> Option<&TestResult> {
        self.last_result.as_ref()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SessionState::Waiting | SessionState::Active)
    }

    pub fn pending_timers(&self) -> usize {
        self.scheduler.pending()
    }

    /// How long until the earliest armed timer is due
    pub fn next_timer_in(&self) -> Option<Duration> {
        self.scheduler
            .next_deadline()
            .map(|deadline| deadline.saturating_sub(self.clock.elapsed()))
    }

    /// Time left in the response window while `Active`
    pub fn response_time_left(&self) -> Option<Duration> {
        match (self.state, self.onset, self.test_type) {
            (SessionState::Active, Some(onset), Some(t)) => {
                let elapsed = self.clock.elapsed().saturating_sub(onset);
                Some(t.config().timeout().saturating_sub(elapsed))
            }
            _ => None,
        }
    }

    pub fn start(&mut self, test_type: TestType) -> Result<(), SessionError> {
        self.expect_state("start", SessionState::Idle)?;

        info!(%test_type, "starting test");
        self.test_type = Some(test_type);
        self.attempts = 0;
        self.started_at = Some(self.clock.wall());
        self.last_result = None;
        self.clear_run();
        self.set_state(SessionState::Ready);
        Ok(())
    }

    /// Like [`start`](Self::start) but takes the type by name
    pub fn start_named(&mut self, name: &str) -> Result<(), SessionError> {
        let test_type = TestType::from_str(name)?;
        self.start(test_type)
    }

    /// Arms the stimulus after a random delay from the type's window
    pub fn begin(&mut self) -> Result<Duration, SessionError> {
        self.expect_state("begin", SessionState::Ready)?;
        let config = self.current_type()?.config();

        self.attempts += 1;
        let delay_ms = self.rng.gen_range(config.min_delay_ms..config.max_delay_ms);
        let delay = Duration::from_millis(delay_ms);
        debug!(delay_ms, attempt = self.attempts, "stimulus delay sampled");

        self.delay = Some(delay);
        let deadline = self.clock.elapsed() + delay;
        self.stimulus_timer = Some(
            self.scheduler
                .schedule(deadline, TimerEvent::StimulusOnset),
        );
        self.set_state(SessionState::Waiting);
        Ok(delay)
    }

    /// Input arrived before the stimulus: flag the error and go back to `Ready`
    pub fn premature_input(&mut self) -> Result<(), SessionError> {
        self.expect_state("register premature input", SessionState::Waiting)?;

        debug!(attempt = self.attempts, "premature input");
        self.cancel_timers();
        self.set_state(SessionState::Error);
        self.set_state(SessionState::Ready);
        Ok(())
    }

    pub fn respond(&mut self, choice: Option<Choice>) -> Result<TestResult, SessionError> {
        self.expect_state("respond", SessionState::Active)?;
        let test_type = self.current_type()?;

        if let Some(handle) = self.timeout_timer.take() {
            self.scheduler.cancel(handle);
        }

        let onset = self.onset.unwrap_or_default();
        let elapsed = self.clock.elapsed().saturating_sub(onset);
        if elapsed >= test_type.config().timeout() {
            // the window closed before the timer was polled
            debug!(?elapsed, "response after the window, recording a timeout");
            let result = self.builder(test_type).timeout(self.clock.wall());
            self.complete(result.clone());
            return Ok(result);
        }
        let reaction_ms = (elapsed.as_secs_f64() * 1000.0).round() as u64;

        let result = self
            .builder(test_type)
            .respond(reaction_ms, choice, self.clock.wall());
        info!(%test_type, reaction_ms, success = result.success(), "reaction recorded");
        self.complete(result.clone());
        Ok(result)
    }

    /// Routes a user key press by state. Returns the result if this press
    /// finished the test.
    pub fn input(&mut self, choice: Option<Choice>) -> Option<TestResult> {
        let outcome = match self.state {
            SessionState::Ready => self.begin().map(|_| None),
            SessionState::Waiting => self.premature_input().map(|_| None),
            SessionState::Active => self.respond(choice).map(Some),
            SessionState::Idle | SessionState::Complete | SessionState::Error => Ok(None),
        };
        outcome.unwrap_or(None)
    }

    /// Run the same test type again after completion
    pub fn restart(&mut self) -> Result<(), SessionError> {
        self.expect_state("restart", SessionState::Complete)?;

        info!("test restarted");
        self.attempts = 0;
        self.started_at = Some(self.clock.wall());
        self.clear_run();
        self.set_state(SessionState::Ready);
        Ok(())
    }

    /// Abandon whatever is in progress
    pub fn stop(&mut self) {
        self.cancel_timers();
        self.clear_run();
        self.test_type = None;
        self.attempts = 0;
        self.started_at = None;
        if self.state != SessionState::Idle {
            info!("test stopped");
            self.set_state(SessionState::Idle);
        }
    }

    /// Fires every due timer. Returns a result if the response window expired.
    pub fn tick(&mut self) -> Option<TestResult> {
        let now = self.clock.elapsed();
        let mut produced = None;
        for (handle, event) in self.scheduler.take_due(now) {
            if let Some(result) = self.on_timer(handle, event) {
                produced = Some(result);
            }
        }
        produced
    }

    /// Delivers one timer firing. Stale firings (wrong state or a handle that
    /// is no longer armed) are ignored.
    pub fn on_timer(&mut self, handle: TimerHandle, event: TimerEvent) -> Option<TestResult> {
        match event {
            TimerEvent::StimulusOnset => {
                if self.state == SessionState::Waiting && self.stimulus_timer == Some(handle) {
                    self.stimulus_timer = None;
                    self.deliver_stimulus();
                } else {
                    trace!(?handle, state = %self.state, "stale stimulus timer ignored");
                }
                None
            }
            TimerEvent::ResponseTimeout => {
                if self.state == SessionState::Active && self.timeout_timer == Some(handle) {
                    self.timeout_timer = None;
                    self.expire()
                } else {
                    trace!(?handle, state = %self.state, "stale timeout ignored");
                    None
                }
            }
        }
    }

    fn deliver_stimulus(&mut self) {
        let Some(test_type) = self.test_type else {
            return;
        };
        let config = test_type.config();

        let onset = self.clock.elapsed();
        self.onset = Some(onset);

        let stimulus = match config.stimulus {
            StimulusKind::Visual => Stimulus::Visual,
            StimulusKind::Tone(tone) => Stimulus::Tone(tone),
            StimulusKind::Choice(options) => {
                let target = options[self.rng.gen_range(0..options.len())];
                self.correct_choice = Some(target);
                Stimulus::Choice { target, options }
            }
        };

        self.timeout_timer = Some(
            self.scheduler
                .schedule(onset + config.timeout(), TimerEvent::ResponseTimeout),
        );
        self.set_state(SessionState::Active);

        for sink in self.stimulus_sinks.iter_mut() {
            sink.emit_stimulus(&stimulus);
        }
    }

    fn expire(&mut self) -> Option<TestResult> {
        let test_type = self.test_type?;
        debug!(%test_type, "test timed out");
        let result = self.builder(test_type).timeout(self.clock.wall());
        self.complete(result.clone());
        Some(result)
    }

    fn complete(&mut self, result: TestResult) {
        self.cancel_timers();
        self.last_result = Some(result.clone());
        self.set_state(SessionState::Complete);
        for observer in self.observers.iter_mut() {
            observer.on_result_ready(&result);
        }
    }

    fn builder(&self, test_type: TestType) -> ResultBuilder {
        ResultBuilder::new(test_type, self.started_at.unwrap_or_else(|| self.clock.wall()))
            .attempts(self.attempts)
            .correct_choice(self.correct_choice)
    }

    fn current_type(&self) -> Result<TestType, SessionError> {
        self.test_type.ok_or(SessionError::InvalidTransition {
            op: "run without a test type",
            state: self.state,
        })
    }

    fn expect_state(&self, op: &'static str, expected: SessionState) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                op,
                state: self.state,
            })
        }
    }

    fn cancel_timers(&mut self) {
        if let Some(handle) = self.stimulus_timer.take() {
            self.scheduler.cancel(handle);
        }
        if let Some(handle) = self.timeout_timer.take() {
            self.scheduler.cancel(handle);
        }
    }

    fn clear_run(&mut self) {
        self.delay = None;
        self.onset = None;
        self.correct_choice = None;
    }

    fn set_state(&mut self, state: SessionState) {
        self.state = state;
        for observer in self.observers.iter_mut() {
            observer.on_state_change(state);
        }
    }
}

impl<C: Clock, S: Scheduler> fmt::Debug for TestSession<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSession")
            .field("state", &self.state)
            .field("test_type", &self.test_type)
            .field("attempts", &self.attempts)
            .field("delay", &self.delay)
            .field("onset", &self.onset)
            .field("stimulus_timer", &self.stimulus_timer)
            .field("timeout_timer", &self.timeout_timer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::ManualClock;
    use assert_matches::assert_matches;

    fn session() -> (TestSession<ManualClock, TimerQueue>, ManualClock, EventLog) {
        let clock = ManualClock::new();
        let log = EventLog::new();
        let mut session = TestSession::new(clock.clone(), TimerQueue::new()).with_seed(7);
        session.add_observer(Box::new(log.clone()));
        session.add_stimulus_sink(Box::new(log.clone()));
        (session, clock, log)
    }

    /// Advance past the sampled delay and fire the stimulus
    fn reach_active(session: &mut TestSession<ManualClock, TimerQueue>, clock: &ManualClock) {
        let delay = session.begin().unwrap();
        clock.advance(delay);
        assert_eq!(session.tick(), None);
        assert_eq!(session.state(), SessionState::Active);
    }

    #[test]
    fn test_new_session_is_idle() {
        let (session, _, log) = session();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.attempts(), 0);
        assert!(session.last_result().is_none());
        assert!(log.is_empty());
    }

    #[test]
    fn test_start_moves_to_ready() {
        let (mut session, _, log) = session();
        session.start(TestType::Visual).unwrap();

        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.test_type(), Some(TestType::Visual));
        assert_eq!(log.states(), vec![SessionState::Ready]);
    }

    #[test]
    fn test_start_named_rejects_unknown_type() {
        let (mut session, _, _) = session();
        assert_matches!(
            session.start_named("olfactory"),
            Err(SessionError::InvalidArgument(_))
        );
        assert_eq!(session.state(), SessionState::Idle);

        session.start_named("choice").unwrap();
        assert_eq!(session.test_type(), Some(TestType::Choice));
    }

    #[test]
    fn test_start_only_from_idle() {
        let (mut session, _, _) = session();
        session.start(TestType::Visual).unwrap();
        assert_matches!(
            session.start(TestType::Audio),
            Err(SessionError::InvalidTransition {
                state: SessionState::Ready,
                ..
            })
        );
    }

    #[test]
    fn test_begin_samples_delay_in_window() {
        let (mut session, _, _) = session();
        session.start(TestType::Choice).unwrap();
        let delay = session.begin().unwrap();

        assert!(delay >= Duration::from_millis(500));
        assert!(delay < Duration::from_millis(3000));
        assert_eq!(session.state(), SessionState::Waiting);
        assert_eq!(session.attempts(), 1);
        assert_eq!(session.pending_timers(), 1);
    }

    #[test]
    fn test_begin_requires_ready() {
        let (mut session, _, _) = session();
        assert_matches!(
            session.begin(),
            Err(SessionError::InvalidTransition {
                state: SessionState::Idle,
                ..
            })
        );
    }

    #[test]
    fn test_stimulus_not_delivered_before_delay() {
        let (mut session, clock, _) = session();
        session.start(TestType::Visual).unwrap();
        let delay = session.begin().unwrap();

        clock.advance(delay - Duration::from_millis(1));
        session.tick();
        assert_eq!(session.state(), SessionState::Waiting);

        clock.advance_ms(1);
        session.tick();
        assert_eq!(session.state(), SessionState::Active);
    }

    #[test]
    fn test_visual_reaction_measured() {
        let (mut session, clock, log) = session();
        session.start(TestType::Visual).unwrap();
        reach_active(&mut session, &clock);

        clock.advance_ms(234);
        let result = session.respond(None).unwrap();

        assert_eq!(result.reaction_time_ms(), 234);
        assert!(result.success());
        assert_eq!(result.attempts(), 1);
        assert_eq!(session.state(), SessionState::Complete);
        assert_eq!(session.pending_timers(), 0);
        assert_eq!(log.results(), vec![result]);
    }

    #[test]
    fn test_audio_emits_tone() {
        let (mut session, clock, log) = session();
        session.start(TestType::Audio).unwrap();
        reach_active(&mut session, &clock);

        let stimuli: Vec<_> = log
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Stimulus(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_matches!(stimuli.as_slice(), [Stimulus::Tone(t)] if t.duration_ms == 200);
    }

    #[test]
    fn test_choice_success_and_failure() {
        let (mut session, clock, _) = session();
        session.start(TestType::Choice).unwrap();
        reach_active(&mut session, &clock);

        let target = session.correct_choice().unwrap();
        clock.advance_ms(400);
        let result = session.respond(Some(target)).unwrap();
        assert!(result.success());
        assert_eq!(result.correct_choice(), Some(target));

        session.restart().unwrap();
        reach_active(&mut session, &clock);
        let target = session.correct_choice().unwrap();
        let wrong = Choice::ALL.into_iter().find(|c| *c != target).unwrap();
        clock.advance_ms(350);
        let result = session.respond(Some(wrong)).unwrap();
        assert!(!result.success());
        assert!(!result.is_timeout());
        assert_eq!(result.reaction_time_ms(), 350);
    }

    #[test]
    fn test_choice_target_hidden_until_onset() {
        let (mut session, _, _) = session();
        session.start(TestType::Choice).unwrap();
        session.begin().unwrap();
        assert_eq!(session.correct_choice(), None);
    }

    #[test]
    fn test_premature_input_passes_through_error_to_ready() {
        let (mut session, clock, log) = session();
        session.start(TestType::Visual).unwrap();
        let delay = session.begin().unwrap();
        log.drain();

        session.premature_input().unwrap();
        assert_eq!(
            log.states(),
            vec![SessionState::Error, SessionState::Ready]
        );
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.pending_timers(), 0);

        // the cancelled stimulus never arrives
        clock.advance(delay);
        session.tick();
        assert_eq!(session.state(), SessionState::Ready);
        assert!(log.results().is_empty());
    }

    #[test]
    fn test_attempts_count_premature_retries() {
        let (mut session, clock, _) = session();
        session.start(TestType::Visual).unwrap();
        session.begin().unwrap();
        session.premature_input().unwrap();
        session.begin().unwrap();
        session.premature_input().unwrap();
        reach_active(&mut session, &clock);

        clock.advance_ms(300);
        let result = session.respond(None).unwrap();
        assert_eq!(result.attempts(), 3);
    }

    #[test]
    fn test_timeout_produces_sentinel_result() {
        let (mut session, clock, log) = session();
        session.start(TestType::Visual).unwrap();
        reach_active(&mut session, &clock);

        clock.advance_ms(2999);
        assert_eq!(session.tick(), None);
        assert_eq!(session.state(), SessionState::Active);

        clock.advance_ms(1);
        let result = session.tick().unwrap();
        assert!(result.is_timeout());
        assert!(!result.success());
        assert_eq!(session.state(), SessionState::Complete);
        assert_eq!(log.results().len(), 1);
    }

    #[test]
    fn test_stale_timeout_after_response_is_ignored() {
        let (mut session, clock, log) = session();
        session.start(TestType::Visual).unwrap();
        reach_active(&mut session, &clock);
        // as if a timer runtime still held the handle after cancellation
        let timeout = session.timeout_timer.unwrap();

        clock.advance_ms(180);
        let result = session.respond(None).unwrap();

        assert_eq!(
            session.on_timer(timeout, TimerEvent::ResponseTimeout),
            None
        );
        assert_eq!(session.state(), SessionState::Complete);
        assert_eq!(session.last_result(), Some(&result));
        assert_eq!(log.results(), vec![result]);
    }

    #[test]
    fn test_stale_stimulus_after_stop_is_ignored() {
        let (mut session, _, _) = session();
        session.start(TestType::Visual).unwrap();
        session.begin().unwrap();
        let handle = session.stimulus_timer.unwrap();

        session.stop();
        assert_eq!(session.on_timer(handle, TimerEvent::StimulusOnset), None);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_foreign_handle_does_not_deliver_stimulus() {
        let (mut session, _, _) = session();
        session.start(TestType::Visual).unwrap();
        session.begin().unwrap();

        let mut other = TimerQueue::new();
        other.schedule(Duration::ZERO, TimerEvent::StimulusOnset);
        let foreign = other.schedule(Duration::ZERO, TimerEvent::StimulusOnset);
        let armed = session.stimulus_timer.unwrap();
        assert_ne!(foreign, armed);

        session.on_timer(foreign, TimerEvent::StimulusOnset);
        assert_eq!(session.state(), SessionState::Waiting);
    }

    #[test]
    fn test_respond_outside_active_is_rejected() {
        let (mut session, _, _) = session();
        session.start(TestType::Visual).unwrap();
        session.begin().unwrap();
        assert_matches!(
            session.respond(None),
            Err(SessionError::InvalidTransition {
                state: SessionState::Waiting,
                ..
            })
        );
    }

    #[test]
    fn test_input_routes_by_state() {
        let (mut session, clock, _) = session();
        session.start(TestType::Visual).unwrap();

        assert_eq!(session.input(None), None);
        assert_eq!(session.state(), SessionState::Waiting);

        assert_eq!(session.input(None), None);
        assert_eq!(session.state(), SessionState::Ready);

        session.input(None);
        clock.advance(session.delay().unwrap());
        session.tick();
        clock.advance_ms(190);
        let result = session.input(None).unwrap();
        assert_eq!(result.reaction_time_ms(), 190);
        assert_eq!(result.attempts(), 2);

        // further presses after completion do nothing
        assert_eq!(session.input(None), None);
        assert_eq!(session.state(), SessionState::Complete);
    }

    #[test]
    fn test_stop_from_any_state_cancels_timers() {
        let (mut session, clock, _) = session();
        session.start(TestType::Audio).unwrap();
        reach_active(&mut session, &clock);
        assert_eq!(session.pending_timers(), 1);

        session.stop();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.pending_timers(), 0);

        clock.advance_ms(5000);
        assert_eq!(session.tick(), None);

        // idle stop is a no-op and a fresh start works
        session.stop();
        session.start(TestType::Choice).unwrap();
        assert_eq!(session.attempts(), 0);
    }

    #[test]
    fn test_response_after_window_is_timeout() {
        let (mut session, clock, log) = session();
        session.start(TestType::Visual).unwrap();
        reach_active(&mut session, &clock);
        clock.advance_ms(3200);

        let result = session.respond(None).unwrap();
        assert!(result.is_timeout());
        assert_eq!(session.state(), SessionState::Complete);
        assert_eq!(session.pending_timers(), 0);
        assert_eq!(log.results(), vec![result]);
    }

    #[test]
    fn test_restart_resets_attempts() {
        let (mut session, clock, _) = session();
        session.start(TestType::Visual).unwrap();
        session.begin().unwrap();
        session.premature_input().unwrap();
        reach_active(&mut session, &clock);
        clock.advance_ms(200);
        session.respond(None).unwrap();

        session.restart().unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.attempts(), 0);
        assert_eq!(session.test_type(), Some(TestType::Visual));
    }

    #[test]
    fn test_response_time_left_counts_down() {
        let (mut session, clock, _) = session();
        session.start(TestType::Visual).unwrap();
        assert_eq!(session.response_time_left(), None);
        reach_active(&mut session, &clock);

        clock.advance_ms(1000);
        assert_eq!(
            session.response_time_left(),
            Some(Duration::from_millis(2000))
        );
    }

    #[test]
    fn test_same_seed_same_delays() {
        let mut a = TestSession::new(ManualClock::new(), TimerQueue::new()).with_seed(42);
        let mut b = TestSession::new(ManualClock::new(), TimerQueue::new()).with_seed(42);
        a.start(TestType::Visual).unwrap();
        b.start(TestType::Visual).unwrap();
        assert_eq!(a.begin().unwrap(), b.begin().unwrap());
    }
}
