#![forbid(unsafe_code)]

//! Loader animation sequencer.
//!
//! Each animated entity (the staggered wordmark letters and the progress
//! counter) is an explicit finite-state machine over [`Phase`]. A
//! [`TransitionTable`] maps `(entity, phase, event)` to the next phase and
//! its [`PhaseTiming`]; the sequencer begins a phase, waits for its full
//! duration on a host timer, and only then looks at the entity's next queued
//! event. Rendering is left to a [`PhaseSink`], which receives the per-child
//! start offsets so the host can drive CSS transitions.
//!
//! # Invariants
//!
//! 1. A phase never begins before the entity's previous phase has elapsed.
//! 2. The entrance plays at most once; the exit plays at most once.
//! 3. An exit requested mid-entrance waits for the in-flight phase, drops
//!    the entrance phases that have not started, then hides.
//! 4. The overlay is set to `opacity: 0` and `on_complete` runs exactly once,
//!    after every entity has finished hiding.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{debug, trace};

use crate::env::StyleTarget;
use crate::readiness::ReadinessState;
use crate::runtime::{Host, TimerId};

/// Upper bound on animated letters; larger counts are clamped.
pub const MAX_LETTERS: usize = 256;

/// An independently animated part of the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    /// The wordmark; one child per letter.
    Letters,
    /// The percentage label; a single child.
    Counter,
}

/// Animation state of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Hidden,
    Visible,
    Bounce,
    Hide,
}

/// Input to an entity's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseEvent {
    /// The loader mounted.
    Mount,
    /// The entity's reveal finished; play the settle flourish.
    EntranceSettled,
    /// Readiness finished; leave.
    Finish,
}

/// Timing of one phase.
///
/// Child `i` starts at `delay + delay_children + i * stagger` and runs for
/// `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhaseTiming {
    pub delay: Duration,
    pub delay_children: Duration,
    pub stagger: Duration,
    pub duration: Duration,
}

impl PhaseTiming {
    #[must_use]
    pub const fn new(duration: Duration) -> Self {
        Self {
            delay: Duration::ZERO,
            delay_children: Duration::ZERO,
            stagger: Duration::ZERO,
            duration,
        }
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub const fn with_delay_children(mut self, delay: Duration) -> Self {
        self.delay_children = delay;
        self
    }

    #[must_use]
    pub const fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    /// Start offset of each of `count` children.
    #[must_use]
    pub fn child_offsets(&self, count: usize) -> Vec<Duration> {
        let base = self.delay.saturating_add(self.delay_children);
        (0..count)
            .map(|i| {
                let step = u32::try_from(i).unwrap_or(u32::MAX);
                base.saturating_add(self.stagger.saturating_mul(step))
            })
            .collect()
    }

    /// Time from phase start until the last child has finished.
    #[must_use]
    pub fn total(&self, count: usize) -> Duration {
        let last_start = self
            .child_offsets(count)
            .last()
            .copied()
            .unwrap_or(self.delay);
        last_start.saturating_add(self.duration)
    }
}

/// One row of a [`TransitionTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub entity: Entity,
    pub from: Phase,
    pub event: PhaseEvent,
    pub to: Phase,
    pub timing: PhaseTiming,
}

/// `(entity, phase, event) -> (next phase, timing)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTable {
    rows: Vec<Transition>,
}

const fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

impl TransitionTable {
    /// An empty table; every event is ignored.
    #[must_use]
    pub fn empty() -> Self {
        Self { rows: Vec::new() }
    }

    /// The table the site's loader ships with.
    #[must_use]
    pub fn loader() -> Self {
        let reveal = PhaseTiming::new(ms(500)).with_stagger(ms(100));
        let bounce = PhaseTiming::new(ms(700))
            .with_stagger(ms(100))
            .with_delay_children(ms(150));
        let drop_away = PhaseTiming::new(ms(600)).with_delay(ms(500));
        let counter_in = PhaseTiming::new(ms(500)).with_delay(ms(300));
        let counter_out = PhaseTiming::new(ms(500));

        use Entity::{Counter, Letters};
        use Phase::{Bounce, Hidden, Hide, Visible};
        use PhaseEvent::{EntranceSettled, Finish, Mount};

        Self::empty()
            .with(Letters, Hidden, Mount, Visible, reveal)
            .with(Letters, Visible, EntranceSettled, Bounce, bounce)
            .with(Letters, Hidden, Finish, Hide, drop_away)
            .with(Letters, Visible, Finish, Hide, drop_away)
            .with(Letters, Bounce, Finish, Hide, drop_away)
            .with(Counter, Hidden, Mount, Visible, counter_in)
            .with(Counter, Hidden, Finish, Hide, counter_out)
            .with(Counter, Visible, Finish, Hide, counter_out)
    }

    /// Add or replace a row (builder pattern).
    #[must_use]
    pub fn with(
        mut self,
        entity: Entity,
        from: Phase,
        event: PhaseEvent,
        to: Phase,
        timing: PhaseTiming,
    ) -> Self {
        self.rows
            .retain(|row| !(row.entity == entity && row.from == from && row.event == event));
        self.rows.push(Transition {
            entity,
            from,
            event,
            to,
            timing,
        });
        self
    }

    #[must_use]
    pub fn lookup(&self, entity: Entity, from: Phase, event: PhaseEvent) -> Option<&Transition> {
        self.rows
            .iter()
            .find(|row| row.entity == entity && row.from == from && row.event == event)
    }
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::loader()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencerConfig {
    pub letter_count: usize,
    pub table: TransitionTable,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            letter_count: 6,
            table: TransitionTable::loader(),
        }
    }
}

/// Receives phase boundaries so the host can animate the DOM.
pub trait PhaseSink {
    /// `entity` entered `phase`; child `i` should start at `child_offsets[i]`
    /// and animate for `timing.duration`.
    fn phase_started(
        &mut self,
        entity: Entity,
        phase: Phase,
        timing: &PhaseTiming,
        child_offsets: &[Duration],
    );

    /// The phase's full duration elapsed.
    fn phase_completed(&mut self, _entity: Entity, _phase: Phase) {}
}

struct Track {
    entity: Entity,
    children: usize,
    phase: Phase,
    in_flight: Option<TimerId>,
    queued: VecDeque<PhaseEvent>,
}

impl Track {
    fn idle(&self) -> bool {
        self.in_flight.is_none() && self.queued.is_empty()
    }
}

struct Inner {
    table: TransitionTable,
    tracks: Vec<Track>,
    entrance_played: bool,
    exit_requested: bool,
    exit_done: bool,
    stopped: bool,
    on_complete: Option<Box<dyn FnOnce()>>,
}

struct Shared {
    host: Rc<dyn Host>,
    overlay: Rc<dyn StyleTarget>,
    inner: RefCell<Inner>,
    sink: RefCell<Box<dyn PhaseSink>>,
}

struct Started {
    entity: Entity,
    phase: Phase,
    timing: PhaseTiming,
    offsets: Vec<Duration>,
}

impl Shared {
    fn pump(this: &Rc<Self>, idx: usize) {
        let started = {
            let mut guard = this.inner.borrow_mut();
            let inner = &mut *guard;
            if inner.stopped {
                return;
            }
            let Some(track) = inner.tracks.get_mut(idx) else {
                return;
            };
            if track.in_flight.is_some() {
                return;
            }
            let mut started = None;
            while let Some(event) = track.queued.pop_front() {
                let Some(row) = inner.table.lookup(track.entity, track.phase, event) else {
                    trace!(entity = ?track.entity, phase = ?track.phase, ?event, "sequencer: no transition");
                    continue;
                };
                let total = row.timing.total(track.children);
                let weak: Weak<Self> = Rc::downgrade(this);
                let timer = this.host.set_timeout(
                    total,
                    Box::new(move || {
                        if let Some(shared) = weak.upgrade() {
                            Self::phase_elapsed(&shared, idx);
                        }
                    }),
                );
                track.phase = row.to;
                track.in_flight = Some(timer);
                started = Some(Started {
                    entity: track.entity,
                    phase: row.to,
                    timing: row.timing,
                    offsets: row.timing.child_offsets(track.children),
                });
                break;
            }
            started
        };

        match started {
            Some(s) => {
                debug!(entity = ?s.entity, phase = ?s.phase, "sequencer: phase started");
                this.sink
                    .borrow_mut()
                    .phase_started(s.entity, s.phase, &s.timing, &s.offsets);
            }
            None => Self::maybe_complete(this),
        }
    }

    fn phase_elapsed(this: &Rc<Self>, idx: usize) {
        let finished = {
            let mut inner = this.inner.borrow_mut();
            if inner.stopped {
                return;
            }
            let Some(track) = inner.tracks.get_mut(idx) else {
                return;
            };
            track.in_flight = None;
            (track.entity, track.phase)
        };
        this.sink.borrow_mut().phase_completed(finished.0, finished.1);
        Self::pump(this, idx);
    }

    fn maybe_complete(this: &Rc<Self>) {
        let on_complete = {
            let mut inner = this.inner.borrow_mut();
            if inner.stopped
                || !inner.exit_requested
                || inner.exit_done
                || !inner.tracks.iter().all(Track::idle)
            {
                return;
            }
            inner.exit_done = true;
            inner.on_complete.take()
        };
        debug!("sequencer: exit complete");
        this.overlay.set_style("opacity", "0");
        if let Some(callback) = on_complete {
            callback();
        }
    }

    fn pump_all(this: &Rc<Self>) {
        let count = this.inner.borrow().tracks.len();
        for idx in 0..count {
            Self::pump(this, idx);
        }
    }
}

/// Drives the loader's entities through their phases.
pub struct Sequencer {
    shared: Rc<Shared>,
}

impl Sequencer {
    /// Create a sequencer with every entity `Hidden`. Nothing plays until
    /// [`play_entrance`](Self::play_entrance) or [`play_exit`](Self::play_exit).
    pub fn new(
        host: Rc<dyn Host>,
        overlay: Rc<dyn StyleTarget>,
        config: SequencerConfig,
        sink: impl PhaseSink + 'static,
        on_complete: impl FnOnce() + 'static,
    ) -> Self {
        let tracks = vec![
            Track {
                entity: Entity::Letters,
                children: config.letter_count.min(MAX_LETTERS),
                phase: Phase::Hidden,
                in_flight: None,
                queued: VecDeque::new(),
            },
            Track {
                entity: Entity::Counter,
                children: 1,
                phase: Phase::Hidden,
                in_flight: None,
                queued: VecDeque::new(),
            },
        ];
        Self {
            shared: Rc::new(Shared {
                host,
                overlay,
                inner: RefCell::new(Inner {
                    table: config.table,
                    tracks,
                    entrance_played: false,
                    exit_requested: false,
                    exit_done: false,
                    stopped: false,
                    on_complete: Some(Box::new(on_complete)),
                }),
                sink: RefCell::new(Box::new(sink)),
            }),
        }
    }

    /// Reveal the letters, then bounce them; reveal the counter. Once only.
    pub fn play_entrance(&self) {
        {
            let mut inner = self.shared.inner.borrow_mut();
            if inner.entrance_played || inner.exit_requested || inner.stopped {
                trace!("sequencer: entrance ignored");
                return;
            }
            inner.entrance_played = true;
            for track in &mut inner.tracks {
                track.queued.push_back(PhaseEvent::Mount);
                if track.entity == Entity::Letters {
                    track.queued.push_back(PhaseEvent::EntranceSettled);
                }
            }
        }
        Shared::pump_all(&self.shared);
    }

    /// Hide every entity, then zero the overlay and run `on_complete`. Once
    /// only.
    pub fn play_exit(&self) {
        {
            let mut inner = self.shared.inner.borrow_mut();
            if inner.exit_requested || inner.stopped {
                trace!("sequencer: exit ignored");
                return;
            }
            inner.exit_requested = true;
            for track in &mut inner.tracks {
                track.queued.clear();
                track.queued.push_back(PhaseEvent::Finish);
            }
        }
        debug!("sequencer: exit requested");
        Shared::pump_all(&self.shared);
    }

    /// Play the exit once readiness has finished.
    pub fn on_readiness(&self, state: &ReadinessState) {
        if state.has_finished {
            self.play_exit();
        }
    }

    /// Current phase of `entity`.
    #[must_use]
    pub fn phase(&self, entity: Entity) -> Option<Phase> {
        self.shared
            .inner
            .borrow()
            .tracks
            .iter()
            .find(|t| t.entity == entity)
            .map(|t| t.phase)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.shared.inner.borrow().exit_done
    }

    /// Cancel in-flight phase timers. Idempotent; nothing is delivered after.
    pub fn stop(&self) {
        let timers: Vec<TimerId> = {
            let mut inner = self.shared.inner.borrow_mut();
            if inner.stopped {
                return;
            }
            inner.stopped = true;
            inner.on_complete = None;
            inner
                .tracks
                .iter_mut()
                .filter_map(|t| {
                    t.queued.clear();
                    t.in_flight.take()
                })
                .collect()
        };
        for id in timers {
            self.shared.host.clear_timeout(id);
        }
        debug!("sequencer: stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::RecordedStyle;
    use crate::runtime::ManualHost;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Beat {
        Start(Entity, Phase, Duration),
        Done(Entity, Phase, Duration),
    }

    #[derive(Clone)]
    struct Log {
        host: Rc<ManualHost>,
        beats: Rc<RefCell<Vec<Beat>>>,
    }

    impl PhaseSink for Log {
        fn phase_started(
            &mut self,
            entity: Entity,
            phase: Phase,
            _timing: &PhaseTiming,
            _child_offsets: &[Duration],
        ) {
            self.beats
                .borrow_mut()
                .push(Beat::Start(entity, phase, self.host.now()));
        }

        fn phase_completed(&mut self, entity: Entity, phase: Phase) {
            self.beats
                .borrow_mut()
                .push(Beat::Done(entity, phase, self.host.now()));
        }
    }

    struct Rig {
        host: Rc<ManualHost>,
        overlay: Rc<RecordedStyle>,
        beats: Rc<RefCell<Vec<Beat>>>,
        completions: Rc<Cell<u32>>,
        sequencer: Sequencer,
    }

    fn rig() -> Rig {
        let host = Rc::new(ManualHost::new());
        let overlay = Rc::new(RecordedStyle::new());
        let beats = Rc::new(RefCell::new(Vec::new()));
        let completions = Rc::new(Cell::new(0));
        let counter = Rc::clone(&completions);
        let sequencer = Sequencer::new(
            host.clone(),
            overlay.clone(),
            SequencerConfig::default(),
            Log {
                host: Rc::clone(&host),
                beats: Rc::clone(&beats),
            },
            move || counter.set(counter.get() + 1),
        );
        Rig {
            host,
            overlay,
            beats,
            completions,
            sequencer,
        }
    }

    fn starts_of(beats: &[Beat], entity: Entity) -> Vec<(Phase, Duration)> {
        beats
            .iter()
            .filter_map(|b| match b {
                Beat::Start(e, p, t) if *e == entity => Some((*p, *t)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn child_offsets_follow_stagger() {
        let timing = PhaseTiming::new(ms(700))
            .with_stagger(ms(100))
            .with_delay_children(ms(150));
        assert_eq!(
            timing.child_offsets(3),
            vec![ms(150), ms(250), ms(350)]
        );
        assert_eq!(timing.total(6), ms(150 + 500 + 700));
        assert_eq!(PhaseTiming::new(ms(600)).with_delay(ms(500)).total(0), ms(1100));
    }

    struct OffsetCount(Rc<Cell<usize>>);

    impl PhaseSink for OffsetCount {
        fn phase_started(
            &mut self,
            entity: Entity,
            _phase: Phase,
            _timing: &PhaseTiming,
            child_offsets: &[Duration],
        ) {
            if entity == Entity::Letters {
                self.0.set(child_offsets.len());
            }
        }

        fn phase_completed(&mut self, _entity: Entity, _phase: Phase) {}
    }

    #[test]
    fn huge_letter_count_is_clamped() {
        let host = Rc::new(ManualHost::new());
        let seen = Rc::new(Cell::new(0));
        let sequencer = Sequencer::new(
            host.clone(),
            Rc::new(RecordedStyle::new()),
            SequencerConfig {
                letter_count: usize::MAX,
                ..SequencerConfig::default()
            },
            OffsetCount(Rc::clone(&seen)),
            || {},
        );
        sequencer.play_entrance();
        assert_eq!(seen.get(), MAX_LETTERS);
        sequencer.stop();
    }

    #[test]
    fn table_overrides_replace_rows() {
        let table = TransitionTable::loader().with(
            Entity::Letters,
            Phase::Hidden,
            PhaseEvent::Mount,
            Phase::Visible,
            PhaseTiming::new(ms(1)),
        );
        let row = table
            .lookup(Entity::Letters, Phase::Hidden, PhaseEvent::Mount)
            .unwrap();
        assert_eq!(row.timing, PhaseTiming::new(ms(1)));
        assert!(table
            .lookup(Entity::Counter, Phase::Bounce, PhaseEvent::Finish)
            .is_none());
    }

    #[test]
    fn entrance_phases_run_strictly_in_sequence() {
        let rig = rig();
        rig.sequencer.play_entrance();
        rig.sequencer.play_entrance();
        rig.host.advance(ms(5000));

        let beats = rig.beats.borrow();
        // Reveal: 5 * 100ms stagger + 500ms = 1000ms, then bounce.
        assert_eq!(
            starts_of(&beats, Entity::Letters),
            vec![(Phase::Visible, ms(0)), (Phase::Bounce, ms(1000))]
        );
        assert_eq!(starts_of(&beats, Entity::Counter), vec![(Phase::Visible, ms(0))]);
        assert!(beats.contains(&Beat::Done(Entity::Letters, Phase::Bounce, ms(1000 + 1350))));
        assert_eq!(rig.sequencer.phase(Entity::Letters), Some(Phase::Bounce));
        assert_eq!(rig.completions.get(), 0);
    }

    #[test]
    fn exit_mid_entrance_waits_and_skips_bounce() {
        let rig = rig();
        rig.sequencer.play_entrance();
        rig.host.advance(ms(400));
        rig.sequencer.play_exit();
        rig.sequencer.play_exit();
        rig.host.advance(ms(5000));

        let beats = rig.beats.borrow();
        assert_eq!(
            starts_of(&beats, Entity::Letters),
            vec![(Phase::Visible, ms(0)), (Phase::Hide, ms(1000))]
        );
        // Counter reveal is 300ms delay + 500ms.
        assert_eq!(
            starts_of(&beats, Entity::Counter),
            vec![(Phase::Visible, ms(0)), (Phase::Hide, ms(800))]
        );
        assert_eq!(rig.completions.get(), 1);
        assert_eq!(rig.overlay.get("opacity").as_deref(), Some("0"));
    }

    #[test]
    fn completion_waits_for_slowest_hide() {
        let rig = rig();
        rig.sequencer.play_entrance();
        rig.host.advance(ms(2350));
        rig.sequencer.play_exit();

        // Letters hide: 500ms delay + 600ms; counter hide 500ms.
        rig.host.advance(ms(1099));
        assert_eq!(rig.completions.get(), 0);
        assert_eq!(rig.overlay.get("opacity"), None);
        rig.host.advance(ms(1));
        assert_eq!(rig.completions.get(), 1);
        assert!(rig.sequencer.is_complete());
    }

    #[test]
    fn exit_without_entrance_still_completes() {
        let rig = rig();
        rig.sequencer.on_readiness(&ReadinessState {
            is_ready: true,
            progress: 100,
            has_finished: true,
        });
        rig.host.advance(ms(1100));
        assert_eq!(rig.completions.get(), 1);
        rig.sequencer.play_entrance();
        assert_eq!(rig.host.pending_timers(), 0);
    }

    #[test]
    fn readiness_before_finish_does_not_exit() {
        let rig = rig();
        rig.sequencer.on_readiness(&ReadinessState::default());
        rig.host.advance(ms(5000));
        assert_eq!(rig.completions.get(), 0);
        assert!(rig.beats.borrow().is_empty());
    }

    #[test]
    fn stop_cancels_pending_phases() {
        let rig = rig();
        rig.sequencer.play_entrance();
        rig.sequencer.play_exit();
        rig.sequencer.stop();
        rig.sequencer.stop();
        assert_eq!(rig.host.pending_timers(), 0);
        rig.host.advance(ms(10_000));
        assert_eq!(rig.completions.get(), 0);
        assert_eq!(rig.overlay.writes(), 0);
    }
}
