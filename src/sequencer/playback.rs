/// Playback engine - coordinates timing and triggers
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::selector::PatternSelector;
use crate::grid::PatternId;
use crate::registry::Registry;
use crate::trigger::TriggerSink;

/// Steps in a measure when the selected pattern has no hit data
pub const STEPS_PER_MEASURE: usize = 16;
/// Eighth note, halved per step for 16th-note resolution
pub const NOTE_VALUE: f32 = 0.5;
pub const MIN_BPM: f32 = 40.0;
pub const MAX_BPM: f32 = 240.0;

/// Events kept for the UI; once full, newer events are dropped until it polls
const EVENT_BUFFER: usize = 1024;

/// Length of one step: `(60 / bpm) * NOTE_VALUE / 2` seconds
pub fn step_duration(bpm: f32) -> Duration {
    let bpm = bpm.clamp(MIN_BPM, MAX_BPM);
    Duration::from_secs_f32(60.0 / bpm * NOTE_VALUE / 2.0)
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    MeasureStarted { pattern: PatternId },
    StepAdvanced { step: usize, pattern: PatternId },
    Triggered { voice: String, step: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Running,
    Stopped,
}

/// The loop's only suspension point
pub trait Clock: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the playback thread for real
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadClock;

impl Clock for ThreadClock {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Live tempo, read by the loop once per measure
#[derive(Debug)]
pub struct Tempo {
    bits: AtomicU32,
}

impl Tempo {
    pub fn new(bpm: f32) -> Self {
        let tempo = Self {
            bits: AtomicU32::new(0),
        };
        tempo.set_bpm(bpm);
        tempo
    }

    pub fn bpm(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Acquire))
    }

    pub fn set_bpm(&self, bpm: f32) {
        let bpm = if bpm.is_finite() {
            bpm.clamp(MIN_BPM, MAX_BPM)
        } else {
            MIN_BPM
        };
        self.bits.store(bpm.to_bits(), Ordering::Release);
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(120.0)
    }
}

/// Everything the playback thread owns
pub(crate) struct Playhead {
    pub(crate) registry: Arc<Registry>,
    pub(crate) sink: Arc<dyn TriggerSink>,
    pub(crate) selector: PatternSelector,
    pub(crate) tempo: Arc<Tempo>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) events: SyncSender<PlaybackEvent>,
}

impl Playhead {
    /// Play one measure; false once `running` has been cleared
    pub(crate) fn play_measure(&mut self, running: &AtomicBool) -> bool {
        if !running.load(Ordering::Acquire) {
            return false;
        }

        let pattern = self.selector.next();
        let step_len = step_duration(self.tempo.bpm());
        // A grid of separators only has no steps; play it as a silent measure
        let steps = self
            .registry
            .steps_in(&pattern)
            .filter(|n| *n > 0)
            .unwrap_or(STEPS_PER_MEASURE);

        log::debug!(
            "Measure: pattern {} ({} steps of {:?})",
            pattern,
            steps,
            step_len
        );
        self.emit(PlaybackEvent::MeasureStarted {
            pattern: pattern.clone(),
        });

        for step in 0..steps {
            if !running.load(Ordering::Acquire) {
                return false;
            }

            self.emit(PlaybackEvent::StepAdvanced {
                step,
                pattern: pattern.clone(),
            });
            self.fire_step(&pattern, step);

            self.clock.sleep(step_len);
        }

        true
    }

    fn fire_step(&self, pattern: &PatternId, step: usize) {
        for voice in self.registry.voices().iter() {
            if !voice.hits_at(pattern, step) {
                continue;
            }

            // Params are read at fire time so tweaks apply from the next hit
            let params = voice.params();
            match self.sink.trigger(voice.locator(), &params) {
                Ok(()) => self.emit(PlaybackEvent::Triggered {
                    voice: voice.code().to_string(),
                    step,
                }),
                Err(e) => log::warn!("Trigger failed for {}: {}", voice.code(), e),
            }
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        // Nobody polling is fine, drop the event
        let _ = self.events.try_send(event);
    }
}

pub struct PlaybackEngine {
    sender: SyncSender<PlaybackEvent>,
    receiver: Receiver<PlaybackEvent>,
    is_running: Arc<AtomicBool>,
    state: PlaybackState,
    handle: Option<JoinHandle<()>>,
    tempo: Arc<Tempo>,
    clock: Arc<dyn Clock>,
}

impl PlaybackEngine {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(ThreadClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let (sender, receiver) = sync_channel(EVENT_BUFFER);

        Self {
            sender,
            receiver,
            is_running: Arc::new(AtomicBool::new(false)),
            state: PlaybackState::Idle,
            handle: None,
            tempo: Arc::new(Tempo::default()),
            clock,
        }
    }

    pub fn tempo(&self) -> &Arc<Tempo> {
        &self.tempo
    }

    /// Spawn the playback thread. Does nothing if already running.
    pub fn start(
        &mut self,
        registry: Arc<Registry>,
        sink: Arc<dyn TriggerSink>,
        pattern: Vec<PatternId>,
    ) {
        if self.is_running() {
            return;
        }

        self.is_running.store(true, Ordering::Release);

        let mut playhead = Playhead {
            registry,
            sink,
            selector: PatternSelector::new(pattern),
            tempo: Arc::clone(&self.tempo),
            clock: Arc::clone(&self.clock),
            events: self.sender.clone(),
        };
        let is_running = Arc::clone(&self.is_running);

        log::info!(
            "Playback started at {} bpm, patterns {:?}",
            self.tempo.bpm(),
            playhead.selector.sequence()
        );

        self.handle = Some(thread::spawn(move || {
            while playhead.play_measure(&is_running) {}
        }));
        self.state = PlaybackState::Running;
    }

    /// Stop after the current step and wait for the thread to exit
    pub fn stop(&mut self) {
        self.is_running.store(false, Ordering::Release);

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Playback thread panicked");
            }
        }

        if self.state == PlaybackState::Running {
            self.state = PlaybackState::Stopped;
            log::info!("Playback stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn poll_events(&self) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
