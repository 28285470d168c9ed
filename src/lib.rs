/// BEATGRID - a live step sequencer driven by ASCII beat grids
///
/// This library provides the pieces for playing drum patterns written as text:
/// - Beat-grid parsing and merging of single, listed or labelled patterns
/// - A voice registry with per-voice parameters that can be tweaked live
/// - A playback engine that walks 16th-note steps and cycles patterns
/// - Audio preview and MIDI outputs for the triggers

pub mod error;
pub mod grid;
pub mod registry;
pub mod trigger;
pub mod sequencer;
pub mod config;
pub mod audio;
pub mod midi;

// Re-export commonly used types
pub use error::{Error, ParseError, TriggerError};
pub use grid::{merge, parse, BeatSpec, Merged, PatternId};
pub use registry::{Registry, ResourceLocator, SampleDirectory, SampleResolver, TR808_VOICES};
pub use trigger::{Fanout, TriggerSink};
pub use sequencer::Sequencer;
pub use sequencer::playback::{PlaybackEngine, PlaybackEvent, PlaybackState};
pub use config::SessionConfig;
pub use audio::{AudioOutput, AudioSink};
pub use midi::{MidiOutputDevice, midi_note_name};
