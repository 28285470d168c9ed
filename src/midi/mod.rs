/// MIDI output using midir
///
/// Each trigger becomes a note-on on the General MIDI drum channel followed
/// by a note-off after `NOTE_LENGTH`.
use midir::{MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::TriggerError;
use crate::registry::{amp_of, Params, ResourceLocator};
use crate::trigger::TriggerSink;

const CLIENT_NAME: &str = "BEATGRID MIDI Output";
/// Channel 10, zero-based
const DRUM_CHANNEL: u8 = 9;
const NOTE_LENGTH: Duration = Duration::from_millis(50);
/// Amp mapped to full velocity
const FULL_VELOCITY_AMP: f32 = 2.0;

/// General MIDI percussion note for a TR-808 voice code
pub fn drum_note(voice: &str) -> Option<u8> {
    let note = match voice {
        "BD" => 36,
        "RS" => 37,
        "SD" => 38,
        "CP" => 39,
        "LT" => 41,
        "CH" => 42,
        "MT" => 45,
        "OH" => 46,
        "HT" => 48,
        "CY" => 49,
        "CB" => 56,
        "HC" => 62,
        "MC" => 63,
        "LC" => 64,
        "MA" => 70,
        "CL" => 75,
        _ => return None,
    };
    Some(note)
}

/// `amp` to MIDI velocity; 0 means "don't send"
pub fn velocity(amp: f32) -> u8 {
    (amp / FULL_VELOCITY_AMP * 127.0).round().clamp(0.0, 127.0) as u8
}

pub struct MidiOutputDevice {
    connection: Arc<Mutex<Option<MidiOutputConnection>>>,
}

impl MidiOutputDevice {
    pub fn new() -> Self {
        Self {
            connection: Arc::new(Mutex::new(None)),
        }
    }

    pub fn available_ports() -> Vec<String> {
        if let Ok(midi_out) = MidiOutput::new(CLIENT_NAME) {
            midi_out
                .ports()
                .iter()
                .filter_map(|p| midi_out.port_name(p).ok())
                .collect()
        } else {
            vec![]
        }
    }

    pub fn connect(&self, port_index: usize) -> Result<(), TriggerError> {
        let midi_out = MidiOutput::new(CLIENT_NAME)
            .map_err(|e| TriggerError::Midi(format!("failed to create output: {}", e)))?;

        let ports = midi_out.ports();
        let port = ports
            .get(port_index)
            .ok_or_else(|| TriggerError::Midi(format!("invalid port index {}", port_index)))?;
        let name = midi_out.port_name(port).unwrap_or_default();

        let connection = midi_out
            .connect(port, "beatgrid")
            .map_err(|e| TriggerError::Midi(format!("failed to connect: {}", e)))?;

        *self.connection.lock() = Some(connection);
        log::info!("MIDI output connected to {:?}", name);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.lock().is_some()
    }

    pub fn disconnect(&self) {
        if self.connection.lock().take().is_some() {
            log::info!("MIDI output disconnected");
        }
    }

    fn send(
        connection: &Mutex<Option<MidiOutputConnection>>,
        message: &[u8],
    ) -> Result<(), TriggerError> {
        match connection.lock().as_mut() {
            Some(conn) => conn
                .send(message)
                .map_err(|e| TriggerError::Midi(format!("send failed: {}", e))),
            None => Ok(()),
        }
    }

    pub fn send_note_on(&self, note: u8, velocity: u8) -> Result<(), TriggerError> {
        Self::send(&self.connection, &[0x90 | DRUM_CHANNEL, note, velocity])
    }

    pub fn send_note_off(&self, note: u8) -> Result<(), TriggerError> {
        Self::send(&self.connection, &[0x80 | DRUM_CHANNEL, note, 0])
    }
}

impl Default for MidiOutputDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerSink for MidiOutputDevice {
    /// Unconnected devices swallow triggers, like the send_* methods
    fn trigger(&self, locator: &ResourceLocator, params: &Params) -> Result<(), TriggerError> {
        let note = drum_note(&locator.voice).ok_or_else(|| {
            TriggerError::Midi(format!("no drum note for voice {}", locator.voice))
        })?;
        let velocity = velocity(amp_of(params));
        if velocity == 0 || !self.is_connected() {
            return Ok(());
        }

        self.send_note_on(note, velocity)?;

        // Schedule note off
        let connection = Arc::clone(&self.connection);
        thread::spawn(move || {
            thread::sleep(NOTE_LENGTH);
            if let Err(e) = Self::send(&connection, &[0x80 | DRUM_CHANNEL, note, 0]) {
                log::warn!("Note off for {} failed: {}", note, e);
            }
        });
        Ok(())
    }
}

pub fn midi_note_name(note: u8) -> String {
    let note_names = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    let octave = (note / 12) as i32 - 1;
    let note_index = (note % 12) as usize;
    format!("{}{}", note_names[note_index], octave)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{AMP, TR808_VOICES};
    use crate::trigger::tests::locator;

    #[test]
    fn test_every_tr808_voice_has_a_drum_note() {
        let mut notes: Vec<u8> = TR808_VOICES.iter().filter_map(|v| drum_note(v)).collect();
        assert_eq!(notes.len(), TR808_VOICES.len());
        notes.sort_unstable();
        notes.dedup();
        assert_eq!(notes.len(), TR808_VOICES.len());
        assert_eq!(drum_note("ZZ"), None);
    }

    #[test]
    fn test_velocity() {
        assert_eq!(velocity(2.0), 127);
        assert_eq!(velocity(1.5), 95);
        assert_eq!(velocity(0.0), 0);
        assert_eq!(velocity(10.0), 127);
        assert_eq!(velocity(-1.0), 0);
    }

    #[test]
    fn test_unconnected_trigger_is_silent() {
        let device = MidiOutputDevice::new();
        let mut params = Params::new();
        params.insert(AMP.to_string(), 1.5);
        assert!(device.trigger(&locator("BD"), &params).is_ok());
        assert!(matches!(
            device.trigger(&locator("ZZ"), &params),
            Err(TriggerError::Midi(_))
        ));
    }

    #[test]
    fn test_midi_note_name() {
        assert_eq!(midi_note_name(36), "C1");
        assert_eq!(midi_note_name(42), "F#1");
    }
}
