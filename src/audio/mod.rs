/// Audio preview output using cpal
///
/// Plays a short synthesized hit per trigger so a beat can be auditioned
/// without a sampler. `cpal::Stream` must stay on the thread that built it,
/// so the playback thread talks to the mixer through an [`AudioSink`].
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::TriggerError;
use crate::registry::{amp_of, Params, ResourceLocator, DEFAULT_AMP};
use crate::trigger::TriggerSink;

const MAX_ACTIVE_HITS: usize = 32;
/// Output level of a hit at the default amp
const OUTPUT_GAIN: f32 = 0.2;

/// Synthesis recipe for one voice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency: f32,
    /// Seconds until the hit is inaudible
    pub decay: f32,
    /// 0.0 pure sine, 1.0 pure noise
    pub noise: f32,
}

impl Tone {
    const fn new(frequency: f32, decay: f32, noise: f32) -> Self {
        Self {
            frequency,
            decay,
            noise,
        }
    }
}

pub fn tone_for(voice: &str) -> Tone {
    match voice {
        "BD" => Tone::new(55.0, 0.45, 0.0),
        "SD" => Tone::new(180.0, 0.2, 0.7),
        "LT" => Tone::new(80.0, 0.35, 0.05),
        "MT" => Tone::new(120.0, 0.3, 0.05),
        "HT" => Tone::new(165.0, 0.25, 0.05),
        "LC" => Tone::new(220.0, 0.25, 0.0),
        "MC" => Tone::new(310.0, 0.2, 0.0),
        "HC" => Tone::new(450.0, 0.18, 0.0),
        "RS" => Tone::new(1700.0, 0.03, 0.2),
        "CL" => Tone::new(2500.0, 0.05, 0.0),
        "CP" => Tone::new(1000.0, 0.12, 0.9),
        "MA" => Tone::new(5000.0, 0.05, 1.0),
        "CB" => Tone::new(560.0, 0.25, 0.0),
        "CY" => Tone::new(6000.0, 0.9, 0.95),
        "OH" => Tone::new(7000.0, 0.45, 1.0),
        "CH" => Tone::new(7000.0, 0.06, 1.0),
        _ => Tone::new(440.0, 0.15, 0.0),
    }
}

struct Hit {
    tone: Tone,
    gain: f32,
    phase: f32,
    age: usize,
}

impl Hit {
    fn new(tone: Tone, gain: f32) -> Self {
        Self {
            tone,
            gain,
            phase: 0.0,
            age: 0,
        }
    }

    /// `None` once the hit has decayed
    fn next_sample(&mut self, sample_rate: f32) -> Option<f32> {
        let t = self.age as f32 / sample_rate;
        if t >= self.tone.decay {
            return None;
        }
        self.age += 1;

        let envelope = (-5.0 * t / self.tone.decay).exp();
        let sine = (self.phase * std::f32::consts::TAU).sin();
        let noise = fastrand::f32() * 2.0 - 1.0;
        self.phase += self.tone.frequency / sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        let raw = sine * (1.0 - self.tone.noise) + noise * self.tone.noise;
        Some(raw * envelope * self.gain)
    }
}

/// Mix active hits into an interleaved buffer, dropping finished ones
fn render(hits: &mut Vec<Hit>, data: &mut [f32], channels: usize, sample_rate: f32) {
    for frame in data.chunks_mut(channels.max(1)) {
        let mut mixed = 0.0;
        hits.retain_mut(|hit| match hit.next_sample(sample_rate) {
            Some(s) => {
                mixed += s;
                true
            }
            None => false,
        });
        let mixed = mixed.clamp(-1.0, 1.0);
        for sample in frame.iter_mut() {
            *sample = mixed;
        }
    }
}

pub struct AudioOutput {
    stream: Option<cpal::Stream>,
    hits: Arc<Mutex<Vec<Hit>>>,
}

impl AudioOutput {
    /// `None` when there is no usable output device
    pub fn new() -> Option<Self> {
        let hits = Arc::new(Mutex::new(Vec::with_capacity(MAX_ACTIVE_HITS)));
        let stream = Self::setup_audio_stream(Arc::clone(&hits))?;

        Some(Self {
            stream: Some(stream),
            hits,
        })
    }

    fn setup_audio_stream(hits: Arc<Mutex<Vec<Hit>>>) -> Option<cpal::Stream> {
        let host = cpal::default_host();
        let device = host.default_output_device()?;
        let config = device.default_output_config().ok()?;

        let sample_rate = config.sample_rate().0 as f32;
        let channels = config.channels() as usize;

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    render(&mut hits.lock(), data, channels, sample_rate);
                },
                |err| log::error!("Audio stream error: {}", err),
                None,
            ),
            other => {
                log::warn!("Unsupported output sample format {:?}", other);
                return None;
            }
        };

        match stream {
            Ok(stream) => {
                if let Err(e) = stream.play() {
                    log::error!("Failed to start audio stream: {}", e);
                    return None;
                }
                log::info!("Audio preview at {} Hz, {} channels", sample_rate, channels);
                Some(stream)
            }
            Err(e) => {
                log::error!("Failed to build audio stream: {}", e);
                None
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    /// Handle the playback thread can trigger through
    pub fn sink(&self) -> AudioSink {
        AudioSink {
            hits: Arc::clone(&self.hits),
            connected: self.is_active(),
        }
    }

    /// Cut every ringing hit
    pub fn silence(&self) {
        self.hits.lock().clear();
    }
}

impl Default for AudioOutput {
    fn default() -> Self {
        Self::new().unwrap_or_else(|| Self {
            stream: None,
            hits: Arc::new(Mutex::new(Vec::new())),
        })
    }
}

#[derive(Clone)]
pub struct AudioSink {
    hits: Arc<Mutex<Vec<Hit>>>,
    connected: bool,
}

impl TriggerSink for AudioSink {
    fn trigger(&self, locator: &ResourceLocator, params: &Params) -> Result<(), TriggerError> {
        if !self.connected {
            return Err(TriggerError::NotConnected);
        }

        let gain = amp_of(params).max(0.0) / DEFAULT_AMP * OUTPUT_GAIN;
        let mut hits = self.hits.lock();
        if hits.len() >= MAX_ACTIVE_HITS {
            hits.remove(0);
        }
        hits.push(Hit::new(tone_for(&locator.voice), gain));
        Ok(())
    }
}
