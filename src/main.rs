#[cfg(feature = "gui")]
use eframe::egui;

#[cfg(feature = "gui")]
use std::sync::Arc;

#[cfg(feature = "gui")]
use beatgrid::{
    midi::drum_note, midi_note_name, registry::AMP, AudioOutput, BeatSpec, Fanout,
    MidiOutputDevice, PatternId, PlaybackEvent, Sequencer, SessionConfig,
};

#[cfg(feature = "gui")]
const DEMO_BEAT: &str = "BD x---|----|x-x-|----
SD ----|x---|----|x---
CH x-x-|x-x-|x-x-|x-xx
OH ----|----|----|--x-";

#[cfg(feature = "gui")]
fn main() -> Result<(), eframe::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = SessionConfig::from_env().unwrap_or_else(|e| {
        log::error!("Falling back to default config: {}", e);
        SessionConfig::default()
    });

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 760.0])
            .with_title("BEATGRID - Beat Grid Sequencer"),
        ..Default::default()
    };

    eframe::run_native(
        "BEATGRID",
        options,
        Box::new(move |_cc| Ok(Box::new(BeatgridApp::new(config)))),
    )
}

#[cfg(not(feature = "gui"))]
fn main() {
    eprintln!("This binary requires the 'gui' feature to be enabled");
    std::process::exit(1);
}

/// Beat text is JSON when it looks like a list or a map, grid text otherwise
#[cfg(feature = "gui")]
fn beat_from_text(text: &str) -> Result<BeatSpec, String> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        serde_json::from_str(trimmed).map_err(|e| e.to_string())
    } else {
        Ok(BeatSpec::Single(text.to_string()))
    }
}

#[cfg(feature = "gui")]
fn beat_to_text(beat: &BeatSpec) -> String {
    match beat {
        BeatSpec::Single(text) => text.trim().to_string(),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    }
}

#[cfg(feature = "gui")]
fn pattern_from_text(text: &str) -> Vec<PatternId> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect()
}

#[cfg(feature = "gui")]
struct BeatgridApp {
    sequencer: Sequencer,
    audio_output: AudioOutput,
    midi_output: Arc<MidiOutputDevice>,

    // UI state
    beat_text: String,
    pattern_text: String,
    bpm: f32,
    status: Option<String>,
    available_midi_ports: Vec<String>,
    selected_port: Option<usize>,
    current_step: Option<usize>,
    current_pattern: PatternId,
}

#[cfg(feature = "gui")]
impl BeatgridApp {
    fn new(config: SessionConfig) -> Self {
        let audio_output = AudioOutput::default();
        let midi_output = Arc::new(MidiOutputDevice::new());

        let mut sink = Fanout::new().with(midi_output.clone());
        if audio_output.is_active() {
            sink.push(Arc::new(audio_output.sink()));
        }

        let beat = config
            .beat
            .clone()
            .unwrap_or_else(|| BeatSpec::Single(DEMO_BEAT.to_string()));

        let sequencer = Sequencer::setup(&config, Arc::new(sink));
        let status = sequencer
            .init_beat(beat.clone())
            .err()
            .map(|e| format!("Start-up beat rejected: {}", e));

        Self {
            pattern_text: sequencer
                .pattern()
                .iter()
                .map(PatternId::to_string)
                .collect::<Vec<_>>()
                .join(" "),
            bpm: sequencer.bpm(),
            sequencer,
            audio_output,
            midi_output,
            beat_text: beat_to_text(&beat),
            status,
            available_midi_ports: MidiOutputDevice::available_ports(),
            selected_port: None,
            current_step: None,
            current_pattern: PatternId::default(),
        }
    }

    fn handle_playback_events(&mut self) {
        for event in self.sequencer.poll_events() {
            match event {
                PlaybackEvent::MeasureStarted { pattern } => {
                    self.current_pattern = pattern;
                }
                PlaybackEvent::StepAdvanced { step, .. } => {
                    self.current_step = Some(step);
                }
                PlaybackEvent::Triggered { .. } => {}
            }
        }
    }

    fn load_beat(&mut self) {
        let result = beat_from_text(&self.beat_text)
            .and_then(|beat| self.sequencer.init_beat(beat).map_err(|e| e.to_string()));
        self.status = Some(match result {
            Ok(()) => "Beat loaded".to_string(),
            Err(e) => format!("Beat rejected: {}", e),
        });
    }

    fn start_playback(&mut self) {
        let pattern = pattern_from_text(&self.pattern_text);
        self.sequencer.start_playback(self.bpm, pattern);
    }

    fn stop_playback(&mut self) {
        self.sequencer.stop_playback();
        self.audio_output.silence();
        self.current_step = None;
    }

    fn voice_rows(&self, ui: &mut egui::Ui) {
        let is_playing = self.sequencer.is_playing();
        let registry = Arc::clone(self.sequencer.registry());
        let steps = registry.steps_in(&self.current_pattern).unwrap_or(16);

        egui::Grid::new("voices").striped(true).show(ui, |ui| {
            for voice in registry.voices().iter() {
                let code = voice.code();
                ui.label(code);
                ui.label(drum_note(code).map(midi_note_name).unwrap_or_default());

                let mut amp = voice.param(AMP).unwrap_or_default();
                if ui
                    .add(egui::Slider::new(&mut amp, 0.0..=3.0).text("amp"))
                    .changed()
                {
                    self.sequencer.tweak(code, AMP, amp);
                }

                ui.horizontal(|ui| {
                    for step in 0..steps {
                        let hit = voice.hits_at(&self.current_pattern, step);
                        let is_current = is_playing && self.current_step == Some(step);
                        let fill = if is_current {
                            egui::Color32::from_rgb(100, 200, 100)
                        } else if hit {
                            egui::Color32::from_rgb(60, 60, 200)
                        } else {
                            egui::Color32::from_rgb(40, 40, 40)
                        };
                        let label = if hit { "x" } else { "-" };
                        ui.add(
                            egui::Button::new(label)
                                .min_size(egui::vec2(22.0, 22.0))
                                .fill(fill),
                        );
                        if step % 4 == 3 && step + 1 < steps {
                            ui.separator();
                        }
                    }
                });
                ui.end_row();
            }
        });
    }
}

#[cfg(feature = "gui")]
impl eframe::App for BeatgridApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint();

        self.handle_playback_events();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("BEATGRID - Beat Grid Sequencer");
            ui.add_space(10.0);

            // MIDI Port Selection
            let mut selected_port_changed = None;
            ui.horizontal(|ui| {
                ui.label("MIDI Output:");
                if self.available_midi_ports.is_empty() {
                    ui.label("No MIDI ports available");
                } else {
                    egui::ComboBox::from_label("")
                        .selected_text(
                            self.selected_port
                                .and_then(|i| self.available_midi_ports.get(i))
                                .map(String::as_str)
                                .unwrap_or("Select port..."),
                        )
                        .show_ui(ui, |ui| {
                            for (i, port_name) in self.available_midi_ports.iter().enumerate() {
                                if ui
                                    .selectable_label(self.selected_port == Some(i), port_name)
                                    .clicked()
                                {
                                    selected_port_changed = Some(i);
                                }
                            }
                        });
                }
            });

            if let Some(port_idx) = selected_port_changed {
                match self.midi_output.connect(port_idx) {
                    Ok(()) => self.selected_port = Some(port_idx),
                    Err(e) => self.status = Some(e.to_string()),
                }
            }

            ui.add_space(10.0);

            // Transport controls
            ui.horizontal(|ui| {
                if self.sequencer.is_playing() {
                    if ui.button("⏸ Stop").clicked() {
                        self.stop_playback();
                    }
                } else if ui.button("▶ Play").clicked() {
                    self.start_playback();
                }

                ui.add_space(20.0);

                ui.label("BPM:");
                if ui
                    .add(egui::Slider::new(&mut self.bpm, 40.0..=240.0).step_by(1.0))
                    .changed()
                {
                    self.sequencer.set_bpm(self.bpm);
                }

                ui.add_space(20.0);

                ui.label("Patterns:");
                ui.add(egui::TextEdit::singleline(&mut self.pattern_text).desired_width(160.0));
                if self.sequencer.is_playing() {
                    ui.label(format!("playing {}", self.current_pattern));
                }
            });

            ui.add_space(10.0);

            // Beat editor
            ui.label("Beat grid (text, or JSON list/map of grids):");
            ui.add(
                egui::TextEdit::multiline(&mut self.beat_text)
                    .code_editor()
                    .desired_rows(8)
                    .desired_width(f32::INFINITY),
            );
            ui.horizontal(|ui| {
                if ui.button("Load beat").clicked() {
                    self.load_beat();
                }
                if let Some(status) = &self.status {
                    ui.label(status);
                }
            });

            ui.separator();

            self.voice_rows(ui);

            // Info
            ui.separator();
            ui.label("Edit the grid and press Load beat; changes apply on the next step");
            if !self.midi_output.is_connected() {
                ui.colored_label(
                    egui::Color32::YELLOW,
                    "⚠ No MIDI output connected - audio preview only",
                );
            }
            if !self.audio_output.is_active() {
                ui.colored_label(egui::Color32::YELLOW, "⚠ No audio device available");
            }
        });
    }
}
