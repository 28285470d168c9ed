/// Sequencer - the public surface a control UI drives
///
/// Owns the voice registry and the playback engine. Beat changes and tweaks
/// go straight to the registry, so they are picked up by a running loop
/// without restarting it.
use std::sync::Arc;

pub mod playback;
pub mod selector;

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::grid::{merge, BeatSpec, PatternId};
use crate::registry::{Registry, SampleDirectory};
use crate::trigger::TriggerSink;
use playback::{Clock, PlaybackEngine, PlaybackEvent, PlaybackState, ThreadClock};

pub use selector::PatternSelector;

pub struct Sequencer {
    registry: Arc<Registry>,
    engine: PlaybackEngine,
    sink: Arc<dyn TriggerSink>,
    pattern: Vec<PatternId>,
}

impl Sequencer {
    /// `registry` should already be initialized
    pub fn new(registry: Arc<Registry>, sink: Arc<dyn TriggerSink>) -> Self {
        Self::with_clock(registry, sink, Arc::new(ThreadClock))
    }

    pub fn with_clock(
        registry: Arc<Registry>,
        sink: Arc<dyn TriggerSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            engine: PlaybackEngine::with_clock(clock),
            sink,
            pattern: vec![PatternId::default()],
        }
    }

    /// Build the registry, tempo and pattern sequence described by `config`
    pub fn setup(config: &SessionConfig, sink: Arc<dyn TriggerSink>) -> Self {
        let resolver = SampleDirectory::new(config.sample_root.clone())
            .with_versions(config.versions.iter().map(|(k, v)| (k, *v)));
        let registry = Registry::new(resolver).with_default_amp(config.default_amp);
        registry.initialize(&config.voices);

        let mut sequencer = Self::new(Arc::new(registry), sink);
        sequencer.set_bpm(config.bpm);
        sequencer.pattern = config.pattern.clone();
        sequencer
    }

    /// [`Sequencer::setup`] plus the start-up beat, if the config has one
    pub fn from_config(config: &SessionConfig, sink: Arc<dyn TriggerSink>) -> Result<Self> {
        let sequencer = Self::setup(config, sink);
        if let Some(beat) = &config.beat {
            sequencer.init_beat(beat.clone())?;
        }
        Ok(sequencer)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Parse and merge a beat, then swap it into the registry.
    ///
    /// On any error the registry is left exactly as it was.
    pub fn init_beat(&self, spec: impl Into<BeatSpec>) -> Result<()> {
        let merged = merge(&spec.into())?;

        if let Some((code, _)) = merged.voices().find(|(code, _)| !self.registry.contains(code)) {
            return Err(Error::UnknownVoice(code.to_string()));
        }

        for (code, pattern, kept) in self.registry.mismatched_lengths(&merged) {
            log::warn!(
                "Voice {} keeps a {}-step grid for pattern {} from an earlier beat",
                code,
                kept,
                pattern
            );
        }

        log::info!(
            "Loaded beat: {} voices, patterns {:?}",
            merged.len(),
            merged.patterns()
        );
        self.registry.replace_hits(merged);
        Ok(())
    }

    /// Start the loop; restarts it, from the first pattern, if already running
    pub fn start_playback<I, P>(&mut self, bpm: f32, pattern: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PatternId>,
    {
        self.pattern = pattern.into_iter().map(Into::into).collect();
        self.set_bpm(bpm);
        self.play();
    }

    /// Start with the last pattern sequence and tempo
    pub fn play(&mut self) {
        if self.engine.is_running() {
            self.engine.stop();
        }
        self.engine.start(
            Arc::clone(&self.registry),
            Arc::clone(&self.sink),
            self.pattern.clone(),
        );
    }

    pub fn stop_playback(&mut self) {
        self.engine.stop();
    }

    /// Set a voice parameter; unknown voices are ignored
    pub fn tweak(&self, voice: &str, param: &str, value: f32) {
        if !self.registry.set_param(voice, param, value) {
            log::warn!("Ignoring tweak of unknown voice {:?}", voice);
        }
    }

    pub fn tweak_many(&self, voice: &str, params: &[(&str, f32)]) {
        for (param, value) in params {
            self.tweak(voice, param, *value);
        }
    }

    /// Like [`Sequencer::tweak`], but reports unknown voices
    pub fn try_tweak(&self, voice: &str, param: &str, value: f32) -> Result<()> {
        if self.registry.set_param(voice, param, value) {
            Ok(())
        } else {
            Err(Error::UnknownVoice(voice.to_string()))
        }
    }

    pub fn bpm(&self) -> f32 {
        self.engine.tempo().bpm()
    }

    /// Takes effect at the next measure
    pub fn set_bpm(&self, bpm: f32) {
        self.engine.tempo().set_bpm(bpm);
    }

    pub fn pattern(&self) -> &[PatternId] {
        &self.pattern
    }

    pub fn state(&self) -> PlaybackState {
        self.engine.state()
    }

    pub fn is_playing(&self) -> bool {
        self.engine.is_running()
    }

    pub fn poll_events(&self) -> Vec<PlaybackEvent> {
        self.engine.poll_events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use crate::registry::{AMP, DEFAULT_AMP, TR808_VOICES};
    use crate::sequencer::playback::tests::ShortClock;
    use crate::trigger::tests::RecordingSink;
    use std::time::{Duration, Instant};

    fn sequencer() -> (Sequencer, Arc<RecordingSink>) {
        let registry = Registry::new(SampleDirectory::new("/samples"));
        registry.initialize(TR808_VOICES);
        let sink = Arc::new(RecordingSink::default());
        let seq = Sequencer::with_clock(
            Arc::new(registry),
            sink.clone(),
            Arc::new(ShortClock),
        );
        (seq, sink)
    }

    #[test]
    fn test_init_beat_loads_hits() {
        let (seq, _) = sequencer();
        seq.init_beat(
            "
            BD x---|----|x---|----
            CH x-x-|x-x-|x-x-|x-x-
            ",
        )
        .unwrap();
        let p0 = PatternId::Index(0);
        let reg = seq.registry();
        assert!(reg.hits_at("BD", &p0, 8));
        assert!(reg.hits_at("ch", &p0, 14));
        assert_eq!(reg.steps_in(&p0), Some(16));
    }

    #[test]
    fn test_bad_beat_leaves_registry_untouched() {
        let (seq, _) = sequencer();
        seq.init_beat("BD x---").unwrap();

        let err = seq.init_beat(vec!["BD -x--", "BD x?x-"]).unwrap_err();
        assert!(matches!(err, Error::Parse(ParseError::InPattern { .. })));

        let reg = seq.registry();
        assert!(reg.hits_at("BD", &PatternId::Index(0), 0));
        assert!(!reg.hits_at("BD", &PatternId::Index(0), 1));
        assert!(!reg.hits_at("BD", &PatternId::Index(1), 0));
    }

    #[test]
    fn test_unknown_voice_in_beat_is_rejected() {
        let (seq, _) = sequencer();
        let err = seq.init_beat("BD x---\nZZ x---").unwrap_err();
        assert!(matches!(err, Error::UnknownVoice(ref code) if code == "ZZ"));
        assert!(!seq.registry().hits_at("BD", &PatternId::Index(0), 0));
    }

    #[test]
    fn test_tweak_is_case_insensitive() {
        let (seq, _) = sequencer();
        seq.tweak("bd", AMP, 2.0);
        assert_eq!(seq.registry().param("BD", AMP), Some(2.0));
        assert_eq!(seq.registry().param("SD", AMP), Some(DEFAULT_AMP));
    }

    #[test]
    fn test_tweak_unknown_voice() {
        let (seq, _) = sequencer();
        seq.tweak("zz", AMP, 2.0);
        assert!(matches!(
            seq.try_tweak("zz", AMP, 2.0),
            Err(Error::UnknownVoice(_))
        ));
        assert!(seq.try_tweak("cp", AMP, 0.5).is_ok());
    }

    #[test]
    fn test_tweak_many() {
        let (seq, _) = sequencer();
        seq.tweak_many("oh", &[(AMP, 0.8), ("rate", 1.2)]);
        let params = seq.registry().params("OH").unwrap();
        assert_eq!(params[AMP], 0.8);
        assert_eq!(params["rate"], 1.2);
    }

    #[test]
    fn test_from_config() {
        let config = SessionConfig::from_json(
            r#"{
                "bpm": 128,
                "pattern": ["A", "B"],
                "voices": ["BD", "SD"],
                "sample_root": "/opt/808",
                "versions": {"SD": 4},
                "default_amp": 1.0,
                "beat": {"A": "BD x---", "B": "SD --x-"}
            }"#,
        )
        .unwrap();
        let seq = Sequencer::from_config(&config, Arc::new(RecordingSink::default())).unwrap();

        assert_eq!(seq.bpm(), 128.0);
        assert_eq!(seq.pattern(), &[PatternId::from("A"), PatternId::from("B")]);
        let reg = seq.registry();
        assert_eq!(reg.voice_codes(), vec!["BD", "SD"]);
        assert_eq!(reg.param("BD", AMP), Some(1.0));
        assert_eq!(reg.voice("SD").unwrap().locator().version, 4);
        assert!(reg.hits_at("SD", &"B".into(), 2));
    }

    #[test]
    fn test_from_config_rejects_bad_beat() {
        let config = SessionConfig {
            beat: Some("BD x-?-".into()),
            ..SessionConfig::default()
        };
        assert!(Sequencer::from_config(&config, Arc::new(RecordingSink::default())).is_err());
    }

    #[test]
    fn test_playback_lifecycle() {
        let (mut seq, sink) = sequencer();
        seq.init_beat(BeatSpec::named([("A", "BD x---"), ("B", "SD x---")]))
            .unwrap();
        assert_eq!(seq.state(), PlaybackState::Idle);

        seq.start_playback(100.0, ["B"]);
        assert_eq!(seq.state(), PlaybackState::Running);
        assert_eq!(seq.bpm(), 100.0);

        let deadline = Instant::now() + Duration::from_secs(5);
        while sink.voices().len() < 3 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        seq.stop_playback();
        assert_eq!(seq.state(), PlaybackState::Stopped);

        let voices = sink.voices();
        assert!(voices.len() >= 3);
        assert!(voices.iter().all(|v| v == "SD"));
    }

    /// Records which playback thread fired each voice
    #[derive(Default)]
    struct ThreadTaggingSink {
        hits: parking_lot::Mutex<Vec<(std::thread::ThreadId, String)>>,
    }

    impl TriggerSink for ThreadTaggingSink {
        fn trigger(
            &self,
            locator: &crate::registry::ResourceLocator,
            _params: &crate::registry::Params,
        ) -> std::result::Result<(), crate::error::TriggerError> {
            self.hits
                .lock()
                .push((std::thread::current().id(), locator.voice.clone()));
            Ok(())
        }
    }

    #[test]
    fn test_restart_begins_at_first_pattern() {
        let registry = Registry::new(SampleDirectory::new("/samples"));
        registry.initialize(TR808_VOICES);
        let sink = Arc::new(ThreadTaggingSink::default());
        let mut seq = Sequencer::with_clock(Arc::new(registry), sink.clone(), Arc::new(ShortClock));
        seq.init_beat(BeatSpec::named([("A", "BD x---"), ("B", "SD x---")]))
            .unwrap();

        seq.start_playback(120.0, ["A", "B"]);
        let deadline = Instant::now() + Duration::from_secs(5);
        while sink.hits.lock().is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        let (first_thread, first_voice) = sink.hits.lock()[0].clone();
        assert_eq!(first_voice, "BD");

        // Pattern A is still sounding; without a fresh cursor B would come next
        seq.start_playback(120.0, ["A", "B"]);
        assert!(seq.is_playing());

        let restarted = |hits: &[(std::thread::ThreadId, String)]| {
            hits.iter()
                .filter(|(id, _)| *id != first_thread)
                .map(|(_, voice)| voice.clone())
                .collect::<Vec<_>>()
        };
        let deadline = Instant::now() + Duration::from_secs(5);
        while restarted(&sink.hits.lock()[..]).len() < 2 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        seq.stop_playback();

        let voices = restarted(&sink.hits.lock()[..]);
        assert_eq!(&voices[..2], &["BD".to_string(), "SD".to_string()]);
    }
}
