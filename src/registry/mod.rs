/// Voice registry - per-voice parameters and hit data shared with playback
///
/// The registry is read by the playback thread on every step while control
/// code replaces hits and tweaks parameters. Each voice's pattern map sits
/// behind an `ArcSwap` so a replacement is one pointer store, and its
/// parameters behind an `RwLock`.
use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::RwLock;

use crate::grid::{Merged, PatternHits, PatternId};

pub mod resolver;

pub use resolver::{ResourceLocator, SampleDirectory, SampleResolver};

/// Parameter every voice starts with
pub const AMP: &str = "amp";
pub const DEFAULT_AMP: f32 = 1.5;

/// The TR-808 voice set, in registry order
pub const TR808_VOICES: [&str; 16] = [
    "BD", "SD", "LT", "MT", "HT", "LC", "MC", "HC", "RS", "CL", "CP", "MA", "CB", "CY", "OH", "CH",
];

/// Parameter name to value
pub type Params = BTreeMap<String, f32>;

/// Amplitude from a parameter snapshot
pub fn amp_of(params: &Params) -> f32 {
    params.get(AMP).copied().unwrap_or(DEFAULT_AMP)
}

pub struct Voice {
    code: String,
    locator: ResourceLocator,
    params: RwLock<Params>,
    hits: ArcSwap<PatternHits>,
}

impl Voice {
    fn new(code: String, locator: ResourceLocator, default_amp: f32) -> Self {
        let mut params = Params::new();
        params.insert(AMP.to_string(), default_amp);

        Self {
            code,
            locator,
            params: RwLock::new(params),
            hits: ArcSwap::from_pointee(PatternHits::new()),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn locator(&self) -> &ResourceLocator {
        &self.locator
    }

    /// Snapshot of all parameters
    pub fn params(&self) -> Params {
        self.params.read().clone()
    }

    pub fn param(&self, name: &str) -> Option<f32> {
        self.params.read().get(name).copied()
    }

    pub fn set_param(&self, name: &str, value: f32) {
        self.params.write().insert(name.to_string(), value);
    }

    pub fn hits(&self) -> Arc<PatternHits> {
        self.hits.load_full()
    }

    pub fn hits_at(&self, pattern: &PatternId, step: usize) -> bool {
        self.hits
            .load()
            .get(pattern)
            .and_then(|grid| grid.get(step))
            .copied()
            .unwrap_or(false)
    }

    fn replace_hits(&self, hits: PatternHits) {
        self.hits.store(Arc::new(hits));
    }
}

pub struct Registry {
    resolver: Box<dyn SampleResolver>,
    default_amp: f32,
    voices: ArcSwap<Vec<Arc<Voice>>>,
}

impl Registry {
    /// An empty registry; call [`Registry::initialize`] before use
    pub fn new(resolver: impl SampleResolver + 'static) -> Self {
        Self {
            resolver: Box::new(resolver),
            default_amp: DEFAULT_AMP,
            voices: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn with_default_amp(mut self, amp: f32) -> Self {
        self.default_amp = amp;
        self
    }

    /// Reset the table: one voice per code, default parameters, no hits
    pub fn initialize<I, S>(&self, codes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut voices: Vec<Arc<Voice>> = Vec::new();
        for code in codes {
            let code = code.as_ref().trim().to_ascii_uppercase();
            if code.is_empty() || voices.iter().any(|v| v.code == code) {
                continue;
            }
            let locator = self.resolver.resolve(&code);
            voices.push(Arc::new(Voice::new(code, locator, self.default_amp)));
        }

        log::info!("Registry initialized with {} voices", voices.len());
        self.voices.store(Arc::new(voices));
    }

    /// Snapshot of the voice table in initialization order
    pub fn voices(&self) -> Arc<Vec<Arc<Voice>>> {
        self.voices.load_full()
    }

    pub fn voice_codes(&self) -> Vec<String> {
        self.voices.load().iter().map(|v| v.code.clone()).collect()
    }

    /// Case-insensitive lookup
    pub fn voice(&self, code: &str) -> Option<Arc<Voice>> {
        self.voices
            .load()
            .iter()
            .find(|v| v.code.eq_ignore_ascii_case(code.trim()))
            .cloned()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.voice(code).is_some()
    }

    /// Swap the pattern map of every voice named in `merged`.
    ///
    /// Voices not mentioned keep their current hits. Codes the registry does
    /// not know are skipped and returned.
    pub fn replace_hits(&self, merged: Merged) -> Vec<String> {
        let mut unknown = Vec::new();
        for (code, hits) in merged.into_voices() {
            match self.voice(&code) {
                Some(voice) => voice.replace_hits(hits),
                None => unknown.push(code),
            }
        }
        unknown
    }

    pub fn param(&self, code: &str, name: &str) -> Option<f32> {
        self.voice(code).and_then(|v| v.param(name))
    }

    pub fn params(&self, code: &str) -> Option<Params> {
        self.voice(code).map(|v| v.params())
    }

    /// Returns false, changing nothing, when the voice is unknown
    pub fn set_param(&self, code: &str, name: &str, value: f32) -> bool {
        match self.voice(code) {
            Some(voice) => {
                voice.set_param(name, value);
                true
            }
            None => false,
        }
    }

    pub fn hits_at(&self, code: &str, pattern: &PatternId, step: usize) -> bool {
        self.voice(code)
            .map(|v| v.hits_at(pattern, step))
            .unwrap_or(false)
    }

    /// Voices left out of `merged` whose kept grid for one of its patterns
    /// has a different length than the new one
    pub fn mismatched_lengths(&self, merged: &Merged) -> Vec<(String, PatternId, usize)> {
        let mut mismatched = Vec::new();
        for pattern in merged.patterns() {
            let Some(steps) = merged.steps(&pattern) else {
                continue;
            };
            for voice in self.voices.load().iter() {
                if merged.get(&voice.code).is_some() {
                    continue;
                }
                if let Some(kept) = voice.hits.load().get(&pattern).map(Vec::len) {
                    if kept != steps {
                        mismatched.push((voice.code.clone(), pattern.clone(), kept));
                    }
                }
            }
        }
        mismatched
    }

    /// Longest grid any voice holds for `pattern`
    pub fn steps_in(&self, pattern: &PatternId) -> Option<usize> {
        self.voices
            .load()
            .iter()
            .filter_map(|v| v.hits.load().get(pattern).map(Vec::len))
            .max()
    }
}
