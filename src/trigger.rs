/// Trigger sinks - where the playback loop hands off each hit
use std::sync::Arc;

use crate::error::TriggerError;
use crate::registry::{Params, ResourceLocator};

/// Receives one call per voice hit.
///
/// Called from the playback thread, so implementations must return quickly
/// and leave the actual sound output to another thread or device.
pub trait TriggerSink: Send + Sync {
    fn trigger(&self, locator: &ResourceLocator, params: &Params) -> Result<(), TriggerError>;
}

impl<T: TriggerSink + ?Sized> TriggerSink for Arc<T> {
    fn trigger(&self, locator: &ResourceLocator, params: &Params) -> Result<(), TriggerError> {
        (**self).trigger(locator, params)
    }
}

impl<T: TriggerSink + ?Sized> TriggerSink for Box<T> {
    fn trigger(&self, locator: &ResourceLocator, params: &Params) -> Result<(), TriggerError> {
        (**self).trigger(locator, params)
    }
}

/// Sends every hit to several sinks, e.g. audio preview and MIDI together
#[derive(Default, Clone)]
pub struct Fanout {
    sinks: Vec<Arc<dyn TriggerSink>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn TriggerSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn push(&mut self, sink: Arc<dyn TriggerSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl TriggerSink for Fanout {
    /// Every sink is called even if an earlier one fails; the first error wins
    fn trigger(&self, locator: &ResourceLocator, params: &Params) -> Result<(), TriggerError> {
        let mut result = Ok(());
        for sink in &self.sinks {
            if let Err(e) = sink.trigger(locator, params) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::path::PathBuf;

    /// Records every trigger it receives
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub hits: Mutex<Vec<(String, Params)>>,
        pub fail: bool,
    }

    impl RecordingSink {
        pub fn failing() -> Self {
            Self {
                hits: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub fn voices(&self) -> Vec<String> {
            self.hits.lock().iter().map(|(v, _)| v.clone()).collect()
        }
    }

    impl TriggerSink for RecordingSink {
        fn trigger(&self, locator: &ResourceLocator, params: &Params) -> Result<(), TriggerError> {
            self.hits.lock().push((locator.voice.clone(), params.clone()));
            if self.fail {
                Err(TriggerError::Audio("boom".into()))
            } else {
                Ok(())
            }
        }
    }

    pub(crate) fn locator(voice: &str) -> ResourceLocator {
        ResourceLocator {
            voice: voice.to_string(),
            path: PathBuf::from("/samples").join(voice),
            version: 1,
        }
    }

    #[test]
    fn test_fanout_calls_every_sink() {
        let a = Arc::new(RecordingSink::failing());
        let b = Arc::new(RecordingSink::default());
        let fanout = Fanout::new().with(a.clone()).with(b.clone());

        let result = fanout.trigger(&locator("BD"), &Params::new());
        assert_eq!(result, Err(TriggerError::Audio("boom".into())));
        assert_eq!(a.voices(), vec!["BD"]);
        assert_eq!(b.voices(), vec!["BD"]);
    }

    #[test]
    fn test_empty_fanout_is_ok() {
        assert!(Fanout::new().trigger(&locator("SD"), &Params::new()).is_ok());
    }
}
