/// Maps voice codes to their sample location
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Sample variant used when a voice has no override
pub const DEFAULT_VERSION: usize = 1;

/// Opaque handle telling a trigger sink what to play
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceLocator {
    /// Voice code this locator was resolved for
    pub voice: String,
    /// Directory holding the voice's sample files
    pub path: PathBuf,
    /// Which file variant inside `path` to use
    pub version: usize,
}

pub trait SampleResolver: Send + Sync {
    fn resolve(&self, voice: &str) -> ResourceLocator;
}

/// One sub-directory per voice under a shared root: `<root>/<CODE>`
#[derive(Debug, Clone)]
pub struct SampleDirectory {
    root: PathBuf,
    versions: HashMap<String, usize>,
}

impl SampleDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            versions: HashMap::new(),
        }
    }

    pub fn with_version(mut self, voice: &str, version: usize) -> Self {
        self.versions.insert(voice.to_ascii_uppercase(), version);
        self
    }

    pub fn with_versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: AsRef<str>,
    {
        for (voice, version) in versions {
            self = self.with_version(voice.as_ref(), version);
        }
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SampleResolver for SampleDirectory {
    fn resolve(&self, voice: &str) -> ResourceLocator {
        let voice = voice.to_ascii_uppercase();
        ResourceLocator {
            path: self.root.join(&voice),
            version: self
                .versions
                .get(&voice)
                .copied()
                .unwrap_or(DEFAULT_VERSION),
            voice,
        }
    }
}
