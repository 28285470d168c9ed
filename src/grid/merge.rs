/// Combines parsed blocks into one pattern map per voice
use std::collections::{BTreeMap, BTreeSet};

use super::{parse, BeatSpec, Hits, PatternId, VoiceCode};
use crate::error::ParseError;

/// Hit grids of a single voice, keyed by pattern
pub type PatternHits = BTreeMap<PatternId, Hits>;

/// Result of merging a [`BeatSpec`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Merged {
    voices: BTreeMap<VoiceCode, PatternHits>,
}

impl Merged {
    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn get(&self, voice: &str) -> Option<&PatternHits> {
        self.voices.get(voice)
    }

    pub fn hits(&self, voice: &str, pattern: &PatternId) -> Option<&[bool]> {
        self.voices
            .get(voice)
            .and_then(|patterns| patterns.get(pattern))
            .map(Vec::as_slice)
    }

    pub fn voices(&self) -> impl Iterator<Item = (&str, &PatternHits)> {
        self.voices.iter().map(|(code, hits)| (code.as_str(), hits))
    }

    /// Every pattern id any voice declares
    pub fn patterns(&self) -> BTreeSet<PatternId> {
        self.voices
            .values()
            .flat_map(|patterns| patterns.keys().cloned())
            .collect()
    }

    /// Grid length of a pattern, if any voice declares it
    pub fn steps(&self, pattern: &PatternId) -> Option<usize> {
        self.voices
            .values()
            .filter_map(|patterns| patterns.get(pattern))
            .map(Vec::len)
            .max()
    }

    pub fn into_voices(self) -> BTreeMap<VoiceCode, PatternHits> {
        self.voices
    }

    fn insert_block(&mut self, pattern: PatternId, text: &str) -> Result<(), ParseError> {
        let block = parse(text).map_err(|source| ParseError::InPattern {
            pattern: pattern.clone(),
            source: Box::new(source),
        })?;

        let mut lengths = block.iter().map(|(code, hits)| (code, hits.len()));
        if let Some((_, expected)) = lengths.next() {
            if let Some((voice, found)) = lengths.find(|(_, len)| *len != expected) {
                return Err(ParseError::LengthMismatch {
                    pattern,
                    voice: voice.clone(),
                    expected,
                    found,
                });
            }
        }

        for (code, hits) in block {
            self.voices
                .entry(code)
                .or_default()
                .insert(pattern.clone(), hits);
        }
        Ok(())
    }
}

/// Merge a beat into per-voice pattern maps.
///
/// Nothing is returned unless every block parses, so callers can apply the
/// result wholesale.
pub fn merge(spec: &BeatSpec) -> Result<Merged, ParseError> {
    let mut merged = Merged::default();

    match spec {
        BeatSpec::Single(text) => merged.insert_block(PatternId::Index(0), text)?,
        BeatSpec::Sequence(blocks) => {
            for (i, text) in blocks.iter().enumerate() {
                merged.insert_block(PatternId::Index(i), text)?;
            }
        }
        BeatSpec::Named(blocks) => {
            for (label, text) in blocks {
                merged.insert_block(PatternId::from(label.as_str()), text)?;
            }
        }
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: bool = true;
    const F: bool = false;

    #[test]
    fn test_merge_single_block() {
        let merged = merge(&"BD x---\nSD --x-".into()).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.hits("BD", &PatternId::Index(0)), Some(&[T, F, F, F][..]));
        assert_eq!(merged.patterns().len(), 1);
    }

    #[test]
    fn test_merge_sequence() {
        let merged = merge(&vec!["BD x---", "BD --x-"].into()).unwrap();
        let bd = merged.get("BD").unwrap();
        assert_eq!(bd.len(), 2);
        assert_eq!(bd[&PatternId::Index(0)], vec![T, F, F, F]);
        assert_eq!(bd[&PatternId::Index(1)], vec![F, F, T, F]);
    }

    #[test]
    fn test_merge_named() {
        let merged = merge(&BeatSpec::named([("A", "BD x---"), ("B", "BD --x-")])).unwrap();
        assert_eq!(merged.hits("BD", &"A".into()), Some(&[T, F, F, F][..]));
        assert_eq!(merged.hits("BD", &"B".into()), Some(&[F, F, T, F][..]));
        assert_eq!(merged.hits("BD", &PatternId::Index(0)), None);
    }

    #[test]
    fn test_merge_named_digit_labels_are_indices() {
        let merged = merge(&BeatSpec::named([("0", "BD x---"), ("1", "BD --x-")])).unwrap();
        assert_eq!(merged.hits("BD", &PatternId::Index(0)), Some(&[T, F, F, F][..]));
        assert_eq!(merged.hits("BD", &"1".parse().unwrap()), Some(&[F, F, T, F][..]));
        assert_eq!(merged.hits("BD", &PatternId::Label("1".into())), None);
    }

    #[test]
    fn test_merge_missing_voice_gets_no_silent_entry() {
        let merged = merge(&vec!["BD x---\nSD --x-", "BD x-x-"].into()).unwrap();
        let sd = merged.get("SD").unwrap();
        assert_eq!(sd.len(), 1);
        assert!(sd.contains_key(&PatternId::Index(0)));
        assert_eq!(merged.get("BD").unwrap().len(), 2);
    }

    #[test]
    fn test_merge_failure_names_pattern() {
        let err = merge(&vec!["BD x---", "BD x?--"].into()).unwrap_err();
        match err {
            ParseError::InPattern { pattern, source } => {
                assert_eq!(pattern, PatternId::Index(1));
                assert!(matches!(*source, ParseError::InvalidHit { found: '?', .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_merge_rejects_uneven_pattern() {
        let err = merge(&"BD x---\nSD x-".into()).unwrap_err();
        assert!(matches!(
            err,
            ParseError::LengthMismatch {
                expected: 4,
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_steps_per_pattern() {
        let merged = merge(&vec!["BD x---|x---|x---|x---", "BD x-x-x-x-"].into()).unwrap();
        assert_eq!(merged.steps(&PatternId::Index(0)), Some(16));
        assert_eq!(merged.steps(&PatternId::Index(1)), Some(8));
        assert_eq!(merged.steps(&PatternId::Index(2)), None);
    }
}
