/// Beat-grid text notation
///
/// A block of text holds one line per voice:
///
/// ```text
/// BD x---|x---|x---|x---
/// SD ----|x---|----|x---
/// ```
///
/// `x` is a hit, `-` a rest and `|` a visual separator that takes no step.
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

pub mod merge;

pub use merge::{merge, Merged, PatternHits};

/// Uppercase voice identifier such as `BD`
pub type VoiceCode = String;

/// One step per entry, `true` means the voice fires on that step
pub type Hits = Vec<bool>;

/// Key selecting one variant of a voice's hit grid
///
/// All-digit text always names an index, whether it comes from a config
/// file, a labelled beat or the pattern field, so `"1"` and `1` agree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged, from = "RawPatternId")]
pub enum PatternId {
    Index(usize),
    Label(String),
}

impl PatternId {
    fn from_text(text: String) -> Self {
        if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(index) = text.parse() {
                return PatternId::Index(index);
            }
        }
        PatternId::Label(text)
    }
}

/// Wire form: a JSON number or a string
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPatternId {
    Index(usize),
    Text(String),
}

impl From<RawPatternId> for PatternId {
    fn from(raw: RawPatternId) -> Self {
        match raw {
            RawPatternId::Index(index) => PatternId::Index(index),
            RawPatternId::Text(text) => PatternId::from_text(text),
        }
    }
}

impl Default for PatternId {
    fn default() -> Self {
        PatternId::Index(0)
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternId::Index(i) => write!(f, "{}", i),
            PatternId::Label(label) => write!(f, "{}", label),
        }
    }
}

impl FromStr for PatternId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(PatternId::from_text(s.trim().to_string()))
    }
}

impl From<usize> for PatternId {
    fn from(index: usize) -> Self {
        PatternId::Index(index)
    }
}

impl From<&str> for PatternId {
    fn from(text: &str) -> Self {
        PatternId::from_text(text.to_string())
    }
}

impl From<String> for PatternId {
    fn from(text: String) -> Self {
        PatternId::from_text(text)
    }
}

/// Caller input for [`merge`]: one block, an ordered list, or labelled blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BeatSpec {
    Single(String),
    Sequence(Vec<String>),
    Named(BTreeMap<String, String>),
}

impl BeatSpec {
    pub fn named<I, K, V>(blocks: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        BeatSpec::Named(
            blocks
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<&str> for BeatSpec {
    fn from(text: &str) -> Self {
        BeatSpec::Single(text.to_string())
    }
}

impl From<String> for BeatSpec {
    fn from(text: String) -> Self {
        BeatSpec::Single(text)
    }
}

impl From<Vec<String>> for BeatSpec {
    fn from(blocks: Vec<String>) -> Self {
        BeatSpec::Sequence(blocks)
    }
}

impl From<Vec<&str>> for BeatSpec {
    fn from(blocks: Vec<&str>) -> Self {
        BeatSpec::Sequence(blocks.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for BeatSpec {
    fn from(blocks: [&str; N]) -> Self {
        BeatSpec::Sequence(blocks.iter().map(|b| b.to_string()).collect())
    }
}

impl From<BTreeMap<String, String>> for BeatSpec {
    fn from(blocks: BTreeMap<String, String>) -> Self {
        BeatSpec::Named(blocks)
    }
}

/// Parse one text block into a hit sequence per voice.
///
/// Indentation and blank lines are ignored. Voice codes are uppercased. If the
/// same code appears on two lines the later line replaces the earlier one.
pub fn parse(text: &str) -> Result<BTreeMap<VoiceCode, Hits>, ParseError> {
    let mut voices = BTreeMap::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let line_no = index + 1;

        let (code, rest) = line
            .split_once(char::is_whitespace)
            .ok_or(ParseError::MissingHits { line: line_no })?;
        let rest = rest.trim_start();

        let mut tokens = rest.split_whitespace();
        let hits = tokens
            .next()
            .ok_or(ParseError::MissingHits { line: line_no })?;
        if tokens.next().is_some() {
            return Err(ParseError::ExtraTokens { line: line_no });
        }

        // column of the first hit character, 1-based
        let offset = line[..line.len() - rest.len()].chars().count() + 1;
        let hits = parse_hits(hits).map_err(|(pos, found)| ParseError::InvalidHit {
            line: line_no,
            column: offset + pos,
            found,
        })?;

        voices.insert(code.to_ascii_uppercase(), hits);
    }

    Ok(voices)
}

/// Convert a hit string, reporting the char index of the first bad character
fn parse_hits(hits: &str) -> Result<Hits, (usize, char)> {
    hits.chars()
        .enumerate()
        .filter(|(_, c)| *c != '|')
        .map(|(pos, c)| match c {
            'x' => Ok(true),
            '-' => Ok(false),
            other => Err((pos, other)),
        })
        .collect()
}
