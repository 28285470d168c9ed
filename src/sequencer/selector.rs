use crate::grid::PatternId;

/// Cycles through the pattern ids to play, one per measure
#[derive(Debug, Clone)]
pub struct PatternSelector {
    sequence: Vec<PatternId>,
    cursor: usize,
}

impl PatternSelector {
    /// An empty sequence falls back to `[0]`
    pub fn new(sequence: Vec<PatternId>) -> Self {
        let sequence = if sequence.is_empty() {
            vec![PatternId::default()]
        } else {
            sequence
        };
        Self {
            sequence,
            cursor: 0,
        }
    }

    pub fn sequence(&self) -> &[PatternId] {
        &self.sequence
    }

    /// The id for this measure; wraps after the last entry
    pub fn next(&mut self) -> PatternId {
        let id = self.sequence[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.sequence.len();
        id
    }
}

impl Default for PatternSelector {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
