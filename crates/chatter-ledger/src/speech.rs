//! The speech buffer.
//!
//! Speech is an ordered list of segments rather than a flat string, so a
//! tracked letter can always be told apart from untracked text regardless
//! of what characters the untracked text contains.

use serde::{Deserialize, Serialize};

/// One unit of speech.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Segment {
    /// A letter taken from the gut; refunded on unspeak/clear.
    Letter(char),
    /// A word break. Costs nothing and refunds nothing.
    Space,
    /// Opaque text not backed by the gut; dropped wholesale, never refunded.
    Untracked(String),
}

/// Ordered sequence of speech segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Speech {
    segments: Vec<Segment>,
}

impl Speech {
    /// Create an empty speech buffer.
    pub const fn new() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Append a segment.
    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    /// Remove and return the last segment.
    pub fn pop(&mut self) -> Option<Segment> {
        self.segments.pop()
    }

    /// Drop every segment, returning them in order.
    pub fn take_all(&mut self) -> Vec<Segment> {
        core::mem::take(&mut self.segments)
    }

    /// The segments in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether there is nothing being said.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of tracked letters currently in speech (spaces excluded).
    pub fn tracked_letters(&self) -> u64 {
        let count = self
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::Letter(_)))
            .count();
        u64::try_from(count).unwrap_or(u64::MAX)
    }

    /// Flatten speech into display text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Letter(c) => out.push(*c),
                Segment::Space => out.push(' '),
                Segment::Untracked(text) => out.push_str(text),
            }
        }
        out
    }
}

impl FromIterator<Segment> for Speech {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn render_interleaves_segments() {
        let speech: Speech = [
            Segment::Letter('h'),
            Segment::Letter('i'),
            Segment::Space,
            Segment::Untracked(String::from("there\0friend")),
        ]
        .into_iter()
        .collect();
        assert_eq!(speech.render(), "hi there\0friend");
        assert_eq!(speech.tracked_letters(), 2);
    }

    #[test]
    fn wire_shape() {
        let speech: Speech = [
            Segment::Letter('a'),
            Segment::Space,
            Segment::Untracked(String::from("ok")),
        ]
        .into_iter()
        .collect();
        let json = serde_json::to_string(&speech).unwrap();
        assert_eq!(json, r#"[{"letter":"a"},"space",{"untracked":"ok"}]"#);
    }
}
