//! The ant ledger and its operation set.
//!
//! [`AntLedger::apply`] is the only way to mutate a ledger. Each act either
//! applies completely or fails with a [`LedgerError`] and leaves the ledger
//! untouched. [`AntLedger::apply_batch`] extends that guarantee to a whole
//! sequence of acts.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::conservation::{self, ConservationResult, LedgerTotals};
use crate::gut::Gut;
use crate::speech::{Segment, Speech};
use crate::LedgerError;

/// A single gut/speech operation.
///
/// On the wire this is an object tagged by `act`, e.g.
/// `{"act": "eat", "letter": "a"}` or `{"act": "unspeak"}`. Unknown tags
/// fail to deserialize, so an unrecognised operation can never reach
/// [`AntLedger::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "act", rename_all = "lowercase")]
pub enum TextAct {
    /// Add one letter to the gut.
    Eat {
        /// The letter eaten.
        letter: char,
    },
    /// Move one letter from the gut to the end of speech.
    Speak {
        /// The letter spoken.
        letter: char,
    },
    /// Append free text to speech.
    Untracked {
        /// The text appended.
        text: String,
    },
    /// Remove the last speech segment, refunding it if it was a letter.
    Unspeak,
    /// Refund every letter in speech and empty it.
    Clear,
    /// Empty speech without refunding anything.
    Destroy,
}

/// An ant's gut, speech and lifetime totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AntLedger {
    gut: Gut,
    speech: Speech,
    totals: LedgerTotals,
}

impl AntLedger {
    /// Create an empty ledger.
    pub const fn new() -> Self {
        Self {
            gut: Gut::new(),
            speech: Speech::new(),
            totals: LedgerTotals::new(),
        }
    }

    /// The letter inventory.
    pub const fn gut(&self) -> &Gut {
        &self.gut
    }

    /// The current speech buffer.
    pub const fn speech(&self) -> &Speech {
        &self.speech
    }

    /// Lifetime counters used by the conservation check.
    pub const fn totals(&self) -> &LedgerTotals {
        &self.totals
    }

    /// Apply one act.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InedibleLetter`] when eating whitespace or a control
    ///   character.
    /// - [`LedgerError::InsufficientLetter`] when speaking a letter the gut
    ///   does not hold.
    /// - [`LedgerError::NothingToUnspeak`] when speech is empty.
    ///
    /// The ledger is unchanged whenever an error is returned.
    pub fn apply(&mut self, act: &TextAct) -> Result<(), LedgerError> {
        match act {
            TextAct::Eat { letter } => self.eat(*letter),
            TextAct::Speak { letter } => self.speak(*letter),
            TextAct::Untracked { text } => {
                self.untracked(text);
                Ok(())
            }
            TextAct::Unspeak => self.unspeak(),
            TextAct::Clear => self.clear(),
            TextAct::Destroy => self.destroy(),
        }
    }

    /// Apply a sequence of acts as one unit.
    ///
    /// The acts run against a copy of the ledger which replaces `self` only
    /// if every act succeeded.
    ///
    /// # Errors
    ///
    /// Returns the first failing act's index and error.
    pub fn apply_batch(&mut self, acts: &[TextAct]) -> Result<(), (usize, LedgerError)> {
        let mut staged = self.clone();
        for (index, act) in acts.iter().enumerate() {
            staged.apply(act).map_err(|e| (index, e))?;
        }
        *self = staged;
        Ok(())
    }

    /// Whether a client's claimed state agrees with this ledger.
    pub fn matches(&self, gut: Option<&Gut>, speech: Option<&Speech>) -> bool {
        gut.is_none_or(|g| *g == self.gut) && speech.is_none_or(|s| *s == self.speech)
    }

    /// Check the conservation law against this ledger's totals.
    pub fn verify_conservation(&self) -> ConservationResult {
        conservation::verify_conservation(&self.gut, &self.speech, &self.totals)
    }

    fn eat(&mut self, letter: char) -> Result<(), LedgerError> {
        if letter.is_whitespace() || letter.is_control() {
            return Err(LedgerError::InedibleLetter(letter));
        }
        let eaten = self.totals.record_eaten()?;
        self.gut.add(letter)?;
        self.totals.eaten = eaten;
        Ok(())
    }

    fn speak(&mut self, letter: char) -> Result<(), LedgerError> {
        if letter.is_whitespace() {
            self.speech.push(Segment::Space);
            return Ok(());
        }
        self.gut.take(letter)?;
        self.speech.push(Segment::Letter(letter));
        Ok(())
    }

    fn untracked(&mut self, text: &str) {
        if text.trim().is_empty() {
            trace!("ignoring whitespace-only untracked text");
            return;
        }
        self.speech.push(Segment::Untracked(text.to_owned()));
    }

    fn unspeak(&mut self) -> Result<(), LedgerError> {
        match self.speech.segments().last() {
            None => Err(LedgerError::NothingToUnspeak),
            Some(Segment::Letter(letter)) => {
                let letter = *letter;
                self.gut.add(letter)?;
                self.speech.pop();
                Ok(())
            }
            Some(Segment::Space | Segment::Untracked(_)) => {
                self.speech.pop();
                Ok(())
            }
        }
    }

    fn clear(&mut self) -> Result<(), LedgerError> {
        let mut refunded = self.gut.clone();
        for segment in self.speech.segments() {
            if let Segment::Letter(letter) = segment {
                refunded.add(*letter)?;
            }
        }
        self.gut = refunded;
        self.speech.take_all();
        Ok(())
    }

    fn destroy(&mut self) -> Result<(), LedgerError> {
        let destroyed = self.totals.record_destroyed(self.speech.tracked_letters())?;
        self.speech.take_all();
        self.totals.destroyed = destroyed;
        Ok(())
    }
}
