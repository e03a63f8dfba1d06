//! Letter ledger for Chatter ant avatars.
//!
//! Every ant carries a *gut* (an inventory of letters it has eaten) and a
//! *speech* buffer (what it is currently saying). Letters move from the gut
//! into speech when spoken and back when unspoken or cleared. Text that was
//! never backed by an eaten letter can also be appended to speech as an
//! *untracked* segment; it is never refunded.
//!
//! # Modules
//!
//! - [`gut`] -- The [`Gut`] letter inventory with checked arithmetic.
//! - [`speech`] -- The [`Speech`] buffer of tagged [`Segment`]s.
//! - [`ledger`] -- [`AntLedger`] and the [`TextAct`] operation set.
//! - [`conservation`] -- Conservation accounting and verification.
//!
//! # Conservation Law
//!
//! For every ledger, at every point in time:
//!
//! ```text
//! gut.total() + speech.tracked_letters() == eaten - destroyed
//! ```
//!
//! where `eaten` counts every successful `eat` and `destroyed` counts the
//! tracked letters discarded by `destroy`. `speak`, `unspeak` and `clear`
//! only move letters between the gut and speech.
//!
//! # Usage
//!
//! ```
//! use chatter_ledger::{AntLedger, TextAct};
//! use chatter_ledger::conservation::ConservationResult;
//!
//! let mut ledger = AntLedger::new();
//! ledger.apply(&TextAct::Eat { letter: 'a' }).ok();
//! ledger.apply(&TextAct::Speak { letter: 'a' }).ok();
//! assert_eq!(ledger.gut().count('a'), 0);
//! assert_eq!(ledger.speech().render(), "a");
//! assert_eq!(ledger.verify_conservation(), ConservationResult::Balanced);
//! ```

pub mod conservation;
pub mod gut;
pub mod ledger;
pub mod speech;

pub use conservation::{ConservationResult, LedgerTotals};
pub use gut::Gut;
pub use ledger::{AntLedger, TextAct};
pub use speech::{Segment, Speech};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when applying a text act to a ledger.
///
/// A failed act never mutates the ledger.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Tried to speak a letter the gut does not hold.
    #[error("cannot speak {letter:?}: gut holds {available}")]
    InsufficientLetter {
        /// The letter that was requested.
        letter: char,
        /// How many of that letter the gut holds.
        available: u32,
    },

    /// Whitespace and control characters cannot be eaten.
    #[error("cannot eat {0:?}")]
    InedibleLetter(char),

    /// `unspeak` on an empty speech buffer.
    #[error("nothing to unspeak")]
    NothingToUnspeak,

    /// A counter would overflow.
    #[error("arithmetic overflow: {context}")]
    ArithmeticOverflow {
        /// What was being computed.
        context: &'static str,
    },
}
