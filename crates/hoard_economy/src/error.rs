//! # Treasure Error Types
//!
//! All errors that can occur while generating or distributing treasure.
//!
//! Errors fall in two classes. Recoverable errors are logged where they occur
//! and the caller continues with a smaller result; they never cross a
//! component boundary. Fatal errors abort the whole call and nothing built
//! during that call is observable afterwards.

use thiserror::Error;

/// Errors that can occur in the treasure engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreasureError {
    /// The requested (treasure type, difficulty band) has no probability table.
    #[error("no treasure table for {kind} treasure at band {band}")]
    TableNotFound {
        /// Treasure type label.
        kind: String,
        /// Difficulty band label.
        band: String,
    },

    /// A reward clause matched none of the grammar patterns.
    #[error("unrecognized reward expression: '{0}'")]
    UnrecognizedExpression(String),

    /// A reward clause has neither an explicit currency/category nor a default.
    #[error("no currency or category for reward expression: '{0}'")]
    MissingCategory(String),

    /// Weighted sampling over a set whose weights sum to zero.
    #[error("cannot sample from empty distribution: {0}")]
    EmptyDistribution(String),

    /// A gem or art value below the lowest tier of its ladder.
    #[error("no {kind} tier at or below {value} gp")]
    TierNotFound {
        /// "gems" or "art objects".
        kind: String,
        /// Requested value per item in gp.
        value: u64,
    },

    /// Reference data failed validation at load time.
    #[error("reference data integrity: {0}")]
    DataIntegrity(String),

    /// Dice that cannot be rolled (zero sides or an absurd count).
    #[error("invalid dice: {count}d{sides}")]
    InvalidDice {
        /// Number of dice.
        count: u64,
        /// Sides per die.
        sides: u64,
    },

    /// The party handed to the distribution engine is unusable.
    #[error("invalid party: {0}")]
    InvalidParty(String),

    /// Arithmetic overflow in a coin or value calculation.
    #[error("arithmetic overflow in economic calculation")]
    ArithmeticOverflow,

    /// Invalid engine configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TreasureError {
    /// Whether the condition is swallowed (logged) at the component boundary
    /// rather than aborting the enclosing call.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnrecognizedExpression(_) | Self::MissingCategory(_) | Self::TierNotFound { .. }
        )
    }
}

/// Result type for treasure operations.
pub type TreasureResult<T> = Result<T, TreasureError>;
