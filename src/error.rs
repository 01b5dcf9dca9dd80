use thiserror::Error;

/// Errors surfaced by the round-pairing core to its caller.
///
/// The only case that actually prevents a round from being produced is
/// [`PairingError::Unpairable`]; local infeasibility inside a single bracket
/// is handled internally by collapsing into the next bracket and never
/// reaches this type.
#[derive(Debug, Error)]
pub enum PairingError {
    /// The full roster has no legal pairing at all: the global
    /// [`ValidityOracle`](crate::validity::ValidityOracle) reported
    /// infeasible before bracket iteration began.
    #[error("round {round} cannot be paired: no legal pairing exists for the current roster")]
    Unpairable {
        /// The round number that was being paired.
        round: u32,
    },

    /// A consistency problem in the derived player state that the core
    /// itself observed (duplicate starting number, a forbidden pair naming
    /// an unknown number, an acceleration array longer than the round
    /// count). Malformed results themselves are the parser's concern, not
    /// this crate's.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No non-withdrawn players were supplied; there is nothing to pair.
    #[error("no players to pair")]
    EmptyRoster,
}
