//! Status codes exchanged across the pull-loop boundary.
//!
//! Status flows upstream-to-downstream as the result of every pull: the iterator
//! reports a [`NextStatus`] to its consumer, and a sink reports a [`ConsumeStatus`]
//! to the graph. The two sets map 1:1.

use std::fmt;

/// Outcome of one `next()` call on a message iterator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NextStatus {
    /// A non-empty batch of messages was produced
    Ok,
    /// The upstream stream is exhausted
    End,
    /// No data right now, retry later
    Again,
    /// Allocation failure while producing the batch
    MemoryError,
    /// Any other failure
    Error,
}

/// Outcome of one `consume()` call on a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsumeStatus {
    /// Progress was made
    Ok,
    /// The sink is done and released its iterator
    End,
    /// No progress was possible, retry later
    Again,
    /// Allocation failure
    MemoryError,
    /// Any other failure
    Error,
}

impl ConsumeStatus {
    /// Whether the sink must not be consumed again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ConsumeStatus::Ok | ConsumeStatus::Again)
    }

    /// Whether the status aborts the whole run.
    pub fn is_fatal(self) -> bool {
        matches!(self, ConsumeStatus::MemoryError | ConsumeStatus::Error)
    }
}

impl From<NextStatus> for ConsumeStatus {
    fn from(status: NextStatus) -> Self {
        match status {
            NextStatus::Ok => ConsumeStatus::Ok,
            NextStatus::End => ConsumeStatus::End,
            NextStatus::Again => ConsumeStatus::Again,
            NextStatus::MemoryError => ConsumeStatus::MemoryError,
            NextStatus::Error => ConsumeStatus::Error,
        }
    }
}

impl fmt::Display for NextStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NextStatus::Ok => "OK",
            NextStatus::End => "END",
            NextStatus::Again => "AGAIN",
            NextStatus::MemoryError => "MEMORY_ERROR",
            NextStatus::Error => "ERROR",
        })
    }
}

impl fmt::Display for ConsumeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&NextStatus::from(*self), f)
    }
}

impl From<ConsumeStatus> for NextStatus {
    fn from(status: ConsumeStatus) -> Self {
        match status {
            ConsumeStatus::Ok => NextStatus::Ok,
            ConsumeStatus::End => NextStatus::End,
            ConsumeStatus::Again => NextStatus::Again,
            ConsumeStatus::MemoryError => NextStatus::MemoryError,
            ConsumeStatus::Error => NextStatus::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_to_consume_mapping_is_one_to_one() {
        let all = [
            NextStatus::Ok,
            NextStatus::End,
            NextStatus::Again,
            NextStatus::MemoryError,
            NextStatus::Error,
        ];
        for status in all {
            assert_eq!(NextStatus::from(ConsumeStatus::from(status)), status);
            assert_eq!(ConsumeStatus::from(status).to_string(), status.to_string());
        }
    }

    #[test]
    fn terminal_and_fatal_classification() {
        assert!(!ConsumeStatus::Ok.is_terminal());
        assert!(!ConsumeStatus::Again.is_terminal());
        assert!(ConsumeStatus::End.is_terminal());
        assert!(!ConsumeStatus::End.is_fatal());
        assert!(ConsumeStatus::Error.is_fatal());
        assert!(ConsumeStatus::MemoryError.is_fatal());
    }
}
