//! Lifecycle of a single frontier entry
//!
//! ```text
//! pending -> processing -> completed | failed | skipped
//! failed (retry scheduled) -> processing
//! ```

use std::fmt;

/// Status of a URL queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueStatus {
    /// Admitted and waiting for a worker
    Pending,

    /// Claimed by a worker; no other caller may receive it
    Processing,

    /// Fetched and extracted successfully
    Completed,

    /// Failed; retried while a next-retry time is set, terminal otherwise
    Failed,

    /// Response was not HTML
    Skipped,
}

impl QueueStatus {
    /// Returns true for the statuses a worker can move a claimed entry into
    pub fn is_outcome(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    /// Returns true if the entry may still be handed to a worker
    ///
    /// A failed entry is only claimable again when a retry is scheduled, which
    /// the storage layer checks separately.
    pub fn is_claimable(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }

    /// Checks whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: QueueStatus) -> bool {
        match self {
            Self::Pending => next == Self::Processing,
            Self::Processing => next.is_outcome(),
            Self::Failed => next == Self::Processing,
            Self::Completed | Self::Skipped => false,
        }
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    /// Returns all queue statuses
    pub fn all() -> [Self; 5] {
        [
            Self::Pending,
            Self::Processing,
            Self::Completed,
            Self::Failed,
            Self::Skipped,
        ]
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
