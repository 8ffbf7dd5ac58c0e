//! Batch verification engines.
//!
//! All four run modes are single-threaded and batch-sequential: each work
//! item is fully drained before the next is requested. The only blocking
//! operations are store fetches, comparator invocations, and paced sink
//! writes.

mod canonicals;
mod crosscheck;
mod members;
mod spacegroups;

pub use canonicals::{CanonicalCheckSummary, CanonicalChecker};
pub use crosscheck::{CrossCheckOptions, CrossCheckSummary, CrossChecker};
pub use members::{GroupMemberChecker, MemberCheckSummary};
pub use spacegroups::{CrystalSystem, SpacegroupAuditSummary, SpacegroupAuditor, crystal_system};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation checked between batches and between pairs.
/// Long runs over large stores can be stopped without killing the process
/// mid-write.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::CancelToken;

    #[test]
    fn cancel_token_is_shared_across_clones() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
    }
}
