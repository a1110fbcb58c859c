use crate::error::{WorkspaceError, WorkspaceResult};
use std::sync::atomic::{AtomicBool, Ordering};

/// Single-flight lock around document saves.
///
/// At most one [`SavePermit`] exists at a time. While it is alive, saves
/// and navigation (open, create, delete) are rejected rather than queued.
#[derive(Debug, Default)]
pub struct SaveGuard {
    busy: AtomicBool,
}

/// Proof that the caller owns the guard. Dropping it releases the guard,
/// whether the save finished, failed, or its future was dropped.
#[derive(Debug)]
#[must_use = "the guard is released as soon as the permit is dropped"]
pub struct SavePermit<'a> {
    guard: &'a SaveGuard,
}

impl SaveGuard {
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn try_acquire(&self) -> Option<SavePermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SavePermit { guard: self })
    }

    /// Rejects a navigation intent while a save is outstanding.
    pub fn check_navigation(&self) -> WorkspaceResult<()> {
        if self.is_busy() {
            Err(WorkspaceError::SaveInProgress)
        } else {
            Ok(())
        }
    }
}

impl Drop for SavePermit<'_> {
    fn drop(&mut self) {
        self.guard.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_permit_drops() {
        let guard = SaveGuard::default();
        let permit = guard.try_acquire().expect("first acquire should succeed");
        assert!(guard.is_busy());
        assert!(guard.try_acquire().is_none());
        assert_eq!(guard.check_navigation(), Err(WorkspaceError::SaveInProgress));

        drop(permit);
        assert!(!guard.is_busy());
        assert!(guard.check_navigation().is_ok());
        assert!(guard.try_acquire().is_some());
    }

    #[tokio::test]
    async fn dropped_save_future_releases_the_guard() {
        let guard = SaveGuard::default();
        let save = async {
            let _permit = guard.try_acquire().expect("guard should be free");
            std::future::pending::<()>().await;
        };
        let outcome =
            tokio::time::timeout(std::time::Duration::from_millis(10), save).await;

        assert!(outcome.is_err());
        assert!(!guard.is_busy());
    }
}
