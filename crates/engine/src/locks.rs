use std::collections::HashSet;
use std::sync::{Condvar, Mutex};

use keystone_storage::{ProjectId, StorageError};

use crate::error::EngineError;

/// Registry of projects currently being regenerated.
///
/// `acquire` blocks while another thread holds the same project; different
/// projects never wait on each other.
#[derive(Debug, Default)]
pub struct ProjectLocks {
    held: Mutex<HashSet<ProjectId>>,
    released: Condvar,
}

/// Holds a project's regeneration lock until dropped.
#[derive(Debug)]
pub struct ProjectGuard<'a> {
    locks: &'a ProjectLocks,
    project_id: ProjectId,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, project_id: ProjectId) -> Result<ProjectGuard<'_>, EngineError> {
        let mut held = self.held.lock().map_err(|_| poisoned())?;
        while held.contains(&project_id) {
            tracing::debug!(project_id, "waiting for regeneration lock");
            held = self.released.wait(held).map_err(|_| poisoned())?;
        }
        held.insert(project_id);
        Ok(ProjectGuard {
            locks: self,
            project_id,
        })
    }

    pub fn is_held(&self, project_id: ProjectId) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(&project_id))
            .unwrap_or(false)
    }
}

impl Drop for ProjectGuard<'_> {
    fn drop(&mut self) {
        // Release even if another holder panicked.
        let mut held = match self.locks.held.lock() {
            Ok(held) => held,
            Err(poison) => poison.into_inner(),
        };
        held.remove(&self.project_id);
        self.locks.released.notify_all();
    }
}

fn poisoned() -> EngineError {
    EngineError::Storage(StorageError::Backend(
        "project lock registry poisoned".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn guard_releases_on_drop() {
        let locks = ProjectLocks::new();
        {
            let _g = locks.acquire(1).unwrap();
            assert!(locks.is_held(1));
        }
        assert!(!locks.is_held(1));
    }

    #[test]
    fn different_projects_do_not_contend() {
        let locks = ProjectLocks::new();
        let _a = locks.acquire(1).unwrap();
        let _b = locks.acquire(2).unwrap();
        assert!(locks.is_held(1) && locks.is_held(2));
    }

    #[test]
    fn same_project_is_exclusive() {
        let locks = Arc::new(ProjectLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_seen = Arc::clone(&max_seen);
                thread::spawn(move || {
                    let _g = locks.acquire(7).unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn poisoned_registry_is_an_internal_failure() {
        let locks = Arc::new(ProjectLocks::new());
        let holder = Arc::clone(&locks);
        let crashed = thread::spawn(move || {
            let _held = holder.held.lock().unwrap();
            panic!("holder crashed");
        })
        .join();
        assert!(crashed.is_err());

        let err = locks.acquire(3).unwrap_err();
        assert_eq!(err.kind(), "storage");
        assert!(err.to_string().contains("poisoned"), "{err}");
    }
}
