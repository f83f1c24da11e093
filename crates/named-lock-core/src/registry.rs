//! Process-local record of the locks an engine believes it holds.
//!
//! The registry is a cache of this engine's own successful grants, never a
//! source of truth: only the backend decides who holds a lock. It exists to
//! short-circuit re-entrant acquisition and to know what to release on
//! teardown.

use std::collections::HashMap;

use parking_lot::Mutex;

/// How re-entrant acquisitions are counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReentrancyMode {
    /// Presence only. Acquiring a held name again succeeds, but a single
    /// release gives the lock up no matter how many times it was re-entered.
    #[default]
    Flag,
    /// Reference counted. Every acquisition needs a matching release before
    /// the backend lock is given up.
    Counted,
}

/// What a release should do for a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseStep {
    /// Release the backend lock.
    Outer,
    /// Only a nested acquisition ends; this many remain.
    Nested(u32),
}

/// Name to acquisition-depth map, safe to share across threads.
#[derive(Debug, Default)]
pub struct LockRegistry {
    mode: ReentrancyMode,
    held: Mutex<HashMap<String, u32>>,
}

impl LockRegistry {
    pub fn new(mode: ReentrancyMode) -> Self {
        Self {
            mode,
            held: Mutex::new(HashMap::new()),
        }
    }

    pub fn mode(&self) -> ReentrancyMode {
        self.mode
    }

    /// Re-enters `name` if it is already held, returning whether it was.
    pub fn reenter(&self, name: &str) -> bool {
        let mut held = self.held.lock();
        match held.get_mut(name) {
            Some(depth) => {
                if self.mode == ReentrancyMode::Counted {
                    *depth = depth.saturating_add(1);
                }
                true
            }
            None => false,
        }
    }

    /// Records a successful backend grant.
    pub fn record(&self, name: &str) {
        let mut held = self.held.lock();
        let depth = held.entry(name.to_string()).or_insert(0);
        *depth = match self.mode {
            ReentrancyMode::Flag => 1,
            ReentrancyMode::Counted => depth.saturating_add(1),
        };
    }

    /// Decides whether releasing `name` must reach the backend.
    ///
    /// A nested step is applied immediately; an outer step leaves the entry
    /// in place until [`remove`](Self::remove) confirms the backend release.
    pub fn release_step(&self, name: &str) -> ReleaseStep {
        let mut held = self.held.lock();
        match held.get_mut(name) {
            Some(depth) if self.mode == ReentrancyMode::Counted && *depth > 1 => {
                *depth -= 1;
                ReleaseStep::Nested(*depth)
            }
            _ => ReleaseStep::Outer,
        }
    }

    /// Forgets `name`, returning whether it was present.
    pub fn remove(&self, name: &str) -> bool {
        self.held.lock().remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.held.lock().contains_key(name)
    }

    /// Number of unreleased acquisitions of `name` (0 when not held).
    pub fn depth(&self, name: &str) -> u32 {
        self.held.lock().get(name).copied().unwrap_or(0)
    }

    /// Names currently held, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.held.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.held.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.lock().is_empty()
    }
}
