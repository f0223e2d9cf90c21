use std::sync::Mutex;

use tracing::debug;

use crate::location::Location;

/// Router seam: the URL is the canonical store of scene state.
pub trait Navigator: Send + Sync {
    fn location(&self) -> Location;
    fn replace(&self, location: Location);
    fn push(&self, location: Location);
    /// Returns false when there is no earlier entry.
    fn back(&self) -> bool;
}

/// Session history kept in memory, for headless front-ends and tests.
pub struct MemoryNavigator {
    entries: Mutex<Vec<Location>>,
}

impl MemoryNavigator {
    pub fn new(initial: Location) -> Self {
        Self {
            entries: Mutex::new(vec![initial]),
        }
    }

    pub fn history(&self) -> Vec<Location> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Location>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Navigator for MemoryNavigator {
    fn location(&self) -> Location {
        self.lock().last().cloned().unwrap_or_default()
    }

    fn replace(&self, location: Location) {
        debug!(to = %location, "navigation replace");
        let mut entries = self.lock();
        match entries.last_mut() {
            Some(current) => *current = location,
            None => entries.push(location),
        }
    }

    fn push(&self, location: Location) {
        debug!(to = %location, "navigation push");
        self.lock().push(location);
    }

    fn back(&self) -> bool {
        let mut entries = self.lock();
        if entries.len() < 2 {
            return false;
        }
        entries.pop();
        true
    }
}
