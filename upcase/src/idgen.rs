//! Handles for buffers registered in a device's wait queue

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Identifies one buffer inside a shared wait queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(i64);

impl Handle {
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn id(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Thread-safe handle generator, ids start at 1
#[derive(Debug)]
pub struct IdGen {
    next_id: AtomicI64,
}

impl IdGen {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
        }
    }

    /// Get the next unused handle
    pub fn get_next(&self) -> Handle {
        Handle(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdGen {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique_and_increasing() {
        let id_gen = IdGen::new();
        let a = id_gen.get_next();
        let b = id_gen.get_next();
        assert_eq!(a.id(), 1);
        assert_eq!(b.id(), 2);
        assert_ne!(a, b);
    }

    #[test]
    fn test_display() {
        assert_eq!(Handle::new(7).to_string(), "#7");
    }
}
