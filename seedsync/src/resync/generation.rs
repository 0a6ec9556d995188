//! Generation tokens.
//!
//! A generation identifies one effect firing of one subscription. Generations are
//! minted from a process-wide counter, so they are unique across subscriptions
//! and never reused.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Opaque marker of a single effect firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl Generation {
    /// Mint a fresh, never-before-seen generation.
    pub fn mint() -> Self {
        Self(NEXT_GENERATION.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw counter value, for logging.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// The live generation of one subscription.
///
/// Cloning shares the same cell. Every [`crate::resync::Io`] created by a
/// subscription holds a clone, so it observes later firings at the moment its
/// response arrives.
#[derive(Debug, Clone, Default)]
pub struct LiveGeneration(Arc<AtomicU64>);

impl LiveGeneration {
    /// A cell with no generation yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a new generation and make it the live one.
    pub fn advance(&self) -> Generation {
        let generation = Generation::mint();
        self.0.store(generation.0, Ordering::SeqCst);
        generation
    }

    /// The live generation, if the subscription has fired at least once.
    pub fn current(&self) -> Option<Generation> {
        match self.0.load(Ordering::SeqCst) {
            0 => None,
            value => Some(Generation(value)),
        }
    }

    /// Whether `generation` is still the live one.
    pub fn is_current(&self, generation: Generation) -> bool {
        self.0.load(Ordering::SeqCst) == generation.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minted_generations_are_unique() {
        let a = Generation::mint();
        let b = Generation::mint();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_live_generation_starts_empty() {
        let live = LiveGeneration::new();
        assert_eq!(live.current(), None);
    }

    #[test]
    fn test_advance_supersedes_previous() {
        let live = LiveGeneration::new();
        let first = live.advance();
        assert!(live.is_current(first));

        let second = live.advance();
        assert!(!live.is_current(first));
        assert!(live.is_current(second));
        assert_eq!(live.current(), Some(second));
    }

    #[test]
    fn test_clones_share_the_cell() {
        let live = LiveGeneration::new();
        let observer = live.clone();
        let generation = live.advance();
        assert!(observer.is_current(generation));

        live.advance();
        assert!(!observer.is_current(generation));
    }

    #[test]
    fn test_independent_cells_do_not_interfere() {
        let a = LiveGeneration::new();
        let b = LiveGeneration::new();
        let ga = a.advance();
        b.advance();
        assert!(a.is_current(ga));
    }

    #[test]
    fn test_display() {
        let generation = Generation(42);
        assert_eq!(generation.to_string(), "g42");
        assert_eq!(generation.value(), 42);
    }
}
