use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Per-symbol single-flight guard around bracket placement.
///
/// At most one placement per symbol runs at a time; a second trigger for a
/// symbol already in flight is refused instead of queued.
#[derive(Debug, Clone, Default)]
pub struct PlacementGuards {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl PlacementGuards {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `symbol`. `None` if another placement holds it.
    pub fn try_acquire(&self, symbol: &str) -> Option<PlacementGuard> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(symbol.to_string()) {
            return None;
        }
        Some(PlacementGuard {
            symbol: symbol.to_string(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn is_in_flight(&self, symbol: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(symbol)
    }
}

/// Releases the symbol when dropped, including on early return or panic
#[derive(Debug)]
pub struct PlacementGuard {
    symbol: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl PlacementGuard {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl Drop for PlacementGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.symbol);
    }
}
