use std::collections::HashMap;

use crate::models::Instrument;

/// All instruments seen during this run, keyed by symbol.
///
/// Entries are added or overwritten by each refresh and never removed.
#[derive(Debug, Clone, Default)]
pub struct InstrumentCatalogue {
    instruments: HashMap<String, Instrument>,
}

impl InstrumentCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<&Instrument> {
        self.instruments.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.instruments.contains_key(symbol)
    }

    /// Insert or replace, returning the previous entry
    pub fn upsert(&mut self, instrument: Instrument) -> Option<Instrument> {
        self.instruments.insert(instrument.symbol.clone(), instrument)
    }

    /// Insert only if the symbol is unknown
    pub fn insert_if_absent(&mut self, instrument: Instrument) -> bool {
        if self.contains(&instrument.symbol) {
            return false;
        }
        self.upsert(instrument);
        true
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Copy of every instrument, sorted by symbol
    pub fn snapshot(&self) -> Vec<Instrument> {
        let mut all: Vec<Instrument> = self.instruments.values().cloned().collect();
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        all
    }
}
