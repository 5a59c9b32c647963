// Instrument catalogue and exchange precision rules
pub mod catalogue;
pub mod precision;

pub use catalogue::InstrumentCatalogue;
pub use precision::{adjust_price, adjust_quantity, StepRule};
