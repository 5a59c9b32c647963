// Bracket order execution
pub mod orchestrator;
pub mod single_flight;

pub use orchestrator::{resolve_filled_quantity, stop_loss_trigger, take_profit_trigger, OrderOrchestrator};
pub use single_flight::{PlacementGuard, PlacementGuards};
