pub mod engine;
pub mod returns;
pub mod scenario;
pub mod service;

pub use engine::{CancelFlag, MonteCarloEngine, PathSampling, SimulationResult, TerminalSummary};
pub use returns::{estimate_returns, ReturnStats};
pub use scenario::Scenario;
pub use service::{simulate, Projection, SimulationRequest};
