pub mod config;
pub mod error;
pub mod runner;
pub mod state;

pub use config::TurnConfig;
pub use error::TurnError;
pub use runner::TurnWorkflow;
pub use state::{TurnMode, TurnRequest, TurnState};
