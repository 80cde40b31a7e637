pub mod types;
pub mod error;
pub mod config;
pub mod projection;
pub mod geometry;
pub mod boolean;
pub mod corridor;
pub mod aggregate;
pub mod board;
pub mod conquest;
pub mod view;
pub mod geojson;


pub use types::*;
pub use error::{EngineError, Result};
pub use config::EngineConfig;
pub use board::Board;
pub use conquest::{submit_route, Outcome, ResolutionResult, RouteSubmission};
