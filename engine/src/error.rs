use crate::types::{TerritoryId, UserId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Failure conditions raised by the engine.
///
/// `InsufficientPoints` is a recognized outcome rather than a fault: the
/// conquest resolver turns it into `Outcome::InsufficientPoints`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("route has {distinct} distinct point(s), at least 3 are needed to claim territory")]
    InsufficientPoints { distinct: usize },

    #[error("unresolvable geometry: {0}")]
    UnresolvableGeometry(String),

    #[error("stored total {stored:.3} m² for {user} disagrees with its territories ({derived:.3} m²)")]
    InconsistentAggregate { user: UserId, stored: f64, derived: f64 },

    #[error("{0} is not on the board")]
    UnknownTerritory(TerritoryId),

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
}
