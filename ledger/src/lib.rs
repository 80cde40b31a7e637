pub mod error;
pub mod database;
pub mod service;
pub mod session;

pub use error::{LedgerError, Result};
pub use database::{Discrepancy, Ledger, Standing, User, USER_COLORS};
pub use service::{ConquestService, Receipt};
pub use session::{run_session, SessionReport};
