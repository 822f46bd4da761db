//! HTTP front end for the screener: upload a workbook, start a screening
//! job, poll its status and download the result.

pub mod error;
pub mod handlers;
pub mod logging;
pub mod router;
pub mod session;
pub mod state;

pub use error::{ApiError, ServerError};
pub use router::build_router;
pub use state::{AppState, SharedState};
