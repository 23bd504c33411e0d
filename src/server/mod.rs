//! Local JSON API over the aggregation engine and stats analytics.

pub mod dto;
pub mod handlers;
pub mod router;

pub use handlers::AppState;
pub use router::create_router;
