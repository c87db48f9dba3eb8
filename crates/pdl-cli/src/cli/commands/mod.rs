//! CLI command handlers.

mod get;
mod status;

pub use get::{run_get, GetSettings};
pub use status::run_status;
