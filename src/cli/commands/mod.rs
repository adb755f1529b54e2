//! CLI command implementations.

mod cache;
mod delete;
mod import;
mod types;

pub use cache::{cmd_cache_purge, cmd_cache_stats};
pub use delete::cmd_delete;
pub use import::cmd_import;
pub use types::cmd_types;
