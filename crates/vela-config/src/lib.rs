//! Configuration for the Vela orchestrator.
//!
//! TOML-based, with serde defaults so partial configs work. The trigger
//! table, backend tiers, and all stage timeouts live here rather than in
//! code.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_path};
pub use schema::VelaConfig;
