pub mod backend;
pub mod error;
mod key;
mod models;

pub use crate::backend::StorageBackend;
pub use crate::key::{join as join_key, validate as validate_key, validate_prefix};
pub use crate::models::ObjectInfo;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
