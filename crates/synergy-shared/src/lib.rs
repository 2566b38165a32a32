pub mod constants;
pub mod error;
pub mod models;
pub mod timestamp;
pub mod types;

pub use error::{Result, SynergyError, ValidationError};
pub use models::*;
pub use types::*;
