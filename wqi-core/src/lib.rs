pub mod classification;
pub mod config;
pub mod error;
pub mod formula;
pub mod parameter;
pub mod result;
pub mod source;
pub mod station;

pub use error::{EngineError, ErrorKind, Result};
