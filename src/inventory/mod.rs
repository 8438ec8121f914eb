//! # Inventory Module
//!
//! Talks to the external model manager and turns its tabular output into
//! typed rows. Classification of those rows happens in [`crate::analysis`].

pub mod manager;
pub mod parser;
pub mod record;
pub mod size;

pub use manager::{ManagerError, ModelManager, OllamaCli};
pub use parser::parse_list_output;
pub use record::{AgeCategory, Capability, ListedModel, ModelRecord};
pub use size::{format_bytes, parse_size, total_bytes};
