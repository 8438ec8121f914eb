//! Terminal viewer and cleanup tool for locally installed Ollama models.
//!
//! The inventory comes from the `ollama` command line, usage statistics from
//! a read-only look at Open WebUI's database. Two front-ends share one
//! [`session::Session`]: a one-shot table and an interactive shell.

pub mod analysis;
pub mod config;
pub mod frontend;
pub mod inventory;
pub mod session;
pub mod usage;
pub mod vault;
