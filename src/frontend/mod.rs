//! # Frontend Module
//!
//! Two interchangeable terminal front-ends behind one contract:
//!
//! - [`TableFrontend`]: renders the filtered model list once and exits. Works
//!   anywhere, including pipes and CI logs.
//! - [`ShellFrontend`]: an interactive line-editing shell with search,
//!   filters, stars and the deletion queue. Needs a terminal.
//!
//! The [`PresentationBridge`] picks one, falls back to the table when the
//! shell cannot start, and hands the session (and its record list) over when
//! the user switches at runtime.

use std::fmt;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::inventory::{ManagerError, ModelRecord};
use crate::session::Session;

pub mod bridge;
pub mod display;
pub mod shell;
pub mod table;

pub use bridge::{BridgeState, DefaultFactory, FrontendFactory, PresentationBridge, TerminalProbe};
pub use shell::ShellFrontend;
pub use table::TableFrontend;

/// Front-end requested by the user or the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontendChoice {
    /// Shell on an interactive terminal, table otherwise
    #[default]
    Auto,
    Table,
    Shell,
}

/// A concrete front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrontendKind {
    Table,
    Shell,
}

impl fmt::Display for FrontendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrontendKind::Table => f.write_str("table"),
            FrontendKind::Shell => f.write_str("shell"),
        }
    }
}

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("No interactive terminal available")]
    NoTerminal,
    #[error("Line editor error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),
    #[error(transparent)]
    Manager(#[from] ManagerError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No front-end is selected")]
    NotSelected,
}

/// How a front-end's event loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontendExit {
    Quit,
    Switch(FrontendKind),
}

/// A front-end that failed to start, handing its session back.
pub struct InitFailure {
    pub session: Session,
    pub error: FrontendError,
}

impl fmt::Debug for InitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitFailure").field("error", &self.error).finish()
    }
}

/// The contract both front-ends implement.
///
/// A front-end owns the session while it is active and gives it back in
/// [`teardown`](Frontend::teardown).
pub trait Frontend {
    fn kind(&self) -> FrontendKind;

    /// Re-lists the inventory into the session.
    fn load(&mut self) -> Result<usize, ManagerError>;

    /// Replaces the displayed record list.
    fn set_records(&mut self, records: Vec<ModelRecord>);

    /// The displayed record list.
    fn records(&self) -> &[ModelRecord];

    /// Runs the event loop until the user quits or asks to switch.
    fn run(&mut self) -> Result<FrontendExit, FrontendError>;

    /// Stops the front-end and returns the session.
    fn teardown(self: Box<Self>) -> Session;
}
