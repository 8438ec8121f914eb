use std::process::{Command, Output};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::parser::parse_list_output;
use super::record::ListedModel;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("`{binary}` was not found. Is Ollama installed?")]
    NotInstalled { binary: String },
    #[error("Failed to execute `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` failed{}: {stderr}", .code.map(|c| format!(" with exit code {}", c)).unwrap_or_default())]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("`{command}` produced output that is not valid UTF-8")]
    InvalidOutput { command: String },
}

/// The external model manager.
///
/// Every call blocks until the manager process exits. No timeout is applied.
pub trait ModelManager {
    /// Lists installed models.
    fn list(&self) -> Result<Vec<ListedModel>, ManagerError>;

    /// Removes one installed model.
    fn delete(&self, name: &str) -> Result<(), ManagerError>;

    /// Returns the manager's detail text for one model.
    fn show(&self, name: &str) -> Result<String, ManagerError>;

    /// Whether the manager can be invoked at all.
    fn is_available(&self) -> bool;
}

/// [`ModelManager`] backed by the `ollama` command line.
#[derive(Debug, Clone)]
pub struct OllamaCli {
    binary: String,
    delete_subcommand: String,
}

impl OllamaCli {
    pub fn new(binary: impl Into<String>, delete_subcommand: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            delete_subcommand: delete_subcommand.into(),
        }
    }

    fn command_line(&self, args: &[&str]) -> String {
        std::iter::once(self.binary.as_str())
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Runs the manager with `args` and returns its stdout on success.
    fn run(&self, args: &[&str]) -> Result<String, ManagerError> {
        let command = self.command_line(args);
        debug!("Running {}", command);

        let output: Output = Command::new(&self.binary)
            .args(args)
            .output()
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    ManagerError::NotInstalled { binary: self.binary.clone() }
                } else {
                    ManagerError::Spawn { command: command.clone(), source }
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("{} exited with {}: {}", command, output.status, stderr);
            return Err(ManagerError::CommandFailed {
                command,
                code: output.status.code(),
                stderr,
            });
        }

        String::from_utf8(output.stdout).map_err(|_| ManagerError::InvalidOutput { command })
    }
}

impl ModelManager for OllamaCli {
    fn list(&self) -> Result<Vec<ListedModel>, ManagerError> {
        let stdout = self.run(&["list"])?;
        let models = parse_list_output(&stdout);
        info!("Manager listed {} models", models.len());
        Ok(models)
    }

    fn delete(&self, name: &str) -> Result<(), ManagerError> {
        self.run(&[self.delete_subcommand.as_str(), name])?;
        info!("Deleted model {}", name);
        Ok(())
    }

    fn show(&self, name: &str) -> Result<String, ManagerError> {
        self.run(&["show", name])
    }

    fn is_available(&self) -> bool {
        if which::which(&self.binary).is_err() {
            debug!("{} is not on PATH", self.binary);
            return false;
        }
        self.run(&["--version"]).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_not_installed() {
        let cli = OllamaCli::new("omv-test-binary-that-does-not-exist", "rm");
        match cli.list() {
            Err(ManagerError::NotInstalled { binary }) => {
                assert_eq!(binary, "omv-test-binary-that-does-not-exist")
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!cli.is_available());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_command_failed() {
        // `false` ignores its arguments and exits with status 1
        let cli = OllamaCli::new("false", "rm");
        match cli.delete("llama3:8b") {
            Err(ManagerError::CommandFailed { command, code, .. }) => {
                assert_eq!(command, "false rm llama3:8b");
                assert_eq!(code, Some(1));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_error_messages() {
        let err = ManagerError::CommandFailed {
            command: "ollama list".to_string(),
            code: Some(1),
            stderr: "could not connect".to_string(),
        };
        assert_eq!(err.to_string(), "`ollama list` failed with exit code 1: could not connect");
    }
}
