//! Merchant API bearer tokens.

use std::process::Command;

use merchant_sync_core::TokenSource;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to run token command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("token command `{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("token command `{command}` printed no token")]
    Empty { command: String },
}

pub trait TokenProvider {
    fn token(&mut self) -> Result<String, TokenError>;

    /// Forget any cached token, e.g. after the API rejected it.
    fn invalidate(&mut self) {}
}

/// A token handed over verbatim (`GOOGLE_ACCESS_TOKEN`).
pub struct StaticToken(String);

impl TokenProvider for StaticToken {
    fn token(&mut self) -> Result<String, TokenError> {
        Ok(self.0.clone())
    }
}

/// Runs a shell command once and reuses its output until invalidated.
pub struct CommandToken {
    command: String,
    cached: Option<String>,
}

impl CommandToken {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            cached: None,
        }
    }

    fn fetch(&self) -> Result<String, TokenError> {
        let output = shell(&self.command)
            .output()
            .map_err(|source| TokenError::Spawn {
                command: self.command.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(TokenError::Failed {
                command: self.command.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(TokenError::Empty {
                command: self.command.clone(),
            });
        }
        Ok(token)
    }
}

impl TokenProvider for CommandToken {
    fn token(&mut self) -> Result<String, TokenError> {
        if let Some(token) = &self.cached {
            return Ok(token.clone());
        }
        tracing::debug!("acquiring Merchant API token via `{}`", self.command);
        let token = self.fetch()?;
        self.cached = Some(token.clone());
        Ok(token)
    }

    fn invalidate(&mut self) {
        self.cached = None;
    }
}

pub fn provider_for(source: &TokenSource) -> Box<dyn TokenProvider> {
    match source {
        TokenSource::Static(token) => Box::new(StaticToken(token.clone())),
        TokenSource::Command(command) => Box::new(CommandToken::new(command.clone())),
    }
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}
