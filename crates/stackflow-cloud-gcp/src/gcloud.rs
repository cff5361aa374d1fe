//! gcloud CLI wrapper
//!
//! Runs gcloud non-interactively and turns failures into [`GcloudError`]s.

use crate::error::{GcloudError, Result};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// One gcloud call: arguments plus optional data for stdin
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub args: Vec<String>,

    /// Piped to the process; secret payloads travel this way, never as arguments
    pub stdin: Option<String>,
}

impl Invocation {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append `--name=value`
    pub fn flag(self, name: &str, value: impl std::fmt::Display) -> Self {
        self.arg(format!("--{}={}", name, value))
    }

    pub fn flag_opt(self, name: &str, value: Option<impl std::fmt::Display>) -> Self {
        match value {
            Some(v) => self.flag(name, v),
            None => self,
        }
    }

    pub fn switch(self, name: &str, on: bool) -> Self {
        if on { self.arg(format!("--{}", name)) } else { self }
    }

    pub fn with_stdin(mut self, data: impl Into<String>) -> Self {
        self.stdin = Some(data.into());
        self
    }
}

/// gcloud CLI wrapper
pub struct Gcloud {
    project: Option<String>,
}

impl Gcloud {
    pub fn new(project: Option<String>) -> Self {
        Self { project }
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    /// Return the active account, if any
    pub async fn active_account(&self) -> Result<Option<String>> {
        let output = self
            .run(&Invocation::new([
                "auth",
                "list",
                "--filter=status:ACTIVE",
                "--format=value(account)",
            ]))
            .await?;

        let account = output.lines().next().map(str::trim).unwrap_or_default();
        Ok((!account.is_empty()).then(|| account.to_string()))
    }

    /// Run a command expecting JSON on stdout
    pub async fn run_json(&self, invocation: &Invocation) -> Result<serde_json::Value> {
        let output = self
            .run(&invocation.clone().arg("--format=json"))
            .await?;
        if output.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&output)?)
    }

    /// Run a gcloud command and return stdout
    pub async fn run(&self, invocation: &Invocation) -> Result<String> {
        let mut cmd = Command::new("gcloud");
        cmd.args(&invocation.args);
        if let Some(project) = &self.project {
            cmd.arg(format!("--project={}", project));
        }
        cmd.arg("--quiet");
        cmd.stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!("Running: gcloud {}", invocation.args.join(" "));

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => GcloudError::GcloudNotFound,
            _ => GcloudError::IoError(e),
        })?;

        if let Some(data) = &invocation.stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(data.as_bytes()).await?;
                pipe.shutdown().await?;
            }
        }

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GcloudError::classify(&stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
