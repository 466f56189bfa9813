//! Subprocess invocation of the external summarizer CLI.
//!
//! The command is an environment-supplied template containing a `{mr_url}`
//! placeholder; the binary must resolve on PATH before anything is
//! spawned. Output is captured with a wall-clock timeout enforced by
//! polling, and the child is killed on expiry. Credentials travel only via
//! the inherited environment, never on the command line.

use std::env;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use crate::core::{Error, Result};

/// Outcome of one subprocess run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i64>,
    pub timed_out: bool,
}

impl RunOutput {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Env var carrying the command template for each supported tool.
fn template_env_key(tool: &str) -> Result<&'static str> {
    match tool {
        "describe" => Ok("MERGEMAP_DESCRIBE_CMD"),
        "review" => Ok("MERGEMAP_REVIEW_CMD"),
        _ => Err(Error::enrichment(format!("unknown enrichment tool {tool:?}"))),
    }
}

/// Resolve the command line for `tool` against one MR URL.
///
/// The template must contain `{mr_url}`; a template for a missing tool
/// falls back to the describe template with the tool name substituted.
pub fn resolve_command(tool: &str, mr_url: &str) -> Result<String> {
    let env_key = template_env_key(tool)?;
    let mut template = env::var(env_key).unwrap_or_default().trim().to_string();
    if template.is_empty() && tool != "describe" {
        let base = env::var("MERGEMAP_DESCRIBE_CMD")
            .unwrap_or_default()
            .trim()
            .to_string();
        if !base.is_empty() {
            template = base.replace("describe", tool);
        }
    }
    if template.is_empty() {
        return Err(Error::enrichment(format!(
            "{env_key} is required (must include {{mr_url}})"
        )));
    }
    if !template.contains("{mr_url}") {
        return Err(Error::enrichment(format!(
            "{env_key} must include the {{mr_url}} placeholder"
        )));
    }
    Ok(template.replace("{mr_url}", mr_url))
}

/// Split a command line on whitespace. Templates are trusted configuration;
/// no shell is involved.
fn split_command(command: &str) -> Result<(String, Vec<String>)> {
    let mut parts = command.split_whitespace().map(|s| s.to_string());
    let program = parts
        .next()
        .ok_or_else(|| Error::enrichment("empty enrichment command"))?;
    Ok((program, parts.collect()))
}

fn read_pipe(pipe: Option<impl Read>) -> String {
    let mut out = String::new();
    if let Some(mut pipe) = pipe {
        // Output is discarded on read failure; the run record still notes
        // the exit status.
        let _ = pipe.read_to_string(&mut out);
    }
    out
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<(Option<i64>, bool)> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status.code().map(i64::from), false));
        }
        if started.elapsed() >= timeout {
            child.kill().ok();
            child.wait()?;
            return Ok((None, true));
        }
        std::thread::sleep(Duration::from_millis(200));
    }
}

/// Run one resolved command with a timeout, capturing both streams.
pub fn run_command(command: &str, timeout: Duration) -> Result<RunOutput> {
    let (program, args) = split_command(command)?;

    // Fail before spawning when the binary is absent, so the run record
    // carries a configuration error instead of a cryptic exec failure.
    which::which(&program)
        .map_err(|_| Error::enrichment(format!("enrichment binary {program:?} not found on PATH")))?;

    let mut child = Command::new(&program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::enrichment(format!("failed to spawn {program:?}: {e}")))?;

    let (exit_code, timed_out) = wait_with_timeout(&mut child, timeout)?;
    let stdout = read_pipe(child.stdout.take());
    let stderr = read_pipe(child.stderr.take());

    Ok(RunOutput {
        stdout,
        stderr,
        exit_code,
        timed_out,
    })
}
