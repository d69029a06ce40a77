//! Shell commands whose output is fed back into the conversation.

use std::error::Error;
use std::fmt;
use std::io;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::cancellation::{CancellationCoordinator, RequestKind};

const CONTEXT_PREAMBLE: &str = "The user executed the following command and here is the output:";
const INTERRUPTED_MESSAGE: &str = "command interrupted by user";

#[derive(Debug)]
pub enum ShellError {
    Spawn(io::Error),
    Wait(io::Error),
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellError::Spawn(err) => write!(f, "failed to start command: {err}"),
            ShellError::Wait(err) => write!(f, "failed to wait for command: {err}"),
        }
    }
}

impl Error for ShellError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ShellError::Spawn(err) | ShellError::Wait(err) => Some(err),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShellOutput {
    pub command: String,
    /// Interleaved stdout and stderr lines, each newline-terminated.
    pub output: String,
    /// `None` when the command was killed.
    pub status: Option<ExitStatus>,
    pub interrupted: bool,
}

impl ShellOutput {
    pub fn error_text(&self) -> Option<String> {
        if self.interrupted {
            return Some(INTERRUPTED_MESSAGE.to_string());
        }
        self.status
            .filter(|status| !status.success())
            .map(|status| status.to_string())
    }

    /// The user turn that carries this output into the conversation.
    pub fn to_context_message(&self) -> String {
        let result = match self.error_text() {
            Some(error) => format!(
                "Command: {}\nError: {}\nOutput:\n{}",
                self.command, error, self.output
            ),
            None => format!("Command: {}\nOutput:\n{}", self.command, self.output),
        };
        format!("{CONTEXT_PREAMBLE}\n\n---\n{result}\n---")
    }
}

fn spawn_line_reader<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }
                    // Undecodable bytes become U+FFFD rather than ending the stream.
                    let line = String::from_utf8_lossy(&buf).into_owned();
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    debug!("stopped reading command output: {err}");
                    break;
                }
            }
        }
    });
}

/// Run `command` through `sh -c`, passing each output line to `on_line` as it
/// arrives.
///
/// The child is registered as the active sub-process for its lifetime, so an
/// interrupt with no chat request in flight kills it. A killed command is a
/// normal result with `interrupted` set.
pub async fn run_shell_command<F>(
    command: &str,
    coordinator: &CancellationCoordinator,
    mut on_line: F,
) -> Result<ShellOutput, ShellError>
where
    F: FnMut(&str),
{
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(ShellError::Spawn)?;
    debug!(command, pid = ?child.id(), "started shell command");

    let cancel_token = CancellationToken::new();
    let _in_flight = coordinator.register(RequestKind::SubProcess, cancel_token.clone());

    let (tx, mut rx) = mpsc::unbounded_channel();
    if let Some(stdout) = child.stdout.take() {
        spawn_line_reader(stdout, tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_line_reader(stderr, tx);
    }

    let mut output = String::new();
    let mut push_line = |line: &str, output: &mut String| {
        on_line(line);
        output.push_str(line);
        output.push('\n');
    };

    let mut streams_open = true;
    let status = loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break None,
            line = rx.recv(), if streams_open => match line {
                Some(line) => push_line(&line, &mut output),
                None => streams_open = false,
            },
            status = child.wait(), if !streams_open => {
                break Some(status.map_err(ShellError::Wait)?);
            }
        }
    };

    let interrupted = status.is_none();
    if interrupted {
        if let Err(err) = child.kill().await {
            debug!("failed to kill interrupted command: {err}");
        }
        while let Ok(line) = rx.try_recv() {
            push_line(&line, &mut output);
        }
    }
    debug!(command, ?status, interrupted, "shell command finished");

    Ok(ShellOutput {
        command: command.to_string(),
        output,
        status,
        interrupted,
    })
}
