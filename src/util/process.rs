//! Blocking subprocess helpers

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured result of a finished child process
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Outcome of a bounded run
#[derive(Debug)]
pub enum TimedOutput {
    Finished(CommandOutput),
    TimedOut,
}

/// Builds a command that runs `command_line` through the platform shell with `args`
/// appended as separate, unsplit arguments.
pub fn shell_command<S: AsRef<str>>(command_line: &str, args: &[S]) -> Command {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command_line);
        cmd.args(args.iter().map(|a| a.as_ref()));
        cmd
    }
    #[cfg(not(windows))]
    {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(format!("{} \"$@\"", command_line))
            .arg("sh");
        cmd.args(args.iter().map(|a| a.as_ref()));
        cmd
    }
}

/// Quotes `word` for `sh` when it contains anything beyond plain path characters.
pub fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+@:=,".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', "'\\''"))
    }
}

/// Runs `command` to completion with stdout and stderr captured.
pub fn run_captured(command: &mut Command) -> std::io::Result<CommandOutput> {
    let output = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    Ok(CommandOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Runs `command` with captured output, killing it once `timeout` elapses.
///
/// Pipes are drained on reader threads so a chatty child cannot block on a full pipe
/// while we poll for its exit.
pub fn run_with_timeout(command: &mut Command, timeout: Duration) -> std::io::Result<TimedOutput> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout_reader = drain(child.stdout.take());
    let stderr_reader = drain(child.stderr.take());

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break Some(status);
        }
        if start.elapsed() > timeout {
            kill_quietly(&mut child);
            break None;
        }
        thread::sleep(POLL_INTERVAL);
    };

    // Grandchildren may still hold the pipes after a kill; leave the readers detached.
    let Some(status) = status else {
        return Ok(TimedOutput::TimedOut);
    };

    Ok(TimedOutput::Finished(CommandOutput {
        status,
        stdout: collect(stdout_reader),
        stderr: collect(stderr_reader),
    }))
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

fn kill_quietly(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
