use std::ffi::{OsStr, OsString};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::PLUGIN_FLAG;

/// What to do with the plugin's stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StderrMode {
    /// Share the host's stderr.
    #[default]
    Inherit,
    /// Forward each stderr line through `tracing` on a background thread.
    Log,
    /// Discard plugin stderr.
    Null,
}

/// Describes how to launch a plugin executable.
#[derive(Debug, Clone)]
pub struct PluginCommand {
    program: PathBuf,
    args: Vec<OsString>,
    stderr: StderrMode,
}

impl PluginCommand {
    /// Create a command for the given plugin executable.
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            stderr: StderrMode::default(),
        }
    }

    /// Append one argument. The plugin flag always follows user arguments.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    /// Choose how plugin stderr is handled.
    pub fn stderr(mut self, mode: StderrMode) -> Self {
        self.stderr = mode;
        self
    }

    /// The executable as given.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments as they will be passed, including the trailing plugin flag.
    pub fn full_args(&self) -> Vec<OsString> {
        let mut args = self.args.clone();
        args.push(OsString::from(PLUGIN_FLAG));
        args
    }

    /// Resolve the program path.
    ///
    /// Paths with a directory component are made absolute against the current
    /// directory; bare names are left for `PATH` lookup.
    fn resolved_program(&self) -> Result<PathBuf> {
        if self.program.components().count() > 1 {
            std::path::absolute(&self.program).map_err(|source| TransportError::Spawn {
                program: self.program.clone(),
                source,
            })
        } else {
            Ok(self.program.clone())
        }
    }
}

/// A running plugin subprocess, minus its protocol pipes.
pub struct PluginProcess {
    child: Child,
    program: PathBuf,
    stderr_forwarder: Option<JoinHandle<()>>,
}

impl PluginProcess {
    /// Spawn the plugin and hand back its stdin (host write side) and
    /// stdout (host read side).
    pub fn spawn(command: &PluginCommand) -> Result<(Self, ChildStdin, ChildStdout)> {
        let program = command.resolved_program()?;
        let stderr = match command.stderr {
            StderrMode::Inherit => Stdio::inherit(),
            StderrMode::Log => Stdio::piped(),
            StderrMode::Null => Stdio::null(),
        };

        let mut child = Command::new(&program)
            .args(command.full_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(stderr)
            .spawn()
            .map_err(|source| TransportError::Spawn {
                program: program.clone(),
                source,
            })?;

        let pid = child.id();
        info!(?program, pid, "spawned plugin");

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            (stdin, _) => {
                let missing = if stdin.is_none() { "stdin" } else { "stdout" };
                return reap_on_error(&mut child, Err(TransportError::MissingPipe(missing)));
            }
        };

        let forwarder = child
            .stderr
            .take()
            .map(|stderr| forward_stderr(stderr, pid))
            .transpose();
        let stderr_forwarder = reap_on_error(&mut child, forwarder)?;

        Ok((
            Self {
                child,
                program,
                stderr_forwarder,
            },
            stdin,
            stdout,
        ))
    }

    /// OS process id of the plugin.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Resolved executable path.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Forcefully terminate the plugin.
    pub fn kill(&mut self) -> Result<()> {
        Ok(self.child.kill()?)
    }

    /// Wait for the plugin to exit and drain its stderr forwarder.
    ///
    /// The plugin only exits on its own once its stdin is closed, so callers
    /// drop the write side first.
    pub fn wait(mut self) -> Result<ExitStatus> {
        let status = self.child.wait()?;
        if let Some(forwarder) = self.stderr_forwarder.take() {
            let _ = forwarder.join();
        }
        info!(pid = self.child.id(), %status, "plugin exited");
        Ok(status)
    }
}

impl std::fmt::Debug for PluginProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginProcess")
            .field("pid", &self.child.id())
            .field("program", &self.program)
            .finish()
    }
}

/// Kill and reap `child` if `result` is an error, so a half-wired plugin is
/// never left running.
fn reap_on_error<T>(child: &mut Child, result: Result<T>) -> Result<T> {
    if result.is_err() {
        let _ = child.kill();
        let _ = child.wait();
    }
    result
}

fn forward_stderr(stderr: ChildStderr, pid: u32) -> Result<JoinHandle<()>> {
    let handle = std::thread::Builder::new()
        .name(format!("plugwire-stderr-{pid}"))
        .spawn(move || {
            for line in BufReader::new(stderr).lines() {
                match line {
                    Ok(line) => info!(target: "plugwire::plugin", pid, "{line}"),
                    Err(err) => {
                        debug!(pid, error = %err, "plugin stderr closed");
                        break;
                    }
                }
            }
        })?;
    Ok(handle)
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{Read, Write};

    use super::*;

    #[test]
    fn plugin_flag_follows_user_args() {
        let cmd = PluginCommand::new("plugin").arg("serve").arg("upper");
        let args = cmd.full_args();
        assert_eq!(args, vec!["serve", "upper", PLUGIN_FLAG]);
    }

    #[test]
    fn bare_program_name_is_not_resolved() {
        let cmd = PluginCommand::new("cat");
        assert_eq!(cmd.resolved_program().unwrap(), PathBuf::from("cat"));
    }

    #[test]
    fn relative_path_is_made_absolute() {
        let cmd = PluginCommand::new("./bin/plugin");
        let resolved = cmd.resolved_program().unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("bin/plugin"));
    }

    #[test]
    fn failed_wiring_kills_and_reaps_the_child() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let result: Result<()> = reap_on_error(&mut child, Err(TransportError::MissingPipe("stderr")));

        assert!(matches!(result, Err(TransportError::MissingPipe("stderr"))));
        let status = child.try_wait().unwrap().expect("child should already be reaped");
        assert!(!status.success());
    }

    #[test]
    fn successful_wiring_leaves_the_child_running() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        assert_eq!(reap_on_error(&mut child, Ok(7)).unwrap(), 7);
        assert!(child.try_wait().unwrap().is_none());

        child.kill().unwrap();
        child.wait().unwrap();
    }

    #[test]
    fn spawn_pipes_stdin_to_stdout() {
        // `sh -c cat sh --plugwire-plugin`: the flag lands in $1 and cat ignores it.
        let cmd = PluginCommand::new("sh")
            .args(["-c", "cat", "sh"])
            .stderr(StderrMode::Null);
        let (process, mut stdin, mut stdout) = PluginProcess::spawn(&cmd).unwrap();
        assert!(process.id() > 0);

        stdin.write_all(b"through the pipe").unwrap();
        drop(stdin);

        let mut echoed = Vec::new();
        stdout.read_to_end(&mut echoed).unwrap();
        assert_eq!(echoed, b"through the pipe");

        let status = process.wait().unwrap();
        assert!(status.success());
    }

    #[test]
    fn logged_stderr_is_drained_on_wait() {
        let cmd = PluginCommand::new("sh")
            .args(["-c", "echo diagnostic >&2", "sh"])
            .stderr(StderrMode::Log);
        let (process, stdin, _stdout) = PluginProcess::spawn(&cmd).unwrap();
        drop(stdin);

        let status = process.wait().unwrap();
        assert!(status.success());
    }

    #[test]
    fn spawn_missing_program_fails() {
        let cmd = PluginCommand::new("/nonexistent/plugwire-plugin-binary");
        let err = PluginProcess::spawn(&cmd).unwrap_err();
        assert!(matches!(err, TransportError::Spawn { .. }));
    }
}
