#![forbid(unsafe_code)]

//! External program whose stdout feeds a session buffer.
//!
//! [`ProcessHandle::spawn`] starts the program with stdin and stderr on the
//! null device and stdout piped. A reader thread copies stdout into the
//! [`OutputBuffer`] as it arrives and marks the buffer finished at EOF.
//!
//! # Lifecycle
//!
//! On unix the program leads its own process group.
//! [`terminate`](ProcessHandle::terminate) sends `SIGKILL` to the whole
//! group, so shells, pipelines and their background jobs go down with it,
//! then reaps the program and joins the reader once the pipe has closed.
//! `Drop` calls it, so a handle never leaks a live child. A descendant that
//! moved to another session can still hold the pipe; the reader is then left
//! to exit on its own at the next append after the buffer is destroyed.

use std::fmt;
use std::io::{self, Read};
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use asel_core::{AsyncSpec, OutputBuffer};

const READ_CHUNK: usize = 8192;
const READER_JOIN_GRACE: Duration = Duration::from_millis(100);

/// How a process ended up when it was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Termination {
    /// Exit status after reaping.
    pub status: ExitStatus,
    /// Whether it had to be killed.
    pub killed: bool,
}

/// A running external program bound to a buffer.
pub struct ProcessHandle {
    program: String,
    child: Child,
    reader: Option<thread::JoinHandle<()>>,
    termination: Option<Termination>,
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("program", &self.program)
            .field("pid", &self.child.id())
            .field("termination", &self.termination)
            .finish()
    }
}

impl ProcessHandle {
    /// Start `spec` with stdout bound to `buffer`.
    ///
    /// # Errors
    ///
    /// Returns the spawn error unchanged when the program is missing or not
    /// executable. The child is killed if the reader thread cannot start.
    pub fn spawn(spec: &AsyncSpec, buffer: OutputBuffer) -> io::Result<Self> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        #[cfg(unix)]
        command.process_group(0);
        let mut child = command.spawn()?;

        let Some(stdout) = child.stdout.take() else {
            reap_quietly(&mut child);
            return Err(io::Error::other("child stdout was not captured"));
        };

        let buffer_id = buffer.id();
        let reader = thread::Builder::new()
            .name("asel-reader".into())
            .spawn(move || pump(stdout, &buffer));
        let reader = match reader {
            Ok(handle) => handle,
            Err(err) => {
                reap_quietly(&mut child);
                return Err(err);
            }
        };

        tracing::debug!(
            program = %spec.program,
            pid = child.id(),
            buffer = buffer_id,
            "process spawned"
        );

        Ok(Self {
            program: spec.program.clone(),
            child,
            reader: Some(reader),
            termination: None,
        })
    }

    /// OS process id.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Program name as given.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Whether the program is still running.
    pub fn is_alive(&mut self) -> bool {
        if self.termination.is_some() {
            return false;
        }
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Kill the program's process group and reap the program.
    ///
    /// Descendants are killed even when the program itself already exited.
    /// Idempotent: later calls return the first outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if the child could not be waited on.
    pub fn terminate(&mut self) -> io::Result<Termination> {
        if let Some(done) = self.termination {
            return Ok(done);
        }

        let mut killed = false;
        let exited = self.child.try_wait()?;
        kill_group(self.child.id());
        let status = match exited {
            Some(status) => status,
            None => {
                match self.child.kill() {
                    Ok(()) => killed = true,
                    // Exited between try_wait and kill.
                    Err(err) if err.kind() == io::ErrorKind::InvalidInput => {}
                    Err(err) => return Err(err),
                }
                self.child.wait()?
            }
        };

        let done = Termination { status, killed };
        self.termination = Some(done);
        self.join_reader();

        tracing::debug!(
            program = %self.program,
            pid = self.child.id(),
            exit_code = status.code(),
            killed,
            "process reaped"
        );
        Ok(done)
    }

    fn join_reader(&mut self) {
        let Some(handle) = self.reader.take() else {
            return;
        };
        let deadline = Instant::now() + READER_JOIN_GRACE;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        if handle.is_finished() {
            if handle.join().is_err() {
                tracing::warn!(program = %self.program, "output reader panicked");
            }
        } else {
            tracing::debug!(
                program = %self.program,
                "stdout still held open by a descendant; detaching reader"
            );
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if let Err(err) = self.terminate() {
            tracing::warn!(program = %self.program, error = %err, "failed to reap process");
        }
    }
}

fn pump(mut stdout: ChildStdout, buffer: &OutputBuffer) {
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match stdout.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                if !buffer.append(&chunk[..n]) {
                    tracing::trace!(buffer = buffer.id(), "buffer closed; reader exiting");
                    return;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                tracing::warn!(buffer = buffer.id(), error = %err, "stdout read failed");
                break;
            }
        }
    }
    buffer.finish();
}

fn reap_quietly(child: &mut Child) {
    kill_group(child.id());
    let _ = child.kill();
    let _ = child.wait();
}

/// `SIGKILL` the process group led by `pid`. The leader is unreaped, so the
/// group id cannot have been recycled.
#[cfg(unix)]
fn kill_group(pid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => tracing::warn!(pid, error = %err, "failed to kill process group"),
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: u32) {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn wait_finished(buffer: &OutputBuffer) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !buffer.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn captures_stdout_into_buffer() {
        let buffer = OutputBuffer::new();
        let spec = AsyncSpec::new("printf", ["x\\ny\\n"]);
        let mut handle = ProcessHandle::spawn(&spec, buffer.clone()).unwrap();
        wait_finished(&buffer);
        assert_eq!(buffer.contents(), b"x\ny\n");
        let done = handle.terminate().unwrap();
        assert!(done.status.success());
        assert!(!done.killed);
    }

    #[test]
    fn stderr_is_not_captured() {
        let buffer = OutputBuffer::new();
        let spec = AsyncSpec::new("sh", ["-c", "echo out; echo err >&2"]);
        let mut handle = ProcessHandle::spawn(&spec, buffer.clone()).unwrap();
        wait_finished(&buffer);
        handle.terminate().unwrap();
        assert_eq!(buffer.contents(), b"out\n");
    }

    #[test]
    fn missing_program_reports_not_found() {
        let spec = AsyncSpec::new("asel-definitely-not-a-program", Vec::<String>::new());
        let err = ProcessHandle::spawn(&spec, OutputBuffer::new()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn terminate_kills_running_program() {
        let buffer = OutputBuffer::new();
        let spec = AsyncSpec::new("sleep", ["30"]);
        let mut handle = ProcessHandle::spawn(&spec, buffer).unwrap();
        assert!(handle.is_alive());
        let done = handle.terminate().unwrap();
        assert!(done.killed);
        assert!(!done.status.success());
        assert!(!handle.is_alive());
        assert_eq!(handle.terminate().unwrap(), done);
    }

    #[test]
    fn drop_reaps_child() {
        let buffer = OutputBuffer::new();
        let spec = AsyncSpec::new("sleep", ["30"]);
        let handle = ProcessHandle::spawn(&spec, buffer.clone()).unwrap();
        let started = Instant::now();
        drop(handle);
        assert!(started.elapsed() < Duration::from_secs(5));
        wait_finished(&buffer);
        assert!(buffer.is_finished());
    }

    /// Whether `pid` is gone or only a zombie awaiting its new parent.
    #[cfg(target_os = "linux")]
    fn wait_dead(pid: &str) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let dead = match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
                Err(_) => true,
                Ok(stat) => stat
                    .rsplit_once(')')
                    .is_some_and(|(_, rest)| rest.trim_start().starts_with('Z')),
            };
            if dead || Instant::now() >= deadline {
                return dead;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn terminate_kills_background_descendants() {
        let buffer = OutputBuffer::new();
        let spec = AsyncSpec::new("sh", ["-c", "sleep 30 & echo $!; wait"]);
        let mut handle = ProcessHandle::spawn(&spec, buffer.clone()).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !buffer.contents().contains(&b'\n') && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        let output = String::from_utf8(buffer.contents()).unwrap();
        let grandchild = output.trim().to_string();
        assert!(!grandchild.is_empty());
        assert!(!proc_gone(&grandchild));

        let started = Instant::now();
        let done = handle.terminate().unwrap();
        assert!(done.killed);
        assert!(wait_dead(&grandchild), "background sleep {grandchild} survived");
        assert!(started.elapsed() < Duration::from_secs(5));
        wait_finished(&buffer);
        assert!(buffer.is_finished(), "pipe closed once the group died");
    }

    #[cfg(target_os = "linux")]
    fn proc_gone(pid: &str) -> bool {
        !std::path::Path::new(&format!("/proc/{pid}")).exists()
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn reaped_process_leaves_no_proc_entry() {
        let spec = AsyncSpec::new("sleep", ["30"]);
        let mut handle = ProcessHandle::spawn(&spec, OutputBuffer::new()).unwrap();
        let pid = handle.pid();
        assert!(std::path::Path::new(&format!("/proc/{pid}")).exists());
        handle.terminate().unwrap();
        assert!(!std::path::Path::new(&format!("/proc/{pid}")).exists());
    }
}
