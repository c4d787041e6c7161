use std::{
    io::{self, BufRead, BufReader, Write},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
    sync::Mutex,
};

use crate::{
    config::SU_BIN,
    props::{InvocationError, PropertyStore},
};

/// One interactive elevated shell. Command lines go in on stdin; the
/// response (for getprop) is read back before the shell is told to exit.
struct Session {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    reaped: bool,
}

impl Session {
    fn open(bin: &str) -> Result<Self, InvocationError> {
        let mut child = Command::new(bin)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(InvocationError::Spawn)?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(i), Some(o)) => (i, o),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(InvocationError::Spawn(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "stdio handles not captured",
                )));
            }
        };

        Ok(Session {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            reaped: false,
        })
    }

    fn send_line(&mut self, line: &str) -> Result<(), InvocationError> {
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            InvocationError::Stream(io::Error::new(io::ErrorKind::BrokenPipe, "stdin closed"))
        })?;
        stdin
            .write_all(line.as_bytes())
            .and_then(|_| stdin.write_all(b"\n"))
            .and_then(|_| stdin.flush())
            .map_err(InvocationError::Stream)
    }

    /// Read one line of output while the shell is still running; reading
    /// after exit can block on a dead pipe or come back empty. A closed
    /// stream reads as None.
    fn read_line(&mut self) -> Result<Option<String>, InvocationError> {
        let mut line = String::new();
        let n = self
            .stdout
            .read_line(&mut line)
            .map_err(InvocationError::Stream)?;
        if n == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Close stdin (EOF for shells that ignore `exit`) and await the child.
    fn finish(mut self) -> Result<(), InvocationError> {
        self.stdin.take();
        match self.child.wait() {
            Ok(_) => {
                self.reaped = true;
                Ok(())
            }
            Err(e) => Err(InvocationError::Wait(e)),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        // A failed round trip must not leak the elevated process.
        self.stdin.take();
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// PropertyStore backend that goes through an interactive `su` shell, one
/// short-lived session per round trip.
pub struct SuShell {
    bin: String,
    // One elevated session at a time; the web thread and the refresh loop
    // must never overlap invocations.
    serial: Mutex<()>,
}

impl SuShell {
    pub fn new() -> Self {
        Self::with_binary(SU_BIN)
    }

    pub fn with_binary(bin: &str) -> Self {
        Self {
            bin: bin.to_string(),
            serial: Mutex::new(()),
        }
    }
}

impl Default for SuShell {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyStore for SuShell {
    fn read(&self, key: &str) -> Result<Option<String>, InvocationError> {
        let _serial = self.serial.lock().unwrap();

        let mut session = Session::open(&self.bin)?;
        session.send_line(&format!("getprop {}", key))?;
        let line = session.read_line()?;
        session.send_line("exit")?;
        session.finish()?;

        // getprop prints an empty line for an unset key.
        Ok(line.filter(|l| !l.is_empty()))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), InvocationError> {
        let _serial = self.serial.lock().unwrap();

        let mut session = Session::open(&self.bin)?;
        session.send_line(&format!("setprop {} {}", key, value))?;
        session.send_line("exit")?;
        session.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // `cat` echoes each command line back, which is enough to exercise the
    // spawn -> write -> read -> await ordering without root.
    #[test]
    fn session_echo_round_trip() {
        let shell = SuShell::with_binary("cat");
        let line = shell.read("persist.unleashed.mode").unwrap();
        assert_eq!(line.as_deref(), Some("getprop persist.unleashed.mode"));
    }

    #[test]
    fn write_round_trip_terminates() {
        let shell = SuShell::with_binary("cat");
        shell.write("persist.unleashed.mode", "efficiency").unwrap();
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let shell = SuShell::with_binary("/nonexistent/su");
        match shell.read("persist.unleashed.mode") {
            Err(InvocationError::Spawn(_)) => {}
            other => panic!("expected spawn error, got {:?}", other),
        }
    }

    #[test]
    fn immediate_exit_does_not_hang() {
        // `true` quits without reading stdin or writing anything; depending
        // on timing the session sees EOF or a broken pipe, never a hang.
        let shell = SuShell::with_binary("true");
        match shell.read("persist.unleashed.mode") {
            Ok(None) | Err(InvocationError::Stream(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
