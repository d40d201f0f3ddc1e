//! Output streams
//!
//! Standard output plus every file or command pipe opened by a redirected
//! `print`/`printf`. Each target keeps one open handle until it is closed, so
//! a `>` redirect truncates only when first opened.

use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::rc::Rc;

use awkvm_spec::Redirect;
use indexmap::map::Entry;
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::error::{Result, RuntimeError};

enum Stream {
    File(BufWriter<File>),
    Pipe {
        child: Child,
        stdin: Option<BufWriter<ChildStdin>>,
    },
    Stderr(io::Stderr),
}

impl Stream {
    fn open(redirect: Redirect, target: &str) -> io::Result<Self> {
        match redirect {
            Redirect::Pipe => {
                let mut child = Command::new("sh").arg("-c").arg(target).stdin(Stdio::piped()).spawn()?;
                let stdin = child.stdin.take().map(BufWriter::new);
                Ok(Stream::Pipe { child, stdin })
            }
            Redirect::Append => {
                let file = OpenOptions::new().append(true).create(true).open(target)?;
                Ok(Stream::File(BufWriter::new(file)))
            }
            Redirect::Truncate | Redirect::None => Ok(Stream::File(BufWriter::new(File::create(target)?))),
        }
    }

    /// Flush and release; pipes report the command's exit status
    fn close(self) -> io::Result<i32> {
        match self {
            Stream::File(mut file) => {
                file.flush()?;
                Ok(0)
            }
            Stream::Pipe { mut child, stdin } => {
                if let Some(mut stdin) = stdin {
                    stdin.flush()?;
                }
                let status = child.wait()?;
                Ok(status.code().unwrap_or(-1))
            }
            Stream::Stderr(mut err) => {
                err.flush()?;
                Ok(0)
            }
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::File(file) => file.write(buf),
            Stream::Pipe { stdin: Some(stdin), .. } => stdin.write(buf),
            Stream::Pipe { stdin: None, .. } => Err(io::Error::from(io::ErrorKind::BrokenPipe)),
            Stream::Stderr(err) => err.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::File(file) => file.flush(),
            Stream::Pipe { stdin: Some(stdin), .. } => stdin.flush(),
            Stream::Pipe { stdin: None, .. } => Ok(()),
            Stream::Stderr(err) => err.flush(),
        }
    }
}

pub struct OutputStreams {
    stdout: Box<dyn Write>,
    streams: IndexMap<String, Stream>,
}

impl OutputStreams {
    pub fn new(stdout: Box<dyn Write>) -> Self {
        Self { stdout, streams: IndexMap::new() }
    }

    /// Writer for a `print`/`printf` destination, opening it on first use
    pub fn writer(&mut self, redirect: Redirect, target: &str) -> Result<&mut dyn Write> {
        if redirect == Redirect::None || matches!(target, "/dev/stdout" | "-") {
            return Ok(&mut *self.stdout);
        }
        let stream = match self.streams.entry(target.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!(stream = entry.key().as_str(), ?redirect, "opening output stream");
                let stream = if target == "/dev/stderr" {
                    Stream::Stderr(io::stderr())
                } else {
                    if redirect == Redirect::Pipe {
                        self.stdout.flush()?;
                    }
                    Stream::open(redirect, target).map_err(|source| RuntimeError::Redirect {
                        target: target.to_string(),
                        source,
                    })?
                };
                entry.insert(stream)
            }
        };
        Ok(stream)
    }

    pub fn stdout(&mut self) -> &mut dyn Write {
        &mut *self.stdout
    }

    pub fn is_open(&self, target: &str) -> bool {
        self.streams.contains_key(target)
    }

    /// `close(target)`: the stream's status, -1 when nothing is open under
    /// that name
    pub fn close(&mut self, target: &str) -> i32 {
        match self.streams.shift_remove(target) {
            Some(stream) => stream.close().unwrap_or_else(|err| {
                warn!(stream = target, %err, "close failed");
                -1
            }),
            None => -1,
        }
    }

    /// `fflush(target)`: 0 on success, -1 when not open or on failure
    pub fn flush(&mut self, target: &str) -> i32 {
        let result = if matches!(target, "/dev/stdout" | "-") {
            self.stdout.flush()
        } else {
            match self.streams.get_mut(target) {
                Some(stream) => stream.flush(),
                None => return -1,
            }
        };
        if result.is_ok() { 0 } else { -1 }
    }

    /// `fflush()`: flush standard output and every open stream
    pub fn flush_all(&mut self) -> i32 {
        let mut status = if self.stdout.flush().is_ok() { 0 } else { -1 };
        for stream in self.streams.values_mut() {
            if stream.flush().is_err() {
                status = -1;
            }
        }
        status
    }

    /// Run `command` through the shell after flushing pending output
    pub fn system(&mut self, command: &str) -> Result<i32> {
        self.flush_all();
        let status = Command::new("sh").arg("-c").arg(command).status()?;
        Ok(status.code().unwrap_or(-1))
    }

    /// Close every stream in opening order and flush standard output
    pub fn close_all(&mut self) -> Result<()> {
        for (target, stream) in self.streams.drain(..) {
            if let Err(err) = stream.close() {
                warn!(stream = target.as_str(), %err, "close failed");
            }
        }
        self.stdout.flush()?;
        Ok(())
    }
}

/// In-memory standard output that stays readable after the VM takes it
#[derive(Clone, Default)]
pub struct SharedOutput(Rc<RefCell<Vec<u8>>>);

impl SharedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stdout_for_no_redirect() {
        let out = SharedOutput::new();
        let mut streams = OutputStreams::new(Box::new(out.clone()));
        write!(streams.writer(Redirect::None, "").unwrap(), "hi").unwrap();
        write!(streams.writer(Redirect::Truncate, "/dev/stdout").unwrap(), "!").unwrap();
        assert_eq!(out.contents(), "hi!");
        assert!(!streams.is_open("/dev/stdout"));
    }

    #[test]
    fn test_truncate_only_on_first_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "old contents\n").unwrap();
        let target = path.to_str().unwrap();

        let mut streams = OutputStreams::new(Box::new(io::sink()));
        writeln!(streams.writer(Redirect::Truncate, target).unwrap(), "one").unwrap();
        writeln!(streams.writer(Redirect::Truncate, target).unwrap(), "two").unwrap();
        assert_eq!(streams.close(target), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_append_keeps_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, "first\n").unwrap();
        let target = path.to_str().unwrap();

        let mut streams = OutputStreams::new(Box::new(io::sink()));
        writeln!(streams.writer(Redirect::Append, target).unwrap(), "second").unwrap();
        streams.close_all().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_close_unknown_target() {
        let mut streams = OutputStreams::new(Box::new(io::sink()));
        assert_eq!(streams.close("nothing"), -1);
        assert_eq!(streams.flush("nothing"), -1);
        assert_eq!(streams.flush_all(), 0);
    }

    #[test]
    fn test_open_failure_names_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("out.txt");
        let mut streams = OutputStreams::new(Box::new(io::sink()));
        let err = streams.writer(Redirect::Truncate, target.to_str().unwrap()).err().unwrap();
        assert!(matches!(err, RuntimeError::Redirect { .. }));
    }
}
