//! Shared I/O channels configured on the builder.
//!
//! A channel is a cheap, cloneable handle. Clones alias the same underlying
//! stream, which is how one sink can serve as command, console and user output
//! at once. Dropping a handle never closes the caller's stream.

use crate::command::{Stdin, Stdout};
use std::fmt;
use std::io::{self, BufRead, BufReader, Cursor, IsTerminal, Read, Write};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<'a, T: ?Sized>(mutex: &'a Mutex<T>) -> io::Result<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| io::Error::other("channel lock poisoned"))
}

#[derive(Clone)]
enum Source {
    Process,
    Custom(Arc<Mutex<Box<dyn BufRead + Send>>>),
}

/// Source of command or user input.
#[derive(Clone)]
pub struct InputChannel {
    source: Source,
}

impl InputChannel {
    /// The standard input of the current process.
    pub fn stdin() -> Self {
        Self {
            source: Source::Process,
        }
    }

    /// Wrap any reader; it is buffered internally.
    pub fn new<R: Read + Send + 'static>(reader: R) -> Self {
        Self::buffered(BufReader::new(reader))
    }

    /// Wrap a reader that already buffers.
    pub fn buffered<R: BufRead + Send + 'static>(reader: R) -> Self {
        Self {
            source: Source::Custom(Arc::new(Mutex::new(Box::new(reader)))),
        }
    }

    /// In-memory input, mostly useful for scripted sessions and tests.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::buffered(Cursor::new(bytes.into()))
    }

    pub fn is_process_stdin(&self) -> bool {
        matches!(self.source, Source::Process)
    }

    /// Whether both handles read from the very same stream.
    pub fn same_channel(&self, other: &InputChannel) -> bool {
        match (&self.source, &other.source) {
            (Source::Process, Source::Process) => true,
            (Source::Custom(a), Source::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Read one line including its terminator. Returns 0 at end of input.
    ///
    /// Bytes that are not valid UTF-8 are replaced with U+FFFD.
    pub fn read_line(&self, buf: &mut String) -> io::Result<usize> {
        let mut bytes = Vec::new();
        let read = match &self.source {
            Source::Process => io::stdin().lock().read_until(b'\n', &mut bytes)?,
            Source::Custom(reader) => lock(reader)?.read_until(b'\n', &mut bytes)?,
        };
        buf.push_str(&String::from_utf8_lossy(&bytes));
        Ok(read)
    }
}

impl Read for InputChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &self.source {
            Source::Process => io::stdin().read(buf),
            Source::Custom(reader) => lock(reader)?.read(buf),
        }
    }
}

impl Stdin for InputChannel {
    /// A terminal is handed to programs directly. Piped process stdin may
    /// already sit in the session's read buffer, so programs are fed from it
    /// through a pipe. Custom readers are shared with the session and programs
    /// see an empty input.
    fn stdio(&self) -> Option<Stdio> {
        match self.source {
            Source::Process if io::stdin().is_terminal() => Some(Stdio::inherit()),
            Source::Process => None,
            Source::Custom(_) => Some(Stdio::null()),
        }
    }
}

impl fmt::Debug for InputChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            Source::Process => f.write_str("InputChannel(stdin)"),
            Source::Custom(_) => f.write_str("InputChannel(custom)"),
        }
    }
}

#[derive(Clone)]
enum Sink {
    Stdout,
    Stderr,
    Custom(Arc<Mutex<Box<dyn Write + Send>>>),
}

/// Destination for output or error text.
#[derive(Clone)]
pub struct OutputChannel {
    sink: Sink,
}

impl OutputChannel {
    pub fn stdout() -> Self {
        Self { sink: Sink::Stdout }
    }

    pub fn stderr() -> Self {
        Self { sink: Sink::Stderr }
    }

    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            sink: Sink::Custom(Arc::new(Mutex::new(Box::new(writer)))),
        }
    }

    /// Convenience: create an in-memory channel and return (channel, buffer handle).
    pub fn buffer() -> (Self, SharedBuffer) {
        let buffer = SharedBuffer::default();
        (Self::new(buffer.clone()), buffer)
    }

    pub fn is_process_stdout(&self) -> bool {
        matches!(self.sink, Sink::Stdout)
    }

    pub fn is_process_stderr(&self) -> bool {
        matches!(self.sink, Sink::Stderr)
    }

    /// Whether both handles write to the very same sink.
    pub fn same_channel(&self, other: &OutputChannel) -> bool {
        match (&self.sink, &other.sink) {
            (Sink::Stdout, Sink::Stdout) | (Sink::Stderr, Sink::Stderr) => true,
            (Sink::Custom(a), Sink::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Write for OutputChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &self.sink {
            Sink::Stdout => io::stdout().write(buf),
            Sink::Stderr => io::stderr().write(buf),
            Sink::Custom(writer) => lock(writer)?.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &self.sink {
            Sink::Stdout => io::stdout().flush(),
            Sink::Stderr => io::stderr().flush(),
            Sink::Custom(writer) => lock(writer)?.flush(),
        }
    }
}

impl Stdout for OutputChannel {
    fn stdio(&self) -> Option<Stdio> {
        match self.sink {
            Sink::Stdout => Some(io::stdout().into()),
            Sink::Stderr => Some(io::stderr().into()),
            Sink::Custom(_) => None,
        }
    }
}

impl fmt::Debug for OutputChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sink {
            Sink::Stdout => f.write_str("OutputChannel(stdout)"),
            Sink::Stderr => f.write_str("OutputChannel(stderr)"),
            Sink::Custom(_) => f.write_str("OutputChannel(custom)"),
        }
    }
}

/// Growable byte buffer shared between an [`OutputChannel`] and its creator.
#[derive(Clone, Default, Debug)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().map(|b| b.clone()).unwrap_or_default()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        lock(&self.bytes)?.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_alias_the_same_sink() {
        let (out, buf) = OutputChannel::buffer();
        let mut a = out.clone();
        let mut b = out.clone();
        write!(a, "one ").unwrap();
        write!(b, "two").unwrap();
        assert!(a.same_channel(&b));
        assert_eq!(buf.to_string_lossy(), "one two");
    }

    #[test]
    fn test_distinct_buffers_are_distinct_channels() {
        let (a, _) = OutputChannel::buffer();
        let (b, _) = OutputChannel::buffer();
        assert!(!a.same_channel(&b));
        assert!(!a.same_channel(&OutputChannel::stdout()));
        assert!(OutputChannel::stderr().same_channel(&OutputChannel::stderr()));
    }

    #[test]
    fn test_input_lines_and_raw_reads_share_position() {
        let input = InputChannel::from_bytes("first\nsecond\nrest");
        let mut line = String::new();
        input.read_line(&mut line).unwrap();
        assert_eq!(line, "first\n");

        let mut reader = input.clone();
        let mut rest = String::new();
        reader.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "second\nrest");

        line.clear();
        assert_eq!(input.read_line(&mut line).unwrap(), 0);
    }

    #[test]
    fn test_only_process_streams_are_inherited() {
        assert!(OutputChannel::stdout().stdio().is_some());
        assert!(OutputChannel::buffer().0.stdio().is_none());
        assert!(InputChannel::stdin().is_process_stdin());
        assert!(!InputChannel::from_bytes("").is_process_stdin());
    }

    #[test]
    fn test_undecodable_bytes_do_not_fail_the_read() {
        let input = InputChannel::from_bytes(&b"ok\n\xff\xfe\nnext\n"[..]);
        let mut line = String::new();
        input.read_line(&mut line).unwrap();
        line.clear();
        assert_eq!(input.read_line(&mut line).unwrap(), 3);
        assert_eq!(line, "\u{FFFD}\u{FFFD}\n");
        line.clear();
        input.read_line(&mut line).unwrap();
        assert_eq!(line, "next\n");
    }

    #[test]
    fn test_piped_process_stdin_is_fed_through_a_pipe() {
        let stdin = InputChannel::stdin();
        assert_eq!(stdin.stdio().is_some(), io::stdin().is_terminal());
        assert!(InputChannel::from_bytes("").stdio().is_some());
    }
}
