//! SSIP connection to the speech-dispatcher daemon.
//!
//! # Wire format
//!
//! ```text
//! request   SET SELF RATE 10\r\n
//! reply     203 OK RATE SET\r\n
//!
//! request   SPEAK\r\n              → 230 OK RECEIVING DATA
//! data      line\r\n ... .\r\n     (lines starting with '.' get one more '.')
//! reply     225-17\r\n             (message id)
//!           225 OK MESSAGE QUEUED\r\n
//! ```
//!
//! Replies are `NNN-text` continuation lines closed by one `NNN text` line.
//! Codes 2xx mean success.

use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// `SPEECHD_ADDRESS` prefix for a Unix socket address.
const UNIX_SOCKET_PREFIX: &str = "unix_socket:";

/// Socket the daemon listens on: `$SPEECHD_ADDRESS` when it names a Unix
/// socket, otherwise `$XDG_RUNTIME_DIR/speech-dispatcher/speechd.sock`.
pub fn default_socket_path() -> Option<PathBuf> {
    let address = std::env::var("SPEECHD_ADDRESS").ok();
    socket_path_from(address.as_deref(), dirs::runtime_dir())
}

fn socket_path_from(address: Option<&str>, runtime_dir: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = address.and_then(|a| a.strip_prefix(UNIX_SOCKET_PREFIX)) {
        return Some(PathBuf::from(path));
    }
    runtime_dir.map(|dir| dir.join("speech-dispatcher").join("speechd.sock"))
}

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

/// One complete daemon reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    /// Text of every reply line, continuation lines first.
    pub lines: Vec<String>,
}

impl Reply {
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Text of the closing line, e.g. `"OK MESSAGE QUEUED"`.
    pub fn message(&self) -> &str {
        self.lines.last().map_or("", String::as_str)
    }
}

// ---------------------------------------------------------------------------
// SsipConnection
// ---------------------------------------------------------------------------

/// An open, synchronous SSIP session.
pub struct SsipConnection {
    reader: BufReader<UnixStream>,
    writer: UnixStream,
}

impl SsipConnection {
    /// Connect to the daemon socket at `path`.  Every read and write is
    /// bounded by `timeout`.
    pub fn open(path: &Path, timeout: Duration) -> io::Result<Self> {
        Self::from_stream(UnixStream::connect(path)?, timeout)
    }

    pub fn from_stream(stream: UnixStream, timeout: Duration) -> io::Result<Self> {
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        let writer = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
        })
    }

    /// Send one command line and wait for its reply.
    pub fn command(&mut self, line: &str) -> io::Result<Reply> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\r\n")?;
        self.writer.flush()?;
        self.read_reply()
    }

    /// Send the body of a `SPEAK` request and wait for the queued reply.
    pub fn send_text(&mut self, text: &str) -> io::Result<Reply> {
        self.writer.write_all(encode_text(text).as_bytes())?;
        self.writer.flush()?;
        self.read_reply()
    }

    fn read_reply(&mut self) -> io::Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let mut raw = String::new();
            if self.reader.read_line(&mut raw)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "speech-dispatcher closed the connection",
                ));
            }
            let (code, last, text) = parse_reply_line(raw.trim_end_matches(['\r', '\n']))?;
            lines.push(text.to_string());
            if last {
                return Ok(Reply { code, lines });
            }
        }
    }
}

/// Split `NNN-text` / `NNN text` into (code, is_last_line, text).
fn parse_reply_line(line: &str) -> io::Result<(u16, bool, &str)> {
    let malformed = || {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("malformed SSIP reply: {line:?}"),
        )
    };

    let code = line
        .get(..3)
        .filter(|c| c.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|c| c.parse::<u16>().ok())
        .ok_or_else(malformed)?;
    let last = match line.as_bytes().get(3) {
        None | Some(b' ') => true,
        Some(b'-') => false,
        Some(_) => return Err(malformed()),
    };
    Ok((code, last, line.get(4..).unwrap_or("")))
}

/// Encode message text as a `SPEAK` data block, dot-stuffed and terminated.
pub fn encode_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for line in text.lines() {
        if line.starts_with('.') {
            out.push('.');
        }
        out.push_str(line);
        out.push_str("\r\n");
    }
    out.push_str(".\r\n");
    out
}
