//! Speech Dispatcher backend over a single SSIP connection.
//!
//! `connect` opens the daemon socket and names the client; the returned
//! device keeps that connection for its whole life.  `cancel` only affects
//! this client's messages, and `close` sends `QUIT`.

use std::path::PathBuf;
use std::time::Duration;

use super::ssip::{self, Reply, SsipConnection};
use super::{SpeechBackend, SpeechDevice, SpeechError, SpeechSettings};

/// Bound on every socket read and write.
const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Production [`SpeechBackend`].
#[derive(Debug, Clone, Default)]
pub struct SpeechDispatcher {
    socket: Option<PathBuf>,
}

impl SpeechDispatcher {
    /// Connect to the socket named by `SPEECHD_ADDRESS`, or the per-user
    /// default under `$XDG_RUNTIME_DIR`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_socket(path: impl Into<PathBuf>) -> Self {
        Self {
            socket: Some(path.into()),
        }
    }
}

impl SpeechBackend for SpeechDispatcher {
    fn connect(&self, client_name: &str) -> Result<Box<dyn SpeechDevice>, SpeechError> {
        let path = self
            .socket
            .clone()
            .or_else(ssip::default_socket_path)
            .ok_or_else(|| {
                SpeechError::Unavailable("cannot locate the speech-dispatcher socket".into())
            })?;

        let conn = SsipConnection::open(&path, IO_TIMEOUT).map_err(|e| {
            SpeechError::Unavailable(format!("cannot connect to {}: {e}", path.display()))
        })?;
        let mut device = SsipDevice { conn: Some(conn) };

        let user = std::env::var("USER").unwrap_or_else(|_| "user".into());
        device
            .request(&format!("SET SELF CLIENT_NAME {user}:{}:main", token(client_name)))
            .map_err(SpeechError::Unavailable)?;

        log::debug!("speech: connected to {}", path.display());
        Ok(Box::new(device))
    }
}

// ---------------------------------------------------------------------------
// SsipDevice
// ---------------------------------------------------------------------------

struct SsipDevice {
    /// `None` once closed.
    conn: Option<SsipConnection>,
}

impl SsipDevice {
    /// Send `line` and require a 2xx reply.
    fn request(&mut self, line: &str) -> Result<Reply, String> {
        let conn = self.conn.as_mut().ok_or("connection closed")?;
        let reply = conn.command(line).map_err(|e| format!("{line}: {e}"))?;
        check(line, reply)
    }
}

fn check(request: &str, reply: Reply) -> Result<Reply, String> {
    if reply.is_ok() {
        Ok(reply)
    } else {
        Err(format!("{request}: {} {}", reply.code, reply.message()))
    }
}

impl SpeechDevice for SsipDevice {
    fn configure(&mut self, settings: &SpeechSettings) -> Result<(), SpeechError> {
        let language = settings.language.trim();
        if language.is_empty() || language.contains(char::is_whitespace) {
            return Err(SpeechError::Configure(format!(
                "invalid language {:?}",
                settings.language
            )));
        }
        for line in settings_commands(settings) {
            self.request(&line).map_err(SpeechError::Configure)?;
        }
        Ok(())
    }

    fn speak(&mut self, text: &str) -> Result<(), SpeechError> {
        self.request("SPEAK").map_err(SpeechError::Rejected)?;
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| SpeechError::Rejected("connection closed".into()))?;
        let reply = conn
            .send_text(text)
            .map_err(|e| SpeechError::Rejected(e.to_string()))?;
        check("SPEAK", reply).map_err(SpeechError::Rejected)?;
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), SpeechError> {
        self.request("CANCEL SELF").map_err(SpeechError::Release)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SpeechError> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        conn.command("QUIT")
            .map_err(|e| SpeechError::Release(e.to_string()))?;
        Ok(())
    }
}

impl Drop for SsipDevice {
    fn drop(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            let _ = conn.command("QUIT");
        }
    }
}

/// `SET SELF` lines applying `settings`, in the order they are sent.
fn settings_commands(settings: &SpeechSettings) -> Vec<String> {
    vec![
        format!("SET SELF OUTPUT_MODULE {}", settings.module.as_str()),
        format!("SET SELF LANGUAGE {}", settings.language.trim()),
        format!("SET SELF RATE {}", settings.rate),
        format!("SET SELF VOLUME {}", settings.volume),
        format!("SET SELF PITCH {}", settings.pitch),
        format!("SET SELF PRIORITY {}", settings.priority.as_str()),
    ]
}

/// Client name parts are colon-separated single tokens.
fn token(name: &str) -> String {
    name.chars()
        .map(|c| if c == ':' || c.is_whitespace() { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::{Priority, VoiceModule};
    use std::io::{BufRead, BufReader, Write};
    use std::os::unix::net::UnixListener;
    use std::thread::{self, JoinHandle};

    fn settings() -> SpeechSettings {
        SpeechSettings {
            module: VoiceModule::Pico,
            language: "en".into(),
            rate: -10,
            volume: 90,
            pitch: 5,
            priority: Priority::Text,
        }
    }

    /// A one-client daemon that answers each request with the next scripted
    /// reply and returns every line it received.  Lines after a `230` reply
    /// are SPEAK data up to the lone `.`.
    fn fake_daemon(listener: UnixListener, replies: Vec<&'static str>) -> JoinHandle<Vec<String>> {
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut writer = stream.try_clone().unwrap();
            let mut reader = BufReader::new(stream);
            let mut replies = replies.into_iter();
            let mut received = Vec::new();
            let mut in_data = false;

            loop {
                let mut raw = String::new();
                if reader.read_line(&mut raw).unwrap_or(0) == 0 {
                    break;
                }
                let line = raw.trim_end_matches(['\r', '\n']).to_string();
                received.push(line.clone());
                if in_data && line != "." {
                    continue;
                }
                in_data = false;
                let Some(reply) = replies.next() else { break };
                in_data = reply.starts_with("230");
                writer.write_all(reply.as_bytes()).unwrap();
            }
            received
        })
    }

    fn daemon(
        replies: Vec<&'static str>,
    ) -> (tempfile::TempDir, SpeechDispatcher, JoinHandle<Vec<String>>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speechd.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let handle = fake_daemon(listener, replies);
        (dir, SpeechDispatcher::with_socket(path), handle)
    }

    #[test]
    fn session_maps_onto_ssip_commands() {
        let (_dir, backend, daemon) = daemon(vec![
            "208 OK CLIENT NAME SET\r\n",
            "216 OK OUTPUT MODULE SET\r\n",
            "201 OK LANGUAGE SET\r\n",
            "203 OK RATE SET\r\n",
            "218 OK VOLUME SET\r\n",
            "204 OK PITCH SET\r\n",
            "202 OK PRIORITY SET\r\n",
            "230 OK RECEIVING DATA\r\n",
            "225-1\r\n225 OK MESSAGE QUEUED\r\n",
            "210 OK CANCELED\r\n",
            "231 HAPPY HACKING\r\n",
        ]);

        let mut device = backend.connect("yt-liveread").unwrap();
        device.configure(&settings()).unwrap();
        device.speak(".dot first\nsecond").unwrap();
        device.cancel().unwrap();
        device.close().unwrap();
        // A second close is a no-op and must not send anything.
        device.close().unwrap();
        drop(device);

        let received = daemon.join().unwrap();
        assert!(received[0].starts_with("SET SELF CLIENT_NAME "));
        assert!(received[0].ends_with(":yt-liveread:main"));
        assert_eq!(
            &received[1..],
            [
                "SET SELF OUTPUT_MODULE pico",
                "SET SELF LANGUAGE en",
                "SET SELF RATE -10",
                "SET SELF VOLUME 90",
                "SET SELF PITCH 5",
                "SET SELF PRIORITY text",
                "SPEAK",
                "..dot first",
                "second",
                ".",
                "CANCEL SELF",
                "QUIT",
            ]
        );
    }

    #[test]
    fn refused_setting_is_a_configure_error() {
        let (_dir, backend, daemon) = daemon(vec![
            "208 OK CLIENT NAME SET\r\n",
            "410 ERR PARAMETER INVALID\r\n",
        ]);

        let mut device = backend.connect("c").unwrap();
        match device.configure(&settings()) {
            Err(SpeechError::Configure(msg)) => {
                assert!(msg.contains("OUTPUT_MODULE"));
                assert!(msg.contains("410"));
            }
            other => panic!("expected Configure error, got {other:?}"),
        }
        drop(device);
        daemon.join().unwrap();
    }

    #[test]
    fn refused_speak_is_rejected() {
        let (_dir, backend, daemon) = daemon(vec![
            "208 OK CLIENT NAME SET\r\n",
            "401 ERR NOT YET IMPLEMENTED\r\n",
        ]);

        let mut device = backend.connect("c").unwrap();
        assert!(matches!(device.speak("hi"), Err(SpeechError::Rejected(_))));
        drop(device);
        daemon.join().unwrap();
    }

    #[test]
    fn speak_after_close_is_rejected() {
        let (_dir, backend, daemon) = daemon(vec![
            "208 OK CLIENT NAME SET\r\n",
            "231 HAPPY HACKING\r\n",
        ]);

        let mut device = backend.connect("c").unwrap();
        device.close().unwrap();
        assert!(matches!(device.speak("hi"), Err(SpeechError::Rejected(_))));
        drop(device);
        daemon.join().unwrap();
    }

    #[test]
    fn missing_socket_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SpeechDispatcher::with_socket(dir.path().join("absent.sock"));
        match backend.connect("test") {
            Err(SpeechError::Unavailable(msg)) => assert!(msg.contains("cannot connect")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("connect should fail without a daemon"),
        }
    }

    #[test]
    fn client_name_is_a_single_token() {
        assert_eq!(token("yt liveread:x"), "yt_liveread_x");
    }
}
