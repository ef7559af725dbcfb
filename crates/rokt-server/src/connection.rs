//! Per-connection state for the event loop (§4.8): accept once, read
//! once, hand off to a worker. No framing, no continuation reads — the
//! first read is the whole request.

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use mio::net::TcpStream;

const MAX_REQUEST_BYTES: usize = 2048;
const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// A connection the event loop is still waiting to read a request from.
pub struct PendingConnection {
    pub stream: TcpStream,
    accepted_at: Instant,
}

impl PendingConnection {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            accepted_at: Instant::now(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.accepted_at.elapsed() > IDLE_TIMEOUT
    }

    /// Attempts a single non-blocking read of the whole request.
    ///
    /// Returns `Ok(Some(text))` once bytes have been read (the request is
    /// considered complete after the first read, per §4.8), `Ok(None)` if
    /// the socket would block with nothing read yet, or `Err` on a closed
    /// or failed socket.
    pub fn try_read_request(&mut self) -> io::Result<Option<String>> {
        let mut buf = [0u8; MAX_REQUEST_BYTES];
        match self.stream.read(&mut buf) {
            Ok(0) => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed")),
            Ok(n) => Ok(Some(String::from_utf8_lossy(&buf[..n]).into_owned())),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Writes the full response buffer to `stream`, retrying on
/// `WouldBlock` up to a 10 s deadline (§4.8 per-connection send
/// timeout), then closes. Any failure is silent — the client simply
/// sees a closed connection (§7 "errors close the socket silently").
pub fn send_response_and_close(mut stream: TcpStream, body: &[u8]) {
    let deadline = Instant::now() + IDLE_TIMEOUT;
    let mut offset = 0;
    while offset < body.len() {
        match stream.write(&body[offset..]) {
            Ok(0) => break,
            Ok(n) => offset += n,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    break;
                }
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(_) => break,
        }
    }
    let _ = stream.flush();
    let _ = stream.shutdown(std::net::Shutdown::Both);
}
