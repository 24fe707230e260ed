//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves one static body for every GET, counts requests and records the
//! last request path. Can answer with an error status, cut the body short,
//! or stall after the headers.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// 200 with the full body.
    Serve,
    /// Respond with this status and no body.
    Status(u16),
    /// Advertise the full length but close after half the body.
    Truncate,
    /// Send headers, then hang without sending the body.
    Stall,
}

pub struct ArtifactServer {
    /// Base URL without trailing slash, e.g. "http://127.0.0.1:12345".
    pub base_url: String,
    hits: Arc<AtomicUsize>,
    last_path: Arc<Mutex<Option<String>>>,
}

impl ArtifactServer {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_path(&self) -> Option<String> {
        self.last_path.lock().unwrap().clone()
    }
}

/// Starts a server in a background thread. Runs until the process exits.
pub fn start(body: Vec<u8>, behavior: Behavior) -> ArtifactServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let hits = Arc::new(AtomicUsize::new(0));
    let last_path = Arc::new(Mutex::new(None));
    {
        let hits = Arc::clone(&hits);
        let last_path = Arc::clone(&last_path);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let body = Arc::clone(&body);
                let hits = Arc::clone(&hits);
                let last_path = Arc::clone(&last_path);
                thread::spawn(move || handle(stream, &body, behavior, &hits, &last_path));
            }
        });
    }
    ArtifactServer {
        base_url: format!("http://127.0.0.1:{}", port),
        hits,
        last_path,
    }
}

fn handle(
    mut stream: std::net::TcpStream,
    body: &[u8],
    behavior: Behavior,
    hits: &AtomicUsize,
    last_path: &Mutex<Option<String>>,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = String::from_utf8_lossy(&buf[..n]);
    let mut parts = request.lines().next().unwrap_or("").split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("").to_string();
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }
    hits.fetch_add(1, Ordering::SeqCst);
    *last_path.lock().unwrap() = Some(path);

    match behavior {
        Behavior::Serve => {
            let header = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", body.len());
            let _ = stream.write_all(header.as_bytes());
            let _ = stream.write_all(body);
        }
        Behavior::Status(code) => {
            let header = format!("HTTP/1.1 {} Error\r\nContent-Length: 0\r\n\r\n", code);
            let _ = stream.write_all(header.as_bytes());
        }
        Behavior::Truncate => {
            let header = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", body.len());
            let _ = stream.write_all(header.as_bytes());
            let _ = stream.write_all(&body[..body.len() / 2]);
        }
        Behavior::Stall => {
            let header = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", body.len());
            let _ = stream.write_all(header.as_bytes());
            thread::sleep(Duration::from_secs(30));
        }
    }
}
