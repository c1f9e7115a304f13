//! Throwaway HTTP/1.1 server for unit tests.
//!
//! Binds `127.0.0.1:0`, answers each connection from a fixed route table and
//! closes it. Requests are recorded so tests can assert on hit counts and headers.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// One canned response keyed by request path (query string ignored).
pub(crate) struct MockRoute {
    pub(crate) path: String,
    pub(crate) status: u16,
    pub(crate) content_type: String,
    pub(crate) body: Vec<u8>,
    pub(crate) delay: Duration,
    pub(crate) headers: Vec<(String, String)>,
}

impl MockRoute {
    pub(crate) fn json(path: &str, status: u16, body: &str) -> Self {
        Self::bytes(path, status, "application/json", body.as_bytes().to_vec())
    }

    pub(crate) fn bytes(path: &str, status: u16, content_type: &str, body: Vec<u8>) -> Self {
        Self {
            path: path.to_string(),
            status,
            content_type: content_type.to_string(),
            body,
            delay: Duration::ZERO,
            headers: Vec::new(),
        }
    }

    pub(crate) fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

pub(crate) struct MockServer {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    pub(crate) fn start(routes: Vec<MockRoute>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to random port");
        let port = listener.local_addr().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let routes = Arc::new(routes);

        let recorded = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let routes = Arc::clone(&routes);
                let recorded = Arc::clone(&recorded);
                thread::spawn(move || {
                    let head = read_head(&mut stream);
                    let path = head
                        .lines()
                        .next()
                        .and_then(|line| line.split_whitespace().nth(1))
                        .map(|target| target.split('?').next().unwrap_or("").to_string())
                        .unwrap_or_default();
                    recorded.lock().unwrap().push(head);

                    let route = routes.iter().find(|r| r.path == path);
                    let (status, content_type, body, delay, extra) = match route {
                        Some(r) => (r.status, r.content_type.as_str(), r.body.as_slice(), r.delay, r.headers.as_slice()),
                        None => (404, "text/plain", &b"not found"[..], Duration::ZERO, &[][..]),
                    };
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }

                    let extra: String = extra.iter().map(|(k, v)| format!("{k}: {v}\r\n")).collect();
                    let header = format!(
                        "HTTP/1.1 {} MOCK\r\nContent-Length: {}\r\nContent-Type: {}\r\n{}Connection: close\r\n\r\n",
                        status,
                        body.len(),
                        content_type,
                        extra
                    );
                    let _ = stream.write_all(header.as_bytes());
                    let _ = stream.write_all(body);
                    let _ = stream.flush();
                });
            }
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            requests,
        }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Raw request heads received so far whose request line targets `path`.
    pub(crate) fn requests_to(&self, path: &str) -> Vec<String> {
        let prefix_plain = format!("GET {} ", path);
        let prefix_query = format!("GET {}?", path);
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.starts_with(&prefix_plain) || r.starts_with(&prefix_query))
            .cloned()
            .collect()
    }

    pub(crate) fn hits(&self, path: &str) -> usize {
        self.requests_to(path).len()
    }
}

fn read_head(stream: &mut std::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
