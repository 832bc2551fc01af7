//! In-process HTTP server for scripting API responses in tests.

use std::sync::{Arc, Mutex};
use std::thread;

use tiny_http::{Header, Response, Server, StatusCode};

use crate::engine::Reporter;

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub body: String,
    pub headers: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is JSON")
    }
}

/// Serves every request through `handler(method, url, body)` until dropped.
pub(crate) struct MockServer {
    pub base_url: String,
    server: Arc<Server>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MockServer {
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, &str, &str) -> (u16, String) + Send + 'static,
    {
        let server = Arc::new(Server::http("127.0.0.1:0").expect("server"));
        let base_url = format!("http://{}", server.server_addr());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let server_thread = Arc::clone(&server);
        let requests_thread = Arc::clone(&requests);
        let handle = thread::spawn(move || {
            for mut req in server_thread.incoming_requests() {
                let mut body = String::new();
                let _ = req.as_reader().read_to_string(&mut body);
                let method = req.method().to_string();
                let url = req.url().to_string();
                let headers = req
                    .headers()
                    .iter()
                    .map(|h| (h.field.to_string(), h.value.to_string()))
                    .collect();

                let (status, payload) = handler(&method, &url, &body);
                requests_thread
                    .lock()
                    .expect("lock")
                    .push(RecordedRequest {
                        method,
                        url,
                        body,
                        headers,
                    });

                let resp = Response::from_string(payload)
                    .with_status_code(StatusCode(status))
                    .with_header(
                        Header::from_bytes("Content-Type", "application/json").expect("header"),
                    );
                let _ = req.respond(resp);
            }
        });

        Self {
            base_url,
            server,
            requests,
            handle: Some(handle),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("lock").clone()
    }

    /// Requests as `"METHOD /path"` lines, in arrival order.
    pub fn calls(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| format!("{} {}", r.method, r.url))
            .collect()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Reporter that keeps every message for assertions.
#[derive(Debug, Default)]
pub(crate) struct CollectingReporter {
    pub debugs: Vec<String>,
    pub infos: Vec<String>,
    pub warns: Vec<String>,
    pub errors: Vec<String>,
}

impl Reporter for CollectingReporter {
    fn debug(&mut self, msg: &str) {
        self.debugs.push(msg.to_string());
    }

    fn info(&mut self, msg: &str) {
        self.infos.push(msg.to_string());
    }

    fn warn(&mut self, msg: &str) {
        self.warns.push(msg.to_string());
    }

    fn error(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }
}
