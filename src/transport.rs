//! Batch delivery to a remote collection endpoint

use serde::{Deserialize, Serialize};
use std::time::Duration;
use ureq::Agent;

use crate::entry::LogEntry;
use crate::error::TransmitError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const BEACON_TIMEOUT: Duration = Duration::from_secs(3);

/// How a batch leaves the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Regular request; the response decides success
    Background,
    /// Teardown delivery: fire once, only the status matters, never retried
    Beacon,
}

/// Request body for one batch.
///
/// `apiKey` is sent in the body as well as the header; collectors written
/// against the older client read it from there.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPayload {
    pub site_id: Option<String>,
    pub api_key: Option<String>,
    pub entries: Vec<LogEntry>,
}

/// Something that can move a batch to the collector
pub trait Transport: Send + Sync {
    fn send(&self, payload: &BatchPayload, mode: DeliveryMode) -> Result<(), TransmitError>;
}

#[derive(Debug, Deserialize)]
struct DeliveryAck {
    success: Option<bool>,
}

/// JSON-over-HTTP transport
pub struct HttpTransport {
    endpoint: String,
    api_key: Option<String>,
    agent: Agent,
    beacon_agent: Agent,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key,
            agent: agent_with_timeout(REQUEST_TIMEOUT),
            beacon_agent: agent_with_timeout(BEACON_TIMEOUT),
        }
    }
}

fn agent_with_timeout(timeout: Duration) -> Agent {
    Agent::config_builder().timeout_global(Some(timeout)).build().into()
}

impl Transport for HttpTransport {
    fn send(&self, payload: &BatchPayload, mode: DeliveryMode) -> Result<(), TransmitError> {
        let body = serde_json::to_string(payload)?;

        let agent = match mode {
            DeliveryMode::Background => &self.agent,
            DeliveryMode::Beacon => &self.beacon_agent,
        };

        let mut request = agent.post(&self.endpoint).header("Content-Type", "application/json");
        if let Some(ref key) = self.api_key {
            request = request.header("X-API-Key", key.as_str());
        }

        let mut response = match request.send(body.as_bytes()) {
            Ok(response) => response,
            Err(ureq::Error::StatusCode(code)) => return Err(TransmitError::Status(code)),
            Err(e) => return Err(TransmitError::Network(e.to_string())),
        };

        if mode == DeliveryMode::Beacon {
            log::debug!("Beacon delivered {} entries", payload.entries.len());
            return Ok(());
        }

        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| TransmitError::MalformedResponse(e.to_string()))?;
        let ack: DeliveryAck =
            serde_json::from_str(&text).map_err(|e| TransmitError::MalformedResponse(e.to_string()))?;

        match ack.success {
            Some(true) => Ok(()),
            Some(false) => Err(TransmitError::Rejected),
            None => Err(TransmitError::MalformedResponse("missing 'success' field".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryKind, Level};
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    struct Captured {
        headers: Vec<String>,
        body: String,
    }

    /// Serve exactly one request with the given status line and body
    fn fake_endpoint(status: &'static str, body: &'static str) -> (String, mpsc::Receiver<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut headers = Vec::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end().to_string();
                if line.is_empty() {
                    break;
                }
                if let Some(value) = line.to_lowercase().strip_prefix("content-length:") {
                    content_length = value.trim().parse().unwrap();
                }
                headers.push(line);
            }
            let mut buf = vec![0u8; content_length];
            reader.read_exact(&mut buf).unwrap();

            let mut stream = stream;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();

            let _ = tx.send(Captured {
                headers,
                body: String::from_utf8(buf).unwrap(),
            });
        });

        (format!("http://{}/collect", addr), rx)
    }

    fn payload() -> BatchPayload {
        BatchPayload {
            site_id: Some("docs".to_string()),
            api_key: Some("secret".to_string()),
            entries: vec![LogEntry::new(EntryKind::Log, Some(Level::Info), "hi", None, None, "/")],
        }
    }

    #[test]
    fn test_payload_shape() {
        let value = serde_json::to_value(BatchPayload {
            site_id: None,
            api_key: None,
            entries: vec![],
        })
        .unwrap();
        assert!(value["siteId"].is_null());
        assert!(value["apiKey"].is_null());
        assert!(value["entries"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_send_success() {
        let (url, rx) = fake_endpoint("200 OK", r#"{"success": true}"#);
        let transport = HttpTransport::new(url, Some("secret".to_string()));

        transport.send(&payload(), DeliveryMode::Background).unwrap();

        let captured = rx.recv().unwrap();
        assert!(captured.headers[0].starts_with("POST /collect"));
        assert!(captured.headers.iter().any(|h| h.eq_ignore_ascii_case("x-api-key: secret")));
        assert!(
            captured
                .headers
                .iter()
                .any(|h| h.eq_ignore_ascii_case("content-type: application/json"))
        );
        let body: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
        assert_eq!(body["siteId"], "docs");
        assert_eq!(body["apiKey"], "secret");
        assert_eq!(body["entries"][0]["message"], "hi");
    }

    #[test]
    fn test_send_rejected() {
        let (url, _rx) = fake_endpoint("200 OK", r#"{"success": false}"#);
        let transport = HttpTransport::new(url, None);
        let err = transport.send(&payload(), DeliveryMode::Background).unwrap_err();
        assert!(matches!(err, TransmitError::Rejected));
    }

    #[test]
    fn test_send_non_2xx() {
        let (url, _rx) = fake_endpoint("503 Service Unavailable", r#"{"success": true}"#);
        let transport = HttpTransport::new(url, None);
        let err = transport.send(&payload(), DeliveryMode::Background).unwrap_err();
        assert!(matches!(err, TransmitError::Status(503)));
    }

    #[test]
    fn test_send_malformed_response() {
        let (url, _rx) = fake_endpoint("200 OK", "not json");
        let transport = HttpTransport::new(url, None);
        let err = transport.send(&payload(), DeliveryMode::Background).unwrap_err();
        assert!(matches!(err, TransmitError::MalformedResponse(_)));
    }

    #[test]
    fn test_send_network_failure() {
        // Bind then drop to get a port nothing listens on
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let transport = HttpTransport::new(format!("http://127.0.0.1:{}/collect", port), None);
        let err = transport.send(&payload(), DeliveryMode::Background).unwrap_err();
        assert!(matches!(err, TransmitError::Network(_)));
    }

    #[test]
    fn test_beacon_ignores_body() {
        let (url, rx) = fake_endpoint("200 OK", "");
        let transport = HttpTransport::new(url, None);
        transport.send(&payload(), DeliveryMode::Beacon).unwrap();
        assert!(rx.recv().is_ok());
    }
}
