// ABOUTME: Control plane: frames minimal HTTP POSTs from accepted sockets and routes /sendSMS
// ABOUTME: One request per connection; every response closes the connection

use crate::client::SmppError;
use crate::connection::{Received, write_all};
use bytes::BytesMut;
use serde::Deserialize;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::trace;

/// A control connection may buffer at most this much.
pub const MAX_REQUEST_SIZE: usize = 64 * 1024;

const HEADER_END: &[u8] = b"\r\n\r\n";

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("request exceeds {MAX_REQUEST_SIZE} bytes")]
    TooLarge,

    #[error("POST without Content-Length")]
    MissingContentLength,

    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("method {0} not allowed")]
    MethodNotAllowed(String),

    #[error("no route for {0}")]
    NotFound(String),

    #[error("invalid JSON body: {0}")]
    BadJson(#[from] serde_json::Error),

    #[error("no bound SMSC available")]
    Unavailable,

    #[error("submission failed: {0}")]
    Submit(#[from] SmppError),
}

impl ControlError {
    pub fn status_code(&self) -> u16 {
        match self {
            ControlError::TooLarge => 413,
            ControlError::MissingContentLength
            | ControlError::BadRequest(_)
            | ControlError::BadJson(_) => 400,
            ControlError::MethodNotAllowed(_) => 405,
            ControlError::NotFound(_) => 404,
            ControlError::Unavailable => 503,
            ControlError::Submit(SmppError::FieldTooLong { .. } | SmppError::InvalidOptions(_)) => {
                400
            }
            ControlError::Submit(_) => 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

/// Frame one request out of `buf`.
///
/// `Ok(None)` means more bytes are needed: either the blank line ending the
/// headers or `Content-Length` body bytes have not all arrived.
pub fn parse_request(buf: &[u8]) -> Result<Option<HttpRequest>, ControlError> {
    let Some(header_len) = buf
        .windows(HEADER_END.len())
        .position(|w| w == HEADER_END)
        .map(|at| at + HEADER_END.len())
    else {
        return if buf.len() >= MAX_REQUEST_SIZE {
            Err(ControlError::TooLarge)
        } else {
            Ok(None)
        };
    };

    let head = std::str::from_utf8(&buf[..header_len])
        .map_err(|_| ControlError::BadRequest("header is not UTF-8".into()))?;
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(path)) = (parts.next(), parts.next()) else {
        return Err(ControlError::BadRequest(format!("request line {request_line:?}")));
    };

    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .map(|(_, value)| {
            value
                .trim()
                .parse::<usize>()
                .map_err(|_| ControlError::BadRequest(format!("Content-Length {value:?}")))
        })
        .transpose()?;

    let body_len = match content_length {
        Some(len) => len,
        None if method == "POST" => return Err(ControlError::MissingContentLength),
        None => 0,
    };
    if header_len + body_len > MAX_REQUEST_SIZE {
        return Err(ControlError::TooLarge);
    }
    if buf.len() < header_len + body_len {
        return Ok(None);
    }

    Ok(Some(HttpRequest {
        method: method.to_string(),
        path: path.to_string(),
        body: buf[header_len..header_len + body_len].to_vec(),
    }))
}

/// Body of `POST /sendSMS`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendRequest {
    #[serde(rename = "phoneNo", default)]
    pub phone_no: Option<String>,
    #[serde(rename = "phoneNos", default)]
    pub phone_nos: Vec<String>,
    pub message: String,
}

impl SendRequest {
    pub fn destinations(&self) -> Vec<String> {
        self.phone_no
            .iter()
            .chain(self.phone_nos.iter())
            .filter(|phone| !phone.is_empty())
            .cloned()
            .collect()
    }
}

/// Route a framed request. Only `POST /sendSMS` is served.
pub fn route(request: &HttpRequest) -> Result<SendRequest, ControlError> {
    let path = request.path.split('?').next().unwrap_or_default();
    if path != "/sendSMS" {
        return Err(ControlError::NotFound(request.path.clone()));
    }
    if request.method != "POST" {
        return Err(ControlError::MethodNotAllowed(request.method.clone()));
    }

    let send: SendRequest = serde_json::from_slice(&request.body)?;
    if send.destinations().is_empty() {
        return Err(ControlError::BadRequest("no phoneNo or phoneNos".into()));
    }
    Ok(send)
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        503 => "Service Unavailable",
        _ => "Internal Server Error",
    }
}

pub fn render_response(status: u16, message: &str) -> String {
    let reason = reason_phrase(status);
    let body = format!(
        "<html><head><title>{status} {reason}</title></head><body><p>{message}</p></body></html>"
    );
    format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

/// One accepted control connection and the bytes read from it so far.
#[derive(Debug)]
pub struct ControlSession {
    stream: Arc<TcpStream>,
    peer: SocketAddr,
    buf: BytesMut,
}

impl ControlSession {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        ControlSession {
            stream: Arc::new(stream),
            peer,
            buf: BytesMut::with_capacity(1024),
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn readiness(&self) -> Arc<TcpStream> {
        Arc::clone(&self.stream)
    }

    /// One non-blocking read into the session buffer.
    pub fn read(&mut self) -> io::Result<Received> {
        self.buf.reserve(4 * 1024);
        match self.stream.try_read_buf(&mut self.buf) {
            Ok(0) => Ok(Received::Closed),
            Ok(n) => {
                trace!(peer = %self.peer, len = n, "control bytes");
                Ok(Received::Data(n))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(Received::WouldBlock),
            Err(e) => Err(e),
        }
    }

    pub fn request(&self) -> Result<Option<HttpRequest>, ControlError> {
        parse_request(&self.buf)
    }

    pub async fn respond(&self, status: u16, message: &str) -> io::Result<()> {
        write_all(&self.stream, render_response(status, message).as_bytes()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(path: &str, body: &str) -> Vec<u8> {
        format!(
            "POST {path} HTTP/1.1\r\nHost: gw\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        )
        .into_bytes()
    }

    #[test]
    fn waits_for_headers_and_body() {
        let full = post("/sendSMS", r#"{"phoneNo":"111","message":"hi"}"#);
        let header_end = full.windows(4).position(|w| w == b"\r\n\r\n").unwrap();

        assert_eq!(parse_request(&full[..header_end]).unwrap(), None);
        assert_eq!(parse_request(&full[..full.len() - 1]).unwrap(), None);

        let request = parse_request(&full).unwrap().unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/sendSMS");
        assert_eq!(request.body, br#"{"phoneNo":"111","message":"hi"}"#);
    }

    #[test]
    fn content_length_is_case_insensitive_and_required_for_post() {
        let request = parse_request(b"POST /sendSMS HTTP/1.1\r\ncontent-length: 2\r\n\r\n{}")
            .unwrap()
            .unwrap();
        assert_eq!(request.body, b"{}");

        let err = parse_request(b"POST /sendSMS HTTP/1.1\r\nHost: gw\r\n\r\n").unwrap_err();
        assert_eq!(err.status_code(), 400);

        let request = parse_request(b"GET / HTTP/1.1\r\n\r\n").unwrap().unwrap();
        assert!(request.body.is_empty());
    }

    #[test]
    fn oversized_requests_are_refused() {
        let err = parse_request(&vec![b'a'; MAX_REQUEST_SIZE]).unwrap_err();
        assert_eq!(err.status_code(), 413);

        let head = format!("POST /sendSMS HTTP/1.1\r\nContent-Length: {MAX_REQUEST_SIZE}\r\n\r\n");
        let err = parse_request(head.as_bytes()).unwrap_err();
        assert!(matches!(err, ControlError::TooLarge));
    }

    #[test]
    fn routes_single_and_bulk_sends() {
        let request = parse_request(&post("/sendSMS", r#"{"phoneNo":"111","message":"hi"}"#))
            .unwrap()
            .unwrap();
        let send = route(&request).unwrap();
        assert_eq!(send.destinations(), vec!["111".to_string()]);
        assert_eq!(send.message, "hi");

        let request = parse_request(&post(
            "/sendSMS",
            r#"{"phoneNos":["111","222"],"message":"all"}"#,
        ))
        .unwrap()
        .unwrap();
        assert_eq!(route(&request).unwrap().destinations().len(), 2);
    }

    #[test]
    fn route_errors_map_to_status_codes() {
        let request = parse_request(&post("/other", "{}")).unwrap().unwrap();
        assert_eq!(route(&request).unwrap_err().status_code(), 404);

        let request = parse_request(b"GET /sendSMS HTTP/1.1\r\n\r\n").unwrap().unwrap();
        assert_eq!(route(&request).unwrap_err().status_code(), 405);

        let request = parse_request(&post("/sendSMS", "{not json")).unwrap().unwrap();
        assert_eq!(route(&request).unwrap_err().status_code(), 400);

        let request = parse_request(&post("/sendSMS", r#"{"message":"hi"}"#))
            .unwrap()
            .unwrap();
        assert_eq!(route(&request).unwrap_err().status_code(), 400);

        assert_eq!(ControlError::Unavailable.status_code(), 503);
    }

    #[test]
    fn responses_close_the_connection() {
        let response = render_response(200, "queued");
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Connection: close\r\n"));
        assert!(response.ends_with("<p>queued</p></body></html>"));
    }
}
