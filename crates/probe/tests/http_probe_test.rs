//! HttpProbe against a loopback server serving canned responses.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;

use stampede_core::HttpConfig;
use stampede_probe::{HttpProbe, ProbeClient, ProbeError};
use stampede_runner::ProbeTask;

/// Serve one HTTP response and hand back the raw request head.
fn serve_once(status_line: &'static str, body: &'static str) -> (String, mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let response = format!(
            "{status_line}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).unwrap();
        let _ = tx.send(String::from_utf8_lossy(&request).into_owned());
    });

    (format!("http://{addr}/page"), rx)
}

#[test]
fn matching_body_succeeds() {
    let (url, _request) = serve_once("HTTP/1.1 200 OK", "<html>Welcome back, tester</html>");
    let client = ProbeClient::new(&HttpConfig::default()).unwrap();
    let probe = HttpProbe::new(&url, r"Welcome back, \w+", &client).unwrap();
    assert!(probe.execute().is_ok());
}

#[test]
fn missing_pattern_fails() {
    let (url, _request) = serve_once("HTTP/1.1 200 OK", "<html>Please log in</html>");
    let client = ProbeClient::new(&HttpConfig::default()).unwrap();
    let probe = HttpProbe::new(&url, "Welcome", &client).unwrap();
    assert!(matches!(probe.check(), Err(ProbeError::NoMatch { .. })));
    assert!(probe.execute().is_err());
}

#[test]
fn error_status_fails_even_if_body_matches() {
    let (url, _request) = serve_once("HTTP/1.1 500 Internal Server Error", "Welcome");
    let client = ProbeClient::new(&HttpConfig::default()).unwrap();
    let probe = HttpProbe::new(&url, "Welcome", &client).unwrap();
    assert!(matches!(
        probe.check(),
        Err(ProbeError::Status { status: 500, .. })
    ));
}

#[test]
fn sends_cookie_and_user_agent() {
    let (url, request) = serve_once("HTTP/1.1 200 OK", "ok");
    let mut config = HttpConfig::default();
    config.set_cookie("MoodleSession=abc123");
    config.user_agent = "stampede-test/1.0".to_string();
    let client = ProbeClient::new(&config).unwrap();
    let probe = HttpProbe::new(&url, "ok", &client).unwrap();
    probe.check().unwrap();

    let head = request.recv().unwrap().to_ascii_lowercase();
    assert!(head.contains("cookie: moodlesession=abc123"), "request was: {head}");
    assert!(head.contains("user-agent: stampede-test/1.0"), "request was: {head}");
}

#[test]
fn connection_refused_is_client_error() {
    // Bind then drop to get a port with nothing listening.
    let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    let client = ProbeClient::new(&HttpConfig::default()).unwrap();
    let probe = HttpProbe::new(&format!("http://{addr}/"), "x", &client).unwrap();
    assert!(matches!(probe.check(), Err(ProbeError::Client(_))));
}
