//! Exercises the HTTP backend against a one-shot local server.

use std::io::{BufRead, BufReader, Cursor, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use voiceover_backend::{BackendConfig, BackendError, HttpSynthesisBackend, SynthesisBackend};

/// Serve exactly one response and report the request line that was received.
fn serve_once(status: &str, content_type: &str, body: Vec<u8>) -> (String, mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub server");
    let addr = listener.local_addr().expect("local addr");
    let (tx, rx) = mpsc::channel();
    let status = status.to_owned();
    let content_type = content_type.to_owned();

    thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
        let mut request_line = String::new();
        reader.read_line(&mut request_line).expect("read request line");
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).expect("read header") == 0 || line == "\r\n" {
                break;
            }
        }
        tx.send(request_line.trim_end().to_owned()).expect("report request");

        let mut stream = stream;
        let head = format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        // The client may hang up early on error statuses.
        let _ = stream.write_all(head.as_bytes());
        let _ = stream.write_all(&body);
    });

    (format!("http://{addr}/api/tts?"), rx)
}

fn wav_bytes() -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("wav writer");
        for i in 0..160 {
            writer.write_sample((i * 100) as i16).expect("write sample");
        }
        writer.finalize().expect("finalize wav");
    }
    cursor.into_inner()
}

#[test]
fn test_synthesize_returns_body_and_content_type() {
    let body = wav_bytes();
    let (server, requests) = serve_once("200 OK", "audio/wav", body.clone());
    let backend = HttpSynthesisBackend::new(server).expect("backend");

    let audio = backend.synthesize("Hi there!").expect("synthesize");
    assert_eq!(audio.bytes, body);
    assert_eq!(audio.content_type.as_deref(), Some("audio/wav"));
    assert_eq!(audio.extension_hint(), Some("wav"));

    let request = requests
        .recv_timeout(Duration::from_secs(5))
        .expect("request line");
    assert_eq!(request, "GET /api/tts?text=Hi%20there%21 HTTP/1.1");
}

#[test]
fn test_non_success_status_is_reported() {
    let (server, _requests) = serve_once("503 Service Unavailable", "text/plain", b"busy".to_vec());
    let backend = HttpSynthesisBackend::new(server).expect("backend");

    match backend.synthesize("Hi") {
        Err(BackendError::Status { status, url }) => {
            assert_eq!(status.as_u16(), 503);
            assert!(url.ends_with("text=Hi"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[test]
fn test_empty_body_is_reported() {
    let (server, _requests) = serve_once("200 OK", "audio/wav", Vec::new());
    let backend = HttpSynthesisBackend::new(server).expect("backend");

    assert!(matches!(
        backend.synthesize("Hi"),
        Err(BackendError::EmptyBody { .. })
    ));
}

#[test]
fn test_unreachable_server_is_a_request_error() {
    // Bind then drop to get a port nobody listens on.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };
    let config = BackendConfig {
        timeout: Duration::from_secs(2),
        connect_timeout: Duration::from_secs(1),
    };
    let backend =
        HttpSynthesisBackend::new_with_config(format!("http://127.0.0.1:{port}/?"), config)
            .expect("backend");

    assert!(matches!(
        backend.synthesize("Hi"),
        Err(BackendError::Request(_))
    ));
}

#[test]
fn test_invalid_base_url_rejected() {
    assert!(matches!(
        HttpSynthesisBackend::new("not a url"),
        Err(BackendError::InvalidBaseUrl { .. })
    ));
}
