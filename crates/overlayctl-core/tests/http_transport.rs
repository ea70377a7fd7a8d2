//! HTTP transport end to end against the fake daemon.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use overlayctl_core::rpc::{self, CallError, HandshakeError, METHOD_EXIT, METHOD_STATUS};
use overlayctl_core::status::IfnameExtractor;
use overlayctl_core::{
    ControlError, ControlSettings, Endpoint, ExitController, ExitMode, HttpTransport, RpcSession,
};
use overlayctl_test_utils::fake_daemon::{CannedReply, FakeDaemon, ReceivedCall};
use overlayctl_test_utils::status::default_status;
use overlayctl_test_utils::tracing_setup::init_test_tracing;

async fn session_for(daemon: &FakeDaemon) -> RpcSession {
    let transport = Arc::new(HttpTransport::new());
    let endpoint: Endpoint = daemon.url().parse().unwrap();
    let conn = rpc::connect(transport.as_ref(), &endpoint, Some(Duration::from_secs(5)))
        .await
        .unwrap();
    RpcSession::new(transport, conn, Some(Duration::from_secs(5)))
}

/// A one-connection daemon that answers its first request with `body`
/// verbatim, bypassing any JSON or UTF-8 handling on the server side.
async fn raw_daemon(body: &'static [u8]) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("tcp://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = stream.read(&mut buf).await;
        let head = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n",
            body.len()
        );
        stream.write_all(head.as_bytes()).await.unwrap();
        stream.write_all(body).await.unwrap();
        // keep the connection up until the client is done
        let _ = stream.read(&mut buf).await;
    });
    url
}

#[tokio::test]
async fn test_call_round_trip() {
    init_test_tracing();
    let daemon = FakeDaemon::start().await;
    daemon.set_json(METHOD_STATUS, default_status());

    let session = session_for(&daemon).await;
    let value = session.call(METHOD_STATUS, None).await.unwrap();

    assert_eq!(value, Some(default_status()));
    assert_eq!(
        daemon.received(),
        vec![ReceivedCall {
            method: METHOD_STATUS.to_string(),
            args: None,
        }]
    );
}

#[tokio::test]
async fn test_non_success_status_is_no_value() {
    let daemon = FakeDaemon::start().await;
    daemon.set_reply(METHOD_STATUS, CannedReply::status(StatusCode::SERVICE_UNAVAILABLE));

    let session = session_for(&daemon).await;
    assert_eq!(session.call(METHOD_STATUS, None).await.unwrap(), None);
    // unknown method: 404
    assert_eq!(session.call("llarp.nothing", None).await.unwrap(), None);
}

#[tokio::test]
async fn test_empty_body_is_no_value() {
    let daemon = FakeDaemon::start().await;
    daemon.set_reply(METHOD_EXIT, CannedReply::status(StatusCode::OK));

    let session = session_for(&daemon).await;
    let args = json!({"range": "0.0.0.0/0", "unmap": true});
    assert_eq!(session.call(METHOD_EXIT, Some(&args)).await.unwrap(), None);
    assert_eq!(daemon.received()[0].args, Some(args));
}

#[tokio::test]
async fn test_connection_is_reused_for_several_calls() {
    let daemon = FakeDaemon::start().await;
    daemon.set_json(METHOD_STATUS, default_status());
    daemon.set_json(METHOD_EXIT, json!({"result": "ok"}));

    let session = session_for(&daemon).await;
    for _ in 0..3 {
        assert!(session.call(METHOD_STATUS, None).await.unwrap().is_some());
    }
    assert!(session.call(METHOD_EXIT, Some(&json!({}))).await.unwrap().is_some());
    assert_eq!(daemon.received().len(), 4);
}

#[tokio::test]
async fn test_invalid_utf8_body_is_malformed() {
    let url = raw_daemon(b"{\"error\":\"\xff\xfe\"}").await;
    let transport = Arc::new(HttpTransport::new());
    let endpoint: Endpoint = url.parse().unwrap();
    let conn = rpc::connect(transport.as_ref(), &endpoint, Some(Duration::from_secs(5)))
        .await
        .unwrap();
    let session = RpcSession::new(transport, conn, Some(Duration::from_secs(5)));

    let err = session.call(METHOD_EXIT, None).await.unwrap_err();
    assert!(matches!(err, CallError::MalformedResponse { ref method, .. } if method == METHOD_EXIT));
}

#[tokio::test]
async fn test_error_status_body_is_not_read() {
    let daemon = FakeDaemon::start().await;
    daemon.set_json(METHOD_STATUS, default_status());
    daemon.set_reply(
        METHOD_EXIT,
        CannedReply {
            status: StatusCode::BAD_REQUEST,
            body: json!({"error": "bad token"}).to_string(),
        },
    );

    let endpoint: Endpoint = daemon.url().parse().unwrap();
    let mut controller =
        ExitController::new(Arc::new(HttpTransport::new()), ControlSettings::default())
            .with_extractor(&IfnameExtractor);
    let mode = ExitMode::Up {
        exit: "exit.example".to_string(),
        token: None,
    };

    // Refusals travel inside a 200; a 4xx is a failed call whatever its body.
    let err = controller.run(&endpoint, &mode).await.unwrap_err();
    assert!(matches!(err, ControlError::ExitRequestFailed));
}

#[tokio::test]
async fn test_connect_refused() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let endpoint: Endpoint = format!("tcp://127.0.0.1:{port}").parse().unwrap();
    let transport = HttpTransport::new();

    let err = rpc::connect(&transport, &endpoint, None).await.unwrap_err();
    assert!(matches!(err, HandshakeError::Failed(ref m) if m.contains("failed to connect")));
}

#[tokio::test]
async fn test_full_up_run_over_http() {
    init_test_tracing();
    let daemon = FakeDaemon::start().await;
    daemon.set_json(METHOD_STATUS, default_status());
    daemon.set_json(METHOD_EXIT, json!({"error": "token invalid"}));

    let endpoint: Endpoint = daemon.url().parse().unwrap();
    let mut controller =
        ExitController::new(Arc::new(HttpTransport::new()), ControlSettings::default())
            .with_extractor(&IfnameExtractor);
    let mode = ExitMode::Up {
        exit: "exit.example".to_string(),
        token: Some("expired".to_string()),
    };

    let err = controller.run(&endpoint, &mode).await.unwrap_err();
    assert_eq!(err.to_string(), "token invalid");

    let received = daemon.received();
    assert_eq!(received.len(), 2);
    assert_eq!(
        received[1].args,
        Some(json!({"exit": "exit.example", "range": "0.0.0.0/0", "token": "expired"}))
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_ipc_endpoint() {
    let dir = tempfile::TempDir::new().unwrap();
    let sock = dir.path().join("rpc.sock");
    let daemon = FakeDaemon::start_unix(&sock).await;
    daemon.set_json(METHOD_STATUS, default_status());

    assert!(daemon.url().starts_with("ipc://"));
    let session = session_for(&daemon).await;
    assert_eq!(
        session.call(METHOD_STATUS, None).await.unwrap(),
        Some(default_status())
    );
}
