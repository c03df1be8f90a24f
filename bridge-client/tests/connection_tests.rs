// Connection behavior against scripted mock servers: fragmented delivery,
// every transport failure mode, and transparent reconnection.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use scenebridge_client::{BridgeConnection, BridgeError};
use scenebridge_protocol::{Command, FrameBuffer};

/// Bind an ephemeral port and run `script` for each accepted connection.
async fn mock_server<F, Fut>(script: F) -> SocketAddr
where
    F: Fn(TcpStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            script(stream).await;
        }
    });
    addr
}

/// Read one complete command off the stream, mirroring the host's framing.
async fn read_command(stream: &mut TcpStream) -> Command {
    let mut frame = FrameBuffer::new();
    let mut chunk = vec![0u8; 256];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending a command");
        frame.extend_from_slice(&chunk[..n]);
        if let Some(command) = frame.try_decode::<Command>() {
            return command;
        }
    }
}

#[tokio::test]
async fn response_split_into_tiny_chunks_is_reassembled() {
    let addr = mock_server(|mut stream: TcpStream| async move {
        let _ = read_command(&mut stream).await;
        let payload =
            serde_json::to_vec(&json!({"status": "success", "result": {"objects": [1, 2, 3]}}))
                .unwrap();
        for piece in payload.chunks(5) {
            stream.write_all(piece).await.unwrap();
            stream.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    let mut conn = BridgeConnection::new("127.0.0.1", addr.port());
    let result = conn.send_command("get_scene_info", Value::Null).await.unwrap();
    assert_eq!(result, json!({"objects": [1, 2, 3]}));
}

#[tokio::test]
async fn error_response_raises_with_host_message() {
    let addr = mock_server(|mut stream: TcpStream| async move {
        let _ = read_command(&mut stream).await;
        let payload =
            serde_json::to_vec(&json!({"status": "error", "message": "bad input"})).unwrap();
        stream.write_all(&payload).await.unwrap();
    })
    .await;

    let mut conn = BridgeConnection::new("127.0.0.1", addr.port());
    let err = conn
        .send_command("check_positive", json!({"x": -1}))
        .await
        .unwrap_err();
    match &err {
        BridgeError::Command(message) => assert_eq!(message, "bad input"),
        other => panic!("expected command error, got {:?}", other),
    }
    assert!(!err.is_transport());
    // An application-level rejection does not tear down the connection.
    assert!(conn.is_connected());
}

#[tokio::test]
async fn immediate_close_is_no_data() {
    let addr = mock_server(|mut stream: TcpStream| async move {
        let _ = read_command(&mut stream).await;
        // Close without replying.
    })
    .await;

    let mut conn = BridgeConnection::new("127.0.0.1", addr.port());
    let err = conn.send_command("get_scene_info", Value::Null).await.unwrap_err();
    assert!(matches!(err, BridgeError::NoData), "got {:?}", err);
    assert!(err.is_transport());
    assert!(!conn.is_connected(), "failed stream should be discarded");
}

#[tokio::test]
async fn truncated_response_is_incomplete() {
    let addr = mock_server(|mut stream: TcpStream| async move {
        let _ = read_command(&mut stream).await;
        stream.write_all(b"{\"status\": \"succ").await.unwrap();
        // Close mid-message.
    })
    .await;

    let mut conn = BridgeConnection::new("127.0.0.1", addr.port());
    let err = conn.send_command("get_scene_info", Value::Null).await.unwrap_err();
    assert!(matches!(err, BridgeError::Incomplete), "got {:?}", err);
    assert!(err.is_transport());
}

#[tokio::test]
async fn silent_server_times_out() {
    let addr = mock_server(|mut stream: TcpStream| async move {
        let _ = read_command(&mut stream).await;
        // Reply never comes; keep the socket open past the client timeout.
        tokio::time::sleep(Duration::from_secs(5)).await;
    })
    .await;

    let mut conn = BridgeConnection::new("127.0.0.1", addr.port())
        .with_read_timeout(Duration::from_millis(200));
    let err = conn.send_command("get_scene_info", Value::Null).await.unwrap_err();
    assert!(matches!(err, BridgeError::Timeout), "got {:?}", err);
    assert!(err.is_transport());
}

#[tokio::test]
async fn stalled_partial_response_times_out_as_incomplete() {
    let addr = mock_server(|mut stream: TcpStream| async move {
        let _ = read_command(&mut stream).await;
        stream.write_all(b"{\"status\": \"succ").await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    })
    .await;

    let mut conn = BridgeConnection::new("127.0.0.1", addr.port())
        .with_read_timeout(Duration::from_millis(200));
    let err = conn.send_command("get_scene_info", Value::Null).await.unwrap_err();
    assert!(matches!(err, BridgeError::Incomplete), "got {:?}", err);
}

#[tokio::test]
async fn next_call_reconnects_after_a_transport_failure() {
    // First connection is dropped without a reply; later ones are served.
    let addr = mock_server(|mut stream: TcpStream| async move {
        let command = read_command(&mut stream).await;
        if command.params.get("attempt") == Some(&json!(1)) {
            return; // drop it
        }
        let payload = serde_json::to_vec(&json!({"status": "success", "result": "ok"})).unwrap();
        stream.write_all(&payload).await.unwrap();
    })
    .await;

    let mut conn = BridgeConnection::new("127.0.0.1", addr.port());

    let err = conn
        .send_command("echo_test", json!({"attempt": 1}))
        .await
        .unwrap_err();
    assert!(err.is_transport());
    assert!(!conn.is_connected());

    // No caller-side reconnect dance: the next call opens a fresh stream.
    let result = conn.send_command("echo_test", json!({"attempt": 2})).await.unwrap();
    assert_eq!(result, json!("ok"));
    assert!(conn.is_connected());
}

#[tokio::test]
async fn non_object_params_rejected_before_any_io() {
    // Port 9 on localhost: if the client tried to connect this would surface
    // as a Connect error instead.
    let mut conn = BridgeConnection::new("127.0.0.1", 9);
    let err = conn
        .send_command("echo_test", json!([1, 2, 3]))
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::InvalidParams(_)), "got {:?}", err);
    assert!(!err.is_transport());
}

#[tokio::test]
async fn connect_to_refused_port_is_a_connect_error() {
    // Bind then immediately drop to get a port that refuses connections.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut conn = BridgeConnection::new("127.0.0.1", addr.port());
    let err = conn.send_command("get_scene_info", Value::Null).await.unwrap_err();
    assert!(matches!(err, BridgeError::Connect { .. }), "got {:?}", err);
    assert!(err.is_transport());
}
