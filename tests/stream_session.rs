//! Integration tests for the stream session.
//! Each test runs a scripted websocket server on a loopback port.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::{SinkExt, StreamExt};
    use serde_json::{Value, json};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tokio_tungstenite::accept_async;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tokio_util::sync::CancellationToken;
    use url::Url;

    use ahuri::{
        Channel, PlainTextRenderer, SessionContext, SessionState, StreamSession, Termination, User,
    };

    /// What the scripted server saw.
    struct ServerLog {
        received: Vec<Value>,
        released: bool,
    }

    /// Accept one client, read the two handshake frames, send `frames`, then
    /// either close or wait for the client to go away.
    async fn serve(frames: Vec<WsMessage>, close_after: bool) -> (Url, JoinHandle<ServerLog>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let mut received = Vec::new();
            while received.len() < 2 {
                match ws.next().await {
                    Some(Ok(WsMessage::Text(text))) => {
                        received.push(serde_json::from_str(text.as_str()).unwrap());
                    }
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
            for frame in frames {
                if ws.send(frame).await.is_err() {
                    break;
                }
            }
            if close_after {
                let _ = ws.close(None).await;
            }
            // Finishes only once the client sends a close frame or goes away.
            let released = loop {
                match ws.next().await {
                    Some(Ok(WsMessage::Close(_))) | None => break true,
                    Some(Err(_)) => break false,
                    Some(Ok(_)) => {}
                }
            };
            ServerLog { received, released }
        });
        (Url::parse(&format!("ws://{addr}")).unwrap(), handle)
    }

    fn context(ws_url: Url) -> SessionContext {
        SessionContext::new(
            "secret-token",
            "c1",
            Url::parse("http://127.0.0.1:1").unwrap(),
            ws_url,
            "T",
        )
        .unwrap()
    }

    fn message(id: &str, username: &str, content: &str) -> WsMessage {
        let frame = json!({
            "payload": {
                "content": content,
                "sender": {"id": id, "username": username, "tag": "0001"}
            }
        });
        WsMessage::Text(frame.to_string().into())
    }

    async fn finish(handle: JoinHandle<ServerLog>) -> ServerLog {
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("server did not see the socket released")
            .unwrap()
    }

    #[tokio::test]
    async fn test_handshake_order() {
        let (url, server) = serve(Vec::new(), true).await;
        let mut session = StreamSession::connect(context(url)).await.unwrap();
        let mut renderer = PlainTextRenderer::with_writer(Vec::new());
        let termination = session.run(&mut renderer, &CancellationToken::new()).await;
        assert!(matches!(termination, Termination::RemoteClosed));

        let log = finish(server).await;
        assert_eq!(
            log.received,
            vec![
                json!({"command": "authorize", "arguments": {"token": "secret-token"}}),
                json!({"command": "open channel", "arguments": {"id": "c1"}}),
            ]
        );
    }

    #[tokio::test]
    async fn test_banner_names_channel_and_owner() {
        let (url, server) = serve(vec![message("u1", "alice", "hi")], true).await;
        let channel = Channel {
            id: "c1".to_string(),
            name: "general".to_string(),
            owner: User::new("u1", "alice", "0001"),
            created_at: None,
        };
        let mut session = StreamSession::connect(context(url))
            .await
            .unwrap()
            .with_channel(channel);
        assert!(matches!(session.state(), SessionState::Connecting));

        let mut renderer = PlainTextRenderer::with_writer(Vec::new());
        session.run(&mut renderer, &CancellationToken::new()).await;
        finish(server).await;

        let output = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(output.starts_with(
            "<i> Success!\n\
             <i> You are now connected to channel 'general' owned by alice.0001\n"
        ));
    }

    #[tokio::test]
    async fn test_grouping_and_remote_close() {
        let frames = vec![
            message("u1", "alice", "one"),
            message("u1", "alice", "two"),
            WsMessage::Ping(Vec::new().into()),
            message("u2", "bob", "three"),
        ];
        let (url, server) = serve(frames, true).await;
        let mut session = StreamSession::connect(context(url)).await.unwrap();
        let mut renderer = PlainTextRenderer::with_writer(Vec::new());
        let termination = session.run(&mut renderer, &CancellationToken::new()).await;

        assert!(termination.is_clean());
        assert!(matches!(termination, Termination::RemoteClosed));
        assert!(session.state().is_terminated());
        assert_eq!(session.last_sender(), Some("u2"));
        finish(server).await;

        let output = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(
            output,
            "<i> Success!\n\
             \n\
             alice.0001 at T\n\
             > one\n\
             T > two\n\
             \n\
             bob.0001 at T\n\
             > three\n\
             \n\
             <!> Connection closed by server. Exiting\n"
        );
    }

    #[tokio::test]
    async fn test_binary_frames_are_decoded() {
        let frame = json!({
            "payload": {"content": "bytes", "sender": {"id": "u1", "username": "alice", "tag": "0001"}}
        });
        let frames = vec![WsMessage::Binary(frame.to_string().into_bytes().into())];
        let (url, server) = serve(frames, true).await;
        let mut session = StreamSession::connect(context(url)).await.unwrap();
        let mut renderer = PlainTextRenderer::with_writer(Vec::new());
        session.run(&mut renderer, &CancellationToken::new()).await;
        finish(server).await;

        let output = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(output.contains("alice.0001 at T\n> bytes\n"));
    }

    #[tokio::test]
    async fn test_invalid_response_ends_stream() {
        let frames = vec![
            message("u1", "alice", "before"),
            WsMessage::Text(r#"{"payload":null,"message":"channel closed"}"#.into()),
            message("u1", "alice", "never rendered"),
        ];
        let (url, server) = serve(frames, false).await;
        let mut session = StreamSession::connect(context(url)).await.unwrap();
        let mut renderer = PlainTextRenderer::with_writer(Vec::new());
        let termination = session.run(&mut renderer, &CancellationToken::new()).await;

        match &termination {
            Termination::InvalidResponse(diagnostic) => {
                assert!(diagnostic.contains("channel closed"));
            }
            other => panic!("expected invalid response, got {other:?}"),
        }
        assert!(!termination.is_clean());
        assert!(finish(server).await.released);

        let output = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(output.contains(
            "\n<!> Invalid websocket response returned. Message: channel closed\n<!> Exiting\n"
        ));
        assert!(!output.contains("never rendered"));
    }

    #[tokio::test]
    async fn test_invalid_response_without_message_dumps_frame() {
        let frames = vec![WsMessage::Text(r#"{"status":"odd"}"#.into())];
        let (url, server) = serve(frames, false).await;
        let mut session = StreamSession::connect(context(url)).await.unwrap();
        let mut renderer = PlainTextRenderer::with_writer(Vec::new());
        let termination = session.run(&mut renderer, &CancellationToken::new()).await;
        assert!(matches!(termination, Termination::InvalidResponse(_)));
        finish(server).await;

        let output = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(output.contains("<!> Invalid websocket response returned. Websocket response:\n{\n"));
        assert!(output.contains("\"status\": \"odd\""));
    }

    #[tokio::test]
    async fn test_decode_error_releases_socket() {
        let frames = vec![WsMessage::Text(r#"{"payload": {"content""#.into())];
        let (url, server) = serve(frames, false).await;
        let mut session = StreamSession::connect(context(url)).await.unwrap();
        let mut renderer = PlainTextRenderer::with_writer(Vec::new());
        let termination = session.run(&mut renderer, &CancellationToken::new()).await;

        match termination {
            Termination::DecodeError(err) => assert!(err.is_decode()),
            other => panic!("expected decode error, got {other:?}"),
        }
        // The session is still alive here, so the server only finishes if the
        // socket was closed explicitly.
        assert!(finish(server).await.released);
        drop(session);
    }

    #[tokio::test]
    async fn test_cancellation_is_clean() {
        let (url, server) = serve(vec![message("u1", "alice", "hi")], false).await;
        let mut session = StreamSession::connect(context(url)).await.unwrap();
        let mut renderer = PlainTextRenderer::with_writer(Vec::new());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let termination = session.run(&mut renderer, &cancel).await;
        assert!(matches!(termination, Termination::Cancelled));
        assert!(termination.clone().into_result().is_ok());
        assert!(finish(server).await.released);

        let output = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(output.contains("> hi\n"));
        assert!(output.ends_with("\n<!> Keyboard Interrupt sent. Exiting\n"));
        drop(session);
    }

    #[tokio::test]
    async fn test_run_twice_fails() {
        let (url, server) = serve(Vec::new(), true).await;
        let mut session = StreamSession::connect(context(url)).await.unwrap();
        let mut renderer = PlainTextRenderer::with_writer(Vec::new());
        session.run(&mut renderer, &CancellationToken::new()).await;
        finish(server).await;

        let again = session.run(&mut renderer, &CancellationToken::new()).await;
        assert!(matches!(again, Termination::Failed(_)));
    }

    #[tokio::test]
    async fn test_connection_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("ws://{addr}")).unwrap();
        let err = match StreamSession::connect(context(url)).await {
            Ok(_) => panic!("connected to a closed port"),
            Err(err) => err,
        };
        assert!(err.is_connection());
    }
}
