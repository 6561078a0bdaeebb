use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_stream::stream;
use chatrelay_ai::{FragmentStream, LlmClient, MockLlmClient, MockReply, MockStep, SharedLlmClient};
use chatrelay_server::config::DEFAULT_GREETING;
use chatrelay_server::{AppState, Envelope, HttpServer, ServerConfig};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const READ_TIMEOUT: Duration = Duration::from_secs(5);

async fn start_server(client: SharedLlmClient) -> SocketAddr {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..ServerConfig::default()
    };
    let state = AppState::new(client, config.greeting.clone());
    let server = HttpServer::new(config, state);

    let listener = server.bind().await.expect("failed to bind test server");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        server
            .serve(listener, std::future::pending())
            .await
            .expect("test server failed");
    });
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/chat", addr))
        .await
        .expect("failed to connect");
    ws
}

/// Next data or close frame, skipping control frames.
async fn next_frame(ws: &mut Client) -> Option<Message> {
    loop {
        let frame = timeout(READ_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a frame");
        match frame {
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(message)) => return Some(message),
            Some(Err(_)) | None => return None,
        }
    }
}

async fn next_text(ws: &mut Client) -> String {
    match next_frame(ws).await {
        Some(Message::Text(text)) => text.to_string(),
        other => panic!("expected text frame, got {:?}", other),
    }
}

async fn next_envelope(ws: &mut Client) -> Envelope {
    let text = next_text(ws).await;
    serde_json::from_str(&text).unwrap_or_else(|err| panic!("bad envelope {}: {}", text, err))
}

/// Read envelopes up to and including `done`.
async fn read_turn(ws: &mut Client) -> Vec<Envelope> {
    let mut envelopes = Vec::new();
    loop {
        let envelope = next_envelope(ws).await;
        let done = envelope.is_done();
        envelopes.push(envelope);
        if done {
            return envelopes;
        }
    }
}

async fn send_prompt(ws: &mut Client, prompt: &str) {
    ws.send(Message::Text(prompt.into()))
        .await
        .expect("failed to send prompt");
}

#[tokio::test]
async fn greeting_is_the_first_frame() {
    let addr = start_server(Arc::new(MockLlmClient::new("mock"))).await;
    let mut ws = connect(addr).await;

    assert_eq!(next_text(&mut ws).await, DEFAULT_GREETING);
}

#[tokio::test]
async fn fragments_are_relayed_in_order_then_done() {
    let mock = MockLlmClient::from_replies(
        "mock",
        vec![MockReply::fragments(["Hel", "lo ", "world"])],
    );
    let addr = start_server(Arc::new(mock.clone())).await;
    let mut ws = connect(addr).await;
    next_text(&mut ws).await;

    send_prompt(&mut ws, "say hello").await;

    assert_eq!(
        read_turn(&mut ws).await,
        vec![
            Envelope::chunk("Hel"),
            Envelope::chunk("lo "),
            Envelope::chunk("world"),
            Envelope::done(),
        ]
    );
    assert_eq!(mock.prompts().await, vec!["say hello"]);
}

#[tokio::test]
async fn done_frame_has_no_content_field() {
    let mock = MockLlmClient::from_replies("mock", vec![MockReply::default()]);
    let addr = start_server(Arc::new(mock)).await;
    let mut ws = connect(addr).await;
    next_text(&mut ws).await;

    send_prompt(&mut ws, "").await;

    assert_eq!(next_text(&mut ws).await, r#"{"type":"done"}"#);
}

#[tokio::test]
async fn payloads_are_not_altered() {
    let fragments = ["  padded  ", "line\nbreak", "ünïcødé 🦀", "", "\"json\" {}"];
    let mock = MockLlmClient::from_replies("mock", vec![MockReply::fragments(fragments)]);
    let addr = start_server(Arc::new(mock)).await;
    let mut ws = connect(addr).await;
    next_text(&mut ws).await;

    send_prompt(&mut ws, "x").await;
    let envelopes = read_turn(&mut ws).await;

    let payloads: Vec<&str> = envelopes
        .iter()
        .filter_map(|envelope| envelope.content.as_deref())
        .collect();
    assert_eq!(payloads, fragments);
    assert_eq!(envelopes.len(), fragments.len() + 1);
}

#[tokio::test]
async fn turns_are_served_one_at_a_time() {
    let slow_first = MockReply::new(vec![
        MockStep::fragment("one-a").with_delay(50),
        MockStep::fragment("one-b").with_delay(50),
    ]);
    let mock = MockLlmClient::from_replies(
        "mock",
        vec![slow_first, MockReply::fragments(["two"])],
    );
    let addr = start_server(Arc::new(mock.clone())).await;
    let mut ws = connect(addr).await;
    next_text(&mut ws).await;

    send_prompt(&mut ws, "first").await;
    send_prompt(&mut ws, "second").await;

    assert_eq!(
        read_turn(&mut ws).await,
        vec![
            Envelope::chunk("one-a"),
            Envelope::chunk("one-b"),
            Envelope::done()
        ]
    );
    assert_eq!(
        read_turn(&mut ws).await,
        vec![Envelope::chunk("two"), Envelope::done()]
    );
    assert_eq!(mock.prompts().await, vec!["first", "second"]);
}

#[tokio::test]
async fn flooded_prompts_are_all_answered_in_order() {
    let slow_first = MockReply::new(vec![MockStep::fragment("slow").with_delay(200)]);
    let mock = MockLlmClient::from_replies("mock", vec![slow_first]);
    let addr = start_server(Arc::new(mock.clone())).await;
    let mut ws = connect(addr).await;
    next_text(&mut ws).await;

    send_prompt(&mut ws, "first").await;
    let extra: Vec<String> = (0..20).map(|index| format!("p{}", index)).collect();
    for prompt in &extra {
        send_prompt(&mut ws, prompt).await;
    }

    assert_eq!(
        read_turn(&mut ws).await,
        vec![Envelope::chunk("slow"), Envelope::done()]
    );
    for prompt in &extra {
        assert_eq!(
            read_turn(&mut ws).await,
            vec![Envelope::chunk(prompt.as_str()), Envelope::done()]
        );
    }

    let mut expected = vec!["first".to_string()];
    expected.extend(extra);
    assert_eq!(mock.prompts().await, expected);
}

#[tokio::test]
async fn generation_failure_closes_without_done() {
    let mock = MockLlmClient::from_replies(
        "mock",
        vec![MockReply::fragments(["partial"]).then_fail("model exploded")],
    );
    let addr = start_server(Arc::new(mock)).await;
    let mut ws = connect(addr).await;
    next_text(&mut ws).await;

    send_prompt(&mut ws, "x").await;

    assert_eq!(next_envelope(&mut ws).await, Envelope::chunk("partial"));
    match next_frame(&mut ws).await {
        Some(Message::Close(Some(frame))) => {
            assert_eq!(frame.code, CloseCode::Error);
            assert_eq!(frame.reason.as_str(), "generation failed");
        }
        other => panic!("expected close frame, got {:?}", other),
    }
    assert!(next_frame(&mut ws).await.is_none());
}

#[tokio::test]
async fn each_connection_is_independent() {
    let addr = start_server(Arc::new(MockLlmClient::new("mock"))).await;
    let mut first = connect(addr).await;
    let mut second = connect(addr).await;
    next_text(&mut first).await;
    next_text(&mut second).await;

    send_prompt(&mut first, "alpha beta").await;
    send_prompt(&mut second, "gamma").await;

    assert_eq!(
        read_turn(&mut second).await,
        vec![Envelope::chunk("gamma"), Envelope::done()]
    );
    assert_eq!(
        read_turn(&mut first).await,
        vec![
            Envelope::chunk("alpha "),
            Envelope::chunk("beta"),
            Envelope::done()
        ]
    );
}

/// Emits three fragments slowly and records how far it got and whether the
/// stream was dropped.
#[derive(Default)]
struct ObservedClient {
    produced: Arc<AtomicUsize>,
    dropped: Arc<AtomicBool>,
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl LlmClient for ObservedClient {
    fn provider(&self) -> &str {
        "observed"
    }

    fn model(&self) -> &str {
        "observed"
    }

    fn chat_stream(&self, _prompt: String) -> FragmentStream {
        let produced = self.produced.clone();
        let dropped = self.dropped.clone();
        Box::pin(stream! {
            let _guard = DropFlag(dropped);
            for index in 0..3 {
                if index > 0 {
                    tokio::time::sleep(Duration::from_millis(300)).await;
                }
                produced.fetch_add(1, Ordering::SeqCst);
                yield Ok(format!("chunk-{}", index));
            }
        })
    }
}

#[tokio::test]
async fn disconnect_mid_stream_cancels_generation() {
    let client = Arc::new(ObservedClient::default());
    let produced = client.produced.clone();
    let dropped = client.dropped.clone();
    let addr = start_server(client).await;
    let mut ws = connect(addr).await;
    next_text(&mut ws).await;

    send_prompt(&mut ws, "long answer please").await;
    assert_eq!(next_envelope(&mut ws).await, Envelope::chunk("chunk-0"));

    ws.close(None).await.expect("client close");
    drop(ws);

    timeout(Duration::from_secs(2), async {
        while !dropped.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("generation stream should be dropped after disconnect");

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(produced.load(Ordering::SeqCst), 1);
}
