//! Gateway over real sockets and through the in-process router.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bounce_core::BounceConfig;
use bounce_gateway::{build_router, demo, AppState, Gateway};
use bounce_protocol::Envelope;
use bounce_router::{Dispatcher, TaskState};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

fn demo_dispatcher(framerate: f64) -> Arc<Dispatcher> {
    let dispatcher = Arc::new(Dispatcher::new());
    let mut config = BounceConfig::default();
    config.demo.timed_ping_framerate = framerate;
    demo::install(&dispatcher, &config.demo).unwrap();
    dispatcher
}

struct Running {
    addr: std::net::SocketAddr,
    state: Arc<AppState>,
    stop: oneshot::Sender<()>,
    handle: tokio::task::JoinHandle<bounce_core::Result<()>>,
}

async fn start(dispatcher: Arc<Dispatcher>) -> Running {
    let mut config = BounceConfig::default();
    config.broadcast.shutdown_grace_ms = 500;
    let gateway = Gateway::new(config, dispatcher);
    let state = Arc::clone(gateway.state());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(gateway.serve(listener, async move {
        let _ = stopped.await;
    }));
    Running {
        addr,
        state,
        stop,
        handle,
    }
}

/// Next text frame whose `event` equals `event`, skipping anything else.
async fn next_event<S>(ws: &mut S, event: &str) -> Value
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + Unpin,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let value: Value = serde_json::from_str(text.as_str()).unwrap();
                    if value["event"] == event {
                        return value;
                    }
                }
                Some(Ok(_)) => {}
                other => panic!("socket ended while waiting for {event}: {other:?}"),
            }
        }
    })
    .await
    .expect("timed out waiting for frame")
}

#[tokio::test]
async fn health_reports_registered_events() {
    let state = Arc::new(AppState::new(BounceConfig::default(), demo_dispatcher(1.0)));
    let router = build_router(state);

    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["name"], "Websocket API");
    assert_eq!(health["connections"], 0);
    assert_eq!(health["handlers"], json!(["ping"]));
    assert_eq!(health["senders"], json!(["ping", "ping_timed"]));
}

#[tokio::test]
async fn ping_round_trip_over_websocket() {
    let server = start(demo_dispatcher(1.0)).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", server.addr))
        .await
        .unwrap();

    let ping = Envelope::now("ping", json!({"ping": "ping"}));
    let text = bounce_protocol::serialize(&ping).unwrap();
    ws.send(Message::Text(text.into())).await.unwrap();

    let reply = next_event(&mut ws, "ping").await;
    assert_eq!(reply["data"], json!({"ping": "ping"}));
    assert!(reply["timestamp"].is_string());

    ws.close(None).await.unwrap();
    let _ = server.stop.send(());
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn invalid_frames_keep_the_connection_open() {
    let server = start(demo_dispatcher(1.0)).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", server.addr))
        .await
        .unwrap();

    ws.send(Message::Text("{not json".into())).await.unwrap();
    ws.send(Message::Text(json!({"data": {}}).to_string().into()))
        .await
        .unwrap();
    let ping = bounce_protocol::serialize(&Envelope::now("ping", json!({}))).unwrap();
    ws.send(Message::Text(ping.into())).await.unwrap();

    let reply = next_event(&mut ws, "ping").await;
    assert_eq!(reply["data"], json!({"ping": "ping"}));

    let _ = server.stop.send(());
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn periodic_sender_broadcasts_until_shutdown() {
    let server = start(demo_dispatcher(50.0)).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", server.addr))
        .await
        .unwrap();

    let frame = next_event(&mut ws, "ping_timed").await;
    assert_eq!(frame["data"], json!({"ping": "ping"}));
    assert_eq!(server.state.scheduler.state("ping_timed"), Some(TaskState::Running));

    ws.close(None).await.unwrap();
    let _ = server.stop.send(());
    server.handle.await.unwrap().unwrap();

    assert!(server.state.scheduler.live_events().is_empty());
}

#[tokio::test]
async fn closed_client_is_detached() {
    let server = start(demo_dispatcher(1.0)).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", server.addr))
        .await
        .unwrap();

    // a round trip proves the server side has attached the connection
    let ping = bounce_protocol::serialize(&Envelope::now("ping", json!({}))).unwrap();
    ws.send(Message::Text(ping.into())).await.unwrap();
    next_event(&mut ws, "ping").await;
    assert_eq!(server.state.dispatcher.connection_count(), 1);

    ws.close(None).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while server.state.dispatcher.connection_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connection never detached");

    let _ = server.stop.send(());
    server.handle.await.unwrap().unwrap();
}
