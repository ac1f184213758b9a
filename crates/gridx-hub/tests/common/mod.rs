//! Test hub bound to an ephemeral port plus WebSocket client helpers.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use gridx_core::AnalyticsEngine;
use gridx_hub::{serve, AppState, HubConfig, IngestService};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(3);

/// A running hub for one test.
pub struct TestHub {
    addr: SocketAddr,
    shutdown: CancellationToken,
    service: IngestService,
}

impl TestHub {
    pub async fn start() -> Self {
        Self::start_with(HubConfig::default()).await
    }

    pub async fn start_with(config: HubConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let service = IngestService::new(AnalyticsEngine::default());
        let state = AppState::new(service.clone(), config, shutdown.clone());

        tokio::spawn(async move {
            if let Err(e) = serve(listener, state).await {
                eprintln!("test hub failed: {e}");
            }
        });

        Self {
            addr,
            shutdown,
            service,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    pub fn service(&self) -> &IngestService {
        &self.service
    }

    pub async fn connect(&self, path: &str) -> WsClient {
        let (ws, _) = connect_async(self.url(path)).await.unwrap();
        ws
    }

    pub async fn pole(&self) -> WsClient {
        self.connect("/ws/hardware/pole").await
    }

    pub async fn house(&self) -> WsClient {
        self.connect("/ws/hardware/house").await
    }

    pub async fn dashboard(&self) -> WsClient {
        self.connect("/ws/client").await
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for TestHub {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

pub async fn send_json(ws: &mut WsClient, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

pub async fn send_text(ws: &mut WsClient, text: &str) {
    ws.send(Message::Text(text.to_string())).await.unwrap();
}

/// Next text frame, or `None` on timeout or close.
pub async fn recv_text(ws: &mut WsClient) -> Option<String> {
    loop {
        let next = tokio::time::timeout(RECV_TIMEOUT, ws.next()).await.ok()??;
        match next.ok()? {
            Message::Text(text) => return Some(text),
            Message::Close(_) => return None,
            _ => continue,
        }
    }
}

pub async fn recv_json(ws: &mut WsClient) -> Value {
    let text = recv_text(ws).await.expect("no frame before timeout");
    serde_json::from_str(&text).unwrap()
}

/// Read dashboard updates until `pred` holds for one of them.
pub async fn recv_until(ws: &mut WsClient, pred: impl Fn(&Value) -> bool) -> Value {
    loop {
        let msg = recv_json(ws).await;
        assert_eq!(msg["type"], "update");
        if pred(&msg) {
            return msg;
        }
    }
}
