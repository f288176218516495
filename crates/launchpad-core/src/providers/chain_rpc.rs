use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use serde_derive::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

type PendingRequests = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, ChainRpcError>>>>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainRpcError {
    #[error("unable to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },
    #[error("connection closed")]
    Closed,
    #[error("error (code {code}): {message}")]
    Rpc { code: i64, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Chain name and runtime version reported by `state_getRuntimeVersion`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChainIdentity {
    #[serde(rename = "specName")]
    pub name: String,
    #[serde(rename = "specVersion")]
    pub version: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CreatedBlock {
    pub hash: String,
}

/// JSON-RPC 2.0 client over a single websocket connection.
///
/// Requests are matched to responses by id, so several requests may be in flight at once.
pub struct ChainRpcClient {
    next_id: AtomicU64,
    closed: AtomicBool,
    outgoing: mpsc::UnboundedSender<Message>,
    pending: PendingRequests,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl ChainRpcClient {
    pub async fn connect(endpoint: &str) -> Result<Self, ChainRpcError> {
        let (socket, _) = connect_async(endpoint).await.map_err(|e| ChainRpcError::Connect {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        let (mut sink, mut stream) = socket.split();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
        let pending: PendingRequests = Arc::new(Mutex::new(HashMap::new()));

        let writer = tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if sink.send(message).await.is_err() || closing {
                    break;
                }
            }
        });

        let routes = pending.clone();
        let reader = tokio::spawn(async move {
            while let Some(Ok(message)) = stream.next().await {
                match message {
                    Message::Text(text) => route_response(&routes, &text),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            fail_pending(&routes);
        });

        Ok(ChainRpcClient {
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            outgoing,
            pending,
            reader,
            writer,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn request(&self, method: &str, params: Value) -> Result<Value, ChainRpcError> {
        if self.is_closed() {
            return Err(ChainRpcError::Closed);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        match self.pending.lock() {
            Ok(mut pending) => {
                pending.insert(id, tx);
            }
            Err(_) => return Err(ChainRpcError::Closed),
        }
        let payload = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        if self.outgoing.send(Message::Text(payload.to_string())).is_err() {
            if let Ok(mut pending) = self.pending.lock() {
                pending.remove(&id);
            }
            return Err(ChainRpcError::Closed);
        }
        rx.await.map_err(|_| ChainRpcError::Closed)?
    }

    pub async fn runtime_version(&self) -> Result<ChainIdentity, ChainRpcError> {
        let result = self.request("state_getRuntimeVersion", json!([])).await?;
        serde_json::from_value(result).map_err(|e| ChainRpcError::Decode(e.to_string()))
    }

    /// Seals a block on a manual-sealing node through `engine_createBlock`.
    pub async fn create_block(
        &self,
        create_empty: bool,
        finalize: bool,
    ) -> Result<CreatedBlock, ChainRpcError> {
        let result = self.request("engine_createBlock", json!([create_empty, finalize])).await?;
        serde_json::from_value(result).map_err(|e| ChainRpcError::Decode(e.to_string()))
    }

    /// Closes the socket and fails in-flight requests. Calling it again does nothing.
    pub fn disconnect(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.outgoing.send(Message::Close(None));
        self.reader.abort();
        fail_pending(&self.pending);
    }
}

impl Drop for ChainRpcClient {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

fn route_response(pending: &PendingRequests, text: &str) {
    let Ok(response) = serde_json::from_str::<Value>(text) else {
        return;
    };
    // Subscription notifications carry no id.
    let Some(id) = response.get("id").and_then(Value::as_u64) else {
        return;
    };
    let Some(tx) = pending.lock().ok().and_then(|mut pending| pending.remove(&id)) else {
        return;
    };
    let _ = tx.send(parse_response(response));
}

fn parse_response(mut response: Value) -> Result<Value, ChainRpcError> {
    if let Some(error) = response.get("error") {
        return Err(ChainRpcError::Rpc {
            code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        });
    }
    match response.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(ChainRpcError::Decode(response.to_string())),
    }
}

fn fail_pending(pending: &PendingRequests) {
    if let Ok(mut pending) = pending.lock() {
        for (_, tx) in pending.drain() {
            let _ = tx.send(Err(ChainRpcError::Closed));
        }
    }
}
