#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use futures::{SinkExt, StreamExt};
use launchpad_core::types::GlobalConfig;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

/// Writes an executable shell script standing in for a node binary.
pub fn write_node_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut permissions = fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&path, permissions).unwrap();
    path
}

/// Answers `state_getRuntimeVersion` like a node running `spec_name`.
pub async fn spawn_mock_chain(spec_name: &'static str, spec_version: u32) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(Message::Text(text))) = ws.next().await {
                    let request: Value = serde_json::from_str(&text).unwrap();
                    let result = match request["method"].as_str() {
                        Some("state_getRuntimeVersion") => {
                            json!({ "specName": spec_name, "specVersion": spec_version })
                        }
                        _ => Value::Null,
                    };
                    let response =
                        json!({ "jsonrpc": "2.0", "id": request["id"], "result": result });
                    if ws.send(Message::Text(response.to_string())).await.is_err() {
                        break;
                    }
                }
            });
        }
    });
    format!("ws://{}", addr)
}

pub fn config(environments: Value) -> GlobalConfig {
    serde_json::from_value(json!({
        "label": "integration",
        "launchTimeout": 10000,
        "connectTimeout": 2000,
        "environments": environments,
    }))
    .unwrap()
}
