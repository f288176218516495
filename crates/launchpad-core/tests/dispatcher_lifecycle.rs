#![cfg(unix)]

mod common;

use std::time::Duration;

use common::{config, spawn_mock_chain, write_node_script};
use launchpad_core::types::{FoundationKind, LaunchpadError};
use launchpad_core::{Context, Dispatcher, LifecycleState};
use serde_json::json;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn dev_environment_launches_connects_and_tears_down() {
    let dir = tempfile::tempdir().unwrap();
    let node = write_node_script(dir.path(), "node.sh", "echo 'Development Service Ready'\nexec sleep 60");
    let endpoint = spawn_mock_chain("moonbase", 3300).await;
    let config = config(json!([{
        "name": "dev_local",
        "foundation": { "type": "dev", "binPath": node.display().to_string() },
        "connections": [{ "name": "para", "type": "moon", "endpoints": [endpoint] }]
    }]));

    let ctx = Context::empty();
    let mut dispatcher = Dispatcher::new(config, &ctx).with_worker_id(Some(3));
    let context = dispatcher.create_context("dev_local").await.unwrap();
    assert_eq!(context.foundation(), FoundationKind::Dev);
    assert_eq!(context.nodes().len(), 1);
    let args = &context.nodes()[0].command.args;
    assert!(args.contains(&"--ws-port=10300".to_string()));
    assert!(args.contains(&"--rpc-port=10301".to_string()));
    assert!(args.contains(&"--port=10302".to_string()));
    assert_eq!(context.service_ports()[0].port, 10300);

    let identity = context.provider("para").unwrap().greet(&ctx).await.unwrap().unwrap();
    assert_eq!(identity.name, "moonbase");
    assert_eq!(context.connected_provider_count(), 1);
    assert_eq!(dispatcher.live_node_count(), 1);

    dispatcher.destroy().await;
    assert_eq!(dispatcher.state(), LifecycleState::Destroyed);
    assert_eq!(dispatcher.live_node_count(), 0);
    assert!(dispatcher.context().is_err());

    dispatcher.create_context("dev_local").await.unwrap();
    assert_eq!(dispatcher.live_node_count(), 1);
    dispatcher.destroy().await;
    assert_eq!(dispatcher.live_node_count(), 0);
}

#[tokio::test]
#[serial]
async fn node_exiting_before_readiness_aborts_the_launch() {
    let dir = tempfile::tempdir().unwrap();
    let node = write_node_script(dir.path(), "node.sh", "echo 'panicked at genesis'\nexit 1");
    let config = config(json!([{
        "name": "broken",
        "foundation": { "type": "dev", "binPath": node.display().to_string() }
    }]));

    let mut dispatcher = Dispatcher::new(config, &Context::empty());
    let error = dispatcher.create_context("broken").await.err().unwrap();
    assert_eq!(*error.current_context(), LaunchpadError::LaunchFailed);
    assert_eq!(dispatcher.live_node_count(), 0);
    assert_eq!(dispatcher.state(), LifecycleState::Destroyed);
}

#[tokio::test]
#[serial]
async fn unreachable_provider_aborts_a_launched_network() {
    let dir = tempfile::tempdir().unwrap();
    let node = write_node_script(dir.path(), "node.sh", "echo 'Running JSON-RPC server'\nexec sleep 60");
    let config = config(json!([{
        "name": "dev_local",
        "foundation": { "type": "dev", "binPath": node.display().to_string() },
        "connections": [{ "name": "eth", "type": "generic", "endpoints": ["ws://127.0.0.1:1"] }]
    }]));

    let mut dispatcher = Dispatcher::new(config, &Context::empty());
    let error = dispatcher.create_context("dev_local").await.err().unwrap();
    assert_eq!(*error.current_context(), LaunchpadError::ProviderUnreachable);
    assert_eq!(dispatcher.live_node_count(), 0);

    // The failed launch leaves the dispatcher ready for another attempt.
    let error = dispatcher.create_context("dev_local").await.err().unwrap();
    assert_eq!(*error.current_context(), LaunchpadError::ProviderUnreachable);
}

#[tokio::test]
#[serial]
async fn multi_chain_fork_waits_for_every_chain() {
    let dir = tempfile::tempdir().unwrap();
    let bin = write_node_script(
        dir.path(),
        "chopsticks.sh",
        "echo \"$@\"\necho '[alpha] listening on port 8000'\nsleep 0.2\necho '[beta] listening on port 8001'\nexec sleep 60",
    );
    let config = config(json!([{
        "name": "fork_pair",
        "foundation": {
            "type": "simulated_fork",
            "binPath": bin.display().to_string(),
            "chains": [
                { "configPath": "alpha.yml", "port": 8000 },
                { "configPath": "beta.yml", "port": 8001 }
            ]
        },
        "connections": []
    }]));

    let mut dispatcher = Dispatcher::new(config, &Context::empty());
    let context = dispatcher.create_context("fork_pair").await.unwrap();
    assert_eq!(
        context.nodes()[0].command.args,
        vec!["xcm", "--parachain=alpha.yml", "--parachain=beta.yml"]
    );
    assert!(context.providers().is_empty());
    let ports: Vec<u16> = context.service_ports().iter().map(|port| port.port).collect();
    assert_eq!(ports, vec![8000, 8001]);
    dispatcher.destroy().await;
    assert_eq!(dispatcher.live_node_count(), 0);
}

#[tokio::test]
#[serial]
async fn topology_discovers_sub_node_endpoints() {
    let dir = tempfile::tempdir().unwrap();
    let bin = write_node_script(
        dir.path(),
        "zombienet.sh",
        "echo 'spawning rococo'\necho 'rococo-alice ws://127.0.0.1:34567'\nexec sleep 60",
    );
    let config = config(json!([{
        "name": "zombie",
        "foundation": {
            "type": "simulated_topology",
            "binPath": bin.display().to_string(),
            "chains": [
                { "name": "rococo", "role": "relay", "configPath": "relay.json" },
                { "name": "alphanet", "role": "parachain", "configPath": "para.json", "wsPort": 9955 }
            ]
        }
    }]));

    let mut dispatcher = Dispatcher::new(config, &Context::empty());
    let context = dispatcher.create_context("zombie").await.unwrap();
    let endpoints = &context.nodes()[0].endpoints;
    assert_eq!(endpoints.len(), 2);
    let ports: Vec<u16> = context.service_ports().iter().map(|port| port.port).collect();
    assert_eq!(ports, vec![34567, 9955]);
    dispatcher.destroy().await;
}

#[tokio::test]
#[serial]
async fn node_output_is_streamed_to_subscribers() {
    let dir = tempfile::tempdir().unwrap();
    let node = write_node_script(
        dir.path(),
        "node.sh",
        "echo 'Development Service Ready'\nwhile true; do echo 'imported block'; sleep 0.1; done",
    );
    let endpoint = spawn_mock_chain("moonbase", 3300).await;
    let config = config(json!([{
        "name": "dev_local",
        "foundation": {
            "type": "dev",
            "binPath": node.display().to_string(),
            "options": ["--dev"]
        },
        "connections": [{ "name": "node", "type": "generic", "endpoints": [endpoint] }]
    }]));

    let mut dispatcher = Dispatcher::new(config, &Context::empty());
    let mut logs = {
        let context = dispatcher.create_context("dev_local").await.unwrap();
        context.nodes()[0].subscribe_logs()
    };
    let line = tokio::time::timeout(Duration::from_secs(5), logs.recv()).await.unwrap().unwrap();
    assert_eq!(line.line, "imported block");
    dispatcher.destroy().await;
}
