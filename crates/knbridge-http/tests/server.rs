//! Background serving: listeners started as Tokio tasks accept traffic
//! until their handle is aborted.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{transport_with, Recorder};
use knbridge_http::{Consumer, ConsumerRegistry, DispatcherConfig, DispatcherServer, TransportConfig};
use knbridge_kernel::{CloudEventsSpec, ServiceDefinition};

/// Reserve an ephemeral port by binding and immediately releasing it.
async fn reserve_port() -> u16 {
    let probe = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = probe.local_addr().unwrap().port();
    drop(probe);
    port
}

/// POST to the listener, retrying until it has come up.
async fn post_once(client: &reqwest::Client, url: &str) -> reqwest::Response {
    for _ in 0..50 {
        match client.post(url).body("test").send().await {
            Ok(response) => return response,
            Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }
    panic!("listener at {url} did not come up");
}

#[tokio::test]
async fn dispatcher_background_task_serves_and_aborts() {
    let port = reserve_port().await;

    let registry = Arc::new(ConsumerRegistry::new());
    registry.attach(Consumer::new(
        ServiceDefinition::source_endpoint("ep"),
        None,
        Recorder::echoing(),
    ));
    let server = DispatcherServer::new(
        DispatcherConfig::new()
            .with_host("127.0.0.1")
            .with_port(port)
            .with_tracing(false),
        registry,
        CloudEventsSpec::default(),
    );
    let handle = server.start_background();

    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{port}/");
    let response = post_once(&client, &url).await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "test");

    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());
}

#[tokio::test]
async fn transport_background_task_serves_and_aborts() {
    let port = reserve_port().await;

    let transport = transport_with(
        vec![ServiceDefinition::source_endpoint("ep")],
        TransportConfig::new().with_host("127.0.0.1").with_port(port),
    );
    transport.subscribe("knative:endpoint/ep", Recorder::echoing()).unwrap();
    let handle = transport.serve_background();

    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{port}/");
    let response = post_once(&client, &url).await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());

    // The listener is gone once the task is cancelled.
    assert!(client.post(&url).body("test").send().await.is_err());
}
