use inspector::error::InspectorError;
use inspector::serve;

use client_core::plugins::Logger;
use client_core::{Client, ClientOptions, WebSocketFactory};
use server_core::{Server, ServerEvent, ServerOptions};

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::timeout;

fn local_server(port: u16) -> Server {
    Server::new(ServerOptions {
        port,
        bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        ..ServerOptions::default()
    })
}

/// **VALUE**: Verifies that the host serves applications until shutdown, then stops the server.
///
/// **WHY THIS MATTERS**: Ctrl-C must stop the listener and close application sockets instead of
/// leaving the port bound.
#[tokio::test]
async fn given_running_host_when_shutdown_requested_then_server_stops() {
    // GIVEN: The host serving on an ephemeral port
    let server = local_server(0);
    let mut events = server.subscribe();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let host = tokio::spawn({
        let server = server.clone();
        async move {
            serve(&server, async {
                let _ = stop_rx.await;
            })
            .await
        }
    });

    let port = loop {
        if let Some(address) = server.local_addr().await {
            break address.port();
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };

    // WHEN: An application logs, then shutdown is requested
    let client = Client::create(
        ClientOptions {
            host: Some("127.0.0.1".to_string()),
            port,
            ..ClientOptions::default()
        }
        .with_socket_factory(WebSocketFactory),
    )
    .expect("client configures");
    client.connect().expect("connect starts").await.expect("socket opens");
    client.require::<Logger>().expect("logger").log("from the app");

    timeout(Duration::from_secs(3), async {
        loop {
            if let Ok(ServerEvent::Command(command)) = events.recv().await
                && command.command_type.as_str() == "log"
            {
                break;
            }
        }
    })
    .await
    .expect("log reaches the host");

    stop_tx.send(()).expect("host is waiting");

    // THEN: serve returns Ok and the server is no longer started
    let result = timeout(Duration::from_secs(3), host)
        .await
        .expect("host stops in time")
        .expect("host task completes");
    assert!(result.is_ok());
    assert!(!server.is_started().await);
}

/// **VALUE**: Verifies that a taken port ends the host with a server error instead of hanging.
#[tokio::test]
async fn given_port_in_use_when_serving_then_server_error_is_returned() {
    let holder = TcpListener::bind("127.0.0.1:0").await.expect("bind holder");
    let port = holder.local_addr().expect("holder address").port();

    let result = serve(&local_server(port), std::future::pending()).await;

    assert!(matches!(result, Err(InspectorError::Server { .. })));
}
