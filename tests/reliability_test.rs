mod common;

use impersonet::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

#[tokio::test]
async fn test_retry_on_reused_socket_failure() {
    // Server answers one keep-alive request per connection, then hangs up.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let seen = connections.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let n = seen.fetch_add(1, Ordering::SeqCst);
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await.unwrap();
            let body = if n == 0 { "OK" } else { "RETRY" };
            let response = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}", body.len(), body);
            socket.write_all(response.as_bytes()).await.unwrap();
            drop(socket);
        }
    });

    let client = Client::builder().impersonate("chrome_120").build().unwrap();
    let url = format!("http://{}/", addr);

    let first = client.get(&url).send().await.unwrap();
    assert_eq!(first.text().await.unwrap(), "OK");
    // Let the close reach the pooled socket.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = client.get(&url).send().await.unwrap();
    assert_eq!(second.text().await.unwrap(), "RETRY");
    assert_ne!(second.session_id(), first.session_id());
    assert_eq!(connections.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_per_host_limit_queues_requests() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let open = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (open_c, peak_c) = (open.clone(), peak.clone());
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let (open, peak) = (open_c.clone(), peak_c.clone());
            tokio::spawn(async move {
                let now = open.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                let mut buf = [0u8; 4096];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    if socket
                        .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok")
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                open.fetch_sub(1, Ordering::SeqCst);
            });
        }
    });

    let client = Client::builder()
        .impersonate("chrome_120")
        .pool_max_per_host(2)
        .build()
        .unwrap();
    let url = format!("http://{}/", addr);

    let tasks: Vec<_> = (0..6)
        .map(|_| {
            let client = client.clone();
            let url = url.clone();
            tokio::spawn(async move {
                let response = client.get(&url).send().await.unwrap();
                response.text().await.unwrap().to_string()
            })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap(), "ok");
    }
    assert!(peak.load(Ordering::SeqCst) <= 2, "peak {}", peak.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_dropped_response_frees_the_slot() {
    let (addr, _rx) = common::serve_h1(|_| common::ok("a body nobody reads")).await;
    let client = Client::builder()
        .impersonate("chrome_120")
        .pool_max_per_host(1)
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();
    let url = format!("http://{}/", addr);

    let unread = client.get(&url).send().await.unwrap();
    let first_session = unread.session_id();
    drop(unread);

    // With one slot per host this only completes if the drop released it.
    let next = client.get(&url).send().await.unwrap();
    assert_ne!(next.session_id(), first_session);
    assert_eq!(next.text().await.unwrap(), "a body nobody reads");
}

#[tokio::test]
async fn test_connection_close_is_not_pooled() {
    let (addr, mut rx) = common::serve_h1(|_| {
        b"HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 5\r\n\r\nclose".to_vec()
    })
    .await;
    let client = Client::builder().impersonate("chrome_120").build().unwrap();
    let url = format!("http://{}/", addr);

    let first = client.get(&url).send().await.unwrap();
    assert_eq!(first.text().await.unwrap(), "close");
    let second = client.get(&url).send().await.unwrap();
    assert_eq!(second.text().await.unwrap(), "close");

    assert_ne!(first.session_id(), second.session_id());
    assert_ne!(rx.recv().await.unwrap().connection, rx.recv().await.unwrap().connection);
}
