//! Hand-rolled HTTP/1.1 servers for responses wiremock cannot produce:
//! chunked bodies with no Content-Length and bodies that stall mid-transfer.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub struct TestServer {
    pub url: String,
    pub connections: Arc<AtomicUsize>,
}

impl TestServer {
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

async fn read_request(stream: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut byte).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&byte[..n]),
        }
    }
}

async fn serve<F, Fut>(handler: F) -> TestServer
where
    F: Fn(TcpStream) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = connections.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            read_request(&mut stream).await;
            tokio::spawn(handler(stream));
        }
    });

    TestServer {
        url: format!("http://{}/files/update.bin", addr),
        connections,
    }
}

/// Every request is answered with a chunked body, so the length is unknown.
pub async fn unknown_length_server() -> TestServer {
    serve(|mut stream| async move {
        let response = "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n5\r\nhello\r\n0\r\n\r\n";
        let _ = stream.write_all(response.as_bytes()).await;
        let _ = stream.shutdown().await;
    })
    .await
}

/// Sends the first `first` bytes of `body`, pauses for `pause`, then the rest.
pub async fn stalling_server(body: Vec<u8>, first: usize, pause: Duration) -> TestServer {
    let body = Arc::new(body);
    serve(move |mut stream| {
        let body = body.clone();
        async move {
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            if stream.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            let split = first.min(body.len());
            if stream.write_all(&body[..split]).await.is_err() {
                return;
            }
            let _ = stream.flush().await;
            tokio::time::sleep(pause).await;
            let _ = stream.write_all(&body[split..]).await;
            let _ = stream.shutdown().await;
        }
    })
    .await
}

/// Declares `declared` bytes but closes after sending `body`.
pub async fn truncating_server(body: Vec<u8>, declared: usize) -> TestServer {
    let body = Arc::new(body);
    serve(move |mut stream| {
        let body = body.clone();
        async move {
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                declared
            );
            let _ = stream.write_all(head.as_bytes()).await;
            let _ = stream.write_all(&body).await;
            let _ = stream.shutdown().await;
        }
    })
    .await
}

pub fn patterned_body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
