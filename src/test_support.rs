use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Serves `router` on an ephemeral loopback port for the lifetime of the test runtime.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("test listener address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}
