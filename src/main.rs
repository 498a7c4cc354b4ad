//! Reference backend server for the document chat client.
//!
//! Serves `/upload` and `/query` on `DOCCHAT_LISTEN` (default 127.0.0.1:3000),
//! the address the client's default configuration points at.

use docchat::{dev_server, DEV_SERVER_ADDR};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docchat=info")),
        )
        .init();

    let addr = std::env::var("DOCCHAT_LISTEN").unwrap_or_else(|_| DEV_SERVER_ADDR.to_string());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {}: {}", addr, e));

    println!("Document chat backend running at http://{}", addr);

    dev_server::serve(listener).await.expect("Server error");
}
