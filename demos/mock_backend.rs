//! Demo backend for trying the balancer locally.
//!
//! ```text
//! cargo run --example mock_backend -- 8081 alpha
//! cargo run --example mock_backend -- 8082 beta
//! cargo run -- --servers http://127.0.0.1:8081,http://127.0.0.1:8082
//! ```

use std::net::SocketAddr;

use axum::{http::HeaderMap, routing::get, Router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let port: u16 = args.next().map(|p| p.parse()).transpose()?.unwrap_or(8081);
    let name = args.next().unwrap_or_else(|| format!("backend-{port}"));

    let greeting = name.clone();
    let app = Router::new()
        .route(
            "/",
            get(move || async move {
                // The balancer's default error signal reads this header.
                let mut headers = HeaderMap::new();
                headers.insert("status", "200 OK".parse().expect("static header value"));
                (headers, format!("Hello from {greeting}\n"))
            }),
        )
        .route("/status", get(|| async { "healthy\n" }));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    println!("{name} listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
