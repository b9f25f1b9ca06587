//! Serve a directory tree.
//!
//! ```text
//! cargo run --example static_site -- ./site
//! printf 'GET /index.html HTTP/1.1\r\nContent-Length: 0\r\n\r\n' | nc 127.0.0.1 8080
//! ```
//!
//! The root defaults to the working directory. Bodyless requests are
//! framed by connection close, so give the probe an explicit length as
//! above.

use pocket_http::server::{Server, ServerConfig};
use pocket_web::{Router, StaticFiles};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let root = std::env::args().nth(1).unwrap_or_else(|| ".".to_string());
    info!(root, "serving directory");

    let router = Router::new().static_files(StaticFiles::new(root));
    let server = match Server::bind("127.0.0.1:8080", router, ServerConfig::default()).await {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };
    server.run().await;
}
