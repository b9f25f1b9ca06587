//! Minimal routed server.
//!
//! Requests without a Content-Length or chunked framing are read until
//! the peer closes its half, and the response only goes out once the
//! body is complete. Probe with an explicit zero length:
//!
//! ```text
//! printf 'GET /hello HTTP/1.1\r\nContent-Length: 0\r\n\r\n' | nc 127.0.0.1 8080
//! curl -X GET --data '' http://127.0.0.1:8080/hello
//! ```

use http::StatusCode;
use pocket_http::handler::make_handler;
use pocket_http::protocol::Method;
use pocket_http::server::{Server, ServerConfig};
use pocket_web::Router;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let router = Router::new().route(
        Method::Get,
        "/hello",
        make_handler(|_request, response| {
            response.set_status(StatusCode::OK);
            response.add_field("Content-Type", "text/plain");
            response.add_field("Connection", "close");
            response.append_body(b"hello world\r\n");
        }),
    );

    let server = match Server::bind("127.0.0.1:8080", router, ServerConfig::default()).await {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };
    server.run().await;
}
