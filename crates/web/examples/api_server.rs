//! Full demo site on one port.
//!
//! URLs following the `/version/route/path:command` scheme go to the
//! introspection handler; everything else falls through to the router
//! and its static file tree.
//!
//! ```text
//! curl -F notes=@notes.txt 'http://127.0.0.1:8080/v1/files/docs:upload?tag=a'
//! printf 'GET /index.html HTTP/1.1\r\nContent-Length: 0\r\n\r\n' | nc 127.0.0.1 8080
//! ```

use pocket_http::handler::Handler;
use pocket_http::protocol::{RequestMessage, ResponseMessage};
use pocket_http::server::{Server, ServerConfig};
use pocket_web::{ApiHandler, Router, StaticFiles, UrlComponents};
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

/// Splits traffic between the api and the page tree.
struct Site {
    api: ApiHandler,
    pages: Router,
}

impl Handler for Site {
    fn handle(&self, request: &mut RequestMessage, response: &mut ResponseMessage) {
        if UrlComponents::parse(request.uri()).is_some() {
            self.api.handle(request, response);
        } else {
            self.pages.handle(request, response);
        }
    }
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let site = Site {
        api: ApiHandler::new(),
        pages: Router::new().static_files(StaticFiles::new(".")),
    };

    let config = ServerConfig::default().max_connections(8);
    let server = match Server::bind("127.0.0.1:8080", site, config).await {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };
    server.run().await;
}
