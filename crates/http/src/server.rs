//! Accept loop with a fixed pool of connection slots.
//!
//! The server owns `max_connections` slots, each carrying the buffers
//! for one connection. Free slots sit in a channel; the accept loop
//! takes a slot *before* calling accept, so when every slot is busy the
//! listener simply stops being polled and the kernel queues new peers
//! in the backlog until a slot comes back. Nothing is ever turned away,
//! only deferred.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::codec::header_decoder::DEFAULT_MAX_HEADER_SIZE;
use crate::connection::{Connection, Flow};
use crate::handler::Handler;
use crate::protocol::error::{HttpError, ParseError, SendError};

/// Sizing knobs for a [`Server`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    max_connections: usize,
    recv_buffer_size: usize,
    max_header_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_connections: 4,
            recv_buffer_size: 4 * 1024,
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
        }
    }
}

impl ServerConfig {
    /// Number of connection slots, the hard concurrency cap.
    pub fn max_connections(mut self, n: usize) -> Self {
        self.max_connections = n;
        self
    }

    /// Receive buffer capacity per slot.
    pub fn recv_buffer_size(mut self, bytes: usize) -> Self {
        self.recv_buffer_size = bytes;
        self
    }

    /// Cap on one request head.
    pub fn max_header_size(mut self, bytes: usize) -> Self {
        self.max_header_size = bytes;
        self
    }
}

/// One pooled connection context. Buffers live as long as the server.
#[derive(Debug)]
struct Slot {
    id: usize,
    connection: Connection,
}

pub struct Server<H> {
    listener: TcpListener,
    handler: Arc<H>,
    config: ServerConfig,
}

impl<H> Server<H>
where
    H: Handler + 'static,
{
    pub fn new(listener: TcpListener, handler: H, config: ServerConfig) -> Self {
        Self { listener, handler: Arc::new(handler), config }
    }

    pub async fn bind<A: ToSocketAddrs>(
        addr: A,
        handler: H,
        config: ServerConfig,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self::new(listener, handler, config))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the accept loop forever.
    pub async fn run(self) {
        let slots = self.config.max_connections.max(1);
        let (free_tx, mut free_rx) = mpsc::channel::<Slot>(slots);
        for id in 0..slots {
            let connection =
                Connection::new(self.config.recv_buffer_size, self.config.max_header_size);
            // capacity equals the slot count, these sends cannot block
            let _ = free_tx.send(Slot { id, connection }).await;
        }
        match self.listener.local_addr() {
            Ok(addr) => info!(%addr, slots, "server listening"),
            Err(_) => info!(slots, "server listening"),
        }

        loop {
            // no free slot, no accept: the backlog holds the peers
            let Some(mut slot) = free_rx.recv().await else {
                return;
            };
            let (mut stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(cause = %e, "failed to accept connection");
                    let _ = free_tx.send(slot).await;
                    continue;
                }
            };
            trace!(slot = slot.id, %peer, "connection accepted");

            let handler = Arc::clone(&self.handler);
            let free_tx = free_tx.clone();
            tokio::spawn(async move {
                match serve_connection(&mut stream, &mut slot.connection, handler.as_ref()).await
                {
                    Ok(()) => debug!(slot = slot.id, %peer, "connection finished"),
                    Err(e) => error!(slot = slot.id, %peer, cause = %e, "connection failed"),
                }
                slot.connection.reset();
                let _ = free_tx.send(slot).await;
            });
        }
    }
}

impl<H> std::fmt::Debug for Server<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.listener.local_addr().ok())
            .field("config", &self.config)
            .finish()
    }
}

/// Drive one connection from first byte to shutdown.
async fn serve_connection<H: Handler>(
    stream: &mut TcpStream,
    connection: &mut Connection,
    handler: &H,
) -> Result<(), HttpError> {
    // read until the state machine wants to write or close
    loop {
        let flow = if connection.space().is_empty() {
            // buffer full: let the decoders consume or fail before the
            // next read
            connection.advance(handler)?
        } else {
            let n = stream
                .read(connection.space())
                .await
                .map_err(ParseError::io)?;
            if n == 0 {
                connection.on_eof()?
            } else {
                connection.fill(n);
                connection.advance(handler)?
            }
        };
        match flow {
            Flow::ReadMore => {}
            Flow::Write => break,
            Flow::Close => {
                let _ = stream.shutdown().await;
                return Ok(());
            }
        }
    }

    loop {
        let n = {
            let Some(window) = connection.response_mut().next_window() else {
                break;
            };
            stream.write(window).await.map_err(SendError::io)?
        };
        if n == 0 {
            return Err(SendError::io(io::ErrorKind::WriteZero.into()).into());
        }
        connection.response_mut().advance_written(n);
    }
    stream.flush().await.map_err(SendError::io)?;
    let _ = stream.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use http::StatusCode;
    use tokio::time::timeout;

    use super::*;
    use crate::handler::{make_handler, HandlerFn};

    type TestHandler =
        HandlerFn<Box<dyn Fn(&mut crate::protocol::RequestMessage, &mut crate::protocol::ResponseMessage) + Send + Sync>>;

    fn ok_handler(body: &'static [u8]) -> TestHandler {
        make_handler(Box::new(move |_request, response| {
            response.set_status(StatusCode::OK);
            response.add_field("Content-Type", "text/plain");
            response.add_field("Connection", "close");
            response.append_body(body);
        }))
    }

    async fn spawn_server(handler: TestHandler, config: ServerConfig) -> SocketAddr {
        let server = Server::bind("127.0.0.1:0", handler, config).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());
        addr
    }

    async fn read_to_end(stream: &mut TcpStream) -> Vec<u8> {
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn serves_a_request_over_a_real_socket() {
        let addr = spawn_server(ok_handler(b"pong"), ServerConfig::default()).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /ping HTTP/1.1\r\nContent-Length: 0\r\n\r\n")
            .await
            .unwrap();
        let reply = String::from_utf8(read_to_end(&mut stream).await).unwrap();

        assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(reply.ends_with("\r\n\r\npong"));
    }

    #[tokio::test]
    async fn fragmented_request_gets_the_same_response() {
        let addr = spawn_server(ok_handler(b"ok"), ServerConfig::default()).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        for byte in b"POST /x HTTP/1.1\r\nContent-Length: 3\r\n\r\nabc" {
            stream.write_all(&[*byte]).await.unwrap();
            stream.flush().await.unwrap();
        }
        let reply = String::from_utf8(read_to_end(&mut stream).await).unwrap();
        assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
    }

    #[tokio::test]
    async fn full_pool_defers_accept_until_a_slot_frees() {
        let addr = spawn_server(ok_handler(b"ok"), ServerConfig::default().max_connections(1)).await;

        // occupy the only slot with an idle connection
        let hold = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // the second peer connects (kernel backlog) but is never
        // accepted while the slot is taken
        let mut probe = TcpStream::connect(addr).await.unwrap();
        probe
            .write_all(b"GET / HTTP/1.1\r\nContent-Length: 0\r\n\r\n")
            .await
            .unwrap();
        let mut buf = [0u8; 256];
        let starved = timeout(Duration::from_millis(200), probe.read(&mut buf)).await;
        assert!(starved.is_err(), "got a response while the pool was full");

        // closing the idle connection fails it (eof mid-header) and
        // recycles the slot, which unblocks the waiting peer
        drop(hold);
        let n = timeout(Duration::from_secs(5), probe.read(&mut buf))
            .await
            .expect("request should be served after the slot freed")
            .unwrap();
        assert!(n > 0);
        assert!(buf.starts_with(b"HTTP/1.1 200"));
    }

    #[tokio::test]
    async fn slots_recycle_across_sequential_connections() {
        let addr = spawn_server(ok_handler(b"again"), ServerConfig::default().max_connections(1)).await;

        for _ in 0..3 {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream
                .write_all(b"GET / HTTP/1.1\r\nContent-Length: 0\r\n\r\n")
                .await
                .unwrap();
            let reply = String::from_utf8(read_to_end(&mut stream).await).unwrap();
            assert!(reply.ends_with("again"));
        }
    }
}
