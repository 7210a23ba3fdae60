//! Inbound calls.

use super::codec::{read_frame, write_frame, CodecError};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, trace, warn};
use twophase_messages::{Request, Response};

/// Handles requests arriving at one role's listener.
///
/// Implementations must answer quickly: protocol calls are queued for the
/// state machine and acknowledged, never processed inline.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    async fn handle(&self, request: Request) -> Response;
}

/// Accept connections forever, one task per connection.
pub async fn serve<S: Service>(listener: TcpListener, service: Arc<S>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, peer, service).await {
                        debug!(%peer, error = %e, "Connection failed");
                    }
                });
            }
            Err(e) => warn!(error = %e, "Accept failed"),
        }
    }
}

async fn handle_connection<S: Service>(
    mut stream: TcpStream,
    peer: SocketAddr,
    service: Arc<S>,
) -> Result<(), CodecError> {
    let request: Request = read_frame(&mut stream).await?;
    trace!(%peer, kind = request.type_name(), "Request received");
    let response = service.handle(request).await;
    write_frame(&mut stream, &response).await
}
