//! The single reader task of a connection.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::connection::Connection;
use crate::envelope;
use crate::error::TerminalError;
use crate::transport::FrameReader;

/// Read frames until the transport fails, a global error arrives, or the
/// connection is closed locally.
///
/// A frame that does not decode is dropped and reading continues.
pub(crate) async fn run(connection: Arc<Connection>, mut reader: Box<dyn FrameReader>) {
    loop {
        let frame = tokio::select! {
            () = connection.terminated() => {
                debug!("Dispatch loop stopping: connection terminated");
                return;
            }
            frame = reader.read_frame() => frame,
        };

        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                error!("Read failed: {}", e);
                connection.set_terminal(TerminalError::ReadFailed(e.to_string()));
                return;
            }
        };
        debug!("Received frame: {}", frame);

        let envelope = match envelope::decode(&frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping undecodable frame: {}", e);
                continue;
            }
        };

        if connection.dispatch(envelope).await.is_break() {
            debug!("Dispatch loop stopping after global error");
            return;
        }
    }
}
