//! Per-message driver: decode, canonicalize, execute, respond
//!
//! Messages are processed strictly serially: one envelope is fully executed
//! (all children awaited) and answered before the next frame is read.

use crate::core::config::Config;
use crate::core::urlclean;
use crate::execution::shell::ShellRunner;
use crate::execution::{SystemShell, WorkflowEngine};
use crate::transport::frame::{FrameCodec, FrameError};
use crate::transport::{Envelope, Response};
use chrono::{TimeZone, Utc};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};

/// Frame loop over the inbound/outbound streams. Returns cleanly when the
/// inbound stream closes; frame errors are fatal. Envelopes that are not
/// valid JSON are logged and skipped without a response.
pub async fn run_loop<R, W>(
    config: &Config,
    reader: &mut R,
    writer: &mut W,
) -> Result<(), FrameError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let codec = FrameCodec::default();
    let engine = WorkflowEngine::new(config, SystemShell);

    loop {
        let payload = match codec.read(reader).await? {
            Some(payload) => payload,
            None => {
                info!("inbound stream closed, exiting");
                return Ok(());
            }
        };

        let envelope: Envelope = match serde_json::from_slice(&payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("failed to decode envelope: {}", e);
                continue;
            }
        };

        let response = handle_message(&engine, &envelope).await;
        match serde_json::to_vec(&response) {
            Ok(body) => codec.write(writer, &body).await?,
            Err(e) => warn!("failed to encode response: {}", e),
        }
    }
}

/// Process one decoded envelope and build its response.
async fn handle_message<S: ShellRunner>(
    engine: &WorkflowEngine<'_, S>,
    envelope: &Envelope,
) -> Response {
    let received = Utc
        .timestamp_opt(envelope.timestamp, 0)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| envelope.timestamp.to_string());
    info!(
        "[{}] [{}] -> [{}] : [{}]",
        received, envelope.origin, envelope.target, envelope.url
    );

    let url = urlclean::canonicalize(&envelope.url);
    if url != envelope.url {
        info!("let's clean that up: {} -> {}", envelope.url, url);
    }

    match engine.run_for_url(&url, envelope.html.as_deref()).await {
        Ok(()) => Response::success(format!("processed {}", url)),
        Err(e) => {
            warn!("workflow failed: {}", e);
            Response::error(e.to_string())
        }
    }
}
