//! One caller connection: frames in, router, frames out

use keepsake_core::{Request, Response, Router};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::framing::{read_frame, write_frame, FrameError};

const CHANNEL_CAPACITY: usize = 64;

/// Pump requests from `reader` through `router` and write every response
/// to `writer`. Returns once the reader is exhausted and every accepted
/// request has been answered.
pub async fn run<R, W>(router: Router, mut reader: R, mut writer: W, limit: usize) -> Result<(), FrameError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (request_tx, request_rx) = mpsc::channel::<Request>(CHANNEL_CAPACITY);
    let (response_tx, mut response_rx) = mpsc::channel::<Response>(CHANNEL_CAPACITY);

    let serve_router = router.clone();
    let serve_tx = response_tx.clone();
    let server = tokio::spawn(async move { serve_router.serve(request_rx, serve_tx).await });

    let output = tokio::spawn(async move {
        while let Some(response) = response_rx.recv().await {
            let body = match serde_json::to_vec(&response) {
                Ok(body) => body,
                Err(e) => {
                    tracing::error!(request_id = %response.id, error = %e, "Failed to encode response");
                    continue;
                }
            };
            write_frame(&mut writer, &body).await?;
        }
        Ok::<(), FrameError>(())
    });

    let read_result = loop {
        let body = match read_frame(&mut reader, limit).await {
            Ok(Some(body)) => body,
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        };

        match serde_json::from_slice::<Request>(&body) {
            Ok(request) => {
                if request_tx.send(request).await.is_err() {
                    break Ok(());
                }
            }
            Err(e) => {
                let id = request_id(&body);
                tracing::warn!(request_id = %id, error = %e, "Malformed request");
                let response = Response::err(id, format!("Invalid request: {e}"));
                if response_tx.send(response).await.is_err() {
                    break Ok(());
                }
            }
        }
    };

    drop(request_tx);
    drop(response_tx);

    if let Err(e) = server.await {
        tracing::error!(error = %e, "Router task failed");
    }
    let write_result = match output.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "Writer task failed");
            Ok(())
        }
    };

    read_result.and(write_result)
}

// Best-effort id recovery so a malformed request still gets a correlated reply
fn request_id(body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("id").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_default()
}
