//! Companion side: serve framed requests over any byte stream.

use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::clipboard::{ClipboardBackend, MemoryClipboard};
use crate::config::NativeConfig;
use crate::errors::BridgeError;
use crate::frame::{read_frame, write_frame};
use crate::fs::FsPolicy;
use crate::protocol::{NativeOp, NativeRequest, NativeResponse};

pub struct NativeHost {
    clipboard: Arc<dyn ClipboardBackend>,
    fs: FsPolicy,
    max_frame_bytes: usize,
}

impl NativeHost {
    pub fn new(config: &NativeConfig, clipboard: Arc<dyn ClipboardBackend>) -> Self {
        Self {
            clipboard,
            fs: FsPolicy::from_config(config),
            max_frame_bytes: config.max_frame_bytes,
        }
    }

    /// Host with an in-memory clipboard.
    pub fn in_memory(config: &NativeConfig) -> Self {
        Self::new(config, Arc::new(MemoryClipboard::new()))
    }

    pub fn fs_policy(&self) -> &FsPolicy {
        &self.fs
    }

    /// Handle one request. Never fails; errors become `ok: false` responses.
    pub async fn dispatch(&self, request: NativeRequest) -> NativeResponse {
        let outcome = self.run_op(&request).await;
        match outcome {
            Ok(data) => {
                debug!(id = %request.id, op = %request.op, "Native request ok");
                NativeResponse::success(request.id, data)
            }
            Err(err) => {
                warn!(id = %request.id, op = %request.op, error = %err, "Native request failed");
                NativeResponse::failure(request.id, err.to_string())
            }
        }
    }

    async fn run_op(&self, request: &NativeRequest) -> Result<Value, BridgeError> {
        match request.op.parse::<NativeOp>()? {
            NativeOp::ClipboardRead => Ok(json!(self.clipboard.read_text().await?)),
            NativeOp::ClipboardWrite => {
                let text = string_param(&request.params, "text")?;
                self.clipboard.write_text(text).await?;
                Ok(json!({ "written": text.chars().count() }))
            }
            NativeOp::FsReadText => {
                let path = string_param(&request.params, "path")?;
                Ok(json!(self.fs.read_text(path).await?))
            }
        }
    }

    /// Serve until the peer closes the stream. Returns the number of
    /// requests answered.
    ///
    /// A frame that cannot be decoded is answered with `id: ""` and the
    /// loop continues. An oversized frame ends the session.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<usize, BridgeError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(max_frame_bytes = self.max_frame_bytes, "Native host serving");
        let mut served = 0;
        loop {
            let frame = read_frame::<_, NativeRequest>(&mut reader, self.max_frame_bytes).await;
            let request = match frame {
                Ok(Some(request)) => request,
                Ok(None) => break,
                Err(err @ BridgeError::Json(_)) => {
                    warn!(error = %err, "Undecodable native request");
                    let response = NativeResponse::failure("", err.to_string());
                    write_frame(&mut writer, &response, self.max_frame_bytes).await?;
                    served += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };

            let id = request.id.clone();
            let response = self.dispatch(request).await;
            if let Err(err) = write_frame(&mut writer, &response, self.max_frame_bytes).await {
                let BridgeError::FrameTooLarge { .. } = err else {
                    return Err(err);
                };
                let fallback = NativeResponse::failure(id, err.to_string());
                write_frame(&mut writer, &fallback, self.max_frame_bytes).await?;
            }
            served += 1;
        }
        info!(served, "Native host stream closed");
        Ok(served)
    }

}

fn string_param<'a>(params: &'a Value, key: &str) -> Result<&'a str, BridgeError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| BridgeError::InvalidParams(format!("missing string param `{key}`")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(op: &str, params: Value) -> NativeRequest {
        NativeRequest::new("r1", op, params)
    }

    #[tokio::test]
    async fn clipboard_round_trip() {
        let host = NativeHost::in_memory(&NativeConfig::minimal());
        let wrote = host
            .dispatch(request("clipboard.write", json!({"text": "copied"})))
            .await;
        assert!(wrote.ok);
        let read = host.dispatch(request("clipboard.read", Value::Null)).await;
        assert_eq!(read.data, Some(json!("copied")));
    }

    #[tokio::test]
    async fn failures_become_responses() {
        let host = NativeHost::in_memory(&NativeConfig::minimal());

        let response = host.dispatch(request("shell.exec", json!({}))).await;
        assert!(!response.ok);
        assert_eq!(response.error.as_deref(), Some("unknown op: shell.exec"));
        assert_eq!(response.id, "r1");

        let response = host.dispatch(request("clipboard.write", json!({}))).await;
        assert!(response.error.unwrap().contains("`text`"));
    }
}
