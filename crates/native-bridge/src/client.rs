//! Engine side of the companion connection.
//!
//! Requests are written by one task and responses read by another; each
//! response is routed back to its caller by request id. A caller that gives up
//! (timeout, cancellation) only drops its receiver: the late response is
//! discarded when it arrives and the stream stays aligned for later calls.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::BridgeError;
use crate::frame::{read_frame, write_frame};
use crate::host::NativeHost;
use crate::protocol::{NativeOp, NativeRequest, NativeResponse};

const OUTGOING_QUEUE: usize = 32;

type Responder = oneshot::Sender<Result<NativeResponse, BridgeError>>;

#[derive(Default)]
struct Inflight {
    waiting: HashMap<String, Responder>,
    closed: Option<BridgeError>,
}

impl Inflight {
    fn close(&mut self, err: BridgeError) {
        for (_, responder) in self.waiting.drain() {
            let _ = responder.send(Err(err.clone()));
        }
        self.closed.get_or_insert(err);
    }
}

type SharedInflight = Arc<Mutex<Inflight>>;

/// Forgets a call's slot if the call is dropped before its response lands.
struct Waiting {
    inflight: SharedInflight,
    id: String,
}

impl Drop for Waiting {
    fn drop(&mut self) {
        self.inflight.lock().waiting.remove(&self.id);
    }
}

pub struct NativeClient {
    outgoing: mpsc::Sender<NativeRequest>,
    inflight: SharedInflight,
    reader: JoinHandle<()>,
    max_frame_bytes: usize,
}

impl NativeClient {
    /// Must be called inside a tokio runtime: the reader and writer run on
    /// spawned tasks until the client is dropped or the stream closes.
    pub fn new<R, W>(reader: R, writer: W, max_frame_bytes: usize) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let inflight = SharedInflight::default();
        let (outgoing, requests) = mpsc::channel(OUTGOING_QUEUE);
        tokio::spawn(write_loop(
            writer,
            requests,
            inflight.clone(),
            max_frame_bytes,
        ));
        let reader = tokio::spawn(read_loop(reader, inflight.clone(), max_frame_bytes));
        Self {
            outgoing,
            inflight,
            reader,
            max_frame_bytes,
        }
    }

    /// Client wired to `host` through an in-process pipe. The host runs on
    /// a spawned task until the client is dropped.
    pub fn in_process(host: Arc<NativeHost>, max_frame_bytes: usize) -> Self {
        let (client_side, host_side) = tokio::io::duplex(max_frame_bytes + 4);
        let (host_read, host_write) = tokio::io::split(host_side);
        tokio::spawn(async move {
            if let Err(err) = host.serve(host_read, host_write).await {
                warn!(error = %err, "In-process native host stopped");
            }
        });
        let (read, write) = tokio::io::split(client_side);
        Self::new(read, write, max_frame_bytes)
    }

    pub async fn call(&self, op: NativeOp, params: Value) -> Result<Value, BridgeError> {
        self.call_raw(op.as_str(), params).await
    }

    /// Send any op name; the host decides whether it knows it.
    pub async fn call_raw(&self, op: &str, params: Value) -> Result<Value, BridgeError> {
        let request = NativeRequest::new(Uuid::new_v4().to_string(), op, params);
        let (responder, response) = oneshot::channel();
        {
            let mut inflight = self.inflight.lock();
            if let Some(err) = &inflight.closed {
                return Err(err.clone());
            }
            inflight.waiting.insert(request.id.clone(), responder);
        }
        let waiting = Waiting {
            inflight: self.inflight.clone(),
            id: request.id.clone(),
        };

        self.outgoing
            .send(request)
            .await
            .map_err(|_| BridgeError::ChannelClosed)?;
        let response = response.await.map_err(|_| BridgeError::ChannelClosed)??;
        debug!(id = %waiting.id, op, ok = response.ok, "Native call finished");
        response.into_result()
    }
}

impl Drop for NativeClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl std::fmt::Debug for NativeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeClient")
            .field("max_frame_bytes", &self.max_frame_bytes)
            .field("inflight", &self.inflight.lock().waiting.len())
            .finish()
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut requests: mpsc::Receiver<NativeRequest>,
    inflight: SharedInflight,
    max_frame_bytes: usize,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(request) = requests.recv().await {
        if !inflight.lock().waiting.contains_key(&request.id) {
            debug!(id = %request.id, op = %request.op, "Skipping request abandoned before send");
            continue;
        }
        match write_frame(&mut writer, &request, max_frame_bytes).await {
            Ok(()) => {}
            Err(err @ BridgeError::FrameTooLarge { .. }) => {
                if let Some(responder) = inflight.lock().waiting.remove(&request.id) {
                    let _ = responder.send(Err(err));
                }
            }
            Err(err) => {
                warn!(error = %err, "Native companion write failed");
                inflight.lock().close(err);
                return;
            }
        }
    }
    if let Err(err) = writer.shutdown().await {
        debug!(error = %err, "Native companion writer shutdown failed");
    }
}

async fn read_loop<R>(mut reader: R, inflight: SharedInflight, max_frame_bytes: usize)
where
    R: AsyncRead + Unpin,
{
    let reason = loop {
        match read_frame::<_, NativeResponse>(&mut reader, max_frame_bytes).await {
            Ok(Some(response)) => {
                let responder = inflight.lock().waiting.remove(&response.id);
                match responder {
                    Some(responder) => {
                        let _ = responder.send(Ok(response));
                    }
                    None => {
                        debug!(id = %response.id, "Discarding response for an abandoned request")
                    }
                }
            }
            Ok(None) => break BridgeError::ChannelClosed,
            Err(BridgeError::Json(err)) => warn!(error = %err, "Undecodable native response"),
            Err(err) => break err,
        }
    };
    debug!(reason = %reason, "Native companion reader stopped");
    inflight.lock().close(reason);
}
