//! TabPilot native companion bridge.
//!
//! The companion is a separate process the browser side talks to over a
//! byte stream of `[u32 LE length][JSON]` frames. It serves clipboard access
//! and confined text-file reads; [`NativeCompanionHandler`] plugs it into the
//! execution engine as the handler for `native` actions.

pub mod client;
pub mod clipboard;
pub mod config;
pub mod errors;
pub mod frame;
pub mod fs;
pub mod handler;
pub mod host;
pub mod protocol;

pub use client::NativeClient;
pub use clipboard::{ClipboardBackend, MemoryClipboard};
pub use config::NativeConfig;
pub use errors::BridgeError;
pub use frame::{read_frame, write_frame};
pub use fs::FsPolicy;
pub use handler::NativeCompanionHandler;
pub use host::NativeHost;
pub use protocol::{NativeOp, NativeRequest, NativeResponse};
