//! Testing utilities for Herald push dispatch.
//!
//! ## Features
//!
//! - **RecordingTransport** - scripted JSON transport that records requests
//! - **RecordingConnector** - streaming connector that records written frames
//!   and injects connection faults
//! - **FaultyRegistry** - registry wrapper that rejects chosen writes
//! - **Fixtures** - canned cloud messaging responses and [`ResponseBuilder`]
//! - **Frame decoding** - [`decode_frames`] splits recorded APNS bytes
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use herald_push::prelude::*;
//! use herald_testing::*;
//!
//! # tokio_test::block_on(async {
//! let registry = Arc::new(MemoryRegistry::with_devices([Device::gcm("abc")]).unwrap());
//! let transport = RecordingTransport::new().respond(GCM_JSON_RESPONSE);
//!
//! let dispatcher = Dispatcher::builder()
//!     .registry(registry)
//!     .credentials(Arc::new(
//!         StaticCredentials::new().with_default(Channel::Gcm, Credential::api_key("key")),
//!     ))
//!     .json_transport(Arc::new(transport.clone()))
//!     .build()
//!     .unwrap();
//!
//! dispatcher
//!     .dispatch_active(Channel::Gcm, &Message::new("Hello world"))
//!     .await
//!     .unwrap();
//! assert_eq!(transport.call_count(), 1);
//! # });
//! ```

pub mod fixtures;
pub mod frames;
pub mod mock;

pub use fixtures::*;
pub use frames::{DecodedFrame, FrameError, decode_frames};
pub use mock::{FaultyRegistry, RecordingConnector, RecordingTransport};
