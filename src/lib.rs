//! apns-dispatch - Adaptive push-notification delivery over HTTP/2.
//!
//! A [`Client`] feeds notifications into a pool of connection workers that
//! deliver them to APNs over long-lived HTTP/2 connections. A governor
//! watches backpressure on the pipeline's channels and grows or shrinks
//! the pool between configured bounds; recoverable failures are re-injected
//! through a buffered retry path.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── domain/          # Notifications, payloads, service responses
//! ├── port/            # The ApnsChannel seam workers drive
//! ├── dispatch/        # Client, governor, workers, retry forwarder
//! ├── infrastructure/  # reqwest-backed HTTP/2 channel
//! └── testkit/         # Mock channels and canonical test configs
//! ```
//!
//! # Example
//!
//! ```no_run
//! use apns_dispatch::{Client, DispatchConfig, Notification, Payload};
//! use apns_dispatch::infrastructure::{Http2Channel, Http2ChannelConfig};
//!
//! # async fn example() -> apns_dispatch::Result<()> {
//! let factory = Http2Channel::factory(Http2ChannelConfig::default());
//! let client = Client::new(DispatchConfig::min_blocking(), factory)?;
//! let mut deliveries = client.take_deliveries().expect("first take");
//!
//! client
//!     .push(Notification::new("device-token", Payload::alert("Hello")))
//!     .await?;
//! if let Some(delivery) = deliveries.recv().await {
//!     println!("delivered: {}", delivery.is_success());
//! }
//! client.close();
//! client.done().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use config::{DispatchConfig, RelaunchBackoff, RetryEval, Scale};
pub use dispatch::{Client, Delivery};
pub use domain::{Alert, DeviceToken, Notification, Payload, Priority, Response};
pub use error::{Error, Result};
pub use port::{ApnsChannel, ChannelFactory};
