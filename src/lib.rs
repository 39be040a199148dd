//! # gbx-link
//!
//! Host-side client for the Arduino Game Boy cartridge reader/writer.
//!
//! The reader sits on a serial line and answers five commands: read the
//! cartridge header, dump the ROM, dump the save RAM, write the save RAM
//! and report the RAM size.
//!
//! ## Architecture
//!
//! - **Protocol** ([`protocol`]): request packets and response headers
//! - **Link** ([`link`]): frame synchronization with a sliding deadline
//!   and the bulk transfer engine
//! - **Client** ([`CartridgeClient`]): header cache and the user-facing
//!   operations, including read-back verification of RAM writes
//! - **Transport** ([`transport`]): the serial port, or a scripted device
//!   for tests
//!
//! ## Example
//!
//! ```ignore
//! use gbx_link::transport::SerialTransport;
//! use gbx_link::{CancelToken, CartridgeClient, LinkConfig, NoProgress};
//!
//! #[tokio::main]
//! async fn main() -> gbx_link::Result<()> {
//!     let config = LinkConfig::default();
//!     let port = SerialTransport::open("/dev/ttyACM0", config.baud_rate)?;
//!     let mut client = CartridgeClient::new(port, config, CancelToken::new());
//!     client.wait_for_device().await?;
//!
//!     let meta = client.read_header().await?;
//!     println!("{}", meta.title_str());
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod cartridge;
pub mod config;
pub mod error;
pub mod link;
pub mod progress;
pub mod protocol;
pub mod report;
pub mod transport;
pub mod verify;

mod client;

pub use cancel::CancelToken;
pub use cartridge::CartridgeMetadata;
pub use client::{CartridgeClient, WriteReport};
pub use config::LinkConfig;
pub use error::{LinkError, Result};
pub use progress::{NoProgress, Progress};
pub use verify::VerifyOutcome;
