//! Cartridge session on top of a [`Link`].
//!
//! [`CartridgeClient`] runs the operations a user actually asks for:
//! identify the cartridge, dump the ROM, dump or restore the save RAM.
//! It caches the decoded header between operations. The cache holds only
//! a header whose checksum was valid, and any failed operation clears it,
//! so ROM and RAM transfers never run against a stale or unknown
//! cartridge.
//!
//! # Example
//!
//! ```ignore
//! use gbx_link::transport::SerialTransport;
//! use gbx_link::{CancelToken, CartridgeClient, LinkConfig, NoProgress};
//!
//! let config = LinkConfig::default();
//! let port = SerialTransport::open("/dev/ttyACM0", config.baud_rate)?;
//! let mut client = CartridgeClient::new(port, config, CancelToken::new());
//! client.wait_for_device().await?;
//!
//! let meta = client.read_header().await?;
//! let mut rom = tokio::fs::File::create(meta.rom_file_name().unwrap()).await?;
//! client.read_rom(&mut rom, &mut NoProgress).await?;
//! ```

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite};

use crate::cancel::CancelToken;
use crate::cartridge::CartridgeMetadata;
use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::link::Link;
use crate::progress::{NoProgress, Progress};
use crate::protocol::{Command, LENGTH_SIZE, RAM_SIZE_PAYLOAD};
use crate::transport::Transport;
use crate::verify::{verify_write, Stage, VerifyOutcome};

/// Outcome of a RAM write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    /// Bytes uploaded.
    pub sent: u64,
    /// Read-back result, when verification was requested.
    pub verification: Option<VerifyOutcome>,
}

/// A connected cartridge reader.
pub struct CartridgeClient<T> {
    link: Link<T>,
    metadata: Option<CartridgeMetadata>,
}

impl<T: Transport> CartridgeClient<T> {
    /// Create a client over `transport`.
    pub fn new(transport: T, config: LinkConfig, cancel: CancelToken) -> Self {
        Self::from_link(Link::new(transport, config, cancel))
    }

    /// Wrap an existing link.
    pub fn from_link(link: Link<T>) -> Self {
        Self {
            link,
            metadata: None,
        }
    }

    /// Get the underlying link.
    pub fn link(&self) -> &Link<T> {
        &self.link
    }

    /// Get the underlying link mutably.
    pub fn link_mut(&mut self) -> &mut Link<T> {
        &mut self.link
    }

    /// Consume the client and return the transport.
    pub fn into_inner(self) -> T {
        self.link.into_inner()
    }

    /// Get the cancel token shared with the link.
    pub fn cancel_token(&self) -> &CancelToken {
        self.link.cancel_token()
    }

    /// Get the cached header, if a valid one has been read.
    pub fn metadata(&self) -> Option<&CartridgeMetadata> {
        self.metadata.as_ref()
    }

    /// Wait for the board to come out of the reset triggered by opening
    /// the port.
    ///
    /// The wait is cut short with `Cancelled` once the cancel token is set.
    pub async fn wait_for_device(&self) -> Result<()> {
        let config = self.link.config();
        tracing::debug!("Waiting {:?} for device startup", config.startup_delay);

        let until = tokio::time::Instant::now() + config.startup_delay;
        loop {
            if self.cancel_token().is_cancelled() {
                return Err(LinkError::Cancelled);
            }
            let left = until.saturating_duration_since(tokio::time::Instant::now());
            if left.is_zero() {
                return Ok(());
            }
            tokio::time::sleep(left.min(config.poll_interval)).await;
        }
    }

    /// Read and decode the cartridge header.
    ///
    /// The decoded header is returned even when its checksum is invalid,
    /// but is only cached when it is valid.
    pub async fn read_header(&mut self) -> Result<CartridgeMetadata> {
        self.metadata = None;

        let result = self.fetch_header().await;
        let meta = self.track(result)?;

        if meta.checksum_valid {
            tracing::info!("Cartridge: {}", meta.title_str());
            self.metadata = Some(meta.clone());
        } else {
            tracing::warn!("Header checksum invalid (no cartridge inserted?)");
        }
        Ok(meta)
    }

    async fn fetch_header(&mut self) -> Result<CartridgeMetadata> {
        let header = self.link.request(Command::ReadHeader).await?;
        if header.length == 0 {
            return Err(LinkError::UnexpectedLength {
                command: Command::ReadHeader,
                expected: self.link.config().header_capacity as u32,
                actual: 0,
            });
        }

        let mut buffer = vec![0u8; self.link.config().header_capacity];
        self.link
            .receive_into_buffer(header.length, &mut buffer, &mut NoProgress)
            .await?;
        CartridgeMetadata::decode(&buffer[..header.length as usize])
    }

    /// Ask the device for the cartridge RAM size in bytes.
    pub async fn ram_size(&mut self) -> Result<u32> {
        let result = self.fetch_ram_size().await;
        self.track(result)
    }

    async fn fetch_ram_size(&mut self) -> Result<u32> {
        let header = self.link.request(Command::GetRamSize).await?;
        header.expect_length(Command::GetRamSize, RAM_SIZE_PAYLOAD)?;

        let mut buffer = [0u8; LENGTH_SIZE];
        self.link
            .receive_into_buffer(header.length, &mut buffer, &mut NoProgress)
            .await?;
        let size = u32::from_be_bytes(buffer);
        tracing::debug!("RAM size: {} bytes", size);
        Ok(size)
    }

    /// Dump the ROM into `sink`, returning the number of bytes written.
    pub async fn read_rom<W>(&mut self, sink: &mut W, progress: &mut dyn Progress) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let result = self.dump(Command::ReadRom, "Reading ROM", sink, progress).await;
        self.track(result)
    }

    /// Dump the save RAM into `sink`, returning the number of bytes
    /// written.
    pub async fn read_ram<W>(&mut self, sink: &mut W, progress: &mut dyn Progress) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let result = self.dump(Command::ReadRam, "Reading RAM", sink, progress).await;
        self.track(result)
    }

    async fn dump<W>(
        &mut self,
        command: Command,
        label: &'static str,
        sink: &mut W,
        progress: &mut dyn Progress,
    ) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        self.require_cartridge()?;

        let header = self.link.request(command).await?;
        if header.length == 0 {
            return Err(LinkError::EmptyReply { command });
        }
        progress.start(label);
        let written = self
            .link
            .receive_into_sink(header.length, sink, progress)
            .await?;
        tracing::info!("{:?} complete: {} bytes", command, written);
        Ok(written)
    }

    /// Restore the save RAM from `source`.
    ///
    /// `source_len` must equal the RAM size reported by the device. With
    /// `verify` set the RAM is read back and compared after the upload.
    pub async fn write_ram<R>(
        &mut self,
        source: &mut R,
        source_len: u64,
        verify: bool,
        progress: &mut dyn Progress,
    ) -> Result<WriteReport>
    where
        R: AsyncRead + AsyncSeek + Unpin + ?Sized,
    {
        let result = self.upload(source, source_len, verify, progress).await;
        self.track(result)
    }

    async fn upload<R>(
        &mut self,
        source: &mut R,
        source_len: u64,
        verify: bool,
        progress: &mut dyn Progress,
    ) -> Result<WriteReport>
    where
        R: AsyncRead + AsyncSeek + Unpin + ?Sized,
    {
        self.require_cartridge()?;

        let device = self.fetch_ram_size().await? as u64;
        if device == 0 {
            return Err(LinkError::NoCartridgeRam);
        }
        if device != source_len {
            return Err(LinkError::RamSizeMismatch {
                device,
                file: source_len,
            });
        }

        self.link.send_request(Command::WriteRam).await?;
        tracing::debug!("RAM write: {}", Stage::RequestedWrite);
        tokio::time::sleep(self.link.config().write_settle).await;

        progress.start("Writing RAM");
        let sent = self
            .link
            .send_from_source(source, source_len, progress)
            .await?;
        tracing::debug!("RAM write: {}", Stage::Sent);
        tracing::info!("RAM write complete: {} bytes", sent);

        let verification = if verify {
            Some(verify_write(&mut self.link, source, source_len, progress).await?)
        } else {
            None
        };

        Ok(WriteReport { sent, verification })
    }

    fn require_cartridge(&self) -> Result<&CartridgeMetadata> {
        self.metadata.as_ref().ok_or(LinkError::NoCartridge)
    }

    /// Drop the cached header when an operation fails.
    fn track<V>(&mut self, result: Result<V>) -> Result<V> {
        if let Err(e) = &result {
            if self.metadata.take().is_some() {
                tracing::debug!("Cleared cartridge info after error: {}", e);
            }
        }
        result
    }
}
