// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Static configuration of DWC2 instances and compile-time tracing options.
//!
//! Each peripheral instance is described by a [`Dwc2Config`], normally a
//! `static` in the board or chip crate, created from one of the presets and
//! adjusted with struct update syntax:
//!
//! ```rust,ignore
//! static OTG_HS: Dwc2Config = Dwc2Config {
//!     phy: Phy::Ulpi,
//!     dma: true,
//!     ..Dwc2Config::high_speed()
//! };
//! ```
//!
//! Tracing is controlled crate-wide by the `CONFIG` constant, whose values
//! come from cargo features so that a board can turn them on without editing
//! this crate. Disabled tracing is folded away by the compiler.

/// Size of the smallest transmit FIFO bank, in 32 bit words.
pub const FIFO_MIN_WORDS: usize = 16;

/// Which flavour of the core the instance is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoreType {
    /// OTG_FS: full-speed only, builtin transceiver.
    FullSpeed,
    /// OTG_HS: high-speed capable core.
    HighSpeed,
}

/// Transceiver a high-speed core is wired to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phy {
    /// The builtin full-speed transceiver.
    Builtin,
    /// External ULPI transceiver.
    Ulpi,
    /// On-chip UTMI+ high-speed transceiver.
    Utmi,
}

/// Hardware revision of the core, as far as the driver has to care.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoreRevision {
    /// STM32 cores with core ID 1.x (F2, F4 up to F446).
    Cid1x,
    /// STM32 cores with core ID 2.x (F7, L4, H7 ...).
    Cid2x,
    /// Cores without the STM32 specific `GCCFG` layout (ESP32, EFM32).
    Generic,
}

impl CoreRevision {
    /// Whether `GCCFG` carries the STM32 transceiver power and VBUS bits.
    pub fn has_stm32_gccfg(self) -> bool {
        self != CoreRevision::Generic
    }

    /// Cores other than CID 1.x do not report SETUP complete for non-empty
    /// packets on endpoint 0, so the data update has to complete the transfer.
    pub fn completes_setup_on_data(self) -> bool {
        self != CoreRevision::Cid1x
    }
}

/// Configuration of one peripheral instance.
#[derive(Clone, Copy, Debug)]
pub struct Dwc2Config {
    pub core: CoreType,
    pub phy: Phy,
    pub revision: CoreRevision,
    /// Let the core move packet data by DMA instead of copying through the
    /// FIFO windows.
    pub dma: bool,
    /// Number of endpoints per direction, including endpoint 0.
    pub endpoints: usize,
    /// Depth of the receive FIFO in words.
    pub rx_fifo_words: usize,
    /// Size of the whole FIFO memory in bytes.
    pub total_fifo_bytes: usize,
    /// Alignment DMA buffers must have, in bytes.
    pub dma_alignment: usize,
    /// Upper bound on busy-wait iterations for a hardware acknowledgement.
    /// `None` waits for as long as the platform keeps spinning.
    pub spin_limit: Option<usize>,
    /// Delay before reading a received packet out of the FIFO. Required on
    /// EFM32.
    pub rx_settle_delay_ms: u32,
}

impl Dwc2Config {
    /// Full-speed core with the builtin transceiver.
    pub const fn full_speed() -> Dwc2Config {
        Dwc2Config {
            core: CoreType::FullSpeed,
            phy: Phy::Builtin,
            revision: CoreRevision::Cid1x,
            dma: false,
            endpoints: 4,
            rx_fifo_words: 128,
            total_fifo_bytes: 1280,
            dma_alignment: 4,
            spin_limit: None,
            rx_settle_delay_ms: 0,
        }
    }

    /// High-speed core running from its builtin full-speed transceiver.
    pub const fn high_speed() -> Dwc2Config {
        Dwc2Config {
            core: CoreType::HighSpeed,
            phy: Phy::Builtin,
            revision: CoreRevision::Cid1x,
            dma: false,
            endpoints: 6,
            rx_fifo_words: 512,
            total_fifo_bytes: 4096,
            dma_alignment: 4,
            spin_limit: None,
            rx_settle_delay_ms: 0,
        }
    }

    /// Whether the link runs at full speed, either because the core cannot do
    /// more or because it is wired to the builtin transceiver.
    pub fn is_full_speed(&self) -> bool {
        self.core == CoreType::FullSpeed || self.phy == Phy::Builtin
    }

    pub fn total_fifo_words(&self) -> usize {
        self.total_fifo_bytes / 4
    }

    /// USB turnaround time programmed into `GUSBCFG.TRDT`.
    pub fn turnaround_time(&self) -> u32 {
        match self.core {
            CoreType::FullSpeed => 0x06,
            CoreType::HighSpeed => 0x09,
        }
    }
}

/// Compile-time tracing options.
pub(crate) struct Config {
    /// Log every event handed to the client.
    pub(crate) trace_events: bool,

    /// Log every transfer that is armed or completed.
    pub(crate) trace_transfers: bool,
}

/// A unique instance of `Config` where compile-time configuration options are
/// defined.
pub(crate) const CONFIG: Config = Config {
    trace_events: cfg!(feature = "trace_events"),
    trace_transfers: cfg!(feature = "trace_transfers"),
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        let fs = Dwc2Config::full_speed();
        assert!(fs.is_full_speed());
        assert_eq!(fs.total_fifo_words(), 320);
        assert_eq!(fs.turnaround_time(), 6);

        let hs = Dwc2Config::high_speed();
        assert!(hs.is_full_speed());
        assert_eq!(hs.turnaround_time(), 9);

        let ulpi = Dwc2Config {
            phy: Phy::Ulpi,
            ..hs
        };
        assert!(!ulpi.is_full_speed());
    }

    #[test]
    fn revision_quirks() {
        assert!(!CoreRevision::Cid1x.completes_setup_on_data());
        assert!(CoreRevision::Cid2x.completes_setup_on_data());
        assert!(CoreRevision::Generic.completes_setup_on_data());
        assert!(!CoreRevision::Generic.has_stm32_gccfg());
    }
}
