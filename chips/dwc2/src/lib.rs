// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Device-mode driver for the Synopsys DesignWare USB 2.0 OTG core (DWC2).
//!
//! The DWC2 core is found in the full-speed and high-speed OTG peripherals of
//! STM32, ESP32 and EFM32 parts, among others. This crate drives it purely as
//! a USB device: the core is forced into device mode during [`Dwc2::init`]
//! and host or OTG role negotiation is never used.
//!
//! The driver covers the hardware-facing half of a device stack:
//!
//! * partitioning the shared FIFO memory between endpoints ([`fifo`]),
//! * claiming, enabling, disabling and stalling endpoints ([`endpoint`]),
//! * arming IN and OUT transfers through the FIFOs or DMA ([`transfer`]),
//! * turning global interrupt flags into reset, suspend and resume events
//!   ([`protocol`]),
//! * demultiplexing the peripheral interrupt ([`interrupt`]).
//!
//! Everything family specific (clocks, pins, PHY power, low-power modes)
//! goes through the [`platform::Platform`] trait, and events reach the USB
//! stack above through [`hil::Client`].
//!
//! Usage
//! -----
//!
//! ```rust,ignore
//! const OTG_FS_BASE: StaticRef<Dwc2Registers> =
//!     unsafe { StaticRef::new(0x5000_0000 as *const Dwc2Registers) };
//! static CONFIG: Dwc2Config = Dwc2Config::full_speed();
//!
//! let usb = static_init!(
//!     Dwc2<'static, BoardPlatform, 4>,
//!     Dwc2::new(OTG_FS_BASE, &CONFIG, &PLATFORM)
//! );
//! usb.set_client(stack);
//! usb.init();
//! usb.set_option(DeviceOption::Attach, OptionValue::Enable(true))?;
//! ```

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod debug;

pub mod config;
pub mod endpoint;
pub mod errorcode;
pub mod fifo;
pub mod hil;
pub mod interrupt;
pub mod peripherals;
pub mod platform;
pub mod protocol;
pub mod registers;
pub mod static_ref;
pub mod transfer;

mod device;

#[cfg(test)]
mod test_support;

pub use crate::config::{CoreRevision, CoreType, Dwc2Config, Phy};
pub use crate::device::Dwc2;
pub use crate::errorcode::ErrorCode;
pub use crate::peripherals::UsbPeripherals;
pub use crate::platform::Platform;
