// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Family specific support the DWC2 core relies on.
//!
//! The register level logic of the driver is identical on every part that
//! carries the core; what differs is how the peripheral is clocked, how its
//! pins are routed, how the transceiver is powered and what low-power modes
//! have to be blocked while the bus is active. A chip crate provides those
//! pieces by implementing [`Platform`].

use crate::config::Phy;

pub trait Platform {
    /// Enable the bus clock of the peripheral and keep the chip out of sleep
    /// modes that would stop it.
    fn enable_clock(&self);

    /// Route the D+/D- (or ULPI) pins to the peripheral.
    fn configure_pins(&self);

    /// Power and clock the transceiver the core is configured for. Called
    /// before the PHY is selected in `GUSBCFG`.
    fn power_phy(&self, phy: Phy);

    /// Unmask the peripheral interrupt in the interrupt controller.
    fn enable_interrupt(&self);

    /// Busy-wait for `ms` milliseconds.
    fn delay_ms(&self, ms: u32);

    /// Called after the PHY clock has been stopped on a bus suspend. Chips
    /// can release low-power blocks or switch the USB clock to a low-power
    /// oscillator here.
    fn enter_suspend(&self) {}

    /// Called before the PHY clock is restarted on a wakeup. Undoes
    /// `enter_suspend`.
    fn exit_suspend(&self) {}

    /// One iteration of a busy-wait for a hardware acknowledgement.
    ///
    /// `iteration` counts the polls of the current wait from 0. Returning
    /// `false` abandons the wait.
    fn spin(&self, _iteration: usize) -> bool {
        core::hint::spin_loop();
        true
    }
}
