// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interrupt entry and masking.
//!
//! The core has a single interrupt line. [`Dwc2::handle_interrupt`] works
//! out which part of the core raised it and forwards a service request to
//! the client. The client must call [`Dwc2::service`] or
//! [`Dwc2::service_endpoint`] from within that callback: the core's
//! interrupt output is held off with `GAHBCFG.GINT` only until
//! `handle_interrupt` returns, and a condition left pending fires again as
//! soon as it is re-enabled.

use core::cell::Cell;

use tock_registers::interfaces::{ReadWriteable, Readable};
use tock_registers::registers::ReadWrite;

use crate::debug::{DaintFlags, GintFlags};
use crate::device::Dwc2;
use crate::hil::{DeviceEvent, Direction, EndpointEvent, EndpointId};
use crate::platform::Platform;
use crate::registers::{DAINT_OUT_OFFSET, GAHBCFG, GINT, GRXSTS};

/// Keeps `GAHBCFG.GINT` cleared while alive.
///
/// Guards nest: the bit is cleared when the first guard is opened and set
/// again when the last one is dropped.
pub struct InterruptGuard<'g> {
    gahbcfg: &'g ReadWrite<u32, GAHBCFG::Register>,
    depth: &'g Cell<usize>,
}

impl<'g> InterruptGuard<'g> {
    pub(crate) fn new(
        gahbcfg: &'g ReadWrite<u32, GAHBCFG::Register>,
        depth: &'g Cell<usize>,
    ) -> InterruptGuard<'g> {
        if depth.get() == 0 {
            gahbcfg.modify(GAHBCFG::GINT::CLEAR);
        }
        depth.set(depth.get() + 1);
        InterruptGuard { gahbcfg, depth }
    }
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        let depth = self.depth.get() - 1;
        self.depth.set(depth);
        if depth == 0 {
            self.gahbcfg.modify(GAHBCFG::GINT::SET);
        }
    }
}

impl<'a, P: Platform, const N: usize> Dwc2<'a, P, N> {
    /// Entry point for the peripheral's interrupt.
    pub fn handle_interrupt(&self) {
        let regs = self.registers();
        let status = regs.gintsts.extract();
        if status.get() == 0 {
            return;
        }
        let _guard = self.interrupt_guard();
        event_trace!("interrupt {:?}", GintFlags(status.get()));

        if status.is_set(GINT::RXFLVL) && !self.uses_dma() {
            let num = regs.grxstsr.read(GRXSTS::EPNUM) as u8;
            self.endpoint_event(
                EndpointId::new(num, Direction::Out),
                EndpointEvent::ServiceRequest,
            );
        } else if status.is_set(GINT::OEPINT) || status.is_set(GINT::IEPINT) {
            let daint = regs.daint.get();
            event_trace!("endpoints {:?}", DaintFlags(daint));
            if daint != 0 {
                let bit = daint.trailing_zeros() as usize;
                let endpoint = if bit >= DAINT_OUT_OFFSET {
                    EndpointId::new((bit - DAINT_OUT_OFFSET) as u8, Direction::Out)
                } else {
                    EndpointId::new(bit as u8, Direction::In)
                };
                self.endpoint_event(endpoint, EndpointEvent::ServiceRequest);
            }
        } else {
            self.device_event(DeviceEvent::ServiceRequest);
        }
    }
}
