// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Endpoint bookkeeping, activation and halt handling.
//!
//! Every endpoint number has an IN and an OUT context. Endpoint 0 is the
//! control endpoint in both directions; the others are handed out by
//! [`Dwc2::claim_endpoint`] and keep their type for the life of the
//! instance.
//!
//! Taking an endpoint out of operation follows the sequence the core
//! requires: set the global NAK for the direction, flush (IN only), set
//! `EPDIS`, wait for the core to clear it, release the global NAK.

use core::cell::Cell;

use tock_cells::take_cell::TakeCell;
use tock_registers::fields::FieldValue;
use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};

use crate::device::Dwc2;
use crate::hil::{Direction, EndpointId, TransferType};
use crate::platform::Platform;
use crate::registers::{DAINT_OUT_OFFSET, DCTL, DIEPCTL, DOEPCTL};

/// Largest packet size `DxEPCTL.MPSIZ` can describe for a non-control
/// endpoint.
const MAX_PACKET_SIZE: usize = 1024;

/// Fields shared by IN and OUT endpoint contexts.
pub struct EndpointState {
    number: u8,
    transfer_type: Cell<Option<TransferType>>,
    max_packet_size: Cell<usize>,
}

impl EndpointState {
    fn new(number: usize) -> EndpointState {
        let control = number == 0;
        EndpointState {
            number: number as u8,
            transfer_type: Cell::new(if control {
                Some(TransferType::Control)
            } else {
                None
            }),
            max_packet_size: Cell::new(if control { 64 } else { 0 }),
        }
    }

    pub fn number(&self) -> usize {
        self.number as usize
    }

    pub fn transfer_type(&self) -> Option<TransferType> {
        self.transfer_type.get()
    }

    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size.get()
    }

    fn is_unassigned(&self) -> bool {
        self.transfer_type.get().is_none()
    }

    fn assign(&self, transfer_type: TransferType, max_packet_size: usize) {
        self.transfer_type.set(Some(transfer_type));
        self.max_packet_size.set(max_packet_size);
    }

    pub(crate) fn claimed_type(&self) -> TransferType {
        match self.transfer_type.get() {
            Some(transfer_type) => transfer_type,
            None => panic!("dwc2: EP{} used before being claimed", self.number),
        }
    }
}

pub struct InEndpoint<'a> {
    pub(crate) state: EndpointState,
    /// Buffer of the transfer in flight, handed back by `take_buffer`.
    pub(crate) buffer: TakeCell<'a, [u8]>,
}

impl<'a> InEndpoint<'a> {
    pub(crate) fn new(number: usize) -> InEndpoint<'a> {
        InEndpoint {
            state: EndpointState::new(number),
            buffer: TakeCell::empty(),
        }
    }
}

pub struct OutEndpoint<'a> {
    pub(crate) state: EndpointState,
    /// Receive buffer of the armed transfer.
    pub(crate) buffer: TakeCell<'a, [u8]>,
}

impl<'a> OutEndpoint<'a> {
    pub(crate) fn new(number: usize) -> OutEndpoint<'a> {
        OutEndpoint {
            state: EndpointState::new(number),
            buffer: TakeCell::empty(),
        }
    }
}

/// State transitions of one endpoint direction.
pub trait EndpointControl {
    fn activate<P: Platform, const N: usize>(&self, dev: &Dwc2<'_, P, N>);
    fn deactivate<P: Platform, const N: usize>(&self, dev: &Dwc2<'_, P, N>);
    fn set_stall<P: Platform, const N: usize>(&self, dev: &Dwc2<'_, P, N>, stall: bool);
}

/// `MPSIZ` encoding of the endpoint 0 packet size.
fn ep0_mpsiz(max_packet_size: usize) -> u32 {
    match max_packet_size {
        64 => 0,
        32 => 1,
        16 => 2,
        8 => 3,
        _ => panic!("dwc2: invalid EP0 packet size {}", max_packet_size),
    }
}

pub(crate) fn in_type(transfer_type: TransferType) -> FieldValue<u32, DIEPCTL::Register> {
    match transfer_type {
        TransferType::Control => DIEPCTL::EPTYP::Control,
        TransferType::Isochronous => DIEPCTL::EPTYP::Isochronous,
        TransferType::Bulk => DIEPCTL::EPTYP::Bulk,
        TransferType::Interrupt => DIEPCTL::EPTYP::Interrupt,
    }
}

pub(crate) fn out_type(transfer_type: TransferType) -> FieldValue<u32, DOEPCTL::Register> {
    match transfer_type {
        TransferType::Control => DOEPCTL::EPTYP::Control,
        TransferType::Isochronous => DOEPCTL::EPTYP::Isochronous,
        TransferType::Bulk => DOEPCTL::EPTYP::Bulk,
        TransferType::Interrupt => DOEPCTL::EPTYP::Interrupt,
    }
}

impl EndpointControl for InEndpoint<'_> {
    fn activate<P: Platform, const N: usize>(&self, dev: &Dwc2<'_, P, N>) {
        let num = self.state.number();
        let len = self.state.max_packet_size();
        let regs = dev.in_regs(num);

        dev.disable_in(num);
        let daintmsk = &dev.registers().daintmsk;
        daintmsk.set(daintmsk.get() | (1 << num));

        let size = if num == 0 {
            DIEPCTL::MPSIZ.val(ep0_mpsiz(len))
        } else {
            DIEPCTL::MPSIZ.val(len as u32) + DIEPCTL::SD0PID::SET
        };
        regs.diepctl.modify(
            DIEPCTL::SNAK::SET
                + DIEPCTL::USBAEP::SET
                + in_type(self.state.claimed_type())
                + DIEPCTL::TXFNUM.val(num as u32)
                + size,
        );
    }

    fn deactivate<P: Platform, const N: usize>(&self, dev: &Dwc2<'_, P, N>) {
        let num = self.state.number();
        dev.disable_in(num);
        dev.in_regs(num).diepctl.modify(DIEPCTL::USBAEP::CLEAR);
    }

    fn set_stall<P: Platform, const N: usize>(&self, dev: &Dwc2<'_, P, N>, stall: bool) {
        let num = self.state.number();
        let regs = dev.in_regs(num);
        if stall {
            dev.disable_in(num);
            regs.diepctl.modify(DIEPCTL::STALL::SET);
        } else {
            regs.diepctl
                .modify(DIEPCTL::STALL::CLEAR + DIEPCTL::SD0PID::SET);
        }
    }
}

impl EndpointControl for OutEndpoint<'_> {
    fn activate<P: Platform, const N: usize>(&self, dev: &Dwc2<'_, P, N>) {
        let num = self.state.number();
        let len = self.state.max_packet_size();
        let regs = dev.out_regs(num);

        dev.disable_out(num);
        let daintmsk = &dev.registers().daintmsk;
        daintmsk.set(daintmsk.get() | (1 << (num + DAINT_OUT_OFFSET)));

        let size = if num == 0 {
            DOEPCTL::MPSIZ.val(ep0_mpsiz(len))
        } else {
            DOEPCTL::MPSIZ.val(len as u32) + DOEPCTL::SD0PID::SET
        };
        regs.doepctl.modify(
            DOEPCTL::SNAK::SET
                + DOEPCTL::USBAEP::SET
                + out_type(self.state.claimed_type())
                + size,
        );
    }

    fn deactivate<P: Platform, const N: usize>(&self, dev: &Dwc2<'_, P, N>) {
        let num = self.state.number();
        dev.disable_out(num);
        dev.out_regs(num).doepctl.modify(DOEPCTL::USBAEP::CLEAR);
    }

    fn set_stall<P: Platform, const N: usize>(&self, dev: &Dwc2<'_, P, N>, stall: bool) {
        let num = self.state.number();
        let regs = dev.out_regs(num);
        if stall {
            dev.disable_out(num);
            regs.doepctl.modify(DOEPCTL::STALL::SET);
        } else {
            regs.doepctl
                .modify(DOEPCTL::STALL::CLEAR + DOEPCTL::SD0PID::SET);
        }
    }
}

impl<'a, P: Platform, const N: usize> Dwc2<'a, P, N> {
    /// Reserve an endpoint.
    ///
    /// Control requests always get endpoint 0 of the requested direction.
    /// Other types get the lowest unclaimed endpoint number of that
    /// direction; IN endpoints also get their transmit FIFO bank here.
    pub fn claim_endpoint(
        &self,
        transfer_type: TransferType,
        direction: Direction,
        max_packet_size: usize,
    ) -> Option<EndpointId> {
        if transfer_type == TransferType::Control {
            ep0_mpsiz(max_packet_size);
            self.endpoint_state(0, direction)
                .max_packet_size
                .set(max_packet_size);
            return Some(EndpointId::new(0, direction));
        }

        assert!(
            max_packet_size <= MAX_PACKET_SIZE,
            "dwc2: packet size {} too large",
            max_packet_size
        );

        for num in 1..self.endpoint_count() {
            let state = self.endpoint_state(num, direction);
            if state.is_unassigned() {
                if direction == Direction::In {
                    self.fifo.allocate_tx(
                        self.registers(),
                        num,
                        max_packet_size,
                        self.config().total_fifo_words(),
                    );
                }
                state.assign(transfer_type, max_packet_size);
                log::debug!(
                    target: "dwc2",
                    "EP{}-{:?} claimed as {:?}, {} bytes",
                    num,
                    direction,
                    transfer_type,
                    max_packet_size
                );
                return Some(EndpointId::new(num as u8, direction));
            }
        }
        None
    }

    pub(crate) fn endpoint_state(&self, num: usize, direction: Direction) -> &EndpointState {
        match direction {
            Direction::In => &self.in_endpoints[num].state,
            Direction::Out => &self.out_endpoints[num].state,
        }
    }

    /// Activate or deactivate an endpoint. Deactivating aborts a transfer
    /// in flight but keeps the claim and its configuration.
    pub fn set_enabled(&self, endpoint: EndpointId, enable: bool) {
        let num = endpoint.index();
        match (endpoint.direction, enable) {
            (Direction::In, true) => self.in_endpoints[num].activate(self),
            (Direction::In, false) => self.in_endpoints[num].deactivate(self),
            (Direction::Out, true) => self.out_endpoints[num].activate(self),
            (Direction::Out, false) => self.out_endpoints[num].deactivate(self),
        }
    }

    /// Halt or resume a non-control endpoint. Resuming restarts the data
    /// toggle at DATA0.
    pub fn set_stall(&self, endpoint: EndpointId, stall: bool) {
        assert!(
            endpoint.number != 0,
            "dwc2: use stall_control_endpoint for EP0"
        );
        let num = endpoint.index();
        match endpoint.direction {
            Direction::In => self.in_endpoints[num].set_stall(self, stall),
            Direction::Out => self.out_endpoints[num].set_stall(self, stall),
        }
    }

    /// Stall both directions of endpoint 0. The core clears the stall when
    /// the next SETUP packet arrives.
    pub fn stall_control_endpoint(&self) {
        self.in_regs(0).diepctl.modify(DIEPCTL::STALL::SET);
        self.out_regs(0).doepctl.modify(DOEPCTL::STALL::SET);
    }

    /// NAK on every endpoint and point each IN endpoint at its own FIFO.
    pub(crate) fn reset_endpoints(&self) {
        for num in 0..self.endpoint_count() {
            self.out_regs(num).doepctl.modify(DOEPCTL::SNAK::SET);
            self.in_regs(num)
                .diepctl
                .modify(DIEPCTL::SNAK::SET + DIEPCTL::TXFNUM.val(num as u32));
        }
    }

    /// Stop IN endpoint `num` if it has a transfer armed.
    pub(crate) fn disable_in(&self, num: usize) {
        let regs = self.in_regs(num);
        if !regs.diepctl.is_set(DIEPCTL::EPENA) {
            return;
        }
        log::debug!(target: "dwc2", "disabling EP{}-In", num);
        self.set_global_in_nak(true);
        self.flush_tx_fifo(num as u32);
        regs.diepctl
            .modify(DIEPCTL::EPDIS::SET + DIEPCTL::SNAK::SET);
        self.wait_until("IN endpoint disable", |_| {
            !regs.diepctl.is_set(DIEPCTL::EPDIS)
        });
        self.set_global_in_nak(false);
    }

    /// Stop OUT endpoint `num` if it has a transfer armed. The receive FIFO
    /// is shared and is not flushed.
    pub(crate) fn disable_out(&self, num: usize) {
        let regs = self.out_regs(num);
        if !regs.doepctl.is_set(DOEPCTL::EPENA) {
            return;
        }
        log::debug!(target: "dwc2", "disabling EP{}-Out", num);
        self.set_global_out_nak(true);
        regs.doepctl
            .modify(DOEPCTL::EPDIS::SET + DOEPCTL::SNAK::SET);
        self.wait_until("OUT endpoint disable", |_| {
            !regs.doepctl.is_set(DOEPCTL::EPDIS)
        });
        self.set_global_out_nak(false);
    }

    pub(crate) fn set_global_in_nak(&self, nak: bool) {
        let dctl = &self.registers().dctl;
        if dctl.is_set(DCTL::GINSTS) == nak {
            return;
        }
        if nak {
            dctl.modify(DCTL::SGINAK::SET);
        } else {
            dctl.modify(DCTL::CGINAK::SET);
        }
        self.wait_until("global IN NAK", |r| r.dctl.is_set(DCTL::GINSTS) == nak);
    }

    pub(crate) fn set_global_out_nak(&self, nak: bool) {
        let dctl = &self.registers().dctl;
        if dctl.is_set(DCTL::GONSTS) == nak {
            return;
        }
        if nak {
            dctl.modify(DCTL::SGONAK::SET);
        } else {
            dctl.modify(DCTL::CGONAK::SET);
        }
        self.wait_until("global OUT NAK", |r| r.dctl.is_set(DCTL::GONSTS) == nak);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Dwc2Config;
    use crate::registers::DIEPTXF;
    use crate::test_support::{active, Fixture, Hw};

    const EP1_IN: EndpointId = EndpointId::new(1, Direction::In);
    const EP1_OUT: EndpointId = EndpointId::new(1, Direction::Out);

    #[test]
    fn control_claim_is_idempotent() {
        let Fixture { dev, .. } = active(Dwc2Config::full_speed());
        let a = dev.claim_endpoint(TransferType::Control, Direction::In, 64);
        let b = dev.claim_endpoint(TransferType::Control, Direction::In, 64);
        assert_eq!(a, Some(EndpointId::new(0, Direction::In)));
        assert_eq!(a, b);
        assert_eq!(
            dev.claim_endpoint(TransferType::Control, Direction::Out, 64),
            Some(EndpointId::new(0, Direction::Out))
        );
        // No FIFO bank is taken for endpoint 0.
        assert_eq!(dev.fifo.words_used(), 144);
    }

    #[test]
    #[should_panic]
    fn control_claim_rejects_odd_size() {
        let Fixture { dev, .. } = active(Dwc2Config::full_speed());
        dev.claim_endpoint(TransferType::Control, Direction::In, 48);
    }

    #[test]
    fn claims_ascend_and_run_out() {
        let Fixture { dev, regs, .. } = active(Dwc2Config::full_speed());
        let claimed: Vec<_> = (0..3)
            .map(|_| dev.claim_endpoint(TransferType::Bulk, Direction::In, 64))
            .collect();
        assert_eq!(
            claimed,
            vec![
                Some(EndpointId::new(1, Direction::In)),
                Some(EndpointId::new(2, Direction::In)),
                Some(EndpointId::new(3, Direction::In)),
            ]
        );
        // The FS core has four endpoints per direction.
        assert_eq!(
            dev.claim_endpoint(TransferType::Interrupt, Direction::In, 8),
            None
        );

        assert_eq!(regs.dieptxf[0].read(DIEPTXF::START), 144);
        assert_eq!(regs.dieptxf[1].read(DIEPTXF::START), 160);
        assert_eq!(regs.dieptxf[2].read(DIEPTXF::START), 176);

        // OUT endpoints are numbered independently and take no FIFO space.
        assert_eq!(
            dev.claim_endpoint(TransferType::Interrupt, Direction::Out, 8),
            Some(EP1_OUT)
        );
        assert_eq!(dev.fifo.words_used(), 192);
    }

    #[test]
    fn claim_records_type_and_size() {
        let Fixture { dev, .. } = active(Dwc2Config::full_speed());
        dev.claim_endpoint(TransferType::Isochronous, Direction::Out, 256);
        let state = dev.endpoint_state(1, Direction::Out);
        assert_eq!(state.transfer_type(), Some(TransferType::Isochronous));
        assert_eq!(state.max_packet_size(), 256);
        assert_eq!(
            dev.endpoint_state(0, Direction::Out).transfer_type(),
            Some(TransferType::Control)
        );
    }

    #[test]
    #[should_panic]
    fn claiming_past_fifo_capacity_panics() {
        let Fixture { dev, .. } = active(Dwc2Config::full_speed());
        // 176 words are free after RX and EP0.
        dev.claim_endpoint(TransferType::Bulk, Direction::In, 512);
        dev.claim_endpoint(TransferType::Bulk, Direction::In, 256);
    }

    #[test]
    fn activate_in_endpoint() {
        let Fixture { dev, regs, .. } = active(Dwc2Config::full_speed());
        dev.claim_endpoint(TransferType::Bulk, Direction::In, 64);
        dev.set_enabled(EP1_IN, true);

        let ctl = regs.in_endpoints[1].diepctl.extract();
        assert!(ctl.is_set(DIEPCTL::USBAEP));
        assert!(ctl.is_set(DIEPCTL::SNAK));
        assert!(ctl.is_set(DIEPCTL::SD0PID));
        assert_eq!(ctl.read(DIEPCTL::MPSIZ), 64);
        assert_eq!(ctl.read(DIEPCTL::EPTYP), 2);
        assert_eq!(ctl.read(DIEPCTL::TXFNUM), 1);
        assert_eq!(regs.daintmsk.get() & 0b10, 0b10);
    }

    #[test]
    fn activate_ep0_uses_size_encoding() {
        let Fixture { dev, regs, .. } = active(Dwc2Config::full_speed());
        dev.claim_endpoint(TransferType::Control, Direction::Out, 8);
        dev.set_enabled(EndpointId::new(0, Direction::Out), true);

        let ctl = regs.out_endpoints[0].doepctl.extract();
        assert!(ctl.is_set(DOEPCTL::USBAEP));
        assert_eq!(ctl.read(DOEPCTL::MPSIZ), 3);
        assert_eq!(ctl.read(DOEPCTL::EPTYP), 0);
        assert!(!ctl.is_set(DOEPCTL::SD0PID));
        assert_eq!(regs.daintmsk.get(), 1 << 16);
    }

    #[test]
    fn disable_sequence_brackets_with_global_nak() {
        let Fixture {
            dev, regs, platform, ..
        } = active(Dwc2Config::full_speed());
        dev.claim_endpoint(TransferType::Bulk, Direction::In, 64);
        dev.claim_endpoint(TransferType::Bulk, Direction::In, 64);
        let ep2 = EndpointId::new(2, Direction::In);
        dev.set_enabled(ep2, true);
        regs.in_endpoints[2].diepctl.modify(DIEPCTL::EPENA::SET);
        platform.clear_log();

        dev.set_enabled(ep2, false);

        assert_eq!(
            platform.log(),
            vec![
                Hw::GlobalInNak(true),
                Hw::TxFlush(2),
                Hw::InDisabled(2),
                Hw::GlobalInNak(false),
            ]
        );
        let ctl = regs.in_endpoints[2].diepctl.extract();
        assert!(!ctl.is_set(DIEPCTL::EPENA));
        assert!(!ctl.is_set(DIEPCTL::USBAEP));
        assert!(!regs.dctl.is_set(DCTL::GINSTS));
    }

    #[test]
    fn out_disable_skips_flush() {
        let Fixture {
            dev, regs, platform, ..
        } = active(Dwc2Config::full_speed());
        dev.claim_endpoint(TransferType::Bulk, Direction::Out, 64);
        dev.set_enabled(EP1_OUT, true);
        regs.out_endpoints[1].doepctl.modify(DOEPCTL::EPENA::SET);
        platform.clear_log();

        dev.set_enabled(EP1_OUT, false);

        assert_eq!(
            platform.log(),
            vec![
                Hw::GlobalOutNak(true),
                Hw::OutDisabled(1),
                Hw::GlobalOutNak(false),
            ]
        );
    }

    #[test]
    fn idle_endpoint_disables_without_handshake() {
        let Fixture {
            dev, regs, platform, ..
        } = active(Dwc2Config::full_speed());
        dev.claim_endpoint(TransferType::Bulk, Direction::In, 64);
        dev.set_enabled(EP1_IN, true);
        platform.clear_log();

        dev.set_enabled(EP1_IN, false);
        assert!(platform.log().is_empty());
        assert!(!regs.in_endpoints[1].diepctl.is_set(DIEPCTL::USBAEP));
    }

    #[test]
    fn global_nak_is_idempotent() {
        let Fixture {
            dev, regs, platform, ..
        } = active(Dwc2Config::full_speed());
        platform.clear_log();
        dev.set_global_in_nak(true);
        dev.set_global_in_nak(true);
        assert!(regs.dctl.is_set(DCTL::GINSTS));
        assert_eq!(platform.log(), vec![Hw::GlobalInNak(true)]);

        // With the core not acknowledging, an already satisfied request
        // must not spin.
        platform.set_responsive(false);
        let spins = platform.spins();
        dev.set_global_in_nak(true);
        dev.set_global_out_nak(false);
        assert_eq!(platform.spins(), spins);
    }

    #[test]
    fn disable_then_enable_keeps_configuration() {
        let Fixture { dev, regs, .. } = active(Dwc2Config::full_speed());
        dev.claim_endpoint(TransferType::Interrupt, Direction::In, 16);
        dev.set_enabled(EP1_IN, true);
        regs.in_endpoints[1].diepctl.modify(DIEPCTL::EPENA::SET);

        dev.set_enabled(EP1_IN, false);
        dev.set_enabled(EP1_IN, true);

        let ctl = regs.in_endpoints[1].diepctl.extract();
        assert!(ctl.is_set(DIEPCTL::USBAEP));
        assert_eq!(ctl.read(DIEPCTL::EPTYP), 3);
        assert_eq!(ctl.read(DIEPCTL::MPSIZ), 16);
        let state = dev.endpoint_state(1, Direction::In);
        assert_eq!(state.transfer_type(), Some(TransferType::Interrupt));
        assert_eq!(state.max_packet_size(), 16);
    }

    #[test]
    fn stall_then_clear_resets_toggle() {
        let Fixture {
            dev, regs, platform, ..
        } = active(Dwc2Config::full_speed());
        dev.claim_endpoint(TransferType::Bulk, Direction::Out, 64);
        dev.set_enabled(EP1_OUT, true);
        regs.out_endpoints[1]
            .doepctl
            .modify(DOEPCTL::EPENA::SET + DOEPCTL::SD0PID::CLEAR);
        platform.clear_log();

        dev.set_stall(EP1_OUT, true);
        assert!(regs.out_endpoints[1].doepctl.is_set(DOEPCTL::STALL));
        assert!(platform.log().contains(&Hw::OutDisabled(1)));

        dev.set_stall(EP1_OUT, false);
        let ctl = regs.out_endpoints[1].doepctl.extract();
        assert!(!ctl.is_set(DOEPCTL::STALL));
        assert!(ctl.is_set(DOEPCTL::SD0PID));
    }

    #[test]
    #[should_panic]
    fn stalling_ep0_directly_panics() {
        let Fixture { dev, .. } = active(Dwc2Config::full_speed());
        dev.set_stall(EndpointId::new(0, Direction::In), true);
    }

    #[test]
    fn control_stall_hits_both_directions() {
        let Fixture { dev, regs, .. } = active(Dwc2Config::full_speed());
        dev.stall_control_endpoint();
        assert!(regs.in_endpoints[0].diepctl.is_set(DIEPCTL::STALL));
        assert!(regs.out_endpoints[0].doepctl.is_set(DOEPCTL::STALL));
        assert!(!regs.in_endpoints[1].diepctl.is_set(DIEPCTL::STALL));
    }
}
