// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Peripheral instance and core bring-up.

use core::cell::Cell;

use tock_cells::optional_cell::OptionalCell;
use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};

use crate::config::{CoreRevision, CoreType, Dwc2Config, Phy};
use crate::endpoint::{InEndpoint, OutEndpoint};
use crate::errorcode::ErrorCode;
use crate::fifo::FifoAllocator;
use crate::hil::{
    Client, DeviceEvent, DeviceOption, Direction, EndpointEvent, EndpointId, EndpointOption,
    OptionValue, TransferType, UsbDevice,
};
use crate::interrupt::InterruptGuard;
use crate::platform::Platform;
use crate::registers::{
    Dwc2Registers, InEndpointRegisters, OutEndpointRegisters, DIEPMSK, DOEPMSK, GAHBCFG, GCCFG,
    GINT, GOTGCTL, GRSTCTL, GUSBCFG, DCFG, MAX_ENDPOINTS, TXFNUM_ALL,
};
use crate::static_ref::StaticRef;

/// Time the core needs after being forced into device mode.
const FORCE_MODE_DELAY_MS: u32 = 25;

/// One DWC2 controller in device mode.
///
/// `N` is the capacity of the endpoint tables; the number of endpoints
/// actually used is `Dwc2Config::endpoints`, which must not exceed it.
pub struct Dwc2<'a, P: Platform, const N: usize> {
    registers: StaticRef<Dwc2Registers>,
    config: &'a Dwc2Config,
    platform: &'a P,
    pub(crate) fifo: FifoAllocator,
    pub(crate) suspended: Cell<bool>,
    guard_depth: Cell<usize>,
    pub(crate) in_endpoints: [InEndpoint<'a>; N],
    pub(crate) out_endpoints: [OutEndpoint<'a>; N],
    client: OptionalCell<&'a dyn Client>,
}

impl<'a, P: Platform, const N: usize> Dwc2<'a, P, N> {
    pub fn new(
        registers: StaticRef<Dwc2Registers>,
        config: &'a Dwc2Config,
        platform: &'a P,
    ) -> Dwc2<'a, P, N> {
        assert!(N <= MAX_ENDPOINTS);
        assert!(
            config.endpoints > 0 && config.endpoints <= N,
            "dwc2: {} endpoints configured, room for {}",
            config.endpoints,
            N
        );
        Dwc2 {
            registers,
            config,
            platform,
            fifo: FifoAllocator::new(),
            suspended: Cell::new(false),
            guard_depth: Cell::new(0),
            in_endpoints: core::array::from_fn(InEndpoint::new),
            out_endpoints: core::array::from_fn(OutEndpoint::new),
            client: OptionalCell::empty(),
        }
    }

    pub fn set_client(&self, client: &'a dyn Client) {
        self.client.set(client);
    }

    pub fn config(&self) -> &Dwc2Config {
        self.config
    }

    pub(crate) fn platform(&self) -> &P {
        self.platform
    }

    pub(crate) fn registers(&self) -> &Dwc2Registers {
        &self.registers
    }

    pub(crate) fn in_regs(&self, num: usize) -> &InEndpointRegisters {
        &self.registers.in_endpoints[num]
    }

    pub(crate) fn out_regs(&self, num: usize) -> &OutEndpointRegisters {
        &self.registers.out_endpoints[num]
    }

    pub fn uses_dma(&self) -> bool {
        self.config.dma
    }

    /// Number of endpoints per direction in use, endpoint 0 included.
    pub fn endpoint_count(&self) -> usize {
        self.config.endpoints
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.get()
    }

    /// Keep the core's interrupt output masked until the returned guard, and
    /// every guard opened after it, has been dropped.
    pub(crate) fn interrupt_guard(&self) -> InterruptGuard<'_> {
        InterruptGuard::new(&self.registers.gahbcfg, &self.guard_depth)
    }

    pub(crate) fn device_event(&self, event: DeviceEvent) {
        event_trace!("device event {:?}", event);
        self.client.map(|client| client.device_event(event));
    }

    pub(crate) fn endpoint_event(&self, endpoint: EndpointId, event: EndpointEvent) {
        event_trace!(
            "EP{}-{:?} event {:?}",
            endpoint.number,
            endpoint.direction,
            event
        );
        self.client
            .map(|client| client.endpoint_event(endpoint, event));
    }

    /// Poll until `done` holds, spinning through the platform between polls.
    ///
    /// Returns `false` if the wait was abandoned, either by the platform or
    /// because the configured spin limit was reached.
    pub(crate) fn wait_until<F>(&self, what: &str, done: F) -> bool
    where
        F: Fn(&Dwc2Registers) -> bool,
    {
        let registers = self.registers();
        let mut iteration = 0;
        while !done(registers) {
            let exhausted = self
                .config
                .spin_limit
                .is_some_and(|limit| iteration >= limit);
            if exhausted || !self.platform.spin(iteration) {
                log::warn!(
                    target: "dwc2",
                    "gave up waiting for {} after {} polls",
                    what,
                    iteration
                );
                return false;
            }
            iteration += 1;
        }
        true
    }

    pub(crate) fn flush_rx_fifo(&self) {
        self.registers.grstctl.modify(GRSTCTL::RXFFLSH::SET);
        self.wait_until("RX FIFO flush", |r| !r.grstctl.is_set(GRSTCTL::RXFFLSH));
    }

    /// Flush transmit FIFO `num`, or all of them for `TXFNUM_ALL`.
    pub(crate) fn flush_tx_fifo(&self, num: u32) {
        self.registers
            .grstctl
            .modify(GRSTCTL::TXFNUM.val(num) + GRSTCTL::TXFFLSH::SET);
        self.wait_until("TX FIFO flush", |r| !r.grstctl.is_set(GRSTCTL::TXFFLSH));
    }

    pub(crate) fn flush_all_fifos(&self) {
        self.flush_rx_fifo();
        self.flush_tx_fifo(TXFNUM_ALL);
    }

    /// Bring the core from powered-but-unconfigured into device mode, with
    /// the FIFOs laid out, every endpoint NAKing and interrupts unmasked.
    pub fn init(&self) {
        let regs = self.registers();
        let config = self.config;

        self.platform.enable_clock();
        self.platform.configure_pins();
        self.platform.power_phy(config.phy);
        if config.core == CoreType::HighSpeed {
            self.select_phy();
        }

        self.reset_core();
        regs.pcgcctl.set(0);

        regs.gusbcfg
            .modify(GUSBCFG::FHMOD::CLEAR + GUSBCFG::FDMOD::SET);
        self.platform.delay_ms(FORCE_MODE_DELAY_MS);

        self.configure_vbus();
        regs.gusbcfg
            .modify(GUSBCFG::HNPCAP::CLEAR + GUSBCFG::SRPCAP::CLEAR);

        if config.is_full_speed() {
            regs.dcfg.modify(DCFG::DSPD::FullSpeed);
        } else {
            regs.dcfg.modify(DCFG::DSPD::HighSpeed);
        }

        self.fifo.configure(regs, config.rx_fifo_words);
        self.flush_all_fifos();

        regs.gusbcfg
            .modify(GUSBCFG::TRDT.val(config.turnaround_time()));

        self.reset_endpoints();
        self.set_global_in_nak(false);
        self.set_global_out_nak(false);

        if self.uses_dma() {
            regs.gahbcfg
                .modify(GAHBCFG::DMAEN::SET + GAHBCFG::HBSTLEN::Incr8);
            regs.doepmsk.modify(DOEPMSK::XFRCM::SET);
            regs.diepmsk.modify(DIEPMSK::XFRCM::SET);
        }

        let events = GINT::USBSUSP::SET
            + GINT::WKUPINT::SET
            + GINT::ENUMDNE::SET
            + GINT::USBRST::SET
            + GINT::OTGINT::SET
            + GINT::IEPINT::SET
            + GINT::OEPINT::SET;
        let mask = if self.uses_dma() {
            events
        } else {
            events + GINT::RXFLVL::SET
        };
        regs.gintsts.write(mask);
        regs.gintmsk.modify(mask);

        log::debug!(
            target: "dwc2",
            "core in {} mode, {} endpoints, {} of {} FIFO words used",
            if regs.gintsts.is_set(GINT::CMOD) { "host" } else { "device" },
            config.endpoints,
            self.fifo.words_used(),
            config.total_fifo_words()
        );

        regs.gahbcfg
            .modify(GAHBCFG::GINT::SET + GAHBCFG::TXFELVL::SET);
        self.platform.enable_interrupt();
    }

    fn select_phy(&self) {
        let regs = self.registers();
        match self.config.phy {
            Phy::Builtin => regs.gusbcfg.modify(GUSBCFG::PHYSEL::SET),
            Phy::Ulpi => regs.gusbcfg.modify(
                GUSBCFG::ULPI_UTMI_SEL::SET
                    + GUSBCFG::PHYIF::CLEAR
                    + GUSBCFG::DDRSEL::CLEAR
                    + GUSBCFG::PHYSEL::CLEAR
                    + GUSBCFG::ULPIEVBUSD::CLEAR
                    + GUSBCFG::ULPIEVBUSI::CLEAR
                    + GUSBCFG::ULPIFSLS::CLEAR,
            ),
            Phy::Utmi => regs.gusbcfg.modify(
                GUSBCFG::ULPI_UTMI_SEL::CLEAR + GUSBCFG::PHYIF::CLEAR + GUSBCFG::PHYSEL::CLEAR,
            ),
        }
    }

    /// Soft reset the core once its AHB master has gone idle.
    fn reset_core(&self) {
        let regs = self.registers();
        self.wait_until("AHB idle", |r| r.grstctl.is_set(GRSTCTL::AHBIDL));
        regs.grstctl.modify(GRSTCTL::CSRST::SET);
        self.wait_until("core reset", |r| !r.grstctl.is_set(GRSTCTL::CSRST));
    }

    /// Make the core believe a B-session is valid, so the pull-up is driven
    /// whether or not VBUS is sensed.
    fn configure_vbus(&self) {
        let regs = self.registers();
        let overrides = GOTGCTL::VBVALOEN::SET
            + GOTGCTL::VBVALOVAL::SET
            + GOTGCTL::BVALOEN::SET
            + GOTGCTL::BVALOVAL::SET;
        match self.config.revision {
            CoreRevision::Cid1x => regs.gccfg.modify(GCCFG::NOVBUSSENS::SET),
            CoreRevision::Cid2x => {
                regs.gccfg.modify(GCCFG::VBDEN::SET);
                regs.gotgctl.modify(overrides);
            }
            CoreRevision::Generic => regs.gotgctl.modify(overrides),
        }

        if self.config.revision.has_stm32_gccfg() {
            // PWRDWN set means the builtin transceiver is powered.
            if self.config.phy == Phy::Builtin {
                regs.gccfg.modify(GCCFG::PWRDWN::SET);
            } else {
                regs.gccfg.modify(GCCFG::PWRDWN::CLEAR);
            }
        }
    }
}

impl<'a, P: Platform, const N: usize> UsbDevice<'a> for Dwc2<'a, P, N> {
    fn set_client(&self, client: &'a dyn Client) {
        Dwc2::set_client(self, client);
    }

    fn init(&self) {
        Dwc2::init(self);
    }

    fn claim_endpoint(
        &self,
        transfer_type: TransferType,
        direction: Direction,
        max_packet_size: usize,
    ) -> Option<EndpointId> {
        Dwc2::claim_endpoint(self, transfer_type, direction, max_packet_size)
    }

    fn get_option(&self, option: DeviceOption) -> Result<OptionValue, ErrorCode> {
        Dwc2::get_option(self, option)
    }

    fn set_option(&self, option: DeviceOption, value: OptionValue) -> Result<(), ErrorCode> {
        Dwc2::set_option(self, option, value)
    }

    fn stall_control_endpoint(&self) {
        Dwc2::stall_control_endpoint(self);
    }

    fn service(&self) {
        Dwc2::service(self);
    }

    fn endpoint_get_option(
        &self,
        endpoint: EndpointId,
        option: EndpointOption,
    ) -> Result<OptionValue, ErrorCode> {
        Dwc2::endpoint_get_option(self, endpoint, option)
    }

    fn endpoint_set_option(
        &self,
        endpoint: EndpointId,
        option: EndpointOption,
        value: OptionValue,
    ) -> Result<(), ErrorCode> {
        Dwc2::endpoint_set_option(self, endpoint, option, value)
    }

    fn transmit(
        &self,
        endpoint: EndpointId,
        buf: &'a mut [u8],
        len: usize,
    ) -> Result<(), (ErrorCode, &'a mut [u8])> {
        Dwc2::transmit(self, endpoint, buf, len)
    }

    fn take_buffer(&self, endpoint: EndpointId) -> Option<&'a mut [u8]> {
        Dwc2::take_buffer(self, endpoint)
    }

    fn service_endpoint(&self, endpoint: EndpointId) {
        Dwc2::service_endpoint(self, endpoint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::{DCTL, DIEPCTL, DIEPTXF, DOEPCTL, GRXFSIZ};
    use crate::test_support::{build, Fixture, Hw};

    #[test]
    fn init_full_speed() {
        let Fixture {
            dev, regs, platform, ..
        } = build(Dwc2Config::full_speed());
        dev.init();

        assert!(regs.gusbcfg.is_set(GUSBCFG::FDMOD));
        assert!(!regs.gusbcfg.is_set(GUSBCFG::HNPCAP));
        assert!(!regs.gusbcfg.is_set(GUSBCFG::SRPCAP));
        assert_eq!(regs.gusbcfg.read(GUSBCFG::TRDT), 6);
        // The FS core has a fixed transceiver.
        assert!(!regs.gusbcfg.is_set(GUSBCFG::PHYSEL));

        assert!(regs.gccfg.is_set(GCCFG::NOVBUSSENS));
        assert!(regs.gccfg.is_set(GCCFG::PWRDWN));
        assert_eq!(regs.gotgctl.get(), 0);

        assert_eq!(regs.dcfg.read(DCFG::DSPD), 3);
        assert_eq!(regs.pcgcctl.get(), 0);

        assert_eq!(regs.grxfsiz.read(GRXFSIZ::RXFD), 128);
        assert_eq!(regs.dieptxf0.read(DIEPTXF::START), 128);
        assert_eq!(regs.dieptxf0.read(DIEPTXF::DEPTH), 16);
        assert_eq!(dev.fifo.words_used(), 144);

        for i in 0..4 {
            assert!(regs.in_endpoints[i].diepctl.is_set(DIEPCTL::SNAK));
            assert_eq!(regs.in_endpoints[i].diepctl.read(DIEPCTL::TXFNUM), i as u32);
            assert!(regs.out_endpoints[i].doepctl.is_set(DOEPCTL::SNAK));
        }
        // Endpoints beyond the configured count are untouched.
        assert_eq!(regs.in_endpoints[4].diepctl.get(), 0);

        assert!(!regs.dctl.is_set(DCTL::GINSTS));
        assert!(!regs.dctl.is_set(DCTL::GONSTS));

        let mask = regs.gintmsk.extract();
        for f in [
            GINT::USBSUSP,
            GINT::WKUPINT,
            GINT::ENUMDNE,
            GINT::USBRST,
            GINT::OTGINT,
            GINT::IEPINT,
            GINT::OEPINT,
            GINT::RXFLVL,
        ] {
            assert!(mask.is_set(f));
        }
        assert!(!mask.is_set(GINT::SOF));

        assert!(!regs.gahbcfg.is_set(GAHBCFG::DMAEN));
        assert!(regs.gahbcfg.is_set(GAHBCFG::GINT));
        assert!(regs.gahbcfg.is_set(GAHBCFG::TXFELVL));

        assert_eq!(
            platform.log(),
            vec![
                Hw::ClockEnabled,
                Hw::PinsConfigured,
                Hw::PhyPowered(Phy::Builtin),
                Hw::CoreReset,
                Hw::Delay(25),
                Hw::RxFlush,
                Hw::TxFlush(TXFNUM_ALL),
                Hw::InterruptEnabled,
            ]
        );
    }

    #[test]
    fn init_high_speed_ulpi_with_dma() {
        let Fixture { dev, regs, .. } = build(Dwc2Config {
            phy: Phy::Ulpi,
            revision: CoreRevision::Cid2x,
            dma: true,
            ..Dwc2Config::high_speed()
        });
        regs.gusbcfg
            .modify(GUSBCFG::PHYSEL::SET + GUSBCFG::ULPIFSLS::SET + GUSBCFG::PHYIF::SET);
        dev.init();

        assert!(regs.gusbcfg.is_set(GUSBCFG::ULPI_UTMI_SEL));
        assert!(!regs.gusbcfg.is_set(GUSBCFG::PHYSEL));
        assert!(!regs.gusbcfg.is_set(GUSBCFG::PHYIF));
        assert!(!regs.gusbcfg.is_set(GUSBCFG::ULPIFSLS));
        assert_eq!(regs.gusbcfg.read(GUSBCFG::TRDT), 9);

        assert!(regs.gccfg.is_set(GCCFG::VBDEN));
        assert!(!regs.gccfg.is_set(GCCFG::PWRDWN));
        assert!(regs.gotgctl.is_set(GOTGCTL::BVALOEN));
        assert!(regs.gotgctl.is_set(GOTGCTL::BVALOVAL));
        assert!(regs.gotgctl.is_set(GOTGCTL::VBVALOEN));
        assert!(regs.gotgctl.is_set(GOTGCTL::VBVALOVAL));

        assert_eq!(regs.dcfg.read(DCFG::DSPD), 0);
        assert_eq!(regs.grxfsiz.read(GRXFSIZ::RXFD), 512);

        assert!(regs.gahbcfg.is_set(GAHBCFG::DMAEN));
        assert_eq!(regs.gahbcfg.read(GAHBCFG::HBSTLEN), 5);
        assert!(regs.diepmsk.is_set(DIEPMSK::XFRCM));
        assert!(regs.doepmsk.is_set(DOEPMSK::XFRCM));
        // The receive FIFO level interrupt is not used with DMA.
        assert!(!regs.gintmsk.is_set(GINT::RXFLVL));
    }

    #[test]
    fn init_high_speed_builtin_phy_runs_full_speed() {
        let Fixture { dev, regs, .. } = build(Dwc2Config::high_speed());
        dev.init();
        assert!(regs.gusbcfg.is_set(GUSBCFG::PHYSEL));
        assert_eq!(regs.dcfg.read(DCFG::DSPD), 3);
    }

    #[test]
    fn init_generic_core_only_overrides() {
        let Fixture { dev, regs, .. } = build(Dwc2Config {
            revision: CoreRevision::Generic,
            ..Dwc2Config::full_speed()
        });
        dev.init();
        assert_eq!(regs.gccfg.get(), 0);
        assert!(regs.gotgctl.is_set(GOTGCTL::BVALOVAL));
    }

    #[test]
    fn init_leaves_device_detached_state_alone() {
        let Fixture { dev, regs, .. } = build(Dwc2Config::full_speed());
        regs.dctl.modify(DCTL::SDIS::SET);
        dev.init();
        assert!(regs.dctl.is_set(DCTL::SDIS));
    }

    #[test]
    fn stuck_wait_honours_spin_limit() {
        let Fixture {
            dev, regs, platform, ..
        } = build(Dwc2Config {
            spin_limit: Some(8),
            ..Dwc2Config::full_speed()
        });
        platform.set_responsive(false);
        regs.grstctl.modify(GRSTCTL::RXFFLSH::SET);
        assert!(!dev.wait_until("test", |r| !r.grstctl.is_set(GRSTCTL::RXFFLSH)));
        assert_eq!(platform.spins(), 8);
    }

    #[test]
    fn platform_can_abandon_wait() {
        let Fixture {
            dev, regs, platform, ..
        } = build(Dwc2Config::full_speed());
        platform.set_responsive(false);
        platform.give_up_after(3);
        regs.grstctl.modify(GRSTCTL::TXFFLSH::SET);
        assert!(!dev.wait_until("test", |r| !r.grstctl.is_set(GRSTCTL::TXFFLSH)));
        assert_eq!(platform.spins(), 4);
    }

    #[test]
    #[should_panic]
    fn too_many_endpoints_configured() {
        build(Dwc2Config {
            endpoints: 7,
            ..Dwc2Config::high_speed()
        });
    }
}
