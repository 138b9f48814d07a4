// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Host side stand-ins for the hardware and the USB stack.
//!
//! The register block lives in ordinary zeroed memory. Bits the core would
//! clear on its own (reset and flush requests, global NAK requests,
//! `EPDIS`) are acknowledged by [`FakePlatform::spin`], so every busy-wait in
//! the driver completes after one poll unless the platform is told to stop
//! responding.

use std::alloc::{alloc_zeroed, Layout};
use std::boxed::Box;
use std::cell::{Cell, RefCell};
use std::vec::Vec;

use tock_registers::interfaces::{ReadWriteable, Readable};

use crate::config::{Dwc2Config, Phy};
use crate::device::Dwc2;
use crate::hil::{Client, DeviceEvent, EndpointEvent, EndpointId};
use crate::platform::Platform;
use crate::registers::{Dwc2Registers, DCTL, DIEPCTL, DOEPCTL, GRSTCTL, GRXSTS};
use crate::static_ref::StaticRef;

/// A zeroed register block that lives for the rest of the test run.
pub fn zeroed_registers() -> &'static Dwc2Registers {
    let layout = Layout::new::<Dwc2Registers>();
    unsafe {
        let ptr = alloc_zeroed(layout) as *const Dwc2Registers;
        assert!(!ptr.is_null());
        &*ptr
    }
}

/// Build a receive status word as the core would queue it.
pub fn pktsts(endpoint: u32, status: u32, bytes: u32) -> u32 {
    (GRXSTS::EPNUM.val(endpoint) + GRXSTS::PKTSTS.val(status) + GRXSTS::BCNT.val(bytes)).value
}

/// Side effects the driver had on the platform or the core.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Hw {
    ClockEnabled,
    PinsConfigured,
    PhyPowered(Phy),
    InterruptEnabled,
    Delay(u32),
    SuspendEntered,
    SuspendExited,
    CoreReset,
    RxFlush,
    TxFlush(u32),
    GlobalInNak(bool),
    GlobalOutNak(bool),
    InDisabled(usize),
    OutDisabled(usize),
}

pub struct FakePlatform {
    regs: &'static Dwc2Registers,
    log: RefCell<Vec<Hw>>,
    spins: Cell<usize>,
    responsive: Cell<bool>,
    give_up: Cell<Option<usize>>,
}

impl FakePlatform {
    pub fn new(regs: &'static Dwc2Registers) -> FakePlatform {
        FakePlatform {
            regs,
            log: RefCell::new(Vec::new()),
            spins: Cell::new(0),
            responsive: Cell::new(true),
            give_up: Cell::new(None),
        }
    }

    pub fn log(&self) -> Vec<Hw> {
        self.log.borrow().clone()
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }

    /// Stop acknowledging requests, leaving waits to run into their limit.
    pub fn set_responsive(&self, responsive: bool) {
        self.responsive.set(responsive);
    }

    /// Abandon every wait at its `n`th poll.
    pub fn give_up_after(&self, n: usize) {
        self.give_up.set(Some(n));
    }

    /// Total polls seen so far.
    pub fn spins(&self) -> usize {
        self.spins.get()
    }

    fn record(&self, hw: Hw) {
        self.log.borrow_mut().push(hw);
    }

    /// Complete whatever the core has been asked to do.
    fn emulate(&self) {
        let r = self.regs;

        if !r.grstctl.is_set(GRSTCTL::AHBIDL) {
            r.grstctl.modify(GRSTCTL::AHBIDL::SET);
        }
        if r.grstctl.is_set(GRSTCTL::CSRST) {
            r.grstctl.modify(GRSTCTL::CSRST::CLEAR);
            self.record(Hw::CoreReset);
        }
        if r.grstctl.is_set(GRSTCTL::RXFFLSH) {
            r.grstctl.modify(GRSTCTL::RXFFLSH::CLEAR);
            self.record(Hw::RxFlush);
        }
        if r.grstctl.is_set(GRSTCTL::TXFFLSH) {
            self.record(Hw::TxFlush(r.grstctl.read(GRSTCTL::TXFNUM)));
            r.grstctl.modify(GRSTCTL::TXFFLSH::CLEAR);
        }

        if r.dctl.is_set(DCTL::SGINAK) {
            r.dctl.modify(DCTL::SGINAK::CLEAR + DCTL::GINSTS::SET);
            self.record(Hw::GlobalInNak(true));
        }
        if r.dctl.is_set(DCTL::CGINAK) {
            r.dctl.modify(DCTL::CGINAK::CLEAR + DCTL::GINSTS::CLEAR);
            self.record(Hw::GlobalInNak(false));
        }
        if r.dctl.is_set(DCTL::SGONAK) {
            r.dctl.modify(DCTL::SGONAK::CLEAR + DCTL::GONSTS::SET);
            self.record(Hw::GlobalOutNak(true));
        }
        if r.dctl.is_set(DCTL::CGONAK) {
            r.dctl.modify(DCTL::CGONAK::CLEAR + DCTL::GONSTS::CLEAR);
            self.record(Hw::GlobalOutNak(false));
        }

        for (i, ep) in r.in_endpoints.iter().enumerate() {
            if ep.diepctl.is_set(DIEPCTL::EPDIS) {
                ep.diepctl
                    .modify(DIEPCTL::EPDIS::CLEAR + DIEPCTL::EPENA::CLEAR);
                self.record(Hw::InDisabled(i));
            }
        }
        for (i, ep) in r.out_endpoints.iter().enumerate() {
            if ep.doepctl.is_set(DOEPCTL::EPDIS) {
                ep.doepctl
                    .modify(DOEPCTL::EPDIS::CLEAR + DOEPCTL::EPENA::CLEAR);
                self.record(Hw::OutDisabled(i));
            }
        }
    }
}

impl Platform for FakePlatform {
    fn enable_clock(&self) {
        self.record(Hw::ClockEnabled);
    }

    fn configure_pins(&self) {
        self.record(Hw::PinsConfigured);
    }

    fn power_phy(&self, phy: Phy) {
        self.record(Hw::PhyPowered(phy));
    }

    fn enable_interrupt(&self) {
        self.record(Hw::InterruptEnabled);
    }

    fn delay_ms(&self, ms: u32) {
        self.record(Hw::Delay(ms));
    }

    fn enter_suspend(&self) {
        self.record(Hw::SuspendEntered);
    }

    fn exit_suspend(&self) {
        self.record(Hw::SuspendExited);
    }

    fn spin(&self, iteration: usize) -> bool {
        self.spins.set(self.spins.get() + 1);
        if self.give_up.get().is_some_and(|n| iteration >= n) {
            return false;
        }
        if self.responsive.get() {
            self.emulate();
        }
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Event {
    Device(DeviceEvent),
    Endpoint(EndpointId, EndpointEvent),
}

#[derive(Default)]
pub struct RecordingClient {
    events: RefCell<Vec<Event>>,
}

impl RecordingClient {
    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    /// Events recorded so far, leaving the record empty.
    pub fn take_events(&self) -> Vec<Event> {
        self.events.take()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl Client for RecordingClient {
    fn device_event(&self, event: DeviceEvent) {
        self.events.borrow_mut().push(Event::Device(event));
    }

    fn endpoint_event(&self, endpoint: EndpointId, event: EndpointEvent) {
        self.events
            .borrow_mut()
            .push(Event::Endpoint(endpoint, event));
    }
}

pub type TestDwc2 = Dwc2<'static, FakePlatform, 6>;

pub struct Fixture {
    pub dev: &'static TestDwc2,
    pub regs: &'static Dwc2Registers,
    pub platform: &'static FakePlatform,
    pub client: &'static RecordingClient,
}

/// A device on fresh registers, not yet initialized.
pub fn build(config: Dwc2Config) -> Fixture {
    let regs = zeroed_registers();
    let config: &'static Dwc2Config = Box::leak(Box::new(config));
    let platform: &'static FakePlatform = Box::leak(Box::new(FakePlatform::new(regs)));
    let client: &'static RecordingClient = Box::leak(Box::new(RecordingClient::default()));
    let base = unsafe { StaticRef::new(regs as *const Dwc2Registers) };
    let dev: &'static TestDwc2 = Box::leak(Box::new(Dwc2::new(base, config, platform)));
    dev.set_client(client);
    Fixture {
        dev,
        regs,
        platform,
        client,
    }
}

/// A device that has gone through `init`, with the records cleared.
pub fn active(config: Dwc2Config) -> Fixture {
    let fixture = build(config);
    fixture.dev.init();
    fixture.platform.clear_log();
    fixture.client.clear();
    fixture
}
