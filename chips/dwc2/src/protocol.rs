// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Bus state handling and device options.
//!
//! The device is either active or suspended. A bus suspend stops the PHY
//! clock and hands control to the platform's low-power hook; a wakeup or a
//! bus reset restarts the clock and flushes whatever the FIFOs held when it
//! was stopped. Only one global condition is handled per call to
//! [`Dwc2::service`], in the order
//!
//! ```text
//! ENUMDNE > USBRST > SRQINT > USBSUSP > WKUPINT
//! ```
//!
//! so a reset seen together with a suspend always wins.

use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};
use tock_registers::LocalRegisterCopy;

use crate::device::Dwc2;
use crate::errorcode::ErrorCode;
use crate::hil::{
    DeviceEvent, DeviceOption, Direction, EndpointEvent, EndpointId, EndpointOption, OptionValue,
    Speed, UsbVersion,
};
use crate::platform::Platform;
use crate::registers::{DCFG, DCTL, DIEPINT, DOEPINT, GINT, GRXSTS, PCGCCTL};

impl<'a, P: Platform, const N: usize> Dwc2<'a, P, N> {
    /// Handle the highest priority pending global interrupt condition.
    pub fn service(&self) {
        let _guard = self.interrupt_guard();
        let regs = self.registers();
        let status = regs.gintsts.extract();

        if status.is_set(GINT::ENUMDNE) {
            regs.gintsts.write(GINT::ENUMDNE::SET);
            log::debug!(target: "dwc2", "bus reset done");
            self.device_event(DeviceEvent::Reset);
        } else if status.is_set(GINT::USBRST) {
            regs.gintsts.write(GINT::USBRST::SET);
            self.bus_reset();
        } else if status.is_set(GINT::SRQINT) {
            regs.gintsts.write(GINT::SRQINT::SET);
            log::debug!(target: "dwc2", "session request");
        } else if status.is_set(GINT::USBSUSP) {
            regs.gintsts.write(GINT::USBSUSP::SET);
            if !self.suspended.get() {
                self.device_event(DeviceEvent::Suspend);
                self.suspended.set(true);
                self.sleep();
            }
        } else if status.is_set(GINT::WKUPINT) {
            regs.gintsts.write(GINT::WKUPINT::SET);
            if self.suspended.get() {
                self.suspended.set(false);
                self.wake();
                self.device_event(DeviceEvent::Resume);
            }
        }
    }

    /// Start of a bus reset: drop everything in flight and go back to the
    /// default address.
    fn bus_reset(&self) {
        log::debug!(target: "dwc2", "bus reset");
        if self.suspended.get() {
            self.suspended.set(false);
            self.wake();
        }
        self.flush_all_fifos();
        self.reset_endpoints();
        self.set_address(0);
    }

    fn sleep(&self) {
        log::debug!(target: "dwc2", "suspend");
        self.registers().pcgcctl.modify(PCGCCTL::STOPCLK::SET);
        self.platform().enter_suspend();
    }

    fn wake(&self) {
        log::debug!(target: "dwc2", "resume");
        self.platform().exit_suspend();
        self.registers().pcgcctl.modify(PCGCCTL::STOPCLK::CLEAR);
        self.flush_all_fifos();
    }

    /// Handle the pending interrupts of one endpoint.
    pub fn service_endpoint(&self, endpoint: EndpointId) {
        let _guard = self.interrupt_guard();
        if endpoint.index() >= self.endpoint_count() {
            return;
        }
        match endpoint.direction {
            Direction::In => self.service_in(endpoint),
            Direction::Out => self.service_out(endpoint),
        }
    }

    fn service_in(&self, endpoint: EndpointId) {
        let num = endpoint.index();
        let regs = self.in_regs(num);
        let status = regs.diepint.extract();

        if self.uses_dma() && status.is_set(DIEPINT::XFRC) {
            regs.diepint.write(DIEPINT::XFRC::SET);
            // Endpoint 0 completion is reported through the OUT side of the
            // control transfer.
            if num != 0 {
                self.endpoint_event(endpoint, EndpointEvent::TransferComplete);
            }
        } else if status.is_set(DIEPINT::TXFE) {
            // TXFE stays set while the FIFO is empty; only an unmasked
            // endpoint has a transfer to complete.
            let device = self.registers();
            let empty_mask = device.diepempmsk.get();
            if empty_mask & (1 << num) != 0 {
                device.diepempmsk.set(empty_mask & !(1 << num));
                self.endpoint_event(endpoint, EndpointEvent::TransferComplete);
            }
        }
    }

    fn service_out(&self, endpoint: EndpointId) {
        let num = endpoint.index();
        let regs = self.registers();
        let queued = LocalRegisterCopy::<u32, GRXSTS::Register>::new(regs.grxstsr.get());

        if !self.uses_dma()
            && regs.gintsts.is_set(GINT::RXFLVL)
            && queued.read(GRXSTS::EPNUM) as usize == num
        {
            self.read_packet(num);
        } else if self.out_regs(num).doepint.is_set(DOEPINT::XFRC) {
            self.out_regs(num).doepint.write(DOEPINT::XFRC::SET);
            // Without DMA the completion was already signalled from the
            // receive status.
            if self.uses_dma() {
                self.endpoint_event(endpoint, EndpointEvent::TransferComplete);
            }
        }
    }

    pub fn set_address(&self, address: u8) {
        self.registers().dcfg.modify(DCFG::DAD.val(address as u32));
    }

    /// Connect to the bus by releasing the soft disconnect, or disconnect.
    pub fn attach(&self, attach: bool) {
        if attach {
            log::debug!(target: "dwc2", "attaching to host");
            self.registers().dctl.modify(DCTL::SDIS::CLEAR);
        } else {
            log::debug!(target: "dwc2", "detaching from host");
            self.registers().dctl.modify(DCTL::SDIS::SET);
        }
    }

    pub fn get_option(&self, option: DeviceOption) -> Result<OptionValue, ErrorCode> {
        match option {
            DeviceOption::MaxVersion => Ok(OptionValue::Version(UsbVersion::Usb20)),
            DeviceOption::MaxSpeed => Ok(OptionValue::Speed(Speed::Full)),
            _ => {
                log::debug!(target: "dwc2", "unhandled get of {:?}", option);
                Err(ErrorCode::NOSUPPORT)
            }
        }
    }

    pub fn set_option(&self, option: DeviceOption, value: OptionValue) -> Result<(), ErrorCode> {
        match option {
            DeviceOption::Address => match value {
                OptionValue::Address(address) => {
                    self.set_address(address);
                    Ok(())
                }
                _ => panic!("dwc2: {:?} is not an address", value),
            },
            DeviceOption::Attach => match value {
                OptionValue::Enable(attach) => {
                    self.attach(attach);
                    Ok(())
                }
                _ => panic!("dwc2: {:?} is not an attach flag", value),
            },
            _ => {
                log::debug!(target: "dwc2", "unhandled set of {:?}", option);
                Err(ErrorCode::NOSUPPORT)
            }
        }
    }

    pub fn endpoint_get_option(
        &self,
        endpoint: EndpointId,
        option: EndpointOption,
    ) -> Result<OptionValue, ErrorCode> {
        match (option, endpoint.direction) {
            (EndpointOption::Available, Direction::Out) => {
                Ok(OptionValue::Size(self.available(endpoint.index())))
            }
            _ => Err(ErrorCode::NOSUPPORT),
        }
    }

    pub fn endpoint_set_option(
        &self,
        endpoint: EndpointId,
        option: EndpointOption,
        value: OptionValue,
    ) -> Result<(), ErrorCode> {
        let enable = match (option, value) {
            (EndpointOption::Enable, OptionValue::Enable(enable))
            | (EndpointOption::Stall, OptionValue::Enable(enable)) => enable,
            (EndpointOption::Enable, _) | (EndpointOption::Stall, _) => {
                panic!("dwc2: {:?} takes a flag, got {:?}", option, value)
            }
            _ => return Err(ErrorCode::NOSUPPORT),
        };
        if option == EndpointOption::Enable {
            self.set_enabled(endpoint, enable);
        } else {
            self.set_stall(endpoint, enable);
        }
        Ok(())
    }
}
