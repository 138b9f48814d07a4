// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Arming transfers and moving packet data through the FIFOs.
//!
//! Without DMA every IN packet is written into the endpoint's FIFO window
//! right after the endpoint is enabled, and OUT packets are popped from the
//! receive FIFO when the core reports them. With DMA the core is given the
//! buffer address instead and moves the data itself.

use tock_cells::take_cell::TakeCell;
use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};
use tock_registers::LocalRegisterCopy;

use crate::device::Dwc2;
use crate::endpoint::out_type;
use crate::errorcode::ErrorCode;
use crate::hil::{Direction, EndpointEvent, EndpointId};
use crate::platform::Platform;
use crate::registers::{DIEPCTL, DIEPTSIZ, DOEPCTL, DOEPTSIZ, GRXSTS};

fn dma_address(buf: &[u8]) -> u32 {
    buf.as_ptr() as usize as u32
}

impl<'a, P: Platform, const N: usize> Dwc2<'a, P, N> {
    /// Start a transfer of `len` bytes of `buf` on an IN endpoint, or arm an
    /// OUT endpoint to receive one packet into `buf`.
    ///
    /// Returns `OFF` along with the buffer if the endpoint is not enabled;
    /// nothing is written to the core in that case.
    pub fn transmit(
        &self,
        endpoint: EndpointId,
        buf: &'a mut [u8],
        len: usize,
    ) -> Result<(), (ErrorCode, &'a mut [u8])> {
        assert!(len <= buf.len(), "dwc2: transfer longer than its buffer");
        if self.uses_dma() {
            let alignment = self.config().dma_alignment;
            assert!(
                buf.as_ptr() as usize % alignment == 0,
                "dwc2: DMA buffer not {} byte aligned",
                alignment
            );
        }

        match endpoint.direction {
            Direction::In => self.transmit_in(endpoint.index(), buf, len),
            Direction::Out => self.arm_out(endpoint.index(), buf),
        }
    }

    fn transmit_in(
        &self,
        num: usize,
        buf: &'a mut [u8],
        len: usize,
    ) -> Result<(), (ErrorCode, &'a mut [u8])> {
        let regs = self.in_regs(num);
        if !regs.diepctl.is_set(DIEPCTL::USBAEP) {
            return Err((ErrorCode::OFF, buf));
        }
        let dma = self.uses_dma();

        if dma {
            regs.diepdma.set(dma_address(buf));
        }

        // The packet count does not work together with the FIFO empty
        // interrupt on data endpoints, so it is only programmed for EP0 and
        // with DMA.
        let size = DIEPTSIZ::XFRSIZ.val(len as u32);
        if num == 0 || dma {
            regs.dieptsiz.write(size + DIEPTSIZ::PKTCNT.val(1));
        } else {
            regs.dieptsiz.write(size);
        }

        // Unmask before the FIFO is filled, otherwise the empty interrupt
        // can be missed.
        let device = self.registers();
        device.daintmsk.set(device.daintmsk.get() | (1 << num));
        device.diepempmsk.set(device.diepempmsk.get() | (1 << num));

        regs.diepctl
            .modify(DIEPCTL::CNAK::SET + DIEPCTL::EPENA::SET);

        if len > 0 && !dma {
            self.write_fifo(num, &buf[..len]);
        }
        transfer_trace!("EP{}-In armed with {} bytes", num, len);
        self.hold_buffer(&self.in_endpoints[num].buffer, buf, num, Direction::In);
        Ok(())
    }

    fn arm_out(&self, num: usize, buf: &'a mut [u8]) -> Result<(), (ErrorCode, &'a mut [u8])> {
        let regs = self.out_regs(num);
        if !regs.doepctl.is_set(DOEPCTL::USBAEP) {
            return Err((ErrorCode::OFF, buf));
        }
        let state = &self.out_endpoints[num].state;
        let max_packet_size = state.max_packet_size();

        if self.uses_dma() {
            assert!(
                buf.len() >= max_packet_size,
                "dwc2: DMA buffer smaller than a packet"
            );
            regs.doepdma.set(dma_address(buf));
        }

        let size = DOEPTSIZ::PKTCNT.val(1) + DOEPTSIZ::XFRSIZ.val(max_packet_size as u32);
        if num == 0 {
            regs.doeptsiz.write(size + DOEPTSIZ::STUPCNT.val(1));
        } else {
            regs.doeptsiz.write(size);
        }

        regs.doepctl.modify(
            DOEPCTL::CNAK::SET + DOEPCTL::EPENA::SET + out_type(state.claimed_type()),
        );
        transfer_trace!("EP{}-Out armed for {} bytes", num, max_packet_size);
        self.hold_buffer(&self.out_endpoints[num].buffer, buf, num, Direction::Out);
        Ok(())
    }

    /// Keep `buf` until `take_buffer`. A buffer the stack never collected
    /// is dropped from the endpoint and reported.
    fn hold_buffer(
        &self,
        cell: &TakeCell<'a, [u8]>,
        buf: &'a mut [u8],
        num: usize,
        direction: Direction,
    ) {
        if let Some(old) = cell.replace(buf) {
            log::warn!(
                target: "dwc2",
                "EP{}-{:?} buffer of {} bytes replaced before it was taken",
                num,
                direction,
                old.len()
            );
        }
    }

    /// Buffer of the last transfer on `endpoint`, once the stack is done
    /// with it.
    pub fn take_buffer(&self, endpoint: EndpointId) -> Option<&'a mut [u8]> {
        match endpoint.direction {
            Direction::In => self.in_endpoints[endpoint.index()].buffer.take(),
            Direction::Out => self.out_endpoints[endpoint.index()].buffer.take(),
        }
    }

    /// Bytes received so far by the armed transfer on OUT endpoint `num`.
    pub fn available(&self, num: usize) -> usize {
        let remaining = self.out_regs(num).doeptsiz.read(DOEPTSIZ::XFRSIZ) as usize;
        self.out_endpoints[num]
            .state
            .max_packet_size()
            .saturating_sub(remaining)
    }

    /// Push `data` into the transmit FIFO of endpoint `num`, one word at a
    /// time. A trailing partial word is padded with zeros.
    fn write_fifo(&self, num: usize, data: &[u8]) {
        let window = &self.registers().fifo[num];
        for (word, chunk) in window.word.iter().zip(data.chunks(4)) {
            let mut bytes = [0u8; 4];
            bytes[..chunk.len()].copy_from_slice(chunk);
            word.set(u32::from_le_bytes(bytes));
        }
    }

    /// Pop a `len` byte packet from the receive FIFO into `buf`. Whole words
    /// are always popped; bytes that do not fit in `buf` are dropped.
    fn read_fifo(&self, buf: Option<&mut [u8]>, len: usize) {
        let window = &self.registers().fifo[0];
        let mut buf = buf;
        for (i, word) in window.word.iter().take(len.div_ceil(4)).enumerate() {
            let bytes = word.get().to_le_bytes();
            if let Some(dest) = buf.as_deref_mut() {
                let start = i * 4;
                let end = usize::min(start + 4, len).min(dest.len());
                if start < end {
                    dest[start..end].copy_from_slice(&bytes[..end - start]);
                }
            }
        }
    }

    /// Handle the entry at the head of the receive status queue, which
    /// belongs to OUT endpoint `num`.
    pub(crate) fn read_packet(&self, num: usize) {
        let regs = self.registers();
        let status = LocalRegisterCopy::<u32, GRXSTS::Register>::new(regs.grxstsp.get());
        let len = status.read(GRXSTS::BCNT) as usize;
        let endpoint = EndpointId::new(num as u8, Direction::Out);

        match status.read_as_enum(GRXSTS::PKTSTS) {
            Some(GRXSTS::PKTSTS::Value::OutDataUpdate)
            | Some(GRXSTS::PKTSTS::Value::SetupDataUpdate) => {
                if self.config().rx_settle_delay_ms > 0 {
                    self.platform().delay_ms(self.config().rx_settle_delay_ms);
                }
                let ep = &self.out_endpoints[num];
                if ep.buffer.map(|buf| self.read_fifo(Some(buf), len)).is_none() {
                    self.read_fifo(None, len);
                }
                transfer_trace!("EP{}-Out received {} bytes", num, len);

                if num == 0 && len > 0 && self.config().revision.completes_setup_on_data() {
                    self.endpoint_event(endpoint, EndpointEvent::TransferComplete);
                }
            }
            Some(GRXSTS::PKTSTS::Value::OutTransferComplete)
            | Some(GRXSTS::PKTSTS::Value::SetupComplete) => {
                self.endpoint_event(endpoint, EndpointEvent::TransferComplete);
            }
            _ => {}
        }
    }
}
