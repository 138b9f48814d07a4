// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Partitioning of the shared FIFO memory.
//!
//! The core has a single word addressed RAM that holds the receive FIFO and
//! one transmit FIFO per IN endpoint. The layout is
//!
//! ```text
//! | RX (rx_fifo_words) | EP0 IN (16) | EP1 IN | EP2 IN | ... free ... |
//! ```
//!
//! Banks are handed out in the order endpoints are claimed and are never
//! given back.

use core::cell::Cell;

use tock_registers::interfaces::{ReadWriteable, Writeable};

use crate::config::FIFO_MIN_WORDS;
use crate::registers::{Dwc2Registers, DIEPTXF, GRXFSIZ};

/// Words a transmit bank for packets of `bytes` bytes occupies.
pub fn bank_words(bytes: usize) -> usize {
    if bytes < FIFO_MIN_WORDS * 4 {
        FIFO_MIN_WORDS
    } else {
        bytes.div_ceil(4)
    }
}

pub struct FifoAllocator {
    /// First free word.
    cursor: Cell<usize>,
}

impl FifoAllocator {
    pub const fn new() -> FifoAllocator {
        FifoAllocator {
            cursor: Cell::new(0),
        }
    }

    /// Program the receive FIFO and the endpoint 0 transmit bank, and start
    /// allocating behind them.
    pub fn configure(&self, registers: &Dwc2Registers, rx_words: usize) {
        registers
            .grxfsiz
            .modify(GRXFSIZ::RXFD.val(rx_words as u32));
        registers.dieptxf0.write(
            DIEPTXF::DEPTH.val(FIFO_MIN_WORDS as u32) + DIEPTXF::START.val(rx_words as u32),
        );
        self.cursor.set(rx_words + FIFO_MIN_WORDS);
    }

    /// Reserve a transmit bank for IN endpoint `num` (which must not be 0)
    /// holding packets of up to `bytes` bytes.
    ///
    /// Panics if the bank does not fit in the remaining `total_words`.
    pub fn allocate_tx(
        &self,
        registers: &Dwc2Registers,
        num: usize,
        bytes: usize,
        total_words: usize,
    ) -> usize {
        assert!(num > 0, "endpoint 0 uses the fixed transmit bank");
        let words = bank_words(bytes);
        let start = self.cursor.get();
        assert!(
            start + words <= total_words,
            "dwc2: TX FIFO for EP{} needs {} words, {} of {} left",
            num,
            words,
            total_words.saturating_sub(start),
            total_words
        );
        registers.dieptxf[num - 1]
            .write(DIEPTXF::DEPTH.val(words as u32) + DIEPTXF::START.val(start as u32));
        self.cursor.set(start + words);
        start
    }

    /// Words allocated so far, receive FIFO included.
    pub fn words_used(&self) -> usize {
        self.cursor.get()
    }
}
