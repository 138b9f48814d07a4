// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! The set of DWC2 instances on a chip.
//!
//! Parts such as the STM32F4 carry both an OTG_FS and an OTG_HS core. A chip
//! crate builds one `UsbPeripherals` holding every instance and routes each
//! instance's interrupt line to [`UsbPeripherals::service_interrupt`] with
//! the instance index.

use crate::device::Dwc2;
use crate::platform::Platform;

pub struct UsbPeripherals<'a, P: Platform, const N: usize, const I: usize> {
    instances: [Dwc2<'a, P, N>; I],
}

impl<'a, P: Platform, const N: usize, const I: usize> UsbPeripherals<'a, P, N, I> {
    pub fn new(instances: [Dwc2<'a, P, N>; I]) -> Self {
        UsbPeripherals { instances }
    }

    /// Instance `index`, if the chip has that many.
    pub fn get(&self, index: usize) -> Option<&Dwc2<'a, P, N>> {
        self.instances.get(index)
    }

    pub fn len(&self) -> usize {
        I
    }

    pub fn is_empty(&self) -> bool {
        I == 0
    }

    /// Run the interrupt handler of instance `index`. Returns `false` if
    /// there is no such instance.
    pub fn service_interrupt(&self, index: usize) -> bool {
        match self.instances.get(index) {
            Some(instance) => {
                instance.handle_interrupt();
                true
            }
            None => false,
        }
    }
}
