// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interface between the DWC2 driver and the USB device stack above it.
//!
//! The stack drives the controller through [`UsbDevice`] and receives
//! events through [`Client`]. All events are delivered from interrupt
//! context: a `ServiceRequest` asks the stack to call back into
//! [`UsbDevice::service`] or [`UsbDevice::service_endpoint`], which then
//! produce the semantic events.

use crate::errorcode::ErrorCode;

/// Endpoint transfer types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferType {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

/// Direction of an endpoint, seen from the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

/// Handle to a claimed endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EndpointId {
    pub number: u8,
    pub direction: Direction,
}

impl EndpointId {
    pub const fn new(number: u8, direction: Direction) -> EndpointId {
        EndpointId { number, direction }
    }

    pub fn index(&self) -> usize {
        self.number as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UsbVersion {
    Usb11,
    Usb20,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Speed {
    Low,
    Full,
    High,
}

/// Device wide options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceOption {
    /// Highest USB version the controller implements (get).
    MaxVersion,
    /// Highest speed the controller is configured for (get).
    MaxSpeed,
    /// Device address assigned by the host (set).
    Address,
    /// Soft connect to the bus (set).
    Attach,
    /// Whether VBUS is present.
    Powered,
    /// Remote wakeup signalling.
    RemoteWakeup,
}

/// Per endpoint options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointOption {
    /// Bytes received so far in the armed OUT transfer (get).
    Available,
    /// Activate or deactivate the endpoint (set).
    Enable,
    /// Set or clear the halt condition (set).
    Stall,
}

/// Value passed to or returned from an option.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionValue {
    Version(UsbVersion),
    Speed(Speed),
    Address(u8),
    Enable(bool),
    Size(usize),
}

/// Events at the device level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceEvent {
    /// Enumeration finished after a bus reset; endpoint 0 must be set up.
    Reset,
    Suspend,
    Resume,
    /// A global interrupt is pending; call [`UsbDevice::service`].
    ServiceRequest,
}

/// Events for a single endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointEvent {
    TransferComplete,
    /// An endpoint interrupt is pending; call [`UsbDevice::service_endpoint`].
    ServiceRequest,
}

pub trait Client {
    /// Called for device wide events.
    fn device_event(&self, event: DeviceEvent);

    /// Called for events on one endpoint.
    fn endpoint_event(&self, endpoint: EndpointId, event: EndpointEvent);
}

pub trait UsbDevice<'a> {
    fn set_client(&self, client: &'a dyn Client);

    /// Bring the controller up in device mode, with endpoint 0 ready and
    /// interrupts enabled. The device stays detached until
    /// `DeviceOption::Attach` is set.
    fn init(&self);

    /// Reserve an endpoint of the given type and direction.
    ///
    /// Control requests always return endpoint 0. Returns `None` when every
    /// endpoint in that direction is already taken.
    fn claim_endpoint(
        &self,
        transfer_type: TransferType,
        direction: Direction,
        max_packet_size: usize,
    ) -> Option<EndpointId>;

    fn get_option(&self, option: DeviceOption) -> Result<OptionValue, ErrorCode>;

    fn set_option(&self, option: DeviceOption, value: OptionValue) -> Result<(), ErrorCode>;

    /// Stall endpoint 0 in both directions until the next SETUP packet.
    fn stall_control_endpoint(&self);

    /// Handle one pending global interrupt condition.
    fn service(&self);

    fn endpoint_get_option(
        &self,
        endpoint: EndpointId,
        option: EndpointOption,
    ) -> Result<OptionValue, ErrorCode>;

    fn endpoint_set_option(
        &self,
        endpoint: EndpointId,
        option: EndpointOption,
        value: OptionValue,
    ) -> Result<(), ErrorCode>;

    /// Start a transfer on `endpoint`.
    ///
    /// For IN endpoints the first `len` bytes of `buf` are sent; for OUT
    /// endpoints `buf` receives up to one packet. Completion is signalled
    /// with `EndpointEvent::TransferComplete`, after which the buffer can be
    /// retrieved with `take_buffer`. Fails with `OFF`, returning the buffer,
    /// if the endpoint is not enabled.
    fn transmit(
        &self,
        endpoint: EndpointId,
        buf: &'a mut [u8],
        len: usize,
    ) -> Result<(), (ErrorCode, &'a mut [u8])>;

    /// Return the buffer of the last transfer on `endpoint`.
    fn take_buffer(&self, endpoint: EndpointId) -> Option<&'a mut [u8]>;

    /// Handle pending interrupts of one endpoint.
    fn service_endpoint(&self, endpoint: EndpointId);
}
