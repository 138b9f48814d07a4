// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Register map of the DWC2 OTG core in device mode.
//!
//! Host-mode registers (0x400-0x7FF) are not described; the driver never
//! switches the core out of device mode. Every endpoint block, including
//! endpoint 0, uses the same 0x20 byte layout, and every packet FIFO gets a
//! 4 KiB window starting at 0x1000.

use tock_registers::registers::ReadWrite;
use tock_registers::{register_bitfields, register_structs};

/// Highest number of endpoints per direction any DWC2 core implements.
pub const MAX_ENDPOINTS: usize = 16;

/// Number of 32 bit words addressable in one FIFO window.
pub const FIFO_WINDOW_WORDS: usize = 1024;

/// Bit offset of the OUT endpoints in `DAINT` and `DAINTMSK`.
pub const DAINT_OUT_OFFSET: usize = 16;

/// `GRSTCTL.TXFNUM` value that selects every transmit FIFO.
pub const TXFNUM_ALL: u32 = 0x10;

register_structs! {
    pub Dwc2Registers {
        // Core global registers
        (0x000 => pub gotgctl: ReadWrite<u32, GOTGCTL::Register>),
        (0x004 => pub gotgint: ReadWrite<u32>),
        (0x008 => pub gahbcfg: ReadWrite<u32, GAHBCFG::Register>),
        (0x00C => pub gusbcfg: ReadWrite<u32, GUSBCFG::Register>),
        (0x010 => pub grstctl: ReadWrite<u32, GRSTCTL::Register>),
        (0x014 => pub gintsts: ReadWrite<u32, GINT::Register>),
        (0x018 => pub gintmsk: ReadWrite<u32, GINT::Register>),
        (0x01C => pub grxstsr: ReadWrite<u32, GRXSTS::Register>),
        (0x020 => pub grxstsp: ReadWrite<u32, GRXSTS::Register>),
        (0x024 => pub grxfsiz: ReadWrite<u32, GRXFSIZ::Register>),
        (0x028 => pub dieptxf0: ReadWrite<u32, DIEPTXF::Register>),
        (0x02C => pub hnptxsts: ReadWrite<u32>),
        (0x030 => _reserved0),
        (0x038 => pub gccfg: ReadWrite<u32, GCCFG::Register>),
        (0x03C => pub cid: ReadWrite<u32>),
        (0x040 => _reserved1),
        (0x100 => pub hptxfsiz: ReadWrite<u32>),
        (0x104 => pub dieptxf: [ReadWrite<u32, DIEPTXF::Register>; 15]),
        (0x140 => _reserved2),
        // Device mode registers
        (0x800 => pub dcfg: ReadWrite<u32, DCFG::Register>),
        (0x804 => pub dctl: ReadWrite<u32, DCTL::Register>),
        (0x808 => pub dsts: ReadWrite<u32, DSTS::Register>),
        (0x80C => _reserved3),
        (0x810 => pub diepmsk: ReadWrite<u32, DIEPMSK::Register>),
        (0x814 => pub doepmsk: ReadWrite<u32, DOEPMSK::Register>),
        (0x818 => pub daint: ReadWrite<u32, DAINT::Register>),
        (0x81C => pub daintmsk: ReadWrite<u32, DAINT::Register>),
        (0x820 => _reserved4),
        (0x828 => pub dvbusdis: ReadWrite<u32>),
        (0x82C => pub dvbuspulse: ReadWrite<u32>),
        (0x830 => _reserved5),
        (0x834 => pub diepempmsk: ReadWrite<u32>),
        (0x838 => _reserved6),
        (0x900 => pub in_endpoints: [InEndpointRegisters; 16]),
        (0xB00 => pub out_endpoints: [OutEndpointRegisters; 16]),
        (0xD00 => _reserved7),
        // Power and clock gating
        (0xE00 => pub pcgcctl: ReadWrite<u32, PCGCCTL::Register>),
        (0xE04 => _reserved8),
        (0x1000 => pub fifo: [FifoWindow; 16]),
        (0x11000 => @END),
    },

    pub InEndpointRegisters {
        (0x00 => pub diepctl: ReadWrite<u32, DIEPCTL::Register>),
        (0x04 => _reserved0),
        (0x08 => pub diepint: ReadWrite<u32, DIEPINT::Register>),
        (0x0C => _reserved1),
        (0x10 => pub dieptsiz: ReadWrite<u32, DIEPTSIZ::Register>),
        (0x14 => pub diepdma: ReadWrite<u32>),
        (0x18 => pub dtxfsts: ReadWrite<u32>),
        (0x1C => _reserved2),
        (0x20 => @END),
    },

    pub OutEndpointRegisters {
        (0x00 => pub doepctl: ReadWrite<u32, DOEPCTL::Register>),
        (0x04 => _reserved0),
        (0x08 => pub doepint: ReadWrite<u32, DOEPINT::Register>),
        (0x0C => _reserved1),
        (0x10 => pub doeptsiz: ReadWrite<u32, DOEPTSIZ::Register>),
        (0x14 => pub doepdma: ReadWrite<u32>),
        (0x18 => _reserved2),
        (0x20 => @END),
    },

    // Push/pop window of one packet FIFO. Any word in the window accesses
    // the FIFO; the driver walks the window sequentially.
    pub FifoWindow {
        (0x0000 => pub word: [ReadWrite<u32>; 1024]),
        (0x1000 => @END),
    }
}

register_bitfields![u32,
    pub GOTGCTL [
        /// VBUS valid override enable
        VBVALOEN OFFSET(2) NUMBITS(1) [],
        /// VBUS valid override value
        VBVALOVAL OFFSET(3) NUMBITS(1) [],
        /// A-peripheral session valid override enable
        AVALOEN OFFSET(4) NUMBITS(1) [],
        /// A-peripheral session valid override value
        AVALOVAL OFFSET(5) NUMBITS(1) [],
        /// B-peripheral session valid override enable
        BVALOEN OFFSET(6) NUMBITS(1) [],
        /// B-peripheral session valid override value
        BVALOVAL OFFSET(7) NUMBITS(1) []
    ],
    pub GAHBCFG [
        /// Global interrupt mask
        GINT OFFSET(0) NUMBITS(1) [],
        /// Burst length/type
        HBSTLEN OFFSET(1) NUMBITS(4) [
            Single = 0,
            Incr = 1,
            Incr4 = 3,
            Incr8 = 5,
            Incr16 = 7
        ],
        /// DMA enable
        DMAEN OFFSET(5) NUMBITS(1) [],
        /// TxFIFO empty level: interrupt when completely empty
        TXFELVL OFFSET(7) NUMBITS(1) [],
        /// Periodic TxFIFO empty level
        PTXFELVL OFFSET(8) NUMBITS(1) []
    ],
    pub GUSBCFG [
        /// FS timeout calibration
        TOCAL OFFSET(0) NUMBITS(3) [],
        /// PHY interface width (HS cores)
        PHYIF OFFSET(3) NUMBITS(1) [],
        /// ULPI or UTMI+ select (HS cores)
        ULPI_UTMI_SEL OFFSET(4) NUMBITS(1) [],
        /// Full-speed serial transceiver select
        PHYSEL OFFSET(6) NUMBITS(1) [],
        /// ULPI DDR select
        DDRSEL OFFSET(7) NUMBITS(1) [],
        /// SRP-capable
        SRPCAP OFFSET(8) NUMBITS(1) [],
        /// HNP-capable
        HNPCAP OFFSET(9) NUMBITS(1) [],
        /// USB turnaround time
        TRDT OFFSET(10) NUMBITS(4) [],
        /// ULPI FS/LS select
        ULPIFSLS OFFSET(17) NUMBITS(1) [],
        /// ULPI external VBUS drive
        ULPIEVBUSD OFFSET(20) NUMBITS(1) [],
        /// ULPI external VBUS indicator
        ULPIEVBUSI OFFSET(21) NUMBITS(1) [],
        /// Force host mode
        FHMOD OFFSET(29) NUMBITS(1) [],
        /// Force device mode
        FDMOD OFFSET(30) NUMBITS(1) []
    ],
    pub GRSTCTL [
        /// Core soft reset
        CSRST OFFSET(0) NUMBITS(1) [],
        /// RxFIFO flush
        RXFFLSH OFFSET(4) NUMBITS(1) [],
        /// TxFIFO flush
        TXFFLSH OFFSET(5) NUMBITS(1) [],
        /// TxFIFO number to flush, 0x10 for all
        TXFNUM OFFSET(6) NUMBITS(5) [],
        /// AHB master idle
        AHBIDL OFFSET(31) NUMBITS(1) []
    ],
    // Shared by GINTSTS and GINTMSK.
    pub GINT [
        /// Current mode of operation (1 = host)
        CMOD OFFSET(0) NUMBITS(1) [],
        /// Mode mismatch
        MMIS OFFSET(1) NUMBITS(1) [],
        /// OTG interrupt
        OTGINT OFFSET(2) NUMBITS(1) [],
        /// Start of frame
        SOF OFFSET(3) NUMBITS(1) [],
        /// RxFIFO non-empty
        RXFLVL OFFSET(4) NUMBITS(1) [],
        /// Global IN non-periodic NAK effective
        GINAKEFF OFFSET(6) NUMBITS(1) [],
        /// Global OUT NAK effective
        GONAKEFF OFFSET(7) NUMBITS(1) [],
        /// Early suspend
        ESUSP OFFSET(10) NUMBITS(1) [],
        /// USB suspend
        USBSUSP OFFSET(11) NUMBITS(1) [],
        /// USB reset
        USBRST OFFSET(12) NUMBITS(1) [],
        /// Enumeration done
        ENUMDNE OFFSET(13) NUMBITS(1) [],
        /// End of periodic frame
        EOPF OFFSET(15) NUMBITS(1) [],
        /// IN endpoint interrupt
        IEPINT OFFSET(18) NUMBITS(1) [],
        /// OUT endpoint interrupt
        OEPINT OFFSET(19) NUMBITS(1) [],
        /// Session request/new session detected
        SRQINT OFFSET(30) NUMBITS(1) [],
        /// Resume/remote wakeup detected
        WKUPINT OFFSET(31) NUMBITS(1) []
    ],
    // Shared by GRXSTSR (peek) and GRXSTSP (pop).
    pub GRXSTS [
        /// Endpoint number
        EPNUM OFFSET(0) NUMBITS(4) [],
        /// Byte count
        BCNT OFFSET(4) NUMBITS(11) [],
        /// Data PID
        DPID OFFSET(15) NUMBITS(2) [],
        /// Packet status
        PKTSTS OFFSET(17) NUMBITS(4) [
            GlobalOutNak = 1,
            OutDataUpdate = 2,
            OutTransferComplete = 3,
            SetupComplete = 4,
            SetupDataUpdate = 6
        ],
        /// Frame number
        FRMNUM OFFSET(21) NUMBITS(4) []
    ],
    pub GRXFSIZ [
        /// RxFIFO depth in words
        RXFD OFFSET(0) NUMBITS(16) []
    ],
    // Shared by DIEPTXF0 and DIEPTXFx.
    pub DIEPTXF [
        /// Start address in words
        START OFFSET(0) NUMBITS(16) [],
        /// Depth in words
        DEPTH OFFSET(16) NUMBITS(16) []
    ],
    pub GCCFG [
        /// Power down deactivated (transceiver active)
        PWRDWN OFFSET(16) NUMBITS(1) [],
        /// VBUS sensing disable (CID 1.x cores)
        NOVBUSSENS OFFSET(21) NUMBITS(1) [],
        /// VBUS detection enable (CID 2.x cores)
        VBDEN OFFSET(21) NUMBITS(1) []
    ],
    pub DCFG [
        /// Device speed
        DSPD OFFSET(0) NUMBITS(2) [
            HighSpeed = 0,
            FullSpeedExternal = 1,
            FullSpeed = 3
        ],
        /// Non-zero-length status OUT handshake
        NZLSOHSK OFFSET(2) NUMBITS(1) [],
        /// Device address
        DAD OFFSET(4) NUMBITS(7) [],
        /// Periodic frame interval
        PFIVL OFFSET(11) NUMBITS(2) []
    ],
    pub DCTL [
        /// Remote wakeup signaling
        RWUSIG OFFSET(0) NUMBITS(1) [],
        /// Soft disconnect
        SDIS OFFSET(1) NUMBITS(1) [],
        /// Global IN NAK status
        GINSTS OFFSET(2) NUMBITS(1) [],
        /// Global OUT NAK status
        GONSTS OFFSET(3) NUMBITS(1) [],
        /// Set global IN NAK
        SGINAK OFFSET(7) NUMBITS(1) [],
        /// Clear global IN NAK
        CGINAK OFFSET(8) NUMBITS(1) [],
        /// Set global OUT NAK
        SGONAK OFFSET(9) NUMBITS(1) [],
        /// Clear global OUT NAK
        CGONAK OFFSET(10) NUMBITS(1) [],
        /// Power-on programming done
        POPRGDNE OFFSET(11) NUMBITS(1) []
    ],
    pub DSTS [
        /// Suspend status
        SUSPSTS OFFSET(0) NUMBITS(1) [],
        /// Enumerated speed
        ENUMSPD OFFSET(1) NUMBITS(2) [],
        /// Frame number of the received SOF
        FNSOF OFFSET(8) NUMBITS(14) []
    ],
    pub DIEPMSK [
        /// Transfer completed interrupt mask
        XFRCM OFFSET(0) NUMBITS(1) [],
        /// Endpoint disabled interrupt mask
        EPDM OFFSET(1) NUMBITS(1) [],
        /// Timeout condition mask
        TOM OFFSET(3) NUMBITS(1) []
    ],
    pub DOEPMSK [
        /// Transfer completed interrupt mask
        XFRCM OFFSET(0) NUMBITS(1) [],
        /// Endpoint disabled interrupt mask
        EPDM OFFSET(1) NUMBITS(1) [],
        /// SETUP phase done mask
        STUPM OFFSET(3) NUMBITS(1) []
    ],
    // Shared by DAINT and DAINTMSK.
    pub DAINT [
        /// IN endpoint bits
        IEPINT OFFSET(0) NUMBITS(16) [],
        /// OUT endpoint bits
        OEPINT OFFSET(16) NUMBITS(16) []
    ],
    pub DIEPCTL [
        /// Maximum packet size; a 2 bit encoding on endpoint 0
        MPSIZ OFFSET(0) NUMBITS(11) [],
        /// USB active endpoint
        USBAEP OFFSET(15) NUMBITS(1) [],
        /// NAK status
        NAKSTS OFFSET(17) NUMBITS(1) [],
        /// Endpoint type
        EPTYP OFFSET(18) NUMBITS(2) [
            Control = 0,
            Isochronous = 1,
            Bulk = 2,
            Interrupt = 3
        ],
        /// STALL handshake
        STALL OFFSET(21) NUMBITS(1) [],
        /// TxFIFO number
        TXFNUM OFFSET(22) NUMBITS(4) [],
        /// Clear NAK
        CNAK OFFSET(26) NUMBITS(1) [],
        /// Set NAK
        SNAK OFFSET(27) NUMBITS(1) [],
        /// Set DATA0 PID
        SD0PID OFFSET(28) NUMBITS(1) [],
        /// Set odd frame
        SODDFRM OFFSET(29) NUMBITS(1) [],
        /// Endpoint disable
        EPDIS OFFSET(30) NUMBITS(1) [],
        /// Endpoint enable
        EPENA OFFSET(31) NUMBITS(1) []
    ],
    pub DOEPCTL [
        /// Maximum packet size; a 2 bit encoding on endpoint 0
        MPSIZ OFFSET(0) NUMBITS(11) [],
        /// USB active endpoint
        USBAEP OFFSET(15) NUMBITS(1) [],
        /// NAK status
        NAKSTS OFFSET(17) NUMBITS(1) [],
        /// Endpoint type
        EPTYP OFFSET(18) NUMBITS(2) [
            Control = 0,
            Isochronous = 1,
            Bulk = 2,
            Interrupt = 3
        ],
        /// Snoop mode
        SNPM OFFSET(20) NUMBITS(1) [],
        /// STALL handshake
        STALL OFFSET(21) NUMBITS(1) [],
        /// Clear NAK
        CNAK OFFSET(26) NUMBITS(1) [],
        /// Set NAK
        SNAK OFFSET(27) NUMBITS(1) [],
        /// Set DATA0 PID
        SD0PID OFFSET(28) NUMBITS(1) [],
        /// Set odd frame
        SODDFRM OFFSET(29) NUMBITS(1) [],
        /// Endpoint disable
        EPDIS OFFSET(30) NUMBITS(1) [],
        /// Endpoint enable
        EPENA OFFSET(31) NUMBITS(1) []
    ],
    pub DIEPINT [
        /// Transfer completed
        XFRC OFFSET(0) NUMBITS(1) [],
        /// Endpoint disabled
        EPDISD OFFSET(1) NUMBITS(1) [],
        /// Timeout condition
        TOC OFFSET(3) NUMBITS(1) [],
        /// IN token received when TxFIFO is empty
        ITTXFE OFFSET(4) NUMBITS(1) [],
        /// IN endpoint NAK effective
        INEPNE OFFSET(6) NUMBITS(1) [],
        /// Transmit FIFO empty
        TXFE OFFSET(7) NUMBITS(1) []
    ],
    pub DOEPINT [
        /// Transfer completed
        XFRC OFFSET(0) NUMBITS(1) [],
        /// Endpoint disabled
        EPDISD OFFSET(1) NUMBITS(1) [],
        /// SETUP phase done
        STUP OFFSET(3) NUMBITS(1) [],
        /// OUT token received when endpoint disabled
        OTEPDIS OFFSET(4) NUMBITS(1) [],
        /// Back-to-back SETUP packets received
        B2BSTUP OFFSET(6) NUMBITS(1) []
    ],
    pub DIEPTSIZ [
        /// Transfer size in bytes
        XFRSIZ OFFSET(0) NUMBITS(19) [],
        /// Packet count
        PKTCNT OFFSET(19) NUMBITS(10) [],
        /// Multi count
        MCNT OFFSET(29) NUMBITS(2) []
    ],
    pub DOEPTSIZ [
        /// Transfer size in bytes
        XFRSIZ OFFSET(0) NUMBITS(19) [],
        /// Packet count
        PKTCNT OFFSET(19) NUMBITS(10) [],
        /// SETUP packet count
        STUPCNT OFFSET(29) NUMBITS(2) []
    ],
    pub PCGCCTL [
        /// Stop PHY clock
        STOPCLK OFFSET(0) NUMBITS(1) [],
        /// Gate HCLK
        GATECLK OFFSET(1) NUMBITS(1) [],
        /// PHY suspended
        PHYSUSP OFFSET(4) NUMBITS(1) []
    ]
];
