// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Tracing macros and human readable decoders for interrupt flag words.

use core::fmt;

/// Trace an event delivered to the client. Compiled out unless the
/// `trace_events` feature is set.
macro_rules! event_trace {
    [ $( $arg:expr ),+ ] => {
        if $crate::config::CONFIG.trace_events {
            log::trace!(target: "dwc2", $( $arg ),+);
        }
    };
}

/// Trace a transfer being armed or completed. Compiled out unless the
/// `trace_transfers` feature is set.
macro_rules! transfer_trace {
    [ $( $arg:expr ),+ ] => {
        if $crate::config::CONFIG.trace_transfers {
            log::trace!(target: "dwc2", $( $arg ),+);
        }
    };
}

macro_rules! debug_flags {
    ( $tyname:ident {$( $flag:ident = $offset:expr; )*} ) => {

        pub struct $tyname(pub u32);

        impl fmt::Debug for $tyname {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                let w: u32 = self.0;
                write!(f, "{{")?;
                $(
                    if w & (1 << $offset) != 0 {
                        write!(f, " {}", stringify!($flag))?;
                    }
                )*
                write!(f, " }}")
            }
        }
    };
}

debug_flags! {
    GintFlags {
        MMIS = 1;
        OTGINT = 2;
        SOF = 3;
        RXFLVL = 4;
        ESUSP = 10;
        USBSUSP = 11;
        USBRST = 12;
        ENUMDNE = 13;
        IEPINT = 18;
        OEPINT = 19;
        SRQINT = 30;
        WKUPINT = 31;
    }
}

/// Pending endpoints of a `DAINT` word, as `IN0 OUT2 ...`.
pub struct DaintFlags(pub u32);

impl fmt::Debug for DaintFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let w: u32 = self.0;
        write!(f, "{{")?;
        for i in 0..16 {
            if w & (1 << i) != 0 {
                write!(f, " IN{}", i)?;
            }
        }
        for i in 0..16 {
            if w & (1 << (16 + i)) != 0 {
                write!(f, " OUT{}", i)?;
            }
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::format;

    #[test]
    fn gint_flags() {
        let s = format!("{:?}", GintFlags((1 << 12) | (1 << 31)));
        assert_eq!(s, "{ USBRST WKUPINT }");
        assert_eq!(format!("{:?}", GintFlags(0)), "{ }");
    }

    #[test]
    fn daint_flags() {
        let s = format!("{:?}", DaintFlags(0b10 | (1 << 16)));
        assert_eq!(s, "{ IN1 OUT0 }");
    }
}
