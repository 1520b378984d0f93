// Copyright 2025 The Emmer Authors
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License. You may obtain a copy of
// the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the
// License for the specific language governing permissions and limitations under
// the License.

//! Field accessor macros for register value types.
//!
//! A register value is a newtype over its raw integer representation
//! (`pub struct MStatusVal(pub usize);`).  The macros in this crate generate
//! typed, `const` field accessors on such newtypes:
//!
//! ```
//! use regs::*;
//!
//! #[derive(Clone, Copy, Default)]
//! pub struct CtrlVal(pub u32);
//! impl CtrlVal {
//!     rw_bool_field!(u32, enable, 0, "enable");
//!     rw_int_field!(u32, prescaler, 1, 4, u8, "clock prescaler");
//! }
//!
//! let val = CtrlVal(0).with_enable(true).with_prescaler(3);
//! assert!(val.enable());
//! ```

#![no_std]

// Re-export `paste` so the macros work without dependents naming it.
#[doc(hidden)]
pub mod __private {
    pub use paste::paste;
}

/// Bit mask covering `$start..=$end` of an integer type.
#[macro_export]
macro_rules! field_mask {
    ($ty:ty, $start:expr, $end:expr) => {
        ((1 as $ty)
            .wrapping_shl(($end - $start) as u32)
            .wrapping_shl(1)
            .wrapping_sub(1))
            << $start
    };
}

/// Generate a read accessor for a single-bit boolean field.
#[macro_export]
macro_rules! ro_bool_field {
    ($ty:ty, $name:ident, $offset:expr, $doc:literal) => {
        #[doc = $doc]
        #[inline]
        #[must_use]
        pub const fn $name(&self) -> bool {
            (self.0 >> $offset) & 1 == 1
        }
    };
}

/// Generate read and `with_` accessors for a single-bit boolean field.
#[macro_export]
macro_rules! rw_bool_field {
    ($ty:ty, $name:ident, $offset:expr, $doc:literal) => {
        $crate::ro_bool_field!($ty, $name, $offset, $doc);
        $crate::__private::paste! {
            #[doc = $doc]
            #[inline]
            #[must_use]
            pub const fn [<with_ $name>](self, val: bool) -> Self {
                Self(self.0 & !((1 as $ty) << $offset) | ((val as $ty) << $offset))
            }
        }
    };
}

/// Generate a read accessor for an integer field spanning `$start..=$end`.
#[macro_export]
macro_rules! ro_int_field {
    ($ty:ty, $name:ident, $start:expr, $end:expr, $val_ty:ty, $doc:literal) => {
        #[doc = $doc]
        #[inline]
        #[must_use]
        pub const fn $name(&self) -> $val_ty {
            ((self.0 & $crate::field_mask!($ty, $start, $end)) >> $start) as $val_ty
        }
    };
}

/// Generate read and `with_` accessors for an integer field.
#[macro_export]
macro_rules! rw_int_field {
    ($ty:ty, $name:ident, $start:expr, $end:expr, $val_ty:ty, $doc:literal) => {
        $crate::ro_int_field!($ty, $name, $start, $end, $val_ty, $doc);
        $crate::__private::paste! {
            #[doc = $doc]
            #[inline]
            #[must_use]
            pub const fn [<with_ $name>](self, val: $val_ty) -> Self {
                let mask = $crate::field_mask!($ty, $start, $end);
                Self(self.0 & !mask | (((val as $ty) << $start) & mask))
            }
        }
    };
}

/// Generate read and `with_` accessors for a field with an enum type.
///
/// The enum must be `#[repr($ty)]` and define a variant for every value the
/// field can hold.
#[macro_export]
macro_rules! rw_enum_field {
    ($ty:ty, $name:ident, $start:expr, $end:expr, $enum_ty:ty, $doc:literal) => {
        #[doc = $doc]
        #[inline]
        #[must_use]
        pub const fn $name(&self) -> $enum_ty {
            // SAFETY: the field is masked to the enum's declared width and the
            // enum is `#[repr($ty)]` per this macro's contract.
            unsafe {
                core::mem::transmute(
                    (self.0 & $crate::field_mask!($ty, $start, $end)) >> $start,
                )
            }
        }
        $crate::__private::paste! {
            #[doc = $doc]
            #[inline]
            #[must_use]
            pub const fn [<with_ $name>](self, val: $enum_ty) -> Self {
                let mask = $crate::field_mask!($ty, $start, $end);
                Self(self.0 & !mask | (((val as $ty) << $start) & mask))
            }
        }
    };
}

/// Generate a read accessor for a field described by a raw mask.
#[macro_export]
macro_rules! ro_masked_field {
    ($name:ident, $mask:expr, $ty:ty, $doc:literal) => {
        #[doc = $doc]
        #[inline]
        #[must_use]
        pub const fn $name(&self) -> $ty {
            self.0 & $mask
        }
    };
}

/// Generate read and `with_` accessors for a field described by a raw mask.
#[macro_export]
macro_rules! rw_masked_field {
    ($name:ident, $mask:expr, $ty:ty, $doc:literal) => {
        $crate::ro_masked_field!($name, $mask, $ty, $doc);
        $crate::__private::paste! {
            #[doc = $doc]
            #[inline]
            #[must_use]
            pub const fn [<with_ $name>](self, val: $ty) -> Self {
                Self(self.0 & !$mask | (val & $mask))
            }
        }
    };
}

#[cfg(test)]
mod tests {
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    #[repr(u32)]
    enum Mode {
        Off = 0,
        Slow = 1,
        Fast = 2,
        Turbo = 3,
    }

    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    struct TestVal(u32);

    impl TestVal {
        rw_bool_field!(u32, enable, 0, "enable");
        rw_int_field!(u32, count, 1, 4, u8, "count");
        rw_enum_field!(u32, mode, 5, 6, Mode, "mode");
        rw_masked_field!(high, 0xffff_0000, u32, "high half");
    }

    #[test]
    fn bool_field_round_trips() {
        let val = TestVal(0).with_enable(true);
        assert!(val.enable());
        assert_eq!(val.0, 1);
        assert!(!val.with_enable(false).enable());
    }

    #[test]
    fn int_field_is_masked_and_shifted() {
        let val = TestVal(0).with_count(0xf);
        assert_eq!(val.count(), 0xf);
        assert_eq!(val.0, 0b11110);
        // Values wider than the field are truncated.
        assert_eq!(TestVal(0).with_count(0x1f).count(), 0xf);
    }

    #[test]
    fn enum_field_round_trips() {
        for mode in [Mode::Off, Mode::Slow, Mode::Fast, Mode::Turbo] {
            assert_eq!(TestVal(0).with_mode(mode).mode(), mode);
        }
    }

    #[test]
    fn masked_field_leaves_other_bits() {
        let val = TestVal(0x0000_1234).with_high(0xabcd_0000);
        assert_eq!(val.high(), 0xabcd_0000);
        assert_eq!(val.0, 0xabcd_1234);
    }

    #[test]
    fn fields_do_not_interfere() {
        let val = TestVal(0)
            .with_enable(true)
            .with_count(7)
            .with_mode(Mode::Fast);
        assert!(val.enable());
        assert_eq!(val.count(), 7);
        assert_eq!(val.mode(), Mode::Fast);
    }
}
