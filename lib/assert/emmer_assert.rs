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

#![no_std]

unsafe extern "C" {
    /// Terminal failure hook, provided exactly once by the kernel crate.
    /// Dumps diagnostics and powers the machine off.
    pub fn emmer_assert_handle_failure() -> !;
}

// Re-export emmer_log for use by the panic/assert macros.
#[doc(hidden)]
pub mod __private {
    pub use emmer_log::fatal;
}

/// Log a fatal message and invoke the kernel failure handler.  Unconditionally
/// terminal; the kernel never continues past this.
#[macro_export]
macro_rules! panic {
    ($($args:tt)*) => {{
        $crate::__private::fatal!($($args)*);
        unsafe { $crate::emmer_assert_handle_failure() }
    }};
}

/// Assert that a condition holds; failure is terminal.
#[macro_export]
macro_rules! assert {
    ($condition:expr $(,)?) => {{
        if !$condition {
            $crate::panic!("assert!() failed: {}", core::stringify!($condition));
        }
    }};

    ($condition:expr, $($args:tt)*) => {{
        if !$condition {
            $crate::__private::fatal!("assert!() failed: {}", core::stringify!($condition));
            $crate::panic!($($args)*);
        }
    }};
}

/// Assert that two values are equal; failure is terminal.
#[macro_export]
macro_rules! eq {
    ($a:expr, $b:expr $(,)?) => {{
        let a = &$a;
        let b = &$b;
        if *a != *b {
            $crate::panic!("assert_eq!() failed, {:?} != {:?}", a, b);
        }
    }};
}

/// Assert that two values differ; failure is terminal.
#[macro_export]
macro_rules! ne {
    ($a:expr, $b:expr $(,)?) => {{
        let a = &$a;
        let b = &$b;
        if *a == *b {
            $crate::panic!("assert_ne!() failed, {:?} == {:?}", a, b);
        }
    }};
}

/// Like [`assert!`], but compiled out of release builds.
#[macro_export]
macro_rules! debug_assert {
    ($($args:tt)*) => {{
        if cfg!(debug_assertions) {
            $crate::assert!($($args)*);
        }
    }};
}
