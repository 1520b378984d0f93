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

//! ESP32-C6: single RV32IMAC hart, 16 PMP entries.
//!
//! External interrupts arrive through the interrupt matrix, which the board
//! port owns; the kernel only sees the registered external handler.

use crate::{KernelConfigInterface, RiscVKernelConfigInterface};

pub struct KernelConfig;

impl KernelConfigInterface for KernelConfig {
    const TARGET_NAME: &'static str = "esp32c6";
    const MAX_HARTS: usize = 1;
}

impl RiscVKernelConfigInterface for KernelConfig {
    const PMP_ENTRIES: usize = 16;
    // Entries 0..5 are claimed at boot for the null-pointer guards and the
    // ROM/flash write protections.
    const PMP_USERSPACE_ENTRIES: core::ops::Range<usize> = 5..16;
}
