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

use crate::arch::{Arch, ArchInterface};

#[panic_handler]
fn panic_handler(info: &core::panic::PanicInfo) -> ! {
    match info.location() {
        Some(location) => {
            emmer_log::fatal!(
                "kernel panic at {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            );
        }
        None => emmer_log::fatal!("kernel panic"),
    }

    Arch::panic()
}
