/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod paging;

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86")] {
        /// Drivers for the hardware of a 32-bit PC. These are only built when targeting it, so the paging
        /// structures above can still be tested on the host.
        pub mod hw;
    }
}
