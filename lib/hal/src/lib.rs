/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

//! `hal` contains the vocabulary types shared by the kernel core and the platform layer. The kernel targets a
//! 32-bit protected-mode machine, so addresses are always representable in 32 bits, even when the core is
//! built for the host to run its tests.

#![cfg_attr(not(test), no_std)]

pub mod memory;
