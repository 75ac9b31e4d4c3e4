/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

#![cfg_attr(not(test), no_std)]

pub mod bitmap;
pub mod init_guard;

pub use bitmap::Bitmap;
pub use init_guard::InitGuard;
