/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

use super::registers::{read_control_reg, write_control_reg};

/// Flush every non-global translation by reloading `CR3`.
pub fn flush() {
    let current_cr3 = read_control_reg!(cr3);
    unsafe {
        write_control_reg!(cr3, current_cr3);
    }
}
