/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

use core::{arch::asm, marker::PhantomData};

/// A value that can be moved through an IO port in one `in` or `out`. Only `u8`, `u16`, and `u32` make sense.
pub trait PortSize: Sized {
    unsafe fn port_read(port: u16) -> Self;
    unsafe fn port_write(port: u16, value: Self);
}

macro_rules! port_size {
    ($type: ty, $register: literal) => {
        impl PortSize for $type {
            unsafe fn port_read(port: u16) -> $type {
                let value: $type;
                unsafe {
                    asm!(concat!("in ", $register, ", dx"), in("dx") port, out($register) value, options(nomem, nostack));
                }
                value
            }

            unsafe fn port_write(port: u16, value: $type) {
                unsafe {
                    asm!(concat!("out dx, ", $register), in("dx") port, in($register) value, options(nomem, nostack));
                }
            }
        }
    };
}

port_size!(u8, "al");
port_size!(u16, "ax");
port_size!(u32, "eax");

/// A single IO port. Every device driver in `hw` talks to its hardware through these.
pub struct Port<T: PortSize> {
    port: u16,
    _phantom: PhantomData<T>,
}

impl<T: PortSize> Port<T> {
    /// Unsafe because whoever holds a `Port` can poke the device behind it in any way they like.
    pub const unsafe fn new(port: u16) -> Port<T> {
        Port { port, _phantom: PhantomData }
    }

    pub unsafe fn read(&self) -> T {
        unsafe { T::port_read(self.port) }
    }

    pub unsafe fn write(&mut self, value: T) {
        unsafe { T::port_write(self.port, value) }
    }
}
