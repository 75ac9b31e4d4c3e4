/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

use super::port::Port;
use bit_field::BitField;

const END_OF_INTERRUPT: u8 = 0x20;
/// The secondary PIC is cascaded through this line of the primary.
pub const CASCADE_IRQ: u8 = 2;

pub struct Pic {
    primary_command: Port<u8>,
    primary_data: Port<u8>,
    secondary_command: Port<u8>,
    secondary_data: Port<u8>,
    primary_mask: u8,
    secondary_mask: u8,
}

impl Pic {
    pub const unsafe fn new() -> Pic {
        unsafe {
            Pic {
                primary_command: Port::new(0x20),
                primary_data: Port::new(0x21),
                secondary_command: Port::new(0xa0),
                secondary_data: Port::new(0xa1),
                primary_mask: 0xff,
                secondary_mask: 0xff,
            }
        }
    }

    /// Remap the PICs so their interrupts don't collide with CPU exceptions. Every line is left masked.
    pub fn remap(&mut self, primary_vector_offset: u8, secondary_vector_offset: u8) {
        unsafe {
            /*
             * 0x80 is a port used by POST. It shouldn't do anything, but it'll take long enough to execute writes
             * to it that we should block for long enough for the PICs to actually do what we ask them to.
             */
            let mut wait_port: Port<u8> = Port::new(0x80);
            let mut wait = || wait_port.write(0);

            // Tell the PICs to start their initialization sequences in cascade mode
            self.primary_command.write(0x11);
            self.secondary_command.write(0x11);
            wait();

            // Tell the PICs their new interrupt vectors
            self.primary_data.write(primary_vector_offset);
            self.secondary_data.write(secondary_vector_offset);
            wait();

            // Tell the primary PIC that the secondary is at IRQ2
            self.primary_data.write(1 << CASCADE_IRQ);
            wait();

            // Tell the secondary PIC its cascade identity
            self.secondary_data.write(CASCADE_IRQ);
            wait();

            // Tell the PICs to go into 8086/88 MCS-80/85 mode
            self.primary_data.write(0x1);
            self.secondary_data.write(0x1);
            wait();

            // Mask both PICs
            self.primary_data.write(self.primary_mask);
            self.secondary_data.write(self.secondary_mask);
        }
    }

    pub fn enable_irq(&mut self, irq: u8) {
        self.set_masked(irq, false);
    }

    pub fn disable_irq(&mut self, irq: u8) {
        self.set_masked(irq, true);
    }

    fn set_masked(&mut self, irq: u8, masked: bool) {
        unsafe {
            if irq < 8 {
                self.primary_mask.set_bit(irq as usize, masked);
                self.primary_data.write(self.primary_mask);
            } else {
                self.secondary_mask.set_bit((irq - 8) as usize, masked);
                self.secondary_data.write(self.secondary_mask);
            }
        }
    }

    /// Acknowledge `irq`. Interrupts from the secondary PIC must be acknowledged on both.
    pub fn send_eoi(&mut self, irq: u8) {
        unsafe {
            if irq >= 8 {
                self.secondary_command.write(END_OF_INTERRUPT);
            }
            self.primary_command.write(END_OF_INTERRUPT);
        }
    }
}
