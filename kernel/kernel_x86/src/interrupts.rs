/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

use crate::{keyboard::Keyboard, rtc, task, KERNEL};
use core::arch::global_asm;
use hal_x86::hw::{
    gdt::PrivilegeLevel,
    i8259_pic::{Pic, CASCADE_IRQ},
    idt::{HandlerFunc, Idt},
};
use kernel::{scheduler::TickAction, syscall::exception_name};
use spinning_top::Spinlock;
use tracing::{info, warn};

/// The IDT is laid out like so:
/// |------------------|-----------------------------|
/// | Interrupt Vector |            Usage            |
/// |------------------|-----------------------------|
/// |       00-13      | Exceptions                  |
/// |       20-27      | Primary PIC (IRQs 0-7)      |
/// |       28-2f      | Secondary PIC (IRQs 8-15)   |
/// |        80        | System calls                |
/// |------------------|-----------------------------|
static IDT: Spinlock<Idt> = Spinlock::new(Idt::empty());
static PIC: Spinlock<Pic> = Spinlock::new(unsafe { Pic::new() });
static KEYBOARD: Spinlock<Keyboard> = Spinlock::new(unsafe { Keyboard::new() });

const PRIMARY_PIC_VECTOR: u8 = 0x20;
const SECONDARY_PIC_VECTOR: u8 = 0x28;
const SYSCALL_VECTOR: u8 = 0x80;

const TIMER_IRQ: u8 = 0;
const KEYBOARD_IRQ: u8 = 1;
const RTC_IRQ: u8 = 8;

global_asm!(include_str!("interrupts.s"));
extern "C" {
    fn exception_0();
    fn exception_1();
    fn exception_2();
    fn exception_3();
    fn exception_4();
    fn exception_5();
    fn exception_6();
    fn exception_7();
    fn exception_8();
    fn exception_9();
    fn exception_10();
    fn exception_11();
    fn exception_12();
    fn exception_13();
    fn exception_14();
    fn exception_15();
    fn exception_16();
    fn exception_17();
    fn exception_18();
    fn exception_19();

    fn timer_entry();
    fn keyboard_entry();
    fn rtc_entry();
}

const EXCEPTION_HANDLERS: [HandlerFunc; 20] = [
    exception_0,
    exception_1,
    exception_2,
    exception_3,
    exception_4,
    exception_5,
    exception_6,
    exception_7,
    exception_8,
    exception_9,
    exception_10,
    exception_11,
    exception_12,
    exception_13,
    exception_14,
    exception_15,
    exception_16,
    exception_17,
    exception_18,
    exception_19,
];

/// What `exception_common` leaves on the stack, lowest address first.
#[derive(Debug)]
#[repr(C)]
struct ExceptionFrame {
    gs: u32,
    fs: u32,
    es: u32,
    ds: u32,
    edi: u32,
    esi: u32,
    ebp: u32,
    _esp: u32,
    ebx: u32,
    edx: u32,
    ecx: u32,
    eax: u32,
    vector: u32,
    error_code: u32,
    eip: u32,
    cs: u32,
    eflags: u32,
}

/// Install every handler and load the IDT. Maskable interrupts stay disabled until `enable_irqs`.
pub fn init() {
    let mut idt = IDT.lock();
    for (vector, handler) in EXCEPTION_HANDLERS.into_iter().enumerate() {
        idt.entry(vector as u8).set_handler(handler);
    }
    idt.entry(PRIMARY_PIC_VECTOR + TIMER_IRQ).set_handler(timer_entry);
    idt.entry(PRIMARY_PIC_VECTOR + KEYBOARD_IRQ).set_handler(keyboard_entry);
    idt.entry(SECONDARY_PIC_VECTOR + RTC_IRQ - 8).set_handler(rtc_entry);
    idt.entry(SYSCALL_VECTOR).set_handler(task::syscall_handler).set_privilege_level(PrivilegeLevel::Ring3);

    unsafe {
        idt.load();
    }

    PIC.lock().remap(PRIMARY_PIC_VECTOR, SECONDARY_PIC_VECTOR);
}

/// Unmask the devices we drive. Nothing is delivered until the boot path sets `IF`.
pub fn enable_irqs() {
    KERNEL.get().lock().platform.rtc.enable_periodic_interrupt();

    let mut pic = PIC.lock();
    pic.enable_irq(TIMER_IRQ);
    pic.enable_irq(KEYBOARD_IRQ);
    pic.enable_irq(CASCADE_IRQ);
    pic.enable_irq(RTC_IRQ);
    info!("Enabled IRQs {}, {}, and {}", TIMER_IRQ, KEYBOARD_IRQ, RTC_IRQ);
}

#[no_mangle]
extern "C" fn rust_exception_entry(frame: &ExceptionFrame) {
    let vector = frame.vector as u8;

    // Faults in the kernel itself are bugs, and there's nobody to hand the fault to
    if frame.cs & 0b11 == 0 {
        panic!(
            "{} in kernel (vector {}, error code {:#x}) at {:#x}: {:#x?}",
            exception_name(vector),
            vector,
            frame.error_code,
            frame.eip,
            frame
        );
    }

    let Some(mut kernel) = KERNEL.get().try_lock() else {
        panic!("{} in user mode while the kernel was locked", exception_name(vector));
    };
    warn!("{} at {:#x} (error code {:#x})", exception_name(vector), frame.eip, frame.error_code);
    let transition = kernel.handle_exception(vector);
    drop(kernel);

    task::resume(transition)
}

#[no_mangle]
extern "C" fn rust_timer_handler() {
    PIC.lock().send_eoi(TIMER_IRQ);

    let action = KERNEL.get().lock().timer_tick();
    match action {
        TickAction::Continue => (),
        TickAction::LaunchRootShell { terminal, save } => unsafe { task::start_launcher(terminal, save) },
        TickAction::Switch { save, restore } => unsafe { task::switch(save, restore) },
    }
}

#[no_mangle]
extern "C" fn rust_keyboard_handler() {
    let key = KEYBOARD.lock().read_key();
    if let Some(key) = key {
        KERNEL.get().lock().handle_key(key);
    }
    PIC.lock().send_eoi(KEYBOARD_IRQ);
}

#[no_mangle]
extern "C" fn rust_rtc_handler() {
    rtc::handle_interrupt();
    PIC.lock().send_eoi(RTC_IRQ);
}
