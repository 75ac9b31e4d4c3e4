/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

use crate::KERNEL;
use core::{arch::global_asm, mem, ptr::addr_of_mut};
use hal_x86::hw::{
    gdt::{KERNEL_DATA_SELECTOR, USER_CODE_SELECTOR, USER_DATA_SELECTOR},
    registers::{read_flags, EFLAGS_INTERRUPT_ENABLE},
};
use kernel::{
    process::SavedContext,
    syscall::Transition,
    terminal::{TerminalId, NUM_TERMINALS},
};
use tracing::info;

// The assembly hardcodes these selectors
const _: () = assert!(KERNEL_DATA_SELECTOR.0 == 0x10);
const _: () = assert!(USER_CODE_SELECTOR.0 == 0x1b);
const _: () = assert!(USER_DATA_SELECTOR.0 == 0x23);

global_asm!(include_str!("task.s"));
global_asm!(include_str!("syscall.s"));
extern "C" {
    /// Save the calling kernel context into `context` and drop into user mode at `entry_point`. This returns
    /// when the context is resumed by `resume_kernel_context`, which happens when the process halts, with the
    /// value passed to it.
    fn enter_user_mode(context: *mut SavedContext, entry_point: u32, user_stack: u32) -> u32;

    /// Abandon the current kernel stack and resume `context`, as if the `enter_user_mode` or `context_swap`
    /// that saved it had returned `value`.
    fn resume_kernel_context(context: *const SavedContext, value: u32) -> !;

    /// Save the current kernel context into `save`, and resume `restore`. Returns when `save` is resumed.
    fn context_swap(save: *mut SavedContext, restore: *const SavedContext);

    /// The `int 0x80` entry point.
    pub fn syscall_handler();
}

/// Each terminal's root-shell launcher runs on its own stack. The launcher only ever sits in
/// `enter_user_mode` while its shell is running, so these can be small.
const LAUNCHER_STACK_SIZE: usize = 4096;

#[repr(C, align(16))]
struct LauncherStack([u8; LAUNCHER_STACK_SIZE]);

static mut LAUNCHER_STACKS: [LauncherStack; NUM_TERMINALS] =
    [const { LauncherStack([0; LAUNCHER_STACK_SIZE]) }; NUM_TERMINALS];

#[no_mangle]
extern "C" fn rust_syscall_entry(number: u32, a: u32, b: u32, c: u32) -> u32 {
    loop {
        // The lock must be released before we leave this frame in any way other than returning
        let transition = KERNEL.get().lock().dispatch(number, a, b, c);

        match transition {
            Transition::Return(value) => return value as u32,
            Transition::Block => unsafe {
                /*
                 * Wait for the interrupt that will let the call complete (a keypress or RTC tick), then try again.
                 * The timer can switch to another terminal while we're halted here; we'll pick up where we left
                 * off when it switches back.
                 */
                core::arch::asm!("sti", "hlt", "cli");
            },
            Transition::Launch(launch) => {
                return unsafe {
                    enter_user_mode(launch.context, launch.entry_point.into(), launch.user_stack.into())
                };
            }
            Transition::Resume { context, value } => unsafe { resume_kernel_context(&context, value) },
        }
    }
}

/// Resume a context after a process has been torn down by an exception.
pub fn resume(transition: Transition) -> ! {
    match transition {
        Transition::Resume { context, value } => unsafe { resume_kernel_context(&context, value) },
        other => panic!("Exception handling produced {:?} instead of resuming a kernel context", other),
    }
}

/// Swap to the kernel context of another process. Must be called with the kernel lock released.
pub unsafe fn switch(save: *mut SavedContext, restore: *const SavedContext) {
    unsafe { context_swap(save, restore) }
}

/// Start `terminal`'s root-shell launcher on its own stack. If `save` is given, the interrupted process's
/// context is saved there so the scheduler can come back to it; otherwise we're on the boot stack and never
/// return to it.
pub unsafe fn start_launcher(terminal: TerminalId, save: Option<*mut SavedContext>) {
    let stack = unsafe { &mut *addr_of_mut!(LAUNCHER_STACKS[terminal.index()]) };
    let stack_top = stack.0.as_mut_ptr_range().end as u32;

    /*
     * Lay out the stack as if `root_shell_launcher` had just been called: a return address it will never use,
     * and then its argument.
     */
    let frame = (stack_top - 2 * mem::size_of::<u32>() as u32) as *mut u32;
    unsafe {
        frame.write(0);
        frame.add(1).write(terminal.number() as u32);
    }

    let launcher = SavedContext {
        esp: frame as u32,
        eip: root_shell_launcher as usize as u32,
        // Reserved bit 1 is always set; interrupts stay off until the shell is in user mode
        eflags: 0x2,
        ..SavedContext::default()
    };

    let mut abandoned = SavedContext::default();
    let save = save.unwrap_or(&mut abandoned as *mut SavedContext);
    unsafe { context_swap(save, &launcher) }
}

/// Each terminal has a launcher that keeps a root shell running on it. When the shell halts, its context
/// here is resumed and we start a new one.
extern "C" fn root_shell_launcher(terminal: u32) -> ! {
    assert!(read_flags() & EFLAGS_INTERRUPT_ENABLE == 0);
    let Some(terminal) = TerminalId::new(terminal as usize) else {
        panic!("Root shell launcher started for non-existent terminal {}", terminal);
    };

    loop {
        let launch = KERNEL.get().lock().launch_root_shell(terminal);
        let launch = match launch {
            Ok(launch) => launch,
            Err(err) => panic!("Failed to start root shell on terminal {}: {:?}", terminal.number(), err),
        };

        let status = unsafe { enter_user_mode(launch.context, launch.entry_point.into(), launch.user_stack.into()) };
        info!("Root shell of terminal {} exited with status {}. Restarting it.", terminal.number(), status);
    }
}
