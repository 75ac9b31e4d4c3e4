/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

//! System calls arrive through `int 0x80` with the number in `eax` and up to three arguments in `ebx`, `ecx`,
//! and `edx`. Non-negative results are success values, and every failure is reported to userspace as `-1`.

mod io;
pub mod validation;

use crate::{
    fs::{FileSystem, FileType, FsError},
    file::FileError,
    image,
    memory::layout,
    process::{Arguments, ExitStatus, ProcessSlot, SavedContext},
    terminal::{TerminalId, LINE_BUFFER_SIZE},
    KernelState,
    Platform,
};
use core::task::Poll;
use hal::memory::VAddr;
use tracing::{error, info, trace, warn};
use validation::{UserAccessError, UserSlice, UserString};

pub const SYSCALL_HALT: u32 = 1;
pub const SYSCALL_EXECUTE: u32 = 2;
pub const SYSCALL_READ: u32 = 3;
pub const SYSCALL_WRITE: u32 = 4;
pub const SYSCALL_OPEN: u32 = 5;
pub const SYSCALL_CLOSE: u32 = 6;
pub const SYSCALL_GETARGS: u32 = 7;
pub const SYSCALL_VIDMAP: u32 = 8;
pub const SYSCALL_SET_HANDLER: u32 = 9;
pub const SYSCALL_SIGRETURN: u32 = 10;

/// The program started in each terminal at boot, and again whenever the previous one exits.
pub const ROOT_SHELL: &[u8] = b"shell";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ExecuteError {
    /// There's no file with the given name.
    NotFound,
    /// The file isn't a regular file, doesn't start with the executable magic, or has its entry point outside
    /// the image.
    NotExecutable,
    /// The image doesn't fit between its load address and the top of the user stack.
    ImageTooLarge,
    /// All `MAX_PROCESSES` slots are in use.
    TooManyProcesses,
    /// The filesystem failed part-way through loading the image.
    ReadFailed,
    /// A root shell was requested for a terminal that already has one.
    TerminalBusy,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HaltError {
    /// There's no live process to halt.
    NotRunning,
}

/// Everything that can make a system call fail. This is turned into `-1` in exactly one place, `dispatch`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SyscallError {
    Execute(ExecuteError),
    Halt(HaltError),
    File(FileError),
    UserAccess(UserAccessError),
    Fs(FsError),
    NoArguments,
    Unsupported,
    UnknownSyscall(u32),
}

impl From<ExecuteError> for SyscallError {
    fn from(error: ExecuteError) -> Self {
        SyscallError::Execute(error)
    }
}

impl From<HaltError> for SyscallError {
    fn from(error: HaltError) -> Self {
        SyscallError::Halt(error)
    }
}

impl From<FileError> for SyscallError {
    fn from(error: FileError) -> Self {
        SyscallError::File(error)
    }
}

impl From<UserAccessError> for SyscallError {
    fn from(error: UserAccessError) -> Self {
        SyscallError::UserAccess(error)
    }
}

impl From<FsError> for SyscallError {
    fn from(error: FsError) -> Self {
        SyscallError::Fs(error)
    }
}

/// Everything the platform layer needs to start a new process.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Launch {
    /// Where the context calling `enter_user_mode` is saved. It is resumed, with the exit status as the return
    /// value, when the new process halts.
    pub context: *mut SavedContext,
    pub entry_point: VAddr,
    pub user_stack: VAddr,
}

/// What should happen when the kernel is done handling a system call or exception.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Transition {
    /// Return to the caller with this value in `eax`.
    Return(i32),
    /// The call can't complete yet. Wait for an interrupt with interrupts enabled, then make it again.
    Block,
    /// Drop into a new process. The call returns when it halts.
    Launch(Launch),
    /// The calling process is gone. Resume the kernel context that launched it, returning `value`.
    Resume { context: SavedContext, value: u32 },
}

impl<P> KernelState<P>
where
    P: Platform,
{
    pub fn dispatch(&mut self, number: u32, a: u32, b: u32, c: u32) -> Transition {
        let slot = match self.current_slot() {
            Some(slot) => slot,
            None => {
                warn!("System call {} made with no process running", number);
                return Transition::Return(-1);
            }
        };

        let result = match number {
            SYSCALL_HALT => self.halt(ExitStatus::Code(a as u8)).map_err(SyscallError::from),
            SYSCALL_EXECUTE => self.execute(slot, UserString::new(a)).map(Transition::Launch),
            SYSCALL_READ => length(c).and_then(|length| self.read(slot, a as i32, UserSlice::new(b, length))).map(
                |poll| match poll {
                    Poll::Ready(count) => Transition::Return(count as i32),
                    Poll::Pending => Transition::Block,
                },
            ),
            SYSCALL_WRITE => length(c)
                .and_then(|length| self.write(slot, a as i32, UserSlice::new(b, length)))
                .map(|count| Transition::Return(count as i32)),
            SYSCALL_OPEN => self.open(slot, UserString::new(a)).map(|descriptor| Transition::Return(descriptor as i32)),
            SYSCALL_CLOSE => self.close(slot, a as i32).map(|()| Transition::Return(0)),
            SYSCALL_GETARGS => length(b).and_then(|length| self.getargs(slot, UserSlice::new(a, length))).map(|()| Transition::Return(0)),
            SYSCALL_VIDMAP => self.vidmap(slot, a).map(|()| Transition::Return(0)),
            SYSCALL_SET_HANDLER | SYSCALL_SIGRETURN => Err(SyscallError::Unsupported),
            _ => Err(SyscallError::UnknownSyscall(number)),
        };

        match result {
            Ok(transition) => transition,
            Err(err @ (SyscallError::UnknownSyscall(_) | SyscallError::Halt(_))) => {
                warn!("System call {} from slot {} rejected: {:?}", number, slot.index(), err);
                Transition::Return(-1)
            }
            Err(err) => {
                trace!("System call {} from slot {} failed: {:?}", number, slot.index(), err);
                Transition::Return(-1)
            }
        }
    }

    fn execute(&mut self, caller: ProcessSlot, command: UserString) -> Result<Launch, SyscallError> {
        let mut buffer = [0u8; LINE_BUFFER_SIZE];
        let command = command.read(&self.address_space, &self.platform, &mut buffer)?;
        let terminal = self.processes.get(caller).ok_or(HaltError::NotRunning)?.terminal;
        Ok(self.spawn(command, terminal, Some(caller))?)
    }

    /// Start `terminal`'s root shell. Each terminal has exactly one root shell at a time, so this fails if it
    /// already has a process running.
    pub fn launch_root_shell(&mut self, terminal: TerminalId) -> Result<Launch, ExecuteError> {
        if self.terminals.get(terminal).active.is_some() {
            return Err(ExecuteError::TerminalBusy);
        }
        self.spawn(ROOT_SHELL, terminal, None)
    }

    fn spawn(&mut self, command: &[u8], terminal: TerminalId, parent: Option<ProcessSlot>) -> Result<Launch, ExecuteError> {
        let (name, arguments) = split_command(command);

        let file = self.platform.file_system().resolve(name).ok_or(ExecuteError::NotFound)?;
        if file.file_type != FileType::Regular {
            return Err(ExecuteError::NotExecutable);
        }

        let mut header = [0u8; image::HEADER_LENGTH];
        let header_length =
            self.platform.file_system().read(file.inode, 0, &mut header).map_err(|_| ExecuteError::ReadFailed)?;
        let entry_point = image::entry_point(&header[..header_length])?;
        let image_length = self.platform.file_system().length(file.inode).map_err(|_| ExecuteError::ReadFailed)?;
        if image_length > layout::MAX_IMAGE_SIZE {
            return Err(ExecuteError::ImageTooLarge);
        }
        if !image::entry_within_image(entry_point, image_length) {
            return Err(ExecuteError::NotExecutable);
        }

        let slot = self.processes.allocate_slot().ok_or(ExecuteError::TooManyProcesses)?;
        self.address_space.map_program_image(slot, &mut self.platform);
        if let Err(err) = self.load_image(file.inode, image_length) {
            warn!("Failed to load image into slot {}: {:?}", slot.index(), err);
            self.processes.release_slot(slot);
            if let Some(current) = self.current_slot() {
                self.address_space.map_program_image(current, &mut self.platform);
            }
            return Err(ExecuteError::ReadFailed);
        }

        self.processes.create(slot, parent, terminal, file.inode, image_length, Arguments::new(arguments));
        self.terminals.get_mut(terminal).active = Some(slot);
        self.install_process(slot);

        info!(
            "Executing '{}' in slot {} on terminal {} (parent: {:?})",
            core::str::from_utf8(name).unwrap_or("<invalid utf-8>"),
            slot.index(),
            terminal.number(),
            parent.map(ProcessSlot::index)
        );

        let pcb = self.processes.get_mut(slot).ok_or(ExecuteError::TooManyProcesses)?;
        Ok(Launch {
            context: &mut pcb.execute_context as *mut SavedContext,
            entry_point,
            user_stack: layout::USER_STACK_TOP,
        })
    }

    /// Copy an image into the program window, which must already be mapped to the new process's region.
    fn load_image(&mut self, inode: u32, length: usize) -> Result<(), SyscallError> {
        let mut chunk = [0u8; 512];
        let mut done = 0;
        while done < length {
            let want = usize::min(chunk.len(), length - done);
            let count = self.platform.file_system().read(inode, done, &mut chunk[..want])?;
            if count == 0 {
                return Err(FsError::OutOfBounds.into());
            }

            UserSlice::new(u32::from(layout::PROGRAM_IMAGE_ADDRESS) + done as u32, count).write(
                &self.address_space,
                &mut self.platform,
                &chunk[..count],
            )?;
            done += count;
        }
        Ok(())
    }

    /// Tear down the running process and work out where to resume. A child resumes its parent's `execute`
    /// call with `status`; a root shell resumes its terminal's launcher, which starts a fresh one.
    pub fn halt(&mut self, status: ExitStatus) -> Result<Transition, HaltError> {
        let slot = self.current_slot().ok_or(HaltError::NotRunning)?;
        if !self.processes.is_live(slot) {
            return Err(HaltError::NotRunning);
        }

        if self.address_space.user_video_mapped() {
            self.address_space.unmap_user_video(&mut self.platform);
        }

        let mut pcb = self.processes.destroy(slot, &mut self.platform).ok_or(HaltError::NotRunning)?;
        pcb.halt_status = Some(status);
        info!("Process in slot {} halted with status {:?}", slot.index(), status);

        match pcb.parent {
            Some(parent) => {
                self.terminals.get_mut(pcb.terminal).active = Some(parent);
                self.install_process(parent);
            }
            None => {
                info!("Root shell of terminal {} exited. Starting another.", pcb.terminal.number());
                self.terminals.get_mut(pcb.terminal).active = None;
            }
        }

        Ok(Transition::Resume { context: pcb.execute_context, value: status.value() })
    }

    /// The running process caused an exception. It's reported on its terminal and halted; the kernel itself
    /// faulting is fatal.
    pub fn handle_exception(&mut self, vector: u8) -> Transition {
        let name = exception_name(vector);
        let (slot, terminal) = match self.current_pcb() {
            Some(pcb) => (pcb.slot, pcb.terminal),
            None => panic!("Exception in kernel with no process running: {} ({})", name, vector),
        };

        error!("Process in slot {} caused exception: {} ({})", slot.index(), name, vector);
        self.terminal_write(terminal, b"Exception: ");
        self.terminal_write(terminal, name.as_bytes());
        self.terminal_write(terminal, b"\n");

        match self.halt(ExitStatus::Exception) {
            Ok(transition) => transition,
            Err(err) => panic!("Failed to halt faulting process: {:?}", err),
        }
    }

    fn getargs(&mut self, slot: ProcessSlot, buffer: UserSlice) -> Result<(), SyscallError> {
        let arguments = self.processes.get(slot).ok_or(HaltError::NotRunning)?.arguments;
        if arguments.is_empty() {
            return Err(SyscallError::NoArguments);
        }
        if arguments.as_bytes().len() + 1 > buffer.len() {
            return Err(FileError::InvalidArgument.into());
        }

        let mut terminated = [0u8; LINE_BUFFER_SIZE + 1];
        let length = arguments.as_bytes().len();
        terminated[..length].copy_from_slice(arguments.as_bytes());
        buffer.write(&self.address_space, &mut self.platform, &terminated[..=length])?;
        Ok(())
    }

    fn vidmap(&mut self, slot: ProcessSlot, out: u32) -> Result<(), SyscallError> {
        let window_start = u32::from(layout::PROGRAM_WINDOW);
        let window_end = window_start + layout::PROGRAM_WINDOW_SIZE as u32;
        if out < window_start || out > window_end - 4 {
            return Err(UserAccessError::NotMapped.into());
        }

        UserSlice::new(out, 4).write(
            &self.address_space,
            &mut self.platform,
            &u32::from(layout::USER_VIDEO).to_le_bytes(),
        )?;

        self.processes.get_mut(slot).ok_or(HaltError::NotRunning)?.user_video = true;
        self.sync_video_mappings();
        Ok(())
    }
}

/// Lengths are signed in the system-call interface; negative ones are rejected.
fn length(raw: u32) -> Result<usize, SyscallError> {
    usize::try_from(raw as i32).map_err(|_| SyscallError::File(FileError::InvalidArgument))
}

/// Split a command line into the program name and its argument string, dropping the spaces around each.
fn split_command(command: &[u8]) -> (&[u8], &[u8]) {
    let command = trim_spaces(command);
    match command.iter().position(|&c| c == b' ') {
        Some(space) => (&command[..space], trim_spaces(&command[(space + 1)..])),
        None => (command, &[]),
    }
}

fn trim_spaces(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&c| c != b' ').unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|&c| c != b' ').map_or(start, |last| last + 1);
    &bytes[start..end]
}

pub fn exception_name(vector: u8) -> &'static str {
    match vector {
        0 => "Divide Error",
        1 => "Debug",
        2 => "Non-Maskable Interrupt",
        3 => "Breakpoint",
        4 => "Overflow",
        5 => "BOUND Range Exceeded",
        6 => "Invalid Opcode",
        7 => "Device Not Available",
        8 => "Double Fault",
        9 => "Coprocessor Segment Overrun",
        10 => "Invalid TSS",
        11 => "Segment Not Present",
        12 => "Stack-Segment Fault",
        13 => "General Protection Fault",
        14 => "Page Fault",
        16 => "x87 Floating-Point Exception",
        17 => "Alignment Check",
        18 => "Machine Check",
        19 => "SIMD Floating-Point Exception",
        _ => "Reserved",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        memory::Access,
        mock::{boot_to_round_robin, booted_kernel, launch_root_shell, launcher_eip, read_user, write_user, ENTRY_POINT},
        process::MAX_PROCESSES,
    };

    const SCRATCH: u32 = 0x083f_0000;
    const ARGUMENTS: u32 = 0x083f_1000;

    fn slot(index: usize) -> ProcessSlot {
        ProcessSlot::new(index).unwrap()
    }

    fn terminal(number: usize) -> TerminalId {
        TerminalId::new(number).unwrap()
    }

    /// Have the running process execute `command`, pretending to be `enter_user_mode` if it succeeds.
    fn execute(kernel: &mut KernelState<crate::mock::MockPlatform>, command: &[u8], marker: u32) -> Transition {
        let mut terminated = command.to_vec();
        terminated.push(0);
        write_user(kernel, SCRATCH, &terminated);

        let transition = kernel.dispatch(SYSCALL_EXECUTE, SCRATCH, 0, 0);
        if let Transition::Launch(launch) = transition {
            unsafe {
                *launch.context = SavedContext { eip: marker, ..SavedContext::default() };
            }
        }
        transition
    }

    #[test]
    fn splitting_commands() {
        assert_eq!(split_command(b"ls"), (&b"ls"[..], &b""[..]));
        assert_eq!(split_command(b"  cat   frame0.txt  "), (&b"cat"[..], &b"frame0.txt"[..]));
        assert_eq!(split_command(b"grep a b"), (&b"grep"[..], &b"a b"[..]));
        assert_eq!(split_command(b"   "), (&b""[..], &b""[..]));
    }

    #[test]
    fn executing_nonexistent_program() {
        let mut kernel = boot_to_round_robin();
        assert_eq!(execute(&mut kernel, b"nonexistent", 0), Transition::Return(-1));
        assert_eq!(execute(&mut kernel, b"", 0), Transition::Return(-1));

        assert_eq!(kernel.processes.live_count(), 3);
        assert_eq!(kernel.current_slot(), Some(slot(0)));
        assert_eq!(kernel.address_space.mapped_program_slot(), Some(slot(0)));
    }

    #[test]
    fn executing_things_that_are_not_programs() {
        let mut kernel = boot_to_round_robin();
        for name in [&b"notes.txt"[..], b"frame0.txt", b"rtc", b"."] {
            assert_eq!(execute(&mut kernel, name, 0), Transition::Return(-1));
            assert_eq!(kernel.processes.live_count(), 3);
            assert_eq!(kernel.address_space.mapped_program_slot(), Some(slot(0)));
        }
    }

    #[test]
    fn child_exit_status_reaches_parent() {
        let mut kernel = boot_to_round_robin();
        let launch = match execute(&mut kernel, b"testprint", 0x1234) {
            Transition::Launch(launch) => launch,
            other => panic!("Expected launch, got {:?}", other),
        };
        assert_eq!(launch.entry_point, VAddr::new(ENTRY_POINT as usize));
        assert_eq!(launch.user_stack, VAddr::new(0x0840_0000));

        // The child takes the lowest free slot, and it's what runs on terminal 1 now
        assert_eq!(kernel.current_slot(), Some(slot(3)));
        assert_eq!(kernel.current_pcb().unwrap().parent, Some(slot(0)));
        assert_eq!(kernel.current_pcb().unwrap().terminal, terminal(1));
        assert_eq!(kernel.address_space.mapped_program_slot(), Some(slot(3)));
        assert_eq!(kernel.platform.kernel_stack, Some(slot(3).kernel_stack().top));
        assert_eq!(read_user(&kernel, 0x0804_8000, 4), b"\x7fELF");
        assert_eq!(read_user(&kernel, 0x0804_8000 + 28, 14), b"testprint body");

        match kernel.dispatch(SYSCALL_HALT, 42, 0, 0) {
            Transition::Resume { context, value } => {
                assert_eq!(value, 42);
                assert_eq!(context.eip, 0x1234);
            }
            other => panic!("Expected resume, got {:?}", other),
        }
        assert_eq!(kernel.current_slot(), Some(slot(0)));
        assert_eq!(kernel.address_space.mapped_program_slot(), Some(slot(0)));
        assert_eq!(kernel.platform.kernel_stack, Some(slot(0).kernel_stack().top));
        assert_eq!(kernel.processes.live_count(), 3);
    }

    #[test]
    fn halt_status_is_truncated_to_a_byte() {
        let mut kernel = boot_to_round_robin();
        execute(&mut kernel, b"testprint", 0);
        assert!(matches!(kernel.dispatch(SYSCALL_HALT, 0x1ff, 0, 0), Transition::Resume { value: 0xff, .. }));
    }

    #[test]
    fn root_shell_is_replaced_exactly_once() {
        let mut kernel = boot_to_round_robin();

        match kernel.dispatch(SYSCALL_HALT, 0, 0, 0) {
            Transition::Resume { context, value } => {
                assert_eq!(value, 0);
                assert_eq!(context.eip, launcher_eip(terminal(1)));
            }
            other => panic!("Expected resume, got {:?}", other),
        }
        assert_eq!(kernel.terminals.get(terminal(1)).active, None);
        assert_eq!(kernel.processes.live_count(), 2);
        assert!(!kernel.address_space.user_video_mapped());

        launch_root_shell(&mut kernel, terminal(1));
        assert_eq!(kernel.launch_root_shell(terminal(1)), Err(ExecuteError::TerminalBusy));

        let roots = kernel.processes.iter().filter(|pcb| pcb.terminal == terminal(1) && pcb.parent.is_none()).count();
        assert_eq!(roots, 1);
        assert_eq!(kernel.current_slot(), Some(slot(0)));
        assert_eq!(kernel.address_space.mapped_program_slot(), Some(slot(0)));
    }

    #[test]
    fn process_limit() {
        let mut kernel = boot_to_round_robin();
        for expected in 3..MAX_PROCESSES {
            assert!(matches!(execute(&mut kernel, b"counter", 0), Transition::Launch(_)));
            assert_eq!(kernel.current_slot(), Some(slot(expected)));
        }

        assert_eq!(execute(&mut kernel, b"counter", 0), Transition::Return(-1));
        assert_eq!(kernel.processes.live_count(), MAX_PROCESSES);
        assert_eq!(kernel.current_slot(), Some(slot(5)));
        assert_eq!(kernel.address_space.mapped_program_slot(), Some(slot(5)));
    }

    #[test]
    fn slots_stay_unique_through_execute_and_halt() {
        let mut kernel = boot_to_round_robin();
        let mut seed = 0xdead_beefu32;

        for _ in 0..300 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
            if (seed >> 16) % 2 == 0 {
                execute(&mut kernel, b"counter", 0);
            } else if kernel.current_pcb().unwrap().parent.is_some() {
                kernel.dispatch(SYSCALL_HALT, 1, 0, 0);
            }

            let mut seen = [false; MAX_PROCESSES];
            for pcb in kernel.processes.iter() {
                assert!(!seen[pcb.slot.index()]);
                seen[pcb.slot.index()] = true;
                assert!(kernel.processes.is_live(pcb.slot));
            }
            assert_eq!(kernel.processes.live_count(), seen.iter().filter(|&&live| live).count());
            assert_eq!(kernel.address_space.mapped_program_slot(), kernel.current_slot());
        }
    }

    #[test]
    fn arguments() {
        let mut kernel = boot_to_round_robin();
        assert_eq!(kernel.dispatch(SYSCALL_GETARGS, ARGUMENTS, 64, 0), Transition::Return(-1));

        execute(&mut kernel, b"testprint   frame0.txt  ", 0);
        assert_eq!(kernel.dispatch(SYSCALL_GETARGS, ARGUMENTS, 10, 0), Transition::Return(-1));
        assert_eq!(kernel.dispatch(SYSCALL_GETARGS, ARGUMENTS, 11, 0), Transition::Return(0));
        assert_eq!(read_user(&kernel, ARGUMENTS, 11), b"frame0.txt\0");
        assert_eq!(kernel.dispatch(SYSCALL_GETARGS, 0x0040_0000, 64, 0), Transition::Return(-1));
        assert_eq!(kernel.dispatch(SYSCALL_GETARGS, ARGUMENTS, u32::MAX, 0), Transition::Return(-1));
    }

    #[test]
    fn vidmap_then_halt() {
        let mut kernel = boot_to_round_robin();
        execute(&mut kernel, b"counter", 0);

        assert_eq!(kernel.dispatch(SYSCALL_VIDMAP, SCRATCH, 0, 0), Transition::Return(0));
        assert_eq!(read_user(&kernel, SCRATCH, 4), 0x0882_2000u32.to_le_bytes());
        assert!(kernel.address_space.user_video_mapped());
        assert_eq!(
            kernel.address_space.translate(layout::USER_VIDEO, Access::UserWrite).unwrap().phys,
            layout::VIDEO_MEMORY
        );

        kernel.dispatch(SYSCALL_HALT, 0, 0, 0);
        assert!(!kernel.address_space.user_video_mapped());
        assert_eq!(kernel.address_space.translate(layout::USER_VIDEO, Access::UserRead), None);
    }

    #[test]
    fn vidmap_rejects_pointers_outside_program() {
        let mut kernel = boot_to_round_robin();
        for pointer in [0, 0x0040_0000, 0x07ff_fffc, 0x083f_fffe, 0x0840_0000, 0x0882_2000] {
            assert_eq!(kernel.dispatch(SYSCALL_VIDMAP, pointer, 0, 0), Transition::Return(-1));
        }
        assert!(!kernel.address_space.user_video_mapped());
    }

    #[test]
    fn user_video_follows_the_screen() {
        let mut kernel = boot_to_round_robin();
        kernel.dispatch(SYSCALL_VIDMAP, SCRATCH, 0, 0);

        kernel.switch_visible_terminal(terminal(2));
        assert_eq!(
            kernel.address_space.translate(layout::USER_VIDEO, Access::UserWrite).unwrap().phys,
            layout::background_buffer(terminal(1))
        );

        // Terminal 2's shell never asked for video, so the page goes away while it runs
        while kernel.running_terminal() != Some(terminal(2)) {
            kernel.timer_tick();
        }
        assert!(!kernel.address_space.user_video_mapped());

        while kernel.running_terminal() != Some(terminal(1)) {
            kernel.timer_tick();
        }
        assert_eq!(
            kernel.address_space.translate(layout::USER_VIDEO, Access::UserWrite).unwrap().phys,
            layout::background_buffer(terminal(1))
        );
    }

    #[test]
    fn exceptions_halt_the_process() {
        let mut kernel = boot_to_round_robin();
        execute(&mut kernel, b"counter", 0x5678);

        match kernel.handle_exception(14) {
            Transition::Resume { context, value } => {
                assert_eq!(value, 256);
                assert_eq!(context.eip, 0x5678);
            }
            other => panic!("Expected resume, got {:?}", other),
        }
        assert_eq!(kernel.current_slot(), Some(slot(0)));

        let screen = kernel.platform.read_physical(layout::VIDEO_MEMORY, 80 * 2);
        let text: Vec<u8> = screen.chunks(2).map(|pair| pair[0]).collect();
        assert!(text.starts_with(b"Exception: Page Fault"));
    }

    #[test]
    fn exception_in_root_shell_restarts_it() {
        let mut kernel = boot_to_round_robin();
        match kernel.handle_exception(0) {
            Transition::Resume { context, value } => {
                assert_eq!(value, 256);
                assert_eq!(context.eip, launcher_eip(terminal(1)));
            }
            other => panic!("Expected resume, got {:?}", other),
        }
        assert_eq!(kernel.terminals.get(terminal(1)).active, None);
        launch_root_shell(&mut kernel, terminal(1));
    }

    #[test]
    #[should_panic]
    fn exception_without_process_is_fatal() {
        let mut kernel = booted_kernel();
        kernel.handle_exception(13);
    }

    #[test]
    fn unsupported_calls() {
        let mut kernel = boot_to_round_robin();
        assert_eq!(kernel.dispatch(SYSCALL_SET_HANDLER, 0, 0, 0), Transition::Return(-1));
        assert_eq!(kernel.dispatch(SYSCALL_SIGRETURN, 0, 0, 0), Transition::Return(-1));
        assert_eq!(kernel.dispatch(0, 0, 0, 0), Transition::Return(-1));
        assert_eq!(kernel.dispatch(99, 0, 0, 0), Transition::Return(-1));
    }

    #[test]
    fn calls_without_a_process() {
        let mut kernel = booted_kernel();
        assert_eq!(kernel.dispatch(SYSCALL_HALT, 0, 0, 0), Transition::Return(-1));
        assert_eq!(kernel.halt(ExitStatus::Code(0)), Err(HaltError::NotRunning));
    }
}
