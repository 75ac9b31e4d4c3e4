/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

//! There are three terminal sessions, each with its own screen, cursor, and line buffer. Exactly one is visible
//! at a time and owns the physical display and the keyboard; the others draw into their background buffers.

use crate::{memory::Mapping, process::ProcessSlot, Platform};
use tracing::info;

pub const NUM_TERMINALS: usize = 3;
/// Including the `\n` that ends a line, so at most 127 characters can be typed.
pub const LINE_BUFFER_SIZE: usize = 128;

pub const COLUMNS: usize = 80;
pub const ROWS: usize = 25;
const ATTRIBUTE: u8 = 0x07;
const BLANK: [u8; 2] = [b' ', ATTRIBUTE];

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct TerminalId(u8);

impl TerminalId {
    pub const FIRST: TerminalId = TerminalId(1);

    /// Terminals are numbered from 1.
    pub const fn new(number: usize) -> Option<TerminalId> {
        if number >= 1 && number <= NUM_TERMINALS {
            Some(TerminalId(number as u8))
        } else {
            None
        }
    }

    pub const fn number(self) -> usize {
        self.0 as usize
    }

    pub const fn index(self) -> usize {
        self.0 as usize - 1
    }

    pub fn all() -> impl Iterator<Item = TerminalId> {
        (1..=NUM_TERMINALS).map(|number| TerminalId(number as u8))
    }
}

/// A key press, after the platform has decoded the scancode and applied the modifiers.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Key {
    Char(u8),
    Backspace,
    Enter,
    /// `CTRL+L`
    Clear,
    /// `ALT+F1` to `ALT+F3`
    SwitchTerminal(TerminalId),
}

pub struct TerminalSession {
    pub id: TerminalId,
    /// The process running in this terminal, which is the deepest descendant of its root shell.
    pub active: Option<ProcessSlot>,
    pub cursor_x: usize,
    pub cursor_y: usize,
    line: [u8; LINE_BUFFER_SIZE],
    line_length: usize,
    line_ready: bool,
}

impl TerminalSession {
    pub const fn new(id: TerminalId) -> TerminalSession {
        TerminalSession {
            id,
            active: None,
            cursor_x: 0,
            cursor_y: 0,
            line: [0; LINE_BUFFER_SIZE],
            line_length: 0,
            line_ready: false,
        }
    }

    /// Add a typed character to the line. Returns whether it was accepted, which it isn't if the line is full or
    /// a finished line is waiting to be read.
    pub fn push_char(&mut self, c: u8) -> bool {
        if self.line_ready || self.line_length >= LINE_BUFFER_SIZE - 1 {
            return false;
        }
        self.line[self.line_length] = c;
        self.line_length += 1;
        true
    }

    pub fn pop_char(&mut self) -> bool {
        if self.line_ready || self.line_length == 0 {
            return false;
        }
        self.line_length -= 1;
        true
    }

    pub fn complete_line(&mut self) -> bool {
        if self.line_ready {
            return false;
        }
        self.line[self.line_length] = b'\n';
        self.line_length += 1;
        self.line_ready = true;
        true
    }

    pub fn line_ready(&self) -> bool {
        self.line_ready
    }

    /// The characters typed so far on the current line.
    pub fn pending_line(&self) -> &[u8] {
        &self.line[..self.line_length]
    }

    /// If a line has been finished, copy as much of it as fits into `buffer` and empty the line buffer. Anything
    /// that didn't fit is dropped.
    pub fn take_line(&mut self, buffer: &mut [u8]) -> Option<usize> {
        if !self.line_ready {
            return None;
        }

        let count = usize::min(self.line_length, buffer.len());
        buffer[..count].copy_from_slice(&self.line[..count]);
        self.line_length = 0;
        self.line_ready = false;
        Some(count)
    }

    /*
     * Rendering. `screen` is the kernel's mapping of the start of whichever page holds this terminal's screen.
     */

    pub fn write<P: Platform>(&mut self, platform: &mut P, screen: Mapping, bytes: &[u8]) {
        for &byte in bytes {
            self.put_byte(platform, screen, byte);
        }
    }

    fn put_byte<P: Platform>(&mut self, platform: &mut P, screen: Mapping, byte: u8) {
        match byte {
            b'\n' | b'\r' => self.new_line(platform, screen),
            b'\0' => (),
            _ => {
                unsafe {
                    platform.write_memory(cell(screen, self.cursor_x, self.cursor_y), &[byte, ATTRIBUTE]);
                }
                self.cursor_x += 1;
                if self.cursor_x == COLUMNS {
                    self.new_line(platform, screen);
                }
            }
        }
    }

    fn new_line<P: Platform>(&mut self, platform: &mut P, screen: Mapping) {
        self.cursor_x = 0;
        if self.cursor_y + 1 < ROWS {
            self.cursor_y += 1;
            return;
        }

        let mut row = [0u8; COLUMNS * 2];
        for y in 1..ROWS {
            unsafe {
                platform.read_memory(cell(screen, 0, y), &mut row);
                platform.write_memory(cell(screen, 0, y - 1), &row);
            }
        }
        blank_row(platform, screen, ROWS - 1);
    }

    /// Erase the character before the cursor, moving back onto the previous row if needed.
    pub fn erase<P: Platform>(&mut self, platform: &mut P, screen: Mapping) {
        if self.cursor_x > 0 {
            self.cursor_x -= 1;
        } else if self.cursor_y > 0 {
            self.cursor_y -= 1;
            self.cursor_x = COLUMNS - 1;
        } else {
            return;
        }
        unsafe {
            platform.write_memory(cell(screen, self.cursor_x, self.cursor_y), &BLANK);
        }
    }

    pub fn clear<P: Platform>(&mut self, platform: &mut P, screen: Mapping) {
        for y in 0..ROWS {
            blank_row(platform, screen, y);
        }
        self.cursor_x = 0;
        self.cursor_y = 0;
    }
}

fn cell(screen: Mapping, x: usize, y: usize) -> Mapping {
    screen.offset((y * COLUMNS + x) * 2)
}

fn blank_row<P: Platform>(platform: &mut P, screen: Mapping, y: usize) {
    let mut row = [0u8; COLUMNS * 2];
    for pair in row.chunks_exact_mut(2) {
        pair.copy_from_slice(&BLANK);
    }
    unsafe {
        platform.write_memory(cell(screen, 0, y), &row);
    }
}

pub struct Terminals {
    sessions: [TerminalSession; NUM_TERMINALS],
    visible: TerminalId,
}

impl Terminals {
    pub const fn new() -> Terminals {
        Terminals {
            sessions: [
                TerminalSession::new(TerminalId(1)),
                TerminalSession::new(TerminalId(2)),
                TerminalSession::new(TerminalId(3)),
            ],
            visible: TerminalId::FIRST,
        }
    }

    pub fn visible(&self) -> TerminalId {
        self.visible
    }

    pub fn get(&self, id: TerminalId) -> &TerminalSession {
        &self.sessions[id.index()]
    }

    pub fn get_mut(&mut self, id: TerminalId) -> &mut TerminalSession {
        &mut self.sessions[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &TerminalSession> {
        self.sessions.iter()
    }
}

impl<P> crate::KernelState<P>
where
    P: Platform,
{
    /// Where the kernel should draw `terminal`'s screen right now.
    pub fn screen_of(&self, terminal: TerminalId) -> Mapping {
        self.address_space.kernel_view(self.video_target(terminal))
    }

    /// Draw `bytes` on `terminal`'s screen, moving the hardware cursor along if it's the visible one.
    pub fn terminal_write(&mut self, terminal: TerminalId, bytes: &[u8]) {
        let screen = self.screen_of(terminal);
        let session = self.terminals.get_mut(terminal);
        session.write(&mut self.platform, screen, bytes);
        self.update_cursor(terminal);
    }

    fn update_cursor(&mut self, terminal: TerminalId) {
        if terminal == self.terminals.visible() {
            let session = self.terminals.get(terminal);
            self.platform.set_cursor(session.cursor_x, session.cursor_y);
        }
    }

    /// Handle a decoded key press. Typing always goes to the visible terminal, whichever process is running.
    pub fn handle_key(&mut self, key: Key) {
        let visible = self.terminals.visible();
        let screen = self.screen_of(visible);
        let session = self.terminals.get_mut(visible);

        match key {
            Key::Char(c) => {
                if session.push_char(c) {
                    session.write(&mut self.platform, screen, &[c]);
                }
            }
            Key::Backspace => {
                if session.pop_char() {
                    session.erase(&mut self.platform, screen);
                }
            }
            Key::Enter => {
                if session.complete_line() {
                    session.write(&mut self.platform, screen, b"\n");
                }
            }
            Key::Clear => {
                session.clear(&mut self.platform, screen);
                let mut pending = [0u8; LINE_BUFFER_SIZE];
                let length = session.pending_line().len();
                pending[..length].copy_from_slice(session.pending_line());
                session.write(&mut self.platform, screen, &pending[..length]);
            }
            Key::SwitchTerminal(target) => return self.switch_visible_terminal(target),
        }

        self.update_cursor(visible);
    }

    /// Show `target` on the physical display. Its background buffer is copied in, and the screen being hidden
    /// is saved to its own buffer, before the mappings of the running process are brought up to date.
    pub fn switch_visible_terminal(&mut self, target: TerminalId) {
        let leaving = self.terminals.visible();
        if leaving == target {
            return;
        }

        info!("Switching visible terminal from {} to {}", leaving.number(), target.number());
        self.address_space.swap_video_buffers(
            crate::memory::layout::background_buffer(leaving),
            crate::memory::layout::background_buffer(target),
            &mut self.platform,
        );
        self.terminals.visible = target;
        self.sync_video_mappings();
        self.update_cursor(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        memory::layout::{background_buffer, VIDEO_MEMORY},
        mock::{booted_kernel, MockPlatform},
        KernelState,
    };
    use hal::memory::PAddr;

    fn terminal(number: usize) -> TerminalId {
        TerminalId::new(number).unwrap()
    }

    fn screen_text(kernel: &KernelState<MockPlatform>, screen: PAddr, row: usize) -> Vec<u8> {
        kernel.platform.read_physical(screen + row * COLUMNS * 2, COLUMNS * 2).chunks(2).map(|pair| pair[0]).collect()
    }

    #[test]
    fn terminal_ids() {
        assert_eq!(TerminalId::new(0), None);
        assert_eq!(TerminalId::new(4), None);
        assert_eq!(TerminalId::new(3).unwrap().index(), 2);
        assert_eq!(TerminalId::all().map(TerminalId::number).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn line_discipline() {
        let mut session = TerminalSession::new(TerminalId::FIRST);
        let mut buffer = [0u8; 16];
        assert_eq!(session.take_line(&mut buffer), None);

        for &c in b"lsx" {
            assert!(session.push_char(c));
        }
        assert!(session.pop_char());
        assert!(session.complete_line());
        assert!(!session.push_char(b'y'));
        assert_eq!(session.take_line(&mut buffer), Some(3));
        assert_eq!(&buffer[..3], b"ls\n");
        assert_eq!(session.take_line(&mut buffer), None);
        assert!(!session.pop_char());
    }

    #[test]
    fn line_holds_127_characters() {
        let mut session = TerminalSession::new(TerminalId::FIRST);
        for _ in 0..127 {
            assert!(session.push_char(b'a'));
        }
        assert!(!session.push_char(b'a'));
        assert!(session.complete_line());

        let mut buffer = [0u8; 200];
        assert_eq!(session.take_line(&mut buffer), Some(128));
        assert_eq!(buffer[127], b'\n');
    }

    #[test]
    fn short_reads_truncate_line() {
        let mut session = TerminalSession::new(TerminalId::FIRST);
        for &c in b"hello" {
            session.push_char(c);
        }
        session.complete_line();

        let mut buffer = [0u8; 3];
        assert_eq!(session.take_line(&mut buffer), Some(3));
        assert_eq!(&buffer, b"hel");
        assert!(!session.line_ready());
    }

    #[test]
    fn screens_are_left_alone_until_paging_is_on() {
        let mut kernel = Box::new(KernelState::new(MockPlatform::new()));
        kernel.platform.fill_physical(VIDEO_MEMORY, COLUMNS * ROWS * 2, b'#');
        kernel.platform.cursor = (12, 7);

        kernel.initialize();
        assert!(kernel.platform.read_physical(VIDEO_MEMORY, COLUMNS * ROWS * 2).iter().all(|&byte| byte == b'#'));
        assert_eq!(kernel.platform.cursor, (12, 7));

        kernel.clear_screens();
        for screen in [VIDEO_MEMORY].into_iter().chain(TerminalId::all().map(background_buffer)) {
            let contents = kernel.platform.read_physical(screen, COLUMNS * ROWS * 2);
            assert!(contents.chunks(2).all(|pair| pair == BLANK), "screen at {:?} isn't blank", screen);
        }
        assert_eq!(kernel.platform.cursor, (0, 0));
    }

    #[test]
    fn typing_echoes_to_visible_screen() {
        let mut kernel = booted_kernel();
        for &c in b"hi" {
            kernel.handle_key(Key::Char(c));
        }
        kernel.handle_key(Key::Backspace);
        kernel.handle_key(Key::Char(b'o'));

        assert_eq!(&screen_text(&kernel, VIDEO_MEMORY, 0)[..3], b"ho ");
        assert_eq!(kernel.platform.cursor, (2, 0));

        kernel.handle_key(Key::Enter);
        assert_eq!(kernel.platform.cursor, (0, 1));
        assert!(kernel.terminals.get(terminal(1)).line_ready());
    }

    #[test]
    fn wrapping_and_scrolling() {
        let mut kernel = booted_kernel();
        let mut text = vec![b'x'; COLUMNS];
        text.extend_from_slice(b"yz");
        kernel.terminal_write(terminal(1), &text);
        assert_eq!(kernel.platform.cursor, (2, 1));
        assert_eq!(&screen_text(&kernel, VIDEO_MEMORY, 1)[..2], b"yz");

        for _ in 0..ROWS - 1 {
            kernel.terminal_write(terminal(1), b"\n");
        }
        assert_eq!(kernel.platform.cursor, (0, ROWS - 1));
        assert_eq!(&screen_text(&kernel, VIDEO_MEMORY, 0)[..2], b"yz");
        assert!(screen_text(&kernel, VIDEO_MEMORY, ROWS - 1).iter().all(|&c| c == b' '));
    }

    #[test]
    fn background_terminals_draw_to_their_buffers() {
        let mut kernel = booted_kernel();
        let cursor = kernel.platform.cursor;
        kernel.terminal_write(terminal(2), b"two");

        assert_eq!(&screen_text(&kernel, background_buffer(terminal(2)), 0)[..3], b"two");
        assert_eq!(&screen_text(&kernel, VIDEO_MEMORY, 0)[..3], b"   ");
        assert_eq!(kernel.platform.cursor, cursor);
    }

    #[test]
    fn switching_swaps_screens() {
        let mut kernel = booted_kernel();
        kernel.terminal_write(terminal(1), b"one");
        kernel.terminal_write(terminal(2), b"two!");

        kernel.handle_key(Key::SwitchTerminal(terminal(2)));
        assert_eq!(kernel.terminals.visible(), terminal(2));
        assert_eq!(&screen_text(&kernel, VIDEO_MEMORY, 0)[..4], b"two!");
        assert_eq!(&screen_text(&kernel, background_buffer(terminal(1)), 0)[..3], b"one");
        assert_eq!(kernel.platform.cursor, (4, 0));

        // Typing now goes to terminal 2
        kernel.handle_key(Key::Char(b'k'));
        assert!(kernel.terminals.get(terminal(1)).pending_line().is_empty());
        assert_eq!(kernel.terminals.get(terminal(2)).pending_line(), b"k");

        kernel.switch_visible_terminal(terminal(1));
        assert_eq!(&screen_text(&kernel, VIDEO_MEMORY, 0)[..3], b"one");
        assert_eq!(&screen_text(&kernel, background_buffer(terminal(2)), 0)[..5], b"two!k");
    }

    #[test]
    fn clear_keeps_pending_line() {
        let mut kernel = booted_kernel();
        kernel.terminal_write(terminal(1), b"old output\nmore\n");
        kernel.handle_key(Key::Char(b'c'));
        kernel.handle_key(Key::Clear);

        assert_eq!(&screen_text(&kernel, VIDEO_MEMORY, 0)[..2], b"c ");
        assert!(screen_text(&kernel, VIDEO_MEMORY, 1).iter().all(|&c| c == b' '));
        assert_eq!(kernel.platform.cursor, (1, 0));
        assert_eq!(kernel.terminals.get(terminal(1)).pending_line(), b"c");
    }
}
