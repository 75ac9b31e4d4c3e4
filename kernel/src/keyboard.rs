/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

//! Scancode set 1, as sent by a PS/2 keyboard. Only the keys a terminal can do something with are decoded; the
//! rest, and every release, produce nothing.

use crate::terminal::{Key, TerminalId};

/// Scancodes with this bit set are key releases.
const RELEASED: u8 = 0x80;

const LEFT_SHIFT: u8 = 0x2a;
const RIGHT_SHIFT: u8 = 0x36;
const CONTROL: u8 = 0x1d;
const ALT: u8 = 0x38;
const CAPS_LOCK: u8 = 0x3a;
const BACKSPACE: u8 = 0x0e;
const ENTER: u8 = 0x1c;
const F1: u8 = 0x3b;
const F3: u8 = 0x3d;

#[rustfmt::skip]
const NORMAL: [u8; 0x3a] = [
    0, 0, b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'0', b'-', b'=', 0, b' ',
    b'q', b'w', b'e', b'r', b't', b'y', b'u', b'i', b'o', b'p', b'[', b']', 0, 0, b'a', b's',
    b'd', b'f', b'g', b'h', b'j', b'k', b'l', b';', b'\'', b'`', 0, b'\\', b'z', b'x', b'c', b'v',
    b'b', b'n', b'm', b',', b'.', b'/', 0, b'*', 0, b' ',
];

#[rustfmt::skip]
const SHIFTED: [u8; 0x3a] = [
    0, 0, b'!', b'@', b'#', b'$', b'%', b'^', b'&', b'*', b'(', b')', b'_', b'+', 0, b' ',
    b'Q', b'W', b'E', b'R', b'T', b'Y', b'U', b'I', b'O', b'P', b'{', b'}', 0, 0, b'A', b'S',
    b'D', b'F', b'G', b'H', b'J', b'K', b'L', b':', b'"', b'~', 0, b'|', b'Z', b'X', b'C', b'V',
    b'B', b'N', b'M', b'<', b'>', b'?', 0, b'*', 0, b' ',
];

/// Tracks the modifier keys across scancodes.
#[derive(Clone, Copy, Default, Debug)]
pub struct ScancodeDecoder {
    shift: bool,
    control: bool,
    alt: bool,
    caps_lock: bool,
}

impl ScancodeDecoder {
    pub const fn new() -> ScancodeDecoder {
        ScancodeDecoder { shift: false, control: false, alt: false, caps_lock: false }
    }

    pub fn decode(&mut self, scancode: u8) -> Option<Key> {
        let pressed = scancode & RELEASED == 0;
        match scancode & !RELEASED {
            LEFT_SHIFT | RIGHT_SHIFT => self.shift = pressed,
            CONTROL => self.control = pressed,
            ALT => self.alt = pressed,
            CAPS_LOCK if pressed => self.caps_lock = !self.caps_lock,
            _ if !pressed => (),

            BACKSPACE => return Some(Key::Backspace),
            ENTER => return Some(Key::Enter),
            F1..=F3 if self.alt => {
                return TerminalId::new((scancode - F1) as usize + 1).map(Key::SwitchTerminal);
            }

            code => {
                let character = self.character(code)?;
                if self.control {
                    return character.eq_ignore_ascii_case(&b'l').then_some(Key::Clear);
                }
                return Some(Key::Char(character));
            }
        }

        None
    }

    fn character(&self, code: u8) -> Option<u8> {
        let normal = *NORMAL.get(code as usize)?;
        let shifted = SHIFTED[code as usize];
        if normal == 0 {
            return None;
        }

        // Caps lock only affects letters, and shift inverts it
        let use_shifted = if normal.is_ascii_lowercase() { self.shift != self.caps_lock } else { self.shift };
        Some(if use_shifted { shifted } else { normal })
    }
}
