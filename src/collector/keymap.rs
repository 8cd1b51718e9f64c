//! Key code translation shared by the platform collectors.
//!
//! Each platform table maps a hardware/virtual key code to the unshifted
//! character printed on a US ANSI keyboard, or to a lowercase key name.
//! [`translate`] then applies the modifier state at the time of the event.

use crate::collector::types::KeyIdentity;

/// Modifier state at the time of a key event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub caps_lock: bool,
}

/// Translate an unshifted US-layout character under the given modifiers.
pub fn translate(base: char, modifiers: Modifiers) -> char {
    if base.is_ascii_alphabetic() {
        // Caps lock inverts shift for letters only
        return if modifiers.shift ^ modifiers.caps_lock {
            base.to_ascii_uppercase()
        } else {
            base
        };
    }

    if !modifiers.shift {
        return base;
    }

    match base {
        '1' => '!',
        '2' => '@',
        '3' => '#',
        '4' => '$',
        '5' => '%',
        '6' => '^',
        '7' => '&',
        '8' => '*',
        '9' => '(',
        '0' => ')',
        '-' => '_',
        '=' => '+',
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        ';' => ':',
        '\'' => '"',
        ',' => '<',
        '.' => '>',
        '/' => '?',
        '`' => '~',
        other => other,
    }
}

/// Identify a macOS virtual keycode (`kVK_*`).
pub fn macos_key(keycode: u16, modifiers: Modifiers) -> KeyIdentity {
    let base = match keycode {
        0x00 => 'a',
        0x01 => 's',
        0x02 => 'd',
        0x03 => 'f',
        0x04 => 'h',
        0x05 => 'g',
        0x06 => 'z',
        0x07 => 'x',
        0x08 => 'c',
        0x09 => 'v',
        0x0B => 'b',
        0x0C => 'q',
        0x0D => 'w',
        0x0E => 'e',
        0x0F => 'r',
        0x10 => 'y',
        0x11 => 't',
        0x12 => '1',
        0x13 => '2',
        0x14 => '3',
        0x15 => '4',
        0x16 => '6',
        0x17 => '5',
        0x18 => '=',
        0x19 => '9',
        0x1A => '7',
        0x1B => '-',
        0x1C => '8',
        0x1D => '0',
        0x1E => ']',
        0x1F => 'o',
        0x20 => 'u',
        0x21 => '[',
        0x22 => 'i',
        0x23 => 'p',
        0x24 => '\r',
        0x25 => 'l',
        0x26 => 'j',
        0x27 => '\'',
        0x28 => 'k',
        0x29 => ';',
        0x2A => '\\',
        0x2B => ',',
        0x2C => '/',
        0x2D => 'n',
        0x2E => 'm',
        0x2F => '.',
        0x30 => '\t',
        0x32 => '`',
        _ => return KeyIdentity::named(macos_key_name(keycode)),
    };
    KeyIdentity::Char(translate(base, modifiers))
}

fn macos_key_name(keycode: u16) -> &'static str {
    match keycode {
        0x31 => "space",
        // Labelled "delete" on Apple keyboards
        0x33 => "backspace",
        0x35 => "esc",
        0x37 | 0x36 => "cmd",
        0x38 | 0x3C => "shift",
        0x39 => "caps_lock",
        0x3A | 0x3D => "alt",
        0x3B | 0x3E => "ctrl",
        0x4C => "kp_enter",
        0x75 => "forward_delete",
        0x7B => "left",
        0x7C => "right",
        0x7D => "down",
        0x7E => "up",
        _ => "unknown",
    }
}

/// Identify a Windows virtual-key code (`VK_*`).
pub fn windows_key(vk: u32, modifiers: Modifiers) -> KeyIdentity {
    let base = match vk {
        0x09 => '\t',
        0x0D => '\r',
        // '0'..='9' and 'A'..='Z' share their ASCII codes
        0x30..=0x39 => char::from(vk as u8),
        0x41..=0x5A => char::from(vk as u8).to_ascii_lowercase(),
        0x60..=0x69 => char::from(b'0' + (vk - 0x60) as u8),
        0xBA => ';',
        0xBB => '=',
        0xBC => ',',
        0xBD => '-',
        0xBE => '.',
        0xBF => '/',
        0xC0 => '`',
        0xDB => '[',
        0xDC => '\\',
        0xDD => ']',
        0xDE => '\'',
        _ => return KeyIdentity::named(windows_key_name(vk)),
    };

    // Numpad digits ignore shift
    if (0x60..=0x69).contains(&vk) {
        return KeyIdentity::Char(base);
    }
    KeyIdentity::Char(translate(base, modifiers))
}

fn windows_key_name(vk: u32) -> &'static str {
    match vk {
        0x08 => "backspace",
        0x10 | 0xA0 | 0xA1 => "shift",
        0x11 | 0xA2 | 0xA3 => "ctrl",
        0x12 | 0xA4 | 0xA5 => "alt",
        0x14 => "caps_lock",
        0x1B => "esc",
        0x20 => "space",
        0x25 => "left",
        0x26 => "up",
        0x27 => "right",
        0x28 => "down",
        0x2E => "delete",
        0x5B | 0x5C => "cmd",
        _ => "unknown",
    }
}

/// Whether a Windows virtual-key code is caps lock.
pub fn is_windows_caps_lock(vk: u32) -> bool {
    vk == 0x14
}

/// Modifier state followed across Windows key events.
///
/// The low-level hook reports each shift key separately, so shift stays
/// held until both are released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowsModifierTracker {
    left_shift: bool,
    right_shift: bool,
    caps_lock: bool,
}

impl WindowsModifierTracker {
    /// Start from the caps lock toggle the system reports.
    pub const fn new(caps_lock: bool) -> Self {
        Self {
            left_shift: false,
            right_shift: false,
            caps_lock,
        }
    }

    /// Update from one key event and return the modifiers that apply to it.
    pub fn observe(&mut self, vk: u32, is_key_down: bool) -> Modifiers {
        match vk {
            0xA0 => self.left_shift = is_key_down,
            0xA1 => self.right_shift = is_key_down,
            // Generic VK_SHIFT carries no side
            0x10 => {
                self.left_shift = is_key_down;
                if !is_key_down {
                    self.right_shift = false;
                }
            }
            _ if is_windows_caps_lock(vk) && is_key_down => self.caps_lock = !self.caps_lock,
            _ => {}
        }
        self.modifiers()
    }

    pub fn modifiers(&self) -> Modifiers {
        Modifiers {
            shift: self.left_shift || self.right_shift,
            caps_lock: self.caps_lock,
        }
    }
}
