//! Gamepad (Joypad) functions and structures.

use crate::{mmu::BusComponent, warnln};

#[cfg(feature = "wasm")]
use wasm_bindgen::prelude::*;

/// The Game Boy joypad matrix.
///
/// Holds the logical state of the eight buttons and the two
/// group-select bits written to P1/JOYP, composing the active-low
/// nibble returned on register reads.
pub struct Pad {
    down: bool,
    up: bool,
    left: bool,
    right: bool,
    start: bool,
    select: bool,
    b: bool,
    a: bool,

    /// Raw bits 4 and 5 as last written to P1, both
    /// active-low group selectors.
    selection: u8,

    /// Boolean value set when a pressed key transition
    /// should be handled by the next CPU clock operation.
    int_pad: bool,
}

#[cfg_attr(feature = "wasm", wasm_bindgen)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PadKey {
    Right = 0,
    Left = 1,
    Up = 2,
    Down = 3,
    A = 4,
    B = 5,
    Select = 6,
    Start = 7,
}

impl PadKey {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => PadKey::Right,
            1 => PadKey::Left,
            2 => PadKey::Up,
            3 => PadKey::Down,
            4 => PadKey::A,
            5 => PadKey::B,
            6 => PadKey::Select,
            7 => PadKey::Start,
            value => panic!("Invalid pad key value: {}", value),
        }
    }
}

impl From<u8> for PadKey {
    fn from(value: u8) -> Self {
        Self::from_u8(value)
    }
}

impl Pad {
    pub fn new() -> Self {
        Self {
            down: false,
            up: false,
            left: false,
            right: false,
            start: false,
            select: false,
            b: false,
            a: false,
            selection: 0x30,
            int_pad: false,
        }
    }

    pub fn reset(&mut self) {
        self.down = false;
        self.up = false;
        self.left = false;
        self.right = false;
        self.start = false;
        self.select = false;
        self.b = false;
        self.a = false;
        self.selection = 0x30;
        self.int_pad = false;
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr & 0x00ff {
            0x0000 => {
                let mut value = 0x0f;

                // bit 4 low selects the direction group, the
                // matrix lines are active-low so a pressed key
                // clears the corresponding bit
                if self.selection & 0x10 == 0x00 {
                    value &= if self.right { 0x0e } else { 0x0f }
                        & if self.left { 0x0d } else { 0x0f }
                        & if self.up { 0x0b } else { 0x0f }
                        & if self.down { 0x07 } else { 0x0f };
                }

                // bit 5 low selects the action group
                if self.selection & 0x20 == 0x00 {
                    value &= if self.a { 0x0e } else { 0x0f }
                        & if self.b { 0x0d } else { 0x0f }
                        & if self.select { 0x0b } else { 0x0f }
                        & if self.start { 0x07 } else { 0x0f };
                }

                // bits 6 and 7 are unused and always read as set
                value | self.selection | 0xc0
            }
            _ => {
                warnln!("Reading from unknown Pad location 0x{:04x}", addr);
                #[allow(unreachable_code)]
                0xff
            }
        }
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        match addr & 0x00ff {
            // only the two group selection bits are program
            // writable, everything else is derived or unused
            0x0000 => self.selection = value & 0x30,
            _ => warnln!("Writing to unknown Pad location 0x{:04x}", addr),
        }
    }

    pub fn key_press(&mut self, key: PadKey) {
        let previous = self.pressed(key);
        match key {
            PadKey::Up => self.up = true,
            PadKey::Down => self.down = true,
            PadKey::Left => self.left = true,
            PadKey::Right => self.right = true,
            PadKey::Start => self.start = true,
            PadKey::Select => self.select = true,
            PadKey::A => self.a = true,
            PadKey::B => self.b = true,
        }

        // any press transition requests the joypad interrupt,
        // releases are never interrupt sources
        if !previous {
            self.int_pad = true;
        }
    }

    pub fn key_lift(&mut self, key: PadKey) {
        match key {
            PadKey::Up => self.up = false,
            PadKey::Down => self.down = false,
            PadKey::Left => self.left = false,
            PadKey::Right => self.right = false,
            PadKey::Start => self.start = false,
            PadKey::Select => self.select = false,
            PadKey::A => self.a = false,
            PadKey::B => self.b = false,
        }
    }

    /// External entry point for host integrations, maps a raw
    /// button identifier (0 to 7) to the proper key operation.
    pub fn set_button(&mut self, id: u8, pressed: bool) {
        let key = PadKey::from_u8(id);
        if pressed {
            self.key_press(key);
        } else {
            self.key_lift(key);
        }
    }

    fn pressed(&self, key: PadKey) -> bool {
        match key {
            PadKey::Up => self.up,
            PadKey::Down => self.down,
            PadKey::Left => self.left,
            PadKey::Right => self.right,
            PadKey::Start => self.start,
            PadKey::Select => self.select,
            PadKey::A => self.a,
            PadKey::B => self.b,
        }
    }

    #[inline(always)]
    pub fn int_pad(&self) -> bool {
        self.int_pad
    }

    #[inline(always)]
    pub fn set_int_pad(&mut self, value: bool) {
        self.int_pad = value;
    }

    #[inline(always)]
    pub fn ack_pad(&mut self) {
        self.set_int_pad(false);
    }
}

impl BusComponent for Pad {
    fn read(&self, addr: u16) -> u8 {
        self.read(addr)
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.write(addr, value);
    }
}

impl Default for Pad {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{Pad, PadKey};

    #[test]
    fn test_idle_read() {
        let pad = Pad::new();
        assert_eq!(pad.read(0xff00), 0xff);
    }

    #[test]
    fn test_direction_selection() {
        let mut pad = Pad::new();
        pad.key_press(PadKey::Right);
        pad.key_press(PadKey::A);

        // direction group selected (bit 4 low), only the
        // right key should clear its line
        pad.write(0xff00, 0x20);
        assert_eq!(pad.read(0xff00), 0xee);

        // action group selected (bit 5 low)
        pad.write(0xff00, 0x10);
        assert_eq!(pad.read(0xff00), 0xde);
    }

    #[test]
    fn test_press_interrupt() {
        let mut pad = Pad::new();
        assert!(!pad.int_pad());

        pad.set_button(7, true);
        assert!(pad.int_pad());

        pad.ack_pad();
        pad.set_button(7, false);
        assert!(!pad.int_pad());

        // re-pressing an already pressed key is not
        // a transition and raises no new interrupt
        pad.set_button(0, true);
        pad.ack_pad();
        pad.set_button(0, true);
        assert!(!pad.int_pad());
    }
}
