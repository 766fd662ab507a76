//! Cartridge (ROM) related functions and structures.

use core::fmt;
use std::{
    cmp::max,
    fmt::{Display, Formatter},
    vec,
};

use dmgboy_common::{error::Error, util::get_timestamp, util::read_file};

use crate::{mmu::BusComponent, warnln};

#[cfg(feature = "wasm")]
use wasm_bindgen::prelude::*;

pub const ROM_BANK_SIZE: usize = 16384;
pub const RAM_BANK_SIZE: usize = 8192;

/// The number of seconds in a full day, used in the
/// computation of the RTC day counter.
const DAY_SECONDS: u64 = 86400;

/// The RTC day counter is 9 bits wide, wrapping after
/// 512 days and setting the carry flag.
const DAY_WRAP: u64 = 512 * DAY_SECONDS;

#[cfg_attr(feature = "wasm", wasm_bindgen)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RomType {
    RomOnly = 0x00,
    Mbc1 = 0x01,
    Mbc1Ram = 0x02,
    Mbc1RamBattery = 0x03,
    Mbc2 = 0x05,
    Mbc2Battery = 0x06,
    RomRam = 0x08,
    RomRamBattery = 0x09,
    Mbc3TimerBattery = 0x0f,
    Mbc3TimerRamBattery = 0x10,
    Mbc3 = 0x11,
    Mbc3Ram = 0x12,
    Mbc3RamBattery = 0x13,
    Mbc5 = 0x19,
    Mbc5Ram = 0x1a,
    Mbc5RamBattery = 0x1b,
    Unknown = 0xef,
}

impl RomType {
    pub fn description(&self) -> &'static str {
        match self {
            RomType::RomOnly => "ROM Only",
            RomType::Mbc1 => "MBC1",
            RomType::Mbc1Ram => "MBC1 + RAM",
            RomType::Mbc1RamBattery => "MBC1 + RAM + Battery",
            RomType::Mbc2 => "MBC2",
            RomType::Mbc2Battery => "MBC2 + Battery",
            RomType::RomRam => "ROM + RAM",
            RomType::RomRamBattery => "ROM + RAM + Battery",
            RomType::Mbc3TimerBattery => "MBC3 + Timer + Battery",
            RomType::Mbc3TimerRamBattery => "MBC3 + Timer + RAM + Battery",
            RomType::Mbc3 => "MBC3",
            RomType::Mbc3Ram => "MBC3 + RAM",
            RomType::Mbc3RamBattery => "MBC3 + RAM + Battery",
            RomType::Mbc5 => "MBC5",
            RomType::Mbc5Ram => "MBC5 + RAM",
            RomType::Mbc5RamBattery => "MBC5 + RAM + Battery",
            RomType::Unknown => "Unknown",
        }
    }
}

impl Display for RomType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg_attr(feature = "wasm", wasm_bindgen)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RomSize {
    Size32K,
    Size64K,
    Size128K,
    Size256K,
    Size512K,
    Size1M,
    Size2M,
    Size4M,
    Size8M,
    SizeUnknown,
}

impl RomSize {
    pub fn description(&self) -> &'static str {
        match self {
            RomSize::Size32K => "32 KB",
            RomSize::Size64K => "64 KB",
            RomSize::Size128K => "128 KB",
            RomSize::Size256K => "256 KB",
            RomSize::Size512K => "512 KB",
            RomSize::Size1M => "1 MB",
            RomSize::Size2M => "2 MB",
            RomSize::Size4M => "4 MB",
            RomSize::Size8M => "8 MB",
            RomSize::SizeUnknown => "Unknown",
        }
    }

    pub fn rom_banks(&self) -> u16 {
        match self {
            RomSize::Size32K => 2,
            RomSize::Size64K => 4,
            RomSize::Size128K => 8,
            RomSize::Size256K => 16,
            RomSize::Size512K => 32,
            RomSize::Size1M => 64,
            RomSize::Size2M => 128,
            RomSize::Size4M => 256,
            RomSize::Size8M => 512,
            RomSize::SizeUnknown => 0,
        }
    }
}

impl Display for RomSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg_attr(feature = "wasm", wasm_bindgen)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RamSize {
    NoRam,
    Unused,
    Size8K,
    Size32K,
    Size64K,
    Size128K,
    SizeUnknown,
}

impl RamSize {
    pub fn description(&self) -> &'static str {
        match self {
            RamSize::NoRam => "No RAM",
            RamSize::Unused => "Unused",
            RamSize::Size8K => "8 KB",
            RamSize::Size32K => "32 KB",
            RamSize::Size64K => "64 KB",
            RamSize::Size128K => "128 KB",
            RamSize::SizeUnknown => "Unknown",
        }
    }

    pub fn ram_banks(&self) -> u16 {
        match self {
            RamSize::NoRam => 0,
            RamSize::Unused => 0,
            RamSize::Size8K => 1,
            RamSize::Size32K => 4,
            RamSize::Size64K => 8,
            RamSize::Size128K => 16,
            RamSize::SizeUnknown => 0,
        }
    }
}

impl Display for RamSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Real-time clock unit present in MBC3 cartridges.
///
/// The live counter advances from wall-clock time while the halt
/// flag is unset, the latched register set is frozen by the game
/// through the 0x00 then 0x01 latch sequence and is the one made
/// visible on RTC register reads.
#[derive(Clone)]
pub struct Rtc {
    /// Number of seconds accumulated in the clock, bounded
    /// by the 9-bit day counter wrap (512 days).
    counter: u64,

    /// Wall-clock timestamp of the last counter synchronization.
    last_update: u64,

    /// If the clock advancement is currently halted (DH bit 6).
    halted: bool,

    /// Day counter carry flag (DH bit 7), set on day counter
    /// overflow and only cleared by an explicit program write.
    day_carry: bool,

    /// Register snapshot frozen by the latest latch operation,
    /// ordered as seconds, minutes, hours, day low, day high.
    latched: [u8; 5],
}

impl Rtc {
    pub fn new() -> Self {
        Self {
            counter: 0,
            last_update: get_timestamp(),
            halted: false,
            day_carry: false,
            latched: [0u8; 5],
        }
    }

    /// Synchronizes the live counter with the wall clock, must be
    /// called before any read or write of the live registers.
    fn update(&mut self) {
        let now = get_timestamp();
        if !self.halted {
            self.counter += now.saturating_sub(self.last_update);
            if self.counter >= DAY_WRAP {
                self.counter %= DAY_WRAP;
                self.day_carry = true;
            }
        }
        self.last_update = now;
    }

    /// Copies the live register values into the latched shadow
    /// set, freezing them until the next latch operation.
    pub fn latch(&mut self) {
        self.update();
        self.latched = self.registers();
    }

    fn registers(&self) -> [u8; 5] {
        let days = self.counter / DAY_SECONDS;
        [
            (self.counter % 60) as u8,
            (self.counter / 60 % 60) as u8,
            (self.counter / 3600 % 24) as u8,
            (days & 0xff) as u8,
            ((days >> 8) & 0x01) as u8
                | if self.halted { 0x40 } else { 0x00 }
                | if self.day_carry { 0x80 } else { 0x00 },
        ]
    }

    pub fn read(&self, register: u8) -> u8 {
        match register {
            0x08..=0x0c => self.latched[(register - 0x08) as usize],
            _ => 0xff,
        }
    }

    pub fn write(&mut self, register: u8, value: u8) {
        self.update();

        let seconds = self.counter % 60;
        let minutes = self.counter / 60 % 60;
        let hours = self.counter / 3600 % 24;
        let days = self.counter / DAY_SECONDS;

        let (seconds, minutes, hours, days) = match register {
            0x08 => ((value & 0x3f) as u64, minutes, hours, days),
            0x09 => (seconds, (value & 0x3f) as u64, hours, days),
            0x0a => (seconds, minutes, (value & 0x1f) as u64, days),
            0x0b => (seconds, minutes, hours, (days & 0x100) | value as u64),
            0x0c => {
                self.halted = value & 0x40 == 0x40;
                self.day_carry = value & 0x80 == 0x80;
                (
                    seconds,
                    minutes,
                    hours,
                    (days & 0xff) | (((value & 0x01) as u64) << 8),
                )
            }
            _ => return,
        };

        self.counter = days * DAY_SECONDS + hours * 3600 + minutes * 60 + seconds;
    }
}

impl Default for Rtc {
    fn default() -> Self {
        Self::new()
    }
}

/// The MBC (Memory Bank Controller) state of a cartridge, a tagged
/// variant selected at load time from the header cartridge type and
/// dispatched through a small match in the memory access paths.
#[derive(Clone)]
pub enum Mbc {
    /// Plain 32 KB cartridge with no banking hardware.
    NoMbc,

    /// MBC1 with 5-bit ROM bank selection, a 2-bit register shared
    /// between RAM banking and upper ROM bits, and a mode flag.
    Mbc1 {
        ram_enabled: bool,
        rom_bank: u8,
        ram_bank: u8,
        mode: u8,
    },

    /// MBC3 with 7-bit ROM bank selection, RAM bank or RTC register
    /// selection and the latch based real-time clock.
    Mbc3 {
        ram_enabled: bool,
        rom_bank: u8,
        ram_rtc_select: u8,
        latch_value: u8,
        rtc: Rtc,
    },
}

impl Mbc {
    pub fn mbc1() -> Self {
        Mbc::Mbc1 {
            ram_enabled: false,
            rom_bank: 0x1,
            ram_bank: 0x0,
            mode: 0x0,
        }
    }

    pub fn mbc3() -> Self {
        Mbc::Mbc3 {
            ram_enabled: false,
            rom_bank: 0x1,
            ram_rtc_select: 0x0,
            latch_value: 0xff,
            rtc: Rtc::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mbc::NoMbc => "No MBC",
            Mbc::Mbc1 { .. } => "MBC1",
            Mbc::Mbc3 { .. } => "MBC3",
        }
    }
}

/// Structure that defines the ROM and RAM contents of a Game Boy
/// cartridge. Should correctly address the specifics of the
/// supported MBCs (Memory Bank Controllers).
#[derive(Clone)]
pub struct Cartridge {
    /// The complete data of the ROM cartridge, should
    /// include the complete set of ROM banks.
    rom_data: Vec<u8>,

    /// The base RAM that is going to be used to store
    /// temporary data for the cartridge.
    ram_data: Vec<u8>,

    /// The MBC (Memory Bank Controller) state in charge of the
    /// bank switching for the current cartridge.
    mbc: Mbc,

    /// The number of ROM banks (of 16KB) that are available
    /// to the current cartridge, this is a computed value
    /// to allow improved performance.
    rom_bank_count: u16,

    /// The number of RAM banks (of 8KB) that are available
    /// to the current cartridge, this is a computed value
    /// to allow improved performance.
    ram_bank_count: u16,

    /// The offset address to the ROM bank (#1) that is
    /// currently in use by the ROM cartridge.
    rom_offset: usize,

    /// The final offset of the last character of the title
    /// that is considered to be non zero (0x0) so that a
    /// proper safe conversion to UTF-8 string can be done.
    title_offset: usize,
}

impl Cartridge {
    pub fn new() -> Self {
        Self {
            rom_data: vec![],
            ram_data: vec![],
            mbc: Mbc::NoMbc,
            rom_bank_count: 0,
            ram_bank_count: 0,
            rom_offset: 0x4000,
            title_offset: 0x0143,
        }
    }

    pub fn from_data(data: &[u8]) -> Result<Self, Error> {
        let mut cartridge = Cartridge::new();
        cartridge.set_data(data)?;
        Ok(cartridge)
    }

    pub fn from_file(path: &str) -> Result<Self, Error> {
        let data = read_file(path)?;
        Self::from_data(&data)
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            // 0x0000-0x7FFF: 16 KiB ROM bank 00 & 16 KiB ROM Bank 01-NN
            0x0000..=0x7fff => self.read_rom(addr),
            // 0xA000-0xBFFF: 8 KiB External RAM
            0xa000..=0xbfff => self.read_ram(addr),
            _ => 0xff,
        }
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        match addr {
            // 0x0000-0x7FFF: MBC control registers
            0x0000..=0x7fff => self.write_rom(addr, value),
            // 0xA000-0xBFFF: 8 KiB External RAM
            0xa000..=0xbfff => self.write_ram(addr, value),
            _ => (),
        }
    }

    fn read_rom(&self, addr: u16) -> u8 {
        match addr {
            // 0x0000-0x3FFF - ROM bank 00, always fixed
            0x0000..=0x3fff => self.rom_data.get(addr as usize).copied().unwrap_or(0xff),
            // 0x4000-0x7FFF - ROM bank 01-NN, switchable
            0x4000..=0x7fff => self
                .rom_data
                .get(self.rom_offset + (addr - 0x4000) as usize)
                .copied()
                .unwrap_or(0xff),
            _ => 0xff,
        }
    }

    fn write_rom(&mut self, addr: u16, value: u8) {
        match &mut self.mbc {
            Mbc::NoMbc => (),
            Mbc::Mbc1 {
                ram_enabled,
                rom_bank,
                ram_bank,
                mode,
            } => match addr {
                // 0x0000-0x1FFF - RAM enabled flag
                0x0000..=0x1fff => *ram_enabled = value & 0x0f == 0x0a,
                // 0x2000-0x3FFF - ROM bank selection 5 lower bits
                0x2000..=0x3fff => {
                    let mut bank = value & 0x1f;
                    if bank == 0 {
                        bank = 1;
                    }
                    *rom_bank = bank;
                }
                // 0x4000-0x5FFF - RAM bank selection or ROM bank upper bits
                0x4000..=0x5fff => *ram_bank = value & 0x03,
                // 0x6000-0x7FFF - Banking mode selection
                0x6000..=0x7fff => *mode = value & 0x01,
                _ => (),
            },
            Mbc::Mbc3 {
                ram_enabled,
                rom_bank,
                ram_rtc_select,
                latch_value,
                rtc,
            } => match addr {
                // 0x0000-0x1FFF - RAM and RTC enabled flag
                0x0000..=0x1fff => *ram_enabled = value & 0x0f == 0x0a,
                // 0x2000-0x3FFF - ROM bank selection 7 bits
                0x2000..=0x3fff => {
                    let mut bank = value & 0x7f;
                    if bank == 0 {
                        bank = 1;
                    }
                    *rom_bank = bank;
                }
                // 0x4000-0x5FFF - RAM bank (0x00-0x03) or RTC register
                // (0x08-0x0C) selection
                0x4000..=0x5fff => *ram_rtc_select = value,
                // 0x6000-0x7FFF - RTC latch, a 0x00 then 0x01 write
                // sequence freezes the live clock into the shadow set
                0x6000..=0x7fff => {
                    if *latch_value == 0x00 && value == 0x01 {
                        rtc.latch();
                    }
                    *latch_value = value;
                }
                _ => (),
            },
        }
        self.update_rom_offset();
    }

    fn read_ram(&self, addr: u16) -> u8 {
        match &self.mbc {
            Mbc::NoMbc => 0xff,
            Mbc::Mbc1 {
                ram_enabled,
                ram_bank,
                mode,
                ..
            } => {
                if !*ram_enabled {
                    return 0xff;
                }
                let offset = if *mode == 0x01 {
                    *ram_bank as usize * RAM_BANK_SIZE
                } else {
                    0x0
                };
                self.ram_data
                    .get(offset + (addr - 0xa000) as usize)
                    .copied()
                    .unwrap_or(0xff)
            }
            Mbc::Mbc3 {
                ram_enabled,
                ram_rtc_select,
                rtc,
                ..
            } => {
                if !*ram_enabled {
                    return 0xff;
                }
                match ram_rtc_select {
                    0x00..=0x03 => self
                        .ram_data
                        .get(*ram_rtc_select as usize * RAM_BANK_SIZE + (addr - 0xa000) as usize)
                        .copied()
                        .unwrap_or(0xff),
                    0x08..=0x0c => rtc.read(*ram_rtc_select),
                    _ => 0xff,
                }
            }
        }
    }

    fn write_ram(&mut self, addr: u16, value: u8) {
        match &mut self.mbc {
            Mbc::NoMbc => (),
            Mbc::Mbc1 {
                ram_enabled,
                ram_bank,
                mode,
                ..
            } => {
                if !*ram_enabled {
                    return;
                }
                let offset = if *mode == 0x01 {
                    *ram_bank as usize * RAM_BANK_SIZE
                } else {
                    0x0
                };
                if let Some(byte) = self.ram_data.get_mut(offset + (addr - 0xa000) as usize) {
                    *byte = value;
                }
            }
            Mbc::Mbc3 {
                ram_enabled,
                ram_rtc_select,
                rtc,
                ..
            } => {
                if !*ram_enabled {
                    return;
                }
                match ram_rtc_select {
                    0x00..=0x03 => {
                        let offset = *ram_rtc_select as usize * RAM_BANK_SIZE;
                        if let Some(byte) = self.ram_data.get_mut(offset + (addr - 0xa000) as usize)
                        {
                            *byte = value;
                        }
                    }
                    0x08..=0x0c => rtc.write(*ram_rtc_select, value),
                    _ => (),
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.rom_data = vec![];
        self.ram_data = vec![];
        self.mbc = Mbc::NoMbc;
        self.rom_bank_count = 0;
        self.ram_bank_count = 0;
        self.rom_offset = 0x4000;
        self.title_offset = 0x0143;
    }

    fn set_data(&mut self, data: &[u8]) -> Result<(), Error> {
        self.ensure_data(data)?;
        self.rom_data = data.to_vec();
        self.set_mbc()?;
        self.set_computed();
        self.set_title_offset();
        self.allocate_ram();
        self.update_rom_offset();
        if !self.valid_checksum() {
            warnln!(
                "Cartridge header checksum mismatch (expected 0x{:02x}, got 0x{:02x})",
                self.checksum(),
                self.rom_data[0x014d]
            );
        }
        Ok(())
    }

    fn set_mbc(&mut self) -> Result<(), Error> {
        self.mbc = match self.rom_type() {
            RomType::RomOnly => Mbc::NoMbc,
            RomType::Mbc1 | RomType::Mbc1Ram | RomType::Mbc1RamBattery => Mbc::mbc1(),
            RomType::Mbc3TimerBattery
            | RomType::Mbc3TimerRamBattery
            | RomType::Mbc3
            | RomType::Mbc3Ram
            | RomType::Mbc3RamBattery => Mbc::mbc3(),
            rom_type => {
                return Err(Error::UnsupportedCartridge(String::from(
                    rom_type.description(),
                )))
            }
        };
        Ok(())
    }

    fn set_computed(&mut self) {
        self.rom_bank_count = self.rom_size().rom_banks();
        self.ram_bank_count = self.ram_size().ram_banks();
    }

    fn set_title_offset(&mut self) {
        if self.rom_data.len() < 0x0144 {
            return;
        }
        let mut offset: usize = 0;
        for byte in &self.rom_data[0x0134..=0x0143] {
            if *byte == 0u8 {
                break;
            }
            offset += 1;
        }
        self.title_offset = 0x0134 + offset;
    }

    fn allocate_ram(&mut self) {
        let ram_banks = max(self.ram_bank_count, 1);
        self.ram_data = vec![0u8; ram_banks as usize * RAM_BANK_SIZE];
    }

    /// Recomputes the cached offset into the switchable ROM window,
    /// must run after every MBC control register write so that the
    /// hot read path remains a single indexed access.
    fn update_rom_offset(&mut self) {
        let mut bank = match &self.mbc {
            Mbc::NoMbc => 0x1,
            Mbc::Mbc1 {
                rom_bank,
                ram_bank,
                mode,
                ..
            } => {
                let mut bank = *rom_bank as usize;
                // in simple banking mode the 2-bit register supplies
                // the upper ROM bank bits on large (>= 1MB) cartridges
                if *mode == 0x00 && self.rom_bank_count >= 64 {
                    bank |= (*ram_bank as usize) << 5;
                }
                bank
            }
            Mbc::Mbc3 { rom_bank, .. } => *rom_bank as usize,
        };
        if self.rom_bank_count > 0 {
            bank %= self.rom_bank_count as usize;
        }
        self.rom_offset = bank * ROM_BANK_SIZE;
    }

    /// Ensures that the data provided is of a valid Game Boy ROM,
    /// meaning it can hold the complete header and that its size
    /// is a multiple of the ROM bank size.
    fn ensure_data(&self, data: &[u8]) -> Result<(), Error> {
        if data.len() < 0x8000 {
            return Err(Error::RomSize);
        }
        if data.len() % ROM_BANK_SIZE != 0 {
            return Err(Error::RomSize);
        }
        Ok(())
    }

    pub fn title(&self) -> String {
        if self.rom_data.len() < self.title_offset {
            return String::new();
        }
        String::from(
            std::str::from_utf8(&self.rom_data[0x0134..self.title_offset])
                .unwrap_or("")
                .trim(),
        )
    }

    pub fn rom_type(&self) -> RomType {
        if self.rom_data.len() < 0x0148 {
            return RomType::Unknown;
        }
        match self.rom_data[0x0147] {
            0x00 => RomType::RomOnly,
            0x01 => RomType::Mbc1,
            0x02 => RomType::Mbc1Ram,
            0x03 => RomType::Mbc1RamBattery,
            0x05 => RomType::Mbc2,
            0x06 => RomType::Mbc2Battery,
            0x08 => RomType::RomRam,
            0x09 => RomType::RomRamBattery,
            0x0f => RomType::Mbc3TimerBattery,
            0x10 => RomType::Mbc3TimerRamBattery,
            0x11 => RomType::Mbc3,
            0x12 => RomType::Mbc3Ram,
            0x13 => RomType::Mbc3RamBattery,
            0x19 => RomType::Mbc5,
            0x1a => RomType::Mbc5Ram,
            0x1b => RomType::Mbc5RamBattery,
            _ => RomType::Unknown,
        }
    }

    pub fn rom_size(&self) -> RomSize {
        if self.rom_data.len() < 0x0149 {
            return RomSize::SizeUnknown;
        }
        match self.rom_data[0x0148] {
            0x00 => RomSize::Size32K,
            0x01 => RomSize::Size64K,
            0x02 => RomSize::Size128K,
            0x03 => RomSize::Size256K,
            0x04 => RomSize::Size512K,
            0x05 => RomSize::Size1M,
            0x06 => RomSize::Size2M,
            0x07 => RomSize::Size4M,
            0x08 => RomSize::Size8M,
            _ => RomSize::SizeUnknown,
        }
    }

    pub fn ram_size(&self) -> RamSize {
        if self.rom_data.len() < 0x014a {
            return RamSize::SizeUnknown;
        }
        match self.rom_data[0x0149] {
            0x00 => RamSize::NoRam,
            0x01 => RamSize::Unused,
            0x02 => RamSize::Size8K,
            0x03 => RamSize::Size32K,
            0x04 => RamSize::Size128K,
            0x05 => RamSize::Size64K,
            _ => RamSize::SizeUnknown,
        }
    }

    pub fn checksum(&self) -> u8 {
        let mut sum: u8 = 0;
        for i in 0x0134..=0x014c {
            sum = sum.wrapping_sub(self.rom_data[i]).wrapping_sub(1);
        }
        sum
    }

    pub fn valid_checksum(&self) -> bool {
        self.rom_data.len() > 0x014d && self.rom_data[0x014d] == self.checksum()
    }

    pub fn has_battery(&self) -> bool {
        matches!(
            self.rom_type(),
            RomType::Mbc1RamBattery
                | RomType::Mbc2Battery
                | RomType::RomRamBattery
                | RomType::Mbc3TimerBattery
                | RomType::Mbc3TimerRamBattery
                | RomType::Mbc3RamBattery
                | RomType::Mbc5RamBattery
        )
    }

    pub fn loaded(&self) -> bool {
        !self.rom_data.is_empty()
    }

    pub fn mbc(&self) -> &Mbc {
        &self.mbc
    }

    pub fn rom_bank_count(&self) -> u16 {
        self.rom_bank_count
    }

    pub fn ram_bank_count(&self) -> u16 {
        self.ram_bank_count
    }

    pub fn rom_bank(&self) -> u16 {
        (self.rom_offset / ROM_BANK_SIZE) as u16
    }

    pub fn rom_data(&self) -> &Vec<u8> {
        &self.rom_data
    }

    pub fn ram_data(&self) -> &Vec<u8> {
        &self.ram_data
    }

    pub fn set_ram_data(&mut self, data: &[u8]) {
        self.ram_data = data.to_vec();
    }

    pub fn description(&self, column_length: usize) -> String {
        let title_l = format!("{:width$}", "Title", width = column_length);
        let type_l = format!("{:width$}", "Type", width = column_length);
        let rom_size_l = format!("{:width$}", "ROM Size", width = column_length);
        let ram_size_l = format!("{:width$}", "RAM Size", width = column_length);
        format!(
            "{}  {}\n{}  {}\n{}  {}\n{}  {}",
            title_l,
            self.title(),
            type_l,
            self.rom_type(),
            rom_size_l,
            self.rom_size(),
            ram_size_l,
            self.ram_size(),
        )
    }
}

impl BusComponent for Cartridge {
    fn read(&self, addr: u16) -> u8 {
        self.read(addr)
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.write(addr, value);
    }
}

impl Default for Cartridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Cartridge {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description(9))
    }
}

#[cfg(test)]
mod tests {
    use super::{Cartridge, Mbc, RomType};
    use crate::test::build_rom;
    use dmgboy_common::error::Error;

    #[test]
    fn test_no_cartridge_reads() {
        let cartridge = Cartridge::new();
        assert_eq!(cartridge.read(0x0000), 0xff);
        assert_eq!(cartridge.read(0x4000), 0xff);
        assert_eq!(cartridge.read(0xa000), 0xff);
    }

    #[test]
    fn test_header_parsing() {
        let mut data = build_rom(0x01, 0x02, 0x02);
        data[0x0134..0x0139].copy_from_slice(b"TESTS");
        let cartridge = Cartridge::from_data(&data).unwrap();
        assert_eq!(cartridge.title(), "TESTS");
        assert_eq!(cartridge.rom_type(), RomType::Mbc1);
        assert_eq!(cartridge.rom_bank_count(), 8);
        assert_eq!(cartridge.ram_bank_count(), 1);
    }

    #[test]
    fn test_unsupported_cartridge() {
        let data = build_rom(0x05, 0x00, 0x00);
        let result = Cartridge::from_data(&data);
        assert_eq!(
            result.err(),
            Some(Error::UnsupportedCartridge(String::from("MBC2")))
        );
    }

    #[test]
    fn test_mbc1_bank_switch() {
        let mut data = build_rom(0x01, 0x02, 0x00);
        data[0x14000] = 0x42;
        let mut cartridge = Cartridge::from_data(&data).unwrap();

        cartridge.write(0x2000, 0x05);
        assert_eq!(cartridge.rom_bank(), 5);
        assert_eq!(cartridge.read(0x4000), 0x42);
    }

    #[test]
    fn test_mbc1_bank_zero_coercion() {
        let mut data = build_rom(0x01, 0x02, 0x00);
        data[0x4000] = 0x24;
        let mut cartridge = Cartridge::from_data(&data).unwrap();

        cartridge.write(0x2000, 0x00);
        assert_eq!(cartridge.rom_bank(), 1);
        assert_eq!(cartridge.read(0x4000), 0x24);
    }

    #[test]
    fn test_mbc1_ram_enable_gate() {
        let data = build_rom(0x03, 0x00, 0x02);
        let mut cartridge = Cartridge::from_data(&data).unwrap();

        cartridge.write(0xa000, 0x77);
        assert_eq!(cartridge.read(0xa000), 0xff);

        cartridge.write(0x0000, 0x0a);
        cartridge.write(0xa000, 0x77);
        assert_eq!(cartridge.read(0xa000), 0x77);

        cartridge.write(0x0000, 0x00);
        assert_eq!(cartridge.read(0xa000), 0xff);
    }

    #[test]
    fn test_mbc3_bank_switch() {
        let mut data = build_rom(0x11, 0x03, 0x00);
        data[0x3c000] = 0x99;
        let mut cartridge = Cartridge::from_data(&data).unwrap();

        cartridge.write(0x2000, 0x0f);
        assert_eq!(cartridge.rom_bank(), 15);
        assert_eq!(cartridge.read(0x4000), 0x99);

        cartridge.write(0x2000, 0x00);
        assert_eq!(cartridge.rom_bank(), 1);
    }

    #[test]
    fn test_mbc3_rtc_latch() {
        let data = build_rom(0x10, 0x00, 0x02);
        let mut cartridge = Cartridge::from_data(&data).unwrap();

        cartridge.write(0x0000, 0x0a);

        // selects the RTC minutes register, writes a value to the
        // live clock and latches it for reading
        cartridge.write(0x4000, 0x09);
        cartridge.write(0xa000, 0x2a);
        cartridge.write(0x6000, 0x00);
        cartridge.write(0x6000, 0x01);
        assert_eq!(cartridge.read(0xa000), 0x2a);

        // halt and carry flags are program writable and preserved
        cartridge.write(0x4000, 0x0c);
        cartridge.write(0xa000, 0xc0);
        cartridge.write(0x6000, 0x00);
        cartridge.write(0x6000, 0x01);
        assert_eq!(cartridge.read(0xa000) & 0xc0, 0xc0);

        if let Mbc::Mbc3 { .. } = cartridge.mbc() {
        } else {
            panic!("Expected MBC3 cartridge");
        }
    }
}
