//! MMU (Memory Management Unit) functions and structures.

use std::sync::Mutex;

use dmgboy_common::util::SharedThread;

use crate::{
    apu::Apu,
    consts::{DMA_ADDR, IF_ADDR, SB_ADDR, SC_ADDR},
    gb::{Components, GameBoyConfig},
    pad::Pad,
    ppu::Ppu,
    rom::Cartridge,
    timer::Timer,
    warnln,
};

pub const RAM_SIZE: usize = 8192;
pub const HRAM_SIZE: usize = 128;

/// Number of bytes transferred by an OAM DMA operation.
pub const DMA_SIZE: u16 = 160;

pub trait BusComponent {
    fn read(&self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, value: u8);
    fn read_many(&self, addr: u16, count: usize) -> Vec<u8> {
        (0..count)
            .map(|offset| self.read(addr + offset as u16))
            .collect()
    }
    fn write_many(&mut self, addr: u16, values: &[u8]) {
        for (offset, &value) in values.iter().enumerate() {
            self.write(addr + offset as u16, value);
        }
    }
}

/// The memory bus of the Game Boy, routes 16 bit addresses into
/// the cartridge, the PPU owned memory (VRAM and OAM), the internal
/// work RAM and high RAM, and the memory mapped I/O registers of
/// the remaining components.
pub struct Mmu {
    /// Register that controls the interrupts that are considered
    /// to be enabled and should be triggered.
    pub ie: u8,

    /// Reference to the PPU (Pixel Processing Unit) that is going
    /// to be used both for VRAM and OAM reading/writing and to
    /// forward some of the access operations.
    ppu: Ppu,

    /// Reference to the APU (Audio Processing Unit) that is going
    /// to be used both for register reading/writing and to forward
    /// some of the access operations.
    apu: Apu,

    /// Reference to the Gamepad structure that is going to control
    /// the I/O access to this device.
    pad: Pad,

    /// The timer controller to be used as part of the I/O access
    /// that is memory mapped.
    timer: Timer,

    /// The cartridge ROM that is currently loaded into the system,
    /// going to be used to access ROM and external RAM banks.
    rom: Cartridge,

    /// Buffer that is used to store the working RAM of the
    /// system, mapped in range 0xC000-0xDFFF and echoed in
    /// range 0xE000-0xFDFF.
    ram: Vec<u8>,

    /// High RAM memory that should provide extra speed for
    /// regular stack operations.
    hram: [u8; HRAM_SIZE],

    /// The serial transfer data and control bytes, stored but
    /// not attached to any link cable device.
    sb: u8,
    sc: u8,

    /// Pending flag for the serial interrupt, never raised by
    /// hardware (there's no link cable) but program writable
    /// through the IF register.
    int_serial: bool,

    /// The value last written to the OAM DMA register, the
    /// transfer itself is run instantaneously on write.
    dma_value: u8,

    /// The pointer to the parent configuration of the running
    /// Game Boy emulator, that can be used to control the
    /// behaviour of Game Boy emulation.
    gbc: SharedThread<GameBoyConfig>,
}

impl Mmu {
    pub fn new(components: Components, gbc: SharedThread<GameBoyConfig>) -> Self {
        Self {
            ppu: components.ppu,
            apu: components.apu,
            pad: components.pad,
            timer: components.timer,
            rom: Cartridge::new(),
            ram: vec![],
            hram: [0u8; HRAM_SIZE],
            sb: 0x0,
            sc: 0x0,
            int_serial: false,
            dma_value: 0xff,
            ie: 0x0,
            gbc,
        }
    }

    pub fn reset(&mut self) {
        self.rom = Cartridge::new();
        self.ram = vec![];
        self.hram = [0u8; HRAM_SIZE];
        self.sb = 0x0;
        self.sc = 0x0;
        self.int_serial = false;
        self.dma_value = 0xff;
        self.ie = 0x0;
    }

    pub fn allocate_default(&mut self) {
        self.ram = vec![0x00; RAM_SIZE];
    }

    pub fn ppu(&mut self) -> &mut Ppu {
        &mut self.ppu
    }

    pub fn ppu_i(&self) -> &Ppu {
        &self.ppu
    }

    pub fn apu(&mut self) -> &mut Apu {
        &mut self.apu
    }

    pub fn apu_i(&self) -> &Apu {
        &self.apu
    }

    pub fn pad(&mut self) -> &mut Pad {
        &mut self.pad
    }

    pub fn pad_i(&self) -> &Pad {
        &self.pad
    }

    pub fn timer(&mut self) -> &mut Timer {
        &mut self.timer
    }

    pub fn timer_i(&self) -> &Timer {
        &self.timer
    }

    #[inline(always)]
    pub fn int_serial(&self) -> bool {
        self.int_serial
    }

    #[inline(always)]
    pub fn set_int_serial(&mut self, value: bool) {
        self.int_serial = value;
    }

    #[inline(always)]
    pub fn ack_serial(&mut self) {
        self.set_int_serial(false);
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            // 0x0000-0x3FFF - ROM 0 (16 KB)
            // 0x4000-0x7FFF - ROM 1 (Banked) (16 KB)
            0x0000..=0x7fff => self.rom.read(addr),

            // 0x8000-0x9FFF - Graphics: VRAM (8 KB)
            0x8000..=0x9fff => self.ppu.read(addr),

            // 0xA000-0xBFFF - External RAM (8 KB)
            0xa000..=0xbfff => self.rom.read(addr),

            // 0xC000-0xDFFF - Working RAM (8 KB)
            0xc000..=0xdfff => self.ram[(addr & 0x1fff) as usize],

            // 0xE000-0xFDFF - Working RAM Shadow
            0xe000..=0xfdff => self.ram[(addr & 0x1fff) as usize],

            // 0xFE00-0xFE9F - Object attribute memory (OAM)
            0xfe00..=0xfe9f => self.ppu.read(addr),

            // 0xFEA0-0xFEFF - Not Usable
            0xfea0..=0xfeff => 0xff,

            // 0xFF00 - Joypad input
            0xff00 => self.pad.read(addr),

            // 0xFF01 — SB: Serial transfer data
            SB_ADDR => self.sb,

            // 0xFF02 — SC: Serial transfer control
            SC_ADDR => self.sc | 0x7e,

            // 0xFF04-0xFF07 - Timer and divider
            0xff04..=0xff07 => self.timer.read(addr),

            // 0xFF0F — IF: Interrupt flag
            IF_ADDR =>
            {
                #[allow(clippy::bool_to_int_with_if)]
                (if self.ppu.int_vblank() { 0x01 } else { 0x00 }
                    | if self.ppu.int_stat() { 0x02 } else { 0x00 }
                    | if self.timer.int_tima() { 0x04 } else { 0x00 }
                    | if self.int_serial { 0x08 } else { 0x00 }
                    | if self.pad.int_pad() { 0x10 } else { 0x00 }
                    | 0xe0)
            }

            // 0xFF10-0xFF26 — Audio
            // 0xFF30-0xFF3F — Wave pattern
            0xff10..=0xff26 | 0xff30..=0xff3f => self.apu.read(addr),

            // 0xFF40-0xFF45 - PPU registers
            // 0xFF47-0xFF4B - PPU registers
            0xff40..=0xff45 | 0xff47..=0xff4b => self.ppu.read(addr),

            // 0xFF46 — DMA: OAM DMA source address & start
            DMA_ADDR => self.dma_value,

            // 0xFF80-0xFFFE - High RAM (HRAM)
            0xff80..=0xfffe => self.hram[(addr & 0x007f) as usize],

            // 0xFFFF — IE: Interrupt enable
            0xffff => self.ie,

            addr => {
                warnln!("Reading from unknown location 0x{:04x}", addr);
                #[allow(unreachable_code)]
                0xff
            }
        }
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        match addr {
            // 0x0000-0x3FFF - ROM 0 (16 KB)
            // 0x4000-0x7FFF - ROM 1 (Banked) (16 KB)
            0x0000..=0x7fff => self.rom.write(addr, value),

            // 0x8000-0x9FFF - Graphics: VRAM (8 KB)
            0x8000..=0x9fff => self.ppu.write(addr, value),

            // 0xA000-0xBFFF - External RAM (8 KB)
            0xa000..=0xbfff => self.rom.write(addr, value),

            // 0xC000-0xDFFF - Working RAM (8 KB)
            0xc000..=0xdfff => self.ram[(addr & 0x1fff) as usize] = value,

            // 0xE000-0xFDFF - Working RAM Shadow
            0xe000..=0xfdff => self.ram[(addr & 0x1fff) as usize] = value,

            // 0xFE00-0xFE9F - Object attribute memory (OAM)
            0xfe00..=0xfe9f => self.ppu.write(addr, value),

            // 0xFEA0-0xFEFF - Not Usable
            0xfea0..=0xfeff => {}

            // 0xFF00 - Joypad input
            0xff00 => self.pad.write(addr, value),

            // 0xFF01 — SB: Serial transfer data
            SB_ADDR => self.sb = value,

            // 0xFF02 — SC: Serial transfer control
            SC_ADDR => self.sc = value,

            // 0xFF04-0xFF07 - Timer and divider
            0xff04..=0xff07 => self.timer.write(addr, value),

            // 0xFF0F — IF: Interrupt flag
            IF_ADDR => {
                self.ppu.set_int_vblank(value & 0x01 == 0x01);
                self.ppu.set_int_stat(value & 0x02 == 0x02);
                self.timer.set_int_tima(value & 0x04 == 0x04);
                self.int_serial = value & 0x08 == 0x08;
                self.pad.set_int_pad(value & 0x10 == 0x10);
            }

            // 0xFF10-0xFF26 — Audio
            // 0xFF30-0xFF3F — Wave pattern
            0xff10..=0xff26 | 0xff30..=0xff3f => self.apu.write(addr, value),

            // 0xFF40-0xFF45 - PPU registers
            // 0xFF47-0xFF4B - PPU registers
            0xff40..=0xff45 | 0xff47..=0xff4b => self.ppu.write(addr, value),

            // 0xFF46 — DMA: OAM DMA source address & start
            DMA_ADDR => {
                self.dma_value = value;
                self.run_dma(value);
            }

            // 0xFF80-0xFFFE - High RAM (HRAM)
            0xff80..=0xfffe => self.hram[(addr & 0x007f) as usize] = value,

            // 0xFFFF — IE: Interrupt enable
            0xffff => self.ie = value,

            addr => warnln!("Writing to unknown location 0x{:04x}", addr),
        }
    }

    /// Runs the OAM DMA operation, copying 160 bytes from the page
    /// selected by the written value into the OAM memory. The copy
    /// is treated as instantaneous and goes through the regular bus
    /// routing so that banked cartridge memory is resolved per byte.
    fn run_dma(&mut self, value: u8) {
        let source = (value as u16) << 8;
        for index in 0..DMA_SIZE {
            let byte = self.read(source.wrapping_add(index));
            self.ppu.write(0xfe00 + index, byte);
        }
    }

    pub fn read_many(&self, addr: u16, count: u16) -> Vec<u8> {
        let mut data: Vec<u8> = vec![];

        for index in 0..count {
            let byte = self.read(addr + index);
            data.push(byte);
        }

        data
    }

    pub fn write_many(&mut self, addr: u16, data: &[u8]) {
        for (index, byte) in data.iter().enumerate() {
            self.write(addr + index as u16, *byte)
        }
    }

    pub fn write_ram(&mut self, addr: u16, buffer: &[u8]) {
        self.ram[addr as usize..addr as usize + buffer.len()].clone_from_slice(buffer);
    }

    pub fn ram(&mut self) -> &mut Vec<u8> {
        &mut self.ram
    }

    pub fn ram_i(&self) -> &Vec<u8> {
        &self.ram
    }

    pub fn rom(&mut self) -> &mut Cartridge {
        &mut self.rom
    }

    pub fn rom_i(&self) -> &Cartridge {
        &self.rom
    }

    pub fn set_rom(&mut self, rom: Cartridge) {
        self.rom = rom;
    }

    pub fn set_gbc(&mut self, value: SharedThread<GameBoyConfig>) {
        self.gbc = value;
    }
}

impl Default for Mmu {
    fn default() -> Self {
        let gbc = SharedThread::new(Mutex::new(GameBoyConfig::default()));
        let components = Components {
            ppu: Ppu::default(),
            apu: Apu::default(),
            pad: Pad::default(),
            timer: Timer::default(),
        };
        Mmu::new(components, gbc)
    }
}

#[cfg(test)]
mod tests {
    use super::Mmu;
    use crate::consts::{DIV_ADDR, DMA_ADDR, IF_ADDR};

    #[test]
    fn test_echo_ram_mirror() {
        let mut mmu = Mmu::default();
        mmu.allocate_default();

        mmu.write(0xc123, 0x42);
        assert_eq!(mmu.read(0xe123), 0x42);

        mmu.write(0xe123, 0x24);
        assert_eq!(mmu.read(0xc123), 0x24);
    }

    #[test]
    fn test_unusable_region() {
        let mut mmu = Mmu::default();
        mmu.allocate_default();

        mmu.write(0xfea0, 0x42);
        assert_eq!(mmu.read(0xfea0), 0xff);
        assert_eq!(mmu.read(0xfeff), 0xff);
    }

    #[test]
    fn test_interrupt_flag_masks() {
        let mut mmu = Mmu::default();
        mmu.allocate_default();

        assert_eq!(mmu.read(IF_ADDR), 0xe0);

        mmu.write(IF_ADDR, 0xff);
        assert_eq!(mmu.read(IF_ADDR), 0xff);

        mmu.write(IF_ADDR, 0x00);
        assert_eq!(mmu.read(IF_ADDR), 0xe0);

        mmu.write(IF_ADDR, 0x04);
        assert!(mmu.timer_i().int_tima());
        assert_eq!(mmu.read(IF_ADDR), 0xe4);
    }

    #[test]
    fn test_div_reset_through_bus() {
        let mut mmu = Mmu::default();
        mmu.allocate_default();

        mmu.timer().clock(512);
        assert_eq!(mmu.read(DIV_ADDR), 0x02);

        mmu.write(DIV_ADDR, 0xab);
        assert_eq!(mmu.read(DIV_ADDR), 0x00);
    }

    #[test]
    fn test_oam_dma() {
        let mut mmu = Mmu::default();
        mmu.allocate_default();

        for index in 0..160u16 {
            mmu.write(0xc000 + index, index as u8);
        }
        mmu.write(DMA_ADDR, 0xc0);

        assert_eq!(mmu.read(DMA_ADDR), 0xc0);
        for index in 0..160u16 {
            assert_eq!(mmu.read(0xfe00 + index), index as u8);
        }
    }

    #[test]
    fn test_hram() {
        let mut mmu = Mmu::default();
        mmu.allocate_default();

        mmu.write(0xff80, 0x10);
        mmu.write(0xfffe, 0x20);
        assert_eq!(mmu.read(0xff80), 0x10);
        assert_eq!(mmu.read(0xfffe), 0x20);
    }
}
