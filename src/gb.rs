//! Game Boy emulation entrypoint and associated functions and structures.
//!
//! Most of the meaningful publicly available functions and structures to build
//! a working emulator should be present here.
//!
//! # Examples
//!
//! Creates a simple [`GameBoy`] instance, loads an empty cartridge and runs
//! a complete frame of emulation.
//!
//! ```rust
//! use dmgboy::gb::GameBoy;
//! let mut game_boy = GameBoy::new();
//! game_boy.load();
//! game_boy.load_rom_empty().unwrap();
//! let cycles = game_boy.run_frame();
//! println!("Ran {} cycles", cycles);
//! ```

use std::{
    collections::VecDeque,
    fmt::{self, Display, Formatter},
    sync::{Arc, Mutex},
};

use dmgboy_common::{
    error::Error,
    util::{read_file, SharedThread},
};

use crate::{
    apu::Apu,
    cpu::Cpu,
    info::Info,
    mmu::Mmu,
    pad::{Pad, PadKey},
    ppu::{Ppu, PpuMode, Tile, DISPLAY_HEIGHT, DISPLAY_WIDTH, FRAME_BUFFER_SIZE},
    rom::Cartridge,
    timer::Timer,
};

#[cfg(feature = "wasm")]
use wasm_bindgen::prelude::*;

/// Configuration structure shared between the Game Boy components,
/// allows global control over the emulation behaviour.
#[cfg_attr(feature = "wasm", wasm_bindgen)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct GameBoyConfig {
    /// If the PPU is enabled, it will be clocked.
    ppu_enabled: bool,

    /// If the APU is enabled, it will be clocked.
    apu_enabled: bool,

    /// If the timer is enabled, it will be clocked.
    timer_enabled: bool,

    /// The current frequency at which the Game Boy
    /// emulator is being handled. This is a "hint" that
    /// may help components to adjust their internal
    /// logic to match the current frequency. For example
    /// the APU will adjust its internal clock to match
    /// this hint.
    clock_freq: u32,
}

#[cfg_attr(feature = "wasm", wasm_bindgen)]
impl GameBoyConfig {
    pub fn ppu_enabled(&self) -> bool {
        self.ppu_enabled
    }

    pub fn set_ppu_enabled(&mut self, value: bool) {
        self.ppu_enabled = value;
    }

    pub fn apu_enabled(&self) -> bool {
        self.apu_enabled
    }

    pub fn set_apu_enabled(&mut self, value: bool) {
        self.apu_enabled = value;
    }

    pub fn timer_enabled(&self) -> bool {
        self.timer_enabled
    }

    pub fn set_timer_enabled(&mut self, value: bool) {
        self.timer_enabled = value;
    }

    pub fn clock_freq(&self) -> u32 {
        self.clock_freq
    }

    pub fn set_clock_freq(&mut self, value: u32) {
        self.clock_freq = value;
    }
}

impl Default for GameBoyConfig {
    fn default() -> Self {
        Self {
            ppu_enabled: true,
            apu_enabled: true,
            timer_enabled: true,
            clock_freq: GameBoy::CPU_FREQ,
        }
    }
}

/// Aggregation structure allowing the bundling of
/// all the components of a GameBoy into a single
/// element for easy access.
pub struct Components {
    pub ppu: Ppu,
    pub apu: Apu,
    pub pad: Pad,
    pub timer: Timer,
}

#[cfg_attr(feature = "wasm", wasm_bindgen)]
pub struct Registers {
    pub pc: u16,
    pub sp: u16,
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub scy: u8,
    pub scx: u8,
    pub wy: u8,
    pub wx: u8,
    pub ly: u8,
    pub lyc: u8,
}

/// Top level structure that abstracts the usage of the
/// Game Boy system under the DMG Boy emulator.
///
/// Should serve as the main entry-point API.
#[cfg_attr(feature = "wasm", wasm_bindgen)]
pub struct GameBoy {
    /// If the PPU is enabled, it will be clocked.
    ///
    /// This is a clone of the configuration value
    /// kept for performance reasons.
    ppu_enabled: bool,

    /// If the APU is enabled, it will be clocked.
    ///
    /// This is a clone of the configuration value
    /// kept for performance reasons.
    apu_enabled: bool,

    /// If the timer is enabled, it will be clocked.
    ///
    /// This is a clone of the configuration value
    /// kept for performance reasons.
    timer_enabled: bool,

    /// The current frequency at which the Game Boy
    /// emulator is being handled.
    ///
    /// This is a clone of the configuration value
    /// kept for performance reasons.
    clock_freq: u32,

    /// Reference to the Game Boy CPU component to be
    /// used as the main element of the system, when
    /// clocked, the amount of ticks from it will be
    /// used as reference for the rest of the components.
    cpu: Cpu,

    /// The reference counted and mutable reference to
    /// the Game Boy configuration structure that can be
    /// used by the GB components to access global
    /// configuration values of the current emulator.
    ///
    /// If performance is required (many value accesses)
    /// the values should be cloned and stored locally.
    gbc: SharedThread<GameBoyConfig>,
}

#[cfg_attr(feature = "wasm", wasm_bindgen)]
impl GameBoy {
    #[cfg_attr(feature = "wasm", wasm_bindgen(constructor))]
    pub fn new() -> Self {
        let gbc = Arc::new(Mutex::new(GameBoyConfig::default()));

        let components = Components {
            ppu: Ppu::default(),
            apu: Apu::default(),
            pad: Pad::default(),
            timer: Timer::default(),
        };
        let mmu = Mmu::new(components, gbc.clone());
        let cpu = Cpu::new(mmu, gbc.clone());

        Self {
            ppu_enabled: true,
            apu_enabled: true,
            timer_enabled: true,
            clock_freq: GameBoy::CPU_FREQ,
            cpu,
            gbc,
        }
    }

    pub fn verify_rom(data: &[u8]) -> bool {
        Cartridge::from_data(data).is_ok()
    }

    pub fn reset(&mut self) {
        self.ppu().reset();
        self.apu().reset();
        self.timer().reset();
        self.pad().reset();
        self.mmu().reset();
        self.cpu.reset();
    }

    /// Advances the clock of the system by one tick, this will
    /// usually imply executing one CPU instruction and advancing
    /// all the other components of the system by the same amount
    /// of cycles.
    ///
    /// The amount of cycles executed by the CPU is returned.
    pub fn clock(&mut self) -> u16 {
        let mut cycles = self.cpu_clock() as u16;
        if cycles < 4 {
            cycles = 4;
        }
        self.clock_devices(cycles);
        cycles
    }

    /// Runs one complete frame worth of emulation, stepping the
    /// CPU and the devices until the frame cycle budget (70224
    /// T-cycles) is consumed. Returns the number of cycles that
    /// have effectively been executed.
    ///
    /// The external loop should call this function once per
    /// display vsync.
    pub fn run_frame(&mut self) -> u32 {
        let mut cycles = 0u32;
        while cycles < GameBoy::LCD_CYCLES {
            cycles += self.clock() as u32;
        }
        cycles
    }

    /// Equivalent to `clock()` but allows the execution of multiple
    /// clock operations in a single call.
    pub fn clocks(&mut self, count: usize) -> u64 {
        let mut cycles = 0_u64;
        for _ in 0..count {
            cycles += self.clock() as u64;
        }
        cycles
    }

    /// Clocks the emulator until the limit of cycles that has been
    /// provided and returns the amount of cycles that have been
    /// clocked.
    pub fn clocks_cycles(&mut self, limit: usize) -> u64 {
        let mut cycles = 0_u64;
        while cycles < limit as u64 {
            cycles += self.clock() as u64;
        }
        cycles
    }

    /// Clocks the emulator until the next frame boundary is
    /// reached, returning the cycles executed.
    pub fn next_frame(&mut self) -> u32 {
        let mut cycles = 0u32;
        let current_frame = self.ppu_frame();
        while self.ppu_frame() == current_frame {
            cycles += self.clock() as u32;
        }
        cycles
    }

    /// Clocks the emulator until the PC (Program Counter) reaches
    /// the provided address, returning the cycles executed.
    pub fn step_to(&mut self, addr: u16) -> u32 {
        let mut cycles = 0u32;
        while self.cpu_i().pc() != addr {
            cycles += self.clock() as u32;
        }
        cycles
    }

    #[inline(always)]
    fn clock_devices(&mut self, cycles: u16) {
        if self.ppu_enabled {
            self.ppu_clock(cycles);
        }
        if self.timer_enabled {
            self.timer_clock(cycles);
        }
        if self.apu_enabled {
            self.apu_clock(cycles);
        }
    }

    pub fn key_press(&mut self, key: PadKey) {
        self.pad().key_press(key);
    }

    pub fn key_lift(&mut self, key: PadKey) {
        self.pad().key_lift(key);
    }

    /// External entry point for the host input integration, maps
    /// a raw button identifier (0 to 7, in the Right, Left, Up,
    /// Down, A, B, Select, Start order) into the joypad matrix.
    pub fn set_button(&mut self, id: u8, pressed: bool) {
        self.pad().set_button(id, pressed);
    }

    /// Controls the muted state of the audio output, while muted
    /// the APU keeps running (timing is unaffected) but emits
    /// silence samples.
    pub fn set_audio_mute(&mut self, muted: bool) {
        self.apu().set_muted(muted);
    }

    pub fn audio_mute(&self) -> bool {
        self.apu_i().muted()
    }

    pub fn cpu_clock(&mut self) -> u8 {
        self.cpu.clock()
    }

    pub fn ppu_clock(&mut self, cycles: u16) {
        self.ppu().clock(cycles)
    }

    pub fn apu_clock(&mut self, cycles: u16) {
        self.apu().clock(cycles)
    }

    pub fn timer_clock(&mut self, cycles: u16) {
        self.timer().clock(cycles)
    }

    pub fn ppu_ly(&mut self) -> u8 {
        self.ppu().ly()
    }

    pub fn ppu_mode(&mut self) -> PpuMode {
        self.ppu().mode()
    }

    pub fn ppu_frame(&mut self) -> u16 {
        self.ppu().frame_index()
    }

    /// Direct boot method that immediately jumps the machine
    /// to the post boot state, this will effectively skip the
    /// boot sequence and jump to the cartridge execution.
    pub fn boot(&mut self) {
        self.cpu.boot();
    }

    /// Allocates the internal memory of the system, must be
    /// called before any emulation starts.
    pub fn load(&mut self) {
        self.mmu().allocate_default();
    }

    pub fn vram_eager(&mut self) -> Vec<u8> {
        self.ppu().vram().to_vec()
    }

    pub fn frame_buffer_eager(&mut self) -> Vec<u8> {
        self.frame_buffer().to_vec()
    }

    /// Copies up to the target length of audio samples from the
    /// APU ring buffer into the provided buffer, returning the
    /// number of samples that have been effectively copied. The
    /// remaining positions are zero filled.
    pub fn audio_fill(&mut self, target: &mut [f32]) -> usize {
        self.apu().fill_buffer(target)
    }

    pub fn audio_sampling_rate(&self) -> u32 {
        self.apu_i().sampling_rate()
    }

    pub fn registers(&mut self) -> Registers {
        let ppu_registers = self.ppu().registers();
        Registers {
            pc: self.cpu.pc,
            sp: self.cpu.sp,
            a: self.cpu.a,
            b: self.cpu.b,
            c: self.cpu.c,
            d: self.cpu.d,
            e: self.cpu.e,
            h: self.cpu.h,
            l: self.cpu.l,
            scy: ppu_registers.scy,
            scx: ppu_registers.scx,
            wy: ppu_registers.wy,
            wx: ppu_registers.wx,
            ly: ppu_registers.ly,
            lyc: ppu_registers.lyc,
        }
    }

    /// Obtains the tile structure for the tile at the
    /// given index, no conversion in the pixel buffer
    /// is done so that the color reference is the GB one.
    pub fn get_tile(&mut self, index: usize) -> Tile {
        self.ppu().tiles()[index]
    }

    pub fn display_width(&self) -> usize {
        DISPLAY_WIDTH
    }

    pub fn display_height(&self) -> usize {
        DISPLAY_HEIGHT
    }

    pub fn ppu_enabled(&self) -> bool {
        self.ppu_enabled
    }

    pub fn set_ppu_enabled(&mut self, value: bool) {
        self.ppu_enabled = value;
        (*self.gbc).lock().unwrap().set_ppu_enabled(value);
    }

    pub fn apu_enabled(&self) -> bool {
        self.apu_enabled
    }

    pub fn set_apu_enabled(&mut self, value: bool) {
        self.apu_enabled = value;
        (*self.gbc).lock().unwrap().set_apu_enabled(value);
    }

    pub fn timer_enabled(&self) -> bool {
        self.timer_enabled
    }

    pub fn set_timer_enabled(&mut self, value: bool) {
        self.timer_enabled = value;
        (*self.gbc).lock().unwrap().set_timer_enabled(value);
    }

    pub fn set_all_enabled(&mut self, value: bool) {
        self.set_ppu_enabled(value);
        self.set_apu_enabled(value);
        self.set_timer_enabled(value);
    }

    pub fn clock_freq(&self) -> u32 {
        self.clock_freq
    }

    pub fn set_clock_freq(&mut self, value: u32) {
        self.clock_freq = value;
        (*self.gbc).lock().unwrap().set_clock_freq(value);
        self.apu().set_clock_freq(value);
    }

    pub fn clock_freq_s(&self) -> String {
        format!("{:.02} Mhz", self.clock_freq() as f32 / 1000.0 / 1000.0)
    }

    pub fn description(&self, column_length: usize) -> String {
        let version_l = format!("{:width$}", "Version", width = column_length);
        let clock_l = format!("{:width$}", "Clock", width = column_length);
        format!(
            "{}  {}\n{}  {}",
            version_l,
            Info::version(),
            clock_l,
            self.clock_freq_s(),
        )
    }
}

/// Game Boy implementations that are meant with performance
/// in mind and that do not support the WASM interface.
impl GameBoy {
    /// The logic frequency of the Game Boy
    /// CPU in hz.
    pub const CPU_FREQ: u32 = 4194304;

    /// The visual frequency (refresh rate)
    /// of the Game Boy, close to 60 hz.
    pub const VISUAL_FREQ: f32 = 59.7275;

    /// The cycles taken to run a complete frame
    /// loop in the Game Boy's PPU (in CPU cycles).
    pub const LCD_CYCLES: u32 = 70224;

    pub fn cpu(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn cpu_i(&self) -> &Cpu {
        &self.cpu
    }

    pub fn mmu(&mut self) -> &mut Mmu {
        self.cpu.mmu()
    }

    pub fn mmu_i(&self) -> &Mmu {
        self.cpu.mmu_i()
    }

    pub fn ppu(&mut self) -> &mut Ppu {
        self.cpu.mmu().ppu()
    }

    pub fn ppu_i(&self) -> &Ppu {
        self.cpu.mmu_i().ppu_i()
    }

    pub fn apu(&mut self) -> &mut Apu {
        self.cpu.mmu().apu()
    }

    pub fn apu_i(&self) -> &Apu {
        self.cpu.mmu_i().apu_i()
    }

    pub fn pad(&mut self) -> &mut Pad {
        self.cpu.mmu().pad()
    }

    pub fn pad_i(&self) -> &Pad {
        self.cpu.mmu_i().pad_i()
    }

    pub fn timer(&mut self) -> &mut Timer {
        self.cpu.mmu().timer()
    }

    pub fn timer_i(&self) -> &Timer {
        self.cpu.mmu_i().timer_i()
    }

    pub fn rom(&mut self) -> &mut Cartridge {
        self.mmu().rom()
    }

    pub fn rom_i(&self) -> &Cartridge {
        self.mmu_i().rom_i()
    }

    /// Obtains the current frame buffer of the machine as a
    /// 160x144 RGBA (R, G, B, A byte order) pixel buffer.
    pub fn frame_buffer(&mut self) -> &[u8; FRAME_BUFFER_SIZE] {
        self.ppu().frame_buffer()
    }

    /// Alias accessor for the frame buffer, the naming used
    /// by the video oriented host integrations.
    pub fn video_buffer(&mut self) -> &[u8; FRAME_BUFFER_SIZE] {
        self.frame_buffer()
    }

    pub fn audio_buffer(&mut self) -> &VecDeque<f32> {
        self.apu().audio_buffer()
    }

    pub fn load_cartridge(&mut self, rom: Cartridge) -> Result<&mut Cartridge, Error> {
        self.mmu().set_rom(rom);
        Ok(self.mmu().rom())
    }

    /// Loads a new cartridge ROM from the provided data buffer,
    /// replacing the currently emulated machine's cartridge.
    ///
    /// In case the operation fails the machine is left in the
    /// "no cartridge" state where all cartridge reads yield 0xFF.
    pub fn load_rom(&mut self, data: &[u8]) -> Result<&mut Cartridge, Error> {
        let rom = match Cartridge::from_data(data) {
            Ok(rom) => rom,
            Err(error) => {
                self.mmu().set_rom(Cartridge::new());
                return Err(error);
            }
        };
        self.load_cartridge(rom)
    }

    pub fn load_rom_file(&mut self, path: &str) -> Result<&mut Cartridge, Error> {
        let data = read_file(path)?;
        self.load_rom(&data)
    }

    /// Loads a valid (but empty) 32KB cartridge, useful for testing
    /// purposes where no real ROM contents are required.
    pub fn load_rom_empty(&mut self) -> Result<&mut Cartridge, Error> {
        let mut data = [0u8; 32 * 1024];
        let mut checksum: u8 = 0;
        for i in 0x0134..=0x014c {
            checksum = checksum.wrapping_sub(data[i]).wrapping_sub(1);
        }
        data[0x014d] = checksum;
        self.load_rom(&data)
    }

    pub fn read_memory(&mut self, addr: u16) -> u8 {
        self.mmu().read(addr)
    }

    pub fn write_memory(&mut self, addr: u16, value: u8) {
        self.mmu().write(addr, value);
    }
}

impl Default for GameBoy {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for GameBoy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description(9))
    }
}

#[cfg(test)]
mod tests {
    use super::GameBoy;
    use crate::{
        consts::{IF_ADDR, LY_ADDR},
        ppu::{FRAME_BUFFER_SIZE, RGBA_SIZE},
        test::{build_rom, build_test, TestOptions},
    };

    #[test]
    fn test_boot_state() {
        let mut game_boy = build_test(TestOptions::default());
        game_boy.load_rom_empty().unwrap();

        assert_eq!(game_boy.cpu_i().pc(), 0x0100);
        assert_eq!(game_boy.cpu_i().sp(), 0xfffe);
        assert_eq!(game_boy.cpu_i().af(), 0x01b0);
        assert_eq!(game_boy.cpu_i().bc(), 0x0013);
        assert_eq!(game_boy.cpu_i().de(), 0x00d8);
        assert_eq!(game_boy.cpu_i().hl(), 0x014d);
        assert!(!game_boy.cpu_i().ime());

        assert_eq!(game_boy.read_memory(0xff40), 0x91);
        assert_eq!(game_boy.read_memory(0xff47), 0xfc);
    }

    #[test]
    fn test_nop_frame() {
        let mut game_boy = build_test(TestOptions::default());

        // builds a 32KB ROM filled with NOPs and a JP $0100
        // at the entrypoint, making the CPU loop forever
        let mut data = build_rom(0x00, 0x00, 0x00);
        data[0x0100] = 0xc3;
        data[0x0101] = 0x00;
        data[0x0102] = 0x01;
        game_boy.load_rom(&data).unwrap();

        let cycles = game_boy.run_frame();
        assert!(cycles >= GameBoy::LCD_CYCLES);

        // exactly one frame has elapsed, one V-Blank interrupt
        // has been raised and the PC is still inside the loop
        assert_eq!(game_boy.ppu_frame(), 1);
        assert_eq!(game_boy.read_memory(IF_ADDR) & 0x01, 0x01);
        assert!(game_boy.cpu_i().pc() >= 0x0100 && game_boy.cpu_i().pc() <= 0x0103);

        // the frame buffer is uniformly set to the first shade
        // of the background palette
        let frame_buffer = game_boy.frame_buffer();
        let first_pixel = [frame_buffer[0], frame_buffer[1], frame_buffer[2]];
        for pixel in frame_buffer.chunks(RGBA_SIZE) {
            assert_eq!(pixel[0], first_pixel[0]);
            assert_eq!(pixel[1], first_pixel[1]);
            assert_eq!(pixel[2], first_pixel[2]);
            assert_eq!(pixel[3], 0xff);
        }
        assert_eq!(frame_buffer.len(), FRAME_BUFFER_SIZE);
    }

    #[test]
    fn test_ly_cycles_through_frame() {
        let mut game_boy = build_test(TestOptions::default());
        game_boy.load_rom_empty().unwrap();

        let mut seen = [false; 154];
        let current_frame = game_boy.ppu_frame();
        while game_boy.ppu_frame() == current_frame {
            game_boy.clock();
            seen[game_boy.read_memory(LY_ADDR) as usize] = true;
        }
        assert!(seen.iter().filter(|s| **s).count() >= 153);
    }

    #[test]
    fn test_audio_fill_frame() {
        let mut game_boy = build_test(TestOptions::default());
        game_boy.load_rom_empty().unwrap();
        game_boy.run_frame();

        // one frame of audio at 44.1kHz is roughly 738 samples
        let mut buffer = [0.0f32; 1024];
        let count = game_boy.audio_fill(&mut buffer);
        assert!(count > 700 && count < 800);
        assert_eq!(game_boy.audio_fill(&mut buffer), 0);
    }

    #[test]
    fn test_set_button_interrupt() {
        let mut game_boy = build_test(TestOptions::default());
        game_boy.load_rom_empty().unwrap();

        game_boy.set_button(7, true);
        assert_eq!(game_boy.read_memory(IF_ADDR) & 0x10, 0x10);

        // with the button group selected the start key should
        // clear its active-low matrix line
        game_boy.write_memory(0xff00, 0x10);
        assert_eq!(game_boy.read_memory(0xff00) & 0x08, 0x00);

        game_boy.set_button(7, false);
        assert_eq!(game_boy.read_memory(0xff00) & 0x0f, 0x0f);
    }
}
