//! Shared test utilities, to be used both by unit tests
//! and by external benchmark and validation code.

use crate::gb::GameBoy;

#[derive(Default)]
pub struct TestOptions {
    pub ppu_enabled: Option<bool>,
    pub apu_enabled: Option<bool>,
    pub timer_enabled: Option<bool>,
}

/// Builds a booted Game Boy instance ready for testing, with
/// the components enabled according to the provided options.
pub fn build_test(options: TestOptions) -> Box<GameBoy> {
    let mut game_boy = Box::new(GameBoy::new());
    game_boy.set_ppu_enabled(options.ppu_enabled.unwrap_or(true));
    game_boy.set_apu_enabled(options.apu_enabled.unwrap_or(true));
    game_boy.set_timer_enabled(options.timer_enabled.unwrap_or(true));
    game_boy.load();
    game_boy.boot();
    game_boy
}

/// Builds an in-memory ROM image with the provided cartridge
/// type, ROM size code and RAM size code, including a valid
/// header checksum. The remaining bytes are left zeroed.
pub fn build_rom(rom_type: u8, rom_size: u8, ram_size: u8) -> Vec<u8> {
    let banks = 2usize << rom_size;
    let mut data = vec![0u8; banks * 16384];
    data[0x0147] = rom_type;
    data[0x0148] = rom_size;
    data[0x0149] = ram_size;

    let mut checksum: u8 = 0;
    for i in 0x0134..=0x014c {
        checksum = checksum.wrapping_sub(data[i]).wrapping_sub(1);
    }
    data[0x014d] = checksum;

    data
}

#[cfg(test)]
mod tests {
    use super::build_rom;
    use crate::rom::Cartridge;

    #[test]
    fn test_build_rom_checksum() {
        let data = build_rom(0x00, 0x00, 0x00);
        assert_eq!(data.len(), 32 * 1024);

        let cartridge = Cartridge::from_data(&data).unwrap();
        assert!(cartridge.valid_checksum());
    }
}
