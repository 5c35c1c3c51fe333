use crate::display::Screen;
use crate::error::Chip8Error;
use crate::font::{FONT_ADDR, FONT_DATA};

pub type Timer = u8;
pub type Address = u16;

pub const MEM_SIZE: usize = 4096;
pub const PC_START_ADDR: Address = 0x200;
pub const MAX_ROM_SIZE: usize = MEM_SIZE - PC_START_ADDR as usize;
pub const NUM_REGISTERS: usize = 16;
pub const NUM_KEYS: usize = 16;
pub const STACK_SIZE: usize = 16;

const ADDR_MASK: usize = MEM_SIZE - 1;

/// The 4KB address space. Reads wrap around the end of memory; writes made
/// by the program may not touch the reserved region below `PC_START_ADDR`.
pub struct Memory {
    data: [u8; MEM_SIZE],
}
impl Memory {
    pub fn new() -> Self {
        let data = {
            let mut data = [0; MEM_SIZE];
            let font_start = usize::from(FONT_ADDR);
            data[font_start..font_start + FONT_DATA.len()].copy_from_slice(&FONT_DATA);
            data
        };

        Memory { data }
    }

    pub fn read(&self, addr: Address) -> u8 {
        self.data[usize::from(addr) & ADDR_MASK]
    }

    /// Big-endian instruction word at `addr`.
    pub fn read_word(&self, addr: Address) -> u16 {
        let high_byte = u16::from(self.read(addr));
        let low_byte = u16::from(self.read(addr.wrapping_add(1)));
        (high_byte << 8) | low_byte
    }

    /// Writes `bytes` starting at `addr`. Every target address is checked
    /// before any byte is written, so a rejected write leaves memory as it was.
    pub fn write_block(&mut self, addr: Address, bytes: &[u8]) -> Result<(), Chip8Error> {
        let targets = (0..bytes.len()).map(move |offset| (usize::from(addr) + offset) & ADDR_MASK);

        if let Some(reserved) = targets.clone().find(|&t| t < usize::from(PC_START_ADDR)) {
            return Err(Chip8Error::ReservedWrite {
                addr: reserved as Address,
            });
        }
        for (target, &byte) in targets.zip(bytes) {
            self.data[target] = byte;
        }
        Ok(())
    }

    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), Chip8Error> {
        if rom.len() > MAX_ROM_SIZE {
            return Err(Chip8Error::RomTooLarge {
                size: rom.len(),
                max_size: MAX_ROM_SIZE,
            });
        }
        let start = usize::from(PC_START_ADDR);
        self.data[start..start + rom.len()].copy_from_slice(rom);
        Ok(())
    }

    pub fn read_sprite(&self, index: Address, rows: u8) -> impl Iterator<Item = u8> + '_ {
        (0..u16::from(rows)).map(move |row| self.read(index.wrapping_add(row)))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}
impl Default for Memory {
    fn default() -> Self {
        Memory::new()
    }
}

/// One of V0-VF, taken from an instruction nibble.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Register(u8);
impl Register {
    pub const V0: Register = Register(0x0);
    pub const VF: Register = Register(0xF);

    pub fn from_nibble(value: u8) -> Self {
        Register(value & 0x0F)
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

pub struct RegisterBank {
    registers: [u8; NUM_REGISTERS],
}
impl RegisterBank {
    pub fn new() -> Self {
        RegisterBank {
            registers: [0; NUM_REGISTERS],
        }
    }

    pub fn read(&self, reg: Register) -> u8 {
        self.registers[reg.index()]
    }

    pub fn write(&mut self, reg: Register, value: u8) {
        self.registers[reg.index()] = value;
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.registers
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.registers
    }
}

/// Fixed-depth return address stack.
pub struct CallStack {
    slots: [Address; STACK_SIZE],
    sp: usize,
}
impl CallStack {
    pub fn new() -> Self {
        CallStack {
            slots: [0; STACK_SIZE],
            sp: 0,
        }
    }

    pub fn is_full(&self) -> bool {
        self.sp == STACK_SIZE
    }

    pub fn depth(&self) -> usize {
        self.sp
    }

    /// Pushes `addr` unless the stack is already full; callers check
    /// `is_full` first to report the overflow.
    pub fn push(&mut self, addr: Address) {
        if let Some(slot) = self.slots.get_mut(self.sp) {
            *slot = addr;
            self.sp += 1;
        }
    }

    pub fn pop(&mut self) -> Option<Address> {
        self.sp = self.sp.checked_sub(1)?;
        Some(self.slots[self.sp])
    }
}

pub struct Keypad {
    keys: [bool; NUM_KEYS],
}
impl Keypad {
    pub fn new() -> Self {
        Keypad {
            keys: [false; NUM_KEYS],
        }
    }

    pub fn press_key(&mut self, key: u8) -> Result<(), Chip8Error> {
        self.set(key, true)
    }

    pub fn release_key(&mut self, key: u8) -> Result<(), Chip8Error> {
        self.set(key, false)
    }

    pub fn release_all(&mut self) {
        self.keys.fill(false);
    }

    /// Only the low nibble of `key` is considered.
    pub fn is_key_pressed(&self, key: u8) -> bool {
        self.keys[usize::from(key & 0x0F)]
    }

    fn set(&mut self, key: u8, pressed: bool) -> Result<(), Chip8Error> {
        let slot = self
            .keys
            .get_mut(usize::from(key))
            .ok_or(Chip8Error::InvalidKey(key))?;
        *slot = pressed;
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunState {
    Running,
    WaitingForInput,
    /// Terminal: the fetched word matched no instruction form.
    InvalidOpcode,
    /// Terminal: a stack overflow/underflow or a reserved memory write.
    Faulted,
}

pub struct Chip8State {
    pub memory: Memory,
    pub registers: RegisterBank,
    pub pc: Address,
    pub index: Address,
    pub stack: CallStack,
    pub delay_timer: Timer,
    pub sound_timer: Timer,
    pub display: Screen,
    pub keypad: Keypad,
    pub run_state: RunState,
    /// Destination of a pending key wait.
    pub awaiting_key: Option<Register>,
}
impl Chip8State {
    pub fn new() -> Self {
        Chip8State {
            memory: Memory::new(),
            registers: RegisterBank::new(),
            pc: PC_START_ADDR,
            index: 0,
            stack: CallStack::new(),
            delay_timer: 0,
            sound_timer: 0,
            display: Screen::new(),
            keypad: Keypad::new(),
            run_state: RunState::Running,
            awaiting_key: None,
        }
    }

    pub fn reset(&mut self) {
        *self = Chip8State::new();
    }

    pub fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }
}
impl Default for Chip8State {
    fn default() -> Self {
        Chip8State::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_memory_holds_font_only() {
        let memory = Memory::new();
        let font_start = usize::from(FONT_ADDR);
        assert_eq!(
            &memory.as_slice()[font_start..font_start + FONT_DATA.len()],
            &FONT_DATA[..]
        );
        assert!(memory.as_slice()[usize::from(PC_START_ADDR)..].iter().all(|&b| b == 0));
    }

    #[test]
    fn load_rom_copies_at_start_address() {
        let mut memory = Memory::new();
        memory.load_rom(&[0x12, 0x34, 0x56]).unwrap();
        assert_eq!(memory.read(0x200), 0x12);
        assert_eq!(memory.read(0x201), 0x34);
        assert_eq!(memory.read(0x202), 0x56);
    }

    #[test]
    fn load_rom_accepts_exact_fit() {
        let mut memory = Memory::new();
        let rom = vec![0xAB; MAX_ROM_SIZE];
        memory.load_rom(&rom).unwrap();
        assert_eq!(memory.read(0xFFF), 0xAB);
    }

    #[test]
    fn load_rom_rejects_oversized_rom_without_writing() {
        let mut memory = Memory::new();
        let rom = vec![0xAB; MAX_ROM_SIZE + 1];
        assert_eq!(
            memory.load_rom(&rom),
            Err(Chip8Error::RomTooLarge {
                size: MAX_ROM_SIZE + 1,
                max_size: MAX_ROM_SIZE
            })
        );
        assert_eq!(memory.read(0x200), 0);
    }

    #[test]
    fn reads_wrap_around_address_space() {
        let mut memory = Memory::new();
        memory.write_block(0xFFF, &[0xA2]).unwrap();
        assert_eq!(memory.read(0x1FFF), 0xA2);
        assert_eq!(memory.read_word(0xFFF), 0xA200);
    }

    #[test]
    fn write_block_rejects_reserved_region_atomically() {
        let mut memory = Memory::new();
        assert_eq!(
            memory.write_block(0xFFE, &[1, 2, 3]),
            Err(Chip8Error::ReservedWrite { addr: 0x000 })
        );
        assert_eq!(memory.read(0xFFE), 0);
        assert_eq!(memory.read(0xFFF), 0);
        assert_eq!(
            memory.write_block(0x1FF, &[1]),
            Err(Chip8Error::ReservedWrite { addr: 0x1FF })
        );
    }

    #[test]
    fn register_from_nibble_masks() {
        assert_eq!(Register::from_nibble(0x1F), Register::VF);
        let mut bank = RegisterBank::new();
        bank.write(Register::from_nibble(3), 7);
        assert_eq!(bank.as_slice()[3], 7);
    }

    #[test]
    fn call_stack_is_bounded() {
        let mut stack = CallStack::new();
        assert_eq!(stack.pop(), None);
        for addr in 0..STACK_SIZE as Address {
            assert!(!stack.is_full());
            stack.push(0x200 + addr * 2);
        }
        assert!(stack.is_full());
        stack.push(0xFFF);
        assert_eq!(stack.depth(), STACK_SIZE);
        assert_eq!(stack.pop(), Some(0x21E));
        assert_eq!(stack.depth(), STACK_SIZE - 1);
    }

    #[test]
    fn keypad_tracks_each_key() {
        let mut keypad = Keypad::new();
        keypad.press_key(0x3).unwrap();
        keypad.press_key(0xC).unwrap();
        assert!(keypad.is_key_pressed(0x3));
        assert!(keypad.is_key_pressed(0xC));
        keypad.release_key(0x3).unwrap();
        assert!(!keypad.is_key_pressed(0x3));
        assert_eq!(keypad.press_key(16), Err(Chip8Error::InvalidKey(16)));
        keypad.release_all();
        assert!(!keypad.is_key_pressed(0xC));
    }

    #[test]
    fn timers_floor_at_zero() {
        let mut state = Chip8State::new();
        state.delay_timer = 1;
        state.sound_timer = 0;
        state.tick_timers();
        state.tick_timers();
        assert_eq!(state.delay_timer, 0);
        assert_eq!(state.sound_timer, 0);
    }
}
