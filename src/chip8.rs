use log::{debug, trace, warn};

use crate::display::Screen;
use crate::error::Chip8Error;
use crate::instruction::decode;
use crate::peripherals::Peripherals;
use crate::state::{Address, Chip8State, RunState, Timer};

/// A CHIP-8 machine: the interpreter state plus the host capabilities it
/// draws on. Callers drive it one instruction at a time with `cycle` and
/// pace `tick_timers` at 60Hz themselves.
pub struct Chip8<P: Peripherals> {
    state: Chip8State,
    peripherals: P,
    /// Set exactly when the run state is terminal.
    fault: Option<Chip8Error>,
}

impl<P: Peripherals> Chip8<P> {
    /// Creates an initialized machine.
    pub fn new(peripherals: P) -> Self {
        Chip8 {
            state: Chip8State::new(),
            peripherals,
            fault: None,
        }
    }

    /// Resets memory, registers, stack, display, timers and keypad, reloads
    /// the font and sets the machine running from `PC_START_ADDR`.
    pub fn init(&mut self) {
        self.state.reset();
        self.fault = None;
        debug!("Machine initialized");
    }

    /// Copies `rom` into memory at `PC_START_ADDR`. Memory is untouched when
    /// the ROM is rejected.
    pub fn load_rom(&mut self, rom: Option<&[u8]>) -> Result<(), Chip8Error> {
        let rom = rom.ok_or(Chip8Error::NullRom)?;
        self.state.memory.load_rom(rom)?;
        debug!("Loaded {} byte ROM", rom.len());
        Ok(())
    }

    /// Executes exactly one instruction.
    ///
    /// While waiting for a key this does nothing. Once the machine has hit an
    /// invalid opcode or a fault, every call returns that same error and
    /// leaves the state alone.
    pub fn cycle(&mut self) -> Result<(), Chip8Error> {
        if let Some(fault) = &self.fault {
            return Err(fault.clone());
        }
        if self.state.run_state == RunState::WaitingForInput {
            return Ok(());
        }

        let addr = self.state.pc;
        let raw = self.state.memory.read_word(addr);
        trace!("{addr:#05X}: {raw:04X}");

        let result = decode(raw, addr).and_then(|instruction| {
            self.state.pc = addr.wrapping_add(2);
            instruction.execute(&mut self.state, &mut self.peripherals)
        });
        if let Err(error) = result {
            self.state.pc = addr;
            self.state.run_state = match error {
                Chip8Error::InvalidOpcode { .. } => RunState::InvalidOpcode,
                _ => RunState::Faulted,
            };
            warn!("Machine halted: {error}");
            self.fault = Some(error.clone());
            return Err(error);
        }
        Ok(())
    }

    /// Counts both timers down by one, stopping at zero. Only a running
    /// machine's timers move.
    pub fn tick_timers(&mut self) {
        if self.state.run_state == RunState::Running {
            self.state.tick_timers();
        }
    }

    /// Marks `key` pressed. A machine waiting on a key stores it in the
    /// waiting register and resumes.
    pub fn press_key(&mut self, key: u8) -> Result<(), Chip8Error> {
        self.state.keypad.press_key(key)?;

        if self.state.run_state == RunState::WaitingForInput {
            if let Some(reg) = self.state.awaiting_key.take() {
                self.state.registers.write(reg, key);
            }
            self.state.run_state = RunState::Running;
            debug!("Key {key:X} resumed execution");
        }
        Ok(())
    }

    pub fn release_key(&mut self, key: u8) -> Result<(), Chip8Error> {
        self.state.keypad.release_key(key)
    }

    pub fn release_all_keys(&mut self) {
        self.state.keypad.release_all();
    }

    pub fn run_state(&self) -> RunState {
        self.state.run_state
    }

    /// The error that halted the machine, if any.
    pub fn fault(&self) -> Option<&Chip8Error> {
        self.fault.as_ref()
    }

    pub fn screen(&self) -> &Screen {
        &self.state.display
    }

    pub fn registers(&self) -> &[u8] {
        self.state.registers.as_slice()
    }

    pub fn index(&self) -> Address {
        self.state.index
    }

    pub fn pc(&self) -> Address {
        self.state.pc
    }

    pub fn stack_depth(&self) -> usize {
        self.state.stack.depth()
    }

    pub fn delay_timer(&self) -> Timer {
        self.state.delay_timer
    }

    pub fn sound_timer(&self) -> Timer {
        self.state.sound_timer
    }

    /// Whether a frontend should currently be sounding its tone.
    pub fn sound_active(&self) -> bool {
        self.state.sound_timer > 0
    }

    pub fn memory(&self) -> &[u8] {
        self.state.memory.as_slice()
    }

    pub fn is_key_pressed(&self, key: u8) -> bool {
        self.state.keypad.is_key_pressed(key)
    }

    pub fn peripherals(&self) -> &P {
        &self.peripherals
    }

    pub fn peripherals_mut(&mut self) -> &mut P {
        &mut self.peripherals
    }
}
