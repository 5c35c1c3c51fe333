use crate::error::Chip8Error;
use crate::font::glyph_addr;
use crate::peripherals::{Peripherals, Redraw};
use crate::state::{Address, Chip8State, Register, RunState};

/// One decoded instruction. By the time `execute` runs, the program counter
/// already points at the following instruction.
pub trait Instruction {
    fn execute(&self, state: &mut Chip8State, io: &mut dyn Peripherals) -> Result<(), Chip8Error>;
}

pub fn decode(raw: u16, addr: Address) -> Result<Box<dyn Instruction>, Chip8Error> {
    let decoded = DecodedInstruction::new(raw);
    let invalid = || -> Result<Box<dyn Instruction>, Chip8Error> {
        Err(Chip8Error::InvalidOpcode { opcode: raw, addr })
    };

    match decoded.opcode {
        0x0 => match decoded.nnn {
            0x0E0 => Ok(Box::new(ClearScreen)),
            0x0EE => Ok(Box::new(SubroutineReturn)),
            _ => Ok(Box::new(SystemCall)),
        },
        0x1 => Ok(Box::new(Jump(decoded))),
        0x2 => Ok(Box::new(SubroutineCall(decoded))),
        0x3 => Ok(Box::new(SkipEqImmediate(decoded))),
        0x4 => Ok(Box::new(SkipNeqImmediate(decoded))),
        0x5 if decoded.n == 0 => Ok(Box::new(SkipXEqY(decoded))),
        0x6 => Ok(Box::new(SetImmediate(decoded))),
        0x7 => Ok(Box::new(AddImmediate(decoded))),
        0x8 => match decoded.n {
            0x0 => Ok(Box::new(SetXToY(decoded))),
            0x1 => Ok(Box::new(BinaryOr(decoded))),
            0x2 => Ok(Box::new(BinaryAnd(decoded))),
            0x3 => Ok(Box::new(BinaryXor(decoded))),
            0x4 => Ok(Box::new(AddWithCarry(decoded))),
            0x5 => Ok(Box::new(SubtractYFromX(decoded))),
            0x6 => Ok(Box::new(RightShift(decoded))),
            0x7 => Ok(Box::new(SubtractXFromY(decoded))),
            0xE => Ok(Box::new(LeftShift(decoded))),
            _ => invalid(),
        },
        0x9 if decoded.n == 0 => Ok(Box::new(SkipXNeqY(decoded))),
        0xA => Ok(Box::new(SetIndex(decoded))),
        0xB => Ok(Box::new(JumpWithOffset(decoded))),
        0xC => Ok(Box::new(Random(decoded))),
        0xD => Ok(Box::new(DrawSprite(decoded))),
        0xE => match decoded.nn {
            0x9E => Ok(Box::new(SkipIfKeyPressed(decoded))),
            0xA1 => Ok(Box::new(SkipIfKeyNotPressed(decoded))),
            _ => invalid(),
        },
        0xF => match decoded.nn {
            0x07 => Ok(Box::new(SetVxFromTimer(decoded))),
            0x0A => Ok(Box::new(WaitForKey(decoded))),
            0x15 => Ok(Box::new(SetDelayTimer(decoded))),
            0x18 => Ok(Box::new(SetSoundTimer(decoded))),
            0x1E => Ok(Box::new(AddToIndex(decoded))),
            0x29 => Ok(Box::new(FontChar(decoded))),
            0x33 => Ok(Box::new(BinaryCodedDecimal(decoded))),
            0x55 => Ok(Box::new(Store(decoded))),
            0x65 => Ok(Box::new(Load(decoded))),
            _ => invalid(),
        },
        _ => invalid(),
    }
}

struct DecodedInstruction {
    /// First nibble. Represents the operation code.
    opcode: u8,
    /// Second nibble. Used to look up one of the 16 registers.
    x: Register,
    /// Third nibble. Used to look up one of the 16 registers.
    y: Register,
    /// Fourth nibble. A 4-bit number.
    n: u8,
    /// The second byte (third and fourth nibbles). An 8-bit immediate number.
    nn: u8,
    /// The second, third, and fourth nibbles. A 12-bit immediate address.
    nnn: Address,
}
impl DecodedInstruction {
    fn new(raw: u16) -> Self {
        DecodedInstruction {
            opcode: (raw >> 12) as u8,
            x: Register::from_nibble((raw >> 8) as u8),
            y: Register::from_nibble((raw >> 4) as u8),
            n: (raw & 0x0F) as u8,
            nn: (raw & 0x00FF) as u8,
            nnn: raw & 0x0FFF,
        }
    }
}

/// Address of the instruction being executed.
fn instruction_addr(state: &Chip8State) -> Address {
    state.pc.wrapping_sub(2)
}

fn skip_if(state: &mut Chip8State, condition: bool) {
    if condition {
        state.pc = state.pc.wrapping_add(2);
    }
}

struct ClearScreen;
impl Instruction for ClearScreen {
    fn execute(&self, state: &mut Chip8State, io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        state.display.clear();
        io.on_redraw(Redraw::Clear);
        Ok(())
    }
}

/// `0nnn`: a call into host machine code, executed as a no-op.
struct SystemCall;
impl Instruction for SystemCall {
    fn execute(&self, _state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        Ok(())
    }
}

struct Jump(DecodedInstruction);
impl Instruction for Jump {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        state.pc = self.0.nnn;
        Ok(())
    }
}

struct SubroutineCall(DecodedInstruction);
impl Instruction for SubroutineCall {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        if state.stack.is_full() {
            return Err(Chip8Error::StackOverflow {
                addr: instruction_addr(state),
            });
        }
        // The return address is the already advanced program counter.
        state.stack.push(state.pc);
        state.pc = self.0.nnn;
        Ok(())
    }
}

struct SubroutineReturn;
impl Instruction for SubroutineReturn {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        if let Some(return_address) = state.stack.pop() {
            state.pc = return_address;
            Ok(())
        } else {
            Err(Chip8Error::StackUnderflow {
                addr: instruction_addr(state),
            })
        }
    }
}

struct SkipEqImmediate(DecodedInstruction);
impl Instruction for SkipEqImmediate {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        let equal = state.registers.read(self.0.x) == self.0.nn;
        skip_if(state, equal);
        Ok(())
    }
}

struct SkipNeqImmediate(DecodedInstruction);
impl Instruction for SkipNeqImmediate {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        let not_equal = state.registers.read(self.0.x) != self.0.nn;
        skip_if(state, not_equal);
        Ok(())
    }
}

struct SkipXEqY(DecodedInstruction);
impl Instruction for SkipXEqY {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        let equal = state.registers.read(self.0.x) == state.registers.read(self.0.y);
        skip_if(state, equal);
        Ok(())
    }
}

struct SkipXNeqY(DecodedInstruction);
impl Instruction for SkipXNeqY {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        let not_equal = state.registers.read(self.0.x) != state.registers.read(self.0.y);
        skip_if(state, not_equal);
        Ok(())
    }
}

struct SetImmediate(DecodedInstruction);
impl Instruction for SetImmediate {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        state.registers.write(self.0.x, self.0.nn);
        Ok(())
    }
}

struct AddImmediate(DecodedInstruction);
impl Instruction for AddImmediate {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        let value_x = state.registers.read(self.0.x);
        state.registers.write(self.0.x, value_x.wrapping_add(self.0.nn));
        Ok(())
    }
}

struct SetXToY(DecodedInstruction);
impl Instruction for SetXToY {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        let value_y = state.registers.read(self.0.y);
        state.registers.write(self.0.x, value_y);
        Ok(())
    }
}

struct BinaryOr(DecodedInstruction);
impl Instruction for BinaryOr {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        let value_x = state.registers.read(self.0.x);
        let value_y = state.registers.read(self.0.y);
        state.registers.write(self.0.x, value_x | value_y);
        Ok(())
    }
}

struct BinaryAnd(DecodedInstruction);
impl Instruction for BinaryAnd {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        let value_x = state.registers.read(self.0.x);
        let value_y = state.registers.read(self.0.y);
        state.registers.write(self.0.x, value_x & value_y);
        Ok(())
    }
}

struct BinaryXor(DecodedInstruction);
impl Instruction for BinaryXor {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        let value_x = state.registers.read(self.0.x);
        let value_y = state.registers.read(self.0.y);
        state.registers.write(self.0.x, value_x ^ value_y);
        Ok(())
    }
}

// The ALU group writes the result first and VF last, so the flag survives
// when x is VF.

struct AddWithCarry(DecodedInstruction);
impl Instruction for AddWithCarry {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        let value_x = state.registers.read(self.0.x);
        let value_y = state.registers.read(self.0.y);
        let (sum, carry) = value_x.overflowing_add(value_y);

        state.registers.write(self.0.x, sum);
        state.registers.write(Register::VF, u8::from(carry));
        Ok(())
    }
}

struct SubtractYFromX(DecodedInstruction);
impl Instruction for SubtractYFromX {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        let value_x = state.registers.read(self.0.x);
        let value_y = state.registers.read(self.0.y);

        state.registers.write(self.0.x, value_x.wrapping_sub(value_y));
        state.registers.write(Register::VF, u8::from(value_x > value_y)); // 1 = no borrow
        Ok(())
    }
}

struct SubtractXFromY(DecodedInstruction);
impl Instruction for SubtractXFromY {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        let value_x = state.registers.read(self.0.x);
        let value_y = state.registers.read(self.0.y);

        state.registers.write(self.0.x, value_y.wrapping_sub(value_x));
        state.registers.write(Register::VF, u8::from(value_y > value_x)); // 1 = no borrow
        Ok(())
    }
}

struct RightShift(DecodedInstruction);
impl Instruction for RightShift {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        let value_x = state.registers.read(self.0.x);

        state.registers.write(self.0.x, value_x >> 1);
        state.registers.write(Register::VF, value_x & 0x01);
        Ok(())
    }
}

struct LeftShift(DecodedInstruction);
impl Instruction for LeftShift {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        let value_x = state.registers.read(self.0.x);

        state.registers.write(self.0.x, value_x << 1);
        state.registers.write(Register::VF, value_x >> 7);
        Ok(())
    }
}

struct SetIndex(DecodedInstruction);
impl Instruction for SetIndex {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        state.index = self.0.nnn;
        Ok(())
    }
}

struct JumpWithOffset(DecodedInstruction);
impl Instruction for JumpWithOffset {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        state.pc = Address::from(state.registers.read(Register::V0)) + self.0.nnn;
        Ok(())
    }
}

struct Random(DecodedInstruction);
impl Instruction for Random {
    fn execute(&self, state: &mut Chip8State, io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        let random_value = io.next_random_byte() & self.0.nn;
        state.registers.write(self.0.x, random_value);
        Ok(())
    }
}

struct DrawSprite(DecodedInstruction);
impl Instruction for DrawSprite {
    fn execute(&self, state: &mut Chip8State, io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        let x = usize::from(state.registers.read(self.0.x));
        let y = usize::from(state.registers.read(self.0.y));

        state.registers.write(Register::VF, 0);
        let sprite = state.memory.read_sprite(state.index, self.0.n);
        let collision = state
            .display
            .draw_sprite(x, y, sprite, |px, py, pixel| io.on_pixel_set(px, py, pixel));
        if collision {
            state.registers.write(Register::VF, 1);
        }
        io.on_redraw(Redraw::Full);
        Ok(())
    }
}

struct SkipIfKeyPressed(DecodedInstruction);
impl Instruction for SkipIfKeyPressed {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        let key = state.registers.read(self.0.x);
        let pressed = state.keypad.is_key_pressed(key);
        skip_if(state, pressed);
        Ok(())
    }
}

struct SkipIfKeyNotPressed(DecodedInstruction);
impl Instruction for SkipIfKeyNotPressed {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        let key = state.registers.read(self.0.x);
        let pressed = state.keypad.is_key_pressed(key);
        skip_if(state, !pressed);
        Ok(())
    }
}

struct SetVxFromTimer(DecodedInstruction);
impl Instruction for SetVxFromTimer {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        state.registers.write(self.0.x, state.delay_timer);
        Ok(())
    }
}

struct WaitForKey(DecodedInstruction);
impl Instruction for WaitForKey {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        state.awaiting_key = Some(self.0.x);
        state.run_state = RunState::WaitingForInput;
        Ok(())
    }
}

struct SetDelayTimer(DecodedInstruction);
impl Instruction for SetDelayTimer {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        state.delay_timer = state.registers.read(self.0.x);
        Ok(())
    }
}

struct SetSoundTimer(DecodedInstruction);
impl Instruction for SetSoundTimer {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        state.sound_timer = state.registers.read(self.0.x);
        Ok(())
    }
}

struct AddToIndex(DecodedInstruction);
impl Instruction for AddToIndex {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        let value_x = state.registers.read(self.0.x);
        state.index = state.index.wrapping_add(Address::from(value_x));
        Ok(())
    }
}

struct FontChar(DecodedInstruction);
impl Instruction for FontChar {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        state.index = glyph_addr(state.registers.read(self.0.x));
        Ok(())
    }
}

struct BinaryCodedDecimal(DecodedInstruction);
impl Instruction for BinaryCodedDecimal {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        let value_x = state.registers.read(self.0.x);
        let bcd = [value_x / 100, (value_x / 10) % 10, value_x % 10];
        state.memory.write_block(state.index, &bcd)
    }
}

struct Store(DecodedInstruction);
impl Instruction for Store {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        let count = self.0.x.index() + 1;
        let values = &state.registers.as_slice()[..count];
        state.memory.write_block(state.index, values)
    }
}

struct Load(DecodedInstruction);
impl Instruction for Load {
    fn execute(&self, state: &mut Chip8State, _io: &mut dyn Peripherals) -> Result<(), Chip8Error> {
        let count = self.0.x.index() + 1;
        let index = state.index;
        for (offset, slot) in state.registers.as_mut_slice()[..count].iter_mut().enumerate() {
            *slot = state.memory.read(index.wrapping_add(offset as Address));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripherals::testing::ScriptedPeripherals;

    /// Runs `raw` as if fetched from 0x200.
    fn run(state: &mut Chip8State, raw: u16) -> Result<(), Chip8Error> {
        let mut io = ScriptedPeripherals::default();
        run_with(state, raw, &mut io)
    }

    fn run_with(
        state: &mut Chip8State,
        raw: u16,
        io: &mut ScriptedPeripherals,
    ) -> Result<(), Chip8Error> {
        state.pc = 0x202;
        decode(raw, 0x200)?.execute(state, io)
    }

    fn v(state: &Chip8State, reg: u8) -> u8 {
        state.registers.read(Register::from_nibble(reg))
    }

    fn set_v(state: &mut Chip8State, reg: u8, value: u8) {
        state.registers.write(Register::from_nibble(reg), value);
    }

    #[test]
    fn rejects_words_outside_the_instruction_set() {
        for raw in [0x5121, 0x912F, 0x8128, 0x812F, 0xE19F, 0xF1FF, 0xF100] {
            assert_eq!(
                decode(raw, 0x200).err(),
                Some(Chip8Error::InvalidOpcode {
                    opcode: raw,
                    addr: 0x200
                }),
                "{raw:#06X}"
            );
        }
    }

    #[test]
    fn system_call_is_ignored() {
        let mut state = Chip8State::new();
        run(&mut state, 0x0123).unwrap();
        assert_eq!(state.pc, 0x202);
    }

    #[test]
    fn clear_screen_hints_redraw() {
        let mut state = Chip8State::new();
        state.display.draw_sprite(0, 0, [0xFF], |_, _, _| {});
        let mut io = ScriptedPeripherals::default();
        run_with(&mut state, 0x00E0, &mut io).unwrap();
        assert!(state.display.as_bits().not_any());
        assert_eq!(io.redraws, vec![Redraw::Clear]);
    }

    #[test]
    fn jump_sets_pc_directly() {
        let mut state = Chip8State::new();
        run(&mut state, 0x1A5F).unwrap();
        assert_eq!(state.pc, 0xA5F);
    }

    #[test]
    fn call_pushes_return_address() {
        let mut state = Chip8State::new();
        run(&mut state, 0x2300).unwrap();
        assert_eq!(state.pc, 0x300);
        assert_eq!(state.stack.depth(), 1);
        assert_eq!(state.stack.pop(), Some(0x202));
    }

    #[test]
    fn call_beyond_stack_depth_overflows() {
        let mut state = Chip8State::new();
        for _ in 0..crate::state::STACK_SIZE {
            state.stack.push(0x202);
        }
        assert_eq!(
            run(&mut state, 0x2300),
            Err(Chip8Error::StackOverflow { addr: 0x200 })
        );
    }

    #[test]
    fn return_with_empty_stack_underflows() {
        let mut state = Chip8State::new();
        assert_eq!(
            run(&mut state, 0x00EE),
            Err(Chip8Error::StackUnderflow { addr: 0x200 })
        );
    }

    #[test]
    fn immediate_skips() {
        let mut state = Chip8State::new();
        set_v(&mut state, 3, 0x42);
        run(&mut state, 0x3342).unwrap();
        assert_eq!(state.pc, 0x204);
        run(&mut state, 0x3343).unwrap();
        assert_eq!(state.pc, 0x202);
        run(&mut state, 0x4343).unwrap();
        assert_eq!(state.pc, 0x204);
        run(&mut state, 0x4342).unwrap();
        assert_eq!(state.pc, 0x202);
    }

    #[test]
    fn register_skips() {
        let mut state = Chip8State::new();
        set_v(&mut state, 1, 7);
        set_v(&mut state, 2, 7);
        run(&mut state, 0x5120).unwrap();
        assert_eq!(state.pc, 0x204);
        run(&mut state, 0x9120).unwrap();
        assert_eq!(state.pc, 0x202);
        set_v(&mut state, 2, 8);
        run(&mut state, 0x9120).unwrap();
        assert_eq!(state.pc, 0x204);
    }

    #[test]
    fn load_then_add_immediate_wraps_without_flag() {
        let mut state = Chip8State::new();
        set_v(&mut state, 0xF, 0x0A);
        run(&mut state, 0x68F0).unwrap();
        run(&mut state, 0x7811).unwrap();
        assert_eq!(v(&state, 8), 0x01);
        assert_eq!(v(&state, 0xF), 0x0A);
    }

    #[test]
    fn logic_ops_leave_flag_alone() {
        let mut state = Chip8State::new();
        set_v(&mut state, 0xF, 9);
        set_v(&mut state, 1, 0b1100);
        set_v(&mut state, 2, 0b1010);
        run(&mut state, 0x8121).unwrap();
        assert_eq!(v(&state, 1), 0b1110);
        set_v(&mut state, 1, 0b1100);
        run(&mut state, 0x8122).unwrap();
        assert_eq!(v(&state, 1), 0b1000);
        set_v(&mut state, 1, 0b1100);
        run(&mut state, 0x8123).unwrap();
        assert_eq!(v(&state, 1), 0b0110);
        run(&mut state, 0x8320).unwrap();
        assert_eq!(v(&state, 3), 0b1010);
        assert_eq!(v(&state, 0xF), 9);
    }

    #[test]
    fn add_with_carry() {
        let mut state = Chip8State::new();
        set_v(&mut state, 1, 200);
        set_v(&mut state, 2, 100);
        run(&mut state, 0x8124).unwrap();
        assert_eq!(v(&state, 1), 44);
        assert_eq!(v(&state, 0xF), 1);

        set_v(&mut state, 1, 10);
        set_v(&mut state, 2, 20);
        run(&mut state, 0x8124).unwrap();
        assert_eq!(v(&state, 1), 30);
        assert_eq!(v(&state, 0xF), 0);
    }

    #[test]
    fn flag_wins_when_vf_is_the_destination() {
        let mut state = Chip8State::new();
        set_v(&mut state, 0xF, 200);
        set_v(&mut state, 1, 100);
        run(&mut state, 0x8F14).unwrap();
        assert_eq!(v(&state, 0xF), 1);

        set_v(&mut state, 0xF, 0b0000_0010);
        run(&mut state, 0x8F06).unwrap();
        assert_eq!(v(&state, 0xF), 0);

        set_v(&mut state, 0xF, 5);
        set_v(&mut state, 1, 3);
        run(&mut state, 0x8F15).unwrap();
        assert_eq!(v(&state, 0xF), 1);
    }

    #[test]
    fn subtractions_set_no_borrow_flag() {
        let mut state = Chip8State::new();
        set_v(&mut state, 1, 10);
        set_v(&mut state, 2, 3);
        run(&mut state, 0x8125).unwrap();
        assert_eq!(v(&state, 1), 7);
        assert_eq!(v(&state, 0xF), 1);

        set_v(&mut state, 1, 3);
        set_v(&mut state, 2, 10);
        run(&mut state, 0x8125).unwrap();
        assert_eq!(v(&state, 1), 249);
        assert_eq!(v(&state, 0xF), 0);

        set_v(&mut state, 1, 5);
        set_v(&mut state, 2, 5);
        run(&mut state, 0x8125).unwrap();
        assert_eq!(v(&state, 1), 0);
        assert_eq!(v(&state, 0xF), 0);

        set_v(&mut state, 1, 3);
        set_v(&mut state, 2, 10);
        run(&mut state, 0x8127).unwrap();
        assert_eq!(v(&state, 1), 7);
        assert_eq!(v(&state, 0xF), 1);

        set_v(&mut state, 1, 10);
        set_v(&mut state, 2, 3);
        run(&mut state, 0x8127).unwrap();
        assert_eq!(v(&state, 1), 249);
        assert_eq!(v(&state, 0xF), 0);
    }

    #[test]
    fn shifts_operate_on_vx() {
        let mut state = Chip8State::new();
        set_v(&mut state, 1, 0b1000_0101);
        set_v(&mut state, 2, 0xFF);
        run(&mut state, 0x8126).unwrap();
        assert_eq!(v(&state, 1), 0b0100_0010);
        assert_eq!(v(&state, 0xF), 1);

        set_v(&mut state, 1, 0b1000_0101);
        run(&mut state, 0x812E).unwrap();
        assert_eq!(v(&state, 1), 0b0000_1010);
        assert_eq!(v(&state, 0xF), 1);

        set_v(&mut state, 1, 0b0100_0000);
        run(&mut state, 0x812E).unwrap();
        assert_eq!(v(&state, 1), 0b1000_0000);
        assert_eq!(v(&state, 0xF), 0);
    }

    #[test]
    fn index_and_offset_jump() {
        let mut state = Chip8State::new();
        run(&mut state, 0xA2C5).unwrap();
        assert_eq!(state.index, 0x2C5);
        set_v(&mut state, 0, 0x10);
        run(&mut state, 0xB300).unwrap();
        assert_eq!(state.pc, 0x310);
    }

    #[test]
    fn random_is_masked() {
        let mut state = Chip8State::new();
        let mut io = ScriptedPeripherals::with_random(&[0xAB]);
        run_with(&mut state, 0xC50F, &mut io).unwrap();
        assert_eq!(v(&state, 5), 0x0B);
    }

    #[test]
    fn draw_reports_pixels_and_redraw() {
        let mut state = Chip8State::new();
        state.memory.write_block(0x300, &[0xC0]).unwrap();
        state.index = 0x300;
        set_v(&mut state, 1, 63);
        set_v(&mut state, 2, 33);
        set_v(&mut state, 0xF, 7);

        let mut io = ScriptedPeripherals::default();
        run_with(&mut state, 0xD121, &mut io).unwrap();
        assert_eq!(v(&state, 0xF), 0);
        assert_eq!(
            io.pixels,
            vec![
                (63, 1, crate::display::PixelState::On),
                (0, 1, crate::display::PixelState::On)
            ]
        );
        assert_eq!(io.redraws, vec![Redraw::Full]);

        run(&mut state, 0xD121).unwrap();
        assert_eq!(v(&state, 0xF), 1);
        assert!(state.display.as_bits().not_any());
    }

    #[test]
    fn key_skips() {
        let mut state = Chip8State::new();
        set_v(&mut state, 1, 0xA);
        run(&mut state, 0xE19E).unwrap();
        assert_eq!(state.pc, 0x202);
        run(&mut state, 0xE1A1).unwrap();
        assert_eq!(state.pc, 0x204);

        state.keypad.press_key(0xA).unwrap();
        run(&mut state, 0xE19E).unwrap();
        assert_eq!(state.pc, 0x204);
        run(&mut state, 0xE1A1).unwrap();
        assert_eq!(state.pc, 0x202);
    }

    #[test]
    fn timers_round_trip_through_registers() {
        let mut state = Chip8State::new();
        set_v(&mut state, 4, 30);
        run(&mut state, 0xF415).unwrap();
        run(&mut state, 0xF418).unwrap();
        assert_eq!(state.delay_timer, 30);
        assert_eq!(state.sound_timer, 30);
        state.tick_timers();
        run(&mut state, 0xF507).unwrap();
        assert_eq!(v(&state, 5), 29);
    }

    #[test]
    fn wait_for_key_records_destination() {
        let mut state = Chip8State::new();
        run(&mut state, 0xF70A).unwrap();
        assert_eq!(state.run_state, RunState::WaitingForInput);
        assert_eq!(state.awaiting_key, Some(Register::from_nibble(7)));
        assert_eq!(state.pc, 0x202);
    }

    #[test]
    fn add_to_index_and_font_char() {
        let mut state = Chip8State::new();
        state.index = 0x300;
        set_v(&mut state, 2, 0x20);
        run(&mut state, 0xF21E).unwrap();
        assert_eq!(state.index, 0x320);

        set_v(&mut state, 2, 0xB);
        run(&mut state, 0xF229).unwrap();
        assert_eq!(state.index, crate::font::FONT_ADDR + 55);
        let glyph: Vec<u8> = state.memory.read_sprite(state.index, 5).collect();
        assert_eq!(glyph, crate::font::glyph(0xB));
    }

    #[test]
    fn bcd_stores_three_digits() {
        let mut state = Chip8State::new();
        state.index = 0x300;
        set_v(&mut state, 3, 254);
        run(&mut state, 0xF333).unwrap();
        assert_eq!(state.memory.read(0x300), 2);
        assert_eq!(state.memory.read(0x301), 5);
        assert_eq!(state.memory.read(0x302), 4);

        set_v(&mut state, 3, 7);
        run(&mut state, 0xF333).unwrap();
        assert_eq!(state.memory.read(0x300), 0);
        assert_eq!(state.memory.read(0x301), 0);
        assert_eq!(state.memory.read(0x302), 7);
    }

    #[test]
    fn bcd_into_reserved_memory_is_rejected() {
        let mut state = Chip8State::new();
        state.index = 0x1FE;
        assert_eq!(
            run(&mut state, 0xF033),
            Err(Chip8Error::ReservedWrite { addr: 0x1FE })
        );
    }

    #[test]
    fn store_and_load_register_blocks() {
        let mut state = Chip8State::new();
        state.index = 0x400;
        for reg in 0..=3 {
            set_v(&mut state, reg, reg + 1);
        }
        set_v(&mut state, 4, 0xEE);
        run(&mut state, 0xF355).unwrap();
        let stored: Vec<u8> = (0..5).map(|i| state.memory.read(0x400 + i)).collect();
        assert_eq!(stored, vec![1, 2, 3, 4, 0]);
        assert_eq!(state.index, 0x400);

        for reg in 0..=4 {
            set_v(&mut state, reg, 0);
        }
        run(&mut state, 0xF265).unwrap();
        assert_eq!(&state.registers.as_slice()[..4], &[1, 2, 3, 0]);
        assert_eq!(state.index, 0x400);
    }
}
