use crate::state::Address;

/// Errors reported by the interpreter core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Chip8Error {
    #[error("No ROM supplied")]
    NullRom,

    #[error("ROM is too large ({size} bytes), max size is {max_size} bytes")]
    RomTooLarge { size: usize, max_size: usize },

    #[error("Invalid opcode {opcode:#06X} at {addr:#05X}")]
    InvalidOpcode { opcode: u16, addr: Address },

    #[error("Stack overflow: call at {addr:#05X} exceeds the call stack depth")]
    StackOverflow { addr: Address },

    #[error("Stack underflow: return at {addr:#05X} with empty call stack")]
    StackUnderflow { addr: Address },

    #[error("Write to reserved memory at {addr:#05X}")]
    ReservedWrite { addr: Address },

    #[error("Invalid key index: {0}")]
    InvalidKey(u8),
}
