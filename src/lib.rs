//! A deterministic CHIP-8 interpreter core.
//!
//! The [`Chip8`] machine owns memory, registers, the call stack, the frame
//! buffer, timers and keypad. Hosts drive it through `cycle`, `tick_timers`
//! and `press_key`/`release_key`, and supply randomness and display hooks
//! through [`Peripherals`].

pub mod chip8;
pub mod display;
pub mod error;
pub mod font;
mod instruction;
pub mod peripherals;
pub mod state;

pub use chip8::Chip8;
pub use display::{DISPLAY_HEIGHT, DISPLAY_WIDTH, PixelState, Screen};
pub use error::Chip8Error;
pub use peripherals::{Peripherals, RandomPeripherals, Redraw};
pub use state::{MAX_ROM_SIZE, PC_START_ADDR, RunState};
