use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::display::PixelState;

/// What a frontend should repaint after a display instruction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Redraw {
    /// The screen was cleared.
    Clear,
    /// A sprite draw finished; the whole buffer may have changed.
    Full,
}

/// Capabilities the interpreter borrows from its host.
pub trait Peripherals {
    fn next_random_byte(&mut self) -> u8;

    fn on_pixel_set(&mut self, _x: usize, _y: usize, _state: PixelState) {}

    fn on_redraw(&mut self, _redraw: Redraw) {}
}

/// Random source backed by `StdRng`, with no display hooks.
pub struct RandomPeripherals {
    rng: StdRng,
}
impl RandomPeripherals {
    pub fn new() -> Self {
        RandomPeripherals {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        RandomPeripherals {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}
impl Default for RandomPeripherals {
    fn default() -> Self {
        RandomPeripherals::new()
    }
}
impl Peripherals for RandomPeripherals {
    fn next_random_byte(&mut self) -> u8 {
        self.rng.random()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;

    use super::*;

    /// Plays back queued random bytes and records display callbacks.
    #[derive(Default)]
    pub struct ScriptedPeripherals {
        pub random_bytes: VecDeque<u8>,
        pub pixels: Vec<(usize, usize, PixelState)>,
        pub redraws: Vec<Redraw>,
    }
    impl ScriptedPeripherals {
        pub fn with_random(bytes: &[u8]) -> Self {
            ScriptedPeripherals {
                random_bytes: bytes.iter().copied().collect(),
                ..Default::default()
            }
        }
    }
    impl Peripherals for ScriptedPeripherals {
        fn next_random_byte(&mut self) -> u8 {
            self.random_bytes.pop_front().unwrap_or(0)
        }

        fn on_pixel_set(&mut self, x: usize, y: usize, state: PixelState) {
            self.pixels.push((x, y, state));
        }

        fn on_redraw(&mut self, redraw: Redraw) {
            self.redraws.push(redraw);
        }
    }
}
