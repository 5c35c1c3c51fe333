use bitvec::{BitArr, array::BitArray, slice::BitSlice};

pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PixelState {
    Off,
    On,
}
impl From<bool> for PixelState {
    fn from(on: bool) -> Self {
        if on { PixelState::On } else { PixelState::Off }
    }
}

/// Monochrome 64x32 frame buffer, row-major.
pub struct Screen {
    pixels: BitArr!(for DISPLAY_WIDTH * DISPLAY_HEIGHT),
}

impl Screen {
    pub fn new() -> Self {
        Screen {
            pixels: BitArray::ZERO,
        }
    }

    pub fn clear(&mut self) {
        self.pixels.fill(false);
    }

    pub fn pixel(&self, x: usize, y: usize) -> PixelState {
        PixelState::from(self.is_on(x, y))
    }

    /// Coordinates wrap like sprite drawing does.
    pub fn is_on(&self, x: usize, y: usize) -> bool {
        self.pixels[Self::index(x, y)]
    }

    pub fn as_bits(&self) -> &BitSlice {
        &self.pixels[..DISPLAY_WIDTH * DISPLAY_HEIGHT]
    }

    /// Iterates rows from top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &BitSlice> {
        self.as_bits().chunks(DISPLAY_WIDTH)
    }

    /// XORs `sprite` onto the screen with its top-left corner at `(x, y)`,
    /// MSB first, wrapping at both edges. `on_pixel` is told about every
    /// pixel the sprite writes. Returns true if any pixel went from on to off.
    pub fn draw_sprite<I, F>(&mut self, x: usize, y: usize, sprite: I, mut on_pixel: F) -> bool
    where
        I: IntoIterator<Item = u8>,
        F: FnMut(usize, usize, PixelState),
    {
        let mut collision = false;

        for (row, byte) in sprite.into_iter().enumerate() {
            let pixel_y = (y + row) % DISPLAY_HEIGHT;
            for bit in 0..8 {
                if (byte >> (7 - bit)) & 1 == 0 {
                    continue;
                }
                let pixel_x = (x + bit) % DISPLAY_WIDTH;
                let index = Self::index(pixel_x, pixel_y);
                let current_pixel = self.pixels[index];

                collision |= current_pixel;
                self.pixels.set(index, !current_pixel);
                on_pixel(pixel_x, pixel_y, PixelState::from(!current_pixel));
            }
        }
        collision
    }

    fn index(x: usize, y: usize) -> usize {
        (y % DISPLAY_HEIGHT) * DISPLAY_WIDTH + (x % DISPLAY_WIDTH)
    }
}
impl Default for Screen {
    fn default() -> Self {
        Screen::new()
    }
}
