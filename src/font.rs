use crate::state::Address;

pub const FONT_ADDR: Address = 0x50;
pub const FONT_HEIGHT: usize = 5;
pub const FONT_GLYPHS: usize = 16;

#[rustfmt::skip]
pub const FONT_DATA: [u8; FONT_GLYPHS * FONT_HEIGHT] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// Memory address of each hex digit's glyph, indexed by digit.
pub const FONT_OFFSETS: [Address; FONT_GLYPHS] = {
    let mut offsets = [0; FONT_GLYPHS];
    let mut digit = 0;
    while digit < FONT_GLYPHS {
        offsets[digit] = FONT_ADDR + (digit * FONT_HEIGHT) as Address;
        digit += 1;
    }
    offsets
};

/// Address of the glyph for the low nibble of `digit`.
pub fn glyph_addr(digit: u8) -> Address {
    FONT_OFFSETS[usize::from(digit & 0x0F)]
}

/// The five glyph rows for the low nibble of `digit`.
pub fn glyph(digit: u8) -> &'static [u8] {
    let start = usize::from(digit & 0x0F) * FONT_HEIGHT;
    &FONT_DATA[start..start + FONT_HEIGHT]
}
