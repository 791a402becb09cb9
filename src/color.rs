//! RGB565 helpers and named colors.

pub const BLACK: u16 = 0x0000;
pub const BLUE: u16 = 0x001F;
pub const RED: u16 = 0xF800;
pub const GREEN: u16 = 0x07E0;
pub const CYAN: u16 = 0x07FF;
pub const MAGENTA: u16 = 0xF81F;
pub const YELLOW: u16 = 0xFFE0;
pub const WHITE: u16 = 0xFFFF;

/// Pack 8-bit channels into RGB565, dropping the low bits
pub const fn color565(red: u8, green: u8, blue: u8) -> u16 {
    ((red as u16 & 0xF8) << 8) | ((green as u16 & 0xFC) << 3) | (blue as u16 >> 3)
}

/// Expand RGB565 to 8-bit channels. Low bits are zero.
pub const fn rgb888(color: u16) -> (u8, u8, u8) {
    (
        ((color >> 8) & 0xF8) as u8,
        ((color >> 3) & 0xFC) as u8,
        ((color << 3) & 0xF8) as u8,
    )
}
