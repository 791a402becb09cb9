//! Framebuffer to panel transfer: address windows, dirty-rect flushes and
//! the hold/commit batching used by compound shapes.

use alloc::vec::Vec;

use embedded_hal::digital::OutputPin;

use crate::{Amoled, Command, DriverError, Error, Interface, Panel};

/// Wire format of the panel's frame memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb565,
    Rgb666,
    Rgb888,
}

impl PixelFormat {
    pub fn from_bits(bits_per_pixel: u8) -> Option<Self> {
        match bits_per_pixel {
            16 => Some(PixelFormat::Rgb565),
            18 => Some(PixelFormat::Rgb666),
            24 => Some(PixelFormat::Rgb888),
            _ => None,
        }
    }

    pub fn bits_per_pixel(self) -> u8 {
        match self {
            PixelFormat::Rgb565 => 16,
            PixelFormat::Rgb666 => 18,
            PixelFormat::Rgb888 => 24,
        }
    }

    /// COLMOD register value
    pub fn colmod(self) -> u8 {
        match self {
            PixelFormat::Rgb565 => 0x55,
            PixelFormat::Rgb666 => 0x66,
            PixelFormat::Rgb888 => 0x77,
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb565 => 2,
            PixelFormat::Rgb666 | PixelFormat::Rgb888 => 3,
        }
    }

    /// Append the wire encoding of an RGB565 cell
    pub fn encode(self, color: u16, out: &mut Vec<u8>) {
        match self {
            PixelFormat::Rgb565 => out.extend_from_slice(&color.to_be_bytes()),
            PixelFormat::Rgb666 => {
                let (r, g, b) = crate::color::rgb888(color);
                out.extend_from_slice(&[r & 0xFC, g & 0xFC, b & 0xFC]);
            }
            PixelFormat::Rgb888 => {
                let (r, g, b) = crate::color::rgb888(color);
                out.extend_from_slice(&[r, g, b]);
            }
        }
    }
}

/// Inclusive rectangle in screen coordinates, may extend past the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Area {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl Area {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Area {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn point(x: i32, y: i32) -> Self {
        Area::new(x, y, x, y)
    }

    pub fn include(&mut self, x: i32, y: i32) {
        self.x0 = self.x0.min(x);
        self.y0 = self.y0.min(y);
        self.x1 = self.x1.max(x);
        self.y1 = self.y1.max(y);
    }

    pub fn union(mut self, other: Option<Area>) -> Self {
        if let Some(other) = other {
            self.include(other.x0, other.y0);
            self.include(other.x1, other.y1);
        }
        self
    }
}

impl<IFACE, RESET, P> Amoled<IFACE, RESET, P>
where
    IFACE: Interface,
    RESET: OutputPin,
    P: Panel,
{
    /// Program the column/row address window and issue the RAM write trigger.
    ///
    /// Coordinates are logical and inclusive; the panel gaps are added here.
    /// Returns `false` without touching the bus when the window is inverted,
    /// leaves the screen, or the gap pushes it past the 16-bit address range.
    pub fn set_address_window(
        &mut self,
        x0: u16,
        y0: u16,
        x1: u16,
        y1: u16,
    ) -> Result<bool, DriverError<IFACE, RESET>> {
        if x0 > x1 || x1 > self.max_x || y0 > y1 || y1 > self.max_y {
            return Ok(false);
        }

        let (Some(xe), Some(ye)) = (x1.checked_add(self.x_gap), y1.checked_add(self.y_gap)) else {
            return Ok(false);
        };
        let [xs0, xs1] = (x0 + self.x_gap).to_be_bytes();
        let [xe0, xe1] = xe.to_be_bytes();
        let [ys0, ys1] = (y0 + self.y_gap).to_be_bytes();
        let [ye0, ye1] = ye.to_be_bytes();

        self.command(Command::ColumnAddressSet, &[xs0, xs1, xe0, xe1])?;
        self.command(Command::PageAddressSet, &[ys0, ys1, ye0, ye1])?;
        self.command(Command::MemoryWrite, &[])?;
        Ok(true)
    }

    /// Stream the framebuffer region `(x, y, w, h)` to the panel.
    ///
    /// The region is clipped to the screen, then grown to an even start and
    /// odd end on both axes. Does nothing while auto refresh is off.
    pub(crate) fn flush(
        &mut self,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        if !self.auto_refresh || w <= 0 || h <= 0 {
            return Ok(());
        }

        let max_x = self.max_x as i32;
        let max_y = self.max_y as i32;
        let (x0, y0) = (x.max(0), y.max(0));
        let x1 = x.saturating_add(w - 1).min(max_x);
        let y1 = y.saturating_add(h - 1).min(max_y);
        if x0 > x1 || y0 > y1 {
            return Ok(());
        }

        let sc = (x0 & !1) as usize;
        let sr = (y0 & !1) as usize;
        let ec = (x1 | 1).min(max_x) as usize;
        let er = (y1 | 1).min(max_y) as usize;
        let w1 = ec - sc + 1;
        let h1 = er - sr + 1;

        let format = self.pixel_format;
        let mut scratch = Vec::new();
        scratch
            .try_reserve_exact(w1 * h1 * format.bytes_per_pixel())
            .map_err(|_| Error::OutOfMemory)?;

        let stride = self.width as usize;
        for row in sr..=er {
            let start = row * stride + sc;
            for &cell in &self.framebuffer[start..start + w1] {
                format.encode(cell, &mut scratch);
            }
        }

        log::trace!("flush {}x{} at ({}, {})", w1, h1, sc, sr);

        if self.set_address_window(sc as u16, sr as u16, ec as u16, er as u16)? {
            self.interface
                .write_pixels(&scratch)
                .map_err(Error::Interface)?;
        }
        Ok(())
    }

    pub(crate) fn flush_area(&mut self, area: Area) -> Result<(), DriverError<IFACE, RESET>> {
        self.flush(
            area.x0,
            area.y0,
            area.x1 - area.x0 + 1,
            area.y1 - area.y0 + 1,
        )
    }

    /// Run `draw` with flushing suppressed, then flush the area it reports
    /// once, unless an enclosing batch is still holding the display.
    pub(crate) fn batch<F>(&mut self, draw: F) -> Result<(), DriverError<IFACE, RESET>>
    where
        F: FnOnce(&mut Self) -> Result<Option<Area>, DriverError<IFACE, RESET>>,
    {
        let saved = self.hold_display;
        self.hold_display = true;
        let result = draw(self);
        self.hold_display = saved;

        match result? {
            Some(area) if !saved => self.flush_area(area),
            _ => Ok(()),
        }
    }

    /// Send the whole framebuffer, even with auto refresh off.
    pub fn refresh(&mut self) -> Result<(), DriverError<IFACE, RESET>> {
        let saved = self.auto_refresh;
        self.auto_refresh = true;
        let (w, h) = (self.width as i32, self.height as i32);
        let result = self.flush(0, 0, w, h);
        self.auto_refresh = saved;
        result
    }

    /// With auto refresh off drawing only touches the framebuffer until
    /// [`refresh`](Self::refresh) is called.
    pub fn set_auto_refresh(&mut self, auto_refresh: bool) {
        self.auto_refresh = auto_refresh;
    }

    pub fn auto_refresh(&self) -> bool {
        self.auto_refresh
    }

    /// Fill a framebuffer rectangle, clipped to the screen, and flush it
    /// unless held.
    pub(crate) fn fill_frame_buffer(
        &mut self,
        color: u16,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        let stride = self.width as usize;
        let x_end = (x as usize + w as usize).min(stride);
        let y_end = (y as usize + h as usize).min(self.height as usize);
        if x as usize >= x_end || y as usize >= y_end {
            return Ok(());
        }

        for row in y as usize..y_end {
            let start = row * stride;
            self.framebuffer[start + x as usize..start + x_end].fill(color);
        }

        if !self.hold_display && self.auto_refresh {
            self.flush(x as i32, y as i32, w as i32, h as i32)?;
        }
        Ok(())
    }

    /// Set one framebuffer cell without flushing. Off-screen cells are skipped.
    pub(crate) fn store(&mut self, x: i32, y: i32, color: u16) {
        if x < 0 || y < 0 || x > self.max_x as i32 || y > self.max_y as i32 {
            return;
        }
        let idx = y as usize * self.width as usize + x as usize;
        self.framebuffer[idx] = color;
    }

    /// Framebuffer cell at `(x, y)`
    pub fn get_pixel(&self, x: u16, y: u16) -> Option<u16> {
        if x > self.max_x || y > self.max_y {
            return None;
        }
        self.framebuffer
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Framebuffer cells of the current orientation, row by row
    pub fn framebuffer(&self) -> &[u16] {
        let len = self.width as usize * self.height as usize;
        &self.framebuffer[..len]
    }

    /// Stream raw pixel bytes in the panel's wire format straight into the
    /// inclusive window `(x0, y0)..=(x1, y1)`, bypassing the framebuffer.
    pub fn bitmap(
        &mut self,
        x0: u16,
        y0: u16,
        x1: u16,
        y1: u16,
        data: &[u8],
    ) -> Result<(), DriverError<IFACE, RESET>> {
        if x0 > x1 || y0 > y1 {
            return Ok(());
        }
        let required = (x1 - x0 + 1) as usize
            * (y1 - y0 + 1) as usize
            * self.pixel_format.bytes_per_pixel();
        if data.len() < required {
            log::warn!("bitmap needs {} bytes, got {}", required, data.len());
            return Err(Error::BufferTooSmall { required });
        }

        if self.set_address_window(x0, y0, x1, y1)? {
            self.interface
                .write_pixels(&data[..required])
                .map_err(Error::Interface)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{display, display_with, Op};
    use crate::{Config, RotationEntry, Rm67162, Rm690b0};

    #[test]
    fn pixel_window_is_even_aligned() {
        let mut d = display(Rm67162);
        d.interface.ops.clear();
        d.pixel(3, 5, 0x1234).unwrap();

        assert_eq!(
            &d.interface.ops[..3],
            [
                Op::Write(0x2A, vec![0, 2, 0, 3]),
                Op::Write(0x2B, vec![0, 4, 0, 5]),
                Op::Write(0x2C, vec![]),
            ]
        );
        let pixels = d.interface.pixel_writes();
        assert_eq!(pixels.len(), 1);
        assert_eq!(pixels[0].len(), 2 * 2 * 2);
        // (3, 5) is the last cell of the 2x2 window
        assert_eq!(&pixels[0][6..], [0x12, 0x34]);
    }

    #[test]
    fn flush_never_shrinks() {
        let mut d = display(Rm67162);
        for &(x, y, w, h) in &[(0, 0, 1, 1), (1, 1, 2, 2), (7, 3, 10, 9), (238, 534, 2, 2)] {
            d.interface.ops.clear();
            d.flush(x, y, w, h).unwrap();
            let (x0, x1, y0, y1) = d.interface.windows()[0];
            assert_eq!(x0 % 2, 0);
            assert_eq!(y0 % 2, 0);
            assert_eq!(x1 % 2, 1);
            assert_eq!(y1 % 2, 1);
            assert!(x0 as i32 <= x && x1 as i32 >= x + w - 1);
            assert!(y0 as i32 <= y && y1 as i32 >= y + h - 1);
        }
    }

    #[test]
    fn flush_clips_to_screen() {
        let mut d = display(Rm67162);
        d.interface.ops.clear();
        d.flush(230, 530, 50, 50).unwrap();
        assert_eq!(d.interface.windows(), [(230, 239, 530, 535)]);
    }

    #[test]
    fn window_adds_panel_gap() {
        let mut d = display(Rm690b0);
        d.interface.ops.clear();
        assert!(d.set_address_window(0, 0, 9, 9).unwrap());
        assert_eq!(d.interface.windows(), [(16, 25, 0, 9)]);
        assert!(!d.set_address_window(5, 0, 4, 9).unwrap());
        assert!(!d.set_address_window(0, 0, 450, 9).unwrap());
        assert_eq!(d.interface.ops.len(), 3);
    }

    #[test]
    fn window_gap_past_address_range_is_skipped() {
        let mut d = display(Rm67162);
        d.set_gap(u16::MAX, 0);
        d.interface.ops.clear();
        assert!(!d.set_address_window(0, 0, 9, 9).unwrap());
        d.pixel(0, 0, 0xFFFF).unwrap();
        assert!(d.interface.ops.is_empty());
        assert_eq!(d.get_pixel(0, 0), Some(0xFFFF));
    }

    #[test]
    fn flush_window_follows_gap() {
        let mut d = display(Rm690b0);
        d.interface.ops.clear();
        d.pixel(3, 5, 0x1234).unwrap();
        assert_eq!(d.interface.windows(), [(16 + 2, 16 + 3, 4, 5)]);

        d.set_rotation(1).unwrap();
        d.interface.ops.clear();
        d.pixel(3, 5, 0x1234).unwrap();
        assert_eq!(d.interface.windows(), [(2, 3, 16 + 4, 16 + 5)]);

        d.set_gap(7, 3);
        d.interface.ops.clear();
        d.fill_rect(10, 10, 4, 4, 0x1234).unwrap();
        assert_eq!(d.interface.windows(), [(17, 20, 13, 16)]);
    }

    #[test]
    fn flush_on_odd_width_stops_at_last_column() {
        let mut d = display(Rm67162);
        let odd = RotationEntry::new(crate::madctl::RGB, 101, 51, 0, 0);
        d.set_rotation_with_table(0, &[odd]).unwrap();
        d.interface.ops.clear();
        d.flush(99, 49, 2, 2).unwrap();
        assert_eq!(d.interface.windows(), [(98, 100, 48, 50)]);
        assert_eq!(d.interface.pixel_writes()[0].len(), 3 * 3 * 2);
    }

    #[test]
    fn auto_refresh_off_defers_until_refresh() {
        let mut d = display_with(Rm67162, Config::default().with_auto_refresh(false));
        d.interface.ops.clear();
        d.fill_rect(0, 0, 10, 10, 0xFFFF).unwrap();
        assert!(d.interface.ops.is_empty());
        assert_eq!(d.get_pixel(9, 9), Some(0xFFFF));

        d.refresh().unwrap();
        assert_eq!(d.interface.windows(), [(0, 239, 0, 535)]);
        assert_eq!(d.interface.pixel_writes()[0].len(), 240 * 536 * 2);
        assert!(!d.auto_refresh());
    }

    #[test]
    fn wide_formats_send_three_bytes() {
        let mut d = display_with(Rm67162, Config::default().with_bits_per_pixel(18));
        d.interface.ops.clear();
        d.pixel(0, 0, 0xFFFF).unwrap();
        let pixels = d.interface.pixel_writes();
        assert_eq!(pixels[0].len(), 4 * 3);
        assert_eq!(&pixels[0][..3], [0xF8, 0xFC, 0xF8]);
    }

    #[test]
    fn bitmap_bypasses_framebuffer() {
        let mut d = display(Rm690b0);
        d.interface.ops.clear();
        let data = [0xAB; 4 * 2 * 2];
        d.bitmap(10, 20, 13, 21, &data).unwrap();
        assert_eq!(d.interface.windows(), [(26, 29, 20, 21)]);
        assert_eq!(d.interface.pixel_writes()[0].len(), 16);
        assert_eq!(d.get_pixel(10, 20), Some(0));
    }

    #[test]
    fn bitmap_rejects_short_buffer() {
        let mut d = display(Rm67162);
        d.interface.ops.clear();
        let result = d.bitmap(0, 0, 1, 1, &[0; 7]);
        assert!(matches!(result, Err(Error::BufferTooSmall { required: 8 })));
        assert!(d.interface.ops.is_empty());
    }

    #[test]
    fn batch_flushes_once_after_nested_draws() {
        let mut d = display(Rm67162);
        d.interface.ops.clear();
        d.batch(|d| {
            d.pixel(1, 1, 1)?;
            d.pixel(20, 20, 1)?;
            Ok(Some(Area::new(1, 1, 20, 20)))
        })
        .unwrap();
        assert_eq!(d.interface.windows(), [(0, 21, 0, 21)]);
    }
}
