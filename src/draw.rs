//! Pixel, line and shape primitives over the framebuffer.
//!
//! Positions are signed so shapes may hang off the screen; every written
//! pixel is clipped individually. Compound shapes draw under one batch and
//! flush their bounding box once.

use core::mem::swap;

use embedded_hal::digital::OutputPin;

use crate::refresh::Area;
use crate::{Amoled, DriverError, Interface, Panel};

impl<IFACE, RESET, P> Amoled<IFACE, RESET, P>
where
    IFACE: Interface,
    RESET: OutputPin,
    P: Panel,
{
    /// Fill the whole screen with `color`
    pub fn fill(&mut self, color: u16) -> Result<(), DriverError<IFACE, RESET>> {
        let (w, h) = (self.width, self.height);
        self.fill_frame_buffer(color, 0, 0, w, h)
    }

    /// Draw a pixel. Points outside the screen are ignored.
    pub fn pixel(&mut self, x: i32, y: i32, color: u16) -> Result<(), DriverError<IFACE, RESET>> {
        if x < 0 || y < 0 || x > self.max_x as i32 || y > self.max_y as i32 {
            return Ok(());
        }
        self.store(x, y, color);
        if !self.hold_display && self.auto_refresh {
            self.flush(x, y, 1, 1)?;
        }
        Ok(())
    }

    /// Horizontal run of `len` pixels starting at `(x, y)`, clipped to the screen
    pub fn hline(
        &mut self,
        x: i32,
        y: i32,
        len: u16,
        color: u16,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        self.fast_hline(x, y, len as i32, color)
    }

    /// Vertical run of `len` pixels starting at `(x, y)`, clipped to the screen
    pub fn vline(
        &mut self,
        x: i32,
        y: i32,
        len: u16,
        color: u16,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        self.fast_vline(x, y, len as i32, color)
    }

    pub(crate) fn fast_hline(
        &mut self,
        x: i32,
        y: i32,
        len: i32,
        color: u16,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        if len <= 0 || y < 0 || y > self.max_y as i32 {
            return Ok(());
        }
        let x0 = x.max(0);
        let x1 = x.saturating_add(len - 1).min(self.max_x as i32);
        if x0 > x1 {
            return Ok(());
        }
        self.fill_frame_buffer(color, x0 as u16, y as u16, (x1 - x0 + 1) as u16, 1)
    }

    pub(crate) fn fast_vline(
        &mut self,
        x: i32,
        y: i32,
        len: i32,
        color: u16,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        if len <= 0 || x < 0 || x > self.max_x as i32 {
            return Ok(());
        }
        let y0 = y.max(0);
        let y1 = y.saturating_add(len - 1).min(self.max_y as i32);
        if y0 > y1 {
            return Ok(());
        }
        self.fill_frame_buffer(color, x as u16, y0 as u16, 1, (y1 - y0 + 1) as u16)
    }

    /// Draw a line between two points, inclusive.
    pub fn line(
        &mut self,
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32,
        color: u16,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        self.batch(|d| {
            d.line_runs(x0, y0, x1, y1, color)?;
            Ok(Some(Area::new(x0, y0, x1, y1)))
        })
    }

    /// Bresenham, emitting each straight run as one fast line.
    fn line_runs(
        &mut self,
        mut x0: i32,
        mut y0: i32,
        mut x1: i32,
        mut y1: i32,
        color: u16,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        let steep = (y1 - y0).abs() > (x1 - x0).abs();
        if steep {
            swap(&mut x0, &mut y0);
            swap(&mut x1, &mut y1);
        }
        if x0 > x1 {
            swap(&mut x0, &mut x1);
            swap(&mut y0, &mut y1);
        }

        let dx = x1 - x0;
        let dy = (y1 - y0).abs();
        let ystep = if y0 < y1 { 1 } else { -1 };
        let mut err = dx / 2;
        let mut start = x0;
        let mut run = 0;
        let mut y = y0;

        for x in x0..=x1 {
            run += 1;
            err -= dy;
            if err < 0 {
                err += dx;
                self.line_run(steep, start, y, run, color)?;
                run = 0;
                y += ystep;
                start = x + 1;
            }
        }
        if run > 0 {
            self.line_run(steep, start, y, run, color)?;
        }
        Ok(())
    }

    fn line_run(
        &mut self,
        steep: bool,
        start: i32,
        y: i32,
        len: i32,
        color: u16,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        if steep {
            self.fast_vline(y, start, len, color)
        } else {
            self.fast_hline(start, y, len, color)
        }
    }

    fn fits(&self, x: i32, y: i32, w: u16, h: u16) -> bool {
        w != 0
            && h != 0
            && x >= 0
            && y >= 0
            && x + w as i32 <= self.width as i32
            && y + h as i32 <= self.height as i32
    }

    /// Rectangle outline. Rectangles not fully on screen are ignored.
    pub fn rect(
        &mut self,
        x: i32,
        y: i32,
        w: u16,
        h: u16,
        color: u16,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        if !self.fits(x, y, w, h) {
            return Ok(());
        }
        if h == 1 {
            return self.hline(x, y, w, color);
        }
        if w == 1 {
            return self.vline(x, y, h, color);
        }
        let (x1, y1) = (x + w as i32 - 1, y + h as i32 - 1);
        self.batch(|d| {
            d.hline(x, y, w, color)?;
            d.hline(x, y1, w, color)?;
            d.vline(x, y, h, color)?;
            d.vline(x1, y, h, color)?;
            Ok(Some(Area::new(x, y, x1, y1)))
        })
    }

    /// Filled rectangle. Rectangles not fully on screen are ignored.
    pub fn fill_rect(
        &mut self,
        x: i32,
        y: i32,
        w: u16,
        h: u16,
        color: u16,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        if !self.fits(x, y, w, h) {
            return Ok(());
        }
        self.fill_frame_buffer(color, x as u16, y as u16, w, h)
    }

    /// Triangle outline
    #[allow(clippy::too_many_arguments)]
    pub fn triangle(
        &mut self,
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        color: u16,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        self.batch(|d| {
            d.line(x0, y0, x1, y1, color)?;
            d.line(x1, y1, x2, y2, color)?;
            d.line(x0, y0, x2, y2, color)?;
            let mut area = Area::new(x0, y0, x1, y1);
            area.include(x2, y2);
            Ok(Some(area))
        })
    }

    /// Filled triangle, scanline by scanline between the interpolated edges.
    #[allow(clippy::too_many_arguments)]
    pub fn fill_triangle(
        &mut self,
        mut x0: i32,
        mut y0: i32,
        mut x1: i32,
        mut y1: i32,
        mut x2: i32,
        mut y2: i32,
        color: u16,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        let x_min = x0.min(x1).min(x2);
        let x_max = x0.max(x1).max(x2);

        if y1 < y0 {
            swap(&mut x0, &mut x1);
            swap(&mut y0, &mut y1);
        }
        if y2 < y0 {
            swap(&mut x0, &mut x2);
            swap(&mut y0, &mut y2);
        }
        if y2 < y1 {
            swap(&mut x1, &mut x2);
            swap(&mut y1, &mut y2);
        }

        if y0 == y2 {
            return self.fast_hline(x_min, y0, x_max - x_min + 1, color);
        }

        self.batch(|d| {
            if y1 == y0 {
                d.span(x0, x1, y0, color)?;
            } else {
                for y in y0..=y1 {
                    let a = interpolate(x0, y0, x1, y1, y);
                    let b = interpolate(x0, y0, x2, y2, y);
                    d.span(a, b, y, color)?;
                }
            }
            if y2 > y1 {
                for y in y1 + 1..=y2 {
                    let a = interpolate(x1, y1, x2, y2, y);
                    let b = interpolate(x0, y0, x2, y2, y);
                    d.span(a, b, y, color)?;
                }
            }
            Ok(Some(Area::new(x_min, y0, x_max, y2)))
        })
    }

    /// Inclusive horizontal span between two x positions in either order
    pub(crate) fn span(
        &mut self,
        xa: i32,
        xb: i32,
        y: i32,
        color: u16,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        let (from, to) = if xa <= xb { (xa, xb) } else { (xb, xa) };
        self.fast_hline(from, y, to - from + 1, color)
    }

    /// Rounded rectangle outline with corner radius `min(w, h) / 4`.
    pub fn bubble_rect(
        &mut self,
        x: i32,
        y: i32,
        w: u16,
        h: u16,
        color: u16,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        if !self.fits(x, y, w, h) {
            return Ok(());
        }
        let corners = BubbleCorners::new(x, y, w, h);
        let (right, bottom) = (x + w as i32 - 1, y + h as i32 - 1);

        self.batch(|d| {
            let c = corners;
            d.fast_hline(c.left, y, c.right - c.left + 1, color)?;
            d.fast_hline(c.left, bottom, c.right - c.left + 1, color)?;
            d.fast_vline(x, c.top, c.bottom - c.top + 1, color)?;
            d.fast_vline(right, c.top, c.bottom - c.top + 1, color)?;

            for (dx, dy) in MidpointCircle::new(c.radius) {
                d.pixel(c.left - dx, c.top - dy, color)?;
                d.pixel(c.left - dy, c.top - dx, color)?;
                d.pixel(c.right + dx, c.top - dy, color)?;
                d.pixel(c.right + dy, c.top - dx, color)?;
                d.pixel(c.left - dx, c.bottom + dy, color)?;
                d.pixel(c.left - dy, c.bottom + dx, color)?;
                d.pixel(c.right + dx, c.bottom + dy, color)?;
                d.pixel(c.right + dy, c.bottom + dx, color)?;
            }
            Ok(Some(Area::new(x, y, right, bottom)))
        })
    }

    /// Filled rounded rectangle with corner radius `min(w, h) / 4`.
    pub fn fill_bubble_rect(
        &mut self,
        x: i32,
        y: i32,
        w: u16,
        h: u16,
        color: u16,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        if !self.fits(x, y, w, h) {
            return Ok(());
        }
        let corners = BubbleCorners::new(x, y, w, h);

        self.batch(|d| {
            let c = corners;
            let middle = (c.bottom - c.top + 1) as u16;
            d.fill_frame_buffer(color, x as u16, c.top as u16, w, middle)?;

            for (dx, dy) in MidpointCircle::new(c.radius) {
                d.span(c.left - dx, c.right + dx, c.top - dy, color)?;
                d.span(c.left - dy, c.right + dy, c.top - dx, color)?;
                d.span(c.left - dx, c.right + dx, c.bottom + dy, color)?;
                d.span(c.left - dy, c.right + dy, c.bottom + dx, color)?;
            }
            Ok(Some(Area::new(x, y, x + w as i32 - 1, y + h as i32 - 1)))
        })
    }

    /// Circle outline centered on `(x, y)`. The center itself is not drawn.
    pub fn circle(&mut self, x: i32, y: i32, r: u16, color: u16) -> Result<(), DriverError<IFACE, RESET>> {
        let r = r as i32;
        self.batch(|d| {
            for (dx, dy) in MidpointCircle::new(r) {
                d.pixel(x + dx, y + dy, color)?;
                d.pixel(x + dx, y - dy, color)?;
                d.pixel(x - dx, y + dy, color)?;
                d.pixel(x - dx, y - dy, color)?;
                d.pixel(x + dy, y + dx, color)?;
                d.pixel(x + dy, y - dx, color)?;
                d.pixel(x - dy, y + dx, color)?;
                d.pixel(x - dy, y - dx, color)?;
            }
            Ok(Some(Area::new(x - r, y - r, x + r, y + r)))
        })
    }

    /// Filled circle centered on `(x, y)`.
    pub fn fill_circle(&mut self, x: i32, y: i32, r: u16, color: u16) -> Result<(), DriverError<IFACE, RESET>> {
        let r = r as i32;
        self.batch(|d| {
            for (dx, dy) in MidpointCircle::new(r) {
                d.fast_vline(x + dx, y - dy, 2 * dy + 1, color)?;
                d.fast_vline(x - dx, y - dy, 2 * dy + 1, color)?;
                d.fast_vline(x + dy, y - dx, 2 * dx + 1, color)?;
                d.fast_vline(x - dy, y - dx, 2 * dx + 1, color)?;
            }
            Ok(Some(Area::new(x - r, y - r, x + r, y + r)))
        })
    }
}

/// x on the edge `(xa, ya)-(xb, yb)` at row `y`, truncated toward zero
fn interpolate(xa: i32, ya: i32, xb: i32, yb: i32, y: i32) -> i32 {
    if yb == ya {
        return xa;
    }
    let dx = (xb - xa) as i64 * (y - ya) as i64 / (yb - ya) as i64;
    xa + dx as i32
}

/// Corner circle centers of a rounded rectangle
#[derive(Clone, Copy)]
struct BubbleCorners {
    radius: i32,
    left: i32,
    right: i32,
    top: i32,
    bottom: i32,
}

impl BubbleCorners {
    fn new(x: i32, y: i32, w: u16, h: u16) -> Self {
        let radius = (w.min(h) / 4) as i32;
        BubbleCorners {
            radius,
            left: x + radius,
            right: x + w as i32 - 1 - radius,
            top: y + radius,
            bottom: y + h as i32 - 1 - radius,
        }
    }
}

/// First octant of a midpoint circle, as `(x, y)` offsets with `x <= y`
struct MidpointCircle {
    x: i32,
    y: i32,
    p: i32,
}

impl MidpointCircle {
    fn new(radius: i32) -> Self {
        MidpointCircle {
            x: 0,
            y: radius,
            p: 1 - radius,
        }
    }
}

impl Iterator for MidpointCircle {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<(i32, i32)> {
        if self.x > self.y {
            return None;
        }
        let point = (self.x, self.y);
        if self.p < 0 {
            self.p += 2 * self.x + 3;
        } else {
            self.p += 2 * (self.x - self.y) + 5;
            self.y -= 1;
        }
        self.x += 1;
        Some(point)
    }
}
