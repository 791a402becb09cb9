use crate::refresh::Area;
use crate::{Amoled, DriverError, Interface, Panel};
use embedded_graphics_core::{
    pixelcolor::{raw::RawU16, Rgb565},
    prelude::*,
    primitives::Rectangle,
};
use embedded_hal::digital::OutputPin;

impl<IFACE, RESET, P> OriginDimensions for Amoled<IFACE, RESET, P>
where
    IFACE: Interface,
    RESET: OutputPin,
    P: Panel,
{
    fn size(&self) -> Size {
        Size::new(self.width() as u32, self.height() as u32)
    }
}

/// Pixels are written to the framebuffer and the touched region is flushed
/// once per call.
impl<IFACE, RESET, P> DrawTarget for Amoled<IFACE, RESET, P>
where
    IFACE: Interface,
    RESET: OutputPin,
    P: Panel,
{
    type Error = DriverError<IFACE, RESET>;

    type Color = Rgb565;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let bounds = self.bounding_box();
        self.batch(|d| {
            let mut dirty: Option<Area> = None;
            for Pixel(point, color) in pixels {
                if bounds.contains(point) {
                    d.store(point.x, point.y, RawU16::from(color).into_inner());
                    dirty = Some(Area::point(point.x, point.y).union(dirty));
                }
            }
            Ok(dirty)
        })
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        let drawable_area = area.intersection(&self.bounding_box());

        if let Some(bottom_right) = drawable_area.bottom_right() {
            let top_left = drawable_area.top_left;
            self.batch(|d| {
                for (point, color) in area.points().zip(colors) {
                    if drawable_area.contains(point) {
                        d.store(point.x, point.y, RawU16::from(color).into_inner());
                    }
                }
                Ok(Some(Area::new(
                    top_left.x,
                    top_left.y,
                    bottom_right.x,
                    bottom_right.y,
                )))
            })
        } else {
            // No pixels are on screen
            Ok(())
        }
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let drawable_area = area.intersection(&self.bounding_box());
        if drawable_area.is_zero_sized() {
            return Ok(());
        }
        self.fill_rect(
            drawable_area.top_left.x,
            drawable_area.top_left.y,
            drawable_area.size.width as u16,
            drawable_area.size.height as u16,
            RawU16::from(color).into_inner(),
        )
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fill(RawU16::from(color).into_inner())
    }
}
