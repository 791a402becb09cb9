//! JPEG blit and decode on top of a block decoder.
//!
//! Decoding itself is left to a [`JpegDecoder`] implementation (a TJpgDec
//! style block decoder reading from a file or memory). The driver owns the
//! work area and pixel buffers for the duration of one call.

use alloc::vec::Vec;

use embedded_hal::digital::OutputPin;

use crate::{Amoled, DriverError, Error, Interface, Panel};

/// Size of the decoder work area, in bytes
pub const JPEG_WORK_AREA_SIZE: usize = 3100;

/// Fill value of crop output cells no decoded block covers
pub const CROP_FILL: u16 = 0xEFEF;

/// Image region of one decoded block, inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegRect {
    pub left: u16,
    pub top: u16,
    pub right: u16,
    pub bottom: u16,
}

impl JpegRect {
    pub fn width(&self) -> usize {
        (self.right - self.left) as usize + 1
    }
}

/// A block based JPEG decoder.
pub trait JpegDecoder {
    type Error;

    /// Parse the headers using `work` as scratch memory and return the image
    /// width and height
    fn prepare(&mut self, work: &mut [u8]) -> Result<(u16, u16), Self::Error>;

    /// Decode the image, handing each block to `output` as row-major RGB565
    /// cells. Decoding stops early when `output` returns `false`.
    fn decompress(
        &mut self,
        work: &mut [u8],
        output: &mut dyn FnMut(&JpegRect, &[u16]) -> bool,
    ) -> Result<(), Self::Error>;
}

/// Pixels returned by [`Amoled::jpg_decode`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub pixels: Vec<u16>,
    pub width: u16,
    pub height: u16,
}

fn alloc_cells(len: usize, fill: u16) -> Option<Vec<u16>> {
    let mut cells = Vec::new();
    cells.try_reserve_exact(len).ok()?;
    cells.resize(len, fill);
    Some(cells)
}

/// Copy the part of `block` at `rect` that falls inside the `dst_w` x `dst_h`
/// window whose top-left image coordinate is `(left, top)`.
#[allow(clippy::too_many_arguments)]
fn copy_block(
    dst: &mut [u16],
    dst_w: usize,
    dst_h: usize,
    left: usize,
    top: usize,
    rect: &JpegRect,
    block: &[u16],
) {
    let block_w = rect.width();
    let x0 = (rect.left as usize).max(left);
    let x1 = (rect.right as usize).min(left + dst_w - 1);
    let y0 = (rect.top as usize).max(top);
    let y1 = (rect.bottom as usize).min(top + dst_h - 1);
    if x0 > x1 || y0 > y1 {
        return;
    }
    let run = x1 - x0 + 1;

    for row in y0..=y1 {
        let src = (row - rect.top as usize) * block_w + (x0 - rect.left as usize);
        let to = (row - top) * dst_w + (x0 - left);
        if let (Some(from), Some(into)) = (block.get(src..src + run), dst.get_mut(to..to + run)) {
            into.copy_from_slice(from);
        }
    }
}

impl<IFACE, RESET, P> Amoled<IFACE, RESET, P>
where
    IFACE: Interface,
    RESET: OutputPin,
    P: Panel,
{
    fn jpeg_work_area(&self) -> Result<Vec<u8>, DriverError<IFACE, RESET>> {
        let mut work = Vec::new();
        work.try_reserve_exact(JPEG_WORK_AREA_SIZE)
            .map_err(|_| Error::OutOfMemory)?;
        work.resize(JPEG_WORK_AREA_SIZE, 0);
        Ok(work)
    }

    /// Decode a JPEG into the framebuffer with its top-left corner at
    /// `(x, y)`, then refresh the whole screen. Parts off screen are clipped.
    pub fn jpg<D: JpegDecoder>(
        &mut self,
        decoder: &mut D,
        x: i32,
        y: i32,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        let mut work = self.jpeg_work_area()?;
        let (width, height) = decoder
            .prepare(&mut work)
            .map_err(|_| Error::JpegPrepare)?;
        let (w, h) = (width as usize, height as usize);

        let required = 2 * w * h;
        if let Some(limit) = self.jpeg_buffer_size {
            if required > limit {
                log::warn!("jpg buffer too small, {} bytes required", required);
                return Err(Error::BufferTooSmall { required });
            }
        }
        if w == 0 || h == 0 {
            return Ok(());
        }

        let mut pixels = alloc_cells(w * h, 0).ok_or(Error::OutOfMemory)?;
        decoder
            .decompress(&mut work, &mut |rect: &JpegRect, block: &[u16]| {
                copy_block(&mut pixels, w, h, 0, 0, rect, block);
                true
            })
            .map_err(|_| Error::JpegDecompress)?;
        drop(work);

        for (row, line) in pixels.chunks_exact(w).enumerate() {
            for (col, &color) in line.iter().enumerate() {
                self.store(x + col as i32, y + row as i32, color);
            }
        }

        let (sw, sh) = (self.width as i32, self.height as i32);
        self.flush(0, 0, sw, sh)
    }

    /// Decode a JPEG, or the `(x, y, width, height)` part of it given by
    /// `crop`, into a new pixel buffer. The framebuffer is not touched.
    pub fn jpg_decode<D: JpegDecoder>(
        &mut self,
        decoder: &mut D,
        crop: Option<(u16, u16, u16, u16)>,
    ) -> Result<DecodedImage, DriverError<IFACE, RESET>> {
        let mut work = self.jpeg_work_area()?;
        let (image_w, image_h) = decoder
            .prepare(&mut work)
            .map_err(|_| Error::JpegPrepare)?;
        let (left, top, width, height) = crop.unwrap_or((0, 0, image_w, image_h));
        let (w, h) = (width as usize, height as usize);

        let mut pixels = alloc_cells(w * h, CROP_FILL).ok_or(Error::OutOfMemory)?;
        if w != 0 && h != 0 {
            decoder
                .decompress(&mut work, &mut |rect: &JpegRect, block: &[u16]| {
                    copy_block(&mut pixels, w, h, left as usize, top as usize, rect, block);
                    true
                })
                .map_err(|_| Error::JpegDecompress)?;
        }

        Ok(DecodedImage {
            pixels,
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::display;
    use crate::Rm67162;

    /// 4x2 image decoded as two 2x2 blocks; cell value is its index + 1
    struct Checker {
        fail_prepare: bool,
        fail_decompress: bool,
    }

    impl Checker {
        fn new() -> Self {
            Checker {
                fail_prepare: false,
                fail_decompress: false,
            }
        }
    }

    impl JpegDecoder for Checker {
        type Error = ();

        fn prepare(&mut self, work: &mut [u8]) -> Result<(u16, u16), ()> {
            assert_eq!(work.len(), JPEG_WORK_AREA_SIZE);
            if self.fail_prepare {
                return Err(());
            }
            Ok((4, 2))
        }

        fn decompress(
            &mut self,
            _work: &mut [u8],
            output: &mut dyn FnMut(&JpegRect, &[u16]) -> bool,
        ) -> Result<(), ()> {
            if self.fail_decompress {
                return Err(());
            }
            for left in [0u16, 2] {
                let rect = JpegRect {
                    left,
                    top: 0,
                    right: left + 1,
                    bottom: 1,
                };
                let block: Vec<u16> = (0..2)
                    .flat_map(|row| (left..left + 2).map(move |col| row * 4 + col + 1))
                    .collect();
                if !output(&rect, &block) {
                    break;
                }
            }
            Ok(())
        }
    }

    #[test]
    fn jpg_blits_and_refreshes_screen() {
        let mut d = display(Rm67162);
        d.interface.ops.clear();
        d.jpg(&mut Checker::new(), 10, 10).unwrap();

        assert_eq!(d.get_pixel(10, 10), Some(1));
        assert_eq!(d.get_pixel(13, 10), Some(4));
        assert_eq!(d.get_pixel(13, 11), Some(8));
        assert_eq!(d.get_pixel(14, 10), Some(0));
        assert_eq!(d.interface.windows(), [(0, 239, 0, 535)]);
    }

    #[test]
    fn jpg_clips_at_screen_edge() {
        let mut d = display(Rm67162);
        d.jpg(&mut Checker::new(), 238, -1).unwrap();
        assert_eq!(d.get_pixel(238, 0), Some(5));
        assert_eq!(d.get_pixel(239, 0), Some(6));
    }

    #[test]
    fn jpg_respects_buffer_limit() {
        let mut d = display(Rm67162);
        d.set_jpeg_buffer_size(Some(8));
        let result = d.jpg(&mut Checker::new(), 0, 0);
        assert!(matches!(result, Err(Error::BufferTooSmall { required: 16 })));

        d.set_jpeg_buffer_size(Some(16));
        d.jpg(&mut Checker::new(), 0, 0).unwrap();
    }

    #[test]
    fn decoder_faults_are_reported() {
        let mut d = display(Rm67162);
        let mut bad = Checker::new();
        bad.fail_prepare = true;
        assert!(matches!(d.jpg(&mut bad, 0, 0), Err(Error::JpegPrepare)));

        let mut bad = Checker::new();
        bad.fail_decompress = true;
        assert!(matches!(d.jpg_decode(&mut bad, None), Err(Error::JpegDecompress)));
    }

    #[test]
    fn decode_whole_image() {
        let mut d = display(Rm67162);
        d.interface.ops.clear();
        let image = d.jpg_decode(&mut Checker::new(), None).unwrap();
        assert_eq!((image.width, image.height), (4, 2));
        assert_eq!(image.pixels, (1..=8).collect::<Vec<u16>>());
        assert!(d.interface.ops.is_empty());
        assert!(d.framebuffer().iter().all(|&c| c == 0));
    }

    #[test]
    fn decode_crop_across_blocks() {
        let mut d = display(Rm67162);
        let image = d.jpg_decode(&mut Checker::new(), Some((1, 1, 2, 1))).unwrap();
        assert_eq!(image.pixels, [6, 7]);

        let image = d.jpg_decode(&mut Checker::new(), Some((3, 1, 2, 2))).unwrap();
        assert_eq!(image.pixels, [8, CROP_FILL, CROP_FILL, CROP_FILL]);
    }
}
