#![cfg_attr(not(test), no_std)]
//! Framebuffer driver for small QSPI AMOLED panels (RM67162, RM690B0, SH8601).
//!
//! The driver keeps a full RGB565 framebuffer in RAM. Every drawing operation
//! writes into the framebuffer and then streams the smallest even-aligned
//! window covering the change to the panel, unless auto refresh is turned off
//! (see [`Amoled::set_auto_refresh`] and [`Amoled::refresh`]).
//!
//! ```ignore
//! let bus = amoled::spi::SpiInterface::new_quad(spi_device);
//! let mut display = Amoled::new(bus, Some(reset_pin), Rm67162, Config::default())?;
//! display.reset(&mut delay)?;
//! display.init(&mut delay)?;
//! display.set_rotation(1)?;
//! display.fill(amoled::color::BLACK)?;
//! display.fill_circle(100, 100, 40, amoled::color::RED)?;
//! ```

extern crate alloc;

use alloc::vec::Vec;
use core::fmt;
use core::marker::PhantomData;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};

use display_interface::DataFormat::U8;
use display_interface::{DisplayError, WriteOnlyDataCommand};

pub mod color;
pub mod draw;
pub mod font;
pub mod jpeg;
pub mod panel;
pub mod polygon;
pub mod refresh;
pub mod spi;

#[cfg(feature = "graphics")]
mod graphics_core;

#[cfg(test)]
mod mock;

pub use font::{Background, BitmapFont, IndexedFont, StrokeFont};
pub use jpeg::{DecodedImage, JpegDecoder, JpegRect};
pub use panel::{InitCommand, Panel, RotationEntry, Rm67162, Rm690b0, Sh8601};
pub use polygon::Point;
pub use refresh::PixelFormat;

/// Driver release tag.
pub const VERSION: &str = "09.02.2025";

/// Return the driver release tag.
pub fn version() -> &'static str {
    VERSION
}

/// Trait representing the interface to the hardware.
///
/// Abstracts the bus (QSPI, SPI with a D/C pin, ...) from the controller code.
/// The driver never issues bus transactions except through these calls.
pub trait Interface {
    type Error;

    /// Sends a command with a sequence of 8-bit parameters
    fn write(&mut self, command: u8, params: &[u8]) -> Result<(), Self::Error>;

    /// Streams pixel data into the window programmed by the last
    /// column/row address commands
    fn write_pixels(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Releases bus resources. Called once by [`Amoled::deinit`].
    fn deinit(&mut self) {}
}

/// `Interface` implementation for buses driven through `display-interface`
/// (command/data pin framing).
pub struct DataCommandInterface<DI> {
    di: DI,
}

impl<DI: WriteOnlyDataCommand> DataCommandInterface<DI> {
    pub fn new(di: DI) -> Self {
        Self { di }
    }

    pub fn release(self) -> DI {
        self.di
    }
}

impl<DI: WriteOnlyDataCommand> Interface for DataCommandInterface<DI> {
    type Error = DisplayError;

    fn write(&mut self, command: u8, params: &[u8]) -> Result<(), Self::Error> {
        self.di.send_commands(U8(&[command]))?;
        if params.is_empty() {
            return Ok(());
        }
        self.di.send_data(U8(params))
    }

    fn write_pixels(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.di.send_commands(U8(&[Command::MemoryWrite as u8]))?;
        self.di.send_data(U8(data))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error<IfaceE, PinE> {
    /// The bus adapter reported a fault
    Interface(IfaceE),
    /// The reset pin could not be driven
    OutputPin(PinE),
    UnsupportedColorSpace,
    UnsupportedPixelWidth(u8),
    OutOfMemory,
    /// A caller supplied buffer cannot hold `required` bytes
    BufferTooSmall { required: usize },
    PolygonData,
    /// A scanline crossed more polygon edges than the configured capacity
    PolygonTooComplex { corners: usize },
    JpegPrepare,
    JpegDecompress,
    /// Fixed scroll lines leave no room on a screen `height` lines tall
    ScrollArea { height: u16 },
}

impl<IfaceE: fmt::Debug, PinE: fmt::Debug> fmt::Display for Error<IfaceE, PinE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Interface(e) => write!(f, "bus fault: {:?}", e),
            Error::OutputPin(e) => write!(f, "reset pin fault: {:?}", e),
            Error::UnsupportedColorSpace => f.write_str("unsupported color space"),
            Error::UnsupportedPixelWidth(bpp) => write!(f, "unsupported pixel width: {}", bpp),
            Error::OutOfMemory => f.write_str("out of memory"),
            Error::BufferTooSmall { required } => {
                write!(f, "buffer too small, {} bytes required", required)
            }
            Error::PolygonData => f.write_str("polygon data error"),
            Error::PolygonTooComplex { corners } => {
                write!(f, "polygon too complex, more than {} corners on a scanline", corners)
            }
            Error::JpegPrepare => f.write_str("jpg prepare failed"),
            Error::JpegDecompress => f.write_str("jpg decompress failed"),
            Error::ScrollArea { height } => {
                write!(f, "fixed scroll lines exceed screen height {}", height)
            }
        }
    }
}

/// Error type of an [`Amoled`] driving bus `IFACE` with reset pin `RESET`.
pub type DriverError<IFACE, RESET> =
    Error<<IFACE as Interface>::Error, <RESET as ErrorType>::Error>;

/// Subpixel order written to the MADCTL register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorOrder {
    Rgb,
    Bgr,
    /// Accepted by the type but rejected by every supported controller
    Monochrome,
}

/// Construction parameters. Defaults: RGB, 16 bpp, reset active low,
/// auto refresh on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub color_order: ColorOrder,
    pub bits_per_pixel: u8,
    /// Level that holds the panel in reset
    pub reset_level: bool,
    pub auto_refresh: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            color_order: ColorOrder::Rgb,
            bits_per_pixel: 16,
            reset_level: false,
            auto_refresh: true,
        }
    }
}

impl Config {
    pub fn with_color_order(mut self, color_order: ColorOrder) -> Self {
        self.color_order = color_order;
        self
    }

    pub fn with_bits_per_pixel(mut self, bits_per_pixel: u8) -> Self {
        self.bits_per_pixel = bits_per_pixel;
        self
    }

    pub fn with_reset_level(mut self, reset_level: bool) -> Self {
        self.reset_level = reset_level;
        self
    }

    pub fn with_auto_refresh(mut self, auto_refresh: bool) -> Self {
        self.auto_refresh = auto_refresh;
        self
    }
}

/// MADCTL bits
pub mod madctl {
    pub const MY: u8 = 0x80;
    pub const MX: u8 = 0x40;
    pub const MV: u8 = 0x20;
    pub const ML: u8 = 0x10;
    pub const BGR: u8 = 0x08;
    pub const MH: u8 = 0x04;
    pub const RGB: u8 = 0x00;
    /// Bits owned by color order and pixel format, kept across rotations
    pub const LOW_MASK: u8 = 0x1F;
}

/// Framebuffer driver for one AMOLED panel.
///
/// The framebuffer holds one RGB565 cell per pixel of the current rotation,
/// rows `width` cells long. Drawing calls mutate it and, unless a compound
/// shape is being assembled or auto refresh is off, flush the touched region.
pub struct Amoled<IFACE, RESET, P> {
    interface: IFACE,
    reset: Option<RESET>,
    reset_level: bool,
    color_order: ColorOrder,
    pixel_format: PixelFormat,

    rotations: [RotationEntry; 4],
    rotation: u8,
    /// MADCTL bits owned by the active rotation entry
    rotation_bits: u8,
    madctl: u8,
    width: u16,
    height: u16,
    max_x: u16,
    max_y: u16,
    x_gap: u16,
    y_gap: u16,

    auto_refresh: bool,
    hold_display: bool,
    framebuffer: Vec<u16>,

    max_poly_corners: usize,
    jpeg_buffer_size: Option<usize>,
    _panel: PhantomData<P>,
}

impl<IFACE, RESET, P> Amoled<IFACE, RESET, P>
where
    IFACE: Interface,
    RESET: OutputPin,
    P: Panel,
{
    /// Validate `config`, allocate the framebuffer for rotation 0 and write
    /// the initial MADCTL value.
    ///
    /// The panel is not reset or initialized; call [`reset`](Self::reset) and
    /// [`init`](Self::init) afterwards.
    pub fn new(
        interface: IFACE,
        reset: Option<RESET>,
        _panel: P,
        config: Config,
    ) -> Result<Self, DriverError<IFACE, RESET>> {
        let madctl = match config.color_order {
            ColorOrder::Rgb => madctl::RGB,
            ColorOrder::Bgr => madctl::BGR,
            ColorOrder::Monochrome => return Err(Error::UnsupportedColorSpace),
        };
        let pixel_format = PixelFormat::from_bits(config.bits_per_pixel)
            .ok_or(Error::UnsupportedPixelWidth(config.bits_per_pixel))?;

        let first = P::ROTATIONS[0];
        let mut framebuffer = Vec::new();
        let len = first.width as usize * first.height as usize;
        framebuffer
            .try_reserve_exact(len)
            .map_err(|_| Error::OutOfMemory)?;
        framebuffer.resize(len, 0);

        let mut amoled = Amoled {
            interface,
            reset,
            reset_level: config.reset_level,
            color_order: config.color_order,
            pixel_format,
            rotations: P::ROTATIONS,
            rotation: 0,
            rotation_bits: 0,
            madctl,
            width: first.width,
            height: first.height,
            max_x: first.width.saturating_sub(1),
            max_y: first.height.saturating_sub(1),
            x_gap: first.column_start,
            y_gap: first.row_start,
            auto_refresh: config.auto_refresh,
            hold_display: false,
            framebuffer,
            max_poly_corners: polygon::MAX_POLY_CORNERS,
            jpeg_buffer_size: None,
            _panel: PhantomData,
        };

        log::debug!(
            "{}: color order {:?}, {:?}, framebuffer {}x{}",
            P::NAME,
            amoled.color_order,
            amoled.pixel_format,
            amoled.width,
            amoled.height
        );

        amoled.set_rotation(0)?;
        Ok(amoled)
    }

    /// Hardware reset through the reset pin, or a software reset when the
    /// driver was built without one.
    pub fn reset<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), DriverError<IFACE, RESET>> {
        let level = self.reset_level;
        if let Some(pin) = self.reset.as_mut() {
            log::debug!("{}: hardware reset", P::NAME);
            set_level(pin, level).map_err(Error::OutputPin)?;
            delay.delay_ms(300);
            set_level(pin, !level).map_err(Error::OutputPin)?;
            delay.delay_ms(200);
            return Ok(());
        }
        log::debug!("{}: software reset", P::NAME);
        self.command(Command::SoftwareReset, &[])
    }

    /// Run the panel's register initialization script.
    ///
    /// Bus faults abort the script and leave the panel in an undefined state;
    /// only a reset recovers it.
    pub fn init<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), DriverError<IFACE, RESET>> {
        log::debug!("{}: running init sequence", P::NAME);
        for step in P::INIT_SEQUENCE {
            match *step {
                InitCommand::Write(cmd, params) => self.write_register(cmd, params)?,
                InitCommand::PixelFormat => {
                    let colmod = self.pixel_format.colmod();
                    self.command(Command::PixelFormatSet, &[colmod])?
                }
                InitCommand::AddressMode => {
                    let madctl = self.madctl;
                    self.command(Command::MemoryAccessControl, &[madctl])?
                }
                InitCommand::Delay(ms) => delay.delay_ms(ms),
            }
        }
        Ok(())
    }

    /// Tear down the bus and hand back the bus adapter and reset pin.
    /// The framebuffer is freed.
    pub fn deinit(mut self) -> (IFACE, Option<RESET>) {
        self.interface.deinit();
        (self.interface, self.reset)
    }

    /// Write `params` to register `cmd` unchanged
    pub fn send_command(&mut self, cmd: u8, params: &[u8]) -> Result<(), DriverError<IFACE, RESET>> {
        self.write_register(cmd, params)
    }

    fn command(&mut self, cmd: Command, args: &[u8]) -> Result<(), DriverError<IFACE, RESET>> {
        self.write_register(cmd as u8, args)
    }

    fn write_register(&mut self, cmd: u8, args: &[u8]) -> Result<(), DriverError<IFACE, RESET>> {
        self.interface.write(cmd, args).map_err(Error::Interface)
    }

    fn write_madctl(&mut self) -> Result<(), DriverError<IFACE, RESET>> {
        let madctl = self.madctl;
        self.command(Command::MemoryAccessControl, &[madctl])
    }

    /// Apply rotation `rotation % 4` from the active rotation table.
    ///
    /// The low five MADCTL bits (color order) are kept, except those the
    /// previous entry set, and the entry's bits are merged in. The logical
    /// size and address gaps follow the entry. The framebuffer grows when the
    /// new orientation needs more cells.
    pub fn set_rotation(&mut self, rotation: u8) -> Result<(), DriverError<IFACE, RESET>> {
        let rotation = rotation % 4;
        let entry = self.rotations[rotation as usize];

        let len = entry.width as usize * entry.height as usize;
        if len > self.framebuffer.len() {
            self.framebuffer
                .try_reserve_exact(len - self.framebuffer.len())
                .map_err(|_| Error::OutOfMemory)?;
            self.framebuffer.resize(len, 0);
        }

        self.madctl &= madctl::LOW_MASK & !self.rotation_bits;
        self.madctl |= entry.madctl;
        self.write_madctl()?;

        self.rotation = rotation;
        self.rotation_bits = entry.madctl;
        self.width = entry.width;
        self.height = entry.height;
        self.max_x = entry.width.saturating_sub(1);
        self.max_y = entry.height.saturating_sub(1);
        self.x_gap = entry.column_start;
        self.y_gap = entry.row_start;

        log::debug!(
            "{}: rotation {} madctl {:#04x} size {}x{}",
            P::NAME,
            rotation,
            self.madctl,
            self.width,
            self.height
        );
        Ok(())
    }

    /// Replace the first `table.len()` (at most 4) rotation entries, then
    /// apply `rotation`.
    pub fn set_rotation_with_table(
        &mut self,
        rotation: u8,
        table: &[RotationEntry],
    ) -> Result<(), DriverError<IFACE, RESET>> {
        for (slot, entry) in self.rotations.iter_mut().zip(table) {
            *slot = *entry;
        }
        self.set_rotation(rotation)
    }

    pub fn rotation(&self) -> u8 {
        self.rotation
    }

    /// Get the current screen width. It can change based on the current rotation
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Get the current screen height. It can change based on the current rotation
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Last value written to the MADCTL register
    pub fn madctl(&self) -> u8 {
        self.madctl
    }

    pub fn color_order(&self) -> ColorOrder {
        self.color_order
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// Column and row address offsets added to every window
    pub fn gap(&self) -> (u16, u16) {
        (self.x_gap, self.y_gap)
    }

    pub fn set_gap(&mut self, x_gap: u16, y_gap: u16) {
        self.x_gap = x_gap;
        self.y_gap = y_gap;
    }

    /// Mirror the column (`x`) and row (`y`) address order.
    pub fn mirror(&mut self, x: bool, y: bool) -> Result<(), DriverError<IFACE, RESET>> {
        set_bit(&mut self.madctl, madctl::MX, x);
        set_bit(&mut self.madctl, madctl::MY, y);
        self.write_madctl()
    }

    /// Exchange rows and columns. Not checked against the rotation bits.
    pub fn swap_axes(&mut self, swap: bool) -> Result<(), DriverError<IFACE, RESET>> {
        set_bit(&mut self.madctl, madctl::MV, swap);
        self.write_madctl()
    }

    pub fn invert_color(&mut self, invert: bool) -> Result<(), DriverError<IFACE, RESET>> {
        if invert {
            self.command(Command::InvertOn, &[])
        } else {
            self.command(Command::InvertOff, &[])
        }
    }

    /// Leave sleep mode and enable the panel output
    pub fn display_on(&mut self) -> Result<(), DriverError<IFACE, RESET>> {
        self.command(Command::SleepOut, &[])?;
        self.command(Command::DisplayOn, &[])
    }

    /// Enter sleep mode and disable the panel output
    pub fn display_off(&mut self) -> Result<(), DriverError<IFACE, RESET>> {
        self.command(Command::SleepIn, &[])?;
        self.command(Command::DisplayOff, &[])
    }

    pub fn backlight_on(&mut self) -> Result<(), DriverError<IFACE, RESET>> {
        self.brightness(0xFF)
    }

    pub fn backlight_off(&mut self) -> Result<(), DriverError<IFACE, RESET>> {
        self.brightness(0x00)
    }

    pub fn brightness(&mut self, level: u8) -> Result<(), DriverError<IFACE, RESET>> {
        self.command(Command::WriteBrightness, &[level])
    }

    /// Define the vertical scrolling area: top fixed lines, scrolled lines and
    /// bottom fixed lines.
    pub fn set_vertical_scroll_area(
        &mut self,
        top_fixed: u16,
        scroll_lines: u16,
        bottom_fixed: u16,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        let [t0, t1] = top_fixed.to_be_bytes();
        let [s0, s1] = scroll_lines.to_be_bytes();
        let [b0, b1] = bottom_fixed.to_be_bytes();
        self.command(Command::VerticalScrollDefine, &[t0, t1, s0, s1, b0, b1])
    }

    /// Set the first line shown in the scrolling area. `bottom_to_top`
    /// selects the MADCTL line refresh order.
    pub fn set_vertical_scroll_start(
        &mut self,
        start: u16,
        bottom_to_top: bool,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        set_bit(&mut self.madctl, madctl::ML, bottom_to_top);
        self.write_madctl()?;
        self.command(Command::VerticalScrollAddr, &start.to_be_bytes())
    }

    /// Configures the screen for hardware-accelerated vertical scrolling.
    ///
    /// Fails with [`Error::ScrollArea`] unless at least one line is left to
    /// scroll between the fixed areas.
    pub fn configure_vertical_scroll(
        &mut self,
        fixed_top_lines: u16,
        fixed_bottom_lines: u16,
    ) -> Result<Scroller, DriverError<IFACE, RESET>> {
        let height = self.height;
        let fixed = fixed_top_lines as u32 + fixed_bottom_lines as u32;
        if fixed >= height as u32 {
            return Err(Error::ScrollArea { height });
        }
        let scroll_lines = height - fixed_top_lines - fixed_bottom_lines;
        self.set_vertical_scroll_area(fixed_top_lines, scroll_lines, fixed_bottom_lines)?;
        Ok(Scroller::new(fixed_top_lines, fixed_bottom_lines, height))
    }

    pub fn scroll_vertically(
        &mut self,
        scroller: &mut Scroller,
        num_lines: u16,
    ) -> Result<(), DriverError<IFACE, RESET>> {
        let top = scroller.fixed_top_lines as u32;
        let area = scroller.height as u32 - top - scroller.fixed_bottom_lines as u32;
        let offset = top + (scroller.top_offset as u32 - top + num_lines as u32) % area;
        scroller.top_offset = offset as u16;
        let start = scroller.top_offset;
        self.set_vertical_scroll_start(start, false)
    }

    /// Capacity of the per-scanline crossing list used by
    /// [`fill_polygon`](Self::fill_polygon)
    pub fn set_max_polygon_corners(&mut self, corners: usize) {
        self.max_poly_corners = corners;
    }

    /// Limit for the pixel buffer used by [`jpg`](Self::jpg), in bytes.
    /// `None` lets the buffer grow to the image size.
    pub fn set_jpeg_buffer_size(&mut self, size: Option<usize>) {
        self.jpeg_buffer_size = size;
    }
}

fn set_level<PIN: OutputPin>(pin: &mut PIN, high: bool) -> Result<(), PIN::Error> {
    if high {
        pin.set_high()
    } else {
        pin.set_low()
    }
}

fn set_bit(reg: &mut u8, bit: u8, on: bool) {
    if on {
        *reg |= bit;
    } else {
        *reg &= !bit;
    }
}

/// Scroller must be provided in order to scroll the screen. It can only be obtained
/// by configuring the screen for scrolling.
pub struct Scroller {
    top_offset: u16,
    fixed_bottom_lines: u16,
    fixed_top_lines: u16,
    height: u16,
}

impl Scroller {
    fn new(fixed_top_lines: u16, fixed_bottom_lines: u16, height: u16) -> Scroller {
        Scroller {
            top_offset: fixed_top_lines,
            fixed_top_lines,
            fixed_bottom_lines,
            height,
        }
    }

    /// First line currently shown in the scrolling area
    pub fn top_offset(&self) -> u16 {
        self.top_offset
    }
}

/// Controller commands shared by all supported panels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    SoftwareReset = 0x01,
    SleepIn = 0x10,
    SleepOut = 0x11,
    InvertOff = 0x20,
    InvertOn = 0x21,
    DisplayOff = 0x28,
    DisplayOn = 0x29,
    ColumnAddressSet = 0x2a,
    PageAddressSet = 0x2b,
    MemoryWrite = 0x2c,
    VerticalScrollDefine = 0x33,
    TearingEffectOn = 0x35,
    MemoryAccessControl = 0x36,
    VerticalScrollAddr = 0x37,
    PixelFormatSet = 0x3a,
    MemoryWriteContinue = 0x3c,
    SetTearScanline = 0x44,
    WriteBrightness = 0x51,
    WriteCtrlDisplay = 0x53,
    SetDisplayMode = 0xc2,
    SwitchMode = 0xfe,
}
