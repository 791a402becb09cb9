//! Per-controller constants: rotation tables and register init scripts.

use crate::{madctl, Command};

/// One orientation of a panel: the MADCTL bits that select it, the logical
/// size it yields and the controller RAM offset of the visible area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationEntry {
    pub madctl: u8,
    pub width: u16,
    pub height: u16,
    pub column_start: u16,
    pub row_start: u16,
}

impl RotationEntry {
    pub const fn new(madctl: u8, width: u16, height: u16, column_start: u16, row_start: u16) -> Self {
        Self {
            madctl,
            width,
            height,
            column_start,
            row_start,
        }
    }
}

/// A step of an init script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitCommand {
    /// Register write with literal parameters
    Write(u8, &'static [u8]),
    /// COLMOD with the configured pixel format
    PixelFormat,
    /// MADCTL with the current register mirror
    AddressMode,
    /// Pause, in milliseconds
    Delay(u32),
}

/// Static description of a supported controller.
pub trait Panel {
    const NAME: &'static str;
    const ROTATIONS: [RotationEntry; 4];
    const INIT_SEQUENCE: &'static [InitCommand];
}

const ROT_0: u8 = madctl::RGB;
const ROT_90: u8 = madctl::MX | madctl::MV;
const ROT_180: u8 = madctl::MX | madctl::MY;
const ROT_270: u8 = madctl::MY | madctl::MV;

/// RM67162, 240x536 (LilyGo T-Display-S3 AMOLED)
#[derive(Debug, Clone, Copy, Default)]
pub struct Rm67162;

impl Panel for Rm67162 {
    const NAME: &'static str = "rm67162";

    const ROTATIONS: [RotationEntry; 4] = [
        RotationEntry::new(ROT_0, 240, 536, 0, 0),
        RotationEntry::new(ROT_90, 536, 240, 0, 0),
        RotationEntry::new(ROT_180, 240, 536, 0, 0),
        RotationEntry::new(ROT_270, 536, 240, 0, 0),
    ];

    const INIT_SEQUENCE: &'static [InitCommand] = &[
        InitCommand::Write(Command::SwitchMode as u8, &[0x05]),
        InitCommand::Write(0x05, &[0x05]),
        InitCommand::Write(Command::SwitchMode as u8, &[0x01]),
        InitCommand::Write(0x73, &[0x25]),
        InitCommand::Write(Command::SwitchMode as u8, &[0x00]),
        InitCommand::PixelFormat,
        InitCommand::Write(Command::SetTearScanline as u8, &[0x00, 0x80]),
        InitCommand::Write(Command::TearingEffectOn as u8, &[0x00]),
        InitCommand::Write(Command::WriteBrightness as u8, &[0x00]),
        InitCommand::Write(Command::SleepOut as u8, &[]),
        InitCommand::Delay(120),
        InitCommand::AddressMode,
        InitCommand::Write(Command::DisplayOn as u8, &[]),
        InitCommand::Write(Command::WriteBrightness as u8, &[0xFF]),
    ];
}

/// RM690B0, 450x600 with a 16 pixel RAM offset along the short side
#[derive(Debug, Clone, Copy, Default)]
pub struct Rm690b0;

impl Panel for Rm690b0 {
    const NAME: &'static str = "rm690b0";

    const ROTATIONS: [RotationEntry; 4] = [
        RotationEntry::new(ROT_0, 450, 600, 16, 0),
        RotationEntry::new(ROT_90, 600, 450, 0, 16),
        RotationEntry::new(ROT_180, 450, 600, 16, 0),
        RotationEntry::new(ROT_270, 600, 450, 0, 16),
    ];

    const INIT_SEQUENCE: &'static [InitCommand] = &[
        InitCommand::Write(Command::SwitchMode as u8, &[0x20]),
        InitCommand::Write(0x26, &[0x0A]),
        InitCommand::Write(0x24, &[0x80]),
        InitCommand::Write(0x5A, &[0x51]),
        InitCommand::Write(0x5B, &[0x2E]),
        InitCommand::Write(Command::SwitchMode as u8, &[0x00]),
        InitCommand::Write(Command::ColumnAddressSet as u8, &[0x00, 0x10, 0x01, 0xD1]),
        InitCommand::Write(Command::PageAddressSet as u8, &[0x00, 0x00, 0x02, 0x57]),
        InitCommand::PixelFormat,
        InitCommand::Write(Command::SetDisplayMode as u8, &[0x00]),
        InitCommand::Write(Command::SetTearScanline as u8, &[0x01, 0x66]),
        InitCommand::Write(Command::TearingEffectOn as u8, &[0x00]),
        InitCommand::Write(Command::WriteBrightness as u8, &[0x00]),
        InitCommand::Write(Command::SleepOut as u8, &[]),
        InitCommand::Delay(120),
        InitCommand::AddressMode,
        InitCommand::Write(Command::DisplayOn as u8, &[]),
        InitCommand::Write(Command::WriteBrightness as u8, &[0xFF]),
    ];
}

/// SH8601, 368x448. Rotates through the mirror bits only.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sh8601;

impl Panel for Sh8601 {
    const NAME: &'static str = "sh8601";

    const ROTATIONS: [RotationEntry; 4] = [
        RotationEntry::new(0x00, 368, 448, 0, 0),
        RotationEntry::new(0x02, 368, 448, 0, 0),
        RotationEntry::new(0x05, 368, 448, 0, 0),
        RotationEntry::new(0x07, 368, 448, 0, 0),
    ];

    const INIT_SEQUENCE: &'static [InitCommand] = &[
        InitCommand::Write(Command::SleepOut as u8, &[]),
        InitCommand::Delay(120),
        InitCommand::Write(Command::SetTearScanline as u8, &[0x01, 0x2C]),
        InitCommand::PixelFormat,
        InitCommand::AddressMode,
        InitCommand::Write(Command::TearingEffectOn as u8, &[0x00]),
        InitCommand::Write(Command::WriteCtrlDisplay as u8, &[0x20]),
        InitCommand::Delay(10),
        InitCommand::Write(Command::ColumnAddressSet as u8, &[0x00, 0x00, 0x01, 0x6F]),
        InitCommand::Write(Command::PageAddressSet as u8, &[0x00, 0x00, 0x01, 0xBF]),
        InitCommand::Write(Command::WriteBrightness as u8, &[0x00]),
        InitCommand::Delay(10),
        InitCommand::Write(Command::DisplayOn as u8, &[]),
        InitCommand::Delay(10),
        InitCommand::Write(Command::WriteBrightness as u8, &[0xFF]),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{display, display_with, MockDelay, Op};
    use crate::Config;

    fn swapped(a: &RotationEntry, b: &RotationEntry) -> bool {
        a.width == b.height && a.height == b.width
    }

    #[test]
    fn rotation_tables_alternate_orientation() {
        for table in [Rm67162::ROTATIONS, Rm690b0::ROTATIONS] {
            assert!(swapped(&table[0], &table[1]));
            assert_eq!(table[0].width, table[2].width);
            assert_eq!(table[1].width, table[3].width);
        }
    }

    #[test]
    fn rm67162_init_uses_configured_pixel_format() {
        let mut d = display_with(Rm67162, Config::default().with_bits_per_pixel(24));
        d.interface.ops.clear();
        let mut delay = MockDelay::default();
        d.init(&mut delay).unwrap();

        let ops = &d.interface.ops;
        assert_eq!(ops[0], Op::Write(0xFE, vec![0x05]));
        assert_eq!(ops[5], Op::Write(0x3A, vec![0x77]));
        assert_eq!(ops[10], Op::Write(0x36, vec![0x00]));
        assert_eq!(ops.last(), Some(&Op::Write(0x51, vec![0xFF])));
        assert_eq!(ops.len(), 13);
        assert_eq!(delay.total_ms, 120);
    }

    #[test]
    fn rm690b0_init_programs_full_window() {
        let mut d = display(Rm690b0);
        d.interface.ops.clear();
        d.init(&mut MockDelay::default()).unwrap();
        assert!(d
            .interface
            .ops
            .contains(&Op::Write(0x2A, vec![0x00, 0x10, 0x01, 0xD1])));
        assert!(d.interface.ops.contains(&Op::Write(0x3A, vec![0x55])));
    }

    #[test]
    fn rm690b0_init_enables_tearing_signal() {
        let mut d = display(Rm690b0);
        d.interface.ops.clear();
        d.init(&mut MockDelay::default()).unwrap();
        let ops = &d.interface.ops;
        let colmod = ops.iter().position(|op| *op == Op::Write(0x3A, vec![0x55])).unwrap();
        assert_eq!(
            ops[colmod + 1..colmod + 4],
            [
                Op::Write(Command::SetDisplayMode as u8, vec![0x00]),
                Op::Write(Command::SetTearScanline as u8, vec![0x01, 0x66]),
                Op::Write(Command::TearingEffectOn as u8, vec![0x00]),
            ]
        );
        assert_eq!(ops[0], Op::Write(Command::SwitchMode as u8, vec![0x20]));
    }

    #[test]
    fn sh8601_init_delays() {
        let mut d = display(Sh8601);
        let mut delay = MockDelay::default();
        d.init(&mut delay).unwrap();
        assert_eq!(delay.total_ms, 150);
        assert_eq!(d.interface.ops.last(), Some(&Op::Write(0x51, vec![0xFF])));
    }
}
