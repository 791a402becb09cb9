//! Recording bus, pin and delay used by the unit tests.

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};

use crate::{Amoled, Config, Interface, Panel};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Write(u8, Vec<u8>),
    Pixels(Vec<u8>),
}

#[derive(Debug, Default)]
pub struct MockBus {
    pub ops: Vec<Op>,
    pub fail: bool,
    pub deinitialized: bool,
}

impl MockBus {
    /// Pixel payloads, in order
    pub fn pixel_writes(&self) -> Vec<&[u8]> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Pixels(data) => Some(data.as_slice()),
                _ => None,
            })
            .collect()
    }

    /// Column and row windows as `(x0, x1, y0, y1)`, one per flush
    pub fn windows(&self) -> Vec<(u16, u16, u16, u16)> {
        let mut windows = Vec::new();
        let mut column = None;
        for op in &self.ops {
            match op {
                Op::Write(0x2A, p) => column = Some(span(p)),
                Op::Write(0x2B, p) => {
                    if let Some((x0, x1)) = column.take() {
                        let (y0, y1) = span(p);
                        windows.push((x0, x1, y0, y1));
                    }
                }
                _ => {}
            }
        }
        windows
    }
}

fn span(p: &[u8]) -> (u16, u16) {
    (
        u16::from_be_bytes([p[0], p[1]]),
        u16::from_be_bytes([p[2], p[3]]),
    )
}

impl Interface for MockBus {
    type Error = ();

    fn write(&mut self, command: u8, params: &[u8]) -> Result<(), ()> {
        if self.fail {
            return Err(());
        }
        self.ops.push(Op::Write(command, params.to_vec()));
        Ok(())
    }

    fn write_pixels(&mut self, data: &[u8]) -> Result<(), ()> {
        if self.fail {
            return Err(());
        }
        self.ops.push(Op::Pixels(data.to_vec()));
        Ok(())
    }

    fn deinit(&mut self) {
        self.deinitialized = true;
    }
}

#[derive(Debug, Default)]
pub struct MockPin {
    pub levels: Vec<bool>,
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.levels.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.levels.push(true);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MockDelay {
    pub total_ms: u32,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ms += ns / 1_000_000;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ms += ms;
    }
}

pub type TestDisplay<P> = Amoled<MockBus, MockPin, P>;

pub fn display<P: Panel>(panel: P) -> TestDisplay<P> {
    display_with(panel, Config::default())
}

pub fn display_with<P: Panel>(panel: P, config: Config) -> TestDisplay<P> {
    Amoled::new(MockBus::default(), None, panel, config).unwrap()
}
