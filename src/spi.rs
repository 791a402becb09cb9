use embedded_hal::spi::{Mode, Operation, Phase, Polarity, SpiDevice};

use crate::{Command, Interface};

/// SPI mode
pub const MODE: Mode = Mode {
    polarity: Polarity::IdleLow,
    phase: Phase::CaptureOnFirstTransition,
};

/// Largest pixel payload sent in one transaction
pub const CHUNK_SIZE: usize = 32 * 1023;

/// Single line register write opcode
const WRITE_OPCODE: u8 = 0x02;
/// Quad line pixel write opcode
const QUAD_WRITE_OPCODE: u8 = 0x32;

/// `Interface` implementation for the QSPI panel framing.
///
/// Every transfer is `[opcode, 0x00, command, 0x00]` followed by its payload
/// in one chip-select window. Chip select is handled by the `SpiDevice`.
pub struct SpiInterface<SPI> {
    spi: SPI,
    pixel_opcode: u8,
}

impl<SPI: SpiDevice> SpiInterface<SPI> {
    /// Pixels sent over a single data line
    pub fn new(spi: SPI) -> Self {
        Self {
            spi,
            pixel_opcode: WRITE_OPCODE,
        }
    }

    /// Pixels sent over four data lines. The `SpiDevice` must be set up
    /// for quad output on the data phase.
    pub fn new_quad(spi: SPI) -> Self {
        Self {
            spi,
            pixel_opcode: QUAD_WRITE_OPCODE,
        }
    }

    pub fn release(self) -> SPI {
        self.spi
    }

    fn send(&mut self, opcode: u8, command: u8, data: &[u8]) -> Result<(), SPI::Error> {
        let header = [opcode, 0x00, command, 0x00];
        if data.is_empty() {
            self.spi.write(&header)
        } else {
            self.spi
                .transaction(&mut [Operation::Write(&header), Operation::Write(data)])
        }
    }
}

impl<SPI: SpiDevice> Interface for SpiInterface<SPI> {
    type Error = SPI::Error;

    fn write(&mut self, command: u8, params: &[u8]) -> Result<(), Self::Error> {
        self.send(WRITE_OPCODE, command, params)
    }

    /// The first chunk starts a memory write, later chunks continue it.
    fn write_pixels(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        let opcode = self.pixel_opcode;
        let mut command = Command::MemoryWrite as u8;
        for chunk in data.chunks(CHUNK_SIZE) {
            self.send(opcode, command, chunk)?;
            command = Command::MemoryWriteContinue as u8;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::spi::ErrorType;

    /// Records the bytes written in each transaction
    #[derive(Default)]
    struct RecordingSpi {
        transactions: Vec<Vec<u8>>,
    }

    impl ErrorType for RecordingSpi {
        type Error = Infallible;
    }

    impl SpiDevice for RecordingSpi {
        fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
            let mut bytes = Vec::new();
            for op in operations.iter() {
                if let Operation::Write(data) = op {
                    bytes.extend_from_slice(data);
                }
            }
            self.transactions.push(bytes);
            Ok(())
        }
    }

    #[test]
    fn register_write_framing() {
        let mut bus = SpiInterface::new(RecordingSpi::default());
        bus.write(0x36, &[0x60]).unwrap();
        bus.write(0x11, &[]).unwrap();
        let spi = bus.release();
        assert_eq!(
            spi.transactions,
            [vec![0x02, 0x00, 0x36, 0x00, 0x60], vec![0x02, 0x00, 0x11, 0x00]]
        );
    }

    #[test]
    fn quad_pixels_are_chunked() {
        let mut bus = SpiInterface::new_quad(RecordingSpi::default());
        let data = vec![0xA5; CHUNK_SIZE + 10];
        bus.write_pixels(&data).unwrap();
        let spi = bus.release();

        assert_eq!(spi.transactions.len(), 2);
        assert_eq!(&spi.transactions[0][..4], [0x32, 0x00, 0x2C, 0x00]);
        assert_eq!(spi.transactions[0].len(), 4 + CHUNK_SIZE);
        assert_eq!(&spi.transactions[1][..4], [0x32, 0x00, 0x3C, 0x00]);
        assert_eq!(spi.transactions[1].len(), 4 + 10);
    }

    #[test]
    fn single_line_pixels_use_write_opcode() {
        let mut bus = SpiInterface::new(RecordingSpi::default());
        bus.write_pixels(&[1, 2, 3, 4]).unwrap();
        let spi = bus.release();
        assert_eq!(spi.transactions, [vec![0x02, 0x00, 0x2C, 0x00, 1, 2, 3, 4]]);
    }
}
