//! Serial link to the console through the Pi's PL011/mini UART (rppal).

use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use rppal::uart::{Parity, Uart};

use car_traits::Transport;

use crate::error::{HwError, Result};
use crate::util::LineAssembler;

fn uart_err(e: rppal::uart::Error) -> HwError {
    HwError::Uart(e.to_string())
}

pub struct UartTransport {
    uart: Uart,
    assembler: LineAssembler,
    ready: VecDeque<String>,
}

impl UartTransport {
    /// Open `device` as 8N1 at `baud_rate`.
    pub fn open(device: &Path, baud_rate: u32) -> Result<Self> {
        let mut uart = Uart::with_path(device, baud_rate, Parity::None, 8, 1).map_err(uart_err)?;
        // Block until at least one byte arrives; no inter-byte timeout
        uart.set_read_mode(1, Duration::ZERO).map_err(uart_err)?;
        uart.set_write_mode(true).map_err(uart_err)?;
        tracing::info!(device = %device.display(), baud_rate, "uart open");
        Ok(Self {
            uart,
            assembler: LineAssembler::new(),
            ready: VecDeque::new(),
        })
    }
}

impl Transport for UartTransport {
    fn read_line(&mut self) -> std::result::Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
        let mut buf = [0u8; 256];
        while self.ready.is_empty() {
            let n = self.uart.read(&mut buf).map_err(uart_err)?;
            if n == 0 {
                return Ok(self.assembler.finish());
            }
            self.ready.extend(self.assembler.push(&buf[..n]));
        }
        Ok(self.ready.pop_front())
    }

    fn write_line(&mut self, line: &str) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        let mut sent = 0;
        while sent < bytes.len() {
            let n = self.uart.write(&bytes[sent..]).map_err(uart_err)?;
            if n == 0 {
                return Err(Box::new(HwError::Uart("write accepted no bytes".into())));
            }
            sent += n;
        }
        self.uart.drain().map_err(uart_err)?;
        Ok(())
    }
}
