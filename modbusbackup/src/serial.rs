//! Serial line setup shared by the RTU server and client.

use crate::config::SerialConfig;
use tokio_serial::{DataBits, Parity, SerialPortBuilder, SerialStream, StopBits};

/// Translate the serial section of the configuration into a port builder.
///
/// `timeout_ms` is not applied here, tokio-serial ignores read timeouts.
pub fn builder(config: &SerialConfig) -> SerialPortBuilder {
    let parity = match config.parity.to_lowercase().as_str() {
        "even" => Parity::Even,
        "odd" => Parity::Odd,
        _ => Parity::None,
    };

    let stop_bits = match config.stop_bits {
        2 => StopBits::Two,
        _ => StopBits::One,
    };

    let data_bits = match config.data_bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        _ => DataBits::Eight,
    };

    tokio_serial::new(&config.port, config.baud_rate)
        .parity(parity)
        .stop_bits(stop_bits)
        .data_bits(data_bits)
}

/// Open the configured serial port.
pub fn open(config: &SerialConfig) -> tokio_serial::Result<SerialStream> {
    SerialStream::open(&builder(config))
}
