//! Outbound delivery of decoded readings and command responses.

use serde::Serialize;
use tracing::info;

use crate::frame::protocol::SensorPacket;

/// Something the driver hands to the outside world
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Publication {
    /// Reading from continuous streaming
    Continuous(SensorPacket),
    /// Reply to a single packet-read command
    PacketResponse(SensorPacket),
    /// Reply to any other command, or the failure sentinel
    ByteResponse(i64),
}

/// Fire-and-forget sink for publications
#[cfg_attr(test, mockall::automock)]
pub trait Publisher: Send {
    fn publish(&mut self, publication: Publication);
}

impl<P: Publisher + ?Sized> Publisher for Box<P> {
    fn publish(&mut self, publication: Publication) {
        (**self).publish(publication)
    }
}

/// Collects publications in memory
impl Publisher for Vec<Publication> {
    fn publish(&mut self, publication: Publication) {
        self.push(publication);
    }
}

/// Writes publications to the tracing log
#[derive(Debug, Default)]
pub struct LogPublisher;

impl Publisher for LogPublisher {
    fn publish(&mut self, publication: Publication) {
        match &publication {
            Publication::Continuous(packet) | Publication::PacketResponse(packet) => info!(
                sensor = packet.sensor_num,
                report = %packet.report_id,
                seq = packet.sequence_num,
                accuracy = packet.accuracy.code(),
                delay = packet.delay,
                imu = ?packet.imu,
                "Sensor packet"
            ),
            Publication::ByteResponse(value) => info!(value, "Byte response"),
        }
    }
}
