//! # Sensor Driver Module
//!
//! Command/response handling and continuous streaming on top of the frame
//! layer.
//!
//! This module handles:
//! - Sending command bytes and collecting short byte responses
//! - Reading single packets with bounded retries
//! - Continuous streaming under a caller-controlled flag
//! - Publishing readings and responses
//!
//! One driver owns its byte source exclusively. Every wait is bounded: the
//! synchronizer by its scan budget and response polling by the attempt
//! ceiling.

pub mod publish;
pub mod retry;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Buf;
use tracing::{debug, info, trace, warn};

use crate::config::SensorConfig;
use crate::error::{ForceSensorError, Result};
use crate::frame::decoder::decode_packet;
use crate::frame::protocol::{SensorPacket, FRAME_LEN};
use crate::frame::sync::FrameSynchronizer;
use crate::serial::ByteSource;
use publish::{Publication, Publisher};
use retry::{retry, Attempt};

/// Published in place of a byte response when the device never answered
pub const FAILURE_SENTINEL: i64 = -1;

/// Longest byte response, so every value fits a non-negative i64
pub const MAX_RESPONSE_LEN: usize = 4;

/// Shared on/off switch for continuous streaming
///
/// Checked between stream iterations; clearing it never interrupts a frame
/// read already in progress.
#[derive(Debug, Clone, Default)]
pub struct StreamControl(Arc<AtomicBool>);

impl StreamControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Reply to [`SensorDriver::send_command`]
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Fire-and-forget command
    None,
    /// Raw response bytes, most significant first
    Bytes(u32),
    /// Decoded reply to the packet-read command
    Packet(SensorPacket),
}

/// Driver tuning
#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub sensor_num: u8,
    pub max_attempts: usize,
    pub max_scan: usize,
    pub poll_interval: Duration,
    pub packet_command: u8,
    pub start_stream_command: u8,
    pub stop_stream_command: u8,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self::from(&SensorConfig::default())
    }
}

impl From<&SensorConfig> for DriverSettings {
    fn from(config: &SensorConfig) -> Self {
        Self {
            sensor_num: config.sensor_num,
            max_attempts: config.max_attempts,
            max_scan: config.max_scan,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            packet_command: config.packet_command,
            start_stream_command: config.start_stream_command,
            stop_stream_command: config.stop_stream_command,
        }
    }
}

/// Counters from one streaming session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub published: u64,
    /// Frames that failed validation
    pub dropped: u64,
    /// Scans that found no header
    pub sync_timeouts: u64,
}

/// Command/response driver for one sensor
pub struct SensorDriver<S> {
    source: S,
    synchronizer: FrameSynchronizer,
    settings: DriverSettings,
    stream: StreamControl,
}

impl<S> std::fmt::Debug for SensorDriver<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorDriver")
            .field("settings", &self.settings)
            .field("streaming", &self.stream.is_running())
            .finish_non_exhaustive()
    }
}

impl<S: ByteSource> SensorDriver<S> {
    pub fn new(source: S, settings: DriverSettings) -> Self {
        Self {
            source,
            synchronizer: FrameSynchronizer::new(settings.max_scan),
            settings,
            stream: StreamControl::new(),
        }
    }

    /// Handle for starting and stopping streaming from elsewhere
    pub fn stream_control(&self) -> StreamControl {
        self.stream.clone()
    }

    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Write a command byte and purge the input buffer
    async fn issue(&mut self, command: u8) -> Result<()> {
        self.source.write(&[command]).await?;
        self.source.purge().await?;
        Ok(())
    }

    /// Send a command and collect its response
    ///
    /// # Arguments
    ///
    /// * `command` - Command byte
    /// * `expected_len` - Response length in bytes; 0 for no response
    ///
    /// # Returns
    ///
    /// * [`Response::None`] when `expected_len` is 0
    /// * [`Response::Packet`] for the packet-read command
    /// * [`Response::Bytes`] for every other command
    ///
    /// # Errors
    ///
    /// - [`ForceSensorError::AttemptsExhausted`] if no valid packet arrived
    ///   within the attempt ceiling
    /// - [`ForceSensorError::ResponseTimeout`] if the byte count never
    ///   matched `expected_len`
    /// - [`ForceSensorError::UnknownReportId`] if a valid frame carried an
    ///   unknown report (not retried)
    pub async fn send_command(&mut self, command: u8, expected_len: usize) -> Result<Response> {
        let is_packet_read = command == self.settings.packet_command;
        if !is_packet_read && expected_len > MAX_RESPONSE_LEN {
            return Err(ForceSensorError::InvalidResponseLength(expected_len));
        }

        if self.stream.is_running() {
            info!("Suspending streaming to send command 0x{:02X}", command);
            self.set_streaming(false).await?;
        }

        debug!("Sending command 0x{:02X}, expecting {} bytes", command, expected_len);
        self.issue(command).await?;

        if expected_len == 0 {
            return Ok(Response::None);
        }

        if is_packet_read {
            let max_attempts = self.settings.max_attempts;
            let mut read = PacketRead { driver: self, command };
            return retry(max_attempts, &mut read).await.map(Response::Packet);
        }

        self.await_bytes(expected_len).await.map(Response::Bytes)
    }

    /// Send a command and publish the outcome
    ///
    /// A device that never answers publishes [`FAILURE_SENTINEL`] as a byte
    /// response. Other failures are returned to the caller.
    pub async fn dispatch<P>(&mut self, command: u8, expected_len: usize, publisher: &mut P) -> Result<()>
    where
        P: Publisher + ?Sized,
    {
        match self.send_command(command, expected_len).await {
            Ok(Response::None) => {}
            Ok(Response::Bytes(value)) => publisher.publish(Publication::ByteResponse(i64::from(value))),
            Ok(Response::Packet(packet)) => publisher.publish(Publication::PacketResponse(packet)),
            Err(e @ (ForceSensorError::AttemptsExhausted { .. } | ForceSensorError::ResponseTimeout { .. })) => {
                warn!("Command 0x{:02X} failed: {}", command, e);
                publisher.publish(Publication::ByteResponse(FAILURE_SENTINEL));
            }
            Err(e) => return Err(e),
        }

        Ok(())
    }

    /// Synchronize, read one frame body and decode it
    pub async fn read_frame(&mut self) -> Result<SensorPacket> {
        let header = self.synchronizer.synchronize(&mut self.source).await?;
        let body = self.source.read(FRAME_LEN).await?;

        let packet = decode_packet(&body, self.settings.sensor_num)?;
        trace!(
            "Frame seq {} decoded: {} #{}",
            header.sequence_counter,
            packet.report_id,
            packet.sequence_num
        );
        Ok(packet)
    }

    /// Poll until exactly `expected_len` bytes are queued, then read them
    async fn await_bytes(&mut self, expected_len: usize) -> Result<u32> {
        let mut available = 0;

        for _ in 0..self.settings.max_attempts {
            available = self.source.available().await?;

            if available == expected_len {
                let mut data = self.source.read(expected_len).await?;
                if data.len() == expected_len {
                    return Ok(data.get_uint(expected_len) as u32);
                }
                available = data.len();
            }

            tokio::time::sleep(self.settings.poll_interval).await;
        }

        Err(ForceSensorError::ResponseTimeout {
            expected: expected_len,
            available,
        })
    }

    /// Turn continuous streaming on or off
    ///
    /// Sets the stream flag and sends the matching start/stop command.
    pub async fn set_streaming(&mut self, enabled: bool) -> Result<()> {
        let command = if enabled {
            self.stream.start();
            self.settings.start_stream_command
        } else {
            self.stream.stop();
            self.settings.stop_stream_command
        };

        info!("Streaming {}", if enabled { "started" } else { "stopped" });
        self.issue(command).await
    }

    /// Forward readings to `publisher` while the stream flag is set
    ///
    /// Frames failing validation are dropped and the next scan resumes from
    /// the following byte. Only I/O errors end the loop early.
    pub async fn stream<P>(&mut self, publisher: &mut P) -> Result<StreamStats>
    where
        P: Publisher + ?Sized,
    {
        let mut stats = StreamStats::default();

        while self.stream.is_running() {
            match self.read_frame().await {
                Ok(packet) => {
                    publisher.publish(Publication::Continuous(packet));
                    stats.published += 1;
                }
                Err(ForceSensorError::SynchronizationTimeout { .. }) => {
                    stats.sync_timeouts += 1;
                }
                Err(e @ ForceSensorError::Io(_)) => return Err(e),
                Err(e) => {
                    trace!("Dropped frame: {}", e);
                    stats.dropped += 1;
                }
            }

            tokio::task::yield_now().await;
        }

        debug!(
            "Stream ended: {} published, {} dropped, {} sync timeouts",
            stats.published, stats.dropped, stats.sync_timeouts
        );
        Ok(stats)
    }

    /// Purge until the device stops reporting pending input
    ///
    /// # Errors
    ///
    /// Returns [`ForceSensorError::AttemptsExhausted`] if bytes keep arriving,
    /// which means something is actively sending.
    pub async fn reset(&mut self) -> Result<()> {
        let max_attempts = self.settings.max_attempts;

        for _ in 0..max_attempts {
            if self.source.available().await? == 0 {
                return Ok(());
            }
            self.source.purge().await?;
        }

        warn!("Failed to reset. Ensure nothing is actively sending data");
        Err(ForceSensorError::AttemptsExhausted {
            attempts: max_attempts,
        })
    }
}

/// One packet-read attempt; later attempts re-issue the command first
struct PacketRead<'a, S> {
    driver: &'a mut SensorDriver<S>,
    command: u8,
}

#[async_trait]
impl<S: ByteSource> Attempt for PacketRead<'_, S> {
    type Output = SensorPacket;

    async fn attempt(&mut self, number: usize) -> Result<SensorPacket> {
        if number > 1 {
            self.driver.issue(self.command).await?;
        }
        self.driver.read_frame().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encoder::{encode_frame, encode_header, seal_payload};
    use crate::frame::protocol::*;
    use crate::serial::port_trait::mocks::MockSensor;
    use publish::MockPublisher;

    fn settings() -> DriverSettings {
        DriverSettings {
            poll_interval: Duration::ZERO,
            ..DriverSettings::default()
        }
    }

    fn packet(sequence_num: u8) -> SensorPacket {
        SensorPacket {
            differential: [1, 2, 3, 4, 5, 6],
            sum: [-1, -2, -3, -4, -5, -6],
            report_id: ReportId::Gyroscope,
            sequence_num,
            accuracy: Accuracy::Medium,
            delay: 0.01,
            imu: [1, 2, 3],
            checksum: 0,
            sensor_num: 0,
        }
    }

    fn corrupted_frame(sequence_num: u8) -> Vec<u8> {
        let mut frame = encode_frame(sequence_num, &packet(sequence_num));
        let last = frame.len() - 1;
        frame[last] ^= 0x01;
        frame
    }

    /// Stops the stream after `limit` publications
    struct StopAfter {
        control: StreamControl,
        limit: usize,
        seen: Vec<Publication>,
    }

    impl Publisher for StopAfter {
        fn publish(&mut self, publication: Publication) {
            self.seen.push(publication);
            if self.seen.len() >= self.limit {
                self.control.stop();
            }
        }
    }

    #[tokio::test]
    async fn test_fire_and_forget_command() {
        let mock = MockSensor::new();
        let mut driver = SensorDriver::new(mock.clone(), settings());

        let response = driver.send_command(0x10, 0).await.unwrap();

        assert_eq!(response, Response::None);
        assert_eq!(mock.get_written_data(), vec![vec![0x10]]);
        assert_eq!(mock.purge_count(), 1);
    }

    #[tokio::test]
    async fn test_packet_read_success() {
        let mock = MockSensor::new();
        mock.respond_to(0x12, &encode_frame(4, &packet(9)));
        let mut driver = SensorDriver::new(mock.clone(), settings());

        let response = driver.send_command(0x12, FRAME_LEN).await.unwrap();

        match response {
            Response::Packet(p) => {
                assert_eq!(p.sequence_num, 9);
                assert_eq!(p.report_id, ReportId::Gyroscope);
                assert_eq!(p.imu, [1, 2, 3]);
            }
            other => panic!("Expected packet response, got: {:?}", other),
        }
        assert_eq!(mock.writes_of(0x12), 1);
    }

    #[tokio::test]
    async fn test_packet_read_recovers_from_corruption() {
        let mock = MockSensor::new();
        mock.respond_to(0x12, &corrupted_frame(1));
        mock.respond_to(0x12, &corrupted_frame(2));
        mock.respond_to(0x12, &encode_frame(3, &packet(3)));
        let mut driver = SensorDriver::new(mock.clone(), settings());

        let response = driver.send_command(0x12, FRAME_LEN).await.unwrap();

        assert!(matches!(response, Response::Packet(ref p) if p.sequence_num == 3));
        assert_eq!(mock.writes_of(0x12), 3);
    }

    #[tokio::test]
    async fn test_packet_read_gives_up_at_ceiling() {
        let mock = MockSensor::new();
        mock.respond_to(0x12, &corrupted_frame(0));
        let mut driver = SensorDriver::new(mock.clone(), settings());

        let result = driver.send_command(0x12, FRAME_LEN).await;

        assert!(matches!(
            result,
            Err(ForceSensorError::AttemptsExhausted { attempts: 100 })
        ));
        assert_eq!(mock.writes_of(0x12), 100);
    }

    #[tokio::test]
    async fn test_packet_read_silent_device() {
        let mock = MockSensor::new();
        let mut driver = SensorDriver::new(
            mock.clone(),
            DriverSettings {
                max_attempts: 5,
                max_scan: 10,
                ..settings()
            },
        );

        let result = driver.send_command(0x12, FRAME_LEN).await;

        assert!(matches!(result, Err(ForceSensorError::AttemptsExhausted { attempts: 5 })));
        assert_eq!(mock.writes_of(0x12), 5);
        assert_eq!(mock.read_count(), 50);
    }

    #[tokio::test]
    async fn test_unknown_report_not_retried() {
        let mut payload = [0u8; PAYLOAD_LEN];
        payload[REPORT_ID_OFFSET] = 0x03;
        let mut frame = encode_header(0).to_vec();
        frame.extend_from_slice(&seal_payload(&payload));

        let mock = MockSensor::new();
        mock.respond_to(0x12, &frame);
        let mut driver = SensorDriver::new(mock.clone(), settings());

        let result = driver.send_command(0x12, FRAME_LEN).await;

        assert!(matches!(result, Err(ForceSensorError::UnknownReportId(0x03))));
        assert_eq!(mock.writes_of(0x12), 1);
    }

    #[tokio::test]
    async fn test_byte_response_msb_first() {
        let mock = MockSensor::new();
        mock.respond_to(0x05, &[0x01, 0x02]);
        let mut driver = SensorDriver::new(mock.clone(), settings());

        let response = driver.send_command(0x05, 2).await.unwrap();

        assert_eq!(response, Response::Bytes(0x0102));
        assert_eq!(mock.remaining(), 0);
    }

    #[tokio::test]
    async fn test_byte_response_timeout() {
        let mock = MockSensor::new();
        let mut driver = SensorDriver::new(mock, DriverSettings { max_attempts: 10, ..settings() });

        let result = driver.send_command(0x05, 1).await;

        assert!(matches!(
            result,
            Err(ForceSensorError::ResponseTimeout { expected: 1, available: 0 })
        ));
    }

    #[tokio::test]
    async fn test_byte_response_wrong_length() {
        let mock = MockSensor::new();
        mock.respond_to(0x05, &[0x01, 0x02, 0x03]);
        let mut driver = SensorDriver::new(mock, DriverSettings { max_attempts: 10, ..settings() });

        let result = driver.send_command(0x05, 2).await;

        assert!(matches!(
            result,
            Err(ForceSensorError::ResponseTimeout { expected: 2, available: 3 })
        ));
    }

    #[tokio::test]
    async fn test_response_length_limit() {
        let mock = MockSensor::new();
        let mut driver = SensorDriver::new(mock.clone(), settings());

        let result = driver.send_command(0x05, 5).await;

        assert!(matches!(result, Err(ForceSensorError::InvalidResponseLength(5))));
        assert!(mock.get_written_data().is_empty());
    }

    #[tokio::test]
    async fn test_configurable_packet_command() {
        let mock = MockSensor::new();
        mock.respond_to(12, &encode_frame(0, &packet(1)));
        let mut driver = SensorDriver::new(mock, DriverSettings { packet_command: 12, ..settings() });

        let response = driver.send_command(12, FRAME_LEN).await.unwrap();
        assert!(matches!(response, Response::Packet(_)));
    }

    #[tokio::test]
    async fn test_dispatch_publishes_sentinel() {
        let mock = MockSensor::new();
        let mut driver = SensorDriver::new(mock, DriverSettings { max_attempts: 3, ..settings() });

        let mut publisher = MockPublisher::new();
        publisher
            .expect_publish()
            .withf(|p| *p == Publication::ByteResponse(FAILURE_SENTINEL))
            .times(1)
            .return_const(());

        driver.dispatch(0x05, 1, &mut publisher).await.unwrap();
    }

    #[tokio::test]
    async fn test_dispatch_publishes_packet_and_bytes() {
        let mock = MockSensor::new();
        mock.respond_to(0x12, &encode_frame(0, &packet(5)));
        mock.respond_to(0x07, &[0xAB]);
        let mut driver = SensorDriver::new(mock, settings());

        let mut published: Vec<Publication> = Vec::new();
        driver.dispatch(0x12, FRAME_LEN, &mut published).await.unwrap();
        driver.dispatch(0x07, 1, &mut published).await.unwrap();
        driver.dispatch(0x10, 0, &mut published).await.unwrap();

        assert_eq!(published.len(), 2);
        assert!(matches!(&published[0], Publication::PacketResponse(p) if p.sequence_num == 5));
        assert_eq!(published[1], Publication::ByteResponse(0xAB));
    }

    #[tokio::test]
    async fn test_dispatch_surfaces_unknown_report() {
        let mut payload = [0u8; PAYLOAD_LEN];
        payload[REPORT_ID_OFFSET] = 0x7F;
        let mut frame = encode_header(0).to_vec();
        frame.extend_from_slice(&seal_payload(&payload));

        let mock = MockSensor::new();
        mock.respond_to(0x12, &frame);
        let mut driver = SensorDriver::new(mock, settings());

        let mut publisher = MockPublisher::new();
        publisher.expect_publish().never();

        let result = driver.dispatch(0x12, FRAME_LEN, &mut publisher).await;
        assert!(matches!(result, Err(ForceSensorError::UnknownReportId(0x7F))));
    }

    #[tokio::test]
    async fn test_stream_drops_corrupted_frames() {
        let mut stream = encode_frame(0, &packet(0));
        stream.extend_from_slice(&[0x00, 0x13]);
        stream.extend_from_slice(&corrupted_frame(1));
        stream.extend_from_slice(&encode_frame(2, &packet(2)));

        let mock = MockSensor::new();
        // The start command's purge must not eat the stream
        mock.respond_to(0x10, &stream);
        let mut driver = SensorDriver::new(mock.clone(), settings());

        driver.set_streaming(true).await.unwrap();
        let mut publisher = StopAfter {
            control: driver.stream_control(),
            limit: 2,
            seen: Vec::new(),
        };

        let stats = driver.stream(&mut publisher).await.unwrap();

        assert_eq!(stats.published, 2);
        assert_eq!(stats.dropped, 1);
        let sequences: Vec<u8> = publisher
            .seen
            .iter()
            .map(|p| match p {
                Publication::Continuous(packet) => packet.sequence_num,
                other => panic!("Expected continuous publication, got: {:?}", other),
            })
            .collect();
        assert_eq!(sequences, vec![0, 2]);
        assert_eq!(mock.remaining(), 0);
    }

    #[tokio::test]
    async fn test_stream_not_running_returns_immediately() {
        let mock = MockSensor::with_rx(&encode_frame(0, &packet(0)));
        let mut driver = SensorDriver::new(mock.clone(), settings());

        let mut published: Vec<Publication> = Vec::new();
        let stats = driver.stream(&mut published).await.unwrap();

        assert_eq!(stats, StreamStats::default());
        assert!(published.is_empty());
        assert_eq!(mock.read_count(), 0);
    }

    #[tokio::test]
    async fn test_stream_silent_source_stops_from_other_task() {
        let mock = MockSensor::new();
        let mut driver = SensorDriver::new(mock.clone(), DriverSettings { max_scan: 5, ..settings() });
        let control = driver.stream_control();
        control.start();

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            control.stop();
        });

        let mut published: Vec<Publication> = Vec::new();
        let stats = driver.stream(&mut published).await.unwrap();
        stopper.await.unwrap();

        assert!(stats.sync_timeouts > 0);
        assert_eq!(stats.published, 0);
        assert_eq!(stats.dropped, 0);
        assert_eq!(mock.read_count() as u64, stats.sync_timeouts * 5);
        assert!(published.is_empty());
    }

    #[tokio::test]
    async fn test_stream_stops_on_io_error() {
        let mock = MockSensor::new();
        mock.set_read_error(std::io::ErrorKind::BrokenPipe);
        let mut driver = SensorDriver::new(mock, settings());
        driver.stream_control().start();

        let mut published: Vec<Publication> = Vec::new();
        let result = driver.stream(&mut published).await;

        assert!(matches!(result, Err(ForceSensorError::Io(_))));
    }

    #[tokio::test]
    async fn test_command_suspends_streaming() {
        let mock = MockSensor::new();
        let mut driver = SensorDriver::new(mock.clone(), settings());
        driver.set_streaming(true).await.unwrap();

        driver.send_command(0x20, 0).await.unwrap();

        assert!(!driver.stream_control().is_running());
        assert_eq!(
            mock.get_written_data(),
            vec![vec![0x10], vec![0x11], vec![0x20]]
        );
    }

    #[tokio::test]
    async fn test_reset_purges_pending_input() {
        let mock = MockSensor::with_rx(&[0x01, 0x02, 0x03]);
        let mut driver = SensorDriver::new(mock.clone(), settings());

        driver.reset().await.unwrap();

        assert_eq!(mock.purge_count(), 1);
        assert_eq!(mock.remaining(), 0);
    }

    #[tokio::test]
    async fn test_reset_idle_device() {
        let mock = MockSensor::new();
        let mut driver = SensorDriver::new(mock.clone(), settings());

        tokio_test::assert_ok!(driver.reset().await);
        assert_eq!(mock.purge_count(), 0);
    }

    #[test]
    fn test_stream_control_shared() {
        let control = StreamControl::new();
        let handle = control.clone();

        assert!(!control.is_running());
        handle.start();
        assert!(control.is_running());
        control.stop();
        assert!(!handle.is_running());
    }

    #[test]
    fn test_settings_from_config() {
        let config = SensorConfig {
            sensor_num: 2,
            poll_interval_ms: 5,
            ..SensorConfig::default()
        };
        let settings = DriverSettings::from(&config);

        assert_eq!(settings.sensor_num, 2);
        assert_eq!(settings.max_attempts, 100);
        assert_eq!(settings.poll_interval, Duration::from_millis(5));
        assert_eq!(settings.packet_command, 0x12);
    }
}
