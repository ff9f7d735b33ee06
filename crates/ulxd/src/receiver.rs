//! The receiver facade.
//!
//! [`Receiver`] exposes one async method per parameter. Each method builds
//! the command, runs one exchange through the [`Client`], checks that the
//! reply answers the command, and decodes the value into a typed result.
//! Device conditions such as "transmitter off" come back as
//! [`Reading`] variants, not errors.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use ulxd_core::error::{IoError, Result};
use ulxd_core::source::ConnectionSource;
use ulxd_core::transport::Transport;
use ulxd_core::types::{BatteryType, GroupChannel, PowerStatus, Reading, TxRfPower};
use ulxd_text_io::client::Client;
use ulxd_text_io::protocol::{Command, ParsedFrame};
use ulxd_text_io::stream::ReportStream;
use ulxd_transport::TcpTransport;

use crate::commands;

/// A handle to one receiver.
///
/// Cheap to clone; clones share the connection source. Built with
/// [`ReceiverBuilder`](crate::ReceiverBuilder).
#[derive(Clone)]
pub struct Receiver {
    client: Client,
    addr: Option<String>,
    command_timeout: Duration,
    connect_timeout: Duration,
    report_capacity: usize,
}

impl Receiver {
    pub(crate) fn new(
        source: Arc<dyn ConnectionSource>,
        addr: Option<String>,
        command_timeout: Duration,
        connect_timeout: Duration,
        report_capacity: usize,
    ) -> Self {
        Receiver {
            client: Client::new(source),
            addr,
            command_timeout,
            connect_timeout,
            report_capacity,
        }
    }

    /// The `host:port` address, if the receiver was built with one.
    pub fn addr(&self) -> Option<&str> {
        self.addr.as_deref()
    }

    /// The request/response client, for parameters without a typed method.
    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn query(&self, command: &Command) -> Result<ParsedFrame> {
        self.client.execute(command, self.command_timeout).await
    }

    /// Run `command` and return the checked value field.
    async fn query_value(&self, command: Command) -> Result<String> {
        let frame = self.query(&command).await?;
        let value = commands::reply_value(&frame, &command)?;
        debug!(
            channel = command.channel(),
            parameter = command.parameter(),
            value,
            "decoded reply"
        );
        Ok(value.to_string())
    }

    /// Battery charge in percent.
    pub async fn battery_charge(&self, channel: u32) -> Result<Reading<u8>> {
        let value = self.query_value(commands::cmd_battery_charge(channel)).await?;
        Ok(commands::parse_battery_charge(&value)?)
    }

    /// Remaining battery run time.
    pub async fn battery_run_time(&self, channel: u32) -> Result<Reading<Duration>> {
        let value = self
            .query_value(commands::cmd_battery_run_time(channel))
            .await?;
        Ok(commands::parse_battery_run_time(&value)?)
    }

    /// Installed battery chemistry.
    pub async fn battery_type(&self, channel: u32) -> Result<BatteryType> {
        let value = self.query_value(commands::cmd_battery_type(channel)).await?;
        Ok(commands::parse_battery_type(&value)?)
    }

    /// Battery bar count.
    pub async fn battery_bars(&self, channel: u32) -> Result<Reading<u8>> {
        let value = self.query_value(commands::cmd_battery_bars(channel)).await?;
        Ok(commands::parse_battery_bars(&value)?)
    }

    /// Battery charge cycle count.
    pub async fn battery_cycles(&self, channel: u32) -> Result<Reading<u32>> {
        let value = self
            .query_value(commands::cmd_battery_cycles(channel))
            .await?;
        Ok(commands::parse_battery_cycles(&value)?)
    }

    /// Frequency group and channel; [`GroupChannel::Unassigned`] when the
    /// tuned frequency matches no preset.
    pub async fn group_channel(&self, channel: u32) -> Result<GroupChannel> {
        let value = self.query_value(commands::cmd_group_channel(channel)).await?;
        Ok(commands::parse_group_channel(&value)?)
    }

    /// Transmitter RF power level.
    pub async fn tx_rf_power(&self, channel: u32) -> Result<TxRfPower> {
        let value = self.query_value(commands::cmd_tx_rf_power(channel)).await?;
        Ok(commands::parse_tx_rf_power(&value)?)
    }

    /// Transmitter model, e.g. `ULXD2`, or `UNKN` when none is linked.
    pub async fn tx_type(&self, channel: u32) -> Result<String> {
        let value = self.query_value(commands::cmd_tx_type(channel)).await?;
        Ok(commands::parse_tx_type(&value)?)
    }

    /// Whether a transmitter is on or the channel is in standby.
    pub async fn power_status(&self, channel: u32) -> Result<PowerStatus> {
        let frame = self.query(&commands::cmd_tx_type(channel)).await?;
        Ok(commands::parse_power_status(&frame, channel)?)
    }

    /// Open a dedicated report connection and start reading reports.
    ///
    /// # Errors
    ///
    /// Fails with [`IoError::NotConnected`] if the receiver was built without
    /// an address, or with the connect error if dialing fails.
    pub async fn start_reporting(&self) -> Result<ReportStream> {
        let addr = self.addr.as_deref().ok_or(IoError::NotConnected)?;
        start_reporting(addr, self.connect_timeout, self.report_capacity).await
    }

    /// Start reading reports from a transport the caller already connected.
    pub fn start_reporting_with(&self, transport: Box<dyn Transport>) -> ReportStream {
        ReportStream::spawn(transport, self.report_capacity)
    }
}

/// Dial `addr` once and start a [`ReportStream`] on the new connection.
///
/// A failed dial returns immediately; no reader task is started.
pub async fn start_reporting(
    addr: &str,
    connect_timeout: Duration,
    capacity: usize,
) -> Result<ReportStream> {
    let transport = TcpTransport::connect_with_timeout(addr, connect_timeout).await?;
    Ok(ReportStream::spawn(Box::new(transport), capacity))
}
