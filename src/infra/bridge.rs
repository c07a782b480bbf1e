use std::future::Future;
use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::types::SCALE_FACTOR;
use crate::scenario::AgentId;
use crate::state::{OvertakingMode, ShipState};

/// Number of comma separated fields in a dynamics response.
pub const RESPONSE_FIELDS: usize = 7;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("dynamics bridge port for agent {agent} overflows base port {base_port}")]
    InvalidPort { agent: AgentId, base_port: u16 },
    #[error("failed to connect to dynamics bridge at {addr}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("dynamics bridge i/o failure")]
    Io(#[from] io::Error),
    #[error("dynamics bridge closed the connection")]
    Closed,
    #[error("no response from dynamics bridge within {0:?}")]
    Timeout(Duration),
    #[error("expected 7 fields in dynamics response, got {count}: {line:?}")]
    FieldCount { count: usize, line: String },
    #[error("invalid field {index} in dynamics response: {value:?}")]
    InvalidField { index: usize, value: String },
    #[error("dynamics bridge lost sync after an earlier failure")]
    Desynchronized,
}

/// Control input sent to the dynamics model every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlCommand {
    pub rudder: f64,
    pub overtaking_mode: OvertakingMode,
}

impl ControlCommand {
    pub fn new(rudder: f64) -> Self {
        Self {
            rudder,
            overtaking_mode: OvertakingMode::None,
        }
    }

    pub fn to_line(&self) -> String {
        format!("{}&{}\n", self.rudder, self.overtaking_mode.wire_value())
    }
}

/// One parsed dynamics response. `u`, `v`, `x` and `y` are already divided by
/// the scale factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicsResponse {
    pub u: f64,
    pub v: f64,
    pub r: f64,
    pub x: f64,
    pub y: f64,
    pub heading: f64,
    pub rudder: f64,
}

pub fn parse_response(line: &str) -> Result<DynamicsResponse, ProtocolError> {
    let trimmed = line.trim();
    let parts: Vec<&str> = trimmed.split(',').collect();
    if parts.len() != RESPONSE_FIELDS {
        return Err(ProtocolError::FieldCount {
            count: parts.len(),
            line: trimmed.to_string(),
        });
    }

    let mut fields = [0.0f64; RESPONSE_FIELDS];
    for (index, (slot, raw)) in fields.iter_mut().zip(&parts).enumerate() {
        *slot = raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| ProtocolError::InvalidField {
                index,
                value: raw.to_string(),
            })?;
    }

    let [u, v, r, x, y, heading, rudder] = fields;
    Ok(DynamicsResponse {
        u: u / SCALE_FACTOR,
        v: v / SCALE_FACTOR,
        r,
        x: x / SCALE_FACTOR,
        y: y / SCALE_FACTOR,
        heading,
        rudder,
    })
}

/// External ship dynamics integrator.
pub trait DynamicsBridge: Send {
    /// Sent once at the start of every episode.
    fn initialize(
        &mut self,
        base_speed: f64,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Applies one control command and returns the resulting state.
    fn advance(
        &mut self,
        state: &ShipState,
        command: ControlCommand,
    ) -> impl Future<Output = Result<ShipState, ProtocolError>> + Send;
}

/// Line-oriented TCP connection to the dynamics process of one agent.
///
/// Any failed exchange leaves the stream in an unknown position (a late reply
/// may still arrive), so the bridge is marked desynchronized. `advance`
/// refuses to run on it and the next `initialize` reconnects first.
pub struct TcpDynamicsBridge {
    agent: AgentId,
    addr: String,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    response_timeout: Duration,
    line: String,
    desynchronized: bool,
}

async fn open(
    addr: &str,
    response_timeout: Duration,
) -> Result<(BufReader<OwnedReadHalf>, OwnedWriteHalf), ProtocolError> {
    let stream = timeout(response_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| ProtocolError::Timeout(response_timeout))?
        .map_err(|source| ProtocolError::Connect {
            addr: addr.to_string(),
            source,
        })?;
    stream.set_nodelay(true)?;
    let (read_half, writer) = stream.into_split();
    Ok((BufReader::new(read_half), writer))
}

impl TcpDynamicsBridge {
    /// Connects to `host:(base_port + agent)`. Connecting and every response
    /// read are bounded by `response_timeout`.
    pub async fn connect(
        host: &str,
        base_port: u16,
        agent: AgentId,
        response_timeout: Duration,
    ) -> Result<Self, ProtocolError> {
        let port = u16::try_from(agent)
            .ok()
            .and_then(|offset| base_port.checked_add(offset))
            .ok_or(ProtocolError::InvalidPort { agent, base_port })?;
        let addr = format!("{}:{}", host, port);

        let (reader, writer) = open(&addr, response_timeout).await?;
        info!(agent, %addr, "connected to dynamics bridge");

        Ok(Self {
            agent,
            addr,
            reader,
            writer,
            response_timeout,
            line: String::new(),
            desynchronized: false,
        })
    }

    pub fn is_desynchronized(&self) -> bool {
        self.desynchronized
    }

    /// Replaces the connection with a fresh one, dropping anything still
    /// buffered or in flight on the old stream.
    async fn reconnect(&mut self) -> Result<(), ProtocolError> {
        warn!(agent = self.agent, addr = %self.addr, "reconnecting desynchronized dynamics bridge");
        let (reader, writer) = open(&self.addr, self.response_timeout).await?;
        self.reader = reader;
        self.writer = writer;
        self.line.clear();
        self.desynchronized = false;
        Ok(())
    }

    async fn send_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<&str, ProtocolError> {
        self.line.clear();
        let read = timeout(self.response_timeout, self.reader.read_line(&mut self.line))
            .await
            .map_err(|_| ProtocolError::Timeout(self.response_timeout))??;
        if read == 0 {
            return Err(ProtocolError::Closed);
        }
        Ok(&self.line)
    }

    async fn exchange(&mut self, command: ControlCommand) -> Result<DynamicsResponse, ProtocolError> {
        self.send_line(&command.to_line()).await?;
        parse_response(self.read_line().await?)
    }
}

impl DynamicsBridge for TcpDynamicsBridge {
    async fn initialize(&mut self, base_speed: f64) -> Result<(), ProtocolError> {
        if self.desynchronized {
            self.reconnect().await?;
        }
        debug!(agent = self.agent, base_speed, "initialising dynamics");
        let result = self.send_line(&format!("{:.1}\n", base_speed)).await;
        self.desynchronized = result.is_err();
        result
    }

    async fn advance(
        &mut self,
        state: &ShipState,
        command: ControlCommand,
    ) -> Result<ShipState, ProtocolError> {
        if self.desynchronized {
            return Err(ProtocolError::Desynchronized);
        }
        match self.exchange(command).await {
            Ok(response) => Ok(state.advanced(&response)),
            Err(err) => {
                self.desynchronized = true;
                Err(err)
            }
        }
    }
}
