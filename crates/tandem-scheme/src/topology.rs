//! Two-participant topology: who is first, and what flows in which direction.

use tandem_data::{DataArena, DataIndex, DatumKind, ExchangeDatum};
use tandem_transfer::{StreamId, Transport};
use tracing::debug;

use crate::config::ParticipantPair;
use crate::error::{Error, Result};
use crate::scheme::SchemeCore;

/// Position of the local participant in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Computes each window first and never decides convergence.
    First,
    /// Computes second, decides convergence and accelerates.
    Second,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::First => write!(f, "first"),
            Role::Second => write!(f, "second"),
        }
    }
}

/// Direction a datum is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    Send,
    Receive,
    GlobalSend,
    GlobalReceive,
}

impl Exchange {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Exchange::Send => "sending",
            Exchange::Receive => "receiving",
            Exchange::GlobalSend => "sending global data",
            Exchange::GlobalReceive => "receiving global data",
        }
    }

    pub(crate) fn is_global(self) -> bool {
        matches!(self, Exchange::GlobalSend | Exchange::GlobalReceive)
    }
}

/// Send and receive registries of one participant pair.
#[derive(Debug)]
pub struct BiTopology {
    participants: ParticipantPair,
    role: Role,
    send: Vec<DataIndex>,
    receive: Vec<DataIndex>,
    global_send: Vec<DataIndex>,
    global_receive: Vec<DataIndex>,
    sends_initialized_data: bool,
    receives_initialized_data: bool,
}

impl BiTopology {
    /// Derive the local role from the participant names.
    pub fn new(participants: ParticipantPair, local: &str) -> Result<Self> {
        if participants.first == participants.second {
            return Err(Error::SameParticipants(participants.first));
        }
        let role = if local == participants.first {
            Role::First
        } else if local == participants.second {
            Role::Second
        } else {
            return Err(Error::UnknownParticipant {
                local: local.to_string(),
                first: participants.first,
                second: participants.second,
            });
        };
        Ok(Self {
            participants,
            role,
            send: Vec::new(),
            receive: Vec::new(),
            global_send: Vec::new(),
            global_receive: Vec::new(),
            sends_initialized_data: false,
            receives_initialized_data: false,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn does_first_step(&self) -> bool {
        self.role == Role::First
    }

    /// Name of the remote participant.
    pub fn coupling_partners(&self) -> Vec<String> {
        match self.role {
            Role::First => vec![self.participants.second.clone()],
            Role::Second => vec![self.participants.first.clone()],
        }
    }

    fn registry(&self, exchange: Exchange) -> &Vec<DataIndex> {
        match exchange {
            Exchange::Send => &self.send,
            Exchange::Receive => &self.receive,
            Exchange::GlobalSend => &self.global_send,
            Exchange::GlobalReceive => &self.global_receive,
        }
    }

    fn registry_mut(&mut self, exchange: Exchange) -> &mut Vec<DataIndex> {
        match exchange {
            Exchange::Send => &mut self.send,
            Exchange::Receive => &mut self.receive,
            Exchange::GlobalSend => &mut self.global_send,
            Exchange::GlobalReceive => &mut self.global_receive,
        }
    }

    /// Register `index` for `exchange`. Each datum once per direction.
    pub fn add(&mut self, exchange: Exchange, index: DataIndex, name: &str) -> Result<()> {
        let registry = self.registry_mut(exchange);
        if registry.contains(&index) {
            return Err(Error::DuplicateExchange {
                data: name.to_string(),
                direction: exchange.label(),
            });
        }
        registry.push(index);
        debug!(data = name, direction = exchange.label(), "Added exchange data");
        Ok(())
    }

    /// Indices registered for `exchange`, in registration order.
    pub fn members(&self, exchange: Exchange) -> &[DataIndex] {
        self.registry(exchange)
    }

    /// Whether any direction contains data that is written before the first
    /// exchange. Returns `true` if this participant sends initialized data.
    pub fn determine_initial_data_exchange(&mut self, arena: &DataArena) -> bool {
        let requires = |members: &[DataIndex]| {
            members
                .iter()
                .any(|index| arena[*index].requires_initialization)
        };
        self.sends_initialized_data = requires(&self.send) || requires(&self.global_send);
        self.receives_initialized_data =
            requires(&self.receive) || requires(&self.global_receive);
        self.sends_initialized_data
    }

    pub fn sends_initialized_data(&self) -> bool {
        self.sends_initialized_data
    }

    pub fn receives_initialized_data(&self) -> bool {
        self.receives_initialized_data
    }

    pub(crate) fn send_data(&self, core: &mut SchemeCore) -> Result<()> {
        send_all(&self.send, &core.arena, core.transport.as_mut())?;
        debug!(count = self.send.len(), "Sent data");
        Ok(())
    }

    pub(crate) fn send_global_data(&self, core: &mut SchemeCore) -> Result<()> {
        send_all(&self.global_send, &core.arena, core.transport.as_mut())?;
        debug!(count = self.global_send.len(), "Sent global data");
        Ok(())
    }

    pub(crate) fn receive_data(&self, core: &mut SchemeCore) -> Result<()> {
        receive_all(&self.receive, &mut core.arena, core.transport.as_mut())?;
        debug!(count = self.receive.len(), "Received data");
        Ok(())
    }

    pub(crate) fn receive_global_data(&self, core: &mut SchemeCore) -> Result<()> {
        receive_all(&self.global_receive, &mut core.arena, core.transport.as_mut())?;
        debug!(count = self.global_receive.len(), "Received global data");
        Ok(())
    }

    /// Exchange initialized data before the first window.
    ///
    /// The first participant sends before it receives, the second receives
    /// before it sends.
    pub(crate) fn exchange_initial_data(&self, core: &mut SchemeCore) -> Result<()> {
        match self.role {
            Role::First => {
                if self.sends_initialized_data {
                    self.send_data(core)?;
                    self.send_global_data(core)?;
                }
                if self.receives_initialized_data {
                    self.receive_data(core)?;
                    self.receive_global_data(core)?;
                    core.mark_data_received()?;
                }
            }
            Role::Second => {
                if self.receives_initialized_data {
                    self.receive_data(core)?;
                    self.receive_global_data(core)?;
                    core.mark_data_received()?;
                }
                if self.sends_initialized_data {
                    self.send_data(core)?;
                    self.send_global_data(core)?;
                }
            }
        }
        Ok(())
    }
}

fn stream_of(datum: &ExchangeDatum) -> StreamId {
    match datum.kind() {
        DatumKind::Mesh(mesh) => StreamId(mesh.0),
        DatumKind::Global => StreamId::GLOBAL,
    }
}

fn send_all(members: &[DataIndex], arena: &DataArena, transport: &mut dyn Transport) -> Result<()> {
    for index in members {
        let datum = &arena[*index];
        let stream = stream_of(datum);
        transport.send_values(datum.values(), stream, datum.dimensions())?;
        if datum.has_gradient() {
            transport.send_values(datum.gradient_values()?, stream, datum.gradient_dimensions())?;
        }
    }
    Ok(())
}

fn receive_all(
    members: &[DataIndex],
    arena: &mut DataArena,
    transport: &mut dyn Transport,
) -> Result<()> {
    for index in members {
        let datum = &mut arena[*index];
        let stream = stream_of(datum);
        let dimensions = datum.dimensions();
        transport.receive_values(datum.values_mut(), stream, dimensions)?;
        if datum.has_gradient() {
            let gradient_dimensions = datum.gradient_dimensions();
            transport.receive_values(datum.gradient_values_mut()?, stream, gradient_dimensions)?;
        }
    }
    Ok(())
}
