//! Serial exchange: the second participant computes after the first.
//!
//! Message order per window, implicit coupling (explicit omits the vote):
//!
//! ```text
//! first                                 second
//!   [window size]  ──────────────────▶
//!   data, global data ───────────────▶   (received at the end of the previous call)
//!                                         convergence check, acceleration
//!                  ◀──────────────────   convergence vote
//!                  ◀──────────────────   data, global data
//!   [window size]  ──────────────────▶   received if ongoing or not converged
//!   data, global data ───────────────▶
//! ```

use tandem_data::DataIndex;
use tracing::debug;

use crate::config::TimeWindowSizeMethod;
use crate::error::{Error, Result};
use crate::scheme::SchemeCore;
use crate::topology::{BiTopology, Exchange, Role};

/// What a participant does about the window size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowSizeRole {
    Fixed,
    Sets,
    Receives,
}

/// Serial protocol over a [`BiTopology`].
#[derive(Debug)]
pub struct SerialExchange {
    topology: BiTopology,
    window_size: WindowSizeRole,
}

impl SerialExchange {
    pub fn new(topology: BiTopology, method: TimeWindowSizeMethod) -> Self {
        let window_size = match (method, topology.role()) {
            (TimeWindowSizeMethod::Fixed, _) => WindowSizeRole::Fixed,
            (TimeWindowSizeMethod::FirstParticipantSets, Role::First) => WindowSizeRole::Sets,
            (TimeWindowSizeMethod::FirstParticipantSets, Role::Second) => WindowSizeRole::Receives,
        };
        Self {
            topology,
            window_size,
        }
    }

    pub fn topology(&self) -> &BiTopology {
        &self.topology
    }

    pub fn topology_mut(&mut self) -> &mut BiTopology {
        &mut self.topology
    }

    /// Whether the local participant dictates the window size.
    pub fn sets_time_window_size(&self) -> bool {
        self.window_size == WindowSizeRole::Sets
    }

    /// Data the second participant accelerates: everything it sends.
    pub fn acceleration_data(&self) -> &[DataIndex] {
        self.topology.members(Exchange::Send)
    }

    fn send_time_window_size(&self, core: &mut SchemeCore) -> Result<()> {
        if self.window_size == WindowSizeRole::Sets {
            let size = core.computed_time_window_part;
            debug!(size, "Sending time window size");
            core.transport.send_scalar(size)?;
        }
        Ok(())
    }

    fn receive_time_window_size(&self, core: &mut SchemeCore) -> Result<()> {
        if self.window_size == WindowSizeRole::Receives {
            let size = core.transport.receive_scalar()?;
            debug!(size, "Received time window size");
            if size.is_nan() || size <= 0.0 {
                return Err(Error::InvalidState {
                    expected: "a positive time window size from the first participant",
                    actual: format!("received {size}"),
                });
            }
            core.time_window_size = Some(size);
        }
        Ok(())
    }

    fn receive_all(&self, core: &mut SchemeCore) -> Result<()> {
        self.topology.receive_data(core)?;
        self.topology.receive_global_data(core)?;
        core.mark_data_received()
    }

    fn send_all(&self, core: &mut SchemeCore) -> Result<()> {
        self.topology.send_data(core)?;
        self.topology.send_global_data(core)
    }

    pub(crate) fn exchange_initial_data(&self, core: &mut SchemeCore) -> Result<()> {
        self.topology.exchange_initial_data(core)
    }

    /// The second participant starts on the first participant's results.
    pub(crate) fn receive_result_of_first_advance(&self, core: &mut SchemeCore) -> Result<()> {
        if self.topology.role() == Role::Second {
            self.receive_time_window_size(core)?;
            self.receive_all(core)?;
        }
        Ok(())
    }

    pub(crate) fn exchange_first_data(&self, core: &mut SchemeCore) -> Result<()> {
        match self.topology.role() {
            Role::First => {
                self.send_time_window_size(core)?;
                self.send_all(core)
            }
            Role::Second => {
                if core.is_implicit() {
                    core.do_implicit_step(self.acceleration_data())?;
                    core.transport.send_flag(core.has_converged)?;
                    debug!(converged = core.has_converged, "Sent convergence vote");
                }
                self.send_all(core)
            }
        }
    }

    pub(crate) fn exchange_second_data(&self, core: &mut SchemeCore) -> Result<()> {
        match self.topology.role() {
            Role::First => {
                if core.is_implicit() {
                    core.has_converged = core.transport.receive_flag()?;
                    debug!(converged = core.has_converged, "Received convergence vote");
                }
                self.receive_all(core)
            }
            Role::Second => {
                // Nothing follows the final converged window
                if core.is_coupling_ongoing() || (core.is_implicit() && !core.has_converged) {
                    self.receive_time_window_size(core)?;
                    self.receive_all(core)?;
                }
                Ok(())
            }
        }
    }
}

/// Exchange protocols a scheme can run.
#[derive(Debug)]
pub enum Topology {
    Serial(SerialExchange),
}

impl Topology {
    pub fn bi(&self) -> &BiTopology {
        match self {
            Topology::Serial(serial) => serial.topology(),
        }
    }

    pub fn bi_mut(&mut self) -> &mut BiTopology {
        match self {
            Topology::Serial(serial) => serial.topology_mut(),
        }
    }

    pub fn acceleration_data(&self) -> &[DataIndex] {
        match self {
            Topology::Serial(serial) => serial.acceleration_data(),
        }
    }

    pub fn sets_time_window_size(&self) -> bool {
        match self {
            Topology::Serial(serial) => serial.sets_time_window_size(),
        }
    }

    pub(crate) fn exchange_initial_data(&self, core: &mut SchemeCore) -> Result<()> {
        match self {
            Topology::Serial(serial) => serial.exchange_initial_data(core),
        }
    }

    pub(crate) fn receive_result_of_first_advance(&self, core: &mut SchemeCore) -> Result<()> {
        match self {
            Topology::Serial(serial) => serial.receive_result_of_first_advance(core),
        }
    }

    pub(crate) fn exchange_first_data(&self, core: &mut SchemeCore) -> Result<()> {
        match self {
            Topology::Serial(serial) => serial.exchange_first_data(core),
        }
    }

    pub(crate) fn exchange_second_data(&self, core: &mut SchemeCore) -> Result<()> {
        match self {
            Topology::Serial(serial) => serial.exchange_second_data(core),
        }
    }
}
