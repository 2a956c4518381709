//! Two toy solvers coupled over an in-process channel.
//!
//! The fluid applies a load that the structure's displacement partially
//! relieves; the structure deflects under the load:
//!
//! ```text
//! fluid:  f_i = (1 + t) · (1 + 0.1 i) − 0.5 · d_i
//! solid:  d_i = 0.8 · f_i
//! ```
//!
//! Each window has the fixed point `d = 0.8 · load / 1.4`, which implicit
//! coupling reaches by iteration.

use std::thread;

use serde::Serialize;
use tandem_data::{DataId, DatumSpec, MeshId};
use tandem_scheme::{
    Action, CouplingMode, CouplingScheme, ConstantRelaxation, JsonLinesSink,
    RelativeConvergenceMeasure, Role,
};
use tandem_transfer::ChannelTransport;
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::error::{DemoError, Result};

pub const FORCES: DataId = DataId(0);
pub const DISPLACEMENTS: DataId = DataId(1);
const INTERFACE: MeshId = MeshId(0);

const RELIEF: f64 = 0.5;
const COMPLIANCE: f64 = 0.8;

/// Outcome of one participant.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantReport {
    pub participant: String,
    pub completed_windows: u32,
    pub total_iterations: u32,
    pub time: f64,
    /// Solver output of the last step. The sent buffer already holds the
    /// prediction for the next window.
    pub final_values: Vec<f64>,
}

/// Outcome of a demo run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub first: ParticipantReport,
    pub second: ParticipantReport,
}

fn load(time: f64, vertex: usize) -> f64 {
    (1.0 + time) * (1.0 + 0.1 * vertex as f64)
}

/// Exact coupled displacement at `time`.
pub fn exact_displacement(time: f64, vertex: usize) -> f64 {
    COMPLIANCE * load(time, vertex) / (1.0 + RELIEF * COMPLIANCE)
}

fn fluid_step(time: f64, displacements: &[f64]) -> Vec<f64> {
    displacements
        .iter()
        .enumerate()
        .map(|(vertex, d)| load(time, vertex) - RELIEF * d)
        .collect()
}

fn solid_step(_time: f64, forces: &[f64]) -> Vec<f64> {
    forces.iter().map(|f| COMPLIANCE * f).collect()
}

fn build_scheme(
    config: &RunConfig,
    participant: &str,
    transport: ChannelTransport,
) -> tandem_scheme::Result<CouplingScheme> {
    let mut scheme = CouplingScheme::new(
        config.scheme_for(participant),
        config.participants.clone(),
        Box::new(transport),
    )?;
    let forces = DatumSpec::mesh(FORCES, "Forces", INTERFACE, 1, config.vertices);
    let displacements =
        DatumSpec::mesh(DISPLACEMENTS, "Displacements", INTERFACE, 1, config.vertices);

    match scheme.local_role() {
        Role::First => {
            scheme.add_data_to_send(forces, false)?;
            scheme.add_data_to_receive(displacements, false)?;
        }
        Role::Second => {
            scheme.add_data_to_receive(forces, false)?;
            scheme.add_data_to_send(displacements, false)?;
            if config.scheme.mode == CouplingMode::Implicit {
                scheme.add_convergence_measure(
                    DISPLACEMENTS,
                    false,
                    false,
                    Box::new(RelativeConvergenceMeasure::new(config.convergence_limit)),
                    true,
                )?;
                if let Some(omega) = config.relaxation {
                    scheme.set_acceleration(Box::new(ConstantRelaxation::new(omega)?))?;
                }
            }
        }
    }
    Ok(scheme)
}

/// Drive one participant until the coupling ends.
fn run_participant(
    mut scheme: CouplingScheme,
    solver_time_step: f64,
    step: fn(f64, &[f64]) -> Vec<f64>,
) -> tandem_scheme::Result<ParticipantReport> {
    let (send, receive) = match scheme.local_role() {
        Role::First => (FORCES, DISPLACEMENTS),
        Role::Second => (DISPLACEMENTS, FORCES),
    };
    let participant = scheme.config().local_participant.clone();

    scheme.initialize(0.0, 1)?;
    let mut solver_time = 0.0;
    let mut checkpoint = solver_time;
    let mut completed_windows = 0;
    let mut output = Vec::new();

    while scheme.is_coupling_ongoing() {
        if scheme.is_action_required(Action::WriteCheckpoint)
            && !scheme.is_action_fulfilled(Action::WriteCheckpoint)
        {
            checkpoint = solver_time;
            scheme.mark_action_fulfilled(Action::WriteCheckpoint)?;
        }

        let dt = solver_time_step.min(scheme.next_time_step_max_size());
        output = step(solver_time + dt, scheme.data(receive)?.values());
        scheme.write_values(send, &output)?;
        scheme.advance(dt)?;
        solver_time += dt;

        if scheme.is_action_required(Action::ReadCheckpoint) {
            solver_time = checkpoint;
            scheme.mark_action_fulfilled(Action::ReadCheckpoint)?;
            debug!(participant = %participant, iteration = scheme.iterations(), "Repeating window");
        } else if scheme.is_time_window_complete() {
            completed_windows += 1;
            debug!(participant = %participant, state = %scheme.coupling_state(), "Window done");
        }
    }

    scheme.finalize()?;
    Ok(ParticipantReport {
        participant,
        completed_windows,
        total_iterations: scheme.total_iterations(),
        time: scheme.time(),
        final_values: output,
    })
}

fn spawn_participant(
    config: &RunConfig,
    participant: String,
    transport: ChannelTransport,
    step: fn(f64, &[f64]) -> Vec<f64>,
) -> Result<thread::JoinHandle<Result<ParticipantReport>>> {
    let mut scheme = build_scheme(config, &participant, transport).map_err(|source| {
        DemoError::Participant {
            participant: participant.clone(),
            source,
        }
    })?;
    if let Some(dir) = &config.diagnostics_dir {
        let sink = JsonLinesSink::create(dir.join(format!("{participant}-diagnostics.jsonl")))
            .map_err(DemoError::Diagnostics)?;
        scheme
            .set_diagnostics(Box::new(sink))
            .map_err(|source| DemoError::Participant {
                participant: participant.clone(),
                source,
            })?;
    }

    let solver_time_step = config.solver_time_step;
    Ok(thread::spawn(move || {
        run_participant(scheme, solver_time_step, step)
            .map_err(|source| DemoError::Participant { participant, source })
    }))
}

fn join(
    handle: thread::JoinHandle<Result<ParticipantReport>>,
    name: &str,
) -> Result<ParticipantReport> {
    handle
        .join()
        .map_err(|_| DemoError::Panicked(name.to_string()))?
}

/// Run both participants, each on its own thread.
pub fn run(config: &RunConfig) -> Result<RunReport> {
    let first_name = config.participants.first.clone();
    let second_name = config.participants.second.clone();
    let (first_end, second_end) =
        ChannelTransport::labelled(first_name.clone(), second_name.clone());

    info!(
        first = %first_name,
        second = %second_name,
        mode = ?config.scheme.mode,
        "Starting coupled run"
    );

    let first = spawn_participant(config, first_name.clone(), first_end, fluid_step)?;
    let second = spawn_participant(config, second_name.clone(), second_end, solid_step)?;

    let second = join(second, &second_name);
    let first = join(first, &first_name);
    let report = RunReport {
        first: first?,
        second: second?,
    };

    info!(
        windows = report.second.completed_windows,
        iterations = report.second.total_iterations,
        "Coupled run finished"
    );
    Ok(report)
}
