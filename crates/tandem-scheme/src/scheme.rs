//! Time-window and iteration state machine of one participant.
//!
//! The adapter drives the scheme with three calls:
//!
//! ```text
//! initialize(t0, window) ─▶ advance(dt) ─▶ advance(dt) ─▶ ... ─▶ finalize()
//! ```
//!
//! Each `advance` adds the solver's step to the window, and once the end of
//! the window is reached runs the topology's two exchange phases. For
//! implicit coupling the second phase reports whether the window converged;
//! if not, time is rolled back to the start of the window and the adapter
//! must read its checkpoint.

use tandem_data::{DataArena, DataId, DataIndex, DatumKind, DatumSpec, ExchangeDatum};
use tandem_transfer::Transport;
use tracing::{debug, info, trace, warn};

use crate::acceleration::{Acceleration, AccelerationData};
use crate::action::{Action, Actions};
use crate::config::{CouplingMode, ParticipantPair, SchemeConfig};
use crate::convergence::{ConvergenceEvaluator, ConvergenceMeasure};
use crate::diagnostics::{DiagnosticsSink, IterationRecord, NullSink, WindowRecord};
use crate::error::{Error, Result};
use crate::math;
use crate::serial::{SerialExchange, Topology};
use crate::topology::{BiTopology, Exchange, Role};

/// Lifecycle of a coupling scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Data and measures can be registered.
    Constructed,
    /// `initialize` succeeded; the scheme advances.
    Initialized,
    /// `finalize` succeeded.
    Finalized,
    /// A fatal error ended the scheme.
    Aborted,
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lifecycle::Constructed => write!(f, "constructed"),
            Lifecycle::Initialized => write!(f, "initialized"),
            Lifecycle::Finalized => write!(f, "finalized"),
            Lifecycle::Aborted => write!(f, "aborted"),
        }
    }
}

/// State shared by every topology.
pub(crate) struct SchemeCore {
    pub(crate) config: SchemeConfig,
    eps: f64,
    pub(crate) lifecycle: Lifecycle,
    time: f64,
    time_windows: u32,
    pub(crate) computed_time_window_part: f64,
    pub(crate) time_window_size: Option<f64>,
    iterations: u32,
    total_iterations: u32,
    pub(crate) has_converged: bool,
    has_data_been_received: bool,
    is_time_window_complete: bool,
    initial_exchange_determined: bool,
    actions: Actions,
    pub(crate) arena: DataArena,
    evaluators: Vec<ConvergenceEvaluator>,
    acceleration: Option<Box<dyn Acceleration>>,
    diagnostics: Box<dyn DiagnosticsSink>,
    pub(crate) transport: Box<dyn Transport>,
}

impl SchemeCore {
    pub(crate) fn is_implicit(&self) -> bool {
        self.config.mode == CouplingMode::Implicit
    }

    fn expect_lifecycle(&self, expected: Lifecycle, what: &'static str) -> Result<()> {
        if self.lifecycle == expected {
            Ok(())
        } else {
            Err(Error::InvalidState {
                expected: what,
                actual: format!("scheme is {}", self.lifecycle),
            })
        }
    }

    pub(crate) fn next_time_step_max_size(&self) -> f64 {
        match (self.time_window_size, self.config.max_time) {
            (Some(size), _) => size - self.computed_time_window_part,
            (None, Some(max_time)) => max_time - self.time,
            (None, None) => f64::MAX,
        }
    }

    pub(crate) fn is_coupling_ongoing(&self) -> bool {
        let time_left = self
            .config
            .max_time
            .map_or(true, |max_time| math::greater(max_time, self.time, self.eps));
        let windows_left = self
            .config
            .max_time_windows
            .map_or(true, |max_windows| max_windows >= self.time_windows);
        time_left && windows_left
    }

    fn reached_end_of_time_window(&self) -> bool {
        self.time_window_size.is_none()
            || math::equals(self.next_time_step_max_size(), 0.0, self.eps)
    }

    /// Record that this iteration's data arrived. Once per iteration.
    pub(crate) fn mark_data_received(&mut self) -> Result<()> {
        if self.has_data_been_received {
            return Err(Error::InvalidState {
                expected: "data to be received once per iteration",
                actual: "data was already received in this iteration".into(),
            });
        }
        self.has_data_been_received = true;
        Ok(())
    }

    fn add_computed_time(&mut self, dt: f64) -> Result<()> {
        trace!(dt, time = self.time, "add_computed_time");
        if dt.is_nan() || dt <= 0.0 {
            return Err(Error::InvalidTimeStep(dt));
        }
        if !self.is_coupling_ongoing() {
            return Err(Error::InvalidState {
                expected: "coupling to be ongoing",
                actual: format!("advance() called after the end of the simulation at time {}", self.time),
            });
        }
        let allowed = self.next_time_step_max_size();
        if !math::greater_equals(allowed - dt, 0.0, self.eps) {
            return Err(Error::TimeStepTooLarge {
                requested: dt,
                allowed,
            });
        }
        self.computed_time_window_part += dt;
        self.time += dt;
        Ok(())
    }

    fn max_iterations_reached(&self) -> bool {
        self.config
            .max_iterations
            .is_some_and(|max| self.iterations >= max)
    }

    /// Measure every evaluator and combine the verdicts.
    fn measure_convergence(&mut self) -> Result<bool> {
        let primary = self.config.primary;
        let limit_reached = self.max_iterations_reached();
        let mut all_converged = true;
        let mut one_suffices = false;
        let mut one_strict = false;
        let mut strict_failure = None;
        let mut residuals = Vec::new();

        for evaluator in &mut self.evaluators {
            let datum = &self.arena[evaluator.data];
            evaluator
                .measure
                .measure(datum.previous_iteration(), datum.values());

            if evaluator.logs {
                residuals.push((
                    evaluator.log_header(datum.name()),
                    evaluator.measure.norm_residual(),
                ));
            }

            if !evaluator.measure.is_converged() {
                all_converged = false;
                if evaluator.strict {
                    one_strict = true;
                    if limit_reached && strict_failure.is_none() {
                        strict_failure = Some(datum.name().to_string());
                    }
                }
            } else if evaluator.suffices {
                one_suffices = true;
            }

            if primary {
                info!("{}", evaluator.measure.print_state(datum.name()));
            }
        }

        if primary {
            self.diagnostics.iteration_record(&IterationRecord {
                window: self.time_windows.saturating_sub(1),
                iteration: self.iterations,
                residuals,
            });
        }

        if let Some(data) = strict_failure {
            return Err(Error::StrictConvergenceFailed {
                data,
                max_iterations: self.config.max_iterations.unwrap_or(self.iterations),
            });
        }

        if all_converged {
            info!("All converged");
        } else if one_suffices && !one_strict {
            info!("Sufficient measures converged");
        }
        Ok(all_converged || (one_suffices && !one_strict))
    }

    /// One convergence check of the second participant, followed by either
    /// acceleration or the move to the next window.
    pub(crate) fn do_implicit_step(&mut self, acceleration_data: &[DataIndex]) -> Result<()> {
        self.arena.store_extrapolation_data();

        debug!(iteration = self.iterations, "Measuring convergence of the coupling iteration");
        let converged = self.measure_convergence()?;
        self.has_converged = converged || self.config.max_iterations == Some(self.iterations);

        if self.has_converged {
            if let Some(acceleration) = self.acceleration.as_mut() {
                acceleration
                    .iterations_converged(&AccelerationData::new(&mut self.arena, acceleration_data));
            }
            for evaluator in &mut self.evaluators {
                evaluator.measure.new_measurement_series();
            }
            AccelerationData::new(&mut self.arena, acceleration_data).move_to_next_window();
        } else if let Some(acceleration) = self.acceleration.as_mut() {
            acceleration
                .perform_acceleration(&mut AccelerationData::new(&mut self.arena, acceleration_data))?;
        }

        self.arena.store_iteration();
        Ok(())
    }

    fn write_window_record(&mut self, role: Role) {
        if !self.config.primary {
            return;
        }
        let columns = match (role, self.acceleration.as_ref()) {
            (Role::Second, Some(acceleration)) => acceleration.diagnostics(),
            _ => Default::default(),
        };
        let converged = self
            .config
            .max_iterations
            .map_or(true, |max| self.iterations < max);
        self.diagnostics.window_record(&WindowRecord {
            window: self.time_windows.saturating_sub(1),
            total_iterations: self.total_iterations,
            iterations: self.iterations,
            converged,
            active_columns: columns.active_columns,
            deleted_columns: columns.deleted_columns,
            dropped_columns: columns.dropped_columns,
        });
    }
}

/// Coupling scheme of one participant.
///
/// Every error returned from [`initialize`](Self::initialize),
/// [`advance`](Self::advance) or [`finalize`](Self::finalize) is fatal: the
/// scheme aborts and every later call to them fails with [`Error::Aborted`].
pub struct CouplingScheme {
    core: SchemeCore,
    topology: Topology,
}

impl CouplingScheme {
    /// Create a scheme coupling `participants` over `transport`.
    pub fn new(
        config: SchemeConfig,
        participants: ParticipantPair,
        transport: Box<dyn Transport>,
    ) -> Result<Self> {
        config.validate()?;
        let topology = BiTopology::new(participants, &config.local_participant)?;
        let topology = Topology::Serial(SerialExchange::new(topology, config.window_size_method));

        debug!(
            participant = %config.local_participant,
            role = %topology.bi().role(),
            mode = ?config.mode,
            "Created coupling scheme"
        );

        Ok(Self {
            core: SchemeCore {
                eps: config.eps(),
                time_window_size: config.time_window_size,
                config,
                lifecycle: Lifecycle::Constructed,
                time: 0.0,
                time_windows: 1,
                computed_time_window_part: 0.0,
                iterations: 1,
                total_iterations: 1,
                has_converged: false,
                has_data_been_received: false,
                is_time_window_complete: false,
                initial_exchange_determined: false,
                actions: Actions::new(),
                arena: DataArena::new(),
                evaluators: Vec::new(),
                acceleration: None,
                diagnostics: Box::new(NullSink),
                transport,
            },
            topology,
        })
    }

    /// Run a lifecycle step, aborting the scheme on error.
    fn run<T>(&mut self, step: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.core.lifecycle == Lifecycle::Aborted {
            return Err(Error::Aborted);
        }
        let result = step(self);
        if let Err(error) = &result {
            warn!(
                participant = %self.core.config.local_participant,
                %error,
                "Coupling scheme aborted"
            );
            self.core.lifecycle = Lifecycle::Aborted;
        }
        result
    }

    fn expect_constructed(&self) -> Result<()> {
        self.core
            .expect_lifecycle(Lifecycle::Constructed, "registration before initialize()")
    }

    fn register(
        &mut self,
        exchange: Exchange,
        spec: DatumSpec,
        requires_initialization: bool,
    ) -> Result<DataIndex> {
        self.expect_constructed()?;
        let is_global = matches!(spec.kind, DatumKind::Global);
        if is_global != exchange.is_global() {
            return Err(Error::InvalidConfig(format!(
                "data \"{}\" cannot be registered for {}",
                spec.name,
                exchange.label()
            )));
        }
        let order = if is_global {
            None
        } else {
            self.core.config.effective_extrapolation_order()
        };
        let name = spec.name.clone();
        let (index, _) = self.core.arena.get_or_try_insert_with(spec.id, || {
            ExchangeDatum::new(spec, requires_initialization, order)
        })?;
        self.topology.bi_mut().add(exchange, index, &name)?;
        Ok(index)
    }

    /// Register mesh data sent to the partner.
    pub fn add_data_to_send(&mut self, spec: DatumSpec, requires_initialization: bool) -> Result<()> {
        self.register(Exchange::Send, spec, requires_initialization)
            .map(|_| ())
    }

    /// Register mesh data received from the partner.
    pub fn add_data_to_receive(
        &mut self,
        spec: DatumSpec,
        requires_initialization: bool,
    ) -> Result<()> {
        self.register(Exchange::Receive, spec, requires_initialization)
            .map(|_| ())
    }

    /// Register mesh-less data sent to the partner.
    pub fn add_global_data_to_send(
        &mut self,
        spec: DatumSpec,
        requires_initialization: bool,
    ) -> Result<()> {
        self.register(Exchange::GlobalSend, spec, requires_initialization)
            .map(|_| ())
    }

    /// Register mesh-less data received from the partner.
    pub fn add_global_data_to_receive(
        &mut self,
        spec: DatumSpec,
        requires_initialization: bool,
    ) -> Result<()> {
        self.register(Exchange::GlobalReceive, spec, requires_initialization)
            .map(|_| ())
    }

    /// Judge convergence of a registered datum with `measure`.
    pub fn add_convergence_measure(
        &mut self,
        data: DataId,
        suffices: bool,
        strict: bool,
        measure: Box<dyn ConvergenceMeasure>,
        logs: bool,
    ) -> Result<()> {
        self.expect_constructed()?;
        if !self.core.is_implicit() {
            return Err(Error::InvalidConfig(
                "convergence measures are only defined for implicit coupling".into(),
            ));
        }
        let index = self
            .core
            .arena
            .index_of(data)
            .ok_or(Error::UnknownData(data))?;
        self.core.evaluators.push(ConvergenceEvaluator {
            data: index,
            suffices,
            strict,
            logs,
            measure,
        });
        Ok(())
    }

    /// Improve the second participant's iterates with `acceleration`.
    pub fn set_acceleration(&mut self, acceleration: Box<dyn Acceleration>) -> Result<()> {
        self.expect_constructed()?;
        if !self.core.is_implicit() {
            return Err(Error::InvalidConfig(
                "acceleration is only defined for implicit coupling".into(),
            ));
        }
        self.core.acceleration = Some(acceleration);
        Ok(())
    }

    /// Write window and iteration rows to `sink` instead of discarding them.
    pub fn set_diagnostics(&mut self, sink: Box<dyn DiagnosticsSink>) -> Result<()> {
        self.expect_constructed()?;
        self.core.diagnostics = sink;
        Ok(())
    }

    /// Decide which directions carry initialized data.
    ///
    /// Requires [`Action::InitializeData`] if this participant sends any.
    /// Called by [`initialize`](Self::initialize) if the adapter did not.
    pub fn determine_initial_data_exchange(&mut self) -> Result<()> {
        self.expect_constructed()?;
        if self.core.initial_exchange_determined {
            return Ok(());
        }
        if self
            .topology
            .bi_mut()
            .determine_initial_data_exchange(&self.core.arena)
        {
            self.core.actions.require(Action::InitializeData);
        }
        self.core.initial_exchange_determined = true;
        Ok(())
    }

    /// Start the coupling at `start_time` in window `start_window`.
    pub fn initialize(&mut self, start_time: f64, start_window: u32) -> Result<()> {
        self.run(|scheme| scheme.initialize_inner(start_time, start_window))
    }

    fn initialize_inner(&mut self, start_time: f64, start_window: u32) -> Result<()> {
        trace!(start_time, start_window, "initialize");
        self.expect_constructed()?;
        if start_time.is_nan() || start_time < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "start time must not be negative, got {start_time}"
            )));
        }
        self.determine_initial_data_exchange()?;
        if self.core.actions.is_required(Action::InitializeData)
            && !self.core.actions.is_fulfilled(Action::InitializeData)
        {
            return Err(Error::UnfulfilledActions(vec![Action::InitializeData]));
        }

        let core = &mut self.core;
        let role = self.topology.bi().role();
        core.time = start_time;
        core.time_windows = start_window;
        core.has_data_been_received = false;

        if core.is_implicit() {
            if role == Role::Second {
                if core.evaluators.is_empty() {
                    return Err(Error::MissingConvergenceMeasure);
                }
                core.arena.initialize_extrapolation();
                if let Some(acceleration) = core.acceleration.as_mut() {
                    acceleration.initialize(&AccelerationData::new(
                        &mut core.arena,
                        self.topology.acceleration_data(),
                    ))?;
                }
            }
            core.actions.require(Action::WriteCheckpoint);
            core.arena.store_iteration();
        }

        self.topology.exchange_initial_data(core)?;

        if core.is_implicit() && role == Role::Second {
            core.arena.store_extrapolation_data();
            AccelerationData::new(&mut core.arena, self.topology.acceleration_data())
                .move_to_next_window();
        }

        core.lifecycle = Lifecycle::Initialized;
        core.has_data_been_received = false;
        self.topology.receive_result_of_first_advance(core)?;

        info!(
            participant = %core.config.local_participant,
            role = %role,
            time = core.time,
            window = core.time_windows,
            "Coupling scheme initialized"
        );
        Ok(())
    }

    /// Report `dt` computed by the solver and exchange if the window ends.
    pub fn advance(&mut self, dt: f64) -> Result<()> {
        self.run(|scheme| {
            scheme
                .core
                .expect_lifecycle(Lifecycle::Initialized, "initialize() before advance()")?;
            scheme.core.add_computed_time(dt)?;
            scheme.first_exchange()?;
            scheme.second_exchange()
        })
    }

    fn first_exchange(&mut self) -> Result<()> {
        trace!(window = self.core.time_windows, time = self.core.time, "first_exchange");
        self.core.actions.check_completeness()?;
        self.core.has_data_been_received = false;
        self.core.is_time_window_complete = false;

        if self.core.reached_end_of_time_window() {
            // Decremented again if the window is repeated
            self.core.time_windows += 1;
            self.topology.exchange_first_data(&mut self.core)?;
        }
        Ok(())
    }

    fn second_exchange(&mut self) -> Result<()> {
        trace!(window = self.core.time_windows, time = self.core.time, "second_exchange");
        self.core.actions.check_completeness()?;

        if !self.core.reached_end_of_time_window() {
            return Ok(());
        }

        self.topology.exchange_second_data(&mut self.core)?;
        let role = self.topology.bi().role();
        let core = &mut self.core;

        if core.is_implicit() {
            if !core.has_converged {
                debug!(iteration = core.iterations, "No convergence achieved");
                core.actions.require(Action::ReadCheckpoint);
                core.time -= core.computed_time_window_part;
                core.time_windows -= 1;
            } else {
                debug!(iterations = core.iterations, "Convergence achieved");
                core.write_window_record(role);
                info!(
                    window = core.time_windows.saturating_sub(1),
                    iterations = core.iterations,
                    "Time window completed"
                );
                core.is_time_window_complete = true;
                if core.is_coupling_ongoing() {
                    core.actions.require(Action::WriteCheckpoint);
                }
            }
            core.total_iterations += 1;
            if core.has_converged {
                core.iterations = 1;
            } else {
                core.iterations += 1;
            }
        } else {
            info!(window = core.time_windows.saturating_sub(1), "Time window completed");
            core.is_time_window_complete = true;
        }

        if core.is_coupling_ongoing() && !core.has_data_been_received {
            return Err(Error::InvalidState {
                expected: "data from the partner while the coupling is ongoing",
                actual: "no data was received in this window".into(),
            });
        }
        core.computed_time_window_part = 0.0;
        Ok(())
    }

    /// End the coupling.
    pub fn finalize(&mut self) -> Result<()> {
        self.run(|scheme| {
            trace!("finalize");
            scheme.core.actions.check_completeness()?;
            scheme
                .core
                .expect_lifecycle(Lifecycle::Initialized, "initialize() before finalize()")?;
            scheme.core.lifecycle = Lifecycle::Finalized;
            Ok(())
        })
    }

    /// Set the window size of a participant that does not negotiate it.
    ///
    /// Only allowed before `initialize` or between two windows.
    pub fn set_time_window_size(&mut self, size: f64) -> Result<()> {
        if self.topology.sets_time_window_size() {
            return Err(Error::InvalidState {
                expected: "a participant that does not dictate the window size",
                actual: "the first participant sets the window size from its time steps".into(),
            });
        }
        match self.core.lifecycle {
            Lifecycle::Constructed => {}
            Lifecycle::Initialized if self.core.computed_time_window_part == 0.0 => {}
            Lifecycle::Initialized => {
                return Err(Error::InvalidState {
                    expected: "the window size to change at a window boundary",
                    actual: format!(
                        "{} of the current window is already computed",
                        self.core.computed_time_window_part
                    ),
                })
            }
            lifecycle => {
                return Err(Error::InvalidState {
                    expected: "set_time_window_size() before finalize()",
                    actual: format!("scheme is {lifecycle}"),
                })
            }
        }
        if size.is_nan() || size <= 0.0 {
            return Err(Error::InvalidTimeStep(size));
        }
        self.core.time_window_size = Some(size);
        Ok(())
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.core.lifecycle
    }

    pub fn config(&self) -> &SchemeConfig {
        &self.core.config
    }

    pub fn time(&self) -> f64 {
        self.core.time
    }

    /// Number of the window in progress, starting at the initial window.
    pub fn time_windows(&self) -> u32 {
        self.core.time_windows
    }

    /// Window size, `None` while it is not negotiated yet.
    pub fn time_window_size(&self) -> Option<f64> {
        self.core.time_window_size
    }

    pub fn has_time_window_size(&self) -> bool {
        self.core.time_window_size.is_some()
    }

    pub fn computed_time_window_part(&self) -> f64 {
        self.core.computed_time_window_part
    }

    /// Largest step that still ends inside the current window.
    pub fn next_time_step_max_size(&self) -> f64 {
        self.core.next_time_step_max_size()
    }

    /// Whether advancing by `last_dt` would reach the end of the window.
    pub fn will_data_be_exchanged(&self, last_dt: f64) -> bool {
        let remainder = self.core.next_time_step_max_size() - last_dt;
        !math::greater(remainder, 0.0, self.core.eps)
    }

    pub fn is_coupling_ongoing(&self) -> bool {
        self.core.is_coupling_ongoing()
    }

    pub fn is_time_window_complete(&self) -> bool {
        self.core.is_time_window_complete
    }

    pub fn has_converged(&self) -> bool {
        self.core.has_converged
    }

    pub fn has_data_been_received(&self) -> bool {
        self.core.has_data_been_received
    }

    /// Iteration within the current window, starting at 1.
    pub fn iterations(&self) -> u32 {
        self.core.iterations
    }

    pub fn total_iterations(&self) -> u32 {
        self.core.total_iterations
    }

    pub fn sends_initialized_data(&self) -> bool {
        self.topology.bi().sends_initialized_data()
    }

    pub fn receives_initialized_data(&self) -> bool {
        self.topology.bi().receives_initialized_data()
    }

    pub fn coupling_partners(&self) -> Vec<String> {
        self.topology.bi().coupling_partners()
    }

    pub fn local_role(&self) -> Role {
        self.topology.bi().role()
    }

    pub fn is_action_required(&self, action: Action) -> bool {
        self.core.actions.is_required(action)
    }

    pub fn is_action_fulfilled(&self, action: Action) -> bool {
        self.core.actions.is_fulfilled(action)
    }

    pub fn mark_action_fulfilled(&mut self, action: Action) -> Result<()> {
        self.core.actions.mark_fulfilled(action)
    }

    /// A registered datum.
    pub fn data(&self, id: DataId) -> Result<&ExchangeDatum> {
        self.core.arena.by_id(id).ok_or(Error::UnknownData(id))
    }

    /// Values of a registered datum, for the adapter to read or write.
    pub fn values_mut(&mut self, id: DataId) -> Result<&mut [f64]> {
        self.core
            .arena
            .by_id_mut(id)
            .map(ExchangeDatum::values_mut)
            .ok_or(Error::UnknownData(id))
    }

    /// Overwrite the values of a registered datum.
    pub fn write_values(&mut self, id: DataId, values: &[f64]) -> Result<()> {
        let datum = self
            .core
            .arena
            .by_id_mut(id)
            .ok_or(Error::UnknownData(id))?;
        datum.set_values(values)?;
        Ok(())
    }

    /// Human-readable state line, e.g. for adapter logs.
    pub fn coupling_state(&self) -> String {
        let core = &self.core;
        let config = &core.config;
        let mut state = format!("iteration: {}", core.iterations);
        if let Some(max) = config.max_iterations {
            state.push_str(&format!(" of {max}"));
        }
        state.push_str(&format!(", time-window: {}", core.time_windows));
        if let Some(max) = config.max_time_windows {
            state.push_str(&format!(" of {max}"));
        }
        state.push_str(&format!(", time: {}", core.time));
        if let Some(max) = config.max_time {
            state.push_str(&format!(" of {max}"));
        }
        if let Some(size) = core.time_window_size {
            state.push_str(&format!(", time-window-size: {size}"));
        }
        if core.time_window_size.is_some() || config.max_time.is_some() {
            state.push_str(&format!(
                ", max-time-step-size: {}",
                core.next_time_step_max_size()
            ));
        }
        let yes_no = |flag: bool| if flag { "yes" } else { "no" };
        state.push_str(&format!(
            ", ongoing: {}, time-window-complete: {}",
            yes_no(core.is_coupling_ongoing()),
            yes_no(core.is_time_window_complete)
        ));
        let actions = core.actions.to_string();
        if !actions.is_empty() {
            state.push_str(&format!(", {actions}"));
        }
        state
    }
}

impl std::fmt::Debug for CouplingScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CouplingScheme")
            .field("participant", &self.core.config.local_participant)
            .field("role", &self.topology.bi().role())
            .field("lifecycle", &self.core.lifecycle)
            .field("state", &self.coupling_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acceleration::ConstantRelaxation;
    use crate::config::TimeWindowSizeMethod;
    use crate::convergence::AbsoluteConvergenceMeasure;
    use crate::diagnostics::MemorySink;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tandem_data::MeshId;
    use tandem_transfer::{ChannelTransport, StreamId};

    const FORCES: DataId = DataId(0);
    const DISPLACEMENTS: DataId = DataId(1);

    fn pair() -> ParticipantPair {
        ParticipantPair::new("Fluid", "Solid")
    }

    fn forces() -> DatumSpec {
        DatumSpec::mesh(FORCES, "Forces", MeshId(0), 1, 2)
    }

    fn displacements() -> DatumSpec {
        DatumSpec::mesh(DISPLACEMENTS, "Displacements", MeshId(0), 1, 2)
    }

    /// Measure with a fixed verdict.
    struct Verdict(bool);

    impl ConvergenceMeasure for Verdict {
        fn measure(&mut self, _previous: &[f64], _current: &[f64]) {}
        fn is_converged(&self) -> bool {
            self.0
        }
        fn norm_residual(&self) -> f64 {
            if self.0 {
                0.0
            } else {
                1.0
            }
        }
        fn new_measurement_series(&mut self) {}
        fn abbreviation(&self) -> &'static str {
            "Verdict"
        }
    }

    /// Converged measure that counts how often it was asked.
    struct Counting(Arc<AtomicU32>);

    impl ConvergenceMeasure for Counting {
        fn measure(&mut self, _previous: &[f64], _current: &[f64]) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn is_converged(&self) -> bool {
            true
        }
        fn norm_residual(&self) -> f64 {
            0.0
        }
        fn new_measurement_series(&mut self) {}
        fn abbreviation(&self) -> &'static str {
            "Count"
        }
    }

    fn scheme(config: SchemeConfig) -> (CouplingScheme, ChannelTransport) {
        let (local, peer) = ChannelTransport::labelled("local", "peer");
        let scheme = CouplingScheme::new(config, pair(), Box::new(local)).unwrap();
        (scheme, peer)
    }

    fn fulfil_checkpoints(scheme: &mut CouplingScheme) {
        for action in [Action::WriteCheckpoint, Action::ReadCheckpoint] {
            if scheme.is_action_required(action) && !scheme.is_action_fulfilled(action) {
                scheme.mark_action_fulfilled(action).unwrap();
            }
        }
    }

    /// Solid of an implicit scheme: sends displacements, receives forces.
    fn implicit_solid(max_iterations: u32) -> (CouplingScheme, ChannelTransport) {
        let config = SchemeConfig::implicit("Solid", max_iterations)
            .with_time_window_size(0.1)
            .with_max_time_windows(10);
        let (mut scheme, peer) = scheme(config);
        scheme.add_data_to_send(displacements(), false).unwrap();
        scheme.add_data_to_receive(forces(), false).unwrap();
        (scheme, peer)
    }

    fn preload_forces(peer: &mut ChannelTransport, count: usize) {
        for round in 0..count {
            peer.send_values(&[round as f64, 1.0], StreamId(0), 1).unwrap();
        }
    }

    #[test]
    fn explicit_windows_complete_until_limit() {
        let config = SchemeConfig::explicit("Fluid")
            .with_time_window_size(0.1)
            .with_max_time_windows(3);
        let (mut scheme, _peer) = scheme(config);
        scheme.initialize(0.0, 1).unwrap();
        assert!(scheme.is_coupling_ongoing());

        for window in 1..=3 {
            assert!(scheme.is_coupling_ongoing());
            scheme.advance(0.1).unwrap();
            assert!(scheme.is_time_window_complete());
            assert_eq!(scheme.time_windows(), window + 1);
            assert!(scheme.has_data_been_received());
        }
        assert!(!scheme.is_coupling_ongoing());
        assert!((scheme.time() - 0.3).abs() < 1e-12);
        scheme.finalize().unwrap();
        assert_eq!(scheme.lifecycle(), Lifecycle::Finalized);
    }

    #[test]
    fn subcycling_completes_window_on_last_step() {
        let config = SchemeConfig::explicit("Fluid")
            .with_time_window_size(0.1)
            .with_max_time_windows(2);
        let (mut scheme, _peer) = scheme(config);
        scheme.initialize(0.0, 1).unwrap();

        scheme.advance(0.05).unwrap();
        assert!(!scheme.is_time_window_complete());
        assert!(!scheme.has_data_been_received());
        assert!((scheme.next_time_step_max_size() - 0.05).abs() < 1e-12);
        assert!(scheme.will_data_be_exchanged(0.05));
        assert!(!scheme.will_data_be_exchanged(0.01));

        scheme.advance(0.05).unwrap();
        assert!(scheme.is_time_window_complete());
        assert_eq!(scheme.computed_time_window_part(), 0.0);
    }

    #[test]
    fn oversized_step_reports_allowed_maximum_and_aborts() {
        let config = SchemeConfig::explicit("Fluid").with_time_window_size(0.1);
        let (mut scheme, _peer) = scheme(config);
        scheme.initialize(0.0, 1).unwrap();

        match scheme.advance(0.2) {
            Err(Error::TimeStepTooLarge { requested, allowed }) => {
                assert_eq!(requested, 0.2);
                assert!((allowed - 0.1).abs() < 1e-12);
            }
            other => panic!("expected oversized step, got {other:?}"),
        }
        assert_eq!(scheme.lifecycle(), Lifecycle::Aborted);
        assert!(matches!(scheme.advance(0.1), Err(Error::Aborted)));
    }

    #[test]
    fn non_positive_step_is_rejected() {
        let config = SchemeConfig::explicit("Fluid").with_time_window_size(0.1);
        let (mut scheme, _peer) = scheme(config);
        scheme.initialize(0.0, 1).unwrap();
        assert!(matches!(scheme.advance(0.0), Err(Error::InvalidTimeStep(_))));
    }

    #[test]
    fn advance_requires_initialize() {
        let config = SchemeConfig::explicit("Fluid").with_time_window_size(0.1);
        let (mut scheme, _peer) = scheme(config);
        assert!(matches!(scheme.advance(0.1), Err(Error::InvalidState { .. })));
    }

    #[test]
    fn advance_after_end_is_rejected() {
        let config = SchemeConfig::explicit("Fluid")
            .with_time_window_size(0.1)
            .with_max_time(0.1);
        let (mut scheme, _peer) = scheme(config);
        scheme.initialize(0.0, 1).unwrap();
        scheme.advance(0.1).unwrap();
        assert!(!scheme.is_coupling_ongoing());
        assert!(matches!(scheme.advance(0.1), Err(Error::InvalidState { .. })));
    }

    #[test]
    fn registration_is_closed_after_initialize() {
        let config = SchemeConfig::explicit("Fluid").with_time_window_size(0.1);
        let (mut scheme, _peer) = scheme(config);
        scheme.initialize(0.0, 1).unwrap();
        assert!(matches!(
            scheme.add_data_to_send(forces(), false),
            Err(Error::InvalidState { .. })
        ));
    }

    #[test]
    fn mesh_and_global_registration_do_not_mix() {
        let config = SchemeConfig::explicit("Fluid").with_time_window_size(0.1);
        let (mut scheme, _peer) = scheme(config);
        assert!(matches!(
            scheme.add_global_data_to_send(forces(), false),
            Err(Error::InvalidConfig(_))
        ));
        scheme
            .add_global_data_to_send(DatumSpec::global(DataId(5), "Flow", 1), false)
            .unwrap();
    }

    #[test]
    fn same_record_serves_both_directions() {
        let config = SchemeConfig::explicit("Fluid").with_time_window_size(0.1);
        let (mut scheme, _peer) = scheme(config);
        scheme.add_data_to_send(forces(), false).unwrap();
        scheme.add_data_to_receive(forces(), false).unwrap();
        scheme.write_values(FORCES, &[1.0, 2.0]).unwrap();
        assert_eq!(scheme.data(FORCES).unwrap().values(), &[1.0, 2.0]);
        assert!(matches!(
            scheme.add_data_to_send(forces(), false),
            Err(Error::DuplicateExchange { .. })
        ));
        assert!(matches!(
            scheme.write_values(FORCES, &[1.0]),
            Err(Error::Data(_))
        ));
        assert!(matches!(scheme.data(DataId(42)), Err(Error::UnknownData(_))));
    }

    #[test]
    fn initialized_data_requires_action() {
        let config = SchemeConfig::explicit("Solid").with_time_window_size(0.1);
        let (mut scheme, mut peer) = scheme(config);
        scheme.add_data_to_send(displacements(), true).unwrap();
        scheme.add_data_to_receive(forces(), false).unwrap();
        scheme.determine_initial_data_exchange().unwrap();
        assert!(scheme.is_action_required(Action::InitializeData));
        assert!(scheme.sends_initialized_data());
        assert!(!scheme.receives_initialized_data());

        scheme.values_mut(DISPLACEMENTS).unwrap()[0] = 4.0;
        scheme.mark_action_fulfilled(Action::InitializeData).unwrap();
        preload_forces(&mut peer, 1);
        scheme.initialize(0.0, 1).unwrap();

        let mut initial = [0.0; 2];
        peer.receive_values(&mut initial, StreamId(0), 1).unwrap();
        assert_eq!(initial, [4.0, 0.0]);
    }

    #[test]
    fn unfulfilled_initial_data_fails_initialize() {
        let config = SchemeConfig::explicit("Solid").with_time_window_size(0.1);
        let (mut scheme, _peer) = scheme(config);
        scheme.add_data_to_send(displacements(), true).unwrap();
        match scheme.initialize(0.0, 1) {
            Err(Error::UnfulfilledActions(missing)) => {
                assert_eq!(missing, vec![Action::InitializeData])
            }
            other => panic!("expected unfulfilled actions, got {other:?}"),
        }
        assert!(matches!(scheme.initialize(0.0, 1), Err(Error::Aborted)));
    }

    #[test]
    fn implicit_second_participant_needs_a_measure() {
        let (mut scheme, _peer) = implicit_solid(5);
        assert!(matches!(
            scheme.initialize(0.0, 1),
            Err(Error::MissingConvergenceMeasure)
        ));
    }

    #[test]
    fn measures_are_implicit_only() {
        let config = SchemeConfig::explicit("Solid").with_time_window_size(0.1);
        let (mut scheme, _peer) = scheme(config);
        scheme.add_data_to_send(displacements(), false).unwrap();
        assert!(scheme
            .add_convergence_measure(DISPLACEMENTS, false, false, Box::new(Verdict(true)), false)
            .is_err());
        assert!(scheme.set_acceleration(Box::new(ConstantRelaxation::new(0.5).unwrap())).is_err());
    }

    #[test]
    fn unknown_data_cannot_be_measured() {
        let (mut scheme, _peer) = implicit_solid(5);
        assert!(matches!(
            scheme.add_convergence_measure(DataId(9), false, false, Box::new(Verdict(true)), false),
            Err(Error::UnknownData(DataId(9)))
        ));
    }

    #[test]
    fn missing_checkpoint_blocks_advance() {
        let (mut scheme, mut peer) = implicit_solid(5);
        scheme
            .add_convergence_measure(DISPLACEMENTS, false, false, Box::new(Verdict(true)), false)
            .unwrap();
        preload_forces(&mut peer, 1);
        scheme.initialize(0.0, 1).unwrap();
        assert!(scheme.is_action_required(Action::WriteCheckpoint));

        match scheme.advance(0.1) {
            Err(Error::UnfulfilledActions(missing)) => {
                assert_eq!(missing, vec![Action::WriteCheckpoint])
            }
            other => panic!("expected unfulfilled actions, got {other:?}"),
        }
    }

    #[test]
    fn non_sufficient_failure_is_outvoted_by_sufficient_success() {
        let (mut scheme, mut peer) = implicit_solid(5);
        scheme
            .add_convergence_measure(DISPLACEMENTS, false, false, Box::new(Verdict(false)), true)
            .unwrap();
        scheme
            .add_convergence_measure(FORCES, true, false, Box::new(Verdict(true)), true)
            .unwrap();
        let sink = MemorySink::new();
        scheme.set_diagnostics(Box::new(sink.clone())).unwrap();
        preload_forces(&mut peer, 2);
        scheme.initialize(0.0, 1).unwrap();
        fulfil_checkpoints(&mut scheme);

        scheme.advance(0.1).unwrap();
        assert!(scheme.has_converged());
        assert!(scheme.is_time_window_complete());
        assert_eq!(scheme.iterations(), 1);
        assert_eq!(scheme.total_iterations(), 2);
        assert_eq!(scheme.time_windows(), 2);
        assert!(scheme.is_action_required(Action::WriteCheckpoint));
        assert!(!scheme.is_action_required(Action::ReadCheckpoint));

        let iterations = sink.iterations();
        assert_eq!(iterations.len(), 1);
        assert_eq!(iterations[0].window, 1);
        let headers: Vec<&str> = iterations[0]
            .residuals
            .iter()
            .map(|(header, _)| header.as_str())
            .collect();
        assert_eq!(headers, vec!["ResVerdict(Displacements)", "ResVerdict(Forces)"]);

        let windows = sink.windows();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].window, 1);
        assert!(windows[0].converged);
    }

    #[test]
    fn strict_failure_overrules_sufficient_success() {
        let (mut scheme, mut peer) = implicit_solid(5);
        scheme
            .add_convergence_measure(DISPLACEMENTS, false, true, Box::new(Verdict(false)), false)
            .unwrap();
        scheme
            .add_convergence_measure(FORCES, true, false, Box::new(Verdict(true)), false)
            .unwrap();
        preload_forces(&mut peer, 2);
        scheme.initialize(0.0, 1).unwrap();
        fulfil_checkpoints(&mut scheme);

        scheme.advance(0.1).unwrap();
        assert!(!scheme.has_converged());
        assert_eq!(scheme.iterations(), 2);
    }

    #[test]
    fn strict_measure_fails_at_iteration_limit() {
        let (mut scheme, mut peer) = implicit_solid(5);
        scheme
            .add_convergence_measure(DISPLACEMENTS, false, true, Box::new(Verdict(false)), false)
            .unwrap();
        preload_forces(&mut peer, 6);
        scheme.initialize(0.0, 1).unwrap();

        for iteration in 1..=4 {
            fulfil_checkpoints(&mut scheme);
            assert_eq!(scheme.iterations(), iteration);
            scheme.advance(0.1).unwrap();
            assert!(!scheme.has_converged());
            assert!(scheme.is_action_required(Action::ReadCheckpoint));
            assert!(scheme.time().abs() < 1e-12);
            assert_eq!(scheme.time_windows(), 1);
        }

        fulfil_checkpoints(&mut scheme);
        match scheme.advance(0.1) {
            Err(Error::StrictConvergenceFailed { data, max_iterations }) => {
                assert_eq!(data, "Displacements");
                assert_eq!(max_iterations, 5);
            }
            other => panic!("expected strict failure, got {other:?}"),
        }
        assert!(matches!(scheme.advance(0.1), Err(Error::Aborted)));
    }

    #[test]
    fn every_measure_runs_before_strict_failure() {
        let (mut scheme, mut peer) = implicit_solid(2);
        let calls = Arc::new(AtomicU32::new(0));
        scheme
            .add_convergence_measure(DISPLACEMENTS, false, true, Box::new(Verdict(false)), false)
            .unwrap();
        scheme
            .add_convergence_measure(FORCES, false, false, Box::new(Counting(calls.clone())), false)
            .unwrap();
        preload_forces(&mut peer, 3);
        scheme.initialize(0.0, 1).unwrap();

        fulfil_checkpoints(&mut scheme);
        scheme.advance(0.1).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        fulfil_checkpoints(&mut scheme);
        assert!(matches!(
            scheme.advance(0.1),
            Err(Error::StrictConvergenceFailed { max_iterations: 2, .. })
        ));
        // Measured in the failing iteration too
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn secondary_rank_writes_no_diagnostics() {
        let config = SchemeConfig::implicit("Solid", 3)
            .with_time_window_size(0.1)
            .with_max_time_windows(10)
            .with_primary(false);
        let (mut scheme, mut peer) = scheme(config);
        scheme.add_data_to_send(displacements(), false).unwrap();
        scheme.add_data_to_receive(forces(), false).unwrap();
        scheme
            .add_convergence_measure(DISPLACEMENTS, false, false, Box::new(Verdict(true)), true)
            .unwrap();
        let sink = MemorySink::new();
        scheme.set_diagnostics(Box::new(sink.clone())).unwrap();
        preload_forces(&mut peer, 2);
        scheme.initialize(0.0, 1).unwrap();
        fulfil_checkpoints(&mut scheme);

        scheme.advance(0.1).unwrap();
        assert!(scheme.is_time_window_complete());
        assert!(sink.windows().is_empty());
        assert!(sink.iterations().is_empty());
    }

    #[test]
    fn window_size_changes_only_between_windows() {
        let config = SchemeConfig::explicit("Fluid")
            .with_time_window_size(0.1)
            .with_max_time_windows(3);
        let (mut scheme, _peer) = scheme(config);
        scheme.initialize(0.0, 1).unwrap();

        scheme.advance(0.08).unwrap();
        assert!(matches!(
            scheme.set_time_window_size(0.05),
            Err(Error::InvalidState { .. })
        ));
        assert_eq!(scheme.time_window_size(), Some(0.1));
        assert_eq!(scheme.lifecycle(), Lifecycle::Initialized);

        scheme.advance(0.02).unwrap();
        assert!(scheme.is_time_window_complete());
        scheme.set_time_window_size(0.05).unwrap();
        assert!((scheme.next_time_step_max_size() - 0.05).abs() < 1e-12);
        scheme.advance(0.05).unwrap();
        assert!(scheme.is_time_window_complete());

        scheme.finalize().unwrap();
        assert!(scheme.set_time_window_size(0.1).is_err());
    }

    #[test]
    fn diagnostics_are_set_before_initialize() {
        let config = SchemeConfig::explicit("Fluid").with_time_window_size(0.1);
        let (mut scheme, _peer) = scheme(config);
        scheme.set_diagnostics(Box::new(MemorySink::new())).unwrap();
        scheme.initialize(0.0, 1).unwrap();
        assert!(matches!(
            scheme.set_diagnostics(Box::new(MemorySink::new())),
            Err(Error::InvalidState { .. })
        ));
    }

    #[test]
    fn iteration_limit_forces_convergence() {
        let (mut scheme, mut peer) = implicit_solid(3);
        scheme
            .add_convergence_measure(DISPLACEMENTS, false, false, Box::new(Verdict(false)), false)
            .unwrap();
        let sink = MemorySink::new();
        scheme.set_diagnostics(Box::new(sink.clone())).unwrap();
        preload_forces(&mut peer, 4);
        scheme.initialize(0.0, 1).unwrap();

        for _ in 0..3 {
            fulfil_checkpoints(&mut scheme);
            scheme.advance(0.1).unwrap();
        }
        assert!(scheme.has_converged());
        assert_eq!(scheme.iterations(), 1);
        assert_eq!(scheme.total_iterations(), 4);
        assert_eq!(scheme.time_windows(), 2);
        assert!(!sink.windows()[0].converged);
    }

    #[test]
    fn relaxation_applies_to_sent_data() {
        let (mut scheme, mut peer) = implicit_solid(5);
        scheme
            .add_convergence_measure(
                DISPLACEMENTS,
                false,
                false,
                Box::new(AbsoluteConvergenceMeasure::new(1e-6)),
                false,
            )
            .unwrap();
        scheme
            .set_acceleration(Box::new(ConstantRelaxation::new(0.5).unwrap()))
            .unwrap();
        preload_forces(&mut peer, 2);
        scheme.initialize(0.0, 1).unwrap();
        fulfil_checkpoints(&mut scheme);

        scheme.write_values(DISPLACEMENTS, &[2.0, 4.0]).unwrap();
        scheme.advance(0.1).unwrap();
        assert!(!scheme.has_converged());

        assert!(!peer.receive_flag().unwrap());
        let mut sent = [0.0; 2];
        peer.receive_values(&mut sent, StreamId(0), 1).unwrap();
        assert_eq!(sent, [1.0, 2.0]);
        assert_eq!(scheme.data(DISPLACEMENTS).unwrap().previous_iteration(), &[1.0, 2.0]);
    }

    #[test]
    fn converged_window_moves_to_prediction() {
        let config = SchemeConfig::implicit("Solid", 5)
            .with_time_window_size(0.1)
            .with_max_time_windows(10)
            .with_extrapolation_order(1);
        let (mut scheme, mut peer) = scheme(config);
        scheme.add_data_to_send(displacements(), false).unwrap();
        scheme.add_data_to_receive(forces(), false).unwrap();
        scheme
            .add_convergence_measure(DISPLACEMENTS, false, false, Box::new(Verdict(true)), false)
            .unwrap();
        preload_forces(&mut peer, 3);
        scheme.initialize(0.0, 1).unwrap();

        fulfil_checkpoints(&mut scheme);
        scheme.write_values(DISPLACEMENTS, &[3.0, 3.0]).unwrap();
        scheme.advance(0.1).unwrap();

        fulfil_checkpoints(&mut scheme);
        scheme.write_values(DISPLACEMENTS, &[5.0, 5.0]).unwrap();
        scheme.advance(0.1).unwrap();

        assert_eq!(scheme.data(DISPLACEMENTS).unwrap().values(), &[7.0, 7.0]);
    }

    #[test]
    fn implicit_first_participant_repeats_on_negative_vote() {
        let config = SchemeConfig::implicit("Fluid", 5)
            .with_time_window_size(0.1)
            .with_max_time_windows(2);
        let (mut scheme, mut peer) = scheme(config);
        scheme.add_data_to_send(forces(), false).unwrap();
        scheme.add_data_to_receive(displacements(), false).unwrap();
        scheme.initialize(0.0, 1).unwrap();

        peer.send_flag(false).unwrap();
        peer.send_values(&[0.5, 0.5], StreamId(0), 1).unwrap();
        fulfil_checkpoints(&mut scheme);
        scheme.advance(0.1).unwrap();
        assert!(!scheme.has_converged());
        assert!(scheme.is_action_required(Action::ReadCheckpoint));
        assert_eq!(scheme.time_windows(), 1);
        assert_eq!(scheme.data(DISPLACEMENTS).unwrap().values(), &[0.5, 0.5]);

        peer.send_flag(true).unwrap();
        peer.send_values(&[0.6, 0.6], StreamId(0), 1).unwrap();
        fulfil_checkpoints(&mut scheme);
        scheme.advance(0.1).unwrap();
        assert!(scheme.has_converged());
        assert!(scheme.is_time_window_complete());
        assert_eq!(scheme.time_windows(), 2);
        assert!(scheme.is_action_required(Action::WriteCheckpoint));
    }

    #[test]
    fn first_participant_dictates_window_size() {
        let config = SchemeConfig::explicit("Fluid")
            .with_window_size_method(TimeWindowSizeMethod::FirstParticipantSets)
            .with_max_time(1.0);
        let (mut scheme, mut peer) = scheme(config);
        assert!(!scheme.has_time_window_size());
        assert!(scheme.set_time_window_size(0.1).is_err());
        scheme.initialize(0.0, 1).unwrap();

        scheme.advance(0.05).unwrap();
        assert!(scheme.is_time_window_complete());
        assert_eq!(peer.receive_scalar().unwrap(), 0.05);
    }

    #[test]
    fn second_participant_adopts_received_window_size() {
        let config = SchemeConfig::explicit("Solid")
            .with_window_size_method(TimeWindowSizeMethod::FirstParticipantSets)
            .with_max_time(1.0);
        let (mut scheme, mut peer) = scheme(config);
        peer.send_scalar(0.05).unwrap();
        scheme.initialize(0.0, 1).unwrap();
        assert_eq!(scheme.time_window_size(), Some(0.05));
        assert!(scheme.has_data_been_received());
    }

    #[test]
    fn coupling_state_lists_actions() {
        let (mut scheme, mut peer) = implicit_solid(5);
        scheme
            .add_convergence_measure(DISPLACEMENTS, false, false, Box::new(Verdict(true)), false)
            .unwrap();
        preload_forces(&mut peer, 1);
        scheme.initialize(0.0, 1).unwrap();
        let state = scheme.coupling_state();
        assert!(state.starts_with("iteration: 1 of 5, time-window: 1 of 10"), "{state}");
        assert!(state.contains("ongoing: yes"), "{state}");
        assert!(state.ends_with("write-checkpoint"), "{state}");
    }

    #[test]
    fn finalize_checks_actions_and_lifecycle() {
        let config = SchemeConfig::explicit("Fluid").with_time_window_size(0.1);
        let (mut scheme, _peer) = scheme(config);
        assert!(scheme.finalize().is_err());

        let (mut scheme, mut peer) = implicit_solid(5);
        scheme
            .add_convergence_measure(DISPLACEMENTS, false, false, Box::new(Verdict(true)), false)
            .unwrap();
        preload_forces(&mut peer, 1);
        scheme.initialize(0.0, 1).unwrap();
        assert!(matches!(scheme.finalize(), Err(Error::UnfulfilledActions(_))));
    }

    proptest! {
        #[test]
        fn computed_part_stays_inside_window(steps in proptest::collection::vec(1u32..=4, 1..40)) {
            let config = SchemeConfig::explicit("Fluid")
                .with_time_window_size(0.4)
                .with_max_time_windows(1000);
            let (mut scheme, _peer) = scheme(config);
            scheme.initialize(0.0, 1).unwrap();

            for quarter in steps {
                let dt = (f64::from(quarter) * 0.1).min(scheme.next_time_step_max_size());
                scheme.advance(dt).unwrap();
                let part = scheme.computed_time_window_part();
                prop_assert!(part >= 0.0);
                prop_assert!(part <= 0.4 + 1e-10);
            }
        }

        #[test]
        fn iterations_bounded_and_reset_on_convergence(
            verdicts in proptest::collection::vec(any::<bool>(), 1..30)
        ) {
            let config = SchemeConfig::implicit("Fluid", 4)
                .with_time_window_size(0.1);
            let (mut scheme, mut peer) = scheme(config);
            scheme.initialize(0.0, 1).unwrap();

            for converged in verdicts {
                // The second participant forces convergence at the limit
                let vote = converged || scheme.iterations() == 4;
                peer.send_flag(vote).unwrap();
                fulfil_checkpoints(&mut scheme);
                scheme.advance(0.1).unwrap();
                prop_assert!(scheme.iterations() <= 4);
                if vote {
                    prop_assert_eq!(scheme.iterations(), 1);
                } else {
                    prop_assert!(scheme.iterations() > 1);
                }
            }
        }
    }
}
