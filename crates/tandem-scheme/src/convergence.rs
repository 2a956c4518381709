//! Convergence measures and the evaluators that bind them to data.
//!
//! A measure compares a datum's values at the start of an iteration with its
//! current values. The scheme combines the verdicts of all evaluators:
//!
//! - converged if every measure converged
//! - converged if one `suffices` measure converged and no `strict` one failed
//! - a `strict` measure that fails at the iteration limit ends the run

use tandem_data::DataIndex;

/// Criterion deciding whether successive iterates of one datum agree.
pub trait ConvergenceMeasure: Send {
    /// Compare two iterates and update the internal verdict.
    fn measure(&mut self, previous: &[f64], current: &[f64]);

    /// Verdict of the last `measure` call.
    fn is_converged(&self) -> bool;

    /// Residual of the last `measure` call, as written to diagnostics.
    fn norm_residual(&self) -> f64;

    /// Forget everything measured in the finished window.
    fn new_measurement_series(&mut self);

    /// Short tag used in diagnostics headers, e.g. `Abs`.
    fn abbreviation(&self) -> &'static str;

    /// One line describing the last verdict for `data_name`.
    fn print_state(&self, data_name: &str) -> String {
        format!(
            "{} convergence measure for \"{data_name}\": residual = {:.6e}, converged = {}",
            self.abbreviation(),
            self.norm_residual(),
            self.is_converged()
        )
    }
}

fn difference_norm(previous: &[f64], current: &[f64]) -> f64 {
    previous
        .iter()
        .zip(current)
        .map(|(old, new)| (new - old) * (new - old))
        .sum::<f64>()
        .sqrt()
}

fn norm(values: &[f64]) -> f64 {
    values.iter().map(|value| value * value).sum::<f64>().sqrt()
}

/// Converged when `‖x − x_prev‖₂ ≤ limit`.
#[derive(Debug, Clone)]
pub struct AbsoluteConvergenceMeasure {
    limit: f64,
    norm_diff: f64,
    converged: bool,
}

impl AbsoluteConvergenceMeasure {
    pub fn new(limit: f64) -> Self {
        Self {
            limit,
            norm_diff: 0.0,
            converged: false,
        }
    }
}

impl ConvergenceMeasure for AbsoluteConvergenceMeasure {
    fn measure(&mut self, previous: &[f64], current: &[f64]) {
        self.norm_diff = difference_norm(previous, current);
        self.converged = self.norm_diff <= self.limit;
    }

    fn is_converged(&self) -> bool {
        self.converged
    }

    fn norm_residual(&self) -> f64 {
        self.norm_diff
    }

    fn new_measurement_series(&mut self) {}

    fn abbreviation(&self) -> &'static str {
        "Abs"
    }

    fn print_state(&self, data_name: &str) -> String {
        format!(
            "absolute convergence measure for \"{data_name}\": two-norm diff = {:.6e}, limit = {:.6e}, converged = {}",
            self.norm_diff, self.limit, self.converged
        )
    }
}

/// Converged when `‖x − x_prev‖₂ ≤ limit · ‖x‖₂`.
#[derive(Debug, Clone)]
pub struct RelativeConvergenceMeasure {
    limit: f64,
    norm_diff: f64,
    norm: f64,
    converged: bool,
}

impl RelativeConvergenceMeasure {
    /// `limit` is a fraction in `(0, 1]`.
    pub fn new(limit: f64) -> Self {
        Self {
            limit,
            norm_diff: 0.0,
            norm: 0.0,
            converged: false,
        }
    }
}

impl ConvergenceMeasure for RelativeConvergenceMeasure {
    fn measure(&mut self, previous: &[f64], current: &[f64]) {
        self.norm_diff = difference_norm(previous, current);
        self.norm = norm(current);
        self.converged = self.norm_diff <= self.limit * self.norm;
    }

    fn is_converged(&self) -> bool {
        self.converged
    }

    fn norm_residual(&self) -> f64 {
        if self.norm > 0.0 {
            self.norm_diff / self.norm
        } else {
            self.norm_diff
        }
    }

    fn new_measurement_series(&mut self) {}

    fn abbreviation(&self) -> &'static str {
        "Rel"
    }

    fn print_state(&self, data_name: &str) -> String {
        format!(
            "relative convergence measure for \"{data_name}\": relative two-norm diff = {:.6e}, limit = {:.6e}, converged = {}",
            self.norm_residual(),
            self.limit,
            self.converged
        )
    }
}

/// Converged once measured `min_iterations` times in the current window.
#[derive(Debug, Clone)]
pub struct MinIterationConvergenceMeasure {
    min_iterations: u32,
    iterations: u32,
}

impl MinIterationConvergenceMeasure {
    pub fn new(min_iterations: u32) -> Self {
        Self {
            min_iterations,
            iterations: 0,
        }
    }
}

impl ConvergenceMeasure for MinIterationConvergenceMeasure {
    fn measure(&mut self, _previous: &[f64], _current: &[f64]) {
        self.iterations += 1;
    }

    fn is_converged(&self) -> bool {
        self.iterations >= self.min_iterations
    }

    /// Has no residual.
    fn norm_residual(&self) -> f64 {
        0.0
    }

    fn new_measurement_series(&mut self) {
        self.iterations = 0;
    }

    fn abbreviation(&self) -> &'static str {
        "MinIter"
    }

    fn print_state(&self, data_name: &str) -> String {
        format!(
            "minimal iteration convergence measure for \"{data_name}\": iterations = {}, min iterations = {}, converged = {}",
            self.iterations,
            self.min_iterations,
            self.is_converged()
        )
    }
}

/// A measure bound to one datum, with its combination flags.
pub struct ConvergenceEvaluator {
    pub data: DataIndex,
    /// Converging alone is enough for the window to converge.
    pub suffices: bool,
    /// Failing at the iteration limit is fatal.
    pub strict: bool,
    /// Write the residual to the iteration diagnostics.
    pub logs: bool,
    pub measure: Box<dyn ConvergenceMeasure>,
}

impl ConvergenceEvaluator {
    /// Column header of the residual, `Res<abbrev>(<data name>)`.
    pub fn log_header(&self, data_name: &str) -> String {
        format!("Res{}({data_name})", self.measure.abbreviation())
    }
}

impl std::fmt::Debug for ConvergenceEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvergenceEvaluator")
            .field("data", &self.data)
            .field("suffices", &self.suffices)
            .field("strict", &self.strict)
            .field("logs", &self.logs)
            .field("measure", &self.measure.abbreviation())
            .finish()
    }
}
