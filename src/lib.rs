//! The `qubit-sim` library models a single qubit as an ensemble of un-normalized
//! two-amplitude states that share one scale factor, together with the 2x2
//! operator ("gate") algebra acting on them: application, eigen-analysis,
//! probabilities and expectation values.
//! Complex arithmetic is carried by the `num-complex` crate.

use core::fmt;
use core::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use core::str::FromStr;
use num_complex::Complex64;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Tolerance used by every approximate comparison in this crate.
pub const THRESHOLD: f64 = 0.001;

/// Represents the basis state (1, 0).
pub const KET_ZERO: State = State {
    first: Complex::ONE,
    second: Complex::ZERO,
};
/// Represents the basis state (0, 1).
pub const KET_ONE: State = State {
    first: Complex::ZERO,
    second: Complex::ONE,
};

/// Result alias for fallible qubit operations.
pub type QubitResult<T> = Result<T, QubitError>;

/// Errors raised by the numeric core. All of them are recoverable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QubitError {
    #[error("cannot divide by a zero complex number")]
    DivideByZero,

    #[error("no matching state to remove")]
    NoStateToRemove,

    #[error("cannot parse {input:?} as a complex number")]
    Parse { input: String },

    #[error("eigenvalue is not real: negative radicand {radicand}")]
    DegenerateEigenvalue { radicand: f64 },

    #[error("gate has a zero top row: scale {scale} makes trace and determinant non-finite")]
    NonFiniteScale { scale: f64 },

    #[error("qubit has no components")]
    EmptyQubit,

    #[error("every measurement weight truncated to zero")]
    EmptySelection,

    #[error("measurement weight is not finite: {0}")]
    InvalidWeight(f64),
}

/// A complex number compared with a tolerance of [`THRESHOLD`] per part.
///
/// `Eq` and `Hash` are deliberately absent: tolerance equality is not transitive,
/// so no hash can agree with it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Complex(Complex64);

/// An ordered pair of amplitudes on the implicit two-element basis.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct State {
    first: Complex,
    second: Complex,
}

/// A 2x2 operator together with its normalization scale
/// `1 / sqrt(|top_left|^2 + |top_right|^2)`, fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct Gate {
    top_left: Complex,
    top_right: Complex,
    bot_left: Complex,
    bot_right: Complex,
    scale: f64,
}

/// An ensemble of states sharing one scale factor.
///
/// The scale factor is a derived value kept in step with every change to the
/// component list. A qubit without components reports an infinite scale factor.
#[derive(Debug, Clone)]
pub struct Qubit {
    components: Vec<State>,
    scale_factor: f64,
}

/// Tuning for [`Qubit::measure_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasureConfig {
    /// Number of candidate slots a weight of 1.0 occupies. Weights are scaled by
    /// this and truncated, so components below `1 / resolution` are never picked.
    pub resolution: u32,
}

/// Persisted form of a complex amplitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplexRecord {
    pub re: f64,
    pub im: f64,
}

/// Persisted form of one qubit component, in component order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QubitRecord {
    #[serde(rename = "firstNumber")]
    pub first: ComplexRecord,
    #[serde(rename = "secondNumber")]
    pub second: ComplexRecord,
}

impl Complex {
    pub const ZERO: Complex = Complex::new(0.0, 0.0);
    pub const ONE: Complex = Complex::new(1.0, 0.0);
    pub const I: Complex = Complex::new(0.0, 1.0);

    /// Constructs a complex number from its real and imaginary parts.
    pub const fn new(re: f64, im: f64) -> Self {
        Complex(Complex64 { re, im })
    }

    /// Real part.
    pub fn re(&self) -> f64 {
        self.0.re
    }

    /// Imaginary part.
    pub fn im(&self) -> f64 {
        self.0.im
    }

    /// Flips the sign of the imaginary part.
    pub fn conj(&self) -> Self {
        Complex(self.0.conj())
    }

    /// Returns `sqrt(re^2 + im^2)`.
    pub fn magnitude(&self) -> f64 {
        self.norm_sqr().sqrt()
    }

    /// Returns `re^2 + im^2`.
    pub fn norm_sqr(&self) -> f64 {
        self.0.norm_sqr()
    }

    /// Multiplies both parts by a real constant.
    pub fn scale(&self, k: f64) -> Self {
        Complex(self.0 * k)
    }

    /// Divides `self` by `other` as `self * conj(other) / |other|^2`.
    ///
    /// Only an exactly zero divisor is rejected; no tolerance is applied here.
    pub fn divide(&self, other: &Complex) -> QubitResult<Complex> {
        let denominator = other.norm_sqr();
        if denominator == 0.0 {
            return Err(QubitError::DivideByZero);
        }
        let numerator = *self * other.conj();
        Ok(numerator.scale(1.0 / denominator))
    }
}

impl PartialEq for Complex {
    fn eq(&self, other: &Self) -> bool {
        (self.0.re - other.0.re).abs() < THRESHOLD && (self.0.im - other.0.im).abs() < THRESHOLD
    }
}

impl From<Complex64> for Complex {
    fn from(value: Complex64) -> Self {
        Complex(value)
    }
}

impl From<Complex> for Complex64 {
    fn from(value: Complex) -> Self {
        value.0
    }
}

impl Add for Complex {
    type Output = Complex;
    fn add(self, rhs: Complex) -> Complex {
        Complex(self.0 + rhs.0)
    }
}
impl AddAssign for Complex {
    fn add_assign(&mut self, rhs: Complex) {
        self.0 += rhs.0;
    }
}
impl Sub for Complex {
    type Output = Complex;
    fn sub(self, rhs: Complex) -> Complex {
        Complex(self.0 - rhs.0)
    }
}
impl SubAssign for Complex {
    fn sub_assign(&mut self, rhs: Complex) {
        self.0 -= rhs.0;
    }
}
impl Mul for Complex {
    type Output = Complex;
    fn mul(self, rhs: Complex) -> Complex {
        Complex(self.0 * rhs.0)
    }
}
impl Mul<f64> for Complex {
    type Output = Complex;
    fn mul(self, rhs: f64) -> Complex {
        self.scale(rhs)
    }
}
impl Mul<Complex> for f64 {
    type Output = Complex;
    fn mul(self, rhs: Complex) -> Complex {
        rhs.scale(self)
    }
}
impl Neg for Complex {
    type Output = Complex;
    fn neg(self) -> Complex {
        Complex(-self.0)
    }
}

/// Keeps only ASCII digits, `.` and `-`.
fn strip_non_numeric(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect()
}

fn parse_real_part(part: &str, input: &str) -> QubitResult<f64> {
    strip_non_numeric(part)
        .parse()
        .map_err(|_| QubitError::Parse {
            input: input.to_owned(),
        })
}

/// A bare `i` carries an implicit unit coefficient, signed by any `-` present.
fn parse_imaginary_part(part: &str) -> f64 {
    match strip_non_numeric(part).parse::<f64>() {
        Ok(im) => im,
        Err(_) if part.contains('-') => -1.0,
        Err(_) => 1.0,
    }
}

impl FromStr for Complex {
    type Err = QubitError;

    /// Parses user-entered amplitudes such as `"8+3i"`, `"2.5 + 1.5i"`, `"-i"` or `"1+-i"`.
    fn from_str(s: &str) -> QubitResult<Self> {
        if let Some((real, imaginary)) = s.split_once('+') {
            Ok(Complex::new(
                parse_real_part(real, s)?,
                parse_imaginary_part(imaginary),
            ))
        } else if s.contains('i') {
            Ok(Complex::new(0.0, parse_imaginary_part(s)))
        } else {
            Ok(Complex::new(parse_real_part(s, s)?, 0.0))
        }
    }
}

impl fmt::Display for Complex {
    /// Renders with two decimals. The separator is always a literal `" + "`,
    /// so `(-1, -1)` prints as `"-1.00 + -1.00i"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (re, im) = (self.re(), self.im());
        if im.abs() < THRESHOLD {
            write!(f, "{re:.2}")
        } else if re.abs() < THRESHOLD {
            write!(f, "{im:.2}i")
        } else {
            write!(f, "{re:.2} + {im:.2}i")
        }
    }
}

impl State {
    /// Constructs a state from its two amplitudes.
    pub const fn new(first: Complex, second: Complex) -> Self {
        State { first, second }
    }

    /// Amplitude on the first basis element.
    pub fn first(&self) -> Complex {
        self.first
    }

    /// Amplitude on the second basis element.
    pub fn second(&self) -> Complex {
        self.second
    }

    /// Computes `first * other.first + second * other.second`.
    ///
    /// This is the plain bilinear product: neither side is conjugated, so it is
    /// symmetric. Callers that need a bra conjugate explicitly with [`State::conj`].
    pub fn inner_product(&self, other: &State) -> Complex {
        self.first * other.first + self.second * other.second
    }

    /// Conjugates both amplitudes.
    pub fn conj(&self) -> Self {
        State::new(self.first.conj(), self.second.conj())
    }

    /// Multiplies both amplitudes by a real constant.
    pub fn scale(&self, k: f64) -> Self {
        State::new(self.first.scale(k), self.second.scale(k))
    }

    /// Returns the reciprocal norm `1 / sqrt(|first|^2 + |second|^2)`.
    ///
    /// The zero vector yields `f64::INFINITY`.
    pub fn normalization_factor(&self) -> f64 {
        1.0 / (self.first.norm_sqr() + self.second.norm_sqr()).sqrt()
    }
}

impl Add for State {
    type Output = State;
    fn add(self, rhs: State) -> State {
        State::new(self.first + rhs.first, self.second + rhs.second)
    }
}
impl AddAssign for State {
    fn add_assign(&mut self, rhs: State) {
        *self = *self + rhs;
    }
}
impl Mul<f64> for State {
    type Output = State;
    fn mul(self, rhs: f64) -> State {
        self.scale(rhs)
    }
}
impl Mul<State> for f64 {
    type Output = State;
    fn mul(self, rhs: State) -> State {
        rhs.scale(self)
    }
}

impl From<ComplexRecord> for Complex {
    fn from(record: ComplexRecord) -> Self {
        Complex::new(record.re, record.im)
    }
}
impl From<Complex> for ComplexRecord {
    fn from(value: Complex) -> Self {
        ComplexRecord {
            re: value.re(),
            im: value.im(),
        }
    }
}
impl From<QubitRecord> for State {
    fn from(record: QubitRecord) -> Self {
        State::new(record.first.into(), record.second.into())
    }
}
impl From<State> for QubitRecord {
    fn from(state: State) -> Self {
        QubitRecord {
            first: state.first.into(),
            second: state.second.into(),
        }
    }
}

impl Gate {
    /// Constructs the Hermitian, traceless operator `[[a, b - ci], [b + ci, -a]]`.
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self::from_amplitudes(
            Complex::new(a, 0.0),
            Complex::new(b, -c),
            Complex::new(b, c),
            Complex::new(-a, 0.0),
        )
    }

    /// Constructs an operator from four amplitudes with no structural constraint.
    pub fn from_amplitudes(
        top_left: Complex,
        top_right: Complex,
        bot_left: Complex,
        bot_right: Complex,
    ) -> Self {
        let scale = 1.0 / (top_left.norm_sqr() + top_right.norm_sqr()).sqrt();
        Gate {
            top_left,
            top_right,
            bot_left,
            bot_right,
            scale,
        }
    }

    /// Bit flip, `(0, 1, 0)`.
    pub fn pauli_x() -> Self {
        Self::new(0.0, 1.0, 0.0)
    }

    /// `(0, 0, 1)`.
    pub fn pauli_y() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }

    /// Phase flip, `(1, 0, 0)`.
    pub fn pauli_z() -> Self {
        Self::new(1.0, 0.0, 0.0)
    }

    /// `(1, 1, 0)`, normalized by a scale of `1 / sqrt(2)`.
    pub fn hadamard() -> Self {
        Self::new(1.0, 1.0, 0.0)
    }

    /// The identity, built from amplitudes since it is not traceless.
    pub fn identity() -> Self {
        Self::from_amplitudes(Complex::ONE, Complex::ZERO, Complex::ZERO, Complex::ONE)
    }

    /// Raw top-left amplitude.
    pub fn top_left(&self) -> Complex {
        self.top_left
    }

    /// Raw top-right amplitude.
    pub fn top_right(&self) -> Complex {
        self.top_right
    }

    /// Raw bottom-left amplitude.
    pub fn bot_left(&self) -> Complex {
        self.bot_left
    }

    /// Raw bottom-right amplitude.
    pub fn bot_right(&self) -> Complex {
        self.bot_right
    }

    /// Normalization scale derived from the top row at construction.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Applies the raw, unscaled amplitudes to a state.
    ///
    /// Each output amplitude is the bilinear product of `state` with one column.
    pub fn apply(&self, state: &State) -> State {
        let col1 = State::new(self.top_left, self.bot_left);
        let col2 = State::new(self.top_right, self.bot_right);
        State::new(state.inner_product(&col1), state.inner_product(&col2))
    }

    /// Multiplies every amplitude by a real constant. The scale is re-derived.
    pub fn scale_by(&self, k: f64) -> Self {
        Self::from_amplitudes(
            self.top_left.scale(k),
            self.top_right.scale(k),
            self.bot_left.scale(k),
            self.bot_right.scale(k),
        )
    }

    /// Scaled trace `(top_left + bot_right) * scale`.
    pub fn tr(&self) -> Complex {
        (self.top_left + self.bot_right).scale(self.scale)
    }

    /// Scaled determinant `(top_left * bot_right - top_right * bot_left) * scale^2`.
    pub fn det(&self) -> Complex {
        (self.top_left * self.bot_right - self.top_right * self.bot_left)
            .scale(self.scale * self.scale)
    }

    /// Returns the eigenvalue on the positive (`true`) or negative branch,
    /// computed as `tr ± sqrt(tr^2 - 4 det) / 2` from the real parts of the
    /// scaled trace and determinant.
    ///
    /// A zero top row leaves the scale infinite and is reported as
    /// [`QubitError::NonFiniteScale`]; a negative radicand as
    /// [`QubitError::DegenerateEigenvalue`].
    pub fn eigenvalue(&self, positive: bool) -> QubitResult<f64> {
        let tr = self.tr().re();
        let det = self.det().re();
        if !tr.is_finite() || !det.is_finite() {
            warn!(scale = self.scale, "gate scale is not finite");
            return Err(QubitError::NonFiniteScale { scale: self.scale });
        }
        let radicand = tr * tr - 4.0 * det;
        if !(radicand >= 0.0) {
            warn!(radicand, "gate has no real eigenvalue");
            return Err(QubitError::DegenerateEigenvalue { radicand });
        }
        let gap = radicand.sqrt() / 2.0;
        if positive { Ok(tr + gap) } else { Ok(tr - gap) }
    }

    /// Returns the eigenstate for the chosen branch, normalized by its own
    /// reciprocal norm.
    pub fn eigenstate(&self, positive: bool) -> QubitResult<State> {
        let lambda = Complex::new(self.eigenvalue(positive)?, 0.0);
        let a = self.top_left.scale(self.scale);
        let b = self.top_right.scale(self.scale);
        let c = self.bot_left.scale(self.scale);
        let d = self.bot_right.scale(self.scale);

        // The first row is usable unless it vanishes against lambda.
        let candidate = if (a - lambda).magnitude() >= THRESHOLD {
            State::new(b, lambda - a)
        } else {
            State::new(lambda - d, c)
        };
        Ok(candidate.scale(candidate.normalization_factor()))
    }
}

impl PartialEq for Gate {
    fn eq(&self, other: &Self) -> bool {
        self.top_left == other.top_left
            && self.top_right == other.top_right
            && self.bot_left == other.bot_left
            && self.bot_right == other.bot_right
    }
}

impl Sub for Gate {
    type Output = Gate;
    /// Subtracts amplitude-wise. The scale is re-derived from the difference.
    fn sub(self, rhs: Gate) -> Gate {
        Gate::from_amplitudes(
            self.top_left - rhs.top_left,
            self.top_right - rhs.top_right,
            self.bot_left - rhs.bot_left,
            self.bot_right - rhs.bot_right,
        )
    }
}
impl Mul<f64> for Gate {
    type Output = Gate;
    fn mul(self, rhs: f64) -> Gate {
        self.scale_by(rhs)
    }
}
impl Mul<State> for Gate {
    type Output = State;
    fn mul(self, rhs: State) -> State {
        self.apply(&rhs)
    }
}

impl Default for MeasureConfig {
    fn default() -> Self {
        Self { resolution: 100 }
    }
}

/// How the scale factor is re-derived after a change to the components.
enum Rescale {
    /// Reciprocal root of the summed squared norms of every component.
    Added,
    /// Reciprocal norm of the vector sum of the remaining components.
    Removed,
    /// Previous factor times the applied gate's scale.
    Transformed(f64),
}

impl Qubit {
    /// Constructs a qubit holding a single seed state.
    pub fn new(seed: State) -> Self {
        Qubit {
            scale_factor: seed.normalization_factor(),
            components: vec![seed],
        }
    }

    /// Constructs a qubit with no components, to be filled by [`Qubit::add`].
    pub fn new_empty() -> Self {
        Qubit {
            components: Vec::new(),
            scale_factor: f64::INFINITY,
        }
    }

    /// Rebuilds a qubit by replaying [`Qubit::add`] over persisted records, in order.
    pub fn from_records(records: &[QubitRecord]) -> QubitResult<Self> {
        if records.is_empty() {
            return Err(QubitError::EmptyQubit);
        }
        let mut qubit = Qubit::new_empty();
        for record in records {
            qubit.add(State::from(*record));
        }
        Ok(qubit)
    }

    /// Snapshot of the components, in order, for persistence.
    pub fn to_records(&self) -> Vec<QubitRecord> {
        self.components.iter().map(|s| QubitRecord::from(*s)).collect()
    }

    /// Components in insertion order.
    pub fn components(&self) -> &[State] {
        &self.components
    }

    /// Shared normalization coefficient; infinite while the qubit is empty.
    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` before the first component is added.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Read-only traversal of the components.
    pub fn iter(&self) -> std::slice::Iter<'_, State> {
        self.components.iter()
    }

    /// Components multiplied by the shared scale factor.
    pub fn normalized_components(&self) -> impl Iterator<Item = State> + '_ {
        self.components.iter().map(|s| s.scale(self.scale_factor))
    }

    /// Weight of the component at `index`: `scale_factor^2 / normalization_factor^2`.
    pub fn component_probability(&self, index: usize) -> Option<f64> {
        self.components.get(index).map(|s| self.weight(s))
    }

    fn weight(&self, state: &State) -> f64 {
        let n = state.normalization_factor();
        (self.scale_factor * self.scale_factor) / (n * n)
    }

    fn ensure_populated(&self) -> QubitResult<()> {
        if self.components.is_empty() {
            Err(QubitError::EmptyQubit)
        } else {
            Ok(())
        }
    }

    /// Single update site for the scale factor.
    fn rescale(&mut self, rule: Rescale) {
        self.scale_factor = match rule {
            Rescale::Added => {
                let sum: f64 = self
                    .components
                    .iter()
                    .map(|s| s.normalization_factor().recip().powi(2))
                    .sum();
                1.0 / sum.sqrt()
            }
            Rescale::Removed => {
                let mut sum = State::default();
                for s in &self.components {
                    sum += *s;
                }
                sum.normalization_factor()
            }
            Rescale::Transformed(gate_scale) => self.scale_factor * gate_scale,
        };
        debug!(
            components = self.components.len(),
            scale_factor = self.scale_factor,
            "qubit rescaled"
        );
    }

    /// Appends a component and re-derives the scale factor over all components.
    pub fn add(&mut self, state: State) {
        self.components.push(state);
        self.rescale(Rescale::Added);
    }

    /// Removes the first component equal to `state`.
    ///
    /// Unlike [`Qubit::add`], the scale factor becomes the reciprocal norm of the
    /// vector sum of what remains.
    pub fn remove(&mut self, state: &State) -> QubitResult<()> {
        let index = self
            .components
            .iter()
            .position(|s| s == state)
            .ok_or(QubitError::NoStateToRemove)?;
        self.components.remove(index);
        self.rescale(Rescale::Removed);
        Ok(())
    }

    /// Applies `gate` to every component in place and folds its scale into the
    /// scale factor.
    pub fn transform(&mut self, gate: &Gate) {
        for component in self.components.iter_mut() {
            *component = gate.apply(component);
        }
        self.rescale(Rescale::Transformed(gate.scale()));
    }

    /// Samples one component with the default [`MeasureConfig`].
    pub fn measure<R: Rng + ?Sized>(&self, rng: &mut R) -> QubitResult<Qubit> {
        self.measure_with(&MeasureConfig::default(), rng)
    }

    /// Samples one component and returns it as a fresh single-component qubit.
    ///
    /// Each component occupies `trunc(weight * resolution)` candidate slots and one
    /// slot is drawn uniformly.
    pub fn measure_with<R: Rng + ?Sized>(
        &self,
        config: &MeasureConfig,
        rng: &mut R,
    ) -> QubitResult<Qubit> {
        self.ensure_populated()?;

        let mut counts = Vec::with_capacity(self.components.len());
        for state in &self.components {
            let weight = self.weight(state);
            let slots = weight * f64::from(config.resolution);
            if slots.is_infinite() {
                return Err(QubitError::InvalidWeight(weight));
            }
            // NaN truncates to zero slots.
            counts.push(slots as u64);
        }

        let total = counts.iter().fold(0u64, |acc, n| acc.saturating_add(*n));
        trace!(candidates = total, "sampling measurement outcome");
        if total == 0 {
            return Err(QubitError::EmptySelection);
        }

        let mut pick = rng.gen_range(0..total);
        for (state, count) in self.components.iter().zip(&counts) {
            if pick < *count {
                return Ok(Qubit::new(*state));
            }
            pick -= *count;
        }
        Err(QubitError::EmptySelection)
    }

    /// Probability of observing the chosen eigenvalue of `gate`.
    ///
    /// Sums `|conj(eigenstate) . s|^2` over the components and multiplies by
    /// `scale_factor^2`. The result is not clamped.
    pub fn probability_of(&self, gate: &Gate, positive: bool) -> QubitResult<f64> {
        self.ensure_populated()?;
        let bra = gate.eigenstate(positive)?.conj();
        let sum: f64 = self
            .components
            .iter()
            .map(|s| bra.inner_product(s).norm_sqr())
            .sum();
        Ok(sum * self.scale_factor * self.scale_factor)
    }

    /// Expectation value of `gate` over the ensemble.
    pub fn expectation_value(&self, gate: &Gate) -> QubitResult<f64> {
        self.ensure_populated()?;
        let sum = self
            .components
            .iter()
            .fold(Complex::ZERO, |acc, s| {
                acc + s.inner_product(&gate.apply(&s.conj()))
            });
        Ok(sum.re() * self.scale_factor * self.scale_factor * gate.scale())
    }
}

impl Default for Qubit {
    fn default() -> Self {
        Self::new_empty()
    }
}

impl<'a> IntoIterator for &'a Qubit {
    type Item = &'a State;
    type IntoIter = std::slice::Iter<'a, State>;
    fn into_iter(self) -> Self::IntoIter {
        self.components.iter()
    }
}




#[cfg(test)]
mod qubit_tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    fn c(re: f64, im: f64) -> Complex {
        Complex::new(re, im)
    }

    fn state1() -> State {
        State::new(c(1.0, 0.0), c(0.0, 1.0))
    }

    fn state2() -> State {
        State::new(c(1.0, 1.0), c(3.0, 4.0))
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 0.01,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_qubit_creation() {
        let qb = Qubit::new(state1());
        assert_eq!(qb.len(), 1);
        assert_close(qb.scale_factor(), 1.0 / 2.0_f64.sqrt());

        let empty = Qubit::new_empty();
        assert!(empty.is_empty());
        assert!(empty.scale_factor().is_infinite());
        assert!(Qubit::default().is_empty());
    }

    #[test]
    fn test_qubit_add() {
        let mut qb = Qubit::new(state1());
        qb.add(state2());
        assert_eq!(qb.components(), &[state1(), state2()]);
        assert_close(qb.scale_factor(), 1.0 / 29.0_f64.sqrt());
    }

    #[test]
    fn test_qubit_remove_uses_summed_vector() {
        let mut qb = Qubit::new(state1());
        qb.add(State::new(c(1.0, 0.0), c(3.0, 4.0)));
        qb.add(state2());

        let same = State::new(c(1.0, 0.0), c(3.0, 4.0));
        qb.remove(&same).unwrap();

        assert_eq!(qb.components(), &[state1(), state2()]);
        // |(2 + i, 3 + 5i)|^2 = 39
        assert_close(qb.scale_factor(), 1.0 / 39.0_f64.sqrt());
    }

    #[test]
    fn test_qubit_remove_missing_state() {
        let mut qb = Qubit::new(state1());
        assert_eq!(qb.remove(&state2()), Err(QubitError::NoStateToRemove));
        assert_eq!(qb.components(), &[state1()]);
    }

    #[test]
    fn test_qubit_add_then_remove_restores() {
        let mut qb = Qubit::new(KET_ZERO);
        qb.add(KET_ONE);
        assert_close(qb.scale_factor(), 1.0 / 2.0_f64.sqrt());

        qb.remove(&State::new(c(0.0, 0.0), c(1.0, 0.0))).unwrap();
        assert_eq!(qb.components(), &[KET_ZERO]);
        assert_close(qb.scale_factor(), 1.0);
    }

    #[test]
    fn test_qubit_remove_last_component() {
        let mut qb = Qubit::new(state1());
        qb.remove(&state1()).unwrap();
        assert!(qb.is_empty());
        assert!(qb.scale_factor().is_infinite());
    }

    #[test]
    fn test_qubit_transform_single() {
        let mut qb = Qubit::new(state1());
        qb.transform(&Gate::pauli_x());
        assert_eq!(qb.components(), &[State::new(c(0.0, 1.0), c(1.0, 0.0))]);
        assert_close(qb.scale_factor(), 1.0 / 2.0_f64.sqrt());
    }

    #[test]
    fn test_qubit_transform_multi() {
        let mut qb = Qubit::new(state1());
        qb.add(state2());
        qb.transform(&Gate::pauli_x());
        assert_eq!(
            qb.components(),
            &[
                State::new(c(0.0, 1.0), c(1.0, 0.0)),
                State::new(c(3.0, 4.0), c(1.0, 1.0)),
            ]
        );
    }

    #[test]
    fn test_qubit_transform_folds_gate_scale() {
        let mut qb = Qubit::new(KET_ZERO);
        qb.transform(&Gate::hadamard());
        assert_eq!(qb.components(), &[State::new(c(1.0, 0.0), c(1.0, 0.0))]);
        assert_close(qb.scale_factor(), 1.0 / 2.0_f64.sqrt());
    }

    #[test]
    fn test_flip_scenario() {
        let mut qb = Qubit::new(KET_ZERO);
        qb.transform(&Gate::new(0.0, 1.0, 0.0));
        assert_eq!(qb.len(), 1);
        assert_eq!(qb.components()[0], KET_ONE);
    }

    #[test]
    fn test_qubit_measure_single_component() {
        let qb = Qubit::new(state1());
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let measured = qb.measure(&mut rng).unwrap();
            assert_eq!(measured.components(), &[state1()]);
            assert_close(measured.scale_factor(), qb.scale_factor());
        }
    }

    #[test]
    fn test_qubit_measure_picks_a_component() {
        let mut qb = Qubit::new(state1());
        qb.add(state2());
        let mut seen_second = false;
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let measured = qb.measure(&mut rng).unwrap();
            assert_eq!(measured.len(), 1);
            let picked = measured.components()[0];
            assert!(picked == state1() || picked == state2());
            seen_second |= picked == state2();
        }
        // state2 holds 93 of the 99 slots.
        assert!(seen_second);
    }

    #[test]
    fn test_qubit_measure_is_reproducible() {
        let mut qb = Qubit::new(KET_ZERO);
        qb.add(KET_ONE);
        let first = qb.measure(&mut StdRng::seed_from_u64(7)).unwrap();
        let second = qb.measure(&mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(first.components(), second.components());
    }

    #[test]
    fn test_qubit_measure_empty_selection() {
        let mut qb = Qubit::new(KET_ZERO);
        qb.add(KET_ONE);
        let coarse = MeasureConfig { resolution: 1 };
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            qb.measure_with(&coarse, &mut rng).unwrap_err(),
            QubitError::EmptySelection
        );

        let mut crowded = Qubit::new(KET_ZERO);
        for _ in 0..100 {
            crowded.add(KET_ZERO);
        }
        assert_eq!(
            crowded.measure(&mut rng).unwrap_err(),
            QubitError::EmptySelection
        );
    }

    #[test]
    fn test_qubit_measure_rejects_infinite_weight() {
        let mut qb = Qubit::new(KET_ZERO);
        qb.add(State::new(c(-1.0, 0.0), c(0.0, 0.0)));
        qb.add(KET_ONE);
        qb.remove(&KET_ONE).unwrap();
        // The remaining components cancel, so the summed vector has no norm.
        assert!(qb.scale_factor().is_infinite());

        let mut rng = StdRng::seed_from_u64(3);
        assert!(matches!(
            qb.measure(&mut rng),
            Err(QubitError::InvalidWeight(w)) if w.is_infinite()
        ));
    }

    #[test]
    fn test_qubit_measure_empty_qubit() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            Qubit::new_empty().measure(&mut rng).unwrap_err(),
            QubitError::EmptyQubit
        );
    }

    #[test]
    fn test_qubit_probability_positive_z() {
        let z = Gate::pauli_z();
        let mut eigen = Qubit::new(KET_ZERO);
        let never = Qubit::new(KET_ONE);
        assert_close(eigen.probability_of(&z, true).unwrap(), 1.0);
        assert_close(never.probability_of(&z, true).unwrap(), 0.0);
        eigen.add(KET_ONE);
        assert_close(eigen.probability_of(&z, true).unwrap(), 0.5);
    }

    #[test]
    fn test_qubit_probability_negative_z() {
        let z = Gate::pauli_z();
        let mut eigen = Qubit::new(KET_ZERO);
        let never = Qubit::new(KET_ONE);
        assert_close(eigen.probability_of(&z, false).unwrap(), 0.0);
        assert_close(never.probability_of(&z, false).unwrap(), 1.0);
        eigen.add(KET_ONE);
        assert_close(eigen.probability_of(&z, false).unwrap(), 0.5);
    }

    #[test]
    fn test_qubit_probability_errors() {
        let rotation = Gate::from_amplitudes(c(0.0, 0.0), c(-1.0, 0.0), c(1.0, 0.0), c(0.0, 0.0));
        let qb = Qubit::new(KET_ZERO);
        assert!(matches!(
            qb.probability_of(&rotation, true),
            Err(QubitError::DegenerateEigenvalue { .. })
        ));
        assert_eq!(
            Qubit::new_empty().probability_of(&Gate::pauli_z(), true),
            Err(QubitError::EmptyQubit)
        );

        let projector = Gate::from_amplitudes(c(0.0, 0.0), c(0.0, 0.0), c(0.0, 0.0), c(1.0, 0.0));
        assert!(matches!(
            Qubit::new(KET_ONE).probability_of(&projector, true),
            Err(QubitError::NonFiniteScale { .. })
        ));
    }

    #[test]
    fn test_qubit_measure_with_dyn_rng() {
        let qb = Qubit::new(state1());
        let mut seeded = StdRng::seed_from_u64(11);
        let rng: &mut dyn RngCore = &mut seeded;
        let measured = qb.measure(rng).unwrap();
        assert_eq!(measured.components(), &[state1()]);
    }

    #[test]
    fn test_qubit_expectation_value_z() {
        let z = Gate::pauli_z();
        let mut eigen = Qubit::new(KET_ZERO);
        let never = Qubit::new(KET_ONE);
        assert_close(eigen.expectation_value(&z).unwrap(), 1.0);
        assert_close(never.expectation_value(&z).unwrap(), -1.0);
        assert_close(Qubit::new(state1()).expectation_value(&z).unwrap(), 0.0);
        assert_close(
            Qubit::new(state2()).expectation_value(&z).unwrap(),
            -23.0 / 27.0,
        );
        eigen.add(KET_ONE);
        assert_close(eigen.expectation_value(&z).unwrap(), 0.0);
        assert_eq!(
            Qubit::new_empty().expectation_value(&z),
            Err(QubitError::EmptyQubit)
        );
    }

    #[test]
    fn test_qubit_iteration() {
        let mut qb = Qubit::new(state1());
        qb.add(state2());

        let expected = [state1(), state2()];
        let mut count = 0;
        for (state, want) in (&qb).into_iter().zip(expected.iter()) {
            assert_eq!(state, want);
            count += 1;
        }
        assert_eq!(count, 2);
        let collected: Vec<State> = qb.iter().copied().collect();
        assert_eq!(collected, expected);
        // Restartable.
        assert_eq!(qb.iter().count(), 2);
    }

    #[test]
    fn test_qubit_normalized_view() {
        let mut qb = Qubit::new(KET_ZERO);
        qb.add(KET_ONE);
        let half = 1.0 / 2.0_f64.sqrt();
        let normalized: Vec<State> = qb.normalized_components().collect();
        assert_eq!(
            normalized,
            vec![
                State::new(c(half, 0.0), c(0.0, 0.0)),
                State::new(c(0.0, 0.0), c(half, 0.0)),
            ]
        );
        assert_close(qb.component_probability(0).unwrap(), 0.5);
        assert_close(qb.component_probability(1).unwrap(), 0.5);
        assert!(qb.component_probability(2).is_none());
    }
}
