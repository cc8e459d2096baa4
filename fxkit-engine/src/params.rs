//! Parameter store and gateway
//!
//! Control threads write parameter values into a [`ParamStore`] (one
//! `AtomicU32` per parameter holding `f32` bits). The audio thread owns a
//! [`ParameterGateway`] that snapshots and clamps every value once per block.
//! Reads are `Relaxed`: a block may observe a mix of old and new values
//! across parameters, which downstream smoothing absorbs.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// Errors raised when writing parameters from a control thread
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("Unknown parameter id: {0}")]
    UnknownId(String),
    #[error("Parameter index {index} out of range ({len} parameters)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Non-finite value {value} for parameter {id}")]
    NonFinite { id: &'static str, value: f32 },
}

/// Value domain of a parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamKind {
    Float,
    Bool,
    /// Index into a fixed list of option names
    Choice(&'static [&'static str]),
}

/// Static description of one parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub kind: ParamKind,
}

impl ParamSpec {
    pub const fn float(
        id: &'static str,
        name: &'static str,
        min: f32,
        max: f32,
        default: f32,
    ) -> Self {
        Self {
            id,
            name,
            min,
            max,
            default,
            kind: ParamKind::Float,
        }
    }

    pub const fn toggle(id: &'static str, name: &'static str, default: bool) -> Self {
        Self {
            id,
            name,
            min: 0.0,
            max: 1.0,
            default: if default { 1.0 } else { 0.0 },
            kind: ParamKind::Bool,
        }
    }

    pub const fn choice(
        id: &'static str,
        name: &'static str,
        options: &'static [&'static str],
        default: usize,
    ) -> Self {
        Self {
            id,
            name,
            min: 0.0,
            max: (options.len() - 1) as f32,
            default: default as f32,
            kind: ParamKind::Choice(options),
        }
    }

    /// Map any value into this parameter's domain
    ///
    /// NaN becomes the default; booleans snap at 0.5; choices round.
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.default;
        }
        match self.kind {
            ParamKind::Float => value.clamp(self.min, self.max),
            ParamKind::Bool => {
                if value >= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            ParamKind::Choice(_) => value.round().clamp(self.min, self.max),
        }
    }
}

pub const BYPASS: usize = 0;
pub const INPUT_TRIM_DB: usize = 1;
pub const OUTPUT_TRIM_DB: usize = 2;
pub const MIX: usize = 3;

/// Number of parameters every processor carries ahead of its own
pub const COMMON_COUNT: usize = 4;

/// Parameters shared by every processor, in index order
pub const COMMON_PARAMS: [ParamSpec; COMMON_COUNT] = [
    ParamSpec::toggle("bypass", "Bypass", false),
    ParamSpec::float("input_trim_db", "Input Trim", -24.0, 24.0, 0.0),
    ParamSpec::float("output_trim_db", "Output Trim", -24.0, 24.0, 0.0),
    ParamSpec::float("mix", "Mix", 0.0, 1.0, 1.0),
];

struct StoreInner {
    specs: Vec<ParamSpec>,
    values: Vec<AtomicU32>,
}

/// Shared, lock-free parameter values
///
/// Cloning yields another handle to the same values.
#[derive(Clone)]
pub struct ParamStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for ParamStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParamStore")
            .field("params", &self.inner.specs.len())
            .finish()
    }
}

impl ParamStore {
    /// Store holding `specs`, each initialised to its default
    pub fn new(specs: Vec<ParamSpec>) -> Self {
        let values = specs
            .iter()
            .map(|s| AtomicU32::new(s.default.to_bits()))
            .collect();
        Self {
            inner: Arc::new(StoreInner { specs, values }),
        }
    }

    /// Common parameters followed by an effect's own, with the effect's mix default
    pub fn for_effect(effect_params: &[ParamSpec], default_mix: f32) -> Self {
        let mut specs = Vec::with_capacity(COMMON_COUNT + effect_params.len());
        specs.extend_from_slice(&COMMON_PARAMS);
        specs[MIX].default = default_mix.clamp(0.0, 1.0);
        specs.extend_from_slice(effect_params);
        Self::new(specs)
    }

    pub fn len(&self) -> usize {
        self.inner.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.specs.is_empty()
    }

    pub fn specs(&self) -> &[ParamSpec] {
        &self.inner.specs
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.inner.specs.iter().position(|s| s.id == id)
    }

    /// Write a value by index; the value is clamped to the parameter's domain
    pub fn set(&self, index: usize, value: f32) -> Result<(), ParamError> {
        let spec = self
            .inner
            .specs
            .get(index)
            .ok_or(ParamError::IndexOutOfRange {
                index,
                len: self.len(),
            })?;
        if !value.is_finite() {
            return Err(ParamError::NonFinite { id: spec.id, value });
        }
        self.inner.values[index].store(spec.clamp(value).to_bits(), Ordering::Relaxed);
        Ok(())
    }

    pub fn set_by_id(&self, id: &str, value: f32) -> Result<(), ParamError> {
        let index = self
            .index_of(id)
            .ok_or_else(|| ParamError::UnknownId(id.to_string()))?;
        self.set(index, value)
    }

    /// Current raw value by index
    pub fn get(&self, index: usize) -> Option<f32> {
        self.inner
            .values
            .get(index)
            .map(|v| f32::from_bits(v.load(Ordering::Relaxed)))
    }

    pub fn get_by_id(&self, id: &str) -> Result<f32, ParamError> {
        self.index_of(id)
            .and_then(|i| self.get(i))
            .ok_or_else(|| ParamError::UnknownId(id.to_string()))
    }

    pub fn reset_to_defaults(&self) {
        for (spec, value) in self.inner.specs.iter().zip(self.inner.values.iter()) {
            value.store(spec.default.to_bits(), Ordering::Relaxed);
        }
    }
}

/// Snapshot of the common parameters for one block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommonParams {
    pub bypass: bool,
    pub input_trim_db: f32,
    pub output_trim_db: f32,
    pub mix: f32,
}

/// Audio-thread reader: one clamped snapshot per block
#[derive(Debug)]
pub struct ParameterGateway {
    store: ParamStore,
    snapshot: Vec<f32>,
}

impl ParameterGateway {
    pub fn new(store: ParamStore) -> Self {
        let snapshot = store.specs().iter().map(|s| s.default).collect();
        Self { store, snapshot }
    }

    pub fn store(&self) -> &ParamStore {
        &self.store
    }

    /// Read and clamp every value; no allocation
    pub fn refresh(&mut self) {
        let inner = &self.store.inner;
        for ((slot, spec), value) in self
            .snapshot
            .iter_mut()
            .zip(inner.specs.iter())
            .zip(inner.values.iter())
        {
            *slot = spec.clamp(f32::from_bits(value.load(Ordering::Relaxed)));
        }
    }

    pub fn common(&self) -> CommonParams {
        let value = |i: usize| self.snapshot.get(i).copied().unwrap_or(COMMON_PARAMS[i].default);
        CommonParams {
            bypass: value(BYPASS) >= 0.5,
            input_trim_db: value(INPUT_TRIM_DB),
            output_trim_db: value(OUTPUT_TRIM_DB),
            mix: value(MIX),
        }
    }

    /// Effect-specific values (indices start at 0 after the common block)
    pub fn effect_values(&self) -> ParamValues<'_> {
        ParamValues::new(self.snapshot.get(COMMON_COUNT..).unwrap_or(&[]))
    }

    /// Every value including the common block
    pub fn values(&self) -> ParamValues<'_> {
        ParamValues::new(&self.snapshot)
    }
}

/// Borrowed, already-clamped parameter values
#[derive(Debug, Clone, Copy)]
pub struct ParamValues<'a> {
    values: &'a [f32],
}

impl<'a> ParamValues<'a> {
    pub fn new(values: &'a [f32]) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `index`, 0.0 when absent
    #[inline]
    pub fn get(&self, index: usize) -> f32 {
        self.values.get(index).copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn flag(&self, index: usize) -> bool {
        self.get(index) >= 0.5
    }

    #[inline]
    pub fn choice(&self, index: usize) -> usize {
        let v = self.get(index);
        if v > 0.0 {
            v.round() as usize
        } else {
            0
        }
    }
}

/// Owned default values for a parameter list (construction and tests)
pub fn defaults(specs: &[ParamSpec]) -> Vec<f32> {
    specs.iter().map(|s| s.default).collect()
}

/// Change detector for the values that drive a coefficient recompute
#[derive(Debug, Clone, Copy)]
pub struct ParamWatch<const N: usize> {
    last: [f32; N],
    primed: bool,
}

impl<const N: usize> Default for ParamWatch<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ParamWatch<N> {
    pub fn new() -> Self {
        Self {
            last: [0.0; N],
            primed: false,
        }
    }

    /// True on the first call and whenever any value differs from the last call
    #[inline]
    pub fn changed(&mut self, current: [f32; N]) -> bool {
        if self.primed && current == self.last {
            return false;
        }
        self.last = current;
        self.primed = true;
        true
    }

    /// Force the next `changed` to report true
    pub fn invalidate(&mut self) {
        self.primed = false;
    }
}
