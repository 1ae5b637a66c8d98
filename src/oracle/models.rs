//! Bundled duration oracles.
//!
//! | Oracle | Duration |
//! |--------|----------|
//! | `TemplateOracle` | template duration |
//! | `ScaledOracle` | template × fixed factor |
//! | `ToolChangeOracle` | template × deviation sampled by tool-change state |
//! | `NoisyOracle` | inner oracle × log-normal noise |
//! | `FnOracle` | any closure |
//!
//! Stochastic oracles draw from a seeded generator, so a fixed seed
//! reproduces a run exactly. Their distributions are built once, at
//! construction, and rejected there if malformed.

use rand::distr::weighted::WeightedIndex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, LogNormal};
use serde_json::json;
use std::fmt;

use super::{DurationOracle, Inference};
use crate::config::RunConfig;
use crate::error::{ShopError, ShopResult};
use crate::models::{Operation, ToolId};

/// Returns the template duration unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateOracle;

impl DurationOracle for TemplateOracle {
    fn name(&self) -> &'static str {
        "template"
    }

    fn infer(&mut self, operation: &Operation, current_tool: Option<ToolId>) -> Inference {
        Inference::new(
            operation.base_duration,
            json!({
                "base_duration": operation.base_duration,
                "current_tool": current_tool,
            }),
        )
    }
}

/// Scales the template duration by a fixed factor, e.g. a mean observed
/// delay ratio.
#[derive(Debug, Clone, Copy)]
pub struct ScaledOracle {
    factor: f64,
}

impl ScaledOracle {
    /// Creates an oracle with the given factor.
    pub fn new(factor: f64) -> Self {
        Self { factor }
    }

    /// Builds the factor as the mean of observed `actual / planned` ratios.
    ///
    /// Returns `None` without observations.
    pub fn from_ratios(ratios: &[f64]) -> Option<Self> {
        if ratios.is_empty() {
            return None;
        }
        Some(Self::new(ratios.iter().sum::<f64>() / ratios.len() as f64))
    }

    /// The scale factor.
    pub fn factor(&self) -> f64 {
        self.factor
    }
}

impl DurationOracle for ScaledOracle {
    fn name(&self) -> &'static str {
        "scaled"
    }

    fn infer(&mut self, operation: &Operation, _current_tool: Option<ToolId>) -> Inference {
        Inference::new(
            operation.base_duration * self.factor,
            json!({ "factor": self.factor }),
        )
    }
}

/// Relative deviations the tool-change model can draw.
const DEVIATIONS: [f64; 3] = [0.9, 1.0, 1.2];
/// P(deviation) when the required tool is already mounted.
const P_SAME_TOOL: [f64; 3] = [0.1, 0.7, 0.2];
/// P(deviation) when a tool change is needed.
const P_TOOL_CHANGE: [f64; 3] = [0.3, 0.5, 0.2];

/// Draws a relative processing-time deviation conditioned on whether the
/// candidate machine must change tools first.
#[derive(Debug, Clone)]
pub struct ToolChangeOracle {
    same_tool: WeightedIndex<f64>,
    tool_change: WeightedIndex<f64>,
    rng: StdRng,
}

impl ToolChangeOracle {
    /// Creates an oracle seeded with `seed`.
    ///
    /// # Errors
    /// [`ShopError::InvalidDistribution`] if the deviation weights are rejected.
    pub fn new(seed: u64) -> ShopResult<Self> {
        Ok(Self {
            same_tool: weighted(&P_SAME_TOOL)?,
            tool_change: weighted(&P_TOOL_CHANGE)?,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Creates an oracle seeded from the run configuration.
    pub fn from_config(config: &RunConfig) -> ShopResult<Self> {
        Self::new(config.seed)
    }
}

fn weighted(weights: &[f64]) -> ShopResult<WeightedIndex<f64>> {
    WeightedIndex::new(weights).map_err(|e| ShopError::InvalidDistribution(e.to_string()))
}

impl DurationOracle for ToolChangeOracle {
    fn name(&self) -> &'static str {
        "tool-change"
    }

    fn infer(&mut self, operation: &Operation, current_tool: Option<ToolId>) -> Inference {
        let last_tool_change = current_tool != Some(operation.tool);
        let index = if last_tool_change {
            self.tool_change.sample(&mut self.rng)
        } else {
            self.same_tool.sample(&mut self.rng)
        };
        let deviation = DEVIATIONS[index];
        Inference::new(
            operation.base_duration * deviation,
            json!({
                "last_tool_change": last_tool_change,
                "relative_processing_time_deviation": deviation,
            }),
        )
    }
}

/// Default log-normal shape for [`NoisyOracle`].
pub const DEFAULT_NOISE_SIGMA: f64 = 0.08;

/// Multiplies another oracle's duration by a log-normal factor with
/// `mu = 0` and shape `sigma`.
#[derive(Debug, Clone)]
pub struct NoisyOracle<O> {
    inner: O,
    noise: LogNormal<f64>,
    rng: StdRng,
}

impl<O: DurationOracle> NoisyOracle<O> {
    /// Wraps `inner` with noise of shape `sigma`, seeded with `seed`.
    ///
    /// # Errors
    /// [`ShopError::InvalidDistribution`] if `sigma` is negative or not finite.
    pub fn new(inner: O, sigma: f64, seed: u64) -> ShopResult<Self> {
        let noise = LogNormal::new(0.0, sigma)
            .map_err(|e| ShopError::InvalidDistribution(format!("sigma {sigma}: {e}")))?;
        Ok(Self {
            inner,
            noise,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Wraps `inner` with the default shape and the configured seed.
    pub fn from_config(inner: O, config: &RunConfig) -> ShopResult<Self> {
        Self::new(inner, DEFAULT_NOISE_SIGMA, config.seed)
    }
}

impl<O: DurationOracle> DurationOracle for NoisyOracle<O> {
    fn name(&self) -> &'static str {
        "noisy"
    }

    fn infer(&mut self, operation: &Operation, current_tool: Option<ToolId>) -> Inference {
        let inner = self.inner.infer(operation, current_tool);
        let factor = self.noise.sample(&mut self.rng);
        Inference {
            duration: inner.duration.map(|d| d * factor),
            observation: json!({
                "noise_factor": factor,
                "inner": inner.observation,
            }),
        }
    }
}

/// Adapts a closure into an oracle.
pub struct FnOracle<F> {
    name: &'static str,
    f: F,
}

impl<F> FnOracle<F>
where
    F: FnMut(&Operation, Option<ToolId>) -> Inference,
{
    /// Creates a named closure oracle.
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<F> fmt::Debug for FnOracle<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnOracle").field("name", &self.name).finish()
    }
}

impl<F> DurationOracle for FnOracle<F>
where
    F: FnMut(&Operation, Option<ToolId>) -> Inference,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn infer(&mut self, operation: &Operation, current_tool: Option<ToolId>) -> Inference {
        (self.f)(operation, current_tool)
    }
}
