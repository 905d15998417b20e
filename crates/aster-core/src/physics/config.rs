// Copyright 2025 the Aster Engine contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration of the physics core.
//!
//! Configuration is passed in at initialization; the core never reads any
//! global or singleton state.

use serde::{Deserialize, Serialize};

/// Tunable parameters of the broad phase and the solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Starting capacity of the tree node pool and the component registry.
    pub initial_capacity: usize,
    /// Fat-bounds expansion as a fraction of each object's half-extent.
    pub aabb_extension: f32,
    /// Absolute fat-bounds padding added on top of the fractional expansion.
    pub min_margin: f32,
    /// Solver passes through all constraint groups per tick. Clamped into
    /// `[4, 10]`.
    pub solver_iterations: usize,
    /// Baumgarte position-error coefficient. Clamped into `[0.1, 0.3]`.
    pub baumgarte_bias: f32,
    /// Minimum penetration before the position bias kicks in.
    pub penetration_slop: f32,
    /// Default restitution applied to contacts.
    pub restitution: f32,
    /// Closing speed above which restitution applies; slower impacts are
    /// resolved as perfectly inelastic to avoid jitter.
    pub restitution_threshold: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 1024,
            aabb_extension: 0.1,
            min_margin: 0.01,
            solver_iterations: 6,
            baumgarte_bias: 0.2,
            penetration_slop: 0.01,
            restitution: 0.2,
            restitution_threshold: 1.0,
        }
    }
}

impl PhysicsConfig {
    /// Parses a configuration from a JSON document. Missing keys fall back
    /// to their defaults; values outside the documented ranges are clamped.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.validated())
    }

    /// Clamps out-of-range values into their documented ranges, logging each
    /// adjustment.
    pub fn validated(mut self) -> Self {
        if !(4..=10).contains(&self.solver_iterations) {
            let clamped = self.solver_iterations.clamp(4, 10);
            log::warn!(
                "solver_iterations {} outside [4, 10]; clamped to {clamped}",
                self.solver_iterations
            );
            self.solver_iterations = clamped;
        }
        if !(0.1..=0.3).contains(&self.baumgarte_bias) {
            let clamped = self.baumgarte_bias.clamp(0.1, 0.3);
            log::warn!(
                "baumgarte_bias {} outside [0.1, 0.3]; clamped to {clamped}",
                self.baumgarte_bias
            );
            self.baumgarte_bias = clamped;
        }
        self
    }
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documentation() {
        let config = PhysicsConfig::default();
        assert_eq!(config.initial_capacity, 1024);
        assert_eq!(config.aabb_extension, 0.1);
        assert_eq!(config.min_margin, 0.01);
        assert_eq!(config.solver_iterations, 6);
        assert_eq!(config.baumgarte_bias, 0.2);
    }

    #[test]
    fn json_overrides_individual_keys() {
        let config =
            PhysicsConfig::from_json_str(r#"{ "solver_iterations": 8, "min_margin": 0.05 }"#)
                .unwrap();
        assert_eq!(config.solver_iterations, 8);
        assert_eq!(config.min_margin, 0.05);
        // Untouched keys keep their defaults.
        assert_eq!(config.baumgarte_bias, 0.2);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config = PhysicsConfig {
            solver_iterations: 50,
            baumgarte_bias: 0.9,
            ..Default::default()
        }
        .validated();
        assert_eq!(config.solver_iterations, 10);
        assert_eq!(config.baumgarte_bias, 0.3);

        let config = PhysicsConfig::from_json_str(r#"{ "solver_iterations": 1 }"#).unwrap();
        assert_eq!(config.solver_iterations, 4);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(PhysicsConfig::from_json_str("not json").is_err());
    }
}
