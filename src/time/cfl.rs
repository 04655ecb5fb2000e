//! Adaptive timestep control from the advective CFL condition.
//!
//! The local advective frequency is
//! `|u_r| / Δr + (|u_φ| + |u_θ|) (Lmax + 1)`, where Δr is the finite-difference
//! gradient of the radial grid. Its global maximum sets the step
//! `safety / freq`. A hysteresis band keeps the step (and therefore the
//! cached factorisations) unchanged under small fluctuations. A non-finite
//! frequency means the flow has blown up and stops the controller.

use thiserror::Error;

use crate::basis::grid_component;
use crate::comm::{CommError, Communicator, nan_max};

/// Errors raised by [`AdaptiveTimestep::next`].
#[derive(Debug, Error)]
pub enum TimestepError {
    #[error(transparent)]
    Comm(#[from] CommError),
    #[error("advective frequency is {freq} at t={sim_time}, the solution has diverged")]
    NonFiniteFrequency { freq: f64, sim_time: f64 },
}

/// Controller settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CflConfig {
    /// Courant safety factor
    pub safety: f64,
    /// Upper bound on the step
    pub max_dt: f64,
    /// Step used while `sim_time < startup_window`
    pub init_dt: f64,
    /// Start-up window; 0 disables the cap
    pub startup_window: f64,
    /// Relative hysteresis band
    pub threshold: f64,
}

impl CflConfig {
    /// Settings with the default start-up window (0.002) and threshold (0.1).
    pub fn new(safety: f64, max_dt: f64, init_dt: f64) -> Self {
        Self {
            safety,
            max_dt,
            init_dt,
            startup_window: 0.002,
            threshold: 0.1,
        }
    }

    pub fn with_startup_window(mut self, window: f64) -> Self {
        self.startup_window = window;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }
}

/// Pick the next step from the global maximum frequency.
///
/// `freq` must be finite; [`AdaptiveTimestep::next`] rejects anything else
/// before calling this.
///
/// # Example
///
/// ```
/// use shellconv::time::{CflConfig, choose_dt};
///
/// let config = CflConfig::new(0.5, 1e-2, 1e-4);
/// // no flow: the step grows to max_dt once past the start-up window
/// assert_eq!(choose_dt(&config, 0.0, 1.0, 1e-3), 1e-2);
/// // within the 10% band the previous step is kept
/// assert_eq!(choose_dt(&config, 52.0, 1.0, 1e-2), 1e-2);
/// ```
pub fn choose_dt(config: &CflConfig, freq: f64, sim_time: f64, previous: f64) -> f64 {
    let mut dt = if freq == 0.0 {
        config.max_dt
    } else {
        config.safety / freq
    };
    dt = dt.min(config.max_dt);
    if sim_time < config.startup_window {
        dt = dt.min(config.init_dt);
    }
    let band = config.threshold * previous;
    if dt >= previous - band && dt <= previous + band {
        previous
    } else {
        dt
    }
}

/// Largest local advective frequency of a velocity grid in (φ, θ, r)
/// components. NaN values propagate.
pub fn local_frequency(velocity: &[f64], spacing: &[f64], lmax: usize) -> f64 {
    let nr = spacing.len();
    let n = velocity.len() / 3;
    let angular = (lmax + 1) as f64;
    let component = |c: usize| &velocity[c * n..(c + 1) * n];
    let (u_phi, u_theta, u_r) = (
        component(grid_component::PHI),
        component(grid_component::THETA),
        component(grid_component::R),
    );
    nan_max((0..n).map(|i| {
        u_r[i].abs() / spacing[i % nr] + (u_phi[i].abs() + u_theta[i].abs()) * angular
    }))
}

/// Stateful CFL controller.
#[derive(Clone, Debug)]
pub struct AdaptiveTimestep {
    config: CflConfig,
    spacing: Vec<f64>,
    lmax: usize,
}

impl AdaptiveTimestep {
    /// Controller for a local grid with radial spacing `spacing`.
    pub fn new(config: CflConfig, spacing: Vec<f64>, lmax: usize) -> Self {
        Self {
            config,
            spacing,
            lmax,
        }
    }

    pub fn config(&self) -> &CflConfig {
        &self.config
    }

    /// Next step given the local velocity grid. Collective.
    ///
    /// Every rank sees the same global frequency, so a NaN or infinite
    /// velocity on any rank fails the call on all of them.
    pub fn next(
        &self,
        comm: &dyn Communicator,
        velocity: &[f64],
        sim_time: f64,
        previous: f64,
    ) -> Result<f64, TimestepError> {
        let local = local_frequency(velocity, &self.spacing, self.lmax);
        let freq = comm.global_max(local)?;
        if !freq.is_finite() {
            return Err(TimestepError::NonFiniteFrequency { freq, sim_time });
        }
        let dt = choose_dt(&self.config, freq, sim_time, previous);
        if dt != previous {
            tracing::debug!(freq, dt, previous, "timestep changed");
        }
        Ok(dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SingleProcess;

    fn config() -> CflConfig {
        CflConfig::new(0.4, 1e-2, 1e-4)
    }

    #[test]
    fn test_zero_velocity_gives_max_dt() {
        assert_eq!(choose_dt(&config(), 0.0, 0.5, 1e-3), 1e-2);
    }

    #[test]
    fn test_startup_cap() {
        assert_eq!(choose_dt(&config(), 0.0, 0.001, 1e-2), 1e-4);
        assert_eq!(choose_dt(&config(), 0.0, 0.002, 1e-4), 1e-2);
        let no_window = config().with_startup_window(0.0);
        assert_eq!(choose_dt(&no_window, 0.0, 0.0, 1e-3), 1e-2);
    }

    #[test]
    fn test_hysteresis_band() {
        let c = config();
        // 0.4 / 45 ≈ 8.9e-3, within 10% of 9e-3
        assert_eq!(choose_dt(&c, 45.0, 1.0, 9e-3), 9e-3);
        // 0.4 / 100 = 4e-3 is outside
        assert_eq!(choose_dt(&c, 100.0, 1.0, 9e-3), 4e-3);
        let wide = c.with_threshold(0.6);
        assert_eq!(choose_dt(&wide, 100.0, 1.0, 9e-3), 9e-3);
    }

    #[test]
    fn test_non_finite_velocity_is_an_error() {
        let controller = AdaptiveTimestep::new(config(), vec![0.1], 3);
        for bad in [f64::NAN, f64::INFINITY] {
            let u = vec![0.0, bad, 1.0];
            match controller.next(&SingleProcess, &u, 0.5, 1e-3) {
                Err(TimestepError::NonFiniteFrequency { sim_time, .. }) => assert_eq!(sim_time, 0.5),
                other => panic!("expected divergence error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_local_frequency() {
        // two points, two radii each
        let spacing = vec![0.5, 0.25];
        let mut u = vec![0.0; 3 * 4];
        let n = 4;
        u[grid_component::R * n + 1] = 1.0; // 1 / 0.25 = 4
        u[grid_component::PHI * n + 2] = -0.5; // 0.5 · 4 = 2
        u[grid_component::THETA * n + 2] = 0.25; // 0.25 · 4 = 1
        assert_eq!(local_frequency(&u, &spacing, 3), 4.0);
        u[grid_component::THETA * n + 3] = f64::NAN;
        assert!(local_frequency(&u, &spacing, 3).is_nan());
    }

    #[test]
    fn test_controller_uses_global_max() {
        let controller = AdaptiveTimestep::new(config(), vec![0.1], 3);
        let u = vec![0.0, 0.0, 2.0];
        // freq = 2 / 0.1 = 20, dt = 0.02 clipped to 0.01
        let dt = controller.next(&SingleProcess, &u, 1.0, 1e-3).unwrap();
        assert_eq!(dt, 1e-2);
    }
}
