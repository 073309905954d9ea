//! # PID with Deadband and Convergence Window
//!
//! A proportional-integral-derivative controller driven by wall-clock
//! timestamps, with a ring buffer of recent errors whose mean is tested
//! against the deadband to assert convergence.
//!
//! The integral term accumulates `dE · dt` (change-in-error times dt),
//! matching the drone firmware's host-side reference behavior.

use std::collections::VecDeque;
use std::time::Instant;

use crate::error::{Result, TelloPilotError};

/// Default capacity of the convergence ring buffer
pub const DEFAULT_CONVERGENCE_WINDOW: usize = 5;

/// Proportional, integral and derivative gains; all must be non-negative
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gains {
    pub p: f32,
    pub i: f32,
    pub d: f32,
}

impl Gains {
    /// Purely proportional gains
    pub fn proportional(p: f32) -> Self {
        Self { p, i: 0.0, d: 0.0 }
    }

    fn validate(&self) -> Result<()> {
        if self.p < 0.0 || self.i < 0.0 || self.d < 0.0 {
            return Err(TelloPilotError::InvalidGains(format!(
                "gains must be non-negative, got p={} i={} d={}",
                self.p, self.i, self.d
            )));
        }
        Ok(())
    }
}

/// Single-axis PID controller
#[derive(Debug)]
pub struct Pid {
    gains: Gains,
    deadband: f32,
    window: usize,

    errors: VecDeque<f32>,
    last_error: Option<f32>,
    last_d_error: f32,
    integral_error: f32,
    last_time: Option<Instant>,
    converged: bool,
}

impl Pid {
    /// Create a controller with the default convergence window
    ///
    /// # Errors
    ///
    /// Returns `InvalidGains` if any gain or the deadband is negative.
    pub fn new(gains: Gains, deadband: f32) -> Result<Self> {
        Self::with_window(gains, deadband, DEFAULT_CONVERGENCE_WINDOW)
    }

    /// Create a controller with an explicit convergence window
    ///
    /// # Errors
    ///
    /// Returns `InvalidGains` if any gain or the deadband is negative, or
    /// the window is zero.
    pub fn with_window(gains: Gains, deadband: f32, window: usize) -> Result<Self> {
        gains.validate()?;
        if deadband < 0.0 {
            return Err(TelloPilotError::InvalidGains(format!(
                "deadband must be non-negative, got {}",
                deadband
            )));
        }
        if window == 0 {
            return Err(TelloPilotError::InvalidGains(
                "convergence window must hold at least one sample".to_string(),
            ));
        }

        Ok(Self {
            gains,
            deadband,
            window,
            errors: VecDeque::with_capacity(window),
            last_error: None,
            last_d_error: 0.0,
            integral_error: 0.0,
            last_time: None,
            converged: false,
        })
    }

    /// Replace the gains; resets the controller state
    ///
    /// # Errors
    ///
    /// Returns `InvalidGains` on a negative gain; the controller is left
    /// untouched.
    pub fn set_gains(&mut self, gains: Gains) -> Result<()> {
        gains.validate()?;
        self.gains = gains;
        self.reset();
        Ok(())
    }

    /// Replace the deadband; resets the controller state
    ///
    /// # Errors
    ///
    /// Returns `InvalidGains` on a negative deadband; the controller is
    /// left untouched.
    pub fn set_deadband(&mut self, deadband: f32) -> Result<()> {
        if deadband < 0.0 {
            return Err(TelloPilotError::InvalidGains(format!(
                "deadband must be non-negative, got {}",
                deadband
            )));
        }
        self.deadband = deadband;
        self.reset();
        Ok(())
    }

    pub fn gains(&self) -> Gains {
        self.gains
    }

    pub fn deadband(&self) -> f32 {
        self.deadband
    }

    /// Run one controller step against the wall clock
    pub fn update(&mut self, setpoint: f32, measured: f32) -> f32 {
        self.update_at(setpoint, measured, Instant::now())
    }

    /// Run one controller step with an explicit timestamp
    pub fn update_at(&mut self, setpoint: f32, measured: f32, now: Instant) -> f32 {
        let error = setpoint - measured;

        if self.errors.len() == self.window {
            self.errors.pop_front();
        }
        self.errors.push_back(error);
        if self.errors.len() == self.window {
            let mean: f32 = self.errors.iter().sum::<f32>() / self.window as f32;
            self.converged = mean.abs() <= self.deadband;
        }

        let d_error = match self.last_error {
            Some(last) => error - last,
            None => 0.0,
        };

        let p = self.gains.p * error;
        let (i, d) = match self.last_time {
            Some(last_time) => {
                let dt = now.duration_since(last_time).as_secs_f32();
                self.integral_error += d_error * dt;
                let i = self.gains.i * self.integral_error;
                let d = if dt > 0.0 {
                    self.gains.d * d_error / dt
                } else {
                    0.0
                };
                (i, d)
            }
            None => (0.0, 0.0),
        };

        self.last_error = Some(error);
        self.last_d_error = d_error;
        self.last_time = Some(now);

        p + i + d
    }

    /// True once the mean of the last full window of errors is within the
    /// deadband
    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn last_error(&self) -> Option<f32> {
        self.last_error
    }

    pub fn last_d_error(&self) -> f32 {
        self.last_d_error
    }

    pub fn integral_error(&self) -> f32 {
        self.integral_error
    }

    /// Clear all accumulated state; gains, deadband and window survive
    pub fn reset(&mut self) {
        self.errors.clear();
        self.last_error = None;
        self.last_d_error = 0.0;
        self.integral_error = 0.0;
        self.last_time = None;
        self.converged = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn pid(p: f32, i: f32, d: f32, deadband: f32) -> Pid {
        Pid::new(Gains { p, i, d }, deadband).unwrap()
    }

    #[test]
    fn test_rejects_negative_gains() {
        assert!(Pid::new(Gains { p: -0.1, i: 0.0, d: 0.0 }, 0.0).is_err());
        assert!(Pid::new(Gains { p: 0.0, i: -1.0, d: 0.0 }, 0.0).is_err());
        assert!(Pid::new(Gains { p: 0.0, i: 0.0, d: -0.5 }, 0.0).is_err());
        assert!(Pid::new(Gains::proportional(1.0), -0.01).is_err());
        assert!(Pid::with_window(Gains::proportional(1.0), 0.0, 0).is_err());
    }

    #[test]
    fn test_set_gains_rejects_and_preserves() {
        let mut pid = pid(1.0, 0.0, 0.0, 0.0);
        pid.update(1.0, 0.0);

        assert!(pid.set_gains(Gains { p: -1.0, i: 0.0, d: 0.0 }).is_err());
        assert_eq!(pid.gains().p, 1.0);
        // The failed setter did not reset state
        assert_eq!(pid.last_error(), Some(1.0));
    }

    #[test]
    fn test_set_gains_resets_state() {
        let mut pid = pid(1.0, 0.5, 0.0, 0.0);
        let t0 = Instant::now();
        pid.update_at(1.0, 0.0, t0);
        pid.update_at(1.0, 0.5, t0 + Duration::from_millis(100));

        pid.set_gains(Gains::proportional(2.0)).unwrap();
        assert_eq!(pid.last_error(), None);
        assert_eq!(pid.integral_error(), 0.0);
        assert!(!pid.converged());
    }

    #[test]
    fn test_first_update_is_pure_proportional() {
        let mut pid = pid(2.0, 1.0, 1.0, 0.0);
        let out = pid.update_at(1.0, 0.25, Instant::now());
        assert!((out - 1.5).abs() < 1e-6);
        assert_eq!(pid.last_d_error(), 0.0);
        assert_eq!(pid.integral_error(), 0.0);
    }

    #[test]
    fn test_integral_accumulates_error_delta() {
        let mut pid = pid(0.0, 1.0, 0.0, 0.0);
        let t0 = Instant::now();

        pid.update_at(1.0, 0.0, t0); // e = 1.0
        pid.update_at(1.0, 0.6, t0 + Duration::from_secs(1)); // e = 0.4, dE = -0.6

        // integral = dE * dt = -0.6 * 1.0
        assert!((pid.integral_error() + 0.6).abs() < 1e-6);

        pid.update_at(1.0, 0.8, t0 + Duration::from_secs(2)); // e = 0.2, dE = -0.2
        assert!((pid.integral_error() + 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_derivative_term() {
        let mut pid = pid(0.0, 0.0, 2.0, 0.0);
        let t0 = Instant::now();

        pid.update_at(1.0, 0.0, t0);
        let out = pid.update_at(1.0, 0.5, t0 + Duration::from_millis(500));

        // dE = -0.5 over dt = 0.5 s, d = 2.0 * -0.5 / 0.5
        assert!((out + 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_convergence_within_window() {
        let mut pid = pid(1.0, 0.0, 0.0, 0.05);
        let t0 = Instant::now();

        let measurements = [0.0, 0.2, 0.5, 0.9, 0.99, 1.0, 1.0, 1.0, 1.0, 1.0];
        let mut converged_at = None;
        for (k, m) in measurements.iter().enumerate() {
            pid.update_at(1.0, *m, t0 + Duration::from_millis(50 * k as u64));
            if pid.converged() && converged_at.is_none() {
                converged_at = Some(k);
            }
        }

        // The last five samples have errors {0.01, 0, 0, 0, 0}
        let converged_at = converged_at.expect("never converged");
        assert!(converged_at <= 8, "converged only at sample {}", converged_at);
    }

    #[test]
    fn test_not_converged_before_window_full() {
        let mut pid = pid(1.0, 0.0, 0.0, 10.0);
        let t0 = Instant::now();

        for k in 0..DEFAULT_CONVERGENCE_WINDOW - 1 {
            pid.update_at(0.0, 0.0, t0 + Duration::from_millis(k as u64));
            assert!(!pid.converged(), "converged with only {} samples", k + 1);
        }

        pid.update_at(0.0, 0.0, t0 + Duration::from_millis(50));
        assert!(pid.converged());
    }

    #[test]
    fn test_reset_clears_convergence() {
        let mut pid = pid(1.0, 0.0, 0.0, 1.0);
        let t0 = Instant::now();
        for k in 0..DEFAULT_CONVERGENCE_WINDOW {
            pid.update_at(0.0, 0.0, t0 + Duration::from_millis(k as u64));
        }
        assert!(pid.converged());

        pid.reset();
        assert!(!pid.converged());
        assert_eq!(pid.last_error(), None);
        assert_eq!(pid.gains().p, 1.0);
    }
}
