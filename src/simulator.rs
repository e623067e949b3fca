//! Synthetic sensor source
//!
//! `Simulator` produces a mean-reverting random walk and `ArrivalClock`
//! produces Poisson inter-arrival delays. Each owns its own seeded RNG, so
//! identical seeds replay identical sequences.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Bounded random walk around `mean`
///
/// `mean` and `standard_deviation` act as soft attractors, not clamps: the
/// walk can wander past `mean ± standard_deviation`, it just becomes less
/// likely to keep going the further it strays.
#[derive(Debug, Clone)]
pub struct Simulator {
    rng: StdRng,
    mean: f64,
    standard_deviation: f64,
    step_size_factor: f64,
    value: f64,
}

impl Simulator {
    pub fn new(seed: u64, mean: f64, standard_deviation: f64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let standard_deviation = standard_deviation.abs();
        let value = mean - rng.gen::<f64>();

        Self {
            rng,
            mean,
            standard_deviation,
            step_size_factor: standard_deviation / 10.0,
            value,
        }
    }

    /// Advance the walk one step and return the new value
    pub fn calculate_next_value(&mut self) -> f64 {
        let value_change = self.rng.gen::<f64>() * self.step_size_factor;
        let direction = self.decide_direction();
        self.value += value_change * direction;
        self.value
    }

    pub fn next_value(&mut self) -> f64 {
        self.calculate_next_value()
    }

    pub fn current_value(&self) -> f64 {
        self.value
    }

    /// +1.0 or -1.0, biased back toward the mean
    ///
    /// `chance` shrinks with distance and may go negative, in which case the
    /// walk always turns back.
    fn decide_direction(&mut self) -> f64 {
        let above = self.value > self.mean;
        let distance = (self.value - self.mean).abs();

        let chance = (self.standard_deviation / 2.0) - (distance / 50.0);
        let draw = self.rng.gen::<f64>() * self.standard_deviation;
        let keep_going = draw < chance;

        match (above, keep_going) {
            (true, true) | (false, false) => 1.0,
            (true, false) | (false, true) => -1.0,
        }
    }
}

impl Iterator for Simulator {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        Some(self.calculate_next_value())
    }
}

/// Exponential inter-arrival draws for a Poisson process
#[derive(Debug, Clone)]
pub struct ArrivalClock {
    rng: StdRng,
}

impl ArrivalClock {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seconds until the next event at `rate` events per second
    ///
    /// Draws that would put `ln` at or below zero are redrawn. A non-finite
    /// or negative rate is treated as zero, which yields `f64::INFINITY`;
    /// callers cap the delay.
    pub fn next_time_interval(&mut self, rate: f64) -> f64 {
        let rate = if rate.is_finite() { rate.max(0.0) } else { 0.0 };
        if rate == 0.0 {
            return f64::INFINITY;
        }

        loop {
            let remaining = 1.0 - self.rng.gen::<f64>();
            if remaining > 0.0 {
                return -remaining.ln() / rate;
            }
        }
    }
}
