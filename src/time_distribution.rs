use chemotaxis_common::TimeDistributionConfig;
use rand::Rng;
use rand_distr::{Distribution, Exp};

use crate::error::{Result, SimError};

/// Simulation time.
pub type Time = f64;

/// Memoryless firing times: delays are exponential with mean `1 / (rate * propensity)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialTime {
    rate: f64,
    next: Time,
    /// `rate * propensity` the pending firing time was drawn with.
    lambda: f64,
}

impl ExponentialTime {
    pub fn new(rate: f64) -> Result<Self> {
        check_rate(rate)?;
        Ok(Self {
            rate,
            next: Time::INFINITY,
            lambda: 0.0,
        })
    }

    fn update<R: Rng + ?Sized>(&mut self, now: Time, executed: bool, propensity: f64, rng: &mut R) -> Result<()> {
        let lambda = self.rate * propensity;
        if !(lambda > 0.0) {
            self.next = Time::INFINITY;
            self.lambda = 0.0;
            return Ok(());
        }
        if executed || !self.next.is_finite() || self.lambda == 0.0 {
            let exp = Exp::new(lambda).map_err(|e| SimError::invalid(format!("exponential rate {}: {}", lambda, e)))?;
            self.next = now + exp.sample(rng);
        } else if lambda != self.lambda {
            // Rescale the pending delay instead of drawing again.
            self.next = now + (self.next - now) * self.lambda / lambda;
        }
        self.lambda = lambda;
        Ok(())
    }
}

/// Fires at a fixed period `1 / rate` while the propensity is positive.
#[derive(Debug, Clone, PartialEq)]
pub struct DiracComb {
    period: f64,
    next: Time,
}

impl DiracComb {
    pub fn new(rate: f64) -> Result<Self> {
        check_rate(rate)?;
        Ok(Self {
            period: 1.0 / rate,
            next: Time::INFINITY,
        })
    }

    fn update(&mut self, now: Time, executed: bool, propensity: f64) {
        if !(propensity > 0.0) {
            self.next = Time::INFINITY;
        } else if executed || !self.next.is_finite() {
            self.next = now + self.period;
        }
    }
}

fn check_rate(rate: f64) -> Result<()> {
    if rate > 0.0 && rate.is_finite() {
        Ok(())
    } else {
        Err(SimError::invalid(format!("rate must be positive and finite, got {}", rate)))
    }
}

/// Produces the next firing time of a reaction.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeDistribution {
    Exponential(ExponentialTime),
    DiracComb(DiracComb),
}

impl TimeDistribution {
    pub fn exponential(rate: f64) -> Result<Self> {
        ExponentialTime::new(rate).map(TimeDistribution::Exponential)
    }

    pub fn dirac_comb(rate: f64) -> Result<Self> {
        DiracComb::new(rate).map(TimeDistribution::DiracComb)
    }

    pub fn from_config(config: &TimeDistributionConfig) -> Result<Self> {
        match *config {
            TimeDistributionConfig::Exponential { rate } => Self::exponential(rate),
            TimeDistributionConfig::DiracComb { rate } => Self::dirac_comb(rate),
        }
    }

    pub fn rate(&self) -> f64 {
        match self {
            TimeDistribution::Exponential(t) => t.rate,
            TimeDistribution::DiracComb(t) => 1.0 / t.period,
        }
    }

    /// Absolute time of the next firing; `+inf` when the reaction cannot fire.
    pub fn next_occurrence(&self) -> Time {
        match self {
            TimeDistribution::Exponential(t) => t.next,
            TimeDistribution::DiracComb(t) => t.next,
        }
    }

    /// Resamples after the reaction fired at `now` (`executed`) or after its propensity changed.
    pub fn update<R: Rng + ?Sized>(&mut self, now: Time, executed: bool, propensity: f64, rng: &mut R) -> Result<()> {
        match self {
            TimeDistribution::Exponential(t) => t.update(now, executed, propensity, rng),
            TimeDistribution::DiracComb(t) => {
                t.update(now, executed, propensity);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn exponential_mean_matches_rate() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut td = TimeDistribution::exponential(2.0).unwrap();
        let mut total = 0.0;
        let samples = 20_000;
        for _ in 0..samples {
            td.update(0.0, true, 1.0, &mut rng).unwrap();
            total += td.next_occurrence();
        }
        let mean = total / samples as f64;
        assert!((mean - 0.5).abs() < 0.02, "mean = {}", mean);
    }

    #[test]
    fn zero_propensity_never_fires() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut td = TimeDistribution::exponential(1.0).unwrap();
        td.update(3.0, false, 0.0, &mut rng).unwrap();
        assert_eq!(td.next_occurrence(), Time::INFINITY);
        td.update(3.0, false, 2.0, &mut rng).unwrap();
        assert!(td.next_occurrence() > 3.0 && td.next_occurrence().is_finite());
    }

    #[test]
    fn propensity_change_rescales_pending_delay() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut td = TimeDistribution::exponential(1.0).unwrap();
        td.update(0.0, true, 1.0, &mut rng).unwrap();
        let first = td.next_occurrence();
        td.update(0.0, false, 2.0, &mut rng).unwrap();
        assert!((td.next_occurrence() - first / 2.0).abs() < 1e-12);
    }

    #[test]
    fn same_seed_same_times() {
        let draw = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut td = TimeDistribution::exponential(1.0).unwrap();
            (0..5)
                .map(|i| {
                    td.update(i as f64, true, 1.0, &mut rng).unwrap();
                    td.next_occurrence()
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(9), draw(9));
    }

    #[test]
    fn dirac_comb_is_periodic() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut td = TimeDistribution::dirac_comb(4.0).unwrap();
        td.update(0.0, false, 1.0, &mut rng).unwrap();
        assert_eq!(td.next_occurrence(), 0.25);
        td.update(0.25, true, 1.0, &mut rng).unwrap();
        assert_eq!(td.next_occurrence(), 0.5);
        assert_eq!(td.rate(), 4.0);
    }

    #[test]
    fn invalid_rates_are_rejected() {
        assert!(TimeDistribution::exponential(0.0).is_err());
        assert!(TimeDistribution::dirac_comb(f64::INFINITY).is_err());
    }
}
