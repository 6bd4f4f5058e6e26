use super::demand::{DemandFrequency, OriginNode};
use crate::sim::{Simulator, Stream};
use rand::Rng;
use rand_distr::{Distribution, Exp1, LogNormal, Triangular, Uniform};
use std::f64::consts::LN_2;
use std::rc::Rc;

/// Seconds per hour; demand is in veh/h, times in s.
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Demand below this, in veh/s, is treated as constant within a slice.
const FLAT_SLOPE: f64 = 1e-12;

/// The distribution of the number of arrivals between two GTUs, all with mean 1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HeadwayDistribution {
    /// Exactly one arrival, for deterministic headways.
    Constant,
    /// Exponentially distributed, for Poisson arrivals.
    #[default]
    Exponential,
    /// Uniform on [0, 2].
    Uniform,
    /// Triangular on [0, 2] with mode 1.
    Triangular,
    /// Log-normal with variance 1.
    LogNormal,
}

impl HeadwayDistribution {
    pub fn name(self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Exponential => "exponential",
            Self::Uniform => "uniform",
            Self::Triangular => "triangular",
            Self::LogNormal => "log-normal",
        }
    }

    /// Draws a number of arrivals.
    pub fn draw(self, rng: &mut impl Rng) -> f64 {
        match self {
            Self::Constant => 1.0,
            Self::Exponential => Exp1.sample(rng),
            Self::Uniform => Uniform::new(0.0, 2.0).sample(rng),
            Self::Triangular => Triangular::new(0.0, 2.0, 1.0).map_or(1.0, |d| d.sample(rng)),
            Self::LogNormal => LogNormal::new(-0.5 * LN_2, LN_2.sqrt()).map_or(1.0, |d| d.sample(rng)),
        }
    }
}

/// Generates headways from the demand of a demand tree, which may change over time.
///
/// Each headway spans a number of arrivals drawn from the headway distribution. The demand
/// is integrated from the current simulation time until that number of arrivals is reached,
/// assuming demand varies linearly within each time slice.
pub struct ArrivalsHeadwayGenerator {
    root: Rc<OriginNode>,
    simulator: Rc<dyn Simulator>,
    stream: Stream,
    distribution: HeadwayDistribution,
}

impl ArrivalsHeadwayGenerator {
    pub fn new(
        root: Rc<OriginNode>,
        simulator: Rc<dyn Simulator>,
        stream: Stream,
        distribution: HeadwayDistribution,
    ) -> Self {
        Self {
            root,
            simulator,
            stream,
            distribution,
        }
    }

    pub fn distribution(&self) -> HeadwayDistribution {
        self.distribution
    }

    /// The time in s until the next GTU, from the current simulation time. Returns `None`
    /// when the remaining demand is too low to generate another GTU.
    pub fn next_headway(&self) -> Option<f64> {
        let now = self.simulator.time();
        let mut remaining = self.distribution.draw(&mut *self.stream.borrow_mut());
        let mut t0 = now;
        loop {
            let t1 = self.root.next_time_slice(t0)?;
            let f0 = self.root.frequency(t0, true) / SECONDS_PER_HOUR;
            let f1 = self.root.frequency(t1, false) / SECONDS_PER_HOUR;
            let arrivals = 0.5 * (f0 + f1) * (t1 - t0);
            if arrivals >= remaining && arrivals > 0.0 {
                let slope = (f1 - f0) / (t1 - t0);
                let dt = if slope.abs() < FLAT_SLOPE && f0 > 0.0 {
                    remaining / f0
                } else {
                    (-f0 + (f0 * f0 + 2.0 * slope * remaining).max(0.0).sqrt()) / slope
                };
                return Some(t0 + dt - now);
            }
            remaining -= arrivals;
            t0 = t1;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn distributions_have_mean_one() {
        let mut rng = StdRng::seed_from_u64(42);
        for dist in [
            HeadwayDistribution::Constant,
            HeadwayDistribution::Exponential,
            HeadwayDistribution::Uniform,
            HeadwayDistribution::Triangular,
            HeadwayDistribution::LogNormal,
        ] {
            let n = 50_000;
            let mean = (0..n).map(|_| dist.draw(&mut rng)).sum::<f64>() / n as f64;
            assert!((mean - 1.0).abs() < 0.03, "{} mean {}", dist.name(), mean);
        }
    }
}
