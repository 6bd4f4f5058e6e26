use super::demand::DemandFrequency;
use crate::error::{TrafficError, TrafficResult};

/// Seconds per hour; demand is in veh/h, times in s.
const SECONDS_PER_HOUR: f64 = 3600.0;

/// How demand changes between the times of a time vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    /// Demand is constant until the next time.
    #[default]
    Stepwise,
    /// Demand changes linearly towards the next time.
    Linear,
}

impl Interpolation {
    pub fn is_stepwise(self) -> bool {
        self == Self::Stepwise
    }

    pub fn is_linear(self) -> bool {
        self == Self::Linear
    }

    /// Interpolates the demand at `time` within the slice `[t0, t1]`.
    pub fn interpolate(self, f0: f64, t0: f64, f1: f64, t1: f64, time: f64) -> f64 {
        match self {
            Self::Stepwise => f0,
            Self::Linear => f0 + (f1 - f0) * (time - t0) / (t1 - t0),
        }
    }

    /// The number of trips in the slice `[t0, t1]`, not rounded.
    ///
    /// # Parameters
    /// * `f0` - The demand at the start of the slice, in veh/h.
    /// * `t0` - The start of the slice, in s.
    /// * `f1` - The demand at the end of the slice, in veh/h.
    /// * `t1` - The end of the slice, in s.
    pub fn integrate(self, f0: f64, t0: f64, f1: f64, t1: f64) -> f64 {
        let hours = (t1 - t0) / SECONDS_PER_HOUR;
        match self {
            Self::Stepwise => f0 * hours,
            Self::Linear => 0.5 * (f0 + f1) * hours,
        }
    }
}

/// Evaluates a demand vector at `time`.
///
/// With `slice_start`, demand is zero strictly outside the first and last time, and at a
/// time in the vector it is the demand stored for that time. Without it, the slice that
/// ends at `time` applies: for stepwise demand at a time in the vector this is the demand
/// of the previous time, and at the first time, where no slice ends, it is zero.
pub fn interpolate_vector(
    time: f64,
    times: &[f64],
    demand: &[f64],
    interpolation: Interpolation,
    slice_start: bool,
) -> f64 {
    let n = times.len();
    if n < 2 || demand.len() != n || time < times[0] || time > times[n - 1] {
        return 0.0;
    }
    if !slice_start && time == times[0] {
        return 0.0;
    }
    if slice_start && time == times[n - 1] {
        return demand[n - 1];
    }
    let mut i = 0;
    while i + 2 < n && (times[i + 1] < time || (slice_start && times[i + 1] == time)) {
        i += 1;
    }
    interpolation.interpolate(demand[i], times[i], demand[i + 1], times[i + 1], time)
}

/// Checks that a time vector and demand vector describe valid demand.
pub(crate) fn check_demand(times: &[f64], demand: &[f64]) -> TrafficResult<()> {
    if demand.len() != times.len() || demand.len() < 2 {
        return Err(TrafficError::Demand(format!(
            "demand data has {} values and time data has {}, needs equal lengths of at least 2",
            demand.len(),
            times.len()
        )));
    }
    if demand.iter().any(|q| !(*q >= 0.0) || !q.is_finite()) {
        return Err(TrafficError::Demand("demand contains negative values".into()));
    }
    check_times(times)
}

/// Checks that times are non-negative and strictly increasing.
pub(crate) fn check_times(times: &[f64]) -> TrafficResult<()> {
    if times.iter().any(|t| !(*t >= 0.0)) {
        return Err(TrafficError::Demand("time vector contains negative values".into()));
    }
    if times.windows(2).any(|w| !(w[0] < w[1])) {
        return Err(TrafficError::Demand(
            "time vector is not strictly increasing".into(),
        ));
    }
    Ok(())
}

/// Time-varying demand: a demand value in veh/h at each time of a time vector.
#[derive(Clone, Debug, PartialEq)]
pub struct DemandPattern {
    demand: Vec<f64>,
    times: Vec<f64>,
    interpolation: Interpolation,
}

impl DemandPattern {
    pub fn new(demand: Vec<f64>, times: Vec<f64>, interpolation: Interpolation) -> TrafficResult<Self> {
        check_demand(&times, &demand)?;
        Ok(Self {
            demand,
            times,
            interpolation,
        })
    }

    /// The demand at each time, in veh/h.
    pub fn demand(&self) -> &[f64] {
        &self.demand
    }

    /// The times, in s.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// The number of periods, one less than the number of times.
    pub fn periods(&self) -> usize {
        self.times.len() - 1
    }

    /// The demand at `time`, in veh/h.
    pub fn frequency(&self, time: f64, slice_start: bool) -> f64 {
        interpolate_vector(time, &self.times, &self.demand, self.interpolation, slice_start)
    }

    /// The first time after `time` at which the demand changes course, if any.
    pub fn next_time_slice(&self, time: f64) -> Option<f64> {
        self.times.iter().copied().find(|t| *t > time)
    }

    /// The number of trips in the given period, not rounded.
    pub fn trips(&self, period: usize) -> TrafficResult<f64> {
        if period >= self.periods() {
            return Err(TrafficError::IndexOutOfRange {
                index: period,
                len: self.periods(),
            });
        }
        Ok(self.interpolation.integrate(
            self.demand[period],
            self.times[period],
            self.demand[period + 1],
            self.times[period + 1],
        ))
    }
}

impl DemandFrequency for DemandPattern {
    fn frequency(&self, time: f64, slice_start: bool) -> f64 {
        DemandPattern::frequency(self, time, slice_start)
    }

    fn next_time_slice(&self, time: f64) -> Option<f64> {
        DemandPattern::next_time_slice(self, time)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn stepwise_knots_select_slice() {
        let times = [100.0, 200.0, 300.0];
        let demand = [1000.0, 2000.0, 500.0];
        let f = |t, start| interpolate_vector(t, &times, &demand, Interpolation::Stepwise, start);
        assert_eq!(f(100.0, true), 1000.0);
        assert_eq!(f(100.0, false), 0.0);
        assert_eq!(f(150.0, true), 1000.0);
        assert_eq!(f(150.0, false), 1000.0);
        assert_eq!(f(200.0, true), 2000.0);
        assert_eq!(f(200.0, false), 1000.0);
        assert_eq!(f(300.0, false), 2000.0);
        assert_eq!(f(300.0, true), 500.0);
    }

    #[test]
    fn knots_hold_their_demand() {
        let times = [100.0, 200.0, 300.0];
        let demand = [1000.0, 2000.0, 500.0];
        for interpolation in [Interpolation::Stepwise, Interpolation::Linear] {
            let f = |t, start| interpolate_vector(t, &times, &demand, interpolation, start);
            for (t, q) in times.iter().zip(demand) {
                assert_eq!(f(*t, true), q);
            }
            for start in [true, false] {
                assert_eq!(f(99.999, start), 0.0);
                assert_eq!(f(300.001, start), 0.0);
            }
        }
        // Linear demand is continuous, so the slice ending at a later time gives the same
        for (t, q) in times.iter().zip(demand).skip(1) {
            assert_eq!(interpolate_vector(*t, &times, &demand, Interpolation::Linear, false), q);
        }
    }

    #[test]
    fn linear_blends_between_knots() {
        let times = [0.0, 100.0];
        let demand = [1000.0, 2000.0];
        let f = |t| interpolate_vector(t, &times, &demand, Interpolation::Linear, true);
        assert_approx_eq!(f(25.0), 1250.0);
        assert_approx_eq!(f(0.0), 1000.0);
        assert_approx_eq!(f(99.0), 1990.0);
    }

    #[test]
    fn integration_rules() {
        assert_approx_eq!(Interpolation::Stepwise.integrate(1800.0, 0.0, 0.0, 3600.0), 1800.0);
        assert_approx_eq!(Interpolation::Linear.integrate(1000.0, 0.0, 2000.0, 1800.0), 750.0);
    }

    #[test]
    fn pattern_validation() {
        assert!(DemandPattern::new(vec![1.0], vec![0.0], Interpolation::Stepwise).is_err());
        assert!(DemandPattern::new(vec![1.0, -1.0], vec![0.0, 1.0], Interpolation::Stepwise).is_err());
        assert!(DemandPattern::new(vec![1.0, 1.0], vec![1.0, 1.0], Interpolation::Stepwise).is_err());
        assert!(DemandPattern::new(vec![1.0, 1.0], vec![-1.0, 1.0], Interpolation::Stepwise).is_err());

        let pattern = DemandPattern::new(vec![1.0, 2.0, 0.0], vec![0.0, 10.0, 20.0], Interpolation::Linear).unwrap();
        assert_eq!(pattern.next_time_slice(0.0), Some(10.0));
        assert_eq!(pattern.next_time_slice(10.0), Some(20.0));
        assert_eq!(pattern.next_time_slice(20.0), None);
        assert!(matches!(pattern.trips(2), Err(TrafficError::IndexOutOfRange { .. })));
    }
}
