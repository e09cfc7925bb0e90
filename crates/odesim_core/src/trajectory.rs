use crate::error::{check_dimension, ConfigurationError, SimResult};
use crate::model::StateBounds;
use serde::{Deserialize, Serialize};

/// Work counters for one integration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationStats {
    /// Calls of the right-hand side, including finite-difference evaluations.
    pub evaluations: usize,
    pub accepted: usize,
    pub rejected: usize,
}

/// A state sample that left its declared bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundViolation {
    pub time: f64,
    pub index: usize,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

/// States sampled at the requested output times.
///
/// Immutable once built; derived quantities are returned as new values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    times: Vec<f64>,
    /// Row-major: sample `i` occupies `states[i * dimension..(i + 1) * dimension]`.
    states: Vec<f64>,
    dimension: usize,
    stats: IntegrationStats,
}

impl Trajectory {
    pub fn new(
        times: Vec<f64>,
        states: Vec<f64>,
        dimension: usize,
        stats: IntegrationStats,
    ) -> SimResult<Self> {
        check_dimension("trajectory storage", times.len() * dimension, states.len())?;
        Ok(Self {
            times,
            states,
            dimension,
            stats,
        })
    }

    /// Builds a trajectory from one state vector per time.
    pub fn from_samples(times: Vec<f64>, samples: &[Vec<f64>]) -> SimResult<Self> {
        check_dimension("trajectory samples", times.len(), samples.len())?;
        let dimension = samples.first().map_or(0, Vec::len);
        let mut states = Vec::with_capacity(times.len() * dimension);
        for sample in samples {
            check_dimension("trajectory sample", dimension, sample.len())?;
            states.extend_from_slice(sample);
        }
        Self::new(times, states, dimension, IntegrationStats::default())
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn stats(&self) -> IntegrationStats {
        self.stats
    }

    /// State at sample `index`.
    pub fn state(&self, index: usize) -> &[f64] {
        &self.states[index * self.dimension..(index + 1) * self.dimension]
    }

    pub fn final_state(&self) -> Option<&[f64]> {
        self.len().checked_sub(1).map(|last| self.state(last))
    }

    /// `(t, x)` pairs in time order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, &[f64])> + '_ {
        self.times
            .iter()
            .copied()
            .zip(self.states.chunks(self.dimension.max(1)))
    }

    /// Time series of state component `index`.
    pub fn component(&self, index: usize) -> SimResult<Vec<f64>> {
        if index >= self.dimension {
            return Err(ConfigurationError::InvalidInput {
                what: format!(
                    "component {index} requested from a {}-dimensional trajectory",
                    self.dimension
                ),
            }
            .into());
        }
        Ok(self
            .states
            .iter()
            .skip(index)
            .step_by(self.dimension)
            .copied()
            .collect())
    }

    /// Applies `f(t, x, out)` to every sample, producing a trajectory of
    /// dimension `dimension` on the same time grid.
    pub fn map_states<F>(&self, dimension: usize, mut f: F) -> SimResult<Trajectory>
    where
        F: FnMut(f64, &[f64], &mut [f64]) -> SimResult<()>,
    {
        let mut states = vec![0.0; self.len() * dimension];
        for (i, (t, x)) in self.iter().enumerate() {
            f(t, x, &mut states[i * dimension..(i + 1) * dimension])?;
        }
        Trajectory::new(self.times.clone(), states, dimension, self.stats)
    }

    /// A copy with every bounded component clamped into its interval.
    pub fn clipped(&self, bounds: &StateBounds) -> Trajectory {
        let mut clipped = self.clone();
        for row in clipped.states.chunks_mut(self.dimension.max(1)) {
            bounds.clamp(row);
        }
        clipped
    }

    /// Every sample lying outside a declared bound.
    pub fn bound_violations(&self, bounds: &StateBounds) -> Vec<BoundViolation> {
        let mut violations = Vec::new();
        for (t, x) in self.iter() {
            for bound in &bounds.limits {
                if let Some(&value) = x.get(bound.index) {
                    if !bound.contains(value) {
                        violations.push(BoundViolation {
                            time: t,
                            index: bound.index,
                            value,
                            min: bound.min,
                            max: bound.max,
                        });
                    }
                }
            }
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundPolicy, StateBound};

    fn sample() -> Trajectory {
        Trajectory::from_samples(
            vec![0.0, 1.0, 2.0],
            &[vec![0.0, 10.0], vec![0.5, 20.0], vec![1.2, 30.0]],
        )
        .unwrap()
    }

    #[test]
    fn rows_and_columns() {
        let traj = sample();
        assert_eq!(traj.len(), 3);
        assert_eq!(traj.state(1), &[0.5, 20.0]);
        assert_eq!(traj.component(1).unwrap(), vec![10.0, 20.0, 30.0]);
        assert_eq!(traj.final_state(), Some(&[1.2, 30.0][..]));
        assert!(traj.component(2).is_err());
    }

    #[test]
    fn storage_must_match_grid() {
        assert!(Trajectory::new(vec![0.0, 1.0], vec![0.0; 3], 2, IntegrationStats::default()).is_err());
        assert!(Trajectory::from_samples(vec![0.0, 1.0], &[vec![0.0], vec![0.0, 1.0]]).is_err());
    }

    #[test]
    fn map_states_derives_new_series() {
        let traj = sample();
        let sums = traj
            .map_states(1, |_t, x, out| {
                out[0] = x[0] + x[1];
                Ok(())
            })
            .unwrap();
        assert_eq!(sums.component(0).unwrap(), vec![10.0, 20.5, 31.2]);
        assert_eq!(sums.times(), traj.times());
    }

    #[test]
    fn clipping_and_violations_use_the_same_bounds() {
        let traj = sample();
        let bounds = StateBounds::new(
            vec![StateBound::new(0, 0.0, 1.0).unwrap()],
            BoundPolicy::Report,
        );
        let violations = traj.bound_violations(&bounds);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].time, 2.0);
        assert_eq!(violations[0].value, 1.2);

        let clipped = traj.clipped(&bounds);
        assert_eq!(clipped.component(0).unwrap(), vec![0.0, 0.5, 1.0]);
        assert!(clipped.bound_violations(&bounds).is_empty());
        // the source is untouched
        assert_eq!(traj.state(2)[0], 1.2);
    }
}
