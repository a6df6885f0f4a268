//! Scheduled sampling: choosing between ground truth and self-feedback.
//!
//! During training each timestep flips a coin that lands on ground truth with
//! probability `epsilon`. [`EpsilonSchedule`] decays `epsilon` over training
//! steps so a model starts teacher-forced and gradually learns from its own
//! predictions.

use rand::distributions::{Bernoulli, Distribution};
use rand::Rng;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::error::{ConvLstmError, Result};

/// Where a timestep takes its input from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    /// The observed field at the current timestep
    GroundTruth,
    /// The model's prediction from the previous timestep
    Feedback,
}

/// Biased coin deciding the input source of each training timestep.
#[derive(Debug, Clone, Copy)]
pub struct ScheduledSampling {
    epsilon: f64,
    coin: Bernoulli,
}

impl ScheduledSampling {
    /// Coin that picks ground truth with probability `epsilon`.
    pub fn new(epsilon: f64) -> Result<Self> {
        let coin = Bernoulli::new(epsilon).map_err(|_| {
            ConvLstmError::precondition(format!("epsilon must be within [0, 1], got {epsilon}"))
        })?;
        Ok(Self { epsilon, coin })
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Draw one coin flip.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> InputSource {
        if self.coin.sample(rng) {
            InputSource::GroundTruth
        } else {
            InputSource::Feedback
        }
    }
}

/// Decay of the ground-truth probability over training steps.
///
/// Deserialized schedules are validated, so a loaded schedule never yields a
/// NaN probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EpsilonSchedule {
    /// Fixed probability
    Constant { epsilon: f64 },
    /// `max(floor, start - slope * step)`
    Linear { start: f64, slope: f64, floor: f64 },
    /// `max(floor, start * decay^step)`
    Exponential { start: f64, decay: f64, floor: f64 },
    /// `k / (k + exp(step / k))`, starting near 1 and falling to 0
    InverseSigmoid { k: f64 },
}

impl EpsilonSchedule {
    /// Check that every parameter is finite and within its domain.
    ///
    /// `Constant` needs `epsilon` in `[0, 1]`, `Exponential` a non-negative
    /// `decay` and `InverseSigmoid` a positive `k`.
    pub fn validate(&self) -> Result<()> {
        let (params, domain_ok) = match *self {
            EpsilonSchedule::Constant { epsilon } => {
                (vec![("epsilon", epsilon)], (0.0..=1.0).contains(&epsilon))
            }
            EpsilonSchedule::Linear { start, slope, floor } => (
                vec![("start", start), ("slope", slope), ("floor", floor)],
                true,
            ),
            EpsilonSchedule::Exponential {
                start,
                decay,
                floor,
            } => (
                vec![("start", start), ("decay", decay), ("floor", floor)],
                decay >= 0.0,
            ),
            EpsilonSchedule::InverseSigmoid { k } => (vec![("k", k)], k > 0.0),
        };

        if let Some((name, value)) = params.iter().find(|(_, value)| !value.is_finite()) {
            return Err(ConvLstmError::configuration(format!(
                "epsilon schedule parameter {name} must be finite, got {value}"
            )));
        }
        if !domain_ok {
            return Err(ConvLstmError::configuration(format!(
                "epsilon schedule parameters out of range: {self:?}"
            )));
        }
        Ok(())
    }

    /// Ground-truth probability at training `step`, clamped to `[0, 1]`.
    pub fn epsilon_at(&self, step: usize) -> Result<f64> {
        self.validate()?;
        let step = step as f64;
        let epsilon = match *self {
            EpsilonSchedule::Constant { epsilon } => epsilon,
            EpsilonSchedule::Linear { start, slope, floor } => (start - slope * step).max(floor),
            EpsilonSchedule::Exponential { start, decay, floor } => {
                (start * decay.powf(step)).max(floor)
            }
            EpsilonSchedule::InverseSigmoid { k } => k / (k + (step / k).exp()),
        };
        Ok(epsilon.clamp(0.0, 1.0))
    }

    /// Sampling coin for training `step`.
    pub fn sampling_at(&self, step: usize) -> Result<ScheduledSampling> {
        ScheduledSampling::new(self.epsilon_at(step)?)
    }
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ScheduleRepr {
    Constant { epsilon: f64 },
    Linear { start: f64, slope: f64, floor: f64 },
    Exponential { start: f64, decay: f64, floor: f64 },
    InverseSigmoid { k: f64 },
}

impl<'de> Deserialize<'de> for EpsilonSchedule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let schedule = match ScheduleRepr::deserialize(deserializer)? {
            ScheduleRepr::Constant { epsilon } => EpsilonSchedule::Constant { epsilon },
            ScheduleRepr::Linear { start, slope, floor } => {
                EpsilonSchedule::Linear { start, slope, floor }
            }
            ScheduleRepr::Exponential { start, decay, floor } => {
                EpsilonSchedule::Exponential { start, decay, floor }
            }
            ScheduleRepr::InverseSigmoid { k } => EpsilonSchedule::InverseSigmoid { k },
        };
        schedule
            .validate()
            .map_err(<D::Error as de::Error>::custom)?;
        Ok(schedule)
    }
}

impl Default for EpsilonSchedule {
    fn default() -> Self {
        EpsilonSchedule::Constant { epsilon: 1.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_extreme_probabilities_are_deterministic() {
        let mut rng = StdRng::seed_from_u64(7);
        let always = ScheduledSampling::new(1.0).unwrap();
        let never = ScheduledSampling::new(0.0).unwrap();

        for _ in 0..100 {
            assert_eq!(always.draw(&mut rng), InputSource::GroundTruth);
            assert_eq!(never.draw(&mut rng), InputSource::Feedback);
        }
    }

    #[test]
    fn test_epsilon_out_of_range() {
        for epsilon in [-0.1, 1.5, f64::NAN] {
            assert!(matches!(
                ScheduledSampling::new(epsilon),
                Err(ConvLstmError::Precondition(_))
            ));
        }
    }

    #[test]
    fn test_draw_frequency_tracks_epsilon() {
        let mut rng = StdRng::seed_from_u64(42);
        let coin = ScheduledSampling::new(0.3).unwrap();

        let hits = (0..10_000)
            .filter(|_| coin.draw(&mut rng) == InputSource::GroundTruth)
            .count();
        let rate = hits as f64 / 10_000.0;
        assert!((rate - 0.3).abs() < 0.03, "ground truth rate {rate}");
    }

    #[test]
    fn test_linear_schedule() {
        let schedule = EpsilonSchedule::Linear {
            start: 1.0,
            slope: 0.1,
            floor: 0.2,
        };

        assert_eq!(schedule.epsilon_at(0).unwrap(), 1.0);
        assert!((schedule.epsilon_at(5).unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(schedule.epsilon_at(100).unwrap(), 0.2);
    }

    #[test]
    fn test_exponential_schedule() {
        let schedule = EpsilonSchedule::Exponential {
            start: 1.0,
            decay: 0.5,
            floor: 0.0,
        };

        assert_eq!(schedule.epsilon_at(0).unwrap(), 1.0);
        assert!((schedule.epsilon_at(2).unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_inverse_sigmoid_decreases() {
        let schedule = EpsilonSchedule::InverseSigmoid { k: 10.0 };

        let values: Vec<f64> = (0..200).step_by(20).map(|s| schedule.epsilon_at(s).unwrap()).collect();
        assert!(values[0] > 0.9);
        assert!(values.windows(2).all(|w| w[1] <= w[0]));
        assert!(schedule.sampling_at(50).is_ok());
    }

    #[test]
    fn test_degenerate_schedules_are_rejected() {
        let degenerate = [
            EpsilonSchedule::InverseSigmoid { k: 0.0 },
            EpsilonSchedule::InverseSigmoid { k: -2.0 },
            EpsilonSchedule::InverseSigmoid { k: f64::NAN },
            EpsilonSchedule::Constant { epsilon: 1.5 },
            EpsilonSchedule::Linear {
                start: 1.0,
                slope: f64::INFINITY,
                floor: 0.0,
            },
            EpsilonSchedule::Exponential {
                start: 1.0,
                decay: -0.5,
                floor: 0.0,
            },
        ];

        for schedule in degenerate {
            assert!(
                matches!(schedule.epsilon_at(0), Err(ConvLstmError::Configuration(_))),
                "{schedule:?} accepted"
            );
            assert!(schedule.sampling_at(3).is_err());
        }
    }

    #[test]
    fn test_deserialized_schedule_is_validated() {
        let schedule: EpsilonSchedule =
            serde_json::from_str(r#"{"kind": "inverse_sigmoid", "k": 5.0}"#).unwrap();
        assert_eq!(schedule, EpsilonSchedule::InverseSigmoid { k: 5.0 });
        assert_eq!(
            serde_json::to_string(&schedule).unwrap(),
            r#"{"kind":"inverse_sigmoid","k":5.0}"#
        );

        let zero_k = r#"{"kind": "inverse_sigmoid", "k": 0.0}"#;
        assert!(serde_json::from_str::<EpsilonSchedule>(zero_k).is_err());
    }
}
