//! Timestep rollout shared by training and validation.
//!
//! [`rollout`] threads one input field per timestep through a stack of
//! [`RecurrentCell`]s, projects the top hidden field with a [`Readout`] and
//! accumulates either predictions (training) or per-step losses (validation).
//! It is generic over the cell and readout types so that any stack exposing
//! those capabilities can be driven by the same state machine.

use std::fmt;
use std::str::FromStr;

use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};
use rand::RngCore;
use tracing::{debug, trace};

use crate::cells::{Readout, RecurrentCell};
use crate::error::{ConvLstmError, Result};
use crate::sampling::{InputSource, ScheduledSampling};
use crate::state::RecurrentState;

/// Per-timestep loss: `(prediction [batch, H, W], target [batch, H, W]) -> [1]`.
pub type LossFn<'a, B> = &'a dyn Fn(Tensor<B, 3>, Tensor<B, 3>) -> Tensor<B, 1>;

/// Execution mode of a forward call.
pub enum ForwardMode<'a, B: Backend> {
    /// Scheduled sampling: each timestep takes ground truth with probability
    /// `epsilon`, otherwise the previous prediction.
    Train {
        epsilon: f64,
        rng: &'a mut dyn RngCore,
    },
    /// Autoregressive rollout scored against `targets` (`[seq_len, batch, H, W]`).
    Validation {
        loss: LossFn<'a, B>,
        targets: Tensor<B, 4>,
    },
}

impl<B: Backend> ForwardMode<'_, B> {
    pub fn kind(&self) -> ModeKind {
        match self {
            ForwardMode::Train { .. } => ModeKind::Train,
            ForwardMode::Validation { .. } => ModeKind::Validation,
        }
    }
}

/// Name of a forward mode, parsed from `"Train"` or `"Validation"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    Train,
    Validation,
}

impl FromStr for ModeKind {
    type Err = ConvLstmError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Train" => Ok(ModeKind::Train),
            "Validation" => Ok(ModeKind::Validation),
            other => Err(ConvLstmError::precondition(format!(
                "unknown forward mode {other:?}, expected \"Train\" or \"Validation\""
            ))),
        }
    }
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeKind::Train => write!(f, "Train"),
            ModeKind::Validation => write!(f, "Validation"),
        }
    }
}

/// What a forward call accumulated.
#[derive(Debug, Clone)]
pub enum ModeOutput<B: Backend> {
    /// Stacked predictions `[seq_len, batch, H, W]`
    Predictions(Tensor<B, 4>),
    /// One loss value per timestep
    Losses(Vec<f32>),
}

impl<B: Backend> ModeOutput<B> {
    pub fn into_predictions(self) -> Option<Tensor<B, 4>> {
        match self {
            ModeOutput::Predictions(predictions) => Some(predictions),
            ModeOutput::Losses(_) => None,
        }
    }

    pub fn into_losses(self) -> Option<Vec<f32>> {
        match self {
            ModeOutput::Losses(losses) => Some(losses),
            ModeOutput::Predictions(_) => None,
        }
    }
}

enum Accumulator<'a, B: Backend> {
    Train {
        sampling: ScheduledSampling,
        rng: &'a mut dyn RngCore,
        predictions: Vec<Tensor<B, 3>>,
    },
    Validation {
        loss: LossFn<'a, B>,
        targets: Tensor<B, 4>,
        losses: Vec<f32>,
        first_state: Option<RecurrentState<B>>,
    },
}

/// Field at timestep `t` of a batch-first sequence: `[batch, channels, H, W]`.
fn frame<B: Backend>(sequence: &Tensor<B, 5>, t: usize) -> Tensor<B, 4> {
    let [batch, _, channels, height, width] = sequence.dims();
    sequence
        .clone()
        .narrow(1, t, 1)
        .reshape([batch, channels, height, width])
}

/// Run the recurrence over a batch-first `input` of shape `[batch, seq_len, channels, H, W]`.
///
/// Train returns the state after the final timestep; Validation returns the
/// state after timestep 0, i.e. once grounded on the first true observation.
///
/// `state` must hold one entry per cell, shaped for the input's batch size.
pub fn rollout<B, C, R>(
    cells: &[C],
    readout: &R,
    input: Tensor<B, 5>,
    state: RecurrentState<B>,
    mode: ForwardMode<'_, B>,
) -> Result<(ModeOutput<B>, RecurrentState<B>)>
where
    B: Backend,
    C: RecurrentCell<B>,
    R: Readout<B>,
{
    let [batch_size, seq_len, channels, height, width] = input.dims();
    if seq_len == 0 {
        return Err(ConvLstmError::precondition("input sequence is empty"));
    }
    let first = cells
        .first()
        .ok_or_else(|| ConvLstmError::configuration("rollout needs at least one cell"))?;
    if channels != first.input_channels() {
        return Err(ConvLstmError::shape_mismatch(
            format!("{} input channels", first.input_channels()),
            format!("{channels}"),
        ));
    }
    if state.num_layers() != cells.len() {
        return Err(ConvLstmError::shape_mismatch(
            format!("{} layer states", cells.len()),
            format!("{}", state.num_layers()),
        ));
    }

    let kind = mode.kind();
    let mut acc = match mode {
        ForwardMode::Train { epsilon, rng } => Accumulator::Train {
            sampling: ScheduledSampling::new(epsilon)?,
            rng,
            predictions: Vec::with_capacity(seq_len),
        },
        ForwardMode::Validation { loss, targets } => {
            let [target_len, target_batch, target_height, target_width] = targets.dims();
            if target_len < seq_len
                || [target_batch, target_height, target_width] != [batch_size, height, width]
            {
                return Err(ConvLstmError::shape_mismatch(
                    format!("targets [>={seq_len}, {batch_size}, {height}, {width}]"),
                    format!("{:?}", targets.dims()),
                ));
            }
            Accumulator::Validation {
                loss,
                targets,
                losses: Vec::with_capacity(seq_len),
                first_state: None,
            }
        }
    };

    // Predictions are single-channel, so feeding them back needs a
    // single-channel first layer.
    let feeds_back = match &acc {
        Accumulator::Train { sampling, .. } => sampling.epsilon() < 1.0,
        Accumulator::Validation { .. } => true,
    };
    if feeds_back && seq_len > 1 && channels != 1 {
        return Err(ConvLstmError::shape_mismatch(
            "1 input channel to feed predictions back",
            format!("{channels}"),
        ));
    }

    debug!(
        mode = %kind,
        seq_len,
        batch_size,
        layers = cells.len(),
        "starting rollout"
    );

    let mut feedback = frame(&input, 0);
    let mut state = state;

    for t in 0..seq_len {
        let step_input = match &mut acc {
            Accumulator::Train { sampling, rng, .. } => match sampling.draw(&mut **rng) {
                InputSource::GroundTruth => {
                    trace!(t, "ground truth input");
                    frame(&input, t)
                }
                InputSource::Feedback => {
                    trace!(t, "self-feedback input");
                    feedback
                }
            },
            Accumulator::Validation { .. } => feedback,
        };

        let mut layer_input = step_input;
        let next_state: RecurrentState<B> = cells
            .iter()
            .zip(state)
            .map(|(cell, layer_state)| {
                let next = cell.step(layer_input.clone(), layer_state);
                layer_input = next.hidden.clone();
                next
            })
            .collect();
        state = next_state;

        // `layer_input` now holds the top layer's hidden field.
        let prediction = readout.project(layer_input);
        let [pred_batch, pred_channels, pred_height, pred_width] = prediction.dims();
        if pred_channels != 1 {
            return Err(ConvLstmError::shape_mismatch(
                "single-channel readout",
                format!("{pred_channels} channels"),
            ));
        }
        if [pred_batch, pred_height, pred_width] != [batch_size, height, width] {
            return Err(ConvLstmError::shape_mismatch(
                format!("readout fields [{batch_size}, 1, {height}, {width}]"),
                format!("{:?}", prediction.dims()),
            ));
        }
        let squeezed: Tensor<B, 3> =
            prediction.clone().reshape([pred_batch, pred_height, pred_width]);

        match &mut acc {
            Accumulator::Train { predictions, .. } => predictions.push(squeezed),
            Accumulator::Validation {
                loss,
                targets,
                losses,
                first_state,
            } => {
                let target: Tensor<B, 3> = targets
                    .clone()
                    .narrow(0, t, 1)
                    .reshape([batch_size, height, width]);
                let value: f32 = (*loss)(squeezed, target).into_scalar().elem();
                trace!(t, loss = value, "validation step");
                losses.push(value);
                if t == 0 {
                    *first_state = Some(state.clone());
                }
            }
        }

        feedback = prediction;
    }

    match acc {
        Accumulator::Train { predictions, .. } => {
            Ok((ModeOutput::Predictions(Tensor::stack(predictions, 0)), state))
        }
        Accumulator::Validation {
            losses,
            first_state,
            ..
        } => {
            let snapshot = first_state.unwrap_or(state);
            Ok((ModeOutput::Losses(losses), snapshot))
        }
    }
}
