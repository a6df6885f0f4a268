//! # Recurrent Cells
//!
//! Single-timestep units stacked by [`ConvLstm`](crate::rnn::ConvLstm).
//! The rollout only talks to cells through [`RecurrentCell`] and to the output
//! projection through [`Readout`], so any unit exposing those capabilities
//! can be driven by [`rollout`](crate::rnn::rollout).
//!
//! ## Tensor Shapes
//!
//! | Tensor | Shape | Description |
//! |--------|-------|-------------|
//! | `input` | `[batch, input_channels, height, width]` | Input field |
//! | `hidden` | `[batch, hidden_channels, height, width]` | Hidden field |
//! | `cell` | `[batch, hidden_channels, height, width]` | Cell field |
//! | readout | `[batch, 1, height, width]` | Predicted scalar field |

pub mod conv_lstm_cell;

pub use conv_lstm_cell::ConvLstmCell;

use burn::nn::conv::Conv2d;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::state::LayerState;

/// A stateful unit computing one layer's update of `(hidden, cell)`.
pub trait RecurrentCell<B: Backend> {
    /// Channels expected on the input field
    fn input_channels(&self) -> usize;

    /// Channels of the hidden and cell fields
    fn hidden_channels(&self) -> usize;

    /// Advance one timestep.
    fn step(&self, input: Tensor<B, 4>, state: LayerState<B>) -> LayerState<B>;

    /// Zero state for `batch_size` samples.
    fn init_hidden(&self, batch_size: usize, device: &B::Device) -> LayerState<B>;
}

/// Projects the top layer's hidden field to a predicted field.
pub trait Readout<B: Backend> {
    fn project(&self, hidden: Tensor<B, 4>) -> Tensor<B, 4>;
}

impl<B: Backend> Readout<B> for Conv2d<B> {
    fn project(&self, hidden: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward(hidden)
    }
}
