//! # ConvLSTM - stacked convolutional LSTM forecaster
//!
//! Spatiotemporal forecasting (e.g. precipitation nowcasting) on top of the
//! Burn framework.
//!
//! ## Features
//!
//! - **ConvLSTM cells**: convolutional gates keep the spatial layout of every field
//! - **Stacking**: any number of layers, hidden channels and kernels per layer
//! - **Scheduled sampling**: training mixes ground truth and self-feedback per timestep
//! - **Validation rollouts**: autoregressive forecasts scored per timestep
//! - **Stateful sequences**: states carry over (detached) from one sequence to the next
//!
//! ## Quick Start
//!
//! ```rust
//! use convlstm::prelude::*;
//! use burn::backend::NdArray;
//! use burn::tensor::Tensor;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let device = Default::default();
//! let model = ConvLstmConfig::new([8, 8], 1, vec![4, 4], vec![(3, 3), (3, 3)], 2)
//!     .init::<NdArray<f32>>(&device)
//!     .unwrap();
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let input = Tensor::zeros([1, 3, 1, 8, 8], &device);
//! let (predictions, state) = model.forward_train(input, None, 1.0, &mut rng).unwrap();
//!
//! assert_eq!(predictions.dims(), [3, 1, 8, 8]);
//! assert_eq!(state.num_layers(), 2);
//! ```

pub mod cells;
pub mod config;
pub mod error;
pub mod rnn;
pub mod sampling;
pub mod sequence;
pub mod state;

pub use error::{ConvLstmError, Result};

pub mod prelude {
    pub use crate::cells::{ConvLstmCell, Readout, RecurrentCell};
    pub use crate::config::{ConvLstmConfig, HiddenSpec, KernelSpec, LayerConfig};
    pub use crate::error::{ConvLstmError, Result};
    pub use crate::rnn::{mse_loss, ConvLstm, ForwardMode, ModeKind, ModeOutput};
    pub use crate::sampling::{EpsilonSchedule, InputSource, ScheduledSampling};
    pub use crate::state::{LayerState, RecurrentState};
}
