//! # Sequence Models
//!
//! [`ConvLstm`] is the primary API: it stacks ConvLSTM cells and rolls them
//! over an input sequence, either with scheduled sampling (training) or as a
//! pure autoregressive rollout scored against targets (validation).
//!
//! ## Tensor Shapes
//!
//! ### Input Sequence (5D)
//!
//! | Format | Shape | Default |
//! |--------|-------|---------|
//! | Batch-first | `[batch, seq_len, channels, height, width]` | ✓ Yes |
//! | Time-first | `[seq_len, batch, channels, height, width]` | No |
//!
//! Use `ConvLstmConfig::with_batch_first(false)` to switch to time-first input.
//!
//! ### Outputs
//!
//! | Mode | Output | State returned |
//! |------|--------|----------------|
//! | Train | predictions `[seq_len, batch, height, width]` | after the last timestep |
//! | Validation | `Vec<f32>`, one loss per timestep | after the first timestep |
//!
//! ## Stateful Processing
//!
//! ```ignore
//! let model = ConvLstmConfig::new([64, 64], 1, 16, [3, 3], 2).init::<Backend>(&device)?;
//! let mut rng = StdRng::seed_from_u64(42);
//!
//! let (_, state) = model.forward_train(month_1, None, 0.9, &mut rng)?;
//! let (_, state) = model.forward_train(month_2, Some(state), 0.9, &mut rng)?;
//! // The carried state is detached, so gradients stop at sequence boundaries
//! ```
//!
//! ## Validation
//!
//! ```ignore
//! let (losses, state) = model.forward_validation(dev_x, Some(state), &mse_loss, dev_y)?;
//! // `state` was captured right after the first observed field
//! ```

pub mod conv_lstm;
pub mod rollout;

pub use conv_lstm::{mse_loss, ConvLstm};
pub use rollout::{rollout, ForwardMode, LossFn, ModeKind, ModeOutput};
