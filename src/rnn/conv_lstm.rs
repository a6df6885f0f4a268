//! Stacked ConvLSTM forecaster
//!
//! Full sequence model that stacks [`ConvLstmCell`]s, projects the top hidden
//! field to a single-channel prediction and rolls the recurrence over time
//! with scheduled sampling.

use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::loss::{MseLoss, Reduction};
use burn::nn::PaddingConfig2d;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::RngCore;
use tracing::{debug, warn};

use super::rollout::{rollout, ForwardMode, LossFn, ModeKind, ModeOutput};
use crate::cells::{ConvLstmCell, RecurrentCell};
use crate::config::ConvLstmConfig;
use crate::error::{ConvLstmError, Result};
use crate::state::RecurrentState;

/// Stacked ConvLSTM
///
/// Owns one [`ConvLstmCell`] per layer and a 3x3 readout convolution mapping
/// the last layer's hidden channels to one output channel.
///
/// # Type Parameters
/// * `B` - The backend type
#[derive(Module, Debug)]
pub struct ConvLstm<B: Backend> {
    /// Recurrent cells, bottom layer first
    cells: Vec<ConvLstmCell<B>>,
    /// Projection of the top hidden field to the predicted field
    readout: Conv2d<B>,
    #[module(skip)]
    height: usize,
    #[module(skip)]
    width: usize,
    #[module(skip)]
    input_dim: usize,
    #[module(skip)]
    batch_first: bool,
    /// Reserved, not read by the rollout
    #[module(skip)]
    return_all_layers: bool,
}

impl<B: Backend> ConvLstm<B> {
    /// Create a new stacked ConvLSTM
    ///
    /// # Arguments
    /// * `config` - Model configuration; hidden and kernel specs are broadcast per layer
    /// * `device` - Device to create the module on
    pub fn new(config: &ConvLstmConfig, device: &B::Device) -> Result<Self> {
        let layers = config.layer_configs()?;

        let cells: Vec<ConvLstmCell<B>> = layers
            .iter()
            .map(|layer| ConvLstmCell::new(layer, config.input_size, config.bias, device))
            .collect();

        let top_hidden = layers
            .last()
            .map(|layer| layer.hidden_channels)
            .ok_or_else(|| ConvLstmError::configuration("no layers configured"))?;
        let readout = Conv2dConfig::new([top_hidden, 1], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(config.bias)
            .init(device);

        debug!(
            layers = layers.len(),
            input_dim = config.input_dim,
            height = config.input_size[0],
            width = config.input_size[1],
            "built ConvLSTM: {:?}",
            layers
        );

        Ok(Self {
            cells,
            readout,
            height: config.input_size[0],
            width: config.input_size[1],
            input_dim: config.input_dim,
            batch_first: config.batch_first,
            return_all_layers: config.return_all_layers,
        })
    }

    /// Get the number of stacked layers
    pub fn num_layers(&self) -> usize {
        self.cells.len()
    }

    /// Get the input channel count
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Get the spatial size `(height, width)`
    pub fn input_size(&self) -> [usize; 2] {
        [self.height, self.width]
    }

    /// Get the hidden channel count of every layer
    pub fn hidden_dims(&self) -> Vec<usize> {
        self.cells.iter().map(|cell| cell.hidden_dim()).collect()
    }

    /// Get the kernel shape of every layer
    pub fn kernel_sizes(&self) -> Vec<[usize; 2]> {
        self.cells.iter().map(|cell| cell.kernel_size()).collect()
    }

    /// Whether input is batch-first
    pub fn batch_first(&self) -> bool {
        self.batch_first
    }

    pub fn return_all_layers(&self) -> bool {
        self.return_all_layers
    }

    /// Access the recurrent cells, bottom layer first
    pub fn cells(&self) -> &[ConvLstmCell<B>] {
        &self.cells
    }

    /// Zero state for `batch_size` samples, one `(hidden, cell)` pair per layer
    /// shaped `[batch_size, hidden_dim[i], height, width]`.
    pub fn init_hidden(&self, batch_size: usize, device: &B::Device) -> RecurrentState<B> {
        self.cells
            .iter()
            .map(|cell| cell.init_hidden(batch_size, device))
            .collect()
    }

    fn expected_state_shapes(&self, batch_size: usize) -> Vec<[usize; 4]> {
        self.cells
            .iter()
            .map(|cell| [batch_size, cell.hidden_dim(), self.height, self.width])
            .collect()
    }

    /// Forward pass over one sequence
    ///
    /// # Arguments
    /// * `input` - Sequence of shape:
    ///   - `[batch, seq, channels, height, width]` if batch_first=true
    ///   - `[seq, batch, channels, height, width]` if batch_first=false
    /// * `state` - Optional state carried over from a previous sequence.
    ///   In Train mode it is detached first; when absent a zero state sized
    ///   for the input's batch is used
    /// * `mode` - [`ForwardMode::Train`] or [`ForwardMode::Validation`]
    ///
    /// # Returns
    /// Tuple of (output, state) where:
    /// - output: stacked predictions `[seq, batch, height, width]` (Train) or
    ///   one loss per timestep (Validation)
    /// - state: after the last timestep (Train) or after the first (Validation)
    pub fn forward(
        &self,
        input: Tensor<B, 5>,
        state: Option<RecurrentState<B>>,
        mode: ForwardMode<'_, B>,
    ) -> Result<(ModeOutput<B>, RecurrentState<B>)> {
        let device = input.device();

        // (t, b, c, h, w) -> (b, t, c, h, w)
        let input = if self.batch_first {
            input
        } else {
            input.swap_dims(0, 1)
        };

        let [batch_size, _, channels, height, width] = input.dims();
        if channels != self.input_dim || [height, width] != [self.height, self.width] {
            return Err(ConvLstmError::shape_mismatch(
                format!(
                    "input fields [{}, {}, {}]",
                    self.input_dim, self.height, self.width
                ),
                format!("[{channels}, {height}, {width}]"),
            ));
        }

        let state = match (mode.kind(), state) {
            (ModeKind::Train, Some(state)) => state.detach(),
            (ModeKind::Validation, Some(state)) => state,
            (ModeKind::Train, None) => self.init_hidden(batch_size, &device),
            (ModeKind::Validation, None) => {
                warn!(batch_size, "validation rollout without a carried state, using zeros");
                self.init_hidden(batch_size, &device)
            }
        };
        state.check_shapes(&self.expected_state_shapes(batch_size))?;

        rollout(&self.cells, &self.readout, input, state, mode)
    }

    /// Training rollout with scheduled sampling
    ///
    /// Returns predictions `[seq, batch, height, width]` and the state after
    /// the final timestep.
    pub fn forward_train(
        &self,
        input: Tensor<B, 5>,
        state: Option<RecurrentState<B>>,
        epsilon: f64,
        rng: &mut dyn RngCore,
    ) -> Result<(Tensor<B, 4>, RecurrentState<B>)> {
        let (output, state) = self.forward(input, state, ForwardMode::Train { epsilon, rng })?;
        let predictions = output
            .into_predictions()
            .ok_or_else(|| ConvLstmError::precondition("training rollout produced losses"))?;
        Ok((predictions, state))
    }

    /// Validation rollout: feeds predictions back autoregressively and scores
    /// each timestep against `targets` (`[seq, batch, height, width]`)
    ///
    /// Returns one loss per timestep and the state after the first timestep.
    pub fn forward_validation(
        &self,
        input: Tensor<B, 5>,
        state: Option<RecurrentState<B>>,
        loss: LossFn<'_, B>,
        targets: Tensor<B, 4>,
    ) -> Result<(Vec<f32>, RecurrentState<B>)> {
        let (output, state) =
            self.forward(input, state, ForwardMode::Validation { loss, targets })?;
        let losses = output
            .into_losses()
            .ok_or_else(|| ConvLstmError::precondition("validation rollout produced predictions"))?;
        Ok((losses, state))
    }
}

/// Mean squared error between a predicted and a target field.
pub fn mse_loss<B: Backend>(prediction: Tensor<B, 3>, target: Tensor<B, 3>) -> Tensor<B, 1> {
    MseLoss::new().forward(prediction, target, Reduction::Mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::backend::Backend as BurnBackend;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    type TestBackend = NdArray<f32>;
    type TestDevice = <TestBackend as BurnBackend>::Device;

    fn get_test_device() -> TestDevice {
        Default::default()
    }

    fn small_model(device: &TestDevice) -> ConvLstm<TestBackend> {
        ConvLstmConfig::new([8, 8], 1, vec![4, 4], vec![(3, 3), (3, 3)], 2)
            .init(device)
            .unwrap()
    }

    #[test]
    fn test_conv_lstm_creation() {
        let device = get_test_device();
        let model = ConvLstmConfig::new([6, 10], 2, vec![8, 4, 2], [3, 5], 3)
            .init::<TestBackend>(&device)
            .unwrap();

        assert_eq!(model.num_layers(), 3);
        assert_eq!(model.input_dim(), 2);
        assert_eq!(model.input_size(), [6, 10]);
        assert_eq!(model.hidden_dims(), vec![8, 4, 2]);
        assert_eq!(model.kernel_sizes(), vec![[3, 5]; 3]);
        assert_eq!(model.cells()[1].input_dim(), 8);
        assert!(model.batch_first());
        assert!(!model.return_all_layers());
    }

    #[test]
    fn test_conv_lstm_rejects_bad_config() {
        let device = get_test_device();
        let result = ConvLstmConfig::new([8, 8], 1, 4, vec![[3, 3]; 3], 2).init::<TestBackend>(&device);

        assert!(matches!(result, Err(ConvLstmError::Configuration(_))));
    }

    #[test]
    fn test_init_hidden() {
        let device = get_test_device();
        let model = ConvLstmConfig::new([5, 7], 1, vec![3, 6], [3, 3], 2)
            .init::<TestBackend>(&device)
            .unwrap();

        let state = model.init_hidden(4, &device);

        assert_eq!(state.num_layers(), 2);
        assert_eq!(state.layer(0).unwrap().dims(), [4, 3, 5, 7]);
        assert_eq!(state.layer(1).unwrap().dims(), [4, 6, 5, 7]);
        for layer in state.iter() {
            assert_eq!(layer.hidden.clone().abs().sum().into_scalar(), 0.0);
            assert_eq!(layer.cell.clone().abs().sum().into_scalar(), 0.0);
        }
    }

    #[test]
    fn test_forward_train_shapes() {
        let device = get_test_device();
        let model = small_model(&device);
        let mut rng = StdRng::seed_from_u64(1);

        let input = Tensor::<TestBackend, 5>::random(
            [1, 3, 1, 8, 8],
            burn::tensor::Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let (predictions, state) = model.forward_train(input, None, 1.0, &mut rng).unwrap();

        assert_eq!(predictions.dims(), [3, 1, 8, 8]);
        assert_eq!(state.num_layers(), 2);
    }

    #[test]
    fn test_forward_train_batch_larger_than_one() {
        let device = get_test_device();
        let model = small_model(&device);
        let mut rng = StdRng::seed_from_u64(2);

        let input = Tensor::<TestBackend, 5>::zeros([3, 4, 1, 8, 8], &device);
        let (predictions, state) = model.forward_train(input, None, 0.5, &mut rng).unwrap();

        assert_eq!(predictions.dims(), [4, 3, 8, 8]);
        assert_eq!(state.batch_size(), Some(3));
    }

    #[test]
    fn test_forward_time_first() {
        let device = get_test_device();
        let model = ConvLstmConfig::new([8, 8], 1, 4, [3, 3], 1)
            .with_batch_first(false)
            .init::<TestBackend>(&device)
            .unwrap();
        let mut rng = StdRng::seed_from_u64(3);

        // [seq, batch, channels, height, width]
        let input = Tensor::<TestBackend, 5>::zeros([5, 2, 1, 8, 8], &device);
        let (predictions, state) = model.forward_train(input, None, 1.0, &mut rng).unwrap();

        assert_eq!(predictions.dims(), [5, 2, 8, 8]);
        assert_eq!(state.layer(0).unwrap().dims(), [2, 4, 8, 8]);
    }

    #[test]
    fn test_forward_rejects_wrong_spatial_size() {
        let device = get_test_device();
        let model = small_model(&device);
        let mut rng = StdRng::seed_from_u64(4);

        let input = Tensor::<TestBackend, 5>::zeros([1, 2, 1, 6, 8], &device);
        let result = model.forward_train(input, None, 1.0, &mut rng);

        assert!(matches!(result, Err(ConvLstmError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_forward_rejects_state_for_other_batch() {
        let device = get_test_device();
        let model = small_model(&device);
        let mut rng = StdRng::seed_from_u64(5);

        let state = model.init_hidden(1, &device);
        let input = Tensor::<TestBackend, 5>::zeros([2, 2, 1, 8, 8], &device);
        let result = model.forward_train(input, Some(state), 1.0, &mut rng);

        assert!(matches!(result, Err(ConvLstmError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_forward_rejects_bad_epsilon() {
        let device = get_test_device();
        let model = small_model(&device);
        let mut rng = StdRng::seed_from_u64(6);

        let input = Tensor::<TestBackend, 5>::zeros([1, 2, 1, 8, 8], &device);
        let result = model.forward_train(input, None, 1.2, &mut rng);

        assert!(matches!(result, Err(ConvLstmError::Precondition(_))));
    }

    #[test]
    fn test_forward_validation_losses() {
        let device = get_test_device();
        let model = small_model(&device);

        let input = Tensor::<TestBackend, 5>::random(
            [1, 3, 1, 8, 8],
            burn::tensor::Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let targets = Tensor::<TestBackend, 4>::zeros([3, 1, 8, 8], &device);
        let (losses, state) = model
            .forward_validation(input, None, &mse_loss::<TestBackend>, targets)
            .unwrap();

        assert_eq!(losses.len(), 3);
        assert!(losses.iter().all(|l| l.is_finite() && *l >= 0.0));
        assert_eq!(state.num_layers(), 2);
    }

    #[test]
    fn test_mse_loss() {
        let device = get_test_device();
        let prediction = Tensor::<TestBackend, 3>::ones([1, 2, 2], &device) * 3.0;
        let target = Tensor::<TestBackend, 3>::ones([1, 2, 2], &device);

        let value = mse_loss(prediction, target).into_scalar();
        assert!((value - 4.0).abs() < 1e-6);
    }
}
