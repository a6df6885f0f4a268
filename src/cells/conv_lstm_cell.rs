use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::PaddingConfig2d;
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::RecurrentCell;
use crate::config::LayerConfig;
use crate::state::LayerState;

/// Convolutional LSTM cell
///
/// One convolution over the channel concatenation of input and hidden state
/// produces all four gates:
/// - i = sigmoid(W_i * [x, h] + b_i)
/// - f = sigmoid(W_f * [x, h] + b_f)
/// - o = sigmoid(W_o * [x, h] + b_o)
/// - g = tanh(W_g * [x, h] + b_g)
/// - c' = f ⊙ c + i ⊙ g
/// - h' = o ⊙ tanh(c')
///
/// Padding is `kernel / 2` on each axis so fields keep their spatial size.
#[derive(Module, Debug)]
pub struct ConvLstmCell<B: Backend> {
    gates: Conv2d<B>, // Maps input + hidden channels to 4 * hidden channels
    #[module(skip)]
    input_dim: usize,
    #[module(skip)]
    hidden_dim: usize,
    #[module(skip)]
    kernel_height: usize,
    #[module(skip)]
    kernel_width: usize,
    #[module(skip)]
    height: usize,
    #[module(skip)]
    width: usize,
}

impl<B: Backend> ConvLstmCell<B> {
    /// Create a new ConvLSTM cell
    ///
    /// # Arguments
    /// * `layer` - Channel counts and kernel shape of this layer
    /// * `input_size` - Spatial size `(height, width)` of the fields
    /// * `bias` - Whether the gate convolution has a bias
    /// * `device` - Device to create the module on
    pub fn new(layer: &LayerConfig, input_size: [usize; 2], bias: bool, device: &B::Device) -> Self {
        let [kernel_height, kernel_width] = layer.kernel_shape;
        let gates = Conv2dConfig::new(
            [layer.input_channels + layer.hidden_channels, 4 * layer.hidden_channels],
            layer.kernel_shape,
        )
        .with_padding(PaddingConfig2d::Explicit(kernel_height / 2, kernel_width / 2))
        .with_bias(bias)
        .init(device);

        Self {
            gates,
            input_dim: layer.input_channels,
            hidden_dim: layer.hidden_channels,
            kernel_height,
            kernel_width,
            height: input_size[0],
            width: input_size[1],
        }
    }

    /// Get the input channel count
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Get the hidden channel count
    pub fn hidden_dim(&self) -> usize {
        self.hidden_dim
    }

    /// Get the kernel shape `(height, width)`
    pub fn kernel_size(&self) -> [usize; 2] {
        [self.kernel_height, self.kernel_width]
    }

    /// Perform a forward pass through the cell
    ///
    /// # Arguments
    /// * `input` - Input field of shape `[batch, input_dim, height, width]`
    /// * `states` - Tuple of (hidden, cell), each `[batch, hidden_dim, height, width]`
    ///
    /// # Returns
    /// Tuple of (new_hidden, new_cell)
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
        states: (Tensor<B, 4>, Tensor<B, 4>),
    ) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let (hidden, cell) = states;

        let combined = Tensor::cat(vec![input, hidden], 1);
        let z = self.gates.forward(combined);

        let chunks = z.chunk(4, 1);
        let input_gate = activation::sigmoid(chunks[0].clone());
        let forget_gate = activation::sigmoid(chunks[1].clone());
        let output_gate = activation::sigmoid(chunks[2].clone());
        let candidate = chunks[3].clone().tanh();

        let new_cell = forget_gate * cell + input_gate * candidate;
        let new_hidden = output_gate * new_cell.clone().tanh();

        (new_hidden, new_cell)
    }
}

impl<B: Backend> RecurrentCell<B> for ConvLstmCell<B> {
    fn input_channels(&self) -> usize {
        self.input_dim
    }

    fn hidden_channels(&self) -> usize {
        self.hidden_dim
    }

    fn step(&self, input: Tensor<B, 4>, state: LayerState<B>) -> LayerState<B> {
        self.forward(input, (state.hidden, state.cell)).into()
    }

    fn init_hidden(&self, batch_size: usize, device: &B::Device) -> LayerState<B> {
        LayerState::zeros([batch_size, self.hidden_dim, self.height, self.width], device)
    }
}
