//! Model configuration for the stacked ConvLSTM.
//!
//! A [`ConvLstmConfig`] describes the whole model: spatial size, channel
//! layout and per-layer kernels. Hidden channels and kernels may be given once
//! and are then broadcast to every layer when the per-layer layout is resolved
//! by [`ConvLstmConfig::layer_configs`].

use std::fs;
use std::path::Path;

use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use crate::error::{ConvLstmError, Result};
use crate::rnn::ConvLstm;

/// Hidden channel count, shared by all layers or given per layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HiddenSpec {
    Single(usize),
    PerLayer(Vec<usize>),
}

impl HiddenSpec {
    /// Replicate a single value `num_layers` times; lists are returned unchanged.
    pub fn extend(&self, num_layers: usize) -> Vec<usize> {
        match self {
            HiddenSpec::Single(channels) => vec![*channels; num_layers],
            HiddenSpec::PerLayer(channels) => channels.clone(),
        }
    }
}

impl From<usize> for HiddenSpec {
    fn from(channels: usize) -> Self {
        HiddenSpec::Single(channels)
    }
}

impl From<Vec<usize>> for HiddenSpec {
    fn from(channels: Vec<usize>) -> Self {
        HiddenSpec::PerLayer(channels)
    }
}

/// Convolution kernel `(height, width)`, shared by all layers or given per layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KernelSpec {
    Single([usize; 2]),
    PerLayer(Vec<[usize; 2]>),
}

impl KernelSpec {
    /// Replicate a single kernel `num_layers` times; lists are returned unchanged.
    pub fn extend(&self, num_layers: usize) -> Vec<[usize; 2]> {
        match self {
            KernelSpec::Single(kernel) => vec![*kernel; num_layers],
            KernelSpec::PerLayer(kernels) => kernels.clone(),
        }
    }
}

impl From<[usize; 2]> for KernelSpec {
    fn from(kernel: [usize; 2]) -> Self {
        KernelSpec::Single(kernel)
    }
}

impl From<(usize, usize)> for KernelSpec {
    fn from((height, width): (usize, usize)) -> Self {
        KernelSpec::Single([height, width])
    }
}

impl From<Vec<[usize; 2]>> for KernelSpec {
    fn from(kernels: Vec<[usize; 2]>) -> Self {
        KernelSpec::PerLayer(kernels)
    }
}

impl From<Vec<(usize, usize)>> for KernelSpec {
    fn from(kernels: Vec<(usize, usize)>) -> Self {
        KernelSpec::PerLayer(kernels.into_iter().map(|(h, w)| [h, w]).collect())
    }
}

/// Resolved layout of a single recurrent layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerConfig {
    pub input_channels: usize,
    pub hidden_channels: usize,
    pub kernel_shape: [usize; 2],
}

fn default_true() -> bool {
    true
}

/// Configuration for [`ConvLstm`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvLstmConfig {
    /// Spatial size of every field, `(height, width)`
    pub input_size: [usize; 2],
    /// Channels of the input fields fed to the first layer
    pub input_dim: usize,
    /// Hidden channels per layer
    pub hidden_dim: HiddenSpec,
    /// Convolution kernel per layer
    pub kernel_size: KernelSpec,
    /// Number of stacked recurrent layers
    pub num_layers: usize,
    /// Input is `[batch, time, ...]` when true, `[time, batch, ...]` otherwise
    #[serde(default = "default_true")]
    pub batch_first: bool,
    /// Whether the cell and readout convolutions carry a bias
    #[serde(default = "default_true")]
    pub bias: bool,
    /// Reserved; no rollout behaviour depends on it yet
    #[serde(default)]
    pub return_all_layers: bool,
}

impl ConvLstmConfig {
    /// Create a configuration with `batch_first` and `bias` enabled.
    pub fn new(
        input_size: [usize; 2],
        input_dim: usize,
        hidden_dim: impl Into<HiddenSpec>,
        kernel_size: impl Into<KernelSpec>,
        num_layers: usize,
    ) -> Self {
        Self {
            input_size,
            input_dim,
            hidden_dim: hidden_dim.into(),
            kernel_size: kernel_size.into(),
            num_layers,
            batch_first: true,
            bias: true,
            return_all_layers: false,
        }
    }

    /// Set whether input is batch-first (default: true)
    pub fn with_batch_first(mut self, batch_first: bool) -> Self {
        self.batch_first = batch_first;
        self
    }

    /// Set whether convolutions use a bias (default: true)
    pub fn with_bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }

    /// Set the reserved `return_all_layers` flag (default: false)
    pub fn with_return_all_layers(mut self, return_all_layers: bool) -> Self {
        self.return_all_layers = return_all_layers;
        self
    }

    /// Broadcast the hidden/kernel specs and chain the per-layer channel counts.
    ///
    /// Layer 0 reads `input_dim` channels; layer `i` reads the hidden channels
    /// of layer `i - 1`.
    pub fn layer_configs(&self) -> Result<Vec<LayerConfig>> {
        if self.num_layers == 0 {
            return Err(ConvLstmError::configuration("num_layers must be at least 1"));
        }
        if self.input_dim == 0 {
            return Err(ConvLstmError::configuration("input_dim must be at least 1"));
        }
        let [height, width] = self.input_size;
        if height == 0 || width == 0 {
            return Err(ConvLstmError::configuration(format!(
                "input_size must be positive, got {height}x{width}"
            )));
        }

        let kernels = self.kernel_size.extend(self.num_layers);
        let hidden = self.hidden_dim.extend(self.num_layers);
        if kernels.len() != self.num_layers || hidden.len() != self.num_layers {
            return Err(ConvLstmError::configuration(format!(
                "Inconsistent list length: {} kernels and {} hidden sizes for {} layers",
                kernels.len(),
                hidden.len(),
                self.num_layers
            )));
        }

        let mut layers = Vec::with_capacity(self.num_layers);
        let mut input_channels = self.input_dim;
        for (index, (kernel, hidden_channels)) in kernels.into_iter().zip(hidden).enumerate() {
            if hidden_channels == 0 {
                return Err(ConvLstmError::configuration(format!(
                    "layer {index}: hidden channels must be at least 1"
                )));
            }
            // Even kernels with `k / 2` padding would change the spatial size.
            if kernel.iter().any(|&k| k == 0 || k % 2 == 0) {
                return Err(ConvLstmError::configuration(format!(
                    "layer {index}: kernel {:?} must have positive odd components",
                    kernel
                )));
            }
            layers.push(LayerConfig {
                input_channels,
                hidden_channels,
                kernel_shape: kernel,
            });
            input_channels = hidden_channels;
        }

        Ok(layers)
    }

    /// Check the configuration without building a model.
    pub fn validate(&self) -> Result<()> {
        self.layer_configs().map(|_| ())
    }

    /// Build the model on `device`.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<ConvLstm<B>> {
        ConvLstm::new(self, device)
    }

    /// Encode as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode and validate a JSON configuration.
    ///
    /// A `kernel_size` that is neither a pair nor a list of pairs is reported
    /// as a configuration error, like any other inconsistency.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            ConvLstmError::configuration(format!("malformed configuration: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration to `path` as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read and validate a configuration written by [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
