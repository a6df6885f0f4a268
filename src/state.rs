//! Recurrent state carried between timesteps and across sequences.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::error::{ConvLstmError, Result};

/// `(hidden, cell)` pair of one recurrent layer, each `[batch, hidden, height, width]`.
#[derive(Debug, Clone)]
pub struct LayerState<B: Backend> {
    pub hidden: Tensor<B, 4>,
    pub cell: Tensor<B, 4>,
}

impl<B: Backend> LayerState<B> {
    pub fn new(hidden: Tensor<B, 4>, cell: Tensor<B, 4>) -> Self {
        Self { hidden, cell }
    }

    /// Zero-valued state of the given `[batch, hidden, height, width]` shape.
    pub fn zeros(shape: [usize; 4], device: &B::Device) -> Self {
        Self {
            hidden: Tensor::zeros(shape, device),
            cell: Tensor::zeros(shape, device),
        }
    }

    /// Sever both fields from the autodiff graph, keeping their values.
    pub fn detach(self) -> Self {
        Self {
            hidden: self.hidden.detach(),
            cell: self.cell.detach(),
        }
    }

    pub fn dims(&self) -> [usize; 4] {
        self.hidden.dims()
    }

    fn check(&self, index: usize, expected: [usize; 4]) -> Result<()> {
        for (name, dims) in [("hidden", self.hidden.dims()), ("cell", self.cell.dims())] {
            if dims != expected {
                return Err(ConvLstmError::shape_mismatch(
                    format!("layer {index} {name} state {expected:?}"),
                    format!("{dims:?}"),
                ));
            }
        }
        Ok(())
    }
}

impl<B: Backend> From<(Tensor<B, 4>, Tensor<B, 4>)> for LayerState<B> {
    fn from((hidden, cell): (Tensor<B, 4>, Tensor<B, 4>)) -> Self {
        Self { hidden, cell }
    }
}

/// Ordered per-layer states of a stacked recurrent model.
#[derive(Debug, Clone)]
pub struct RecurrentState<B: Backend> {
    layers: Vec<LayerState<B>>,
}

impl<B: Backend> RecurrentState<B> {
    pub fn new(layers: Vec<LayerState<B>>) -> Self {
        Self { layers }
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layer(&self, index: usize) -> Option<&LayerState<B>> {
        self.layers.get(index)
    }

    pub fn layers(&self) -> &[LayerState<B>] {
        &self.layers
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LayerState<B>> {
        self.layers.iter()
    }

    pub fn into_layers(self) -> Vec<LayerState<B>> {
        self.layers
    }

    /// Hidden field of the top (last) layer.
    pub fn top_hidden(&self) -> Option<&Tensor<B, 4>> {
        self.layers.last().map(|layer| &layer.hidden)
    }

    /// Batch size shared by all layers, `None` when empty.
    pub fn batch_size(&self) -> Option<usize> {
        self.layers.first().map(|layer| layer.dims()[0])
    }

    /// Detach every layer so a carried-over state does not extend the
    /// previous sequence's graph.
    pub fn detach(self) -> Self {
        Self {
            layers: self.layers.into_iter().map(LayerState::detach).collect(),
        }
    }

    /// Verify that layer `i` is shaped `expected[i]`.
    pub fn check_shapes(&self, expected: &[[usize; 4]]) -> Result<()> {
        if self.layers.len() != expected.len() {
            return Err(ConvLstmError::shape_mismatch(
                format!("{} layer states", expected.len()),
                format!("{}", self.layers.len()),
            ));
        }
        self.layers
            .iter()
            .zip(expected)
            .enumerate()
            .try_for_each(|(index, (layer, &dims))| layer.check(index, dims))
    }
}

impl<B: Backend> IntoIterator for RecurrentState<B> {
    type Item = LayerState<B>;
    type IntoIter = std::vec::IntoIter<LayerState<B>>;

    fn into_iter(self) -> Self::IntoIter {
        self.layers.into_iter()
    }
}

impl<B: Backend> FromIterator<LayerState<B>> for RecurrentState<B> {
    fn from_iter<I: IntoIterator<Item = LayerState<B>>>(iter: I) -> Self {
        Self {
            layers: iter.into_iter().collect(),
        }
    }
}
