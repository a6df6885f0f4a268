//! Moving gridded sequences between host `ndarray` arrays and Burn tensors.
//!
//! Observation archives are usually loaded into host arrays; these helpers
//! place them on a device with the axis order preserved.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use ndarray::{Array4, Array5};

use crate::error::{ConvLstmError, Result};

/// Convert a host sequence (`[batch, time, channels, height, width]` or the
/// time-first equivalent) into a tensor on `device`.
pub fn sequence_from_ndarray<B: Backend>(arr: &Array5<f32>, device: &B::Device) -> Tensor<B, 5> {
    let shape = arr.shape();
    let data: Vec<f32> = arr.iter().copied().collect();
    Tensor::<B, 1>::from_floats(data.as_slice(), device)
        .reshape([shape[0], shape[1], shape[2], shape[3], shape[4]])
}

/// Convert host target fields `[time, batch, height, width]` into a tensor on `device`.
pub fn fields_from_ndarray<B: Backend>(arr: &Array4<f32>, device: &B::Device) -> Tensor<B, 4> {
    let shape = arr.shape();
    let data: Vec<f32> = arr.iter().copied().collect();
    Tensor::<B, 1>::from_floats(data.as_slice(), device)
        .reshape([shape[0], shape[1], shape[2], shape[3]])
}

/// Copy stacked predictions `[time, batch, height, width]` back to the host.
pub fn fields_to_ndarray<B: Backend>(tensor: Tensor<B, 4>) -> Result<Array4<f32>> {
    let [time, batch, height, width] = tensor.dims();
    let data = tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| ConvLstmError::precondition(format!("cannot read tensor data: {e:?}")))?;
    Array4::from_shape_vec((time, batch, height, width), data).map_err(|e| {
        ConvLstmError::shape_mismatch(format!("[{time}, {batch}, {height}, {width}]"), e.to_string())
    })
}
