//! Basic usage of the stacked ConvLSTM
//!
//! Builds a two-layer model, runs a teacher-forced training rollout and a
//! validation rollout, and shows the shapes that come back.

use burn::backend::NdArray;
use burn::tensor::Tensor;
use convlstm::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn main() -> convlstm::Result<()> {
    println!("=== ConvLSTM Basic Example ===\n");

    // Use the NdArray backend (CPU)
    type Backend = NdArray<f32>;
    let device = Default::default();
    let mut rng = StdRng::seed_from_u64(42);

    // Example 1: Batch-first training rollout
    println!("Example 1: Teacher-forced training rollout");
    let model = ConvLstmConfig::new([16, 16], 1, vec![8, 8], vec![(3, 3), (3, 3)], 2)
        .init::<Backend>(&device)?;

    println!("Created ConvLSTM:");
    println!("  Layers: {}", model.num_layers());
    println!("  Hidden channels: {:?}", model.hidden_dims());
    println!("  Kernels: {:?}", model.kernel_sizes());
    println!();

    // Input shape: [batch=2, seq=5, channels=1, height=16, width=16]
    let input = Tensor::<Backend, 5>::random(
        [2, 5, 1, 16, 16],
        burn::tensor::Distribution::Uniform(0.0, 1.0),
        &device,
    );
    let (predictions, state) = model.forward_train(input, None, 1.0, &mut rng)?;

    println!("  Input shape:       [2, 5, 1, 16, 16]");
    println!("  Predictions shape: {:?}", predictions.dims());
    println!("  State layers:      {}", state.num_layers());
    println!();

    // Example 2: Time-first input
    println!("Example 2: Time-first input");
    let model_tf = ConvLstmConfig::new([16, 16], 1, 4, [5, 5], 1)
        .with_batch_first(false)
        .init::<Backend>(&device)?;

    // Input shape: [seq=6, batch=1, channels=1, height=16, width=16]
    let input_tf = Tensor::<Backend, 5>::random(
        [6, 1, 1, 16, 16],
        burn::tensor::Distribution::Uniform(0.0, 1.0),
        &device,
    );
    let (predictions_tf, _) = model_tf.forward_train(input_tf, None, 0.5, &mut rng)?;

    println!("  Input shape:       [6, 1, 1, 16, 16]");
    println!("  Predictions shape: {:?}", predictions_tf.dims());
    println!();

    // Example 3: Validation rollout continuing from the training state
    println!("Example 3: Validation rollout");
    let dev_x = Tensor::<Backend, 5>::random(
        [2, 4, 1, 16, 16],
        burn::tensor::Distribution::Uniform(0.0, 1.0),
        &device,
    );
    let dev_y = Tensor::<Backend, 4>::random(
        [4, 2, 16, 16],
        burn::tensor::Distribution::Uniform(0.0, 1.0),
        &device,
    );
    let (losses, _) = model.forward_validation(dev_x, Some(state), &mse_loss::<Backend>, dev_y)?;

    println!("  Per-step losses: {:?}", losses);
    println!();

    println!("=== Examples completed successfully! ===");
    Ok(())
}
