//! Nowcasting Demo - stateful training over consecutive sequences
//!
//! Trains nothing (optimizer logic is up to the caller) but walks through the
//! rollouts a nowcasting loop performs: monthly sequences with carried-over
//! state, a decaying scheduled-sampling probability and a validation pass.
//! Set `RUST_LOG=convlstm=trace` to see every sampling decision.

use burn::backend::{Autodiff, NdArray};
use burn::tensor::Tensor;
use convlstm::prelude::*;
use convlstm::sequence::{fields_from_ndarray, fields_to_ndarray, sequence_from_ndarray};
use ndarray::{Array4, Array5};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

/// A blob drifting one cell to the right per timestep.
fn drifting_blob(seq_len: usize, size: usize) -> Array5<f32> {
    Array5::from_shape_fn((1, seq_len, 1, size, size), |(_, t, _, h, w)| {
        let dx = w as f32 - (2 + t) as f32;
        let dy = h as f32 - (size / 2) as f32;
        (-(dx * dx + dy * dy) / 4.0).exp()
    })
}

fn main() -> convlstm::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== ConvLSTM Nowcasting Demo ===\n");

    type Backend = Autodiff<NdArray<f32>>;
    let device = Default::default();
    let mut rng = StdRng::seed_from_u64(2024);

    let config = ConvLstmConfig::new([12, 12], 1, vec![8, 4], [3, 3], 2);
    println!("Configuration:\n{}\n", config.to_json()?);
    let model = config.init::<Backend>(&device)?;

    let schedule = EpsilonSchedule::InverseSigmoid { k: 3.0 };
    let months = 4;
    let seq_len = 6;
    let size = 12;

    println!("Training rollouts:");
    let mut state: Option<RecurrentState<Backend>> = None;
    for step in 0..months {
        let observations = drifting_blob(seq_len + 1, size);
        let input = sequence_from_ndarray::<Backend>(&observations, &device);
        let inputs = input.clone().narrow(1, 0, seq_len);
        // Targets are the next field: [seq, batch, height, width]
        let targets: Tensor<Backend, 4> = input
            .narrow(1, 1, seq_len)
            .swap_dims(0, 1)
            .reshape([seq_len, 1, size, size]);

        let epsilon = schedule.epsilon_at(step)?;
        let (predictions, next) = model.forward_train(inputs, state.take(), epsilon, &mut rng)?;

        let loss = mse_loss(
            predictions.reshape([seq_len, size, size]),
            targets.reshape([seq_len, size, size]),
        );
        // A real loop would step an optimizer with these gradients.
        let _grads = loss.clone().backward();

        println!(
            "  month {step}: epsilon {epsilon:.3}, loss {:.5}",
            loss.into_scalar()
        );
        state = Some(next);
    }
    println!();

    println!("Validation rollout:");
    let observations = drifting_blob(seq_len + 1, size);
    let dev_x = sequence_from_ndarray::<Backend>(&observations, &device).narrow(1, 0, seq_len);
    let dev_y = fields_from_ndarray::<Backend>(
        &Array4::from_shape_fn((seq_len, 1, size, size), |(t, _, h, w)| {
            observations[[0, t + 1, 0, h, w]]
        }),
        &device,
    );
    let (losses, _) = model.forward_validation(dev_x.clone(), state.clone(), &mse_loss::<Backend>, dev_y)?;
    for (t, loss) in losses.iter().enumerate() {
        println!("  t+{}: {:.5}", t + 1, loss);
    }
    println!();

    let (forecast, _) = model.forward_train(dev_x, state, 0.0, &mut rng)?;
    let forecast = fields_to_ndarray(forecast)?;
    println!("Forecast array on host: {:?}", forecast.shape());

    println!("\n=== Nowcasting Demo completed! ===");
    Ok(())
}
