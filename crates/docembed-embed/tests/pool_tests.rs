use candle_core::{DType, Device, Tensor};
use docembed_embed::masked_mean;
use docembed_embed::pool::l2_normalize;

#[test]
fn masked_mean_ignores_padding() {
    let dev = Device::Cpu;
    // Two tokens with hidden dim 4; second token is masked out.
    let h = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0,  // token 0
                                 5.0, 6.0, 7.0, 8.0],    // token 1
                               (1, 2, 4), &dev).unwrap();
    let mask = Tensor::from_slice(&[1u32, 0u32], (1, 2), &dev).unwrap();
    let out = masked_mean(&h, &mask).unwrap();
    let v: Vec<Vec<f32>> = out.to_vec2().unwrap();
    for (a, b) in v[0].iter().cloned().zip([1.0f32, 2.0, 3.0, 4.0]) {
        assert!((a - b).abs() < 1e-5, "a={} b={}", a, b);
    }
}

#[test]
fn masked_mean_then_normalize() {
    let dev = Device::Cpu;
    // Batch of two; both tokens of row 0 count, only the first of row 1.
    let h = Tensor::from_slice(&[1.0f32, 0.0, 3.0, 0.0,
                                 0.0, 2.0, 9.0, 9.0],
                               (2, 2, 2), &dev).unwrap();
    let mask = Tensor::from_slice(&[1i64, 1, 1, 0], (2, 2), &dev).unwrap()
        .to_dtype(DType::F32).unwrap();
    let rows: Vec<Vec<f32>> = masked_mean(&h, &mask).unwrap().to_vec2().unwrap();
    assert_eq!(rows.len(), 2);
    assert!((rows[0][0] - 2.0).abs() < 1e-5 && rows[0][1].abs() < 1e-5);
    assert!(rows[1][0].abs() < 1e-5 && (rows[1][1] - 2.0).abs() < 1e-5);

    let mut v = rows[1].clone();
    l2_normalize(&mut v);
    assert!((v[1] - 1.0).abs() < 1e-5);
}

#[test]
fn masked_mean_rejects_wrong_rank() {
    let dev = Device::Cpu;
    let h = Tensor::zeros((2, 4), DType::F32, &dev).unwrap();
    let mask = Tensor::ones((2, 1), DType::F32, &dev).unwrap();
    assert!(masked_mean(&h, &mask).is_err());
}
