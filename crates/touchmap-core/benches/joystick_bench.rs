//! Criterion benchmarks for joystick quantization and sub-pixel accumulation.
//!
//! Run with:
//! ```bash
//! cargo bench --package touchmap-core --bench joystick_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use touchmap_core::mapping::{Joystick, JoystickTunables, SubPixelAccumulator};

fn bench_joystick_circle(c: &mut Criterion) {
    let tunables = JoystickTunables {
        deadzone: 0.2,
        hysteresis_deg: 5.0,
        inner_radius_px: 80.0,
        outer_radius_px: 350.0,
    };
    let path: Vec<(f64, f64)> = (0..360)
        .map(|deg| {
            let rad = (deg as f64).to_radians();
            (200.0 + 120.0 * rad.cos(), 900.0 + 120.0 * rad.sin())
        })
        .collect();

    c.bench_function("joystick_full_circle", |b| {
        b.iter(|| {
            let mut stick = Joystick::new((200.0, 900.0));
            for &finger in &path {
                black_box(stick.update(finger, &tunables));
            }
        })
    });
}

fn bench_accumulator(c: &mut Criterion) {
    c.bench_function("accumulator_1000_samples", |b| {
        b.iter(|| {
            let mut acc = SubPixelAccumulator::new();
            for i in 0..1000 {
                black_box(acc.push(0.37 * (i % 7) as f64, -0.21 * (i % 5) as f64));
            }
        })
    });
}

criterion_group!(benches, bench_joystick_circle, bench_accumulator);
criterion_main!(benches);
