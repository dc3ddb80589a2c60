use beatfx::distortion::{DistortionKind, DistortionStage, KIND_DWELL};
use beatfx::frame::Frame;
use std::time::{Duration, Instant};

fn gradient(w: usize, h: usize) -> Frame {
    let mut f = Frame::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let r = (x * 255 / w.max(1)) as u8;
            let g = (y * 255 / h.max(1)) as u8;
            f.set_pixel(x, y, [r, g, 255 - r / 2]);
        }
    }
    f
}

fn mean_abs_rgb_diff(a: &Frame, b: &Frame) -> f32 {
    let n = a.data().len().max(1) as f32;
    a.data()
        .iter()
        .zip(b.data())
        .map(|(&x, &y)| (x as i32 - y as i32).unsigned_abs() as f32)
        .sum::<f32>()
        / n
}

#[test]
fn level_zero_is_identity() {
    let mut stage = DistortionStage::with_seed(0.0, 7);
    let input = gradient(64, 48);
    let start = Instant::now();
    for i in 0..20u64 {
        let out = stage.apply(input.clone(), start + Duration::from_millis(500 * i));
        assert_eq!(out, input, "level 0 must pass frames through untouched");
    }
}

#[test]
fn level_is_clamped_to_range() {
    let mut stage = DistortionStage::with_seed(250.0, 1);
    assert_eq!(stage.level(), 100.0);
    stage.set_level(-5.0);
    assert_eq!(stage.level(), 0.0);
    stage.set_level(f32::NAN);
    assert_eq!(stage.level(), 0.0);
    stage.set_level(42.5);
    assert_eq!(stage.level(), 42.5);
}

#[test]
fn full_level_changes_the_frame_for_every_seed() {
    let input = gradient(96, 64);
    for seed in 0..12u64 {
        let mut stage = DistortionStage::with_seed(100.0, seed);
        let kind = stage.kind();
        let out = stage.apply(input.clone(), Instant::now());
        assert_eq!((out.width(), out.height()), (96, 64));
        assert!(
            mean_abs_rgb_diff(&input, &out) > 0.0,
            "{} at level 100 left the frame unchanged",
            kind.label()
        );
    }
}

#[test]
fn lower_level_stays_closer_to_the_input() {
    let input = gradient(96, 64);
    let now = Instant::now();
    let mut low = DistortionStage::with_seed(10.0, 3);
    let mut high = DistortionStage::with_seed(100.0, 3);
    assert_eq!(low.kind(), high.kind(), "same seed should start on the same kind");
    let d_low = mean_abs_rgb_diff(&input, &low.apply(input.clone(), now));
    let d_high = mean_abs_rgb_diff(&input, &high.apply(input.clone(), now));
    assert!(d_low < d_high, "level 10 diff {d_low} should be below level 100 diff {d_high}");
}

#[test]
fn kind_changes_at_most_once_per_dwell() {
    let mut stage = DistortionStage::with_seed(60.0, 11);
    let input = gradient(32, 24);
    let start = Instant::now();
    let mut kind = stage.kind();
    let mut last_change = start;
    let mut changes = 0;

    for i in 0..300u64 {
        let now = start + Duration::from_millis(50 * i);
        stage.apply(input.clone(), now);
        if stage.kind() != kind {
            assert!(
                now.duration_since(last_change) >= KIND_DWELL,
                "kind changed after only {:?}",
                now.duration_since(last_change)
            );
            kind = stage.kind();
            last_change = now;
            changes += 1;
        }
    }
    // 15 s of frames allows at most five re-picks.
    assert!(changes <= 5, "{changes} kind changes in 15 s");
}

#[test]
fn every_kind_has_a_label() {
    let labels = DistortionKind::ALL.map(|k| k.label());
    for (i, a) in labels.iter().enumerate() {
        assert!(!a.is_empty());
        assert!(labels[i + 1..].iter().all(|b| b != a), "duplicate label {a}");
    }
}

#[test]
fn empty_frame_passes_through() {
    let mut stage = DistortionStage::with_seed(100.0, 5);
    let out = stage.apply(Frame::new(0, 0), Instant::now());
    assert!(out.is_empty());
}
