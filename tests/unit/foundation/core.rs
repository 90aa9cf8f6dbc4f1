use super::*;

#[test]
fn frame_start_times_follow_rational_fps() {
    let fps = Fps::new(30000, 1001).unwrap();
    assert!((fps.frames_to_secs(30) - 1.001).abs() < 1e-12);
    assert_eq!(Fps::integer(30).frames_to_secs(0), 0.0);
}

#[test]
fn fps_rejects_zero_parts() {
    assert!(Fps::new(0, 1).is_err());
    assert!(Fps::new(30, 0).is_err());
}

#[test]
fn ten_seconds_at_thirty_is_three_hundred_frames() {
    let fps = Fps::integer(30);
    assert_eq!(fps.secs_to_frames_round(10.0), 300);
    assert_eq!(fps.secs_to_frames_round(10.01), 300);
    assert_eq!(fps.secs_to_frames_round(10.02), 301);
}

#[test]
fn frame_to_sample_is_exact_for_integer_rates() {
    let fps = Fps::integer(30);
    assert_eq!(fps.frame_to_sample(0, 44_100), 0);
    assert_eq!(fps.frame_to_sample(1, 44_100), 1_470);
    assert_eq!(fps.frame_to_sample(300, 44_100), 441_000);
}

#[test]
fn frame_to_sample_uses_rational_fps() {
    let fps = Fps::new(30000, 1001).unwrap();
    let samples = fps.frame_to_sample(300, 48_000);
    assert!(samples > 470_000 && samples < 490_000);
}

#[test]
fn premul_conversion_rounds() {
    let c = Rgba8Premul::from_straight_rgba(255, 0, 128, 128);
    assert_eq!(c.to_array(), [128, 0, 64, 128]);
    assert_eq!(Rgba8Premul::transparent().to_array(), [0, 0, 0, 0]);
}

#[test]
fn fps_display_is_compact() {
    assert_eq!(Fps::integer(30).to_string(), "30");
    assert_eq!(Fps::new(30000, 1001).unwrap().to_string(), "30000/1001");
}
