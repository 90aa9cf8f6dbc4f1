use super::*;
use crate::assets::decode::{AudioPcm, PreparedImage};
use crate::render::source::{MemorySource, StillSource};
use crate::waveform::{WaveformSpec, render};

const RED: [u8; 4] = [255, 0, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];
const BLACK: [u8; 4] = [0, 0, 0, 255];

fn profile() -> OutputProfile {
    OutputProfile::standard().with_canvas(16, 9)
}

fn solid(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
    FrameRGBA::filled(w, h, px).data
}

fn still(w: u32, h: u32, px: [u8; 4]) -> Box<dyn FrameSource> {
    Box::new(StillSource::new(PreparedImage {
        width: w,
        height: h,
        rgba8_premul: solid(w, h, px),
    }))
}

fn collect(mut c: Compositor<'_>) -> Vec<FrameRGBA> {
    let mut out = Vec::new();
    while let Some((idx, frame)) = c.next_frame().unwrap() {
        assert_eq!(idx.0, out.len() as u64);
        out.push(frame.clone());
    }
    out
}

fn waveform(samples: Vec<f32>, frames: u64) -> WaveformFrames {
    let spec = WaveformSpec {
        enabled: true,
        bars: 4,
        sample_rate: 300,
        height_fraction: 0.5,
        ..WaveformSpec::default()
    };
    let pcm = AudioPcm {
        sample_rate: 300,
        samples,
    };
    render(&pcm, &spec, profile().fps(), profile().canvas(), frames).unwrap()
}

#[test]
fn fit_preserves_aspect_and_centres() {
    let hd = Canvas {
        width: 1920,
        height: 1080,
    };
    let full = FitRect {
        x: 0,
        y: 0,
        width: 1920,
        height: 1080,
    };
    assert_eq!(fit_within(1280, 720, hd).unwrap(), full);
    assert_eq!(
        fit_within(1000, 1000, hd).unwrap(),
        FitRect {
            x: 420,
            y: 0,
            width: 1080,
            height: 1080
        }
    );
    assert_eq!(
        fit_within(640, 480, hd).unwrap(),
        FitRect {
            x: 240,
            y: 0,
            width: 1440,
            height: 1080
        }
    );
    assert_eq!(
        fit_within(1080, 1920, hd).unwrap(),
        FitRect {
            x: 656,
            y: 0,
            width: 608,
            height: 1080
        }
    );
    assert_eq!(
        fit_within(3840, 1080, hd).unwrap(),
        FitRect {
            x: 0,
            y: 270,
            width: 1920,
            height: 540
        }
    );
    assert!(fit_within(0, 10, hd).is_err());
}

#[test]
fn still_hold_repeats_the_letterboxed_image() {
    let plan = AlignmentPlan::StillHold { hold_duration: 0.1 };
    let c = Compositor::new(&profile(), plan, still(9, 9, RED), None).unwrap();
    assert_eq!(c.total_frames(), 3);
    assert_eq!(
        c.fit(),
        FitRect {
            x: 3,
            y: 0,
            width: 9,
            height: 9
        }
    );

    let frames = collect(c);
    assert_eq!(frames.len(), 3);
    assert!(frames.iter().all(|f| f == &frames[0]));
    let f = &frames[0];
    assert_eq!((f.width, f.height), (16, 9));
    assert_eq!(f.pixel(0, 0), Some(BLACK));
    assert_eq!(f.pixel(2, 8), Some(BLACK));
    assert_eq!(f.pixel(3, 0), Some(RED));
    assert_eq!(f.pixel(11, 8), Some(RED));
    assert_eq!(f.pixel(12, 4), Some(BLACK));
}

#[test]
fn translucent_sources_are_flattened_over_the_pad() {
    let half_red = Rgba8Premul::from_straight_rgba(255, 0, 0, 128).to_array();
    let plan = AlignmentPlan::StillHold { hold_duration: 0.05 };
    let frames = collect(Compositor::new(&profile(), plan, still(16, 9, half_red), None).unwrap());
    assert_eq!(frames[0].pixel(5, 5), Some([128, 0, 0, 255]));
}

#[test]
fn oversized_sources_are_scaled_down() {
    let plan = AlignmentPlan::StillHold { hold_duration: 0.05 };
    let frames = collect(Compositor::new(&profile(), plan, still(64, 36, BLUE), None).unwrap());
    let px = frames[0].pixel(8, 4).unwrap();
    assert!(px[2] >= 254 && px[0] <= 1 && px[3] == 255, "{px:?}");
}

#[test]
fn loops_never_show_the_pad() {
    // Two source frames at 10 fps: a 0.2 s clip looped out to 0.5 s.
    let source =
        MemorySource::new(16, 9, 10.0, vec![solid(16, 9, RED), solid(16, 9, BLUE)]).unwrap();
    let plan = AlignmentPlan::Loop {
        loop_count: 2,
        source_duration: 0.2,
        trim_point: 0.5,
    };
    let frames = collect(Compositor::new(&profile(), plan, Box::new(source), None).unwrap());
    assert_eq!(frames.len(), 15);

    let mut saw = (false, false);
    for (i, f) in frames.iter().enumerate() {
        let px = f.pixel(0, 0).unwrap();
        assert!(px == RED || px == BLUE, "frame {i} shows {px:?}");
        saw.0 |= px == RED;
        saw.1 |= px == BLUE;
    }
    assert!(saw.0 && saw.1);
    assert_eq!(frames[0], frames[1]);
    assert_eq!(frames[4].pixel(0, 0), Some(BLUE));
    assert_eq!(frames[8].pixel(0, 0), Some(RED));
}

#[test]
fn overlay_only_touches_the_bottom_strip() {
    let plan = AlignmentPlan::StillHold { hold_duration: 0.1 };
    let wf = waveform(vec![0.9; 30], 3);
    let plain = collect(Compositor::new(&profile(), plan, still(16, 9, BLUE), None).unwrap());
    let overlaid =
        collect(Compositor::new(&profile(), plan, still(16, 9, BLUE), Some(&wf)).unwrap());

    assert_eq!(plain.len(), overlaid.len());
    let origin = wf.origin_y();
    for (p, o) in plain.iter().zip(&overlaid) {
        let top = (origin * 16 * 4) as usize;
        assert_eq!(p.data[..top], o.data[..top]);
        assert_ne!(p.data[top..], o.data[top..]);
        assert_eq!(o.pixel(0, 8).map(|px| px[3]), Some(255));
    }
}

#[test]
fn silent_overlay_is_byte_identical_to_no_overlay() {
    let plan = AlignmentPlan::StillHold { hold_duration: 0.1 };
    let wf = waveform(vec![0.0; 30], 3);
    let plain = collect(Compositor::new(&profile(), plan, still(9, 9, RED), None).unwrap());
    let overlaid = collect(Compositor::new(&profile(), plan, still(9, 9, RED), Some(&wf)).unwrap());
    assert_eq!(plain, overlaid);
}

#[test]
fn overlay_length_must_match_output() {
    let plan = AlignmentPlan::StillHold { hold_duration: 0.1 };
    let wf = waveform(vec![0.5; 30], 4);
    let err = Compositor::new(&profile(), plan, still(9, 9, RED), Some(&wf))
        .err()
        .unwrap();
    assert!(matches!(err, MixerError::Validation(_)));
}

#[test]
fn memory_source_validates_frames() {
    assert!(MemorySource::new(2, 2, 30.0, vec![]).is_err());
    assert!(MemorySource::new(2, 2, 30.0, vec![vec![0; 3]]).is_err());
    assert!(MemorySource::new(2, 2, 0.0, vec![vec![0; 16]]).is_err());

    let mut src = MemorySource::new(1, 1, 10.0, vec![vec![1; 4], vec![2; 4]]).unwrap();
    assert_eq!(src.frame_at(0.15), 1);
    assert_eq!(src.read(99).unwrap(), &[2, 2, 2, 2]);
}
