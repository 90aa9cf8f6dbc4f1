use super::*;

fn parse(json: &str) -> ProbeOutput {
    serde_json::from_str(json).unwrap()
}

#[test]
fn mp4_with_audio_is_video() {
    let out = parse(
        r#"{
            "streams": [
                { "codec_type": "video", "codec_name": "h264", "width": 1280, "height": 720,
                  "avg_frame_rate": "30000/1001", "r_frame_rate": "30000/1001",
                  "duration": "4.004000", "disposition": { "attached_pic": 0 } },
                { "codec_type": "audio", "codec_name": "aac", "sample_rate": "48000",
                  "channels": 2, "duration": "4.100000" }
            ],
            "format": { "format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": "4.100000" }
        }"#,
    );
    let info = classify(Path::new("clip.mp4"), &out).unwrap();
    let MediaInfo::Video {
        duration,
        width,
        height,
        frame_rate,
        rotation,
    } = info
    else {
        panic!("expected video, got {info:?}");
    };
    // Stream duration wins over the container's.
    assert!((duration - 4.004).abs() < 1e-9);
    assert_eq!((width, height), (1280, 720));
    assert!((frame_rate - 29.97).abs() < 0.01);
    assert_eq!(rotation, 0);
}

fn portrait_clip(rotation_json: &str) -> MediaAsset {
    let out = parse(&format!(
        r#"{{
            "streams": [
                {{ "codec_type": "video", "width": 1920, "height": 1080,
                   "avg_frame_rate": "30/1", "duration": "3.0", {rotation_json} }}
            ],
            "format": {{ "format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": "3.0" }}
        }}"#
    ));
    MediaAsset::new("phone.mp4", classify(Path::new("phone.mp4"), &out).unwrap())
}

#[test]
fn display_matrix_rotation_swaps_display_size() {
    let clip = portrait_clip(
        r#""side_data_list": [ { "side_data_type": "Display Matrix", "rotation": -90 } ]"#,
    );
    assert!(matches!(clip.info(), MediaInfo::Video { rotation: 270, .. }));
    assert_eq!(clip.dimensions(), Some((1920, 1080)));
    assert_eq!(clip.display_dimensions(), Some((1080, 1920)));
}

#[test]
fn legacy_rotate_tag_is_honoured() {
    let clip = portrait_clip(r#""tags": { "rotate": "90" }"#);
    assert!(matches!(clip.info(), MediaInfo::Video { rotation: 90, .. }));
    assert_eq!(clip.display_dimensions(), Some((1080, 1920)));
}

#[test]
fn half_turn_keeps_display_size() {
    let clip = portrait_clip(
        r#""side_data_list": [ { "side_data_type": "Display Matrix", "rotation": 180 } ]"#,
    );
    assert!(matches!(clip.info(), MediaInfo::Video { rotation: 180, .. }));
    assert_eq!(clip.display_dimensions(), Some((1920, 1080)));
}

#[test]
fn mp3_with_cover_art_is_audio() {
    let out = parse(
        r#"{
            "streams": [
                { "codec_type": "audio", "codec_name": "mp3", "sample_rate": "44100",
                  "channels": 2, "duration": "181.34" },
                { "codec_type": "video", "codec_name": "mjpeg", "width": 500, "height": 500,
                  "r_frame_rate": "90000/1", "disposition": { "attached_pic": 1 } }
            ],
            "format": { "format_name": "mp3", "duration": "181.34" }
        }"#,
    );
    let info = classify(Path::new("song.mp3"), &out).unwrap();
    assert_eq!(
        info,
        MediaInfo::Audio {
            duration: 181.34,
            sample_rate: 44_100,
            channels: 2
        }
    );
}

#[test]
fn png_pipe_is_image_regardless_of_extension() {
    let out = parse(
        r#"{
            "streams": [
                { "codec_type": "video", "codec_name": "png", "width": 800, "height": 600,
                  "r_frame_rate": "25/1", "avg_frame_rate": "0/0" }
            ],
            "format": { "format_name": "png_pipe" }
        }"#,
    );
    let info = classify(Path::new("looks_like_video.mp4"), &out).unwrap();
    assert_eq!(
        info,
        MediaInfo::Image {
            width: 800,
            height: 600
        }
    );
}

#[test]
fn image2_demuxer_is_image() {
    let out = parse(
        r#"{
            "streams": [ { "codec_type": "video", "codec_name": "mjpeg", "width": 64, "height": 32 } ],
            "format": { "format_name": "image2", "duration": "0.040000" }
        }"#,
    );
    assert!(matches!(
        classify(Path::new("a.jpg"), &out).unwrap(),
        MediaInfo::Image { width: 64, height: 32 }
    ));
}

#[test]
fn falls_back_to_r_frame_rate_and_format_duration() {
    let out = parse(
        r#"{
            "streams": [
                { "codec_type": "video", "width": 320, "height": 240,
                  "avg_frame_rate": "0/0", "r_frame_rate": "24/1" }
            ],
            "format": { "format_name": "matroska,webm", "duration": "2.500000" }
        }"#,
    );
    let info = classify(Path::new("a.webm"), &out).unwrap();
    assert!(matches!(
        info,
        MediaInfo::Video { duration, frame_rate, .. } if duration == 2.5 && frame_rate == 24.0
    ));
}

#[test]
fn zero_duration_audio_is_unreadable() {
    let out = parse(
        r#"{
            "streams": [ { "codec_type": "audio", "sample_rate": "44100", "duration": "0.000000" } ],
            "format": { "format_name": "wav", "duration": "0.000000" }
        }"#,
    );
    let err = classify(Path::new("empty.wav"), &out).unwrap_err();
    assert!(matches!(err, MixerError::UnreadableMedia { .. }));
    assert!(err.to_string().contains("duration is zero"));
}

#[test]
fn no_streams_is_unreadable() {
    let out = parse(r#"{ "streams": [], "format": { "format_name": "tty" } }"#);
    assert!(matches!(
        classify(Path::new("notes.txt"), &out),
        Err(MixerError::UnreadableMedia { .. })
    ));
}

#[test]
fn video_without_dimensions_is_unreadable() {
    let out = parse(
        r#"{
            "streams": [ { "codec_type": "video", "r_frame_rate": "30/1", "duration": "1.0" } ],
            "format": { "format_name": "mov,mp4,m4a,3gp,3g2,mj2" }
        }"#,
    );
    assert!(classify(Path::new("broken.mp4"), &out).is_err());
}

#[test]
fn rationals_parse_and_reject_degenerate_values() {
    assert_eq!(parse_rational("30/1"), Some(30.0));
    assert_eq!(parse_rational("25"), Some(25.0));
    assert_eq!(parse_rational("0/0"), None);
    assert_eq!(parse_rational("30/0"), None);
    assert_eq!(parse_rational("garbage"), None);
}

#[test]
fn missing_file_is_unreadable_without_spawning_tools() {
    let tools = Toolchain {
        ffmpeg: "definitely-not-ffmpeg".into(),
        ffprobe: "definitely-not-ffprobe".into(),
    };
    let err = probe(Path::new("/nonexistent/input.mp3"), &tools).unwrap_err();
    assert!(matches!(err, MixerError::UnreadableMedia { .. }));
}
