use super::*;
use crate::foundation::core::Fps;

fn cfg(dir: &Path) -> SinkConfig {
    SinkConfig {
        width: 4,
        height: 2,
        fps: Fps::integer(30),
        audio_path: dir.join("song.mp3"),
        duration_secs: 10.0,
        still_image: false,
    }
}

fn opts(out_path: PathBuf, ffmpeg: PathBuf) -> FfmpegEncoderOpts {
    FfmpegEncoderOpts {
        out_path,
        tools: Toolchain {
            ffmpeg,
            ffprobe: PathBuf::from("ffprobe"),
        },
        profile: Arc::new(OutputProfile::standard()),
        cancel: CancelToken::new(),
    }
}

fn frame() -> FrameRGBA {
    FrameRGBA::filled(4, 2, [10, 20, 30, 255])
}

fn leftover_parts(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().is_some_and(|e| e == "part"))
        .collect()
}

#[cfg(unix)]
fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt as _;
    let path = dir.join("fake-ffmpeg.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[test]
fn args_follow_the_compatibility_contract() {
    let dir = Path::new("/media/out");
    let mut c = cfg(dir);
    c.width = 1920;
    c.height = 1080;
    c.still_image = true;
    let args: Vec<String> = ffmpeg_args(&OutputProfile::standard(), &c, &dir.join("x.part"))
        .into_iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    let joined = args.join(" ");

    assert!(joined.starts_with(
        "-y -v error -f rawvideo -pix_fmt rgba -s 1920x1080 -framerate 30 -i pipe:0 -i /media/out/song.mp3 -map 0:v:0 -map 1:a:0 -c:v libx264 -preset ultrafast -tune stillimage"
    ));
    assert!(joined.contains(
        "-profile:v main -level 4.0 -tag:v avc1 -pix_fmt yuv420p -r 30 -vsync cfr -c:a aac -b:a 192k -ac 2 -ar 44100 -movflags +faststart"
    ));
    assert!(joined.ends_with("-t 10.000000 -f mp4 /media/out/x.part"));
}

#[test]
fn odd_dimensions_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut enc = FfmpegEncoder::new(opts(dir.path().join("a.mp4"), "ffmpeg".into()));
    let mut c = cfg(dir.path());
    c.width = 3;
    assert!(matches!(enc.begin(c), Err(MixerError::Validation(_))));
}

#[test]
fn missing_encoder_fails_without_leaving_files() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("a.mp4");
    let mut enc = FfmpegEncoder::new(opts(out.clone(), "definitely-not-ffmpeg".into()));
    let err = enc.begin(cfg(dir.path())).unwrap_err();
    assert!(matches!(err, MixerError::Encoding(_)));
    assert!(!out.exists());
    assert!(leftover_parts(dir.path()).is_empty());
}

#[test]
fn push_before_begin_is_rejected() {
    let mut enc = FfmpegEncoder::new(opts("a.mp4".into(), "ffmpeg".into()));
    assert!(enc.push_frame(FrameIndex(0), &frame()).is_err());
}

#[cfg(unix)]
#[test]
fn non_zero_exit_is_an_encoding_error_and_keeps_old_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("a.mp4");
    std::fs::write(&out, b"previous").unwrap();
    let ffmpeg = fake_ffmpeg(dir.path(), "cat > /dev/null\necho 'bad things' >&2\nexit 3");

    let mut enc = FfmpegEncoder::new(opts(out.clone(), ffmpeg));
    enc.begin(cfg(dir.path())).unwrap();
    enc.push_frame(FrameIndex(0), &frame()).unwrap();
    let err = enc.end().unwrap_err();

    let msg = err.to_string();
    assert!(matches!(err, MixerError::Encoding(_)));
    assert!(msg.contains("bad things"), "{msg}");
    assert_eq!(std::fs::read(&out).unwrap(), b"previous");
    assert!(leftover_parts(dir.path()).is_empty());
}

#[cfg(unix)]
#[test]
fn early_exit_surfaces_as_encoding_error_not_broken_pipe() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("a.mp4");
    let ffmpeg = fake_ffmpeg(dir.path(), "echo 'no such codec' >&2\nexit 1");

    let mut enc = FfmpegEncoder::new(opts(out.clone(), ffmpeg));
    let big = FrameRGBA::filled(1024, 1024, [0, 0, 0, 255]);
    let mut c = cfg(dir.path());
    c.width = 1024;
    c.height = 1024;
    enc.begin(c).unwrap();

    let mut result = Ok(());
    for i in 0..64 {
        result = enc.push_frame(FrameIndex(i), &big);
        if result.is_err() {
            break;
        }
    }
    let err = match result {
        Err(e) => e,
        Ok(()) => enc.end().unwrap_err(),
    };
    assert!(matches!(err, MixerError::Encoding(_)));
    assert!(err.to_string().contains("no such codec"), "{err}");
    assert!(!out.exists());
}

#[cfg(unix)]
#[test]
fn clean_exit_moves_output_into_place() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("a.mp4");
    std::fs::write(&out, b"previous").unwrap();
    let ffmpeg = fake_ffmpeg(
        dir.path(),
        "cat > /dev/null\nfor last; do :; done\nprintf 'encoded' > \"$last\"",
    );

    let mut enc = FfmpegEncoder::new(opts(out.clone(), ffmpeg));
    enc.begin(cfg(dir.path())).unwrap();
    enc.push_frame(FrameIndex(0), &frame()).unwrap();
    enc.push_frame(FrameIndex(1), &frame()).unwrap();
    enc.end().unwrap();

    assert_eq!(std::fs::read(&out).unwrap(), b"encoded");
    assert!(leftover_parts(dir.path()).is_empty());
}

#[cfg(unix)]
#[test]
fn clean_exit_with_empty_output_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("a.mp4");
    let ffmpeg = fake_ffmpeg(dir.path(), "cat > /dev/null");

    let mut enc = FfmpegEncoder::new(opts(out.clone(), ffmpeg));
    enc.begin(cfg(dir.path())).unwrap();
    assert!(matches!(enc.end(), Err(MixerError::Encoding(_))));
    assert!(!out.exists());
    assert!(leftover_parts(dir.path()).is_empty());
}

#[cfg(unix)]
#[test]
fn out_of_order_frames_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let ffmpeg = fake_ffmpeg(dir.path(), "cat > /dev/null");
    let mut enc = FfmpegEncoder::new(opts(dir.path().join("a.mp4"), ffmpeg));
    enc.begin(cfg(dir.path())).unwrap();
    enc.push_frame(FrameIndex(3), &frame()).unwrap();
    assert!(matches!(
        enc.push_frame(FrameIndex(3), &frame()),
        Err(MixerError::Validation(_))
    ));
    assert!(matches!(
        enc.push_frame(FrameIndex(4), &FrameRGBA::filled(2, 2, [0; 4])),
        Err(MixerError::Validation(_))
    ));
    enc.abort();
}

#[cfg(unix)]
#[test]
fn cancellation_while_waiting_kills_the_encoder() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("a.mp4");
    let ffmpeg = fake_ffmpeg(dir.path(), "cat > /dev/null\nexec sleep 30");

    let o = opts(out.clone(), ffmpeg);
    let cancel = o.cancel.clone();
    let mut enc = FfmpegEncoder::new(o);
    enc.begin(cfg(dir.path())).unwrap();
    enc.push_frame(FrameIndex(0), &frame()).unwrap();
    cancel.cancel();

    let started = std::time::Instant::now();
    assert!(matches!(enc.end(), Err(MixerError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!out.exists());
    assert!(leftover_parts(dir.path()).is_empty());
}

#[test]
fn parent_dir_defaults_to_current_directory() {
    assert_eq!(ensure_parent_dir(Path::new("a.mp4")).unwrap(), PathBuf::from("."));
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("x/y/out.mp4");
    assert_eq!(ensure_parent_dir(&nested).unwrap(), dir.path().join("x/y"));
    assert!(dir.path().join("x/y").is_dir());
}
