//! Name-based pairing of audio tracks with visuals in one folder.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::assets::media::PairRequest;
use crate::foundation::error::MixerResult;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "flac", "ogg"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "webm"];
/// Image extensions in preference order.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "webp", "png"];

#[derive(Default)]
struct Candidates {
    audio: Vec<PathBuf>,
    videos: Vec<PathBuf>,
    images: Vec<(usize, PathBuf)>,
}

/// Pair every audio file in `dir` with the video or image sharing its base name.
///
/// Videos win over images. Audio without a visual is left out. Sorted by audio base name.
pub fn scan_for_pairs(dir: &Path) -> MixerResult<Vec<PairRequest>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("read input folder '{}'", dir.display()))?;

    let mut by_stem: BTreeMap<String, Candidates> = BTreeMap::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("list input folder '{}'", dir.display()))?
            .path();
        if !path.is_file() {
            continue;
        }
        let (Some(stem), Some(ext)) = (path.file_stem(), path.extension()) else {
            continue;
        };
        let stem = stem.to_string_lossy().into_owned();
        let ext = ext.to_string_lossy().to_ascii_lowercase();

        let slot = by_stem.entry(stem).or_default();
        if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            slot.audio.push(path);
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            slot.videos.push(path);
        } else if let Some(rank) = IMAGE_EXTENSIONS.iter().position(|e| *e == ext) {
            slot.images.push((rank, path));
        }
    }

    let mut pairs = Vec::new();
    for (stem, mut c) in by_stem {
        c.audio.sort();
        c.videos.sort();
        c.images.sort();
        let visual = c
            .videos
            .into_iter()
            .next()
            .or_else(|| c.images.into_iter().next().map(|(_, p)| p));
        match (c.audio.into_iter().next(), visual) {
            (Some(audio), Some(visual)) => pairs.push(PairRequest::new(audio, visual)),
            (Some(audio), None) => {
                tracing::debug!(%stem, audio = %audio.display(), "no visual for audio; skipped");
            }
            _ => {}
        }
    }
    tracing::info!(dir = %dir.display(), pairs = pairs.len(), "scanned for pairs");
    Ok(pairs)
}
