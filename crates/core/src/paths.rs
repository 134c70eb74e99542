use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

fn with_suffix(input: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(input.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Silent composited video, removed after a successful run
pub fn get_subtitled_path(input: &Path) -> PathBuf {
    with_suffix(input, ".subtitled.mp4")
}

/// Final video with narration
pub fn get_output_path(input: &Path) -> PathBuf {
    with_suffix(input, ".output.mp4")
}

/// Mixed narration audio, removed after a successful run
pub fn get_audio_path(input: &Path) -> PathBuf {
    with_suffix(input, ".audio.mp3")
}
