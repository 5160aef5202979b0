//! Asset classification boundary.
//!
//! The real classification cascade lives outside this subsystem; producers
//! only need the trait. `ExtensionClassifier` is the built-in fallback and
//! doubles as the watch pipeline's media-file filter.

use std::path::Path;

use clipdock_model::AssetKind;

pub trait AssetClassifier: Send + Sync {
    fn classify(&self, path: &Path) -> Option<AssetKind>;

    fn is_media(&self, path: &Path) -> bool {
        self.classify(path).is_some()
    }
}

/// Extension allow-list classifier.
#[derive(Clone, Debug)]
pub struct ExtensionClassifier {
    video: Vec<String>,
    audio: Vec<String>,
    image: Vec<String>,
}

impl ExtensionClassifier {
    pub fn new(video: Vec<String>, audio: Vec<String>, image: Vec<String>) -> Self {
        Self { video, audio, image }
    }
}

impl Default for ExtensionClassifier {
    fn default() -> Self {
        let list = |exts: &[&str]| exts.iter().map(|e| e.to_string()).collect();
        Self {
            video: list(&[
                "mp4", "mov", "mkv", "avi", "mxf", "webm", "m4v", "mts", "r3d", "braw",
            ]),
            audio: list(&["wav", "aif", "aiff", "mp3", "flac", "m4a", "ogg"]),
            image: list(&["png", "jpg", "jpeg", "tif", "tiff", "exr", "dpx", "psd"]),
        }
    }
}

impl AssetClassifier for ExtensionClassifier {
    fn classify(&self, path: &Path) -> Option<AssetKind> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        if self.video.iter().any(|e| *e == ext) {
            Some(AssetKind::Video)
        } else if self.audio.iter().any(|e| *e == ext) {
            Some(AssetKind::Audio)
        } else if self.image.iter().any(|e| *e == ext) {
            Some(AssetKind::Image)
        } else {
            None
        }
    }
}
