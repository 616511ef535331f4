//! Upload form — pick a file, fill in details, submit.
//!
//! Picking probes the container for its duration with lofty and rejects
//! anything outside the accepted range before the details step is reachable.
//! Submitting is split in two so the engine can do the I/O: `begin` freezes
//! the form and hands out an [`UploadJob`], then `finish` or `fail` settles
//! it. A failed upload leaves every field as it was.

use std::path::{Path, PathBuf};

use lofty::prelude::*;
use lofty::probe::Probe;
use serde::Serialize;

use crate::error::UploadError;
use crate::models::video::{MAX_DURATION_SECS, MIN_DURATION_SECS};
use crate::models::{NewProduct, NewVideo};

/// Storage bucket for uploaded videos.
pub const VIDEO_BUCKET: &str = "videos";

/// Recognized video extensions.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "m4v", "mov", "webm", "mkv"];

/// Accept a duration in [5, 180] seconds, inclusive.
pub fn validate_duration(secs: f64) -> Result<f64, UploadError> {
    if secs.is_finite() && (MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&secs) {
        Ok(secs)
    } else {
        Err(UploadError::InvalidDuration)
    }
}

pub fn content_type(ext: &str) -> &'static str {
    match ext {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Read the container duration. Any probe failure or a zero duration is
/// treated as unreadable media.
pub fn probe_duration(path: &Path) -> Result<f64, UploadError> {
    let tagged = Probe::open(path)
        .and_then(|p| p.guess_file_type().map_err(Into::into))
        .and_then(|p| p.read())
        .map_err(|e| {
            log::debug!("drapso: probe {} failed: {}", path.display(), e);
            UploadError::UnreadableMedia
        })?;
    let secs = tagged.properties().duration().as_secs_f64();
    if secs > 0.0 {
        Ok(secs)
    } else {
        Err(UploadError::UnreadableMedia)
    }
}

/// A picked file that passed validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickedMedia {
    pub path: PathBuf,
    pub extension: String,
    pub duration_secs: f64,
}

impl PickedMedia {
    /// Probe `path` and validate it.
    pub fn probe(path: &Path) -> Result<Self, UploadError> {
        let extension = extension_of(path)
            .filter(|e| VIDEO_EXTENSIONS.contains(&e.as_str()))
            .ok_or_else(|| UploadError::UnsupportedFormat(path.display().to_string()))?;
        let duration_secs = validate_duration(probe_duration(path)?)?;
        Ok(Self {
            path: path.to_path_buf(),
            extension,
            duration_secs,
        })
    }

    /// Build from an already known duration, still validated.
    pub fn with_duration(path: &Path, duration_secs: f64) -> Result<Self, UploadError> {
        let extension = extension_of(path)
            .filter(|e| VIDEO_EXTENSIONS.contains(&e.as_str()))
            .ok_or_else(|| UploadError::UnsupportedFormat(path.display().to_string()))?;
        Ok(Self {
            path: path.to_path_buf(),
            extension,
            duration_secs: validate_duration(duration_secs)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    PickFile,
    Details,
}

/// Everything the engine needs to carry out a submitted upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadJob {
    pub source: PathBuf,
    /// Object name inside [`VIDEO_BUCKET`].
    pub object: String,
    pub content_type: &'static str,
    /// Record to insert; `video_url` is filled in once the file is stored.
    pub video: NewVideo,
    pub products: Vec<NewProduct>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadForm {
    step: Step,
    media: Option<PickedMedia>,
    pub title: String,
    pub description: String,
    pub has_affiliate: bool,
    pub affiliate_link: String,
    pub has_location: bool,
    pub location: String,
    pub products: Vec<NewProduct>,
    uploading: bool,
    error: Option<String>,
}

impl UploadForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn media(&self) -> Option<&PickedMedia> {
        self.media.as_ref()
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading
    }

    /// Last user-facing error, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Probe and attach a file. A rejected file clears the previous pick.
    pub fn pick_file(&mut self, path: &Path) -> Result<&PickedMedia, UploadError> {
        let picked = PickedMedia::probe(path);
        self.set_media(picked)
    }

    pub fn set_media(
        &mut self,
        picked: Result<PickedMedia, UploadError>,
    ) -> Result<&PickedMedia, UploadError> {
        if self.uploading {
            return Err(UploadError::Busy);
        }
        match picked {
            Ok(media) => {
                self.error = None;
                Ok(self.media.insert(media))
            }
            Err(e) => {
                self.media = None;
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Go to the details step. Requires a picked file.
    pub fn next(&mut self) -> bool {
        if self.media.is_none() || self.uploading {
            return false;
        }
        self.step = Step::Details;
        true
    }

    pub fn back(&mut self) -> bool {
        if self.step == Step::PickFile || self.uploading {
            return false;
        }
        self.step = Step::PickFile;
        true
    }

    pub fn can_upload(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn validate(&self) -> Result<(), UploadError> {
        if self.uploading {
            return Err(UploadError::Busy);
        }
        if self.media.is_none() {
            return Err(UploadError::NoMedia);
        }
        if self.title.trim().is_empty() {
            return Err(UploadError::MissingTitle);
        }
        if self.description.trim().is_empty() {
            return Err(UploadError::MissingDescription);
        }
        Ok(())
    }

    /// Freeze the form and describe the upload for `user_id`.
    pub fn begin(&mut self, user_id: &str, now_ms: i64) -> Result<UploadJob, UploadError> {
        self.validate()?;
        let media = self.media.as_ref().ok_or(UploadError::NoMedia)?;

        let affiliate_link = Some(self.affiliate_link.trim())
            .filter(|l| self.has_affiliate && !l.is_empty())
            .map(String::from);
        let location = Some(self.location.trim())
            .filter(|l| self.has_location && !l.is_empty())
            .map(String::from);

        let job = UploadJob {
            source: media.path.clone(),
            object: format!("videos/{}-{}.{}", user_id, now_ms, media.extension),
            content_type: content_type(&media.extension),
            video: NewVideo {
                user_id: user_id.to_string(),
                title: self.title.trim().to_string(),
                description: self.description.trim().to_string(),
                video_url: String::new(),
                duration: media.duration_secs,
                has_affiliate: self.has_affiliate,
                affiliate_link,
                has_location: self.has_location,
                location,
            },
            products: self
                .products
                .iter()
                .filter(|p| !p.name.trim().is_empty() && !p.url.trim().is_empty())
                .cloned()
                .collect(),
        };

        self.uploading = true;
        self.error = None;
        Ok(job)
    }

    /// Upload committed: back to an empty form.
    pub fn finish(&mut self) {
        *self = Self::default();
    }

    /// Upload failed: editable again, inputs intact.
    pub fn fail(&mut self, message: &str) {
        self.uploading = false;
        self.error = Some(message.to_string());
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
