//! Format normalization
//!
//! Turns the single JSON document printed by `yt-dlp -j` into a
//! [`VideoInfo`] with a small, fixed vocabulary of quality buckets.
//!
//! The raw document is parsed into a typed shape first and fails closed:
//! anything that is not exactly one JSON object with a title is
//! [`NormalizeError::MalformedResponse`]. Output depends only on the input,
//! with ties broken by raw list order.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("no downloadable formats")]
    NoDownloadableFormats,

    #[error("malformed extraction response: {0}")]
    MalformedResponse(String),
}

/// Canonical quality bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum Quality {
    #[serde(rename = "1080p")]
    #[strum(serialize = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    #[strum(serialize = "720p")]
    P720,
    #[serde(rename = "480p")]
    #[strum(serialize = "480p")]
    P480,
    #[serde(rename = "360p")]
    #[strum(serialize = "360p")]
    P360,
    #[serde(rename = "240p")]
    #[strum(serialize = "240p")]
    P240,
    #[serde(rename = "144p")]
    #[strum(serialize = "144p")]
    P144,
    #[serde(rename = "Audio Only")]
    #[strum(serialize = "Audio Only")]
    AudioOnly,
    #[serde(rename = "Best Available")]
    #[strum(serialize = "Best Available")]
    BestAvailable,
}

impl Quality {
    /// Video rungs, highest first.
    pub const LADDER: [Quality; 6] = [
        Quality::P1080,
        Quality::P720,
        Quality::P480,
        Quality::P360,
        Quality::P240,
        Quality::P144,
    ];

    pub fn height(self) -> Option<u32> {
        match self {
            Quality::P1080 => Some(1080),
            Quality::P720 => Some(720),
            Quality::P480 => Some(480),
            Quality::P360 => Some(360),
            Quality::P240 => Some(240),
            Quality::P144 => Some(144),
            Quality::AudioOnly | Quality::BestAvailable => None,
        }
    }
}

/// One downloadable rendition.
///
/// `has_audio` and `can_merge_audio` are never both true; build through
/// the constructors below to keep it that way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalFormat {
    pub quality: Quality,
    /// Container label, e.g. `mp4`, `webm`, `m4a`
    pub format: String,
    pub url: String,
    pub filesize: Option<u64>,
    pub has_audio: bool,
    pub can_merge_audio: bool,
}

impl CanonicalFormat {
    fn with_audio(quality: Quality, format: String, url: String, filesize: Option<u64>) -> Self {
        Self {
            quality,
            format,
            url,
            filesize,
            has_audio: true,
            can_merge_audio: false,
        }
    }

    fn video_only(quality: Quality, format: String, url: String, filesize: Option<u64>, mergeable: bool) -> Self {
        Self {
            quality,
            format,
            url,
            filesize,
            has_audio: false,
            can_merge_audio: mergeable,
        }
    }
}

/// Canonical extraction result. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub title: String,
    pub thumbnail: Option<String>,
    /// Seconds
    pub duration: u64,
    pub formats: Vec<CanonicalFormat>,
}

impl VideoInfo {
    pub fn find(&self, quality: Quality) -> Option<&CanonicalFormat> {
        self.formats.iter().find(|f| f.quality == quality)
    }
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    title: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    formats: Vec<RawFormat>,
    url: Option<String>,
    ext: Option<String>,
    acodec: Option<String>,
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    url: Option<String>,
    ext: Option<String>,
    height: Option<f64>,
    vcodec: Option<String>,
    acodec: Option<String>,
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
    abr: Option<f64>,
    tbr: Option<f64>,
}

fn codec_present(codec: &Option<String>) -> bool {
    codec.as_deref().is_some_and(|c| !c.is_empty() && c != "none")
}

fn to_size(exact: Option<f64>, approx: Option<f64>) -> Option<u64> {
    exact
        .or(approx)
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(|v| v.round() as u64)
}

impl RawFormat {
    fn has_video(&self) -> bool {
        codec_present(&self.vcodec)
    }

    fn has_audio(&self) -> bool {
        codec_present(&self.acodec)
    }

    fn is_audio_only(&self) -> bool {
        self.has_audio() && !self.has_video()
    }

    fn height_is(&self, height: u32) -> bool {
        self.height.is_some_and(|h| h.round() as i64 == i64::from(height))
    }

    fn bitrate(&self) -> f64 {
        self.abr.or(self.tbr).filter(|b| b.is_finite()).unwrap_or(0.0)
    }

    fn size(&self) -> Option<u64> {
        to_size(self.filesize, self.filesize_approx)
    }

    fn label(&self, fallback: &str) -> String {
        self.ext.clone().filter(|e| !e.is_empty()).unwrap_or_else(|| fallback.to_string())
    }
}

/// Parse and normalize raw `yt-dlp -j` output.
pub fn normalize(raw_json: &str) -> Result<VideoInfo, NormalizeError> {
    let value: serde_json::Value = serde_json::from_str(raw_json.trim())
        .map_err(|e| NormalizeError::MalformedResponse(format!("not a single JSON document: {e}")))?;

    let object = value
        .as_object()
        .ok_or_else(|| NormalizeError::MalformedResponse("top-level value is not an object".to_string()))?;

    if object.get("_type").and_then(|t| t.as_str()) == Some("playlist") || object.contains_key("entries") {
        return Err(NormalizeError::MalformedResponse(
            "multi-entry (playlist) response".to_string(),
        ));
    }

    let doc: RawDocument = serde_json::from_value(value)
        .map_err(|e| NormalizeError::MalformedResponse(format!("unexpected field shape: {e}")))?;

    let title = doc
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| NormalizeError::MalformedResponse("missing title".to_string()))?
        .to_string();

    let formats = build_formats(&doc)?;

    Ok(VideoInfo {
        title,
        thumbnail: doc.thumbnail.filter(|t| !t.is_empty()),
        duration: doc
            .duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d.round() as u64)
            .unwrap_or(0),
        formats,
    })
}

/// Video renditions at exactly `height`, in raw order.
fn at_height<'a>(usable: &'a [&'a RawFormat], height: u32) -> impl Iterator<Item = &'a RawFormat> + 'a {
    usable
        .iter()
        .copied()
        .filter(move |f| f.has_video() && f.height_is(height))
}

fn build_formats(doc: &RawDocument) -> Result<Vec<CanonicalFormat>, NormalizeError> {
    let usable: Vec<&RawFormat> = doc
        .formats
        .iter()
        .filter(|f| f.url.as_deref().is_some_and(|u| !u.is_empty()))
        .collect();

    let has_separate_audio = usable.iter().any(|f| f.is_audio_only());
    let mut out = Vec::new();

    for quality in Quality::LADDER {
        let Some(height) = quality.height() else { continue };

        if let Some(muxed) = at_height(&usable, height).find(|f| f.has_audio()) {
            out.push(CanonicalFormat::with_audio(
                quality,
                muxed.label("mp4"),
                muxed.url.clone().unwrap_or_default(),
                muxed.size(),
            ));
        } else if let Some(video) = at_height(&usable, height).next() {
            out.push(CanonicalFormat::video_only(
                quality,
                video.label("mp4"),
                video.url.clone().unwrap_or_default(),
                video.size(),
                has_separate_audio,
            ));
        }
    }
    let video_rungs = out.len();

    // First candidate wins ties: only a strictly higher bitrate replaces it
    let mut best_audio: Option<&RawFormat> = None;
    for candidate in usable.iter().copied().filter(|f| f.is_audio_only()) {
        match best_audio {
            Some(current) if candidate.bitrate() <= current.bitrate() => {}
            _ => best_audio = Some(candidate),
        }
    }
    if let Some(audio) = best_audio {
        out.push(CanonicalFormat::with_audio(
            Quality::AudioOnly,
            audio.label("m4a"),
            audio.url.clone().unwrap_or_default(),
            audio.size(),
        ));
    }

    if video_rungs == 0 {
        if let Some(url) = doc.url.as_deref().filter(|u| !u.is_empty()) {
            let format = doc.ext.clone().filter(|e| !e.is_empty()).unwrap_or_else(|| "mp4".to_string());
            let size = to_size(doc.filesize, doc.filesize_approx);
            // A bare top-level URL is normally a progressive file
            let fallback = if doc.acodec.as_deref() == Some("none") {
                CanonicalFormat::video_only(Quality::BestAvailable, format, url.to_string(), size, has_separate_audio)
            } else {
                CanonicalFormat::with_audio(Quality::BestAvailable, format, url.to_string(), size)
            };
            out.push(fallback);
        }
    }

    if out.is_empty() {
        return Err(NormalizeError::NoDownloadableFormats);
    }
    Ok(out)
}
