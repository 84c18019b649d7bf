// FormatSelector - picks the stream variant closest to the user's preference
//
// Video candidates: adaptive video-only variants of the requested container.
// Audio candidates: audio-only variants of the requested container.
// Distance is |numeric(candidate) - numeric(target)| where numeric strips the
// "p" / "kbps" suffix. Ties go to the first candidate in catalog order.

use lazy_static::lazy_static;
use regex::Regex;

use super::errors::SelectionError;
use super::models::{ContentFormat, StreamDescriptor, StreamKind};

lazy_static! {
    static ref QUALITY_LABEL: Regex = Regex::new(r"^(\d+)(?:p|kbps)$").unwrap();
}

/// Numeric part of a quality label ("720p" -> 720, "128kbps" -> 128)
pub fn label_value(label: &str) -> Option<u32> {
    QUALITY_LABEL
        .captures(label.trim())
        .and_then(|caps| caps[1].parse().ok())
}

pub struct FormatSelector;

impl FormatSelector {
    /// Best adaptive video variant for `target` ("720p")
    pub fn select_video<'a>(
        catalog: &'a [StreamDescriptor],
        format: ContentFormat,
        target: &str,
    ) -> Result<&'a StreamDescriptor, SelectionError> {
        let candidates = catalog
            .iter()
            .filter(|s| s.kind == StreamKind::Video && s.adaptive)
            .filter(|s| s.subtype == format.as_str());

        Self::nearest(candidates, target).unwrap_or(Err(SelectionError::NoMatchingStream {
            kind: StreamKind::Video,
            format,
        }))
    }

    /// Best audio-only variant for `target` ("128kbps")
    pub fn select_audio<'a>(
        catalog: &'a [StreamDescriptor],
        format: ContentFormat,
        target: &str,
    ) -> Result<&'a StreamDescriptor, SelectionError> {
        let candidates = catalog
            .iter()
            .filter(|s| s.kind == StreamKind::Audio)
            .filter(|s| s.subtype == format.as_str());

        Self::nearest(candidates, target).unwrap_or(Err(SelectionError::NoMatchingStream {
            kind: StreamKind::Audio,
            format,
        }))
    }

    /// Returns `Some(Err)` for a malformed target, `None` when nothing is eligible
    fn nearest<'a>(
        candidates: impl Iterator<Item = &'a StreamDescriptor>,
        target: &str,
    ) -> Option<Result<&'a StreamDescriptor, SelectionError>> {
        let target_value = match label_value(target) {
            Some(v) => v,
            None => return Some(Err(SelectionError::InvalidLabel(target.to_string()))),
        };

        // min_by_key keeps the first of equal minima
        candidates
            .filter_map(|s| label_value(&s.label).map(|v| (s, v.abs_diff(target_value))))
            .min_by_key(|(_, distance)| *distance)
            .map(|(s, _)| Ok(s))
    }
}
