//! Render job definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Label shown when the request carries no name.
pub const DEFAULT_LABEL: &str = "Dr. Name";

/// Horizontal anchor fraction used when `overlayX` is missing or unparsable.
pub const DEFAULT_ANCHOR_X: f64 = 0.75;

/// Vertical anchor fraction used when `overlayY` is missing or unparsable.
pub const DEFAULT_ANCHOR_Y: f64 = 0.6;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One composition request.
///
/// Owned by the pipeline invocation handling the request and dropped when
/// the job ends; nothing about it outlives the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderJob {
    /// Job identifier, used for logging and unique file names
    pub id: JobId,
    /// Text rendered under the avatar
    pub label: String,
    /// Uploaded photo on disk
    pub source_image: PathBuf,
    /// Base video the layers are composited onto
    pub base_video: PathBuf,
    /// Avatar top-left, as a fraction of canvas width
    pub anchor_x: f64,
    /// Avatar top-left, as a fraction of canvas height
    pub anchor_y: f64,
}

impl RenderJob {
    /// Build a job from raw request fields, substituting defaults for
    /// anything missing or unparsable.
    ///
    /// Out-of-range fractions are passed through untouched.
    pub fn from_request_fields(
        label: Option<&str>,
        anchor_x: Option<&str>,
        anchor_y: Option<&str>,
        source_image: impl Into<PathBuf>,
        base_video: impl Into<PathBuf>,
    ) -> Self {
        let label = match label.map(str::trim) {
            Some(l) if !l.is_empty() => l.to_string(),
            _ => DEFAULT_LABEL.to_string(),
        };

        Self {
            id: JobId::new(),
            label,
            source_image: source_image.into(),
            base_video: base_video.into(),
            anchor_x: parse_fraction(anchor_x, DEFAULT_ANCHOR_X),
            anchor_y: parse_fraction(anchor_y, DEFAULT_ANCHOR_Y),
        }
    }
}

/// Parse a decimal fraction, falling back to `default` when the value is
/// absent, has no leading number, or is not finite.
///
/// Only the leading number counts, so `"0.5px"` reads as `0.5`.
pub fn parse_fraction(raw: Option<&str>, default: f64) -> f64 {
    raw.map(leading_number)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

/// Longest prefix of `raw` (after leading whitespace) that forms a decimal
/// number: sign, digits, fraction, exponent.
fn leading_number(raw: &str) -> &str {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_end = digits_from(end);
    let mut seen_digit = int_end > end;
    end = int_end;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        if seen_digit || frac_end > end + 1 {
            seen_digit = true;
            end = frac_end;
        }
    }
    if !seen_digit {
        return "";
    }

    // An exponent only counts when digits follow it
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_unique() {
        assert_ne!(JobId::new(), JobId::new());
    }

    #[test]
    fn test_parse_fraction_defaults() {
        assert_eq!(parse_fraction(None, 0.75), 0.75);
        assert_eq!(parse_fraction(Some(""), 0.75), 0.75);
        assert_eq!(parse_fraction(Some("abc"), 0.6), 0.6);
        assert_eq!(parse_fraction(Some("NaN"), 0.6), 0.6);
        assert_eq!(parse_fraction(Some("inf"), 0.6), 0.6);
        assert_eq!(parse_fraction(Some("px0.5"), 0.6), 0.6);
        assert_eq!(parse_fraction(Some("-."), 0.6), 0.6);
    }

    #[test]
    fn test_parse_fraction_uses_leading_number() {
        assert_eq!(parse_fraction(Some("0.5px"), 0.75), 0.5);
        assert_eq!(parse_fraction(Some("  .25 of width"), 0.75), 0.25);
        assert_eq!(parse_fraction(Some("1."), 0.75), 1.0);
        assert_eq!(parse_fraction(Some("5e-1abc"), 0.75), 0.5);
        // A dangling exponent marker is not part of the number
        assert_eq!(parse_fraction(Some("0.3e"), 0.75), 0.3);
        assert_eq!(parse_fraction(Some("0.4e+"), 0.75), 0.4);
        assert_eq!(parse_fraction(Some("-0.1,"), 0.75), -0.1);
    }

    #[test]
    fn test_parse_fraction_accepts_values() {
        assert_eq!(parse_fraction(Some("0.25"), 0.75), 0.25);
        assert_eq!(parse_fraction(Some(" 0.5 "), 0.75), 0.5);
        assert_eq!(parse_fraction(Some("0"), 0.75), 0.0);
        // Out-of-range input is a caller error, not clamped
        assert_eq!(parse_fraction(Some("1.5"), 0.75), 1.5);
    }

    #[test]
    fn test_from_request_fields_defaults() {
        let job = RenderJob::from_request_fields(None, Some("x"), None, "in.png", "base.mp4");
        assert_eq!(job.label, DEFAULT_LABEL);
        assert_eq!(job.anchor_x, DEFAULT_ANCHOR_X);
        assert_eq!(job.anchor_y, DEFAULT_ANCHOR_Y);

        let job = RenderJob::from_request_fields(Some(""), None, None, "in.png", "base.mp4");
        assert_eq!(job.label, DEFAULT_LABEL);
    }

    #[test]
    fn test_blank_label_falls_back() {
        let job = RenderJob::from_request_fields(Some("  \t "), None, None, "in.png", "base.mp4");
        assert_eq!(job.label, DEFAULT_LABEL);

        let job =
            RenderJob::from_request_fields(Some("  Dr. Lee "), None, None, "in.png", "base.mp4");
        assert_eq!(job.label, "Dr. Lee");
    }

    #[test]
    fn test_from_request_fields_values() {
        let job = RenderJob::from_request_fields(
            Some("A. Smith"),
            Some("0.1"),
            Some("0.2"),
            "in.png",
            "base.mp4",
        );
        assert_eq!(job.label, "A. Smith");
        assert_eq!(job.anchor_x, 0.1);
        assert_eq!(job.anchor_y, 0.2);
        assert_eq!(job.source_image, PathBuf::from("in.png"));
    }
}
