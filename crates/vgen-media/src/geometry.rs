//! Layout of the avatar and label box on the base video.
//!
//! Label width is estimated from character count at a fixed font size, not
//! measured from glyphs. The min/max clamp bounds the error for very short
//! and very long names.

use vgen_models::{GeometrySpec, LabelBox, PixelPoint};

/// Base video width.
pub const CANVAS_WIDTH: u32 = 1920;
/// Base video height.
pub const CANVAS_HEIGHT: u32 = 1080;

/// Fixed sizes the layout is computed from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConstants {
    /// Square avatar side
    pub avatar_diameter: u32,
    /// Label font size in pixels
    pub font_size: f64,
    /// Average glyph advance as a fraction of font size
    pub char_width_ratio: f64,
    /// Horizontal padding added to the estimated text width (both sides)
    pub label_padding: u32,
    pub label_min_width: u32,
    pub label_max_width: u32,
    pub label_height: u32,
    /// Vertical space between the avatar bottom and the label top
    pub gap: u32,
    /// Distance kept from the canvas edge when the label is shifted
    pub edge_margin: u32,
}

impl Default for LayoutConstants {
    fn default() -> Self {
        Self {
            avatar_diameter: 230,
            font_size: 48.0,
            char_width_ratio: 0.6,
            label_padding: 40,
            label_min_width: 240,
            label_max_width: 800,
            label_height: 80,
            gap: 17,
            edge_margin: 10,
        }
    }
}

impl LayoutConstants {
    /// Approximate advance of one character.
    pub fn char_width(&self) -> f64 {
        self.font_size * self.char_width_ratio
    }

    /// Estimated label box width for `text`, clamped to the configured range.
    pub fn label_width(&self, text: &str) -> u32 {
        let chars = text.chars().count() as f64;
        let text_width = (chars * self.char_width()).ceil() as u32;
        text_width
            .saturating_add(self.label_padding)
            .clamp(self.label_min_width, self.label_max_width)
    }
}

/// Compute the layout with the default constants.
pub fn compute_geometry(
    label_text: &str,
    anchor_x_frac: f64,
    anchor_y_frac: f64,
    canvas_width: u32,
    canvas_height: u32,
) -> GeometrySpec {
    compute_geometry_with(
        &LayoutConstants::default(),
        label_text,
        anchor_x_frac,
        anchor_y_frac,
        canvas_width,
        canvas_height,
    )
}

/// Compute the layout.
///
/// The label is centred under the avatar, then shifted left if it overflows
/// the right edge, then pinned to the left margin if the result is negative.
/// Right-edge correction always runs first.
pub fn compute_geometry_with(
    constants: &LayoutConstants,
    label_text: &str,
    anchor_x_frac: f64,
    anchor_y_frac: f64,
    canvas_width: u32,
    canvas_height: u32,
) -> GeometrySpec {
    let anchor = PixelPoint::new(
        (anchor_x_frac * f64::from(canvas_width)).round() as i64,
        (anchor_y_frac * f64::from(canvas_height)).round() as i64,
    );

    let width = constants.label_width(label_text);
    let diameter = i64::from(constants.avatar_diameter);
    let center_x = anchor.x + diameter / 2;

    let mut label_x = center_x - i64::from(width / 2);
    let label_y = anchor.y + diameter + i64::from(constants.gap);

    let canvas_w = i64::from(canvas_width);
    let margin = i64::from(constants.edge_margin);

    if label_x + i64::from(width) > canvas_w {
        label_x = canvas_w - i64::from(width) - margin;
    }
    if label_x < 0 {
        label_x = margin;
    }

    GeometrySpec {
        canvas_width,
        canvas_height,
        avatar_diameter: constants.avatar_diameter,
        anchor,
        label: LabelBox {
            origin: PixelPoint::new(label_x, label_y),
            width,
            height: constants.label_height,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_layout() {
        let geo = compute_geometry("A. Smith", 0.75, 0.6, CANVAS_WIDTH, CANVAS_HEIGHT);

        assert_eq!(geo.anchor, PixelPoint::new(1440, 648));
        assert_eq!(geo.avatar_center().x, 1440 + 115);
        assert_eq!(geo.label.origin.y, 648 + 230 + 17);
        assert_eq!(geo.label.origin.y, 895);

        // 8 chars * 28.8 = 230.4 -> 231, + 40 padding
        assert_eq!(geo.label.width, 271);
        assert_eq!(geo.label.height, 80);
        assert_eq!(geo.label.origin.x, 1555 - 135);
    }

    #[test]
    fn test_label_width_clamped() {
        let c = LayoutConstants::default();
        assert_eq!(c.label_width(""), 240);
        assert_eq!(c.label_width("Bo"), 240);
        assert_eq!(c.label_width(&"W".repeat(200)), 800);
    }

    #[test]
    fn test_label_width_counts_chars_not_bytes() {
        let c = LayoutConstants::default();
        // Same char count, more bytes
        assert_eq!(c.label_width("Dr. Müller-Öz"), c.label_width("Dr. Mueller-O"));
    }

    #[test]
    fn test_label_width_estimate_bounds() {
        let c = LayoutConstants::default();
        for len in 0..60 {
            let w = c.label_width(&"x".repeat(len));
            assert!((c.label_min_width..=c.label_max_width).contains(&w));
            let estimate = (len as f64 * c.char_width()).ceil() as u32 + c.label_padding;
            if (c.label_min_width..=c.label_max_width).contains(&estimate) {
                assert_eq!(w, estimate);
            }
        }
    }

    #[test]
    fn test_overflow_right_shifts_left_with_margin() {
        let geo = compute_geometry("A. Smith", 0.95, 0.1, CANVAS_WIDTH, CANVAS_HEIGHT);
        assert_eq!(geo.label.right(), i64::from(CANVAS_WIDTH) - 10);
    }

    #[test]
    fn test_overflow_left_pins_to_margin() {
        let long_name = "Prof. Dr. Maximilian Alexander von Hohenberg";
        let geo = compute_geometry(long_name, 0.0, 0.1, CANVAS_WIDTH, CANVAS_HEIGHT);
        assert_eq!(geo.label.origin.x, 10);
        assert!(geo.label.right() <= i64::from(CANVAS_WIDTH));
    }

    #[test]
    fn test_right_correction_runs_before_left() {
        // Canvas narrower than the label: the right shift goes negative and
        // the left pin wins, proving the order of the two corrections.
        let geo = compute_geometry("A. Smith", 0.5, 0.0, 200, 200);
        assert_eq!(geo.label.origin.x, 10);
    }

    #[test]
    fn test_label_always_within_canvas() {
        let names = [
            "",
            "Al",
            "A. Smith",
            "Dr. Jane Catherine Doe-Whitfield",
            &"M".repeat(120),
        ];
        for name in names {
            for xi in 0..=20 {
                for yi in 0..=10 {
                    let fx = f64::from(xi) / 20.0;
                    let fy = f64::from(yi) / 10.0;
                    let geo = compute_geometry(name, fx, fy, CANVAS_WIDTH, CANVAS_HEIGHT);
                    assert!(geo.label.origin.x >= 0, "{name} at ({fx},{fy})");
                    assert!(
                        geo.label.right() <= i64::from(CANVAS_WIDTH),
                        "{name} at ({fx},{fy})"
                    );
                    assert!((0..=i64::from(CANVAS_WIDTH)).contains(&geo.anchor.x));
                    assert!((0..=i64::from(CANVAS_HEIGHT)).contains(&geo.anchor.y));
                }
            }
        }
    }

    #[test]
    fn test_out_of_range_fraction_not_clamped() {
        let geo = compute_geometry("A. Smith", 1.5, -0.5, CANVAS_WIDTH, CANVAS_HEIGHT);
        assert_eq!(geo.anchor, PixelPoint::new(2880, -540));
    }
}
