//! Raster layer generation.
//!
//! Three PNG layers are produced per job:
//! - the photo, cover-fit into a square and masked to a circle
//! - a rounded, semi-transparent box sized to the label
//! - the label text centred on a transparent canvas of the same size
//!
//! The box and text layers are described as SVG markup and rasterized with
//! `resvg`; label text is escaped before it enters the markup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::imageops::FilterType;
use image::{ImageFormat, RgbaImage};
use resvg::tiny_skia;
use tracing::{debug, warn};
use usvg::fontdb;

use vgen_models::{AssetRole, GeometrySpec, LabelBox};

use crate::error::{MediaError, MediaResult};

/// Visual style of the label layers.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelStyle {
    pub font_family: String,
    pub font_size: f64,
    /// CSS hex color of the text
    pub text_color: String,
    /// CSS hex color of the box
    pub background_color: String,
    pub background_opacity: f32,
    pub corner_radius: u32,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            font_family: "sans-serif".to_string(),
            font_size: 48.0,
            text_color: "#FFFFFF".to_string(),
            background_color: "#000000".to_string(),
            background_opacity: 0.7,
            corner_radius: 8,
        }
    }
}

/// One generated layer on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFile {
    pub role: AssetRole,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// The complete layer set for one job. Never constructed partially.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSet {
    pub avatar: AssetFile,
    pub label_background: AssetFile,
    pub label_text: AssetFile,
}

impl AssetSet {
    pub fn get(&self, role: AssetRole) -> &AssetFile {
        match role {
            AssetRole::Avatar => &self.avatar,
            AssetRole::LabelBackground => &self.label_background,
            AssetRole::LabelText => &self.label_text,
        }
    }

    pub fn path(&self, role: AssetRole) -> &Path {
        &self.get(role).path
    }
}

/// Produces the raster layers. Cheap to clone.
#[derive(Clone)]
pub struct AssetGenerator {
    style: LabelStyle,
    fontdb: Arc<fontdb::Database>,
}

impl std::fmt::Debug for AssetGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetGenerator")
            .field("style", &self.style)
            .field("faces", &self.fontdb.len())
            .finish()
    }
}

impl AssetGenerator {
    /// Create a generator using system fonts.
    pub fn new(style: LabelStyle) -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        Self {
            style,
            fontdb: Arc::new(db),
        }
    }

    /// Create a generator that also loads `font_path`, and renders labels
    /// with that font's family.
    ///
    /// A missing or unreadable font is logged and system fonts are used.
    pub fn with_font_file(mut style: LabelStyle, font_path: &Path) -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();

        match db.load_font_file(font_path) {
            Ok(()) => {
                if let Some((family, _)) = db.faces().last().and_then(|f| f.families.first()) {
                    debug!(font = %font_path.display(), family = %family, "Loaded label font");
                    style.font_family = family.clone();
                }
            }
            Err(e) => {
                warn!(font = %font_path.display(), "Label font unavailable, using system fonts: {}", e);
            }
        }

        Self {
            style,
            fontdb: Arc::new(db),
        }
    }

    pub fn style(&self) -> &LabelStyle {
        &self.style
    }

    /// Generate all three layers.
    ///
    /// `dest_for` is asked for the output path of each role just before that
    /// layer is written, so the caller can track it. The first failure aborts
    /// the set.
    pub async fn generate<F>(
        &self,
        geometry: &GeometrySpec,
        label_text: &str,
        source_image: &Path,
        mut dest_for: F,
    ) -> MediaResult<AssetSet>
    where
        F: FnMut(AssetRole) -> PathBuf,
    {
        let avatar = self
            .avatar(source_image, geometry.avatar_diameter, &dest_for(AssetRole::Avatar))
            .await?;
        let label_background = self
            .label_background(&geometry.label, &dest_for(AssetRole::LabelBackground))
            .await?;
        let label_text = self
            .label_text(label_text, &geometry.label, &dest_for(AssetRole::LabelText))
            .await?;

        Ok(AssetSet {
            avatar,
            label_background,
            label_text,
        })
    }

    /// Cover-fit `source` into a `diameter` square and mask it to a circle.
    pub async fn avatar(&self, source: &Path, diameter: u32, dest: &Path) -> MediaResult<AssetFile> {
        let source = source.to_path_buf();
        let dest = dest.to_path_buf();

        let path = dest.clone();
        run_blocking(AssetRole::Avatar, move || {
            let img = image::open(&source).map_err(|e| e.to_string())?;
            let mut square = img
                .resize_to_fill(diameter, diameter, FilterType::Lanczos3)
                .to_rgba8();
            apply_circle_mask(&mut square);
            square
                .save_with_format(&dest, ImageFormat::Png)
                .map_err(|e| e.to_string())
        })
        .await?;

        Ok(AssetFile {
            role: AssetRole::Avatar,
            path,
            width: diameter,
            height: diameter,
        })
    }

    /// Rounded semi-transparent rectangle the size of the label box.
    pub async fn label_background(&self, label: &LabelBox, dest: &Path) -> MediaResult<AssetFile> {
        let svg = background_svg(&self.style, label.width, label.height);
        self.rasterize(AssetRole::LabelBackground, svg, label, dest)
            .await
    }

    /// Label text centred on a transparent canvas the size of the label box.
    pub async fn label_text(&self, text: &str, label: &LabelBox, dest: &Path) -> MediaResult<AssetFile> {
        let svg = text_svg(&self.style, text, label.width, label.height);
        self.rasterize(AssetRole::LabelText, svg, label, dest).await
    }

    async fn rasterize(
        &self,
        role: AssetRole,
        svg: String,
        label: &LabelBox,
        dest: &Path,
    ) -> MediaResult<AssetFile> {
        let (width, height) = (label.width, label.height);
        let fontdb = Arc::clone(&self.fontdb);
        let dest_path = dest.to_path_buf();

        run_blocking(role, move || {
            let mut options = usvg::Options::default();
            options.fontdb = fontdb;

            let tree = usvg::Tree::from_str(&svg, &options).map_err(|e| e.to_string())?;
            let mut pixmap = tiny_skia::Pixmap::new(width, height)
                .ok_or_else(|| format!("invalid canvas size {width}x{height}"))?;
            resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());
            pixmap.save_png(&dest_path).map_err(|e| e.to_string())
        })
        .await?;

        Ok(AssetFile {
            role,
            path: dest.to_path_buf(),
            width,
            height,
        })
    }
}

async fn run_blocking<F>(role: AssetRole, work: F) -> MediaResult<()>
where
    F: FnOnce() -> Result<(), String> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| MediaError::asset_generation(role, format!("worker task failed: {e}")))?
        .map_err(|e| MediaError::asset_generation(role, e))
}

/// Zero alpha outside the inscribed circle, with a one-pixel soft edge.
fn apply_circle_mask(img: &mut RgbaImage) {
    let (w, h) = img.dimensions();
    let radius = w.min(h) as f32 / 2.0;
    let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);

    for (x, y, px) in img.enumerate_pixels_mut() {
        let dx = x as f32 + 0.5 - cx;
        let dy = y as f32 + 0.5 - cy;
        let dist = (dx * dx + dy * dy).sqrt();
        let coverage = (radius + 0.5 - dist).clamp(0.0, 1.0);
        px[3] = (f32::from(px[3]) * coverage).round() as u8;
    }
}

/// Escape text for use inside SVG/XML character data or attribute values.
pub fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

fn background_svg(style: &LabelStyle, width: u32, height: u32) -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><rect width="{w}" height="{h}" rx="{r}" ry="{r}" fill="{fill}" fill-opacity="{opacity:.2}"/></svg>"#,
        w = width,
        h = height,
        r = style.corner_radius,
        fill = escape_markup(&style.background_color),
        opacity = style.background_opacity,
    )
}

fn text_svg(style: &LabelStyle, text: &str, width: u32, height: u32) -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><text x="{cx}" y="{cy}" text-anchor="middle" dominant-baseline="central" font-family="{family}" font-size="{size}" fill="{fill}">{text}</text></svg>"#,
        w = width,
        h = height,
        cx = f64::from(width) / 2.0,
        cy = f64::from(height) / 2.0,
        family = escape_markup(&style.font_family),
        size = style.font_size,
        fill = escape_markup(&style.text_color),
        text = escape_markup(text),
    )
}
