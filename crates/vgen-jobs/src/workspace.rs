//! Scratch directories and unique file naming.

use std::path::{Component, Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use vgen_models::AssetRole;

/// Longest sanitised upload name kept after the uuid prefix.
const MAX_UPLOAD_NAME_LEN: usize = 100;

/// Hands out collision-free paths inside the upload, temp and output
/// directories. Every path embeds a fresh uuid, so concurrent jobs never
/// share a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceProvider {
    upload_dir: PathBuf,
    temp_dir: PathBuf,
    output_dir: PathBuf,
}

impl WorkspaceProvider {
    pub fn new(
        upload_dir: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            temp_dir: temp_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Create all three directories if missing.
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.upload_dir, &self.temp_dir, &self.output_dir] {
            tokio::fs::create_dir_all(dir).await?;
            debug!(dir = %dir.display(), "Scratch directory ready");
        }
        Ok(())
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `<upload_dir>/<uuid>-<sanitised original name>`
    pub fn upload_path(&self, original_name: Option<&str>) -> PathBuf {
        let name = sanitize_filename(original_name.unwrap_or_default());
        self.upload_dir.join(format!("{}-{}", Uuid::new_v4(), name))
    }

    /// `<temp_dir>/<role>-<uuid>.png`
    pub fn asset_path(&self, role: AssetRole) -> PathBuf {
        self.temp_dir.join(format!("{}-{}.png", role, Uuid::new_v4()))
    }

    /// A fresh output file name and its full path: `video-<uuid>.mp4`.
    pub fn output_path(&self) -> (String, PathBuf) {
        let name = format!("video-{}.mp4", Uuid::new_v4());
        let path = self.output_dir.join(&name);
        (name, path)
    }

    /// Resolve a caller-supplied output name. Names that are not a single
    /// plain path component resolve to nothing.
    pub fn resolve_output(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) {
            return None;
        }
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Some(self.output_dir.join(name)),
            _ => None,
        }
    }
}

/// Reduce an uploaded file name to `[A-Za-z0-9._-]`, without leading dots.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches('.');
    let mut out: String = trimmed.chars().take(MAX_UPLOAD_NAME_LEN).collect();
    if out.is_empty() {
        out.push_str("upload");
    }
    out
}
