//! Image uploads for article content

use std::path::Path;

use crate::error::{AppError, AppResult};

pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Public URL prefix the upload directory is served under.
pub const UPLOAD_URL_PREFIX: &str = "/uploads";

/// Whether `filename` carries one of the accepted image extensions.
pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Reduces a client supplied filename to something safe to store.
///
/// Directory components are dropped, whitespace becomes `_`, and anything
/// other than ASCII alphanumerics, `.`, `-` and `_` is removed. Leading dots
/// and underscores are trimmed so the result can never be hidden or
/// relative. Returns `None` if nothing usable is left.
pub fn secure_filename(filename: &str) -> Option<String> {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();

    let cleaned = cleaned.trim_start_matches(['.', '_']).to_string();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Validates the filename and writes `data` into `dir`.
///
/// Returns the public URL of the stored file.
pub async fn save_image(dir: &Path, filename: &str, data: &[u8]) -> AppResult<String> {
    if filename.is_empty() {
        return Err(AppError::Validation("No file selected".into()));
    }
    let name = secure_filename(filename)
        .filter(|n| allowed_file(n))
        .ok_or_else(|| AppError::Validation("Invalid file type".into()))?;

    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(dir.join(&name), data).await?;

    tracing::info!(file = %name, bytes = data.len(), "image uploaded");
    Ok(format!("{UPLOAD_URL_PREFIX}/{name}"))
}
