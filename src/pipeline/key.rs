//! Object-store key parser.
//!
//! Every derivative path is *synthesized* from `(dir, slug, ext)`, never
//! parsed back out of a derivative key, so mis-parsing the canonical key
//! would mint collisions or orphans. `parse` is the single place that
//! decides what counts as a valid key.

use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// The sentinel directory used for images whose EXIF lacked a capture date.
pub const STAGING_DIR: &str = "staging";

/// The fixed prefix every placeholder-creation request writes under; it is
/// the only directory the webhook is allowed to arrive from.
pub const UPLOADS_DIR: &str = "uploads";

/// The decomposed parts of an object-store key:
/// `<dir>/<slug>.<ext>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    pub dir: String,
    pub file: String,
    pub ext: String,
    pub slug: String,
}

impl ParsedKey {
    /// Re-joins the parts back into a key. For any valid key `k`,
    /// `parse(k)` then `.to_key()` reproduces `k`.
    pub fn to_key(&self) -> String {
        format!("{}/{}", self.dir, self.file)
    }

    pub fn canonical_key(&self) -> String {
        format!("{}/{}.{}", self.dir, self.slug, self.ext)
    }
}

/// Parses `<dir>/<slug>.<ext>` into its parts, failing with
/// `AppError::InvalidInput` when:
/// * the key has no directory component,
/// * the file stem is not a valid UUID,
/// * the extension is empty.
pub fn parse(key: &str) -> AppResult<ParsedKey> {
    let (dir, file) = key
        .rsplit_once('/')
        .ok_or_else(|| AppError::InvalidInput(format!("key '{key}' has no directory component")))?;

    if dir.is_empty() || file.is_empty() {
        return Err(AppError::InvalidInput(format!("key '{key}' is malformed")));
    }

    let (stem, ext) = file
        .split_once('.')
        .ok_or_else(|| AppError::InvalidInput(format!("file '{file}' has no extension")))?;

    if ext.is_empty() {
        return Err(AppError::InvalidInput(format!("file '{file}' has an empty extension")));
    }

    // A derivative suffix (`_w320`, `_tile_w160`, `_blur`) would make `stem`
    // fail UUID parsing, which is the behavior we want here: `parse` is only
    // ever called on canonical keys, never on derivative keys.
    let slug = Uuid::parse_str(stem)
        .map_err(|_| AppError::InvalidInput(format!("'{stem}' is not a valid UUID slug")))?
        .to_string();

    Ok(ParsedKey {
        dir: dir.to_string(),
        file: file.to_string(),
        ext: ext.to_string(),
        slug,
    })
}

/// `true` if `dir` is a bare 4-digit year.
pub fn is_year(dir: &str) -> bool {
    dir.len() == 4 && dir.chars().all(|c| c.is_ascii_digit())
}
