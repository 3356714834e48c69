//! EXIF extraction for freshly-uploaded images.
//!
//! Uploads arrive as bytes from the object store, not file paths, so this
//! reads from an in-memory cursor rather than `std::fs::File`. Never fails:
//! a malformed or absent EXIF segment yields `ExifInfo::default()` and the
//! pipeline falls back to `STAGING_DIR` and the decoded pixel dimensions.

use std::io::Cursor;

use chrono::{DateTime, TimeZone, Utc};

/// What the ingest pipeline needs out of EXIF: a capture timestamp (to
/// choose the album year), the recorded pixel dimensions (merged into the
/// record ahead of the authoritative decode), and an orientation tag (to
/// correct the decoded pixels before any derivative is built).
///
/// `width`/`height` are `0` when absent — callers must treat `0` as "no
/// value" and leave the record's existing dimensions alone, never as an
/// actual zero-pixel image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifInfo {
    pub taken_at: Option<DateTime<Utc>>,
    pub width: u32,
    pub height: u32,
    pub orientation: u16,
    pub gps: Option<(f64, f64)>,
}

/// Reads EXIF out of `bytes`. Swallows every error path; a non-JPEG, a
/// JPEG with no APP1 segment, and a truncated file all produce the same
/// `ExifInfo::default()`.
pub fn read(bytes: &[u8]) -> ExifInfo {
    let mut cursor = Cursor::new(bytes);
    let exif = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif,
        Err(err) => {
            tracing::debug!(error = %err, "no EXIF segment found, using defaults");
            return ExifInfo::default();
        }
    };

    ExifInfo {
        taken_at: read_datetime_original(&exif),
        width: read_u32_tag(&exif, exif::Tag::PixelXDimension).unwrap_or(0),
        height: read_u32_tag(&exif, exif::Tag::PixelYDimension).unwrap_or(0),
        orientation: read_orientation(&exif).unwrap_or(1),
        gps: read_gps(&exif),
    }
}

fn read_u32_tag(exif: &exif::Exif, tag: exif::Tag) -> Option<u32> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match &field.value {
        exif::Value::Long(v) => v.first().copied(),
        exif::Value::Short(v) => v.first().map(|&x| x as u32),
        _ => None,
    }
}

fn read_datetime_original(exif: &exif::Exif) -> Option<DateTime<Utc>> {
    let field = exif.get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY)?;
    let raw = match &field.value {
        exif::Value::Ascii(vecs) => vecs.first().and_then(|v| std::str::from_utf8(v).ok())?,
        _ => return None,
    };
    parse_exif_datetime(raw)
}

/// Parses the EXIF datetime format `"YYYY:MM:DD HH:MM:SS"`.
fn parse_exif_datetime(s: &str) -> Option<DateTime<Utc>> {
    use chrono::NaiveDateTime;
    if s.len() < 19 {
        return None;
    }
    let date = s[..10].replace(':', "-");
    let normalized = format!("{date} {}", &s[11..19]);
    let naive = NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S").ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

fn read_orientation(exif: &exif::Exif) -> Option<u16> {
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    match &field.value {
        exif::Value::Short(v) => v.first().copied(),
        _ => None,
    }
}

fn read_gps(exif: &exif::Exif) -> Option<(f64, f64)> {
    let lat = read_gps_coord(exif, exif::Tag::GPSLatitude, exif::Tag::GPSLatitudeRef, b'S')?;
    let lon = read_gps_coord(exif, exif::Tag::GPSLongitude, exif::Tag::GPSLongitudeRef, b'W')?;
    Some((lat, lon))
}

fn read_gps_coord(exif: &exif::Exif, tag: exif::Tag, ref_tag: exif::Tag, negative_ref: u8) -> Option<f64> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    let rationals = match &field.value {
        exif::Value::Rational(v) => v,
        _ => return None,
    };
    if rationals.len() < 3 {
        return None;
    }
    let degrees = rationals[0].to_f64();
    let minutes = rationals[1].to_f64();
    let seconds = rationals[2].to_f64();
    let mut value = degrees + minutes / 60.0 + seconds / 3600.0;

    if let Some(reference) = exif.get_field(ref_tag, exif::In::PRIMARY) {
        if let exif::Value::Ascii(vecs) = &reference.value {
            if vecs.first().and_then(|v| v.first()).copied() == Some(negative_ref) {
                value = -value;
            }
        }
    }

    Some(value)
}


#[cfg(test)]
mod tests {
    use super::test_support::{jpeg_with_app1, tiff_with_datetime_and_orientation};
    use super::*;

    #[test]
    fn defaults_on_non_jpeg_bytes() {
        let info = read(b"not an image at all");
        assert_eq!(info, ExifInfo::default());
    }

    #[test]
    fn defaults_on_jpeg_without_exif() {
        let jpeg = vec![0xFF, 0xD8, 0xFF, 0xD9];
        let info = read(&jpeg);
        assert_eq!(info.orientation, 1);
        assert!(info.taken_at.is_none());
    }

    #[test]
    fn extracts_capture_time_and_orientation() {
        let tiff = tiff_with_datetime_and_orientation("2023:01:15 10:30:00", 6);
        let mut app1 = b"Exif\x00\x00".to_vec();
        app1.extend_from_slice(&tiff);
        let jpeg = jpeg_with_app1(app1);

        let info = read(&jpeg);
        let taken_at = info.taken_at.expect("DateTimeOriginal must be extracted");
        assert_eq!(taken_at.format("%Y-%m-%d %H:%M:%S").to_string(), "2023-01-15 10:30:00");
        assert_eq!(info.orientation, 6);
    }

    #[test]
    fn parse_exif_datetime_rejects_garbage() {
        assert!(parse_exif_datetime("garbage").is_none());
        assert!(parse_exif_datetime("").is_none());
    }
}
