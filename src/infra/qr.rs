//! QR codes for verification links.

use qrcode::render::svg;
use qrcode::{EcLevel, QrCode};

use crate::domain::AppError;

/// Renders `link` as an SVG QR code at least `size` pixels wide.
///
/// Uses the highest error correction level so printed labels still scan
/// when scuffed.
pub fn verification_qr_svg(link: &str, size: u32) -> Result<String, AppError> {
    let code = QrCode::with_error_correction_level(link.as_bytes(), EcLevel::H)
        .map_err(|e| AppError::Internal(format!("QR encoding failed: {}", e)))?;

    Ok(code
        .render::<svg::Color<'_>>()
        .min_dimensions(size, size)
        .quiet_zone(true)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_svg() {
        let svg = verification_qr_svg("http://localhost:3000/verify?address=abc", 200).unwrap();
        assert!(svg.starts_with("<?xml"));
        assert!(svg.contains("<svg"));
        assert!(svg.contains("#000000"));
    }

    #[test]
    fn test_respects_minimum_size() {
        let svg = verification_qr_svg("x", 300).unwrap();
        let width: u32 = svg
            .split("width=\"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .and_then(|w| w.parse().ok())
            .unwrap();
        assert!(width >= 300);
    }

    #[test]
    fn test_rejects_oversized_payload() {
        let link = "a".repeat(5000);
        assert!(verification_qr_svg(&link, 200).is_err());
    }
}
