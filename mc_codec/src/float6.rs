//! float6: a IEEE-754 binary32, little-endian, URL-safe base64 encoded with
//! padding stripped, always 6 ASCII characters (SPEC_FULL.md §4.B).

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Float6Error {
    #[error("float6 must be 6 characters, got {0}")]
    WrongLength(usize),

    #[error("invalid base64 in float6: {0}")]
    InvalidBase64(String),
}

/// Encode `x` as a little-endian binary32 in URL-safe base64, stripped of
/// padding. Always produces exactly 6 ASCII characters (4 bytes → 6 b64
/// chars with no `=` padding needed once the standard 2-pad is dropped, per
/// the original's `base64.b64encode(...)[:-2]`).
pub fn encode_float6(x: f32) -> String {
    let bytes = x.to_le_bytes();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode a 6-character float6 back into an `f32`.
pub fn decode_float6(s: &str) -> Result<f32, Float6Error> {
    if s.len() != 6 {
        return Err(Float6Error::WrongLength(s.len()));
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| Float6Error::InvalidBase64(e.to_string()))?;

    if bytes.len() != 4 {
        return Err(Float6Error::InvalidBase64(format!(
            "decoded to {} bytes, expected 4",
            bytes.len()
        )));
    }

    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes);
    Ok(f32::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_is_always_six_chars() {
        for x in [0.0f32, 1.0, -1.0, 100.0, 1000.0, 50000.0, 3.14159, -0.001] {
            let encoded = encode_float6(x);
            assert_eq!(encoded.len(), 6, "encoding of {x} was not 6 chars");
            let decoded = decode_float6(&encoded).unwrap();
            assert!(
                (decoded - x).abs() <= x.abs() * 2f32.powi(-23) + 1e-30,
                "roundtrip mismatch: {x} -> {decoded}"
            );
        }
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(matches!(
            decode_float6("abc"),
            Err(Float6Error::WrongLength(3))
        ));
    }
}
