//! Eight byte big-endian timestamps embedded in key signatures.
//!
//! Values are limited to 2^53 - 1 so that every timestamp survives a trip
//! through an IEEE-754 double on other clients. Anything larger is rejected
//! instead of being truncated.

use crate::error::{CryptoError, Result};

/// Largest integer exactly representable as an IEEE-754 double.
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// Encoded timestamp length.
pub const TIMESTAMP_LEN: usize = 8;

pub fn encode_timestamp(value: u64) -> Result<[u8; TIMESTAMP_LEN]> {
    if value > MAX_SAFE_INTEGER {
        return Err(CryptoError::TimestampOutOfRange(value));
    }
    Ok(value.to_be_bytes())
}

pub fn decode_timestamp(bytes: &[u8]) -> Result<u64> {
    let raw: [u8; TIMESTAMP_LEN] = bytes
        .try_into()
        .map_err(|_| CryptoError::MalformedTimestamp(bytes.len()))?;
    let value = u64::from_be_bytes(raw);
    if value > MAX_SAFE_INTEGER {
        return Err(CryptoError::TimestampOutOfRange(value));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_encoding() {
        assert_eq!(encode_timestamp(0).unwrap(), [0u8; 8]);
        assert_eq!(
            encode_timestamp(0x0102_0304_0506).unwrap(),
            [0, 0, 1, 2, 3, 4, 5, 6]
        );
        assert_eq!(
            encode_timestamp(MAX_SAFE_INTEGER).unwrap(),
            [0x00, 0x1f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn test_rejects_unsafe_values() {
        assert_eq!(
            encode_timestamp(MAX_SAFE_INTEGER + 1),
            Err(CryptoError::TimestampOutOfRange(MAX_SAFE_INTEGER + 1))
        );
        assert!(encode_timestamp(u64::MAX).is_err());
        assert!(decode_timestamp(&[0xff; 8]).is_err());
    }

    #[test]
    fn test_rejects_wrong_length() {
        assert_eq!(decode_timestamp(&[0; 7]), Err(CryptoError::MalformedTimestamp(7)));
        assert_eq!(decode_timestamp(&[]), Err(CryptoError::MalformedTimestamp(0)));
    }

    proptest! {
        #[test]
        fn timestamp_round_trip(value in 0..=MAX_SAFE_INTEGER) {
            let encoded = encode_timestamp(value).unwrap();
            prop_assert_eq!(decode_timestamp(&encoded).unwrap(), value);
        }

        #[test]
        fn unsafe_values_never_encode(value in (MAX_SAFE_INTEGER + 1)..=u64::MAX) {
            prop_assert!(encode_timestamp(value).is_err());
        }
    }
}
