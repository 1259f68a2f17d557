//! Bytestring helpers shared by key and data encoding.

use crate::error::{NodeError, NodeResult};

/// Returns `bytes` in reverse order.
pub fn reverse_bytes(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().rev().copied().collect()
}

/// Maps a schema name to the backend naming convention, which forbids dots.
pub fn normalize_name(name: &str) -> String {
    name.replace('.', "_")
}

/// Number of bytes needed to hold `bitwidth` bits.
pub fn byte_width(bitwidth: i32) -> usize {
    usize::try_from(bitwidth).unwrap_or(0).div_ceil(8)
}

/// Strips leading zero bytes. Zero is represented by a single zero byte.
pub fn canonicalize(bytes: &[u8]) -> Vec<u8> {
    match bytes.iter().position(|b| *b != 0) {
        Some(first) => bytes[first..].to_vec(),
        None => vec![0],
    }
}

/// Rejects the empty bytestring, which carries no value on the wire.
pub fn check_bytestring(value: &[u8], what: &str) -> NodeResult<()> {
    if value.is_empty() {
        return Err(NodeError::invalid_argument(format!(
            "empty bytestring for {}",
            what
        )));
    }
    Ok(())
}

/// Left-pads a big-endian value to the byte width of `bitwidth`.
///
/// An empty value pads to all zeros. Fails with InvalidArgument for a value
/// that does not fit in `bitwidth` bits.
pub fn pad_to_width(value: &[u8], bitwidth: i32) -> NodeResult<Vec<u8>> {
    let width = byte_width(bitwidth);
    let first = value.iter().position(|b| *b != 0).unwrap_or(value.len());
    let significant = &value[first..];
    if significant.len() > width {
        return Err(NodeError::invalid_argument(format!(
            "{} byte value does not fit in {} bits",
            significant.len(),
            bitwidth
        )));
    }
    let spare_bits = width * 8 - usize::try_from(bitwidth).unwrap_or(0);
    if significant.len() == width && spare_bits > 0 && significant[0] >> (8 - spare_bits) != 0 {
        return Err(NodeError::invalid_argument(format!(
            "value does not fit in {} bits",
            bitwidth
        )));
    }
    let mut padded = vec![0u8; width - significant.len()];
    padded.extend_from_slice(significant);
    Ok(padded)
}

/// Builds a big-endian mask with the top `prefix_len` bits of a
/// `bitwidth`-bit field set.
pub fn prefix_mask(prefix_len: usize, bitwidth: i32) -> Vec<u8> {
    let width = byte_width(bitwidth);
    let spare_bits = width * 8 - usize::try_from(bitwidth).unwrap_or(0);
    let mut mask = vec![0u8; width];
    for bit in spare_bits..(spare_bits + prefix_len).min(width * 8) {
        mask[bit / 8] |= 0x80 >> (bit % 8);
    }
    mask
}

/// Returns true if `value` has a bit set where `mask` is clear.
pub fn bits_outside_mask(value: &[u8], mask: &[u8]) -> bool {
    value.iter().zip(mask).any(|(v, m)| v & !m != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reverse_round_trip() {
        for len in [0usize, 1, 2, 16] {
            let value: Vec<u8> = (0..len).map(|i| i as u8 + 1).collect();
            assert_eq!(reverse_bytes(&reverse_bytes(&value)), value);
        }
        assert_eq!(reverse_bytes(&[1, 2, 3]), vec![3, 2, 1]);
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("ingress.tbl.fwd"), "ingress_tbl_fwd");
        assert_eq!(normalize_name("drop"), "drop");
    }

    #[test]
    fn test_canonicalize() {
        assert_eq!(canonicalize(&[0, 0, 1, 0]), vec![1, 0]);
        assert_eq!(canonicalize(&[0, 0]), vec![0]);
        assert_eq!(canonicalize(&[]), vec![0]);
    }

    #[test]
    fn test_pad_to_width() {
        assert_eq!(pad_to_width(&[0x0a], 12).unwrap(), vec![0x00, 0x0a]);
        assert_eq!(pad_to_width(&[0x0f, 0xff], 12).unwrap(), vec![0x0f, 0xff]);
        assert_eq!(pad_to_width(&[0x00, 0x00, 0x01], 9).unwrap(), vec![0x00, 0x01]);
        assert!(pad_to_width(&[0x10, 0x00], 12).is_err());
        assert!(pad_to_width(&[0x01, 0x00, 0x00], 16).is_err());
        assert_eq!(pad_to_width(&[], 8).unwrap(), vec![0x00]);
        assert_eq!(pad_to_width(&[], 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_check_bytestring() {
        assert!(check_bytestring(&[0x00], "hdr.port").is_ok());
        let err = check_bytestring(&[], "hdr.port").unwrap_err();
        assert_eq!(err.code, crate::error::StatusCode::InvalidArgument);
    }

    #[test]
    fn test_prefix_mask() {
        assert_eq!(prefix_mask(8, 32), vec![0xff, 0, 0, 0]);
        assert_eq!(prefix_mask(12, 32), vec![0xff, 0xf0, 0, 0]);
        assert_eq!(prefix_mask(4, 12), vec![0x0f, 0x00]);
        assert_eq!(prefix_mask(32, 32), vec![0xff; 4]);
    }

    #[test]
    fn test_bits_outside_mask() {
        assert!(!bits_outside_mask(&[0x0a, 0x00], &[0xff, 0x00]));
        assert!(bits_outside_mask(&[0x0a, 0x01], &[0xff, 0x00]));
    }
}
