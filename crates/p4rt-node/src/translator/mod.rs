//! Key/data translation between protocol entities and backend encoding.
//!
//! Protocol values are big-endian bytestrings. Before reaching a driver
//! setter every value is padded to its field's byte width and, for backends
//! that ask for it, byte-reversed. [`Translator::decode_value`] undoes the
//! byte order only, so a full-width value survives a round trip unchanged.
//! Entities read back carry canonical values, with leading zero bytes
//! stripped, through [`Translator::decode_canonical`].

mod bytes;
mod data;
mod key;

pub use bytes::{
    bits_outside_mask, byte_width, canonicalize, check_bytestring, normalize_name, pad_to_width,
    prefix_mask, reverse_bytes,
};
pub use data::{
    direct_counter_from_fields, meter_config_from_fields, set_direct_counter, set_meter_config,
    to_counter_data, to_counter_values,
};
pub use key::check_priority;

use p4rt_driver::Capabilities;

use crate::error::NodeResult;

/// Encoder/decoder bound to one backend's byte-order rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translator {
    reverse_byte_order: bool,
}

impl Translator {
    pub fn new(capabilities: &Capabilities) -> Self {
        Self {
            reverse_byte_order: capabilities.reverse_byte_order,
        }
    }

    /// Pads a canonical value to `bitwidth` and converts it to backend order.
    pub fn encode_value(&self, value: &[u8], bitwidth: i32) -> NodeResult<Vec<u8>> {
        Ok(self.to_backend(pad_to_width(value, bitwidth)?))
    }

    /// Converts a backend value back to network order, keeping its width.
    pub fn decode_value(&self, raw: &[u8]) -> Vec<u8> {
        if self.reverse_byte_order {
            reverse_bytes(raw)
        } else {
            raw.to_vec()
        }
    }

    /// Converts a backend value to a canonical bytestring.
    pub fn decode_canonical(&self, raw: &[u8]) -> Vec<u8> {
        canonicalize(&self.decode_value(raw))
    }

    fn to_backend(&self, padded: Vec<u8>) -> Vec<u8> {
        if self.reverse_byte_order {
            reverse_bytes(&padded)
        } else {
            padded
        }
    }
}
