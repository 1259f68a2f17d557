//! Match key encoding.

use std::collections::HashSet;

use p4rt_driver::{KeyValue, PipelineDriver, TableHandles};
use p4rt_types::p4info::{MatchType, Table};
use p4rt_types::{FieldMatch, FieldMatchKind};

use super::bytes::{bits_outside_mask, check_bytestring, pad_to_width, prefix_mask};
use super::Translator;
use crate::error::{NodeError, NodeResult};

/// Validates an entry priority against whether its key carries a ternary
/// field.
pub fn check_priority(has_ternary: bool, priority: i32) -> NodeResult<()> {
    if priority < 0 {
        return Err(NodeError::invalid_argument(format!(
            "negative priority {}",
            priority
        )));
    }
    if has_ternary && priority == 0 {
        return Err(NodeError::invalid_argument(
            "entries with ternary match fields require a nonzero priority",
        ));
    }
    if !has_ternary && priority != 0 {
        return Err(NodeError::invalid_argument(format!(
            "priority {} given for an entry without ternary match fields",
            priority
        )));
    }
    Ok(())
}

impl Translator {
    /// Writes the match fields and priority of an entry into the key buffer.
    ///
    /// Omitted exact, ternary and LPM fields are left unset (don't-care).
    pub fn encode_key<D: PipelineDriver + ?Sized>(
        &self,
        driver: &D,
        h: &TableHandles,
        table: &Table,
        matches: &[FieldMatch],
        priority: i32,
    ) -> NodeResult<()> {
        let mut seen = HashSet::new();
        let mut has_ternary = false;

        for field_match in matches {
            let field = table.match_field(field_match.field_id).ok_or_else(|| {
                NodeError::invalid_argument(format!(
                    "match field {} is not part of table {}",
                    field_match.field_id, table.preamble.name
                ))
            })?;
            if !seen.insert(field.id) {
                return Err(NodeError::invalid_argument(format!(
                    "match field {} given twice",
                    field.name
                )));
            }

            let value = match (field.match_type, &field_match.kind) {
                (MatchType::Exact, FieldMatchKind::Exact { value }) => {
                    check_bytestring(value, &field.name)?;
                    KeyValue::Exact(self.encode_value(value, field.bitwidth)?)
                }
                (MatchType::Ternary, FieldMatchKind::Ternary { value, mask }) => {
                    check_bytestring(value, &field.name)?;
                    check_bytestring(mask, &field.name)?;
                    let value = pad_to_width(value, field.bitwidth)?;
                    let mask = pad_to_width(mask, field.bitwidth)?;
                    if mask.iter().all(|b| *b == 0) {
                        return Err(NodeError::invalid_argument(format!(
                            "don't-care ternary match on {} must be omitted",
                            field.name
                        )));
                    }
                    if bits_outside_mask(&value, &mask) {
                        return Err(NodeError::invalid_argument(format!(
                            "ternary value of {} has bits outside its mask",
                            field.name
                        )));
                    }
                    has_ternary = true;
                    KeyValue::Ternary {
                        value: self.to_backend(value),
                        mask: self.to_backend(mask),
                    }
                }
                (MatchType::Lpm, FieldMatchKind::Lpm { value, prefix_len }) => {
                    if *prefix_len == 0 {
                        return Err(NodeError::invalid_argument(format!(
                            "don't-care LPM match on {} must be omitted",
                            field.name
                        )));
                    }
                    let prefix = usize::try_from(*prefix_len)
                        .ok()
                        .filter(|p| i32::try_from(*p).is_ok_and(|p| p <= field.bitwidth))
                        .ok_or_else(|| {
                            NodeError::invalid_argument(format!(
                                "prefix length {} out of range for {}",
                                prefix_len, field.name
                            ))
                        })?;
                    check_bytestring(value, &field.name)?;
                    let value = pad_to_width(value, field.bitwidth)?;
                    if bits_outside_mask(&value, &prefix_mask(prefix, field.bitwidth)) {
                        return Err(NodeError::invalid_argument(format!(
                            "LPM value of {} has bits beyond its prefix",
                            field.name
                        )));
                    }
                    KeyValue::Lpm {
                        value: self.to_backend(value),
                        prefix_len: prefix_len.unsigned_abs(),
                    }
                }
                (MatchType::Range | MatchType::Optional, _) => {
                    return Err(NodeError::unimplemented(format!(
                        "{} match on {} is not supported",
                        field.match_type, field.name
                    )));
                }
                (MatchType::Unspecified, _) => {
                    return Err(NodeError::invalid_argument(format!(
                        "match field {} has no match type",
                        field.name
                    )));
                }
                (expected, kind) => {
                    return Err(NodeError::invalid_argument(format!(
                        "match field {} expects {}, got {}",
                        field.name,
                        expected,
                        kind.name()
                    )));
                }
            };
            driver.key_field_set(h, field.id, &value)?;
        }

        // A don't-care range or optional field has no encoding either.
        if let Some(field) = table.match_fields.iter().find(|f| {
            matches!(f.match_type, MatchType::Range | MatchType::Optional) && !seen.contains(&f.id)
        }) {
            return Err(NodeError::unimplemented(format!(
                "{} match on {} is not supported",
                field.match_type, field.name
            )));
        }

        check_priority(has_ternary, priority)?;
        if has_ternary {
            driver.priority_set(h, priority.unsigned_abs())?;
        }
        Ok(())
    }

    /// Reads the key buffer back into match fields and a priority.
    ///
    /// Don't-care fields reported by the backend are dropped.
    pub fn decode_key<D: PipelineDriver + ?Sized>(
        &self,
        driver: &D,
        h: &TableHandles,
        table: &Table,
    ) -> NodeResult<(Vec<FieldMatch>, i32)> {
        let mut matches = Vec::new();
        let mut has_ternary = false;

        for (field_id, value) in driver.key_fields_get(h)? {
            if table.match_field(field_id).is_none() {
                return Err(NodeError::internal(format!(
                    "backend returned unknown key field {} for table {}",
                    field_id, table.preamble.name
                )));
            }
            let kind = match value {
                KeyValue::Exact(value) => FieldMatchKind::Exact {
                    value: self.decode_canonical(&value),
                },
                KeyValue::Ternary { value, mask } => {
                    if mask.iter().all(|b| *b == 0) {
                        continue;
                    }
                    has_ternary = true;
                    FieldMatchKind::Ternary {
                        value: self.decode_canonical(&value),
                        mask: self.decode_canonical(&mask),
                    }
                }
                KeyValue::Lpm { value, prefix_len } => {
                    if prefix_len == 0 {
                        continue;
                    }
                    FieldMatchKind::Lpm {
                        value: self.decode_canonical(&value),
                        prefix_len: i32::try_from(prefix_len).map_err(|_| {
                            NodeError::internal(format!("prefix length {} out of range", prefix_len))
                        })?,
                    }
                }
            };
            matches.push(FieldMatch { field_id, kind });
        }

        let priority = if has_ternary {
            let raw = driver.priority_get(h)?;
            i32::try_from(raw)
                .map_err(|_| NodeError::internal(format!("priority {} out of range", raw)))?
        } else {
            0
        };
        Ok((matches, priority))
    }
}
