//! Action and direct resource data encoding.

use std::collections::HashSet;

use p4rt_driver::{CounterValues, DataValue, PipelineDriver, ReservedField, TableHandles};
use p4rt_schema::SchemaRegistry;
use p4rt_types::{p4info, Action, ActionParam, CounterData, MeterConfig};

use super::bytes::{check_bytestring, normalize_name};
use super::Translator;
use crate::error::{NodeError, NodeResult};

impl Translator {
    /// Resolves an action in the backend and writes it with its parameters
    /// into the data buffer.
    ///
    /// Every declared parameter must be given exactly once. Parameters are
    /// validated before anything reaches the driver.
    pub fn encode_action<D: PipelineDriver + ?Sized>(
        &self,
        driver: &D,
        h: &TableHandles,
        schema: &p4info::Action,
        action: &Action,
    ) -> NodeResult<()> {
        let mut seen = HashSet::new();
        let mut encoded = Vec::with_capacity(action.params.len());
        for param in &action.params {
            let declared = schema
                .params
                .iter()
                .find(|p| p.id == param.param_id)
                .ok_or_else(|| {
                    NodeError::invalid_argument(format!(
                        "action {} has no parameter {}",
                        schema.preamble.name, param.param_id
                    ))
                })?;
            if !seen.insert(declared.id) {
                return Err(NodeError::invalid_argument(format!(
                    "parameter {} of action {} given twice",
                    declared.name, schema.preamble.name
                )));
            }
            check_bytestring(&param.value, &declared.name)?;
            encoded.push((declared.id, self.encode_value(&param.value, declared.bitwidth)?));
        }
        if let Some(missing) = schema.params.iter().find(|p| !seen.contains(&p.id)) {
            return Err(NodeError::invalid_argument(format!(
                "missing parameter {} of action {}",
                missing.name, schema.preamble.name
            )));
        }

        let action_id = driver.action_id_by_name(h, &normalize_name(&schema.preamble.name))?;
        driver.action_set(h, action_id)?;
        for (param_id, value) in encoded {
            driver.data_field_set(h, param_id, DataValue::Bytes(value))?;
        }
        Ok(())
    }

    /// Rebuilds the action loaded in the data buffer.
    ///
    /// The backend action is matched by name against `candidates`, the
    /// schema actions the table may use. Returns `None` when the buffer
    /// holds no action.
    pub fn decode_action<D: PipelineDriver + ?Sized>(
        &self,
        driver: &D,
        h: &TableHandles,
        registry: &SchemaRegistry,
        candidates: impl IntoIterator<Item = u32>,
        fields: &[(u32, DataValue)],
    ) -> NodeResult<Option<Action>> {
        let Some(backend_id) = driver.action_get(h)? else {
            return Ok(None);
        };
        let backend_name = driver.action_name(h, backend_id)?;

        let mut schema = None;
        for id in candidates {
            let candidate = registry.find_action_by_id(id)?;
            if normalize_name(&candidate.preamble.name) == backend_name {
                schema = Some(candidate);
                break;
            }
        }
        let schema = schema.ok_or_else(|| {
            NodeError::internal(format!(
                "backend action {} does not belong to this table",
                backend_name
            ))
        })?;

        let mut action = Action::new(schema.preamble.id);
        for param in &schema.params {
            let value = fields
                .iter()
                .find(|(id, _)| *id == param.id)
                .and_then(|(_, v)| v.as_bytes())
                .ok_or_else(|| {
                    NodeError::internal(format!(
                        "backend entry lacks parameter {} of action {}",
                        param.name, schema.preamble.name
                    ))
                })?;
            action.params.push(ActionParam {
                param_id: param.id,
                value: self.decode_canonical(value),
            });
        }
        Ok(Some(action))
    }

    /// Encodes a register cell value.
    pub fn encode_register_value(
        &self,
        register: &p4info::Register,
        value: &[u8],
    ) -> NodeResult<DataValue> {
        check_bytestring(value, &register.preamble.name)?;
        Ok(DataValue::Bytes(self.encode_value(value, register.bitwidth)?))
    }

    /// Decodes a register cell read from the backend. A cell never written
    /// reads as zero.
    pub fn decode_register_value(&self, fields: &[(u32, DataValue)]) -> Vec<u8> {
        fields
            .iter()
            .find(|(id, _)| *id == ReservedField::RegisterData.id())
            .and_then(|(_, v)| v.as_bytes())
            .map_or_else(|| vec![0], |raw| self.decode_canonical(raw))
    }
}

/// Converts protocol counter data to backend values.
pub fn to_counter_values(data: &CounterData) -> NodeResult<CounterValues> {
    let bytes = u64::try_from(data.byte_count)
        .map_err(|_| NodeError::invalid_argument("negative byte count"))?;
    let packets = u64::try_from(data.packet_count)
        .map_err(|_| NodeError::invalid_argument("negative packet count"))?;
    Ok(CounterValues { bytes, packets })
}

/// Converts backend counter values to protocol counter data.
pub fn to_counter_data(values: CounterValues) -> NodeResult<CounterData> {
    let byte_count = i64::try_from(values.bytes)
        .map_err(|_| NodeError::internal(format!("byte count {} overflows", values.bytes)))?;
    let packet_count = i64::try_from(values.packets)
        .map_err(|_| NodeError::internal(format!("packet count {} overflows", values.packets)))?;
    Ok(CounterData {
        byte_count,
        packet_count,
    })
}

/// Writes direct counter values into the data buffer.
pub fn set_direct_counter<D: PipelineDriver + ?Sized>(
    driver: &D,
    h: &TableHandles,
    values: CounterValues,
) -> NodeResult<()> {
    driver.data_field_set(
        h,
        ReservedField::CounterSpecBytes.id(),
        DataValue::U64(values.bytes),
    )?;
    driver.data_field_set(
        h,
        ReservedField::CounterSpecPkts.id(),
        DataValue::U64(values.packets),
    )?;
    Ok(())
}

/// Extracts direct counter values from data fields. Missing fields read as
/// zero.
pub fn direct_counter_from_fields(fields: &[(u32, DataValue)]) -> CounterValues {
    let field = |reserved: ReservedField| {
        fields
            .iter()
            .find(|(id, _)| *id == reserved.id())
            .and_then(|(_, v)| v.as_u64())
            .unwrap_or(0)
    };
    CounterValues {
        bytes: field(ReservedField::CounterSpecBytes),
        packets: field(ReservedField::CounterSpecPkts),
    }
}

/// Writes a meter configuration into the data buffer.
pub fn set_meter_config<D: PipelineDriver + ?Sized>(
    driver: &D,
    h: &TableHandles,
    config: &MeterConfig,
) -> NodeResult<()> {
    let rates = [
        (ReservedField::MeterCir, config.cir, "cir"),
        (ReservedField::MeterCburst, config.cburst, "cburst"),
        (ReservedField::MeterPir, config.pir, "pir"),
        (ReservedField::MeterPburst, config.pburst, "pburst"),
    ];
    let mut encoded = Vec::with_capacity(rates.len());
    for (field, value, name) in rates {
        let value = u64::try_from(value)
            .map_err(|_| NodeError::invalid_argument(format!("negative meter {}", name)))?;
        encoded.push((field, value));
    }
    for (field, value) in encoded {
        driver.data_field_set(h, field.id(), DataValue::U64(value))?;
    }
    Ok(())
}

/// Extracts a meter configuration from data fields, or `None` when the
/// entry carries none.
pub fn meter_config_from_fields(fields: &[(u32, DataValue)]) -> NodeResult<Option<MeterConfig>> {
    let field = |reserved: ReservedField| -> NodeResult<Option<i64>> {
        fields
            .iter()
            .find(|(id, _)| *id == reserved.id())
            .and_then(|(_, v)| v.as_u64())
            .map(|v| {
                i64::try_from(v)
                    .map_err(|_| NodeError::internal(format!("meter rate {} overflows", v)))
            })
            .transpose()
    };
    let (Some(cir), Some(cburst), Some(pir), Some(pburst)) = (
        field(ReservedField::MeterCir)?,
        field(ReservedField::MeterCburst)?,
        field(ReservedField::MeterPir)?,
        field(ReservedField::MeterPburst)?,
    ) else {
        return Ok(None);
    };
    Ok(Some(MeterConfig {
        cir,
        cburst,
        pir,
        pburst,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusCode;
    use p4rt_driver::{Capabilities, DriverOp, SimDriver};
    use p4rt_types::p4info::{P4Info, Param, Preamble};
    use pretty_assertions::assert_eq;

    fn registry() -> SchemaRegistry {
        let p4info = P4Info {
            actions: vec![
                p4info::Action {
                    preamble: Preamble::new(10, "ingress.forward"),
                    params: vec![Param::new(1, "port", 9), Param::new(2, "smac", 48)],
                },
                p4info::Action {
                    preamble: Preamble::new(11, "ingress.drop"),
                    params: vec![],
                },
            ],
            ..Default::default()
        };
        SchemaRegistry::new(&p4info).unwrap()
    }

    fn setup(caps: Capabilities) -> (SimDriver, TableHandles, Translator) {
        let driver = SimDriver::new(caps);
        driver.load_pipeline(1, b"program").unwrap();
        let h = driver.acquire_table_context(1, "ingress_fwd").unwrap();
        (driver, h, Translator::new(&caps))
    }

    #[test]
    fn test_action_round_trip() {
        let (driver, h, translator) = setup(Capabilities::kernel_dataplane());
        let registry = registry();
        let schema = registry.find_action_by_id(10).unwrap();
        let action = Action::new(10)
            .with_param(1, vec![0x01, 0x02])
            .with_param(2, vec![0x0a, 0, 0, 0, 0, 0x01]);

        translator.encode_action(&driver, &h, schema, &action).unwrap();
        let fields = driver.data_fields_get(&h).unwrap();
        assert_eq!(fields[0], (1, DataValue::Bytes(vec![0x02, 0x01])));

        let decoded = translator
            .decode_action(&driver, &h, &registry, [11, 10], &fields)
            .unwrap();
        assert_eq!(decoded, Some(action));
    }

    #[test]
    fn test_action_param_validation() {
        let (driver, h, translator) = setup(Capabilities::asic());
        let registry = registry();
        let schema = registry.find_action_by_id(10).unwrap();

        let cases = vec![
            Action::new(10).with_param(1, vec![1]),
            Action::new(10)
                .with_param(1, vec![1])
                .with_param(2, vec![1])
                .with_param(3, vec![1]),
            Action::new(10)
                .with_param(1, vec![1])
                .with_param(1, vec![2])
                .with_param(2, vec![1]),
            Action::new(10).with_param(1, vec![0x02, 0x00]).with_param(2, vec![1]),
        ];
        for action in cases {
            let err = translator
                .encode_action(&driver, &h, schema, &action)
                .unwrap_err();
            assert_eq!(err.code, StatusCode::InvalidArgument, "{:?}", action);
        }
        assert_eq!(driver.count(DriverOp::ActionSet), 0);
    }

    #[test]
    fn test_counter_conversion() {
        let values = to_counter_values(&CounterData {
            byte_count: 1500,
            packet_count: 1,
        })
        .unwrap();
        assert_eq!(values, CounterValues { bytes: 1500, packets: 1 });
        assert!(to_counter_values(&CounterData {
            byte_count: -1,
            packet_count: 0
        })
        .is_err());

        let err = to_counter_data(CounterValues {
            bytes: u64::MAX,
            packets: 0,
        })
        .unwrap_err();
        assert_eq!(err.code, StatusCode::Internal);
    }

    #[test]
    fn test_direct_resources_in_data_buffer() {
        let (driver, h, _) = setup(Capabilities::asic());
        set_direct_counter(&driver, &h, CounterValues { bytes: 64, packets: 1 }).unwrap();
        let config = MeterConfig {
            cir: 1000,
            cburst: 100,
            pir: 2000,
            pburst: 200,
        };
        set_meter_config(&driver, &h, &config).unwrap();

        let fields = driver.data_fields_get(&h).unwrap();
        assert_eq!(
            direct_counter_from_fields(&fields),
            CounterValues { bytes: 64, packets: 1 }
        );
        assert_eq!(meter_config_from_fields(&fields).unwrap(), Some(config));
        assert_eq!(meter_config_from_fields(&[]).unwrap(), None);
    }

    #[test]
    fn test_negative_meter_rate_rejected() {
        let (driver, h, _) = setup(Capabilities::asic());
        let config = MeterConfig {
            cir: 1,
            cburst: -1,
            pir: 1,
            pburst: 1,
        };
        assert!(set_meter_config(&driver, &h, &config).is_err());
        assert_eq!(driver.count(DriverOp::DataFieldSet), 0);
    }

    #[test]
    fn test_register_value() {
        let translator = Translator::new(&Capabilities::asic());
        let register = p4info::Register {
            preamble: Preamble::new(300, "ingress.flow_state"),
            bitwidth: 32,
            size: 16,
        };
        let value = translator.encode_register_value(&register, &[0x01]).unwrap();
        assert_eq!(value, DataValue::Bytes(vec![0, 0, 0, 1]));
        let fields = vec![(ReservedField::RegisterData.id(), value)];
        assert_eq!(translator.decode_register_value(&fields), vec![0x01]);
        assert_eq!(translator.decode_register_value(&[]), vec![0]);
    }
}
