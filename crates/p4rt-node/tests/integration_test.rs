//! Integration tests for device nodes over the simulated backend
//!
//! These tests drive the public node API end to end: a pipeline is pushed
//! from a JSON schema, batches are written and entities are read back, and
//! the simulated driver is inspected to see what reached the backend.

use std::io::Write;
use std::sync::Arc;

use p4rt_driver::{Capabilities, CounterValues, DriverOp, DriverStatus, SimDriver};
use p4rt_node::config::load_pipeline_config;
use p4rt_node::{ChassisConfig, DeviceNode, StatusCode, Translator};
use p4rt_types::{
    Action, ActionProfileGroup, ActionProfileMember, Atomicity, CounterData, CounterEntry, Entity,
    FieldMatch, ForwardingPipelineConfig, GroupMember, MeterConfig, MeterEntry, P4Info,
    ReadRequest, ReadResponse, RegisterEntry, TableEntry, Update, WriteRequest,
};
use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

const NODE: u64 = 1;

const L2: u32 = 33554433;
const ACL: u32 = 33554434;
const NEXTHOP: u32 = 33554435;
const SET_PORT: u32 = 16777217;
const DENY: u32 = 16777218;
const RX_COUNTER: u32 = 302000001;
const POLICER: u32 = 335544321;
const SEEN: u32 = 369098753;
const NEXTHOP_SELECTOR: u32 = 285212673;

const PROGRAM: &[u8] = b"\x7fELF-pipeline";

fn p4info_json() -> serde_json::Value {
    serde_json::json!({
        "tables": [
            {
                "preamble": {"id": L2, "name": "ingress.l2_fwd"},
                "match_fields": [
                    {"id": 1, "name": "hdr.eth.dst", "bitwidth": 48, "match_type": "EXACT"}
                ],
                "action_refs": [{"id": SET_PORT}, {"id": DENY}],
                "size": 4096
            },
            {
                "preamble": {"id": ACL, "name": "ingress.acl"},
                "match_fields": [
                    {"id": 1, "name": "hdr.ipv4.proto", "bitwidth": 8, "match_type": "TERNARY"}
                ],
                "action_refs": [{"id": SET_PORT}, {"id": DENY}],
                "size": 512
            },
            {
                "preamble": {"id": NEXTHOP, "name": "ingress.nexthop"},
                "match_fields": [
                    {"id": 1, "name": "meta.nexthop", "bitwidth": 16, "match_type": "EXACT"}
                ],
                "action_refs": [{"id": SET_PORT}],
                "implementation_id": NEXTHOP_SELECTOR,
                "size": 256
            }
        ],
        "actions": [
            {
                "preamble": {"id": SET_PORT, "name": "ingress.set_port"},
                "params": [{"id": 1, "name": "port", "bitwidth": 9}]
            },
            {"preamble": {"id": DENY, "name": "ingress.deny"}}
        ],
        "counters": [
            {"preamble": {"id": RX_COUNTER, "name": "ingress.rx"}, "unit": "BOTH", "size": 256}
        ],
        "meters": [
            {"preamble": {"id": POLICER, "name": "ingress.policer"}, "unit": "BYTES", "size": 16}
        ],
        "registers": [
            {"preamble": {"id": SEEN, "name": "ingress.seen"}, "bitwidth": 8, "size": 4}
        ],
        "action_profiles": [
            {
                "preamble": {"id": NEXTHOP_SELECTOR, "name": "ingress.nexthop_selector"},
                "table_ids": [NEXTHOP],
                "with_selector": true,
                "size": 64,
                "max_group_size": 4
            }
        ]
    })
}

fn pipeline() -> ForwardingPipelineConfig {
    let p4info: P4Info = serde_json::from_value(p4info_json()).unwrap();
    ForwardingPipelineConfig::new(p4info, PROGRAM)
}

fn pushed_node(driver: SimDriver) -> (Arc<SimDriver>, DeviceNode<SimDriver>) {
    let driver = Arc::new(driver);
    let node = DeviceNode::new(
        NODE,
        Arc::clone(&driver),
        vec!["Ethernet0".to_string(), "Ethernet8".to_string()],
    );
    node.push_config(pipeline()).unwrap();
    (driver, node)
}

fn l2_entry(last: u8, port: u8) -> TableEntry {
    TableEntry::new(L2)
        .with_match(FieldMatch::exact(1, vec![0x0a, 0, 0, 0, 0, last]))
        .with_action(Action::new(SET_PORT).with_param(1, vec![port]))
}

fn write(node: &DeviceNode<SimDriver>, updates: Vec<Update>) -> Vec<StatusCode> {
    let mut request = WriteRequest::new(NODE);
    request.updates = updates;
    let outcome = node.write_batch(&request).unwrap();
    outcome.details.iter().map(|s| s.code).collect()
}

fn read(node: &DeviceNode<SimDriver>, entity: impl Into<Entity>) -> Vec<Entity> {
    let mut response = ReadResponse::default();
    let outcome = node
        .read_entities(&ReadRequest::new(NODE).with_entity(entity), &mut response)
        .unwrap();
    assert!(outcome.is_ok(), "{:?}", outcome);
    response.entities
}

#[test]
fn test_ternary_entries_need_priority() {
    for driver in [SimDriver::asic(), SimDriver::kernel_dataplane()] {
        let (_, node) = pushed_node(driver);
        let entry = TableEntry::new(ACL)
            .with_match(FieldMatch::ternary(1, vec![0x06], vec![0xff]))
            .with_action(Action::new(DENY));
        let codes = write(
            &node,
            vec![
                Update::insert(entry.clone()),
                Update::insert(entry.with_priority(10)),
            ],
        );
        assert_eq!(codes, vec![StatusCode::InvalidArgument, StatusCode::Ok]);
    }
}

#[test]
fn test_exact_entries_reject_priority() {
    let (driver, node) = pushed_node(SimDriver::asic());
    let codes = write(
        &node,
        vec![
            Update::insert(l2_entry(1, 3).with_priority(5)),
            Update::insert(l2_entry(1, 3)),
        ],
    );
    assert_eq!(codes, vec![StatusCode::InvalidArgument, StatusCode::Ok]);
    assert_eq!(driver.entry_count(NODE, "ingress_l2_fwd"), 1);
}

#[test]
fn test_match_value_round_trip() {
    for caps in [Capabilities::asic(), Capabilities::kernel_dataplane()] {
        let translator = Translator::new(&caps);
        for len in [0usize, 1, 2, 16] {
            // Leading zero bytes must survive as well.
            let mut bytes = vec![0u8; len];
            if len > 1 {
                bytes[len - 1] = 0x0a;
            }
            let bitwidth = i32::try_from(len * 8).unwrap();
            let encoded = translator.encode_value(&bytes, bitwidth).unwrap();
            if caps.reverse_byte_order && len > 1 {
                assert_ne!(encoded, bytes);
            }
            assert_eq!(translator.decode_value(&encoded), bytes, "{:?} length {}", caps.kind, len);
        }
    }
}

#[test]
fn test_batch_reports_each_update() {
    let (driver, node) = pushed_node(SimDriver::kernel_dataplane());
    let unknown = TableEntry::new(12345).with_action(Action::new(DENY));
    let mut request = WriteRequest::new(NODE)
        .with_update(Update::insert(l2_entry(1, 1)))
        .with_update(Update::insert(unknown))
        .with_update(Update::insert(l2_entry(2, 2)));
    request.atomicity = Atomicity::ContinueOnError;

    let outcome = node.write_batch(&request).unwrap();
    let codes: Vec<StatusCode> = outcome.details.iter().map(|s| s.code).collect();
    assert_eq!(
        codes,
        vec![StatusCode::Ok, StatusCode::NotFound, StatusCode::Ok]
    );
    assert_eq!(outcome.status.code, StatusCode::AtLeastOneFailed);
    assert_eq!(driver.entry_count(NODE, "ingress_l2_fwd"), 2);
}

#[test]
fn test_wildcard_counter_read_numbers_from_zero() {
    let (driver, node) = pushed_node(SimDriver::kernel_dataplane());
    for (raw, packets) in [(200u32, 5u64), (17, 6), (90, 7)] {
        driver.seed_counter(
            NODE,
            "ingress_rx",
            raw,
            CounterValues {
                bytes: packets * 64,
                packets,
            },
        );
    }

    let entities = read(
        &node,
        CounterEntry {
            counter_id: RX_COUNTER,
            ..Default::default()
        },
    );
    let indices: Vec<Option<i64>> = entities
        .iter()
        .map(|e| match e {
            Entity::CounterEntry(c) => c.index,
            other => panic!("unexpected {}", other),
        })
        .collect();
    assert_eq!(indices, vec![Some(0), Some(1), Some(2)]);
    assert_eq!(
        entities[1],
        Entity::CounterEntry(CounterEntry {
            counter_id: RX_COUNTER,
            index: Some(1),
            data: Some(CounterData {
                byte_count: 384,
                packet_count: 6,
            }),
        })
    );
}

#[test]
fn test_repush_does_not_reload() {
    let (driver, node) = pushed_node(SimDriver::asic());
    node.push_config(pipeline()).unwrap();
    assert_eq!(driver.program_transfers(), 1);
    assert_eq!(driver.count(DriverOp::LoadPipeline), 2);
    assert_eq!(driver.count(DriverOp::AddPort), 4);
    assert_eq!(driver.ports(NODE), vec!["Ethernet0", "Ethernet8"]);
}

#[test]
fn test_atomic_batches_rejected_untouched() {
    let (driver, node) = pushed_node(SimDriver::asic());
    for atomicity in [Atomicity::RollbackOnError, Atomicity::DataplaneAtomic] {
        let mut request = WriteRequest::new(NODE).with_update(Update::insert(l2_entry(1, 1)));
        request.atomicity = atomicity;
        let err = node.write_batch(&request).unwrap_err();
        assert_eq!(err.code, StatusCode::InvalidArgument);
    }
    assert_eq!(driver.count(DriverOp::AcquireTableContext), 0);
    assert_eq!(driver.entry_count(NODE, "ingress_l2_fwd"), 0);
}

#[test]
fn test_failed_write_releases_context_once() {
    for op in [DriverOp::KeyFieldSet, DriverOp::ActionSet, DriverOp::EntryAdd] {
        let (driver, node) = pushed_node(SimDriver::asic());
        driver.clear_calls();
        driver.inject_failure(op, DriverStatus::Failure);

        let codes = write(&node, vec![Update::insert(l2_entry(1, 1))]);
        assert_eq!(codes, vec![StatusCode::Internal], "{:?}", op);
        assert_eq!(driver.count(DriverOp::Release), 1, "{:?}", op);
        assert_eq!(driver.open_contexts(), 0);
    }
}

#[test]
fn test_table_entry_lifecycle_on_both_backends() {
    for driver in [SimDriver::asic(), SimDriver::kernel_dataplane()] {
        let (driver, node) = pushed_node(driver);
        let codes = write(
            &node,
            vec![
                Update::insert(l2_entry(1, 1)),
                Update::insert(l2_entry(2, 2)),
                Update::modify(l2_entry(2, 7)),
            ],
        );
        assert_eq!(codes, vec![StatusCode::Ok; 3]);
        assert_eq!(
            read(&node, TableEntry::new(L2)),
            vec![
                Entity::TableEntry(l2_entry(1, 1)),
                Entity::TableEntry(l2_entry(2, 7))
            ]
        );

        let codes = write(
            &node,
            vec![
                Update::delete(TableEntry::new(L2).with_match(FieldMatch::exact(
                    1,
                    vec![0x0a, 0, 0, 0, 0, 1],
                ))),
                Update::delete(l2_entry(9, 1)),
            ],
        );
        assert_eq!(codes, vec![StatusCode::Ok, StatusCode::NotFound]);
        assert_eq!(driver.entry_count(NODE, "ingress_l2_fwd"), 1);
    }
}

#[test]
fn test_asic_extern_resources() {
    let (_, node) = pushed_node(SimDriver::asic());
    let meter = MeterEntry {
        meter_id: POLICER,
        index: Some(2),
        config: Some(MeterConfig {
            cir: 1000,
            cburst: 100,
            pir: 2000,
            pburst: 200,
        }),
    };
    let register = RegisterEntry {
        register_id: SEEN,
        index: Some(3),
        data: Some(vec![0x2a]),
    };
    let codes = write(
        &node,
        vec![Update::modify(meter.clone()), Update::modify(register.clone())],
    );
    assert_eq!(codes, vec![StatusCode::Ok, StatusCode::Ok]);

    let read_meter = MeterEntry {
        config: None,
        ..meter.clone()
    };
    assert_eq!(read(&node, read_meter), vec![Entity::MeterEntry(meter)]);
    let read_register = RegisterEntry {
        data: None,
        ..register.clone()
    };
    assert_eq!(read(&node, read_register), vec![Entity::RegisterEntry(register)]);
}

#[test]
fn test_selector_groups_through_node() {
    let (driver, node) = pushed_node(SimDriver::asic());
    let member = |id: u32, port: u8| ActionProfileMember {
        action_profile_id: NEXTHOP_SELECTOR,
        member_id: id,
        action: Some(Action::new(SET_PORT).with_param(1, vec![port])),
    };
    let group = ActionProfileGroup {
        action_profile_id: NEXTHOP_SELECTOR,
        group_id: 10,
        members: vec![
            GroupMember {
                member_id: 1,
                weight: 3,
            },
            GroupMember {
                member_id: 2,
                weight: 1,
            },
        ],
        max_size: 0,
    };
    let entry = TableEntry::new(NEXTHOP)
        .with_match(FieldMatch::exact(1, vec![0x01, 0x00]))
        .with_group(10);
    let codes = write(
        &node,
        vec![
            Update::insert(member(1, 4)),
            Update::insert(member(2, 5)),
            Update::insert(group.clone()),
            Update::insert(entry.clone()),
        ],
    );
    assert_eq!(codes, vec![StatusCode::Ok; 4]);
    assert_eq!(driver.entry_count(NODE, "ingress_nexthop"), 1);

    let groups = read(
        &node,
        ActionProfileGroup {
            action_profile_id: NEXTHOP_SELECTOR,
            ..Default::default()
        },
    );
    assert_eq!(
        groups,
        vec![Entity::ActionProfileGroup(ActionProfileGroup {
            max_size: 4,
            ..group
        })]
    );
    assert_eq!(read(&node, TableEntry::new(NEXTHOP)), vec![Entity::TableEntry(entry)]);
}

#[test]
fn test_kernel_backend_rejects_asic_only_entities() {
    let (_, node) = pushed_node(SimDriver::kernel_dataplane());
    let codes = write(
        &node,
        vec![
            Update::modify(MeterEntry {
                meter_id: POLICER,
                index: Some(0),
                config: Some(MeterConfig::default()),
            }),
            Update::modify(RegisterEntry {
                register_id: SEEN,
                index: Some(0),
                data: Some(vec![1]),
            }),
        ],
    );
    assert_eq!(
        codes,
        vec![StatusCode::Unimplemented, StatusCode::Unimplemented]
    );
}

#[test]
fn test_chassis_and_pipeline_files() {
    let mut chassis = NamedTempFile::new().unwrap();
    chassis
        .write_all(b"nodes:\n  - node_id: 1\n    backend: kernel_dataplane\n    ports:\n      - name: veth0\n")
        .unwrap();
    let config = ChassisConfig::from_file(chassis.path()).unwrap();

    let mut p4info = NamedTempFile::new().unwrap();
    p4info
        .write_all(serde_json::to_string(&p4info_json()).unwrap().as_bytes())
        .unwrap();
    let mut program = NamedTempFile::new().unwrap();
    program.write_all(PROGRAM).unwrap();
    let pipeline = load_pipeline_config(p4info.path(), program.path()).unwrap();

    let node_config = &config.nodes[0];
    let driver = Arc::new(SimDriver::kernel_dataplane());
    let node = DeviceNode::new(node_config.node_id, Arc::clone(&driver), node_config.port_names());
    node.push_config(pipeline).unwrap();
    assert_eq!(driver.ports(NODE), vec!["veth0"]);
    assert_eq!(driver.loaded_program(NODE), Some(PROGRAM.to_vec()));

    node.shutdown().unwrap();
    assert!(driver.ports(NODE).is_empty());
}
