//! Shared pipeline schema for unit tests.

use std::sync::Arc;

use p4rt_driver::{Capabilities, PipelineDriver, SimDriver};
use p4rt_schema::SchemaRegistry;
use p4rt_types::p4info::{
    Action, ActionProfile, ActionRef, ActionScope, Counter, CounterUnit, DirectCounter,
    DirectMeter, MatchField, MatchType, Meter, MeterUnit, P4Info, Param, Preamble, Register,
    Table,
};
use p4rt_types::ForwardingPipelineConfig;

use crate::table_manager::TableManager;

pub const SWITCHING: u32 = 1;
pub const ACL: u32 = 2;
pub const ROUTING: u32 = 3;
pub const PORT_RANGE: u32 = 4;
pub const CONST_TABLE: u32 = 5;
pub const ECMP: u32 = 6;

pub const FORWARD: u32 = 10;
pub const DROP: u32 = 11;
pub const PUNT: u32 = 12;

pub const IN_PKTS: u32 = 100;
pub const PORT_METER: u32 = 200;
pub const FLOW_STATE: u32 = 300;
pub const ECMP_SELECTOR: u32 = 400;
pub const SWITCHING_COUNTER: u32 = 500;
pub const ACL_METER: u32 = 600;

fn refs(ids: &[(u32, ActionScope)]) -> Vec<ActionRef> {
    ids.iter().map(|(id, scope)| ActionRef { id: *id, scope: *scope }).collect()
}

pub fn p4info() -> P4Info {
    use ActionScope::*;
    P4Info {
        tables: vec![
            Table {
                preamble: Preamble::new(SWITCHING, "ingress.tbl_switching"),
                match_fields: vec![
                    MatchField::new(1, "hdr.ethernet.dst_addr", 48, MatchType::Exact),
                    MatchField::new(2, "meta.vlan_id", 12, MatchType::Exact),
                ],
                action_refs: refs(&[(FORWARD, TableAndDefault), (DROP, TableAndDefault)]),
                direct_resource_ids: vec![SWITCHING_COUNTER],
                size: 1024,
                ..Default::default()
            },
            Table {
                preamble: Preamble::new(ACL, "ingress.tbl_acl"),
                match_fields: vec![
                    MatchField::new(1, "hdr.ipv4.protocol", 8, MatchType::Ternary),
                    MatchField::new(2, "meta.vrf", 12, MatchType::Exact),
                ],
                action_refs: refs(&[(FORWARD, TableAndDefault), (DROP, TableAndDefault)]),
                direct_resource_ids: vec![ACL_METER],
                size: 256,
                ..Default::default()
            },
            Table {
                preamble: Preamble::new(ROUTING, "ingress.tbl_routing"),
                match_fields: vec![MatchField::new(1, "hdr.ipv4.dst_addr", 32, MatchType::Lpm)],
                action_refs: refs(&[(FORWARD, TableOnly), (DROP, TableAndDefault), (PUNT, DefaultOnly)]),
                size: 1024,
                ..Default::default()
            },
            Table {
                preamble: Preamble::new(PORT_RANGE, "ingress.tbl_port_range"),
                match_fields: vec![MatchField::new(1, "meta.l4_port", 16, MatchType::Range)],
                action_refs: refs(&[(DROP, TableAndDefault)]),
                size: 64,
                ..Default::default()
            },
            Table {
                preamble: Preamble::new(CONST_TABLE, "ingress.tbl_const"),
                match_fields: vec![MatchField::new(1, "meta.vrf", 12, MatchType::Exact)],
                action_refs: refs(&[(DROP, TableAndDefault)]),
                const_default_action_id: DROP,
                is_const_table: true,
                size: 16,
                ..Default::default()
            },
            Table {
                preamble: Preamble::new(ECMP, "ingress.tbl_ecmp"),
                match_fields: vec![MatchField::new(1, "meta.nexthop_id", 16, MatchType::Exact)],
                action_refs: refs(&[(FORWARD, TableAndDefault)]),
                implementation_id: ECMP_SELECTOR,
                size: 128,
                ..Default::default()
            },
        ],
        actions: vec![
            Action {
                preamble: Preamble::new(FORWARD, "ingress.forward"),
                params: vec![Param::new(1, "port", 9)],
            },
            Action {
                preamble: Preamble::new(DROP, "ingress.drop"),
                params: vec![],
            },
            Action {
                preamble: Preamble::new(PUNT, "ingress.punt"),
                params: vec![],
            },
        ],
        counters: vec![Counter {
            preamble: Preamble::new(IN_PKTS, "ingress.in_pkts"),
            unit: CounterUnit::Both,
            size: 1024,
        }],
        direct_counters: vec![DirectCounter {
            preamble: Preamble::new(SWITCHING_COUNTER, "ingress.switching_counter"),
            unit: CounterUnit::Both,
            direct_table_id: SWITCHING,
        }],
        meters: vec![Meter {
            preamble: Preamble::new(PORT_METER, "ingress.port_meter"),
            unit: MeterUnit::Bytes,
            size: 64,
        }],
        direct_meters: vec![DirectMeter {
            preamble: Preamble::new(ACL_METER, "ingress.acl_meter"),
            unit: MeterUnit::Bytes,
            direct_table_id: ACL,
        }],
        registers: vec![Register {
            preamble: Preamble::new(FLOW_STATE, "ingress.flow_state"),
            bitwidth: 32,
            size: 128,
        }],
        action_profiles: vec![ActionProfile {
            preamble: Preamble::new(ECMP_SELECTOR, "ingress.ecmp_selector"),
            table_ids: vec![ECMP],
            with_selector: true,
            size: 128,
            max_group_size: 8,
        }],
    }
}

pub fn pipeline_config() -> ForwardingPipelineConfig {
    ForwardingPipelineConfig::new(p4info(), b"compiled-program".to_vec())
}

pub fn registry() -> SchemaRegistry {
    SchemaRegistry::new(&p4info()).expect("fixture schema is valid")
}

/// A manager over a simulated device with the pipeline loaded.
pub fn manager(capabilities: Capabilities) -> (Arc<SimDriver>, TableManager<SimDriver>) {
    let driver = Arc::new(SimDriver::new(capabilities));
    driver
        .load_pipeline(1, b"compiled-program")
        .expect("load pipeline");
    let manager = TableManager::new(Arc::clone(&driver), 1);
    (driver, manager)
}
