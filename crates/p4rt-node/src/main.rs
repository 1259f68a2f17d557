//! P4Runtime device node daemon.
//!
//! Builds one device node per chassis node on top of the simulated backend,
//! optionally pushes a pipeline, applies a write request and runs a read
//! request, all from files. Read results are printed as JSON.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info, warn};
use p4rt_driver::{Capabilities, SimDriver};
use p4rt_node::config::{load_pipeline_config, load_read_request, load_write_request};
use p4rt_node::{ChassisConfig, DeviceNode};
use p4rt_types::ReadResponse;

/// P4Runtime table programming node
#[derive(Parser, Debug)]
#[command(name = "p4rt-node")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Chassis configuration (YAML)
    #[arg(short = 'c', long)]
    chassis_config: PathBuf,

    /// P4Info schema to push (JSON)
    #[arg(long, requires = "device_config")]
    p4info: Option<PathBuf>,

    /// Program binary to push
    #[arg(long, requires = "p4info")]
    device_config: Option<PathBuf>,

    /// Node receiving the pipeline and requests; defaults to the first node
    #[arg(short = 'n', long)]
    node_id: Option<u64>,

    /// Write request to apply (JSON)
    #[arg(short = 'w', long)]
    write_request: Option<PathBuf>,

    /// Read request to run (JSON)
    #[arg(short = 'r', long)]
    read_request: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

fn run(args: &Args) -> Result<bool> {
    let chassis = ChassisConfig::from_file(&args.chassis_config)
        .with_context(|| format!("loading {}", args.chassis_config.display()))?;
    if chassis.nodes.is_empty() {
        bail!("chassis config lists no nodes");
    }

    let nodes: Vec<DeviceNode<SimDriver>> = chassis
        .nodes
        .iter()
        .map(|n| {
            info!("Node {}: {} backend, {} ports", n.node_id, n.backend, n.ports.len());
            let driver = Arc::new(SimDriver::new(Capabilities::for_kind(n.backend)));
            DeviceNode::new(n.node_id, driver, n.port_names())
        })
        .collect();

    drive(args, &nodes)
}

/// Runs the requested steps on the target node, then shuts every node down
/// whatever the outcome.
fn drive(args: &Args, nodes: &[DeviceNode<SimDriver>]) -> Result<bool> {
    let result = match args.node_id {
        Some(id) => nodes
            .iter()
            .find(|n| n.node_id() == id)
            .with_context(|| format!("node {} is not in the chassis config", id))
            .and_then(|target| apply(args, target)),
        None => nodes
            .first()
            .context("chassis config lists no nodes")
            .and_then(|target| apply(args, target)),
    };

    for node in nodes {
        if let Err(e) = node.shutdown() {
            warn!("Node {}: shutdown failed: {}", node.node_id(), e);
        }
    }
    result
}

/// Pushes the pipeline and runs the requests named on the command line
/// against one node. Returns false when any update or read failed.
fn apply(args: &Args, target: &DeviceNode<SimDriver>) -> Result<bool> {
    let mut ok = true;
    if let (Some(p4info), Some(device_config)) = (&args.p4info, &args.device_config) {
        let config = load_pipeline_config(p4info, device_config)?;
        target
            .push_config(config)
            .with_context(|| format!("pushing pipeline to node {}", target.node_id()))?;
        info!("Node {}: pipeline pushed", target.node_id());
    }

    if let Some(path) = &args.write_request {
        let request = load_write_request(path)?;
        let outcome = target.write_batch(&request)?;
        for (i, status) in outcome.details.iter().enumerate() {
            if !status.is_ok() {
                warn!("Update {}: {} {}", i, status.code, status.message);
            }
        }
        info!(
            "Applied {} updates: {}",
            outcome.details.len(),
            outcome.status.code
        );
        ok &= outcome.is_ok();
    }

    if let Some(path) = &args.read_request {
        let request = load_read_request(path)?;
        let mut response = ReadResponse::default();
        let outcome = target.read_entities(&request, &mut response)?;
        println!("{}", serde_json::to_string_pretty(&response)?);
        ok &= outcome.is_ok();
    }
    Ok(ok)
}

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
