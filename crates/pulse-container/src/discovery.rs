//! Typed view over Docker container listings and inspections.
//!
//! The rest of the crate never touches raw bollard models; everything
//! funnels through these conversions, which are pure and testable without
//! a daemon.

use bollard::models::{ContainerInspectResponse, ContainerSummary, Port};

/// A running container as seen in a `docker ps`-style listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredContainer {
    pub id: String,
    pub name: Option<String>,
    /// Host port published for the database's container port, if any.
    pub host_port: Option<u16>,
}

/// Translate one listing entry. Entries without an id are unusable and
/// dropped.
pub fn from_summary(summary: &ContainerSummary, container_port: u16) -> Option<DiscoveredContainer> {
    let id = summary.id.clone()?;
    let name = summary
        .names
        .as_ref()
        .and_then(|names| names.first())
        .map(|n| n.trim_start_matches('/').to_string());
    let host_port = summary
        .ports
        .as_deref()
        .and_then(|ports| summary_host_port(ports, container_port));

    Some(DiscoveredContainer { id, name, host_port })
}

/// Find the published host port for a container port in a listing's port
/// table.
pub fn summary_host_port(ports: &[Port], container_port: u16) -> Option<u16> {
    ports
        .iter()
        .find(|p| p.private_port == container_port)
        .and_then(|p| p.public_port)
}

/// Find the published host port for a container port in an inspect
/// response's binding map.
pub fn inspect_host_port(resp: &ContainerInspectResponse, container_port: u16) -> Option<u16> {
    let key = format!("{container_port}/tcp");
    resp.network_settings
        .as_ref()?
        .ports
        .as_ref()?
        .get(&key)?
        .as_ref()?
        .iter()
        .find_map(|binding| binding.host_port.as_deref()?.parse().ok())
}

/// Whether the inspected container is actually running.
pub fn is_running(resp: &ContainerInspectResponse) -> bool {
    resp.state
        .as_ref()
        .and_then(|state| state.running)
        .unwrap_or(false)
}
