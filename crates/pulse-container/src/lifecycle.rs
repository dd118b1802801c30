//! Start-or-reuse lifecycle for the logging database container.

use crate::discovery::{self, DiscoveredContainer};
use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
    RenameContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use futures::StreamExt;
use pulse_core::config::{self, DbSettings, RunSettings};
use pulse_core::{Error, Result};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Base image for the logging database.
pub const POSTGRES_IMAGE: &str = "postgres:16-alpine";
/// Reserved name marking the framework's container. Legacy containers are
/// renamed to this on discovery (labels cannot be changed after creation).
pub const CONTAINER_NAME: &str = "pulse-postgres";
/// Label attached to containers this framework creates.
pub const MANAGED_LABEL: &str = "io.pulse.managed";

const MANAGED_LABEL_FILTER: &str = "io.pulse.managed=true";
const POSTGRES_PORT: u16 = 5432;

/// A container this lifecycle instance created and owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: String,
    pub host_port: u16,
    pub running: bool,
}

/// The container-runtime operations discovery needs. Implemented for the
/// Docker daemon below; tests substitute an in-memory runtime.
#[async_trait]
trait ContainerRuntime {
    /// Running containers matching one list filter (`label`, `name`,
    /// `ancestor`).
    async fn list(&self, filter: &str, value: &str) -> Result<Vec<DiscoveredContainer>>;

    /// Rename a container.
    async fn rename(&self, id: &str, name: &str) -> Result<()>;

    /// Whether the container is actually running.
    async fn is_running(&self, id: &str) -> Result<bool>;

    /// Force-remove a container.
    async fn remove(&self, id: &str) -> Result<()>;
}

/// Locate a running container to reuse: by managed label first, then by
/// the reserved name, then by base image (legacy setups, which get the
/// name attached best-effort; a rename failure is logged and the
/// container is still reused). A match without a published port or that
/// fails the running check is discarded, and a broken match is
/// force-removed so creation can take its place.
async fn find_reusable<R: ContainerRuntime>(runtime: &R) -> Result<Option<(String, u16)>> {
    let mut found = runtime
        .list("label", MANAGED_LABEL_FILTER)
        .await?
        .into_iter()
        .next();
    if found.is_none() {
        found = runtime.list("name", CONTAINER_NAME).await?.into_iter().next();
    }
    if found.is_none() {
        found = runtime
            .list("ancestor", POSTGRES_IMAGE)
            .await?
            .into_iter()
            .next();
        if let Some(legacy) = &found {
            match runtime.rename(&legacy.id, CONTAINER_NAME).await {
                Ok(()) => info!(container = %legacy.id, "Marked legacy container as framework-managed"),
                Err(e) => warn!(container = %legacy.id, error = %e, "Failed to mark legacy container"),
            }
        }
    }

    let Some(container) = found else {
        return Ok(None);
    };
    let Some(host_port) = container.host_port else {
        debug!(container = %container.id, "Matched container has no published port");
        return Ok(None);
    };

    if runtime.is_running(&container.id).await.unwrap_or(false) {
        return Ok(Some((container.id, host_port)));
    }

    warn!(container = %container.id, "Matched container is not running, removing it");
    if let Err(e) = runtime.remove(&container.id).await {
        warn!(error = %e, "Failed to remove broken container");
    }
    Ok(None)
}

/// Finds or creates the one authoritative database container for a run.
///
/// Constructed once per test run by the harness and handed to it; `stop`
/// only ever touches a container this instance created in `start`.
pub struct PostgresLifecycle {
    docker: Docker,
    started: Option<ContainerHandle>,
}

impl PostgresLifecycle {
    /// Connect to the local Docker daemon.
    pub fn new() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| Error::Container(format!("Failed to connect to Docker: {}", e)))?;
        Ok(Self::with_docker(docker))
    }

    /// Use an existing Docker client.
    pub fn with_docker(docker: Docker) -> Self {
        Self {
            docker,
            started: None,
        }
    }

    /// Start or reuse the database container.
    ///
    /// Returns `Ok(None)` when an existing container was reused (nothing
    /// new to track) and `Ok(Some(handle))` for a freshly created one. In
    /// both cases the container's host/port are published into the
    /// environment for `DbSettings::from_env` readers. Discovery failures
    /// degrade to creation; creation failure is fatal.
    pub async fn start(&mut self) -> Result<Option<ContainerHandle>> {
        match find_reusable(&DockerRuntime(&self.docker)).await {
            Ok(Some((id, host_port))) => {
                info!(container = %id, host_port, "Reusing existing database container");
                config::publish_db_host("localhost");
                config::publish_db_port(host_port);
                return Ok(None);
            }
            Ok(None) => {
                debug!("No reusable database container found");
            }
            Err(e) => {
                warn!(error = %e, "Container discovery failed, creating a new one");
            }
        }

        let handle = self.create_container().await?;
        config::publish_db_host("localhost");
        config::publish_db_port(handle.host_port);
        self.started = Some(handle.clone());
        Ok(Some(handle))
    }

    /// Stop the container this instance created, unless the keep-alive
    /// flag asks for it to survive the run. Reused containers are never
    /// stopped.
    pub async fn stop(&mut self) -> Result<()> {
        if RunSettings::from_env().keep_db_alive {
            info!("Keep-alive flag set, leaving database container running");
            return Ok(());
        }

        if let Some(handle) = self.started.take() {
            info!(container = %handle.id, "Stopping database container");
            self.docker
                .stop_container(&handle.id, Some(StopContainerOptions { t: 10 }))
                .await
                .map_err(|e| Error::Container(format!("Failed to stop container: {}", e)))?;
        }
        Ok(())
    }

    /// The handle of a container created by this instance, if any.
    pub fn started(&self) -> Option<&ContainerHandle> {
        self.started.as_ref()
    }

    /// Pull the base image and create a fresh, labeled database container
    /// with an ephemeral published port.
    async fn create_container(&self) -> Result<ContainerHandle> {
        let settings = DbSettings::from_env();
        info!(image = POSTGRES_IMAGE, "Creating database container");

        let mut pull = self.docker.create_image(
            Some(CreateImageOptions {
                from_image: POSTGRES_IMAGE,
                ..Default::default()
            }),
            None,
            None,
        );
        while let Some(progress) = pull.next().await {
            progress
                .map_err(|e| Error::ContainerCreation(format!("Failed to pull image: {}", e)))?;
        }

        // A stopped leftover with our reserved name would collide.
        let _ = self
            .docker
            .remove_container(
                CONTAINER_NAME,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await;

        let container_config = Config {
            image: Some(POSTGRES_IMAGE.to_string()),
            env: Some(vec![
                format!("POSTGRES_DB={}", settings.database),
                format!("POSTGRES_USER={}", settings.user),
                format!("POSTGRES_PASSWORD={}", settings.password),
            ]),
            labels: Some(HashMap::from([(
                MANAGED_LABEL.to_string(),
                "true".to_string(),
            )])),
            host_config: Some(HostConfig {
                publish_all_ports: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };

        self.docker
            .create_container(
                Some(CreateContainerOptions {
                    name: CONTAINER_NAME,
                    platform: None,
                }),
                container_config,
            )
            .await
            .map_err(|e| Error::ContainerCreation(format!("Failed to create container: {}", e)))?;

        self.docker
            .start_container(CONTAINER_NAME, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Error::ContainerCreation(format!("Failed to start container: {}", e)))?;

        let inspect = self
            .docker
            .inspect_container(CONTAINER_NAME, None)
            .await
            .map_err(|e| Error::ContainerCreation(format!("Failed to inspect container: {}", e)))?;

        let host_port = discovery::inspect_host_port(&inspect, POSTGRES_PORT).ok_or_else(|| {
            Error::ContainerCreation("Container has no published database port".to_string())
        })?;
        let id = inspect
            .id
            .unwrap_or_else(|| CONTAINER_NAME.to_string());

        debug!(container = %id, host_port, "Database container started");
        Ok(ContainerHandle {
            id,
            host_port,
            running: true,
        })
    }
}

/// Docker-daemon implementation of the discovery operations.
struct DockerRuntime<'a>(&'a Docker);

#[async_trait]
impl ContainerRuntime for DockerRuntime<'_> {
    async fn list(&self, filter: &str, value: &str) -> Result<Vec<DiscoveredContainer>> {
        let options = ListContainersOptions::<String> {
            all: false,
            filters: HashMap::from([(filter.to_string(), vec![value.to_string()])]),
            ..Default::default()
        };
        let summaries = self
            .0
            .list_containers(Some(options))
            .await
            .map_err(|e| Error::Container(format!("Failed to list containers: {}", e)))?;

        Ok(summaries
            .iter()
            .filter_map(|s| discovery::from_summary(s, POSTGRES_PORT))
            .collect())
    }

    async fn rename(&self, id: &str, name: &str) -> Result<()> {
        self.0
            .rename_container(id, RenameContainerOptions { name })
            .await
            .map_err(|e| Error::Container(format!("Failed to rename container: {}", e)))
    }

    async fn is_running(&self, id: &str) -> Result<bool> {
        let resp = self
            .0
            .inspect_container(id, None)
            .await
            .map_err(|e| Error::Container(format!("Failed to inspect container: {}", e)))?;
        Ok(discovery::is_running(&resp))
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.0
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| Error::Container(format!("Failed to remove container: {}", e)))
    }
}
