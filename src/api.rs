use log::{debug, warn};
use reqwest::{Method, Url};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::client::{ApiClient, RequestOptions};
use crate::credentials::CredentialStore;
use crate::error::{Error, Result};
use crate::models::Machine;
use crate::readiness::{self, Readiness};
use crate::settings::Settings;

pub const MACHINES_PATH: &str = "/api/machines";

/// Per-call timeout for single machine lookups
pub const MACHINE_TIMEOUT: Duration = Duration::from_secs(5);

/// Machine queries, gated on a one-time initialization.
///
/// The first caller of any query (or of [`ready`](Self::ready)) drives the
/// startup sequence; concurrent callers wait for the same outcome, and the
/// outcome is never recomputed for the lifetime of this value.
pub struct LaundrifyApi {
    client: ApiClient,
    auth_code: Option<String>,
    readiness: OnceCell<Readiness>,
}

impl LaundrifyApi {
    pub fn new(client: ApiClient, auth_code: Option<String>) -> Self {
        Self {
            client,
            auth_code,
            readiness: OnceCell::new(),
        }
    }

    /// Build the client and credential store described by `settings`
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let store = Arc::new(CredentialStore::new(settings.credential_path()?));
        let client = ApiClient::new_with_base_url(settings.base_url().to_string(), store);
        Ok(Self::new(client, settings.auth_code().map(str::to_string)))
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Wait for initialization (running it if nobody has yet)
    pub async fn readiness(&self) -> Readiness {
        *self
            .readiness
            .get_or_init(|| readiness::initialize(&self.client, self.auth_code.as_deref()))
            .await
    }

    /// Outcome of initialization, or `None` while it hasn't finished
    pub fn resolved_readiness(&self) -> Option<Readiness> {
        self.readiness.get().copied()
    }

    pub async fn ready(&self) -> bool {
        self.readiness().await.is_ready()
    }

    /// All machines of the account. Empty when the client isn't usable.
    pub async fn list_machines(&self) -> Result<Vec<Machine>> {
        let readiness = self.readiness().await;
        if !readiness.is_ready() {
            warn!(
                "Cannot load Machines since laundrify API is not initialized ({})",
                readiness
            );
            return Ok(Vec::new());
        }

        let machines: Vec<Machine> = self
            .client
            .request_json(Method::GET, MACHINES_PATH, RequestOptions::authenticated())
            .await?;

        debug!(
            "Retrieved {} machines ({})",
            machines.len(),
            machines
                .iter()
                .map(|machine| machine.id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(machines)
    }

    /// Fetch one machine. Fails with `MissingAccessToken` when no valid
    /// credential is installed.
    pub async fn get_machine(&self, id: &str) -> Result<Machine> {
        let path = machine_path(id)?;
        self.readiness().await;

        let machine: Machine = self
            .client
            .request_json(
                Method::GET,
                &path,
                RequestOptions::authenticated().with_timeout(MACHINE_TIMEOUT),
            )
            .await?;

        debug!("Machine {} is currently {}", machine.id, machine.status);
        Ok(machine)
    }
}

/// Path of machine `id`, with the id encoded as a single path segment.
fn machine_path(id: &str) -> Result<String> {
    // Url drops "." and ".." segments instead of encoding them
    if matches!(id, "" | "." | "..") {
        return Err(Error::InvalidMachineId(id.to_string()));
    }

    let mut url = Url::parse("http://localhost")
        .map_err(|_| Error::InvalidMachineId(id.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| Error::InvalidMachineId(id.to_string()))?
        .extend(MACHINES_PATH.trim_start_matches('/').split('/'))
        .push(id);
    Ok(url.path().to_string())
}
