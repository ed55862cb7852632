//! One-shot startup sequence deciding whether the client can serve queries.

use log::{debug, error, info, warn};
use std::fmt;

use crate::client::ApiClient;
use crate::credentials::CredentialRecord;
use crate::error::Error;
use crate::registration;

/// Version written into the credential record
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Terminal outcome of the initialization sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// No pairing code configured
    NoAuthCodeConfigured,
    /// A token is available and installed
    Ready,
    RegistrationFailed,
}

impl Readiness {
    pub fn is_ready(self) -> bool {
        self == Readiness::Ready
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Readiness::NoAuthCodeConfigured => write!(f, "no auth code configured"),
            Readiness::Ready => write!(f, "ready"),
            Readiness::RegistrationFailed => write!(f, "registration failed"),
        }
    }
}

/// Bring a loaded (or missing) record in line with this client version and
/// the configured pairing code. Returns true when the record changed.
pub(crate) fn reconcile(record: &mut CredentialRecord, auth_code: &str) -> bool {
    let mut changed = false;

    if record.plugin_version.as_deref() != Some(CLIENT_VERSION) {
        debug!(
            "The stored client version ({:?}) doesn't match the current version ({})",
            record.plugin_version, CLIENT_VERSION
        );

        // Records without a version were written before the pairing code was tracked
        if record.plugin_version.is_none() && record.has_token() && record.auth_code.is_empty() {
            debug!("Adopting the configured AuthCode for a legacy credential record");
            record.auth_code = auth_code.to_string();
        }

        record.plugin_version = Some(CLIENT_VERSION.to_string());
        changed = true;
    }

    if record.auth_code != auth_code {
        info!("The configured AuthCode changed, going to update the stored credentials..");
        record.auth_code = auth_code.to_string();
        record.access_token.clear();
        changed = true;
    }

    changed
}

/// Run the startup sequence once. Never fails: every failure becomes an
/// unready outcome, logged here.
pub(crate) async fn initialize(client: &ApiClient, auth_code: Option<&str>) -> Readiness {
    let Some(auth_code) = auth_code.map(str::trim).filter(|code| !code.is_empty()) else {
        warn!("AuthCode has not been configured yet. Please update your config.");
        return Readiness::NoAuthCodeConfigured;
    };

    let store = client.store();
    debug!("Loading credentials from {}", store.path().display());

    let mut record = match store.load() {
        Ok(record) => record,
        Err(Error::ConfigNotFound(_)) => CredentialRecord::default(),
        Err(err) => {
            error!("{}", err);
            CredentialRecord::default()
        }
    };

    if reconcile(&mut record, auth_code) {
        store.persist(record.clone());
    }

    let token = if record.has_token() {
        debug!("Using stored access token");
        record.access_token
    } else {
        info!("Not registered at the laundrify API yet. Going to register now..");
        match registration::register(client, auth_code).await {
            Ok(registration) => registration.token,
            Err(_) => return Readiness::RegistrationFailed,
        }
    };

    if let Err(err) = client.install_authorization(&token) {
        error!("Unable to use the access token: {}", err);
        store.clear_access_token();
        return Readiness::RegistrationFailed;
    }

    Readiness::Ready
}
