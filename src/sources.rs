//! # Provisioning/settings source.
//!
//! The [`ProvisioningSource`] collaborator answers three synchronous reads the
//! scheduler performs on demand:
//! - the provisioning tri-state (consulted on every provisioning signal),
//! - the device identity fields (captured once, after the first successful
//!   publish),
//! - the active [`PollSettings`] (re-read after a settings-changed signal).
//!
//! Transport availability and publish outcomes are *pushed* as signals instead;
//! only the values above are pulled.

use std::sync::Arc;

use crate::config::PollSettings;
use crate::policies::Provisioned;

/// Shared handle to a provisioning source implementation.
pub type SourceRef = Arc<dyn ProvisioningSource>;

/// Device identity fields captured opportunistically after the first
/// successful publish. None of the fields are required to be present.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// The device's own line number, if known.
    pub number: Option<String>,
    /// Carrier subscriber identity, if known.
    pub subscriber_id: Option<String>,
}

/// # Provisioning and settings reads.
///
/// Reads must be cheap and non-blocking; implementations cache upstream values
/// and refresh them out-of-band.
pub trait ProvisioningSource: Send + Sync + 'static {
    /// Current provisioning status of the capability feature.
    fn provisioned(&self) -> Provisioned;

    /// Device identity fields, if available yet.
    fn identity(&self) -> Option<DeviceIdentity>;

    /// The currently configured poll intervals.
    fn settings(&self) -> PollSettings;
}
