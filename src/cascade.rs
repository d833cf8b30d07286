//! Teardown of an addon that is no longer wanted.
//!
//! The lease goes first. If it cannot be removed the addon is left in place,
//! so a lease never outlives the addon it reports on.

use crate::error::Result;
use crate::store::AddonStore;
use tracing::{debug, info, instrument, warn};

/// Whether an addon with no manifest work left should be removed.
pub fn should_teardown(enabled: bool, config_deleting: bool, has_manifest_work: bool) -> bool {
    !has_manifest_work && (!enabled || config_deleting)
}

/// Delete the addon's lease, then the addon. Not-found counts as deleted.
#[instrument(skip(store))]
pub async fn teardown<S>(store: &S, namespace: &str, name: &str) -> Result<()>
where
    S: AddonStore + ?Sized,
{
    match store.delete_lease(namespace, name).await {
        Ok(()) => info!("Deleted addon lease"),
        Err(e) if e.is_not_found() => debug!("Addon lease already gone"),
        Err(e) => {
            warn!(error = %e, "Failed to delete addon lease, keeping addon");
            return Err(e);
        }
    }

    match store.delete_addon(namespace, name).await {
        Ok(()) => info!("Deleted addon"),
        Err(e) if e.is_not_found() => debug!("Addon already gone"),
        Err(e) => return Err(e),
    }
    Ok(())
}
