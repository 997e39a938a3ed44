//! Ordered fan-out of one record into both views.
//!
//! There is no cross-table transaction. The primary view is written first and
//! is the source of truth; the secondary view is only written once the primary
//! write is acknowledged. A failure between the two leaves the event in the
//! primary view and missing from the secondary one, which a rescan of the
//! primary view can repair.

use tracing::debug;

use crate::columns::ViewRows;
use crate::error::{View, WriteError};
use crate::store::{ConsistencyLevel, ViewStore};

pub struct DualWriter<S> {
    store: S,
}

impl<S: ViewStore> DualWriter<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn consistency(&self) -> ConsistencyLevel {
        self.store.consistency()
    }

    /// Write the primary row, then the secondary row. No retries.
    pub async fn write(&self, rows: &ViewRows) -> Result<(), WriteError> {
        self.store
            .write_primary(&rows.primary)
            .await
            .map_err(|source| WriteError {
                view: View::Primary,
                event_id: rows.primary.id.clone(),
                source,
            })?;

        self.store
            .write_secondary(&rows.secondary)
            .await
            .map_err(|source| WriteError {
                view: View::Secondary,
                event_id: rows.secondary.event_id.clone(),
                source,
            })?;

        debug!(
            event_id = %rows.event_id(),
            account_id = %rows.secondary.account_id,
            created_at = rows.primary.created_at,
            "record written to both views"
        );
        Ok(())
    }
}
