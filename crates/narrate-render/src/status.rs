//! Persisted job status with read-merge-write updates.

use std::sync::Arc;

use chrono::Utc;
use narrate_core::paths::status_path;
use narrate_core::{
    ObjectStore, PutOptions, RenderId, RenderStatus, RetryPolicy, StatusError,
};
use tracing::{debug, warn};

use crate::error::RenderError;
use crate::fetcher::RetryableFetcher;

/// Serialize and write a full status snapshot.
pub(crate) async fn write_status(
    store: &dyn ObjectStore,
    id: &RenderId,
    status: &RenderStatus,
) -> Result<(), RenderError> {
    let bytes = serde_json::to_vec_pretty(status).map_err(|e| RenderError::serialize("status", e))?;
    store.put(&status_path(id), bytes, PutOptions::json()).await?;
    Ok(())
}

/// Owns the status of one running job.
///
/// Every update applies a mutation to the in-memory snapshot, merges in
/// whatever is currently stored, and writes the full result back. Readers
/// therefore always see a complete snapshot, and merging never moves the
/// job backwards.
pub struct StatusTracker {
    store: Arc<dyn ObjectStore>,
    fetcher: RetryableFetcher,
    merge_policy: RetryPolicy,
    render_id: RenderId,
    current: RenderStatus,
}

impl StatusTracker {
    /// Load the stored status of `render_id`.
    pub async fn load(
        store: Arc<dyn ObjectStore>,
        render_id: RenderId,
        read_policy: &RetryPolicy,
        merge_policy: RetryPolicy,
    ) -> Result<Self, RenderError> {
        let fetcher = RetryableFetcher::new(Arc::clone(&store));
        let current = match fetcher.fetch_json(&status_path(&render_id), read_policy).await {
            Ok(status) => status,
            Err(e) if e.is_not_found() => return Err(RenderError::NotFound(render_id)),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            store,
            fetcher,
            merge_policy,
            render_id,
            current,
        })
    }

    pub const fn current(&self) -> &RenderStatus {
        &self.current
    }

    pub const fn render_id(&self) -> &RenderId {
        &self.render_id
    }

    /// Apply `mutate`, merge with the stored snapshot and persist.
    ///
    /// If `mutate` fails nothing is written and the in-memory snapshot is
    /// left unchanged.
    pub async fn update<F>(&mut self, mutate: F) -> Result<(), RenderError>
    where
        F: FnOnce(&mut RenderStatus) -> Result<(), StatusError>,
    {
        let mut next = self.current.clone();
        mutate(&mut next)?;
        next.updated_at = Utc::now().max(next.updated_at);

        let path = status_path(&self.render_id);
        match self
            .fetcher
            .fetch_optional(&path, &self.merge_policy)
            .await
        {
            Ok(Some(bytes)) => match serde_json::from_slice::<RenderStatus>(&bytes) {
                Ok(stored) => next.absorb(&stored),
                Err(e) => warn!(
                    target: "narrate.render",
                    render_id = %self.render_id,
                    error = %e,
                    "Stored status is unreadable, overwriting"
                ),
            },
            Ok(None) => {}
            Err(e) => warn!(
                target: "narrate.render",
                render_id = %self.render_id,
                error = %e,
                "Could not read stored status for merge"
            ),
        }

        write_status(self.store.as_ref(), &self.render_id, &next).await?;
        debug!(
            target: "narrate.render",
            render_id = %self.render_id,
            state = %next.state,
            done = next.progress.done,
            total = next.progress.total,
            "Status updated"
        );
        self.current = next;
        Ok(())
    }
}
