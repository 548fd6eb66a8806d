//! Single-threaded reconciliation loop over a queue of events.
use std::{
    collections::VecDeque,
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
};

use fs2::FileExt;
use tracing::{debug, info, warn};

use crate::{
    charm::ParcaCharm, error::CharmError, event::Event, platform::Platform,
    scrape::MetricsDiscovery, status::UnitStatus, workload::Workload,
};

/// Drains queued events through the charm one at a time.
pub struct Reconciler<W, D, P> {
    charm: ParcaCharm<W, D, P>,
    queue: VecDeque<Event>,
}

impl<W, D, P> Reconciler<W, D, P>
where
    W: Workload,
    D: MetricsDiscovery,
    P: Platform,
{
    pub fn new(charm: ParcaCharm<W, D, P>) -> Self {
        Self {
            charm,
            queue: VecDeque::new(),
        }
    }

    pub fn enqueue(&mut self, event: Event) {
        self.queue.push_back(event);
    }

    #[cfg(test)]
    pub(crate) fn charm(&self) -> &ParcaCharm<W, D, P> {
        &self.charm
    }

    /// Handles queued events in order until the queue is empty.
    ///
    /// Stops at the first handler error. Events queued behind a `Remove` are
    /// discarded since the unit is being torn down.
    pub fn run(&mut self) -> Result<UnitStatus, CharmError> {
        while let Some(event) = self.queue.pop_front() {
            let status = self.charm.handle(event)?;
            debug!("{event} handled; status is now {status}");

            if event == Event::Remove && !self.queue.is_empty() {
                warn!(
                    "Discarding {} event(s) queued after remove",
                    self.queue.len()
                );
                self.queue.clear();
            }
        }
        Ok(self.charm.status().clone())
    }
}

/// Exclusive lock held for the duration of a dispatch.
///
/// Released when dropped.
#[derive(Debug)]
pub struct DispatchLock {
    file: File,
    path: PathBuf,
}

impl DispatchLock {
    /// Blocks until the lock at `path` is acquired.
    pub fn acquire(path: &Path) -> Result<Self, CharmError> {
        let lock_error = |source| CharmError::Lock {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(lock_error)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(lock_error)?;

        if file.try_lock_exclusive().is_err() {
            info!("Waiting for another operator invocation to release {}", path.display());
            file.lock_exclusive().map_err(lock_error)?;
        }

        debug!("Acquired dispatch lock {}", path.display());
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for DispatchLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            warn!("Failed to release {}: {err}", self.path.display());
        }
    }
}
