//! Page locator -- finds the highest existing page index with O(log N) probes.
//!
//! There is no endpoint that reports the page count, so the locator first
//! walks a ladder of candidate indices until one is absent, then binary
//! searches the gap between the last present candidate and the absent one.

use super::source::{PageSource, ProbeMode, ResourceCheck};
use crate::config::LocatorConfig;
use crate::types::PageResolution;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Probe {
    Found,
    NotFound,
    Transient,
}

/// Discovers how many pages a project's report has
pub struct PageLocator<'a> {
    source: &'a dyn PageSource,
    config: &'a LocatorConfig,
}

impl<'a> PageLocator<'a> {
    /// Create a locator over `source`
    pub fn new(source: &'a dyn PageSource, config: &'a LocatorConfig) -> Self {
        Self { source, config }
    }

    /// Highest index that resolves, or `None` when no probed index resolved
    ///
    /// Returns the ceiling when every ladder candidate up to it resolved.
    pub async fn locate(&self, project_id: &str) -> Option<u32> {
        let ceiling = self.config.ceiling;
        let mut last_found = 0u32;
        let mut boundary = None;

        for candidate in probe_ladder(&self.config.candidates, ceiling) {
            match self.probe_with_retry(project_id, candidate).await {
                Probe::Found => last_found = candidate,
                Probe::NotFound | Probe::Transient => {
                    boundary = Some(candidate);
                    break;
                }
            }
        }

        let Some(boundary) = boundary else {
            tracing::warn!(project_id, ceiling, "every probe up to the ceiling resolved");
            return Some(ceiling);
        };

        let mut best = (last_found > 0).then_some(last_found);
        let mut low = last_found + 1;
        let mut high = boundary - 1;

        while low <= high {
            let mid = low + (high - low) / 2;
            match self.probe_with_retry(project_id, mid).await {
                Probe::Found => {
                    best = Some(mid);
                    low = mid + 1;
                }
                Probe::NotFound | Probe::Transient => high = mid - 1,
            }
        }

        tracing::debug!(project_id, total = ?best, "page count located");
        best
    }

    /// One probe, retried once after a short wait if transient
    async fn probe_with_retry(&self, project_id: &str, index: u32) -> Probe {
        let first = self.probe(project_id, index).await;
        if first != Probe::Transient {
            return first;
        }
        tokio::time::sleep(self.config.probe_retry_delay).await;
        self.probe(project_id, index).await
    }

    async fn probe(&self, project_id: &str, index: u32) -> Probe {
        match self.source.resolve(project_id, index, ProbeMode::Check).await {
            PageResolution::Found(url) => {
                if !self.config.verify_resources {
                    return Probe::Found;
                }
                // Inconclusive checks keep the page
                match self.source.verify(&url).await {
                    ResourceCheck::Missing => Probe::NotFound,
                    ResourceCheck::Exists | ResourceCheck::Inconclusive => Probe::Found,
                }
            }
            PageResolution::NotFound => Probe::NotFound,
            PageResolution::Transient => Probe::Transient,
        }
    }
}

/// Ascending candidates: configured ladder, then doubling, capped at and ending with `ceiling`
fn probe_ladder(candidates: &[u32], ceiling: u32) -> Vec<u32> {
    let mut ladder: Vec<u32> = candidates
        .iter()
        .copied()
        .filter(|&c| c > 0 && c < ceiling)
        .collect();

    let mut next = ladder.last().map_or(1, |&last| last.saturating_mul(2));
    while next < ceiling {
        ladder.push(next);
        next = next.saturating_mul(2);
    }
    ladder.push(ceiling);
    ladder
}
