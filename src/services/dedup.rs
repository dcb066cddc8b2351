use std::collections::HashSet;

use crate::models::{DownloadResult, RemoteImage};

/// Split `candidates` into first-seen unique images and duplicate results.
///
/// The URL is compared as an exact, case-sensitive string. Both outputs keep
/// encounter order.
pub fn dedupe_candidates(candidates: Vec<RemoteImage>) -> (Vec<RemoteImage>, Vec<DownloadResult>) {
    let mut seen_urls: HashSet<String> = HashSet::with_capacity(candidates.len());
    let mut unique = Vec::with_capacity(candidates.len());
    let mut duplicates = Vec::new();

    for candidate in candidates {
        if seen_urls.contains(candidate.url()) {
            tracing::debug!("Skipping duplicate candidate: {}", candidate.url());
            duplicates.push(DownloadResult::duplicate(&candidate));
            continue;
        }
        seen_urls.insert(candidate.url().to_string());
        unique.push(candidate);
    }

    (unique, duplicates)
}
