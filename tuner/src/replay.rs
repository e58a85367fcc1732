//! Stitches every new-best run of a tuning run into one watchable movie.

use anyhow::{Context, Result};
use smb_core::MovieOptions;

use crate::emulator::Emulator;
use crate::harness::Harness;
use crate::history::HistoryStore;

/// Header once, then each new-best movie (padding included) cut at the frame
/// where that run actually ended. Each best is re-played to learn its length,
/// so a broken emulator fails the whole reel.
pub fn new_bests_movie<E: Emulator>(
    harness: &Harness<E>,
    store: &HistoryStore,
    run_id: i64,
) -> Result<String> {
    let ids = store.new_best_configuration_ids(run_id)?;
    tracing::info!(run_id, bests = ids.len(), "building replay reel");

    let mut sections = vec![harness.codec().header_text()];
    for (idx, configuration_id) in ids.into_iter().enumerate() {
        let configuration = store.load_configuration(configuration_id)?;
        let events = harness
            .decode(&configuration)
            .with_context(|| format!("new best #{idx} (configuration {configuration_id})"))?;
        let outcome = harness
            .play(&events)
            .with_context(|| format!("replaying configuration {configuration_id}"))?;
        tracing::debug!(configuration_id, %outcome, "replayed new best");

        let segment = harness.movie(&events, &MovieOptions::trimmed(outcome.frames));
        if !segment.is_empty() {
            sections.push(segment);
        }
    }

    let mut reel = sections.join("\n");
    reel.push('\n');
    Ok(reel)
}
