///! Staleness detection and the per-frame refresh pass.

use crate::error::{FetchError, RadarError};
use crate::fetch::{GetOutcome, HeadOutcome, RadarFetch};
use crate::radar::frames::{weak_etag_match, FrameWindow, FRAME_COUNT};
use crate::radar::marker::LocationMarker;

const RADAR_FRAME_URL_BASE: &str = "https://vrijeme.hr/anim_kompozit";

/// Per-frame animation endpoint; frames are numbered 1..=25 upstream.
pub(crate) fn frame_url(index: usize) -> String {
    format!("{}{}.png", RADAR_FRAME_URL_BASE, index + 1)
}

/// Detect an upstream window rollover and drop the frames that scrolled
/// out of it.
///
/// HEADs the first animation frame and weak-compares its ETag against
/// slot 0. Every mismatch means the window moved forward by at least one
/// frame, so the oldest slot is evicted. Bounded to one full window so a
/// comparison that never converges cannot spin.
pub(crate) async fn evict_rolled_frames(
    fetcher: &dyn RadarFetch,
    window: &mut FrameWindow,
) -> Result<(), FetchError> {
    let since = window.oldest().last_modified.clone();
    let outcome = fetcher.head(&frame_url(0), since.as_deref()).await?;

    let current = match outcome {
        HeadOutcome::NotModified => return Ok(()),
        HeadOutcome::Fresh { etag: None } => return Ok(()),
        HeadOutcome::Fresh { etag: Some(etag) } => etag,
    };

    let mut evicted = 0usize;
    for _ in 0..FRAME_COUNT {
        let stored = &window.oldest().etag;
        if stored.is_empty() || weak_etag_match(&current, stored) {
            break;
        }
        window.evict_oldest();
        evicted += 1;
    }

    if evicted > 0 {
        tracing::debug!("radar window rolled, evicted {} frame(s)", evicted);
    }
    Ok(())
}

/// Refetch every slot that has no validator yet, plus the newest slot,
/// which is unconditionally refreshed each cycle.
///
/// Returns whether any slot received new content. A 304 leaves the
/// cached bitmap untouched; a decode or transport failure aborts the
/// pass immediately (slots already updated in this pass stay updated).
pub(crate) async fn refresh_frames(
    fetcher: &dyn RadarFetch,
    window: &mut FrameWindow,
    marker: Option<&LocationMarker>,
) -> Result<bool, RadarError> {
    let mut regenerated = false;

    for index in 0..FRAME_COUNT {
        let newest = index == FRAME_COUNT - 1;
        if window.get(index).is_fetched() && !newest {
            continue;
        }

        let since = window.get(index).last_modified.clone();
        match fetcher.get(&frame_url(index), since.as_deref()).await? {
            GetOutcome::NotModified => {
                tracing::debug!("frame {} not modified", index + 1);
            }
            GetOutcome::Fetched(response) => {
                let mut image = image::load_from_memory(&response.bytes)?.to_rgba8();
                if let Some(marker) = marker {
                    marker.draw(&mut image);
                }

                tracing::debug!("frame {} refreshed ({} bytes)", index + 1, response.bytes.len());

                let slot = window.get_mut(index);
                slot.etag = response.etag.unwrap_or_default();
                slot.last_modified = response.last_modified;
                slot.content_length = response.content_length;
                slot.image = Some(image);
                regenerated = true;
            }
        }
    }

    Ok(regenerated)
}
