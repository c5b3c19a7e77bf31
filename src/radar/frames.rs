///! Frame slot store
///!
///! The 25-frame rolling window: per-frame HTTP validators plus the
///! decoded bitmap each slot exclusively owns.

use image::RgbaImage;
use std::collections::VecDeque;

/// Number of frames in the upstream animation window.
pub const FRAME_COUNT: usize = 25;

/// Trailing length used by the weak ETag comparison.
const WEAK_ETAG_SUFFIX_LEN: usize = 5;

/// Cache metadata and decoded content for one animation frame.
#[derive(Debug, Default, Clone)]
pub struct FrameSlot {
    /// Upstream validator for this frame's exact bytes; empty means the
    /// slot has never been fetched.
    pub etag: String,
    pub last_modified: Option<String>,
    pub content_length: Option<u64>,
    /// Decoded bitmap, replaced wholesale on refetch.
    pub image: Option<RgbaImage>,
}

impl FrameSlot {
    pub fn is_fetched(&self) -> bool {
        !self.etag.is_empty()
    }
}

/// Ordered ring of exactly 25 slots: index 0 oldest, index 24 newest.
///
/// Callers must hold the camera's refresh gate before mutating; the
/// window itself carries no locking.
#[derive(Debug)]
pub struct FrameWindow {
    slots: VecDeque<FrameSlot>,
}

impl FrameWindow {
    pub fn new() -> Self {
        Self {
            slots: std::iter::repeat_with(FrameSlot::default)
                .take(FRAME_COUNT)
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn oldest(&self) -> &FrameSlot {
        &self.slots[0]
    }

    pub fn get(&self, index: usize) -> &FrameSlot {
        &self.slots[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut FrameSlot {
        &mut self.slots[index]
    }

    /// Pop the oldest slot and append a fresh empty one, keeping the
    /// window at 25 entries. The appended slot is picked up by the next
    /// refresh pass because its ETag is empty.
    pub fn evict_oldest(&mut self) {
        self.slots.pop_front();
        self.slots.push_back(FrameSlot::default());
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameSlot> {
        self.slots.iter()
    }

    /// All decoded bitmaps oldest to newest, or `None` while any slot has
    /// not decoded yet.
    pub fn decoded_frames(&self) -> Option<Vec<&RgbaImage>> {
        self.slots.iter().map(|slot| slot.image.as_ref()).collect()
    }
}

impl Default for FrameWindow {
    fn default() -> Self {
        Self::new()
    }
}

/// Deliberately weak ETag comparison: only the trailing 5 characters are
/// compared, mirroring how the upstream composite's validators are
/// matched. Collisions are accepted; strengthening this would change
/// observed cache-hit behavior against the live service.
pub fn weak_etag_match(a: &str, b: &str) -> bool {
    etag_tail(a) == etag_tail(b)
}

fn etag_tail(etag: &str) -> &str {
    let start = etag.len().saturating_sub(WEAK_ETAG_SUFFIX_LEN);
    etag.get(start..).unwrap_or(etag)
}
