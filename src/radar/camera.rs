///! DHMZ radar camera
///!
///! Single-flight cached retrieval of the radar composite. Many logical
///! callers may request the current image at once; only one performs the
///! refresh cycle and everyone shares its outcome.

use crate::config::RadarConfig;
use crate::error::{FetchError, RadarError};
use crate::fetch::{GetOutcome, HttpFetcher, RadarFetch};
use crate::radar::compositor::{Compositor, OutputFormat};
use crate::radar::frames::FrameWindow;
use crate::radar::marker::LocationMarker;
use crate::radar::refresh::{evict_rolled_frames, refresh_frames};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Static composite image, linked as the entity picture.
pub const RADAR_MAP_URL_STATIC: &str = "https://vrijeme.hr/kompozit-stat.png";

/// Prebuilt animated composite, used by the legacy fallback path.
pub const RADAR_MAP_URL_ANIM: &str = "https://vrijeme.hr/kompozit-anim.gif";

/// Cached output artifact and the freshness bookkeeping around it.
///
/// Locked only for short, non-suspending critical sections so the fresh
/// fast path never queues behind an in-flight refresh.
#[derive(Debug, Default)]
struct CompositeCache {
    image: Option<Vec<u8>>,
    deadline: Option<Instant>,
    /// Bumped at the end of every refresh cycle, success or failure.
    /// Callers that queued during a cycle use it to detect that the
    /// outcome they were waiting for has been published.
    epoch: u64,
    refreshing: bool,
}

impl CompositeCache {
    fn is_fresh(&self, now: Instant, delta: Duration) -> bool {
        if delta.is_zero() || self.image.is_none() {
            return false;
        }
        match self.deadline {
            Some(deadline) => now <= deadline,
            None => false,
        }
    }
}

/// State owned by the refresh cycle. The mutex doubles as the
/// single-flight gate: whoever holds it is the one refresher.
#[derive(Debug, Default)]
struct RefreshState {
    window: FrameWindow,
    /// Validator for the legacy single-GIF path (Last-Modified, not ETag).
    legacy_last_modified: Option<String>,
}

enum CycleOutcome {
    /// New composite bytes were produced.
    Updated(Vec<u8>),
    /// Nothing changed upstream (or compositing was skipped); the cached
    /// bytes stay valid and the deadline still advances.
    Unchanged,
    /// Both the primary and the fallback path failed.
    Failed,
}

/// Radar camera core. One instance per configured camera entity; lives
/// for the process lifetime of the integration.
pub struct RadarCamera {
    name: String,
    delta: Duration,
    marker: Option<LocationMarker>,
    compositor: Compositor,
    fetcher: Arc<dyn RadarFetch>,
    cache: Mutex<CompositeCache>,
    refresh: Mutex<RefreshState>,
}

impl RadarCamera {
    /// Build a camera from validated configuration with the default
    /// reqwest-backed fetcher.
    pub fn new(config: &RadarConfig) -> anyhow::Result<Self> {
        Self::with_fetcher(config, Arc::new(HttpFetcher::new()))
    }

    pub fn with_fetcher(
        config: &RadarConfig,
        fetcher: Arc<dyn RadarFetch>,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let marker = match (config.mark_location, config.latitude, config.longitude) {
            (true, Some(latitude), Some(longitude)) => {
                Some(LocationMarker::new(latitude, longitude))
            }
            _ => None,
        };
        let format: OutputFormat = config.image_format.parse()?;

        Ok(Self {
            name: config.name.clone(),
            delta: Duration::from_secs_f64(config.delta),
            marker,
            compositor: Compositor::new(
                format,
                config.previous_images_time,
                config.current_image_time,
            ),
            fetcher,
            cache: Mutex::new(CompositeCache::default()),
            refresh: Mutex::new(RefreshState::default()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Link shown by the host UI next to the camera feed.
    pub fn entity_picture(&self) -> &'static str {
        RADAR_MAP_URL_STATIC
    }

    /// Whether a refresh cycle is currently in flight.
    pub async fn is_refreshing(&self) -> bool {
        self.cache.lock().await.refreshing
    }

    /// Produce the current composite image.
    ///
    /// Size hints are accepted for host-contract compatibility and
    /// ignored; the upstream raster has a fixed size. Never errors:
    /// worst case is stale bytes, or `None` before the first successful
    /// refresh, with diagnostics in the logs.
    pub async fn camera_image(&self, _width: u32, _height: u32) -> Option<Vec<u8>> {
        let observed_epoch = {
            let cache = self.cache.lock().await;
            if cache.is_fresh(Instant::now(), self.delta) {
                return cache.image.clone();
            }
            cache.epoch
        };

        let mut refresh = self.refresh.lock().await;

        {
            let mut cache = self.cache.lock().await;
            if cache.epoch != observed_epoch {
                // A refresh completed while we queued on the gate; share
                // its outcome instead of fetching again.
                return cache.image.clone();
            }
            cache.refreshing = true;
        }

        // The deadline anchors at the time the refresh started, not when
        // it completed, bounding the staleness window conservatively.
        let started = Instant::now();
        let outcome = self.run_refresh_cycle(&mut refresh).await;

        let mut cache = self.cache.lock().await;
        match outcome {
            CycleOutcome::Updated(bytes) => {
                cache.image = Some(bytes);
                cache.deadline = Some(started + self.delta);
            }
            CycleOutcome::Unchanged => {
                cache.deadline = Some(started + self.delta);
            }
            CycleOutcome::Failed => {}
        }
        cache.epoch = cache.epoch.wrapping_add(1);
        cache.refreshing = false;
        cache.image.clone()
    }

    /// One full refresh: rollover detection, per-frame refresh, composite
    /// regeneration, with the legacy single-GIF endpoint as fallback.
    async fn run_refresh_cycle(&self, state: &mut RefreshState) -> CycleOutcome {
        match self.primary_refresh(state).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!("primary radar refresh failed: {}", err);
                match self.fallback_fetch(state).await {
                    Ok(Some(bytes)) => CycleOutcome::Updated(bytes),
                    Ok(None) => CycleOutcome::Unchanged,
                    Err(err) => {
                        tracing::error!("fallback radar fetch failed: {}", err);
                        CycleOutcome::Failed
                    }
                }
            }
        }
    }

    async fn primary_refresh(&self, state: &mut RefreshState) -> Result<CycleOutcome, RadarError> {
        evict_rolled_frames(self.fetcher.as_ref(), &mut state.window).await?;

        let regenerated =
            refresh_frames(self.fetcher.as_ref(), &mut state.window, self.marker.as_ref()).await?;
        if !regenerated {
            return Ok(CycleOutcome::Unchanged);
        }

        let Some(frames) = state.window.decoded_frames() else {
            tracing::warn!("composite skipped: frame window incomplete");
            return Ok(CycleOutcome::Unchanged);
        };

        match self.compositor.compose(&frames) {
            Ok(bytes) => Ok(CycleOutcome::Updated(bytes)),
            Err(err) => {
                tracing::warn!("composite regeneration failed: {}", err);
                Ok(CycleOutcome::Unchanged)
            }
        }
    }

    /// Legacy path: one conditional GET of the prebuilt animated GIF,
    /// stored as the composite without any re-encoding.
    async fn fallback_fetch(&self, state: &mut RefreshState) -> Result<Option<Vec<u8>>, FetchError> {
        let since = state.legacy_last_modified.clone();
        match self.fetcher.get(RADAR_MAP_URL_ANIM, since.as_deref()).await? {
            GetOutcome::NotModified => {
                tracing::debug!("legacy radar image not modified");
                Ok(None)
            }
            GetOutcome::Fetched(response) => {
                if let Some(last_modified) = response.last_modified {
                    state.legacy_last_modified = Some(last_modified);
                }
                tracing::debug!("legacy radar image fetched ({} bytes)", response.bytes.len());
                Ok(Some(response.bytes))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::mock::MockFetcher;
    use crate::radar::frames::FRAME_COUNT;
    use crate::radar::refresh::frame_url;
    use std::sync::atomic::Ordering;

    fn camera_with(fetcher: Arc<MockFetcher>, config: RadarConfig) -> RadarCamera {
        RadarCamera::with_fetcher(&config, fetcher).unwrap()
    }

    fn default_camera(fetcher: Arc<MockFetcher>) -> RadarCamera {
        camera_with(fetcher, RadarConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_cache_is_idempotent_without_network_calls() {
        let fetcher = Arc::new(MockFetcher::new());
        let camera = default_camera(fetcher.clone());

        let first = camera.camera_image(0, 0).await.unwrap();
        assert_eq!(fetcher.get_calls.load(Ordering::SeqCst), FRAME_COUNT);
        assert_eq!(fetcher.head_calls.load(Ordering::SeqCst), 1);

        let second = camera.camera_image(0, 0).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(fetcher.get_calls.load(Ordering::SeqCst), FRAME_COUNT);
        assert_eq!(fetcher.head_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_refresh() {
        let fetcher = Arc::new(MockFetcher::new());
        *fetcher.get_delay.lock().unwrap() = Duration::from_millis(20);
        let camera = default_camera(fetcher.clone());

        let (a, b, c, d) = tokio::join!(
            camera.camera_image(0, 0),
            camera.camera_image(0, 0),
            camera.camera_image(0, 0),
            camera.camera_image(0, 0),
        );

        let bytes = a.unwrap();
        assert_eq!(b.unwrap(), bytes);
        assert_eq!(c.unwrap(), bytes);
        assert_eq!(d.unwrap(), bytes);
        assert_eq!(fetcher.get_calls.load(Ordering::SeqCst), FRAME_COUNT);
        assert!(!camera.is_refreshing().await);
    }

    #[tokio::test(start_paused = true)]
    async fn all_not_modified_keeps_bytes_and_advances_deadline() {
        let fetcher = Arc::new(MockFetcher::new());
        let camera = default_camera(fetcher.clone());
        let first = camera.camera_image(0, 0).await.unwrap();

        // Upstream unchanged: HEAD answers with slot 0's stored ETag and
        // every conditional GET answers 304.
        *fetcher.head_etag.lock().unwrap() = Some(MockFetcher::etag_for(&frame_url(0)));
        fetcher.serve_not_modified.store(true, Ordering::SeqCst);

        tokio::time::advance(Duration::from_secs(301)).await;
        let second = camera.camera_image(0, 0).await.unwrap();

        assert_eq!(first, second);
        // One HEAD plus one conditional GET for the newest frame.
        assert_eq!(fetcher.head_calls.load(Ordering::SeqCst), 2);
        assert_eq!(fetcher.get_calls.load(Ordering::SeqCst), FRAME_COUNT + 1);

        // Deadline advanced: an immediate third call is a cache hit.
        let third = camera.camera_image(0, 0).await.unwrap();
        assert_eq!(third, second);
        assert_eq!(fetcher.get_calls.load(Ordering::SeqCst), FRAME_COUNT + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn frame_failure_activates_fallback_once() {
        let fetcher = Arc::new(MockFetcher::new());
        *fetcher.fail_url_containing.lock().unwrap() = Some("anim_kompozit3.png".to_string());
        let camera = default_camera(fetcher.clone());

        let bytes = camera.camera_image(0, 0).await.unwrap();

        // Fallback bytes are served verbatim, not composited.
        assert_eq!(bytes, *fetcher.payload.lock().unwrap());
        let urls = fetcher.get_urls.lock().unwrap();
        let fallback_calls = urls.iter().filter(|url| *url == RADAR_MAP_URL_ANIM).count();
        assert_eq!(fallback_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn decode_failure_falls_back_to_legacy_gif() {
        let fetcher = Arc::new(MockFetcher::new());
        *fetcher.payload.lock().unwrap() = b"corrupt frame data".to_vec();
        let camera = default_camera(fetcher.clone());

        let bytes = camera.camera_image(0, 0).await.unwrap();

        assert_eq!(bytes, b"corrupt frame data");
        let urls = fetcher.get_urls.lock().unwrap();
        assert_eq!(urls.last().unwrap(), RADAR_MAP_URL_ANIM);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_anchors_at_refresh_start() {
        let fetcher = Arc::new(MockFetcher::new());
        *fetcher.get_delay.lock().unwrap() = Duration::from_secs(1);
        let camera = default_camera(fetcher.clone());

        let started = Instant::now();
        camera.camera_image(0, 0).await.unwrap();
        // The cycle itself consumed 25 simulated seconds.
        assert!(started.elapsed() >= Duration::from_secs(25));

        // Just inside start + delta: still fresh, no network traffic.
        tokio::time::advance(Duration::from_secs(299) - started.elapsed()).await;
        camera.camera_image(0, 0).await.unwrap();
        assert_eq!(fetcher.get_calls.load(Ordering::SeqCst), FRAME_COUNT);

        // Just past start + delta: stale again even though completion
        // was only ~276 seconds ago.
        tokio::time::advance(Duration::from_secs(2)).await;
        camera.camera_image(0, 0).await.unwrap();
        assert_eq!(fetcher.get_calls.load(Ordering::SeqCst), FRAME_COUNT + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn total_failure_returns_none_then_recovers() {
        let fetcher = Arc::new(MockFetcher::new());
        *fetcher.fail_url_containing.lock().unwrap() = Some("vrijeme.hr".to_string());
        let camera = default_camera(fetcher.clone());

        assert!(camera.camera_image(0, 0).await.is_none());

        *fetcher.fail_url_containing.lock().unwrap() = None;
        assert!(camera.camera_image(0, 0).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_after_success_serves_stale_bytes() {
        let fetcher = Arc::new(MockFetcher::new());
        let camera = default_camera(fetcher.clone());
        let first = camera.camera_image(0, 0).await.unwrap();

        tokio::time::advance(Duration::from_secs(301)).await;
        *fetcher.fail_url_containing.lock().unwrap() = Some("vrijeme.hr".to_string());

        let stale = camera.camera_image(0, 0).await.unwrap();
        assert_eq!(stale, first);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delta_disables_caching() {
        let fetcher = Arc::new(MockFetcher::new());
        let camera = camera_with(
            fetcher.clone(),
            RadarConfig {
                delta: 0.0,
                ..RadarConfig::default()
            },
        );

        camera.camera_image(0, 0).await.unwrap();
        camera.camera_image(0, 0).await.unwrap();

        // Second call refreshes again instead of hitting the cache.
        assert_eq!(fetcher.head_calls.load(Ordering::SeqCst), 2);
        assert_eq!(fetcher.get_calls.load(Ordering::SeqCst), FRAME_COUNT + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gif_output_format_is_honored() {
        let fetcher = Arc::new(MockFetcher::new());
        let camera = camera_with(
            fetcher,
            RadarConfig {
                image_format: "gif".to_string(),
                ..RadarConfig::default()
            },
        );

        let bytes = camera.camera_image(0, 0).await.unwrap();
        assert_eq!(&bytes[..4], b"GIF8");
    }

    #[tokio::test(start_paused = true)]
    async fn webp_is_the_default_composite_format() {
        let fetcher = Arc::new(MockFetcher::new());
        let camera = default_camera(fetcher);

        let bytes = camera.camera_image(0, 0).await.unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }

    #[test]
    fn entity_picture_links_static_composite() {
        let camera = RadarCamera::new(&RadarConfig::default()).unwrap();
        assert_eq!(camera.entity_picture(), RADAR_MAP_URL_STATIC);
        assert_eq!(camera.name(), "DHMZ Radar");
    }
}
