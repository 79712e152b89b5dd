//! Playback session manager: creates, queries, and destroys GIF sessions.
//!
//! The `SessionManager` handles:
//! - Allocating a session id and dispatching a [`GifSource`] to the engine
//! - Applying the caching policy (eager `force_cache` for `PreCache`)
//! - Mapping raw engine status codes to [`SessionError`]
//! - Tracking which sessions are alive so `destroy` is idempotent
//!
//! Every engine call goes through one process-wide lock; the engine is not
//! assumed to be reentrant, even across unrelated sessions.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use gp_common::{
    CachingStrategy, DecodeStatus, Dimensions, GifMetadata, PixelCopyStatus, PlayerConfig,
    SessionError, SessionId, SessionResult,
};

use crate::allocator::IdAllocator;
use crate::engine::DecodeEngine;
use crate::policy::CachingPolicy;
use crate::source::{GifSource, LoadInput};

/// Engine handle plus the ids it currently holds. Guarded by one mutex.
struct EngineSlot {
    engine: Box<dyn DecodeEngine>,
    live: HashSet<SessionId>,
}

impl EngineSlot {
    fn ensure_live(&self, id: SessionId) -> SessionResult<()> {
        if self.live.contains(&id) {
            Ok(())
        } else {
            Err(SessionError::NoSuchSession(id))
        }
    }

    /// Next id from `allocator` that no live session holds. Must be called
    /// with the slot locked so the id cannot be taken before it is
    /// registered.
    fn allocate(&self, allocator: &IdAllocator) -> SessionId {
        loop {
            let id = allocator.generate_id();
            if !self.live.contains(&id) {
                return id;
            }
            debug!(id = %id, "Skipping id still held by a live session");
        }
    }

    fn frame_count(&self, id: SessionId) -> u32 {
        self.engine.frame_count(id).max(0) as u32
    }

    fn dimensions(&self, id: SessionId) -> Dimensions {
        Dimensions::new(
            self.engine.width(id).max(0) as u32,
            self.engine.height(id).max(0) as u32,
        )
    }

    fn advance(&mut self, frame: u32, id: SessionId) -> SessionResult<()> {
        let frame_count = self.frame_count(id);
        if frame >= frame_count {
            return Err(SessionError::FrameOutOfRange { frame, frame_count });
        }

        let code = self.engine.advance_to(frame as i32, id);
        if code >= 0 {
            return Ok(());
        }
        match DecodeStatus::from_code(code) {
            Some(status) => Err(SessionError::DecodeFailed { frame, status }),
            None => Err(SessionError::UnexpectedStatus {
                op: "advance_to",
                code,
            }),
        }
    }

    fn copy(&mut self, dest: &mut [u32], id: SessionId) -> SessionResult<()> {
        let code = self.engine.copy_pixels(dest, id);
        match PixelCopyStatus::from_code(code) {
            Some(PixelCopyStatus::Success) => Ok(()),
            Some(PixelCopyStatus::NoSession) => Err(SessionError::NoSuchSession(id)),
            Some(PixelCopyStatus::WrongBufferSize) => Err(SessionError::WrongBufferSize {
                expected: self.dimensions(id).pixel_count(),
                actual: dest.len(),
            }),
            None => Err(SessionError::UnexpectedStatus {
                op: "copy_pixels",
                code,
            }),
        }
    }
}

/// Owns the decode engine and every session loaded into it.
///
/// Shared between scheduler instances by `Arc`. The id allocator and the
/// caching policy are process-wide objects passed in at construction.
pub struct SessionManager {
    slot: Mutex<EngineSlot>,
    allocator: Arc<IdAllocator>,
    policy: Arc<CachingPolicy>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("live_sessions", &self.live_count())
            .field("caching_strategy", &self.policy.get())
            .field("next_id", &self.allocator.peek())
            .finish()
    }
}

impl SessionManager {
    /// Manager with its own allocator and a `Disabled` caching policy.
    pub fn new(engine: impl DecodeEngine + 'static) -> Self {
        Self::with_shared(
            engine,
            Arc::new(IdAllocator::new()),
            Arc::new(CachingPolicy::default()),
        )
    }

    /// Manager whose caching policy is taken from `config`.
    pub fn from_config(engine: impl DecodeEngine + 'static, config: &PlayerConfig) -> Self {
        Self::with_shared(
            engine,
            Arc::new(IdAllocator::new()),
            Arc::new(CachingPolicy::new(config.caching_strategy)),
        )
    }

    /// Manager over externally owned allocator and policy objects.
    pub fn with_shared(
        engine: impl DecodeEngine + 'static,
        allocator: Arc<IdAllocator>,
        policy: Arc<CachingPolicy>,
    ) -> Self {
        Self {
            slot: Mutex::new(EngineSlot {
                engine: Box::new(engine),
                live: HashSet::new(),
            }),
            allocator,
            policy,
        }
    }

    pub fn allocator(&self) -> &Arc<IdAllocator> {
        &self.allocator
    }

    pub fn policy(&self) -> &Arc<CachingPolicy> {
        &self.policy
    }

    pub fn caching_strategy(&self) -> CachingStrategy {
        self.policy.get()
    }

    /// Applies to loads issued after this call.
    pub fn set_caching_strategy(&self, strategy: CachingStrategy) {
        self.policy.set(strategy);
    }

    /// Load a GIF and register a new session.
    ///
    /// A fresh id is allocated for every call that reaches the engine. Ids
    /// still held by a live session are skipped after the allocator wraps.
    /// On failure the id is discarded and nothing is registered. With
    /// [`CachingStrategy::PreCache`] all frames are materialized before this
    /// returns.
    pub fn load(&self, source: GifSource) -> SessionResult<SessionId> {
        let caching = self.policy.get();
        let kind = source.kind();

        let input = source.open().map_err(|e| {
            warn!(kind, error = %e, "GIF source could not be opened");
            SessionError::SourceUnavailable(e)
        })?;

        let mut slot = self.slot.lock();
        let id = slot.allocate(&self.allocator);
        let status = match input {
            LoadInput::Path(path) => slot.engine.load_path(&path, id, caching),
            LoadInput::Bytes(data) => slot.engine.load_bytes(&data, id, caching),
            LoadInput::Stream(mut stream) => {
                let status = slot.engine.load_stream(&mut *stream, id, caching);
                drop(stream);
                status
            }
        };

        if status <= 0 {
            warn!(id = %id, kind, status, "GIF load failed");
            return Err(SessionError::LoadFailed { status });
        }

        slot.live.insert(id);
        if caching == CachingStrategy::PreCache {
            slot.engine.force_cache(id);
            debug!(id = %id, "Pre-cached all frames");
        }

        info!(
            id = %id,
            kind,
            dims = %slot.dimensions(id),
            frames = slot.frame_count(id),
            ?caching,
            "Loaded GIF session"
        );
        Ok(id)
    }

    /// `true` unless `id` is the invalid sentinel. Does not check liveness.
    pub fn is_valid(&self, id: SessionId) -> bool {
        id.is_valid()
    }

    /// Whether `id` was loaded and has not been destroyed yet.
    pub fn is_alive(&self, id: SessionId) -> bool {
        self.slot.lock().live.contains(&id)
    }

    pub fn live_count(&self) -> usize {
        self.slot.lock().live.len()
    }

    /// Decode forward until `frame` is current.
    ///
    /// Callers are responsible for visiting every intermediate frame; see
    /// [`seek_forward`](Self::seek_forward) for a helper that does.
    pub fn advance_to(&self, frame: u32, id: SessionId) -> SessionResult<()> {
        let mut slot = self.slot.lock();
        slot.ensure_live(id)?;
        slot.advance(frame, id)
    }

    /// Step frame by frame from the current frame to `target`, wrapping
    /// through the last frame when `target` lies behind the current one.
    pub fn seek_forward(&self, id: SessionId, target: u32) -> SessionResult<()> {
        let mut slot = self.slot.lock();
        slot.ensure_live(id)?;

        let frame_count = slot.frame_count(id);
        if target >= frame_count {
            return Err(SessionError::FrameOutOfRange {
                frame: target,
                frame_count,
            });
        }

        let mut frame = slot.engine.current_frame(id).max(0) as u32;
        let mut steps = 0u32;
        while frame != target {
            frame = if frame + 1 >= frame_count { 0 } else { frame + 1 };
            slot.advance(frame, id)?;
            steps += 1;
        }
        debug!(id = %id, target, steps, "Seeked forward");
        Ok(())
    }

    /// Copy the current frame's ARGB pixels into `dest`.
    pub fn copy_pixels(&self, dest: &mut [u32], id: SessionId) -> SessionResult<()> {
        let mut slot = self.slot.lock();
        slot.ensure_live(id)?;
        slot.copy(dest, id)
    }

    /// Advance to `frame`, then copy it, without releasing the engine lock
    /// in between.
    pub fn copy_frame_pixels(
        &self,
        dest: &mut [u32],
        frame: u32,
        id: SessionId,
    ) -> SessionResult<()> {
        let mut slot = self.slot.lock();
        slot.ensure_live(id)?;
        slot.advance(frame, id)?;
        slot.copy(dest, id)
    }

    /// Current frame in a freshly allocated `width * height` buffer.
    pub fn frame_pixels(&self, id: SessionId) -> SessionResult<Vec<u32>> {
        let mut slot = self.slot.lock();
        slot.ensure_live(id)?;
        let mut pixels = vec![0u32; slot.dimensions(id).pixel_count()];
        slot.copy(&mut pixels, id)?;
        Ok(pixels)
    }

    /// Assemble a metadata snapshot; one `frame_delay` call per frame.
    pub fn metadata(&self, id: SessionId) -> SessionResult<GifMetadata> {
        let slot = self.slot.lock();
        slot.ensure_live(id)?;

        let frame_count = slot.frame_count(id);
        let delays = (0..frame_count)
            .map(|frame| (frame, slot.engine.frame_delay(frame as i32, id)))
            .collect();
        let dims = slot.dimensions(id);

        let code = slot.engine.decode_status(id);
        let status = DecodeStatus::from_code(code).unwrap_or_else(|| {
            debug!(id = %id, code, "Unknown decode status, reporting data error");
            DecodeStatus::DataError
        });

        Ok(GifMetadata {
            frame_count,
            delays,
            width: dims.width,
            height: dims.height,
            current_frame: slot.engine.current_frame(id).max(0) as u32,
            status,
        })
    }

    pub fn dimensions(&self, id: SessionId) -> SessionResult<Dimensions> {
        let slot = self.slot.lock();
        slot.ensure_live(id)?;
        Ok(slot.dimensions(id))
    }

    pub fn width(&self, id: SessionId) -> SessionResult<u32> {
        self.dimensions(id).map(|d| d.width)
    }

    pub fn height(&self, id: SessionId) -> SessionResult<u32> {
        self.dimensions(id).map(|d| d.height)
    }

    pub fn frame_count(&self, id: SessionId) -> SessionResult<u32> {
        let slot = self.slot.lock();
        slot.ensure_live(id)?;
        Ok(slot.frame_count(id))
    }

    pub fn current_frame(&self, id: SessionId) -> SessionResult<u32> {
        let slot = self.slot.lock();
        slot.ensure_live(id)?;
        Ok(slot.engine.current_frame(id).max(0) as u32)
    }

    /// Release the session. Returns `false` (and does nothing) for ids that
    /// are unknown or already destroyed.
    pub fn destroy(&self, id: SessionId) -> bool {
        let mut slot = self.slot.lock();
        if !slot.live.remove(&id) {
            debug!(id = %id, "Destroy ignored for unknown session");
            return false;
        }
        slot.engine.destroy(id);
        info!(id = %id, "Destroyed GIF session");
        true
    }

    /// Destroy every live session.
    pub fn destroy_all(&self) {
        let mut slot = self.slot.lock();
        let ids: Vec<SessionId> = slot.live.drain().collect();
        for id in &ids {
            slot.engine.destroy(*id);
        }
        if !ids.is_empty() {
            info!(count = ids.len(), "Destroyed all GIF sessions");
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.destroy_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EngineCall, ScriptedEngine, ScriptedGif};
    use std::io::Cursor;

    fn manager_with(gif: ScriptedGif) -> (SessionManager, crate::testing::Journal) {
        let engine = ScriptedEngine::new(gif);
        let journal = engine.journal();
        (SessionManager::new(engine), journal)
    }

    fn three_frames() -> ScriptedGif {
        ScriptedGif::new(4, 3, vec![100, 100, -1])
    }

    // ── Load ──

    #[test]
    fn load_allocates_sequential_ids() {
        let (manager, _) = manager_with(three_frames());
        let a = manager.load(GifSource::bytes(vec![0u8])).unwrap();
        let b = manager.load(GifSource::bytes(vec![0u8])).unwrap();
        assert_eq!(a, SessionId::new(0));
        assert_eq!(b, SessionId::new(1));
        assert_eq!(manager.live_count(), 2);
    }

    #[test]
    fn load_failure_registers_nothing() {
        let engine = ScriptedEngine::new(three_frames()).with_load_status(0);
        let manager = SessionManager::new(engine);

        let err = manager.load(GifSource::bytes(vec![0u8])).unwrap_err();
        assert!(matches!(err, SessionError::LoadFailed { status: 0 }));
        assert_eq!(manager.live_count(), 0);
        assert!(!manager.is_alive(SessionId::new(0)));
        assert!(matches!(
            manager.metadata(SessionId::new(0)),
            Err(SessionError::NoSuchSession(_))
        ));
        // The failed id is discarded, the next load gets a fresh one.
        assert_eq!(manager.allocator().peek(), SessionId::new(1));
    }

    #[test]
    fn unopenable_source_is_reported() {
        let (manager, journal) = manager_with(three_frames());
        let provider = Arc::new(crate::source::BundledResources::new());
        let err = manager.load(GifSource::resource(provider, 3)).unwrap_err();
        assert!(matches!(err, SessionError::SourceUnavailable(_)));
        assert!(journal.calls().is_empty());
    }

    #[test]
    fn stream_sources_use_stream_load_path() {
        let (manager, journal) = manager_with(three_frames());
        let id = manager
            .load(GifSource::stream(Cursor::new(vec![1u8, 2, 3])))
            .unwrap();
        assert!(journal
            .calls()
            .contains(&EngineCall::Load { id, kind: "stream" }));
    }

    #[test]
    fn wrapped_allocator_skips_live_ids() {
        let engine = ScriptedEngine::new(three_frames());
        let journal = engine.journal();
        let allocator = Arc::new(IdAllocator::starting_at(i32::MAX - 1));
        let manager =
            SessionManager::with_shared(engine, Arc::clone(&allocator), Arc::default());

        let a = manager.load(GifSource::bytes(vec![0u8])).unwrap();
        let b = manager.load(GifSource::bytes(vec![0u8])).unwrap();
        assert_eq!(a, SessionId::new(i32::MAX - 1));
        assert_eq!(b, SessionId::new(i32::MAX));

        // Counter comes back around to `a` while both are still alive.
        allocator.rewind_to(a);
        let c = manager.load(GifSource::bytes(vec![0u8])).unwrap();
        assert_eq!(c, SessionId::new(0));
        assert_eq!(manager.live_count(), 3);

        // Destroying the new session leaves the older ones untouched.
        assert!(manager.destroy(c));
        assert!(manager.is_alive(a) && manager.is_alive(b));
        assert_eq!(journal.destroy_count(a), 0);
        assert_eq!(manager.frame_count(a).unwrap(), 3);
    }

    #[test]
    fn wrapped_allocator_reuses_destroyed_ids() {
        let allocator = Arc::new(IdAllocator::starting_at(5));
        let manager = SessionManager::with_shared(
            ScriptedEngine::new(three_frames()),
            Arc::clone(&allocator),
            Arc::default(),
        );
        let a = manager.load(GifSource::bytes(vec![0u8])).unwrap();
        manager.destroy(a);
        allocator.rewind_to(a);
        assert_eq!(manager.load(GifSource::bytes(vec![0u8])).unwrap(), a);
    }

    #[test]
    fn concurrent_loads_get_unique_ids() {
        let (manager, journal) = manager_with(three_frames());
        let manager = Arc::new(manager);

        let ids: Vec<SessionId> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    let manager = Arc::clone(&manager);
                    scope.spawn(move || {
                        let mut kept = Vec::new();
                        for i in 0..25 {
                            let id = manager.load(GifSource::bytes(vec![0u8])).unwrap();
                            let mut pixels = [0u32; 12];
                            manager.copy_frame_pixels(&mut pixels, 1, id).unwrap();
                            if i % 2 == 0 {
                                assert!(manager.destroy(id));
                            } else {
                                kept.push(id);
                            }
                        }
                        kept
                    })
                })
                .collect();
            workers
                .into_iter()
                .flat_map(|w| w.join().unwrap())
                .collect()
        });

        assert_eq!(journal.load_count(), 200);
        let unique: HashSet<SessionId> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());
        assert_eq!(manager.live_count(), 8 * 12);
        assert!(ids.iter().all(|id| manager.is_alive(*id)));
    }

    // ── Caching policy ──

    #[test]
    fn pre_cache_forces_cache_exactly_once() {
        let (manager, journal) = manager_with(three_frames());
        manager.set_caching_strategy(CachingStrategy::PreCache);
        let id = manager.load(GifSource::bytes(vec![0u8])).unwrap();
        assert_eq!(journal.force_cache_count(id), 1);
    }

    #[test]
    fn other_strategies_never_force_cache() {
        for strategy in [CachingStrategy::Disabled, CachingStrategy::WhenDecoded] {
            let (manager, journal) = manager_with(three_frames());
            manager.set_caching_strategy(strategy);
            let id = manager.load(GifSource::bytes(vec![0u8])).unwrap();
            assert_eq!(journal.force_cache_count(id), 0, "{strategy:?}");
        }
    }

    #[test]
    fn failed_pre_cache_load_does_not_force_cache() {
        let engine = ScriptedEngine::new(three_frames()).with_load_status(-1);
        let journal = engine.journal();
        let manager = SessionManager::from_config(
            engine,
            &PlayerConfig {
                caching_strategy: CachingStrategy::PreCache,
                ..Default::default()
            },
        );
        assert!(manager.load(GifSource::bytes(vec![0u8])).is_err());
        assert_eq!(journal.force_cache_count(SessionId::new(0)), 0);
    }

    // ── Pixel copy ──

    #[test]
    fn copy_pixels_reads_current_frame() {
        let (manager, _) = manager_with(three_frames());
        let id = manager.load(GifSource::bytes(vec![0u8])).unwrap();
        let mut dest = vec![0u32; 12];
        manager.copy_pixels(&mut dest, id).unwrap();
        assert!(dest.iter().all(|px| *px == ScriptedGif::pixel_for(0)));

        manager.copy_frame_pixels(&mut dest, 1, id).unwrap();
        assert!(dest.iter().all(|px| *px == ScriptedGif::pixel_for(1)));
    }

    #[test]
    fn wrong_buffer_size_leaves_buffer_untouched() {
        let (manager, _) = manager_with(three_frames());
        let id = manager.load(GifSource::bytes(vec![0u8])).unwrap();
        let mut dest = vec![0xDEAD_BEEFu32; 11];
        let err = manager.copy_pixels(&mut dest, id).unwrap_err();
        assert!(matches!(
            err,
            SessionError::WrongBufferSize {
                expected: 12,
                actual: 11
            }
        ));
        assert!(dest.iter().all(|px| *px == 0xDEAD_BEEF));
    }

    #[test]
    fn unexpected_copy_status_is_surfaced() {
        let engine = ScriptedEngine::new(three_frames()).with_copy_status(7);
        let manager = SessionManager::new(engine);
        let id = manager.load(GifSource::bytes(vec![0u8])).unwrap();
        let err = manager.copy_pixels(&mut [0u32; 12], id).unwrap_err();
        assert!(matches!(
            err,
            SessionError::UnexpectedStatus {
                op: "copy_pixels",
                code: 7
            }
        ));
    }

    #[test]
    fn frame_pixels_allocates_buffer() {
        let (manager, _) = manager_with(three_frames());
        let id = manager.load(GifSource::bytes(vec![0u8])).unwrap();
        let pixels = manager.frame_pixels(id).unwrap();
        assert_eq!(pixels.len(), 12);
    }

    // ── Advance / seek ──

    #[test]
    fn advance_out_of_range_is_rejected() {
        let (manager, journal) = manager_with(three_frames());
        let id = manager.load(GifSource::bytes(vec![0u8])).unwrap();
        let err = manager.advance_to(3, id).unwrap_err();
        assert!(matches!(
            err,
            SessionError::FrameOutOfRange {
                frame: 3,
                frame_count: 3
            }
        ));
        assert!(journal.advances(id).is_empty());
    }

    #[test]
    fn advance_failure_maps_decode_status() {
        let engine = ScriptedEngine::new(three_frames())
            .with_advance_status(DecodeStatus::FrameDataError.code());
        let manager = SessionManager::new(engine);
        let id = manager.load(GifSource::bytes(vec![0u8])).unwrap();
        let err = manager.advance_to(1, id).unwrap_err();
        assert!(matches!(
            err,
            SessionError::DecodeFailed {
                frame: 1,
                status: DecodeStatus::FrameDataError
            }
        ));
    }

    #[test]
    fn seek_forward_visits_every_frame() {
        let gif = ScriptedGif::new(2, 2, vec![10; 6]);
        let (manager, journal) = manager_with(gif);
        let id = manager.load(GifSource::bytes(vec![0u8])).unwrap();

        manager.seek_forward(id, 4).unwrap();
        assert_eq!(journal.advances(id), vec![1, 2, 3, 4]);
        assert_eq!(manager.current_frame(id).unwrap(), 4);

        // Behind the current frame: wraps through the end.
        manager.seek_forward(id, 1).unwrap();
        assert_eq!(journal.advances(id), vec![1, 2, 3, 4, 5, 0, 1]);
        assert!(!journal.saw_out_of_order_advance());
    }

    #[test]
    fn seek_to_current_frame_is_a_no_op() {
        let (manager, journal) = manager_with(three_frames());
        let id = manager.load(GifSource::bytes(vec![0u8])).unwrap();
        manager.seek_forward(id, 0).unwrap();
        assert!(journal.advances(id).is_empty());
    }

    // ── Metadata ──

    #[test]
    fn metadata_collects_delays() {
        let (manager, _) = manager_with(three_frames());
        let id = manager.load(GifSource::bytes(vec![0u8])).unwrap();
        let meta = manager.metadata(id).unwrap();
        assert_eq!(meta.frame_count, 3);
        assert_eq!(meta.delay_of(0), 100);
        assert_eq!(meta.delay_of(2), -1);
        assert_eq!(meta.dimensions(), Dimensions::new(4, 3));
        assert_eq!(meta.status, DecodeStatus::Ok);
    }

    #[test]
    fn unknown_decode_status_becomes_data_error() {
        let engine = ScriptedEngine::new(three_frames()).with_decode_status(42);
        let manager = SessionManager::new(engine);
        let id = manager.load(GifSource::bytes(vec![0u8])).unwrap();
        assert_eq!(manager.metadata(id).unwrap().status, DecodeStatus::DataError);
    }

    // ── Destroy ──

    #[test]
    fn destroy_is_idempotent() {
        let (manager, journal) = manager_with(three_frames());
        let id = manager.load(GifSource::bytes(vec![0u8])).unwrap();
        assert!(manager.destroy(id));
        assert!(!manager.destroy(id));
        assert!(!manager.destroy(SessionId::INVALID));
        assert_eq!(journal.destroy_count(id), 1);
        assert!(matches!(
            manager.copy_pixels(&mut [0u32; 12], id),
            Err(SessionError::NoSuchSession(_))
        ));
    }

    #[test]
    fn drop_destroys_live_sessions() {
        let (manager, journal) = manager_with(three_frames());
        let a = manager.load(GifSource::bytes(vec![0u8])).unwrap();
        let b = manager.load(GifSource::bytes(vec![0u8])).unwrap();
        manager.destroy(a);
        drop(manager);
        assert_eq!(journal.destroy_count(a), 1);
        assert_eq!(journal.destroy_count(b), 1);
    }
}
