//! Background generation of height maps and meshes.
//!
//! Requests run on a dedicated rayon pool. Each finished job pushes its
//! result, paired with the caller's completion callback, onto a per-kind
//! FIFO queue. The owning thread calls [`GenerationService::process_completed`]
//! once per tick to run the callbacks; completions never run on workers.
//!
//! At most `max_in_flight` jobs run at once. Excess requests wait in a
//! pending FIFO and start as earlier jobs finish. The pending FIFO itself is
//! unbounded: requests never block or get dropped, so callers bound it by
//! how much they ask for (the streamer issues at most one request per chunk
//! and LOD).

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use glam::Vec2;

use super::config::{GenerationConfig, SharedSettings, Validate};
use crate::core::{Error, Result};
use crate::heightmap::{FalloffCache, HeightMap, HeightMapSettings, generate_height_map};
use crate::mesh::{MeshPayload, MeshSettings, generate_terrain_mesh};

/// Outcome of a background job.
pub type GenerationResult<T> = Result<T>;

/// Callback run on the consumer thread with the consumer's context.
pub type Completion<C, T> = Box<dyn FnOnce(&mut C, GenerationResult<T>) + Send>;

type Job<C> = Box<dyn FnOnce(&Shared<C>) + Send>;

struct WorkItem<C, T> {
    completion: Completion<C, T>,
    result: GenerationResult<T>,
}

/// Counts from one [`GenerationService::process_completed`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub height_maps: usize,
    pub meshes: usize,
    /// Results delivered as `Err`.
    pub failures: usize,
}

impl DrainStats {
    pub fn total(&self) -> usize {
        self.height_maps + self.meshes
    }
}

/// Lifetime request and completion counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ServiceStats {
    pub height_requests: u64,
    pub mesh_requests: u64,
    pub delivered: u64,
    pub failed: u64,
}

struct Shared<C> {
    pool: rayon::ThreadPool,
    height_queue: Mutex<VecDeque<WorkItem<C, Arc<HeightMap>>>>,
    mesh_queue: Mutex<VecDeque<WorkItem<C, Arc<MeshPayload>>>>,
    /// Unbounded; only running jobs are capped.
    pending: Mutex<VecDeque<Job<C>>>,
    in_flight: AtomicUsize,
    max_in_flight: usize,
    falloff: FalloffCache,
    height_settings: SharedSettings<HeightMapSettings>,
    mesh_settings: SharedSettings<MeshSettings>,
    height_requests: AtomicU64,
    mesh_requests: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl<C: 'static> Shared<C> {
    /// Start pending jobs while there is capacity.
    fn pump(shared: &Arc<Self>) {
        loop {
            let reserved = shared
                .in_flight
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                    (n < shared.max_in_flight).then_some(n + 1)
                })
                .is_ok();
            if !reserved {
                return;
            }

            let job = lock(&shared.pending).pop_front();
            let Some(job) = job else {
                shared.in_flight.fetch_sub(1, Ordering::SeqCst);
                return;
            };

            let worker_shared = Arc::clone(shared);
            shared.pool.spawn(move || {
                job(&worker_shared);
                worker_shared.in_flight.fetch_sub(1, Ordering::SeqCst);
                Shared::pump(&worker_shared);
            });
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Run a job body, turning a panic into [`Error::Worker`].
fn run_guarded<T>(kind: &str, f: impl FnOnce() -> T) -> GenerationResult<T> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        log::error!("{} job panicked: {}", kind, message);
        Error::Worker(message)
    })
}

/// Worker pool producing height maps and meshes for a consumer context `C`.
///
/// Cloning is cheap; clones share the pool, queues and settings.
pub struct GenerationService<C> {
    shared: Arc<Shared<C>>,
}

impl<C> Clone for GenerationService<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: 'static> GenerationService<C> {
    /// Start the worker pool.
    pub fn new(
        config: &GenerationConfig,
        height_settings: SharedSettings<HeightMapSettings>,
        mesh_settings: SharedSettings<MeshSettings>,
    ) -> Result<Self> {
        let mut config = config.clone();
        config.validate();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|i| format!("terrain-gen-{}", i))
            .build()?;

        log::info!(
            "Generation service started: {} workers, {} jobs in flight",
            config.worker_threads,
            config.max_in_flight
        );

        Ok(Self {
            shared: Arc::new(Shared {
                pool,
                height_queue: Mutex::new(VecDeque::new()),
                mesh_queue: Mutex::new(VecDeque::new()),
                pending: Mutex::new(VecDeque::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: config.max_in_flight,
                falloff: FalloffCache::new(),
                height_settings,
                mesh_settings,
                height_requests: AtomicU64::new(0),
                mesh_requests: AtomicU64::new(0),
                delivered: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
        })
    }

    pub fn height_settings(&self) -> &SharedSettings<HeightMapSettings> {
        &self.shared.height_settings
    }

    pub fn mesh_settings(&self) -> &SharedSettings<MeshSettings> {
        &self.shared.mesh_settings
    }

    /// Falloff masks shared by all height map jobs.
    pub fn falloff_cache(&self) -> &FalloffCache {
        &self.shared.falloff
    }

    fn submit(&self, job: Job<C>) {
        lock(&self.shared.pending).push_back(job);
        Shared::pump(&self.shared);
    }

    /// Generate a bordered height map centred on `centre` (noise space).
    ///
    /// Settings are snapshotted now; edits made while the job waits do not
    /// affect it.
    pub fn request_height_map(
        &self,
        centre: Vec2,
        completion: impl FnOnce(&mut C, GenerationResult<Arc<HeightMap>>) + Send + 'static,
    ) {
        let settings = self.shared.height_settings.get();
        let size = self.shared.mesh_settings.get().bordered_size();
        let completion: Completion<C, Arc<HeightMap>> = Box::new(completion);
        self.shared.height_requests.fetch_add(1, Ordering::Relaxed);

        self.submit(Box::new(move |shared: &Shared<C>| {
            let result = run_guarded("Height map", || {
                Arc::new(generate_height_map(size, size, &settings, centre, Some(&shared.falloff)))
            });
            log::trace!("Height map at ({}, {}) finished", centre.x, centre.y);
            lock(&shared.height_queue).push_back(WorkItem { completion, result });
        }));
    }

    /// Triangulate `height_map` at `lod`.
    pub fn request_mesh(
        &self,
        height_map: Arc<HeightMap>,
        lod: usize,
        completion: impl FnOnce(&mut C, GenerationResult<Arc<MeshPayload>>) + Send + 'static,
    ) {
        let settings = self.shared.height_settings.get();
        let flat_shading = self.shared.mesh_settings.get().use_flat_shading;
        let completion: Completion<C, Arc<MeshPayload>> = Box::new(completion);
        self.shared.mesh_requests.fetch_add(1, Ordering::Relaxed);

        self.submit(Box::new(move |shared: &Shared<C>| {
            let result = run_guarded("Mesh", || {
                Arc::new(generate_terrain_mesh(
                    &height_map.values,
                    settings.height_multiplier,
                    &settings.height_curve,
                    lod,
                    flat_shading,
                ))
            });
            log::trace!("Mesh at LOD {} finished", lod);
            lock(&shared.mesh_queue).push_back(WorkItem { completion, result });
        }));
    }

    /// Run the callbacks of every result queued when this call starts.
    ///
    /// Height maps are delivered before meshes, each in completion order.
    /// Results that arrive during the drain, including those of requests
    /// issued by the callbacks, wait for the next call. Never blocks on
    /// workers.
    pub fn process_completed(&self, ctx: &mut C) -> DrainStats {
        let heights = std::mem::take(&mut *lock(&self.shared.height_queue));
        let meshes = std::mem::take(&mut *lock(&self.shared.mesh_queue));

        let mut stats = DrainStats::default();
        for item in heights {
            stats.height_maps += 1;
            if item.result.is_err() {
                stats.failures += 1;
            }
            (item.completion)(ctx, item.result);
        }
        for item in meshes {
            stats.meshes += 1;
            if item.result.is_err() {
                stats.failures += 1;
            }
            (item.completion)(ctx, item.result);
        }

        self.shared.delivered.fetch_add(stats.total() as u64, Ordering::Relaxed);
        self.shared.failed.fetch_add(stats.failures as u64, Ordering::Relaxed);
        Shared::pump(&self.shared);
        stats
    }

    /// Jobs currently executing.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    /// Requests waiting for a free slot.
    pub fn pending_count(&self) -> usize {
        lock(&self.shared.pending).len()
    }

    /// Results waiting for [`Self::process_completed`].
    pub fn queued_count(&self) -> usize {
        lock(&self.shared.height_queue).len() + lock(&self.shared.mesh_queue).len()
    }

    /// True when no job is pending or running. Results may still be queued.
    pub fn is_idle(&self) -> bool {
        self.pending_count() == 0 && self.in_flight() == 0
    }

    /// Block until every submitted job has queued its result.
    ///
    /// Meant for tools and tests; a frame loop should only ever call
    /// [`Self::process_completed`]. Returns false on timeout.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        while !self.is_idle() {
            if start.elapsed() > timeout {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            height_requests: self.shared.height_requests.load(Ordering::Relaxed),
            mesh_requests: self.shared.mesh_requests.load(Ordering::Relaxed),
            delivered: self.shared.delivered.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightmap::HeightField;

    const TIMEOUT: Duration = Duration::from_secs(30);

    fn small_mesh_settings() -> MeshSettings {
        MeshSettings {
            use_flat_shading: true,
            flat_shaded_chunk_size_index: 0,
            ..Default::default()
        }
    }

    fn service<C: 'static>(threads: usize, max_in_flight: usize) -> GenerationService<C> {
        GenerationService::new(
            &GenerationConfig { worker_threads: threads, max_in_flight },
            SharedSettings::new(HeightMapSettings::default()),
            SharedSettings::new(small_mesh_settings()),
        )
        .unwrap()
    }

    fn flat_height_map(side: usize) -> Arc<HeightMap> {
        Arc::new(HeightMap::new(HeightField::from_fn(side, side, |_, _| 0.5)))
    }

    #[test]
    fn test_height_map_delivered_on_drain() {
        let svc: GenerationService<Vec<Arc<HeightMap>>> = service(2, 4);
        svc.request_height_map(Vec2::ZERO, |maps, result| maps.push(result.unwrap()));

        assert!(svc.wait_until_idle(TIMEOUT));
        // Finished but undelivered until the consumer drains
        assert_eq!(svc.queued_count(), 1);

        let mut maps = Vec::new();

        let stats = svc.process_completed(&mut maps);
        assert_eq!(stats.height_maps, 1);
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0].values.width(), 49);
        assert_eq!(maps[0].values.height(), 49);
        assert!(maps[0].min_value <= maps[0].max_value);
    }

    #[test]
    fn test_completions_delivered_exactly_once() {
        let svc: GenerationService<Vec<usize>> = service(4, 8);
        for i in 0..20 {
            svc.request_mesh(flat_height_map(49), i % 3, move |done, result| {
                assert!(result.is_ok());
                done.push(i);
            });
        }
        assert!(svc.wait_until_idle(TIMEOUT));

        let mut done = Vec::new();
        svc.process_completed(&mut done);
        svc.process_completed(&mut done);
        done.sort_unstable();
        assert_eq!(done, (0..20).collect::<Vec<_>>());
        assert_eq!(svc.stats().delivered, 20);
    }

    #[test]
    fn test_single_slot_preserves_request_order() {
        let svc: GenerationService<Vec<usize>> = service(1, 1);
        for i in 0..8 {
            svc.request_mesh(flat_height_map(49), 0, move |order, _| order.push(i));
        }
        assert!(svc.wait_until_idle(TIMEOUT));

        let mut order = Vec::new();
        svc.process_completed(&mut order);
        assert_eq!(order, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_backpressure_caps_in_flight() {
        let svc: GenerationService<usize> = service(4, 2);
        for _ in 0..10 {
            svc.request_height_map(Vec2::ZERO, |count, _| *count += 1);
            assert!(svc.in_flight() <= 2);
        }
        assert!(svc.wait_until_idle(TIMEOUT));

        let mut count = 0;
        svc.process_completed(&mut count);
        assert_eq!(count, 10);
        assert_eq!(svc.pending_count(), 0);
    }

    #[test]
    fn test_drain_only_takes_results_present_at_start() {
        let svc: GenerationService<usize> = service(1, 4);
        let inner = svc.clone();
        svc.request_height_map(Vec2::ZERO, move |count, _| {
            *count += 1;
            inner.request_height_map(Vec2::ONE, |count, _| *count += 1);
        });
        assert!(svc.wait_until_idle(TIMEOUT));

        let mut count = 0;
        assert_eq!(svc.process_completed(&mut count).total(), 1);
        assert_eq!(count, 1);

        assert!(svc.wait_until_idle(TIMEOUT));
        assert_eq!(svc.process_completed(&mut count).total(), 1);
        assert_eq!(count, 2);
    }

    #[test]
    fn test_worker_panic_becomes_error() {
        let svc: GenerationService<Vec<GenerationResult<Arc<MeshPayload>>>> = service(1, 1);
        // A non-square field violates the mesher's contract
        let bad = Arc::new(HeightMap::new(HeightField::new(5, 7)));
        svc.request_mesh(bad, 0, |results, result| results.push(result));
        assert!(svc.wait_until_idle(TIMEOUT));

        let mut results = Vec::new();
        let stats = svc.process_completed(&mut results);
        assert_eq!(stats.failures, 1);
        assert!(matches!(results[0], Err(Error::Worker(_))));

        // The pool keeps working after a failed job
        svc.request_mesh(flat_height_map(49), 0, |results, result| results.push(result));
        assert!(svc.wait_until_idle(TIMEOUT));
        svc.process_completed(&mut results);
        assert!(results[1].is_ok());
    }

    #[test]
    fn test_settings_snapshot_at_request_time() {
        let svc: GenerationService<Vec<Arc<MeshPayload>>> = service(1, 1);
        svc.height_settings().update(|s| {
            s.height_multiplier = 10.0;
            s.height_curve = crate::heightmap::HeightCurve::linear();
        });
        svc.request_mesh(flat_height_map(49), 0, |meshes, result| meshes.push(result.unwrap()));
        svc.height_settings().update(|s| s.height_multiplier = 100.0);
        assert!(svc.wait_until_idle(TIMEOUT));

        let mut meshes = Vec::new();
        svc.process_completed(&mut meshes);
        let (lo, hi) = meshes[0].height_range();
        assert!((lo - 5.0).abs() < 1e-4 && (hi - 5.0).abs() < 1e-4);
    }
}
