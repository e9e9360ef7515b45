//! Camera device lifecycle: enumeration, acquisition, release, switching.
//!
//! Acquisition is non-reentrant: a second `acquire` while one is in flight
//! returns [`AcquireOutcome::Skipped`] immediately. An in-flight acquisition
//! consults its [`AcquisitionGuard`] before starting, after the settle delay,
//! after the hardware call resolves, and after the first frame arrives; if the
//! guard says to abandon, any opened track is stopped and never surfaced.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::backend::{CameraBackend, CaptureDevice, CaptureStream, StreamConstraints};
use crate::error::CaptureError;

/// Tunable timings for acquisition.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Pause between releasing the previous stream and requesting a new one.
    pub settle_delay: Duration,
    /// How long a freshly opened stream may take to produce a frame.
    pub first_frame_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(200),
            first_frame_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Idle,
    Enumerating,
    Ready,
    Error,
}

/// Result of an acquisition attempt that did not fail.
#[derive(Debug)]
pub enum AcquireOutcome {
    /// A live stream; also held by the manager until released.
    Acquired(CaptureStream),
    /// Another acquisition was already in flight, or there was nothing to do.
    Skipped,
    /// The guard asked to stop; any opened track was stopped.
    Abandoned,
}

/// Decides whether an in-flight acquisition is still wanted.
pub trait AcquisitionGuard: Send + Sync {
    fn should_abandon(&self) -> bool;
}

impl AcquisitionGuard for CancellationToken {
    fn should_abandon(&self) -> bool {
        self.is_cancelled()
    }
}

/// Clears the in-flight flag on every exit path.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the camera for one capture session.
pub struct CaptureDeviceManager {
    backend: Arc<dyn CameraBackend>,
    config: ManagerConfig,
    state: Mutex<ManagerState>,
    devices: Mutex<Vec<CaptureDevice>>,
    device_index: AtomicUsize,
    current: Mutex<Option<CaptureStream>>,
    in_flight: AtomicBool,
}

impl CaptureDeviceManager {
    pub fn new(backend: Arc<dyn CameraBackend>, config: ManagerConfig) -> Self {
        Self {
            backend,
            config,
            state: Mutex::new(ManagerState::Idle),
            devices: Mutex::new(Vec::new()),
            device_index: AtomicUsize::new(0),
            current: Mutex::new(None),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ManagerState {
        *lock(&self.state)
    }

    /// Devices seen by the last successful non-empty enumeration.
    pub fn devices(&self) -> Vec<CaptureDevice> {
        lock(&self.devices).clone()
    }

    pub fn device_index(&self) -> usize {
        self.device_index.load(Ordering::Acquire)
    }

    pub fn is_acquiring(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// The open stream, if any.
    pub fn current_stream(&self) -> Option<CaptureStream> {
        lock(&self.current).clone()
    }

    fn set_state(&self, state: ManagerState) {
        *lock(&self.state) = state;
    }

    /// Query the backend for camera-class inputs.
    ///
    /// A non-empty result replaces the remembered device list; an empty one
    /// leaves it untouched.
    pub async fn enumerate_video_inputs(&self) -> Result<Vec<CaptureDevice>, CaptureError> {
        let devices = self.backend.enumerate_video_inputs().await?;
        tracing::debug!(count = devices.len(), "Enumerated video inputs");
        if !devices.is_empty() {
            *lock(&self.devices) = devices.clone();
        }
        Ok(devices)
    }

    /// Open the camera at `device_index` (wrapped modulo the device count).
    pub async fn acquire(
        &self,
        device_index: usize,
        guard: &dyn AcquisitionGuard,
    ) -> Result<AcquireOutcome, CaptureError> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            tracing::debug!("Acquisition already in flight");
            return Ok(AcquireOutcome::Skipped);
        }
        let _in_flight = InFlight(&self.in_flight);

        if guard.should_abandon() {
            return Ok(AcquireOutcome::Abandoned);
        }

        self.set_state(ManagerState::Enumerating);
        self.release();
        tokio::time::sleep(self.config.settle_delay).await;

        if guard.should_abandon() {
            self.set_state(ManagerState::Idle);
            return Ok(AcquireOutcome::Abandoned);
        }

        match self.open(device_index, guard).await {
            Ok(outcome) => {
                let state = match outcome {
                    AcquireOutcome::Acquired(_) => ManagerState::Ready,
                    _ => ManagerState::Idle,
                };
                self.set_state(state);
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Camera acquisition failed");
                self.set_state(ManagerState::Error);
                Err(e)
            }
        }
    }

    /// Open the currently selected device.
    pub async fn acquire_current(
        &self,
        guard: &dyn AcquisitionGuard,
    ) -> Result<AcquireOutcome, CaptureError> {
        self.acquire(self.device_index(), guard).await
    }

    async fn open(
        &self,
        device_index: usize,
        guard: &dyn AcquisitionGuard,
    ) -> Result<AcquireOutcome, CaptureError> {
        let devices = self.enumerate_video_inputs().await?;
        let index = device_index % devices.len().max(1);
        self.device_index.store(index, Ordering::Release);
        let device = devices.get(index).cloned();
        let constraints = StreamConstraints::for_device(device.as_ref());

        tracing::info!(
            device = ?device.as_ref().map(|d| &d.label),
            index,
            "Requesting camera"
        );
        let track = self.backend.open(&constraints).await?;
        let stream = CaptureStream::new(track, device);

        if guard.should_abandon() {
            stream.stop();
            return Ok(AcquireOutcome::Abandoned);
        }

        let timeout = self.config.first_frame_timeout;
        match tokio::time::timeout(timeout, stream.wait_for_frame()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                stream.stop();
                return Err(e.into());
            }
            Err(_) => {
                stream.stop();
                return Err(CaptureError::Timeout(timeout));
            }
        }

        if guard.should_abandon() {
            stream.stop();
            return Ok(AcquireOutcome::Abandoned);
        }

        *lock(&self.current) = Some(stream.clone());
        tracing::info!(index, "Camera ready");
        Ok(AcquireOutcome::Acquired(stream))
    }

    /// Stop the open stream, if any. Safe to call at any time, repeatedly.
    pub fn release(&self) {
        let stream = lock(&self.current).take();
        if let Some(stream) = stream {
            stream.stop();
            tracing::debug!("Camera released");
        }
        let mut state = lock(&self.state);
        if *state == ManagerState::Ready {
            *state = ManagerState::Idle;
        }
    }

    /// Stop `stream` and forget it if it is still the current one. A newer
    /// stream opened in the meantime stays open.
    pub fn release_stream(&self, stream: &CaptureStream) {
        stream.stop();
        let mut current = lock(&self.current);
        if current.as_ref().is_some_and(|c| c.same_track(stream)) {
            *current = None;
            drop(current);
            let mut state = lock(&self.state);
            if *state == ManagerState::Ready {
                *state = ManagerState::Idle;
            }
            tracing::debug!("Camera released");
        }
    }

    /// Advance to the next device and re-acquire. A no-op with fewer than
    /// two known devices.
    ///
    /// Returns [`AcquireOutcome::Skipped`] without touching the selection
    /// while another acquisition is in flight; the index only moves once the
    /// next device is opened.
    pub async fn switch_next(
        &self,
        guard: &dyn AcquisitionGuard,
    ) -> Result<AcquireOutcome, CaptureError> {
        let count = lock(&self.devices).len();
        if count < 2 || self.is_acquiring() {
            return Ok(AcquireOutcome::Skipped);
        }
        let next = (self.device_index() + 1) % count;
        self.acquire(next, guard).await
    }
}

impl Drop for CaptureDeviceManager {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use image::RgbaImage;

    use super::*;
    use crate::backend::{BackendError, DeviceSelector, VideoTrack};

    #[derive(Default)]
    struct Counters {
        opens: AtomicUsize,
        stops: AtomicUsize,
    }

    struct Track {
        counters: Arc<Counters>,
        ready: bool,
    }

    #[async_trait]
    impl VideoTrack for Track {
        async fn wait_for_frame(&self) -> Result<(), BackendError> {
            if !self.ready {
                std::future::pending::<()>().await;
            }
            Ok(())
        }

        fn latest_frame(&self) -> Option<RgbaImage> {
            Some(RgbaImage::new(4, 4))
        }

        fn stop(&self) {
            self.counters.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Backend {
        devices: Vec<CaptureDevice>,
        counters: Arc<Counters>,
        frames: bool,
        deny: bool,
        opened: Mutex<Vec<StreamConstraints>>,
    }

    impl Backend {
        fn new(devices: usize) -> Self {
            Self {
                devices: (0..devices)
                    .map(|i| CaptureDevice {
                        id: format!("cam-{i}"),
                        label: format!("Camera {i}"),
                    })
                    .collect(),
                counters: Arc::new(Counters::default()),
                frames: true,
                deny: false,
                opened: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CameraBackend for Backend {
        async fn enumerate_video_inputs(&self) -> Result<Vec<CaptureDevice>, BackendError> {
            Ok(self.devices.clone())
        }

        async fn open(
            &self,
            constraints: &StreamConstraints,
        ) -> Result<Box<dyn VideoTrack>, BackendError> {
            if self.deny {
                return Err(BackendError::PermissionDenied("NotAllowedError".into()));
            }
            self.counters.opens.fetch_add(1, Ordering::SeqCst);
            self.opened.lock().unwrap().push(constraints.clone());
            Ok(Box::new(Track {
                counters: self.counters.clone(),
                ready: self.frames,
            }))
        }
    }

    fn fast() -> ManagerConfig {
        ManagerConfig {
            settle_delay: Duration::from_millis(1),
            first_frame_timeout: Duration::from_millis(50),
        }
    }

    fn manager(backend: Backend) -> (CaptureDeviceManager, Arc<Counters>) {
        let counters = backend.counters.clone();
        (CaptureDeviceManager::new(Arc::new(backend), fast()), counters)
    }

    #[tokio::test]
    async fn acquires_with_exact_device_constraint() {
        let backend = Arc::new(Backend::new(2));
        let m = CaptureDeviceManager::new(backend.clone(), fast());

        let outcome = m.acquire(1, &CancellationToken::new()).await.unwrap();

        assert_matches!(outcome, AcquireOutcome::Acquired(_));
        assert_eq!(m.state(), ManagerState::Ready);
        let opened = backend.opened.lock().unwrap();
        assert_eq!(opened[0].device, DeviceSelector::Exact("cam-1".into()));
    }

    #[tokio::test]
    async fn no_devices_falls_back_to_front_facing() {
        let backend = Arc::new(Backend::new(0));
        let m = CaptureDeviceManager::new(backend.clone(), fast());

        m.acquire(3, &CancellationToken::new()).await.unwrap();

        assert_eq!(backend.opened.lock().unwrap()[0].device, DeviceSelector::FacingUser);
        assert_eq!(m.device_index(), 0);
    }

    #[tokio::test]
    async fn index_wraps_modulo_device_count() {
        let (m, _) = manager(Backend::new(3));
        m.acquire(4, &CancellationToken::new()).await.unwrap();
        assert_eq!(m.device_index(), 1);
    }

    #[tokio::test]
    async fn permission_denied_is_surfaced() {
        let mut backend = Backend::new(1);
        backend.deny = true;
        let (m, _) = manager(backend);

        let err = m.acquire(0, &CancellationToken::new()).await.unwrap_err();

        assert_matches!(err, CaptureError::Permission(_));
        assert_eq!(m.state(), ManagerState::Error);
    }

    #[tokio::test]
    async fn silent_stream_times_out_and_is_stopped() {
        let mut backend = Backend::new(1);
        backend.frames = false;
        let (m, counters) = manager(backend);

        let err = m.acquire(0, &CancellationToken::new()).await.unwrap_err();

        assert_matches!(err, CaptureError::Timeout(_));
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
        assert!(m.current_stream().is_none());
    }

    #[tokio::test]
    async fn cancelled_guard_abandons_before_opening() {
        let (m, counters) = manager(Backend::new(1));
        let token = CancellationToken::new();
        token.cancel();

        let outcome = m.acquire(0, &token).await.unwrap();

        assert_matches!(outcome, AcquireOutcome::Abandoned);
        assert_eq!(counters.opens.load(Ordering::SeqCst), 0);
    }

    struct AbandonAfter {
        checks: AtomicUsize,
        allowed: usize,
    }

    impl AcquisitionGuard for AbandonAfter {
        fn should_abandon(&self) -> bool {
            self.checks.fetch_add(1, Ordering::SeqCst) >= self.allowed
        }
    }

    #[tokio::test]
    async fn abandoned_after_open_stops_the_track() {
        let (m, counters) = manager(Backend::new(1));
        // Passes the start and settle checks, fails after the hardware call.
        let guard = AbandonAfter {
            checks: AtomicUsize::new(0),
            allowed: 2,
        };

        let outcome = m.acquire(0, &guard).await.unwrap();

        assert_matches!(outcome, AcquireOutcome::Abandoned);
        assert_eq!(counters.opens.load(Ordering::SeqCst), 1);
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
        assert!(m.current_stream().is_none());
        assert_eq!(m.state(), ManagerState::Idle);
    }

    #[tokio::test]
    async fn concurrent_acquire_is_skipped() {
        let (m, counters) = manager(Backend::new(1));
        let token = CancellationToken::new();

        let (a, b) = tokio::join!(m.acquire(0, &token), m.acquire(0, &token));

        let outcomes = [a.unwrap(), b.unwrap()];
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| matches!(o, AcquireOutcome::Skipped))
                .count(),
            1
        );
        assert_eq!(counters.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let (m, counters) = manager(Backend::new(1));
        m.release();

        m.acquire(0, &CancellationToken::new()).await.unwrap();
        m.release();
        m.release();

        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
        assert_eq!(m.state(), ManagerState::Idle);
    }

    #[tokio::test]
    async fn reacquire_releases_previous_stream_first() {
        let (m, counters) = manager(Backend::new(1));
        let token = CancellationToken::new();

        m.acquire(0, &token).await.unwrap();
        m.acquire(0, &token).await.unwrap();

        assert_eq!(counters.opens.load(Ordering::SeqCst), 2);
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn releasing_a_replaced_stream_keeps_the_new_one() {
        let (m, _) = manager(Backend::new(1));
        let token = CancellationToken::new();
        let AcquireOutcome::Acquired(old) = m.acquire(0, &token).await.unwrap() else {
            panic!("first acquisition failed");
        };
        m.acquire(0, &token).await.unwrap();

        m.release_stream(&old);

        assert!(old.is_stopped());
        let current = m.current_stream().unwrap();
        assert!(!current.is_stopped());
        assert!(!current.same_track(&old));

        m.release_stream(&current);
        assert!(m.current_stream().is_none());
        assert_eq!(m.state(), ManagerState::Idle);
    }

    #[tokio::test]
    async fn switch_next_cycles_devices() {
        let (m, counters) = manager(Backend::new(2));
        let token = CancellationToken::new();
        m.acquire(0, &token).await.unwrap();

        m.switch_next(&token).await.unwrap();
        assert_eq!(m.device_index(), 1);
        m.switch_next(&token).await.unwrap();
        assert_eq!(m.device_index(), 0);

        assert_eq!(counters.opens.load(Ordering::SeqCst), 3);
        assert_eq!(counters.stops.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn switch_next_during_acquisition_keeps_selection() {
        let backend = Backend::new(2);
        let counters = backend.counters.clone();
        let m = CaptureDeviceManager::new(
            Arc::new(backend),
            ManagerConfig {
                settle_delay: Duration::from_millis(40),
                first_frame_timeout: Duration::from_millis(50),
            },
        );
        let token = CancellationToken::new();
        m.enumerate_video_inputs().await.unwrap();

        let (first, switched) = tokio::join!(m.acquire(0, &token), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            m.switch_next(&token).await
        });

        assert_matches!(first.unwrap(), AcquireOutcome::Acquired(_));
        assert_matches!(switched.unwrap(), AcquireOutcome::Skipped);
        assert_eq!(m.device_index(), 0);
        assert_eq!(counters.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn switch_next_with_one_device_is_a_noop() {
        let (m, counters) = manager(Backend::new(1));
        let token = CancellationToken::new();
        m.acquire(0, &token).await.unwrap();

        let outcome = m.switch_next(&token).await.unwrap();

        assert_matches!(outcome, AcquireOutcome::Skipped);
        assert_eq!(counters.stops.load(Ordering::SeqCst), 0);
        assert!(m.current_stream().is_some());
    }
}
