//! The capture view's controller.
//!
//! One [`CaptureSession`] owns a [`CaptureDeviceManager`] and drives the
//! `loading -> ready -> capturing -> uploaded | error` state machine. All
//! asynchronous work (countdown, delayed re-acquisition) reads state through
//! the shared inner controller, never through captured copies.
//!
//! Once a photo is held, any transition other than into `capturing` or
//! `uploaded` is ignored until [`CaptureSession::retake`] clears it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use fitbooth_core::validation::validate_upload;
use fitbooth_core::EncodedImage;
use fitbooth_imaging::capture_frame;
use fitbooth_local::{LocalServerClient, LocalServerError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::RemountCache;
use crate::error::CaptureError;
use crate::manager::{AcquireOutcome, AcquisitionGuard, CaptureDeviceManager};

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Where a stored photo ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPhoto {
    /// Server-relative path, e.g. `/Images_input/capture-1.jpg`.
    pub path: String,
    /// Absolute URL for display and download.
    pub url: String,
}

/// Persists a captured or selected photo.
#[async_trait]
pub trait PhotoUploader: Send + Sync {
    async fn upload_photo(&self, image: EncodedImage) -> Result<StoredPhoto, LocalServerError>;
}

#[async_trait]
impl PhotoUploader for LocalServerClient {
    async fn upload_photo(&self, image: EncodedImage) -> Result<StoredPhoto, LocalServerError> {
        let uploaded = self.upload_image(image).await?;
        Ok(StoredPhoto {
            url: self.resolve_url(&uploaded.path),
            path: uploaded.path,
        })
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSource {
    Camera,
    File,
}

/// A photo that has been stored successfully. Immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedCapture {
    pub image: EncodedImage,
    pub path: String,
    pub url: String,
    pub source: CaptureSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    Ready,
    Capturing,
    Uploaded(Arc<UploadedCapture>),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    #[default]
    Camera,
    Upload,
}

/// Tunable timings for the session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// First countdown value; counts down to 1.
    pub countdown_from: u8,
    pub countdown_tick: Duration,
    /// Pause between the last tick and the capture.
    pub capture_delay: Duration,
    /// Pause before re-acquiring the camera after a failed upload.
    pub restart_delay: Duration,
    /// Pause before re-acquiring the camera after a retake.
    pub retake_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            countdown_from: 2,
            countdown_tick: Duration::from_secs(1),
            capture_delay: Duration::from_millis(50),
            restart_delay: Duration::from_millis(300),
            retake_delay: Duration::from_millis(200),
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Capturing<'a>(&'a AtomicBool);

impl Drop for Capturing<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct SessionInner {
    manager: CaptureDeviceManager,
    uploader: Arc<dyn PhotoUploader>,
    cache: Arc<RemountCache>,
    config: SessionConfig,
    state: watch::Sender<SessionState>,
    countdown: watch::Sender<Option<u8>>,
    countdown_task: Mutex<Option<JoinHandle<()>>>,
    capturing: AtomicBool,
    mode: Mutex<SessionMode>,
    captured: Mutex<Option<Arc<UploadedCapture>>>,
    last_error: Mutex<Option<String>>,
    /// Bumped by retake and teardown; a pending upload from an older
    /// generation is dropped.
    generation: AtomicU64,
    torn_down: CancellationToken,
}

impl AcquisitionGuard for SessionInner {
    fn should_abandon(&self) -> bool {
        self.torn_down.is_cancelled()
            || lock(&self.captured).is_some()
            || self.mode() != SessionMode::Camera
    }
}

impl SessionInner {
    fn has_capture(&self) -> bool {
        lock(&self.captured).is_some()
    }

    fn mode(&self) -> SessionMode {
        *lock(&self.mode)
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn supersede(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// The error for an upload whose generation is no longer current.
    fn discarded(&self, started: u64) -> Option<CaptureError> {
        if self.torn_down.is_cancelled() {
            Some(CaptureError::TornDown)
        } else if self.generation() != started {
            Some(CaptureError::Superseded)
        } else {
            None
        }
    }

    /// Apply a transition unless a held photo pins the session.
    fn transition(&self, next: SessionState) -> bool {
        let pinned = self.has_capture()
            && !matches!(next, SessionState::Capturing | SessionState::Uploaded(_));
        if pinned {
            tracing::debug!(?next, "Ignoring transition while a photo is held");
            return false;
        }
        tracing::debug!(?next, "Capture session transition");
        self.state.send_replace(next);
        true
    }

    fn record_error(&self, message: String) {
        *lock(&self.last_error) = Some(message.clone());
        self.transition(SessionState::Error(message));
    }

    fn stop_countdown(&self) {
        if let Some(handle) = lock(&self.countdown_task).take() {
            handle.abort();
        }
        self.countdown.send_replace(None);
    }

    fn countdown_running(&self) -> bool {
        lock(&self.countdown_task)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    async fn acquire(&self) {
        if self.torn_down.is_cancelled() || self.has_capture() || self.mode() != SessionMode::Camera {
            return;
        }
        self.transition(SessionState::Loading);
        let result = self.manager.acquire_current(self).await;
        self.apply_acquire(result);
    }

    fn apply_acquire(&self, result: Result<AcquireOutcome, CaptureError>) {
        match result {
            Ok(AcquireOutcome::Acquired(_)) => {
                self.transition(SessionState::Ready);
            }
            Ok(AcquireOutcome::Skipped) | Ok(AcquireOutcome::Abandoned) => {}
            Err(e) => {
                if !self.torn_down.is_cancelled() {
                    self.record_error(e.to_string());
                }
            }
        }
    }

    fn hold(&self, capture: UploadedCapture) -> Arc<UploadedCapture> {
        let capture = Arc::new(capture);
        *lock(&self.captured) = Some(capture.clone());
        *lock(&self.last_error) = None;
        self.cache.store(capture.clone());
        self.transition(SessionState::Uploaded(capture.clone()));
        capture
    }

    async fn capture(self: &Arc<Self>) -> Result<Arc<UploadedCapture>, CaptureError> {
        if self.capturing.swap(true, Ordering::AcqRel) {
            return Err(CaptureError::InProgress);
        }
        let _capturing = Capturing(&self.capturing);
        let started = self.generation();

        if *self.state.borrow() != SessionState::Ready {
            return Err(CaptureError::NotReady);
        }
        let stream = self.manager.current_stream().ok_or(CaptureError::NotReady)?;
        let frame = stream.latest_frame().ok_or(CaptureError::NotReady)?;

        self.transition(SessionState::Capturing);
        tracing::info!(width = frame.width(), height = frame.height(), "Capturing photo");

        let encoded = tokio::task::spawn_blocking(move || capture_frame(&frame)).await;
        // Free the hardware before the network call.
        self.manager.release_stream(&stream);

        let captured = match encoded {
            Ok(Ok(captured)) => captured,
            Ok(Err(e)) => return Err(self.fail_capture(e.into())),
            Err(e) => return Err(self.fail_capture(e.into())),
        };

        if let Some(discarded) = self.discarded(started) {
            return Err(discarded);
        }

        let file_name = format!("capture-{}.jpg", unix_millis());
        let image = EncodedImage::jpeg(captured.bytes, file_name);
        let uploaded = self.uploader.upload_photo(image.clone()).await;
        if let Some(discarded) = self.discarded(started) {
            tracing::info!(error = %discarded, "Dropping capture finished after retake or teardown");
            return Err(discarded);
        }
        match uploaded {
            Ok(stored) => {
                tracing::info!(path = %stored.path, "Captured photo stored");
                Ok(self.hold(UploadedCapture {
                    image,
                    path: stored.path,
                    url: stored.url,
                    source: CaptureSource::Camera,
                }))
            }
            Err(e) => Err(self.fail_capture(e.into())),
        }
    }

    /// Record a capture failure and schedule a camera restart so the user
    /// can retry.
    fn fail_capture(self: &Arc<Self>, error: CaptureError) -> CaptureError {
        tracing::error!(error = %error, "Capture failed");
        if self.torn_down.is_cancelled() {
            return error;
        }
        self.record_error(error.to_string());

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = inner.torn_down.cancelled() => {}
                _ = tokio::time::sleep(inner.config.restart_delay) => {
                    inner.acquire().await;
                }
            }
        });
        error
    }
}

/// Milliseconds since the Unix epoch, for unique capture file names.
fn unix_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Controller for one capture view.
///
/// Dropping the session tears it down: pending work is cancelled and the
/// camera is released.
pub struct CaptureSession {
    inner: Arc<SessionInner>,
}

impl CaptureSession {
    pub fn new(
        manager: CaptureDeviceManager,
        uploader: Arc<dyn PhotoUploader>,
        cache: Arc<RemountCache>,
        config: SessionConfig,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Loading);
        let (countdown, _) = watch::channel(None);
        Self {
            inner: Arc::new(SessionInner {
                manager,
                uploader,
                cache,
                config,
                state,
                countdown,
                countdown_task: Mutex::new(None),
                capturing: AtomicBool::new(false),
                mode: Mutex::new(SessionMode::Camera),
                captured: Mutex::new(None),
                last_error: Mutex::new(None),
                generation: AtomicU64::new(0),
                torn_down: CancellationToken::new(),
            }),
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Follow state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Follow the countdown; `None` when no countdown is shown.
    pub fn subscribe_countdown(&self) -> watch::Receiver<Option<u8>> {
        self.inner.countdown.subscribe()
    }

    /// Camera or file-upload mode.
    pub fn mode(&self) -> SessionMode {
        self.inner.mode()
    }

    /// The held photo, once stored.
    pub fn captured(&self) -> Option<Arc<UploadedCapture>> {
        lock(&self.inner.captured).clone()
    }

    /// Message of the most recent failure, cleared on the next attempt.
    pub fn last_error(&self) -> Option<String> {
        lock(&self.inner.last_error).clone()
    }

    /// The device manager owning the camera.
    pub fn manager(&self) -> &CaptureDeviceManager {
        &self.inner.manager
    }

    /// Mount the view: restore a photo uploaded moments ago, or open the
    /// camera.
    pub async fn initialize(&self) {
        if let Some(capture) = self.inner.cache.fresh() {
            tracing::info!(path = %capture.path, "Restored photo from remount cache");
            *lock(&self.inner.captured) = Some(capture.clone());
            self.inner.transition(SessionState::Uploaded(capture));
            return;
        }
        self.inner.acquire().await;
    }

    /// Start the 2-1 countdown that ends in a capture.
    ///
    /// Returns `false` (and does nothing) unless the session is ready with
    /// no countdown running and no capture in flight.
    pub fn start_countdown(&self) -> bool {
        let inner = &self.inner;
        if *inner.state.borrow() != SessionState::Ready
            || inner.countdown_running()
            || inner.capturing.load(Ordering::Acquire)
            || inner.has_capture()
        {
            return false;
        }

        let from = inner.config.countdown_from.max(1);
        inner.countdown.send_replace(Some(from));
        tracing::info!(from, "Countdown started");

        let task_inner = Arc::clone(inner);
        let handle = tokio::spawn(async move {
            let inner = task_inner;
            let mut value = from;
            loop {
                tokio::select! {
                    _ = inner.torn_down.cancelled() => return,
                    _ = tokio::time::sleep(inner.config.countdown_tick) => {}
                }
                if value <= 1 {
                    break;
                }
                value -= 1;
                inner.countdown.send_replace(Some(value));
            }
            inner.countdown.send_replace(None);

            tokio::select! {
                _ = inner.torn_down.cancelled() => {}
                _ = tokio::time::sleep(inner.config.capture_delay) => {
                    if let Err(e) = inner.capture().await {
                        tracing::warn!(error = %e, "Countdown capture did not complete");
                    }
                }
            }
        });
        *lock(&inner.countdown_task) = Some(handle);
        true
    }

    /// Take the photo now.
    ///
    /// At most one capture runs at a time; a concurrent call fails with
    /// [`CaptureError::InProgress`] without side effects. The camera is
    /// released before the upload starts, and the session only reaches
    /// `uploaded` once the upload succeeds.
    pub async fn capture(&self) -> Result<Arc<UploadedCapture>, CaptureError> {
        self.inner.capture().await
    }

    /// Discard the held photo and reopen the camera.
    pub async fn retake(&self) {
        let inner = &self.inner;
        tracing::info!("Retake requested");
        inner.supersede();
        inner.stop_countdown();
        inner.manager.release();
        *lock(&inner.captured) = None;
        *lock(&inner.last_error) = None;
        inner.cache.clear();
        inner.transition(SessionState::Loading);

        if inner.mode() == SessionMode::Camera {
            tokio::select! {
                _ = inner.torn_down.cancelled() => return,
                _ = tokio::time::sleep(inner.config.retake_delay) => {}
            }
            inner.acquire().await;
        }
    }

    /// Switch between camera and file-upload mode. Ignored while a capture
    /// is in flight or a photo is held.
    pub async fn toggle_mode(&self) -> SessionMode {
        let inner = &self.inner;
        if inner.capturing.load(Ordering::Acquire) || inner.has_capture() {
            return inner.mode();
        }
        inner.stop_countdown();
        inner.manager.release();

        let next = {
            let mut mode = lock(&inner.mode);
            *mode = match *mode {
                SessionMode::Camera => SessionMode::Upload,
                SessionMode::Upload => SessionMode::Camera,
            };
            *mode
        };
        *lock(&inner.last_error) = None;
        inner.transition(SessionState::Loading);
        tracing::info!(mode = ?next, "Capture mode changed");

        if next == SessionMode::Camera {
            inner.acquire().await;
        }
        next
    }

    /// Move to the next camera.
    ///
    /// Returns `true` once the next camera is open. Ignored (returning
    /// `false`) with fewer than two cameras, while a capture or another
    /// acquisition is in flight, or outside camera mode.
    pub async fn switch_camera(&self) -> bool {
        let inner = &self.inner;
        if inner.manager.devices().len() < 2
            || inner.capturing.load(Ordering::Acquire)
            || inner.manager.is_acquiring()
            || inner.has_capture()
            || inner.mode() != SessionMode::Camera
        {
            return false;
        }
        inner.stop_countdown();
        *lock(&inner.last_error) = None;
        inner.transition(SessionState::Loading);
        let result = inner.manager.switch_next(&**inner).await;
        if matches!(result, Ok(AcquireOutcome::Skipped)) {
            tracing::debug!("Camera switch skipped, acquisition already in flight");
        }
        let switched = matches!(result, Ok(AcquireOutcome::Acquired(_)));
        inner.apply_acquire(result);
        switched
    }

    /// Store a photo picked from disk instead of the camera.
    pub async fn upload_file(&self, image: EncodedImage) -> Result<Arc<UploadedCapture>, CaptureError> {
        let inner = &self.inner;
        if inner.capturing.swap(true, Ordering::AcqRel) {
            return Err(CaptureError::InProgress);
        }
        let _capturing = Capturing(&inner.capturing);
        let started = inner.generation();

        if let Err(e) = validate_upload(&image) {
            *lock(&inner.last_error) = Some(e.to_string());
            return Err(e.into());
        }
        *lock(&inner.last_error) = None;

        let uploaded = inner.uploader.upload_photo(image.clone()).await;
        if let Some(discarded) = inner.discarded(started) {
            return Err(discarded);
        }
        match uploaded {
            Ok(stored) => {
                tracing::info!(path = %stored.path, "Selected photo stored");
                Ok(inner.hold(UploadedCapture {
                    image,
                    path: stored.path,
                    url: stored.url,
                    source: CaptureSource::File,
                }))
            }
            Err(e) => {
                let e = CaptureError::from(e);
                tracing::error!(error = %e, "Photo upload failed");
                *lock(&inner.last_error) = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Cancel pending work and release the camera. Idempotent.
    pub fn teardown(&self) {
        let inner = &self.inner;
        if !inner.torn_down.is_cancelled() {
            tracing::debug!("Capture session torn down");
        }
        inner.supersede();
        inner.torn_down.cancel();
        inner.stop_countdown();
        inner.manager.release();
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
