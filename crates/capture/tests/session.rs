//! Capture session flows against the still-image camera and an in-memory
//! uploader.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use image::{Rgba, RgbaImage};

use fitbooth_capture::{
    CaptureDevice, CaptureDeviceManager, CaptureError, CaptureSession, CaptureSource,
    ManagerConfig, PhotoUploader, RemountCache, SessionConfig, SessionMode, SessionState,
    StillImageBackend, StoredPhoto,
};
use fitbooth_core::EncodedImage;
use fitbooth_local::LocalServerError;

#[derive(Default)]
struct FakeUploader {
    uploads: Mutex<Vec<EncodedImage>>,
    failures_left: AtomicUsize,
    delay: Duration,
}

impl FakeUploader {
    fn count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl PhotoUploader for FakeUploader {
    async fn upload_photo(&self, image: EncodedImage) -> Result<StoredPhoto, LocalServerError> {
        tokio::time::sleep(self.delay).await;
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(LocalServerError::ApiError {
                status: 500,
                body: "disk full".into(),
            });
        }
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(image);
        let path = format!("/Images_input/capture-{}.jpg", uploads.len());
        Ok(StoredPhoto {
            url: format!("http://localhost:5000{path}"),
            path,
        })
    }
}

fn still_backend(devices: usize) -> StillImageBackend {
    StillImageBackend::new(
        (0..devices)
            .map(|i| {
                (
                    CaptureDevice {
                        id: format!("cam-{i}"),
                        label: format!("Camera {i}"),
                    },
                    RgbaImage::from_pixel(1280, 720, Rgba([120, 80, 40, 255])),
                )
            })
            .collect(),
    )
}

fn fast_config() -> SessionConfig {
    SessionConfig {
        countdown_from: 2,
        countdown_tick: Duration::from_millis(20),
        capture_delay: Duration::from_millis(5),
        restart_delay: Duration::from_millis(20),
        retake_delay: Duration::from_millis(5),
    }
}

fn session_with(
    devices: usize,
    uploader: Arc<FakeUploader>,
    cache: Arc<RemountCache>,
) -> CaptureSession {
    session_settling(devices, uploader, cache, Duration::from_millis(1))
}

fn session_settling(
    devices: usize,
    uploader: Arc<FakeUploader>,
    cache: Arc<RemountCache>,
    settle_delay: Duration,
) -> CaptureSession {
    let manager = CaptureDeviceManager::new(
        Arc::new(still_backend(devices)),
        ManagerConfig {
            settle_delay,
            first_frame_timeout: Duration::from_millis(200),
        },
    );
    CaptureSession::new(manager, uploader, cache, fast_config())
}

fn session(uploader: Arc<FakeUploader>) -> CaptureSession {
    session_with(1, uploader, Arc::new(RemountCache::default()))
}

async fn wait_for_state(session: &CaptureSession, pred: impl FnMut(&SessionState) -> bool) {
    let mut rx = session.subscribe();
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(pred))
        .await
        .expect("state not reached in time")
        .expect("state channel closed");
}

#[tokio::test]
async fn initialize_reaches_ready() {
    let s = session(Arc::new(FakeUploader::default()));
    s.initialize().await;
    assert_eq!(s.state(), SessionState::Ready);
    assert!(s.manager().current_stream().is_some());
}

#[tokio::test]
async fn capture_uploads_fixed_size_jpeg_and_releases_camera() {
    let uploader = Arc::new(FakeUploader::default());
    let s = session(uploader.clone());
    s.initialize().await;

    let captured = s.capture().await.unwrap();

    assert_eq!(captured.source, CaptureSource::Camera);
    assert_eq!(captured.path, "/Images_input/capture-1.jpg");
    assert_matches!(s.state(), SessionState::Uploaded(_));
    assert!(s.manager().current_stream().is_none());

    let uploads = uploader.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].mime, "image/jpeg");
    let decoded = image::load_from_memory(&uploads[0].bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (1150, 1840));
}

#[tokio::test]
async fn concurrent_captures_upload_once() {
    let uploader = Arc::new(FakeUploader {
        delay: Duration::from_millis(30),
        ..FakeUploader::default()
    });
    let s = session(uploader.clone());
    s.initialize().await;

    let (a, b) = tokio::join!(s.capture(), s.capture());

    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    assert!(matches!(a, Err(CaptureError::InProgress)) || matches!(b, Err(CaptureError::InProgress)));
    assert_eq!(uploader.count(), 1);
}

#[tokio::test]
async fn capture_before_ready_is_rejected_without_side_effects() {
    let uploader = Arc::new(FakeUploader::default());
    let s = session(uploader.clone());

    let err = s.capture().await.unwrap_err();

    assert_matches!(err, CaptureError::NotReady);
    assert_eq!(s.state(), SessionState::Loading);
    assert_eq!(uploader.count(), 0);
}

#[tokio::test]
async fn failed_upload_reports_and_restarts_camera() {
    let uploader = Arc::new(FakeUploader {
        failures_left: AtomicUsize::new(1),
        ..FakeUploader::default()
    });
    let s = session(uploader.clone());
    s.initialize().await;

    let err = s.capture().await.unwrap_err();

    assert_matches!(err, CaptureError::Upload(LocalServerError::ApiError { status: 500, .. }));
    assert_matches!(s.state(), SessionState::Error(_));
    assert!(s.last_error().unwrap().contains("500"));
    assert!(s.captured().is_none());

    wait_for_state(&s, |state| *state == SessionState::Ready).await;
    let retried = s.capture().await.unwrap();
    assert_eq!(retried.path, "/Images_input/capture-1.jpg");
}

#[tokio::test]
async fn countdown_ticks_then_captures_once() {
    let uploader = Arc::new(FakeUploader::default());
    let s = session(uploader.clone());
    s.initialize().await;
    let countdown = s.subscribe_countdown();

    assert!(s.start_countdown());
    assert_eq!(*countdown.borrow(), Some(2));
    assert!(!s.start_countdown(), "second countdown must be rejected");

    wait_for_state(&s, |state| matches!(state, SessionState::Uploaded(_))).await;
    assert_eq!(*countdown.borrow(), None);
    assert_eq!(uploader.count(), 1);
}

#[tokio::test]
async fn retake_clears_photo_and_reopens_camera() {
    let cache = Arc::new(RemountCache::default());
    let s = session_with(1, Arc::new(FakeUploader::default()), cache.clone());
    s.initialize().await;
    s.capture().await.unwrap();
    assert!(cache.fresh().is_some());

    s.retake().await;

    assert_eq!(s.state(), SessionState::Ready);
    assert!(s.captured().is_none());
    assert!(cache.fresh().is_none());
    assert!(s.manager().current_stream().is_some());
}

#[tokio::test]
async fn remount_restores_recent_photo_without_camera() {
    let cache = Arc::new(RemountCache::default());
    let uploader = Arc::new(FakeUploader::default());
    {
        let first = session_with(1, uploader.clone(), cache.clone());
        first.initialize().await;
        first.capture().await.unwrap();
    }

    let second = session_with(1, uploader.clone(), cache);
    second.initialize().await;

    assert_matches!(second.state(), SessionState::Uploaded(c) if c.path == "/Images_input/capture-1.jpg");
    assert!(second.manager().current_stream().is_none());
    assert_eq!(uploader.count(), 1);
}

#[tokio::test]
async fn held_photo_pins_the_state() {
    let s = session(Arc::new(FakeUploader::default()));
    s.initialize().await;
    s.capture().await.unwrap();

    // Neither mode changes nor camera switches apply while a photo is held.
    assert_eq!(s.toggle_mode().await, SessionMode::Camera);
    s.switch_camera().await;
    assert_matches!(s.state(), SessionState::Uploaded(_));
}

#[tokio::test]
async fn upload_mode_accepts_images_only() {
    let uploader = Arc::new(FakeUploader::default());
    let s = session(uploader.clone());
    s.initialize().await;

    assert_eq!(s.toggle_mode().await, SessionMode::Upload);
    assert!(s.manager().current_stream().is_none());

    let err = s
        .upload_file(EncodedImage::new(b"hello".to_vec(), "text/plain", "notes.txt"))
        .await
        .unwrap_err();
    assert_matches!(err, CaptureError::Validation(_));
    assert!(s.last_error().unwrap().contains("Please select an image file"));
    assert_eq!(uploader.count(), 0);

    let stored = s
        .upload_file(EncodedImage::new(vec![1, 2, 3], "image/png", "me.png"))
        .await
        .unwrap();
    assert_eq!(stored.source, CaptureSource::File);
    assert_matches!(s.state(), SessionState::Uploaded(_));
}

#[tokio::test]
async fn toggling_back_to_camera_reacquires() {
    let s = session(Arc::new(FakeUploader::default()));
    s.initialize().await;

    s.toggle_mode().await;
    assert_eq!(s.state(), SessionState::Loading);
    assert_eq!(s.toggle_mode().await, SessionMode::Camera);
    assert_eq!(s.state(), SessionState::Ready);
}

#[tokio::test]
async fn switch_camera_moves_to_next_device() {
    let s = session_with(2, Arc::new(FakeUploader::default()), Arc::new(RemountCache::default()));
    s.initialize().await;
    assert_eq!(s.manager().device_index(), 0);

    assert!(s.switch_camera().await);

    assert_eq!(s.manager().device_index(), 1);
    assert_eq!(s.state(), SessionState::Ready);
    let stream = s.manager().current_stream().unwrap();
    assert_eq!(stream.device().unwrap().id, "cam-1");
}

#[tokio::test]
async fn teardown_releases_camera_and_stops_countdown() {
    let uploader = Arc::new(FakeUploader::default());
    let s = session(uploader.clone());
    s.initialize().await;
    let stream = s.manager().current_stream().unwrap();
    assert!(s.start_countdown());

    s.teardown();
    s.teardown();

    assert!(stream.is_stopped());
    assert_eq!(*s.subscribe_countdown().borrow(), None);
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(uploader.count(), 0);
}

#[tokio::test]
async fn initialize_after_teardown_does_not_open_camera() {
    let s = session(Arc::new(FakeUploader::default()));
    s.teardown();
    s.initialize().await;
    assert!(s.manager().current_stream().is_none());
}

#[tokio::test]
async fn toggling_to_upload_during_acquisition_keeps_camera_closed() {
    let s = session_settling(
        1,
        Arc::new(FakeUploader::default()),
        Arc::new(RemountCache::default()),
        Duration::from_millis(60),
    );

    let (_, mode) = tokio::join!(s.initialize(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        s.toggle_mode().await
    });

    assert_eq!(mode, SessionMode::Upload);
    assert_eq!(s.mode(), SessionMode::Upload);
    assert!(s.manager().current_stream().is_none());
    assert_eq!(s.state(), SessionState::Loading);
}

#[tokio::test]
async fn retake_during_upload_discards_the_late_photo() {
    let cache = Arc::new(RemountCache::default());
    let uploader = Arc::new(FakeUploader {
        delay: Duration::from_millis(100),
        ..FakeUploader::default()
    });
    let s = session_with(1, uploader.clone(), cache.clone());
    s.initialize().await;

    let (captured, _) = tokio::join!(s.capture(), async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        s.retake().await
    });

    assert_matches!(captured, Err(CaptureError::Superseded));
    assert!(s.captured().is_none());
    assert!(cache.fresh().is_none());
    assert_eq!(s.state(), SessionState::Ready);
    assert!(s.manager().current_stream().is_some());
    assert!(uploader.count() <= 1);
}

#[tokio::test]
async fn switch_during_acquisition_reports_no_switch() {
    let s = session_settling(
        2,
        Arc::new(FakeUploader::default()),
        Arc::new(RemountCache::default()),
        Duration::from_millis(20),
    );
    s.initialize().await;

    let (_, switched) = tokio::join!(s.retake(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        s.switch_camera().await
    });

    assert!(!switched);
    assert_eq!(s.manager().device_index(), 0);
    assert_eq!(s.state(), SessionState::Ready);
}
