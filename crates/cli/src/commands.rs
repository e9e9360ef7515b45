use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _};
use tokio_util::sync::CancellationToken;

use fitbooth_capture::{
    CaptureDeviceManager, CaptureSession, ManagerConfig, RemountCache, SessionConfig, SessionState,
    StillImageBackend,
};
use fitbooth_cloud::{
    ResultRecorder, ResultStorage, RetryPolicy, SupabaseConfig, SupabaseRecords, SupabaseStorage,
};
use fitbooth_core::{ClothType, EncodedImage};
use fitbooth_fitroom::{FitRoomApi, FitRoomConfig, PollConfig};
use fitbooth_imaging::{compose as compose_frame, FramePreset, FrameTemplate};
use fitbooth_local::{LocalServerClient, LocalServerConfig};
use fitbooth_pipeline::{
    prepare_model_image, ModelSource, TryOnMetadata, TryOnOrchestrator, TryOnProgress,
    TryOnRequest,
};

use crate::settings::KioskSettings;
use crate::{CaptureArgs, CheckConfigArgs, ComposeArgs, PresetChoice, ResultsArgs, TryOnArgs};

/// Longest a countdown capture may take before we give up waiting.
const CAPTURE_WAIT: Duration = Duration::from_secs(30);

pub fn compose(args: ComposeArgs) -> anyhow::Result<()> {
    let preset = match args.preset {
        PresetChoice::TryOn => FramePreset::TryOnCapture,
        PresetChoice::Portrait => FramePreset::Portrait,
    };
    let template = FrameTemplate::from_path(&args.frame, preset.area())
        .with_context(|| format!("read frame '{}'", args.frame.display()))?;
    let photo = std::fs::read(&args.photo).with_context(|| format!("read photo '{}'", args.photo.display()))?;

    let framed = compose_frame(&template, &photo, &preset.parameters())?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, &framed).with_context(|| format!("write '{}'", args.out.display()))?;
    tracing::info!(out = %args.out.display(), size = framed.len(), ?preset, "Framed photo written");
    Ok(())
}

pub async fn capture(args: CaptureArgs) -> anyhow::Result<()> {
    let local = Arc::new(LocalServerClient::new(&LocalServerConfig::from_env()));
    let backend = StillImageBackend::from_paths(args.stills.as_slice())?;
    let manager = CaptureDeviceManager::new(Arc::new(backend), ManagerConfig::default());
    let session = CaptureSession::new(manager, local, Arc::new(RemountCache::default()), SessionConfig::default());

    session.initialize().await;
    for _ in 0..args.device {
        if !session.switch_camera().await {
            tracing::warn!("Camera switch did not take effect");
            break;
        }
    }
    if session.state() != SessionState::Ready {
        bail!(
            "Camera not ready: {}",
            session.last_error().unwrap_or_else(|| "unknown error".to_string())
        );
    }

    let uploaded = if args.countdown {
        if !session.start_countdown() {
            bail!("Countdown could not start");
        }
        let mut countdown = session.subscribe_countdown();
        if let Some(n) = *countdown.borrow_and_update() {
            eprintln!("{n}...");
        }
        let mut state = session.subscribe();
        let finished = tokio::time::timeout(CAPTURE_WAIT, async {
            loop {
                tokio::select! {
                    changed = countdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if let Some(n) = *countdown.borrow_and_update() {
                            eprintln!("{n}...");
                        }
                    }
                    changed = state.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        match &*state.borrow_and_update() {
                            SessionState::Uploaded(c) => return Ok(Arc::clone(c)),
                            SessionState::Error(e) => return Err(anyhow::anyhow!(e.clone())),
                            _ => {}
                        }
                    }
                }
            }
            Err(anyhow::anyhow!("Capture session closed"))
        })
        .await
        .context("Capture did not finish in time")?;
        finished?
    } else {
        session.capture().await?
    };

    println!("{}", uploaded.url);
    tracing::info!(path = %uploaded.path, size = uploaded.image.len(), "Photo uploaded");
    session.teardown();
    Ok(())
}

pub async fn try_on(args: TryOnArgs) -> anyhow::Result<()> {
    let settings = KioskSettings::from_env();
    let fitroom = FitRoomApi::new(&FitRoomConfig::from_env()?)?;
    let supabase = SupabaseConfig::from_env()?;
    let local = Arc::new(LocalServerClient::new(&LocalServerConfig::from_env()));

    let model_bytes = read(&args.model)?;
    let model = if args.captured {
        let frame_path = args.frame.unwrap_or(settings.frame_template);
        let template = match FrameTemplate::from_path(&frame_path, FramePreset::TryOnCapture.area()) {
            Ok(t) => Some(t),
            Err(e) => {
                tracing::warn!(path = %frame_path.display(), error = %e, "Frame template unavailable");
                None
            }
        };
        prepare_model_image(model_bytes, ModelSource::Captured, template).await
    } else {
        prepare_model_image(model_bytes, ModelSource::Preset(file_stem(&args.model)), None).await
    };
    let cloth = EncodedImage::new(
        read(&args.cloth)?,
        EncodedImage::mime_for_path(&args.cloth.to_string_lossy()),
        format!("{}.jpg", file_stem(&args.cloth)),
    );

    if args.check_inputs {
        let model_check = fitroom.check_model_image(&model).await?;
        let cloth_check = fitroom.check_clothes_image(&cloth).await?;
        tracing::info!(%model_check, %cloth_check, "Input checks");
    }

    let orchestrator = TryOnOrchestrator::new(
        Arc::new(fitroom),
        ResultStorage::new(Arc::new(SupabaseStorage::new(&supabase)), RetryPolicy::default()),
        Arc::new(SupabaseRecords::new(&supabase)),
        local.clone(),
        local,
    )
    .with_poll_config(PollConfig::default());

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling try-on");
            on_ctrl_c.cancel();
        }
    });

    let request = TryOnRequest {
        model: Some(model),
        cloth: Some(cloth),
        cloth_type: ClothType::FullSet,
        metadata: TryOnMetadata {
            original_image_url: args.model.display().to_string(),
            model_name: args.model_name,
            outfit_name: args.outfit_name,
        },
    };
    let result = orchestrator
        .run(request, &cancel, |progress| match progress {
            TryOnProgress::Stage(stage) => tracing::info!(?stage, "Try-on stage"),
            TryOnProgress::Status(status) => tracing::info!(status = ?status.status, "Task status"),
        })
        .await;

    match result {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            eprintln!("Share: {}", result.share_url());
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e.notice().message());
            Err(e.into())
        }
    }
}

pub async fn results(args: ResultsArgs) -> anyhow::Result<()> {
    if !args.remote {
        let local = LocalServerClient::new(&LocalServerConfig::from_env());
        let mut entries = local.list_results().await?;
        if let Some(limit) = args.limit {
            entries.truncate(limit as usize);
        }
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let records = SupabaseRecords::new(&SupabaseConfig::from_env()?);
    match args.id {
        Some(id) => println!("{}", serde_json::to_string_pretty(&records.get_by_id(id).await?)?),
        None => println!("{}", serde_json::to_string_pretty(&records.list_recent(args.limit).await?)?),
    }
    Ok(())
}

pub async fn check_config(args: CheckConfigArgs) -> anyhow::Result<()> {
    let mut failures = 0;

    let fitroom = report("FitRoom", FitRoomConfig::from_env(), &mut failures);
    report("Supabase", SupabaseConfig::from_env(), &mut failures);
    report("Local server", Ok(LocalServerConfig::from_env()), &mut failures);

    let settings = KioskSettings::from_env();
    if settings.frame_template.is_file() {
        eprintln!("ok    Frame template {}", settings.frame_template.display());
    } else {
        eprintln!("warn  Frame template {} not found; captured photos go unframed", settings.frame_template.display());
    }

    if let (Some(path), Some(config)) = (args.probe, fitroom) {
        let api = FitRoomApi::new(&config)?;
        let image = EncodedImage::new(
            read(&path)?,
            EncodedImage::mime_for_path(&path.to_string_lossy()),
            path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
        );
        match api.check_model_image(&image).await {
            Ok(body) => eprintln!("ok    FitRoom input check: {body}"),
            Err(e) => {
                failures += 1;
                eprintln!("FAIL  FitRoom input check: {e}");
            }
        }
    }

    if failures > 0 {
        bail!("{failures} configuration problem(s)");
    }
    Ok(())
}

fn report<T: std::fmt::Debug>(
    name: &str,
    loaded: Result<T, fitbooth_core::ConfigError>,
    failures: &mut u32,
) -> Option<T> {
    match loaded {
        Ok(config) => {
            eprintln!("ok    {name}: {config:?}");
            Some(config)
        }
        Err(e) => {
            *failures += 1;
            eprintln!("FAIL  {name}: {e}");
            None
        }
    }
}

fn read(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("read '{}'", path.display()))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}
