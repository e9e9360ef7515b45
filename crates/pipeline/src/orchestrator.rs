use std::sync::Arc;

use fitbooth_cloud::{NewResultRecord, ResultRecorder, ResultStorage};
use fitbooth_core::types::DbId;
use fitbooth_core::validation::validate_inputs;
use fitbooth_core::{ClothType, EncodedImage, TryOnResult, ValidationError};
use fitbooth_fitroom::{poll_task, PollConfig, PollError, TaskStatusResponse, TryOnService};
use fitbooth_local::{FailureReport, FailureTracker, ResultCache};
use tokio_util::sync::CancellationToken;

use crate::error::TryOnError;

/// Workflow position reported through [`TryOnProgress::Stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryOnStage {
    Validate,
    Submitted,
    Polling,
    Downloading,
    Persisting,
    Done,
    Failed,
}

/// Progress callback payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TryOnProgress {
    Stage(TryOnStage),
    /// Every status returned while polling, terminal one included.
    Status(TaskStatusResponse),
}

/// Descriptive fields copied into the metadata row and failure reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TryOnMetadata {
    /// Where the model photo can be viewed (local server URL or asset path).
    pub original_image_url: String,
    pub model_name: String,
    pub outfit_name: String,
}

#[derive(Debug, Clone)]
pub struct TryOnRequest {
    pub model: Option<EncodedImage>,
    pub cloth: Option<EncodedImage>,
    pub cloth_type: ClothType,
    pub metadata: TryOnMetadata,
}

/// Drives one try-on from inputs to a shareable result.
///
/// All collaborators are injected, so one orchestrator serves every run
/// and holds no per-run state.
#[derive(Clone)]
pub struct TryOnOrchestrator {
    service: Arc<dyn TryOnService>,
    storage: ResultStorage,
    recorder: Arc<dyn ResultRecorder>,
    local: Arc<dyn ResultCache>,
    tracker: Arc<dyn FailureTracker>,
    poll: PollConfig,
}

impl TryOnOrchestrator {
    pub fn new(
        service: Arc<dyn TryOnService>,
        storage: ResultStorage,
        recorder: Arc<dyn ResultRecorder>,
        local: Arc<dyn ResultCache>,
        tracker: Arc<dyn FailureTracker>,
    ) -> Self {
        Self {
            service,
            storage,
            recorder,
            local,
            tracker,
            poll: PollConfig::default(),
        }
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Run the whole workflow.
    ///
    /// Cancelling `cancel` stops submission, polling and download; once
    /// persistence has started it runs to completion. A cancelled run emits no
    /// further progress. Other failures are reported to the failure tracker
    /// in the background.
    pub async fn run<F>(
        &self,
        request: TryOnRequest,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<TryOnResult, TryOnError>
    where
        F: FnMut(&TryOnProgress) + Send,
    {
        let result = self.execute(&request, cancel, &mut on_progress).await;
        match &result {
            Ok(done) => {
                tracing::info!(
                    task_id = %done.task_id,
                    result_id = ?done.result_id,
                    local_save_success = done.local_save_success,
                    "Try-on completed"
                );
                on_progress(&TryOnProgress::Stage(TryOnStage::Done));
            }
            Err(TryOnError::Cancelled) => {
                tracing::info!("Try-on cancelled");
            }
            Err(e) => {
                tracing::error!(error = ?e, "Try-on failed");
                on_progress(&TryOnProgress::Stage(TryOnStage::Failed));
                if e.is_reportable() {
                    self.report_failure(&request.metadata, e);
                }
            }
        }
        result
    }

    async fn execute<F>(
        &self,
        request: &TryOnRequest,
        cancel: &CancellationToken,
        on_progress: &mut F,
    ) -> Result<TryOnResult, TryOnError>
    where
        F: FnMut(&TryOnProgress) + Send,
    {
        on_progress(&TryOnProgress::Stage(TryOnStage::Validate));
        validate_inputs(request.model.as_ref(), request.cloth.as_ref())?;
        let (Some(model), Some(cloth)) = (&request.model, &request.cloth) else {
            return Err(ValidationError::new("Try-on inputs", "are incomplete").into());
        };

        let task_id = tokio::select! {
            _ = cancel.cancelled() => return Err(TryOnError::Cancelled),
            r = self.service.submit_task(model, cloth, request.cloth_type) => r.map_err(TryOnError::Submit)?,
        };
        tracing::info!(task_id = %task_id, "Try-on task submitted");
        on_progress(&TryOnProgress::Stage(TryOnStage::Submitted));

        on_progress(&TryOnProgress::Stage(TryOnStage::Polling));
        let status = poll_task(&*self.service, &task_id, &self.poll, cancel, |status| {
            on_progress(&TryOnProgress::Status(status.clone()))
        })
        .await
        .map_err(|e| match e {
            PollError::Cancelled => TryOnError::Cancelled,
            other => TryOnError::Poll(other),
        })?;
        let signed_url = status.download_signed_url.ok_or(TryOnError::MissingDownloadUrl)?;

        on_progress(&TryOnProgress::Stage(TryOnStage::Downloading));
        let bytes = tokio::select! {
            _ = cancel.cancelled() => return Err(TryOnError::Cancelled),
            r = self.service.download_result(&signed_url) => r.map_err(TryOnError::Download)?,
        };
        tracing::debug!(task_id = %task_id, size = bytes.len(), "Result downloaded");

        on_progress(&TryOnProgress::Stage(TryOnStage::Persisting));
        self.persist(&task_id, bytes, signed_url, request).await
    }

    /// Durable upload and local save run concurrently; only the durable
    /// upload can fail the run. The metadata row follows once both settle.
    async fn persist(
        &self,
        task_id: &str,
        bytes: Vec<u8>,
        signed_url: String,
        request: &TryOnRequest,
    ) -> Result<TryOnResult, TryOnError> {
        let local_name = format!("fitroom-result-{}.jpg", chrono::Utc::now().timestamp_millis());
        let (stored, local) = tokio::join!(
            self.storage.upload(&bytes),
            self.local.save_result(bytes.clone(), &local_name),
        );

        if !local.success {
            tracing::warn!(
                task_id,
                error = local.error.as_deref().unwrap_or("unknown"),
                "Local save failed, continuing with durable copy"
            );
        }
        let stored = stored.map_err(TryOnError::Storage)?;

        let record = NewResultRecord {
            task_id: task_id.to_string(),
            original_image_url: or_unknown(&request.metadata.original_image_url),
            result_image_url: stored.public_url.clone(),
            outfit_name: or_unknown(&request.metadata.outfit_name),
            model_name: or_unknown(&request.metadata.model_name),
            cloth_type: request.cloth_type,
            fitroom_url: signed_url.clone(),
        };
        let result_id = self.record(&record).await;

        Ok(TryOnResult {
            task_id: task_id.to_string(),
            result_image_url: stored.public_url,
            result_id,
            fitroom_url: signed_url,
            local_path: local.success.then_some(local.path).flatten(),
            local_save_success: local.success,
        })
    }

    async fn record(&self, record: &NewResultRecord) -> Option<DbId> {
        match self.recorder.insert(record).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!(
                    task_id = %record.task_id,
                    error = %e,
                    "Database save failed, continuing with result display"
                );
                None
            }
        }
    }

    fn report_failure(&self, metadata: &TryOnMetadata, error: &TryOnError) {
        let report = FailureReport {
            filename: format!("failed-{}", chrono::Utc::now().timestamp_millis()),
            error: error.to_string(),
            original_image: or_unknown(&metadata.model_name),
            selected_costume: or_unknown(&metadata.outfit_name),
        };
        let tracker = Arc::clone(&self.tracker);
        tokio::spawn(async move {
            tracker.track_failure(&report).await;
        });
    }
}

fn or_unknown(value: &str) -> String {
    if value.trim().is_empty() {
        "Unknown".to_string()
    } else {
        value.to_string()
    }
}
