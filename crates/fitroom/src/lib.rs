//! Client for the FitRoom virtual try-on service.
//!
//! The service works on tasks: a model photo and a garment photo are
//! submitted, the task is polled until it completes or fails, and the result
//! is fetched from a signed download URL.

pub mod api;
pub mod config;
pub mod poll;

use async_trait::async_trait;
use fitbooth_core::{ClothType, EncodedImage};

pub use api::{FitRoomApi, FitRoomApiError, SubmitResponse, TaskStatus, TaskStatusResponse};
pub use config::FitRoomConfig;
pub use poll::{poll_task, PollConfig, PollError};

/// The task operations the try-on workflow depends on.
#[async_trait]
pub trait TryOnService: Send + Sync {
    /// Create a task; returns the remote task id.
    async fn submit_task(
        &self,
        model: &EncodedImage,
        cloth: &EncodedImage,
        cloth_type: ClothType,
    ) -> Result<String, FitRoomApiError>;

    async fn task_status(&self, task_id: &str) -> Result<TaskStatusResponse, FitRoomApiError>;

    /// Fetch the finished image from a signed URL.
    async fn download_result(&self, signed_url: &str) -> Result<Vec<u8>, FitRoomApiError>;
}

#[async_trait]
impl TryOnService for FitRoomApi {
    async fn submit_task(
        &self,
        model: &EncodedImage,
        cloth: &EncodedImage,
        cloth_type: ClothType,
    ) -> Result<String, FitRoomApiError> {
        Ok(self.create_task(model, cloth, cloth_type).await?.task_id)
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatusResponse, FitRoomApiError> {
        self.get_task_status(task_id).await
    }

    async fn download_result(&self, signed_url: &str) -> Result<Vec<u8>, FitRoomApiError> {
        FitRoomApi::download_result(self, signed_url).await
    }
}
