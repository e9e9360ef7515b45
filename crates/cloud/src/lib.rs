//! Durable storage and result metadata on Supabase.
//!
//! Result images go to a public bucket, one folder per event day
//! (see [`fitbooth_core::naming`]). Each completed try-on also gets a row
//! in the results table so the admin view and share links can find it.
//!
//! Both concerns sit behind traits ([`ObjectStore`], [`ResultRecorder`]) so
//! the try-on workflow can be exercised without a network.

pub mod config;
pub mod records;
pub mod result_storage;
pub mod storage;

pub use config::SupabaseConfig;
pub use records::{NewResultRecord, RecordError, ResultRecord, ResultRecorder, SupabaseRecords};
pub use result_storage::{ResultStorage, RetryPolicy, StoredObject};
pub use storage::{ObjectStore, StorageError, SupabaseStorage};

/// Attach the Supabase key headers shared by the storage and REST APIs.
pub(crate) fn authorize(builder: reqwest::RequestBuilder, key: &str) -> reqwest::RequestBuilder {
    builder.header("apikey", key).bearer_auth(key)
}
