// service/storage.rs
use chrono::Utc;
use reqwest::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Attachment storage is not configured")]
    NotConfigured,

    #[error("Storage rejected the credentials ({0})")]
    Unauthorized(StatusCode),

    #[error("File too large: {0}")]
    TooLarge(String),

    #[error("Storage quota exceeded")]
    QuotaExceeded,

    #[error("Storage returned {status}: {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl StorageError {
    /// Classifies a non-success response from the storage API.
    pub fn from_response(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StorageError::Unauthorized(status),
            StatusCode::PAYLOAD_TOO_LARGE => StorageError::TooLarge(body),
            StatusCode::INSUFFICIENT_STORAGE => StorageError::QuotaExceeded,
            _ if body.to_lowercase().contains("quota") => StorageError::QuotaExceeded,
            _ => StorageError::Rejected { status, body },
        }
    }

    /// Message safe to show the uploader.
    pub fn user_message(&self) -> &'static str {
        match self {
            StorageError::NotConfigured => "File uploads are not available right now. Please contact support.",
            StorageError::Unauthorized(_) => "Upload failed: the storage service refused the request.",
            StorageError::TooLarge(_) => "Upload failed: the file is too large.",
            StorageError::QuotaExceeded => "Upload failed: storage quota exceeded.",
            StorageError::Rejected { .. } | StorageError::Network(_) => "Upload failed. Please try again.",
        }
    }
}

/// An uploaded file part ready to be stored.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct AttachmentStorage {
    client: reqwest::Client,
    api_url: Option<String>,
    api_token: Option<String>,
    public_url: Option<String>,
}

impl AttachmentStorage {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.storage_api_url.clone(),
            api_token: config.storage_api_token.clone(),
            public_url: config.storage_public_url.clone(),
        }
    }

    /// Stores every non-empty file and returns their public URLs in order.
    pub async fn upload_all(
        &self,
        user_id: Uuid,
        files: Vec<UploadFile>,
    ) -> Result<Vec<String>, StorageError> {
        let files: Vec<UploadFile> = files.into_iter().filter(|f| !f.bytes.is_empty()).collect();
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let mut urls = Vec::with_capacity(files.len());
        for file in files {
            urls.push(self.upload(user_id, file).await?);
        }
        Ok(urls)
    }

    async fn upload(&self, user_id: Uuid, file: UploadFile) -> Result<String, StorageError> {
        let api_url = self.api_url.as_deref().ok_or(StorageError::NotConfigured)?;
        let key = object_key(user_id, Utc::now().timestamp_millis(), &file.file_name);
        let target = format!("{}/{}", api_url.trim_end_matches('/'), key);

        let mut request = self
            .client
            .put(&target)
            .header(
                "Content-Type",
                file.content_type.as_deref().unwrap_or("application/octet-stream"),
            )
            .body(file.bytes);
        if let Some(token) = &self.api_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Attachment upload to {} failed with {}: {}", key, status, body);
            return Err(StorageError::from_response(status, body));
        }

        tracing::info!("Stored attachment {}", key);
        let base = self.public_url.as_deref().unwrap_or(api_url);
        Ok(format!("{}/{}", base.trim_end_matches('/'), key))
    }
}

/// `attachments/{user_id}/{unix_millis}_{file_name}`, with path separators
/// in the client-supplied name flattened.
pub fn object_key(user_id: Uuid, unix_millis: i64, file_name: &str) -> String {
    let name: String = file_name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("attachments/{}/{}_{}", user_id, unix_millis, name)
}
