use crate::config::CloudinaryConfig;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::{Digest, Sha1};

#[derive(Debug, Clone, PartialEq)]
pub struct UploadOptions {
    pub folder: String,
    pub public_id: String,
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadedObject {
    pub public_id: String,
    pub url: String,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, bytes: Vec<u8>, options: UploadOptions) -> AppResult<UploadedObject>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct CloudinaryService {
    client: Client,
    config: CloudinaryConfig,
}

impl CloudinaryService {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.config.cloud_name.is_empty()
            && !self.config.api_key.is_empty()
            && !self.config.api_secret.is_empty()
    }

    /// Signed-upload signature: SHA-1 over the alphabetically sorted params
    /// joined as `k=v&...` with the API secret appended.
    fn sign(params: &[(&str, String)], api_secret: &str) -> String {
        let mut sorted: Vec<&(&str, String)> = params.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let to_sign = sorted
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha1::new();
        hasher.update(to_sign.as_bytes());
        hasher.update(api_secret.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[async_trait]
impl ObjectStorage for CloudinaryService {
    async fn upload(&self, bytes: Vec<u8>, options: UploadOptions) -> AppResult<UploadedObject> {
        if !self.is_configured() {
            return Err(AppError::ExternalApiError(
                "Cloudinary credentials are not configured".to_string(),
            ));
        }

        let url = format!(
            "https://api.cloudinary.com/v1_1/{}/auto/upload",
            self.config.cloud_name
        );

        let params = vec![
            ("folder", options.folder.clone()),
            ("overwrite", options.overwrite.to_string()),
            ("public_id", options.public_id.clone()),
            ("timestamp", Utc::now().timestamp().to_string()),
        ];
        let signature = Self::sign(&params, &self.config.api_secret);

        let mut form = Form::new()
            .part("file", Part::bytes(bytes).file_name(options.public_id.clone()))
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature);
        for (key, value) in params {
            form = form.text(key, value);
        }

        let response = self.client.post(&url).multipart(form).send().await?;

        if response.status().is_success() {
            let body: UploadResponse = response.json().await?;
            log::info!("Uploaded object to Cloudinary: {}", body.public_id);
            Ok(UploadedObject {
                public_id: body.public_id,
                url: body.secure_url,
            })
        } else {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            log::error!("Cloudinary upload failed: {}, Error: {}", status, message);
            Err(AppError::ExternalApiError(format!(
                "Cloudinary upload failed: {}",
                message
            )))
        }
    }
}
