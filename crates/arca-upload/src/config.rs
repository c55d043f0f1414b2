use std::path::Path;

use arca_hash::DEFAULT_BLOCK_SIZE;
use serde::{Deserialize, Serialize};

use crate::error::{UploadError, UploadResult};
use crate::info::MultipartUploadInfo;
use crate::traits::BackendKind;

/// Where uploads go.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BackendConfig {
    ObjectStorage {
        endpoint: String,
        bucket: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        part_size: Option<u64>,
    },
    ColdArchive {
        endpoint: String,
        vault: String,
        #[serde(default = "default_account_id")]
        account_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        part_size: Option<u64>,
    },
    /// Keeps uploads in process memory with object-storage limits.
    Memory {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        part_size: Option<u64>,
    },
}

fn default_account_id() -> String {
    "-".into()
}

impl BackendConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendConfig::ObjectStorage { .. } => BackendKind::ObjectStorage,
            BackendConfig::ColdArchive { .. } => BackendKind::ColdArchive,
            BackendConfig::Memory { .. } => BackendKind::Memory,
        }
    }

    pub fn part_size(&self) -> Option<u64> {
        match self {
            BackendConfig::ObjectStorage { part_size, .. }
            | BackendConfig::ColdArchive { part_size, .. }
            | BackendConfig::Memory { part_size } => *part_size,
        }
    }

    /// Backend limits with the configured part size applied.
    ///
    /// A part size outside the backend's limits is an error, never clamped.
    pub fn upload_info(&self) -> UploadResult<MultipartUploadInfo> {
        let base = match self.kind() {
            BackendKind::ColdArchive => MultipartUploadInfo::cold_archive(),
            BackendKind::ObjectStorage | BackendKind::Memory => MultipartUploadInfo::object_storage(),
        };
        match self.part_size() {
            Some(part_size) => base.with_part_size(part_size),
            None => Ok(base),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Memory { part_size: None }
    }
}

/// Upload settings, usually read from `arca.toml`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Capacity of the buffered reader wrapped around the source file.
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
    /// Per-request timeout for network backends.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub backend: BackendConfig,
}

fn default_read_buffer_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: default_read_buffer_size(),
            request_timeout_secs: default_request_timeout_secs(),
            backend: BackendConfig::default(),
        }
    }
}

impl UploadConfig {
    pub fn from_toml_str(text: &str) -> UploadResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| UploadError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> UploadResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> UploadResult<()> {
        if self.read_buffer_size == 0 {
            return Err(UploadError::Config("read_buffer_size must be positive".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(UploadError::Config("request_timeout_secs must be positive".into()));
        }
        self.backend.upload_info()?;
        Ok(())
    }

    pub fn to_toml_string(&self) -> UploadResult<String> {
        toml::to_string_pretty(self).map_err(|e| UploadError::Config(e.to_string()))
    }
}
