//! TikTok publishing: direct-post init, chunked upload, then status polling.
//!
//! TikTok accepts the bytes and then processes the post asynchronously, so
//! the machine ends with a bounded polling phase rather than a synchronous
//! completion response.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::core::PlatformLimits;
use crate::domain::{Artifact, Platform, PublishAttempt, PublishError};

use super::{error_from_status, Publisher};

const DEFAULT_CHUNK_SIZE: u64 = 20 * 1024 * 1024;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
const DEFAULT_MAX_POLLS: u32 = 60;
const MAX_CHUNK_RETRIES: u32 = 3;

/// States of the TikTok publish machine.
#[derive(Debug, Clone, PartialEq)]
pub enum TikTokState {
    Init,
    /// Upload slot granted; holds the target until the first chunk goes out.
    InitPublish {
        target: PublishTarget,
    },
    Uploading {
        target: PublishTarget,
        offset: u64,
        retries: u32,
    },
    Polling {
        publish_id: String,
        polls: u32,
    },
    Published {
        post_id: String,
    },
    Failed {
        error: PublishError,
    },
}

impl TikTokState {
    fn label(&self) -> &'static str {
        match self {
            TikTokState::Init => "init",
            TikTokState::InitPublish { .. } => "init_publish",
            TikTokState::Uploading { .. } => "uploading",
            TikTokState::Polling { .. } => "polling",
            TikTokState::Published { .. } => "published",
            TikTokState::Failed { .. } => "failed",
        }
    }
}

/// Upload destination handed back by the init call.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishTarget {
    pub publish_id: String,
    pub upload_url: String,
}

/// Processing status reported by the status-fetch endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum TikTokStatus {
    Published { post_id: String },
    Rejected { reason: String },
    AuditPending,
    Processing,
}

/// Remote calls the TikTok machine makes.
#[async_trait]
pub trait TikTokApi: Send + Sync {
    async fn init_publish(
        &self,
        title: &str,
        video_size: u64,
        chunk_size: u64,
        total_chunks: u64,
    ) -> Result<PublishTarget, PublishError>;

    async fn upload(
        &self,
        upload_url: &str,
        chunk: &[u8],
        offset: u64,
        total_bytes: u64,
    ) -> Result<(), PublishError>;

    async fn fetch_status(&self, publish_id: &str) -> Result<TikTokStatus, PublishError>;
}

/// Drives the TikTok publish state machine over a `TikTokApi`.
pub struct TikTokPublisher<A> {
    api: A,
    limits: PlatformLimits,
    chunk_size: u64,
    poll_interval: Duration,
    max_polls: u32,
}

impl<A: TikTokApi> TikTokPublisher<A> {
    pub fn new(api: A, limits: PlatformLimits) -> Self {
        Self {
            api,
            limits,
            chunk_size: DEFAULT_CHUNK_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    async fn drive(&self, title: &str, bytes: &[u8]) -> TikTokState {
        let total = bytes.len() as u64;
        let total_chunks = total.div_ceil(self.chunk_size);
        let mut state = TikTokState::Init;

        loop {
            debug!(state = state.label(), "TikTok publish step");
            state = match state {
                TikTokState::Init => {
                    match self
                        .api
                        .init_publish(title, total, self.chunk_size, total_chunks)
                        .await
                    {
                        Ok(target) => TikTokState::InitPublish { target },
                        Err(error) => TikTokState::Failed { error },
                    }
                }

                TikTokState::InitPublish { target } => TikTokState::Uploading {
                    target,
                    offset: 0,
                    retries: 0,
                },

                TikTokState::Uploading {
                    target,
                    offset,
                    retries,
                } => {
                    let end = (offset + self.chunk_size).min(total);
                    let chunk = &bytes[offset as usize..end as usize];
                    match self.api.upload(&target.upload_url, chunk, offset, total).await {
                        Ok(()) if end >= total => TikTokState::Polling {
                            publish_id: target.publish_id,
                            polls: 0,
                        },
                        Ok(()) => TikTokState::Uploading {
                            target,
                            offset: end,
                            retries: 0,
                        },
                        Err(error) if error.is_transient() && retries < MAX_CHUNK_RETRIES => {
                            warn!(offset, retries = retries + 1, %error, "Chunk retry");
                            TikTokState::Uploading {
                                target,
                                offset,
                                retries: retries + 1,
                            }
                        }
                        Err(error) if error.is_transient() => TikTokState::Failed {
                            error: PublishError::Timeout,
                        },
                        Err(error) => TikTokState::Failed { error },
                    }
                }

                TikTokState::Polling { publish_id, polls } => {
                    match self.api.fetch_status(&publish_id).await {
                        Ok(TikTokStatus::Published { post_id }) => {
                            TikTokState::Published { post_id }
                        }
                        Ok(TikTokStatus::Rejected { reason }) => TikTokState::Failed {
                            error: PublishError::Rejected(reason),
                        },
                        Ok(TikTokStatus::AuditPending) => TikTokState::Failed {
                            error: PublishError::AuditPending,
                        },
                        Ok(TikTokStatus::Processing) if polls + 1 >= self.max_polls => {
                            TikTokState::Failed {
                                error: PublishError::Timeout,
                            }
                        }
                        Ok(TikTokStatus::Processing) => {
                            tokio::time::sleep(self.poll_interval).await;
                            TikTokState::Polling {
                                publish_id,
                                polls: polls + 1,
                            }
                        }
                        // Flaky status checks consume the same poll budget
                        Err(error) if error.is_transient() && polls + 1 < self.max_polls => {
                            tokio::time::sleep(self.poll_interval).await;
                            TikTokState::Polling {
                                publish_id,
                                polls: polls + 1,
                            }
                        }
                        Err(error) if error.is_transient() => TikTokState::Failed {
                            error: PublishError::Timeout,
                        },
                        Err(error) => TikTokState::Failed { error },
                    }
                }

                terminal @ (TikTokState::Published { .. } | TikTokState::Failed { .. }) => {
                    return terminal;
                }
            };
        }
    }
}

#[async_trait]
impl<A: TikTokApi> Publisher for TikTokPublisher<A> {
    fn platform(&self) -> Platform {
        Platform::TikTok
    }

    #[instrument(skip(self, artifact), fields(video = %artifact.video_path.display()))]
    async fn publish(&self, artifact: &Artifact) -> PublishAttempt {
        // Validate locally before spending a remote publish slot
        if let Err(e) = artifact.validate(&self.limits) {
            warn!(%e, "Artifact rejected before upload");
            return PublishAttempt::failed(
                Platform::TikTok,
                PublishError::LocalValidation(e.to_string()),
            );
        }

        let bytes = match tokio::fs::read(&artifact.video_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return PublishAttempt::failed(
                    Platform::TikTok,
                    PublishError::Protocol(format!("unreadable video file: {e}")),
                );
            }
        };

        match self.drive(&artifact.metadata.title, &bytes).await {
            TikTokState::Published { post_id } => {
                info!(post_id, "TikTok publish complete");
                PublishAttempt::published(Platform::TikTok, post_id)
            }
            TikTokState::Failed { error } => {
                warn!(%error, "TikTok publish failed");
                PublishAttempt::failed(Platform::TikTok, error)
            }
            other => PublishAttempt::failed(
                Platform::TikTok,
                PublishError::Protocol(format!("publish halted in state {}", other.label())),
            ),
        }
    }
}

const INIT_ENDPOINT: &str = "https://open.tiktokapis.com/v2/post/publish/video/init/";
const STATUS_ENDPOINT: &str = "https://open.tiktokapis.com/v2/post/publish/status/fetch/";

/// Real TikTok Content Posting API client backing `TikTokApi`.
pub struct HttpTikTokApi {
    http: reqwest::Client,
    access_token: String,
}

#[derive(Serialize)]
struct InitRequest<'a> {
    post_info: PostInfo<'a>,
    source_info: SourceInfo,
}

#[derive(Serialize)]
struct PostInfo<'a> {
    title: &'a str,
    privacy_level: &'a str,
    video_cover_timestamp_ms: u64,
}

#[derive(Serialize)]
struct SourceInfo {
    source: &'static str,
    video_size: u64,
    chunk_size: u64,
    total_chunk_count: u64,
}

#[derive(Deserialize)]
struct InitResponse {
    data: InitData,
}

#[derive(Deserialize)]
struct InitData {
    publish_id: String,
    upload_url: String,
}

#[derive(Serialize)]
struct StatusRequest<'a> {
    publish_id: &'a str,
}

#[derive(Deserialize)]
struct StatusResponse {
    data: StatusData,
}

#[derive(Deserialize)]
struct StatusData {
    status: String,
    #[serde(default)]
    fail_reason: Option<String>,
    #[serde(default)]
    publicaly_available_post_id: Vec<u64>,
}

impl HttpTikTokApi {
    pub fn new(access_token: String, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .context("building tiktok http client")?,
            access_token,
        })
    }
}

#[async_trait]
impl TikTokApi for HttpTikTokApi {
    async fn init_publish(
        &self,
        title: &str,
        video_size: u64,
        chunk_size: u64,
        total_chunks: u64,
    ) -> Result<PublishTarget, PublishError> {
        let req = InitRequest {
            post_info: PostInfo {
                title,
                privacy_level: "PUBLIC_TO_EVERYONE",
                video_cover_timestamp_ms: 1000,
            },
            source_info: SourceInfo {
                source: "FILE_UPLOAD",
                video_size,
                chunk_size,
                total_chunk_count: total_chunks,
            },
        };

        let resp = self
            .http
            .post(INIT_ENDPOINT)
            .bearer_auth(&self.access_token)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(error_from_status(status.as_u16(), &body));
        }

        let parsed: InitResponse = resp
            .json()
            .await
            .map_err(|e| PublishError::Protocol(e.to_string()))?;
        Ok(PublishTarget {
            publish_id: parsed.data.publish_id,
            upload_url: parsed.data.upload_url,
        })
    }

    async fn upload(
        &self,
        upload_url: &str,
        chunk: &[u8],
        offset: u64,
        total_bytes: u64,
    ) -> Result<(), PublishError> {
        let last = offset + chunk.len() as u64 - 1;
        let resp = self
            .http
            .put(upload_url)
            .header("Content-Type", "video/mp4")
            .header("Content-Range", format!("bytes {offset}-{last}/{total_bytes}"))
            .body(chunk.to_vec())
            .send()
            .await?;

        let status = resp.status();
        // 206 acknowledges a partial chunk, 201 the final one
        if status.is_success() || status.as_u16() == 206 {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(error_from_status(status.as_u16(), &body))
    }

    async fn fetch_status(&self, publish_id: &str) -> Result<TikTokStatus, PublishError> {
        let resp = self
            .http
            .post(STATUS_ENDPOINT)
            .bearer_auth(&self.access_token)
            .json(&StatusRequest { publish_id })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(error_from_status(status.as_u16(), &body));
        }

        let parsed: StatusResponse = resp
            .json()
            .await
            .map_err(|e| PublishError::Protocol(e.to_string()))?;

        Ok(match parsed.data.status.as_str() {
            "PUBLISH_COMPLETE" => {
                let post_id = parsed
                    .data
                    .publicaly_available_post_id
                    .first()
                    .map(u64::to_string)
                    .unwrap_or_else(|| publish_id.to_string());
                TikTokStatus::Published { post_id }
            }
            "FAILED" => TikTokStatus::Rejected {
                reason: parsed
                    .data
                    .fail_reason
                    .unwrap_or_else(|| "unspecified".to_string()),
            },
            "UNDER_REVIEW" | "UNDER_AUDIT" => TikTokStatus::AuditPending,
            _ => TikTokStatus::Processing,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use crate::domain::Metadata;

    use super::*;

    struct FakeApi {
        init_error: Mutex<Option<PublishError>>,
        upload_failures: AtomicU32,
        statuses: Mutex<Vec<TikTokStatus>>,
        uploaded_offsets: Mutex<Vec<u64>>,
    }

    impl FakeApi {
        fn with_statuses(statuses: Vec<TikTokStatus>) -> Self {
            Self {
                init_error: Mutex::new(None),
                upload_failures: AtomicU32::new(0),
                statuses: Mutex::new(statuses),
                uploaded_offsets: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TikTokApi for FakeApi {
        async fn init_publish(
            &self,
            _title: &str,
            _video_size: u64,
            _chunk_size: u64,
            _total_chunks: u64,
        ) -> Result<PublishTarget, PublishError> {
            if let Some(error) = self.init_error.lock().unwrap().take() {
                return Err(error);
            }
            Ok(PublishTarget {
                publish_id: "pub-1".into(),
                upload_url: "https://upload.example/slot".into(),
            })
        }

        async fn upload(
            &self,
            _upload_url: &str,
            _chunk: &[u8],
            offset: u64,
            _total_bytes: u64,
        ) -> Result<(), PublishError> {
            if self.upload_failures.load(Ordering::SeqCst) > 0 {
                self.upload_failures.fetch_sub(1, Ordering::SeqCst);
                return Err(PublishError::Timeout);
            }
            self.uploaded_offsets.lock().unwrap().push(offset);
            Ok(())
        }

        async fn fetch_status(&self, _publish_id: &str) -> Result<TikTokStatus, PublishError> {
            let mut statuses = self.statuses.lock().unwrap();
            if statuses.is_empty() {
                Ok(TikTokStatus::Processing)
            } else {
                Ok(statuses.remove(0))
            }
        }
    }

    fn publisher(api: FakeApi) -> TikTokPublisher<FakeApi> {
        TikTokPublisher::new(api, PlatformLimits::default())
            .with_chunk_size(4)
            .with_polling(Duration::from_millis(1), 5)
    }

    fn artifact(duration_secs: f64, size_bytes: u64) -> Artifact {
        Artifact {
            script: "s".into(),
            audio_path: PathBuf::from("/tmp/a.wav"),
            visuals: vec![],
            video_path: PathBuf::from("/tmp/v.mp4"),
            duration_secs,
            size_bytes,
            metadata: Metadata {
                title: "Title".into(),
                description: "Desc".into(),
                tags: vec![],
            },
        }
    }

    #[tokio::test]
    async fn test_publish_completes_after_chunked_upload_and_poll() {
        let p = publisher(FakeApi::with_statuses(vec![
            TikTokStatus::Processing,
            TikTokStatus::Published {
                post_id: "777".into(),
            },
        ]));
        let state = p.drive("Title", &[0u8; 10]).await;

        assert_eq!(
            state,
            TikTokState::Published {
                post_id: "777".into()
            }
        );
        let offsets = p.api.uploaded_offsets.lock().unwrap().clone();
        assert_eq!(offsets, vec![0, 4, 8]);
    }

    #[tokio::test]
    async fn test_init_rejection_is_terminal_before_any_upload() {
        let api = FakeApi::with_statuses(vec![]);
        *api.init_error.lock().unwrap() = Some(PublishError::QuotaExceeded);
        let p = publisher(api);
        let state = p.drive("Title", &[0u8; 4]).await;

        assert_eq!(
            state,
            TikTokState::Failed {
                error: PublishError::QuotaExceeded
            }
        );
        assert!(p.api.uploaded_offsets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_polling_budget_exhaustion_is_timeout() {
        let p = publisher(FakeApi::with_statuses(vec![]));
        let state = p.drive("Title", &[0u8; 4]).await;
        assert_eq!(
            state,
            TikTokState::Failed {
                error: PublishError::Timeout
            }
        );
    }

    #[tokio::test]
    async fn test_rejection_reason_is_preserved() {
        let p = publisher(FakeApi::with_statuses(vec![TikTokStatus::Rejected {
            reason: "content policy".into(),
        }]));
        let state = p.drive("Title", &[0u8; 4]).await;
        assert_eq!(
            state,
            TikTokState::Failed {
                error: PublishError::Rejected("content policy".into())
            }
        );
    }

    #[tokio::test]
    async fn test_audit_pending_is_terminal_failure() {
        let p = publisher(FakeApi::with_statuses(vec![TikTokStatus::AuditPending]));
        let state = p.drive("Title", &[0u8; 4]).await;
        assert_eq!(
            state,
            TikTokState::Failed {
                error: PublishError::AuditPending
            }
        );
    }

    #[tokio::test]
    async fn test_oversized_artifact_never_reaches_the_api() {
        let p = publisher(FakeApi::with_statuses(vec![]));
        let attempt = p.publish(&artifact(30.0, 51 * 1024 * 1024)).await;

        assert!(!attempt.is_published());
        assert!(matches!(
            attempt.error,
            Some(PublishError::LocalValidation(_))
        ));
        assert!(p.api.uploaded_offsets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transient_upload_failures_retry_then_succeed() {
        let api = FakeApi::with_statuses(vec![TikTokStatus::Published {
            post_id: "9".into(),
        }]);
        api.upload_failures.store(2, Ordering::SeqCst);
        let p = publisher(api);
        let state = p.drive("Title", &[0u8; 4]).await;
        assert!(matches!(state, TikTokState::Published { .. }));
    }
}
