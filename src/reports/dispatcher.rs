use crate::config::ReportsConfig;
use crate::reports::poller;
use crate::reports::registry::ReportDescriptor;
use crate::reports::target::ReportTarget;
use crate::slack::{messages, ChatApi, ChatMessage, FileUpload, UploadedFile};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Report generation failed: {0:#}")]
    Generation(anyhow::Error),

    #[error("Report upload failed: {0:#}")]
    Upload(anyhow::Error),
}

/// How a dispatch ended. Each outcome maps to exactly one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered { url: String },
    Empty,
    Failed,
}

/// One report request, ready to run.
#[derive(Debug, Clone)]
pub struct DispatchJob {
    pub id: Uuid,
    pub descriptor: Arc<ReportDescriptor>,
    pub target: ReportTarget,
    pub response_url: String,
}

impl DispatchJob {
    pub fn new(
        descriptor: Arc<ReportDescriptor>,
        target: ReportTarget,
        response_url: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            descriptor,
            target,
            response_url,
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    chat: Arc<dyn ChatApi>,
    settle_delay: Duration,
    upload_delay: Duration,
}

impl Dispatcher {
    pub fn new(chat: Arc<dyn ChatApi>, settle_delay: Duration, upload_delay: Duration) -> Self {
        Self {
            chat,
            settle_delay,
            upload_delay,
        }
    }

    pub fn from_config(chat: Arc<dyn ChatApi>, config: &ReportsConfig) -> Self {
        Self::new(chat, config.settle_delay(), config.upload_delay())
    }

    /// Launch the dispatch on the runtime without waiting for it.
    pub fn spawn(&self, job: DispatchJob) -> JoinHandle<DispatchOutcome> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.dispatch(job).await })
    }

    /// Run one report request to completion and notify the requester.
    /// Never fails: every error ends in a user-facing message.
    pub async fn dispatch(&self, job: DispatchJob) -> DispatchOutcome {
        let span = info_span!("dispatch", id = %job.id, report = %job.descriptor.key);
        let response_url = job.response_url.clone();
        let name = job.descriptor.display_name.clone();

        // A panicking generator or chat client must still produce an answer
        let dispatcher = self.clone();
        let attempt = async move { dispatcher.deliver(job).await }.instrument(span.clone());
        match tokio::spawn(attempt).await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                async {
                    error!("Dispatch of report {} aborted: {}", name, join_err);
                    self.notify(&messages::failure(&response_url, &name)).await;
                }
                .instrument(span)
                .await;
                DispatchOutcome::Failed
            }
        }
    }

    async fn deliver(&self, job: DispatchJob) -> DispatchOutcome {
        let name = job.descriptor.display_name.as_str();

        let (outcome, message) = match self.run(&job).await {
            Ok(Some(uploaded)) => {
                info!("Report {} delivered as {}", name, job.target.tmp_name);
                let url = uploaded.file.url_private;
                let message = messages::report_ready(&job.response_url, name, &url);
                (DispatchOutcome::Delivered { url }, message)
            }
            Ok(None) => {
                info!("No data for report {} ({})", name, job.target.path.display());
                (
                    DispatchOutcome::Empty,
                    messages::no_data(&job.response_url, name),
                )
            }
            Err(e) => {
                error!("Dispatch of report {} failed: {}", name, e);
                (
                    DispatchOutcome::Failed,
                    messages::failure(&job.response_url, name),
                )
            }
        };

        self.notify(&message).await;
        outcome
    }

    /// Generate, wait, check and upload. `Ok(None)` means no file appeared.
    async fn run(&self, job: &DispatchJob) -> Result<Option<UploadedFile>, DispatchError> {
        let descriptor = &job.descriptor;

        descriptor
            .generator
            .generate(&job.target)
            .await
            .map_err(DispatchError::Generation)?;

        // The generator may return before its write is visible
        tokio::time::sleep(self.settle_delay).await;
        if !poller::exists(&job.target.path).await {
            return Ok(None);
        }

        tokio::time::sleep(self.upload_delay).await;
        let upload = FileUpload {
            file_path: job.target.path.clone(),
            file_tmp_name: job.target.tmp_name.clone(),
            file_name: descriptor.display_name.clone(),
            file_type: descriptor.file_type.clone(),
        };
        let uploaded = self
            .chat
            .upload_file(&upload)
            .await
            .map_err(DispatchError::Upload)?;

        Ok(Some(uploaded))
    }

    async fn notify(&self, message: &ChatMessage) {
        if let Err(e) = self.chat.post_message(message).await {
            warn!("Failed to deliver report notification: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::generator::ReportGenerator;
    use crate::slack::{MockChatApi, UploadedFileInfo};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// Writes `content` to the target, or nothing when `None`.
    struct FileGenerator {
        content: Option<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReportGenerator for FileGenerator {
        async fn generate(&self, target: &ReportTarget) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(content) = self.content {
                tokio::fs::write(&target.path, content).await?;
            }
            Ok(())
        }
    }

    struct FailingGenerator;

    struct PanickingGenerator;

    #[async_trait]
    impl ReportGenerator for PanickingGenerator {
        async fn generate(&self, target: &ReportTarget) -> anyhow::Result<()> {
            panic!("report backend crashed writing {}", target.tmp_name);
        }
    }

    #[async_trait]
    impl ReportGenerator for FailingGenerator {
        async fn generate(&self, _target: &ReportTarget) -> anyhow::Result<()> {
            anyhow::bail!("connection refused")
        }
    }

    fn job(generator: Arc<dyn ReportGenerator>, dir: &Path) -> DispatchJob {
        let descriptor = Arc::new(ReportDescriptor::new(
            "userActivity",
            "User Activity",
            "userActivity",
            "csv",
            generator,
        ));
        let target = descriptor.target_in(dir);
        DispatchJob::new(descriptor, target, "https://hooks.slack.test/actions/1".to_string())
    }

    fn dispatcher(chat: MockChatApi) -> Dispatcher {
        Dispatcher::new(Arc::new(chat), Duration::from_millis(5), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_missing_file_sends_no_data_once() {
        let dir = tempdir().unwrap();
        let mut chat = MockChatApi::new();
        chat.expect_upload_file().never();
        chat.expect_post_message()
            .withf(|m| m.text.contains("no data for report *User Activity*"))
            .times(1)
            .returning(|_| Ok(()));

        let generator = Arc::new(FileGenerator { content: None, calls: AtomicUsize::new(0) });
        let outcome = dispatcher(chat).dispatch(job(generator.clone(), dir.path())).await;

        assert_eq!(outcome, DispatchOutcome::Empty);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_written_file_is_uploaded_then_linked() {
        let dir = tempdir().unwrap();
        let job = job(
            Arc::new(FileGenerator { content: Some("id\n1\n"), calls: AtomicUsize::new(0) }),
            dir.path(),
        );
        let expected_path = job.target.path.clone();
        let expected_name = job.target.tmp_name.clone();

        let mut seq = mockall::Sequence::new();
        let mut chat = MockChatApi::new();
        chat.expect_upload_file()
            .withf(move |u| {
                u.file_path == expected_path
                    && u.file_tmp_name == expected_name
                    && u.file_name == "User Activity"
                    && u.file_type == "csv"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(UploadedFile {
                    file: UploadedFileInfo {
                        id: Some("F1".into()),
                        url_private: "https://files.slack.test/F1".into(),
                        permalink: None,
                    },
                })
            });
        chat.expect_post_message()
            .withf(|m| {
                m.text == "Your report is ready!"
                    && m.attachments[0].text.as_deref()
                        == Some("<https://files.slack.test/F1|User Activity>")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let outcome = dispatcher(chat).dispatch(job).await;
        assert_eq!(
            outcome,
            DispatchOutcome::Delivered { url: "https://files.slack.test/F1".into() }
        );
    }

    #[tokio::test]
    async fn test_generator_error_sends_apology_without_upload() {
        let dir = tempdir().unwrap();
        let mut chat = MockChatApi::new();
        chat.expect_upload_file().never();
        chat.expect_post_message()
            .withf(|m| {
                m.text.starts_with("Well this is embarrassing")
                    && !m.text.contains("connection refused")
            })
            .times(1)
            .returning(|_| Ok(()));

        let outcome = dispatcher(chat).dispatch(job(Arc::new(FailingGenerator), dir.path())).await;
        assert_eq!(outcome, DispatchOutcome::Failed);
    }

    #[tokio::test]
    async fn test_generator_panic_still_sends_apology() {
        let dir = tempdir().unwrap();
        let mut chat = MockChatApi::new();
        chat.expect_upload_file().never();
        chat.expect_post_message()
            .withf(|m| {
                m.text.starts_with("Well this is embarrassing")
                    && m.response_url == "https://hooks.slack.test/actions/1"
            })
            .times(1)
            .returning(|_| Ok(()));

        let handle = dispatcher(chat).spawn(job(Arc::new(PanickingGenerator), dir.path()));
        assert_eq!(handle.await.unwrap(), DispatchOutcome::Failed);
    }

    #[tokio::test]
    async fn test_upload_error_sends_apology() {
        let dir = tempdir().unwrap();
        let mut chat = MockChatApi::new();
        chat.expect_upload_file()
            .times(1)
            .returning(|_| {
                Err(anyhow::anyhow!(
                    "Slack files.getUploadURLExternal failed: not_authed"
                ))
            });
        chat.expect_post_message()
            .withf(|m| m.text.starts_with("Well this is embarrassing"))
            .times(1)
            .returning(|_| Ok(()));

        let generator = Arc::new(FileGenerator { content: Some("x"), calls: AtomicUsize::new(0) });
        let outcome = dispatcher(chat).dispatch(job(generator, dir.path())).await;
        assert_eq!(outcome, DispatchOutcome::Failed);
    }

    #[tokio::test]
    async fn test_notification_failure_is_swallowed() {
        let dir = tempdir().unwrap();
        let mut chat = MockChatApi::new();
        chat.expect_post_message()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("response_url expired")));

        let generator = Arc::new(FileGenerator { content: None, calls: AtomicUsize::new(0) });
        let outcome = dispatcher(chat).dispatch(job(generator, dir.path())).await;
        assert_eq!(outcome, DispatchOutcome::Empty);
    }

    #[tokio::test]
    async fn test_spawned_dispatch_completes() {
        let dir = tempdir().unwrap();
        let mut chat = MockChatApi::new();
        chat.expect_post_message().times(1).returning(|_| Ok(()));

        let generator = Arc::new(FileGenerator { content: None, calls: AtomicUsize::new(0) });
        let handle = dispatcher(chat).spawn(job(generator, dir.path()));
        assert_eq!(handle.await.unwrap(), DispatchOutcome::Empty);
    }
}
