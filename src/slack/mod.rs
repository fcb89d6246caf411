pub mod client;
pub mod messages;
pub mod types;

pub use client::{SlackClient, SlackError};
pub use types::{
    Attachment, ChatMessage, FileUpload, ImmediateResponse, InteractionPayload, SlashCommand,
    UploadedFile, UploadedFileInfo,
};

use anyhow::Result;
use async_trait::async_trait;

/// Outbound calls to the chat platform.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn post_message(&self, message: &ChatMessage) -> Result<()>;

    async fn upload_file(&self, upload: &FileUpload) -> Result<UploadedFile>;
}
