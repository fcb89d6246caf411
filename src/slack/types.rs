use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::reports::ReportOption;

// Interactive message payload (partial)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InteractionPayload {
    #[serde(default)]
    pub actions: Vec<InteractionAction>,
    pub response_url: Option<String>,
    /// Legacy verification token
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub callback_id: Option<String>,
    #[serde(default)]
    pub user: Option<SlackUser>,
    #[serde(default)]
    pub channel: Option<SlackChannel>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InteractionAction {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub selected_options: Vec<SelectedOption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectedOption {
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackUser {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackChannel {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Message posted back to an interaction's `response_url`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    #[serde(skip)]
    pub response_url: String,
    pub replace_original: bool,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mrkdwn: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mrkdwn_in: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

/// Synchronous HTTP response to an interaction or slash command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImmediateResponse {
    pub response_type: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mrkdwn: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mrkdwn_in: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Attachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<AttachmentAction>,
}

/// Interactive `select` menu inside a legacy attachment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachmentAction {
    pub name: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub options: Vec<ReportOption>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_path: PathBuf,
    pub file_tmp_name: String,
    /// Title shown in Slack
    pub file_name: String,
    pub file_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedFile {
    pub file: UploadedFileInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedFileInfo {
    #[serde(default)]
    pub id: Option<String>,
    pub url_private: String,
    #[serde(default)]
    pub permalink: Option<String>,
}

// Slash command form body (partial)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlashCommand {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub response_url: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
}
