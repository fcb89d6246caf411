//! User-facing message texts.

use crate::reports::ReportOption;
use crate::slack::types::{Attachment, AttachmentAction, ChatMessage, ImmediateResponse};

pub const REPORT_SELECTION_CALLBACK: &str = "report_selection";

const READY_COLOR: &str = "#2c963f";
const READY_FOOTER: &str = "Click report link to open menu with download option";

fn in_channel(text: String, mrkdwn: bool) -> ImmediateResponse {
    ImmediateResponse {
        response_type: "in_channel".to_string(),
        text,
        mrkdwn: mrkdwn.then_some(true),
        mrkdwn_in: if mrkdwn { vec!["text".to_string()] } else { Vec::new() },
        attachments: Vec::new(),
    }
}

fn markdown_message(response_url: &str, text: String) -> ChatMessage {
    ChatMessage {
        response_url: response_url.to_string(),
        replace_original: false,
        text,
        mrkdwn: Some(true),
        mrkdwn_in: vec!["text".to_string()],
        attachments: Vec::new(),
    }
}

pub fn not_available() -> ImmediateResponse {
    in_channel(
        "Hmmm :thinking_face: Seems like that report is not available.".to_string(),
        false,
    )
}

pub fn generating(report_name: &str) -> ImmediateResponse {
    in_channel(
        format!(
            "Got it :thumbsup: Generating requested report *{}*\nPlease carry on, I'll notify you when I'm done.",
            report_name
        ),
        true,
    )
}

pub fn no_data(response_url: &str, report_name: &str) -> ChatMessage {
    markdown_message(
        response_url,
        format!("There's currently no data for report *{}*", report_name),
    )
}

pub fn failure(response_url: &str, report_name: &str) -> ChatMessage {
    markdown_message(
        response_url,
        format!(
            "Well this is embarrassing :sweat: I couldn't successfully get the report *{}*. Please try again later as I look into what went wrong.",
            report_name
        ),
    )
}

pub fn report_ready(response_url: &str, report_name: &str, url_private: &str) -> ChatMessage {
    ChatMessage {
        response_url: response_url.to_string(),
        replace_original: false,
        text: "Your report is ready!".to_string(),
        mrkdwn: None,
        mrkdwn_in: Vec::new(),
        attachments: vec![Attachment {
            text: Some(format!("<{}|{}>", url_private, report_name)),
            color: Some(READY_COLOR.to_string()),
            footer: Some(READY_FOOTER.to_string()),
            ..Default::default()
        }],
    }
}

/// Selection prompt offering every registered report.
pub fn report_menu(options: Vec<ReportOption>) -> ImmediateResponse {
    if options.is_empty() {
        return in_channel("There are no reports configured yet.".to_string(), false);
    }

    let mut response = in_channel("Which report would you like?".to_string(), false);
    response.attachments.push(Attachment {
        fallback: Some("Upgrade your Slack client to pick a report".to_string()),
        callback_id: Some(REPORT_SELECTION_CALLBACK.to_string()),
        actions: vec![AttachmentAction {
            name: "report".to_string(),
            text: "Select a report".to_string(),
            kind: "select".to_string(),
            options,
        }],
        ..Default::default()
    });
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generating_response_shape() {
        let json = serde_json::to_value(generating("User Activity")).unwrap();
        assert_eq!(
            json,
            json!({
                "response_type": "in_channel",
                "text": "Got it :thumbsup: Generating requested report *User Activity*\nPlease carry on, I'll notify you when I'm done.",
                "mrkdwn": true,
                "mrkdwn_in": ["text"],
            })
        );
    }

    #[test]
    fn test_not_available_has_no_markdown_fields() {
        let json = serde_json::to_value(not_available()).unwrap();
        assert_eq!(
            json,
            json!({
                "response_type": "in_channel",
                "text": "Hmmm :thinking_face: Seems like that report is not available.",
            })
        );
    }

    #[test]
    fn test_ready_message_links_private_url() {
        let msg = report_ready(
            "https://hooks.slack.test/r/1",
            "User Activity",
            "https://files.slack.test/F1/report.csv",
        );
        assert_eq!(msg.response_url, "https://hooks.slack.test/r/1");

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            json!({
                "replace_original": false,
                "text": "Your report is ready!",
                "attachments": [{
                    "text": "<https://files.slack.test/F1/report.csv|User Activity>",
                    "color": "#2c963f",
                    "footer": "Click report link to open menu with download option",
                }],
            })
        );
    }

    #[test]
    fn test_no_data_and_failure_mention_report() {
        let empty = no_data("u", "User Activity");
        assert!(empty.text.contains("no data for report *User Activity*"));
        assert_eq!(empty.mrkdwn, Some(true));

        let failed = failure("u", "User Activity");
        assert!(failed.text.starts_with("Well this is embarrassing"));
        assert!(failed.text.contains("*User Activity*"));
        assert!(!failed.replace_original);
    }

    #[test]
    fn test_report_menu_lists_options() {
        let menu = report_menu(vec![ReportOption {
            label: "User Activity".into(),
            key: "userActivity".into(),
        }]);
        let json = serde_json::to_value(&menu).unwrap();
        let action = &json["attachments"][0]["actions"][0];
        assert_eq!(json["attachments"][0]["callback_id"], REPORT_SELECTION_CALLBACK);
        assert_eq!(action["type"], "select");
        assert_eq!(action["options"], json!([{"text": "User Activity", "value": "userActivity"}]));

        assert!(report_menu(vec![]).attachments.is_empty());
    }
}
