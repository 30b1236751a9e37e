use super::*;
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use std::collections::BTreeMap;

/// Wire shape of a stored message.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct MessageView {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    pub is_bot: &'static str,
    pub created_at: String,
}

impl From<StoredMessage> for MessageView {
    fn from(m: StoredMessage) -> Self {
        MessageView {
            id: m.id,
            user_id: m.user_id,
            content: m.content,
            is_bot: if m.is_bot { "true" } else { "false" },
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct Conversation {
    pub date: String,
    pub messages: Vec<MessageView>,
}

fn local_date(created_at: &str, tz: Tz) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(created_at)
        .ok()
        .map(|dt| dt.with_timezone(&tz).date_naive())
}

fn date_label(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "Today".to_string()
    } else if today.pred_opt() == Some(date) {
        "Yesterday".to_string()
    } else {
        date.format("%-m/%-d/%Y").to_string()
    }
}

/// Group ascending messages by local calendar date, newest date first.
///
/// Rows with an unparseable timestamp are filed under `today`.
pub(super) fn group_by_date(
    messages: Vec<StoredMessage>,
    tz: Tz,
    today: NaiveDate,
) -> Vec<Conversation> {
    let mut by_date: BTreeMap<NaiveDate, Vec<MessageView>> = BTreeMap::new();
    for message in messages {
        let date = local_date(&message.created_at, tz).unwrap_or(today);
        by_date.entry(date).or_default().push(message.into());
    }
    by_date
        .into_iter()
        .rev()
        .map(|(date, messages)| Conversation {
            date: date_label(date, today),
            messages,
        })
        .collect()
}

pub(super) async fn api_get_messages(
    headers: HeaderMap,
    State(state): State<WebState>,
) -> Result<Json<Vec<MessageView>>, ApiError> {
    let user_id = require_user(&state, &headers).await?;
    let messages = call_blocking(state.app_state.db.clone(), move |db| {
        db.get_messages_for_user(user_id)
    })
    .await?;
    Ok(Json(messages.into_iter().map(MessageView::from).collect()))
}

pub(super) async fn api_get_conversations(
    headers: HeaderMap,
    State(state): State<WebState>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let user_id = require_user(&state, &headers).await?;
    let messages = call_blocking(state.app_state.db.clone(), move |db| {
        db.get_messages_for_user(user_id)
    })
    .await
    .map_err(|e| ApiError::internal("Failed to fetch conversation history", e))?;
    let tz = state.app_state.config.tz();
    let today = chrono::Utc::now().with_timezone(&tz).date_naive();
    Ok(Json(group_by_date(messages, tz, today)))
}

pub(super) async fn api_post_message(
    headers: HeaderMap,
    State(state): State<WebState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = require_user(&state, &headers).await?;
    let content = body
        .ok()
        .and_then(|Json(v)| v.get("content").and_then(|c| c.as_str()).map(str::to_string))
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Message content is required"))?;

    let user_content = content.clone();
    call_blocking(state.app_state.db.clone(), move |db| {
        db.store_message(user_id, &user_content, false)
    })
    .await
    .map_err(|e| ApiError::internal("Failed to process message", e))?;

    let companion = &state.app_state.companion;
    let (reply, triage) = if state.app_state.config.triage_enabled {
        let (reply, distress, resources) = tokio::join!(
            companion.reply(&content),
            companion.classify_distress(&content),
            companion.recommend_resources(&content)
        );
        if distress.distress_level == DistressLevel::High {
            warn!(
                user_id,
                confidence = distress.confidence,
                "High distress detected in user message"
            );
        }
        let triage = json!({
            "distressLevel": distress.distress_level,
            "confidence": distress.confidence,
            "resources": resources,
        });
        (reply, Some(triage))
    } else {
        (companion.reply(&content).await, None)
    };

    let bot_message = call_blocking(state.app_state.db.clone(), move |db| {
        db.store_message(user_id, &reply, true)
    })
    .await
    .map_err(|e| ApiError::internal("Failed to process message", e))?;

    let mut response = json!({
        "message": "Message sent successfully",
        "response": MessageView::from(bot_message),
    });
    if let Some(triage) = triage {
        response["triage"] = triage;
    }
    Ok(Json(response))
}
