//! Bot Framework activity payloads: the inbound activity and the outbound messages sent in reply.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Content type of an adaptive card attachment.
pub const ADAPTIVE_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.adaptive";

/// One inbound activity as delivered by the channel service. Unknown fields are kept in `extra`
/// so the raw activity can be echoed back verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type", default)]
    pub typ: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub from: ChannelAccount,
    #[serde(default)]
    pub conversation: ConversationAccount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Structured payload of an adaptive card submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<Entity>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationAccount {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Activity entity; only `mention` entities are interpreted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type", default)]
    pub typ: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentioned: Option<ChannelAccount>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Activity {
    /// A plain text message activity (used by local tools and tests).
    pub fn message(conversation_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            typ: "message".to_string(),
            id: Some(uuid::Uuid::new_v4().to_string()),
            conversation: ConversationAccount {
                id: conversation_id.into(),
                extra: Map::new(),
            },
            from: ChannelAccount {
                id: "user".to_string(),
                name: Some("User".to_string()),
            },
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn is_message(&self) -> bool {
        self.typ.eq_ignore_ascii_case("message")
    }

    /// The `action` tag of a card submission payload, if any.
    pub fn action(&self) -> Option<&str> {
        self.value
            .as_ref()
            .and_then(|v| v.get("action"))
            .and_then(|a| a.as_str())
    }

    /// Message text with `<at>…</at>` mention markup removed and surrounding whitespace trimmed.
    pub fn strip_mentions_text(&self) -> String {
        let mut text = self.text.clone().unwrap_or_default();
        for entity in self.entities.iter().filter(|e| e.typ == "mention") {
            if let Some(m) = entity.text.as_deref().filter(|m| !m.is_empty()) {
                text = text.replace(m, "");
            }
        }
        strip_at_tags(&text).trim().to_string()
    }
}

/// Remove every `<at>…</at>` span. An unterminated `<at>` is left as-is.
fn strip_at_tags(text: &str) -> String {
    const OPEN: &str = "<at>";
    const CLOSE: &str = "</at>";
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(OPEN) {
        match rest[start..].find(CLOSE) {
            Some(end) => {
                out.push_str(&rest[..start]);
                rest = &rest[start + end + CLOSE.len()..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

/// Card (or other rich content) attached to an outbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub content_type: String,
    pub content: Value,
}

/// What the bot sends back: plain text, or a message carrying attachments.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Text(String),
    Attachments(Vec<Attachment>),
}

impl OutboundMessage {
    pub fn adaptive_card(card: Value) -> Self {
        OutboundMessage::Attachments(vec![Attachment {
            content_type: ADAPTIVE_CARD_CONTENT_TYPE.to_string(),
            content: card,
        }])
    }

    /// Text of a plain message; None for attachment messages.
    pub fn text(&self) -> Option<&str> {
        match self {
            OutboundMessage::Text(t) => Some(t),
            OutboundMessage::Attachments(_) => None,
        }
    }

    /// Build the reply activity for `to`: addressed to its conversation, from its recipient to its sender.
    pub fn to_reply_activity(&self, to: &Activity) -> Value {
        let mut reply = json!({
            "type": "message",
            "conversation": { "id": to.conversation.id },
            "recipient": to.from,
        });
        if let Some(ref id) = to.id {
            reply["replyToId"] = Value::String(id.clone());
        }
        if let Some(ref bot) = to.recipient {
            reply["from"] = json!(bot);
        }
        if let Some(ref channel) = to.channel_id {
            reply["channelId"] = Value::String(channel.clone());
        }
        match self {
            OutboundMessage::Text(t) => {
                reply["text"] = Value::String(t.clone());
            }
            OutboundMessage::Attachments(a) => {
                reply["attachments"] = json!(a);
            }
        }
        reply
    }
}

impl From<&str> for OutboundMessage {
    fn from(s: &str) -> Self {
        OutboundMessage::Text(s.to_string())
    }
}

impl From<String> for OutboundMessage {
    fn from(s: String) -> Self {
        OutboundMessage::Text(s)
    }
}
