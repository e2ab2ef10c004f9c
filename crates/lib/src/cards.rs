//! Knowledge-base suggestion card.

use crate::activity::OutboundMessage;
use crate::backend::KbResult;
use crate::context::TurnContext;
use crate::error::BotError;
use serde_json::{json, Value};

/// Action tag carried by the card's submit button.
pub const SELECT_ARTICLE_ACTION: &str = "select_article";

const CARD_SCHEMA: &str = "http://adaptivecards.io/schemas/adaptive-card.json";
const CARD_VERSION: &str = "1.4";

/// Normalized knowledge-base article, built per render from the backend results.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub url: String,
    pub summary: Option<String>,
}

/// Normalize backend results. Missing titles become "Article {n}" (1-based).
pub fn articles_from_results(results: &[KbResult]) -> Vec<Article> {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| Article {
            id: r.sys_id.clone().unwrap_or_default(),
            title: r
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| format!("Article {}", i + 1)),
            url: r.url.clone().unwrap_or_default(),
            summary: r.summary.clone().filter(|s| !s.trim().is_empty()),
        })
        .collect()
}

/// Adaptive card with one container per article: clickable title, optional collapsible summary,
/// and a submit button that round-trips as a `select_article` action.
pub fn build_kb_card(articles: &[Article]) -> Value {
    let mut body = vec![json!({
        "type": "TextBlock",
        "text": "Found relevant articles",
        "weight": "Bolder",
        "size": "Medium",
        "spacing": "Medium",
    })];

    for (index, article) in articles.iter().enumerate() {
        let mut items = vec![json!({
            "type": "TextBlock",
            "text": article.title,
            "weight": "Bolder",
            "size": "Medium",
            "wrap": true,
            "spacing": "Small",
            "color": "Accent",
        })];
        let mut actions = Vec::new();

        if let Some(ref summary) = article.summary {
            let summary_id = format!("summary-{}", index);
            items.push(json!({
                "type": "TextBlock",
                "id": summary_id,
                "text": summary,
                "wrap": true,
                "isSubtle": true,
                "isVisible": false,
                "spacing": "Small",
            }));
            actions.push(json!({
                "type": "Action.ToggleVisibility",
                "title": "Show summary",
                "targetElements": [summary_id],
            }));
        }

        actions.push(json!({
            "type": "Action.Submit",
            "title": "This solved my issue",
            "data": {
                "action": SELECT_ARTICLE_ACTION,
                "articleId": article.id,
                "articleTitle": article.title,
            },
            "style": "positive",
        }));
        items.push(json!({
            "type": "ActionSet",
            "spacing": "Small",
            "actions": actions,
        }));

        body.push(json!({
            "type": "Container",
            "separator": index > 0,
            "spacing": "Medium",
            "selectAction": {
                "type": "Action.OpenUrl",
                "title": article.title,
                "url": article.url,
            },
            "items": items,
        }));
    }

    json!({
        "$schema": CARD_SCHEMA,
        "type": "AdaptiveCard",
        "version": CARD_VERSION,
        "body": body,
    })
}

/// Send the suggestion card, or a plain notice when there is nothing to show.
/// Send errors are returned to the caller.
pub async fn send_kb_card(ctx: &dyn TurnContext, articles: &[Article]) -> Result<(), BotError> {
    if articles.is_empty() {
        log::warn!("cards: no articles provided, sending notice instead of a card");
        ctx.send("No knowledge base articles found.".into()).await?;
        return Ok(());
    }
    let card = build_kb_card(articles);
    log::debug!("cards: sending kb card with {} article(s)", articles.len());
    ctx.send(OutboundMessage::adaptive_card(card)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{Activity, ADAPTIVE_CARD_CONTENT_TYPE};
    use crate::context::testing::RecordingContext;

    fn article(id: &str, title: &str) -> Article {
        Article {
            id: id.to_string(),
            title: title.to_string(),
            url: format!("http://kb/{}", id),
            summary: None,
        }
    }

    #[test]
    fn normalizes_results() {
        let results = vec![
            KbResult {
                title: Some("VPN setup".to_string()),
                sys_id: Some("1".to_string()),
                url: Some("http://a".to_string()),
                summary: Some("  ".to_string()),
            },
            KbResult::default(),
        ];
        let articles = articles_from_results(&results);
        assert_eq!(articles[0].title, "VPN setup");
        assert_eq!(articles[0].id, "1");
        assert_eq!(articles[0].summary, None);
        assert_eq!(articles[1].title, "Article 2");
        assert_eq!(articles[1].url, "");
    }

    #[test]
    fn one_container_per_article() {
        let card = build_kb_card(&[article("1", "A"), article("2", "B")]);
        assert_eq!(card["type"], "AdaptiveCard");
        assert_eq!(card["version"], "1.4");
        let body = card["body"].as_array().unwrap();
        assert_eq!(body.len(), 3);
        assert_eq!(body[1]["separator"], false);
        assert_eq!(body[2]["separator"], true);
        assert_eq!(body[1]["selectAction"]["url"], "http://kb/1");
        assert_eq!(body[1]["items"][0]["text"], "A");
        let submit = &body[1]["items"][1]["actions"][0];
        assert_eq!(submit["type"], "Action.Submit");
        assert_eq!(
            submit["data"],
            json!({ "action": "select_article", "articleId": "1", "articleTitle": "A" })
        );
    }

    #[test]
    fn summary_is_collapsible() {
        let mut a = article("1", "A");
        a.summary = Some("Reset the client".to_string());
        let card = build_kb_card(&[a]);
        let items = card["body"][1]["items"].as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1]["isVisible"], false);
        assert_eq!(items[1]["text"], "Reset the client");
        let actions = items[2]["actions"].as_array().unwrap();
        assert_eq!(actions[0]["type"], "Action.ToggleVisibility");
        assert_eq!(actions[0]["targetElements"][0], items[1]["id"]);
        assert_eq!(actions[1]["data"]["action"], SELECT_ARTICLE_ACTION);
    }

    #[tokio::test]
    async fn empty_list_sends_plain_notice() {
        let ctx = RecordingContext::new(Activity::message("c", "q"));
        send_kb_card(&ctx, &[]).await.unwrap();
        assert_eq!(ctx.texts(), vec!["No knowledge base articles found."]);
    }

    #[tokio::test]
    async fn sends_card_attachment() {
        let ctx = RecordingContext::new(Activity::message("c", "q"));
        send_kb_card(&ctx, &[article("1", "A")]).await.unwrap();
        let sent = ctx.sent();
        let OutboundMessage::Attachments(ref attachments) = sent[0] else {
            panic!("expected a card");
        };
        assert_eq!(attachments[0].content_type, ADAPTIVE_CARD_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn send_failure_propagates() {
        let ctx = RecordingContext::failing_attachments(Activity::message("c", "q"));
        assert!(send_kb_card(&ctx, &[article("1", "A")]).await.is_err());
    }
}
