//! Incident-created notice.

use crate::context::TurnContext;
use crate::error::BotError;

/// Tell the user which incident the backend opened and where to find it.
pub async fn send_incident_notice(
    ctx: &dyn TurnContext,
    sys_id: &str,
    url: &str,
) -> Result<(), BotError> {
    log::info!("incident: backend created incident {}", sys_id);
    ctx.send(
        format!(
            "Incident has been created with ID: {}, view it here: {}",
            sys_id, url
        )
        .into(),
    )
    .await
}
