// Orchestrates the MCP connector workflow (spec.md §4.8 steps 3-4):
// discover tools over an open transport, atomically replace the
// connector's persisted catalog, and flip the connector's status.
// Opening the transport (step 2, with its header sanitization) is the
// caller's job — which transport to open depends on how the connector
// was configured, a decision this crate doesn't own.

use assistant_contracts::{Connector, ConnectorStatus, Tool};
use assistant_storage::Database;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::Result;
use crate::transport::McpTransport;

pub async fn sync_connector(
    db: &Database,
    workspace_id: Uuid,
    connector: &Connector,
    transport: &mut dyn McpTransport,
) -> Result<Vec<Tool>> {
    let discovered = transport.list_tools().await;
    transport.close().await.ok();

    let status = status_for_outcome(&discovered);
    db.update_connector_status(&connector.external_id, status).await?;

    let discovered = match discovered {
        Ok(tools) => tools,
        Err(e) => {
            error!(connector_id = %connector.id, error = %e, "MCP tool discovery failed");
            return Err(e.into());
        }
    };

    let persisted = db.sync_connector_tools(workspace_id, connector.id, &discovered).await?;
    info!(connector_id = %connector.id, tool_count = persisted.len(), "synced MCP tool catalog");
    Ok(persisted)
}

/// `Connected` on success, `Failed` on any transport error — spec.md
/// §4.8 step 4.
fn status_for_outcome<T>(outcome: &anyhow::Result<T>) -> ConnectorStatus {
    match outcome {
        Ok(_) => ConnectorStatus::Connected,
        Err(_) => ConnectorStatus::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_discovery_maps_to_connected() {
        let outcome: anyhow::Result<Vec<()>> = Ok(vec![]);
        assert_eq!(status_for_outcome(&outcome), ConnectorStatus::Connected);
    }

    #[test]
    fn failed_discovery_maps_to_failed() {
        let outcome: anyhow::Result<Vec<()>> = Err(anyhow::anyhow!("connection refused"));
        assert_eq!(status_for_outcome(&outcome), ConnectorStatus::Failed);
    }
}
