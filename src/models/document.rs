use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier of one rendered invoice document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn new() -> Self {
        DocumentId(Uuid::new_v4())
    }

    pub fn file_name(&self) -> String {
        format!("{}.pdf", self.0)
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for DocumentId {
    fn from(id: Uuid) -> Self {
        DocumentId(id)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-request progress of the delivery workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStage {
    Rendering,
    RenderFailed,
    Rendered,
    Sending,
    Sent,
    SendFailed,
}

impl fmt::Display for DeliveryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DeliveryStage::Rendering => "rendering",
            DeliveryStage::RenderFailed => "render_failed",
            DeliveryStage::Rendered => "rendered",
            DeliveryStage::Sending => "sending",
            DeliveryStage::Sent => "sent",
            DeliveryStage::SendFailed => "send_failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAck {
    pub status: String,
    pub stage: DeliveryStage,
    pub document_id: DocumentId,
    pub created_at: DateTime<Utc>,
}

impl DeliveryAck {
    pub fn new(stage: DeliveryStage, document_id: DocumentId) -> Self {
        DeliveryAck {
            status: "success".to_string(),
            stage,
            document_id,
            created_at: Utc::now(),
        }
    }
}
