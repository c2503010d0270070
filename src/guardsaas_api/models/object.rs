use crate::guardsaas_api::models::portal_id::PortalId;
use serde::{Deserialize, Serialize};

/// One entry of `/object/list/export`, a physical object (door, gate,
/// turnstile) events are attributed to.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AccessObject {
    pub id: PortalId,
    pub name: String,
}
