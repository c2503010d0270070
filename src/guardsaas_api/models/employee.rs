use crate::guardsaas_api::models::portal_id::PortalId;
use serde::{Deserialize, Serialize};

/// One entry of `/employee/list/export`. Depending on portal version the id
/// lives in `id` or `employeeid`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Employee {
    #[serde(default)]
    pub id: Option<PortalId>,
    #[serde(default)]
    pub employeeid: Option<PortalId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub number: Option<PortalId>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl Employee {
    pub fn portal_id(&self) -> Option<String> {
        self.id
            .as_ref()
            .or(self.employeeid.as_ref())
            .map(PortalId::as_key)
    }
}
