use crate::guardsaas_api::models::portal_id::PortalId;
use serde::{Deserialize, Serialize};

/// One row of `/reports/events/export`. Every field is optional because the
/// export mixes event kinds and older rows drop fields; rows that lack what
/// the pipeline needs are filtered out, not treated as errors.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AccessEvent {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub eventid: Option<i64>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub employeeid: Option<PortalId>,
    #[serde(default)]
    pub employee: Option<String>,
}
