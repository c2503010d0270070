use crate::guardsaas_api::models::event::AccessEvent;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct EventsResponse {
    #[serde(default)]
    pub items: Vec<AccessEvent>,
}
