use crate::guardsaas_api::models::object::AccessObject;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct ObjectListResponse {
    pub items: Vec<AccessObject>,
}
