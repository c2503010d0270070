use serde::{Deserialize, Serialize};

/// The portal is inconsistent about id types: the same id arrives as a JSON
/// number on one endpoint and a string on another. Comparisons go through
/// `as_key` so `"7"` and `7` match.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum PortalId {
    Num(i64),
    Text(String),
}

impl PortalId {
    pub fn as_key(&self) -> String {
        match self {
            PortalId::Num(n) => n.to_string(),
            PortalId::Text(s) => s.clone(),
        }
    }
}
