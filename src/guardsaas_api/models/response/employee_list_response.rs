use crate::guardsaas_api::models::employee::Employee;
use serde::Deserialize;

/// The employee export comes back as a bare list, an `{items: [...]}`
/// wrapper, or (for single-employee accounts) a lone object. `Wrapped` must
/// be tried before `Single` or the wrapper object matches the all-optional
/// `Employee` shape.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum EmployeeListResponse {
    List(Vec<Employee>),
    Wrapped { items: Vec<Employee> },
    Single(Employee),
}

impl EmployeeListResponse {
    pub fn into_employees(self) -> Vec<Employee> {
        match self {
            EmployeeListResponse::List(items) => items,
            EmployeeListResponse::Wrapped { items } => items,
            EmployeeListResponse::Single(employee) => vec![employee],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_list_is_accepted() {
        let parsed: EmployeeListResponse =
            serde_json::from_str(r#"[{"id": 1, "name": "A"}, {"id": 2, "name": "B"}]"#).unwrap();
        assert_eq!(parsed.into_employees().len(), 2);
    }

    #[test]
    fn wrapped_list_is_accepted() {
        let parsed: EmployeeListResponse =
            serde_json::from_str(r#"{"items": [{"id": 1, "name": "A"}]}"#).unwrap();
        assert_eq!(parsed.into_employees().len(), 1);
    }

    #[test]
    fn single_object_is_accepted() {
        let parsed: EmployeeListResponse =
            serde_json::from_str(r#"{"id": "9", "name": "Solo"}"#).unwrap();
        let employees = parsed.into_employees();
        assert_eq!(employees.len(), 1);
        assert_eq!(employees[0].portal_id().as_deref(), Some("9"));
    }
}
