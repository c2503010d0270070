use crate::guardsaas_api::models::employee::Employee;
use crate::guardsaas_api::models::event::AccessEvent;
use crate::guardsaas_api::models::portal_id::PortalId;
use crate::guardsaas_api::portal_client::{PortalApi, PortalClient};
use chrono::{Local, NaiveDateTime};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

/// Portal code for a granted-access pass event; the only kind the sensor
/// reports on.
pub const PASS_EVENT_ID: i64 = 4;

pub const STATE_ERROR: &str = "Error";
pub const STATE_AUTH_ERROR: &str = "Auth error";
pub const STATE_NO_EVENTS: &str = "No events found";
pub const STATE_EMPLOYEE_NOT_FOUND: &str = "Employee not found";
pub const STATE_EMPLOYEE_LIST_ERROR: &str = "Employee list error";
pub const STATE_DISABLED: &str = "Disabled";

const EVENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `+` plus an 11-digit number, the fixed-width phone suffix the portal
/// glues onto employee names.
const PHONE_SUFFIX_LEN: usize = 12;

static LEADING_JUNK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+|\*+)\s*").unwrap());
static PHONE_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\+\d{11}$").unwrap());

/// What one poll round trip produced: a display state plus the flat
/// attribute map Home Assistant shows under the entity. Rebuilt from scratch
/// every poll; all failure modes collapse into one of the fixed state
/// strings with the underlying error carried as an `error` attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSnapshot {
    pub state: String,
    pub attributes: HashMap<String, String>,
}

impl SensorSnapshot {
    pub fn with_state(state: &str) -> Self {
        Self {
            state: state.to_string(),
            attributes: HashMap::new(),
        }
    }

    pub fn failure(state: &str, err: &anyhow::Error) -> Self {
        let mut attributes = HashMap::new();
        attributes.insert("error".to_string(), format!("{:#}", err));
        Self {
            state: state.to_string(),
            attributes,
        }
    }
}

/// Full round trip: fresh login, fetch/resolve, best-effort logout. Never
/// returns Err; failures become snapshot states.
pub async fn poll_once(
    client: &PortalClient,
    username: &str,
    password: &str,
    target_object: &str,
    limit: u32,
) -> SensorSnapshot {
    if let Err(e) = client.login(username, password).await {
        debug!("login failed for object {}: {:?}", target_object, e);
        return SensorSnapshot::failure(STATE_AUTH_ERROR, &e);
    }
    let snapshot = build_snapshot(client, target_object, limit).await;
    client.logout().await;
    snapshot
}

/// Fetch recent events, pick the latest qualifying one, cross-reference the
/// employee directory and normalize the name.
pub async fn build_snapshot<T>(api: &T, target_object: &str, limit: u32) -> SensorSnapshot
where
    T: PortalApi,
{
    let events = match api.get_events(limit).await {
        Ok(events) => events,
        Err(e) => return SensorSnapshot::failure(STATE_ERROR, &e),
    };

    let now = Local::now().naive_local();
    let Some(event) = select_latest_event(events, target_object, now) else {
        return SensorSnapshot::with_state(STATE_NO_EVENTS);
    };

    let Some(employee_id) = event.employeeid.as_ref().map(PortalId::as_key) else {
        return SensorSnapshot::with_state(STATE_EMPLOYEE_NOT_FOUND);
    };

    let employees = match api.get_employees().await {
        Ok(employees) => employees,
        Err(e) => return SensorSnapshot::failure(STATE_EMPLOYEE_LIST_ERROR, &e),
    };

    let Some(employee) = resolve_employee(&employees, &employee_id) else {
        return SensorSnapshot::with_state(STATE_EMPLOYEE_NOT_FOUND);
    };

    let raw_name = employee
        .name
        .clone()
        .or_else(|| event.employee.clone())
        .unwrap_or_default();

    let mut attributes = HashMap::new();
    if let Some(time) = &event.time {
        attributes.insert("time".to_string(), time.clone());
    }
    if let Some(number) = &employee.number {
        attributes.insert("number".to_string(), number.as_key());
    }
    if let Some(department) = &employee.department {
        attributes.insert("department".to_string(), department.clone());
    }
    if let Some(position) = &employee.position {
        attributes.insert("position".to_string(), position.clone());
    }
    if let Some(comment) = &employee.comment {
        attributes.insert("comment".to_string(), comment.clone());
    }

    SensorSnapshot {
        state: normalize_name(&raw_name),
        attributes,
    }
}

/// Most-recent-valid-event-wins: keep pass events for the target object that
/// are not dated in the future (clock-skew guard), sort descending by
/// timestamp. The sort is stable, so timestamp ties keep their original
/// list order. Rows with missing or unparseable fields are skipped.
pub fn select_latest_event(
    events: Vec<AccessEvent>,
    target_object: &str,
    now: NaiveDateTime,
) -> Option<AccessEvent> {
    let mut valid: Vec<(NaiveDateTime, AccessEvent)> = events
        .into_iter()
        .filter_map(|event| {
            if event.object.as_deref() != Some(target_object) {
                return None;
            }
            if event.eventid != Some(PASS_EVENT_ID) {
                return None;
            }
            let time =
                NaiveDateTime::parse_from_str(event.time.as_deref()?, EVENT_TIME_FORMAT).ok()?;
            if time > now {
                return None;
            }
            Some((time, event))
        })
        .collect();

    valid.sort_by(|a, b| b.0.cmp(&a.0));
    valid.into_iter().next().map(|(_, event)| event)
}

/// Linear scan of the directory, ids compared as strings to tolerate the
/// portal's mixed numeric/string ids.
pub fn resolve_employee<'a>(employees: &'a [Employee], employee_id: &str) -> Option<&'a Employee> {
    employees
        .iter()
        .find(|employee| employee.portal_id().as_deref() == Some(employee_id))
}

/// Two cleanup passes over the raw directory name: strip the leading badge
/// number or `***` mask, then drop the fixed-width phone suffix if one is
/// glued on. Format-fragile on purpose; it targets one known upstream shape.
pub fn normalize_name(raw: &str) -> String {
    let stripped = LEADING_JUNK_RE.replace(raw, "");
    let stripped = stripped.trim();
    if PHONE_SUFFIX_RE.is_match(stripped) {
        // The suffix is ASCII, so the cut lands on a char boundary.
        stripped[..stripped.len() - PHONE_SUFFIX_LEN]
            .trim_end()
            .to_string()
    } else {
        stripped.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guardsaas_api::models::object::AccessObject;
    use anyhow::anyhow;
    use chrono::NaiveDate;

    fn event(object: &str, eventid: i64, time: &str, employee_id: &str) -> AccessEvent {
        AccessEvent {
            object: Some(object.to_string()),
            eventid: Some(eventid),
            time: Some(time.to_string()),
            employeeid: Some(PortalId::Text(employee_id.to_string())),
            employee: None,
        }
    }

    fn noon(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    struct MockPortal {
        events: Vec<AccessEvent>,
        employees: Option<Vec<Employee>>,
    }

    impl PortalApi for MockPortal {
        async fn get_events(&self, _limit: u32) -> anyhow::Result<Vec<AccessEvent>> {
            Ok(self.events.clone())
        }

        async fn get_employees(&self) -> anyhow::Result<Vec<Employee>> {
            self.employees
                .clone()
                .ok_or_else(|| anyhow!("expected value at line 1 column 1"))
        }

        async fn get_objects(&self) -> anyhow::Result<Vec<AccessObject>> {
            Ok(Vec::new())
        }

        async fn logout(&self) {}
    }

    #[test]
    fn latest_event_wins() {
        let events = vec![
            event("Door A", 4, "2024-03-01 08:00:00", "1"),
            event("Door A", 4, "2024-03-02 08:00:00", "2"),
        ];
        let winner = select_latest_event(events, "Door A", noon(10)).unwrap();
        assert_eq!(winner.time.as_deref(), Some("2024-03-02 08:00:00"));
    }

    #[test]
    fn other_objects_and_event_types_are_excluded() {
        let events = vec![
            event("Door B", 4, "2024-03-05 08:00:00", "1"),
            event("Door A", 7, "2024-03-06 08:00:00", "2"),
            event("Door A", 4, "2024-03-01 08:00:00", "3"),
        ];
        let winner = select_latest_event(events, "Door A", noon(10)).unwrap();
        assert_eq!(winner.time.as_deref(), Some("2024-03-01 08:00:00"));
    }

    #[test]
    fn future_events_are_excluded() {
        let events = vec![
            event("Door A", 4, "2024-03-20 08:00:00", "1"),
            event("Door A", 4, "2024-03-01 08:00:00", "2"),
        ];
        let winner = select_latest_event(events, "Door A", noon(10)).unwrap();
        assert_eq!(winner.time.as_deref(), Some("2024-03-01 08:00:00"));
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let events = vec![
            AccessEvent {
                object: Some("Door A".to_string()),
                eventid: Some(4),
                time: Some("yesterday-ish".to_string()),
                employeeid: None,
                employee: None,
            },
            AccessEvent {
                object: Some("Door A".to_string()),
                eventid: Some(4),
                time: None,
                employeeid: None,
                employee: None,
            },
            event("Door A", 4, "2024-03-01 08:00:00", "2"),
        ];
        let winner = select_latest_event(events, "Door A", noon(10)).unwrap();
        assert_eq!(winner.time.as_deref(), Some("2024-03-01 08:00:00"));
    }

    #[test]
    fn timestamp_ties_keep_list_order() {
        let mut first = event("Door A", 4, "2024-03-01 08:00:00", "1");
        first.employee = Some("first".to_string());
        let mut second = event("Door A", 4, "2024-03-01 08:00:00", "2");
        second.employee = Some("second".to_string());

        let winner = select_latest_event(vec![first, second], "Door A", noon(10)).unwrap();
        assert_eq!(winner.employee.as_deref(), Some("first"));
    }

    #[test]
    fn masked_prefix_and_phone_suffix_are_stripped() {
        assert_eq!(normalize_name("***Ivan Petrov+79991234567"), "Ivan Petrov");
    }

    #[test]
    fn numeric_prefix_is_stripped() {
        assert_eq!(normalize_name("0042 Anna Smith"), "Anna Smith");
    }

    #[test]
    fn plain_names_pass_through() {
        assert_eq!(normalize_name("Ivan Petrov"), "Ivan Petrov");
    }

    #[test]
    fn employee_lookup_tolerates_id_type_mismatch() {
        let employees = vec![Employee {
            id: Some(PortalId::Num(7)),
            name: Some("Numeric Id".to_string()),
            ..Employee::default()
        }];
        let found = resolve_employee(&employees, "7").unwrap();
        assert_eq!(found.name.as_deref(), Some("Numeric Id"));
    }

    #[test]
    fn employee_lookup_falls_back_to_employeeid_field() {
        let employees = vec![Employee {
            employeeid: Some(PortalId::Text("12".to_string())),
            name: Some("Alt Field".to_string()),
            ..Employee::default()
        }];
        assert!(resolve_employee(&employees, "12").is_some());
        assert!(resolve_employee(&employees, "13").is_none());
    }

    #[tokio::test]
    async fn snapshot_carries_state_and_attributes() {
        let portal = MockPortal {
            events: vec![event("Door A", 4, "2024-03-01 08:00:00", "7")],
            employees: Some(vec![Employee {
                id: Some(PortalId::Num(7)),
                name: Some("***Ivan Petrov+79991234567".to_string()),
                number: Some(PortalId::Num(42)),
                department: Some("Security".to_string()),
                position: Some("Guard".to_string()),
                comment: Some("night shift".to_string()),
                ..Employee::default()
            }]),
        };

        let snapshot = build_snapshot(&portal, "Door A", 25).await;
        assert_eq!(snapshot.state, "Ivan Petrov");
        assert_eq!(
            snapshot.attributes.get("time").map(String::as_str),
            Some("2024-03-01 08:00:00")
        );
        assert_eq!(snapshot.attributes.get("number").map(String::as_str), Some("42"));
        assert_eq!(
            snapshot.attributes.get("department").map(String::as_str),
            Some("Security")
        );
        assert_eq!(
            snapshot.attributes.get("position").map(String::as_str),
            Some("Guard")
        );
        assert_eq!(
            snapshot.attributes.get("comment").map(String::as_str),
            Some("night shift")
        );
    }

    #[tokio::test]
    async fn broken_employee_directory_becomes_error_state() {
        let portal = MockPortal {
            events: vec![event("Door A", 4, "2024-03-01 08:00:00", "7")],
            employees: None,
        };

        let snapshot = build_snapshot(&portal, "Door A", 25).await;
        assert_eq!(snapshot.state, STATE_EMPLOYEE_LIST_ERROR);
        assert!(snapshot.attributes.contains_key("error"));
    }

    #[tokio::test]
    async fn no_qualifying_events_becomes_fixed_state() {
        let portal = MockPortal {
            events: vec![event("Door B", 4, "2024-03-01 08:00:00", "7")],
            employees: Some(Vec::new()),
        };

        let snapshot = build_snapshot(&portal, "Door A", 25).await;
        assert_eq!(snapshot.state, STATE_NO_EVENTS);
        assert!(snapshot.attributes.is_empty());
    }

    #[tokio::test]
    async fn unknown_employee_becomes_not_found_state() {
        let portal = MockPortal {
            events: vec![event("Door A", 4, "2024-03-01 08:00:00", "7")],
            employees: Some(vec![Employee {
                id: Some(PortalId::Num(8)),
                ..Employee::default()
            }]),
        };

        let snapshot = build_snapshot(&portal, "Door A", 25).await;
        assert_eq!(snapshot.state, STATE_EMPLOYEE_NOT_FOUND);
    }
}
