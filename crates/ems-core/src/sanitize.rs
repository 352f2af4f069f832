//! Normalization of raw snapshots and records coming off the wire.
//!
//! Spreadsheet cells arrive loosely typed: ids as strings, text as numbers,
//! flags as "Yes"/"No", roles in arbitrary case, collections under legacy
//! names.
//! Everything here works on `serde_json::Value` so that typed decoding
//! afterwards is strict. Every transformation is idempotent.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

use crate::models::{AppData, EntityKind};

/// Legacy collection names and their canonical key.
const COLLECTION_ALIASES: &[(&str, &str)] = &[
    ("bankBranches", "branches"),
    ("bank_branches", "branches"),
    ("Branches", "branches"),
    ("designations", "posts"),
    ("Designations", "posts"),
    ("payScales", "payscales"),
    ("user_post_selections", "userPostSelections"),
    ("userPosts", "userPostSelections"),
];

const SELECTIONS_KEY: &str = "userPostSelections";

/// Numeric columns that do not follow the `_ID` suffix convention.
const ID_LIKE_FIELDS: &[&str] = &["AC_No"];

const FLAG_FIELDS: &[&str] = &["PwD", "Active"];

const TIMESTAMP_FIELDS: &[&str] = &["Created_At", "Updated_At"];

const USER_TYPE_FIELD: &str = "User_Type";

/// Outcome of coercing one loosely typed cell.
#[derive(Debug, PartialEq)]
enum Coerced<T> {
    Value(T),
    /// Null or empty: drop the field so the typed default applies.
    Blank,
    /// Present but unusable: drop the field and log it.
    Invalid,
}

// ============================================================================
// Entry points
// ============================================================================

/// Sanitize a raw snapshot payload.
pub fn sanitize(raw: Value) -> Value {
    let Value::Object(mut root) = raw else {
        return raw;
    };

    for (alias, canonical) in COLLECTION_ALIASES {
        if let Some(value) = root.remove(*alias) {
            if !root.contains_key(*canonical) {
                root.insert((*canonical).to_string(), value);
            }
        }
    }

    for kind in EntityKind::ALL {
        let name = kind.collection_key();
        if matches!(root.get(name), Some(Value::Null)) {
            root.remove(name);
            continue;
        }
        if let Some(Value::Array(records)) = root.get_mut(name) {
            let before = records.len();
            records.retain(Value::is_object);
            if records.len() != before {
                warn!(
                    collection = name,
                    dropped = before - records.len(),
                    "Dropped non-object rows"
                );
            }
            for record in records.iter_mut() {
                if let Value::Object(fields) = record {
                    sanitize_fields(fields);
                }
            }

            // Id 0 means "unassigned" for references, so a row without its
            // own id could never be addressed
            let before = records.len();
            records.retain(|record| has_primary_id(record, kind));
            if records.len() != before {
                warn!(
                    collection = name,
                    dropped = before - records.len(),
                    "Dropped rows without an id"
                );
            }
        }
    }

    if let Some(selections) = root.remove(SELECTIONS_KEY) {
        root.insert(
            SELECTIONS_KEY.to_string(),
            Value::Object(sanitize_selections(selections)),
        );
    }

    Value::Object(root)
}

/// Sanitize a single record submitted by a form or the command line.
pub fn sanitize_record(raw: Value) -> Value {
    match raw {
        Value::Object(mut fields) => {
            sanitize_fields(&mut fields);
            Value::Object(fields)
        }
        other => other,
    }
}

/// Sanitize and decode a snapshot.
pub fn decode_snapshot(raw: Value) -> Result<AppData, serde_json::Error> {
    serde_json::from_value(sanitize(raw))
}

/// Sanitize and decode one record.
pub fn decode_record<T: DeserializeOwned>(raw: Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(sanitize_record(raw))
}

/// Read a loosely typed id (number or numeric string).
pub fn coerce_id_value(value: &Value) -> Option<u64> {
    match coerce_id(value) {
        Coerced::Value(id) => Some(id),
        Coerced::Blank | Coerced::Invalid => None,
    }
}

// ============================================================================
// Records
// ============================================================================

fn is_id_field(name: &str) -> bool {
    name.to_ascii_uppercase().ends_with("_ID") || ID_LIKE_FIELDS.contains(&name)
}

fn sanitize_fields(fields: &mut Map<String, Value>) {
    fields.retain(|name, value| {
        if is_id_field(name) {
            let coerced = coerce_id(value).map(Value::from);
            return replace_or_drop(name, value, coerced);
        }
        if name == USER_TYPE_FIELD {
            let Value::String(raw) = value else {
                return false;
            };
            let normalized = normalize_user_type(raw);
            *value = Value::from(normalized);
            return true;
        }
        if FLAG_FIELDS.contains(&name.as_str()) {
            let coerced = coerce_flag(value).map(Value::from);
            return replace_or_drop(name, value, coerced);
        }
        if TIMESTAMP_FIELDS.contains(&name.as_str()) {
            let coerced = coerce_timestamp(value).map(Value::from);
            return replace_or_drop(name, value, coerced);
        }
        let coerced = coerce_text(value).map(Value::from);
        replace_or_drop(name, value, coerced)
    });
}

fn has_primary_id(record: &Value, kind: EntityKind) -> bool {
    record
        .get(kind.id_field())
        .and_then(Value::as_u64)
        .is_some_and(|id| id != 0)
}

fn replace_or_drop(name: &str, value: &mut Value, coerced: Coerced<Value>) -> bool {
    match coerced {
        Coerced::Value(clean) => {
            *value = clean;
            true
        }
        Coerced::Blank => false,
        Coerced::Invalid => {
            warn!(field = name, value = %value, "Dropping unparseable field");
            false
        }
    }
}

impl<T> Coerced<T> {
    fn map<U>(self, f: impl FnOnce(T) -> U) -> Coerced<U> {
        match self {
            Coerced::Value(v) => Coerced::Value(f(v)),
            Coerced::Blank => Coerced::Blank,
            Coerced::Invalid => Coerced::Invalid,
        }
    }
}

fn integral(f: f64) -> Option<u64> {
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
        Some(f as u64)
    } else {
        None
    }
}

fn coerce_id(value: &Value) -> Coerced<u64> {
    match value {
        Value::Null => Coerced::Blank,
        Value::Number(n) => match n.as_u64().or_else(|| n.as_f64().and_then(integral)) {
            Some(id) => Coerced::Value(id),
            None => Coerced::Invalid,
        },
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Coerced::Blank;
            }
            match trimmed
                .parse::<u64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(integral))
            {
                Some(id) => Coerced::Value(id),
                None => Coerced::Invalid,
            }
        }
        _ => Coerced::Invalid,
    }
}

/// Every other column is text; numeric and boolean cells are stringified.
fn coerce_text(value: &Value) -> Coerced<String> {
    match value {
        Value::Null => Coerced::Blank,
        Value::String(s) => Coerced::Value(s.clone()),
        Value::Bool(b) => Coerced::Value(b.to_string()),
        Value::Number(n) => {
            let text = match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => i.to_string(),
                (None, Some(f)) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
                    format!("{}", f as i64)
                }
                _ => n.to_string(),
            };
            Coerced::Value(text)
        }
        Value::Array(_) | Value::Object(_) => Coerced::Invalid,
    }
}

fn normalize_user_type(raw: &str) -> &'static str {
    if raw.trim().eq_ignore_ascii_case("admin") {
        "Admin"
    } else {
        "Normal"
    }
}

fn coerce_flag(value: &Value) -> Coerced<bool> {
    match value {
        Value::Null => Coerced::Blank,
        Value::Bool(b) => Coerced::Value(*b),
        Value::Number(n) => match n.as_f64() {
            Some(f) => Coerced::Value(f != 0.0),
            None => Coerced::Invalid,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" => Coerced::Blank,
            "yes" | "y" | "true" | "1" => Coerced::Value(true),
            "no" | "n" | "false" | "0" => Coerced::Value(false),
            _ => Coerced::Invalid,
        },
        _ => Coerced::Invalid,
    }
}

fn coerce_timestamp(value: &Value) -> Coerced<String> {
    match value {
        Value::Null => Coerced::Blank,
        // Sheets occasionally serialize dates as epoch milliseconds
        Value::Number(n) => match n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis) {
            Some(dt) => Coerced::Value(dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => Coerced::Invalid,
        },
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Coerced::Blank;
            }
            if DateTime::parse_from_rfc3339(trimmed).is_ok() {
                return Coerced::Value(trimmed.to_string());
            }
            parse_naive_timestamp(trimmed)
                .map(|naive| {
                    Coerced::Value(naive.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true))
                })
                .unwrap_or(Coerced::Invalid)
        }
        _ => Coerced::Invalid,
    }
}

fn parse_naive_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

// ============================================================================
// User -> post selections
// ============================================================================

fn sanitize_selections(raw: Value) -> Map<String, Value> {
    let mut merged: BTreeMap<u64, Vec<u64>> = BTreeMap::new();

    let mut add = |user: u64, posts: Vec<u64>| {
        let entry = merged.entry(user).or_default();
        for post in posts {
            if !entry.contains(&post) {
                entry.push(post);
            }
        }
    };

    match raw {
        Value::Object(map) => {
            for (key, posts) in map {
                match coerce_id(&Value::String(key.clone())) {
                    Coerced::Value(user) => add(user, post_ids(&posts)),
                    _ => warn!(key = %key, "Dropping post selection with invalid user id"),
                }
            }
        }
        // Row form straight from the sheet: [{User_ID, Post_IDs}, ...]
        Value::Array(rows) => {
            for row in rows {
                let user = row.get("User_ID").map(coerce_id);
                match user {
                    Some(Coerced::Value(user)) => {
                        let posts = row.get("Post_IDs").map(post_ids).unwrap_or_default();
                        add(user, posts);
                    }
                    _ => warn!(row = %row, "Dropping post selection row without a user id"),
                }
            }
        }
        Value::Null => {}
        other => warn!(value = %other, "Ignoring malformed post selections"),
    }

    merged
        .into_iter()
        .map(|(user, posts)| {
            let posts = posts.into_iter().map(Value::from).collect();
            (user.to_string(), Value::Array(posts))
        })
        .collect()
}

fn post_ids(value: &Value) -> Vec<u64> {
    match value {
        Value::Array(items) => items.iter().filter_map(coerce_id_value).collect(),
        // A single sheet cell holding "3, 7, 9"
        Value::String(s) => s
            .split(',')
            .filter_map(|part| coerce_id_value(&Value::String(part.to_string())))
            .collect(),
        Value::Number(_) => coerce_id_value(value).into_iter().collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserType;
    use serde_json::json;

    fn messy_snapshot() -> Value {
        json!({
            "users": [
                {"User_ID": "1", "User_Name": "admin", "Password": "x", "User_Type": "  ADMIN "},
                {"User_ID": 2.0, "User_Name": "clerk", "Password": "y", "User_Type": "normal user"}
            ],
            "offices": [
                {"Office_ID": "5", "Office_Name": "Treasury", "AC_No": " 12 ", "Department_ID": "", "User_ID": "1"}
            ],
            "bankBranches": [
                {"Branch_ID": "2", "Bank_ID": "1", "Branch_Name": "Main", "IFSC_Code": "SBIN0001"}
            ],
            "employees": [
                {"Employee_ID": "10", "PwD": "Yes", "Active": "no", "Office_ID": "5",
                 "Service_Type": 2, "Created_At": "2024-03-01 09:30:00", "Updated_At": ""}
            ],
            "userPostSelections": {"1": ["3", 4, 4, "x"], " 2 ": "7, 8", "bad": [1]},
            "departments": null
        })
    }

    #[test]
    fn test_string_ids_become_numbers() {
        let clean = sanitize(json!({"offices": [{"Office_ID": "5", "Office_Name": "HQ"}]}));
        assert_eq!(clean["offices"][0]["Office_ID"], json!(5));

        let data = decode_snapshot(json!({"offices": [{"Office_ID": "5"}]})).expect("decode");
        assert_eq!(data.offices[0].office_id, 5);
    }

    #[test]
    fn test_blank_and_invalid_ids_dropped() {
        let clean = sanitize_record(json!({"Office_ID": "", "Department_ID": "abc", "User_ID": -3, "Name": "x"}));
        assert_eq!(clean, json!({"Name": "x"}));
    }

    #[test]
    fn test_user_type_normalized() {
        let data = decode_snapshot(messy_snapshot()).expect("decode");
        assert_eq!(data.users[0].user_type, UserType::Admin);
        assert_eq!(data.users[1].user_type, UserType::Normal);
        assert_eq!(data.users[1].user_id, 2);
    }

    #[test]
    fn test_aliases_and_null_collections() {
        let data = decode_snapshot(messy_snapshot()).expect("decode");
        assert_eq!(data.branches.len(), 1);
        assert_eq!(data.branches[0].bank_id, 1);
        assert!(data.departments.is_empty());
    }

    #[test]
    fn test_canonical_key_wins_over_alias() {
        let clean = sanitize(json!({"branches": [], "bankBranches": [{"Branch_ID": 1}]}));
        assert_eq!(clean["branches"], json!([]));
        assert!(clean.get("bankBranches").is_none());
    }

    #[test]
    fn test_flags_and_timestamps() {
        let data = decode_snapshot(messy_snapshot()).expect("decode");
        let employee = &data.employees[0];
        assert!(employee.pwd);
        assert!(!employee.active);
        assert_eq!(employee.office_id, 5);
        assert_eq!(employee.service_type, "2");
        assert_eq!(
            employee.stamps.created_at.map(|dt| dt.to_rfc3339()),
            Some("2024-03-01T09:30:00+00:00".to_string())
        );
        assert!(employee.stamps.updated_at.is_none());
    }

    #[test]
    fn test_selections_normalized() {
        let data = decode_snapshot(messy_snapshot()).expect("decode");
        assert_eq!(data.posts_for_user(1), &[3, 4]);
        assert_eq!(data.posts_for_user(2), &[7, 8]);
        assert_eq!(data.user_post_selections.len(), 2);
    }

    #[test]
    fn test_selection_rows_merged() {
        let clean = sanitize(json!({
            "userPostSelections": [
                {"User_ID": "4", "Post_IDs": [1, 2]},
                {"User_ID": 4, "Post_IDs": "2,3"},
                {"Post_IDs": [9]}
            ]
        }));
        assert_eq!(clean["userPostSelections"], json!({"4": [1, 2, 3]}));
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let once = sanitize(messy_snapshot());
        let twice = sanitize(once.clone());
        assert_eq!(once, twice);

        // Round trip through the typed model as well
        let data: AppData = serde_json::from_value(once).expect("decode");
        let encoded = serde_json::to_value(&data).expect("encode");
        assert_eq!(sanitize(encoded.clone()), encoded);
    }

    #[test]
    fn test_numeric_text_cells_become_strings() {
        let data = decode_snapshot(json!({
            "users": [{"User_ID": 1, "User_Name": "clerk", "Password": 1234, "User_Type": "Normal"}],
            "banks": [{"Bank_ID": 1, "Bank_Name": "SBI"}],
            "branches": [{"Branch_ID": 2, "Branch_Name": 42, "IFSC_Code": null, "Bank_ID": 1}],
            "posts": [{"Post_ID": 2, "Post_Name": "Clerk", "Category": 3.0, "Class": 3}],
            "employees": [{"Employee_ID": 9, "Employee_Name": "Asha", "DOB": 19900101, "Gender": true}]
        }))
        .expect("numeric text cells should decode");

        assert_eq!(data.users[0].password, "1234");
        assert_eq!(data.banks.len(), 1);
        assert_eq!(data.branches[0].name, "42");
        assert_eq!(data.branches[0].ifsc_code, "");
        assert_eq!(data.posts[0].class, "3");
        assert_eq!(data.posts[0].category, "3");
        assert_eq!(data.employees[0].dob, "19900101");
        assert_eq!(data.employees[0].gender, "true");
    }

    #[test]
    fn test_nested_text_cells_dropped() {
        let clean = sanitize_record(json!({"Post_ID": 2, "Class": [1, 2], "Category": {"a": 1}}));
        assert_eq!(clean, json!({"Post_ID": 2}));
    }

    #[test]
    fn test_rows_without_id_dropped() {
        let data = decode_snapshot(json!({
            "banks": [
                {"Bank_ID": "", "Bank_Name": "blank"},
                {"Bank_Name": "missing"},
                {"Bank_ID": 0, "Bank_Name": "zero"},
                {"Bank_ID": "3", "Bank_Name": "Canara"}
            ]
        }))
        .expect("decode");
        assert_eq!(data.banks.len(), 1);
        assert_eq!(data.banks[0].bank_id, 3);

        // Records submitted for creation keep their missing id
        assert_eq!(sanitize_record(json!({"Bank_Name": "new"})), json!({"Bank_Name": "new"}));
    }

    #[test]
    fn test_coerce_id_value() {
        assert_eq!(coerce_id_value(&json!("42")), Some(42));
        assert_eq!(coerce_id_value(&json!(" 7.0 ")), Some(7));
        assert_eq!(coerce_id_value(&json!(3)), Some(3));
        assert_eq!(coerce_id_value(&json!(1.5)), None);
        assert_eq!(coerce_id_value(&json!("")), None);
        assert_eq!(coerce_id_value(&json!(true)), None);
    }

    #[test]
    fn test_non_object_snapshot_untouched() {
        assert_eq!(sanitize(json!("oops")), json!("oops"));
        assert!(decode_snapshot(json!("oops")).is_err());
    }
}
