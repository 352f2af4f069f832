use chrono::{DateTime, Local, Utc};
use ems_core::EntityKind;
use serde_json::Value;

/// Widest name shown in list output
const MAX_LABEL_LEN: usize = 60;

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format an optional timestamp in local time
pub fn format_timestamp(value: Option<DateTime<Utc>>) -> String {
    match value {
        Some(ts) => ts.with_timezone(&Local).format("%b %d, %Y %H:%M").to_string(),
        None => "never".to_string(),
    }
}

fn name_field(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::User => "User_Name",
        EntityKind::Department => "Department_Name",
        EntityKind::Office => "Office_Name",
        EntityKind::Bank => "Bank_Name",
        EntityKind::Branch => "Branch_Name",
        EntityKind::Post => "Post_Name",
        EntityKind::Payscale => "Pay_Name",
        EntityKind::Employee => "Employee_Name",
    }
}

/// Human-readable name of a serialized record
pub fn record_label(kind: EntityKind, record: &Value) -> String {
    let text = |field: &str| record.get(field).and_then(Value::as_str).unwrap_or("").trim();

    let label = match kind {
        EntityKind::Employee => format!("{} {}", text("Employee_Name"), text("Employee_Surname")),
        EntityKind::Branch => match text("IFSC_Code") {
            "" => text(name_field(kind)).to_string(),
            ifsc => format!("{} ({})", text(name_field(kind)), ifsc),
        },
        _ => text(name_field(kind)).to_string(),
    };

    match label.trim() {
        "" => "(unnamed)".to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// One line of `ems list` output
pub fn record_line(kind: EntityKind, record: &Value) -> String {
    let id = record
        .get(kind.id_field())
        .and_then(Value::as_u64)
        .unwrap_or_default();
    format!(
        "{:>16}  {}",
        id,
        truncate_string(&record_label(kind, record), MAX_LABEL_LEN)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("कार्यालय", 8), "कार्यालय");
    }

    #[test]
    fn test_format_timestamp_never() {
        assert_eq!(format_timestamp(None), "never");
    }

    #[test]
    fn test_record_label() {
        let employee = json!({"Employee_ID": 4, "Employee_Name": "Asha", "Employee_Surname": "Rao"});
        assert_eq!(record_label(EntityKind::Employee, &employee), "Asha Rao");

        let branch = json!({"Branch_ID": 2, "Branch_Name": "Main", "IFSC_Code": "SBIN0000001"});
        assert_eq!(record_label(EntityKind::Branch, &branch), "Main (SBIN0000001)");

        assert_eq!(record_label(EntityKind::Bank, &json!({"Bank_ID": 1})), "(unnamed)");
    }

    #[test]
    fn test_record_line() {
        let bank = json!({"Bank_ID": 12, "Bank_Name": "SBI"});
        assert_eq!(record_line(EntityKind::Bank, &bank), format!("{:>16}  SBI", 12));
    }
}
