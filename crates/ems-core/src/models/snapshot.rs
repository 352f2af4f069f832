use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Bank, BankBranch, Department, Employee, Entity, EntityKind, Office, Payscale, Post, User};

/// Created/updated timestamps carried by every mutable record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Timestamps {
    #[serde(rename = "Created_At", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "Updated_At", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Timestamps {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            created_at: Some(now),
            updated_at: Some(now),
        }
    }
}

/// The full aggregate of every collection at a point in time.
///
/// Collections missing from a payload decode as empty, never as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AppData {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub departments: Vec<Department>,
    #[serde(default)]
    pub offices: Vec<Office>,
    #[serde(default)]
    pub banks: Vec<Bank>,
    #[serde(default)]
    pub branches: Vec<BankBranch>,
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub payscales: Vec<Payscale>,
    #[serde(default)]
    pub employees: Vec<Employee>,
    /// User_ID -> selected Post_IDs
    #[serde(rename = "userPostSelections", default)]
    pub user_post_selections: BTreeMap<u64, Vec<u64>>,
}

impl AppData {
    /// Look up a record by id in its collection.
    pub fn find<E: Entity>(&self, id: u64) -> Option<&E> {
        E::collection(self).iter().find(|record| record.id() == id)
    }

    pub fn contains<E: Entity>(&self, id: u64) -> bool {
        self.find::<E>(id).is_some()
    }

    /// Post ids selected for a user (empty when the user has none)
    pub fn posts_for_user(&self, user_id: u64) -> &[u64] {
        self.user_post_selections
            .get(&user_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Record count per collection, in display order.
    pub fn counts(&self) -> Vec<(EntityKind, usize)> {
        EntityKind::ALL
            .iter()
            .map(|kind| (*kind, self.count(*kind)))
            .collect()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::User => self.users.len(),
            EntityKind::Department => self.departments.len(),
            EntityKind::Office => self.offices.len(),
            EntityKind::Bank => self.banks.len(),
            EntityKind::Branch => self.branches.len(),
            EntityKind::Post => self.posts.len(),
            EntityKind::Payscale => self.payscales.len(),
            EntityKind::Employee => self.employees.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        EntityKind::ALL.iter().all(|kind| self.count(*kind) == 0)
            && self.user_post_selections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_collections_default_to_empty() {
        let data: AppData = serde_json::from_str(r#"{"banks":[{"Bank_ID":1,"Bank_Name":"SBI"}]}"#)
            .expect("partial snapshot should decode");
        assert_eq!(data.banks.len(), 1);
        assert!(data.users.is_empty());
        assert!(data.employees.is_empty());
        assert!(data.user_post_selections.is_empty());
    }

    #[test]
    fn test_selection_keys_decode_as_numbers() {
        let data: AppData =
            serde_json::from_str(r#"{"userPostSelections":{"7":[1,2]}}"#).expect("decode");
        assert_eq!(data.posts_for_user(7), &[1, 2]);
        assert!(data.posts_for_user(8).is_empty());
    }

    #[test]
    fn test_find_and_counts() {
        let mut data = AppData::default();
        assert!(data.is_empty());
        data.banks.push(Bank {
            bank_id: 3,
            name: "Canara".to_string(),
            stamps: Timestamps::default(),
        });
        assert!(data.contains::<Bank>(3));
        assert!(!data.contains::<Bank>(4));
        assert_eq!(data.count(EntityKind::Bank), 1);
        assert!(!data.is_empty());
    }

    #[test]
    fn test_timestamps_omitted_when_unset() {
        let json = serde_json::to_value(Bank {
            bank_id: 1,
            name: "SBI".to_string(),
            stamps: Timestamps::default(),
        })
        .expect("encode");
        assert!(json.get("Created_At").is_none());
        assert_eq!(json["Bank_ID"], 1);
    }
}
