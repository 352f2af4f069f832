use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{
    AppData, Bank, BankBranch, Department, Employee, Office, Payscale, Post, Timestamps, User,
};

/// The eight record collections held in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum EntityKind {
    User,
    Department,
    Office,
    Bank,
    Branch,
    Post,
    Payscale,
    Employee,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::User,
        EntityKind::Department,
        EntityKind::Office,
        EntityKind::Bank,
        EntityKind::Branch,
        EntityKind::Post,
        EntityKind::Payscale,
        EntityKind::Employee,
    ];

    /// Primary key column name.
    pub fn id_field(&self) -> &'static str {
        match self {
            EntityKind::User => "User_ID",
            EntityKind::Department => "Department_ID",
            EntityKind::Office => "Office_ID",
            EntityKind::Bank => "Bank_ID",
            EntityKind::Branch => "Branch_ID",
            EntityKind::Post => "Post_ID",
            EntityKind::Payscale => "Pay_ID",
            EntityKind::Employee => "Employee_ID",
        }
    }

    /// Key of the collection inside a snapshot payload.
    pub fn collection_key(&self) -> &'static str {
        match self {
            EntityKind::User => "users",
            EntityKind::Department => "departments",
            EntityKind::Office => "offices",
            EntityKind::Bank => "banks",
            EntityKind::Branch => "branches",
            EntityKind::Post => "posts",
            EntityKind::Payscale => "payscales",
            EntityKind::Employee => "employees",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::User => "User",
            EntityKind::Department => "Department",
            EntityKind::Office => "Office",
            EntityKind::Bank => "Bank",
            EntityKind::Branch => "Branch",
            EntityKind::Post => "Post",
            EntityKind::Payscale => "Payscale",
            EntityKind::Employee => "Employee",
        }
    }

    /// Parse a user-supplied kind name, singular or plural, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" | "users" => Some(EntityKind::User),
            "department" | "departments" => Some(EntityKind::Department),
            "office" | "offices" => Some(EntityKind::Office),
            "bank" | "banks" => Some(EntityKind::Bank),
            "branch" | "branches" | "bankbranch" | "bankbranches" => Some(EntityKind::Branch),
            "post" | "posts" | "designation" | "designations" => Some(EntityKind::Post),
            "payscale" | "payscales" => Some(EntityKind::Payscale),
            "employee" | "employees" => Some(EntityKind::Employee),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Per-collection configuration for the generic upsert/delete flows.
pub trait Entity: Clone + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> u64;
    fn set_id(&mut self, id: u64);
    fn stamps(&self) -> &Timestamps;
    fn stamps_mut(&mut self) -> &mut Timestamps;
    fn collection(data: &AppData) -> &[Self];
    fn collection_mut(data: &mut AppData) -> &mut Vec<Self>;
}

macro_rules! impl_entity {
    ($ty:ty, $kind:ident, $id:ident, $collection:ident) => {
        impl Entity for $ty {
            const KIND: EntityKind = EntityKind::$kind;

            fn id(&self) -> u64 {
                self.$id
            }

            fn set_id(&mut self, id: u64) {
                self.$id = id;
            }

            fn stamps(&self) -> &Timestamps {
                &self.stamps
            }

            fn stamps_mut(&mut self) -> &mut Timestamps {
                &mut self.stamps
            }

            fn collection(data: &AppData) -> &[Self] {
                &data.$collection
            }

            fn collection_mut(data: &mut AppData) -> &mut Vec<Self> {
                &mut data.$collection
            }
        }
    };
}

impl_entity!(User, User, user_id, users);
impl_entity!(Department, Department, department_id, departments);
impl_entity!(Office, Office, office_id, offices);
impl_entity!(Bank, Bank, bank_id, banks);
impl_entity!(BankBranch, Branch, branch_id, branches);
impl_entity!(Post, Post, post_id, posts);
impl_entity!(Payscale, Payscale, pay_id, payscales);
impl_entity!(Employee, Employee, employee_id, employees);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!(EntityKind::parse("Offices"), Some(EntityKind::Office));
        assert_eq!(EntityKind::parse("branch"), Some(EntityKind::Branch));
        assert_eq!(EntityKind::parse("designation"), Some(EntityKind::Post));
        assert_eq!(EntityKind::parse(" employee "), Some(EntityKind::Employee));
        assert_eq!(EntityKind::parse("vehicle"), None);
    }

    #[test]
    fn test_id_field_matches_wire_name() {
        for kind in EntityKind::ALL {
            assert!(kind.id_field().ends_with("_ID"), "{} id field", kind);
        }
        assert_eq!(EntityKind::Payscale.id_field(), "Pay_ID");
    }

    #[test]
    fn test_collection_accessors() {
        let mut data = AppData::default();
        Office::collection_mut(&mut data).push(Office {
            office_id: 9,
            ..Office::default()
        });
        assert_eq!(Office::collection(&data).len(), 1);
        assert_eq!(Office::collection(&data)[0].id(), 9);
        assert_eq!(<Office as Entity>::KIND, EntityKind::Office);
    }
}
