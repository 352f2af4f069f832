use serde::{Deserialize, Serialize};

use super::Timestamps;

/// Account role. Free-form spreadsheet text is normalized during sanitization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum UserType {
    Admin,
    #[default]
    Normal,
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserType::Admin => write!(f, "Admin"),
            UserType::Normal => write!(f, "Normal"),
        }
    }
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct User {
    #[serde(rename = "User_ID", default)]
    pub user_id: u64,
    #[serde(rename = "User_Name", alias = "Name", default)]
    pub name: String,
    /// Stored and compared as plain text by the remote store.
    #[serde(rename = "Password", default)]
    pub password: String,
    #[serde(rename = "User_Type", default)]
    pub user_type: UserType,
    #[serde(flatten)]
    pub stamps: Timestamps,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.user_type == UserType::Admin
    }

    /// Copy of this user safe to keep outside the snapshot.
    pub fn without_password(&self) -> User {
        User {
            password: String::new(),
            ..self.clone()
        }
    }
}

// Keep passwords out of logs
impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("user_id", &self.user_id)
            .field("name", &self.name)
            .field("user_type", &self.user_type)
            .field("stamps", &self.stamps)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Department {
    #[serde(rename = "Department_ID", default)]
    pub department_id: u64,
    #[serde(rename = "Department_Name", alias = "Name", default)]
    pub name: String,
    #[serde(flatten)]
    pub stamps: Timestamps,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Office {
    #[serde(rename = "Office_ID", default)]
    pub office_id: u64,
    #[serde(rename = "Office_Name", alias = "Name", default)]
    pub name: String,
    #[serde(rename = "Block", default)]
    pub block: String,
    /// Assembly constituency number
    #[serde(rename = "AC_No", default)]
    pub ac_no: u64,
    #[serde(rename = "Department_ID", default)]
    pub department_id: u64,
    /// Custodian user
    #[serde(rename = "User_ID", default)]
    pub user_id: u64,
    #[serde(flatten)]
    pub stamps: Timestamps,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Bank {
    #[serde(rename = "Bank_ID", default)]
    pub bank_id: u64,
    #[serde(rename = "Bank_Name", alias = "Name", default)]
    pub name: String,
    #[serde(flatten)]
    pub stamps: Timestamps,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct BankBranch {
    #[serde(rename = "Branch_ID", default)]
    pub branch_id: u64,
    #[serde(rename = "Branch_Name", alias = "Name", default)]
    pub name: String,
    #[serde(rename = "IFSC_Code", default)]
    pub ifsc_code: String,
    #[serde(rename = "Bank_ID", default)]
    pub bank_id: u64,
    #[serde(flatten)]
    pub stamps: Timestamps,
}

/// A designation employees can hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Post {
    #[serde(rename = "Post_ID", default)]
    pub post_id: u64,
    #[serde(rename = "Post_Name", alias = "Name", default)]
    pub name: String,
    #[serde(rename = "Category", default)]
    pub category: String,
    #[serde(rename = "Class", default)]
    pub class: String,
    #[serde(flatten)]
    pub stamps: Timestamps,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Payscale {
    #[serde(rename = "Pay_ID", default)]
    pub pay_id: u64,
    #[serde(rename = "Pay_Name", alias = "Name", default)]
    pub name: String,
    #[serde(flatten)]
    pub stamps: Timestamps,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_accepts_name_alias() {
        let user: User = serde_json::from_str(
            r#"{"User_ID":4,"Name":"clerk","Password":"pw","User_Type":"Admin"}"#,
        )
        .expect("decode user");
        assert_eq!(user.user_id, 4);
        assert_eq!(user.name, "clerk");
        assert!(user.is_admin());
    }

    #[test]
    fn test_user_type_defaults_to_normal() {
        let user: User = serde_json::from_str(r#"{"User_ID":1,"User_Name":"a"}"#).expect("decode");
        assert_eq!(user.user_type, UserType::Normal);
        assert!(!user.is_admin());
    }

    #[test]
    fn test_user_debug_hides_password() {
        let user = User {
            user_id: 1,
            name: "admin".to_string(),
            password: "hunter2".to_string(),
            user_type: UserType::Admin,
            stamps: Timestamps::default(),
        };
        assert!(!format!("{:?}", user).contains("hunter2"));
    }

    #[test]
    fn test_branch_wire_names() {
        let branch = BankBranch {
            branch_id: 2,
            name: "Main".to_string(),
            ifsc_code: "SBIN0000001".to_string(),
            bank_id: 1,
            stamps: Timestamps::default(),
        };
        let json = serde_json::to_value(&branch).expect("encode");
        assert_eq!(json["Branch_ID"], 2);
        assert_eq!(json["IFSC_Code"], "SBIN0000001");
        assert_eq!(json["Bank_ID"], 1);
    }
}
