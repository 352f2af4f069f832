use serde::{Deserialize, Serialize};

use super::Timestamps;

fn default_active() -> bool {
    true
}

/// An employee record. Foreign-key fields use `0` for "not assigned".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Employee {
    #[serde(rename = "Employee_ID", default)]
    pub employee_id: u64,
    #[serde(rename = "Employee_Name", alias = "Name", default)]
    pub name: String,
    #[serde(rename = "Employee_Surname", alias = "Surname", default)]
    pub surname: String,
    #[serde(rename = "Gender", default)]
    pub gender: String,
    /// Date of birth as entered in the sheet
    #[serde(rename = "DOB", default)]
    pub dob: String,
    /// Person with disability
    #[serde(rename = "PwD", default)]
    pub pwd: bool,
    #[serde(rename = "Service_Type", default)]
    pub service_type: String,
    #[serde(rename = "Active", default = "default_active")]
    pub active: bool,
    #[serde(rename = "Office_ID", default)]
    pub office_id: u64,
    #[serde(rename = "Post_ID", default)]
    pub post_id: u64,
    #[serde(rename = "Pay_ID", default)]
    pub pay_id: u64,
    #[serde(rename = "Bank_ID", default)]
    pub bank_id: u64,
    #[serde(rename = "Branch_ID", default)]
    pub branch_id: u64,
    #[serde(flatten)]
    pub stamps: Timestamps,
}

impl Default for Employee {
    fn default() -> Self {
        Self {
            employee_id: 0,
            name: String::new(),
            surname: String::new(),
            gender: String::new(),
            dob: String::new(),
            pwd: false,
            service_type: String::new(),
            active: default_active(),
            office_id: 0,
            post_id: 0,
            pay_id: 0,
            bank_id: 0,
            branch_id: 0,
            stamps: Timestamps::default(),
        }
    }
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.surname).trim().to_string()
    }
}
