//! Referential integrity rules for deletes.
//!
//! A record may only be deleted when no other record points at it. Rules are
//! checked in table order and the first non-empty dependent set wins.

use crate::error::SyncError;
use crate::models::{AppData, EntityKind};

type Counter = fn(&AppData, u64) -> usize;

/// (target, dependent, count of dependents referencing the target id)
const BLOCKERS: &[(EntityKind, EntityKind, Counter)] = &[
    (EntityKind::User, EntityKind::Office, |data, id| {
        data.offices.iter().filter(|o| o.user_id == id).count()
    }),
    (EntityKind::Department, EntityKind::Office, |data, id| {
        data.offices.iter().filter(|o| o.department_id == id).count()
    }),
    (EntityKind::Office, EntityKind::Employee, |data, id| {
        data.employees.iter().filter(|e| e.office_id == id).count()
    }),
    (EntityKind::Bank, EntityKind::Branch, |data, id| {
        data.branches.iter().filter(|b| b.bank_id == id).count()
    }),
    (EntityKind::Bank, EntityKind::Employee, |data, id| {
        data.employees.iter().filter(|e| e.bank_id == id).count()
    }),
    (EntityKind::Branch, EntityKind::Employee, |data, id| {
        data.employees.iter().filter(|e| e.branch_id == id).count()
    }),
    (EntityKind::Post, EntityKind::Employee, |data, id| {
        data.employees.iter().filter(|e| e.post_id == id).count()
    }),
    (EntityKind::Payscale, EntityKind::Employee, |data, id| {
        data.employees.iter().filter(|e| e.pay_id == id).count()
    }),
];

/// First dependent collection still referencing `kind #id`, with its count.
///
/// Id 0 is the "unassigned" foreign key, so nothing can reference it.
pub fn first_blocker(data: &AppData, kind: EntityKind, id: u64) -> Option<(EntityKind, usize)> {
    if id == 0 {
        return None;
    }
    BLOCKERS
        .iter()
        .filter(|(target, _, _)| *target == kind)
        .map(|(_, dependent, count)| (*dependent, count(data, id)))
        .find(|(_, count)| *count > 0)
}

pub fn check_delete(data: &AppData, kind: EntityKind, id: u64) -> Result<(), SyncError> {
    match first_blocker(data, kind, id) {
        Some((dependent, count)) => Err(SyncError::ReferentialIntegrityViolation {
            kind,
            id,
            dependent,
            count,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BankBranch, Employee, Office};

    fn fixture() -> AppData {
        let mut data = AppData::default();
        data.branches.push(BankBranch {
            branch_id: 2,
            bank_id: 1,
            ..BankBranch::default()
        });
        data.offices.push(Office {
            office_id: 5,
            department_id: 3,
            user_id: 7,
            ..Office::default()
        });
        data.employees.push(Employee {
            employee_id: 10,
            office_id: 5,
            bank_id: 4,
            branch_id: 2,
            post_id: 8,
            pay_id: 9,
            ..Employee::default()
        });
        data
    }

    #[test]
    fn test_bank_blocked_by_branch() {
        let err = check_delete(&fixture(), EntityKind::Bank, 1).unwrap_err();
        assert!(matches!(
            err,
            SyncError::ReferentialIntegrityViolation {
                kind: EntityKind::Bank,
                id: 1,
                dependent: EntityKind::Branch,
                count: 1,
            }
        ));
    }

    #[test]
    fn test_bank_blocked_by_employee_when_no_branches() {
        assert_eq!(
            first_blocker(&fixture(), EntityKind::Bank, 4),
            Some((EntityKind::Employee, 1))
        );
    }

    #[test]
    fn test_each_reference_blocks() {
        let data = fixture();
        assert_eq!(first_blocker(&data, EntityKind::User, 7), Some((EntityKind::Office, 1)));
        assert_eq!(first_blocker(&data, EntityKind::Department, 3), Some((EntityKind::Office, 1)));
        assert_eq!(first_blocker(&data, EntityKind::Office, 5), Some((EntityKind::Employee, 1)));
        assert_eq!(first_blocker(&data, EntityKind::Branch, 2), Some((EntityKind::Employee, 1)));
        assert_eq!(first_blocker(&data, EntityKind::Post, 8), Some((EntityKind::Employee, 1)));
        assert_eq!(first_blocker(&data, EntityKind::Payscale, 9), Some((EntityKind::Employee, 1)));
    }

    #[test]
    fn test_unreferenced_records_are_deletable() {
        let data = fixture();
        for kind in EntityKind::ALL {
            assert!(check_delete(&data, kind, 999).is_ok(), "{} #999", kind);
        }
        // Nothing references employees
        assert!(check_delete(&data, EntityKind::Employee, 10).is_ok());
    }

    #[test]
    fn test_unassigned_references_do_not_block_id_zero() {
        let mut data = fixture();
        data.offices.push(Office {
            office_id: 6,
            ..Office::default()
        });
        data.employees.push(Employee {
            employee_id: 11,
            ..Employee::default()
        });

        for kind in EntityKind::ALL {
            assert_eq!(first_blocker(&data, kind, 0), None, "{} #0", kind);
        }
    }
}
