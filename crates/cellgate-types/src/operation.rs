//! Operation catalogue and its static lookup tables.
//!
//! Every table is an exhaustive `match`, so adding an operation without
//! classifying it is a compile error rather than a silent tier-2 default.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::dependencies::Dependency;

/// Sensitivity class of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OpTier {
    /// Public, auth-only.
    Tier0,
    /// Low value; tolerates an advisory risk outage.
    Tier1,
    /// High value; strictly fail-closed.
    Tier2,
}

impl fmt::Display for OpTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpTier::Tier0 => write!(f, "Tier-0"),
            OpTier::Tier1 => write!(f, "Tier-1"),
            OpTier::Tier2 => write!(f, "Tier-2"),
        }
    }
}

/// Every operation the core knows how to authorize.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ViewPublic,
    ViewProfileBasic,
    ViewBalance,
    ViewTransactionHistory,
    LowValueAction,
    ViewPii,
    ExportData,
    ChangePermissions,
    HighValueAction,
    IssueToken,
    RotateKeys,
    Transfer,
    TransferMoney,
    AddBeneficiary,
}

use Dependency::{Audit, Auth, Kms, Policy, Risk};

impl Operation {
    pub const ALL: [Operation; 14] = [
        Operation::ViewPublic,
        Operation::ViewProfileBasic,
        Operation::ViewBalance,
        Operation::ViewTransactionHistory,
        Operation::LowValueAction,
        Operation::ViewPii,
        Operation::ExportData,
        Operation::ChangePermissions,
        Operation::HighValueAction,
        Operation::IssueToken,
        Operation::RotateKeys,
        Operation::Transfer,
        Operation::TransferMoney,
        Operation::AddBeneficiary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ViewPublic => "view_public",
            Operation::ViewProfileBasic => "view_profile_basic",
            Operation::ViewBalance => "view_balance",
            Operation::ViewTransactionHistory => "view_transaction_history",
            Operation::LowValueAction => "low_value_action",
            Operation::ViewPii => "view_pii",
            Operation::ExportData => "export_data",
            Operation::ChangePermissions => "change_permissions",
            Operation::HighValueAction => "high_value_action",
            Operation::IssueToken => "issue_token",
            Operation::RotateKeys => "rotate_keys",
            Operation::Transfer => "transfer",
            Operation::TransferMoney => "transfer_money",
            Operation::AddBeneficiary => "add_beneficiary",
        }
    }

    pub fn tier(&self) -> OpTier {
        match self {
            Operation::ViewPublic => OpTier::Tier0,
            Operation::ViewProfileBasic
            | Operation::ViewBalance
            | Operation::ViewTransactionHistory
            | Operation::LowValueAction => OpTier::Tier1,
            Operation::ViewPii
            | Operation::ExportData
            | Operation::ChangePermissions
            | Operation::HighValueAction
            | Operation::IssueToken
            | Operation::RotateKeys
            | Operation::Transfer
            | Operation::TransferMoney
            | Operation::AddBeneficiary => OpTier::Tier2,
        }
    }

    /// Dependencies that must be healthy for this operation.
    pub fn required_dependencies(&self) -> &'static [Dependency] {
        match self {
            Operation::ViewPublic
            | Operation::ViewProfileBasic
            | Operation::ViewBalance
            | Operation::ViewTransactionHistory
            | Operation::LowValueAction => &[Auth],
            Operation::ViewPii => &[Auth, Policy],
            Operation::ExportData => &[Auth, Policy, Audit, Kms],
            Operation::ChangePermissions => &[Auth, Policy, Audit],
            Operation::HighValueAction
            | Operation::Transfer
            | Operation::TransferMoney
            | Operation::AddBeneficiary => &[Auth, Policy, Risk, Audit],
            Operation::IssueToken => &[Auth, Policy, Risk],
            Operation::RotateKeys => &[Auth, Policy, Kms, Audit],
        }
    }

    pub fn requires(&self, dependency: Dependency) -> bool {
        self.required_dependencies().contains(&dependency)
    }

    /// Security-critical writes never queue and carry a stricter velocity limit.
    pub fn is_security_critical(&self) -> bool {
        self.tier() == OpTier::Tier2
    }

    /// Reads served from the replicated read-safe model.
    pub fn is_safe_read(&self) -> bool {
        matches!(
            self,
            Operation::ViewProfileBasic | Operation::ViewBalance | Operation::ViewTransactionHistory
        )
    }

    /// Reads that must be served in the user's residency region.
    pub fn requires_home_residency(&self) -> bool {
        matches!(self, Operation::ViewPii | Operation::ExportData)
    }

    /// Operations the sensitive vault path is willing to evaluate. A closed
    /// subset of Tier-2; other Tier-2 ops are gated by tiering alone.
    pub fn is_vault_op(&self) -> bool {
        matches!(
            self,
            Operation::ExportData
                | Operation::ChangePermissions
                | Operation::TransferMoney
                | Operation::AddBeneficiary
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("unknown operation '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_operation_requires_auth() {
        for op in Operation::ALL {
            assert!(op.requires(Dependency::Auth), "{op} must require auth");
        }
    }

    #[test]
    fn safe_reads_are_tier_one() {
        for op in Operation::ALL.iter().filter(|op| op.is_safe_read()) {
            assert_eq!(op.tier(), OpTier::Tier1);
            assert!(!op.is_vault_op());
        }
    }

    #[test]
    fn vault_ops_are_a_closed_tier_two_subset() {
        let vault: Vec<Operation> = Operation::ALL
            .into_iter()
            .filter(|op| op.is_vault_op())
            .collect();
        assert_eq!(
            vault,
            vec![
                Operation::ExportData,
                Operation::ChangePermissions,
                Operation::TransferMoney,
                Operation::AddBeneficiary,
            ]
        );
        assert!(vault.iter().all(|op| op.tier() == OpTier::Tier2));
        assert!(!Operation::ViewPii.is_vault_op());
        assert!(!Operation::IssueToken.is_vault_op());
    }

    #[test]
    fn issue_token_requires_risk() {
        assert_eq!(Operation::IssueToken.tier(), OpTier::Tier2);
        assert!(Operation::IssueToken.requires(Dependency::Risk));
        assert!(!Operation::IssueToken.requires(Dependency::Audit));
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
        assert!("drop_tables".parse::<Operation>().is_err());
    }
}
