use audit_log::PolicyDecisionRecord;

use crate::permission::PermissionSet;

/// The outcome of evaluating an access request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    /// Whether access is granted.
    pub allowed: bool,
    /// Which layer decided, and how.
    pub reason: DecisionReason,
    /// The DAC effective set. `None` when the MAC gate short-circuited.
    pub effective: Option<PermissionSet>,
}

/// Why a decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    /// Bell-LaPadula refused the request; DAC was never consulted.
    MacDenied,
    /// MAC passed and the effective set contains the action.
    DacAllowed,
    /// MAC passed but the effective set lacks the action.
    DacDenied,
}

impl DecisionReason {
    /// Machine-readable label carried in the audit record.
    pub fn label(&self) -> &'static str {
        match self {
            Self::MacDenied => "mac_denied",
            Self::DacAllowed => "dac_allowed",
            Self::DacDenied => "dac_denied",
        }
    }

    /// The policy layer responsible.
    pub fn policy(&self) -> &'static str {
        match self {
            Self::MacDenied => "bell-lapadula",
            Self::DacAllowed | Self::DacDenied => "dac",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::MacDenied => "access denied by Bell-LaPadula policy (MAC)",
            Self::DacAllowed => "access granted (DAC: matrix + resource permissions)",
            Self::DacDenied => "access denied (DAC: matrix + resource permissions)",
        }
    }
}

impl AccessDecision {
    /// Decision for a request stopped at the MAC gate.
    pub fn mac_denied() -> Self {
        Self {
            allowed: false,
            reason: DecisionReason::MacDenied,
            effective: None,
        }
    }

    /// Decision taken by the DAC step over `effective`.
    pub fn dac(allowed: bool, effective: PermissionSet) -> Self {
        Self {
            allowed,
            reason: if allowed {
                DecisionReason::DacAllowed
            } else {
                DecisionReason::DacDenied
            },
            effective: Some(effective),
        }
    }

    /// The record attached to this decision's audit entry.
    pub fn record(&self) -> PolicyDecisionRecord {
        PolicyDecisionRecord {
            outcome: self.reason.label().to_string(),
            policy: Some(self.reason.policy().to_string()),
            reason: self.reason.description().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_denied_has_no_effective_set() {
        let d = AccessDecision::mac_denied();
        assert!(!d.allowed);
        assert_eq!(d.reason, DecisionReason::MacDenied);
        assert!(d.effective.is_none());
    }

    #[test]
    fn dac_reason_follows_outcome() {
        assert_eq!(
            AccessDecision::dac(true, PermissionSet::READ).reason,
            DecisionReason::DacAllowed
        );
        assert_eq!(
            AccessDecision::dac(false, PermissionSet::empty()).reason,
            DecisionReason::DacDenied
        );
    }

    #[test]
    fn denial_reasons_are_distinguishable() {
        let mac = AccessDecision::mac_denied().record();
        let dac = AccessDecision::dac(false, PermissionSet::empty()).record();
        assert_ne!(mac.outcome, dac.outcome);
        assert_ne!(mac.reason, dac.reason);
        assert_eq!(mac.policy.as_deref(), Some("bell-lapadula"));
        assert_eq!(dac.policy.as_deref(), Some("dac"));
    }
}
