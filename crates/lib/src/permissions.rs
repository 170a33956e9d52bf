//! Runtime permissions: the declared set, grant checks, and the request-result summary.
//!
//! The intercept gate only needs `ReceiveSms`; the UI surface asks for the full set before it
//! wires up the in-process channel.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

const PLATFORM_PREFIX: &str = "android.permission.";

/// A platform permission the application declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Permission {
    ReadContacts,
    WriteContacts,
    ReadSms,
    ReceiveSms,
    SendSms,
    CallPhone,
}

/// Everything the UI surface requests before activating the channel.
pub const REQUIRED_PERMISSIONS: [Permission; 6] = [
    Permission::ReadContacts,
    Permission::WriteContacts,
    Permission::ReadSms,
    Permission::ReceiveSms,
    Permission::SendSms,
    Permission::CallPhone,
];

impl Permission {
    /// Short constant name, e.g. `RECEIVE_SMS`.
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::ReadContacts => "READ_CONTACTS",
            Permission::WriteContacts => "WRITE_CONTACTS",
            Permission::ReadSms => "READ_SMS",
            Permission::ReceiveSms => "RECEIVE_SMS",
            Permission::SendSms => "SEND_SMS",
            Permission::CallPhone => "CALL_PHONE",
        }
    }

    /// Fully-qualified platform name, e.g. `android.permission.RECEIVE_SMS`.
    pub fn platform_name(self) -> String {
        format!("{}{}", PLATFORM_PREFIX, self.as_str())
    }

    /// Label shown to the user when a permission is missing.
    pub fn display_name(self) -> &'static str {
        match self {
            Permission::ReadContacts => "Read Contacts",
            Permission::WriteContacts => "Write Contacts",
            Permission::ReadSms => "Read SMS",
            Permission::ReceiveSms => "Receive SMS",
            Permission::SendSms => "Send SMS",
            Permission::CallPhone => "Make Phone Calls",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    /// Accepts `RECEIVE_SMS` or `android.permission.RECEIVE_SMS` (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        let short = t.strip_prefix(PLATFORM_PREFIX).unwrap_or(t);
        REQUIRED_PERMISSIONS
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(short))
            .ok_or_else(|| format!("unknown permission: {}", s))
    }
}

impl TryFrom<String> for Permission {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Permission> for String {
    fn from(p: Permission) -> Self {
        p.as_str().to_string()
    }
}

/// Answers "is this permission currently granted?". Queried on every intercepted event.
pub trait PermissionChecker: Send + Sync {
    fn is_granted(&self, permission: Permission) -> bool;
}

/// In-memory grant set, used by the desktop and CLI surfaces in place of a platform permission service.
#[derive(Debug, Default)]
pub struct GrantedPermissions {
    inner: RwLock<BTreeSet<Permission>>,
}

impl GrantedPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_granted(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            inner: RwLock::new(permissions.into_iter().collect()),
        }
    }

    pub fn grant(&self, permission: Permission) {
        if let Ok(mut g) = self.inner.write() {
            g.insert(permission);
        }
    }

    pub fn revoke(&self, permission: Permission) {
        if let Ok(mut g) = self.inner.write() {
            g.remove(&permission);
        }
    }

    /// Currently granted permissions in declaration order.
    pub fn granted(&self) -> Vec<Permission> {
        self.inner
            .read()
            .map(|g| g.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl PermissionChecker for GrantedPermissions {
    fn is_granted(&self, permission: Permission) -> bool {
        self.inner
            .read()
            .map(|g| g.contains(&permission))
            .unwrap_or(false)
    }
}

/// Permissions from `required` that are not granted, in the order given.
pub fn missing_permissions(checker: &dyn PermissionChecker, required: &[Permission]) -> Vec<Permission> {
    required
        .iter()
        .copied()
        .filter(|p| !checker.is_granted(*p))
        .collect()
}

/// True when every permission in `required` is granted.
pub fn has_all(checker: &dyn PermissionChecker, required: &[Permission]) -> bool {
    required.iter().all(|p| checker.is_granted(*p))
}

/// Result of a permission request round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionOutcome {
    AllGranted,
    Denied(Vec<Permission>),
}

impl PermissionOutcome {
    /// Fold per-permission answers from the request prompt.
    pub fn from_results(results: impl IntoIterator<Item = (Permission, bool)>) -> Self {
        let denied: BTreeSet<Permission> = results
            .into_iter()
            .filter(|(_, granted)| !granted)
            .map(|(p, _)| p)
            .collect();
        if denied.is_empty() {
            PermissionOutcome::AllGranted
        } else {
            PermissionOutcome::Denied(denied.into_iter().collect())
        }
    }

    /// User-facing notice listing denied permissions, one per line; None when all were granted.
    pub fn denied_message(&self) -> Option<String> {
        match self {
            PermissionOutcome::AllGranted => None,
            PermissionOutcome::Denied(denied) => {
                let mut msg = String::from("The following permissions are required: ");
                for p in denied {
                    msg.push('\n');
                    msg.push_str(p.display_name());
                }
                Some(msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_platform_names() {
        assert_eq!("RECEIVE_SMS".parse::<Permission>(), Ok(Permission::ReceiveSms));
        assert_eq!(
            "android.permission.CALL_PHONE".parse::<Permission>(),
            Ok(Permission::CallPhone)
        );
        assert_eq!(" read_sms ".parse::<Permission>(), Ok(Permission::ReadSms));
        assert!("android.permission.CAMERA".parse::<Permission>().is_err());
    }

    #[test]
    fn serde_uses_constant_names() {
        let json = serde_json::to_string(&vec![Permission::ReceiveSms, Permission::ReadContacts]).unwrap();
        assert_eq!(json, r#"["RECEIVE_SMS","READ_CONTACTS"]"#);
        let back: Vec<Permission> =
            serde_json::from_str(r#"["android.permission.SEND_SMS","READ_SMS"]"#).unwrap();
        assert_eq!(back, vec![Permission::SendSms, Permission::ReadSms]);
    }

    #[test]
    fn grant_and_revoke() {
        let perms = GrantedPermissions::new();
        assert!(!perms.is_granted(Permission::ReceiveSms));
        perms.grant(Permission::ReceiveSms);
        assert!(perms.is_granted(Permission::ReceiveSms));
        perms.revoke(Permission::ReceiveSms);
        perms.revoke(Permission::ReceiveSms);
        assert!(perms.granted().is_empty());
    }

    #[test]
    fn missing_keeps_declaration_order() {
        let perms = GrantedPermissions::with_granted([Permission::ReadSms, Permission::ReceiveSms]);
        assert_eq!(
            missing_permissions(&perms, &REQUIRED_PERMISSIONS),
            vec![
                Permission::ReadContacts,
                Permission::WriteContacts,
                Permission::SendSms,
                Permission::CallPhone
            ]
        );
        assert!(!has_all(&perms, &REQUIRED_PERMISSIONS));
        assert!(has_all(&perms, &[Permission::ReceiveSms]));
    }

    #[test]
    fn outcome_message_lists_display_names() {
        let outcome = PermissionOutcome::from_results([
            (Permission::CallPhone, false),
            (Permission::ReceiveSms, true),
            (Permission::ReadSms, false),
        ]);
        assert_eq!(
            outcome,
            PermissionOutcome::Denied(vec![Permission::ReadSms, Permission::CallPhone])
        );
        assert_eq!(
            outcome.denied_message().as_deref(),
            Some("The following permissions are required: \nRead SMS\nMake Phone Calls")
        );
        let ok = PermissionOutcome::from_results([(Permission::ReceiveSms, true)]);
        assert_eq!(ok, PermissionOutcome::AllGranted);
        assert_eq!(ok.denied_message(), None);
    }
}
