//! CSV and JSON export of audit entries.

use crate::entry::AuditEntry;
use crate::error::{AuditError, AuditResult};

/// Serialize entries as a JSON array.
///
/// # Errors
///
/// Returns [`AuditError::Export`] if serialization fails.
pub fn to_json(entries: &[AuditEntry]) -> AuditResult<String> {
    serde_json::to_string_pretty(entries).map_err(|e| AuditError::Export(e.to_string()))
}

/// Serialize entries as CSV with a fixed column order matching the
/// entry shape: `id,type,severity,message,owner,ip,metadata,at`.
///
/// # Errors
///
/// Returns [`AuditError::Export`] if a field cannot be written.
pub fn to_csv(entries: &[AuditEntry]) -> AuditResult<String> {
    let mut out = String::from("id,type,severity,message,owner,ip,metadata,at\n");
    for entry in entries {
        let owner = entry.owner.as_ref().map(ToString::to_string).unwrap_or_default();
        let ip = entry.ip.clone().unwrap_or_default();
        let metadata = entry
            .metadata
            .as_ref()
            .map(|v| serde_json::to_string(v).unwrap_or_default())
            .unwrap_or_default();
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            entry.id,
            entry.event_type,
            entry.severity,
            csv_escape(&entry.message),
            csv_escape(&owner),
            csv_escape(&ip),
            csv_escape(&metadata),
            entry.at,
        ));
    }
    Ok(out)
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use sentry_crypto::{ContentHash, KeyPair};

    use super::*;
    use crate::entry::{EventType, NewAuditEntry, Severity};

    fn sample() -> AuditEntry {
        let kp = KeyPair::generate();
        AuditEntry::sign(
            NewAuditEntry {
                event_type: EventType::CredentialAccessed,
                severity: Severity::Info,
                message: "read, with a comma".into(),
                owner: None,
                ip: Some("127.0.0.1".into()),
                metadata: None,
            },
            ContentHash::zero(),
            &kp,
        )
    }

    #[test]
    fn json_export_round_trips() {
        let entries = vec![sample()];
        let json = to_json(&entries).unwrap();
        let parsed: Vec<AuditEntry> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, entries[0].id);
    }

    #[test]
    fn csv_export_escapes_commas() {
        let entries = vec![sample()];
        let csv = to_csv(&entries).unwrap();
        assert!(csv.contains("\"read, with a comma\""));
        assert!(csv.starts_with("id,type,severity,message,owner,ip,metadata,at\n"));
    }
}
