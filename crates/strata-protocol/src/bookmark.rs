//! Bookmark serialization: the persisted form of a protocol.
//!
//! A bookmark is the effective record subsequence as a JSON array of
//! `{command, targetChartId, arguments}` objects. Invalidated records are
//! never persisted. Loading tolerates unknown extra fields (older bookmarks
//! opened by newer builds and vice versa) but rejects unknown command kinds
//! outright: silently dropping a command would replay a different view.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::command::{ChartId, CommandKind};
use crate::error::ProtocolError;
use crate::protocol::CommandProtocol;
use crate::record::ProtocolRecord;
use crate::Result;

/// Wire form of one effective record.
///
/// `command` stays a plain string here so an unknown kind surfaces as
/// [`ProtocolError::UnknownCommand`] with the offending name, not a generic
/// serde variant error.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookmarkRecord {
    command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_chart_id: Option<String>,
    #[serde(default)]
    arguments: Vec<String>,
}

/// Serialize the effective records of `protocol` as bookmark JSON.
pub fn to_json(protocol: &CommandProtocol) -> Result<String> {
    let records: Vec<BookmarkRecord> = protocol
        .effective()
        .map(|rec| BookmarkRecord {
            command: rec.command.to_string(),
            target_chart_id: rec.target.as_ref().map(|t| t.to_string()),
            arguments: rec.args.clone(),
        })
        .collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

/// Parse bookmark JSON into a protocol of effective records.
pub fn from_json(json: &str) -> Result<CommandProtocol> {
    let records: Vec<BookmarkRecord> = serde_json::from_str(json)?;
    let mut protocol = CommandProtocol::new();
    for rec in records {
        let command: CommandKind = rec
            .command
            .parse()
            .map_err(|_| ProtocolError::UnknownCommand(rec.command.clone()))?;
        protocol.append(ProtocolRecord::new(
            command,
            rec.target_chart_id.map(ChartId::from),
            rec.arguments,
        ));
    }
    Ok(protocol)
}

/// Write `protocol` to `path` as a bookmark file.
pub fn save(protocol: &CommandProtocol, path: impl AsRef<Path>) -> Result<()> {
    std::fs::write(path, to_json(protocol)?)?;
    Ok(())
}

/// Load a bookmark file into a protocol.
pub fn load(path: impl AsRef<Path>) -> Result<CommandProtocol> {
    from_json(&std::fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CommandProtocol {
        let mut log = CommandProtocol::new();
        log.append_command(
            CommandKind::LoadBaseChartData,
            Some("base".into()),
            vec!["filter:cpu".into(), "compute:none".into()],
        );
        log.append_command(CommandKind::PushBaseToBackground, Some("bg-1".into()), vec![]);
        log.append_command(
            CommandKind::ChangeChartColor,
            Some("bg-1".into()),
            vec!["#336699".into()],
        );
        log.append_command(CommandKind::ForceAlignYAxis, None, vec![]);
        log
    }

    #[test]
    fn test_roundtrip_preserves_effective_records() {
        let original = sample();
        let json = to_json(&original).unwrap();
        let loaded = from_json(&json).unwrap();

        let a: Vec<_> = original.effective().collect();
        let b: Vec<_> = loaded.effective().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalidated_records_are_not_persisted() {
        let mut log = sample();
        log.invalidate(2).unwrap();

        let json = to_json(&log).unwrap();
        assert!(!json.contains("ChangeChartColor"));

        let loaded = from_json(&json).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.effective_len(), 3);
    }

    #[test]
    fn test_unknown_fields_are_tolerated() {
        let json = r#"[
            {"command": "ClearAll", "arguments": [], "addedByFutureVersion": 42}
        ]"#;
        let loaded = from_json(json).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get(0).unwrap().command, CommandKind::ClearAll);
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        let json = r#"[{"command": "RotateChart", "arguments": []}]"#;
        match from_json(json) {
            Err(ProtocolError::UnknownCommand(name)) => assert_eq!(name, "RotateChart"),
            other => panic!("expected UnknownCommand, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_target_deserializes_as_none() {
        let json = r#"[{"command": "FreeAlignYAxis"}]"#;
        let loaded = from_json(json).unwrap();
        assert_eq!(loaded.get(0).unwrap().target, None);
        assert!(loaded.get(0).unwrap().args.is_empty());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("view.bookmark.json");

        let original = sample();
        save(&original, &path).unwrap();
        let loaded = load(&path).unwrap();

        let a: Vec<_> = original.effective().collect();
        let b: Vec<_> = loaded.effective().collect();
        assert_eq!(a, b);
    }
}
