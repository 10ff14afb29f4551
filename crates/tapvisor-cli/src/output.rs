//! Human and JSON rendering of orchestrator results.

use serde::Serialize;
use std::fmt::{Display, Write};
use tapvisor_core::Outcome;
use tapvisor_vm::VmStatus;

/// One line per item, `<kind> <name>: <result>`. Multi-line results are
/// indented under their item.
pub fn render_outcomes<T: Display>(kind: &str, outcomes: &[Outcome<T>]) -> String {
    let mut out = String::new();
    for outcome in outcomes {
        let text = match &outcome.result {
            Ok(action) => action.to_string(),
            Err(e) => format!("error: {e}"),
        };
        let mut lines = text.lines();
        let first = lines.next().unwrap_or_default();
        let _ = writeln!(out, "{kind} {}: {first}", outcome.name);
        for line in lines {
            let _ = writeln!(out, "    {line}");
        }
    }
    out
}

pub fn render_status(statuses: &[(String, VmStatus)]) -> String {
    let width = statuses.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    let mut out = String::new();
    for (name, status) in statuses {
        let _ = writeln!(out, "{name:<width$}  {status}");
    }
    out
}

#[derive(Serialize)]
struct StatusEntry<'a> {
    name: &'a str,
    #[serde(flatten)]
    status: &'a VmStatus,
}

pub fn status_json(statuses: &[(String, VmStatus)]) -> serde_json::Result<String> {
    let entries: Vec<StatusEntry<'_>> = statuses
        .iter()
        .map(|(name, status)| StatusEntry { name, status })
        .collect();
    serde_json::to_string_pretty(&entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tapvisor_core::{CoreError, NetworkAction, VmAction};
    use tapvisor_net::ConvergeReport;

    #[test]
    fn test_render_outcomes() {
        let outcomes = vec![
            Outcome {
                name: "db".into(),
                result: Ok(VmAction::Started(12)),
            },
            Outcome {
                name: "web".into(),
                result: Err(CoreError::UnknownVm("web".into())),
            },
        ];
        assert_eq!(
            render_outcomes("vm", &outcomes),
            "vm db: started (pid 12)\nvm web: error: unknown VM: web\n"
        );
    }

    #[test]
    fn test_render_multiline_report() {
        let report = ConvergeReport {
            device: "bridge1".into(),
            created: true,
            added: vec!["tap0".into()],
            brought_up: true,
            ..Default::default()
        };
        let outcomes = vec![Outcome {
            name: "lan".into(),
            result: Ok(NetworkAction::Converged(report)),
        }];
        assert_eq!(
            render_outcomes("network", &outcomes),
            "network lan: bridge1: created\n    bridge1: added member tap0\n    bridge1: up\n"
        );
    }

    #[test]
    fn test_render_status() {
        let statuses = vec![
            ("a".to_string(), VmStatus::Running(10)),
            ("web".to_string(), VmStatus::NotFound),
        ];
        assert_eq!(
            render_status(&statuses),
            "a    running (pid 10)\nweb  PID file not found\n"
        );
    }

    #[test]
    fn test_status_json() {
        let statuses = vec![
            ("a".to_string(), VmStatus::Running(10)),
            ("b".to_string(), VmStatus::Stopped(11)),
            ("c".to_string(), VmStatus::NotFound),
        ];
        let json: serde_json::Value = serde_json::from_str(&status_json(&statuses).unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"name": "a", "state": "running", "pid": 10},
                {"name": "b", "state": "stopped", "pid": 11},
                {"name": "c", "state": "not_found"},
            ])
        );
    }
}
