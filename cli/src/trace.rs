// Observation traces: JSON Lines files replayed through the predictor
//
// One tagged event per line:
//   {"type":"node","id":"a","address":"10.0.0.1:9000","reliability":0.9}
//   {"type":"observe","from":"a","to":"b","success":true,"latency":12.5}
//   {"type":"resolve"}
//   {"type":"refresh"}
// Blank lines and lines starting with '#' are skipped.

use anyhow::{Context, Result};
use meshsight_core::{Node, ObservationMetadata, SharedPredictor};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEvent {
    Node {
        id: String,
        address: String,
        #[serde(default)]
        reliability: Option<f64>,
        #[serde(default)]
        capabilities: Vec<String>,
        #[serde(default)]
        latency_ms: Option<f64>,
        #[serde(default)]
        bandwidth: Option<f64>,
    },
    Observe {
        from: String,
        to: String,
        success: bool,
        #[serde(default)]
        latency: Option<f64>,
        #[serde(default)]
        bandwidth: Option<f64>,
    },
    Resolve,
    Refresh,
}

/// Counts collected while replaying a trace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub nodes: usize,
    pub observations: usize,
    /// Events the predictor refused (logged at warn)
    pub rejected: usize,
    pub resolutions: usize,
    pub refreshes: usize,
}

pub fn parse_trace(contents: &str) -> Result<Vec<TraceEvent>> {
    let mut events = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event: TraceEvent = serde_json::from_str(line)
            .with_context(|| format!("Invalid trace event on line {}", index + 1))?;
        events.push(event);
    }
    Ok(events)
}

pub async fn read_trace(path: &Path) -> Result<Vec<TraceEvent>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read trace {}", path.display()))?;
    parse_trace(&contents).with_context(|| format!("Failed to parse trace {}", path.display()))
}

/// Feed every event into `predictor`, in order
pub fn replay(predictor: &SharedPredictor, events: &[TraceEvent]) -> ReplaySummary {
    let mut summary = ReplaySummary::default();

    for event in events {
        match event {
            TraceEvent::Node {
                id,
                address,
                reliability,
                capabilities,
                latency_ms,
                bandwidth,
            } => {
                let mut node = Node::new(id.clone(), address.clone());
                if let Some(reliability) = reliability {
                    node = node.with_reliability(*reliability);
                }
                for capability in capabilities {
                    node = node.with_capability(capability.clone());
                }
                if let Some(latency) = latency_ms {
                    node = node.with_latency(*latency);
                }
                if let Some(bandwidth) = bandwidth {
                    node = node.with_bandwidth(*bandwidth);
                }
                match predictor.add_node(node) {
                    Ok(()) => summary.nodes += 1,
                    Err(_) => summary.rejected += 1,
                }
            }
            TraceEvent::Observe {
                from,
                to,
                success,
                latency,
                bandwidth,
            } => {
                let metadata = if latency.is_some() || bandwidth.is_some() {
                    Some(ObservationMetadata {
                        latency: *latency,
                        bandwidth: *bandwidth,
                    })
                } else {
                    None
                };
                match predictor.observe(from, to, *success, metadata) {
                    Ok(()) => summary.observations += 1,
                    Err(_) => summary.rejected += 1,
                }
            }
            TraceEvent::Resolve => {
                predictor.resolve_topology();
                summary.resolutions += 1;
            }
            TraceEvent::Refresh => {
                let report = predictor.refresh_paths();
                if !report.unreachable.is_empty() {
                    warn!("{} anticipated route(s) unreachable", report.unreachable.len());
                }
                summary.refreshes += 1;
            }
        }
    }

    debug!("Replayed {} trace event(s): {:?}", events.len(), summary);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# two nodes and a solid link
{"type":"node","id":"a","address":"10.0.0.1:9000","capabilities":["relay"]}
{"type":"node","id":"b","address":"10.0.0.2:9000","reliability":0.9}

{"type":"observe","from":"a","to":"b","success":true,"latency":12.5}
{"type":"observe","from":"a","to":"b","success":false}
{"type":"resolve"}
{"type":"refresh"}
"#;

    #[test]
    fn test_parse_skips_blank_and_comment_lines() {
        let events = parse_trace(SAMPLE).unwrap();
        assert_eq!(events.len(), 6);
        assert_eq!(
            events[2],
            TraceEvent::Observe {
                from: "a".to_string(),
                to: "b".to_string(),
                success: true,
                latency: Some(12.5),
                bandwidth: None,
            }
        );
        assert_eq!(events[4], TraceEvent::Resolve);
    }

    #[test]
    fn test_parse_reports_line_number() {
        let contents = "{\"type\":\"resolve\"}\n\n{\"type\":\"observe\",\"from\":\"a\"}\n";
        let err = parse_trace(contents).unwrap_err();
        assert!(err.to_string().contains("line 3"), "{}", err);

        assert!(parse_trace("{\"type\":\"teleport\"}").is_err());
    }

    #[test]
    fn test_replay_counts_events() {
        let predictor = SharedPredictor::default();
        let mut events = parse_trace(SAMPLE).unwrap();
        events.push(TraceEvent::Observe {
            from: String::new(),
            to: "b".to_string(),
            success: true,
            latency: None,
            bandwidth: None,
        });

        let summary = replay(&predictor, &events);
        assert_eq!(
            summary,
            ReplaySummary {
                nodes: 2,
                observations: 2,
                rejected: 1,
                resolutions: 1,
                refreshes: 1,
            }
        );

        let guard = predictor.read();
        assert!(guard.node("a").unwrap().has_capability("relay"));
        assert_eq!(guard.node("b").unwrap().reliability, 0.9);
        assert_eq!(guard.connection("a", "b").unwrap().observation_count, 2);
    }

    #[tokio::test]
    async fn test_read_trace_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        std::fs::write(&path, SAMPLE).unwrap();

        let events = read_trace(&path).await.unwrap();
        assert_eq!(events.len(), 6);

        assert!(read_trace(&dir.path().join("missing.jsonl")).await.is_err());
    }
}
