//! Wire types of the analysis protocol
//!
//! Submission body: the snapshot plus `streaming` and `session_id`. The service
//! acknowledges with `{success, error?}` and then publishes frames of the form
//! `{type, message?, data?}` on the session's stream.

use crate::correlation::{AnalysisSnapshot, CorrelationReport};
use crate::error::{DashboardError, Result};
use serde::{Deserialize, Serialize};

/// Analysis submission body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(flatten)]
    pub snapshot: AnalysisSnapshot,

    #[serde(default, skip_serializing_if = "is_false")]
    pub streaming: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl AnalysisRequest {
    pub fn streaming(snapshot: AnalysisSnapshot, session_id: impl Into<String>) -> Self {
        Self {
            snapshot,
            streaming: true,
            session_id: Some(session_id.into()),
        }
    }

    pub fn blocking(snapshot: AnalysisSnapshot) -> Self {
        Self {
            snapshot,
            streaming: false,
            session_id: None,
        }
    }

    /// The same payload as a non-streaming request
    pub fn into_blocking(self) -> Self {
        Self::blocking(self.snapshot)
    }
}

/// Acknowledgement of a streaming submission
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmitAck {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmitAck {
    pub fn accepted() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(reason.into()),
        }
    }

    pub fn into_result(self) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(DashboardError::Rejected(
                self.error.unwrap_or_else(|| "submission rejected".to_string()),
            ))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    Progress,
    Result,
    Complete,
    Error,
    Heartbeat,
    #[serde(other)]
    Unknown,
}

/// One message on a session stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamFrame {
    #[serde(rename = "type")]
    pub kind: FrameKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl StreamFrame {
    fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            message: None,
            data: None,
        }
    }

    pub fn progress(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(FrameKind::Progress)
        }
    }

    pub fn result(report: &CorrelationReport) -> Result<Self> {
        Ok(Self {
            data: Some(serde_json::to_value(report)?),
            ..Self::new(FrameKind::Result)
        })
    }

    pub fn complete() -> Self {
        Self::new(FrameKind::Complete)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(FrameKind::Error)
        }
    }

    pub fn heartbeat() -> Self {
        Self::new(FrameKind::Heartbeat)
    }

    /// Decode the report carried by a `result` frame
    pub fn decode_report(&self) -> Result<CorrelationReport> {
        let data = self
            .data
            .as_ref()
            .ok_or_else(|| DashboardError::Malformed("result frame without data".to_string()))?;
        Ok(CorrelationReport::deserialize(data)?.with_derived_summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ElementKind, FailureCategory};

    #[test]
    fn test_request_body_shape() {
        let request = AnalysisRequest::streaming(AnalysisSnapshot::default(), "session_1_0");
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["streaming"], true);
        assert_eq!(body["session_id"], "session_1_0");
        assert!(body["nodes"].is_array());
        assert!(body["alarms"].is_array());

        let blocking = serde_json::to_value(request.into_blocking()).unwrap();
        assert!(blocking.get("streaming").is_none());
        assert!(blocking.get("session_id").is_none());
    }

    #[test]
    fn test_ack_into_result() {
        assert!(SubmitAck::accepted().into_result().is_ok());
        let err = SubmitAck::rejected("queue full").into_result().unwrap_err();
        assert!(matches!(err, DashboardError::Rejected(msg) if msg == "queue full"));

        let ack: SubmitAck = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert!(ack.into_result().is_err());
    }

    #[test]
    fn test_frame_kinds() {
        let frame: StreamFrame =
            serde_json::from_str(r#"{"type": "progress", "message": "stage 1"}"#).unwrap();
        assert_eq!(frame.kind, FrameKind::Progress);
        assert_eq!(frame.message.as_deref(), Some("stage 1"));

        let frame: StreamFrame = serde_json::from_str(r#"{"type": "mystery"}"#).unwrap();
        assert_eq!(frame.kind, FrameKind::Unknown);
    }

    #[test]
    fn test_result_frame_carries_report() {
        let report = CorrelationReport {
            analyzed_nodes: 3,
            ..Default::default()
        };
        let frame = StreamFrame::result(&report).unwrap();
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains(r#""type":"result""#));
        assert_eq!(frame.decode_report().unwrap(), report);
    }

    #[test]
    fn test_result_frame_in_service_shape() {
        let frame: StreamFrame = serde_json::from_value(serde_json::json!({
            "type": "result",
            "data": {
                "success": true,
                "failure_points": [
                    {
                        "type": "link",
                        "id": "EQ-100-EQ-300",
                        "name": "EQ-100 - EQ-300",
                        "failure_type": "링크 장애",
                        "inference_detail": "선로 피해 발생",
                        "alarms": [{"equip_id": "EQ-100"}, {"equip_id": "EQ-300"}],
                        "confidence": 0.9
                    },
                    {
                        "type": "node",
                        "id": "EQ-200",
                        "name": "EQ-200",
                        "failure_type": "교환 A1930 상위장애",
                        "inference_detail": "AGW 단독고장으로 공통부 확인 필요",
                        "alarms": [],
                        "confidence": 0.7
                    }
                ],
                "summary": {"total_failure_points": 2, "node_failures": 1, "link_failures": 1},
                "total_analyzed_nodes": 4,
                "total_analyzed_links": 3,
                "total_analyzed_alarms": 5
            }
        }))
        .unwrap();

        let report = frame.decode_report().unwrap();
        assert_eq!(report.analyzed_nodes, 4);
        assert_eq!(report.analyzed_alarms, 5);

        let link = &report.failure_points[0];
        assert_eq!(link.target_id, "EQ-100-EQ-300");
        assert_eq!(link.kind, ElementKind::Link);
        assert_eq!(link.category, FailureCategory::LineFailure);
        assert_eq!(link.alarm_count, 2);

        let node = &report.failure_points[1];
        assert_eq!(node.kind, ElementKind::Node);
        assert_eq!(node.category, FailureCategory::ExchangeFailure);

        assert_eq!(report.summary.line_failures, 1);
        assert_eq!(report.summary.exchange_failures, 1);
    }

    #[test]
    fn test_result_frame_without_data() {
        let frame: StreamFrame = serde_json::from_str(r#"{"type": "result"}"#).unwrap();
        assert!(matches!(frame.decode_report(), Err(DashboardError::Malformed(_))));
    }
}
