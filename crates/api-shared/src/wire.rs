//! Request and response bodies for the story HTTP API.
//!
//! Field names are camelCase on the wire to match the browser client.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Current or dated story text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StoryRes {
    pub story: String,
}

/// Author ledger for one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthorsRes {
    /// `YYYY-MM-DD`
    pub date: String,
    pub names: Vec<String>,
}

/// A contribution as submitted by a client. Every field is optional on the wire so that a
/// missing `word` can be reported as such rather than as a malformed body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DataReq {
    pub word: Option<String>,
    pub name: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataRes {
    pub success: bool,
    pub message: String,
    pub story: String,
    /// Present when the contribution was stored but the visualisation was not notified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PingRes {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
    /// Committed story text, when the failure happened after the commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story: Option<String>,
}

impl ErrorRes {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            story: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_req_accepts_missing_fields() {
        let req: DataReq = serde_json::from_str(r#"{"name":"ann"}"#).expect("deserialize");
        assert_eq!(req.word, None);
        assert_eq!(req.name.as_deref(), Some("ann"));

        let req: DataReq = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(req, DataReq::default());
    }

    #[test]
    fn test_data_res_omits_absent_relay_warning() {
        let res = DataRes {
            success: true,
            message: "ok".into(),
            story: "Once".into(),
            relay_warning: None,
        };
        let json = serde_json::to_value(&res).expect("serialize");
        assert!(json.get("relayWarning").is_none());

        let res = DataRes {
            relay_warning: Some("unreachable".into()),
            ..res
        };
        let json = serde_json::to_value(&res).expect("serialize");
        assert_eq!(json["relayWarning"], "unreachable");
    }
}
