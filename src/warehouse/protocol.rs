//! Wire types for the Snowflake session REST endpoints.
//!
//! Every response uses the same envelope: `{"data": …, "code": …, "message": …, "success": …}`.
//! `data` is kept as raw JSON until `success` is known, because failed responses carry a
//! different payload shape than successful ones.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

/// Login endpoint path.
pub const LOGIN_PATH: &str = "/session/v1/login-request";
/// Statement endpoint path.
pub const QUERY_PATH: &str = "/queries/v1/query-request";
/// Session teardown path (with `delete=true`).
pub const SESSION_PATH: &str = "/session";

/// Incorrect user name or password.
pub const CODE_BAD_CREDENTIALS: &str = "390100";
/// Role named in the connect string is not granted to the user.
pub const CODE_ROLE_NOT_GRANTED: &str = "390189";
/// Requested object does not exist or is not authorized.
pub const CODE_OBJECT_NOT_AUTHORIZED: &str = "390201";
/// Statement still running; poll `getResultUrl`.
pub const CODE_QUERY_IN_PROGRESS: &str = "333333";
/// Statement still running (asynchronous variant); poll `getResultUrl`.
pub const CODE_QUERY_IN_PROGRESS_ASYNC: &str = "333334";

/// Response envelope shared by all endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub data: Option<JsonValue>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub success: bool,
}

impl Envelope {
    /// Warehouse error code, or `"unknown"` when absent.
    pub fn code_or_unknown(&self) -> String {
        self.code.clone().unwrap_or_else(|| "unknown".to_string())
    }

    /// Warehouse message, or a generic one when absent.
    pub fn message_or_default(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "request was not successful".to_string())
    }

    /// `true` when the statement is still running and must be polled.
    pub fn in_progress(&self) -> bool {
        matches!(
            self.code.as_deref(),
            Some(CODE_QUERY_IN_PROGRESS) | Some(CODE_QUERY_IN_PROGRESS_ASYNC)
        )
    }

    /// Deserialize `data` into `T`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T> {
        let data = self
            .data
            .clone()
            .ok_or_else(|| Error::protocol("response has no data"))?;
        serde_json::from_value(data)
            .map_err(|e| Error::protocol(format!("unexpected response data: {e}")))
    }
}

/// Body of a login request.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub data: LoginRequestData<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct LoginRequestData<'a> {
    pub client_app_id: &'a str,
    pub client_app_version: &'a str,
    pub account_name: &'a str,
    pub login_name: &'a str,
    pub password: &'a str,
    pub client_environment: ClientEnvironment<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ClientEnvironment<'a> {
    pub application: &'a str,
    pub os: &'a str,
}

/// `data` of a successful login.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponseData {
    pub token: String,
    #[serde(default)]
    pub master_token: Option<String>,
    #[serde(default)]
    pub session_id: Option<i64>,
}

/// Body of a statement request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest<'a> {
    pub sql_text: &'a str,
    pub sequence_id: u64,
    pub async_exec: bool,
    pub query_submission_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bindings: Option<&'a Bindings>,
}

/// Column metadata of a statement result.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    #[serde(rename = "type", default)]
    pub column_type: Option<String>,
}

/// `data` of a statement response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponseData {
    #[serde(default)]
    pub query_id: Option<String>,
    #[serde(default)]
    pub rowtype: Vec<ColumnMeta>,
    #[serde(default)]
    pub rowset: Vec<Vec<JsonValue>>,
    #[serde(default)]
    pub get_result_url: Option<String>,
}

/// Positional statement bindings, keyed `"1"`, `"2"`, ….
pub type Bindings = BTreeMap<String, Binding>;

/// One bound parameter.
///
/// An array value binds a whole batch of rows for that parameter at once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Binding {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: BindingValue,
}

/// Scalar or array binding payload. Values travel as strings; `None` binds SQL `NULL`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BindingValue {
    Scalar(Option<String>),
    Array(Vec<Option<String>>),
}

impl Binding {
    /// A single text parameter.
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            kind: "TEXT",
            value: BindingValue::Scalar(Some(value.into())),
        }
    }
}

/// Build positional bindings from an ordered list.
pub fn positional(bindings: impl IntoIterator<Item = Binding>) -> Bindings {
    bindings
        .into_iter()
        .enumerate()
        .map(|(idx, b)| ((idx + 1).to_string(), b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn array_bindings_serialize_nulls() {
        let bindings = positional(vec![Binding {
            kind: "FIXED",
            value: BindingValue::Array(vec![Some("1".to_string()), None]),
        }]);
        let rendered = serde_json::to_value(&bindings).unwrap();
        assert_eq!(rendered, json!({"1": {"type": "FIXED", "value": ["1", null]}}));
    }

    #[test]
    fn failed_envelope_keeps_code_and_message() {
        let env: Envelope = serde_json::from_value(json!({
            "data": {"nextAction": "RETRY_LOGIN"},
            "code": "390100",
            "message": "Incorrect username or password was specified.",
            "success": false
        }))
        .unwrap();
        assert!(!env.success);
        assert_eq!(env.code_or_unknown(), CODE_BAD_CREDENTIALS);
        assert!(env.data_as::<LoginResponseData>().is_err());
    }

    #[test]
    fn query_data_defaults_missing_fields() {
        let env: Envelope = serde_json::from_value(json!({
            "data": {"queryId": "01b2", "rowset": [["2"]]},
            "code": null,
            "message": null,
            "success": true
        }))
        .unwrap();
        let data: QueryResponseData = env.data_as().unwrap();
        assert_eq!(data.query_id.as_deref(), Some("01b2"));
        assert_eq!(data.rowset, vec![vec![json!("2")]]);
        assert!(data.rowtype.is_empty());
    }
}
