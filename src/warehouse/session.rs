use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ConnectionFailure, Error, Result};

use super::config::ConnectionParams;
use super::protocol::{
    self, Bindings, ClientEnvironment, Envelope, LoginRequest, LoginRequestData, LoginResponseData,
    QueryRequest, QueryResponseData,
};

const CLIENT_APP_ID: &str = env!("CARGO_PKG_NAME");
const CLIENT_APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Result of one statement.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// Warehouse-assigned query id, when reported.
    pub query_id: Option<String>,
    /// Result column names.
    pub columns: Vec<String>,
    /// Result rows; cells are rendered as strings, `None` for SQL `NULL`.
    pub rows: Vec<Vec<Option<String>>>,
}

impl QueryResult {
    /// First cell of the first row, if any.
    pub fn first_value(&self) -> Option<&str> {
        self.rows.first()?.first()?.as_deref()
    }

    fn from_data(data: QueryResponseData) -> Self {
        let rows = data
            .rowset
            .into_iter()
            .map(|row| row.into_iter().map(json_cell_to_string).collect())
            .collect();
        Self {
            query_id: data.query_id,
            columns: data.rowtype.into_iter().map(|c| c.name).collect(),
            rows,
        }
    }
}

fn json_cell_to_string(cell: JsonValue) -> Option<String> {
    match cell {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// A single live, authenticated connection to a warehouse account.
///
/// The session is owned exclusively by its creator. Release it with [`Session::close`]; if a
/// session is dropped without being closed (early return or panic), `Drop` logs it out.
pub struct Session {
    client: Client,
    base_url: String,
    token: String,
    session_id: Option<i64>,
    sequence_id: u64,
    closed: bool,
}

impl Session {
    /// Authenticate with `params` and open a session.
    ///
    /// Fails with [`Error::Connection`] when the endpoint is unreachable, the credentials are
    /// rejected, or the role lacks privileges on the requested objects.
    pub fn open(params: &ConnectionParams) -> Result<Self> {
        params.validate()?;
        let base_url = params.base_url();
        let client = build_client(params.request_timeout())?;

        let request_id = Uuid::new_v4().to_string();
        let body = LoginRequest {
            data: LoginRequestData {
                client_app_id: CLIENT_APP_ID,
                client_app_version: CLIENT_APP_VERSION,
                account_name: params.account_name(),
                login_name: &params.user,
                password: &params.password,
                client_environment: ClientEnvironment {
                    application: CLIENT_APP_ID,
                    os: std::env::consts::OS,
                },
            },
        };

        debug!(
            "Logging in to {base_url} as {} (warehouse={}, database={}, schema={}, role={})",
            params.user, params.warehouse, params.database, params.schema, params.role
        );

        let response = client
            .post(format!("{base_url}{}", protocol::LOGIN_PATH))
            .query(&[
                ("request_id", request_id.as_str()),
                ("warehouse", params.warehouse.as_str()),
                ("databaseName", params.database.as_str()),
                ("schemaName", params.schema.as_str()),
                ("roleName", params.role.as_str()),
            ])
            .json(&body)
            .send()
            .map_err(|e| unreachable_error(&base_url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Connection {
                failure: ConnectionFailure::Unreachable,
                message: format!("login to {base_url} returned HTTP {status}"),
            });
        }

        // A non-JSON answer means something other than the account endpoint replied.
        let envelope: Envelope = response.json().map_err(|e| Error::Connection {
            failure: ConnectionFailure::Unreachable,
            message: format!("invalid login response from {base_url}: {e}"),
        })?;
        if !envelope.success {
            return Err(Error::Connection {
                failure: classify_login_failure(envelope.code.as_deref()),
                message: format!(
                    "[{}] {}",
                    envelope.code_or_unknown(),
                    envelope.message_or_default()
                ),
            });
        }

        let data: LoginResponseData = envelope.data_as().map_err(|e| Error::Connection {
            failure: ConnectionFailure::Rejected,
            message: format!("login accepted without a session token: {e}"),
        })?;
        info!(
            "Session opened on {base_url} (session id {:?})",
            data.session_id
        );

        Ok(Self {
            client,
            base_url,
            token: data.token,
            session_id: data.session_id,
            sequence_id: 0,
            closed: false,
        })
    }

    /// Warehouse-assigned session id, when reported at login.
    pub fn session_id(&self) -> Option<i64> {
        self.session_id
    }

    /// Run a statement without bindings.
    pub fn execute(&mut self, sql: &str) -> Result<QueryResult> {
        self.run(sql, None)
    }

    /// Run a statement with positional bindings.
    pub fn execute_with_bindings(&mut self, sql: &str, bindings: &Bindings) -> Result<QueryResult> {
        self.run(sql, Some(bindings))
    }

    fn run(&mut self, sql: &str, bindings: Option<&Bindings>) -> Result<QueryResult> {
        self.sequence_id += 1;
        let body = QueryRequest {
            sql_text: sql,
            sequence_id: self.sequence_id,
            async_exec: false,
            query_submission_time: unix_millis(),
            bindings,
        };
        debug!("Executing statement #{}: {sql}", self.sequence_id);

        let request_id = Uuid::new_v4().to_string();
        let mut envelope: Envelope = self
            .authorized(
                self.client
                    .post(format!("{}{}", self.base_url, protocol::QUERY_PATH)),
            )
            .query(&[("requestId", request_id.as_str())])
            .json(&body)
            .send()?
            .error_for_status()?
            .json()?;

        while envelope.in_progress() {
            let data: QueryResponseData = envelope.data_as()?;
            let result_url = data
                .get_result_url
                .ok_or_else(|| Error::protocol("statement in progress without a result URL"))?;
            debug!("Statement #{} still running, polling {result_url}", self.sequence_id);
            std::thread::sleep(POLL_INTERVAL);
            envelope = self
                .authorized(self.client.get(format!("{}{result_url}", self.base_url)))
                .send()?
                .error_for_status()?
                .json()?;
        }

        if !envelope.success {
            return Err(Error::Statement {
                code: envelope.code_or_unknown(),
                message: envelope.message_or_default(),
            });
        }

        let data: QueryResponseData = match envelope.data {
            Some(_) => envelope.data_as()?,
            None => QueryResponseData::default(),
        };
        Ok(QueryResult::from_data(data))
    }

    /// Log out and release the session.
    pub fn close(mut self) -> Result<()> {
        let result = self.logout();
        self.closed = true;
        result
    }

    fn logout(&mut self) -> Result<()> {
        let envelope: Envelope = self
            .authorized(
                self.client
                    .post(format!("{}{}", self.base_url, protocol::SESSION_PATH)),
            )
            .query(&[("delete", "true")])
            .send()?
            .error_for_status()?
            .json()?;
        if !envelope.success {
            return Err(Error::Statement {
                code: envelope.code_or_unknown(),
                message: envelope.message_or_default(),
            });
        }
        info!("Session {:?} closed", self.session_id);
        Ok(())
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(AUTHORIZATION, format!("Snowflake Token=\"{}\"", self.token))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.logout() {
            warn!("Failed to log out session {:?} on drop: {e}", self.session_id);
        }
    }
}

/// Open a session, run `f`, and close the session on every exit path.
///
/// The closure's result is returned. A logout failure is logged and never replaces it.
pub fn with_session<T, F>(params: &ConnectionParams, f: F) -> Result<T>
where
    F: FnOnce(&mut Session) -> Result<T>,
{
    let mut session = Session::open(params)?;
    let result = f(&mut session);
    if let Err(e) = session.close() {
        warn!("Failed to close session: {e}");
    }
    result
}

fn build_client(timeout: Option<Duration>) -> Result<Client> {
    let mut headers = HeaderMap::with_capacity(2);
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        )),
    );
    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|e| Error::config(format!("cannot build HTTP client: {e}")))
}

fn unreachable_error(base_url: &str, e: reqwest::Error) -> Error {
    Error::Connection {
        failure: ConnectionFailure::Unreachable,
        message: format!("cannot reach {base_url}: {e}"),
    }
}

fn classify_login_failure(code: Option<&str>) -> ConnectionFailure {
    match code {
        Some(protocol::CODE_BAD_CREDENTIALS) => ConnectionFailure::Authentication,
        Some(protocol::CODE_ROLE_NOT_GRANTED) | Some(protocol::CODE_OBJECT_NOT_AUTHORIZED) => {
            ConnectionFailure::Authorization
        }
        _ => ConnectionFailure::Rejected,
    }
}

fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
