//! In-process mock of the Snowflake session REST endpoints.
//!
//! Implements just enough of login, statement execution (with a tiny table store and
//! transactions) and logout to drive the uploader end to end.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use csv_snowflake_loader::warehouse::ConnectionParams;
use serde_json::{Value, json};

pub const PASSWORD: &str = "correct-horse";
pub const TOKEN: &str = "mock-session-token";
pub const NO_ACCESS_ROLE: &str = "NO_ACCESS";

#[derive(Debug, Clone, Default)]
pub struct MockTable {
    pub ddl: String,
    pub rows: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub logins: usize,
    pub logouts: usize,
    pub statements: Vec<String>,
    pub tables: HashMap<String, MockTable>,
    /// Binding type tags of every INSERT, in order.
    pub insert_binding_types: Vec<Vec<String>>,
    /// Fail the n-th INSERT (1-based).
    pub fail_on_insert: Option<usize>,
    /// Answer the next statement with "still running" and make the client poll.
    pub defer_next: bool,
    /// Reply to logins with this HTML page instead of a JSON envelope.
    pub login_html: Option<String>,
    /// Accept logins but leave the token out of the response.
    pub login_without_token: bool,
    inserts_seen: usize,
    staged: Option<HashMap<String, MockTable>>,
    parked: HashMap<String, Value>,
    next_query: u64,
}

impl MockState {
    pub fn table(&self, name: &str) -> Option<&MockTable> {
        self.tables.get(name)
    }

    pub fn insert_count(&self) -> usize {
        self.statements
            .iter()
            .filter(|s| s.starts_with("INSERT"))
            .count()
    }
}

pub struct MockSnowflake {
    pub base_url: String,
    pub state: Arc<Mutex<MockState>>,
}

impl MockSnowflake {
    /// Start the mock on an ephemeral loopback port.
    pub fn start() -> Self {
        let state = Arc::new(Mutex::new(MockState::default()));
        let app = Router::new()
            .route("/session/v1/login-request", post(login))
            .route("/queries/v1/query-request", post(query))
            .route("/queries/:id/result", get(result))
            .route("/session", post(logout))
            .with_state(state.clone());

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                axum::serve(listener, app).await.unwrap();
            });
        });

        Self { base_url, state }
    }

    pub fn params(&self) -> ConnectionParams {
        ConnectionParams {
            user: "LOADER".to_string(),
            password: PASSWORD.to_string(),
            account: "xy12345.us-east-1".to_string(),
            warehouse: "LOAD_WH".to_string(),
            database: "ANALYTICS".to_string(),
            schema: "PUBLIC".to_string(),
            role: "LOADER_ROLE".to_string(),
            host: Some(self.base_url.clone()),
            request_timeout_secs: Some(30),
        }
    }

    pub fn with_state<T>(&self, f: impl FnOnce(&mut MockState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }
}

type SharedState = Arc<Mutex<MockState>>;

async fn login(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let mut st = state.lock().unwrap();
    st.logins += 1;
    if let Some(html) = &st.login_html {
        return Html(html.clone()).into_response();
    }
    let data = &body["data"];
    if data["PASSWORD"].as_str() != Some(PASSWORD) {
        return Json(failure(
            "390100",
            "Incorrect username or password was specified.",
        ))
        .into_response();
    }
    if params.get("roleName").map(String::as_str) == Some(NO_ACCESS_ROLE) {
        return Json(failure(
            "390189",
            "Role 'NO_ACCESS' specified in the connect string is not granted to this user.",
        ))
        .into_response();
    }
    let data = if st.login_without_token {
        json!({"sessionId": 4242})
    } else {
        json!({"token": TOKEN, "masterToken": "mock-master", "sessionId": 4242})
    };
    Json(json!({"data": data, "code": null, "message": null, "success": true})).into_response()
}

async fn query(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut st = state.lock().unwrap();
    let sql = body["sqlText"].as_str().unwrap_or_default().to_string();
    let response = run_statement(&mut st, &sql, body.get("bindings"));

    if std::mem::take(&mut st.defer_next) {
        st.next_query += 1;
        let id = format!("deferred-{}", st.next_query);
        st.parked.insert(id.clone(), response);
        return Json(json!({
            "data": {"queryId": id, "getResultUrl": format!("/queries/{id}/result")},
            "code": "333333",
            "message": "Asynchronous execution in progress.",
            "success": true
        }))
        .into_response();
    }
    Json(response).into_response()
}

async fn result(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match state.lock().unwrap().parked.remove(&id) {
        Some(response) => Json(response).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn logout(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    state.lock().unwrap().logouts += 1;
    Json(json!({"data": null, "code": null, "message": null, "success": true})).into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Snowflake Token=\"{TOKEN}\""))
}

fn run_statement(st: &mut MockState, sql: &str, bindings: Option<&Value>) -> Value {
    st.statements.push(sql.to_string());
    st.next_query += 1;
    let query_id = format!("query-{}", st.next_query);
    let upper = sql.trim().to_ascii_uppercase();

    if upper.starts_with("SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLES") {
        let name = bindings
            .and_then(|b| b["1"]["value"].as_str())
            .unwrap_or_default();
        let count = usize::from(st.tables.contains_key(name));
        return rows(&query_id, json!([[count.to_string()]]));
    }
    if upper.starts_with("CREATE ") {
        let name = table_name(sql, "IF NOT EXISTS ");
        st.tables.entry(name).or_insert_with(|| MockTable {
            ddl: sql.to_string(),
            rows: Vec::new(),
        });
        return rows(&query_id, json!([["Table successfully created."]]));
    }
    match upper.as_str() {
        "BEGIN" => {
            st.staged = Some(st.tables.clone());
            return rows(&query_id, json!([]));
        }
        "COMMIT" => {
            if let Some(staged) = st.staged.take() {
                st.tables = staged;
            }
            return rows(&query_id, json!([]));
        }
        "ROLLBACK" => {
            st.staged = None;
            return rows(&query_id, json!([]));
        }
        _ => {}
    }

    let tables = match st.staged.as_mut() {
        Some(staged) => staged,
        None => &mut st.tables,
    };
    if upper.starts_with("DELETE FROM ") {
        let name = normalize(sql["DELETE FROM ".len()..].trim());
        return match tables.get_mut(&name) {
            Some(table) => {
                let deleted = table.rows.len();
                table.rows.clear();
                rows(&query_id, json!([[deleted]]))
            }
            None => missing_table(&name),
        };
    }
    if upper.starts_with("INSERT INTO ") {
        st.inserts_seen += 1;
        if st.fail_on_insert == Some(st.inserts_seen) {
            return failure("100038", "Numeric value 'oops' is not recognized");
        }
        let name = table_name(sql, "INSERT INTO ");
        let (types, new_rows) = transpose_bindings(bindings);
        st.insert_binding_types.push(types);
        let tables = match st.staged.as_mut() {
            Some(staged) => staged,
            None => &mut st.tables,
        };
        return match tables.get_mut(&name) {
            Some(table) => {
                let inserted = new_rows.len();
                table.rows.extend(new_rows);
                rows(&query_id, json!([[inserted]]))
            }
            None => missing_table(&name),
        };
    }
    rows(&query_id, json!([]))
}

/// Column-major array bindings to row-major rows.
fn transpose_bindings(bindings: Option<&Value>) -> (Vec<String>, Vec<Vec<Option<String>>>) {
    let Some(map) = bindings.and_then(Value::as_object) else {
        return (Vec::new(), Vec::new());
    };
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort_by_key(|k| k.parse::<usize>().unwrap_or(usize::MAX));

    let types = keys
        .iter()
        .map(|k| map[*k]["type"].as_str().unwrap_or_default().to_string())
        .collect();
    let columns: Vec<&Vec<Value>> = keys
        .iter()
        .filter_map(|k| map[*k]["value"].as_array())
        .collect();
    let nrows = columns.first().map_or(0, |c| c.len());
    let rows = (0..nrows)
        .map(|i| {
            columns
                .iter()
                .map(|c| c[i].as_str().map(str::to_string))
                .collect()
        })
        .collect();
    (types, rows)
}

/// Table identifier following `marker`, up to the column list.
fn table_name(sql: &str, marker: &str) -> String {
    let start = sql.find(marker).map_or(0, |i| i + marker.len());
    let rest = &sql[start..];
    let end = rest.find(" (").unwrap_or(rest.len());
    normalize(rest[..end].trim())
}

/// Quoted identifiers keep their case; unquoted ones fold to upper case.
fn normalize(ident: &str) -> String {
    match ident.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(inner) => inner.replace("\"\"", "\""),
        None => ident.to_ascii_uppercase(),
    }
}

fn rows(query_id: &str, rowset: Value) -> Value {
    json!({
        "data": {
            "queryId": query_id,
            "rowtype": [{"name": "status", "type": "text"}],
            "rowset": rowset
        },
        "code": null,
        "message": null,
        "success": true
    })
}

fn missing_table(name: &str) -> Value {
    failure(
        "002003",
        &format!("Table '{name}' does not exist or not authorized."),
    )
}

fn failure(code: &str, message: &str) -> Value {
    json!({"data": null, "code": code, "message": message, "success": false})
}
