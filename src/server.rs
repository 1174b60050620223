use chrono::NaiveDate;
use futures::future::try_join_all;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, Write};
use tokio::io::AsyncBufReadExt;

use crate::http::{
    decode_offset_cursor, encode_offset_cursor, encode_path_segment, ApiError, Envelope,
    OffsetCursor, Pipeline,
};
use crate::mcp::mcp_wrap;
use crate::shape;
use crate::tools::*;

/// Page cap for fetch-all loops so a runaway cursor cannot spin forever.
const FETCH_ALL_PAGE_CAP: usize = 25;
/// Upper bound on the bulk balance fan-out.
const MAX_BULK_LOOKUPS: usize = 20;

// Minimal JSON-RPC 2.0 types
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Id {
    Str(String),
    Num(i64),
    Null,
}

#[derive(Debug, Serialize, Deserialize)]
struct Request {
    jsonrpc: String,
    method: String,
    #[serde(default)]
    params: Value,
    id: Option<Id>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Response {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
    id: Option<Id>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

fn rpc_error(id: Option<Id>, code: i64, message: &str, data: Option<Value>) -> Response {
    Response {
        jsonrpc: "2.0".into(),
        result: None,
        error: Some(RpcError {
            code,
            message: message.into(),
            data,
        }),
        id,
    }
}

fn rpc_ok(id: Option<Id>, result: Value) -> Response {
    Response {
        jsonrpc: "2.0".into(),
        result: Some(result),
        error: None,
        id,
    }
}

/// Serve line-delimited JSON-RPC over stdio until EOF. Each request is
/// handled to completion before the next line is read; per-request failures
/// become `isError` tool results, never a process exit.
pub async fn run_stdio_server(pipeline: &Pipeline) -> anyhow::Result<()> {
    info!(
        "Starting hibob-mcp stdio server; protocol={}",
        PROTOCOL_VERSION
    );
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let req: Request = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                let resp = rpc_error(None, -32700, &format!("Parse error: {}", e), None);
                write_response(&resp)?;
                continue;
            }
        };
        debug!("Received method={}", req.method);
        if req.method.starts_with("notifications/") {
            continue;
        }
        let resp = dispatch(pipeline, req).await;
        write_response(&resp)?;
    }
    Ok(())
}

fn write_response(resp: &Response) -> anyhow::Result<()> {
    let mut out = io::stdout();
    let payload = serde_json::to_string(resp)?;
    writeln!(out, "{}", payload)?;
    out.flush()?;
    Ok(())
}

async fn dispatch(pipeline: &Pipeline, req: Request) -> Response {
    match req.method.as_str() {
        "initialize" => handle_initialize(req.id),
        "ping" => rpc_ok(req.id, serde_json::json!({})),
        "tools/list" => handle_tools_list(req.id),
        "tools/call" => handle_tools_call(pipeline, req.id, req.params).await,
        other => rpc_error(req.id, -32601, &format!("Method not found: {}", other), None),
    }
}

fn handle_initialize(id: Option<Id>) -> Response {
    rpc_ok(
        id,
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": "hibob-mcp",
                "version": env!("CARGO_PKG_VERSION"),
            }
        }),
    )
}

fn handle_tools_list(id: Option<Id>) -> Response {
    let tools = tool_descriptors();
    rpc_ok(id, serde_json::json!({ "tools": tools }))
}

#[derive(Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

async fn handle_tools_call(pipeline: &Pipeline, id: Option<Id>, params: Value) -> Response {
    let parsed: Result<ToolCallParams, _> = serde_json::from_value(params);
    let Ok(call) = parsed else {
        return rpc_error(id, -32602, "Invalid params", None);
    };
    match call.name.as_str() {
        "ping" if ping_enabled() => handle_ping(id, call.arguments),
        "list_employees" => handle_list_employees(pipeline, id, call.arguments).await,
        "get_employee" => handle_get_employee(pipeline, id, call.arguments).await,
        "search_employees" => handle_search_employees(pipeline, id, call.arguments).await,
        "list_timeoff_requests" => handle_list_timeoff_requests(pipeline, id, call.arguments).await,
        "whos_out" => handle_whos_out(pipeline, id, call.arguments).await,
        "get_timeoff_balance" => handle_get_timeoff_balance(pipeline, id, call.arguments).await,
        "get_timeoff_balances" => handle_get_timeoff_balances(pipeline, id, call.arguments).await,
        "list_payslips" => handle_list_payslips(pipeline, id, call.arguments).await,
        "list_tasks" => handle_list_tasks(pipeline, id, call.arguments).await,
        "list_departments" => handle_list_departments(pipeline, id, call.arguments).await,
        "get_company_holidays" => handle_get_company_holidays(pipeline, id, call.arguments).await,
        _ => rpc_error(id, -32601, &format!("Tool not found: {}", call.name), None),
    }
}

fn handle_ping(id: Option<Id>, params: Value) -> Response {
    let input: PingInput = match serde_json::from_value(params) {
        Ok(v) => v,
        Err(_) => PingInput { message: None },
    };
    let message = input.message.unwrap_or_else(|| "pong".to_string());
    tool_ok(id, &PingOutput { message })
}

fn enforce_limit(limit: Option<u32>) -> Result<u32, String> {
    let l = limit.unwrap_or(30);
    if l == 0 || l > 100 {
        return Err("limit must be 1..=100".into());
    }
    Ok(l)
}

fn invalid_params(id: Option<Id>, e: impl std::fmt::Display) -> Response {
    rpc_error(id, -32602, &format!("Invalid params: {}", e), None)
}

fn tool_ok<T: Serialize>(id: Option<Id>, out: &T) -> Response {
    let structured = serde_json::to_value(out).unwrap_or_default();
    rpc_ok(id, mcp_wrap(structured, None, false))
}

fn tool_error(id: Option<Id>, err: &ApiError) -> Response {
    let shape: ErrorShape = err.to_error_info().into();
    let message = shape.message.clone();
    let structured = serde_json::json!({
        "meta": Meta::none(),
        "error": shape,
    });
    rpc_ok(id, mcp_wrap(structured, Some(message), true))
}

fn tool_missing(id: Option<Id>, what: &str) -> Response {
    let shape = ErrorShape {
        code: "not_found".into(),
        message: format!("{} not found", what),
        retriable: false,
    };
    let message = shape.message.clone();
    let structured = serde_json::json!({
        "meta": Meta::none(),
        "error": shape,
    });
    rpc_ok(id, mcp_wrap(structured, Some(message), true))
}

/// Meta for the page-object and link pagination families.
fn page_meta(envelope: &Envelope) -> Meta {
    Meta {
        next_cursor: shape::next_cursor(envelope),
        has_more: shape::has_more(envelope),
        total: envelope
            .page
            .as_ref()
            .and_then(|p| p.total.or(p.total_rows)),
    }
}

/// Meta for the offset/limit family: the continuation token is derived from
/// the page counters rather than handed back by the upstream.
fn offset_meta(envelope: &Envelope, offset: u64, limit: u32) -> Meta {
    let total = envelope
        .page
        .as_ref()
        .and_then(|p| p.total.or(p.total_rows));
    let served = envelope
        .page
        .as_ref()
        .and_then(|p| p.limit)
        .unwrap_or(i64::from(limit))
        .max(0) as u64;
    let next_offset = offset + served;
    let has_more = total.is_some_and(|t| next_offset < t.max(0) as u64);
    Meta {
        next_cursor: has_more.then(|| {
            encode_offset_cursor(&OffsetCursor {
                offset: next_offset,
                limit,
            })
        }),
        has_more,
        total,
    }
}

fn employee_item(record: &Value) -> EmployeeItem {
    EmployeeItem {
        id: shape::text(record, "id").unwrap_or_default(),
        display_name: shape::text(record, "displayName"),
        email: shape::text(record, "email"),
        department: shape::text(record, "department"),
        site: shape::text(record, "site"),
        start_date: shape::text(record, "startDate"),
    }
}

fn employee_detail(record: &Value) -> EmployeeDetailItem {
    EmployeeDetailItem {
        id: shape::text(record, "id").unwrap_or_default(),
        display_name: shape::text(record, "displayName"),
        email: shape::text(record, "email"),
        department: shape::text(record, "department"),
        site: shape::text(record, "site"),
        title: shape::text(record, "title"),
        manager_id: shape::text(record, "managerId"),
        start_date: shape::text(record, "startDate"),
        employment_type: shape::text(record, "employmentType"),
        is_active: shape::boolean(record, "isActive"),
    }
}

async fn handle_list_employees(p: &Pipeline, id: Option<Id>, params: Value) -> Response {
    let input: ListEmployeesInput = match serde_json::from_value(params) {
        Ok(v) => v,
        Err(e) => return invalid_params(id, e),
    };
    let limit = match enforce_limit(input.limit) {
        Ok(l) => l,
        Err(m) => return rpc_error(id, -32602, &m, None),
    };
    let query = [
        ("limit", Some(limit.to_string())),
        ("cursor", input.cursor),
        ("department", input.department),
        ("showInactive", input.include_inactive.map(|b| b.to_string())),
    ];
    match p.get_json("/people", &query).await {
        Ok(env) => {
            let items: Vec<EmployeeItem> = shape::records(&env.data).iter().map(employee_item).collect();
            let meta = page_meta(&env);
            tool_ok(
                id,
                &ListEmployeesOutput {
                    items: Some(items),
                    meta,
                    error: None,
                },
            )
        }
        Err(e) => tool_error(id, &e),
    }
}

async fn handle_get_employee(p: &Pipeline, id: Option<Id>, params: Value) -> Response {
    let input: GetEmployeeInput = match serde_json::from_value(params) {
        Ok(v) => v,
        Err(e) => return invalid_params(id, e),
    };
    if input.employee_id.is_empty() {
        return rpc_error(id, -32602, "employee_id must not be empty", None);
    }
    let path = format!("/people/{}", encode_path_segment(&input.employee_id));
    match p.get_json(&path, &[]).await {
        Ok(env) => {
            let records = shape::records(&env.data);
            match records.first() {
                Some(record) => tool_ok(
                    id,
                    &GetEmployeeOutput {
                        item: Some(employee_detail(record)),
                        meta: Meta::none(),
                        error: None,
                    },
                ),
                None => tool_missing(id, "Employee"),
            }
        }
        Err(e) => tool_error(id, &e),
    }
}

async fn handle_search_employees(p: &Pipeline, id: Option<Id>, params: Value) -> Response {
    let input: SearchEmployeesInput = match serde_json::from_value(params) {
        Ok(v) => v,
        Err(e) => return invalid_params(id, e),
    };
    let limit = match enforce_limit(input.limit) {
        Ok(l) => l,
        Err(m) => return rpc_error(id, -32602, &m, None),
    };
    let query = [
        ("query", Some(input.query)),
        ("limit", Some(limit.to_string())),
        ("cursor", input.cursor),
    ];
    match p.get_json("/people/search", &query).await {
        Ok(env) => {
            let items: Vec<EmployeeItem> = shape::records(&env.data).iter().map(employee_item).collect();
            let meta = page_meta(&env);
            tool_ok(
                id,
                &ListEmployeesOutput {
                    items: Some(items),
                    meta,
                    error: None,
                },
            )
        }
        Err(e) => tool_error(id, &e),
    }
}

fn timeoff_item(record: &Value) -> TimeoffRequestItem {
    TimeoffRequestItem {
        id: shape::text(record, "id").unwrap_or_default(),
        employee_id: shape::text(record, "employeeId"),
        policy_type: shape::text(record, "policyType"),
        start_date: shape::text(record, "startDate"),
        end_date: shape::text(record, "endDate"),
        status: shape::text(record, "status"),
    }
}

async fn handle_list_timeoff_requests(p: &Pipeline, id: Option<Id>, params: Value) -> Response {
    let input: ListTimeoffRequestsInput = match serde_json::from_value(params) {
        Ok(v) => v,
        Err(e) => return invalid_params(id, e),
    };
    let limit = match enforce_limit(input.limit) {
        Ok(l) => l,
        Err(m) => return rpc_error(id, -32602, &m, None),
    };
    let query = |cursor: Option<String>| {
        [
            ("employeeId", input.employee_id.clone()),
            ("from", input.from.clone()),
            ("to", input.to.clone()),
            ("status", input.status.clone()),
            ("limit", Some(limit.to_string())),
            ("cursor", cursor),
        ]
    };

    if input.fetch_all.unwrap_or(false) {
        // Cursor-family pagination: follow the token until it disappears.
        let mut items = Vec::new();
        let mut cursor = input.cursor.clone();
        for _ in 0..FETCH_ALL_PAGE_CAP {
            match p.get_json("/timeoff/requests", &query(cursor.clone())).await {
                Ok(env) => {
                    items.extend(shape::records(&env.data).iter().map(timeoff_item));
                    cursor = shape::next_cursor(&env);
                    if cursor.is_none() {
                        break;
                    }
                }
                Err(e) => return tool_error(id, &e),
            }
        }
        let meta = Meta {
            next_cursor: cursor.clone(),
            has_more: cursor.is_some(),
            total: None,
        };
        return tool_ok(
            id,
            &ListTimeoffRequestsOutput {
                items: Some(items),
                meta,
                error: None,
            },
        );
    }

    match p.get_json("/timeoff/requests", &query(input.cursor.clone())).await {
        Ok(env) => {
            let items: Vec<TimeoffRequestItem> =
                shape::records(&env.data).iter().map(timeoff_item).collect();
            let meta = page_meta(&env);
            tool_ok(
                id,
                &ListTimeoffRequestsOutput {
                    items: Some(items),
                    meta,
                    error: None,
                },
            )
        }
        Err(e) => tool_error(id, &e),
    }
}

async fn handle_whos_out(p: &Pipeline, id: Option<Id>, params: Value) -> Response {
    let input: WhosOutInput = match serde_json::from_value(params) {
        Ok(v) => v,
        Err(e) => return invalid_params(id, e),
    };
    let from = match NaiveDate::parse_from_str(&input.from, "%Y-%m-%d") {
        Ok(d) => d,
        Err(_) => return rpc_error(id, -32602, "from must be YYYY-MM-DD", None),
    };
    let to = match NaiveDate::parse_from_str(&input.to, "%Y-%m-%d") {
        Ok(d) => d,
        Err(_) => return rpc_error(id, -32602, "to must be YYYY-MM-DD", None),
    };
    if to < from {
        return rpc_error(id, -32602, "to must not precede from", None);
    }
    let query = [
        ("from", Some(from.format("%Y-%m-%d").to_string())),
        ("to", Some(to.format("%Y-%m-%d").to_string())),
    ];
    match p.get_json("/timeoff/whosout", &query).await {
        Ok(env) => {
            let items: Vec<WhosOutItem> = shape::records(&env.data)
                .iter()
                .map(|r| WhosOutItem {
                    employee_id: shape::text(r, "employeeId"),
                    display_name: shape::text(r, "displayName"),
                    policy_type: shape::text(r, "policyType"),
                    start_date: shape::text(r, "startDate"),
                    end_date: shape::text(r, "endDate"),
                })
                .collect();
            let meta = page_meta(&env);
            tool_ok(
                id,
                &WhosOutOutput {
                    items: Some(items),
                    meta,
                    error: None,
                },
            )
        }
        Err(e) => tool_error(id, &e),
    }
}

fn balance_item(employee_id: &str, record: &Value) -> TimeoffBalanceItem {
    TimeoffBalanceItem {
        employee_id: employee_id.to_string(),
        policy_type: shape::text(record, "policyType"),
        balance: shape::number(record, "balance"),
        balance_display: record.get("balance").and_then(shape::display),
        as_of: shape::text(record, "asOfDate"),
    }
}

async fn handle_get_timeoff_balance(p: &Pipeline, id: Option<Id>, params: Value) -> Response {
    let input: GetTimeoffBalanceInput = match serde_json::from_value(params) {
        Ok(v) => v,
        Err(e) => return invalid_params(id, e),
    };
    if input.employee_id.is_empty() {
        return rpc_error(id, -32602, "employee_id must not be empty", None);
    }
    let path = format!(
        "/timeoff/employees/{}/balance",
        encode_path_segment(&input.employee_id)
    );
    let query = [("policyType", input.policy_type), ("date", input.as_of)];
    match p.get_json(&path, &query).await {
        Ok(env) => {
            let records = shape::records(&env.data);
            match records.first() {
                Some(record) => tool_ok(
                    id,
                    &GetTimeoffBalanceOutput {
                        item: Some(balance_item(&input.employee_id, record)),
                        meta: Meta::none(),
                        error: None,
                    },
                ),
                None => tool_missing(id, "Balance"),
            }
        }
        Err(e) => tool_error(id, &e),
    }
}

async fn handle_get_timeoff_balances(p: &Pipeline, id: Option<Id>, params: Value) -> Response {
    let input: GetTimeoffBalancesInput = match serde_json::from_value(params) {
        Ok(v) => v,
        Err(e) => return invalid_params(id, e),
    };
    if input.employee_ids.is_empty() || input.employee_ids.len() > MAX_BULK_LOOKUPS {
        return rpc_error(id, -32602, "employee_ids must contain 1..=20 ids", None);
    }
    // Independent lookups proceed concurrently; the pipeline's limiter paces
    // the aggregate request rate.
    let lookups = input.employee_ids.iter().map(|eid| {
        let eid = eid.clone();
        let policy_type = input.policy_type.clone();
        async move {
            let path = format!("/timeoff/employees/{}/balance", encode_path_segment(&eid));
            let env = p.get_json(&path, &[("policyType", policy_type)]).await?;
            let records = shape::records(&env.data);
            let item = match records.first() {
                Some(record) => balance_item(&eid, record),
                None => TimeoffBalanceItem {
                    employee_id: eid.clone(),
                    policy_type: None,
                    balance: None,
                    balance_display: None,
                    as_of: None,
                },
            };
            Ok::<_, ApiError>(item)
        }
    });
    match try_join_all(lookups).await {
        Ok(items) => tool_ok(
            id,
            &GetTimeoffBalancesOutput {
                items: Some(items),
                meta: Meta::none(),
                error: None,
            },
        ),
        Err(e) => tool_error(id, &e),
    }
}

fn payslip_item(record: &Value) -> PayslipItem {
    PayslipItem {
        id: shape::text(record, "id").unwrap_or_default(),
        period: shape::text(record, "period"),
        pay_date: shape::text(record, "payDate"),
        gross_pay: record.get("grossPay").and_then(shape::display),
        net_pay: record.get("netPay").and_then(shape::display),
        currency: shape::text(record, "currency"),
    }
}

async fn handle_list_payslips(p: &Pipeline, id: Option<Id>, params: Value) -> Response {
    let input: ListPayslipsInput = match serde_json::from_value(params) {
        Ok(v) => v,
        Err(e) => return invalid_params(id, e),
    };
    if input.employee_id.is_empty() {
        return rpc_error(id, -32602, "employee_id must not be empty", None);
    }
    let limit = match enforce_limit(input.limit) {
        Ok(l) => l,
        Err(m) => return rpc_error(id, -32602, &m, None),
    };
    let offset = match input.cursor.as_deref() {
        Some(raw) => match decode_offset_cursor(raw) {
            Some(c) => c.offset,
            None => return rpc_error(id, -32602, "Invalid cursor", None),
        },
        None => 0,
    };
    let path = format!(
        "/payroll/employees/{}/payslips",
        encode_path_segment(&input.employee_id)
    );
    let query = [
        ("offset", Some(offset.to_string())),
        ("limit", Some(limit.to_string())),
    ];
    match p.get_json(&path, &query).await {
        Ok(env) => {
            let items: Vec<PayslipItem> =
                shape::records(&env.data).iter().map(payslip_item).collect();
            let meta = offset_meta(&env, offset, limit);
            tool_ok(
                id,
                &ListPayslipsOutput {
                    items: Some(items),
                    meta,
                    error: None,
                },
            )
        }
        Err(e) => tool_error(id, &e),
    }
}

async fn handle_list_tasks(p: &Pipeline, id: Option<Id>, params: Value) -> Response {
    let input: ListTasksInput = match serde_json::from_value(params) {
        Ok(v) => v,
        Err(e) => return invalid_params(id, e),
    };
    let limit = match enforce_limit(input.limit) {
        Ok(l) => l,
        Err(m) => return rpc_error(id, -32602, &m, None),
    };
    let query = [
        ("employeeId", input.employee_id),
        ("status", input.status),
        ("limit", Some(limit.to_string())),
    ];
    match p.get_json("/tasks", &query).await {
        Ok(env) => {
            // Tasks arrive wrapped one level deeper, under data.rows.
            let items: Vec<TaskItem> = shape::records(&env.data)
                .iter()
                .map(|r| TaskItem {
                    id: shape::text(r, "id").unwrap_or_default(),
                    title: shape::text(r, "title"),
                    status: shape::text(r, "status"),
                    due_date: shape::text(r, "dueDate"),
                    assignee_id: shape::text(r, "assigneeId"),
                })
                .collect();
            let meta = page_meta(&env);
            tool_ok(
                id,
                &ListTasksOutput {
                    items: Some(items),
                    meta,
                    error: None,
                },
            )
        }
        Err(e) => tool_error(id, &e),
    }
}

async fn handle_list_departments(p: &Pipeline, id: Option<Id>, params: Value) -> Response {
    let input: ListDepartmentsInput = match serde_json::from_value(params) {
        Ok(v) => v,
        Err(e) => return invalid_params(id, e),
    };
    let limit = match enforce_limit(input.limit) {
        Ok(l) => l,
        Err(m) => return rpc_error(id, -32602, &m, None),
    };
    // This endpoint family signals continuation with top-level
    // next/has_next_page and takes the token back as `next`.
    let query = [
        ("limit", Some(limit.to_string())),
        ("next", input.cursor),
    ];
    match p.get_json("/company/departments", &query).await {
        Ok(env) => {
            let items: Vec<DepartmentItem> = shape::records(&env.data)
                .iter()
                .map(|r| DepartmentItem {
                    id: shape::text(r, "id").unwrap_or_default(),
                    name: shape::text(r, "name"),
                    parent_id: shape::text(r, "parentId"),
                })
                .collect();
            let meta = page_meta(&env);
            tool_ok(
                id,
                &ListDepartmentsOutput {
                    items: Some(items),
                    meta,
                    error: None,
                },
            )
        }
        Err(e) => tool_error(id, &e),
    }
}

async fn handle_get_company_holidays(p: &Pipeline, id: Option<Id>, params: Value) -> Response {
    let input: GetCompanyHolidaysInput = match serde_json::from_value(params) {
        Ok(v) => v,
        Err(e) => return invalid_params(id, e),
    };
    let query = [
        ("year", input.year.map(|y| y.to_string())),
        ("site", input.site),
    ];
    match p.get_json("/company/holidays", &query).await {
        Ok(env) => {
            let items: Vec<HolidayItem> = shape::records(&env.data)
                .iter()
                .map(|r| HolidayItem {
                    name: shape::text(r, "name"),
                    date: shape::text(r, "date"),
                    site: shape::text(r, "site"),
                })
                .collect();
            let meta = page_meta(&env);
            tool_ok(
                id,
                &GetCompanyHolidaysOutput {
                    items: Some(items),
                    meta,
                    error: None,
                },
            )
        }
        Err(e) => tool_error(id, &e),
    }
}
