use serde::{Deserialize, Serialize};

use crate::http::ErrorInfo;

pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// The `ping` tool is for connectivity checks only; keep it out of agent
/// tool lists unless explicitly enabled.
pub fn ping_enabled() -> bool {
    std::env::var("BOB_MCP_ENABLE_PING")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

pub fn tool_descriptors() -> Vec<ToolDescriptor> {
    let ping = ToolDescriptor {
        name: "ping".into(),
        description: "Health check; echoes a message.".into(),
        input_schema: serde_json::json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "message": {"type": "string"}
            }
        }),
    };

    let list_employees = ToolDescriptor {
        name: "list_employees".into(),
        description: "List employees in the company directory".into(),
        input_schema: serde_json::json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "department": {"type": "string"},
                "include_inactive": {"type": "boolean"},
                "cursor": {"type": "string"},
                "limit": {"type": "integer"}
            }
        }),
    };

    let get_employee = ToolDescriptor {
        name: "get_employee".into(),
        description: "Get a single employee profile by id".into(),
        input_schema: serde_json::json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "employee_id": {"type": "string"}
            },
            "required": ["employee_id"]
        }),
    };

    let search_employees = ToolDescriptor {
        name: "search_employees".into(),
        description: "Search employees by name or email".into(),
        input_schema: serde_json::json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "query": {"type": "string"},
                "cursor": {"type": "string"},
                "limit": {"type": "integer"}
            },
            "required": ["query"]
        }),
    };

    let list_timeoff_requests = ToolDescriptor {
        name: "list_timeoff_requests".into(),
        description: "List time-off requests, optionally across all pages".into(),
        input_schema: serde_json::json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "employee_id": {"type": "string"},
                "from": {"type": "string"},
                "to": {"type": "string"},
                "status": {"type": "string", "enum": ["approved", "pending", "declined", "cancelled"]},
                "cursor": {"type": "string"},
                "limit": {"type": "integer"},
                "fetch_all": {"type": "boolean"}
            }
        }),
    };

    let whos_out = ToolDescriptor {
        name: "whos_out".into(),
        description: "Who is out of office in a date range".into(),
        input_schema: serde_json::json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "from": {"type": "string", "description": "YYYY-MM-DD"},
                "to": {"type": "string", "description": "YYYY-MM-DD"}
            },
            "required": ["from", "to"]
        }),
    };

    let get_timeoff_balance = ToolDescriptor {
        name: "get_timeoff_balance".into(),
        description: "Time-off balance for one employee".into(),
        input_schema: serde_json::json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "employee_id": {"type": "string"},
                "policy_type": {"type": "string"},
                "as_of": {"type": "string", "description": "YYYY-MM-DD"}
            },
            "required": ["employee_id"]
        }),
    };

    let get_timeoff_balances = ToolDescriptor {
        name: "get_timeoff_balances".into(),
        description: "Time-off balances for several employees at once".into(),
        input_schema: serde_json::json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "employee_ids": {"type": "array", "items": {"type": "string"}},
                "policy_type": {"type": "string"}
            },
            "required": ["employee_ids"]
        }),
    };

    let list_payslips = ToolDescriptor {
        name: "list_payslips".into(),
        description: "List an employee's payslips".into(),
        input_schema: serde_json::json!({
            "type":"object","additionalProperties":false,
            "properties": {"employee_id":{"type":"string"},"cursor":{"type":"string"},"limit":{"type":"integer"}},
            "required":["employee_id"]
        }),
    };

    let list_tasks = ToolDescriptor {
        name: "list_tasks".into(),
        description: "List onboarding/offboarding tasks".into(),
        input_schema: serde_json::json!({
            "type":"object","additionalProperties":false,
            "properties": {"employee_id":{"type":"string"},"status":{"type":"string","enum":["open","completed"]},"limit":{"type":"integer"}}
        }),
    };

    let list_departments = ToolDescriptor {
        name: "list_departments".into(),
        description: "List departments".into(),
        input_schema: serde_json::json!({
            "type":"object","additionalProperties":false,
            "properties": {"cursor":{"type":"string"},"limit":{"type":"integer"}}
        }),
    };

    let get_company_holidays = ToolDescriptor {
        name: "get_company_holidays".into(),
        description: "Company holiday calendar".into(),
        input_schema: serde_json::json!({
            "type":"object","additionalProperties":false,
            "properties": {"year":{"type":"integer"},"site":{"type":"string"}}
        }),
    };

    let mut tools = Vec::new();
    if ping_enabled() {
        tools.push(ping);
    }
    tools.extend([
        list_employees,
        get_employee,
        search_employees,
        list_timeoff_requests,
        whos_out,
        get_timeoff_balance,
        get_timeoff_balances,
        list_payslips,
        list_tasks,
        list_departments,
        get_company_holidays,
    ]);
    tools
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PingInput {
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PingOutput {
    pub message: String,
}

// Shared result meta and error shapes used across tools.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Meta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
}

impl Meta {
    pub fn none() -> Self {
        Self {
            next_cursor: None,
            has_more: false,
            total: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
    pub retriable: bool,
}

impl From<ErrorInfo> for ErrorShape {
    fn from(info: ErrorInfo) -> Self {
        Self {
            code: info.code,
            message: info.message,
            retriable: info.retriable,
        }
    }
}

// Directory tool inputs/outputs
#[derive(Debug, Deserialize)]
pub struct ListEmployeesInput {
    pub department: Option<String>,
    pub include_inactive: Option<bool>,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct EmployeeItem {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListEmployeesOutput {
    pub items: Option<Vec<EmployeeItem>>,
    pub meta: Meta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

#[derive(Debug, Deserialize)]
pub struct GetEmployeeInput {
    pub employee_id: String,
}

#[derive(Debug, Serialize)]
pub struct EmployeeDetailItem {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employment_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct GetEmployeeOutput {
    pub item: Option<EmployeeDetailItem>,
    pub meta: Meta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

#[derive(Debug, Deserialize)]
pub struct SearchEmployeesInput {
    pub query: String,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

// Time-off tool inputs/outputs
#[derive(Debug, Deserialize)]
pub struct ListTimeoffRequestsInput {
    pub employee_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub status: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
    pub fetch_all: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct TimeoffRequestItem {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListTimeoffRequestsOutput {
    pub items: Option<Vec<TimeoffRequestItem>>,
    pub meta: Meta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

#[derive(Debug, Deserialize)]
pub struct WhosOutInput {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Serialize)]
pub struct WhosOutItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WhosOutOutput {
    pub items: Option<Vec<WhosOutItem>>,
    pub meta: Meta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

#[derive(Debug, Deserialize)]
pub struct GetTimeoffBalanceInput {
    pub employee_id: String,
    pub policy_type: Option<String>,
    pub as_of: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct TimeoffBalanceItem {
    pub employee_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_of: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GetTimeoffBalanceOutput {
    pub item: Option<TimeoffBalanceItem>,
    pub meta: Meta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

#[derive(Debug, Deserialize)]
pub struct GetTimeoffBalancesInput {
    pub employee_ids: Vec<String>,
    pub policy_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GetTimeoffBalancesOutput {
    pub items: Option<Vec<TimeoffBalanceItem>>,
    pub meta: Meta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

// Payroll tool inputs/outputs
#[derive(Debug, Deserialize)]
pub struct ListPayslipsInput {
    pub employee_id: String,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct PayslipItem {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pay_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gross_pay: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_pay: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListPayslipsOutput {
    pub items: Option<Vec<PayslipItem>>,
    pub meta: Meta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

// Tasks / company tool inputs/outputs
#[derive(Debug, Deserialize)]
pub struct ListTasksInput {
    pub employee_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct TaskItem {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListTasksOutput {
    pub items: Option<Vec<TaskItem>>,
    pub meta: Meta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

#[derive(Debug, Deserialize)]
pub struct ListDepartmentsInput {
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct DepartmentItem {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListDepartmentsOutput {
    pub items: Option<Vec<DepartmentItem>>,
    pub meta: Meta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

#[derive(Debug, Deserialize)]
pub struct GetCompanyHolidaysInput {
    pub year: Option<i32>,
    pub site: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HolidayItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GetCompanyHolidaysOutput {
    pub items: Option<Vec<HolidayItem>>,
    pub meta: Meta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}
