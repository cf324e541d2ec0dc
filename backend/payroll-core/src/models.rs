// src/models.rs

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type RecordId = i64;
pub type EmployeeId = i64;

// --- Status State Machines ---

/// Lifecycle of a computed salary record: `Draft -> Processed -> Paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SalaryStatus {
    #[default]
    Draft,
    Processed,
    Paid,
}

/// Actions a view may offer for a record in a given status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalaryAction {
    Process,
    MarkPaid,
    Delete,
    ViewPayslip,
}

impl SalaryStatus {
    pub fn rank(self) -> u8 {
        match self {
            SalaryStatus::Draft => 0,
            SalaryStatus::Processed => 1,
            SalaryStatus::Paid => 2,
        }
    }

    /// Only forward, single-step transitions exist.
    pub fn can_transition_to(self, next: SalaryStatus) -> bool {
        matches!(
            (self, next),
            (SalaryStatus::Draft, SalaryStatus::Processed)
                | (SalaryStatus::Processed, SalaryStatus::Paid)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == SalaryStatus::Paid
    }

    pub fn available_actions(self) -> &'static [SalaryAction] {
        match self {
            SalaryStatus::Draft => &[SalaryAction::Process, SalaryAction::Delete],
            SalaryStatus::Processed => &[SalaryAction::MarkPaid, SalaryAction::ViewPayslip],
            SalaryStatus::Paid => &[SalaryAction::ViewPayslip],
        }
    }
}

/// Lifecycle of an overtime request: `Pending -> Approved | Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OvertimeStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OvertimeAction {
    Edit,
    Approve,
    Reject,
    Delete,
}

impl OvertimeStatus {
    pub fn is_resolved(self) -> bool {
        !matches!(self, OvertimeStatus::Pending)
    }

    pub fn can_transition_to(self, next: OvertimeStatus) -> bool {
        self == OvertimeStatus::Pending && next.is_resolved()
    }

    pub fn available_actions(self) -> &'static [OvertimeAction] {
        match self {
            OvertimeStatus::Pending => &[
                OvertimeAction::Edit,
                OvertimeAction::Approve,
                OvertimeAction::Reject,
                OvertimeAction::Delete,
            ],
            OvertimeStatus::Approved | OvertimeStatus::Rejected => &[],
        }
    }
}

impl SalaryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SalaryStatus::Draft => "Draft",
            SalaryStatus::Processed => "Processed",
            SalaryStatus::Paid => "Paid",
        }
    }
}

impl OvertimeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OvertimeStatus::Pending => "Pending",
            OvertimeStatus::Approved => "Approved",
            OvertimeStatus::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for SalaryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for OvertimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SalaryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(SalaryStatus::Draft),
            "processed" => Ok(SalaryStatus::Processed),
            "paid" => Ok(SalaryStatus::Paid),
            other => Err(format!("unknown salary status: {}", other)),
        }
    }
}

impl FromStr for OvertimeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OvertimeStatus::Pending),
            "approved" => Ok(OvertimeStatus::Approved),
            "rejected" => Ok(OvertimeStatus::Rejected),
            other => Err(format!("unknown overtime status: {}", other)),
        }
    }
}

// --- Entities ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayPeriod {
    pub month: u32,
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalaryRecord {
    pub id: RecordId,
    pub employee_id: EmployeeId,
    #[serde(default)]
    pub employee_name: Option<String>,
    #[serde(flatten)]
    pub period: PayPeriod,
    #[serde(default)]
    pub basic_salary: Decimal,
    #[serde(default)]
    pub gross_salary: Decimal,
    #[serde(default)]
    pub total_deductions: Decimal,
    #[serde(default)]
    pub net_salary: Decimal,
    #[serde(default)]
    pub working_days: u32,
    #[serde(default)]
    pub present_days: u32,
    #[serde(default)]
    pub leave_days: u32,
    #[serde(default)]
    pub overtime_hours: Decimal,
    pub status: SalaryStatus,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub payment_reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OvertimeRecord {
    pub id: RecordId,
    pub employee_id: EmployeeId,
    #[serde(default)]
    pub employee_name: Option<String>,
    pub date: NaiveDate,
    #[serde(with = "clock_time")]
    pub start_time: NaiveTime,
    #[serde(with = "clock_time")]
    pub end_time: NaiveTime,
    #[serde(default)]
    pub duration_hours: Decimal,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: OvertimeStatus,
    #[serde(default)]
    pub overtime_rate: Decimal,
    #[serde(default)]
    pub calculated_amount: Decimal,
    #[serde(default)]
    pub approval_comments: Option<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub approval_date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
            total_items: 0,
            total_pages: 0,
        }
    }
}

/// A list payload together with the pagination that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// Per-employee overtime rollup. Fetched, never derived client-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OvertimeSummary {
    pub employee_id: EmployeeId,
    pub total_hours: Decimal,
    pub total_amount: Decimal,
    pub total_records: u32,
    pub pending_count: u32,
    pub approved_count: u32,
    pub rejected_count: u32,
    pub recent_records: Vec<OvertimeRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayslipLine {
    pub label: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payslip {
    pub salary_id: RecordId,
    pub employee_id: EmployeeId,
    #[serde(default)]
    pub employee_name: Option<String>,
    #[serde(flatten)]
    pub period: PayPeriod,
    #[serde(default)]
    pub earnings: Vec<PayslipLine>,
    #[serde(default)]
    pub deductions: Vec<PayslipLine>,
    #[serde(default)]
    pub gross_salary: Decimal,
    #[serde(default)]
    pub total_deductions: Decimal,
    #[serde(default)]
    pub net_salary: Decimal,
    pub status: SalaryStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PayrollOverview {
    pub total_employees: u32,
    pub total_gross: Decimal,
    pub total_deductions: Decimal,
    pub total_net: Decimal,
    pub draft_count: u32,
    pub processed_count: u32,
    pub paid_count: u32,
    pub pending_overtime_count: u32,
}

// --- Request Payloads ---

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSalaryRequest {
    pub employee_id: EmployeeId,
    pub month: u32,
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkGenerateRequest {
    pub employee_ids: Vec<EmployeeId>,
    pub month: u32,
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub payment_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OvertimeRequest {
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    #[serde(with = "clock_time")]
    pub start_time: NaiveTime,
    #[serde(with = "clock_time")]
    pub end_time: NaiveTime,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub overtime_rate: Decimal,
}

/// The approve endpoint binds `Comments`; every other body is camelCase.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ApprovalRequest {
    pub comments: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionRequest {
    pub rejection_reason: String,
}

// --- Query Filters ---

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SalaryQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub status: Option<SalaryStatus>,
    pub employee_id: Option<EmployeeId>,
}

impl SalaryQuery {
    pub fn for_period(month: u32, year: i32) -> Self {
        Self {
            month: Some(month),
            year: Some(year),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OvertimeQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub employee_id: Option<EmployeeId>,
    pub status: Option<OvertimeStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

/// Serde helpers for clock times sent as `HH:MM` or `HH:MM:SS`.
pub mod clock_time {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    const FORMATS: [&str; 3] = ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"];

    pub fn parse(raw: &str) -> Option<NaiveTime> {
        FORMATS
            .iter()
            .find_map(|fmt| NaiveTime::parse_from_str(raw.trim(), fmt).ok())
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M:%S").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid clock time: {}", raw)))
    }
}
