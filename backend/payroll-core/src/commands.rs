// src/commands.rs

use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::bulk::BulkStrategy;
use crate::envelope::{normalize_entity, normalize_page, PageRequest};
use crate::gateway::{ApiRequest, Gateway, GatewayError};
use crate::models::{
    ApprovalRequest, EmployeeId, GenerateSalaryRequest, OvertimeQuery, OvertimeRecord,
    OvertimeRequest, OvertimeSummary, Page, PayPeriod, PaymentDetails, PayrollOverview, Payslip,
    RecordId, RejectionRequest, SalaryQuery, SalaryRecord,
};
use crate::preview;
use crate::reducer::{Action, Family, LoadingSlot};
use crate::staleness::{StalenessCache, OVERVIEW_KEY};
use crate::store::Store;

pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";
pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Error, Debug)]
pub enum CommandError {
    /// Rejected before any network call.
    #[error("{0}")]
    Validation(String),

    #[error("{message}")]
    Failed {
        message: String,
        #[source]
        source: GatewayError,
    },
}

impl CommandError {
    pub fn message(&self) -> &str {
        match self {
            CommandError::Validation(message) => message,
            CommandError::Failed { message, .. } => message,
        }
    }
}

/// Human-readable message for a failed call. Precedence: server message,
/// then server validation errors, then the transport's own message.
pub fn extract_error_message(err: &GatewayError) -> String {
    if let GatewayError::Api {
        message,
        validation_errors,
        ..
    } = err
    {
        if let Some(message) = message {
            return message.clone();
        }
        if !validation_errors.is_empty() {
            return validation_errors.join(", ");
        }
    }
    let raw = err.to_string();
    if raw.trim().is_empty() {
        GENERIC_ERROR_MESSAGE.to_string()
    } else {
        raw
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSettings {
    pub default_page_size: u32,
    pub bulk_strategy: BulkStrategy,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            bulk_strategy: BulkStrategy::Server,
        }
    }
}

/// Runs every payroll and overtime command against the gateway and funnels
/// the outcome into the store.
#[derive(Clone)]
pub struct PayrollService {
    pub(crate) gateway: Arc<dyn Gateway>,
    pub(crate) store: Store,
    staleness: Arc<StalenessCache>,
    pub(crate) settings: ServiceSettings,
}

impl PayrollService {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        store: Store,
        staleness: Arc<StalenessCache>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            gateway,
            store,
            staleness,
            settings,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn settings(&self) -> ServiceSettings {
        self.settings
    }

    /// Same gateway, store and staleness stamps; different settings.
    pub fn with_settings(&self, settings: ServiceSettings) -> Self {
        Self {
            settings,
            ..self.clone()
        }
    }

    // --- Command Phases ---

    pub(crate) fn begin(&self, slot: LoadingSlot) {
        self.store.dispatch_all([
            Action::ClearError(slot.family()),
            Action::SetLoading {
                slot,
                loading: true,
            },
        ]);
    }

    pub(crate) fn fail(&self, family: Family, context: &str, err: GatewayError) -> CommandError {
        let message = extract_error_message(&err);
        error!("{} failed: {} ({:?})", context, message, err);
        self.store.dispatch(Action::SetError {
            family,
            message: message.clone(),
        });
        CommandError::Failed {
            message,
            source: err,
        }
    }

    pub(crate) fn reject(&self, family: Family, message: impl Into<String>) -> CommandError {
        let message = message.into();
        warn!("Rejected before sending: {}", message);
        self.store.dispatch_all([
            Action::ClearError(family),
            Action::SetError {
                family,
                message: message.clone(),
            },
        ]);
        CommandError::Validation(message)
    }

    /// Begin, execute, resolve. `on_success` maps the result to the actions
    /// applied together with clearing the loading flag.
    async fn run<T, Fut, F>(
        &self,
        slot: LoadingSlot,
        context: &'static str,
        call: Fut,
        on_success: F,
    ) -> Result<T, CommandError>
    where
        Fut: Future<Output = Result<T, GatewayError>>,
        F: FnOnce(&T) -> Vec<Action>,
    {
        self.begin(slot);
        match call.await {
            Ok(value) => {
                let mut actions = on_success(&value);
                actions.push(Action::SetLoading {
                    slot,
                    loading: false,
                });
                self.store.dispatch_all(actions);
                info!("{} succeeded", context);
                Ok(value)
            }
            Err(e) => Err(self.fail(slot.family(), context, e)),
        }
    }

    pub(crate) async fn fetch_entity<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T, GatewayError> {
        let payload = self.gateway.execute(request).await?;
        normalize_entity(payload)
    }

    async fn fetch_page<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        requested: PageRequest,
    ) -> Result<Page<T>, GatewayError> {
        let payload = self.gateway.execute(request).await?;
        normalize_page(payload, requested)
    }

    fn page_request(&self, page: Option<u32>, page_size: Option<u32>) -> PageRequest {
        PageRequest {
            page: page.unwrap_or(1).max(1),
            page_size: page_size.unwrap_or(self.settings.default_page_size),
        }
    }

    pub fn clear_error(&self, family: Family) {
        self.store.dispatch(Action::ClearError(family));
    }

    pub fn is_data_stale(&self, resource_key: &str, max_age_minutes: i64) -> bool {
        self.staleness.is_stale(resource_key, max_age_minutes)
    }

    // --- Salary Commands ---

    fn salaries_request(query: &SalaryQuery, requested: PageRequest) -> ApiRequest {
        ApiRequest::get("/salaries", "Get Salaries")
            .query("page", requested.page)
            .query("pageSize", requested.page_size)
            .query_opt("month", query.month)
            .query_opt("year", query.year)
            .query_opt("status", query.status)
            .query_opt("employeeId", query.employee_id)
    }

    /// Replaces the salary list and its pagination.
    pub async fn fetch_salaries(&self, query: SalaryQuery) -> Result<Page<SalaryRecord>, CommandError> {
        let requested = self.page_request(query.page, query.page_size);
        let request = Self::salaries_request(&query, requested);
        self.run(
            LoadingSlot::Salaries,
            "Get Salaries",
            self.fetch_page::<SalaryRecord>(request, requested),
            |page| {
                vec![Action::SetSalaries {
                    query: query.clone(),
                    page: page.clone(),
                }]
            },
        )
        .await
    }

    /// List refresh that is part of a larger command: it leaves the error
    /// slot alone unless the refresh itself fails.
    pub(crate) async fn reload_salaries(&self, query: SalaryQuery) -> Result<(), CommandError> {
        let requested = self.page_request(query.page, query.page_size);
        let request = Self::salaries_request(&query, requested);
        self.store.dispatch(Action::SetLoading {
            slot: LoadingSlot::Salaries,
            loading: true,
        });
        match self.fetch_page::<SalaryRecord>(request, requested).await {
            Ok(page) => {
                self.store.dispatch(Action::SetSalaries { query, page });
                Ok(())
            }
            Err(e) => Err(self.fail(Family::Salary, "Refresh Salaries", e)),
        }
    }

    pub async fn fetch_salary(&self, id: RecordId) -> Result<SalaryRecord, CommandError> {
        self.run(
            LoadingSlot::SalaryGlobal,
            "Get Salary",
            self.fetch_entity::<SalaryRecord>(ApiRequest::get(format!("/salaries/{}", id), "Get Salary")),
            |record| vec![Action::SetSalaryDetail(record.clone())],
        )
        .await
    }

    pub async fn generate_salary(&self, request: GenerateSalaryRequest) -> Result<SalaryRecord, CommandError> {
        if !(1..=12).contains(&request.month) {
            return Err(self.reject(Family::Salary, format!("Invalid month: {}", request.month)));
        }
        let api_request = ApiRequest::post("/salaries/generate", "Generate Salary")
            .json(&request)
            .map_err(|e| self.fail(Family::Salary, "Generate Salary", e))?;
        self.run(
            LoadingSlot::SalaryGlobal,
            "Generate Salary",
            self.fetch_entity::<SalaryRecord>(api_request),
            |record| vec![Action::AddSalary(record.clone())],
        )
        .await
    }

    /// Draft -> Processed.
    pub async fn process_salary(&self, id: RecordId) -> Result<SalaryRecord, CommandError> {
        self.run(
            LoadingSlot::Processing,
            "Process Salary",
            self.fetch_entity::<SalaryRecord>(ApiRequest::post(
                format!("/salaries/{}/process", id),
                "Process Salary",
            )),
            |record| vec![Action::UpdateSalary(record.clone())],
        )
        .await
    }

    /// Processed -> Paid.
    pub async fn mark_salary_as_paid(
        &self,
        id: RecordId,
        payment: PaymentDetails,
    ) -> Result<SalaryRecord, CommandError> {
        if payment.payment_method.trim().is_empty() {
            return Err(self.reject(Family::Salary, "Payment method is required"));
        }
        let api_request = ApiRequest::post(format!("/salaries/{}/pay", id), "Mark Salary Paid")
            .json(&payment)
            .map_err(|e| self.fail(Family::Salary, "Mark Salary Paid", e))?;
        self.run(
            LoadingSlot::Processing,
            "Mark Salary Paid",
            self.fetch_entity::<SalaryRecord>(api_request),
            |record| vec![Action::UpdateSalary(record.clone())],
        )
        .await
    }

    /// Offered by views only for drafts; the server has the final word.
    pub async fn delete_salary(&self, id: RecordId) -> Result<(), CommandError> {
        let request = ApiRequest::delete(format!("/salaries/{}", id), "Delete Salary");
        self.run(
            LoadingSlot::SalaryGlobal,
            "Delete Salary",
            async { self.gateway.execute(request).await.map(|_| ()) },
            |_| vec![Action::RemoveSalary(id)],
        )
        .await
    }

    pub async fn fetch_payslip(&self, salary_id: RecordId) -> Result<Payslip, CommandError> {
        let request = ApiRequest::get(format!("/salaries/{}/payslip", salary_id), "Get Payslip");
        let payslip = self
            .run(
                LoadingSlot::SalaryGlobal,
                "Get Payslip",
                self.fetch_entity::<Payslip>(request),
                |payslip| vec![Action::SetPayslip(payslip.clone())],
            )
            .await?;
        if !payslip.is_consistent() {
            warn!(
                "Payslip for salary {} does not add up to its server totals",
                salary_id
            );
        }
        Ok(payslip)
    }

    fn overview_request(period: Option<PayPeriod>) -> ApiRequest {
        ApiRequest::get("/payroll/overview", "Get Payroll Overview")
            .query_opt("month", period.map(|p| p.month))
            .query_opt("year", period.map(|p| p.year))
    }

    /// Primary fetch: stamps the overview as fresh on success.
    pub async fn fetch_payroll_overview(
        &self,
        period: Option<PayPeriod>,
    ) -> Result<PayrollOverview, CommandError> {
        let overview = self
            .run(
                LoadingSlot::Overview,
                "Get Payroll Overview",
                self.fetch_entity::<PayrollOverview>(Self::overview_request(period)),
                |overview| vec![Action::SetOverview(overview.clone())],
            )
            .await?;
        self.staleness.mark_fresh(OVERVIEW_KEY);
        Ok(overview)
    }

    /// Background variant: never touches the error slot and never fails.
    /// Returns whether the overview was refreshed.
    pub async fn refresh_overview_quietly(&self, period: Option<PayPeriod>) -> bool {
        self.store.dispatch(Action::SetLoading {
            slot: LoadingSlot::Overview,
            loading: true,
        });
        match self
            .fetch_entity::<PayrollOverview>(Self::overview_request(period))
            .await
        {
            Ok(overview) => {
                self.store.dispatch(Action::SetOverview(overview));
                self.staleness.mark_fresh(OVERVIEW_KEY);
                true
            }
            Err(e) => {
                warn!("Background overview refresh failed: {}", e);
                self.store.dispatch(Action::SetLoading {
                    slot: LoadingSlot::Overview,
                    loading: false,
                });
                false
            }
        }
    }

    /// Skips the network while the overview is younger than `max_age_minutes`.
    pub async fn refresh_overview_if_stale(
        &self,
        period: Option<PayPeriod>,
        max_age_minutes: i64,
    ) -> bool {
        if !self.is_data_stale(OVERVIEW_KEY, max_age_minutes) {
            return false;
        }
        self.refresh_overview_quietly(period).await
    }

    pub fn clear_salary_detail(&self) {
        self.store.dispatch(Action::ClearSalaryDetail);
    }

    // --- Overtime Commands ---

    pub async fn fetch_overtime_records(
        &self,
        query: OvertimeQuery,
    ) -> Result<Page<OvertimeRecord>, CommandError> {
        let requested = self.page_request(query.page, query.page_size);
        let request = ApiRequest::get("/overtime", "Get Overtime Records")
            .query("page", requested.page)
            .query("pageSize", requested.page_size)
            .query_opt("employeeId", query.employee_id)
            .query_opt("status", query.status)
            .query_opt("fromDate", query.from_date)
            .query_opt("toDate", query.to_date);
        self.run(
            LoadingSlot::OvertimeRecords,
            "Get Overtime Records",
            self.fetch_page::<OvertimeRecord>(request, requested),
            |page| {
                vec![Action::SetOvertimeRecords {
                    query: query.clone(),
                    page: page.clone(),
                }]
            },
        )
        .await
    }

    pub async fn fetch_pending_approvals(
        &self,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Page<OvertimeRecord>, CommandError> {
        let requested = self.page_request(page, page_size);
        let request = ApiRequest::get("/overtime/pending-approvals", "Get Pending Approvals")
            .query("page", requested.page)
            .query("pageSize", requested.page_size);
        self.run(
            LoadingSlot::PendingApprovals,
            "Get Pending Approvals",
            self.fetch_page::<OvertimeRecord>(request, requested),
            |page| vec![Action::SetPendingApprovals(page.clone())],
        )
        .await
    }

    pub async fn fetch_overtime_record(&self, id: RecordId) -> Result<OvertimeRecord, CommandError> {
        self.run(
            LoadingSlot::OvertimeGlobal,
            "Get Overtime Record",
            self.fetch_entity::<OvertimeRecord>(ApiRequest::get(
                format!("/overtime/{}", id),
                "Get Overtime Record",
            )),
            |record| vec![Action::SetOvertimeDetail(record.clone())],
        )
        .await
    }

    fn check_overtime_request(&self, request: &OvertimeRequest) -> Result<(), CommandError> {
        if request.reason.trim().is_empty() {
            return Err(self.reject(Family::Overtime, "Reason is required"));
        }
        preview::duration_hours(request.start_time, request.end_time)
            .map(|_| ())
            .map_err(|e| self.reject(Family::Overtime, e.to_string()))
    }

    pub async fn create_overtime_record(
        &self,
        request: OvertimeRequest,
    ) -> Result<OvertimeRecord, CommandError> {
        self.check_overtime_request(&request)?;
        let api_request = ApiRequest::post("/overtime", "Create Overtime Record")
            .json(&request)
            .map_err(|e| self.fail(Family::Overtime, "Create Overtime Record", e))?;
        self.run(
            LoadingSlot::OvertimeGlobal,
            "Create Overtime Record",
            self.fetch_entity::<OvertimeRecord>(api_request),
            |record| vec![Action::AddOvertime(record.clone())],
        )
        .await
    }

    /// Offered by views only while the record is pending.
    pub async fn update_overtime_record(
        &self,
        id: RecordId,
        request: OvertimeRequest,
    ) -> Result<OvertimeRecord, CommandError> {
        self.check_overtime_request(&request)?;
        let api_request = ApiRequest::put(format!("/overtime/{}", id), "Update Overtime Record")
            .json(&request)
            .map_err(|e| self.fail(Family::Overtime, "Update Overtime Record", e))?;
        self.run(
            LoadingSlot::OvertimeGlobal,
            "Update Overtime Record",
            self.fetch_entity::<OvertimeRecord>(api_request),
            |record| vec![Action::UpdateOvertime(record.clone())],
        )
        .await
    }

    /// Pending -> Approved.
    pub async fn approve_overtime_record(
        &self,
        id: RecordId,
        approval: ApprovalRequest,
    ) -> Result<OvertimeRecord, CommandError> {
        let api_request = ApiRequest::post(format!("/overtime/{}/approve", id), "Approve Overtime")
            .json(&approval)
            .map_err(|e| self.fail(Family::Overtime, "Approve Overtime", e))?;
        self.run(
            LoadingSlot::Approving,
            "Approve Overtime",
            self.fetch_entity::<OvertimeRecord>(api_request),
            |record| vec![Action::UpdateOvertime(record.clone())],
        )
        .await
    }

    /// Pending -> Rejected.
    pub async fn reject_overtime_record(
        &self,
        id: RecordId,
        rejection: RejectionRequest,
    ) -> Result<OvertimeRecord, CommandError> {
        if rejection.rejection_reason.trim().is_empty() {
            return Err(self.reject(Family::Overtime, "Rejection reason is required"));
        }
        let api_request = ApiRequest::post(format!("/overtime/{}/reject", id), "Reject Overtime")
            .json(&rejection)
            .map_err(|e| self.fail(Family::Overtime, "Reject Overtime", e))?;
        self.run(
            LoadingSlot::Approving,
            "Reject Overtime",
            self.fetch_entity::<OvertimeRecord>(api_request),
            |record| vec![Action::UpdateOvertime(record.clone())],
        )
        .await
    }

    pub async fn delete_overtime_record(&self, id: RecordId) -> Result<(), CommandError> {
        let request = ApiRequest::delete(format!("/overtime/{}", id), "Delete Overtime Record");
        self.run(
            LoadingSlot::OvertimeGlobal,
            "Delete Overtime Record",
            async { self.gateway.execute(request).await.map(|_| ()) },
            |_| vec![Action::RemoveOvertime(id)],
        )
        .await
    }

    pub async fn fetch_employee_overtime_summary(
        &self,
        employee_id: EmployeeId,
        from_date: Option<chrono::NaiveDate>,
        to_date: Option<chrono::NaiveDate>,
    ) -> Result<OvertimeSummary, CommandError> {
        let request = ApiRequest::get(
            format!("/overtime/employee/{}/summary", employee_id),
            "Get Overtime Summary",
        )
        .query_opt("fromDate", from_date)
        .query_opt("toDate", to_date);
        self.run(
            LoadingSlot::OvertimeSummary,
            "Get Overtime Summary",
            self.fetch_entity::<OvertimeSummary>(request),
            |summary| vec![Action::SetOvertimeSummary(summary.clone())],
        )
        .await
    }

    pub fn clear_overtime_detail(&self) {
        self.store.dispatch(Action::ClearOvertimeDetail);
    }
}
