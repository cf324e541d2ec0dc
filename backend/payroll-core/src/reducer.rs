// src/reducer.rs

use crate::models::{
    OvertimeQuery, OvertimeRecord, OvertimeSummary, Page, Pagination, PayrollOverview, Payslip,
    RecordId, SalaryQuery, SalaryRecord,
};

// --- Read Model ---

/// Resource family. Each family owns one error slot and its loading flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Salary,
    Overtime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadingSlot {
    /// Generate, delete, detail and payslip reads.
    SalaryGlobal,
    Salaries,
    /// Process and mark-as-paid.
    Processing,
    BulkGenerating,
    Overview,
    /// Create, update, delete and detail reads.
    OvertimeGlobal,
    OvertimeRecords,
    PendingApprovals,
    /// Approve and reject.
    Approving,
    OvertimeSummary,
}

impl LoadingSlot {
    pub fn family(self) -> Family {
        match self {
            LoadingSlot::SalaryGlobal
            | LoadingSlot::Salaries
            | LoadingSlot::Processing
            | LoadingSlot::BulkGenerating
            | LoadingSlot::Overview => Family::Salary,
            LoadingSlot::OvertimeGlobal
            | LoadingSlot::OvertimeRecords
            | LoadingSlot::PendingApprovals
            | LoadingSlot::Approving
            | LoadingSlot::OvertimeSummary => Family::Overtime,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListState<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
    pub is_loading: bool,
}

impl<T> Default for ListState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            pagination: Pagination::default(),
            is_loading: false,
        }
    }
}

impl<T> ListState<T> {
    fn replace(&mut self, page: Page<T>) {
        self.items = page.items;
        self.pagination = page.pagination;
        self.is_loading = false;
    }
}

/// What a view renders for one paged collection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListReadState<'a, T> {
    pub items: &'a [T],
    pub pagination: Pagination,
    pub is_loading: bool,
    pub error: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SalaryState {
    pub is_loading: bool,
    pub is_processing: bool,
    pub is_bulk_generating: bool,
    pub is_overview_loading: bool,
    pub error: Option<String>,
    pub salaries: ListState<SalaryRecord>,
    pub salaries_query: Option<SalaryQuery>,
    pub detail: Option<SalaryRecord>,
    pub payslip: Option<Payslip>,
    pub overview: Option<PayrollOverview>,
}

impl SalaryState {
    pub fn is_salaries_loading(&self) -> bool {
        self.salaries.is_loading
    }

    pub fn list(&self) -> ListReadState<'_, SalaryRecord> {
        ListReadState {
            items: &self.salaries.items,
            pagination: self.salaries.pagination,
            is_loading: self.salaries.is_loading,
            error: self.error.as_deref(),
        }
    }

    pub fn find(&self, id: RecordId) -> Option<&SalaryRecord> {
        self.salaries.items.iter().find(|r| r.id == id)
    }

    fn clear_flags(&mut self) {
        self.is_loading = false;
        self.is_processing = false;
        self.is_bulk_generating = false;
        self.is_overview_loading = false;
        self.salaries.is_loading = false;
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OvertimeState {
    pub is_loading: bool,
    pub is_approving: bool,
    pub is_summary_loading: bool,
    pub error: Option<String>,
    pub records: ListState<OvertimeRecord>,
    pub records_query: Option<OvertimeQuery>,
    pub pending_approvals: ListState<OvertimeRecord>,
    pub detail: Option<OvertimeRecord>,
    pub summary: Option<OvertimeSummary>,
}

impl OvertimeState {
    pub fn records(&self) -> ListReadState<'_, OvertimeRecord> {
        ListReadState {
            items: &self.records.items,
            pagination: self.records.pagination,
            is_loading: self.records.is_loading,
            error: self.error.as_deref(),
        }
    }

    pub fn pending_approvals(&self) -> ListReadState<'_, OvertimeRecord> {
        ListReadState {
            items: &self.pending_approvals.items,
            pagination: self.pending_approvals.pagination,
            is_loading: self.pending_approvals.is_loading,
            error: self.error.as_deref(),
        }
    }

    pub fn find(&self, id: RecordId) -> Option<&OvertimeRecord> {
        self.records.items.iter().find(|r| r.id == id)
    }

    fn clear_flags(&mut self) {
        self.is_loading = false;
        self.is_approving = false;
        self.is_summary_loading = false;
        self.records.is_loading = false;
        self.pending_approvals.is_loading = false;
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PayrollState {
    pub salary: SalaryState,
    pub overtime: OvertimeState,
}

impl PayrollState {
    pub fn error(&self, family: Family) -> Option<&str> {
        match family {
            Family::Salary => self.salary.error.as_deref(),
            Family::Overtime => self.overtime.error.as_deref(),
        }
    }

    pub fn is_loading(&self, slot: LoadingSlot) -> bool {
        match slot {
            LoadingSlot::SalaryGlobal => self.salary.is_loading,
            LoadingSlot::Salaries => self.salary.salaries.is_loading,
            LoadingSlot::Processing => self.salary.is_processing,
            LoadingSlot::BulkGenerating => self.salary.is_bulk_generating,
            LoadingSlot::Overview => self.salary.is_overview_loading,
            LoadingSlot::OvertimeGlobal => self.overtime.is_loading,
            LoadingSlot::OvertimeRecords => self.overtime.records.is_loading,
            LoadingSlot::PendingApprovals => self.overtime.pending_approvals.is_loading,
            LoadingSlot::Approving => self.overtime.is_approving,
            LoadingSlot::OvertimeSummary => self.overtime.is_summary_loading,
        }
    }

    fn flag_mut(&mut self, slot: LoadingSlot) -> &mut bool {
        match slot {
            LoadingSlot::SalaryGlobal => &mut self.salary.is_loading,
            LoadingSlot::Salaries => &mut self.salary.salaries.is_loading,
            LoadingSlot::Processing => &mut self.salary.is_processing,
            LoadingSlot::BulkGenerating => &mut self.salary.is_bulk_generating,
            LoadingSlot::Overview => &mut self.salary.is_overview_loading,
            LoadingSlot::OvertimeGlobal => &mut self.overtime.is_loading,
            LoadingSlot::OvertimeRecords => &mut self.overtime.records.is_loading,
            LoadingSlot::PendingApprovals => &mut self.overtime.pending_approvals.is_loading,
            LoadingSlot::Approving => &mut self.overtime.is_approving,
            LoadingSlot::OvertimeSummary => &mut self.overtime.is_summary_loading,
        }
    }
}

// --- Actions ---

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetLoading { slot: LoadingSlot, loading: bool },
    SetError { family: Family, message: String },
    ClearError(Family),

    SetSalaries { query: SalaryQuery, page: Page<SalaryRecord> },
    SetSalaryDetail(SalaryRecord),
    ClearSalaryDetail,
    AddSalary(SalaryRecord),
    UpdateSalary(SalaryRecord),
    RemoveSalary(RecordId),
    SetPayslip(Payslip),
    SetOverview(PayrollOverview),

    SetOvertimeRecords { query: OvertimeQuery, page: Page<OvertimeRecord> },
    SetPendingApprovals(Page<OvertimeRecord>),
    SetOvertimeDetail(OvertimeRecord),
    ClearOvertimeDetail,
    AddOvertime(OvertimeRecord),
    UpdateOvertime(OvertimeRecord),
    RemoveOvertime(RecordId),
    SetOvertimeSummary(OvertimeSummary),
}

// --- Merge Rules ---

/// Takes the incoming record but never lets its status move backwards.
fn merge_salary(current: &SalaryRecord, incoming: &SalaryRecord) -> SalaryRecord {
    let mut merged = incoming.clone();
    if incoming.status.rank() < current.status.rank() {
        merged.status = current.status;
    }
    merged
}

/// Resolved overtime records keep their resolution.
fn merge_overtime(current: &OvertimeRecord, incoming: &OvertimeRecord) -> OvertimeRecord {
    let mut merged = incoming.clone();
    if current.status.is_resolved() {
        merged.status = current.status;
    }
    merged
}

fn upsert_salary(list: &mut ListState<SalaryRecord>, record: SalaryRecord) {
    match list.items.iter_mut().find(|r| r.id == record.id) {
        Some(existing) => *existing = merge_salary(existing, &record),
        None => list.items.insert(0, record),
    }
}

fn upsert_overtime(list: &mut ListState<OvertimeRecord>, record: OvertimeRecord) {
    match list.items.iter_mut().find(|r| r.id == record.id) {
        Some(existing) => *existing = merge_overtime(existing, &record),
        None => list.items.insert(0, record),
    }
}

/// List surgery touches items only. Pagination is whatever the last fetch reported.
fn remove_by_id<T>(list: &mut ListState<T>, id: RecordId, id_of: impl Fn(&T) -> RecordId) {
    list.items.retain(|item| id_of(item) != id);
}

// --- Reducer ---

/// The single place the read model changes shape.
pub fn reduce(mut state: PayrollState, action: Action) -> PayrollState {
    match action {
        Action::SetLoading { slot, loading } => {
            *state.flag_mut(slot) = loading;
        }
        Action::SetError { family, message } => match family {
            Family::Salary => {
                state.salary.clear_flags();
                state.salary.error = Some(message);
            }
            Family::Overtime => {
                state.overtime.clear_flags();
                state.overtime.error = Some(message);
            }
        },
        Action::ClearError(family) => match family {
            Family::Salary => state.salary.error = None,
            Family::Overtime => state.overtime.error = None,
        },

        Action::SetSalaries { query, page } => {
            state.salary.salaries.replace(page);
            state.salary.salaries_query = Some(query);
        }
        Action::SetSalaryDetail(record) => {
            let salary = &mut state.salary;
            let record = match salary.salaries.items.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => {
                    *existing = merge_salary(existing, &record);
                    existing.clone()
                }
                None => record,
            };
            salary.detail = Some(record);
            salary.is_loading = false;
        }
        Action::ClearSalaryDetail => {
            state.salary.detail = None;
            state.salary.payslip = None;
        }
        Action::AddSalary(record) => {
            upsert_salary(&mut state.salary.salaries, record);
        }
        Action::UpdateSalary(record) => {
            let salary = &mut state.salary;
            if let Some(existing) = salary.salaries.items.iter_mut().find(|r| r.id == record.id) {
                *existing = merge_salary(existing, &record);
            }
            if let Some(detail) = salary.detail.as_mut().filter(|d| d.id == record.id) {
                *detail = merge_salary(detail, &record);
            }
            if let Some(payslip) = salary.payslip.as_mut().filter(|p| p.salary_id == record.id) {
                if record.status.rank() > payslip.status.rank() {
                    payslip.status = record.status;
                }
            }
        }
        Action::RemoveSalary(id) => {
            let salary = &mut state.salary;
            remove_by_id(&mut salary.salaries, id, |r| r.id);
            if salary.detail.as_ref().is_some_and(|d| d.id == id) {
                salary.detail = None;
            }
            if salary.payslip.as_ref().is_some_and(|p| p.salary_id == id) {
                salary.payslip = None;
            }
        }
        Action::SetPayslip(payslip) => {
            state.salary.payslip = Some(payslip);
            state.salary.is_loading = false;
        }
        Action::SetOverview(overview) => {
            state.salary.overview = Some(overview);
            state.salary.is_overview_loading = false;
        }

        Action::SetOvertimeRecords { query, page } => {
            state.overtime.records.replace(page);
            state.overtime.records_query = Some(query);
        }
        Action::SetPendingApprovals(page) => {
            state.overtime.pending_approvals.replace(page);
        }
        Action::SetOvertimeDetail(record) => {
            let overtime = &mut state.overtime;
            let record = match overtime.records.items.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => {
                    *existing = merge_overtime(existing, &record);
                    existing.clone()
                }
                None => record,
            };
            overtime.detail = Some(record);
            overtime.is_loading = false;
        }
        Action::ClearOvertimeDetail => {
            state.overtime.detail = None;
        }
        Action::AddOvertime(record) => {
            upsert_overtime(&mut state.overtime.records, record);
        }
        Action::UpdateOvertime(record) => {
            let overtime = &mut state.overtime;
            if let Some(existing) = overtime.records.items.iter_mut().find(|r| r.id == record.id) {
                *existing = merge_overtime(existing, &record);
            }
            if let Some(detail) = overtime.detail.as_mut().filter(|d| d.id == record.id) {
                *detail = merge_overtime(detail, &record);
            }
            if record.status.is_resolved() {
                remove_by_id(&mut overtime.pending_approvals, record.id, |r| r.id);
            } else if let Some(pending) = overtime
                .pending_approvals
                .items
                .iter_mut()
                .find(|r| r.id == record.id)
            {
                *pending = record;
            }
        }
        Action::RemoveOvertime(id) => {
            let overtime = &mut state.overtime;
            remove_by_id(&mut overtime.records, id, |r| r.id);
            remove_by_id(&mut overtime.pending_approvals, id, |r| r.id);
            if overtime.detail.as_ref().is_some_and(|d| d.id == id) {
                overtime.detail = None;
            }
        }
        Action::SetOvertimeSummary(summary) => {
            state.overtime.summary = Some(summary);
            state.overtime.is_summary_loading = false;
        }
    }
    state
}
