// src/reducer_tests.rs

#[cfg(test)]
mod tests {
    use crate::models::{
        OvertimeQuery, OvertimeRecord, OvertimeStatus, Page, Pagination, SalaryQuery, SalaryRecord,
        SalaryStatus,
    };
    use crate::reducer::{reduce, Action, Family, LoadingSlot, PayrollState};
    use crate::test_support::{overtime_json, salary_json};

    fn salary(id: i64, status: &str) -> SalaryRecord {
        serde_json::from_value(salary_json(id, 7, status)).unwrap()
    }

    fn overtime(id: i64, status: &str) -> OvertimeRecord {
        serde_json::from_value(overtime_json(id, 7, status)).unwrap()
    }

    fn page<T>(items: Vec<T>) -> Page<T> {
        let total_items = items.len() as u64;
        Page {
            items,
            pagination: Pagination {
                total_items,
                total_pages: 1,
                ..Pagination::default()
            },
        }
    }

    fn apply(state: PayrollState, actions: Vec<Action>) -> PayrollState {
        actions.into_iter().fold(state, reduce)
    }

    fn with_salaries(records: Vec<SalaryRecord>) -> PayrollState {
        reduce(
            PayrollState::default(),
            Action::SetSalaries {
                query: SalaryQuery::default(),
                page: page(records),
            },
        )
    }

    #[test]
    fn test_set_error_clears_every_flag_in_its_family_only() {
        let state = apply(
            PayrollState::default(),
            vec![
                Action::SetLoading { slot: LoadingSlot::Salaries, loading: true },
                Action::SetLoading { slot: LoadingSlot::Processing, loading: true },
                Action::SetLoading { slot: LoadingSlot::BulkGenerating, loading: true },
                Action::SetLoading { slot: LoadingSlot::Approving, loading: true },
                Action::SetError {
                    family: Family::Salary,
                    message: "Network Error".to_string(),
                },
            ],
        );

        assert!(!state.is_loading(LoadingSlot::Salaries));
        assert!(!state.is_loading(LoadingSlot::Processing));
        assert!(!state.is_loading(LoadingSlot::BulkGenerating));
        assert!(state.is_loading(LoadingSlot::Approving));
        assert_eq!(state.error(Family::Salary), Some("Network Error"));
        assert_eq!(state.error(Family::Overtime), None);
    }

    #[test]
    fn test_paid_salary_never_moves_back() {
        let state = with_salaries(vec![salary(42, "Paid")]);
        let state = reduce(state, Action::SetSalaryDetail(salary(42, "Paid")));

        let state = reduce(state, Action::UpdateSalary(salary(42, "Processed")));
        assert_eq!(state.salary.find(42).unwrap().status, SalaryStatus::Paid);
        assert_eq!(state.salary.detail.as_ref().unwrap().status, SalaryStatus::Paid);

        let state = reduce(state, Action::AddSalary(salary(42, "Draft")));
        assert_eq!(state.salary.find(42).unwrap().status, SalaryStatus::Paid);
        assert_eq!(state.salary.salaries.items.len(), 1);
    }

    #[test]
    fn test_update_salary_merges_list_and_detail() {
        let mut processed = salary(42, "Processed");
        processed.net_salary = rust_decimal_macros::dec!(4300);

        let state = with_salaries(vec![salary(41, "Draft"), salary(42, "Draft")]);
        let state = reduce(state, Action::SetSalaryDetail(salary(42, "Draft")));
        let state = reduce(state, Action::UpdateSalary(processed.clone()));

        assert_eq!(state.salary.find(42), Some(&processed));
        assert_eq!(state.salary.detail.as_ref(), Some(&processed));
        assert_eq!(state.salary.find(41).unwrap().status, SalaryStatus::Draft);
    }

    #[test]
    fn test_update_for_unknown_salary_leaves_list_alone() {
        let state = with_salaries(vec![salary(1, "Draft")]);
        let state = reduce(state, Action::UpdateSalary(salary(99, "Processed")));

        assert_eq!(state.salary.salaries.items.len(), 1);
        assert!(state.salary.detail.is_none());
    }

    #[test]
    fn test_add_salary_prepends_without_touching_pagination() {
        let state = with_salaries(vec![salary(1, "Draft")]);
        let before = state.salary.salaries.pagination;
        let state = reduce(state, Action::AddSalary(salary(2, "Draft")));

        let ids: Vec<i64> = state.salary.salaries.items.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(state.salary.salaries.pagination, before);
    }

    #[test]
    fn test_add_to_full_page_keeps_fetched_pagination() {
        let fetched = Pagination {
            page: 1,
            page_size: 10,
            total_items: 10,
            total_pages: 1,
        };
        let state = reduce(
            PayrollState::default(),
            Action::SetSalaries {
                query: SalaryQuery::default(),
                page: Page {
                    items: (1..=10).map(|id| salary(id, "Draft")).collect(),
                    pagination: fetched,
                },
            },
        );

        let state = reduce(state, Action::AddSalary(salary(11, "Draft")));

        assert_eq!(state.salary.salaries.items.len(), 11);
        assert_eq!(state.salary.salaries.pagination, fetched);
    }

    #[test]
    fn test_remove_salary_drops_detail_and_payslip() {
        let state = with_salaries(vec![salary(5, "Draft")]);
        let before = state.salary.salaries.pagination;
        let state = reduce(state, Action::SetSalaryDetail(salary(5, "Draft")));
        let state = reduce(state, Action::RemoveSalary(5));

        assert!(state.salary.salaries.items.is_empty());
        assert_eq!(state.salary.salaries.pagination, before);
        assert!(state.salary.detail.is_none());

        let state = reduce(state, Action::RemoveSalary(5));
        assert_eq!(state.salary.salaries.pagination, before);
    }

    #[test]
    fn test_set_salaries_replaces_list_and_remembers_query() {
        let query = SalaryQuery::for_period(3, 2024);
        let state = with_salaries(vec![salary(1, "Draft"), salary(2, "Draft")]);
        let state = reduce(
            state,
            Action::SetSalaries {
                query: query.clone(),
                page: page(vec![salary(3, "Paid")]),
            },
        );

        let list = state.salary.list();
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].id, 3);
        assert!(!list.is_loading);
        assert_eq!(state.salary.salaries_query, Some(query));
    }

    #[test]
    fn test_resolved_overtime_keeps_its_resolution() {
        let state = reduce(
            PayrollState::default(),
            Action::SetOvertimeRecords {
                query: OvertimeQuery::default(),
                page: page(vec![overtime(9, "Approved")]),
            },
        );
        let state = reduce(state, Action::UpdateOvertime(overtime(9, "Pending")));
        assert_eq!(state.overtime.find(9).unwrap().status, OvertimeStatus::Approved);

        let state = reduce(state, Action::UpdateOvertime(overtime(9, "Rejected")));
        assert_eq!(state.overtime.find(9).unwrap().status, OvertimeStatus::Approved);
    }

    #[test]
    fn test_approval_updates_records_detail_and_pending_queue() {
        let state = apply(
            PayrollState::default(),
            vec![
                Action::SetOvertimeRecords {
                    query: OvertimeQuery::default(),
                    page: page(vec![overtime(9, "Pending"), overtime(10, "Pending")]),
                },
                Action::SetPendingApprovals(page(vec![overtime(9, "Pending"), overtime(10, "Pending")])),
                Action::SetOvertimeDetail(overtime(9, "Pending")),
                Action::UpdateOvertime(overtime(9, "Approved")),
            ],
        );
        let fetched = page(vec![overtime(9, "Pending"), overtime(10, "Pending")]).pagination;

        assert_eq!(state.overtime.find(9).unwrap().status, OvertimeStatus::Approved);
        assert_eq!(state.overtime.detail.as_ref().unwrap().status, OvertimeStatus::Approved);
        let pending = state.overtime.pending_approvals();
        assert_eq!(pending.items.len(), 1);
        assert_eq!(pending.items[0].id, 10);
        assert_eq!(pending.pagination, fetched);
        assert_eq!(state.overtime.records.pagination, fetched);
    }

    #[test]
    fn test_stale_salary_detail_matches_list_status() {
        let state = with_salaries(vec![salary(42, "Paid")]);
        let state = reduce(state, Action::SetSalaryDetail(salary(42, "Processed")));

        assert_eq!(state.salary.find(42).unwrap().status, SalaryStatus::Paid);
        assert_eq!(state.salary.detail.as_ref().unwrap().status, SalaryStatus::Paid);
    }

    #[test]
    fn test_stale_overtime_detail_keeps_resolution() {
        let state = reduce(
            PayrollState::default(),
            Action::SetOvertimeRecords {
                query: OvertimeQuery::default(),
                page: page(vec![overtime(9, "Rejected")]),
            },
        );
        let state = reduce(state, Action::SetOvertimeDetail(overtime(9, "Pending")));

        assert_eq!(state.overtime.detail.as_ref().unwrap().status, OvertimeStatus::Rejected);
    }

    #[test]
    fn test_salary_detail_outside_list_is_stored_as_received() {
        let state = reduce(PayrollState::default(), Action::SetSalaryDetail(salary(7, "Processed")));

        assert_eq!(state.salary.detail.as_ref().unwrap().status, SalaryStatus::Processed);
        assert!(state.salary.salaries.items.is_empty());
    }

    #[test]
    fn test_remove_overtime_clears_everywhere() {
        let state = apply(
            PayrollState::default(),
            vec![
                Action::AddOvertime(overtime(9, "Pending")),
                Action::SetPendingApprovals(page(vec![overtime(9, "Pending")])),
                Action::SetOvertimeDetail(overtime(9, "Pending")),
                Action::RemoveOvertime(9),
            ],
        );

        assert!(state.overtime.records.items.is_empty());
        assert!(state.overtime.pending_approvals.items.is_empty());
        assert!(state.overtime.detail.is_none());
    }

    #[test]
    fn test_clear_error_keeps_other_family() {
        let state = apply(
            PayrollState::default(),
            vec![
                Action::SetError { family: Family::Salary, message: "a".to_string() },
                Action::SetError { family: Family::Overtime, message: "b".to_string() },
                Action::ClearError(Family::Salary),
            ],
        );

        assert_eq!(state.error(Family::Salary), None);
        assert_eq!(state.error(Family::Overtime), Some("b"));
    }
}
