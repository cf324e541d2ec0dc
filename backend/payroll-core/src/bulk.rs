// src/bulk.rs

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::commands::{extract_error_message, CommandError, PayrollService};
use crate::envelope::normalize_entity;
use crate::gateway::{ApiRequest, Gateway, GatewayError};
use crate::models::{BulkGenerateRequest, EmployeeId, GenerateSalaryRequest, SalaryQuery, SalaryRecord};
use crate::reducer::{Action, Family, LoadingSlot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BulkStrategy {
    /// One `bulk-generate` call; the server handles the batch.
    #[default]
    Server,
    /// One `generate` call per employee, all awaited.
    FanOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkFailure {
    #[serde(default)]
    pub employee_id: Option<EmployeeId>,
    #[serde(alias = "error", alias = "reason")]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BulkOutcome {
    #[serde(alias = "salaries", alias = "items", alias = "succeeded")]
    pub generated: Vec<SalaryRecord>,
    #[serde(alias = "failed", alias = "errors")]
    pub failures: Vec<BulkFailure>,
}

impl BulkOutcome {
    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }
}

fn parse_bulk_response(payload: Value) -> Result<BulkOutcome, GatewayError> {
    let inner = match payload {
        Value::Object(mut object) if object.contains_key("data") => {
            object.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };
    match inner {
        Value::Null => Ok(BulkOutcome::default()),
        Value::Array(_) => Ok(BulkOutcome {
            generated: serde_json::from_value(inner)?,
            failures: Vec::new(),
        }),
        Value::Object(_) => Ok(serde_json::from_value(inner)?),
        other => Err(GatewayError::Envelope(format!(
            "unexpected bulk generation payload: {}",
            other
        ))),
    }
}

async fn generate_one(
    gateway: Arc<dyn Gateway>,
    body: GenerateSalaryRequest,
) -> Result<SalaryRecord, GatewayError> {
    let request = ApiRequest::post("/salaries/generate", "Generate Salary").json(&body)?;
    let payload = gateway.execute(request).await?;
    normalize_entity(payload)
}

impl PayrollService {
    /// Generates salaries for every employee in the request. One employee's
    /// failure never stops the others; once the batch settles the salary list
    /// is refreshed exactly once.
    pub async fn bulk_generate_salaries(
        &self,
        request: BulkGenerateRequest,
    ) -> Result<BulkOutcome, CommandError> {
        if request.employee_ids.is_empty() {
            return Err(self.reject(Family::Salary, "Select at least one employee"));
        }
        if !(1..=12).contains(&request.month) {
            return Err(self.reject(Family::Salary, format!("Invalid month: {}", request.month)));
        }

        info!(
            "Generating salaries for {} employees ({}/{}) via {:?}",
            request.employee_ids.len(),
            request.month,
            request.year,
            self.settings.bulk_strategy
        );
        self.begin(LoadingSlot::BulkGenerating);

        let settled = match self.settings.bulk_strategy {
            BulkStrategy::Server => self.bulk_via_server(&request).await,
            BulkStrategy::FanOut => Ok(self.bulk_via_fan_out(&request).await),
        };

        let result = match settled {
            Ok(outcome) => {
                let mut actions = vec![Action::SetLoading {
                    slot: LoadingSlot::BulkGenerating,
                    loading: false,
                }];
                if let Some(last) = outcome.failures.last() {
                    warn!(
                        "{} of {} salary generations failed",
                        outcome.failures.len(),
                        request.employee_ids.len()
                    );
                    actions.push(Action::SetError {
                        family: Family::Salary,
                        message: last.message.clone(),
                    });
                }
                self.store.dispatch_all(actions);
                Ok(outcome)
            }
            Err(e) => Err(self.fail(Family::Salary, "Bulk Generate Salaries", e)),
        };

        let query = self.refresh_query(&request);
        if let Err(e) = self.reload_salaries(query).await {
            warn!("Salary list refresh after bulk generation failed: {}", e);
        }

        result
    }

    async fn bulk_via_server(&self, request: &BulkGenerateRequest) -> Result<BulkOutcome, GatewayError> {
        let api_request =
            ApiRequest::post("/salaries/bulk-generate", "Bulk Generate Salaries").json(request)?;
        let payload = self.gateway.execute(api_request).await?;
        parse_bulk_response(payload)
    }

    async fn bulk_via_fan_out(&self, request: &BulkGenerateRequest) -> BulkOutcome {
        let mut tasks = JoinSet::new();
        for &employee_id in &request.employee_ids {
            let gateway = Arc::clone(&self.gateway);
            let body = GenerateSalaryRequest {
                employee_id,
                month: request.month,
                year: request.year,
            };
            tasks.spawn(async move { (employee_id, generate_one(gateway, body).await) });
        }

        let mut outcome = BulkOutcome::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(record))) => outcome.generated.push(record),
                Ok((employee_id, Err(e))) => {
                    warn!("Salary generation for employee {} failed: {}", employee_id, e);
                    outcome.failures.push(BulkFailure {
                        employee_id: Some(employee_id),
                        message: extract_error_message(&e),
                    });
                }
                Err(join_err) => {
                    warn!("Salary generation task did not complete: {}", join_err);
                    outcome.failures.push(BulkFailure {
                        employee_id: None,
                        message: join_err.to_string(),
                    });
                }
            }
        }
        outcome
    }

    /// Keeps the list the user is looking at when it covers the generated
    /// period; otherwise switches to that period.
    fn refresh_query(&self, request: &BulkGenerateRequest) -> SalaryQuery {
        let current = self.store.read(|s| s.salary.salaries_query.clone());
        match current {
            Some(query)
                if query.month.map_or(true, |m| m == request.month)
                    && query.year.map_or(true, |y| y == request.year) =>
            {
                query
            }
            _ => SalaryQuery::for_period(request.month, request.year),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn salary(id: i64, employee_id: i64) -> Value {
        json!({
            "id": id, "employeeId": employee_id, "month": 3, "year": 2024,
            "netSalary": 1000, "status": "Draft"
        })
    }

    #[test]
    fn bulk_response_as_plain_list() {
        let outcome = parse_bulk_response(json!({ "data": [salary(1, 7), salary(2, 8)] })).unwrap();
        assert_eq!(outcome.generated.len(), 2);
        assert!(outcome.is_complete_success());
    }

    #[test]
    fn bulk_response_with_failures() {
        let outcome = parse_bulk_response(json!({
            "data": {
                "generated": [salary(1, 7)],
                "failed": [{ "employeeId": 8, "error": "Salary already exists for this period" }]
            }
        }))
        .unwrap();

        assert_eq!(outcome.generated.len(), 1);
        assert_eq!(
            outcome.failures,
            vec![BulkFailure {
                employee_id: Some(8),
                message: "Salary already exists for this period".to_string(),
            }]
        );
    }

    #[test]
    fn empty_bulk_response_is_an_empty_outcome() {
        assert_eq!(parse_bulk_response(Value::Null).unwrap(), BulkOutcome::default());
        assert!(parse_bulk_response(json!(true)).is_err());
    }
}
