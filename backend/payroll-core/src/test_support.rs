// src/test_support.rs

use async_trait::async_trait;
use chrono::TimeZone;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::bulk::BulkStrategy;
use crate::commands::{PayrollService, ServiceSettings};
use crate::gateway::{parse_error_body, ApiRequest, Gateway, GatewayError};
use crate::staleness::{ManualClock, StalenessCache};
use crate::store::Store;

#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    Error(u16, Value),
    Unauthorized,
}

pub struct Hold {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl Hold {
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

type Route = (Method, String);

/// Scripted gateway. Replies queue per route; the last one repeats.
#[derive(Default)]
pub struct MockGateway {
    replies: Mutex<HashMap<Route, VecDeque<Reply>>>,
    holds: Mutex<HashMap<Route, (Arc<Notify>, Arc<Notify>)>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, method: Method, path: &str, reply: Reply) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
        self
    }

    pub fn ok(&self, method: Method, path: &str, body: Value) -> &Self {
        self.reply(method, path, Reply::Json(body))
    }

    pub fn fail(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        self.reply(method, path, Reply::Error(status, body))
    }

    /// The next call on this route waits until the hold is released.
    pub fn hold(&self, method: Method, path: &str) -> Hold {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        self.holds
            .lock()
            .unwrap()
            .insert((method, path.to_string()), (entered.clone(), release.clone()));
        Hold { entered, release }
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }

    fn next_reply(&self, route: &Route) -> Option<Reply> {
        let mut replies = self.replies.lock().unwrap();
        let queue = replies.get_mut(route)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn execute(&self, request: ApiRequest) -> Result<Value, GatewayError> {
        let route = (request.method.clone(), request.path.clone());
        self.calls.lock().unwrap().push(request);

        let hold = self.holds.lock().unwrap().remove(&route);
        if let Some((entered, release)) = hold {
            entered.notify_one();
            release.notified().await;
        }

        match self.next_reply(&route) {
            Some(Reply::Json(body)) => Ok(body),
            Some(Reply::Error(status, body)) => Err(parse_error_body(
                StatusCode::from_u16(status).unwrap(),
                body.to_string(),
            )),
            Some(Reply::Unauthorized) => Err(GatewayError::Unauthorized),
            None => Err(parse_error_body(
                StatusCode::NOT_FOUND,
                json!({ "message": format!("No route for {} {}", route.0, route.1) }).to_string(),
            )),
        }
    }
}

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        chrono::Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
    ))
}

pub fn service_with(
    gateway: Arc<MockGateway>,
    clock: Arc<ManualClock>,
    bulk_strategy: BulkStrategy,
) -> PayrollService {
    PayrollService::new(
        gateway,
        Store::new(),
        Arc::new(StalenessCache::new(clock)),
        ServiceSettings {
            default_page_size: 10,
            bulk_strategy,
        },
    )
}

pub fn service(gateway: Arc<MockGateway>) -> PayrollService {
    service_with(gateway, clock(), BulkStrategy::Server)
}

pub fn salary_json(id: i64, employee_id: i64, status: &str) -> Value {
    json!({
        "id": id,
        "employeeId": employee_id,
        "employeeName": format!("Employee {}", employee_id),
        "month": 3,
        "year": 2024,
        "basicSalary": 5000,
        "grossSalary": 5000,
        "totalDeductions": 750,
        "netSalary": 4250,
        "workingDays": 22,
        "presentDays": 22,
        "status": status
    })
}

pub fn overtime_json(id: i64, employee_id: i64, status: &str) -> Value {
    json!({
        "id": id,
        "employeeId": employee_id,
        "date": "2024-03-14",
        "startTime": "18:00:00",
        "endTime": "20:30:00",
        "durationHours": 2.5,
        "reason": "Release night",
        "status": status,
        "overtimeRate": 1.5,
        "calculatedAmount": 93.75
    })
}

pub fn paged(items: Vec<Value>, total_items: u64) -> Value {
    json!({
        "data": {
            "items": items,
            "totalItems": total_items,
            "page": 1,
            "pageSize": 10,
            "totalPages": total_items.div_ceil(10)
        }
    })
}
