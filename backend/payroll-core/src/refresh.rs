// src/refresh.rs

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::commands::PayrollService;
use crate::models::PayPeriod;

/// Keeps the payroll overview warm. Each tick only goes to the network when
/// the overview has aged past `max_age_minutes`, and failures never reach
/// the error slot.
pub async fn run_overview_refresh(
    service: Arc<PayrollService>,
    period: Option<PayPeriod>,
    interval: Duration,
    max_age_minutes: i64,
) {
    info!(
        "Starting background overview refresh task (every {:?}, max age {} min)",
        interval, max_age_minutes
    );

    loop {
        if service.refresh_overview_if_stale(period, max_age_minutes).await {
            info!("Payroll overview refreshed");
        } else if service.is_data_stale(crate::staleness::OVERVIEW_KEY, max_age_minutes) {
            warn!("Payroll overview is stale and could not be refreshed; retrying next tick");
        } else {
            debug!("Payroll overview still fresh");
        }
        sleep(interval).await;
    }
}

pub fn spawn_overview_refresh(
    service: Arc<PayrollService>,
    period: Option<PayPeriod>,
    interval: Duration,
    max_age_minutes: i64,
) -> JoinHandle<()> {
    tokio::spawn(run_overview_refresh(service, period, interval, max_age_minutes))
}
