// src/preview.rs
//
// Non-authoritative client previews. The server recomputes every one of
// these values on create/update; the next fetch always wins.

use chrono::NaiveTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

use crate::models::{OvertimeRequest, Payslip};

pub const STANDARD_HOURS_PER_DAY: Decimal = dec!(8);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreviewError {
    #[error("End time must be after start time")]
    EndNotAfterStart,
    #[error("Working days must be greater than zero")]
    NoWorkingDays,
    #[error("Overtime amount is out of range")]
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OvertimePreview {
    pub duration_hours: Decimal,
    pub calculated_amount: Decimal,
}

/// Hours between two clock times on the same day, to two decimals.
pub fn duration_hours(start: NaiveTime, end: NaiveTime) -> Result<Decimal, PreviewError> {
    let seconds = end.signed_duration_since(start).num_seconds();
    if seconds <= 0 {
        return Err(PreviewError::EndNotAfterStart);
    }
    Ok((Decimal::from(seconds) / dec!(3600)).round_dp(2))
}

pub fn overtime_amount(
    duration_hours: Decimal,
    hourly_rate: Decimal,
    overtime_rate: Decimal,
) -> Result<Decimal, PreviewError> {
    duration_hours
        .checked_mul(hourly_rate)
        .and_then(|amount| amount.checked_mul(overtime_rate))
        .map(|amount| amount.round_dp(2))
        .ok_or(PreviewError::Overflow)
}

pub fn hourly_rate_from_salary(basic_salary: Decimal, working_days: u32) -> Result<Decimal, PreviewError> {
    if working_days == 0 {
        return Err(PreviewError::NoWorkingDays);
    }
    Ok((basic_salary / (Decimal::from(working_days) * STANDARD_HOURS_PER_DAY)).round_dp(2))
}

pub fn preview_overtime(
    request: &OvertimeRequest,
    hourly_rate: Decimal,
) -> Result<OvertimePreview, PreviewError> {
    let duration = duration_hours(request.start_time, request.end_time)?;
    Ok(OvertimePreview {
        duration_hours: duration,
        calculated_amount: overtime_amount(duration, hourly_rate, request.overtime_rate)?,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayslipTotals {
    pub gross: Decimal,
    pub deductions: Decimal,
    pub net: Decimal,
}

impl Payslip {
    /// Sums the line items as displayed.
    pub fn totals(&self) -> PayslipTotals {
        let gross: Decimal = self.earnings.iter().map(|line| line.amount).sum();
        let deductions: Decimal = self.deductions.iter().map(|line| line.amount).sum();
        PayslipTotals {
            gross,
            deductions,
            net: gross - deductions,
        }
    }

    /// Whether the line items add up to the server's totals.
    pub fn is_consistent(&self) -> bool {
        let totals = self.totals();
        totals.gross == self.gross_salary
            && totals.deductions == self.total_deductions
            && totals.net == self.net_salary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PayPeriod, PayslipLine, SalaryStatus};
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn duration_is_measured_in_hours() {
        assert_eq!(duration_hours(at(18, 0), at(20, 30)).unwrap(), dec!(2.5));
        assert_eq!(duration_hours(at(17, 0), at(17, 20)).unwrap(), dec!(0.33));
    }

    #[test]
    fn end_must_follow_start() {
        assert_eq!(
            duration_hours(at(20, 0), at(20, 0)),
            Err(PreviewError::EndNotAfterStart)
        );
        assert_eq!(
            duration_hours(at(21, 0), at(19, 0)),
            Err(PreviewError::EndNotAfterStart)
        );
    }

    #[test]
    fn amount_multiplies_duration_rate_and_multiplier() {
        let request = OvertimeRequest {
            employee_id: 7,
            date: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
            start_time: at(18, 0),
            end_time: at(20, 30),
            reason: "Release".to_string(),
            description: None,
            overtime_rate: dec!(1.5),
        };
        let hourly = hourly_rate_from_salary(dec!(4400), 22).unwrap();
        assert_eq!(hourly, dec!(25));

        let preview = preview_overtime(&request, hourly).unwrap();
        assert_eq!(preview.duration_hours, dec!(2.5));
        assert_eq!(preview.calculated_amount, dec!(93.75));
    }

    #[test]
    fn oversized_rates_are_reported_not_panicking() {
        assert_eq!(
            overtime_amount(dec!(2.5), Decimal::MAX, dec!(1.5)),
            Err(PreviewError::Overflow)
        );
        assert_eq!(
            overtime_amount(dec!(2.5), dec!(25), Decimal::MAX),
            Err(PreviewError::Overflow)
        );
        assert_eq!(overtime_amount(dec!(2.5), dec!(25), dec!(1.5)), Ok(dec!(93.75)));
    }

    #[test]
    fn payslip_totals_follow_line_items() {
        let payslip = Payslip {
            salary_id: 42,
            employee_id: 7,
            employee_name: None,
            period: PayPeriod { month: 3, year: 2024 },
            earnings: vec![
                PayslipLine { label: "Basic".into(), amount: dec!(5000) },
                PayslipLine { label: "Overtime".into(), amount: dec!(93.75) },
            ],
            deductions: vec![PayslipLine { label: "Tax".into(), amount: dec!(750.50) }],
            gross_salary: dec!(5093.75),
            total_deductions: dec!(750.50),
            net_salary: dec!(4343.25),
            status: SalaryStatus::Processed,
        };

        let totals = payslip.totals();
        assert_eq!(totals.gross, dec!(5093.75));
        assert_eq!(totals.net, dec!(4343.25));
        assert!(payslip.is_consistent());
    }
}
