// src/export.rs

use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::models::{EmployeeId, OvertimeRecord, RecordId, SalaryRecord};

#[derive(Serialize)]
struct SalaryRow<'a> {
    id: RecordId,
    employee_id: EmployeeId,
    employee_name: &'a str,
    month: u32,
    year: i32,
    basic_salary: Decimal,
    gross_salary: Decimal,
    total_deductions: Decimal,
    net_salary: Decimal,
    status: &'static str,
    payment_method: &'a str,
    payment_reference: &'a str,
}

#[derive(Serialize)]
struct OvertimeRow<'a> {
    id: RecordId,
    employee_id: EmployeeId,
    employee_name: &'a str,
    date: String,
    start_time: String,
    end_time: String,
    duration_hours: Decimal,
    overtime_rate: Decimal,
    calculated_amount: Decimal,
    status: &'static str,
    reason: &'a str,
}

pub fn write_salaries_csv<W: Write>(writer: W, records: &[SalaryRecord]) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(SalaryRow {
            id: record.id,
            employee_id: record.employee_id,
            employee_name: record.employee_name.as_deref().unwrap_or(""),
            month: record.period.month,
            year: record.period.year,
            basic_salary: record.basic_salary,
            gross_salary: record.gross_salary,
            total_deductions: record.total_deductions,
            net_salary: record.net_salary,
            status: record.status.as_str(),
            payment_method: record.payment_method.as_deref().unwrap_or(""),
            payment_reference: record.payment_reference.as_deref().unwrap_or(""),
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_overtime_csv<W: Write>(writer: W, records: &[OvertimeRecord]) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(OvertimeRow {
            id: record.id,
            employee_id: record.employee_id,
            employee_name: record.employee_name.as_deref().unwrap_or(""),
            date: record.date.format("%Y-%m-%d").to_string(),
            start_time: record.start_time.format("%H:%M").to_string(),
            end_time: record.end_time.format("%H:%M").to_string(),
            duration_hours: record.duration_hours,
            overtime_rate: record.overtime_rate,
            calculated_amount: record.calculated_amount,
            status: record.status.as_str(),
            reason: &record.reason,
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn export_salaries_to_path(path: &Path, records: &[SalaryRecord]) -> Result<(), csv::Error> {
    let file = std::fs::File::create(path)?;
    write_salaries_csv(file, records)?;
    info!("Exported {} salary records to {}", records.len(), path.display());
    Ok(())
}
