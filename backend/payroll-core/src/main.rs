// src/main.rs
use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use payroll_core::bulk::BulkStrategy;
use payroll_core::export::{export_salaries_to_path, write_overtime_csv};
use payroll_core::models::{
    clock_time, ApprovalRequest, BulkGenerateRequest, EmployeeId, GenerateSalaryRequest,
    OvertimeQuery, OvertimeRecord, OvertimeRequest, OvertimeStatus, PayPeriod, PaymentDetails,
    PayrollOverview, RecordId, RejectionRequest, SalaryQuery, SalaryRecord, SalaryStatus,
};
use payroll_core::preview::preview_overtime;
use payroll_core::refresh::spawn_overview_refresh;
use payroll_core::{PayrollConfig, PayrollService, SessionEvent};

/// payroll - salary lifecycle and overtime approvals against the ERP API
#[derive(Parser, Debug)]
#[command(name = "payroll")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Salary records
    #[command(subcommand)]
    Salaries(SalaryCommands),

    /// Overtime requests and approvals
    #[command(subcommand)]
    Overtime(OvertimeCommands),

    /// Payroll totals for a period
    Overview {
        #[arg(long)]
        month: Option<u32>,
        #[arg(long)]
        year: Option<i32>,
    },

    /// Keep the overview fresh and print it whenever it changes
    Watch {
        #[arg(long)]
        month: Option<u32>,
        #[arg(long)]
        year: Option<i32>,
    },
}

#[derive(Subcommand, Debug)]
enum SalaryCommands {
    /// List salary records
    #[command(alias = "ls")]
    List {
        #[arg(long)]
        month: Option<u32>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        status: Option<SalaryStatus>,
        #[arg(long)]
        employee: Option<EmployeeId>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        page_size: Option<u32>,
    },

    /// Show one salary record
    Show { id: RecordId },

    /// Generate a draft salary for one employee
    Generate {
        #[arg(long)]
        employee: EmployeeId,
        #[arg(long)]
        month: u32,
        #[arg(long)]
        year: i32,
    },

    /// Generate salaries for several employees
    BulkGenerate {
        /// Comma-separated employee ids
        #[arg(long, value_delimiter = ',', required = true)]
        employees: Vec<EmployeeId>,
        #[arg(long)]
        month: u32,
        #[arg(long)]
        year: i32,
        /// One generate call per employee instead of the batch endpoint
        #[arg(long)]
        fan_out: bool,
    },

    /// Draft -> Processed
    Process { id: RecordId },

    /// Processed -> Paid
    Pay {
        id: RecordId,
        #[arg(long)]
        method: String,
        #[arg(long)]
        reference: Option<String>,
    },

    /// Delete a draft salary
    Delete { id: RecordId },

    /// Print the payslip for a salary
    Payslip { id: RecordId },

    /// Write every salary of a period to CSV
    Export {
        #[arg(long)]
        month: u32,
        #[arg(long)]
        year: i32,
        #[arg(short, long, default_value = "salaries.csv")]
        output: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum OvertimeCommands {
    /// List overtime records
    #[command(alias = "ls")]
    List {
        #[arg(long)]
        employee: Option<EmployeeId>,
        #[arg(long)]
        status: Option<OvertimeStatus>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        page: Option<u32>,
        /// Write the listed page to CSV instead of printing it
        #[arg(long)]
        csv: bool,
    },

    /// Records waiting for approval
    Pending {
        #[arg(long)]
        page: Option<u32>,
    },

    /// Show one overtime record
    Show { id: RecordId },

    /// Submit an overtime request
    Create {
        #[command(flatten)]
        request: OvertimeArgs,
    },

    /// Edit a pending overtime request
    Update {
        id: RecordId,
        #[command(flatten)]
        request: OvertimeArgs,
    },

    /// Pending -> Approved
    Approve {
        id: RecordId,
        #[arg(long)]
        comments: Option<String>,
    },

    /// Pending -> Rejected
    Reject {
        id: RecordId,
        #[arg(long)]
        reason: String,
    },

    /// Delete an overtime request
    Delete { id: RecordId },

    /// Overtime rollup for an employee
    Summary {
        employee: EmployeeId,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Estimate hours and amount without submitting
    Preview {
        #[command(flatten)]
        request: OvertimeArgs,
        #[arg(long)]
        hourly_rate: Decimal,
    },
}

#[derive(clap::Args, Debug)]
struct OvertimeArgs {
    #[arg(long)]
    employee: EmployeeId,
    #[arg(long)]
    date: NaiveDate,
    #[arg(long, value_parser = parse_clock_time)]
    start: NaiveTime,
    #[arg(long, value_parser = parse_clock_time)]
    end: NaiveTime,
    #[arg(long)]
    reason: String,
    #[arg(long)]
    description: Option<String>,
    #[arg(long, default_value = "1.5")]
    rate: Decimal,
}

impl From<OvertimeArgs> for OvertimeRequest {
    fn from(args: OvertimeArgs) -> Self {
        OvertimeRequest {
            employee_id: args.employee,
            date: args.date,
            start_time: args.start,
            end_time: args.end,
            reason: args.reason,
            description: args.description,
            overtime_rate: args.rate,
        }
    }
}

fn parse_clock_time(raw: &str) -> Result<NaiveTime, String> {
    clock_time::parse(raw).ok_or_else(|| format!("expected HH:MM or HH:MM:SS, got '{}'", raw))
}

fn period(month: Option<u32>, year: Option<i32>) -> Option<PayPeriod> {
    match (month, year) {
        (Some(month), Some(year)) => Some(PayPeriod { month, year }),
        _ => None,
    }
}

// --- Output ---

fn print_salary(record: &SalaryRecord) {
    let actions: Vec<String> = record
        .status
        .available_actions()
        .iter()
        .map(|a| format!("{:?}", a))
        .collect();
    println!(
        "#{:<6} emp {:<6} {:<24} {:>2}/{} net {:>12} {:<10} [{}]",
        record.id,
        record.employee_id,
        record.employee_name.as_deref().unwrap_or("-"),
        record.period.month,
        record.period.year,
        record.net_salary,
        record.status,
        actions.join(", ")
    );
}

fn print_overtime(record: &OvertimeRecord) {
    println!(
        "#{:<6} emp {:<6} {} {}-{} {:>5}h x{} = {:>10} {:<9} {}",
        record.id,
        record.employee_id,
        record.date,
        record.start_time.format("%H:%M"),
        record.end_time.format("%H:%M"),
        record.duration_hours,
        record.overtime_rate,
        record.calculated_amount,
        record.status,
        record.reason
    );
}

fn print_overview(overview: &PayrollOverview) {
    println!(
        "employees {} | gross {} | deductions {} | net {} | draft {} processed {} paid {} | pending overtime {}",
        overview.total_employees,
        overview.total_gross,
        overview.total_deductions,
        overview.total_net,
        overview.draft_count,
        overview.processed_count,
        overview.paid_count,
        overview.pending_overtime_count
    );
}

// --- Commands ---

async fn run_salary_command(service: &PayrollService, command: SalaryCommands) -> Result<()> {
    match command {
        SalaryCommands::List {
            month,
            year,
            status,
            employee,
            page,
            page_size,
        } => {
            let page = service
                .fetch_salaries(SalaryQuery {
                    page,
                    page_size,
                    month,
                    year,
                    status,
                    employee_id: employee,
                })
                .await?;
            page.items.iter().for_each(print_salary);
            println!(
                "page {}/{} ({} records)",
                page.pagination.page, page.pagination.total_pages, page.pagination.total_items
            );
        }
        SalaryCommands::Show { id } => print_salary(&service.fetch_salary(id).await?),
        SalaryCommands::Generate {
            employee,
            month,
            year,
        } => {
            let record = service
                .generate_salary(GenerateSalaryRequest {
                    employee_id: employee,
                    month,
                    year,
                })
                .await?;
            print_salary(&record);
        }
        SalaryCommands::BulkGenerate {
            employees,
            month,
            year,
            fan_out,
        } => {
            let fan_out_service;
            let service = if fan_out && service.settings().bulk_strategy != BulkStrategy::FanOut {
                let mut settings = service.settings();
                settings.bulk_strategy = BulkStrategy::FanOut;
                fan_out_service = service.with_settings(settings);
                &fan_out_service
            } else {
                service
            };
            let outcome = service
                .bulk_generate_salaries(BulkGenerateRequest {
                    employee_ids: employees,
                    month,
                    year,
                })
                .await?;
            outcome.generated.iter().for_each(print_salary);
            for failure in &outcome.failures {
                match failure.employee_id {
                    Some(id) => println!("employee {}: {}", id, failure.message),
                    None => println!("{}", failure.message),
                }
            }
            println!(
                "{} generated, {} failed",
                outcome.generated.len(),
                outcome.failures.len()
            );
        }
        SalaryCommands::Process { id } => print_salary(&service.process_salary(id).await?),
        SalaryCommands::Pay {
            id,
            method,
            reference,
        } => {
            let record = service
                .mark_salary_as_paid(
                    id,
                    PaymentDetails {
                        payment_method: method,
                        payment_reference: reference,
                    },
                )
                .await?;
            print_salary(&record);
        }
        SalaryCommands::Delete { id } => {
            service.delete_salary(id).await?;
            println!("salary {} deleted", id);
        }
        SalaryCommands::Payslip { id } => {
            let payslip = service.fetch_payslip(id).await?;
            println!(
                "Payslip #{} for employee {} ({}/{}) - {}",
                payslip.salary_id,
                payslip.employee_id,
                payslip.period.month,
                payslip.period.year,
                payslip.status
            );
            for line in &payslip.earnings {
                println!("  + {:<30} {:>12}", line.label, line.amount);
            }
            for line in &payslip.deductions {
                println!("  - {:<30} {:>12}", line.label, line.amount);
            }
            let totals = payslip.totals();
            println!(
                "  gross {} | deductions {} | net {}",
                totals.gross, totals.deductions, totals.net
            );
        }
        SalaryCommands::Export {
            month,
            year,
            output,
        } => {
            let mut records = Vec::new();
            let mut page_number = 1;
            loop {
                let page = service
                    .fetch_salaries(SalaryQuery {
                        page: Some(page_number),
                        page_size: Some(100),
                        ..SalaryQuery::for_period(month, year)
                    })
                    .await?;
                let fetched = page.items.len();
                records.extend(page.items);
                if fetched == 0 || page_number >= page.pagination.total_pages {
                    break;
                }
                page_number += 1;
            }
            export_salaries_to_path(&output, &records)
                .with_context(|| format!("Failed to export salaries to {}", output.display()))?;
            println!("{} records written to {}", records.len(), output.display());
        }
    }
    Ok(())
}

async fn run_overtime_command(service: &PayrollService, command: OvertimeCommands) -> Result<()> {
    match command {
        OvertimeCommands::List {
            employee,
            status,
            from,
            to,
            page,
            csv,
        } => {
            let page = service
                .fetch_overtime_records(OvertimeQuery {
                    page,
                    page_size: None,
                    employee_id: employee,
                    status,
                    from_date: from,
                    to_date: to,
                })
                .await?;
            if csv {
                write_overtime_csv(std::io::stdout().lock(), &page.items)
                    .context("Failed to write overtime CSV")?;
            } else {
                page.items.iter().for_each(print_overtime);
                println!(
                    "page {}/{} ({} records)",
                    page.pagination.page, page.pagination.total_pages, page.pagination.total_items
                );
            }
        }
        OvertimeCommands::Pending { page } => {
            let page = service.fetch_pending_approvals(page, None).await?;
            page.items.iter().for_each(print_overtime);
            println!("{} awaiting approval", page.pagination.total_items);
        }
        OvertimeCommands::Show { id } => print_overtime(&service.fetch_overtime_record(id).await?),
        OvertimeCommands::Create { request } => {
            print_overtime(&service.create_overtime_record(request.into()).await?)
        }
        OvertimeCommands::Update { id, request } => {
            print_overtime(&service.update_overtime_record(id, request.into()).await?)
        }
        OvertimeCommands::Approve { id, comments } => {
            let record = service
                .approve_overtime_record(id, ApprovalRequest { comments })
                .await?;
            print_overtime(&record);
        }
        OvertimeCommands::Reject { id, reason } => {
            let record = service
                .reject_overtime_record(
                    id,
                    RejectionRequest {
                        rejection_reason: reason,
                    },
                )
                .await?;
            print_overtime(&record);
        }
        OvertimeCommands::Delete { id } => {
            service.delete_overtime_record(id).await?;
            println!("overtime record {} deleted", id);
        }
        OvertimeCommands::Summary { employee, from, to } => {
            let summary = service
                .fetch_employee_overtime_summary(employee, from, to)
                .await?;
            println!(
                "employee {}: {} records, {}h, {} total | pending {} approved {} rejected {}",
                summary.employee_id,
                summary.total_records,
                summary.total_hours,
                summary.total_amount,
                summary.pending_count,
                summary.approved_count,
                summary.rejected_count
            );
            summary.recent_records.iter().for_each(print_overtime);
        }
        OvertimeCommands::Preview {
            request,
            hourly_rate,
        } => {
            let request: OvertimeRequest = request.into();
            let preview = preview_overtime(&request, hourly_rate)?;
            println!(
                "{}h at {} x{} = {} (estimate; the server recalculates on submit)",
                preview.duration_hours, hourly_rate, request.overtime_rate, preview.calculated_amount
            );
        }
    }
    Ok(())
}

async fn watch_overview(
    service: Arc<PayrollService>,
    config: &PayrollConfig,
    period: Option<PayPeriod>,
    mut session_events: tokio::sync::broadcast::Receiver<SessionEvent>,
) -> Result<()> {
    let mut updates = service.store().subscribe();
    let refresh = spawn_overview_refresh(
        service.clone(),
        period,
        config.refresh_interval(),
        config.overview_max_age_minutes,
    );

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let overview = updates.borrow_and_update().salary.overview.clone();
                if let Some(overview) = overview {
                    print_overview(&overview);
                }
            }
            event = session_events.recv() => {
                match event {
                    Ok(SessionEvent::Expired) => {
                        warn!("Session expired; stopping overview watch");
                        break;
                    }
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted; stopping overview watch");
                break;
            }
        }
    }

    refresh.abort();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PayrollConfig::from_env().context("Failed to load payroll configuration")?;
    let client = config.connect().context("Failed to set up the payroll client")?;
    info!("Payroll client ready (bulk strategy: {:?})", config.bulk_strategy);

    let mut expiry = client.gateway.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = expiry.recv().await {
            if event == SessionEvent::Expired {
                error!("Session expired. Sign in again to refresh the stored token.");
            }
        }
    });

    let service = client.service.clone();
    let outcome = match cli.command {
        Commands::Salaries(command) => run_salary_command(&service, command).await,
        Commands::Overtime(command) => run_overtime_command(&service, command).await,
        Commands::Overview { month, year } => {
            let overview = service.fetch_payroll_overview(period(month, year)).await?;
            print_overview(&overview);
            Ok(())
        }
        Commands::Watch { month, year } => {
            watch_overview(
                service.clone(),
                &config,
                period(month, year),
                client.gateway.subscribe(),
            )
            .await
        }
    };

    outcome
}
