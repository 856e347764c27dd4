use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hms_core::{
    BookingFlow, BookingWindow, ChargeRequest, CoreConfig, HttpClient, InvoiceBoard,
    InvoiceReconciler, NonEmptyText, RemoteClient, Selection, SettingsStore, SlotGrid,
    SlotService,
    config::{
        api_base_url_from_env_value, booking_window_days_from_env_value,
        request_timeout_from_env_value, settings_file_from_env_value,
        validate_booking_window_days,
    },
    constants::PATIENTS_PATH,
    people::fetch_person,
};

#[derive(Parser)]
#[command(name = "hms")]
#[command(about = "Hospital management front desk CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Raise a charge, merging into the patient's open invoice when there is one
    Charge {
        /// Patient ID
        #[arg(long, conflicts_with = "appointment", required_unless_present = "appointment")]
        patient: Option<String>,
        /// Appointment ID (the patient is resolved from it)
        #[arg(long)]
        appointment: Option<String>,
        /// Amount to charge
        #[arg(long)]
        amount: f64,
        /// Charge type, e.g. treatment, prescription, lab
        #[arg(long = "type")]
        charge_type: String,
        /// Line description (optional)
        #[arg(long)]
        description: Option<String>,
    },
    /// List a patient's invoices
    Invoices {
        /// Patient ID
        patient_id: String,
    },
    /// Show a patient's display name and contact
    Patient {
        /// Patient ID
        patient_id: String,
    },
    /// Print the booking grid for a consultation type
    Slots {
        /// Consultation ID
        consultation: String,
        /// Number of days in the window (1-31)
        #[arg(long)]
        days: Option<u32>,
        /// First day of the window (YYYY-MM-DD), default today
        #[arg(long)]
        from: Option<String>,
    },
    /// List bookable times for one date
    Times {
        /// Consultation ID
        consultation: String,
        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
    },
    /// Book a slot for a patient
    Book {
        /// Consultation ID
        consultation: String,
        /// Patient ID
        #[arg(long)]
        patient: String,
        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// Time label exactly as listed, e.g. "09:00 AM"
        #[arg(long)]
        time: String,
        /// Reason for the visit (optional)
        #[arg(long)]
        reason: Option<String>,
    },
    /// Read or update local settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print every setting
    List,
    /// Print one setting
    Get { key: String },
    /// Update one setting
    Set { key: String, value: String },
}

/// Entry point for the HMS front desk CLI
///
/// # Environment Variables
/// - `HMS_API_URL`: backend base URL (default: "http://localhost:5000/api")
/// - `HMS_API_TOKEN`: bearer token for the backend (optional)
/// - `HMS_BOOKING_DAYS`: booking window length in days (default: 3)
/// - `HMS_REQUEST_TIMEOUT_SECS`: per-request timeout (default: 15)
/// - `HMS_SETTINGS_FILE`: settings file location (default: "hms-settings.yaml")
///
/// # Errors
/// Returns an error if:
/// - the configuration is invalid,
/// - the settings file cannot be read,
/// - a command's remote mutation fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hms=info".parse()?)
                .add_directive("hms_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let cfg = CoreConfig::new(
        api_base_url_from_env_value(std::env::var("HMS_API_URL").ok()),
        std::env::var("HMS_API_TOKEN").ok(),
        request_timeout_from_env_value(std::env::var("HMS_REQUEST_TIMEOUT_SECS").ok())?,
        booking_window_days_from_env_value(std::env::var("HMS_BOOKING_DAYS").ok())?,
        settings_file_from_env_value(std::env::var("HMS_SETTINGS_FILE").ok()),
    )?;

    let mut settings = SettingsStore::load(cfg.settings_file())?;
    tracing::debug!(
        "settings loaded from {} (theme: {})",
        settings.path().display(),
        settings.theme().as_str()
    );

    let client: Arc<dyn RemoteClient> = Arc::new(HttpClient::new(&cfg)?);

    match cli.command {
        Some(Commands::Charge {
            patient,
            appointment,
            amount,
            charge_type,
            description,
        }) => {
            let mut request = match (patient, appointment) {
                (Some(patient), _) => {
                    ChargeRequest::for_patient(parse_id(&patient, "patient")?, amount, &charge_type)
                }
                (None, Some(appointment)) => ChargeRequest::for_appointment(
                    parse_id(&appointment, "appointment")?,
                    amount,
                    &charge_type,
                ),
                (None, None) => anyhow::bail!("either --patient or --appointment is required"),
            };
            if let Some(description) = description {
                request = request.with_description(description);
            }
            request.validate()?;

            let reconciler = InvoiceReconciler::new(client);
            let outcome = reconciler.create_or_merge(&request).await?;
            match &outcome.merged_into {
                Some(invoice_id) => println!("Merged charge into invoice {}", invoice_id),
                None => match outcome.invoice() {
                    Some(invoice) => println!("Created invoice {}", invoice.id),
                    None => println!("Created new invoice"),
                },
            }
        }
        Some(Commands::Invoices { patient_id }) => {
            let patient_id = parse_id(&patient_id, "patient")?;
            let reconciler = InvoiceReconciler::new(client);
            let mut board = InvoiceBoard::new();
            board.refresh(&reconciler, patient_id.as_str()).await?;

            if board.invoices().is_empty() {
                println!("No invoices found.");
            } else {
                for invoice in board.invoices() {
                    println!(
                        "ID: {}, Amount: {:.2}, Status: {}{}",
                        invoice.id,
                        invoice.amount,
                        invoice.status,
                        if invoice.is_open() { " (open)" } else { "" }
                    );
                }
                println!("Outstanding: {:.2}", board.total_outstanding());
            }
        }
        Some(Commands::Patient { patient_id }) => {
            let patient_id = parse_id(&patient_id, "patient")?;
            let record = fetch_person(client.as_ref(), PATIENTS_PATH, patient_id.as_str()).await?;
            println!("Name: {}", record.display_name());
            if let Some(phone) = record.contact_phone() {
                println!("Phone: {}", phone);
            }
        }
        Some(Commands::Slots {
            consultation,
            days,
            from,
        }) => {
            let consultation = parse_id(&consultation, "consultation")?;
            let days = match days {
                Some(days) => validate_booking_window_days(days)?,
                None => cfg.booking_window_days(),
            };
            let window = match from {
                Some(from) => BookingWindow::starting(parse_date(&from)?, days),
                None => BookingWindow::from_today(days),
            };

            let slots = SlotService::new(client)
                .fetch_slots(&consultation)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!("slot fetch failed: {}", e);
                    Vec::new()
                });
            print_grid(&SlotGrid::derive(&slots, &window, cfg.fallback_times()));
        }
        Some(Commands::Times { consultation, date }) => {
            let mut flow = BookingFlow::from_config(client, &cfg);
            flow.select_service(parse_id(&consultation, "consultation")?)
                .await;
            let times = flow.refine_date(parse_date(&date)?).await;
            if times.is_empty() {
                println!("No times available.");
            }
            for time in times {
                println!("{}", time);
            }
        }
        Some(Commands::Book {
            consultation,
            patient,
            date,
            time,
            reason,
        }) => {
            let patient = parse_id(&patient, "patient")?;
            let date = parse_date(&date)?;

            let mut flow = BookingFlow::from_config(client, &cfg);
            flow.select_service(parse_id(&consultation, "consultation")?)
                .await;
            if flow.select_cell(date, &time) == Selection::Unavailable {
                anyhow::bail!("slot not available: {} {}", date, time);
            }

            let confirmation = flow.confirm(&patient, reason.as_deref()).await?;
            match confirmation.appointment_id {
                Some(id) => println!(
                    "Booked {} {} (appointment {})",
                    confirmation.date, confirmation.time, id
                ),
                None => println!("Booked {} {}", confirmation.date, confirmation.time),
            }
        }
        Some(Commands::Settings { action }) => match action {
            SettingsAction::List => {
                for (key, value) in settings.entries() {
                    println!("{}: {}", key, value);
                }
            }
            SettingsAction::Get { key } => match settings.get(&key) {
                Some(value) => println!("{}", value),
                None => println!("{} is not set", key),
            },
            SettingsAction::Set { key, value } => {
                settings.set(&key, &value)?;
                println!("Updated {}", key.trim());
            }
        },
        None => {
            println!("Use 'hms --help' for commands");
        }
    }

    Ok(())
}

fn parse_id(value: &str, what: &str) -> anyhow::Result<NonEmptyText> {
    NonEmptyText::new(value).with_context(|| format!("{what} ID cannot be empty"))
}

fn parse_date(value: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date '{value}', expected YYYY-MM-DD"))
}

fn print_grid(grid: &SlotGrid) {
    print!("{:>10}", "");
    for day in grid.days() {
        print!(" {:^12}", day.format("%a %d %b").to_string());
    }
    println!();

    for row in grid.cells() {
        let Some(first) = row.first() else { continue };
        print!("{:>10}", first.time);
        for cell in &row {
            print!(" {:^12}", if cell.bookable { "open" } else { "-" });
        }
        println!();
    }

    if grid.uses_fallback() {
        println!("No slots available in this window.");
    }
}
