use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roombook::booking::{BookingController, BookingOutcome};
use roombook::config::Config;
use roombook::models::ReservationSlot;
use roombook::ocr::OcrProvider;
use roombook::portal::PortalClient;
use roombook::session::Session;
use roombook::token_store::TokenStore;

#[derive(Parser)]
#[command(name = "roombook")]
#[command(about = "Book a room on the campus meeting-reservation portal")]
struct Args {
    /// Room to book (falls back to ROOM_ID)
    #[arg(long)]
    room: Option<String>,

    /// Booking date, YYYY-MM-DD (falls back to APPLY_DATE)
    #[arg(long)]
    date: Option<String>,

    /// Start time, HH:MM (falls back to BEGIN_TIME)
    #[arg(long)]
    begin: Option<String>,

    /// End time, HH:MM (falls back to END_TIME)
    #[arg(long)]
    end: Option<String>,

    /// Captcha attempts before giving up (falls back to BOOKING_MAX_ATTEMPTS)
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Env file holding USERNAME, PASSWORD and the cached TOKEN
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,

    /// Do not list existing reservations before booking
    #[arg(long)]
    skip_query: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    dotenvy::from_path(&args.env_file).ok();
    init_tracing();

    match run(args).await {
        Ok(outcome) if outcome.is_done() => {
            println!(
                "预约成功 (captchas: {}, submissions: {})",
                outcome.captchas_fetched, outcome.submissions
            );
            ExitCode::SUCCESS
        }
        Ok(outcome) => {
            let reason = outcome
                .abort_reason()
                .map(ToString::to_string)
                .unwrap_or_default();
            println!("预约失败: {reason}");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "roombook=info".into())
    };

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter())
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter())
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn resolve_slot(args: &Args, config: &Config) -> anyhow::Result<ReservationSlot> {
    let pick = |arg: &Option<String>, env: &Option<String>, name: &str| {
        arg.clone()
            .or_else(|| env.clone())
            .with_context(|| format!("missing {name}"))
    };

    let booking = &config.booking;
    let slot = ReservationSlot::new(
        pick(&args.room, &booking.room_id, "--room / ROOM_ID")?,
        pick(&args.date, &booking.apply_date, "--date / APPLY_DATE")?,
        pick(&args.begin, &booking.begin_time, "--begin / BEGIN_TIME")?,
        pick(&args.end, &booking.end_time, "--end / END_TIME")?,
    )?;
    Ok(slot)
}

async fn run(args: Args) -> anyhow::Result<BookingOutcome> {
    let mut config = Config::from_env();
    if let Some(max_attempts) = args.max_attempts {
        config.booking.max_attempts = max_attempts;
    }
    config.validate()?;

    let slot = resolve_slot(&args, &config)?;
    tracing::info!(
        room_id = %slot.room_id,
        date = %slot.apply_date,
        begin = %slot.begin_time,
        end = %slot.end_time,
        max_attempts = config.booking.max_attempts,
        "Booking requested"
    );

    let store = TokenStore::new(&args.env_file);
    let client = PortalClient::new(&config.portal)?;
    let session = Session::establish(client, &config.credentials, &store)
        .await
        .context("Failed to establish a portal session")?;

    if !args.skip_query {
        match session.query_reservations(&slot.apply_date).await {
            Ok(body) => println!("{body}"),
            Err(e) => tracing::warn!(error = %e, "Failed to query reservations"),
        }
    }

    let ocr = OcrProvider::new(&config.ocr)?;
    if !ocr.is_available() {
        tracing::warn!("OCR backend unavailable; captcha recognition will fail");
    }

    let controller = BookingController::new(&session, &ocr, &config.applicant, &config.booking);
    Ok(controller.run(&slot).await)
}
