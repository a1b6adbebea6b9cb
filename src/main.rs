use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use ratatui::DefaultTerminal;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use rv::controller::Controller;
use rv::domain::{DEFAULT_ENDPOINT, DEFAULT_PAGE_SIZE, Message, RVConfig, RVError};
use rv::fetch::{Completion, execute};
use rv::model::{Model, Status};
use rv::source::{HttpRecordSource, RecordSource};
use rv::ui::TableUI;

#[derive(Parser, Debug)]
#[command(version, about = "A tui based viewer for paginated remote record lists.")]
struct Args {
    /// Endpoint returning a JSON array of records
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Page to open, a number or a query string like `page=2`
    #[arg(short, long)]
    page: Option<String>,

    /// Records shown per page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Request timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[arg(long, default_value = "~/.rv.log")]
    log_file: String,

    /// Terminal event poll interval in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn init_logging(path: &str) -> Result<(), RVError> {
    let path = shellexpand::full(path).map_err(|e| RVError::Logging(e.to_string()))?;
    let file = OpenOptions::new().create(true).append(true).open(&*path)?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| RVError::Logging(e.to_string()))
}

fn run(args: Args) -> Result<(), RVError> {
    init_logging(&args.log_file)?;

    let cfg = RVConfig::default()
        .with_endpoint(args.endpoint)
        .with_page_size(args.page_size)
        .with_timeout(args.timeout_ms.map(Duration::from_millis))
        .with_event_poll_time(args.poll_ms);
    cfg.validate()?;
    info!("Starting rv with {cfg:?}");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let source: Arc<dyn RecordSource> = Arc::new(HttpRecordSource::new(&cfg)?);

    let mut model = Model::init(&cfg, args.page.as_deref());
    let controller = Controller::new(&cfg);

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &runtime, source, &mut model, &controller);
    ratatui::restore();
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    runtime: &Runtime,
    source: Arc<dyn RecordSource>,
    model: &mut Model,
    controller: &Controller,
) -> Result<(), RVError> {
    let mut ui = TableUI::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<Completion>();

    while model.status != Status::QUITTING {
        if let Some(request) = model.take_fetch_request() {
            let source = Arc::clone(&source);
            let tx = tx.clone();
            runtime.spawn(async move {
                let completion = execute(source.as_ref(), request).await;
                // The receiver is gone once the ui quits.
                let _ = tx.send(completion);
            });
        }

        while let Ok(completion) = rx.try_recv() {
            model.update(Some(Message::Fetched(completion)));
        }

        terminal.draw(|f| ui.draw(model, f))?;

        let message = controller.handle_event(model)?;
        model.update(message);
    }

    info!("Quitting rv");
    Ok(())
}
