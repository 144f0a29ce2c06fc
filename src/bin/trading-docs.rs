//! trading-docs - contract and invoice generation from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Contract for an order
//! trading-docs contract --order order.json --out-dir out/
//!
//! # Invoice paid by bank transfer, with a fixed number
//! trading-docs invoice --order order.json --method bank --number 123456
//!
//! # Testimonials
//! trading-docs testimonial add --store data/ --name "Ana R." --message "Excelente"
//! trading-docs testimonial list --store data/
//!
//! # Check a generated PDF
//! trading-docs inspect out/Contrato_LeidyBot1_Ana_Ruiz.pdf
//! ```
//!
//! The order file is `{ "buyer": <checkout form>, "product": <product> }`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trading_docs::{
    Artifact, CheckoutForm, ComposerConfig, DocumentComposer, DocumentError, JsonFilePersistence,
    PaymentMethod, PaymentRecord, ProductRecord, THANKS_MESSAGE, TestimonialStore,
    ValidationError, inspect_pdf_path, require_deliverable,
};

#[derive(Parser)]
#[command(name = "trading-docs")]
#[command(author, version, about = "Contract and invoice PDFs for trading-bot sales")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the license contract for an order
    Contract {
        #[command(flatten)]
        order: OrderArgs,
    },
    /// Generate the sales invoice for an order
    Invoice {
        #[command(flatten)]
        order: OrderArgs,

        /// Payment method
        #[arg(short, long, value_enum, default_value_t = MethodArg::Paypal)]
        method: MethodArg,

        /// Invoice number; random when omitted
        #[arg(long, value_parser = clap::value_parser!(u32).range(100_000..=999_999))]
        number: Option<u32>,
    },
    /// Manage the testimonial list
    Testimonial {
        #[command(subcommand)]
        action: TestimonialAction,
    },
    /// Print a summary of a PDF file
    Inspect {
        /// PDF to inspect
        path: PathBuf,
    },
}

#[derive(clap::Args)]
struct OrderArgs {
    /// Order JSON file
    #[arg(short, long)]
    order: PathBuf,

    /// Directory the PDF is written to
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Composer configuration JSON
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Document date (YYYY-MM-DD); today when omitted
    #[arg(long)]
    date: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum TestimonialAction {
    /// Add a testimonial at the front of the list
    Add {
        /// Directory holding ti_testimonials.json
        #[arg(short, long)]
        store: PathBuf,

        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        message: String,

        /// Rating from 1 to 5
        #[arg(short, long)]
        rating: Option<u8>,
    },
    /// List stored testimonials, newest first
    List {
        /// Directory holding ti_testimonials.json
        #[arg(short, long)]
        store: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    Paypal,
    Bank,
}

impl From<MethodArg> for PaymentMethod {
    fn from(value: MethodArg) -> Self {
        match value {
            MethodArg::Paypal => PaymentMethod::PayPal,
            MethodArg::Bank => PaymentMethod::BankTransfer,
        }
    }
}

#[derive(Deserialize)]
struct Order {
    buyer: CheckoutForm,
    #[serde(default = "default_product")]
    product: ProductRecord,
}

fn default_product() -> ProductRecord {
    ProductRecord::from_offer(None, None)
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,trading_docs=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli);

    if let Err(e) = result {
        if let Some(doc_err) = e.downcast_ref::<DocumentError>() {
            eprintln!("{}", doc_err.user_message());
        } else if let Some(invalid) = e.downcast_ref::<ValidationError>() {
            eprintln!("{}", invalid.user_message());
        }
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Contract { order } => {
            let (composer, order_file, date) = load_order(&order)?;
            let policy = composer.settings().field_policy;
            let buyer = order_file.buyer.validate(&policy, date)?;
            let artifact = composer.compose_contract(&buyer, &order_file.product)?;
            write_artifact(&artifact, &order.out_dir)?;
        }
        Commands::Invoice {
            order,
            method,
            number,
        } => {
            let (composer, order_file, date) = load_order(&order)?;
            let policy = composer.settings().field_policy;
            let buyer = order_file.buyer.validate(&policy, date)?;
            let payment = PaymentRecord::new(method.into(), date);
            let artifact = match number {
                Some(number) => composer.compose_invoice_numbered(
                    &buyer,
                    &order_file.product,
                    &payment,
                    number,
                )?,
                None => composer.compose_invoice(&buyer, &order_file.product, &payment)?,
            };
            write_artifact(&artifact, &order.out_dir)?;
        }
        Commands::Testimonial { action } => match action {
            TestimonialAction::Add {
                store,
                name,
                message,
                rating,
            } => {
                let mut store = TestimonialStore::open(JsonFilePersistence::in_dir(store))?;
                store.insert(&name, &message, rating)?;
                println!("{THANKS_MESSAGE}");
            }
            TestimonialAction::List { store } => {
                let store = TestimonialStore::open(JsonFilePersistence::in_dir(store))?;
                for slide in store.slides() {
                    let marker = if slide.active { '*' } else { ' ' };
                    println!("{marker} [{}] {} {}", slide.initial, slide.name, slide.text);
                }
            }
        },
        Commands::Inspect { path } => {
            let report = inspect_pdf_path(&path)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            require_deliverable(&report)?;
        }
    }
    Ok(())
}

fn load_order(
    args: &OrderArgs,
) -> Result<(DocumentComposer, Order, NaiveDate), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => ComposerConfig::from_json_path(path)?,
        None => ComposerConfig::default(),
    };
    let composer = config.into_builder().build()?;
    let text = std::fs::read_to_string(&args.order)?;
    let order: Order = serde_json::from_str(&text)?;
    let date = args
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    Ok((composer, order, date))
}

fn write_artifact(artifact: &Artifact, out_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(out_dir)?;
    let path = artifact.write_to_dir(out_dir)?;
    tracing::info!(
        path = %path.display(),
        pages = artifact.page_count,
        bytes = artifact.bytes.len(),
        "wrote {}",
        artifact.kind.label()
    );
    Ok(())
}
