use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use visit_report::config::{self, ReportConfig};
use visit_report::{OutputFormat, ReportContext, ReportService, VisitRef};

#[derive(Parser, Debug)]
#[command(name = "visit-report", version = config::APP_VERSION)]
#[command(about = "Render one visit from a patient bundle as PDF, DOCX or RTF")]
struct Args {
    /// Bundle folder, or a direct path to its database file
    bundle: PathBuf,

    /// Visit to report on, as <well|sick>:<id>
    #[arg(long)]
    visit: VisitRef,

    /// pdf, docx or rtf
    #[arg(long, default_value = "pdf", value_parser = parse_format)]
    format: OutputFormat,

    /// Destination file (defaults to the exports directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Patient id, when the visit row does not carry one
    #[arg(long)]
    patient_id: Option<i64>,

    /// Signed-in clinician id
    #[arg(long)]
    user_id: Option<i64>,
}

fn parse_format(raw: &str) -> Result<OutputFormat, String> {
    OutputFormat::from_extension(raw).ok_or_else(|| format!("unsupported format '{raw}'"))
}

fn default_output(visit: VisitRef, format: OutputFormat) -> PathBuf {
    let dir = config::exports_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.join(format!("{}_visit_{}.{}", visit.kind.as_str(), visit.id, format.extension()))
}

fn main() -> ExitCode {
    visit_report::init_tracing();
    let args = Args::parse();

    let config = match ReportConfig::load_or_default(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let service = match ReportService::new(config) {
        Ok(service) => service,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut ctx = ReportContext::new(&args.bundle);
    if let Some(user_id) = args.user_id {
        ctx = ctx.with_user(user_id);
    }
    if let Some(patient_id) = args.patient_id {
        ctx = ctx.with_patient(patient_id);
    }

    let output = args
        .output
        .unwrap_or_else(|| default_output(args.visit, args.format));
    match service.generate_report(&ctx, args.visit, args.format, &output) {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Report generation failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
