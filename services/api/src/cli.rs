use crate::demo::{run_budget_report, run_demo, BudgetReportArgs, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use iskolar::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "IskoLAR",
    about = "Run the IskoLAR scholarship back office or reconcile release schedules from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Reconcile a release schedule CSV export against a semester budget
    Budget(BudgetReportArgs),
    /// Run an end-to-end CLI demo covering review, overrides, and releases
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Budget(args) => run_budget_report(args),
        Command::Demo(args) => run_demo(args),
    }
}
