use std::io;
use std::process;
use std::sync::Arc;

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::generate;
use tracing::error;

use vsforge::builder::Capabilities;
use vsforge::cli::{self, Cli, Commands};
use vsforge::driver::{DryRunCommunicator, DryRunDriver, DryRunExporter};
use vsforge::ui::TracingUi;

fn main() -> Result<()> {
    let args = cli::parse_args()?;

    if let Some(level) = args.command.log_level() {
        vsforge::init_logging(level)?;
    }

    match &args.command {
        Commands::Build(opts) => {
            if !opts.dry_run {
                error!(
                    "no hypervisor transport is linked into this binary; \
                    use --dry-run or embed vsforge as a library"
                );
                process::exit(2);
            }
            let caps = Capabilities::new(Arc::new(DryRunDriver::new()), Arc::new(TracingUi))
                .with_communicator(Arc::new(DryRunCommunicator))
                .with_exporter(Arc::new(DryRunExporter));
            if let Err(e) = vsforge::run_build(opts, caps) {
                error!("{:#}", e);
                process::exit(1);
            }
        }
        Commands::Validate(opts) => {
            if let Err(e) = vsforge::run_validate(opts) {
                error!("{:#}", e);
                process::exit(1);
            }
        }
        Commands::Completions(opts) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(opts.shell, &mut cmd, name, &mut io::stdout());
        }
    }

    Ok(())
}
