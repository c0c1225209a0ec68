use clap::{Parser, Subcommand};
use stasis::config;
use stasis::output;
use stasis::site::{BuildOptions, Site};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "stasis")]
#[command(about = "Freeze a routable site into a static output directory")]
#[command(long_about = "\
Freeze a routable site into a static output directory

Every path the site can serve is rendered once and written to the output
directory. Files the build did not produce are deleted afterwards, along
with any directory left empty.

Site structure:

  mysite/
  ├── config.toml        # Routes, static assets, viewlets (required)
  ├── site.toml          # Output path, excludes, jobs (optional)
  ├── content/           # Resource root: frozen file by file
  ├── static/            # Static assets: served under /<name>/
  ├── templates/
  └── output/            # Build output (reconciled on every build)

Run 'stasis gen-config' to print documented config.toml and site.toml files.")]
#[command(version)]
struct Cli {
    /// Site root directory
    #[arg(long, default_value = ".", global = true)]
    source: PathBuf,

    /// Log every write, skip and traversal step
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render every path and reconcile the output directory
    Build {
        /// Parallel render workers (overrides site.jobs)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        jobs: Option<u64>,
        /// Output directory (overrides site.outpath)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List every path a build would render
    Paths {
        /// Print a JSON array instead of one path per line
        #[arg(long)]
        json: bool,
    },
    /// Load configuration and enumerate paths without rendering
    Check,
    /// Print stock config.toml and site.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    match cli.command {
        Command::Build { jobs, output: out_dir } => {
            let site = Site::open(&cli.source)?;
            let options = BuildOptions {
                jobs: jobs.map(|n| n as usize),
                output: out_dir,
            };
            println!("==> Building {}", cli.source.display());
            let report = site.build(&options)?;
            output::print_build_output(&report);
            println!("==> Build complete: {}", report.output_dir.display());
        }
        Command::Paths { json } => {
            let site = Site::open(&cli.source)?;
            let paths = site.paths(&BuildOptions::default())?;
            if json {
                println!("{}", output::format_paths_json(&paths)?);
            } else {
                output::print_paths_output(&paths);
            }
        }
        Command::Check => {
            println!("==> Checking {}", cli.source.display());
            let site = Site::open(&cli.source)?;
            let ctx = site.context(&BuildOptions::default())?;
            let paths = site.paths(&BuildOptions::default())?;
            output::print_check_output(&ctx, &paths);
            println!("==> Site is valid");
        }
        Command::GenConfig => {
            println!("# ---- {} ----", config::ENTRY_FILE);
            print!("{}", config::stock_entry_toml());
            println!();
            println!("# ---- {} ----", config::SITE_CONFIG_FILE);
            print!("{}", config::stock_site_toml());
        }
    }

    Ok(())
}

/// Install the stderr log subscriber. `-v` selects debug, `-q` errors only.
fn init_logging(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
