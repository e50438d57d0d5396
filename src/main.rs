use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use styx::build::Build;
use styx::macros::MacroTable;
use styx::metadata::Metadata;
use styx::{config, init, output, serve, watch};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "styx")]
#[command(about = "Static site generator: markdown with metadata in, minified HTML out")]
#[command(long_about = "\
Static site generator: markdown with metadata in, minified HTML out

The source tree is the site. Markdown documents are rendered through the
layout.tmpl of their directory, .html files are templates that can list the
documents of any directory, css/js/svg are minified, and everything else is
copied as is.

Site structure:

  my-site/
  ├── config.toml            # Site config (optional)
  └── src/
      ├── layout.tmpl        # Layout for documents in src/
      ├── index.html         # Template: {% for page in dir %}...{% endfor %}
      ├── hello.md           # Document → build/hello/index.html
      ├── blog/
      │   ├── layout.tmpl    # Each directory of documents has its own layout
      │   └── first-post.md
      ├── css/style.css      # Minified
      └── robots.txt         # Copied

Documents start with a metadata block:

  +++
  title = \"Hello\"
  time = \"2024-06-01 12:00:00 +00:00\"
  draft = false
  +++

Run 'styx gen-config' to print a documented config.toml.")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Site directory (contains config.toml and the source tree)
    #[arg(long, default_value = ".", global = true)]
    workdir: PathBuf,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new site skeleton
    Init {
        /// Directory to create, relative to --workdir
        path: PathBuf,
    },
    /// Print a metadata block for a new document
    New {
        /// Document title
        #[arg(long, default_value = "")]
        title: String,
        /// Mark the document as a draft
        #[arg(long)]
        draft: bool,
    },
    /// Build the site into the output directory
    Build,
    /// Build, then serve the output directory over HTTP
    Serve {
        /// Address to listen on [default: serve.address from config]
        #[arg(long)]
        http: Option<String>,
        /// Rebuild on change [default: serve.watch from config]
        #[arg(long)]
        watch: bool,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Init { path } => {
            let root = cli.workdir.join(path);
            let files = init::init_site(&root)?;
            output::print_init_output(&root, &files);
        }
        Command::New { title, draft } => {
            let site_config = config::load_config(&cli.workdir)?;
            let metadata = Metadata {
                title,
                draft,
                time: Utc::now().fixed_offset(),
            };
            print!("{}", metadata.to_block(site_config.metadata.style));
        }
        Command::Build => {
            let site_config = config::load_config(&cli.workdir)?;
            let report = Build::new(&cli.workdir, site_config).run()?;
            output::print_build_report(&report);
        }
        Command::Serve { http, watch } => {
            let site_config = config::load_config(&cli.workdir)?;
            let address = http.unwrap_or_else(|| site_config.serve.address.clone());
            let watch = watch || site_config.serve.watch;
            let macros = MacroTable::builtin();

            // Serve whatever exists even if the first build fails while watching.
            if !watch::rebuild(&cli.workdir, &macros) && !watch {
                return Err("initial build failed".into());
            }
            serve::serve(&cli.workdir, &site_config, &address, watch, macros)?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "styx=debug" } else { "styx=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
