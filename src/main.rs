use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use secretsync::cli::commands;
use secretsync::cli::{hint_for, output, Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_env("SECRETSYNC_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("secretsync=debug")
        } else {
            EnvFilter::new("secretsync=warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .init();

    let result = match cli.command {
        Commands::Create {
            ref key,
            ref value,
            empty,
            visible,
            ref source,
            required,
        } => commands::create::execute(
            &cli,
            key,
            value.as_deref(),
            empty,
            visible,
            source,
            required,
        ),
        Commands::Update {
            ref key,
            ref value,
            prompt,
            ref visibility,
            ref source,
            required,
        } => commands::update::execute(
            &cli,
            key,
            value.as_deref(),
            prompt,
            visibility.as_deref(),
            source.as_deref(),
            required,
        ),
        Commands::Remove { ref key, force } => commands::remove::execute(&cli, key, force),
        Commands::Reveal { ref key } => commands::reveal::execute(&cli, key),
        Commands::List {
            page,
            page_size,
            ref search,
        } => commands::list::execute(&cli, page, page_size, search.as_deref()),
        Commands::Required { ref app, missing } => {
            commands::required::execute(&cli, app.as_deref(), missing)
        }
        Commands::Scan => commands::scan::execute(&cli),
        Commands::Usages { ref key } => commands::scan::execute_usages(&cli, key),
        Commands::Sync => commands::sync::execute(&cli),
        Commands::Rollback { force } => commands::sync::execute_rollback(&cli, force),
        Commands::Status => commands::status::execute(&cli),
        Commands::Bootstrap => commands::bootstrap::execute(&cli),
        Commands::Keygen => commands::keygen::execute(&cli),
        Commands::Audit { last, ref since } => {
            commands::audit_cmd::execute(&cli, last, since.as_deref())
        }
    };

    if let Err(e) = result {
        output::error(&e.to_string());
        if let Some(hint) = hint_for(&e) {
            output::tip(hint);
        }
        // Config and storage failures exit with 2.
        std::process::exit(if e.is_fatal() { 2 } else { 1 });
    }
}
