use anyhow::{Context, Result};
use clap::Parser;

use grove::commands::{
    handle_checkout, handle_clean, handle_fetch, handle_init, handle_list, handle_pin,
    handle_stash_apply, handle_stash_drop, handle_stash_list, handle_stash_show, handle_sync,
    CheckoutArgs,
};
use grove::error::{exit_code, is_silent};

mod cli;

use cli::{Cli, Commands, StashCommands};

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "off" }),
    )
    .format_timestamp(None)
    .format_target(false)
    .init();

    if let Err(err) = run(cli) {
        // Uncaptured git failures already reached stderr; anything else
        // prints its own (styled) message.
        if !is_silent(&err) {
            let text = format!("{err:#}");
            if !text.is_empty() {
                eprintln!("{text}");
            }
        }
        std::process::exit(exit_code(&err));
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Some(dir) = &cli.directory {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }

    match cli.command {
        Commands::Init { url } => handle_init(url),
        Commands::Checkout {
            create,
            branch,
            start_point,
            no_restore,
        } => handle_checkout(&CheckoutArgs {
            branch,
            create,
            start_point,
            restore: !no_restore,
        }),
        Commands::List => handle_list(),
        Commands::Fetch => handle_fetch(),
        Commands::Stash { command } => match command {
            StashCommands::List => handle_stash_list(),
            StashCommands::Apply { branch } => handle_stash_apply(&branch),
            StashCommands::Show { branch } => handle_stash_show(&branch),
            StashCommands::Drop { branch } => handle_stash_drop(&branch),
        },
        Commands::Clean => handle_clean(),
        Commands::Pin { slot } => handle_pin(&slot, true),
        Commands::Unpin { slot } => handle_pin(&slot, false),
        Commands::Sync => handle_sync(),
        Commands::ShellInit { shell } => {
            print!("{}", shell.init_script());
            Ok(())
        }
    }
}
