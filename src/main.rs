use std::io::{self, Write};

use clap::Parser;
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::error;
use tracing_subscriber::EnvFilter;

use budget_navigator::chat::{ChatClient, ExchangeOutcome};
use budget_navigator::cli::{parse_command, Args, Command, HELP_TEXT};
use budget_navigator::config::NavigatorConfig;
use budget_navigator::controller::SendOutcome;
use budget_navigator::error::NavError;
use budget_navigator::render::{
    render_gauge, render_header, render_transcript, TerminalRenderer, LIMIT_WARNING,
};

type Input = Lines<BufReader<Stdin>>;

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "budget_navigator=debug,navigator=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn prompt(label: &str) -> io::Result<()> {
    print!("{} ", label.bright_green().bold());
    io::stdout().flush()
}

/// Ask for a name until registration succeeds. `Ok(false)` on end of input.
async fn register_until_accepted(
    client: &mut ChatClient,
    input: &mut Input,
    mut preset: Option<String>,
) -> Result<bool, NavError> {
    loop {
        let name = match preset.take() {
            Some(name) => name,
            None => {
                prompt("Your name:")?;
                match input.next_line().await? {
                    Some(line) => line,
                    None => return Ok(false),
                }
            }
        };

        match client.register(&name).await {
            Ok(()) => return Ok(true),
            Err(NavError::Validation(e)) => eprintln!("{}", e.to_string().bright_red()),
            Err(NavError::Auth(e)) => eprintln!("{}", e.to_string().bright_red()),
            Err(e) => {
                error!(error = %e, "registration request failed");
                eprintln!("{}", "Registration failed. Please try again.".bright_red());
            }
        }
    }
}

fn print_quota(client: &ChatClient) {
    let view = client.view();
    println!(
        "{}: {}",
        "Queries".bright_yellow(),
        render_gauge(view.session.questions_remaining(), view.max_questions, 10)
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = NavigatorConfig::load(args.config.as_deref())?
        .with_overrides(args.api_url.as_deref(), args.stream_timeout);
    let app_name = config.app_name.clone();
    let mut client = ChatClient::new(config)?;
    let mut input: Input = BufReader::new(tokio::io::stdin()).lines();
    let mut renderer = TerminalRenderer::new();
    let mut preset_name = args.name;

    'session: loop {
        if !client.resume().await
            && !register_until_accepted(&mut client, &mut input, preset_name.take()).await?
        {
            break;
        }

        print!("{}", render_header(&app_name, &client.view()));
        print!("{}", renderer.frame(&client.view()));

        loop {
            prompt(">")?;
            let Some(line) = input.next_line().await? else {
                break 'session;
            };

            match parse_command(&line) {
                Command::Blank => {}
                Command::Quit => break 'session,
                Command::Logout => {
                    client.logout().await;
                    renderer.frame(&client.view());
                    println!("{}", "Signed out.".bright_blue());
                    continue 'session;
                }
                Command::History => println!("{}", render_transcript(&client.view())),
                Command::Help => println!("{HELP_TEXT}"),
                Command::Ask(_) if client.view().limit_reached() => {
                    println!("{}", LIMIT_WARNING.bright_red());
                }
                Command::Ask(text) => {
                    let outcome = client
                        .send(text, |view| {
                            print!("{}", renderer.frame(view));
                            let _ = io::stdout().flush();
                        })
                        .await;

                    match outcome {
                        ExchangeOutcome::NotStarted(SendOutcome::Invalid(rejection)) => {
                            eprintln!("{}", rejection.to_string().bright_red());
                        }
                        ExchangeOutcome::NotStarted(SendOutcome::QuotaExhausted) => {
                            println!("{}", LIMIT_WARNING.bright_red());
                        }
                        ExchangeOutcome::NotStarted(_) => {}
                        ExchangeOutcome::SessionExpired { logout_after } => {
                            client.expire(logout_after).await;
                            renderer.frame(&client.view());
                            continue 'session;
                        }
                        _ => print_quota(&client),
                    }
                }
            }
        }
    }

    Ok(())
}
