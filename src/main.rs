//src/main.rs
mod cli;

use anyhow::{bail, Context, Result};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use gym_log_lib::{
    format_date, show_more_label, ActivityForm, ActivityLog, AppService, BackendKind,
    DashboardView, DateRange, DeleteOutcome, HistoryEntry, IntentHandler, LogId, MuscleGroup,
    OAuthProvider, Session, SignIn, SignInProof, StatsView, NO_BREAKDOWN_MESSAGE,
    NO_LOGS_MESSAGE,
};
use std::io::{stdin, stdout, Write};
use strum::IntoEnumIterator;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    let cli_args = cli::parse_args();

    if let cli::Commands::GenerateCompletion { shell } = cli_args.command {
        let mut cmd = cli::build_cli_command();
        let bin_name = cmd.get_name().to_string();

        eprintln!("Generating completion script for {}...", shell);
        clap_complete::generate(shell, &mut cmd, bin_name, &mut stdout());
        return Ok(());
    }

    init_logging(cli_args.verbose);

    let mut service =
        AppService::initialize().context("Failed to initialize application service")?;
    service.on_session_change(Box::new(|session: Option<&Session>| match session {
        Some(s) => println!(
            "Signed in as {}.",
            s.email.as_deref().unwrap_or(s.user_id.as_str())
        ),
        None => println!("Signed out."),
    }));

    match cli_args.command {
        cli::Commands::GenerateCompletion { .. } => {
            unreachable!("Completion generation should have exited already");
        }
        // --- Activity Log Commands ---
        cli::Commands::Add {
            date,
            muscles,
            cardio,
            time,
            distance,
        } => {
            let mut form = ActivityForm::new(date);
            form.set_selected(muscles);
            form.is_cardio = cardio;
            form.cardio_time = time.unwrap_or_default();
            form.cardio_distance = distance.unwrap_or_default();

            match service.add_log(&form) {
                Ok(id) => println!(
                    "Successfully logged session on {} ID: {}",
                    format_date(date),
                    id
                ),
                Err(e) => bail!("Error logging session: {:#}", e),
            }
        }
        cli::Commands::Edit {
            id,
            date,
            muscles,
            clear_muscles,
            cardio,
            no_cardio,
            time,
            distance,
        } => {
            let id = LogId::new(id);
            service.refresh()?;
            let mut host = CliHost::new(false);
            service.request_edit(&id, &mut host)?;
            let existing = host
                .take_edit()
                .context("Edit request was not handed to the form")?;

            let mut form = ActivityForm::from_log(&existing);
            if let Some(d) = date {
                form.date = d;
            }
            if clear_muscles {
                form.set_selected(Vec::new());
            } else if let Some(groups) = muscles {
                form.set_selected(groups);
            }
            if cardio {
                form.is_cardio = true;
            } else if no_cardio {
                form.is_cardio = false;
            }
            if let Some(t) = time {
                form.cardio_time = t;
            }
            if let Some(d) = distance {
                form.cardio_distance = d;
            }

            match service.edit_log(&id, &form) {
                Ok(()) => println!("Successfully updated session ID {}.", id),
                Err(e) => bail!("Error editing session: {:#}", e),
            }
        }
        cli::Commands::Delete { id, yes } => {
            let id = LogId::new(id);
            service.refresh()?;
            let mut host = CliHost::new(yes);
            match service.delete_log(&id, &mut host) {
                Ok(DeleteOutcome::Deleted(id)) => println!("Successfully deleted session ID {}.", id),
                Ok(DeleteOutcome::Cancelled) => println!("Delete cancelled."),
                Err(e) => bail!("Error deleting session: {:#}", e),
            }
        }

        // --- Stats ---
        cli::Commands::Stats { from, to, pages } => {
            service.refresh()?;
            apply_range_overrides(&mut service, from, to);
            for _ in 1..pages {
                service.show_more();
            }
            let header_color = service.config.theme.header_color_or(Color::Green);
            print_dashboard(&service.render(), header_color);
        }
        cli::Commands::Browse { from, to } => {
            service.refresh()?;
            apply_range_overrides(&mut service, from, to);
            browse(&mut service)?;
        }
        cli::Commands::Muscles => {
            let header_color = service.config.theme.header_color_or(Color::Cyan);
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec![
                    Cell::new("ID").fg(header_color),
                    Cell::new("Label").fg(header_color),
                ]);
            for group in MuscleGroup::iter() {
                table.add_row(vec![Cell::new(group.id()), Cell::new(group.label())]);
            }
            println!("{table}");
        }

        // --- Auth Commands ---
        cli::Commands::Login { google, email } => {
            let step = if google {
                service.sign_in_with_oauth(OAuthProvider::Google)
            } else {
                let email = email.context("Missing --email")?;
                service.sign_in_with_email_link(&email)
            };
            match step {
                Ok(SignIn::Redirect(url)) => {
                    println!("Open this URL in your browser to sign in:\n\n  {url}\n");
                    println!("Then run 'complete-login <redirect-url>' with the address you land on.");
                }
                Ok(SignIn::EmailSent) => {
                    println!("Check your inbox for the sign-in link.");
                    println!("Open the link, or run 'verify --email <address> --code <code>' with the code from the message.");
                }
                Ok(SignIn::SignedIn(_)) => {} // the session callback already reported it
                Err(e) => bail!("Error signing in: {:#}", e),
            }
        }
        cli::Commands::Verify { email, code } => {
            if let Err(e) = service.complete_sign_in(SignInProof::EmailCode { email, code }) {
                bail!("Error verifying sign-in code: {:#}", e);
            }
        }
        cli::Commands::CompleteLogin { redirect_url } => {
            if let Err(e) = service.complete_sign_in(SignInProof::RedirectUrl(redirect_url)) {
                bail!("Error completing sign-in: {:#}", e);
            }
        }
        cli::Commands::Logout => {
            if let Err(e) = service.sign_out() {
                bail!("Error signing out: {:#}", e);
            }
        }
        cli::Commands::Whoami => match service.session() {
            Some(s) => println!(
                "Signed in as {} (user {}) since {}.",
                s.email.as_deref().unwrap_or("<no email>"),
                s.user_id,
                s.signed_in_at.format("%Y-%m-%d %H:%M UTC")
            ),
            None => println!("Not signed in."),
        },

        // --- Config/Path Commands ---
        cli::Commands::SetBackend { backend } => {
            let kind = match backend {
                cli::BackendCli::Local => BackendKind::Local,
                cli::BackendCli::Remote => BackendKind::Remote,
            };
            match service.set_backend(kind) {
                Ok(()) => {
                    println!("Successfully set backend to: {:?}", kind);
                    println!("Config file updated: {:?}", service.get_config_path());
                }
                Err(e) => bail!("Error setting backend: {}", e),
            }
        }
        cli::Commands::SetRemote {
            url,
            anon_key,
            redirect_to,
        } => match service.set_remote(&url, &anon_key, redirect_to) {
            Ok(()) => {
                println!("Successfully saved remote backend settings for {}.", url.trim());
                println!("Config file updated: {:?}", service.get_config_path());
            }
            Err(e) => bail!("Error saving remote settings: {}", e),
        },
        cli::Commands::DbPath => {
            println!("Database file is located at: {:?}", service.get_db_path());
        }
        cli::Commands::ConfigPath => {
            println!("Config file is located at: {:?}", service.get_config_path());
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gym_log_lib={default_level},gym_log={default_level}")));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn apply_range_overrides(
    service: &mut AppService,
    from: Option<chrono::NaiveDate>,
    to: Option<chrono::NaiveDate>,
) {
    if from.is_none() && to.is_none() {
        return;
    }
    let current = *service.dashboard.view_state().range();
    service.set_range(DateRange::new(
        from.unwrap_or(current.start),
        to.unwrap_or(current.end),
    ));
}

/// Bridges the history list's edit/delete affordances to the terminal.
struct CliHost {
    assume_yes: bool,
    edit_request: Option<ActivityLog>,
}

impl CliHost {
    const fn new(assume_yes: bool) -> Self {
        Self {
            assume_yes,
            edit_request: None,
        }
    }

    fn take_edit(&mut self) -> Option<ActivityLog> {
        self.edit_request.take()
    }
}

impl IntentHandler for CliHost {
    fn on_edit(&mut self, log: ActivityLog) {
        self.edit_request = Some(log);
    }

    fn confirm_delete(&mut self, log: &ActivityLog) -> bool {
        if self.assume_yes {
            return true;
        }
        let entry = HistoryEntry::from_log(log);
        let question = format!("Delete the session on {} ({})? [y/N]: ", entry.date, entry.muscles);
        matches!(prompt(&question), Ok(answer) if answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
    }
}

fn prompt(question: &str) -> std::io::Result<String> {
    print!("{question}");
    stdout().flush()?;
    let mut input = String::new();
    stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Interactive loop over the stats view. Errors are shown inline and the loop continues.
fn browse(service: &mut AppService) -> Result<()> {
    let header_color = service.config.theme.header_color_or(Color::Green);
    loop {
        let view = service.render();
        print_dashboard(&view, header_color);

        let mut options = Vec::new();
        if view.has_more() {
            options.push("[m]ore");
        }
        if !view.history.is_empty() {
            options.push("[e]dit <#>");
            options.push("[d]elete <#>");
        }
        options.push("[r]ange <from> <to>");
        options.push("[q]uit");
        let line = prompt(&format!("{}: ", options.join(", ")))?;

        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some("q" | "quit") | None, _, _) => break,
            (Some("m" | "more"), _, _) if view.has_more() => service.show_more(),
            (Some("e" | "edit"), Some(n), _) => {
                let Some(id) = row_id(&view, n) else {
                    println!("No row {n} in the list.");
                    continue;
                };
                let mut host = CliHost::new(false);
                if let Err(e) = service.request_edit(&id, &mut host) {
                    println!("Error: {e:#}");
                    continue;
                }
                let Some(existing) = host.take_edit() else { continue };
                match prompt_form(ActivityForm::from_log(&existing)) {
                    Ok(form) => match service.edit_log(&id, &form) {
                        Ok(()) => println!("Updated session ID {id}."),
                        Err(e) => println!("Error: {e:#}"),
                    },
                    Err(e) => println!("Error: {e:#}"),
                }
            }
            (Some("d" | "delete"), Some(n), _) => {
                let Some(id) = row_id(&view, n) else {
                    println!("No row {n} in the list.");
                    continue;
                };
                let mut host = CliHost::new(false);
                match service.delete_log(&id, &mut host) {
                    Ok(DeleteOutcome::Deleted(id)) => println!("Deleted session ID {id}."),
                    Ok(DeleteOutcome::Cancelled) => println!("Delete cancelled."),
                    Err(e) => println!("Error: {e:#}"),
                }
            }
            (Some("r" | "range"), Some(from), Some(to)) => {
                match (cli::parse_date_shorthand(from), cli::parse_date_shorthand(to)) {
                    (Ok(from), Ok(to)) => service.set_range(DateRange::new(from, to)),
                    (Err(e), _) | (_, Err(e)) => println!("Error: {e}"),
                }
            }
            _ => println!("Unrecognised input '{line}'."),
        }
    }
    Ok(())
}

/// 1-based row number in the visible history -> record id.
fn row_id(view: &DashboardView, n: &str) -> Option<LogId> {
    let index = n.parse::<usize>().ok()?.checked_sub(1)?;
    view.history.get(index).map(|entry| entry.id.clone())
}

/// Walks the user through the form, showing current values as defaults.
fn prompt_form(mut form: ActivityForm) -> Result<ActivityForm> {
    let answer = prompt(&format!("Date [{}]: ", form.date.format("%Y-%m-%d")))?;
    if !answer.is_empty() {
        form.date = cli::parse_date_shorthand(&answer).map_err(anyhow::Error::msg)?;
    }

    let current: Vec<&str> = form.selected().iter().map(|g| g.id()).collect();
    let answer = prompt(&format!(
        "Muscles, comma-separated, '-' for none [{}]: ",
        current.join(",")
    ))?;
    if answer == "-" {
        form.set_selected(Vec::new());
    } else if !answer.is_empty() {
        let groups = answer
            .split(',')
            .map(str::parse::<MuscleGroup>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(anyhow::Error::msg)?;
        form.set_selected(groups);
    }

    let answer = prompt(&format!(
        "Cardio? [{}]: ",
        if form.is_cardio { "Y/n" } else { "y/N" }
    ))?;
    if !answer.is_empty() {
        form.is_cardio = answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes");
    }

    if form.is_cardio {
        let answer = prompt(&format!("Time in minutes [{}]: ", form.cardio_time))?;
        if !answer.is_empty() {
            form.cardio_time = answer;
        }
        let answer = prompt(&format!("Distance in km [{}]: ", form.cardio_distance))?;
        if !answer.is_empty() {
            form.cardio_distance = answer;
        }
    }
    Ok(form)
}

/// Prints the summary cards, breakdown, cardio block and history list.
fn print_dashboard(view: &DashboardView, header_color: Color) {
    println!(
        "Stats for {} to {}",
        format_date(view.range.start),
        format_date(view.range.end)
    );

    if let StatsView::NoData = view.stats {
        println!("No data for this period.");
    }
    let stats = view.stats.stats();

    let mut summary = Table::new();
    summary
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Active Days").fg(header_color),
            Cell::new("Activities").fg(header_color),
        ])
        .add_row(vec![
            Cell::new(stats.unique_active_days).add_attribute(Attribute::Bold),
            Cell::new(stats.total_activities).add_attribute(Attribute::Bold),
        ]);
    println!("{summary}");

    println!("\nMuscle Breakdown");
    if stats.muscle_breakdown.is_empty() {
        println!("{NO_BREAKDOWN_MESSAGE}");
    } else {
        let mut breakdown = Table::new();
        breakdown
            .load_preset(UTF8_FULL)
            .set_header(vec![
                Cell::new("Muscle").fg(header_color),
                Cell::new("Sessions").fg(header_color),
            ]);
        for (label, count) in &stats.muscle_breakdown {
            breakdown.add_row(vec![Cell::new(label), Cell::new(count)]);
        }
        println!("{breakdown}");
    }

    if stats.cardio.sessions > 0 {
        println!("\nCardio Stats");
        let mut cardio = Table::new();
        cardio
            .load_preset(UTF8_FULL)
            .set_header(vec![
                Cell::new("Sessions").fg(header_color),
                Cell::new("Total Time (min)").fg(header_color),
                Cell::new("Total Distance (km)").fg(header_color),
                Cell::new("Avg Pace (min/km)").fg(header_color),
            ])
            .add_row(vec![
                Cell::new(stats.cardio.sessions),
                Cell::new(stats.cardio.total_time_display()),
                Cell::new(stats.cardio.total_distance_display()),
                Cell::new(stats.cardio.average_pace_display()),
            ]);
        println!("{cardio}");
    }

    println!("\nRecent History");
    if view.history.is_empty() {
        println!("{NO_LOGS_MESSAGE}");
        return;
    }
    let mut history = Table::new();
    history
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#").fg(header_color),
            Cell::new("ID").fg(header_color),
            Cell::new("Date").fg(header_color),
            Cell::new("Muscles").fg(header_color),
            Cell::new("Cardio").fg(header_color),
            Cell::new("Pace").fg(header_color),
        ]);
    for (row, entry) in view.history.iter().enumerate() {
        history.add_row(vec![
            Cell::new(row + 1),
            Cell::new(&entry.id),
            Cell::new(&entry.date),
            Cell::new(&entry.muscles),
            Cell::new(entry.cardio.as_deref().unwrap_or("-")),
            Cell::new(entry.pace.as_deref().unwrap_or("-")),
        ]);
    }
    println!("{history}");
    if view.has_more() {
        println!("{}", show_more_label(view.remaining));
    }
}
