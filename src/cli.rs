// src/cli.rs
use chrono::{Duration, Local, NaiveDate};
use clap::{ArgGroup, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use gym_log_lib::MuscleGroup;

#[derive(Parser, Debug)]
#[command(author, version, about = "A CLI tool to log workouts and review training stats", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
    /// Show debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendCli {
    Local,
    Remote,
}

// Custom parser for date strings and shorthands
pub fn parse_date_shorthand(s: &str) -> Result<NaiveDate, String> {
    let today = Local::now().date_naive();
    match s.to_lowercase().as_str() {
        "today" => Ok(today),
        "yesterday" => Ok(today - Duration::days(1)),
        _ => {
            // Try parsing YYYY-MM-DD first
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                Ok(date)
            }
            // Then the DD/MM/YYYY form the history list prints
            else if let Ok(date) = NaiveDate::parse_from_str(s, "%d/%m/%Y") {
                Ok(date)
            } else {
                Err(format!(
                    "Invalid date format: '{}'. Use 'today', 'yesterday', YYYY-MM-DD or DD/MM/YYYY.",
                    s
                ))
            }
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log a workout session
    Add {
        /// Date of the session
        #[arg(short, long, value_parser = parse_date_shorthand, default_value = "today")]
        date: NaiveDate,
        /// Comma-separated muscle groups worked (e.g., "chest,triceps")
        #[arg(short, long, value_delimiter = ',')]
        muscles: Vec<MuscleGroup>,
        /// The session included cardio
        #[arg(short, long)]
        cardio: bool,
        /// Cardio duration in minutes
        #[arg(short, long, requires = "cardio")]
        time: Option<String>,
        /// Cardio distance in km
        #[arg(long, requires = "cardio")]
        distance: Option<String>,
    },
    /// Change a logged session. Fields not given keep their current value.
    #[command(group(ArgGroup::new("cardio_flag").args(["cardio", "no_cardio"])))]
    Edit {
        /// ID of the session to edit
        id: String,
        #[arg(short, long, value_parser = parse_date_shorthand)]
        date: Option<NaiveDate>,
        /// Replace the muscle groups (comma-separated)
        #[arg(short, long, value_delimiter = ',', conflicts_with = "clear_muscles")]
        muscles: Option<Vec<MuscleGroup>>,
        /// Remove all muscle groups (rest day / cardio only)
        #[arg(long)]
        clear_muscles: bool,
        /// Mark the session as cardio
        #[arg(long)]
        cardio: bool,
        /// Mark the session as not cardio
        #[arg(long)]
        no_cardio: bool,
        /// Cardio duration in minutes (empty string clears it)
        #[arg(short, long)]
        time: Option<String>,
        /// Cardio distance in km (empty string clears it)
        #[arg(long)]
        distance: Option<String>,
    },
    /// Delete a logged session
    Delete {
        /// ID of the session to delete
        id: String,
        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Show stats and history for a date range (defaults to the current year)
    Stats {
        #[arg(long, value_parser = parse_date_shorthand)]
        from: Option<NaiveDate>,
        #[arg(long, value_parser = parse_date_shorthand)]
        to: Option<NaiveDate>,
        /// Number of history pages to show
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        pages: u32,
    },
    /// Interactive stats view: show more, edit, delete, change range
    Browse {
        #[arg(long, value_parser = parse_date_shorthand)]
        from: Option<NaiveDate>,
        #[arg(long, value_parser = parse_date_shorthand)]
        to: Option<NaiveDate>,
    },
    /// List the muscle groups that can be logged
    Muscles,
    /// Sign in with Google or a passwordless email link
    #[command(group(ArgGroup::new("method").required(true).args(["google", "email"])))]
    Login {
        #[arg(long)]
        google: bool,
        #[arg(long)]
        email: Option<String>,
    },
    /// Finish an email sign-in with the one-time code from the message
    Verify {
        #[arg(long)]
        email: String,
        #[arg(long)]
        code: String,
    },
    /// Finish a browser sign-in by pasting the URL you were redirected to
    CompleteLogin { redirect_url: String },
    Logout,
    /// Show who is signed in
    Whoami,
    /// Choose where logs are stored
    SetBackend {
        #[arg(value_enum)]
        backend: BackendCli,
    },
    /// Configure the hosted backend
    SetRemote {
        #[arg(long)]
        url: String,
        #[arg(long)]
        anon_key: String,
        /// Where the browser is sent after signing in
        #[arg(long)]
        redirect_to: Option<String>,
    },
    /// Show the path to the database file
    DbPath,
    /// Show the path to the config file
    ConfigPath,
    /// Generate shell completion scripts
    GenerateCompletion {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// Function to parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}
