//! CLI commands

use anyhow::{bail, Context, Result};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::db::{
    models::now_millis,
    repositories::{ProjectRepository, SessionRepository, UserRepository, WorkHoursRepository},
    Database, Location, MigrationRunner, User,
};

#[derive(Parser)]
#[command(name = "worklog")]
#[command(about = "Track work sessions against projects in a local SQLite store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.worklog/config.yml)
    #[arg(long)]
    config: Option<String>,

    /// Database path, overrides the config file
    #[arg(long)]
    database: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,

    /// Reverse migrations newer than VERSION
    Downgrade {
        version: i64,
    },

    /// Show the state of every known migration
    Status,

    /// Create an account
    Signup {
        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        phone_number: Option<String>,

        /// HMS system user name
        #[arg(long)]
        hms_user: Option<String>,
    },

    /// Sign in on this device
    Signin {
        email: String,
    },

    /// Sign out
    Signout,

    /// Show the signed-in user and their running session
    Whoami,

    /// List active projects
    Projects {
        /// Only projects at this location (home, office, client)
        #[arg(long)]
        location: Option<Location>,

        /// Only projects whose name contains this text
        #[arg(long)]
        search: Option<String>,
    },

    /// Create a new project
    CreateProject {
        name: String,

        #[arg(long)]
        location: Location,

        #[arg(long)]
        description: Option<String>,
    },

    /// Hide a project without deleting its history
    DeactivateProject {
        id: i64,
    },

    /// Start working on a project
    Start {
        project_id: i64,

        #[arg(long)]
        location: Option<Location>,

        /// Start time in epoch milliseconds (default: now)
        #[arg(long)]
        at: Option<i64>,
    },

    /// End the running work session
    End {
        /// End time in epoch milliseconds (default: now)
        #[arg(long)]
        at: Option<i64>,

        #[arg(long)]
        break_minutes: Option<i64>,
    },

    /// End the running session and start on another project
    Switch {
        project_id: i64,

        #[arg(long)]
        location: Option<Location>,
    },

    /// Today's work sessions
    Today {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let db_path = match cli.database {
        Some(path) => std::path::PathBuf::from(path),
        None => config.resolve_db_path()?,
    };

    let db = Database::new(&db_path);

    // Create a multi-threaded runtime for CLI operations
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(async {
        let runner = MigrationRunner::new(db.clone());
        let is_migration_command = matches!(
            cli.command,
            Commands::Migrate | Commands::Downgrade { .. } | Commands::Status
        );
        if config.auto_migrate && !is_migration_command {
            runner.run().await.context("Failed to migrate database")?;
        }

        let result = execute(cli.command, &db, &runner, &config).await;
        db.close().await?;
        result
    })
}

async fn execute(
    command: Commands,
    db: &Database,
    runner: &MigrationRunner,
    config: &Config,
) -> Result<()> {
    let users = UserRepository::new(db.clone());
    let projects = ProjectRepository::new(db.clone());
    let work = WorkHoursRepository::new(db.clone());
    let sessions = SessionRepository::new(db.clone());

    match command {
        Commands::Migrate => {
            let applied = runner.run().await?;
            println!("Applied {} migration(s)", applied);
        }

        Commands::Downgrade { version } => {
            let reversed = runner.downgrade_to(version).await?;
            println!("Reversed {} migration(s), now at version {}", reversed, version);
        }

        Commands::Status => {
            for state in runner.status().await? {
                println!(
                    "{:>3} {:<30} {}{}",
                    state.version,
                    state.name,
                    state.status.as_str(),
                    state
                        .applied_at
                        .map(|at| format!(" ({})", format_millis(at)))
                        .unwrap_or_default()
                );
            }
        }

        Commands::Signup {
            first_name,
            last_name,
            email,
            phone_number,
            hms_user,
        } => {
            let user = User {
                phone_number,
                hms_user,
                ..User::new(first_name, last_name, email)
            };
            match users.create(user).await {
                Ok(user) => println!("Created account for {} ({})", user.full_name(), user.email),
                Err(e) if e.is_unique_violation() => {
                    bail!("An account with this email already exists")
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Signin { email } => {
            let Some(user) = users.get_by_email(&email).await? else {
                bail!("No account found for {}", email);
            };
            let user_id = user.id.context("Stored user has no id")?;
            sessions.sign_in(user_id).await?;
            println!("Signed in as {}", user.full_name());
        }

        Commands::Signout => {
            if sessions.sign_out().await? {
                println!("Signed out");
            } else {
                println!("Nobody is signed in");
            }
        }

        Commands::Whoami => {
            let Some(user) = sessions.current_user().await? else {
                println!("Nobody is signed in");
                return Ok(());
            };
            sessions.touch().await?;
            println!("{} <{}>", user.full_name(), user.email);

            let user_id = user.id.context("Stored user has no id")?;
            match work.active_for(user_id).await? {
                Some(entry) => println!(
                    "Working on {} at {} since {}",
                    entry.project_name,
                    entry
                        .session
                        .location()
                        .unwrap_or(entry.project_location),
                    format_millis(entry.session.start_work_time)
                ),
                None => println!("No active work session"),
            }
        }

        Commands::Projects { location, search } => {
            let list = match (location, search) {
                (_, Some(term)) => projects.search(&term).await?,
                (Some(location), None) => projects.by_location(location).await?,
                (None, None) => projects.list_active().await?,
            };

            if list.is_empty() {
                println!("No projects found");
            } else {
                for project in list {
                    println!(
                        "[{}] {} ({}) - {}",
                        project.id.unwrap_or_default(),
                        project.name,
                        project.location,
                        project.description.as_deref().unwrap_or("-")
                    );
                }
            }
        }

        Commands::CreateProject {
            name,
            location,
            description,
        } => match projects.create(name, location, description).await {
            Ok(project) => println!(
                "Created project: {} ({})",
                project.name,
                project.id.unwrap_or_default()
            ),
            Err(e) if e.is_unique_violation() => {
                bail!("A project with this name already exists at {}", location)
            }
            Err(e) => return Err(e.into()),
        },

        Commands::DeactivateProject { id } => {
            projects.deactivate(id).await?;
            println!("Deactivated project {}", id);
        }

        Commands::Start {
            project_id,
            location,
            at,
        } => {
            let user_id = signed_in_user(&sessions).await?;
            let location = location.unwrap_or(config.default_location);
            let session = work
                .start(project_id, user_id, location, at.unwrap_or_else(now_millis))
                .await?;
            println!(
                "Started session {} at {}",
                session.id.unwrap_or_default(),
                format_millis(session.start_work_time)
            );
        }

        Commands::End { at, break_minutes } => {
            let user_id = signed_in_user(&sessions).await?;
            match work
                .end(user_id, at.unwrap_or_else(now_millis), break_minutes)
                .await?
            {
                Some(session) => println!(
                    "Ended session {} after {}",
                    session.id.unwrap_or_default(),
                    format_duration(session.duration())
                ),
                None => println!("No active work session"),
            }
        }

        Commands::Switch {
            project_id,
            location,
        } => {
            let user_id = signed_in_user(&sessions).await?;
            let location = location.unwrap_or(config.default_location);
            let (ended, started) = work
                .switch(user_id, project_id, location, now_millis())
                .await?;
            if let Some(ended) = ended {
                println!(
                    "Ended session {} after {}",
                    ended.id.unwrap_or_default(),
                    format_duration(ended.duration())
                );
            }
            println!("Started session {}", started.id.unwrap_or_default());
        }

        Commands::Today { json } => {
            let user_id = signed_in_user(&sessions).await?;
            let report = work.today(user_id).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if report.entries.is_empty() {
                println!("No work sessions today");
            } else {
                for entry in &report.entries {
                    let end = match entry.session.end_work_time {
                        Some(end) => format_millis(end),
                        None => "running".to_string(),
                    };
                    println!(
                        "{} - {}  {} ({})",
                        format_millis(entry.session.start_work_time),
                        end,
                        entry.project_name,
                        format_duration(entry.session.duration())
                    );
                }
                println!("Total: {}", format_duration(report.total_millis));
            }
        }
    }

    Ok(())
}

async fn signed_in_user(sessions: &SessionRepository) -> Result<i64> {
    let session = sessions
        .current()
        .await?
        .context("Nobody is signed in; run `worklog signin <email>` first")?;
    Ok(session.user_id)
}

fn format_millis(millis: i64) -> String {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn format_duration(millis: i64) -> String {
    let minutes = millis / 60_000;
    format!("{}h {:02}m", minutes / 60, minutes % 60)
}
