use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::info;

use habit_core::dates::{date_window, format_date, parse_date};
use habit_core::heatmap::{calendar_year_grid, rolling_window_grid, DEFAULT_WINDOW_DAYS};
use habit_core::seed::DemoSeeder;
use habit_core::stats::completion_percentage;
use habit_core::storage::FileStore;
use habit_core::{HabitDraft, HabitPatch, HabitStore};

use crate::render;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub seed: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(dir) = env::var("STREAK_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(seed) = env::var("STREAK_SEED") {
            if let Ok(value) = seed.trim().parse::<u64>() {
                config.seed = value;
            }
        }
        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().unwrap_or_else(|_| PathBuf::from(".streak")),
            seed: 0,
        }
    }
}

fn default_data_dir() -> Result<PathBuf> {
    #[cfg(windows)]
    let mut path = PathBuf::from(
        env::var("APPDATA").context("APPDATA should be present on Windows")?,
    );
    #[cfg(not(windows))]
    let mut path = env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|_| {
            env::var("HOME").map(|home| {
                let mut path = PathBuf::from(home);
                path.push(".local/state");
                path
            })
        })
        .context("neither XDG_STATE_HOME nor HOME is set")?;
    path.push("streak");
    Ok(path)
}

#[derive(Parser, Debug)]
#[command(name = "streak", version)]
#[command(about = "Habit tracker with yearly activity heatmaps")]
struct Args {
    #[command(subcommand)]
    command: Commands,
    #[arg(
        long,
        help = "Data directory. Overrides $STREAK_DATA_DIR and the platform default"
    )]
    dir: Option<PathBuf>,
}

fn parse_day(input: &str) -> Result<NaiveDate, String> {
    parse_date(input).ok_or_else(|| format!("expected YYYY-MM-DD, got `{input}`"))
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "List habits with their completion percentage")]
    List,
    #[command(about = "Show active habits and their completion state for one day")]
    Day {
        #[arg(long, value_parser = parse_day, help = "Day to show, YYYY-MM-DD. Defaults to today")]
        date: Option<NaiveDate>,
    },
    #[command(about = "Create a habit")]
    Add {
        name: String,
        #[arg(long, default_value = "stars")]
        icon: String,
        #[arg(long, default_value = "#3B82F6", help = "Hex colour used for shading")]
        color: String,
        #[arg(long, value_parser = parse_day, help = "First tracked day, YYYY-MM-DD. Defaults to today")]
        start: Option<NaiveDate>,
        #[arg(long, value_parser = parse_day, help = "Last tracked day. Open-ended when omitted")]
        end: Option<NaiveDate>,
    },
    #[command(about = "Edit habit metadata")]
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        icon: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long, value_parser = parse_day)]
        start: Option<NaiveDate>,
        #[arg(long, value_parser = parse_day, conflicts_with = "no_end")]
        end: Option<NaiveDate>,
        #[arg(long, help = "Clear the end date, making the habit open-ended")]
        no_end: bool,
    },
    #[command(about = "Delete a habit")]
    Remove { id: String },
    #[command(about = "Flip completion for a habit on one day")]
    Toggle {
        id: String,
        #[arg(long, value_parser = parse_day, help = "Day to toggle, YYYY-MM-DD. Defaults to today")]
        date: Option<NaiveDate>,
    },
    #[command(about = "Render a habit's activity heatmap")]
    Heatmap {
        id: String,
        #[arg(long, help = "Use the legacy rolling-window layout instead of the calendar year")]
        window: bool,
        #[arg(long, default_value_t = DEFAULT_WINDOW_DAYS, help = "Days in the rolling window")]
        days: usize,
    },
}

pub fn run(config: AppConfig) -> Result<()> {
    let args = Args::parse();
    let data_dir = args.dir.unwrap_or(config.data_dir);
    info!(path = %data_dir.display(), "opening habit store");

    let store = HabitStore::builder()
        .with_storage(Box::new(FileStore::open(&data_dir)?))
        .with_seeder(Box::new(DemoSeeder::new(config.seed)))
        .build()?;
    let today = Local::now().date_naive();

    match args.command {
        Commands::List => list(&store, today),
        Commands::Day { date } => day_view(&store, date.unwrap_or(today)),
        Commands::Add {
            name,
            icon,
            color,
            start,
            end,
        } => {
            if let (Some(start), Some(end)) = (start, end) {
                if end < start {
                    bail!("end date {end} is before start date {start}");
                }
            }
            let habit = store.create(HabitDraft {
                name,
                icon,
                color,
                start_date: start,
                end_date: end,
            })?;
            println!("created {} [{}]", habit.name, habit.id);
            Ok(())
        }
        Commands::Edit {
            id,
            name,
            icon,
            color,
            start,
            end,
            no_end,
        } => {
            let mut patch = HabitPatch {
                name,
                icon,
                color,
                start_date: start,
                end_date: None,
            };
            if no_end {
                patch.end_date = Some(None);
            } else if let Some(end) = end {
                patch.end_date = Some(Some(end));
            } else if let (Some(start), Some(habit)) = (start, store.get(&id)) {
                // Moving the start past the end would invert the range, so
                // the habit becomes open-ended instead.
                if habit.end_date.is_some_and(|end| start > end) {
                    patch.end_date = Some(None);
                }
            }
            store.update(&id, patch)?;
            println!("updated {id}");
            Ok(())
        }
        Commands::Remove { id } => {
            store.remove(&id)?;
            println!("removed {id}");
            Ok(())
        }
        Commands::Toggle { id, date } => {
            let date = date.unwrap_or(today);
            store.toggle_completion(&id, date)?;
            let habit = store.get(&id).context("habit vanished after toggle")?;
            let state = if habit.completed_on(date) {
                "done"
            } else {
                "not done"
            };
            println!("{} on {date}: {state}", habit.name);
            Ok(())
        }
        Commands::Heatmap { id, window, days } => heatmap(&store, &id, today, window, days),
    }
}

fn list(store: &HabitStore, today: NaiveDate) -> Result<()> {
    let habits = store.habits();
    if habits.is_empty() {
        println!("No habits created yet. Try `streak add <name>`.");
        return Ok(());
    }
    for habit in habits {
        println!(
            "{}{:>3}%  {}  [{}]",
            render::swatch(&habit.color),
            completion_percentage(&habit, today),
            habit.name,
            habit.id
        );
    }
    Ok(())
}

fn day_view(store: &HabitStore, date: NaiveDate) -> Result<()> {
    let habits = store.habits();
    let active: Vec<_> = habits
        .iter()
        .filter(|habit| habit.is_active_on(date))
        .collect();

    // Strip of surrounding days with the selected one highlighted, like
    // the mobile date selector.
    let strip: Vec<String> = date_window(date, 3, 3)
        .into_iter()
        .map(|day| {
            let label = day.format("%d").to_string();
            if day == date {
                format!("[{label}]")
            } else {
                format!(" {label} ")
            }
        })
        .collect();
    println!("{}  {}", format_date(date), strip.join(" "));
    if active.is_empty() {
        if habits.is_empty() {
            println!("No habits created yet. Try `streak add <name>`.");
        } else {
            println!("No habits scheduled for this day.");
        }
        return Ok(());
    }
    for habit in active {
        let mark = if habit.completed_on(date) { "x" } else { " " };
        println!(
            "[{mark}] {}{}  [{}]",
            render::swatch(&habit.color),
            habit.name,
            habit.id
        );
    }
    Ok(())
}

fn heatmap(store: &HabitStore, id: &str, today: NaiveDate, window: bool, days: usize) -> Result<()> {
    let Some(habit) = store.get(id) else {
        bail!("no habit with id `{id}`");
    };

    let grid = if window {
        rolling_window_grid(&habit, today, days)
    } else {
        calendar_year_grid(&habit, today)
    };
    println!(
        "{}  {}% complete",
        habit.name,
        completion_percentage(&habit, today)
    );
    print!("{}", render::render_grid(&grid));
    Ok(())
}
