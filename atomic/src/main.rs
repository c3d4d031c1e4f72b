use std::{collections::BTreeMap, fmt::Write as _, path::PathBuf};

use anyhow::{Context, Result};
use atomic::coloring::{HeatmapCell, MAX_LEVEL, color_for, month_heatmap};
use atomic::config::AppConfig;
use atomic::storage::DEFAULT_DATA_FILE;
use atomic::summary::{MONTH_LABELS, YearSummary, chart_series, month_label};
use atomic::{Area, Category, Mode, PresentationSink, Session, Task, TaskId, TaskRepository, View};
use chrono::{Datelike, Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(
    name = "atomic",
    about = "Calendar-driven to-do list split into Ideal and Maintenance days",
    version
)]
struct Cli {
    /// JSON document holding every task.
    #[arg(long, global = true, default_value = DEFAULT_DATA_FILE)]
    data_file: PathBuf,
    /// Enable verbose logging for debugging.
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Add a task to a category on a date.
    Add(AddArgs),

    /// Mark a task completed. Clears every task of the other mode on that date.
    Done(ToggleArgs),

    /// Mark a task not completed.
    Undone(ToggleArgs),

    /// Remove a task by id.
    Remove(RemoveArgs),

    /// Show the six category lists for a date.
    List(ListArgs),

    /// Show the completion heat-map for a month.
    Month(MonthArgs),

    /// Show Ideal/Maintenance/Missed day counts per month and the chart series.
    Year(YearArgs),
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ModeArg {
    Ideal,
    Maintenance,
}

impl From<ModeArg> for Mode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Ideal => Mode::Ideal,
            ModeArg::Maintenance => Mode::Maintenance,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum AreaArg {
    Health,
    Wealth,
    Happiness,
}

impl From<AreaArg> for Area {
    fn from(value: AreaArg) -> Self {
        match value {
            AreaArg::Health => Area::Health,
            AreaArg::Wealth => Area::Wealth,
            AreaArg::Happiness => Area::Happiness,
        }
    }
}

#[derive(Debug, Args)]
struct AddArgs {
    #[arg(long, value_enum)]
    mode: ModeArg,
    #[arg(long, value_enum)]
    area: AreaArg,
    /// Target date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,
    /// Task text; multiple words are joined with spaces.
    #[arg(required = true)]
    text: Vec<String>,
}

#[derive(Debug, Args)]
struct ToggleArgs {
    /// Target date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,
    /// Match by id instead of text (ids are shown by `list`).
    #[arg(long, conflicts_with = "text")]
    id: Option<Uuid>,
    /// Task text to match; the first match wins.
    #[arg(required_unless_present = "id")]
    text: Vec<String>,
}

#[derive(Debug, Args)]
struct RemoveArgs {
    /// Target date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,
    #[arg(long)]
    id: Uuid,
}

#[derive(Debug, Args)]
struct ListArgs {
    /// Target date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,
    /// Emit JSON instead of a human-readable list.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct MonthArgs {
    /// Defaults to the current year.
    #[arg(long)]
    year: Option<i32>,
    /// 1-12. Defaults to the current month.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
    month: Option<u32>,
    /// Paint cells with 24-bit terminal colors.
    #[arg(long)]
    color: bool,
    /// Emit JSON (one cell per day with its level and color).
    #[arg(long, conflicts_with = "color")]
    json: bool,
}

#[derive(Debug, Args)]
struct YearArgs {
    /// Defaults to the current year.
    #[arg(long)]
    year: Option<i32>,
    /// Emit JSON (table and chart series) instead of a table.
    #[arg(long)]
    json: bool,
}

/// Keeps the latest render state pushed by the session.
#[derive(Debug, Default)]
struct TerminalView {
    levels: BTreeMap<NaiveDate, u8>,
    lists: Vec<(Category, Vec<Task>)>,
    year: Option<YearSummary>,
}

impl PresentationSink for TerminalView {
    fn recolor(&mut self, date: NaiveDate, level: u8) {
        if level == 0 {
            self.levels.remove(&date);
        } else {
            self.levels.insert(date, level);
        }
    }

    fn show_tasks(&mut self, _date: NaiveDate, category: Category, tasks: &[Task]) {
        match self.lists.iter_mut().find(|(c, _)| *c == category) {
            Some((_, shown)) => *shown = tasks.to_vec(),
            None => self.lists.push((category, tasks.to_vec())),
        }
    }

    fn show_year(&mut self, summary: &YearSummary) {
        self.year = Some(summary.clone());
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig {
        data_file: cli.data_file,
        verbose: cli.verbose,
    };
    init_tracing(&config);

    let repo = config.repository();
    let store = repo
        .load()
        .with_context(|| format!("loading {:?}", repo.path()))?;
    let today = Local::now().date_naive();
    let mut session = Session::open(store, TerminalView::default(), today);

    match cli.command {
        Commands::Add(args) => handle_add(&mut session, args),
        Commands::Done(args) => handle_toggle(&mut session, args, true),
        Commands::Undone(args) => handle_toggle(&mut session, args, false),
        Commands::Remove(args) => handle_remove(&mut session, args),
        Commands::List(args) => handle_list(&mut session, args)?,
        Commands::Month(args) => handle_month(&session, args, today)?,
        Commands::Year(args) => handle_year(&mut session, args, today)?,
    }

    if session.is_dirty() {
        repo.save(session.store()).with_context(|| {
            format!(
                "saving {:?}; changes from this run were not written",
                repo.path()
            )
        })?;
    }
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.default_log_filter())),
        )
        .init();
}

fn handle_add(session: &mut Session<TerminalView>, args: AddArgs) {
    let AddArgs {
        mode,
        area,
        date,
        text,
    } = args;
    if let Some(date) = date {
        session.select_date(date);
    }
    let category = Category::new(mode.into(), area.into());
    match session.add_task(category, &text.join(" ")) {
        Some(id) => {
            println!("Added {id} to {category} on {}", session.selected_date());
            print!("{}", render_day(session));
        }
        None => eprintln!("Task text is empty; nothing added."),
    }
}

fn handle_toggle(session: &mut Session<TerminalView>, args: ToggleArgs, completed: bool) {
    let ToggleArgs { date, id, text } = args;
    if let Some(date) = date {
        session.select_date(date);
    }
    let hit = match id {
        Some(id) => session.set_completion_by_id(TaskId(id), completed),
        None => session.set_completion(&text.join(" "), completed),
    };
    if hit {
        print!("{}", render_day(session));
    } else {
        eprintln!("No matching task on {}.", session.selected_date());
    }
}

fn handle_remove(session: &mut Session<TerminalView>, args: RemoveArgs) {
    let RemoveArgs { date, id } = args;
    if let Some(date) = date {
        session.select_date(date);
    }
    match session.remove_task(TaskId(id)) {
        Some(task) => {
            println!("Removed {:?}", task.text);
            print!("{}", render_day(session));
        }
        None => eprintln!("No task {id} on {}.", session.selected_date()),
    }
}

fn handle_list(session: &mut Session<TerminalView>, args: ListArgs) -> Result<()> {
    let ListArgs { date, json } = args;
    if let Some(date) = date {
        session.select_date(date);
    }
    if json {
        #[derive(serde::Serialize)]
        struct JsonList<'a> {
            category: Category,
            tasks: &'a [Task],
        }

        #[derive(serde::Serialize)]
        struct JsonDay<'a> {
            date: NaiveDate,
            level: u8,
            lists: Vec<JsonList<'a>>,
        }

        let view = session.sink();
        let payload = JsonDay {
            date: session.selected_date(),
            level: view
                .levels
                .get(&session.selected_date())
                .copied()
                .unwrap_or(0),
            lists: view
                .lists
                .iter()
                .map(|(category, tasks)| JsonList {
                    category: *category,
                    tasks,
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print!("{}", render_day(session));
    }
    Ok(())
}

fn handle_month(session: &Session<TerminalView>, args: MonthArgs, today: NaiveDate) -> Result<()> {
    let year = args.year.unwrap_or(today.year());
    let month = args.month.unwrap_or(today.month());
    let cells = month_heatmap(session.store(), year, month);

    if args.json {
        #[derive(serde::Serialize)]
        struct JsonCell {
            #[serde(flatten)]
            cell: HeatmapCell,
            color: String,
        }

        let payload: Vec<JsonCell> = cells
            .into_iter()
            .map(|cell| JsonCell {
                cell,
                color: color_for(cell.level).hex(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print!("{}", render_month(&cells, year, month, args.color));
    }
    Ok(())
}

fn handle_year(session: &mut Session<TerminalView>, args: YearArgs, today: NaiveDate) -> Result<()> {
    let year = args.year.unwrap_or(today.year());
    if year != session.selected_date().year() {
        let first = NaiveDate::from_ymd_opt(year, 1, 1)
            .with_context(|| format!("year {year} is out of range"))?;
        session.select_date(first);
    }
    session.switch_view(View::Year);
    let summary = session
        .sink()
        .year
        .clone()
        .context("year view was not rendered")?;

    if args.json {
        #[derive(serde::Serialize)]
        struct JsonYear<'a> {
            summary: &'a YearSummary,
            chart: atomic::summary::ChartData,
        }

        let payload = JsonYear {
            summary: &summary,
            chart: chart_series(&summary),
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print!("{}", render_year(&summary));
    }
    Ok(())
}

fn render_day(session: &Session<TerminalView>) -> String {
    let view = session.sink();
    let date = session.selected_date();
    let level = view.levels.get(&date).copied().unwrap_or(0);
    let mut out = String::new();
    let _ = writeln!(out, "{date} (level {level}/{MAX_LEVEL})");
    for mode in Mode::ALL {
        let _ = writeln!(out, "{mode}");
        for (category, tasks) in view.lists.iter().filter(|(c, _)| c.mode == mode) {
            let _ = writeln!(out, "  {}", category.area);
            for task in tasks {
                let mark = if task.completed { "x" } else { " " };
                let _ = writeln!(out, "    [{mark}] {}  ({})", task.text, task.id);
            }
        }
    }
    out
}

const LEVEL_GLYPHS: [char; 5] = ['·', '░', '▒', '▓', '█'];

fn render_month(cells: &[HeatmapCell], year: i32, month: u32, color: bool) -> String {
    let mut out = String::new();
    let label = month_label(month).unwrap_or("?");
    let _ = writeln!(out, "{label} {year}");
    let _ = writeln!(out, "Mo Tu We Th Fr Sa Su");

    let mut column = 0;
    for &HeatmapCell { date, level } in cells {
        if date.day() == 1 {
            column = date.weekday().num_days_from_monday();
            out.push_str(&"   ".repeat(column as usize));
        }
        if color {
            let rgb = color_for(level);
            let _ = write!(
                out,
                "\x1b[48;2;{};{};{}m\x1b[30m{:>2}\x1b[0m",
                rgb.0,
                rgb.1,
                rgb.2,
                date.day()
            );
        } else {
            let glyph = LEVEL_GLYPHS[usize::from(level.min(MAX_LEVEL))];
            let _ = write!(out, "{glyph}{glyph}");
        }
        column += 1;
        if column == 7 {
            out.push('\n');
            column = 0;
        } else {
            out.push(' ');
        }
    }
    if column != 0 {
        out.push('\n');
    }
    let legend: String = LEVEL_GLYPHS
        .iter()
        .map(|glyph| glyph.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    let _ = writeln!(out, "less {legend} more");
    out
}

fn render_year(summary: &YearSummary) -> String {
    let mut out = String::new();
    let _ = write!(out, "{:<12}", summary.year);
    for label in MONTH_LABELS {
        let _ = write!(out, "{label:>4}");
    }
    let _ = writeln!(out, "{:>7}", "Total");

    let totals = summary.totals();
    let rows: [(&str, fn(&atomic::MonthSummary) -> u32); 3] = [
        ("Ideal", |m| m.ideal),
        ("Maintenance", |m| m.maintenance),
        ("Missed", |m| m.missed),
    ];
    for (name, pick) in rows {
        let _ = write!(out, "{name:<12}");
        for month in &summary.months {
            let _ = write!(out, "{:>4}", pick(month));
        }
        let _ = writeln!(out, "{:>7}", pick(&totals));
    }
    out
}
