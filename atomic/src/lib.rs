//! Calendar-driven task tracking: tasks are filed per day under an Ideal or
//! Maintenance mode crossed with a Health, Wealth or Happiness area. The crate keeps
//! the core pure (store, coloring, yearly aggregation) and pushes I/O to the edges
//! (JSON persistence, presentation sinks).

pub mod core {
    use indexmap::IndexMap;
    use serde::{Deserialize, Serialize};
    use serde_with::{DeserializeFromStr, SerializeDisplay};
    use std::{fmt, str::FromStr};
    use uuid::Uuid;

    /* ------------------------------- IDs ------------------------------- */

    /// Session-scoped task handle. Not persisted; reassigned whenever tasks are loaded.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct TaskId(pub Uuid);

    impl TaskId {
        pub fn new() -> Self {
            Self(Uuid::new_v4())
        }
    }

    impl fmt::Display for TaskId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            self.0.fmt(f)
        }
    }

    /* ---------------------------- Categories ---------------------------- */

    /// Top-level split of a day: the ideal version or the maintenance version.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub enum Mode {
        Ideal,
        Maintenance,
    }

    impl Mode {
        pub const ALL: [Mode; 2] = [Mode::Ideal, Mode::Maintenance];

        pub fn opposite(self) -> Self {
            match self {
                Mode::Ideal => Mode::Maintenance,
                Mode::Maintenance => Mode::Ideal,
            }
        }

        pub fn as_str(self) -> &'static str {
            match self {
                Mode::Ideal => "Ideal",
                Mode::Maintenance => "Maintenance",
            }
        }
    }

    impl fmt::Display for Mode {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    impl FromStr for Mode {
        type Err = DomainError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s {
                "Ideal" => Ok(Mode::Ideal),
                "Maintenance" => Ok(Mode::Maintenance),
                other => Err(DomainError::UnknownMode(other.to_string())),
            }
        }
    }

    /// Life area a task belongs to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub enum Area {
        Health,
        Wealth,
        Happiness,
    }

    impl Area {
        pub const ALL: [Area; 3] = [Area::Health, Area::Wealth, Area::Happiness];

        pub fn as_str(self) -> &'static str {
            match self {
                Area::Health => "Health",
                Area::Wealth => "Wealth",
                Area::Happiness => "Happiness",
            }
        }
    }

    impl fmt::Display for Area {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    impl FromStr for Area {
        type Err = DomainError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s {
                "Health" => Ok(Area::Health),
                "Wealth" => Ok(Area::Wealth),
                "Happiness" => Ok(Area::Happiness),
                other => Err(DomainError::UnknownArea(other.to_string())),
            }
        }
    }

    /// A (Mode, Area) pair. Encoded as `Mode|Area` wherever a plain string key is needed.
    #[derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        SerializeDisplay,
        DeserializeFromStr,
    )]
    pub struct Category {
        pub mode: Mode,
        pub area: Area,
    }

    impl Category {
        /// Canonical order: every Ideal area first, then every Maintenance area.
        pub const ALL: [Category; 6] = [
            Category::new(Mode::Ideal, Area::Health),
            Category::new(Mode::Ideal, Area::Wealth),
            Category::new(Mode::Ideal, Area::Happiness),
            Category::new(Mode::Maintenance, Area::Health),
            Category::new(Mode::Maintenance, Area::Wealth),
            Category::new(Mode::Maintenance, Area::Happiness),
        ];

        pub const fn new(mode: Mode, area: Area) -> Self {
            Self { mode, area }
        }
    }

    impl fmt::Display for Category {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}|{}", self.mode, self.area)
        }
    }

    impl FromStr for Category {
        type Err = DomainError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            let malformed = || DomainError::MalformedCategory(s.to_string());
            let (mode, area) = s.split_once('|').ok_or_else(malformed)?;
            let mode = mode.parse::<Mode>().map_err(|_| malformed())?;
            let area = area.parse::<Area>().map_err(|_| malformed())?;
            Ok(Self { mode, area })
        }
    }

    /* ------------------------------- Tasks ------------------------------- */

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Task {
        pub id: TaskId,
        pub text: String,
        pub completed: bool,
    }

    impl Task {
        pub fn new(text: impl Into<String>) -> Self {
            Self {
                id: TaskId::new(),
                text: text.into(),
                completed: false,
            }
        }
    }

    /// Equality is by content; ids are session handles and never persisted.
    impl PartialEq for Task {
        fn eq(&self, other: &Self) -> bool {
            self.text == other.text && self.completed == other.completed
        }
    }

    impl Eq for Task {}

    /* ----------------------------- Day records ----------------------------- */

    /// Every task recorded for one date, grouped by category in insertion order.
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct DayRecord {
        lists: IndexMap<Category, Vec<Task>>,
    }

    impl DayRecord {
        /// Tasks for `category`, empty when nothing was filed there.
        pub fn tasks(&self, category: Category) -> &[Task] {
            self.lists.get(&category).map(Vec::as_slice).unwrap_or(&[])
        }

        /// Category lists in the order they were first used on this day.
        pub fn iter(&self) -> impl Iterator<Item = (Category, &[Task])> {
            self.lists.iter().map(|(c, tasks)| (*c, tasks.as_slice()))
        }

        pub fn total(&self) -> usize {
            self.lists.values().map(Vec::len).sum()
        }

        pub fn completed(&self) -> usize {
            self.lists
                .values()
                .flatten()
                .filter(|task| task.completed)
                .count()
        }

        /// Whether any task filed under `mode` (any area) is completed.
        pub fn has_completed(&self, mode: Mode) -> bool {
            self.lists
                .iter()
                .filter(|(category, _)| category.mode == mode)
                .flat_map(|(_, tasks)| tasks)
                .any(|task| task.completed)
        }

        pub fn is_empty(&self) -> bool {
            self.total() == 0
        }

        pub(crate) fn push(&mut self, category: Category, task: Task) {
            self.lists.entry(category).or_default().push(task);
        }

        /// First task matching `pred`, scanning categories canonically and tasks in order.
        pub(crate) fn find_mut(
            &mut self,
            mut pred: impl FnMut(&Task) -> bool,
        ) -> Option<(Category, &mut Task)> {
            let category = Category::ALL
                .into_iter()
                .find(|c| self.tasks(*c).iter().any(&mut pred))?;
            let task = self.lists.get_mut(&category)?.iter_mut().find(|t| pred(&**t))?;
            Some((category, task))
        }

        pub(crate) fn clear_mode(&mut self, mode: Mode) {
            for (_, tasks) in self.lists.iter_mut().filter(|(c, _)| c.mode == mode) {
                for task in tasks {
                    task.completed = false;
                }
            }
        }

        pub(crate) fn remove(&mut self, id: TaskId) -> Option<Task> {
            let (category, index) = self.lists.iter().find_map(|(category, tasks)| {
                tasks
                    .iter()
                    .position(|task| task.id == id)
                    .map(|index| (*category, index))
            })?;
            let tasks = self.lists.get_mut(&category)?;
            let removed = tasks.remove(index);
            if tasks.is_empty() {
                self.lists.shift_remove(&category);
            }
            Some(removed)
        }
    }

    /* ---------------------------- Errors (domain) ---------------------------- */

    #[derive(Debug, thiserror::Error)]
    pub enum DomainError {
        #[error("unknown mode {0:?} (expected Ideal or Maintenance)")]
        UnknownMode(String),
        #[error("unknown area {0:?} (expected Health, Wealth or Happiness)")]
        UnknownArea(String),
        #[error("malformed category key {0:?} (expected Mode|Area)")]
        MalformedCategory(String),
    }

}

pub mod store {
    //! In-memory task store keyed by calendar date.

    use super::core::{Category, DayRecord, Task, TaskId};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use tracing::debug;

    /// Date → day record. A date is present only while it holds at least one task.
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct TaskStore {
        days: BTreeMap<NaiveDate, DayRecord>,
    }

    impl TaskStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Append a task under `category` on `date`. Blank text is ignored.
        pub fn add_task(
            &mut self,
            date: NaiveDate,
            category: Category,
            text: &str,
        ) -> Option<TaskId> {
            let text = text.trim();
            if text.is_empty() {
                debug!(%date, %category, "ignoring blank task text");
                return None;
            }
            let task = Task::new(text);
            let id = task.id;
            self.days.entry(date).or_default().push(category, task);
            debug!(%date, %category, %id, "task added");
            Some(id)
        }

        /// Set the completion flag of the first task on `date` whose text equals `text`.
        ///
        /// Text matching is ambiguous when a day holds duplicate texts; prefer
        /// [`TaskStore::set_completion_by_id`]. Returns `false` when nothing matched.
        pub fn set_completion(&mut self, date: NaiveDate, text: &str, completed: bool) -> bool {
            self.update_completion(date, completed, |task| task.text == text)
        }

        pub fn set_completion_by_id(
            &mut self,
            date: NaiveDate,
            id: TaskId,
            completed: bool,
        ) -> bool {
            self.update_completion(date, completed, |task| task.id == id)
        }

        fn update_completion(
            &mut self,
            date: NaiveDate,
            completed: bool,
            pred: impl FnMut(&Task) -> bool,
        ) -> bool {
            let Some(day) = self.days.get_mut(&date) else {
                debug!(%date, "completion toggle on a date without tasks");
                return false;
            };
            let Some((category, task)) = day.find_mut(pred) else {
                debug!(%date, "completion toggle matched no task");
                return false;
            };
            task.completed = completed;
            debug!(%date, %category, id = %task.id, completed, "task completion changed");
            if completed {
                // A day is either ideal or maintenance, never both.
                day.clear_mode(category.mode.opposite());
            }
            true
        }

        /// Remove a task by id. The day itself disappears with its last task.
        pub fn remove_task(&mut self, date: NaiveDate, id: TaskId) -> Option<Task> {
            let day = self.days.get_mut(&date)?;
            let removed = day.remove(id)?;
            if day.is_empty() {
                self.days.remove(&date);
            }
            debug!(%date, %id, "task removed");
            Some(removed)
        }

        /// Copy of the tasks filed under `category` on `date`.
        pub fn tasks_for(&self, date: NaiveDate, category: Category) -> Vec<Task> {
            self.days
                .get(&date)
                .map(|day| day.tasks(category).to_vec())
                .unwrap_or_default()
        }

        pub fn day(&self, date: NaiveDate) -> Option<&DayRecord> {
            self.days.get(&date)
        }

        pub fn contains(&self, date: NaiveDate) -> bool {
            self.days.contains_key(&date)
        }

        /// Recorded dates in ascending order.
        pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
            self.days.keys().copied()
        }

        pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &DayRecord)> {
            self.days.iter().map(|(date, day)| (*date, day))
        }

        /// Number of recorded days.
        pub fn len(&self) -> usize {
            self.days.len()
        }

        pub fn is_empty(&self) -> bool {
            self.days.is_empty()
        }

        pub fn total_tasks(&self, date: NaiveDate) -> usize {
            self.days.get(&date).map(DayRecord::total).unwrap_or(0)
        }

        pub fn completed_tasks(&self, date: NaiveDate) -> usize {
            self.days.get(&date).map(DayRecord::completed).unwrap_or(0)
        }

        /// Completed / total across every category; 0 for a day without tasks.
        pub fn completion_ratio(&self, date: NaiveDate) -> f64 {
            let total = self.total_tasks(date);
            if total == 0 {
                return 0.0;
            }
            self.completed_tasks(date) as f64 / total as f64
        }

        /// Returns `false`, leaving the stored record alone, when `date` is taken.
        pub(crate) fn insert_day(&mut self, date: NaiveDate, day: DayRecord) -> bool {
            if self.days.contains_key(&date) {
                return false;
            }
            if !day.is_empty() {
                self.days.insert(date, day);
            }
            true
        }
    }

}

pub mod coloring {
    //! Heat-map coloring and per-day classification.

    use super::core::Mode;
    use super::store::TaskStore;
    use super::summary::days_of_month;
    use chrono::NaiveDate;
    use serde::{Deserialize, Serialize};

    pub const MAX_LEVEL: u8 = 4;

    /// 0 for a day without tasks, otherwise `min(floor(ratio * 5), 4)`.
    pub fn intensity_level(store: &TaskStore, date: NaiveDate) -> u8 {
        let total = store.total_tasks(date);
        if total == 0 {
            return 0;
        }
        // Integer form of floor(completed / total * 5); avoids float rounding at bucket edges.
        let bucket = store.completed_tasks(date) * 5 / total;
        (bucket as u8).min(MAX_LEVEL)
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub enum DayClassification {
        Ideal,
        Maintenance,
        Missed,
    }

    /// Ideal wins over Maintenance; a day with nothing completed (or nothing at all) is Missed.
    pub fn day_classification(store: &TaskStore, date: NaiveDate) -> DayClassification {
        match store.day(date) {
            Some(day) if day.has_completed(Mode::Ideal) => DayClassification::Ideal,
            Some(day) if day.has_completed(Mode::Maintenance) => DayClassification::Maintenance,
            _ => DayClassification::Missed,
        }
    }

    /* ------------------------------ Palette ------------------------------ */

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Rgb(pub u8, pub u8, pub u8);

    impl Rgb {
        pub fn hex(self) -> String {
            format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
        }
    }

    /// Contribution-graph greens, from "nothing done" to "everything done".
    pub const HEATMAP_PALETTE: [Rgb; 5] = [
        Rgb(235, 237, 240),
        Rgb(155, 233, 168),
        Rgb(64, 196, 99),
        Rgb(48, 161, 78),
        Rgb(33, 110, 57),
    ];

    pub fn color_for(level: u8) -> Rgb {
        HEATMAP_PALETTE[usize::from(level.min(MAX_LEVEL))]
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub struct HeatmapCell {
        pub date: NaiveDate,
        pub level: u8,
    }

    /// One cell per calendar day of the month; empty for an invalid month.
    pub fn month_heatmap(store: &TaskStore, year: i32, month: u32) -> Vec<HeatmapCell> {
        days_of_month(year, month)
            .map(|date| HeatmapCell {
                date,
                level: intensity_level(store, date),
            })
            .collect()
    }

}

pub mod summary {
    //! Yearly view: per-month day counts and the bar-chart series built from them.

    use super::coloring::{DayClassification, day_classification};
    use super::store::TaskStore;
    use chrono::{Datelike, NaiveDate};
    use serde::{Deserialize, Serialize};

    pub const MONTH_LABELS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];

    pub fn month_label(month: u32) -> Option<&'static str> {
        let index = usize::try_from(month.checked_sub(1)?).ok()?;
        MONTH_LABELS.get(index).copied()
    }

    /// Every calendar day of `month`, first to last. Empty for an invalid month.
    pub fn days_of_month(year: i32, month: u32) -> impl Iterator<Item = NaiveDate> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .into_iter()
            .flat_map(|first| first.iter_days())
            .take_while(move |date| date.month() == month && date.year() == year)
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct MonthSummary {
        /// 1-based month number.
        pub month: u32,
        pub ideal: u32,
        pub maintenance: u32,
        pub missed: u32,
    }

    impl MonthSummary {
        pub fn recorded_days(&self) -> u32 {
            self.ideal + self.maintenance + self.missed
        }
    }

    /// Counts for one month. Days without a record count toward nothing.
    pub fn summarize_month(store: &TaskStore, year: i32, month: u32) -> MonthSummary {
        let mut summary = MonthSummary {
            month,
            ..MonthSummary::default()
        };
        let mut recorded = 0;
        for date in days_of_month(year, month).filter(|d| store.contains(*d)) {
            recorded += 1;
            match day_classification(store, date) {
                DayClassification::Ideal => summary.ideal += 1,
                DayClassification::Maintenance => summary.maintenance += 1,
                DayClassification::Missed => {}
            }
        }
        summary.missed = recorded - summary.ideal - summary.maintenance;
        summary
    }

    pub fn monthly_summary(store: &TaskStore, year: i32) -> [MonthSummary; 12] {
        std::array::from_fn(|index| summarize_month(store, year, index as u32 + 1))
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct YearSummary {
        pub year: i32,
        pub months: [MonthSummary; 12],
    }

    impl YearSummary {
        pub fn new(store: &TaskStore, year: i32) -> Self {
            Self {
                year,
                months: monthly_summary(store, year),
            }
        }

        /// Sum over the year; `month` is left at 0.
        pub fn totals(&self) -> MonthSummary {
            self.months
                .iter()
                .fold(MonthSummary::default(), |acc, m| MonthSummary {
                    month: 0,
                    ideal: acc.ideal + m.ideal,
                    maintenance: acc.maintenance + m.maintenance,
                    missed: acc.missed + m.missed,
                })
        }
    }

    /* ------------------------------ Chart data ------------------------------ */

    #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
    pub struct BarSeries {
        pub name: &'static str,
        pub values: Vec<u32>,
    }

    /// Grouped bar chart: one Ideal bar and one Maintenance bar per month.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
    pub struct ChartData {
        pub title: &'static str,
        pub categories: Vec<&'static str>,
        pub series: Vec<BarSeries>,
    }

    pub fn chart_series(summary: &YearSummary) -> ChartData {
        ChartData {
            title: "Monthly Progress",
            categories: MONTH_LABELS.to_vec(),
            series: vec![
                BarSeries {
                    name: "Ideal",
                    values: summary.months.iter().map(|m| m.ideal).collect(),
                },
                BarSeries {
                    name: "Maintenance",
                    values: summary.months.iter().map(|m| m.maintenance).collect(),
                },
            ],
        }
    }

}

pub mod storage {
    //! JSON persistence. The document is an object of objects:
    //! `{ "YYYY-MM-DD": { "Mode|Area": [[text, completed], ...] } }`.

    use super::core::{Category, DayRecord, DomainError, Task};
    use super::store::TaskStore;
    use chrono::NaiveDate;
    use indexmap::IndexMap;
    use serde::{Deserialize, Serialize};
    use serde_with::{MapPreventDuplicates, serde_as};
    use std::{
        collections::BTreeMap,
        fs, io,
        path::{Path, PathBuf},
    };
    use tracing::{debug, warn};

    pub const DEFAULT_DATA_FILE: &str = "todo_data.json";
    const DATE_FORMAT: &str = "%Y-%m-%d";

    #[derive(Debug, thiserror::Error)]
    pub enum PersistError {
        #[error("task data is not valid JSON of the expected shape: {0}")]
        Malformed(#[source] serde_json::Error),
        /// Not a date, or not written as zero-padded `YYYY-MM-DD`.
        #[error("invalid date key {key:?}")]
        InvalidDate {
            key: String,
            #[source]
            source: Option<chrono::ParseError>,
        },
        #[error("date {date} appears more than once")]
        DuplicateDate { date: NaiveDate },
        #[error("invalid category key on {date}")]
        InvalidCategory {
            date: NaiveDate,
            #[source]
            source: DomainError,
        },
        #[error("failed to encode task data: {0}")]
        Encode(#[source] serde_json::Error),
        #[error("i/o error on {path:?}")]
        Io {
            path: PathBuf,
            #[source]
            source: io::Error,
        },
    }

    /* ------------------------------ Wire format ------------------------------ */

    /// `[text, completed]`
    #[derive(Debug, Serialize, Deserialize)]
    struct WireTask(String, bool);

    type WireDay = IndexMap<String, Vec<WireTask>>;
    type WireDocument = BTreeMap<String, WireDay>;

    /// Decoding side of [`WireDocument`]. A repeated date or category key is an
    /// error rather than a silent overwrite.
    #[serde_as]
    #[derive(Deserialize)]
    #[serde(transparent)]
    struct StrictDocument(
        #[serde_as(as = "MapPreventDuplicates<_, MapPreventDuplicates<_, _>>")] WireDocument,
    );

    pub fn save(store: &TaskStore) -> Result<Vec<u8>, PersistError> {
        let doc: WireDocument = store
            .iter()
            .map(|(date, day)| {
                let lists: WireDay = day
                    .iter()
                    .map(|(category, tasks)| {
                        let tasks: Vec<WireTask> = tasks
                            .iter()
                            .map(|t| WireTask(t.text.clone(), t.completed))
                            .collect();
                        (category.to_string(), tasks)
                    })
                    .collect();
                (date.format(DATE_FORMAT).to_string(), lists)
            })
            .collect();
        serde_json::to_vec(&doc).map_err(PersistError::Encode)
    }

    pub fn load(bytes: &[u8]) -> Result<TaskStore, PersistError> {
        let StrictDocument(doc) =
            serde_json::from_slice(bytes).map_err(PersistError::Malformed)?;
        let mut store = TaskStore::new();
        for (key, lists) in doc {
            let date = parse_date_key(&key)?;
            let mut day = DayRecord::default();
            for (category_key, tasks) in lists {
                let category = category_key
                    .parse::<Category>()
                    .map_err(|source| PersistError::InvalidCategory { date, source })?;
                for WireTask(text, completed) in tasks {
                    let mut task = Task::new(text);
                    task.completed = completed;
                    day.push(category, task);
                }
            }
            if day.is_empty() {
                warn!(%date, "skipping date with no tasks");
                continue;
            }
            if !store.insert_day(date, day) {
                return Err(PersistError::DuplicateDate { date });
            }
        }
        debug!(days = store.len(), "task data decoded");
        Ok(store)
    }

    fn parse_date_key(key: &str) -> Result<NaiveDate, PersistError> {
        let date = NaiveDate::parse_from_str(key, DATE_FORMAT).map_err(|source| {
            PersistError::InvalidDate {
                key: key.to_owned(),
                source: Some(source),
            }
        })?;
        // chrono accepts "2024-3-1"; only the form `save` writes is allowed.
        if date.format(DATE_FORMAT).to_string() != key {
            return Err(PersistError::InvalidDate {
                key: key.to_owned(),
                source: None,
            });
        }
        Ok(date)
    }

    /* ------------------------------ Repository ------------------------------ */

    /// Where the store lives between sessions.
    pub trait TaskRepository {
        /// Load the persisted store. A store that was never saved loads as empty.
        fn load(&self) -> Result<TaskStore, PersistError>;

        /// Replace the persisted store with `store`.
        fn save(&self, store: &TaskStore) -> Result<(), PersistError>;
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct JsonFileRepository {
        path: PathBuf,
    }

    impl JsonFileRepository {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }

        pub fn path(&self) -> &Path {
            &self.path
        }

        fn staging_path(&self) -> PathBuf {
            let mut name = self
                .path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| DEFAULT_DATA_FILE.into());
            name.push(".tmp");
            self.path.with_file_name(name)
        }
    }

    impl Default for JsonFileRepository {
        fn default() -> Self {
            Self::new(DEFAULT_DATA_FILE)
        }
    }

    impl TaskRepository for JsonFileRepository {
        fn load(&self) -> Result<TaskStore, PersistError> {
            let bytes = match fs::read(&self.path) {
                Ok(bytes) => bytes,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    debug!(path = ?self.path, "no task data yet; starting empty");
                    return Ok(TaskStore::new());
                }
                Err(source) => {
                    return Err(PersistError::Io {
                        path: self.path.clone(),
                        source,
                    });
                }
            };
            load(&bytes)
        }

        fn save(&self, store: &TaskStore) -> Result<(), PersistError> {
            let bytes = save(store)?;
            // Stage next to the target so the rename stays on one filesystem.
            let staging = self.staging_path();
            fs::write(&staging, &bytes).map_err(|source| PersistError::Io {
                path: staging.clone(),
                source,
            })?;
            if let Err(source) = fs::rename(&staging, &self.path) {
                let _ = fs::remove_file(&staging);
                return Err(PersistError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
            debug!(path = ?self.path, days = store.len(), "task data saved");
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::core::{Area, Mode};

        fn date(y: i32, m: u32, d: u32) -> NaiveDate {
            NaiveDate::from_ymd_opt(y, m, d).unwrap()
        }

        #[test]
        fn saves_the_documented_shape() {
            let mut store = TaskStore::new();
            let day = date(2024, 3, 1);
            store.add_task(day, Category::new(Mode::Ideal, Area::Health), "Run 5k");
            store.add_task(day, Category::new(Mode::Maintenance, Area::Wealth), "Pay rent");
            store.set_completion(day, "Pay rent", true);

            let bytes = save(&store).expect("save");
            let value: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
            assert_eq!(
                value,
                serde_json::json!({
                    "2024-03-01": {
                        "Ideal|Health": [["Run 5k", false]],
                        "Maintenance|Wealth": [["Pay rent", true]]
                    }
                })
            );
        }

        #[test]
        fn load_inverts_save() {
            let mut store = TaskStore::new();
            let a = date(2023, 12, 31);
            let b = date(2024, 1, 1);
            store.add_task(a, Category::new(Mode::Ideal, Area::Happiness), "Paint");
            store.add_task(a, Category::new(Mode::Ideal, Area::Happiness), "Paint");
            store.add_task(b, Category::new(Mode::Maintenance, Area::Health), "Walk");
            store.set_completion(b, "Walk", true);

            let loaded = load(&save(&store).expect("save")).expect("load");
            assert_eq!(loaded, store);
            assert_eq!(loaded.tasks_for(a, Category::new(Mode::Ideal, Area::Happiness)).len(), 2);
        }

        #[test]
        fn malformed_documents_fail_loudly() {
            assert!(matches!(load(b"{not json"), Err(PersistError::Malformed(_))));
            assert!(matches!(
                load(br#"{"2024-03-01": {"Ideal|Health": [["Run", "yes"]]}}"#),
                Err(PersistError::Malformed(_))
            ));
            assert!(matches!(
                load(br#"{"2024-03-01": {"Ideal|Health": [["Run", true, 3]]}}"#),
                Err(PersistError::Malformed(_))
            ));
            assert!(matches!(
                load(br#"{"03/01/2024": {"Ideal|Health": [["Run", true]]}}"#),
                Err(PersistError::InvalidDate { .. })
            ));
            assert!(matches!(
                load(br#"{"2024-03-01": {"Ideal,Health": [["Run", true]]}}"#),
                Err(PersistError::InvalidCategory { .. })
            ));
        }

        #[test]
        fn conflicting_keys_fail_instead_of_overwriting() {
            // "2024-3-1" names the same day as "2024-03-01".
            let err = load(
                br#"{"2024-03-01": {"Ideal|Health": [["A", false]]},
                     "2024-3-1": {"Ideal|Health": [["B", false]]}}"#,
            )
            .unwrap_err();
            assert!(
                matches!(&err, PersistError::InvalidDate { key, source: None } if key == "2024-3-1")
            );

            assert!(matches!(
                load(
                    br#"{"2024-03-01": {"Ideal|Health": [["A", false]]},
                         "2024-03-01": {"Ideal|Health": [["B", false]]}}"#
                ),
                Err(PersistError::Malformed(_))
            ));
            assert!(matches!(
                load(
                    br#"{"2024-03-01": {"Ideal|Health": [["A", false]],
                                        "Ideal|Health": [["B", true]]}}"#
                ),
                Err(PersistError::Malformed(_))
            ));
        }

        #[test]
        fn empty_records_are_skipped() {
            let store = load(br#"{"2024-03-01": {}, "2024-03-02": {"Ideal|Health": []}}"#)
                .expect("load");
            assert!(store.is_empty());
        }

        #[test]
        fn missing_file_is_a_first_run() {
            let tmp = tempfile::tempdir().expect("tempdir");
            let repo = JsonFileRepository::new(tmp.path().join("todo_data.json"));
            let store = repo.load().expect("load");
            assert!(store.is_empty());
        }

        #[test]
        fn file_round_trip() {
            let tmp = tempfile::tempdir().expect("tempdir");
            let repo = JsonFileRepository::new(tmp.path().join("todo_data.json"));
            let mut store = TaskStore::new();
            let day = date(2024, 7, 4);
            store.add_task(day, Category::new(Mode::Ideal, Area::Wealth), "Ship it");

            repo.save(&store).expect("save");
            assert!(!repo.staging_path().exists());
            assert_eq!(repo.load().expect("load"), store);
        }

        #[test]
        fn malformed_file_is_an_error() {
            let tmp = tempfile::tempdir().expect("tempdir");
            let path = tmp.path().join("todo_data.json");
            fs::write(&path, "[]").expect("write");
            let repo = JsonFileRepository::new(&path);
            assert!(matches!(repo.load(), Err(PersistError::Malformed(_))));
        }

        #[test]
        fn failed_save_keeps_previous_document() {
            let tmp = tempfile::tempdir().expect("tempdir");
            let repo = JsonFileRepository::new(tmp.path().join("todo_data.json"));
            let mut store = TaskStore::new();
            store.add_task(date(2024, 1, 1), Category::new(Mode::Ideal, Area::Health), "Old");
            repo.save(&store).expect("first save");

            // Block the staging path so the next write cannot happen.
            fs::create_dir(repo.staging_path()).expect("mkdir staging");
            store.add_task(date(2024, 1, 2), Category::new(Mode::Ideal, Area::Health), "New");
            assert!(matches!(repo.save(&store), Err(PersistError::Io { .. })));

            let on_disk = repo.load().expect("load");
            assert_eq!(on_disk.len(), 1);
        }
    }
}

pub mod presentation {
    //! The seam between the core and whatever draws it.

    use super::core::{Category, Task};
    use super::summary::YearSummary;
    use chrono::NaiveDate;

    /// Receives render requests from a [`crate::session::Session`].
    pub trait PresentationSink {
        /// Repaint the calendar cell for `date` with heat-map `level`.
        fn recolor(&mut self, date: NaiveDate, level: u8);

        /// Replace the list shown for `category` on `date`.
        fn show_tasks(&mut self, date: NaiveDate, category: Category, tasks: &[Task]);

        /// Replace the yearly table and chart.
        fn show_year(&mut self, summary: &YearSummary);
    }

    impl<S: PresentationSink + ?Sized> PresentationSink for &mut S {
        fn recolor(&mut self, date: NaiveDate, level: u8) {
            (**self).recolor(date, level);
        }

        fn show_tasks(&mut self, date: NaiveDate, category: Category, tasks: &[Task]) {
            (**self).show_tasks(date, category, tasks);
        }

        fn show_year(&mut self, summary: &YearSummary) {
            (**self).show_year(summary);
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub enum View {
        #[default]
        Month,
        Year,
    }
}

pub mod session {
    //! Owns the store for the lifetime of a front end and keeps its sink in sync.

    use super::coloring::intensity_level;
    use super::core::{Category, Task, TaskId};
    use super::presentation::{PresentationSink, View};
    use super::store::TaskStore;
    use super::summary::YearSummary;
    use chrono::{Datelike, NaiveDate};
    use tracing::debug;

    pub struct Session<S: PresentationSink> {
        store: TaskStore,
        sink: S,
        selected: NaiveDate,
        view: View,
        dirty: bool,
    }

    impl<S: PresentationSink> Session<S> {
        /// Take ownership of `store`, attach `sink` and paint every recorded date.
        pub fn open(store: TaskStore, sink: S, selected: NaiveDate) -> Self {
            let mut session = Self {
                store,
                sink,
                selected,
                view: View::default(),
                dirty: false,
            };
            let dates: Vec<_> = session.store.dates().collect();
            for date in dates {
                session.recolor(date);
            }
            session.show_selected_day();
            session
        }

        pub fn selected_date(&self) -> NaiveDate {
            self.selected
        }

        pub fn view(&self) -> View {
            self.view
        }

        pub fn store(&self) -> &TaskStore {
            &self.store
        }

        pub fn sink(&self) -> &S {
            &self.sink
        }

        /// True once any mutation happened since [`Session::open`].
        pub fn is_dirty(&self) -> bool {
            self.dirty
        }

        pub fn into_store(self) -> TaskStore {
            self.store
        }

        pub fn select_date(&mut self, date: NaiveDate) {
            self.selected = date;
            self.show_selected_day();
        }

        pub fn add_task(&mut self, category: Category, text: &str) -> Option<TaskId> {
            let id = self.store.add_task(self.selected, category, text)?;
            self.after_mutation();
            Some(id)
        }

        pub fn set_completion(&mut self, text: &str, completed: bool) -> bool {
            let hit = self.store.set_completion(self.selected, text, completed);
            if hit {
                self.after_mutation();
            }
            hit
        }

        pub fn set_completion_by_id(&mut self, id: TaskId, completed: bool) -> bool {
            let hit = self.store.set_completion_by_id(self.selected, id, completed);
            if hit {
                self.after_mutation();
            }
            hit
        }

        pub fn remove_task(&mut self, id: TaskId) -> Option<Task> {
            let removed = self.store.remove_task(self.selected, id)?;
            self.after_mutation();
            Some(removed)
        }

        /// Switching to the year view recomputes the summary for the selected year.
        pub fn switch_view(&mut self, view: View) {
            debug!(?view, "switching view");
            self.view = view;
            match view {
                View::Year => {
                    let summary = YearSummary::new(&self.store, self.selected.year());
                    self.sink.show_year(&summary);
                }
                View::Month => self.show_selected_day(),
            }
        }

        fn after_mutation(&mut self) {
            self.dirty = true;
            self.recolor(self.selected);
            self.show_selected_day();
        }

        fn recolor(&mut self, date: NaiveDate) {
            let level = intensity_level(&self.store, date);
            self.sink.recolor(date, level);
        }

        fn show_selected_day(&mut self) {
            for category in Category::ALL {
                let tasks = self.store.tasks_for(self.selected, category);
                self.sink.show_tasks(self.selected, category, &tasks);
            }
        }
    }
}

pub mod config {
    //! Runtime settings resolved by the front end.

    use super::storage::{DEFAULT_DATA_FILE, JsonFileRepository};
    use std::path::PathBuf;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct AppConfig {
        /// JSON document holding every task.
        pub data_file: PathBuf,
        /// Lower the default log threshold to `debug`.
        pub verbose: bool,
    }

    impl Default for AppConfig {
        fn default() -> Self {
            Self {
                data_file: PathBuf::from(DEFAULT_DATA_FILE),
                verbose: false,
            }
        }
    }

    impl AppConfig {
        /// Filter directive used when `RUST_LOG` is unset.
        pub fn default_log_filter(&self) -> &'static str {
            if self.verbose { "atomic=debug" } else { "warn" }
        }

        pub fn repository(&self) -> JsonFileRepository {
            JsonFileRepository::new(&self.data_file)
        }
    }

}

pub use coloring::{DayClassification, day_classification, intensity_level};
pub use crate::core::{Area, Category, DayRecord, Mode, Task, TaskId};
pub use presentation::{PresentationSink, View};
pub use session::Session;
pub use storage::{JsonFileRepository, PersistError, TaskRepository};
pub use store::TaskStore;
pub use summary::{MonthSummary, YearSummary, monthly_summary};
