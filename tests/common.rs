#![allow(dead_code)]

use chrono::Local;
use env_logger::fmt::Color;
use log::Level;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::io::Write;
use tempfile::TempDir;

use tabula::{Builder, Database, FieldDef, FieldType, ModelDef, QueryEngine, Table, Value};

pub const SCHEMA: &str = "test";

pub fn init_logger() {
    env_logger::builder()
        .format(|buf, record: &log::Record| {
            let mut style = buf.style();
            let color = match record.level() {
                Level::Error => Color::Red,
                Level::Warn => Color::Yellow,
                Level::Info => Color::Green,
                Level::Debug => Color::Cyan,
                Level::Trace => Color::White,
            };
            style.set_color(color);
            writeln!(
                buf,
                "[{} {} {:>30}:{:^4}] - {}",
                Local::now().format("%Y-%m-%dT%H:%M:%S"),
                style.value(record.level()),
                record.module_path().unwrap_or(""),
                style.value(record.line().unwrap_or(0)),
                style.value(record.args())
            )
        })
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .unwrap_or(());
}

/// Database in a scratch dir that is removed on drop.
pub struct TestDb {
    pub db: Database,
    _dir: TempDir,
}

impl TestDb {
    pub fn new(models: Vec<ModelDef>) -> Self {
        Self::with_builder(models, |b| b)
    }

    pub fn with_builder(models: Vec<ModelDef>, f: impl FnOnce(Builder) -> Builder) -> Self {
        init_logger();
        let dir = tempfile::tempdir().unwrap();
        let db = f(Builder::new().work_dir(dir.path()).node_capacity(4))
            .build()
            .unwrap();
        db.create_schema(SCHEMA, models, false).unwrap();
        Self { db, _dir: dir }
    }

    pub fn table(&self, model: &ModelDef) -> Table {
        self.db.table(SCHEMA, model).unwrap()
    }

    pub fn engine(&self) -> QueryEngine {
        self.db.engine(SCHEMA)
    }
}

/// `person(name, age*, score, city, active, employer)`, `*` - indexed
pub fn person() -> ModelDef {
    ModelDef::new(
        "person",
        vec![
            FieldDef::new("name", FieldType::String(12)),
            FieldDef::new("age", FieldType::Int).indexed(),
            FieldDef::new("score", FieldType::Double),
            FieldDef::new("city", FieldType::String(8)),
            FieldDef::new("active", FieldType::Bool),
            FieldDef::new("employer", FieldType::Link).indexed(),
        ],
    )
    .unwrap()
}

pub const NAME: usize = 0;
pub const AGE: usize = 1;
pub const SCORE: usize = 2;
pub const CITY: usize = 3;
pub const ACTIVE: usize = 4;
pub const EMPLOYER: usize = 5;

/// `company(title, staff~)`, `~` - virtual link
pub fn company() -> ModelDef {
    ModelDef::new(
        "company",
        vec![
            FieldDef::new("title", FieldType::String(12)),
            FieldDef::new("staff", FieldType::VirtualLink),
        ],
    )
    .unwrap()
}

pub const CITIES: [&str; 4] = ["oslo", "bern", "rome", "kyiv"];

/// Deterministic person rows, employers in `0..companies` or `-1`.
pub fn people(count: usize, companies: i64, seed: u64) -> Vec<Vec<Value>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let employer = rng.gen_range(-1..companies);
            vec![
                Value::from(format!("p{}", i)),
                Value::Int(rng.gen_range(18..60)),
                Value::Double(f64::from(rng.gen_range(0..10_000)) / 100.0),
                Value::from(CITIES[rng.gen_range(0..CITIES.len())]),
                Value::Bool(rng.gen_bool(0.5)),
                Value::Link(employer),
            ]
        })
        .collect()
}

pub fn fill(table: &Table, rows: &[Vec<Value>]) -> Vec<i64> {
    rows.iter().map(|row| table.insert(row).unwrap()).collect()
}
