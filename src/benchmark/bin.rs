#[macro_use]
extern crate log;

use clap::{value_parser, Arg, ArgMatches, Command};
use log::LevelFilter;
use std::{path::PathBuf, time::Instant};
use tabula::{
    AggFn, AggregateSpec, Condition, ConditionNode, FieldRef, Operator, Query, Value,
};

mod generator;
mod statistics;
mod writer;

use generator::{Generator, AGE, CITY, SCORE};
use statistics::Statistics;
use writer::Writer;

fn main() -> anyhow::Result<()> {
    println!("{:_^41}", "TABULA_BENCHMARK");
    env_logger::Builder::new()
        .filter_module("benchmark", LevelFilter::Info)
        .init();
    let matches = prepare_matches();
    let rows = arg(&matches, "rows", 100_000);
    let queries = arg(&matches, "queries", 100);
    let delete_every = arg(&matches, "delete_every", 10);
    let dir: PathBuf = matches
        .get_one::<PathBuf>("dst_dir")
        .cloned()
        .unwrap_or_else(std::env::temp_dir)
        .join("tabula_benchmark");

    info!("Create new generator");
    let mut generator = Generator::new(arg(&matches, "seed", 42) as u64);

    info!("Create new writer in {}", dir.display());
    let writer = Writer::new(&dir, generator.model().clone())?;

    let mut statistics = Statistics::default();
    info!("Start write cycle: {} rows", rows);
    for _ in 0..rows {
        let values = generator.next_row();
        let now = Instant::now();
        writer.insert(&values)?;
        statistics.add("insert", now.elapsed());
    }
    if delete_every > 0 {
        info!("Delete every {} row", delete_every);
        for id in (0..rows as i64).step_by(delete_every) {
            let now = Instant::now();
            writer.delete(id)?;
            statistics.add("delete", now.elapsed());
        }
    }

    info!("Start query cycle: {} queries per kind", queries);
    let model = generator.model().clone();
    let engine = writer.engine();
    for _ in 0..queries {
        let age = generator.age();
        let eq = Query::new(model.clone()).filter(ConditionNode::and().condition(
            Condition::new(FieldRef::Field(AGE), Operator::Equal, Value::Int(age)),
        ));
        let range = Query::new(model.clone()).filter(ConditionNode::and().condition(
            Condition::new(
                FieldRef::Field(AGE),
                Operator::Between,
                (Value::Int(age), Value::Int(age + 2)),
            ),
        ));
        let top = Query::new(model.clone())
            .order_by(FieldRef::Field(SCORE), false)
            .limit(20);
        let ordered = Query::new(model.clone())
            .order_by(FieldRef::Field(AGE), true)
            .offset(100)
            .limit(20);
        let grouped = Query::new(model.clone()).aggregate(
            AggregateSpec::new()
                .group_by(FieldRef::Field(CITY))
                .function(AggFn::Count, FieldRef::Id)
                .function(AggFn::Max, FieldRef::Field(SCORE)),
        );
        for (name, query) in [
            ("query_eq", eq),
            ("query_range", range),
            ("query_top", top),
            ("query_ordered", ordered),
            ("query_group", grouped),
        ] {
            let now = Instant::now();
            engine.execute(&query)?;
            statistics.add(name, now.elapsed());
        }
    }
    statistics.display();
    writer.close()?;
    Ok(())
}

fn arg(matches: &ArgMatches, name: &str, default: usize) -> usize {
    matches.get_one::<usize>(name).copied().unwrap_or(default)
}

fn prepare_matches() -> ArgMatches {
    Command::new("benchmark")
        .arg(
            Arg::new("rows")
                .short('n')
                .long("rows")
                .value_parser(value_parser!(usize))
                .default_value("100000"),
        )
        .arg(
            Arg::new("queries")
                .short('q')
                .long("queries")
                .value_parser(value_parser!(usize))
                .default_value("100"),
        )
        .arg(
            Arg::new("delete_every")
                .short('d')
                .long("delete-every")
                .value_parser(value_parser!(usize))
                .default_value("10")
                .help("0 - no deletes"),
        )
        .arg(
            Arg::new("seed")
                .short('s')
                .long("seed")
                .value_parser(value_parser!(usize))
                .default_value("42"),
        )
        .arg(
            Arg::new("dst_dir")
                .long("dir")
                .value_parser(value_parser!(PathBuf))
                .default_value("/tmp"),
        )
        .get_matches()
}
