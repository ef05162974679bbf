use std::collections::{BTreeMap, HashSet};

use tabula::{
    AggFn, AggValue, AggregateSpec, Condition, ConditionNode, Error, FieldRef, GroupKey, Kind,
    LinkObject, Linked, Operator, Query, QueryOutput, Row, Value,
};

mod common;

use common::*;

fn ids(rows: &[Row]) -> Vec<i64> {
    rows.iter().map(|row| row.id).collect()
}

fn live(rows: &[Vec<Value>], deleted: &HashSet<i64>) -> Vec<(i64, Vec<Value>)> {
    rows.iter()
        .cloned()
        .enumerate()
        .map(|(id, values)| (id as i64, values))
        .filter(|(id, _)| !deleted.contains(id))
        .collect()
}

fn int(value: &Value) -> i64 {
    value.as_i64().unwrap()
}

fn dbl(value: &Value) -> f64 {
    value.as_f64().unwrap()
}

#[test]
fn test_rows_skip_deleted() {
    let db = TestDb::new(vec![person()]);
    let table = db.table(&person());
    let rows = people(60, 3, 1);
    fill(&table, &rows);
    let deleted: HashSet<i64> = [0, 7, 8, 31, 59].into_iter().collect();
    for id in &deleted {
        table.delete(*id).unwrap();
    }
    let res = db.engine().rows(&Query::new(person())).unwrap();
    let expected: Vec<_> = live(&rows, &deleted).into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids(&res), expected);
    assert_eq!(res.len(), 55);
    for row in &res {
        assert_eq!(row.values(&person()).unwrap(), rows[row.id as usize]);
    }

    let res = db.engine().rows(&Query::new(person()).limit(0)).unwrap();
    assert!(res.is_empty());
    let res = db.engine().rows(&Query::new(person()).offset(50)).unwrap();
    assert_eq!(ids(&res), expected[50..].to_vec());
}

#[test]
fn test_reused_slots_keep_distinct_offsets() {
    let db = TestDb::new(vec![person()]);
    let table = db.table(&person());
    let rows = people(30, 3, 2);
    fill(&table, &rows);
    for id in [3, 4, 5, 20] {
        table.delete(id).unwrap();
    }
    let extra = people(6, 3, 3);
    let new_ids = fill(&table, &extra);
    assert_eq!(new_ids, vec![30, 31, 32, 33, 34, 35]);
    let entries = table.heap().live_entries(64).unwrap();
    let offsets: HashSet<_> = entries.iter().map(|(_, offset)| *offset).collect();
    assert_eq!(offsets.len(), entries.len());
    assert_eq!(entries.len(), 32);
    for (i, id) in new_ids.iter().enumerate() {
        assert_eq!(table.get(*id).unwrap(), extra[i]);
    }
}

#[test]
fn test_top_k_equals_full_sort() {
    let db = TestDb::new(vec![person()]);
    let table = db.table(&person());
    fill(&table, &people(150, 3, 4));
    for id in (0..150).step_by(9) {
        table.delete(id).unwrap();
    }
    let sorted = Query::new(person())
        .order_by(FieldRef::Field(CITY), true)
        .order_by(FieldRef::Field(SCORE), false);
    let full = db.engine().rows(&sorted).unwrap();
    let top = db
        .engine()
        .rows(&sorted.clone().offset(5).limit(12))
        .unwrap();
    assert_eq!(ids(&top), ids(&full[5..17]));

    let model = person();
    for pair in full.windows(2) {
        let a = (pair[0].value(&model, CITY).unwrap(), pair[0].value(&model, SCORE).unwrap());
        let b = (pair[1].value(&model, CITY).unwrap(), pair[1].value(&model, SCORE).unwrap());
        let city = a.0.as_str().unwrap().cmp(b.0.as_str().unwrap());
        assert!(city.is_lt() || (city.is_eq() && dbl(&a.1) >= dbl(&b.1)));
    }
}

#[test]
fn test_filter_matches_naive_evaluation() {
    let rows = people(200, 4, 5);
    let deleted: HashSet<i64> = (0..200).step_by(7).collect();
    let filter = ConditionNode::and()
        .condition(Condition::new(
            FieldRef::Field(AGE),
            Operator::Between,
            (Value::Int(25), Value::Int(40)),
        ))
        .child(
            ConditionNode::or()
                .condition(Condition::new(
                    FieldRef::Field(CITY),
                    Operator::IsIn,
                    vec![Value::from("oslo"), Value::from("rome")],
                ))
                .condition(Condition::new(
                    FieldRef::Field(SCORE),
                    Operator::Greater,
                    Value::Double(80.0),
                )),
        );
    let expected: Vec<_> = live(&rows, &deleted)
        .into_iter()
        .filter(|(_, v)| {
            let age = int(&v[AGE]);
            let city = v[CITY].as_str().unwrap();
            (25..=40).contains(&age) && (city == "oslo" || city == "rome" || dbl(&v[SCORE]) > 80.0)
        })
        .map(|(id, _)| id)
        .collect();
    assert!(!expected.is_empty());

    for ratio in [0.0, 1.0] {
        let db = TestDb::with_builder(vec![person()], |b| b.index_candidate_ratio(ratio));
        let table = db.table(&person());
        fill(&table, &rows);
        for id in &deleted {
            table.delete(*id).unwrap();
        }
        let res = db
            .engine()
            .rows(&Query::new(person()).filter(filter.clone()))
            .unwrap();
        assert_eq!(ids(&res), expected, "candidate ratio {}", ratio);
    }
}

#[test]
fn test_or_of_index_conditions() {
    let db = TestDb::new(vec![person()]);
    let table = db.table(&person());
    let rows = people(80, 4, 6);
    fill(&table, &rows);
    let filter = ConditionNode::or()
        .condition(Condition::new(FieldRef::Field(AGE), Operator::Equal, Value::Int(30)))
        .condition(Condition::new(
            FieldRef::Field(EMPLOYER),
            Operator::Equal,
            Value::Null,
        ))
        .index_condition(Condition::new(
            FieldRef::Id,
            Operator::IsIn,
            vec![Value::Int(1), Value::Int(2)],
        ));
    let expected: Vec<_> = rows
        .iter()
        .enumerate()
        .filter(|(id, v)| int(&v[AGE]) == 30 || v[EMPLOYER].is_null() || *id == 1 || *id == 2)
        .map(|(id, _)| id as i64)
        .collect();
    let res = db
        .engine()
        .rows(&Query::new(person()).filter(filter))
        .unwrap();
    assert_eq!(ids(&res), expected);
}

#[test]
fn test_id_and_regex_conditions() {
    let db = TestDb::new(vec![person()]);
    let table = db.table(&person());
    fill(&table, &people(40, 2, 7));
    table.delete(12).unwrap();
    let filter = ConditionNode::and()
        .condition(Condition::new(
            FieldRef::Id,
            Operator::Between,
            (Value::Int(10), Value::Int(1000)),
        ))
        .condition(Condition::new(
            FieldRef::Field(NAME),
            Operator::Regex,
            Value::from("^p1"),
        ));
    let res = db
        .engine()
        .rows(&Query::new(person()).filter(filter))
        .unwrap();
    assert_eq!(ids(&res), vec![10, 11, 13, 14, 15, 16, 17, 18, 19]);

    let filter = ConditionNode::and().condition(Condition::new(
        FieldRef::Field(NAME),
        Operator::IRegex,
        Value::from("^P3[5-9]$"),
    ));
    let res = db
        .engine()
        .rows(&Query::new(person()).filter(filter))
        .unwrap();
    assert_eq!(ids(&res), vec![35, 36, 37, 38, 39]);
}

#[test]
fn test_invalid_queries() {
    let db = TestDb::new(vec![person(), company()]);
    fill(&db.table(&person()), &people(5, 1, 8));
    let kind = |query: Query| {
        db.engine()
            .rows(&query)
            .unwrap_err()
            .downcast_ref::<Error>()
            .unwrap()
            .kind()
            .clone()
    };
    let bad_regex = ConditionNode::and().condition(Condition::new(
        FieldRef::Field(AGE),
        Operator::Regex,
        Value::from("1"),
    ));
    assert!(matches!(
        kind(Query::new(person()).filter(bad_regex)),
        Kind::InvalidOperator(_)
    ));
    let bad_between = ConditionNode::and().condition(Condition::new(
        FieldRef::Field(AGE),
        Operator::Between,
        Value::Int(3),
    ));
    assert!(matches!(
        kind(Query::new(person()).filter(bad_between)),
        Kind::InvalidOperator(_)
    ));
    let not_indexed = ConditionNode::and().index_condition(Condition::new(
        FieldRef::Field(SCORE),
        Operator::Equal,
        Value::Double(1.0),
    ));
    assert!(matches!(
        kind(Query::new(person()).filter(not_indexed)),
        Kind::InvalidOperator(_)
    ));
    assert!(matches!(
        kind(Query::new(company()).order_by(FieldRef::Field(1), true)),
        Kind::InvalidOperator(_)
    ));
    assert!(matches!(
        kind(Query::new(person()).order_by(FieldRef::Field(17), true)),
        Kind::UnknownField(_)
    ));
}

#[test]
fn test_ordered_index_scan() {
    let db = TestDb::new(vec![person()]);
    let table = db.table(&person());
    let rows = people(120, 3, 9);
    fill(&table, &rows);
    let deleted: HashSet<i64> = (0..120).step_by(5).collect();
    for id in &deleted {
        table.delete(*id).unwrap();
    }
    let mut ages: Vec<_> = live(&rows, &deleted)
        .iter()
        .map(|(_, v)| int(&v[AGE]))
        .collect();
    ages.sort_unstable();
    let model = person();
    let age_of = |row: &Row| int(&row.value(&model, AGE).unwrap());

    let query = Query::new(person())
        .order_by(FieldRef::Field(AGE), true)
        .offset(10)
        .limit(25);
    let res = db.engine().rows(&query).unwrap();
    assert_eq!(res.iter().map(age_of).collect::<Vec<_>>(), ages[10..35].to_vec());
    assert!(res.iter().all(|row| !deleted.contains(&row.id)));

    let res = db
        .engine()
        .rows(&Query::new(person()).order_by(FieldRef::Field(AGE), false))
        .unwrap();
    ages.reverse();
    assert_eq!(res.iter().map(age_of).collect::<Vec<_>>(), ages);
}

#[test]
fn test_aggregation_matches_naive_group_by() {
    let db = TestDb::new(vec![person()]);
    let table = db.table(&person());
    let rows = people(150, 3, 10);
    fill(&table, &rows);
    let deleted: HashSet<i64> = (0..150).step_by(4).collect();
    for id in &deleted {
        table.delete(*id).unwrap();
    }
    let only_active = ConditionNode::and().condition(Condition::new(
        FieldRef::Field(ACTIVE),
        Operator::Equal,
        Value::Bool(true),
    ));
    let query = Query::new(person()).filter(only_active).aggregate(
        AggregateSpec::new()
            .group_by(FieldRef::Field(CITY))
            .function(AggFn::Count, FieldRef::Id)
            .function(AggFn::Sum, FieldRef::Field(AGE))
            .function(AggFn::Min, FieldRef::Field(SCORE))
            .function(AggFn::Max, FieldRef::Field(EMPLOYER)),
    );
    let res = match db.engine().execute(&query).unwrap() {
        QueryOutput::Aggregate(res) => res,
        other => panic!("unexpected output {:?}", other),
    };

    let mut naive: BTreeMap<String, (i64, i64, f64, i64)> = BTreeMap::new();
    for (_, v) in live(&rows, &deleted) {
        if v[ACTIVE] != Value::Bool(true) {
            continue;
        }
        let acc = naive
            .entry(v[CITY].as_str().unwrap().to_owned())
            .or_insert((0, 0, f64::MAX, i64::MIN));
        acc.0 += 1;
        acc.1 += int(&v[AGE]);
        acc.2 = acc.2.min(dbl(&v[SCORE]));
        if !v[EMPLOYER].is_null() {
            acc.3 = acc.3.max(int(&v[EMPLOYER]));
        }
    }
    let expected: Vec<_> = naive
        .into_iter()
        .map(|(city, (count, sum, min, max))| {
            (
                Some(GroupKey::Str(city)),
                vec![
                    AggValue::Int(count),
                    AggValue::Int(sum),
                    AggValue::Double(min),
                    AggValue::Int(max),
                ],
            )
        })
        .collect();
    let actual: Vec<_> = res.into_iter().map(|r| (r.group, r.values)).collect();
    assert_eq!(actual, expected);

    let windowed = db
        .engine()
        .aggregate(&query.clone().offset(1).limit(2))
        .unwrap();
    assert_eq!(windowed.len(), 2);
    assert_eq!(windowed[0].group, actual[1].0);
}

#[test]
fn test_direct_and_virtual_links() {
    let db = TestDb::new(vec![person(), company()]);
    let companies = db.table(&company());
    for title in ["acme", "globex", "initech", "hooli", "umbrella"] {
        companies.insert(&[Value::from(title), Value::Null]).unwrap();
    }
    companies.delete(3).unwrap();
    let staff = db.table(&person());
    let rows = people(90, 5, 11);
    fill(&staff, &rows);
    let gone: HashSet<i64> = [2, 40, 41].into_iter().collect();
    for id in &gone {
        staff.delete(*id).unwrap();
    }

    let query = Query::new(person()).link(LinkObject::direct(EMPLOYER, Query::new(company())));
    let res = db.engine().joined(&query).unwrap();
    assert_eq!(res.len(), 87);
    for joined in &res {
        let employer = int(&rows[joined.row.id as usize][EMPLOYER]);
        match &joined.links[0] {
            Linked::Missing => assert!(employer == -1 || employer == 3),
            Linked::One(company) => assert_eq!(company.row.id, employer),
            other => panic!("direct link gave {:?}", other),
        }
    }

    let members = Query::new(person()).order_by(FieldRef::Id, true);
    let query = Query::new(company())
        .link(LinkObject::virtual_link(EMPLOYER, members).offset(1).limit(3));
    let res = match db.engine().execute(&query).unwrap() {
        QueryOutput::Joined(res) => res,
        other => panic!("unexpected output {:?}", other),
    };
    assert_eq!(
        res.iter().map(|j| j.row.id).collect::<Vec<_>>(),
        vec![0, 1, 2, 4]
    );
    for joined in &res {
        let expected: Vec<_> = live(&rows, &gone)
            .into_iter()
            .filter(|(_, v)| int(&v[EMPLOYER]) == joined.row.id)
            .map(|(id, _)| id)
            .skip(1)
            .take(3)
            .collect();
        let actual: Vec<_> = joined.links[0].rows().iter().map(|c| c.row.id).collect();
        assert_eq!(actual, expected, "company {}", joined.row.id);
    }
}

#[test]
fn test_nested_links() {
    let db = TestDb::new(vec![person(), company()]);
    let companies = db.table(&company());
    companies.insert(&[Value::from("acme"), Value::Null]).unwrap();
    companies.insert(&[Value::from("globex"), Value::Null]).unwrap();
    let staff = db.table(&person());
    let rows = people(20, 2, 12);
    fill(&staff, &rows);

    let employer = Query::new(company()).link(LinkObject::virtual_link(
        EMPLOYER,
        Query::new(person()).order_by(FieldRef::Id, true),
    ));
    let query = Query::new(person())
        .filter(ConditionNode::and().condition(Condition::new(
            FieldRef::Field(EMPLOYER),
            Operator::NotEqual,
            Value::Null,
        )))
        .link(LinkObject::direct(EMPLOYER, employer));
    for joined in db.engine().joined(&query).unwrap() {
        let company = match &joined.links[0] {
            Linked::One(company) => company,
            other => panic!("expected company, got {:?}", other),
        };
        let colleagues: Vec<_> = company.links[0].rows().iter().map(|c| c.row.id).collect();
        assert!(colleagues.contains(&joined.row.id));
        let expected: Vec<_> = rows
            .iter()
            .enumerate()
            .filter(|(_, v)| int(&v[EMPLOYER]) == company.row.id)
            .map(|(id, _)| id as i64)
            .collect();
        assert_eq!(colleagues, expected);
    }
}

#[test]
fn test_record_not_found_diagnostics() {
    let db = TestDb::new(vec![person()]);
    let table = db.table(&person());
    let err = table.get(0).unwrap_err();
    assert_eq!(
        err.to_string(),
        "record not found: no records exist in the table yet"
    );
    fill(&table, &people(2, 1, 13));
    let err = table.get(5).unwrap_err();
    assert_eq!(
        err.to_string(),
        "record not found: record id (5) is out of range, last inserted: 1"
    );
    table.delete(1).unwrap();
    let err = table.update(1, &people(1, 1, 14)[0]).unwrap_err();
    assert!(err
        .downcast_ref::<Error>()
        .unwrap()
        .is(&Kind::RecordNotFound(String::new())));
}
