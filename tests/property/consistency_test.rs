// tests/property/consistency_test.rs

//! Property-based tests for data consistency
//! Tests that evaluation and log replay agree with a simple model

use proptest::prelude::*;
use sigmadb::QueryResult;
use sigmadb::config::LogFsync;
use sigmadb::core::engine;
use sigmadb::core::instance::{Instance, Value};
use sigmadb::core::query::parse_statement;

async fn run(instance: &mut Instance, text: &str) -> QueryResult {
    engine::evaluate(parse_statement(text).unwrap(), instance).await
}

fn row_count(result: &QueryResult) -> usize {
    match result {
        QueryResult::Relation { rows, .. } => rows.len(),
        other => panic!("expected a relation, got {other:?}"),
    }
}

#[derive(Debug, Clone)]
enum Op {
    Insert(i64, bool),
    DeleteBelow(i64),
    DeleteFlag(bool),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (-50i64..50, any::<bool>()).prop_map(|(n, b)| Op::Insert(n, b)),
        1 => (-50i64..50).prop_map(Op::DeleteBelow),
        1 => any::<bool>().prop_map(Op::DeleteFlag),
    ]
}

impl Op {
    fn text(&self) -> String {
        match self {
            Op::Insert(n, b) => format!("INSERT INTO t VALUES ({n}, {b});"),
            Op::DeleteBelow(n) => format!("DELETE FROM t WHERE n < {n};"),
            Op::DeleteFlag(b) => format!("DELETE FROM t WHERE flag = {b};"),
        }
    }

    fn apply(&self, model: &mut Vec<(i64, bool)>) -> usize {
        let before = model.len();
        match *self {
            Op::Insert(n, b) => {
                model.push((n, b));
                return 1;
            }
            Op::DeleteBelow(limit) => model.retain(|&(n, _)| n >= limit),
            Op::DeleteFlag(flag) => model.retain(|&(_, b)| b != flag),
        }
        before - model.len()
    }
}

fn as_model(rows: &[Vec<Value>]) -> Vec<(i64, bool)> {
    rows.iter()
        .map(|row| match (&row[0], &row[1]) {
            (Value::Int(n), Value::Bool(b)) => (*n, *b),
            other => panic!("unexpected row {other:?}"),
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 50, // Fewer cases for consistency tests
        max_shrink_iters: 500,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_filter_counts_match_model(
        values in prop::collection::vec(-100i64..100, 0..=60),
        threshold in -100i64..100,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mut instance = Instance::in_memory();
            run(&mut instance, "CREATE TABLE t (n INT);").await;
            for n in &values {
                run(&mut instance, &format!("INSERT INTO t VALUES ({n});")).await;
            }

            let select = format!("SELECT n FROM t WHERE n > {threshold};");
            let selected = run(&mut instance, &select).await;
            let expected = values.iter().filter(|&&n| n > threshold).count();
            assert_eq!(row_count(&selected), expected);

            let delete = format!("DELETE FROM t WHERE n > {threshold};");
            let deleted = run(&mut instance, &delete).await;
            assert_eq!(deleted, QueryResult::Ack(format!("DELETE {expected}")));
            assert_eq!(instance.relation("t").unwrap().len(), values.len() - expected);
        });
    }

    #[test]
    fn test_mutations_match_model_and_survive_replay(
        ops in prop::collection::vec(op(), 1..=40),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("sigma.log");
            let mut model = Vec::new();

            let mut instance = Instance::open(&path, LogFsync::No).await.unwrap();
            run(&mut instance, "CREATE TABLE t (n INT, flag BOOL);").await;
            for op in &ops {
                let affected = op.apply(&mut model);
                let verb = if matches!(op, Op::Insert(..)) { "INSERT" } else { "DELETE" };
                assert_eq!(
                    run(&mut instance, &op.text()).await,
                    QueryResult::Ack(format!("{verb} {affected}"))
                );
            }
            assert_eq!(as_model(instance.relation("t").unwrap().rows()), model);
            instance.close().await.unwrap();

            let reopened = Instance::open(&path, LogFsync::No).await.unwrap();
            assert_eq!(as_model(reopened.relation("t").unwrap().rows()), model);
            assert_eq!(reopened.committed(), ops.len() as u64 + 1);
        });
    }
}
