// tests/property/framing_test.rs

//! Property-based tests for statement framing: however the byte stream is
//! cut into reads, the decoder yields the same statements in the same order.

use bytes::BytesMut;
use proptest::prelude::*;
use sigmadb::core::protocol::QueryCodec;
use sigmadb::core::query::{Statement, parse};
use tokio_util::codec::Decoder;

fn statement_text() -> impl Strategy<Value = String> {
    prop_oneof![
        (any::<i64>(), "[a-z ;,()]{0,12}")
            .prop_map(|(n, s)| format!("INSERT INTO t VALUES ({n}, '{s}');")),
        (-1000i64..1000).prop_map(|n| format!("SELECT * FROM t WHERE id >= {n};")),
        "[a-z;]{0,8}".prop_map(|s| format!("DELETE FROM t WHERE name = '{s}';")),
        Just("SHOW TABLES;".to_string()),
        Just("DESCRIBE t;".to_string()),
    ]
}

/// Feeds `input` to a fresh decoder in pieces cut at `cuts`.
fn decode_in_pieces(input: &[u8], cuts: &[usize]) -> Vec<Statement> {
    let mut codec = QueryCodec::default();
    let mut buffer = BytesMut::new();
    let mut statements = Vec::new();

    let mut bounds: Vec<usize> = cuts.iter().map(|c| c % (input.len() + 1)).collect();
    bounds.push(0);
    bounds.push(input.len());
    bounds.sort_unstable();
    bounds.dedup();

    for window in bounds.windows(2) {
        buffer.extend_from_slice(&input[window[0]..window[1]]);
        while let Some(item) = codec.decode(&mut buffer).unwrap() {
            statements.push(item.unwrap());
        }
    }
    assert!(codec.decode_eof(&mut buffer).unwrap().is_none());
    statements
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_fragmentation_does_not_change_statements(
        texts in prop::collection::vec(statement_text(), 1..=12),
        separators in prop::collection::vec("[ \n\t]{0,3}", 12),
        cuts in prop::collection::vec(any::<usize>(), 0..=24),
    ) {
        let mut input = String::new();
        for (text, sep) in texts.iter().zip(separators.iter().cycle()) {
            input.push_str(text);
            input.push_str(sep);
        }

        let expected = parse(&input).unwrap();
        prop_assert_eq!(expected.len(), texts.len());

        let decoded = decode_in_pieces(input.as_bytes(), &cuts);
        prop_assert_eq!(decoded, expected);
    }

    #[test]
    fn test_one_byte_at_a_time_matches_whole(
        texts in prop::collection::vec(statement_text(), 1..=6),
    ) {
        let input = texts.concat();
        let every_byte: Vec<usize> = (1..input.len()).collect();
        let whole = decode_in_pieces(input.as_bytes(), &[]);
        let split = decode_in_pieces(input.as_bytes(), &every_byte);
        prop_assert_eq!(split, whole);
    }

    #[test]
    fn test_unterminated_input_never_yields_a_statement(
        body in "[a-zA-Z0-9 ]{1,200}",
    ) {
        let mut codec = QueryCodec::new(4096);
        let mut buffer = BytesMut::from(body.as_bytes());
        prop_assert!(codec.decode(&mut buffer).unwrap().is_none());
    }

    #[test]
    fn test_buffer_cap_is_enforced(
        cap in 1usize..256,
        extra in 1usize..64,
    ) {
        let mut codec = QueryCodec::new(cap);
        let mut buffer = BytesMut::from("x".repeat(cap + extra).as_bytes());
        prop_assert!(codec.decode(&mut buffer).is_err());
    }
}
