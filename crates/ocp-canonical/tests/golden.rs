use chrono::{TimeZone, Utc};
use ocp_canonical::{
    canonicalize, canonicalize_record, canonically_equal, encode, semantic_hash,
    semantic_hash_named, verify_semantic_hash, CanonicalizationError, Decimal, HashAlgorithm,
    HashError, Map, Record, Value,
};
use serde_json::json;
use uuid::Uuid;

fn make_record(value: serde_json::Value) -> Record {
    Record::from_json(value).unwrap()
}

#[test]
fn reordered_keys_share_canonical_form_and_digest() {
    let a = make_record(json!({"a": 1, "b": 2}));
    let b = make_record(json!({"b": 2, "a": 1}));

    assert_eq!(canonicalize_record(&a).unwrap().as_str(), r#"{"a":1,"b":2}"#);
    assert_eq!(canonicalize_record(&b).unwrap().as_str(), r#"{"a":1,"b":2}"#);

    let digest = semantic_hash(&a, HashAlgorithm::Sha256).unwrap();
    assert_eq!(digest, semantic_hash(&b, HashAlgorithm::Sha256).unwrap());
    assert_eq!(
        digest.hex,
        "43258cff783fe7036d8a43033f830adfc60ec037382473548ac742b888292777"
    );
}

#[test]
fn insertion_order_is_erased_at_every_level() {
    let mut inner_a = Map::new();
    inner_a.insert("z".into(), Value::from(1));
    inner_a.insert("m".into(), Value::from(2));
    let mut inner_b = Map::new();
    inner_b.insert("m".into(), Value::from(2));
    inner_b.insert("z".into(), Value::from(1));

    let mut a = Record::new();
    a.insert("outer", Value::Map(inner_a));
    a.insert("first", true);
    let mut b = Record::new();
    b.insert("first", true);
    b.insert("outer", Value::Map(inner_b));

    let form = canonicalize_record(&a).unwrap();
    assert_eq!(form, canonicalize_record(&b).unwrap());
    assert_eq!(form.as_str(), r#"{"first":true,"outer":{"m":2,"z":1}}"#);
}

#[test]
fn nested_structures_match_reference_vector() {
    let value = Value::from(json!({
        "z": [3, 1, 2],
        "a": {"c": 3, "a": 1, "b": {"f": 6, "d": 4, "e": 5}},
        "b": 2
    }));
    assert_eq!(
        canonicalize(&value).unwrap().as_str(),
        r#"{"a":{"a":1,"b":{"d":4,"e":5,"f":6},"c":3},"b":2,"z":[1,2,3]}"#
    );
}

#[test]
fn homogeneous_scalar_sequences_are_sorted() {
    let value = Value::from(json!({
        "words": ["pear", "apple", "fig"],
        "flags": [true, false, true],
        "mixed_numbers": [2.5, 1, 2]
    }));
    assert_eq!(
        canonicalize(&value).unwrap().as_str(),
        r#"{"flags":[false,true,true],"mixed_numbers":[1,2,2.5],"words":["apple","fig","pear"]}"#
    );
}

#[test]
fn ordered_collections_keep_their_order() {
    let value = Value::from(json!({
        "evidence": [{"ptr": "b"}, {"ptr": "a"}],
        "mixed": ["b", 1, "a"],
        "with_null": ["b", null, "a"]
    }));
    assert_eq!(
        canonicalize(&value).unwrap().as_str(),
        r#"{"evidence":[{"ptr":"b"},{"ptr":"a"}],"mixed":["b",1,"a"],"with_null":["b",null,"a"]}"#
    );
}

#[test]
fn decimal_and_float_canonicalize_differently() {
    let mut decimal = Record::new();
    decimal.insert("amount", Decimal::parse("123.45").unwrap());
    decimal.insert("precision_matters", true);

    let mut float = Record::new();
    float.insert("amount", 123.45);
    float.insert("precision_matters", true);

    let decimal_form = canonicalize_record(&decimal).unwrap();
    let float_form = canonicalize_record(&float).unwrap();
    assert_eq!(
        decimal_form.as_str(),
        r#"{"amount":"123.45","precision_matters":true}"#
    );
    assert_eq!(float_form.as_str(), r#"{"amount":123.45,"precision_matters":true}"#);

    let decimal_digest = semantic_hash(&decimal, HashAlgorithm::Sha256).unwrap();
    let float_digest = semantic_hash(&float, HashAlgorithm::Sha256).unwrap();
    assert_ne!(decimal_digest, float_digest);
    assert_eq!(
        decimal_digest.hex,
        "64ff9f359c9fcd2765b912e2c8ce02ce6bc2ddea4b71fb8fa4e3eeeff22c744a"
    );
    assert_eq!(
        float_digest.hex,
        "9e9ba7169ee82169ca77e7fe10cc0ee48f04cb6fb7122b40f4643090e1bc23df"
    );
}

#[test]
fn timestamps_and_identifiers_use_canonical_strings() {
    let id = Uuid::parse_str("550E8400-E29B-41D4-A716-446655440000").unwrap();
    let mut record = Record::new();
    record.insert("id", id);
    record.insert("at", Utc.with_ymd_and_hms(2025, 11, 24, 17, 55, 7).unwrap());

    assert_eq!(
        canonicalize_record(&record).unwrap().as_str(),
        r#"{"at":"2025-11-24T17:55:07Z","id":"550e8400-e29b-41d4-a716-446655440000"}"#
    );
}

#[test]
fn non_finite_numbers_are_rejected_with_their_path() {
    for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let mut inner = Map::new();
        inner.insert("score".into(), Value::Float(bad));
        let mut record = Record::new();
        record.insert("audit", Value::Map(inner));

        let err = canonicalize_record(&record).unwrap_err();
        assert_eq!(err, CanonicalizationError::NonFiniteNumber("audit.score".into()));
        assert!(matches!(
            semantic_hash(&record, HashAlgorithm::Sha256),
            Err(HashError::Canonicalization(_))
        ));
    }
}

#[test]
fn error_locations_name_keys_and_indexes() {
    let mut point = Map::new();
    point.insert("x".into(), Value::Float(f64::NAN));
    let mut record = Record::new();
    record.insert("points", Value::Seq(vec![Value::Integer(1), Value::Map(point)]));
    assert_eq!(
        canonicalize_record(&record).unwrap_err(),
        CanonicalizationError::NonFiniteNumber("points[1].x".into())
    );
}

#[test]
fn top_level_must_be_a_mapping() {
    assert_eq!(
        encode(&Value::from(json!([1, 2]))).unwrap_err(),
        CanonicalizationError::NotAMapping("sequence")
    );
    assert!(Record::from_json(json!("text")).is_err());
}

#[test]
fn excessive_nesting_is_rejected() {
    let mut value = Value::from(json!({"leaf": 1}));
    for _ in 0..200 {
        let mut map = Map::new();
        map.insert("n".into(), value);
        value = Value::Map(map);
    }
    assert!(matches!(
        canonicalize(&value),
        Err(CanonicalizationError::DepthExceeded { .. })
    ));
}

#[test]
fn canonical_text_has_no_insignificant_whitespace() {
    let value = Value::from(json!({"text": " padded ", "list": [" b", "a "]}));
    let form = canonicalize(&value).unwrap();
    assert_eq!(form.as_str(), r#"{"list":[" b","a "],"text":" padded "}"#);
    assert_eq!(form.as_str().trim(), form.as_str());
}

#[test]
fn single_leaf_change_changes_digest() {
    let original = make_record(json!({
        "action_id": "001-XYZ",
        "agent": "Claude-3",
        "claim": "The initial cost is $500",
        "evidence_ptr": "archive://0000001",
        "timestamp": 1700000000
    }));
    let mut modified = original.clone();
    modified.insert("claim", "The initial cost is $501");

    assert_ne!(
        semantic_hash(&original, HashAlgorithm::Sha256).unwrap(),
        semantic_hash(&modified, HashAlgorithm::Sha256).unwrap()
    );
}

#[test]
fn hashing_is_stable_across_calls_and_algorithms() {
    let record = make_record(json!({"action": "propose", "value": 42}));
    for alg in HashAlgorithm::ALL {
        let first = semantic_hash(&record, alg).unwrap();
        let second = semantic_hash(&record, alg).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.hex.len(), alg.hex_len());
        assert_eq!(first.hex, first.hex.to_lowercase());
    }
}

#[test]
fn sha3_digest_matches_reference_vector() {
    let record = make_record(json!({"b": 2, "a": 1}));
    let digest = semantic_hash_named(&record, "sha3-256").unwrap();
    assert_eq!(
        digest.prefixed(),
        "0x8d7e099adfa6c36d94857146f8eeb916ad3cbfd6cb24f6e6be4ecc36d366431c"
    );
}

#[test]
fn verify_accepts_prefix_and_case_but_nothing_else() {
    let record = make_record(json!({"action": "propose", "value": 42}));
    let digest = semantic_hash(&record, HashAlgorithm::Sha256).unwrap();

    assert!(verify_semantic_hash(&record, &digest.hex, HashAlgorithm::Sha256).unwrap());
    assert!(verify_semantic_hash(&record, &digest.prefixed(), HashAlgorithm::Sha256).unwrap());
    assert!(verify_semantic_hash(
        &record,
        &digest.hex.to_uppercase(),
        HashAlgorithm::Sha256
    )
    .unwrap());
    assert!(!verify_semantic_hash(&record, &digest.hex[..63], HashAlgorithm::Sha256).unwrap());

    let tampered = make_record(json!({"action": "propose", "value": 43}));
    assert!(!verify_semantic_hash(&tampered, &digest.hex, HashAlgorithm::Sha256).unwrap());
}

#[test]
fn unknown_algorithm_is_rejected() {
    let record = make_record(json!({"a": 1}));
    assert_eq!(
        semantic_hash_named(&record, "md5").unwrap_err(),
        HashError::UnsupportedAlgorithm("md5".into())
    );
    assert_eq!("SHA3_256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha3_256);
    assert_eq!("sha-256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
}

#[test]
fn canonical_equality_ignores_order_only() {
    let a = Value::from(json!({"z": 1, "a": 2}));
    let b = Value::from(json!({"a": 2, "z": 1}));
    let c = Value::from(json!({"a": 2, "z": 1.0}));
    assert!(canonically_equal(&a, &b));
    assert!(!canonically_equal(&a, &c));
}

#[test]
fn serializable_types_convert_through_json() {
    #[derive(serde::Serialize)]
    struct Entry {
        agent_id: &'static str,
        score: u32,
    }
    let record = Record::from_serialize(&Entry {
        agent_id: "agent:claude",
        score: 7,
    })
    .unwrap();
    assert_eq!(
        canonicalize_record(&record).unwrap().as_str(),
        r#"{"agent_id":"agent:claude","score":7}"#
    );
}
