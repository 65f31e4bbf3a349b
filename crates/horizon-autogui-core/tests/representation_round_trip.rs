//! Text and JSON round trips through the standard representation chain.

use std::path::PathBuf;
use std::sync::Arc;

use horizon_autogui_core::{
    Choice, ContextTree, EngineConfig, MappingContext, Representation, Shared, UpdateOutcome, Value, shared,
};
use horizon_autogui_macros::{Choice, Describe};

#[derive(Debug, Clone, Copy, PartialEq, Choice)]
enum Speed {
    Walk,
    Run,
}

#[derive(Describe)]
struct Sample {
    pub enabled: bool,
    pub small: u8,
    pub signed: i64,
    pub big: u64,
    pub ratio: f32,
    pub speed: Speed,
    pub file: PathBuf,
    pub tags: Vec<String>,
    pub counts: Vec<u64>,
}

fn sample() -> Shared<Sample> {
    shared(Sample {
        enabled: false,
        small: 3,
        signed: -4,
        big: 5,
        ratio: 0.5,
        speed: Speed::Walk,
        file: PathBuf::from("notes.txt"),
        tags: vec!["red".into()],
        counts: vec![1, 2],
    })
}

fn tree_for(object: Shared<Sample>) -> ContextTree {
    let tree = ContextTree::for_object(Arc::new(EngineConfig::default()), object).unwrap();
    tree.populate();
    tree
}

fn member(tree: &ContextTree, name: &str) -> Arc<MappingContext> {
    tree.root().member(name).unwrap()
}

/// Both the text and the JSON form of `value` read back to `value`.
fn assert_round_trip(context: &MappingContext, value: Value) {
    let text = context.to_display_string(&value);
    assert_eq!(
        context.from_display_string(&text).unwrap(),
        value,
        "{} via text {text:?}",
        context.name()
    );

    let representation = context.representation();
    let json = representation.to_json(context, &value).unwrap();
    assert_eq!(
        representation.from_json(context, &json),
        Some(value),
        "{} via json {json}",
        context.name()
    );
}

#[test]
fn test_scalar_members_resolve_and_round_trip() {
    let tree = tree_for(sample());
    let names: Vec<_> = ["enabled", "small", "big", "ratio", "speed", "file"]
        .into_iter()
        .map(|name| member(&tree, name).representation().name())
        .collect();
    assert_eq!(names, ["bool", "number", "number", "number", "enum", "file-path"]);

    let enabled = member(&tree, "enabled");
    assert_round_trip(&enabled, Value::Bool(true));
    assert_round_trip(&enabled, Value::Bool(false));

    let small = member(&tree, "small");
    assert_round_trip(&small, Value::Integer(0));
    assert_round_trip(&small, Value::Integer(255));

    let signed = member(&tree, "signed");
    assert_round_trip(&signed, Value::Integer(i64::MIN.into()));
    assert_round_trip(&signed, Value::Integer(i64::MAX.into()));

    let big = member(&tree, "big");
    assert_round_trip(&big, Value::Integer(u64::MAX.into()));
    assert_round_trip(&big, Value::Integer(i128::from(i64::MAX) + 1));
    assert_round_trip(&big, Value::Integer(0));

    let ratio = member(&tree, "ratio");
    assert_round_trip(&ratio, Value::Float(0.1_f32.into()));
    assert_round_trip(&ratio, Value::Float(-2.5));

    let speed = member(&tree, "speed");
    assert_round_trip(&speed, Speed::Run.to_enum_value());
    assert_round_trip(&speed, Value::Null);

    let file = member(&tree, "file");
    assert_round_trip(&file, Value::Path(PathBuf::from("/tmp/with space/ü.txt")));
}

#[test]
fn test_number_text_is_clamped_to_kind() {
    let tree = tree_for(sample());
    let small = member(&tree, "small");
    assert_eq!(small.from_display_string("300").unwrap(), Value::Integer(255));
    assert_eq!(small.from_display_string("2.9").unwrap(), Value::Integer(2));

    let big = member(&tree, "big");
    assert_eq!(big.from_display_string("-1").unwrap(), Value::Integer(0));
    assert_eq!(
        big.from_display_string("99999999999999999999").unwrap(),
        Value::Integer(u64::MAX.into())
    );
    assert!(member(&tree, "enabled").from_display_string("yes").is_err());
    assert!(member(&tree, "speed").from_display_string("Crawl").is_err());
}

#[test]
fn test_collection_table_round_trip() {
    let tree = tree_for(sample());
    let tags = member(&tree, "tags").children()[0].clone();
    let counts = member(&tree, "counts").children()[0].clone();
    assert_eq!(tags.representation().name(), "collection-table");

    assert_round_trip(
        &tags,
        Value::List(vec![Value::from("a, b"), Value::from("\"quoted\""), Value::from("")]),
    );
    assert_round_trip(&tags, Value::List(Vec::new()));
    assert_round_trip(
        &counts,
        Value::List(vec![Value::Integer(0), Value::Integer(u64::MAX.into())]),
    );

    assert_eq!(tags.to_display_string(&tags.source_value()), r#"["red"]"#);
    assert!(tags.from_display_string("red").is_err());
}

#[test]
fn test_u64_max_commit_is_lossless() {
    let object = sample();
    let tree = tree_for(object.clone());
    let big = member(&tree, "big");

    let max = Value::Integer(u64::MAX.into());
    let outcome = big.set_value_from_gui(max.clone(), big.clock()).unwrap();
    assert!(matches!(outcome, UpdateOutcome::Applied(_)));
    assert_eq!(object.read().big, u64::MAX);
    assert_eq!(big.source_value(), max);
    assert_eq!(big.history().first(), Some(&max));
    assert_eq!(big.to_display_string(&big.source_value()), u64::MAX.to_string());
}
