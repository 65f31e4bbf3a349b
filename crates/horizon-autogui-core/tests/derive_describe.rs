//! Integration tests for the #[derive(Describe)], #[derive(Choice)], and
//! #[actions] macros.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use horizon_autogui_core::{
    AccessError, Choice, ContextTree, Describe, ElementKind, EngineConfig, HostValue, InclusionPolicy, Shared,
    TypeModel, Value, ValueType, Visibility, shared,
};
use horizon_autogui_macros::{Choice, Describe, actions};

#[derive(Debug, Clone, Copy, PartialEq, Choice)]
enum Quality {
    Low,
    Medium,
    High,
}

#[derive(Describe)]
struct Settings {
    #[autogui(index = 1)]
    pub volume: u8,
    #[autogui(index = 0, display_name = "Player Name", description = "Shown in the lobby")]
    pub player: String,
    pub quality: Quality,
    pub(crate) internal: bool,
    secret: String,
    #[autogui(read_only)]
    pub build: u32,
    #[autogui(skip)]
    pub cache: HashMap<String, String>,
    #[autogui(opaque)]
    pub started: Instant,
    pub _padding: u8,
}

fn settings() -> Settings {
    Settings {
        volume: 40,
        player: "ada".into(),
        quality: Quality::Medium,
        internal: false,
        secret: "hunter2".into(),
        build: 7,
        cache: HashMap::new(),
        started: Instant::now(),
        _padding: 0,
    }
}

fn member_names(policy: InclusionPolicy) -> Vec<String> {
    let mut model = TypeModel::new(policy);
    let root = model.describe::<Settings>();
    model.children(root).iter().map(|id| model[*id].name.clone()).collect()
}

#[test]
fn test_describe_lists_all_but_skipped_fields() {
    let info = Settings::describe();
    let names: Vec<&str> = info.members().iter().map(|m| m.name.as_str()).collect();
    assert_eq!(
        names,
        ["volume", "player", "quality", "internal", "secret", "build", "started", "_padding"]
    );

    let player = info.member("player").unwrap();
    assert!(player.attrs.annotated);
    assert_eq!(player.attrs.index, Some(0));
    assert_eq!(player.attrs.display_name.as_deref(), Some("Player Name"));
    assert_eq!(player.attrs.description.as_deref(), Some("Shown in the lobby"));
    assert_eq!(player.visibility, Visibility::Public);

    assert!(!info.member("quality").unwrap().attrs.annotated);
    assert_eq!(info.member("internal").unwrap().visibility, Visibility::Crate);
    assert_eq!(info.member("secret").unwrap().visibility, Visibility::Private);
    assert!(info.member("build").unwrap().attrs.read_only);
    assert!(matches!(info.member("started").unwrap().value_type, ValueType::Opaque(_)));
}

#[test]
fn test_relaxed_inclusion_orders_indexed_first() {
    let names = member_names(InclusionPolicy::default());
    assert_eq!(names, ["player", "volume", "quality", "build"]);
}

#[test]
fn test_relaxed_inclusion_with_crate_visible() {
    let names = member_names(InclusionPolicy::Relaxed {
        include_crate_visible: true,
    });
    assert_eq!(names, ["player", "volume", "quality", "internal", "build"]);
}

#[test]
fn test_strict_inclusion_only_annotated() {
    let names = member_names(InclusionPolicy::Strict);
    assert_eq!(names, ["player", "volume", "build"]);
}

#[test]
fn test_choice_derive() {
    assert_eq!(Quality::INFO.variants, &["Low", "Medium", "High"]);
    assert!(Quality::INFO.type_name.ends_with("Quality"));
    assert_eq!(Quality::High.variant_name(), "High");
    assert_eq!(Quality::from_variant_name("Low"), Some(Quality::Low));
    assert_eq!(Quality::from_variant_name("Ultra"), None);

    assert!(matches!(Quality::value_type(), ValueType::Enum(info) if info == Quality::INFO));
    let value = Quality::Medium.to_value();
    assert_eq!(Quality::from_value(value).unwrap(), Quality::Medium);
    assert_eq!(Quality::from_value(Value::from("High")).unwrap(), Quality::High);
    assert!(Quality::from_value(Value::from("Ultra")).is_err());
}

#[test]
fn test_derived_members_through_context_tree() {
    let object = shared(settings());
    let tree = ContextTree::for_object(Arc::new(EngineConfig::default()), object.clone()).unwrap();
    tree.populate();
    let root = tree.root();

    let player = root.member("player").unwrap();
    assert_eq!(player.display_name(), "Player Name");
    assert_eq!(player.source_value(), Value::from("ada"));

    let quality = root.member("quality").unwrap();
    assert_eq!(quality.representation().name(), "enum");
    quality.set_value_from_gui(Value::from("High"), quality.clock()).unwrap();
    assert_eq!(object.read().quality, Quality::High);

    let build = root.member("build").unwrap();
    assert!(!build.is_editable());
    assert!(build.set_value_from_gui(Value::Integer(8), build.clock()).is_err());
    assert_eq!(object.read().build, 7);
}

#[derive(Describe)]
struct Item {
    pub label: String,
    pub price: f64,
}

#[derive(Describe)]
#[autogui(display_name = "Shopping List", actions)]
struct Basket {
    pub items: Vec<Shared<Item>>,
    pub total: f64,
}

#[actions]
impl Basket {
    #[action(accelerator = "ctrl N", selection_updater)]
    pub fn add(&mut self) -> Shared<Item> {
        let item = shared(Item {
            label: format!("item {}", self.items.len()),
            price: 10.0,
        });
        self.items.push(item.clone());
        self.total = self.sum();
        item
    }

    #[action(selection_target = "items", display_name = "Half Price")]
    pub fn discount(&mut self, selected: Vec<Shared<Item>>) -> Result<usize, String> {
        if selected.is_empty() {
            return Err("nothing selected".into());
        }
        for item in &selected {
            item.write().price /= 2.0;
        }
        self.total = self.sum();
        Ok(selected.len())
    }

    #[action]
    pub fn clear(&mut self) {
        self.items.clear();
        self.total = 0.0;
    }

    pub fn sum(&self) -> f64 {
        self.items.iter().map(|item| item.read().price).sum()
    }
}

fn basket() -> Shared<Basket> {
    shared(Basket {
        items: vec![
            shared(Item {
                label: "apple".into(),
                price: 2.0,
            }),
            shared(Item {
                label: "pear".into(),
                price: 3.0,
            }),
        ],
        total: 5.0,
    })
}

#[test]
fn test_actions_follow_fields() {
    let info = Basket::describe();
    let names: Vec<&str> = info.members().iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["items", "total", "add", "discount", "clear"]);
    assert_eq!(info.display_name.as_deref(), Some("Shopping List"));

    let add = info.member("add").unwrap();
    assert!(add.attrs.annotated);
    assert!(add.attrs.selection_updater);
    assert_eq!(add.attrs.accelerator.as_deref(), Some("ctrl N"));
    assert!(!info.member("items").unwrap().attrs.annotated);
}

#[test]
fn test_list_action_needs_matching_collection() {
    let mut model = TypeModel::new(InclusionPolicy::default());
    let root = model.describe::<Basket>();
    let discount = model
        .children(root)
        .iter()
        .map(|id| &model[*id])
        .find(|element| element.name == "discount")
        .unwrap();
    assert_eq!(discount.kind, ElementKind::ActionList);
    assert_eq!(discount.display_name, "Half Price");

    // Strict mode drops the collection, so the list action has nothing to bind to
    let mut strict = TypeModel::new(InclusionPolicy::Strict);
    let root = strict.describe::<Basket>();
    let names: Vec<String> = strict.children(root).iter().map(|id| strict[*id].name.clone()).collect();
    assert_eq!(names, ["add", "clear"]);
}

#[test]
fn test_actions_update_selection_and_totals() {
    let object = basket();
    let tree = ContextTree::for_object(Arc::new(EngineConfig::default()), object.clone()).unwrap();
    tree.populate();
    let root = tree.root();
    let items = root.member("items").unwrap();
    let table = items
        .children()
        .iter()
        .find(|c| c.kind() == ElementKind::Collection)
        .cloned()
        .unwrap();

    let add = root.member("add").unwrap();
    add.invoke_action().unwrap();
    assert_eq!(table.row_count(), 3);
    assert_eq!(table.selection(), vec![2]);
    assert_eq!(root.member("total").unwrap().source_value(), Value::Float(15.0));

    let discount = root.member("discount").unwrap();
    assert_eq!(discount.invoke_action().unwrap(), Value::Integer(1));
    assert_eq!(object.read().items[2].read().price, 5.0);
    assert_eq!(root.member("total").unwrap().source_value(), Value::Float(10.0));

    table.set_selection(Vec::new());
    assert_eq!(
        discount.invoke_action().unwrap_err(),
        AccessError::Host("nothing selected".into())
    );

    root.member("clear").unwrap().invoke_action().unwrap();
    assert_eq!(table.row_count(), 0);
    assert!(object.read().items.is_empty());
}
