mod common;

use std::sync::Arc;

use serde_json::json;

use common::*;
use iglu_resolver::{
    Health, MemoryStore, Resolver, SchemaId, ValidationOutcome, build_registry,
    storage::REGISTRIES_KEY,
};

async fn open_with_specs(specs: Vec<iglu_resolver::RegistrySpec>) -> Resolver {
    let serialized: Vec<serde_json::Value> = specs
        .iter()
        .map(|spec| serde_json::to_value(spec).unwrap())
        .collect();
    let store = MemoryStore::with_entries([(
        REGISTRIES_KEY.to_string(),
        serde_json::Value::Array(serialized),
    )]);
    Resolver::open(Arc::new(store)).await.unwrap()
}

#[tokio::test]
async fn scenario_a_local_registry_wins_over_absent_static() {
    let mut resolver = open_with_specs(vec![
        local_spec(
            "Local Registry",
            vec![schema_doc("acme", "click_event", "1-0-0")],
        ),
        // Nothing listens here; the static candidate loses the race.
        static_spec("Example Static", "http://127.0.0.1:9/"),
    ])
    .await;

    let id = SchemaId::parse("iglu:acme/click_event/jsonschema/1-0-0").unwrap();
    let resolved = resolver.resolve(&id, &[]).await.unwrap();

    assert_eq!(resolved.id(), &id);
    assert_eq!(resolved.registry().spec().kind.tag(), "local");
}

#[tokio::test]
async fn scenario_b_missing_schema_is_not_found_and_status_stays_ok() {
    let mut resolver = open_with_specs(vec![local_spec(
        "Local Registry",
        vec![schema_doc("acme", "click_event", "1-0-0")],
    )])
    .await;

    let id = SchemaId::parse("iglu:acme/missing/jsonschema/9-9-9").unwrap();
    let err = resolver.resolve(&id, &[]).await.unwrap_err();
    assert!(err.is_not_found());

    assert_eq!(resolver.status().await, Health::Ok);
}

#[tokio::test]
async fn scenario_c_validation_reports_errors_and_success() {
    let mut resolver = open_with_specs(vec![local_spec(
        "Local Registry",
        vec![schema_doc("acme", "click_event", "1-0-0")],
    )])
    .await;

    let id = SchemaId::parse("iglu:acme/click_event/jsonschema/1-0-0").unwrap();
    let resolved = resolver.resolve(&id, &[]).await.unwrap();

    let bad = resolved.validate(&json!({ "x": "not a number" }));
    assert!(!bad.valid);
    assert!(!bad.errors.is_empty());

    let good = resolved.validate(&json!({ "x": 5 }));
    assert!(good.valid);
    assert!(good.errors.is_empty());
}

#[tokio::test]
async fn check_distinguishes_valid_invalid_and_unrecognised() {
    let mut resolver = open_with_specs(vec![local_spec(
        "Local Registry",
        vec![schema_doc("acme", "click_event", "1-0-0")],
    )])
    .await;

    let known = SchemaId::parse("iglu:acme/click_event/jsonschema/1-0-0").unwrap();
    let unknown = SchemaId::parse("iglu:acme/missing/jsonschema/1-0-0").unwrap();

    assert_eq!(
        resolver.check(&known, &json!({ "x": 1 })).await,
        ValidationOutcome::Valid
    );
    assert!(matches!(
        resolver.check(&known, &json!({ "x": "nope" })).await,
        ValidationOutcome::Invalid(errors) if !errors.is_empty()
    ));
    assert_eq!(
        resolver.check(&unknown, &json!({ "x": 1 })).await,
        ValidationOutcome::Unrecognised
    );
}

#[tokio::test]
async fn race_winner_is_one_of_the_claiming_registries() {
    // Two registries hold the schema, a third does not.
    let holder_a = build_registry(local_spec(
        "Holder A",
        vec![schema_doc("acme", "click_event", "1-0-0")],
    ))
    .unwrap();
    let holder_b = build_registry(local_spec(
        "Holder B",
        vec![schema_doc("acme", "click_event", "1-0-0")],
    ))
    .unwrap();
    let bystander = build_registry(local_spec(
        "Bystander",
        vec![schema_doc("acme", "page_view", "1-0-0")],
    ))
    .unwrap();
    let claimants = [holder_a.id(), holder_b.id()];

    let mut resolver = Resolver::from_registries(
        Arc::new(MemoryStore::new()),
        vec![holder_a, holder_b, bystander],
    );
    resolver.walk().await.unwrap();

    let id = SchemaId::parse("iglu:acme/click_event/jsonschema/1-0-0").unwrap();
    let hits = resolver.recorded_registries(&id).unwrap();
    assert_eq!(hits.len(), 2);

    let resolved = resolver.resolve(&id, &[]).await.unwrap();
    assert!(claimants.contains(&resolved.registry().id()));
}

#[tokio::test]
async fn walk_scopes_later_resolution_to_recorded_registries() {
    let holder = build_registry(local_spec(
        "Holder",
        vec![schema_doc("acme", "click_event", "1-0-0")],
    ))
    .unwrap();
    let probe = ProbeRegistry::new("Probe");

    let mut resolver = Resolver::from_registries(
        Arc::new(MemoryStore::new()),
        vec![holder, probe.clone()],
    );
    resolver.walk().await.unwrap();

    let id = SchemaId::parse("iglu:acme/click_event/jsonschema/1-0-0").unwrap();
    resolver.resolve(&id, &[]).await.unwrap();
    assert_eq!(probe.resolve_calls(), 0);

    // An identity without a hit-index entry consults everything again.
    let unknown = SchemaId::parse("iglu:acme/missing/jsonschema/1-0-0").unwrap();
    let _ = resolver.resolve(&unknown, &[]).await;
    assert_eq!(probe.resolve_calls(), 1);
}

#[tokio::test]
async fn cold_resolve_warms_the_hit_index_with_the_winner() {
    let holder = build_registry(local_spec(
        "Holder",
        vec![schema_doc("acme", "click_event", "1-0-0")],
    ))
    .unwrap();
    let probe = ProbeRegistry::new("Probe");

    let mut resolver = Resolver::from_registries(
        Arc::new(MemoryStore::new()),
        vec![holder.clone(), probe.clone()],
    );

    let id = SchemaId::parse("iglu:acme/click_event/jsonschema/1-0-0").unwrap();
    resolver.resolve(&id, &[]).await.unwrap();

    let hits = resolver.recorded_registries(&id).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id(), holder.id());

    // Second resolve stays inside the recorded entry.
    let before = probe.resolve_calls();
    resolver.resolve(&id, &[]).await.unwrap();
    assert_eq!(probe.resolve_calls(), before);
}

#[tokio::test]
async fn exclude_drops_registries_from_contention() {
    let holder = build_registry(local_spec(
        "Holder",
        vec![schema_doc("acme", "click_event", "1-0-0")],
    ))
    .unwrap();
    let holder_id = holder.id();

    let mut resolver =
        Resolver::from_registries(Arc::new(MemoryStore::new()), vec![holder]);

    let id = SchemaId::parse("iglu:acme/click_event/jsonschema/1-0-0").unwrap();
    assert!(resolver.resolve(&id, &[]).await.is_ok());

    let err = resolver.resolve(&id, &[holder_id]).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn vendor_prefixes_restrict_candidate_registries() {
    let scoped = build_registry(
        local_spec("Scoped", vec![schema_doc("org.other", "thing", "1-0-0")])
            .with_vendor_prefixes(["com.acme".to_string()]),
    )
    .unwrap();

    let mut resolver =
        Resolver::from_registries(Arc::new(MemoryStore::new()), vec![scoped]);

    // The registry holds the schema, but its vendor prefix excludes it
    // from contention for this vendor.
    let id = SchemaId::parse("iglu:org.other/thing/jsonschema/1-0-0").unwrap();
    let err = resolver.resolve(&id, &[]).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn walk_tolerates_individual_registry_failures() {
    let mut resolver = open_with_specs(vec![
        local_spec(
            "Local Registry",
            vec![
                schema_doc("acme", "click_event", "1-0-0"),
                schema_doc("acme", "page_view", "1-0-0"),
            ],
        ),
        // Both of these fail to enumerate; the walk must not care.
        static_spec("Dead Static", "http://127.0.0.1:9/"),
        iglu_server_spec("Dead Server", "http://127.0.0.1:9/", None),
    ])
    .await;

    let ids = resolver.walk().await.unwrap();
    assert_eq!(ids.len(), 2);
}

#[tokio::test]
async fn remove_prunes_hit_index_and_resolution_fails() {
    let holder = build_registry(local_spec(
        "Holder",
        vec![schema_doc("acme", "click_event", "1-0-0")],
    ))
    .unwrap();
    let holder_id = holder.id();
    let other = build_registry(local_spec("Other", vec![])).unwrap();

    let mut resolver =
        Resolver::from_registries(Arc::new(MemoryStore::new()), vec![holder, other]);
    resolver.walk().await.unwrap();

    let id = SchemaId::parse("iglu:acme/click_event/jsonschema/1-0-0").unwrap();
    assert!(resolver.resolve(&id, &[]).await.is_ok());

    let removed = resolver.remove(&[holder_id]);
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].id(), holder_id);

    assert!(resolver.recorded_registries(&id).is_none());
    let err = resolver.resolve(&id, &[]).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn remove_of_unknown_id_returns_empty() {
    let mut resolver = open_with_specs(vec![local_spec("Local Registry", vec![])]).await;
    let removed = resolver.remove(&[uuid::Uuid::new_v4()]);
    assert!(removed.is_empty());
}
