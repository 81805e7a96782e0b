use super::*;

fn key(route: &str, stop: &str) -> EntityKey {
    EntityKey::new(route.parse().expect("route"), StopId::new(stop))
}

fn brussels() -> Position {
    Position::new(50.85, 4.35)
}

#[test]
fn key_renders_route_and_current_stop() {
    assert_eq!(key("1.0", "A").to_string(), "1.0:A");
    assert_ne!(key("1.0", "A"), key("1.1", "A"));
}

#[test]
fn create_then_get_returns_entity() {
    let mut registry = EntityRegistry::new();
    registry
        .create(key("1.0", "A"), brussels(), VisualHandle(1))
        .expect("create");

    let entity = registry.get(&key("1.0", "A")).expect("entity");
    assert_eq!(entity.visual, VisualHandle(1));
    assert_eq!(entity.position, brussels());
    assert_eq!(registry.len(), 1);
}

#[test]
fn duplicate_create_overwrites_and_returns_displaced() {
    let mut registry = EntityRegistry::new();
    registry
        .create(key("1.0", "A"), brussels(), VisualHandle(1))
        .expect("create");

    let DuplicateKey { displaced } = registry
        .create(key("1.0", "A"), brussels(), VisualHandle(2))
        .expect_err("duplicate");
    assert_eq!(displaced.visual, VisualHandle(1));
    assert_eq!(
        registry.get(&key("1.0", "A")).map(|e| e.visual),
        Some(VisualHandle(2))
    );
    assert_eq!(registry.len(), 1);
}

#[test]
fn rekey_moves_entity_and_preserves_visual() {
    let mut registry = EntityRegistry::new();
    registry
        .create(key("1.0", "B"), brussels(), VisualHandle(7))
        .expect("create");

    let target = Position::new(50.87, 4.37);
    let rekeyed = registry
        .rekey(&key("1.0", "B"), key("1.0", "C"), Some(target))
        .expect("rekey");

    assert_eq!(rekeyed.visual, VisualHandle(7));
    assert!(rekeyed.displaced.is_none());
    assert!(!registry.contains(&key("1.0", "B")));
    let moved = registry.get(&key("1.0", "C")).expect("moved");
    assert_eq!(moved.visual, VisualHandle(7));
    assert_eq!(moved.position, target);
    assert_eq!(moved.key, key("1.0", "C"));
}

#[test]
fn rekey_without_position_keeps_last_known() {
    let mut registry = EntityRegistry::new();
    registry
        .create(key("1.0", "B"), brussels(), VisualHandle(7))
        .expect("create");

    registry
        .rekey(&key("1.0", "B"), key("1.0", "C"), None)
        .expect("rekey");
    assert_eq!(registry.get(&key("1.0", "C")).map(|e| e.position), Some(brussels()));
}

#[test]
fn rekey_from_unknown_key_is_not_found() {
    let mut registry = EntityRegistry::new();
    let err = registry
        .rekey(&key("1.0", "B"), key("1.0", "C"), None)
        .expect_err("missing");
    assert_eq!(err.0, key("1.0", "B"));
    assert_eq!(err.to_string(), "no entity tracked under 1.0:B");
    assert!(registry.is_empty());
}

#[test]
fn rekey_onto_occupied_key_hands_back_occupant() {
    let mut registry = EntityRegistry::new();
    registry
        .create(key("1.0", "B"), brussels(), VisualHandle(1))
        .expect("create");
    registry
        .create(key("1.0", "C"), brussels(), VisualHandle(2))
        .expect("create");

    let rekeyed = registry
        .rekey(&key("1.0", "B"), key("1.0", "C"), None)
        .expect("rekey");
    assert_eq!(rekeyed.displaced.map(|e| e.visual), Some(VisualHandle(2)));
    assert_eq!(registry.len(), 1);
}

#[test]
fn retiring_twice_is_harmless() {
    let mut registry = EntityRegistry::new();
    registry
        .create(key("1.0", "C"), brussels(), VisualHandle(3))
        .expect("create");

    let retired = registry.retire(&key("1.0", "C")).expect("retire");
    assert_eq!(retired.visual, VisualHandle(3));
    assert!(matches!(
        registry.retire(&key("1.0", "C")),
        Err(NotFound(_))
    ));
    assert!(registry.is_empty());
}
