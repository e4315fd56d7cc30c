//! Tests for the room registry and code generation.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use tictactoe_rooms::codes::CodeGenerator;
use tictactoe_rooms::registry::{lock_room, RoomRegistry};
use tictactoe_rooms::room::Room;

#[test]
fn test_insert_then_lookup() {
    let registry = RoomRegistry::new();
    registry.insert(Room::new("ABC234".to_string())).unwrap();
    assert!(registry.contains("ABC234"));
    assert_eq!(registry.len(), 1);

    let shared = registry.get("ABC234").expect("room should exist");
    assert_eq!(lock_room(&shared).code, "ABC234");
    assert!(registry.get("ZZZ999").is_none());
}

#[test]
fn test_insert_rejects_code_collision() {
    let registry = RoomRegistry::new();
    registry.insert(Room::new("ABC234".to_string())).unwrap();
    let err = registry
        .insert(Room::new("ABC234".to_string()))
        .unwrap_err();
    assert_eq!(err.code, "ABC234");
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_remove_returns_the_room_once() {
    let registry = RoomRegistry::new();
    registry.insert(Room::new("ABC234".to_string())).unwrap();
    assert!(registry.remove("ABC234").is_some());
    assert!(registry.remove("ABC234").is_none());
    assert!(!registry.contains("ABC234"));
    assert!(registry.is_empty());
}

#[test]
fn test_all_codes_and_clear() {
    let registry = RoomRegistry::new();
    for code in ["AAAA", "BBBB", "CCCC"] {
        registry.insert(Room::new(code.to_string())).unwrap();
    }
    let codes: HashSet<_> = registry.all_codes().into_iter().collect();
    assert_eq!(codes.len(), 3);
    assert!(codes.contains("BBBB"));
    registry.clear();
    assert!(registry.is_empty());
}

#[test]
fn test_generate_until_unique_terminates_quickly() {
    // Simulates the create-room loop: draw, insert, redraw on collision.
    let registry = RoomRegistry::new();
    let generator = CodeGenerator::new("AB", 2);
    let mut rng = StdRng::seed_from_u64(5);
    let mut inserted = 0;
    // Only 4 codes exist over a 2-char binary alphabet; fill 3 of them.
    while inserted < 3 {
        let code = generator.generate(&mut rng);
        if registry.insert(Room::new(code)).is_ok() {
            inserted += 1;
        }
    }
    assert_eq!(registry.len(), 3);
}
