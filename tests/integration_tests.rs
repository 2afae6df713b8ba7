// Integration tests for PawfectMatch

use pawfect_match::core::Recommender;
use pawfect_match::models::{DiscoveryPreferences, PetProfile};
use pawfect_match::realtime::{ClientEvent, Hub, Room, ServerEvent};
use serde_json::{json, Value};
use uuid::Uuid;

fn create_test_pet(owner: &str, species: &str, age: u8, lat: f64, lon: f64, tags: &[&str]) -> PetProfile {
    PetProfile {
        pet_id: Uuid::new_v4(),
        owner_id: owner.to_string(),
        name: format!("{} of {}", species, owner),
        species: species.to_string(),
        breed: None,
        age_years: age,
        size: "medium".to_string(),
        intent: "playdate".to_string(),
        latitude: lat,
        longitude: lon,
        is_verified: true,
        is_active: true,
        photo_urls: vec![],
        description: None,
        personality_tags: tags.iter().map(|t| t.to_string()).collect(),
        created_at: None,
    }
}

fn create_test_preferences(lat: f64, lon: f64) -> DiscoveryPreferences {
    DiscoveryPreferences {
        user_id: "current_user".to_string(),
        species: vec!["dog".to_string()],
        sizes: vec![],
        intents: vec!["playdate".to_string()],
        min_age: 1,
        max_age: 9,
        preferred_tags: vec!["playful".to_string()],
        max_distance_km: 20,
        latitude: lat,
        longitude: lon,
    }
}

#[test]
fn test_integration_recommendations_pipeline() {
    let recommender = Recommender::with_default_weights();
    let preferences = create_test_preferences(52.52, 13.40); // Berlin

    let candidates = vec![
        create_test_pet("a", "dog", 4, 52.53, 13.41, &["playful"]), // close, shared tag
        create_test_pet("b", "dog", 5, 52.60, 13.50, &[]),          // further away
        create_test_pet("c", "cat", 4, 52.52, 13.40, &["playful"]), // wrong species
        create_test_pet("d", "dog", 14, 52.52, 13.40, &[]),         // too old
        create_test_pet("e", "dog", 4, 53.55, 9.99, &["playful"]),  // Hamburg, out of range
        create_test_pet("current_user", "dog", 4, 52.52, 13.40, &[]), // own pet
    ];
    let excluded = vec![];
    let query = recommender.candidate_query(&preferences, excluded, 100);

    let result = recommender.recommend(&preferences, &query, candidates, 10);

    assert_eq!(result.total_candidates, 6);
    let owners: Vec<&str> = result.pets.iter().map(|p| p.owner_id.as_str()).collect();
    assert_eq!(owners, vec!["a", "b"]);
    assert!(result.pets[0].match_score >= result.pets[1].match_score);
    assert_eq!(result.pets[0].shared_tags, vec!["playful".to_string()]);
}

#[test]
fn test_integration_excluded_pets_skipped() {
    let recommender = Recommender::with_default_weights();
    let preferences = create_test_preferences(52.52, 13.40);
    let skip = create_test_pet("a", "dog", 4, 52.53, 13.41, &[]);
    let keep = create_test_pet("b", "dog", 4, 52.53, 13.41, &[]);

    let query = recommender.candidate_query(&preferences, vec![skip.pet_id], 100);
    let result = recommender.recommend(&preferences, &query, vec![skip, keep.clone()], 10);

    assert_eq!(result.pets.len(), 1);
    assert_eq!(result.pets[0].pet_id, keep.pet_id);
}

#[test]
fn test_integration_client_wire_format() {
    let match_id = Uuid::new_v4();
    let raw = json!({
        "type": "send_message",
        "matchId": match_id,
        "content": "Park at 5?",
    })
    .to_string();

    match ClientEvent::parse(&raw).unwrap() {
        ClientEvent::SendMessage { match_id: id, content, reply_to, .. } => {
            assert_eq!(id, match_id);
            assert_eq!(content, "Park at 5?");
            assert!(reply_to.is_none());
        }
        other => panic!("unexpected event {:?}", other),
    }

    assert!(ClientEvent::parse(r#"{"type":"launch_rockets"}"#).is_err());
}

#[tokio::test]
async fn test_integration_hub_match_room_fanout() {
    let hub = Hub::new("node-a", 5);
    let match_id = Uuid::new_v4();

    let mut alice = hub.register("alice");
    let mut bob = hub.register("bob");
    let mut bob_tablet = hub.register("bob");
    assert!(alice.came_online);
    assert!(bob.came_online);
    assert!(!bob_tablet.came_online);

    for id in [alice.id, bob.id, bob_tablet.id] {
        hub.join(id, Room::Match(match_id));
    }

    let delivered = hub.emit(
        &Room::Match(match_id),
        &ServerEvent::MatchUpdated {
            match_id,
            action: "archive".to_string(),
        },
        Some(alice.id),
    );
    assert_eq!(delivered, 2);

    for rx in [&mut bob.receiver, &mut bob_tablet.receiver] {
        let frame: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["type"], "match_updated");
        assert_eq!(frame["data"]["action"], "archive");
    }
    assert!(alice.receiver.try_recv().is_err());

    let departure = hub.unregister(bob.id).unwrap();
    assert_eq!(departure.match_rooms, vec![match_id]);
    assert!(!departure.went_offline);
    assert!(hub.unregister(bob_tablet.id).unwrap().went_offline);
    assert_eq!(hub.room_size(&Room::Match(match_id)), 1);
}

#[tokio::test]
async fn test_integration_user_room_reaches_every_device() {
    let hub = Hub::new("node-a", 5);
    let mut phone = hub.register("carol");
    let mut laptop = hub.register("carol");

    let delivered = hub.emit_to_user("carol", &ServerEvent::error("hello"));
    assert_eq!(delivered, 2);
    assert!(phone.receiver.recv().await.is_some());
    assert!(laptop.receiver.recv().await.is_some());
    assert!(hub.is_user_reachable("carol").await);
    assert!(!hub.is_user_reachable("dave").await);
}
