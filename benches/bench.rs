// Criterion benchmarks for PawfectMatch

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pawfect_match::core::{distance::haversine_distance, Recommender};
use pawfect_match::models::{DiscoveryPreferences, PetProfile};
use pawfect_match::realtime::{Hub, Room, ServerEvent};
use uuid::Uuid;

const TAGS: [&str; 4] = ["playful", "calm", "curious", "loyal"];

fn create_candidate(id: usize, lat: f64, lon: f64) -> PetProfile {
    PetProfile {
        pet_id: Uuid::new_v4(),
        owner_id: format!("owner-{}", id),
        name: format!("Pet {}", id),
        species: if id % 3 == 0 { "cat" } else { "dog" }.to_string(),
        breed: None,
        age_years: (id % 12) as u8,
        size: "medium".to_string(),
        intent: "playdate".to_string(),
        latitude: lat,
        longitude: lon,
        is_verified: id % 4 == 0,
        is_active: true,
        photo_urls: vec![],
        description: None,
        personality_tags: vec![TAGS[id % TAGS.len()].to_string()],
        created_at: None,
    }
}

fn create_preferences() -> DiscoveryPreferences {
    DiscoveryPreferences {
        user_id: "current_user".to_string(),
        species: vec!["dog".to_string()],
        sizes: vec![],
        intents: vec![],
        min_age: 1,
        max_age: 10,
        preferred_tags: vec!["playful".to_string(), "loyal".to_string()],
        max_distance_km: 50,
        latitude: 52.52,
        longitude: 13.40,
    }
}

fn bench_haversine_distance(c: &mut Criterion) {
    c.bench_function("haversine_distance", |b| {
        b.iter(|| haversine_distance(black_box(52.52), black_box(13.40), black_box(52.39), black_box(13.06)));
    });
}

fn bench_recommendations(c: &mut Criterion) {
    let recommender = Recommender::with_default_weights();
    let preferences = create_preferences();

    let mut group = c.benchmark_group("recommendations");

    for candidate_count in [10, 100, 500, 1000].iter() {
        let candidates: Vec<PetProfile> = (0..*candidate_count)
            .map(|i| {
                let offset = (i as f64 * 0.001) % 0.4;
                create_candidate(i, 52.52 + offset, 13.40 - offset)
            })
            .collect();
        let query = recommender.candidate_query(&preferences, vec![], candidate_count * 5);

        group.bench_with_input(BenchmarkId::new("recommend", candidate_count), candidate_count, |b, _| {
            b.iter(|| {
                recommender.recommend(
                    black_box(&preferences),
                    black_box(&query),
                    black_box(candidates.clone()),
                    black_box(20),
                )
            });
        });
    }

    group.finish();
}

fn bench_hub_emit(c: &mut Criterion) {
    let mut group = c.benchmark_group("hub_emit");

    for members in [2, 50, 500].iter() {
        let hub = Hub::new("bench", 5);
        let match_id = Uuid::new_v4();
        let mut registrations: Vec<_> = (0..*members)
            .map(|i| {
                let reg = hub.register(&format!("user-{}", i));
                hub.join(reg.id, Room::Match(match_id));
                reg
            })
            .collect();
        let event = ServerEvent::MatchUpdated {
            match_id,
            action: "archive".to_string(),
        };

        group.bench_with_input(BenchmarkId::new("match_room", members), members, |b, _| {
            b.iter(|| {
                let delivered = hub.emit(black_box(&Room::Match(match_id)), black_box(&event), None);
                // drained each round so queues stay bounded
                for reg in registrations.iter_mut() {
                    while reg.receiver.try_recv().is_ok() {}
                }
                delivered
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_haversine_distance, bench_recommendations, bench_hub_emit);

criterion_main!(benches);
