// End-to-end pipeline tests over the public API: snapshot in, ranked
// response out.

use chrono::{DateTime, Duration, TimeZone, Utc};
use gourmet_ranking::models::FeatureTable;
use gourmet_ranking::{
    Category, FeatureVocabulary, Gourmet, Interaction, InteractionKind, Owner, RecommendConfig,
    RecommendSnapshot, Recommender,
};

fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
}

fn gourmet(id: i64, category: Option<i64>, age_days: i64) -> Gourmet {
    Gourmet {
        id,
        title: format!("dish-{id}"),
        category_id: category,
        cover: Some(format!("cover-{id}.jpg")),
        created_at: as_of() - Duration::days(age_days),
        owner_id: 500 + id,
    }
}

fn interaction(user: i64, item: i64, kind: InteractionKind, score: f64, age_days: i64) -> Interaction {
    Interaction {
        user_id: user,
        gourmet_id: item,
        kind,
        score,
        created_at: as_of() - Duration::days(age_days),
    }
}

fn snapshot(gourmets: Vec<Gourmet>, interactions: Vec<Interaction>) -> RecommendSnapshot {
    let vocab = FeatureVocabulary::new(1, vec!["spicy".into(), "sweet".into(), "sour".into()]);
    let owners = gourmets
        .iter()
        .map(|g| Owner {
            id: g.owner_id,
            name: format!("owner-{}", g.owner_id),
            avatar: Some(format!("avatar-{}.png", g.owner_id)),
        })
        .collect();
    RecommendSnapshot {
        as_of: as_of(),
        interactions,
        gourmets,
        features: FeatureTable::new(&vocab),
        categories: vec![
            Category { id: 1, name: "Sichuan".into() },
            Category { id: 2, name: "Cantonese".into() },
            Category { id: 3, name: "Dessert".into() },
        ],
        owners,
    }
}

/// A 12-item catalog across three categories, with user 7 leaning hard into
/// category 1 and background traffic from other users.
fn busy_snapshot() -> RecommendSnapshot {
    let gourmets: Vec<Gourmet> = (1..=12).map(|i| gourmet(i, Some(1 + (i - 1) % 3), i * 3)).collect();
    let mut interactions = Vec::new();
    // user 7: category 1 items are 1, 4, 7, 10
    for item in [1, 4, 7] {
        interactions.push(interaction(7, item, InteractionKind::Upvote, 0.0, 2));
        interactions.push(interaction(7, item, InteractionKind::View, 0.0, 3));
    }
    // background users give every item some views and ratings
    for item in 1..=12 {
        for user in 100..103 {
            interactions.push(interaction(user, item, InteractionKind::View, 0.0, 5));
        }
        interactions.push(interaction(200, item, InteractionKind::Rating, 4.0, 6));
    }
    snapshot(gourmets, interactions)
}

fn recommender_for(
    snapshot: RecommendSnapshot,
    seed: u64,
) -> Recommender<impl Fn() -> anyhow::Result<RecommendSnapshot>> {
    Recommender::with_seed(move || Ok(snapshot.clone()), RecommendConfig::default(), seed)
}

#[test]
fn test_response_is_bounded_and_fully_enriched() {
    let snap = busy_snapshot();
    let mut recommender = recommender_for(snap.clone(), 42);

    let response = recommender.recommend(7, 5);
    assert_eq!(response.user_id, 7);
    assert!(!response.recommended_gourmets.is_empty());
    assert!(response.recommended_gourmets.len() <= 5);

    for item in &response.recommended_gourmets {
        let id: i64 = item.id.parse().expect("numeric id");
        assert!(snap.contains_gourmet(id), "unknown item {id}");
        assert!(!item.title.is_empty());
        assert!(!item.category_name.is_empty());
        assert!(item.owner_name.starts_with("owner-"));
        assert!(item.create_time.starts_with("2026-"));
        let _views: usize = item.view_count.parse().expect("numeric view count");
    }

    // user 7 interacted with category 1 only
    assert_eq!(response.recommended_categories.first().map(String::as_str), Some("Sichuan"));
}

#[test]
fn test_same_seed_and_snapshot_reproduce_the_response() {
    let snap = busy_snapshot();
    let a = recommender_for(snap.clone(), 1234).recommend(7, 6);
    let b = recommender_for(snap, 1234).recommend(7, 6);

    let ids = |r: &gourmet_ranking::RecommendationResponse| {
        r.recommended_gourmets.iter().map(|g| g.id.clone()).collect::<Vec<_>>()
    };
    assert_eq!(ids(&a), ids(&b));
    assert_eq!(a.recommended_categories, b.recommended_categories);
}

#[test]
fn test_cold_user_still_gets_recommendations() {
    let mut recommender = recommender_for(busy_snapshot(), 5);
    let response = recommender.recommend(9999, 5);

    assert!(!response.recommended_gourmets.is_empty());
    assert!(response.recommended_gourmets.len() <= 5);
    // no personal signal: globally popular categories fill in
    assert!(!response.recommended_categories.is_empty());
}

#[test]
fn test_negative_feedback_never_surfaces() {
    let mut snap = busy_snapshot();
    // user 7 rated item 2 well below the negative threshold
    snap.interactions.push(interaction(7, 2, InteractionKind::Rating, 0.5, 1));

    let mut recommender = recommender_for(snap, 77);
    let response = recommender.recommend(7, 10);
    assert!(!response.recommended_gourmets.is_empty());
    assert!(
        response.recommended_gourmets.iter().all(|g| g.id != "2"),
        "negatively rated item was recommended"
    );
}

#[test]
fn test_empty_snapshot_degrades_to_empty_shape() {
    let empty = RecommendSnapshot {
        as_of: as_of(),
        interactions: vec![],
        gourmets: vec![],
        features: FeatureTable::default(),
        categories: vec![],
        owners: vec![],
    };
    let mut recommender = recommender_for(empty, 3);
    let response = recommender.recommend(7, 5);
    assert!(response.recommended_gourmets.is_empty());
    assert!(response.recommended_categories.is_empty());
}

#[test]
fn test_interaction_free_catalog_still_recommends() {
    // items and categories exist but nobody has interacted yet
    let snap = snapshot((1..=5).map(|i| gourmet(i, Some(1 + i % 3), i)).collect(), vec![]);
    let mut recommender = recommender_for(snap, 8);
    let response = recommender.recommend(7, 3);

    assert!(!response.recommended_gourmets.is_empty());
    assert!(response.recommended_gourmets.len() <= 3);
    // category list falls back to the catalog table
    assert_eq!(response.recommended_categories.first().map(String::as_str), Some("Sichuan"));
}

#[test]
fn test_content_features_feed_the_pipeline() {
    let mut snap = busy_snapshot();
    let vocab = FeatureVocabulary::new(2, vec!["spicy".into(), "sweet".into(), "sour".into()]);
    let mut features = FeatureTable::new(&vocab);
    for g in &snap.gourmets {
        // category 1 items skew spicy, the rest sweet
        let v = if g.category_id == Some(1) {
            vec![0.9, 0.1, 0.2]
        } else {
            vec![0.1, 0.8, 0.3]
        };
        features.insert(g.id, v);
    }
    snap.features = features;

    let mut recommender = recommender_for(snap, 21);
    let response = recommender.recommend(7, 5);
    assert!(!response.recommended_gourmets.is_empty());
    assert!(response.recommended_gourmets.len() <= 5);
}

#[test]
fn test_response_serializes_with_wire_field_names() {
    let mut recommender = recommender_for(busy_snapshot(), 11);
    let response = recommender.recommend(7, 2);

    let value = serde_json::to_value(&response).expect("serializable");
    let first = &value["recommended_gourmets"][0];
    for key in ["id", "title", "categoryName", "cover", "userAvatar", "userName", "createTime", "viewCount"] {
        assert!(first.get(key).is_some(), "missing field {key}");
    }
}
