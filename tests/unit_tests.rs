// Unit tests for Spark Match

use spark_match::core::scoring::compatibility_score;
use spark_match::core::tables::{self, INCOMPATIBLE};
use spark_match::core::{distance_between, haversine_distance};
use spark_match::models::Profile;

fn profile(
    id: &str,
    age: u8,
    gender: &str,
    interests: &[&str],
    needs: &[&str],
    location: Option<(f64, f64)>,
) -> Profile {
    Profile {
        user_id: id.to_string(),
        display_name: Some(format!("User {}", id)),
        age: Some(age),
        gender: Some(gender.to_string()),
        interests: interests.iter().map(|s| s.to_string()).collect(),
        needs: needs.iter().map(|s| s.to_string()).collect(),
        latitude: location.map(|(lat, _)| lat),
        longitude: location.map(|(_, lon)| lon),
        location_preference: None,
        avatar_file_id: None,
    }
}

#[test]
fn test_haversine_distance_zero() {
    let distance = haversine_distance(40.7128, -74.0060, 40.7128, -74.0060);
    assert!(distance < 0.01);
}

#[test]
fn test_haversine_distance_manhattan_to_brooklyn() {
    // Manhattan to Brooklyn is approximately 5-10 km
    let distance = haversine_distance(40.7580, -73.9855, 40.6782, -73.9442);
    assert!(distance > 5.0 && distance < 15.0);
}

#[test]
fn test_haversine_distance_nyc_to_la() {
    // Approximately 3944 km
    let distance = haversine_distance(40.7128, -74.0060, 34.0522, -118.2437);
    assert!((distance - 3944.0).abs() < 100.0, "Expected ~3944km, got {}", distance);
}

#[test]
fn test_distance_between_partial_coordinates() {
    assert!(distance_between(Some(40.0), Some(-74.0), None, None).is_none());
    let d = distance_between(Some(40.0), Some(-74.0), Some(40.0), Some(-74.0)).unwrap();
    assert!(d < 0.01);
}

#[test]
fn test_dating_pair_close_together_scores_high() {
    // User A (25, male, Dating) and user B (26, female, Dating), 2 km apart
    let a = profile("a", 25, "male", &["hiking"], &["Dating"], None);
    let b = profile("b", 26, "female", &["hiking"], &["Dating"], None);

    let score = compatibility_score(&a, &b, Some(2.0));
    let score_far = compatibility_score(&a, &b, Some(150.0));

    assert!(score > 0.0);
    // The very-close band must contribute: same pair further apart scores less
    assert!(score > score_far + 20.0);
}

#[test]
fn test_incompatible_relationship_types_reject() {
    // Both male, both only seeking a boyfriend, no gender-neutral need
    let a = profile("a", 25, "male", &[], &["Boyfriend"], None);
    let b = profile("b", 26, "male", &[], &["Boyfriend"], None);

    assert!(compatibility_score(&a, &b, None) < 0.0);
    assert_eq!(compatibility_score(&a, &b, None), INCOMPATIBLE);
}

#[test]
fn test_friendship_never_gated_on_gender() {
    let genders = ["male", "female", "non-binary"];
    for ga in genders {
        for gb in genders {
            let a = profile("a", 25, ga, &[], &["Friendship"], None);
            let b = profile("b", 26, gb, &[], &["Boyfriend", "Girlfriend"], None);
            assert!(
                compatibility_score(&a, &b, None) > INCOMPATIBLE,
                "friendship pair rejected for genders ({}, {})",
                ga,
                gb
            );
        }
    }
}

#[test]
fn test_score_symmetry_across_pairs() {
    let pairs = [
        (
            profile("a", 25, "male", &["hiking", "coffee"], &["Dating"], None),
            profile("b", 29, "female", &["hiking"], &["Relationship"], None),
        ),
        (
            profile("c", 31, "female", &["yoga"], &["Friendship"], None),
            profile("d", 40, "female", &["running", "yoga"], &["Casual"], None),
        ),
    ];

    for (x, y) in pairs {
        for distance in [None, Some(1.0), Some(75.0), Some(900.0)] {
            assert_eq!(
                compatibility_score(&x, &y, distance),
                compatibility_score(&y, &x, distance)
            );
        }
    }
}

#[test]
fn test_needs_matrix_symmetric() {
    for need_a in tables::RELATIONSHIP_NEEDS {
        for need_b in tables::RELATIONSHIP_NEEDS {
            assert_eq!(
                tables::needs_affinity(need_a, need_b),
                tables::needs_affinity(need_b, need_a)
            );
        }
    }
}

#[test]
fn test_reject_sentinel_is_strongly_negative() {
    // The sentinel must dominate any achievable bonus so a rejected pair can
    // never out-rank a valid one
    let a = profile(
        "a",
        25,
        "male",
        &["hiking", "coffee", "gaming", "music"],
        &["Boyfriend"],
        None,
    );
    let b = profile(
        "b",
        25,
        "male",
        &["hiking", "coffee", "gaming", "music"],
        &["Boyfriend"],
        None,
    );

    let score = compatibility_score(&a, &b, Some(0.5));
    assert!(score < -100.0);
}

#[test]
fn test_interest_overlap_raises_score() {
    let base = profile("a", 25, "female", &["hiking"], &["Friendship"], None);
    let none = profile("b", 25, "female", &[], &["Friendship"], None);
    let one = profile("c", 25, "female", &["hiking"], &["Friendship"], None);
    let many = profile(
        "d",
        25,
        "female",
        &["hiking", "camping", "climbing"],
        &["Friendship"],
        None,
    );

    let s_none = compatibility_score(&base, &none, None);
    let s_one = compatibility_score(&base, &one, None);
    let s_many = compatibility_score(&base, &many, None);

    assert!(s_one > s_none);
    assert!(s_many > s_none);
}

#[test]
fn test_international_preference_softens_distance() {
    let mut a = profile("a", 28, "female", &[], &["Dating"], None);
    let b = profile("b", 28, "male", &[], &["Dating"], None);

    let near_score = compatibility_score(&a, &b, Some(5.0));
    let far_score = compatibility_score(&a, &b, Some(3000.0));
    assert!(near_score > far_score);
    assert!(far_score < compatibility_score(&a, &b, None));

    a.location_preference = Some("International".to_string());
    let far_international = compatibility_score(&a, &b, Some(3000.0));
    assert!(far_international > far_score);
    assert!(far_international > compatibility_score(&a, &b, None));
}

#[test]
fn test_age_tolerance_table() {
    assert_eq!(tables::age_band_tolerance("strict"), Some(3));
    assert_eq!(tables::age_band_tolerance("moderate"), Some(7));
    assert_eq!(tables::age_band_tolerance("open"), Some(15));
    assert_eq!(tables::age_band_tolerance("any"), None);
}
