//! Fixed lookup data for the compatibility scorer and candidate discovery.
//!
//! These are tuning tables, not logic: the scorer reads them but never
//! hardcodes their contents, so weights and vocabularies can be swapped
//! without touching the scoring code.

/// Sentinel returned by the scorer for a hard incompatibility
pub const INCOMPATIBLE: f64 = -1000.0;

/// The orientation-neutral need
pub const FRIENDSHIP_NEED: &str = "friendship";

/// Gender-neutral relationship-seeking needs
pub const NEUTRAL_RELATIONSHIP_NEEDS: &[&str] = &["dating", "relationship", "casual"];

/// All relationship-seeking needs, gender-specific included
pub const RELATIONSHIP_NEEDS: &[&str] =
    &["boyfriend", "girlfriend", "dating", "relationship", "casual"];

/// Points per exact shared interest
pub const EXACT_INTEREST_POINTS: f64 = 5.0;

/// Flat bonus once this many interest categories are shared
pub const SHARED_CATEGORY_THRESHOLD: usize = 3;
pub const SHARED_CATEGORY_BONUS: f64 = 10.0;

/// Scale applied to the normalized needs-affinity sum
pub const NEEDS_SCALE: f64 = 12.0;

/// Interest vocabulary grouped into categories
pub const INTEREST_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "music",
        &["music", "concerts", "singing", "guitar", "piano", "dj", "vinyl"],
    ),
    (
        "sports",
        &[
            "football", "soccer", "basketball", "tennis", "gym", "running", "swimming",
            "cycling", "climbing", "yoga",
        ],
    ),
    (
        "outdoors",
        &["hiking", "camping", "fishing", "surfing", "skiing", "nature", "travel"],
    ),
    (
        "gaming",
        &["gaming", "video games", "board games", "chess", "esports"],
    ),
    (
        "arts",
        &[
            "art", "painting", "photography", "drawing", "theatre", "museums", "writing",
            "poetry",
        ],
    ),
    (
        "food",
        &["cooking", "baking", "coffee", "wine", "foodie", "restaurants"],
    ),
    (
        "tech",
        &["programming", "coding", "technology", "ai", "startups", "crypto"],
    ),
    (
        "wellness",
        &["meditation", "mindfulness", "fitness", "wellness", "spirituality"],
    ),
    (
        "culture",
        &["movies", "reading", "anime", "languages", "podcasts", "history"],
    ),
    (
        "social",
        &["parties", "dancing", "volunteering", "karaoke", "festivals"],
    ),
];

/// Per-category weights added once per category both sides touch
pub const CATEGORY_WEIGHTS: &[(&str, f64)] = &[
    ("music", 2.0),
    ("sports", 2.5),
    ("outdoors", 2.5),
    ("gaming", 1.5),
    ("arts", 2.0),
    ("food", 1.5),
    ("tech", 1.5),
    ("wellness", 2.0),
    ("culture", 2.0),
    ("social", 1.0),
];

/// Pairwise affinity between normalized needs
///
/// Symmetric by construction: lookups try both orders. Pairs absent from the
/// table contribute nothing.
pub const NEEDS_AFFINITY: &[(&str, &str, f64)] = &[
    ("friendship", "friendship", 1.0),
    ("friendship", "dating", 0.2),
    ("friendship", "relationship", 0.2),
    ("friendship", "casual", 0.3),
    ("friendship", "boyfriend", 0.2),
    ("friendship", "girlfriend", 0.2),
    ("dating", "dating", 1.0),
    ("dating", "relationship", 0.8),
    ("dating", "casual", 0.6),
    ("dating", "boyfriend", 0.7),
    ("dating", "girlfriend", 0.7),
    ("relationship", "relationship", 1.0),
    ("relationship", "casual", 0.3),
    ("relationship", "boyfriend", 0.9),
    ("relationship", "girlfriend", 0.9),
    ("casual", "casual", 1.0),
    ("casual", "boyfriend", 0.4),
    ("casual", "girlfriend", 0.4),
    ("boyfriend", "girlfriend", 1.0),
    ("boyfriend", "boyfriend", 0.8),
    ("girlfriend", "girlfriend", 0.8),
];

/// Age-difference bands: (max difference, bonus)
pub const AGE_BANDS: &[(u8, f64)] = &[(1, 15.0), (3, 10.0), (5, 6.0), (10, 3.0)];

/// Distance bands: (max km, bonus), checked in order
pub const DISTANCE_BANDS: &[(f64, f64)] = &[(2.0, 25.0), (10.0, 15.0), (50.0, 8.0), (200.0, 2.0)];

/// Penalty beyond the last distance band
pub const FAR_PENALTY: f64 = -10.0;

/// Replacement for the far penalty when either side is international
pub const INTERNATIONAL_FAR_BONUS: f64 = 5.0;

/// Multiplier on a non-negative location bonus when either side seeks friendship
pub const FRIENDSHIP_PROXIMITY_MULTIPLIER: f64 = 1.5;

/// Expanding-circle radius ladders in km
pub const FRIENDSHIP_RADII_KM: &[f64] = &[5.0, 10.0, 25.0, 50.0];
pub const RELATIONSHIP_RADII_KM: &[f64] = &[10.0, 25.0, 50.0, 100.0, 250.0];
pub const INTERNATIONAL_RADII_KM: &[f64] = &[50.0, 250.0, 1000.0, 5000.0];

/// Candidate counts at which the expanding search stops early
pub const FRIENDSHIP_CANDIDATE_TARGET: usize = 8;
pub const RELATIONSHIP_CANDIDATE_TARGET: usize = 5;

/// Allowed age difference for a named flexibility level; `None` = unrestricted
pub fn age_band_tolerance(level: &str) -> Option<u8> {
    match level.to_lowercase().as_str() {
        "strict" => Some(3),
        "moderate" => Some(7),
        "open" => Some(15),
        "any" => None,
        _ => Some(7),
    }
}

/// Category of a single interest, if it appears in the vocabulary
pub fn interest_category(interest: &str) -> Option<&'static str> {
    let needle = interest.to_lowercase();
    INTEREST_CATEGORIES
        .iter()
        .find(|(_, members)| members.contains(&needle.as_str()))
        .map(|(category, _)| *category)
}

/// Weight for a category name
pub fn category_weight(category: &str) -> f64 {
    CATEGORY_WEIGHTS
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, weight)| *weight)
        .unwrap_or(0.0)
}

/// Affinity between two normalized needs, order-independent
pub fn needs_affinity(a: &str, b: &str) -> f64 {
    NEEDS_AFFINITY
        .iter()
        .find(|(x, y, _)| (*x == a && *y == b) || (*x == b && *y == a))
        .map(|(_, _, affinity)| *affinity)
        .unwrap_or(0.0)
}

/// True if the normalized needs list includes the friendship need
pub fn seeks_friendship(needs: &[String]) -> bool {
    needs
        .iter()
        .any(|n| n.eq_ignore_ascii_case(FRIENDSHIP_NEED))
}

/// The relationship-seeking subset of a needs list, lowercased
pub fn relationship_needs(needs: &[String]) -> Vec<String> {
    needs
        .iter()
        .map(|n| n.to_lowercase())
        .filter(|n| RELATIONSHIP_NEEDS.contains(&n.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interest_category_lookup() {
        assert_eq!(interest_category("Hiking"), Some("outdoors"));
        assert_eq!(interest_category("tennis"), Some("sports"));
        assert_eq!(interest_category("underwater basket weaving"), None);
    }

    #[test]
    fn test_needs_affinity_symmetric() {
        for (a, b, _) in NEEDS_AFFINITY {
            assert_eq!(
                needs_affinity(a, b),
                needs_affinity(b, a),
                "affinity must be order-independent for ({}, {})",
                a,
                b
            );
        }
    }

    #[test]
    fn test_needs_affinity_unknown_pair() {
        assert_eq!(needs_affinity("friendship", "networking"), 0.0);
    }

    #[test]
    fn test_age_band_tolerance_levels() {
        assert_eq!(age_band_tolerance("strict"), Some(3));
        assert_eq!(age_band_tolerance("ANY"), None);
        // Unrecognized levels fall back to moderate
        assert_eq!(age_band_tolerance("whatever"), Some(7));
    }

    #[test]
    fn test_relationship_needs_filters_and_lowercases() {
        let needs = vec![
            "Dating".to_string(),
            "Friendship".to_string(),
            "Hiking".to_string(),
        ];
        assert_eq!(relationship_needs(&needs), vec!["dating".to_string()]);
        assert!(seeks_friendship(&needs));
    }

    #[test]
    fn test_every_category_has_a_weight() {
        for (category, _) in INTEREST_CATEGORIES {
            assert!(category_weight(category) > 0.0, "missing weight for {}", category);
        }
    }
}
