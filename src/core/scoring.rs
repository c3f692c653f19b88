use crate::core::tables::{
    self, AGE_BANDS, DISTANCE_BANDS, EXACT_INTEREST_POINTS, FAR_PENALTY,
    FRIENDSHIP_PROXIMITY_MULTIPLIER, INCOMPATIBLE, INTERNATIONAL_FAR_BONUS, NEEDS_SCALE,
    NEUTRAL_RELATIONSHIP_NEEDS, SHARED_CATEGORY_BONUS, SHARED_CATEGORY_THRESHOLD,
};
use crate::models::Profile;
use std::collections::HashSet;

/// Compute the compatibility score for a pair of profiles
///
/// Pure function of its inputs: no I/O, no clock, no randomness. A score
/// below zero means the pair must not be matched; hard gender/need
/// incompatibilities return the `INCOMPATIBLE` sentinel outright.
///
/// `distance_km` is the geodesic distance between the two users when both
/// supplied coordinates; pairs without mutual location data are scored on
/// the remaining components alone.
pub fn compatibility_score(a: &Profile, b: &Profile, distance_km: Option<f64>) -> f64 {
    if !passes_need_gate(a, b) {
        return INCOMPATIBLE;
    }

    let friendship = tables::seeks_friendship(&a.needs) || tables::seeks_friendship(&b.needs);
    let international = a.prefers_international() || b.prefers_international();

    let mut score = interest_score(a, b);
    score += needs_score(a, b);
    score += age_score(a.age, b.age);
    if let Some(distance) = distance_km {
        score += location_score(distance, friendship, international);
    }

    score
}

/// The gender/need gate
///
/// Friendship is orientation-neutral, so a friendship need on either side
/// passes unconditionally. Pairs where at most one side seeks a relationship
/// pass by default. When both seek relationships, opposite-gender pairs must
/// each reference the counterpart (the partner-gender-specific need or a
/// gender-neutral one), same-gender pairs must both carry a gender-neutral
/// relationship need, and every other gender combination passes as long as
/// both list any relationship-seeking need.
fn passes_need_gate(a: &Profile, b: &Profile) -> bool {
    if tables::seeks_friendship(&a.needs) || tables::seeks_friendship(&b.needs) {
        return true;
    }

    let a_rel = tables::relationship_needs(&a.needs);
    let b_rel = tables::relationship_needs(&b.needs);
    if a_rel.is_empty() || b_rel.is_empty() {
        return true;
    }

    let gender_a = a.gender.as_deref().map(|g| g.to_lowercase());
    let gender_b = b.gender.as_deref().map(|g| g.to_lowercase());

    match (gender_a.as_deref(), gender_b.as_deref()) {
        (Some("male"), Some("female")) | (Some("female"), Some("male")) => {
            wants_partner(&a_rel, gender_b.as_deref().unwrap_or_default())
                && wants_partner(&b_rel, gender_a.as_deref().unwrap_or_default())
        }
        (Some(ga), Some(gb)) if ga == gb && (ga == "male" || ga == "female") => {
            has_neutral_need(&a_rel) && has_neutral_need(&b_rel)
        }
        // Inclusive default: both already list a relationship-seeking need
        _ => true,
    }
}

/// Does this relationship-needs list reference a partner of the given gender?
#[inline]
fn wants_partner(rel_needs: &[String], partner_gender: &str) -> bool {
    let specific = if partner_gender == "female" {
        "girlfriend"
    } else {
        "boyfriend"
    };
    rel_needs
        .iter()
        .any(|n| n == specific || NEUTRAL_RELATIONSHIP_NEEDS.contains(&n.as_str()))
}

#[inline]
fn has_neutral_need(rel_needs: &[String]) -> bool {
    rel_needs
        .iter()
        .any(|n| NEUTRAL_RELATIONSHIP_NEEDS.contains(&n.as_str()))
}

/// Interest overlap: exact matches plus category-level alignment
#[inline]
fn interest_score(a: &Profile, b: &Profile) -> f64 {
    let a_interests: HashSet<String> = a.interests.iter().map(|i| i.to_lowercase()).collect();
    let b_interests: HashSet<String> = b.interests.iter().map(|i| i.to_lowercase()).collect();

    let exact = a_interests.intersection(&b_interests).count();
    let mut score = exact as f64 * EXACT_INTEREST_POINTS;

    let a_categories: HashSet<&str> = a_interests
        .iter()
        .filter_map(|i| tables::interest_category(i))
        .collect();
    let b_categories: HashSet<&str> = b_interests
        .iter()
        .filter_map(|i| tables::interest_category(i))
        .collect();

    let shared: Vec<&str> = a_categories.intersection(&b_categories).copied().collect();
    for category in &shared {
        score += tables::category_weight(category);
    }
    if shared.len() >= SHARED_CATEGORY_THRESHOLD {
        score += SHARED_CATEGORY_BONUS;
    }

    score
}

/// Needs overlap via the pairwise affinity matrix, normalized by list sizes
#[inline]
fn needs_score(a: &Profile, b: &Profile) -> f64 {
    if a.needs.is_empty() || b.needs.is_empty() {
        return 0.0;
    }

    let mut total = 0.0;
    for need_a in &a.needs {
        let need_a = need_a.to_lowercase();
        for need_b in &b.needs {
            total += tables::needs_affinity(&need_a, &need_b.to_lowercase());
        }
    }

    total / (a.needs.len() * b.needs.len()) as f64 * NEEDS_SCALE
}

/// Banded age-closeness bonus; finer bands closer in age
#[inline]
fn age_score(age_a: Option<u8>, age_b: Option<u8>) -> f64 {
    let (Some(age_a), Some(age_b)) = (age_a, age_b) else {
        return 0.0;
    };
    let diff = age_a.abs_diff(age_b);
    AGE_BANDS
        .iter()
        .find(|(max_diff, _)| diff <= *max_diff)
        .map(|(_, bonus)| *bonus)
        .unwrap_or(0.0)
}

/// Banded location-closeness bonus/penalty
///
/// International intent waives the far penalty; friendship intent amplifies
/// any non-negative proximity bonus.
#[inline]
fn location_score(distance_km: f64, friendship: bool, international: bool) -> f64 {
    let base = if international && distance_km > 50.0 {
        INTERNATIONAL_FAR_BONUS
    } else {
        DISTANCE_BANDS
            .iter()
            .find(|(max_km, _)| distance_km <= *max_km)
            .map(|(_, bonus)| *bonus)
            .unwrap_or(FAR_PENALTY)
    };

    if friendship && base > 0.0 {
        base * FRIENDSHIP_PROXIMITY_MULTIPLIER
    } else {
        base
    }
}
