//! Social context derivation and clamping.
//!
//! A requested relationship/intimacy context is clamped against world- and
//! user-level ceilings before anything is sent to a provider, and once more
//! when the generation row is persisted. Clamping never fails: an
//! out-of-range request is resolved into range and the caller learns via
//! the returned flag that it happened.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Levels
// ---------------------------------------------------------------------------

/// Lowest level on both scales.
pub const LEVEL_MIN: i16 = 0;
/// Highest level on both scales.
pub const LEVEL_MAX: i16 = 5;

// Named relationship tiers, matching the world editor's vocabulary.
pub const TIER_STRANGER: i16 = 0;
pub const TIER_ACQUAINTANCE: i16 = 1;
pub const TIER_FRIEND: i16 = 2;
pub const TIER_CLOSE_FRIEND: i16 = 3;
pub const TIER_ROMANTIC: i16 = 4;
pub const TIER_PARTNER: i16 = 5;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The content-intensity context of a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialContext {
    pub relationship_tier: i16,
    pub intimacy_level: i16,
}

impl Default for SocialContext {
    fn default() -> Self {
        Self {
            relationship_tier: TIER_STRANGER,
            intimacy_level: LEVEL_MIN,
        }
    }
}

/// A per-world or per-user upper bound on social context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextCeiling {
    pub max_relationship_tier: i16,
    pub max_intimacy_level: i16,
}

impl Default for ContextCeiling {
    /// Fully permissive: every in-range request passes unchanged.
    fn default() -> Self {
        Self {
            max_relationship_tier: LEVEL_MAX,
            max_intimacy_level: LEVEL_MAX,
        }
    }
}

// ---------------------------------------------------------------------------
// Clamp
// ---------------------------------------------------------------------------

/// Clamp a requested context against the world and user ceilings.
///
/// The effective ceiling is the per-field minimum of the two. Each field is
/// clamped into `LEVEL_MIN..=effective`. Returns the resolved context and
/// whether any field was adjusted. Never errors — exceeding a ceiling is an
/// audit event, not a failure.
pub fn clamp(
    requested: SocialContext,
    world_ceiling: ContextCeiling,
    user_ceiling: ContextCeiling,
) -> (SocialContext, bool) {
    let tier_ceiling = world_ceiling
        .max_relationship_tier
        .min(user_ceiling.max_relationship_tier)
        .clamp(LEVEL_MIN, LEVEL_MAX);
    let intimacy_ceiling = world_ceiling
        .max_intimacy_level
        .min(user_ceiling.max_intimacy_level)
        .clamp(LEVEL_MIN, LEVEL_MAX);

    let resolved = SocialContext {
        relationship_tier: requested.relationship_tier.clamp(LEVEL_MIN, tier_ceiling),
        intimacy_level: requested.intimacy_level.clamp(LEVEL_MIN, intimacy_ceiling),
    };

    (resolved, resolved != requested)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ceiling(tier: i16, intimacy: i16) -> ContextCeiling {
        ContextCeiling {
            max_relationship_tier: tier,
            max_intimacy_level: intimacy,
        }
    }

    #[test]
    fn in_range_request_passes_unchanged() {
        let requested = SocialContext {
            relationship_tier: TIER_FRIEND,
            intimacy_level: 1,
        };
        let (resolved, clamped) = clamp(requested, ContextCeiling::default(), ContextCeiling::default());
        assert_eq!(resolved, requested);
        assert!(!clamped);
    }

    #[test]
    fn request_above_world_ceiling_is_clamped() {
        let requested = SocialContext {
            relationship_tier: TIER_PARTNER,
            intimacy_level: 5,
        };
        let (resolved, clamped) = clamp(requested, ceiling(2, 1), ContextCeiling::default());
        assert_eq!(resolved.relationship_tier, 2);
        assert_eq!(resolved.intimacy_level, 1);
        assert!(clamped);
    }

    #[test]
    fn tightest_ceiling_wins_per_field() {
        let requested = SocialContext {
            relationship_tier: 5,
            intimacy_level: 5,
        };
        // World restricts tier, user restricts intimacy.
        let (resolved, clamped) = clamp(requested, ceiling(3, 5), ceiling(5, 2));
        assert_eq!(resolved.relationship_tier, 3);
        assert_eq!(resolved.intimacy_level, 2);
        assert!(clamped);
    }

    #[test]
    fn negative_request_clamps_to_floor() {
        let requested = SocialContext {
            relationship_tier: -3,
            intimacy_level: -1,
        };
        let (resolved, clamped) = clamp(requested, ContextCeiling::default(), ContextCeiling::default());
        assert_eq!(resolved.relationship_tier, LEVEL_MIN);
        assert_eq!(resolved.intimacy_level, LEVEL_MIN);
        assert!(clamped);
    }

    #[test]
    fn out_of_range_ceiling_is_itself_clamped() {
        let requested = SocialContext {
            relationship_tier: 5,
            intimacy_level: 5,
        };
        // A misconfigured ceiling above LEVEL_MAX must not widen the range.
        let (resolved, _) = clamp(requested, ceiling(99, 99), ceiling(99, 99));
        assert_eq!(resolved.relationship_tier, LEVEL_MAX);
        assert_eq!(resolved.intimacy_level, LEVEL_MAX);
    }

    #[test]
    fn clamp_never_errors_and_is_idempotent() {
        let requested = SocialContext {
            relationship_tier: 5,
            intimacy_level: 4,
        };
        let world = ceiling(1, 1);
        let user = ContextCeiling::default();
        let (first, was_clamped) = clamp(requested, world, user);
        assert!(was_clamped);
        // Re-clamping the resolved context is a no-op: the persistence-time
        // check reports clean for anything the dispatch-time check produced.
        let (second, clamped_again) = clamp(first, world, user);
        assert_eq!(first, second);
        assert!(!clamped_again);
    }
}
