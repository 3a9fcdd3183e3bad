//! Embedded sample migrations
//!
//! The medical-center and classifieds schemas are independent lineages, so
//! each is its own stream with its own ledger table.

use crate::migrations::source::EmbeddedSource;

/// Medical-center records schema
pub const MEDICAL: EmbeddedSource = EmbeddedSource::new(&[
    (
        "001_create_doctors",
        include_str!("../../migrations/medical/001_create_doctors.sql"),
    ),
    (
        "002_create_patients",
        include_str!("../../migrations/medical/002_create_patients.sql"),
    ),
    (
        "003_create_visits",
        include_str!("../../migrations/medical/003_create_visits.sql"),
    ),
    (
        "004_seed_doctors",
        include_str!("../../migrations/medical/004_seed_doctors.sql"),
    ),
]);

/// Classifieds-listing schema
pub const CLASSIFIEDS: EmbeddedSource = EmbeddedSource::new(&[
    (
        "001_create_users",
        include_str!("../../migrations/classifieds/001_create_users.sql"),
    ),
    (
        "002_create_categories",
        include_str!("../../migrations/classifieds/002_create_categories.sql"),
    ),
    (
        "003_create_listings",
        include_str!("../../migrations/classifieds/003_create_listings.sql"),
    ),
    (
        "004_seed_categories",
        include_str!("../../migrations/classifieds/004_seed_categories.sql"),
    ),
]);

/// Look up a bundled stream by name
pub fn bundled(name: &str) -> Option<EmbeddedSource> {
    match name {
        "medical" => Some(MEDICAL),
        "classifieds" => Some(CLASSIFIEDS),
        _ => None,
    }
}
