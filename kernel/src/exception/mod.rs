//! Software-exception (`swexn`) registration and delivery (spec §4.6).

pub mod swexn;
