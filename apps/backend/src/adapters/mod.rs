//! SeaORM adapters. Functions return `DbErr`; `repos::sea` maps them to
//! domain errors.

pub mod participants_sea;
pub mod sessions_sea;
pub mod users_sea;
