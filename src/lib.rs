pub mod amplify;
pub mod app;
pub mod classify;
pub mod dedup;
pub mod filter;
pub mod models;
pub mod search;
pub mod suggest;
pub mod tmdb;
