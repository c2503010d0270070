pub mod models;
pub mod portal_client;
