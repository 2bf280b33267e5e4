pub mod listing_models;
