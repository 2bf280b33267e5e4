pub mod event_remapper;
