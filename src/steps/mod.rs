pub mod projection_step;
pub mod remappers;
