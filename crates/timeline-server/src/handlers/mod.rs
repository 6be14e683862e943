pub mod health;
pub mod navigation;
pub mod nodes;
pub mod sessions;
pub mod turns;
