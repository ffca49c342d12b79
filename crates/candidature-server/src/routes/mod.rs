pub mod candidatures;
pub mod health;
