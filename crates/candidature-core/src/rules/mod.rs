pub mod age;
pub mod validation;

pub use age::{age_on, is_adult, parse_birth_date, MIN_AGE};
pub use validation::validate_candidature;
