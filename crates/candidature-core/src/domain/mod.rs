pub mod candidature;
pub mod email;
pub mod financing;
pub mod ids;
pub mod level;
pub mod phone;
pub mod sex;

pub use candidature::{CandidatureDraft, CandidatureRecord, Submission};
pub use email::{is_valid_email, normalize_email};
pub use financing::{Financing, FinancingMode, Presence};
pub use ids::CandidatureUuid;
pub use level::{normalize_level, LanguageLevel};
pub use phone::is_valid_phone;
pub use sex::Sex;
