pub mod candidatures;

pub use candidatures::CandidaturesRepo;
