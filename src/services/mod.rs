pub mod composition_service;
pub mod ordering_service;

pub use composition_service::CompositionService;
pub use ordering_service::{OrderingService, PartQuestions, QuestionDraft};
