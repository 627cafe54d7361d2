pub mod auth;
pub mod blueprint;
pub mod entity;
pub mod loaders;
pub mod question_type;
pub mod section_kind;

pub use auth::{AuthState, Role};
pub use blueprint::{
    PartBlueprint, QuestionBlueprint, SectionBlueprint, TestBlueprint, WritingTaskBlueprint,
};
pub use entity::{
    EntityData, EntityId, EntityKind, EntityRecord, EntitySummary, ListFilter, QuestionGroup,
    RequestToken, SectionRefs, TestMetadata, VersionToken,
};
pub use loaders::{load_all_blueprints, load_toml_to_blueprint};
pub use question_type::QuestionType;
pub use section_kind::SectionKind;
