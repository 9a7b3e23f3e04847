//! Generator definitions: host records in, validated definitions out

mod binder;
pub mod model;
pub mod record;

pub use binder::{bind_definition, check_global_template, dedupe_definitions};
pub use model::{
    FileTemplate, GeneratorDefinition, GlobalChildTemplate, GlobalFileTemplate, InlineTemplate,
};
pub use record::{
    DeclarationRecord, GeneratorKind, LiteralArg, MarkerTag, MemberRecord, NameOverride,
    PropertyRecord, RequiredMarker,
};
