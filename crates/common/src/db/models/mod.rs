//! SeaORM entity models
//!
//! Database entities for Prethesis

mod attachment;
mod author;
mod grader;
mod program;
mod program_management;
mod study_track;
mod supervision;
mod thesis;
mod user;

pub use user::{
    Entity as UserEntity,
    Model as User,
    ActiveModel as UserActiveModel,
    Column as UserColumn,
};

pub use program::{
    Entity as ProgramEntity,
    Model as Program,
    ActiveModel as ProgramActiveModel,
    Column as ProgramColumn,
};

pub use study_track::{
    Entity as StudyTrackEntity,
    Model as StudyTrack,
    ActiveModel as StudyTrackActiveModel,
    Column as StudyTrackColumn,
};

pub use program_management::{
    Entity as ProgramManagementEntity,
    Model as ProgramManagement,
    ActiveModel as ProgramManagementActiveModel,
    Column as ProgramManagementColumn,
};

pub use thesis::{
    Entity as ThesisEntity,
    Model as Thesis,
    ActiveModel as ThesisActiveModel,
    Column as ThesisColumn,
    ThesisStatus,
};

pub use supervision::{
    Entity as SupervisionEntity,
    Model as Supervision,
    ActiveModel as SupervisionActiveModel,
    Column as SupervisionColumn,
};

pub use grader::{
    Entity as GraderEntity,
    Model as Grader,
    ActiveModel as GraderActiveModel,
    Column as GraderColumn,
};

pub use author::{
    Entity as AuthorEntity,
    Model as Author,
    ActiveModel as AuthorActiveModel,
    Column as AuthorColumn,
};

pub use attachment::{
    Entity as AttachmentEntity,
    Model as Attachment,
    ActiveModel as AttachmentActiveModel,
    Column as AttachmentColumn,
    AttachmentLabel,
};
