//! Data models for scraped tenders.

mod tender;

pub use tender::{
    Attachment, ContactInfo, RequiredDocument, StageForm, TenderRecord, TenderStage,
    TenderStatus, TenderType,
};
