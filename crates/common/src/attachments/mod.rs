//! Thesis attachments: uploaded documents and their replacement rules

mod store;

pub use store::{is_safe_filename, remove_files_best_effort, FileStore, LocalFileStore};

use crate::db::models::{Attachment, AttachmentLabel};
use crate::errors::{AppError, Result};
use axum::body::Bytes;
use tracing::warn;

/// A file received in a multipart request, held in memory until the
/// request has passed validation and authorization
#[derive(Debug, Clone)]
pub struct Upload {
    pub label: AttachmentLabel,
    pub original_name: String,
    pub mimetype: String,
    pub contents: Bytes,
}

/// An upload after its bytes were written to the file store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAttachment {
    pub label: AttachmentLabel,
    pub filename: String,
    pub mimetype: String,
    pub original_name: String,
}

/// Which stored rows an upload set supersedes
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AttachmentPlan {
    pub labels: Vec<AttachmentLabel>,
    /// Rows (and files) replaced by a new upload
    pub superseded: Vec<Attachment>,
}

/// Decide the attachment changes of a create or update.
///
/// A create needs both documents. An update replaces only the labels that
/// were uploaded and keeps the rest.
pub fn plan_attachments(
    existing: &[Attachment],
    uploads: &[Upload],
    creating: bool,
) -> Result<AttachmentPlan> {
    let mut labels: Vec<AttachmentLabel> = Vec::with_capacity(uploads.len());
    for upload in uploads {
        if labels.contains(&upload.label) {
            return Err(AppError::validation(
                upload.label.field_name(),
                "Only one file per attachment is allowed",
            ));
        }
        labels.push(upload.label);
    }

    if creating {
        if let Some(missing) = AttachmentLabel::ALL.iter().find(|l| !labels.contains(l)) {
            return Err(AppError::validation(
                missing.field_name(),
                format!("{} attachment is required", missing.field_name()),
            ));
        }
    }

    let superseded = existing
        .iter()
        .filter(|a| labels.contains(&a.label))
        .cloned()
        .collect();

    Ok(AttachmentPlan { labels, superseded })
}

/// Write every upload to the store. On failure the files written so far
/// are removed again.
pub async fn store_uploads(store: &dyn FileStore, uploads: &[Upload]) -> Result<Vec<StoredAttachment>> {
    let mut stored: Vec<StoredAttachment> = Vec::with_capacity(uploads.len());

    for upload in uploads {
        match store.save(&upload.contents).await {
            Ok(filename) => stored.push(StoredAttachment {
                label: upload.label,
                filename,
                mimetype: upload.mimetype.clone(),
                original_name: upload.original_name.clone(),
            }),
            Err(e) => {
                warn!(label = upload.label.field_name(), error = %e, "Storing upload failed");
                remove_files_best_effort(store, stored.into_iter().map(|s| s.filename)).await;
                return Err(e);
            }
        }
    }

    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn upload(label: AttachmentLabel) -> Upload {
        Upload {
            label,
            original_name: format!("{}.pdf", label.field_name()),
            mimetype: "application/pdf".to_string(),
            contents: Bytes::from_static(b"%PDF-1.4"),
        }
    }

    fn stored(thesis_id: Uuid, label: AttachmentLabel, filename: &str) -> Attachment {
        Attachment {
            id: Uuid::new_v4(),
            thesis_id,
            label,
            filename: filename.to_string(),
            mimetype: "application/pdf".to_string(),
            originalname: "old.pdf".to_string(),
        }
    }

    #[test]
    fn test_create_requires_both_documents() {
        let err = plan_attachments(&[], &[upload(AttachmentLabel::ResearchPlan)], true).unwrap_err();
        match err {
            AppError::Validation { fields, .. } => assert!(fields.contains_key("waysOfWorking")),
            other => panic!("unexpected error: {other:?}"),
        }

        let plan = plan_attachments(
            &[],
            &[upload(AttachmentLabel::ResearchPlan), upload(AttachmentLabel::WaysOfWorking)],
            true,
        )
        .unwrap();
        assert_eq!(plan.labels.len(), 2);
        assert!(plan.superseded.is_empty());
    }

    #[test]
    fn test_update_replaces_only_uploaded_labels() {
        let thesis_id = Uuid::new_v4();
        let existing = vec![
            stored(thesis_id, AttachmentLabel::ResearchPlan, "old-plan"),
            stored(thesis_id, AttachmentLabel::WaysOfWorking, "old-wow"),
        ];

        let plan = plan_attachments(&existing, &[upload(AttachmentLabel::WaysOfWorking)], false).unwrap();
        assert_eq!(plan.labels, vec![AttachmentLabel::WaysOfWorking]);
        assert_eq!(plan.superseded.len(), 1);
        assert_eq!(plan.superseded[0].filename, "old-wow");

        let plan = plan_attachments(&existing, &[], false).unwrap();
        assert!(plan.superseded.is_empty());
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let uploads = vec![upload(AttachmentLabel::ResearchPlan), upload(AttachmentLabel::ResearchPlan)];
        assert!(plan_attachments(&[], &uploads, false).is_err());
    }

    /// Accepts one save, fails the next
    #[derive(Default)]
    struct FlakyStore {
        saved: std::sync::Mutex<Vec<String>>,
        removed: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl FileStore for FlakyStore {
        async fn save(&self, _contents: &[u8]) -> Result<String> {
            let mut saved = self.saved.lock().unwrap();
            if !saved.is_empty() {
                return Err(AppError::Storage {
                    message: "disk full".to_string(),
                });
            }
            saved.push("first".to_string());
            Ok("first".to_string())
        }

        async fn read(&self, filename: &str) -> Result<Vec<u8>> {
            Err(AppError::NotFound {
                resource_type: "Attachment".to_string(),
                id: filename.to_string(),
            })
        }

        async fn remove(&self, filename: &str) -> Result<()> {
            self.removed.lock().unwrap().push(filename.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_failed_store_removes_earlier_files() {
        let store = FlakyStore::default();
        let uploads = vec![upload(AttachmentLabel::ResearchPlan), upload(AttachmentLabel::WaysOfWorking)];

        let result = tokio_test::block_on(store_uploads(&store, &uploads));

        assert!(matches!(result, Err(AppError::Storage { .. })));
        assert_eq!(*store.removed.lock().unwrap(), vec!["first".to_string()]);
    }
}
