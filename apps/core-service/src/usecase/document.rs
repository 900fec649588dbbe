//! # 書類ユースケース
//!
//! 職員は資格証などの書類（ファイル本体は外部ストレージ、ここではメタデータのみ）を登録し、
//! 管理者が内容を確認して検証済みにする。

use std::sync::Arc;

use chrono::NaiveDate;
use trainflow_domain::{
    clock::Clock,
    document::{Document, DocumentId, DocumentType, FileMetadata, NewDocument},
    user::UserId,
};
use trainflow_infra::repository::DocumentRepository;
use trainflow_shared::{event_log::event, log_business_event};

use crate::{error::CoreError, usecase::helpers::FindResultExt};

#[derive(Debug, Clone)]
pub struct UploadDocumentInput {
    pub document_type: DocumentType,
    pub title: String,
    pub file: FileMetadata,
    pub issue_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub issuing_authority: Option<String>,
}

pub struct DocumentUseCaseImpl {
    document_repo: Arc<dyn DocumentRepository>,
    clock: Arc<dyn Clock>,
}

impl DocumentUseCaseImpl {
    pub fn new(document_repo: Arc<dyn DocumentRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            document_repo,
            clock,
        }
    }

    /// 書類のメタデータを登録する
    ///
    /// 非対応の形式や 10 MB を超えるファイルは 400。
    pub async fn upload(
        &self,
        user_id: &UserId,
        input: UploadDocumentInput,
    ) -> Result<Document, CoreError> {
        let document = Document::new(NewDocument {
            id: DocumentId::new(),
            user_id: user_id.clone(),
            document_type: input.document_type,
            title: input.title,
            file: input.file,
            issue_date: input.issue_date,
            expiration_date: input.expiration_date,
            issuing_authority: input.issuing_authority,
            now: self.clock.now(),
        })?;
        self.document_repo.insert(&document).await?;

        log_business_event!(
            event.category = event::category::DOCUMENT,
            event.action = event::action::DOCUMENT_UPLOADED,
            event.entity_type = event::entity_type::DOCUMENT,
            event.entity_id = %document.id(),
            event.actor_id = %user_id,
            event.result = event::result::SUCCESS,
            document.r#type = %document.document_type(),
            "書類を登録"
        );
        Ok(document)
    }

    pub async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Document>, CoreError> {
        Ok(self.document_repo.find_by_user(user_id).await?)
    }

    /// 管理者の確認待ち
    pub async fn list_unverified(&self) -> Result<Vec<Document>, CoreError> {
        Ok(self.document_repo.find_unverified().await?)
    }

    /// 検証済みにする（検証済みなら 409）
    pub async fn verify(&self, id: &DocumentId, verifier_id: &UserId) -> Result<Document, CoreError> {
        let document = self.document_repo.find_by_id(id).await.or_not_found("書類")?;
        let verified = document.verify(verifier_id.clone(), self.clock.now())?;
        self.document_repo.mark_verified(&verified).await?;

        log_business_event!(
            event.category = event::category::DOCUMENT,
            event.action = event::action::DOCUMENT_VERIFIED,
            event.entity_type = event::entity_type::DOCUMENT,
            event.entity_id = %verified.id(),
            event.actor_id = %verifier_id,
            event.result = event::result::SUCCESS,
            "書類を検証"
        );
        Ok(verified)
    }
}
