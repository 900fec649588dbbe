//! # ドキュメント
//!
//! 職員が登録する資格証・研修記録などのメタデータ。ファイル本体は外部 URL で参照する。
//!
//! ## 設計判断
//!
//! - 検証（verify）は管理系ロールのみ。一度検証したドキュメントは再検証できない
//! - `FileValidation` で Content-Type とサイズを登録前に検証する

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{DomainError, user::UserId};

// ============================================================================
// DocumentId
// ============================================================================

define_uuid_id! {
    /// ドキュメントの一意識別子
    pub struct DocumentId;
}

// ============================================================================
// DocumentType
// ============================================================================

/// ドキュメント種別
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentType {
    Certificate,
    TrainingRecord,
    Qualification,
    License,
    Other,
}

impl std::str::FromStr for DocumentType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "certificate" => Ok(Self::Certificate),
            "training_record" => Ok(Self::TrainingRecord),
            "qualification" => Ok(Self::Qualification),
            "license" => Ok(Self::License),
            "other" => Ok(Self::Other),
            _ => Err(DomainError::Validation(format!(
                "不正なドキュメント種別: {}",
                s
            ))),
        }
    }
}

// ============================================================================
// FileValidation
// ============================================================================

/// 登録するファイルのバリデーション
pub struct FileValidation;

impl FileValidation {
    /// 対応 Content-Type の一覧
    const ALLOWED_CONTENT_TYPES: &[&str] = &[
        "application/pdf",
        "application/msword",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "image/png",
        "image/jpeg",
    ];
    /// 最大ファイルサイズ（10 MB）
    pub const MAX_FILE_SIZE: i64 = 10 * 1024 * 1024;

    pub fn validate_file(mime_type: &str, file_size: i64) -> Result<(), DomainError> {
        if !Self::ALLOWED_CONTENT_TYPES.contains(&mime_type) {
            return Err(DomainError::Validation(format!(
                "非対応のファイル形式です: {}",
                mime_type
            )));
        }

        if file_size <= 0 {
            return Err(DomainError::Validation(
                "ファイルサイズは 1 バイト以上である必要があります".to_string(),
            ));
        }

        if file_size > Self::MAX_FILE_SIZE {
            return Err(DomainError::Validation(format!(
                "ファイルサイズが上限（{} MB）を超えています",
                Self::MAX_FILE_SIZE / (1024 * 1024)
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Document
// ============================================================================

/// 検証記録
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub verified_by: UserId,
    pub verified_at: DateTime<Utc>,
}

/// ドキュメントエンティティ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    id: DocumentId,
    user_id: UserId,
    document_type: DocumentType,
    title: String,
    file: FileMetadata,
    issue_date: Option<NaiveDate>,
    expiration_date: Option<NaiveDate>,
    issuing_authority: Option<String>,
    verification: Option<Verification>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// ファイル情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub file_name: String,
    pub file_url: String,
    pub file_size: i64,
    pub mime_type: String,
}

pub struct NewDocument {
    pub id: DocumentId,
    pub user_id: UserId,
    pub document_type: DocumentType,
    pub title: String,
    pub file: FileMetadata,
    pub issue_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub issuing_authority: Option<String>,
    pub now: DateTime<Utc>,
}

/// DB 復元パラメータ
pub struct DocumentRecord {
    pub id: DocumentId,
    pub user_id: UserId,
    pub document_type: DocumentType,
    pub title: String,
    pub file: FileMetadata,
    pub issue_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub issuing_authority: Option<String>,
    pub verified_by: Option<UserId>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(params: NewDocument) -> Result<Self, DomainError> {
        if params.title.trim().is_empty() {
            return Err(DomainError::Validation("タイトルは必須です".to_string()));
        }
        if params.file.file_name.trim().is_empty() || params.file.file_url.trim().is_empty() {
            return Err(DomainError::Validation(
                "ファイル名と URL は必須です".to_string(),
            ));
        }
        FileValidation::validate_file(&params.file.mime_type, params.file.file_size)?;
        if let (Some(issue), Some(expiration)) = (params.issue_date, params.expiration_date)
            && expiration < issue
        {
            return Err(DomainError::Validation(
                "有効期限は発行日以降である必要があります".to_string(),
            ));
        }

        Ok(Self {
            id: params.id,
            user_id: params.user_id,
            document_type: params.document_type,
            title: params.title.trim().to_string(),
            file: params.file,
            issue_date: params.issue_date,
            expiration_date: params.expiration_date,
            issuing_authority: params.issuing_authority,
            verification: None,
            created_at: params.now,
            updated_at: params.now,
        })
    }

    /// DB からエンティティを復元する
    ///
    /// 検証者と検証日時は揃っている場合のみ検証済みとして扱う。
    pub fn from_db(record: DocumentRecord) -> Self {
        let verification = match (record.verified_by, record.verified_at) {
            (Some(verified_by), Some(verified_at)) => Some(Verification {
                verified_by,
                verified_at,
            }),
            _ => None,
        };
        Self {
            id: record.id,
            user_id: record.user_id,
            document_type: record.document_type,
            title: record.title,
            file: record.file,
            issue_date: record.issue_date,
            expiration_date: record.expiration_date,
            issuing_authority: record.issuing_authority,
            verification,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    /// 検証済みにする
    pub fn verify(self, verifier: UserId, now: DateTime<Utc>) -> Result<Self, DomainError> {
        if self.verification.is_some() {
            return Err(DomainError::Conflict(
                "このドキュメントは検証済みです".to_string(),
            ));
        }
        Ok(Self {
            verification: Some(Verification {
                verified_by: verifier,
                verified_at: now,
            }),
            updated_at: now,
            ..self
        })
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn file(&self) -> &FileMetadata {
        &self.file
    }

    pub fn issue_date(&self) -> Option<NaiveDate> {
        self.issue_date
    }

    pub fn expiration_date(&self) -> Option<NaiveDate> {
        self.expiration_date
    }

    pub fn issuing_authority(&self) -> Option<&str> {
        self.issuing_authority.as_deref()
    }

    pub fn verification(&self) -> Option<&Verification> {
        self.verification.as_ref()
    }

    pub fn is_verified(&self) -> bool {
        self.verification.is_some()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn file(mime_type: &str, file_size: i64) -> FileMetadata {
        FileMetadata {
            file_name: "cpr.pdf".to_string(),
            file_url: "https://files.shpd.example.com/cpr.pdf".to_string(),
            file_size,
            mime_type: mime_type.to_string(),
        }
    }

    fn new_document(now: DateTime<Utc>) -> NewDocument {
        NewDocument {
            id: DocumentId::new(),
            user_id: UserId::new(),
            document_type: DocumentType::Certificate,
            title: "CPR Certification".to_string(),
            file: file("application/pdf", 2048),
            issue_date: NaiveDate::from_ymd_opt(2023, 1, 1),
            expiration_date: NaiveDate::from_ymd_opt(2025, 1, 1),
            issuing_authority: Some("American Red Cross".to_string()),
            now,
        }
    }

    #[rstest]
    #[case("application/pdf", 1024, true)]
    #[case("image/jpeg", FileValidation::MAX_FILE_SIZE, true)]
    #[case("application/zip", 1024, false)]
    #[case("application/pdf", 0, false)]
    #[case("application/pdf", FileValidation::MAX_FILE_SIZE + 1, false)]
    fn test_ファイル検証(#[case] mime: &str, #[case] size: i64, #[case] ok: bool) {
        assert_eq!(FileValidation::validate_file(mime, size).is_ok(), ok);
    }

    #[rstest]
    fn test_新規ドキュメントは未検証(now: DateTime<Utc>) {
        let sut = Document::new(new_document(now)).unwrap();

        assert!(!sut.is_verified());
        assert_eq!(sut.document_type(), DocumentType::Certificate);
    }

    #[rstest]
    fn test_有効期限が発行日より前ならエラー(now: DateTime<Utc>) {
        let result = Document::new(NewDocument {
            expiration_date: NaiveDate::from_ymd_opt(2022, 1, 1),
            ..new_document(now)
        });

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[rstest]
    fn test_検証すると検証者と日時が記録される(now: DateTime<Utc>) {
        let verifier = UserId::new();

        let sut = Document::new(new_document(now))
            .unwrap()
            .verify(verifier.clone(), now)
            .unwrap();

        assert_eq!(
            sut.verification(),
            Some(&Verification {
                verified_by: verifier,
                verified_at: now,
            })
        );
    }

    #[rstest]
    fn test_検証済みの再検証はconflict(now: DateTime<Utc>) {
        let verified = Document::new(new_document(now))
            .unwrap()
            .verify(UserId::new(), now)
            .unwrap();

        let result = verified.verify(UserId::new(), now);

        assert!(matches!(result, Err(DomainError::Conflict(_))));
    }

    #[test]
    fn test_ドキュメント種別の文字列変換() {
        assert_eq!(DocumentType::TrainingRecord.to_string(), "training_record");
        assert_eq!(
            "license".parse::<DocumentType>().unwrap(),
            DocumentType::License
        );
        assert!("photo".parse::<DocumentType>().is_err());
    }
}
