//! Tender record types and their nested entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a tender procures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TenderType {
    /// Supply of goods or equipment.
    Goods,
    /// Construction and civil works.
    Works,
    /// Consultancy and other services.
    Services,
    /// Could not be classified.
    #[default]
    Unknown,
}

impl TenderType {
    /// All variants, in the order metadata reports them.
    pub const ALL: [Self; 4] = [Self::Goods, Self::Works, Self::Services, Self::Unknown];

    /// The display label, as persisted in result files.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Goods => "Goods",
            Self::Works => "Works",
            Self::Services => "Services",
            Self::Unknown => "Unknown",
        }
    }

    /// Parses a label case-insensitively; anything unrecognized is Unknown.
    #[must_use]
    pub fn parse_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "goods" => Self::Goods,
            "works" => Self::Works,
            "services" => Self::Services,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for TenderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a tender stands in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TenderStatus {
    /// Open for bids.
    #[default]
    #[serde(rename = "In Progress")]
    InProgress,
    /// Submission window has ended.
    Closed,
    /// A winner has been declared.
    Awarded,
    /// Withdrawn before award.
    Cancelled,
    /// Could not be classified.
    Unknown,
}

impl TenderStatus {
    /// The display label, as persisted in result files.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::InProgress => "In Progress",
            Self::Closed => "Closed",
            Self::Awarded => "Awarded",
            Self::Cancelled => "Cancelled",
            Self::Unknown => "Unknown",
        }
    }

    /// Parses a label case-insensitively; anything unrecognized is Unknown.
    #[must_use]
    pub fn parse_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "in progress" => Self::InProgress,
            "closed" => Self::Closed,
            "awarded" => Self::Awarded,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for TenderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A document linked from a tender's attachments listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Link text, or a `Document_{n}` placeholder when the anchor is bare.
    pub name: String,
    /// Absolute URL of the document.
    pub url: String,
    /// Declared size, when the listing shows one.
    pub size: Option<String>,
    /// File type derived from the URL's trailing path segment.
    #[serde(default = "default_file_type")]
    pub file_type: String,
}

fn default_file_type() -> String {
    "unknown".to_string()
}

impl Attachment {
    /// Creates an attachment with an unknown file type.
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            size: None,
            file_type: default_file_type(),
        }
    }

    /// Sets the inferred file type.
    #[must_use]
    pub fn with_file_type(mut self, file_type: impl Into<String>) -> Self {
        self.file_type = file_type.into();
        self
    }
}

/// A form submitted within a tender stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageForm {
    /// Form identifier as printed in the stage tables.
    pub form_id: Option<String>,
    /// Form name.
    pub name: String,
    /// Fill mode (online, offline).
    pub mode: Option<String>,
    /// Submission type.
    pub submission_type: Option<String>,
    /// Whether submission is mandatory.
    #[serde(default)]
    pub mandatory: bool,
}

/// A document bidders must supply for a stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequiredDocument {
    /// Sequence number within the stage listing.
    pub sequence: Option<u32>,
    /// Document name.
    pub name: String,
    /// Whether the document is mandatory.
    #[serde(default)]
    pub mandatory: bool,
}

/// One evaluation stage of a tender, with its forms and required documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenderStage {
    /// Stage name as shown in the stage summary table.
    pub name: String,
    /// Evaluation date text, unparsed.
    pub evaluation_date: Option<String>,
    /// Minimum-forms text, unparsed.
    pub minimum_forms: Option<String>,
    /// Forms joined to this stage.
    #[serde(default)]
    pub forms: Vec<StageForm>,
    /// Required documents joined to this stage.
    #[serde(default)]
    pub required_documents: Vec<RequiredDocument>,
}

impl TenderStage {
    /// Creates a stage with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Contact details harvested from a detail page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    /// Contact email address.
    pub email: Option<String>,
    /// Contact phone number.
    pub phone: Option<String>,
    /// Postal address text.
    pub address: Option<String>,
}

impl ContactInfo {
    /// Whether any contact field is populated.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.email.is_none() && self.phone.is_none() && self.address.is_none()
    }
}

/// One scraped procurement tender.
///
/// Constructed once per listing candidate, overlaid by detail extraction,
/// mutated only by the normalization pass, and immutable thereafter.
/// `tender_id` is the natural key; uniqueness is enforced by deduplication
/// after cleaning, not during extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenderRecord {
    /// Natural key parsed from the listing row.
    pub tender_id: String,
    /// Tender title, `"Tender {id}"` when the page offers none.
    pub title: String,
    /// Inviting organization, `"Unknown Organization"` when absent.
    pub organization: String,
    /// Procurement type classification.
    #[serde(default)]
    pub tender_type: TenderType,
    /// Lifecycle status classification.
    #[serde(default)]
    pub tender_status: TenderStatus,
    /// Publish date, ISO-8601 when recognized, raw text otherwise.
    pub publish_date: Option<String>,
    /// Closing date, ISO-8601 when recognized, raw text otherwise.
    pub closing_date: Option<String>,
    /// Estimated contract value. Script-embedded values take precedence
    /// over table-derived ones.
    pub estimated_value: Option<f64>,
    /// Tender document fee.
    pub tender_fee: Option<f64>,
    /// Earnest money deposit, kept as printed.
    pub emd: Option<String>,
    /// Invitation-for-bid reference number.
    pub ifb_number: Option<String>,
    /// Cleaned description text.
    pub description: Option<String>,
    /// Officer or authority inviting the tender.
    pub inviting_authority: Option<String>,
    /// Location the work or supply applies to.
    pub location: Option<String>,
    /// Issuing department.
    pub department: Option<String>,
    /// Tender category.
    pub category: Option<String>,
    /// Contact details, when any were found.
    pub contact: Option<ContactInfo>,
    /// Eligibility criteria text.
    pub eligibility: Option<String>,
    /// Specifications snippet, capped during extraction.
    pub specifications: Option<String>,
    /// Terms snippet, capped during extraction.
    pub terms: Option<String>,
    /// Harvested document links.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Evaluation stages with their forms and required documents.
    #[serde(default)]
    pub stages: Vec<TenderStage>,
    /// Count of documents the listing row advertised.
    #[serde(default)]
    pub document_count: u32,
    /// URL of the detail page this record came from.
    pub source_url: Option<String>,
    /// Raw HTML snippet kept for debugging.
    pub raw_html_snippet: Option<String>,
    /// When this record was scraped.
    pub ingested_at: DateTime<Utc>,
}

impl TenderRecord {
    /// Creates a record with placeholder title and organization.
    #[must_use]
    pub fn new(tender_id: impl Into<String>) -> Self {
        let tender_id = tender_id.into();
        let title = Self::placeholder_title(&tender_id);
        Self {
            tender_id,
            title,
            organization: Self::placeholder_organization().to_string(),
            tender_type: TenderType::default(),
            tender_status: TenderStatus::default(),
            publish_date: None,
            closing_date: None,
            estimated_value: None,
            tender_fee: None,
            emd: None,
            ifb_number: None,
            description: None,
            inviting_authority: None,
            location: None,
            department: None,
            category: None,
            contact: None,
            eligibility: None,
            specifications: None,
            terms: None,
            attachments: Vec::new(),
            stages: Vec::new(),
            document_count: 0,
            source_url: None,
            raw_html_snippet: None,
            ingested_at: Utc::now(),
        }
    }

    /// The deterministic title used when a page offers none.
    #[must_use]
    pub fn placeholder_title(tender_id: &str) -> String {
        format!("Tender {tender_id}")
    }

    /// The deterministic organization used when a page offers none.
    #[must_use]
    pub const fn placeholder_organization() -> &'static str {
        "Unknown Organization"
    }

    /// Sets the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the organization.
    #[must_use]
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = organization.into();
        self
    }

    /// Sets the source URL.
    #[must_use]
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }
}
