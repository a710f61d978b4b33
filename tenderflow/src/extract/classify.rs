//! Keyword classification of tender type and lifecycle status.

use crate::models::{TenderStatus, TenderType};
use serde::{Deserialize, Serialize};

/// One keyword group backing a tender type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeGroup {
    /// The type this group votes for.
    pub tender_type: TenderType,
    /// Keywords counted as hits, matched as lowercase substrings.
    pub keywords: Vec<String>,
}

/// One keyword group backing a lifecycle status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusGroup {
    /// The status this group signals.
    pub status: TenderStatus,
    /// Keywords checked as lowercase substrings of the page text.
    pub keywords: Vec<String>,
}

/// Keyword sets and priority orders for classification.
///
/// Group order is load-bearing: for types it is the tie-break priority,
/// for statuses it is the evaluation order and the first group with any
/// hit wins. Both orderings are plain data, so callers with different
/// portals can replace them wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierPolicy {
    /// Type keyword groups, in tie-break priority order.
    pub type_groups: Vec<TypeGroup>,
    /// Status keyword groups, in evaluation order.
    pub status_groups: Vec<StatusGroup>,
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        let keywords = |words: &[&str]| words.iter().map(ToString::to_string).collect();
        Self {
            type_groups: vec![
                TypeGroup {
                    tender_type: TenderType::Works,
                    keywords: keywords(&[
                        "construction",
                        "building",
                        "road",
                        "bridge",
                        "repair",
                        "maintenance",
                    ]),
                },
                TypeGroup {
                    tender_type: TenderType::Goods,
                    keywords: keywords(&[
                        "supply",
                        "purchase",
                        "procurement",
                        "equipment",
                        "goods",
                    ]),
                },
                TypeGroup {
                    tender_type: TenderType::Services,
                    keywords: keywords(&[
                        "consultancy",
                        "service",
                        "management",
                        "operation",
                        "audit",
                    ]),
                },
            ],
            status_groups: vec![
                StatusGroup {
                    status: TenderStatus::Awarded,
                    keywords: keywords(&["awarded", "winner", "awardee"]),
                },
                StatusGroup {
                    status: TenderStatus::Closed,
                    keywords: keywords(&["closed", "expired", "deadline passed"]),
                },
                StatusGroup {
                    status: TenderStatus::Cancelled,
                    keywords: keywords(&["cancelled", "canceled", "withdrawn"]),
                },
                StatusGroup {
                    status: TenderStatus::InProgress,
                    keywords: keywords(&["in progress", "active", "open"]),
                },
            ],
        }
    }
}

impl ClassifierPolicy {
    /// Classifies a tender's type from its descriptive text.
    ///
    /// Counts keyword hits per group over the lowercased concatenation of
    /// title, organization, and description. The group with the most hits
    /// wins; ties go to the earlier group. Zero hits across all groups
    /// yields [`TenderType::Unknown`].
    #[must_use]
    pub fn classify_type(
        &self,
        title: &str,
        organization: &str,
        description: &str,
    ) -> TenderType {
        let mut text = String::new();
        for part in [title, organization, description] {
            if part.is_empty() {
                continue;
            }
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(part);
        }
        let text = text.to_lowercase();

        let counts: Vec<usize> = self
            .type_groups
            .iter()
            .map(|group| {
                group
                    .keywords
                    .iter()
                    .filter(|kw| text.contains(kw.as_str()))
                    .count()
            })
            .collect();

        let max = counts.iter().copied().max().unwrap_or(0);
        if max == 0 {
            return TenderType::Unknown;
        }
        self.type_groups
            .iter()
            .zip(&counts)
            .find(|(_, count)| **count == max)
            .map_or(TenderType::Unknown, |(group, _)| group.tender_type)
    }

    /// Classifies a tender's status from the full page text.
    ///
    /// Groups are checked in order; the first with any keyword present in
    /// the lowercased text wins. No hit yields [`TenderStatus::Unknown`].
    #[must_use]
    pub fn classify_status(&self, page_text: &str) -> TenderStatus {
        let text = page_text.to_lowercase();
        for group in &self.status_groups {
            if group.keywords.iter().any(|kw| text.contains(kw.as_str())) {
                return group.status;
            }
        }
        TenderStatus::Unknown
    }
}
