use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::error::CatalogError;
use crate::models::QuestionnaireItem;

const BUILTIN_ITEMS: &[(&str, &str, &str)] = &[
    (
        "Q1",
        "Does the agency have formal governance bodies (committees, boards, councils)?",
        "Governance",
    ),
    (
        "Q2",
        "Are the key processes mapped and documented?",
        "Processes",
    ),
    (
        "Q3",
        "Is data used systematically to support management decisions?",
        "Data",
    ),
    (
        "Q4",
        "Are there structured training actions for the use of digital technologies?",
        "People",
    ),
    (
        "Q5",
        "Are the information systems integrated and able to exchange data?",
        "Technology",
    ),
    (
        "Q6",
        "Are strategic goals monitored through periodic indicators?",
        "Institutional governance",
    ),
    (
        "Q7",
        "Is someone formally accountable for the quality of the agency's data?",
        "Data management",
    ),
    (
        "Q8",
        "Is an up-to-date inventory of the agency's systems and IT assets maintained?",
        "Information technology",
    ),
];

/// Catalog-side label → benchmark label.
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("Institutional governance", "Governance"),
    ("Data management", "Data"),
    ("Information technology", "Technology"),
];

#[derive(Debug, Clone)]
pub struct Catalog {
    items: Vec<QuestionnaireItem>,
}

impl Catalog {
    pub fn builtin() -> Self {
        let items = BUILTIN_ITEMS
            .iter()
            .map(|(id, prompt, dimension)| QuestionnaireItem::new(id, prompt, dimension))
            .collect();
        Self { items }
    }

    pub fn from_items(items: Vec<QuestionnaireItem>) -> Result<Self, CatalogError> {
        if items.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        for (index, item) in items.iter().enumerate() {
            let row = index + 1;
            if item.id.as_str().is_empty() {
                return Err(CatalogError::BlankField { row, field: "id" });
            }
            if item.prompt.trim().is_empty() {
                return Err(CatalogError::BlankField { row, field: "prompt" });
            }
            if item.dimension.trim().is_empty() {
                return Err(CatalogError::BlankField {
                    row,
                    field: "dimension",
                });
            }
            if !seen.insert(item.id.clone()) {
                return Err(CatalogError::DuplicateId(item.id.clone()));
            }
        }

        Ok(Self { items })
    }

    pub fn from_csv(path: &Path) -> Result<Self, CatalogError> {
        #[derive(serde::Deserialize)]
        struct CsvRow {
            id: String,
            prompt: String,
            dimension: String,
        }

        let read_err = |source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::Reader::from_path(path).map_err(read_err)?;
        let mut items = Vec::new();
        for result in reader.deserialize::<CsvRow>() {
            let row = result.map_err(read_err)?;
            items.push(QuestionnaireItem::new(
                &row.id,
                row.prompt.trim(),
                row.dimension.trim(),
            ));
        }

        Self::from_items(items)
    }

    pub fn items(&self) -> &[QuestionnaireItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn page_count(&self, page_size: usize) -> usize {
        let page_size = page_size.max(1);
        self.items.len().div_ceil(page_size)
    }

    /// Items on a zero-based page, in catalog order. Out-of-range pages are empty.
    pub fn page(&self, index: usize, page_size: usize) -> &[QuestionnaireItem] {
        let page_size = page_size.max(1);
        let start = index.saturating_mul(page_size).min(self.items.len());
        let end = start.saturating_add(page_size).min(self.items.len());
        &self.items[start..end]
    }
}

#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    aliases: BTreeMap<String, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut table = Self::new();
        for (alias, canonical) in BUILTIN_ALIASES {
            table.insert(alias, canonical);
        }
        table
    }

    pub fn insert(&mut self, alias: &str, canonical: &str) {
        self.aliases
            .insert(alias.trim().to_string(), canonical.trim().to_string());
    }

    /// Merge `alias,canonical` rows from a CSV file over the current table.
    pub fn extend_from_csv(&mut self, path: &Path) -> Result<usize, CatalogError> {
        #[derive(serde::Deserialize)]
        struct CsvRow {
            alias: String,
            canonical: String,
        }

        let read_err = |source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::Reader::from_path(path).map_err(read_err)?;
        let mut added = 0usize;
        for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
            let row = result.map_err(read_err)?;
            let blank = if row.alias.trim().is_empty() {
                Some("alias")
            } else if row.canonical.trim().is_empty() {
                Some("canonical")
            } else {
                None
            };
            if let Some(field) = blank {
                return Err(CatalogError::BlankField {
                    row: index + 1,
                    field,
                });
            }
            self.insert(&row.alias, &row.canonical);
            added += 1;
        }
        Ok(added)
    }

    pub fn resolve<'a>(&'a self, label: &'a str) -> &'a str {
        let label = label.trim();
        self.aliases.get(label).map(String::as_str).unwrap_or(label)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
