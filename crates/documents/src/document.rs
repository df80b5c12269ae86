use crate::property::PropertyDocument;
use crate::section::SectionTarget;
use crate::unit::UnitDocument;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Address of one stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DocumentKey {
    Property(Uuid),
    Unit(Uuid),
    Section(Uuid),
}

/// A listing result: either a property or a unit document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexedDocument {
    Property(PropertyDocument),
    Unit(UnitDocument),
}

impl IndexedDocument {
    #[must_use]
    pub fn id(&self) -> Uuid {
        match self {
            IndexedDocument::Property(doc) => doc.id,
            IndexedDocument::Unit(doc) => doc.id,
        }
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        match self {
            IndexedDocument::Property(doc) => doc.version,
            IndexedDocument::Unit(doc) => doc.version,
        }
    }

    #[must_use]
    pub fn target(&self) -> SectionTarget {
        match self {
            IndexedDocument::Property(_) => SectionTarget::Properties,
            IndexedDocument::Unit(_) => SectionTarget::Units,
        }
    }

    #[must_use]
    pub fn into_property(self) -> Option<PropertyDocument> {
        match self {
            IndexedDocument::Property(doc) => Some(doc),
            IndexedDocument::Unit(_) => None,
        }
    }

    #[must_use]
    pub fn into_unit(self) -> Option<UnitDocument> {
        match self {
            IndexedDocument::Unit(doc) => Some(doc),
            IndexedDocument::Property(_) => None,
        }
    }
}

impl From<PropertyDocument> for IndexedDocument {
    fn from(doc: PropertyDocument) -> Self {
        IndexedDocument::Property(doc)
    }
}

impl From<UnitDocument> for IndexedDocument {
    fn from(doc: UnitDocument) -> Self {
        IndexedDocument::Unit(doc)
    }
}
