use crate::ops::WriteOp;
use inventory_documents::{
    DocumentKey, IndexedDocument, PropertyDocument, SectionDocument, UnitDocument, Uuid,
};
use std::collections::{BTreeSet, HashMap};

/// The in-memory document collections plus the property → units
/// secondary index.
#[derive(Debug, Default)]
pub struct Collections {
    properties: HashMap<Uuid, PropertyDocument>,
    units: HashMap<Uuid, UnitDocument>,
    sections: HashMap<Uuid, SectionDocument>,
    units_by_property: HashMap<Uuid, BTreeSet<Uuid>>,
    last_version: u64,
}

impl Collections {
    pub(crate) fn from_parts(
        properties: Vec<PropertyDocument>,
        units: Vec<UnitDocument>,
        sections: Vec<SectionDocument>,
        last_version: u64,
    ) -> Self {
        let mut collections = Self {
            last_version,
            ..Self::default()
        };
        for doc in properties {
            collections.apply(WriteOp::PutProperty { doc });
        }
        for doc in units {
            collections.apply(WriteOp::PutUnit { doc });
        }
        for doc in sections {
            collections.apply(WriteOp::PutSection { doc });
        }
        collections
    }

    pub(crate) fn apply(&mut self, op: WriteOp) {
        match op {
            WriteOp::PutProperty { doc } => {
                self.bump(doc.version);
                self.properties.insert(doc.id, doc);
            }
            WriteOp::PutUnit { doc } => {
                self.bump(doc.version);
                if let Some(previous) = self.units.get(&doc.id) {
                    if previous.property_id != doc.property_id {
                        let (old_owner, id) = (previous.property_id, previous.id);
                        self.unlink_unit(old_owner, id);
                    }
                }
                self.units_by_property
                    .entry(doc.property_id)
                    .or_default()
                    .insert(doc.id);
                self.units.insert(doc.id, doc);
            }
            WriteOp::PutSection { doc } => {
                self.bump(doc.version);
                self.sections.insert(doc.id, doc);
            }
            WriteOp::DeleteProperty { id } => {
                self.properties.remove(&id);
            }
            WriteOp::DeleteUnit { id } => {
                if let Some(removed) = self.units.remove(&id) {
                    self.unlink_unit(removed.property_id, id);
                }
            }
            WriteOp::DeleteSection { id } => {
                self.sections.remove(&id);
            }
        }
    }

    fn bump(&mut self, version: u64) {
        self.last_version = self.last_version.max(version);
    }

    fn unlink_unit(&mut self, property_id: Uuid, unit_id: Uuid) {
        if let Some(ids) = self.units_by_property.get_mut(&property_id) {
            ids.remove(&unit_id);
            if ids.is_empty() {
                self.units_by_property.remove(&property_id);
            }
        }
    }

    #[must_use]
    pub fn property(&self, id: &Uuid) -> Option<&PropertyDocument> {
        self.properties.get(id)
    }

    #[must_use]
    pub fn unit(&self, id: &Uuid) -> Option<&UnitDocument> {
        self.units.get(id)
    }

    #[must_use]
    pub fn section(&self, id: &Uuid) -> Option<&SectionDocument> {
        self.sections.get(id)
    }

    /// Property or unit document with this id, properties first.
    #[must_use]
    pub fn document(&self, id: &Uuid) -> Option<IndexedDocument> {
        self.property(id)
            .cloned()
            .map(IndexedDocument::Property)
            .or_else(|| self.unit(id).cloned().map(IndexedDocument::Unit))
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertyDocument> {
        self.properties.values()
    }

    pub fn units(&self) -> impl Iterator<Item = &UnitDocument> {
        self.units.values()
    }

    pub fn sections(&self) -> impl Iterator<Item = &SectionDocument> {
        self.sections.values()
    }

    /// Units owned by `property_id`, ordered by unit id.
    pub fn units_of_property<'a>(
        &'a self,
        property_id: &Uuid,
    ) -> impl Iterator<Item = &'a UnitDocument> + 'a {
        self.units_by_property
            .get(property_id)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.units.get(id))
    }

    #[must_use]
    pub fn version_of(&self, key: DocumentKey) -> Option<u64> {
        match key {
            DocumentKey::Property(id) => self.properties.get(&id).map(|d| d.version),
            DocumentKey::Unit(id) => self.units.get(&id).map(|d| d.version),
            DocumentKey::Section(id) => self.sections.get(&id).map(|d| d.version),
        }
    }

    #[must_use]
    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    #[must_use]
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    #[must_use]
    pub fn last_version(&self) -> u64 {
        self.last_version
    }
}
