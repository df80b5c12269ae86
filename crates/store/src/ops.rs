use inventory_documents::{PropertyDocument, SectionDocument, UnitDocument, Uuid};
use serde::{Deserialize, Serialize};

/// One committed mutation, as recorded in the journal.
///
/// Puts carry the complete document including its store-assigned version,
/// so replaying the journal reproduces the exact committed state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WriteOp {
    PutProperty { doc: PropertyDocument },
    PutUnit { doc: UnitDocument },
    PutSection { doc: SectionDocument },
    DeleteProperty { id: Uuid },
    DeleteUnit { id: Uuid },
    DeleteSection { id: Uuid },
}
