//! In-memory stores shared between scenes: documents by id and the policies
//! returned alongside them.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use shared::{
    domain::{Abilities, DocumentId},
    protocol::{DocumentSummary, Policy},
};

use crate::PolicyService;

#[derive(Clone, Default)]
pub struct DocumentCache {
    documents: Arc<RwLock<HashMap<DocumentId, DocumentSummary>>>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, document: DocumentSummary) {
        let mut documents = self
            .documents
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        documents.insert(document.id.clone(), document);
    }

    pub fn get(&self, id: &DocumentId) -> Option<DocumentSummary> {
        self.documents
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(id)
            .cloned()
    }
}

#[derive(Clone, Default)]
pub struct PolicyStore {
    abilities: Arc<RwLock<HashMap<DocumentId, Abilities>>>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_policies(&self, policies: impl IntoIterator<Item = Policy>) {
        let mut abilities = self
            .abilities
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for policy in policies {
            abilities.insert(policy.id, policy.abilities);
        }
    }
}

impl PolicyService for PolicyStore {
    fn evaluate(&self, document_id: &DocumentId) -> Abilities {
        self.abilities
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(document_id)
            .copied()
            .unwrap_or_default()
    }
}
