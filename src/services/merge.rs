//! Page-stream concatenation of PDF documents.
//!
//! Every input is parsed, its objects renumbered past the objects already
//! collected, and its pages appended in document order under a freshly built
//! page tree. Nothing is re-rendered: page content streams are carried over
//! byte for byte.

use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;
use thiserror::Error;

/// Attributes a page may inherit from its ancestors in the page tree. They
/// are copied onto each page because the original tree is discarded.
const INHERITABLE_ATTRIBUTES: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guards against cyclic `Parent` chains in malformed files.
const MAX_TREE_DEPTH: usize = 64;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("No documents to merge")]
    NoDocuments,

    #[error("Document '{label}' could not be parsed: {reason}")]
    Parse { label: String, reason: String },

    #[error("Document '{label}' is encrypted")]
    Encrypted { label: String },

    #[error("Document '{label}' has no pages")]
    EmptyDocument { label: String },

    #[error("Merged document could not be written: {0}")]
    Write(String),
}

/// One document to merge. `label` identifies it in errors and logs only.
#[derive(Debug, Clone)]
pub struct MergeInput {
    pub label: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct MergeOutput {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub documents: usize,
}

/// Concatenates `inputs` in order. The output holds the pages of the first
/// input, then the pages of the second, and so on.
pub fn merge_documents(inputs: &[MergeInput]) -> Result<MergeOutput, MergeError> {
    if inputs.is_empty() {
        return Err(MergeError::NoDocuments);
    }

    let mut max_id = 1;
    let mut page_ids: Vec<ObjectId> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for input in inputs {
        let mut doc = Document::load_mem(&input.bytes).map_err(|e| MergeError::Parse {
            label: input.label.clone(),
            reason: e.to_string(),
        })?;

        if doc.is_encrypted() {
            return Err(MergeError::Encrypted {
                label: input.label.clone(),
            });
        }

        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(MergeError::EmptyDocument {
                label: input.label.clone(),
            });
        }

        for &page_id in pages.values() {
            inherit_page_attributes(&mut doc, page_id);
        }

        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        // get_pages is keyed by page number, so values come out in page order.
        page_ids.extend(doc.get_pages().into_values());
        objects.extend(doc.objects);

        tracing::debug!("Collected {} pages from {}", pages.len(), input.label);
    }

    let mut merged = Document::with_version("1.5");
    merged.objects.extend(objects);
    // New ids must land above everything taken from the inputs.
    merged.max_id = max_id - 1;

    let pages_id = merged.new_object_id();
    let catalog_id = merged.new_object_id();

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(page_ids.len() as i64));
    pages.set(
        "Kids",
        Object::Array(page_ids.iter().map(|&id| Object::Reference(id)).collect()),
    );

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));

    merged.objects.insert(pages_id, Object::Dictionary(pages));
    merged.objects.insert(catalog_id, Object::Dictionary(catalog));
    merged.trailer.set("Root", Object::Reference(catalog_id));

    for &page_id in &page_ids {
        if let Ok(Object::Dictionary(page)) = merged.get_object_mut(page_id) {
            page.set("Parent", Object::Reference(pages_id));
        }
    }

    // Old catalogs and page tree nodes are now unreachable.
    merged.prune_objects();
    merged.renumber_objects();

    let page_count = merged.get_pages().len();
    let mut bytes = Vec::new();
    merged
        .save_to(&mut bytes)
        .map_err(|e| MergeError::Write(e.to_string()))?;

    Ok(MergeOutput {
        bytes,
        page_count,
        documents: inputs.len(),
    })
}

/// Copies attributes the page inherits from ancestor page tree nodes onto
/// the page dictionary itself.
fn inherit_page_attributes(doc: &mut Document, page_id: ObjectId) {
    let (mut missing, mut parent) = match doc.get_dictionary(page_id) {
        Ok(page) => (
            INHERITABLE_ATTRIBUTES
                .iter()
                .copied()
                .filter(|key| !page.has(key))
                .collect::<Vec<_>>(),
            page.get(b"Parent").and_then(Object::as_reference).ok(),
        ),
        Err(_) => return,
    };

    let mut inherited: Vec<(&'static [u8], Object)> = Vec::new();
    let mut depth = 0;
    while let Some(node_id) = parent {
        if missing.is_empty() || depth >= MAX_TREE_DEPTH {
            break;
        }
        let Ok(node) = doc.get_dictionary(node_id) else {
            break;
        };
        missing.retain(|&key| match node.get(key) {
            Ok(value) => {
                inherited.push((key, value.clone()));
                false
            }
            Err(_) => true,
        });
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }

    if inherited.is_empty() {
        return;
    }
    if let Ok(page) = doc.get_dictionary_mut(page_id) {
        for (key, value) in inherited {
            page.set(key.to_vec(), value);
        }
    }
}
