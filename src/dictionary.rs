//! Schema definition dictionary and reference resolution
//!
//! One [`SchemaDefinitionDictionary`] is built per schema document. It holds
//! the root node, every top-level keyword that contains sub-schemas (so
//! `#/definitions/X`, `#/$defs/X` and `#/properties/x` resolve by walking a
//! path) and every node carrying an `$id`.
//!
//! [`SchemaDefinition::resolve`] reserves a pending slot before building the
//! referenced fragment, which is what lets self- and mutually-recursive
//! schemas terminate: a nested reference to the same path finds the pending
//! slot and returns a proxy instead of recursing again.

use indexmap::IndexMap;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::factory::{PropertyFactory, RequiredSet, SchemaScope};
use crate::locations::Location;
use crate::model::{ClassRef, PropertyHandle, PropertyProxy, SlotId};
use crate::node::SchemaNode;
use crate::processor::RunContext;

/// Keywords whose values are literals, never searched for `$id`
const LITERAL_KEYWORDS: &[&str] = &["const", "enum", "default", "examples"];

/// Key of the document root
pub const ROOT_KEY: &str = "#";

/// A parsed `$ref` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Document part before `#`, if the reference leaves the current file
    pub document: Option<String>,
    /// Dictionary key
    pub key: String,
    /// Remaining pointer segments below the key
    pub path: Vec<String>,
}

impl Reference {
    /// Parse a reference
    ///
    /// - `#` is the document root
    /// - `#/definitions/a/b` is key `definitions`, path `[a, b]`
    /// - `#Name` and bare names are `$id` lookups
    /// - `file.json#/pointer` and `file.json` leave the document
    pub fn parse(reference: &str) -> Result<Self> {
        let (document, fragment) = match reference.split_once('#') {
            Some((document, fragment)) => (document, Some(fragment)),
            None if reference.ends_with(".json") || reference.contains('/') => (reference, None),
            None => ("", Some(reference)),
        };
        let document = (!document.is_empty()).then(|| document.to_string());

        let fragment = match fragment {
            None | Some("") | Some("/") => {
                return Ok(Self {
                    document,
                    key: ROOT_KEY.to_string(),
                    path: Vec::new(),
                })
            }
            Some(fragment) => fragment,
        };

        let Some(pointer) = fragment.strip_prefix('/') else {
            return Ok(Self {
                document,
                key: fragment.to_string(),
                path: Vec::new(),
            });
        };

        let mut segments = pointer
            .split('/')
            .map(decode_segment)
            .collect::<Result<Vec<_>>>()?
            .into_iter();
        let key = segments.next().unwrap_or_default();
        Ok(Self {
            document,
            key,
            path: segments.collect(),
        })
    }
}

/// Decode `~1`, `~0` and percent-encoding in one pointer segment
fn decode_segment(segment: &str) -> Result<String> {
    let decoded = urlencoding::decode(segment)
        .map_err(|e| Error::schema(format!("Invalid reference segment '{}': {}", segment, e)))?;
    Ok(decoded.replace("~1", "/").replace("~0", "~"))
}

/// One definable structure and its resolution cache
#[derive(Debug)]
pub struct SchemaDefinition {
    key: String,
    node: SchemaNode,
    owner: ClassRef,
    cache: RefCell<HashMap<String, SlotId>>,
}

impl SchemaDefinition {
    fn new(key: impl Into<String>, node: SchemaNode, owner: ClassRef) -> Self {
        Self {
            key: key.into(),
            node,
            owner,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Dictionary key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Raw structure
    pub fn node(&self) -> &SchemaNode {
        &self.node
    }

    /// Class owning nested classes created from this definition
    pub fn owner(&self) -> &ClassRef {
        &self.owner
    }

    /// Slot cached for a path key
    pub fn cached(&self, path_key: &str) -> Option<SlotId> {
        self.cache.borrow().get(path_key).copied()
    }

    /// Number of cached resolutions
    pub fn cache_len(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Resolve a path below this definition into a proxy
    ///
    /// Each `(definition, path)` pair is built at most once; later calls
    /// return a new proxy onto the same slot. On failure the cache entry is
    /// removed before the error is propagated.
    pub fn resolve(
        &self,
        ctx: &mut RunContext<'_>,
        dictionary: &Rc<SchemaDefinitionDictionary>,
        property_name: &str,
        path: &[String],
    ) -> Result<PropertyHandle> {
        let node = self.walk(path)?;
        let path_key = path.join("-");
        let label = if path_key.is_empty() {
            self.key.clone()
        } else {
            format!("{}-{}", self.key, path_key)
        };

        if let Some(slot) = self.cached(&path_key) {
            debug!(reference = %label, pending = ctx.slots.slot(slot).is_some_and(|s| s.state().is_pending()), "reference cache hit");
            return Ok(PropertyProxy::new(property_name, label, slot).into());
        }

        let slot = ctx.slots.reserve(label.clone());
        self.cache.borrow_mut().insert(path_key.clone(), slot);
        debug!(reference = %label, "reference pending");

        let scope = SchemaScope::new(self.owner.clone(), Rc::clone(dictionary));
        match PropertyFactory::create(ctx, &scope, &RequiredSet::default(), property_name, &node) {
            Ok(property) => {
                ctx.slots.resolve(slot, property);
                debug!(reference = %label, "reference resolved");
            }
            Err(err) => {
                ctx.slots.fail(slot, err.to_string());
                self.cache.borrow_mut().remove(&path_key);
                debug!(reference = %label, "reference failed");
                return Err(err);
            }
        }

        Ok(PropertyProxy::new(property_name, label, slot).into())
    }

    fn walk(&self, path: &[String]) -> Result<SchemaNode> {
        let mut current = self.node.clone();
        for segment in path {
            current = current.navigate(segment).ok_or_else(|| {
                current.error(format!("Unresolved path segment: '{}' in '{}'", segment, self.key))
            })?;
        }
        Ok(current)
    }

    pub(crate) fn retain_slots_below(&self, len: usize) {
        self.cache.borrow_mut().retain(|_, slot| slot.index() < len);
    }
}

/// Every addressable structure of one schema document
#[derive(Debug)]
pub struct SchemaDefinitionDictionary {
    origin: Location,
    owner: ClassRef,
    definitions: IndexMap<String, SchemaDefinition>,
}

impl SchemaDefinitionDictionary {
    /// Register the root, top-level sub-schema containers and `$id` nodes
    pub fn build(root: &SchemaNode, owner: ClassRef) -> Self {
        let mut definitions = IndexMap::new();
        definitions.insert(
            ROOT_KEY.to_string(),
            SchemaDefinition::new(ROOT_KEY, root.clone(), owner.clone()),
        );

        if let Value::Object(map) = root.content() {
            for (key, value) in map {
                if !(value.is_object() || value.is_array()) || LITERAL_KEYWORDS.contains(&key.as_str()) {
                    continue;
                }
                if let Some(node) = root.navigate(key) {
                    definitions
                        .entry(key.clone())
                        .or_insert_with(|| SchemaDefinition::new(key.clone(), node, owner.clone()));
                }
            }
        }

        let mut identified = Vec::new();
        collect_ids(root, &mut identified);
        for (id, node) in identified {
            let bare = id.trim_start_matches('#').to_string();
            for key in [bare.clone(), format!("#{}", bare), id] {
                if key.is_empty() || key == ROOT_KEY {
                    continue;
                }
                definitions
                    .entry(key.clone())
                    .or_insert_with(|| SchemaDefinition::new(key, node.clone(), owner.clone()));
            }
        }

        debug!(origin = %root.origin(), definitions = definitions.len(), "built definition dictionary");

        Self {
            origin: root.origin().clone(),
            owner,
            definitions,
        }
    }

    /// Document this dictionary was built from
    pub fn origin(&self) -> &Location {
        &self.origin
    }

    /// Root class of the document
    pub fn owner(&self) -> &ClassRef {
        &self.owner
    }

    /// Definition by key
    pub fn get_definition(&self, key: &str) -> Option<&SchemaDefinition> {
        self.definitions.get(key)
    }

    /// Registered keys
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// Number of definitions
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the dictionary is empty
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Locate the definition and path for a parsed reference
    ///
    /// An `$id` equal to the whole reference wins over pointer parsing.
    pub fn locate(&self, raw: &str, reference: &Reference) -> Option<(&SchemaDefinition, Vec<String>)> {
        if let Some(definition) = self.definitions.get(raw) {
            return Some((definition, Vec::new()));
        }
        self.definitions
            .get(&reference.key)
            .map(|definition| (definition, reference.path.clone()))
    }

    /// Whether a reference's document part names this dictionary's document
    pub fn is_same_document(&self, document: &str) -> bool {
        if self.definitions.contains_key(document) {
            return true;
        }
        let name = document.rsplit('/').next().unwrap_or(document);
        match &self.origin {
            Location::Path(path) => path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|file| file == name),
            other => other.as_str() == document || other.as_str().ends_with(&format!("/{}", name)),
        }
    }

    pub(crate) fn retain_slots_below(&self, len: usize) {
        for definition in self.definitions.values() {
            definition.retain_slots_below(len);
        }
    }
}

/// Collect `(id, node)` for every nested node carrying an `$id`
fn collect_ids(node: &SchemaNode, out: &mut Vec<(String, SchemaNode)>) {
    match node.content() {
        Value::Object(map) => {
            if node.pointer() != ROOT_KEY {
                if let Some(id) = map.get("$id").and_then(Value::as_str) {
                    out.push((id.to_string(), node.clone()));
                }
            }
            for (key, value) in map {
                if LITERAL_KEYWORDS.contains(&key.as_str()) || !(value.is_object() || value.is_array()) {
                    continue;
                }
                if let Some(child) = node.navigate(key) {
                    collect_ids(&child, out);
                }
            }
        }
        Value::Array(items) => {
            for index in 0..items.len() {
                if let Some(child) = node.navigate(&index.to_string()) {
                    collect_ids(&child, out);
                }
            }
        }
        _ => {}
    }
}
