//! Generated classes
//!
//! A [`Schema`] is one class handed to a renderer. Classes are created in a
//! [`ClassRegistry`] while a run is in progress: a class is reserved before
//! its members are built so that recursive references find it, then
//! completed. [`GeneratedModel`] is the frozen result of a run.

use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

use super::property::{PropertyHandle, PropertySlots};
use super::validator::{insert_ordered, Validator, ValidatorKind};
use crate::dictionary::SchemaDefinitionDictionary;
use crate::error::{Error, Result};
use crate::node::SchemaNode;

/// Name and namespace of a generated class
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassRef {
    class_name: String,
    class_path: Vec<String>,
}

impl ClassRef {
    /// Create a class reference
    pub fn new(class_name: impl Into<String>, class_path: Vec<String>) -> Self {
        Self {
            class_name: class_name.into(),
            class_path,
        }
    }

    /// Same namespace, different name
    pub fn sibling(&self, class_name: impl Into<String>) -> Self {
        Self::new(class_name, self.class_path.clone())
    }

    /// Bare class name
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Namespace segments
    pub fn class_path(&self) -> &[String] {
        &self.class_path
    }

    /// Dot-separated fully-qualified name
    pub fn fqcn(&self) -> String {
        if self.class_path.is_empty() {
            self.class_name.clone()
        } else {
            format!("{}.{}", self.class_path.join("."), self.class_name)
        }
    }
}

impl fmt::Display for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fqcn())
    }
}

/// One generated class
#[derive(Debug, Clone)]
pub struct Schema {
    class: ClassRef,
    node: SchemaNode,
    properties: IndexMap<String, PropertyHandle>,
    base_validators: Vec<Validator>,
    used_classes: Vec<ClassRef>,
    dictionary: Rc<SchemaDefinitionDictionary>,
    signature: String,
}

impl Schema {
    /// Create an empty class for a schema node
    pub fn new(class: ClassRef, node: SchemaNode, dictionary: Rc<SchemaDefinitionDictionary>) -> Self {
        let signature = node.signature();
        Self {
            class,
            node,
            properties: IndexMap::new(),
            base_validators: Vec::new(),
            used_classes: Vec::new(),
            dictionary,
            signature,
        }
    }

    /// Class reference
    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    /// Bare class name
    pub fn class_name(&self) -> &str {
        self.class.class_name()
    }

    /// Namespace segments
    pub fn class_path(&self) -> &[String] {
        self.class.class_path()
    }

    /// Source node
    pub fn node(&self) -> &SchemaNode {
        &self.node
    }

    /// Members by JSON name
    pub fn properties(&self) -> &IndexMap<String, PropertyHandle> {
        &self.properties
    }

    /// Look up a member
    pub fn property(&self, name: &str) -> Option<&PropertyHandle> {
        self.properties.get(name)
    }

    /// Add a member; an existing name is kept and `false` returned
    pub fn add_property(&mut self, property: PropertyHandle) -> bool {
        if self.properties.contains_key(property.name()) {
            return false;
        }
        self.properties.insert(property.name().to_string(), property);
        true
    }

    /// Object-level validators, applied to the whole input before members
    pub fn base_validators(&self) -> &[Validator] {
        &self.base_validators
    }

    /// Add an object-level validator at its priority position
    pub fn add_base_validator(&mut self, validator: Validator) {
        insert_ordered(&mut self.base_validators, validator);
    }

    /// Other classes referenced by this class
    pub fn used_classes(&self) -> &[ClassRef] {
        &self.used_classes
    }

    /// Definitions of the document this class came from
    pub fn schema_dictionary(&self) -> &Rc<SchemaDefinitionDictionary> {
        &self.dictionary
    }

    /// Structural signature of the source node
    pub fn signature(&self) -> &str {
        &self.signature
    }

    fn collect_used_classes(&mut self, slots: &PropertySlots) {
        let mut found = BTreeSet::new();
        for property in self.properties.values() {
            collect_classes(property, slots, &mut found, 0);
        }
        for validator in &self.base_validators {
            collect_validator_classes(&validator.kind, slots, &mut found, 0);
        }
        found.remove(&self.class);
        self.used_classes = found.into_iter().collect();
    }
}

const MAX_COLLECT_DEPTH: usize = 16;

fn collect_classes(
    handle: &PropertyHandle,
    slots: &PropertySlots,
    found: &mut BTreeSet<ClassRef>,
    depth: usize,
) {
    if depth > MAX_COLLECT_DEPTH {
        return;
    }
    let Ok(property) = handle.resolve(slots) else {
        return;
    };
    if let Some(class) = property.nested_schema() {
        found.insert(class.clone());
        return;
    }
    for validator in property.validators() {
        collect_validator_classes(&validator.kind, slots, found, depth + 1);
    }
    if let PropertyHandle::Proxy(proxy) = handle {
        for validator in proxy.local_validators() {
            collect_validator_classes(&validator.kind, slots, found, depth + 1);
        }
    }
}

fn collect_validator_classes(
    kind: &ValidatorKind,
    slots: &PropertySlots,
    found: &mut BTreeSet<ClassRef>,
    depth: usize,
) {
    for nested in kind.nested_properties() {
        collect_classes(nested, slots, found, depth);
    }
    if let ValidatorKind::Composition(composition) = kind {
        if let Some(class) = composition.merged.as_ref().and_then(|m| m.nested_schema()) {
            found.insert(class.clone());
        }
    }
}

/// Saved registry size, used to discard the classes of a failed root
#[derive(Debug, Clone, Copy)]
pub struct RegistryCheckpoint {
    classes: usize,
}

/// Classes of a run in progress
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: IndexMap<String, Option<Schema>>,
    by_signature: HashMap<String, ClassRef>,
}

impl ClassRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a class name; `false` if the class already exists
    pub fn reserve(&mut self, class: &ClassRef, signature: Option<&str>) -> bool {
        let fqcn = class.fqcn();
        if self.classes.contains_key(&fqcn) {
            return false;
        }
        self.classes.insert(fqcn, None);
        if let Some(signature) = signature {
            self.by_signature
                .entry(signature.to_string())
                .or_insert_with(|| class.clone());
        }
        true
    }

    /// Store a finished class under its reserved name
    pub fn complete(&mut self, schema: Schema) -> Result<()> {
        let fqcn = schema.class().fqcn();
        match self.classes.get_mut(&fqcn) {
            Some(slot @ None) => {
                *slot = Some(schema);
                Ok(())
            }
            Some(Some(_)) => Err(Error::schema(format!("Class '{}' completed twice", fqcn))),
            None => Err(Error::schema(format!("Class '{}' was never reserved", fqcn))),
        }
    }

    /// Class previously registered for a structural signature
    pub fn find_by_signature(&self, signature: &str) -> Option<&ClassRef> {
        self.by_signature.get(signature)
    }

    /// Check whether a class name is reserved or complete
    pub fn contains(&self, class: &ClassRef) -> bool {
        self.classes.contains_key(&class.fqcn())
    }

    /// Finished class; `None` while under construction or unknown
    pub fn get(&self, class: &ClassRef) -> Option<&Schema> {
        self.classes.get(&class.fqcn()).and_then(Option::as_ref)
    }

    /// Number of reserved classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Save the current size
    pub fn checkpoint(&self) -> RegistryCheckpoint {
        RegistryCheckpoint {
            classes: self.classes.len(),
        }
    }

    /// Drop every class reserved after the checkpoint
    pub fn rollback(&mut self, checkpoint: RegistryCheckpoint) {
        self.classes.truncate(checkpoint.classes);
        let classes = &self.classes;
        self.by_signature
            .retain(|_, class| classes.contains_key(&class.fqcn()));
    }

    /// Freeze into a model
    pub fn into_model(
        self,
        slots: PropertySlots,
        dictionaries: Vec<Rc<SchemaDefinitionDictionary>>,
    ) -> Result<GeneratedModel> {
        let mut classes = IndexMap::new();
        for (fqcn, schema) in self.classes {
            let mut schema = schema
                .ok_or_else(|| Error::schema(format!("Class '{}' was never completed", fqcn)))?;
            schema.collect_used_classes(&slots);
            classes.insert(fqcn, schema);
        }
        Ok(GeneratedModel {
            classes,
            slots,
            dictionaries,
        })
    }
}

/// Finished class graph of one run
#[derive(Debug)]
pub struct GeneratedModel {
    classes: IndexMap<String, Schema>,
    slots: PropertySlots,
    dictionaries: Vec<Rc<SchemaDefinitionDictionary>>,
}

impl GeneratedModel {
    /// Classes in generation order
    pub fn classes(&self) -> impl Iterator<Item = &Schema> {
        self.classes.values()
    }

    /// Look up a class by fully-qualified name
    pub fn get(&self, fqcn: &str) -> Option<&Schema> {
        self.classes.get(fqcn)
    }

    /// Look up a class by reference
    pub fn class(&self, class: &ClassRef) -> Option<&Schema> {
        self.get(&class.fqcn())
    }

    /// Class by reference, as an error when missing
    pub fn require_class(&self, class: &ClassRef) -> Result<&Schema> {
        self.class(class)
            .ok_or_else(|| Error::schema(format!("Unknown class '{}'", class)))
    }

    /// Fully-qualified names in generation order
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether no class was generated
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Resolution slots shared by every proxy in the model
    pub fn slots(&self) -> &PropertySlots {
        &self.slots
    }

    /// Dictionaries of every processed document
    pub fn dictionaries(&self) -> &[Rc<SchemaDefinitionDictionary>] {
        &self.dictionaries
    }

    /// Follow a handle to its property
    pub fn resolve<'a>(&'a self, handle: &'a PropertyHandle) -> Result<&'a super::Property> {
        handle.resolve(&self.slots)
    }

    /// Members of an object-typed property's class
    pub fn nested_properties<'a>(
        &'a self,
        handle: &'a PropertyHandle,
    ) -> Option<&'a IndexMap<String, PropertyHandle>> {
        let class = handle.nested_schema(&self.slots)?;
        self.class(class).map(Schema::properties)
    }
}
