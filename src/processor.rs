//! Schema processor
//!
//! [`SchemaProcessor`] drives root schema documents through the property
//! factory, reference resolver and composition engine. All mutable state of
//! a run lives in one [`RunContext`]: the class registry, the resolution
//! slots, the merged-property cache and the dictionaries of every document
//! seen so far. Independent runs never share state.
//!
//! A schema error aborts the current root: every class, slot and cache
//! entry created while processing it is discarded, and the error returned.
//! Other roots processed by the same processor are unaffected.

use indexmap::IndexMap;
use serde_json::Value;
use std::rc::Rc;
use tracing::{debug, info};

use crate::composition::MergedPropertyCache;
use crate::config::GeneratorConfig;
use crate::dictionary::SchemaDefinitionDictionary;
use crate::error::{Error, Result};
use crate::factory::object;
use crate::filters::FilterRegistry;
use crate::locations::Location;
use crate::model::{ClassRef, ClassRegistry, GeneratedModel, PropertySlots};
use crate::names;
use crate::node::SchemaNode;
use crate::provider::SchemaProvider;

/// Mutable state of one generation run
pub struct RunContext<'a> {
    pub(crate) config: &'a GeneratorConfig,
    pub(crate) filters: &'a FilterRegistry,
    pub(crate) provider: Option<&'a dyn SchemaProvider>,
    pub(crate) registry: ClassRegistry,
    pub(crate) slots: PropertySlots,
    pub(crate) merged: MergedPropertyCache,
    pub(crate) documents: IndexMap<String, Rc<SchemaDefinitionDictionary>>,
    depth: usize,
}

/// Saved run state, used to discard a failed root
#[derive(Debug, Clone, Copy)]
struct RunCheckpoint {
    registry: crate::model::RegistryCheckpoint,
    slots: usize,
    documents: usize,
}

impl<'a> RunContext<'a> {
    /// Create an empty context
    pub fn new(config: &'a GeneratorConfig, filters: &'a FilterRegistry) -> Self {
        Self {
            config,
            filters,
            provider: None,
            registry: ClassRegistry::new(),
            slots: PropertySlots::new(),
            merged: MergedPropertyCache::new(),
            documents: IndexMap::new(),
            depth: 0,
        }
    }

    /// Configuration of the run
    pub fn config(&self) -> &GeneratorConfig {
        self.config
    }

    /// Resolution slots
    pub fn slots(&self) -> &PropertySlots {
        &self.slots
    }

    /// Classes built so far
    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// Merged properties built so far
    pub fn merged(&self) -> &MergedPropertyCache {
        &self.merged
    }

    /// Enter one level of property factory recursion
    pub(crate) fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if let Err(err) = self.config.limits.check_resolution_depth(self.depth) {
            self.depth -= 1;
            return Err(err);
        }
        Ok(())
    }

    /// Leave one level of property factory recursion
    pub(crate) fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Class path for a document: namespace prefix plus its directory below the base path
    pub fn class_path_for(&self, origin: &Location) -> Vec<String> {
        let mut path = self.config.namespace_segments();
        if let (Some(base), Location::Path(file)) =
            (self.provider.and_then(|p| p.base_path()), origin)
        {
            if let Some(parent) = file.parent().and_then(|dir| dir.strip_prefix(base).ok()) {
                path.extend(
                    parent
                        .components()
                        .map(|c| names::ucfirst(&names::attribute_name(&c.as_os_str().to_string_lossy()))),
                );
            }
        }
        path
    }

    /// Root class of a document
    fn root_class(&self, node: &SchemaNode) -> ClassRef {
        let stem = node
            .origin()
            .file_stem()
            .unwrap_or_else(|| "schema".to_string());
        let id = node.get("$id").and_then(Value::as_str);
        ClassRef::new(names::root_class_name(id, &stem), self.class_path_for(node.origin()))
    }

    /// Dictionary of a document, built on first use
    fn dictionary_for(&mut self, node: &SchemaNode, class: Option<ClassRef>) -> Rc<SchemaDefinitionDictionary> {
        let key = node.origin().as_str();
        if let Some(existing) = self.documents.get(&key) {
            return Rc::clone(existing);
        }
        let owner = class.unwrap_or_else(|| self.root_class(node));
        let dictionary = Rc::new(SchemaDefinitionDictionary::build(node, owner));
        self.documents.insert(key, Rc::clone(&dictionary));
        dictionary
    }

    /// Dictionary of a document named by a cross-file reference
    pub(crate) fn external_dictionary(
        &mut self,
        document: &str,
        origin: &Location,
    ) -> Result<Rc<SchemaDefinitionDictionary>> {
        let provider = self.provider.ok_or_else(|| {
            Error::schema(format!(
                "External reference '{}' requires a schema provider",
                document
            ))
        })?;

        let location = provider.locate(document, origin)?;
        if let Some(existing) = self.documents.get(&location.as_str()) {
            return Ok(Rc::clone(existing));
        }

        let node = provider.fetch(document, origin)?.normalize();
        debug!(document, location = %node.origin(), "loaded external schema");
        Ok(self.dictionary_for(&node, None))
    }

    fn checkpoint(&self) -> RunCheckpoint {
        RunCheckpoint {
            registry: self.registry.checkpoint(),
            slots: self.slots.len(),
            documents: self.documents.len(),
        }
    }

    fn rollback(&mut self, checkpoint: RunCheckpoint) {
        self.registry.rollback(checkpoint.registry);
        self.slots.truncate(checkpoint.slots);
        self.documents.truncate(checkpoint.documents);
        for dictionary in self.documents.values() {
            dictionary.retain_slots_below(checkpoint.slots);
        }
        self.merged.retain_registered(&self.registry);
        self.depth = 0;
    }
}

/// Entry point for building a model from root schema documents
pub struct SchemaProcessor<'a> {
    ctx: RunContext<'a>,
}

impl<'a> SchemaProcessor<'a> {
    /// Create a processor for one run
    pub fn new(config: &'a GeneratorConfig, filters: &'a FilterRegistry) -> Self {
        Self {
            ctx: RunContext::new(config, filters),
        }
    }

    /// Resolve cross-file references through a provider
    pub fn with_provider(mut self, provider: &'a dyn SchemaProvider) -> Self {
        self.ctx.provider = Some(provider);
        self
    }

    /// Run state
    pub fn context(&self) -> &RunContext<'a> {
        &self.ctx
    }

    /// Process a root document; the class path follows its location
    pub fn process(&mut self, node: &SchemaNode) -> Result<ClassRef> {
        let class = self.ctx.root_class(node);
        self.process_class(node, class)
    }

    /// Process a root document under an explicit class path
    pub fn process_with_path(&mut self, node: &SchemaNode, class_path: Vec<String>) -> Result<ClassRef> {
        let class = ClassRef::new(self.ctx.root_class(node).class_name(), class_path);
        self.process_class(node, class)
    }

    fn process_class(&mut self, node: &SchemaNode, class: ClassRef) -> Result<ClassRef> {
        if !node.is_object() {
            return Err(node.error("Root schema must be an object").into());
        }
        let node = node.normalize();
        let checkpoint = self.ctx.checkpoint();

        let dictionary = self.ctx.dictionary_for(&node, Some(class));
        let class = dictionary.owner().clone();
        if self.ctx.config.output_enabled {
            info!(class = %class, origin = %node.origin(), "processing schema");
        } else {
            debug!(class = %class, origin = %node.origin(), "processing schema");
        }

        match object::process_class(&mut self.ctx, &dictionary, &node, class, false) {
            Ok(class) => Ok(class),
            Err(err) => {
                debug!(origin = %node.origin(), error = %err, "discarding failed schema");
                self.ctx.rollback(checkpoint);
                Err(err)
            }
        }
    }

    /// Freeze the run into a model
    pub fn finish(self) -> Result<GeneratedModel> {
        let ctx = self.ctx;
        let dictionaries = ctx.documents.into_values().collect();
        ctx.registry.into_model(ctx.slots, dictionaries)
    }
}
