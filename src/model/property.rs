//! Properties, proxies and resolution slots
//!
//! Properties produced by the reference resolver are not stored inline.
//! Instead the resolver reserves a slot in [`PropertySlots`] before building
//! the referenced fragment and hands out [`PropertyProxy`] handles pointing at
//! that slot. The slot moves from `Pending` to `Resolved` (or `Failed`) once
//! the fragment is built, so self-referential schemas terminate and every
//! reference to one path observes the same property.

use serde_json::Value;

use super::schema::ClassRef;
use super::types::{JsonType, TypeHint};
use super::validator::{insert_ordered, Validator, ValidatorKind};
use crate::error::{Error, Result};

/// Longest proxy-to-proxy chain followed before reporting a cycle
const MAX_PROXY_HOPS: usize = 64;

/// Nesting depth after which type hints degrade to `Any`
const MAX_HINT_DEPTH: usize = 8;

/// Index of a slot in [`PropertySlots`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(usize);

impl SlotId {
    /// Position in the slot table
    pub fn index(&self) -> usize {
        self.0
    }
}

/// State of one reference resolution
#[derive(Debug, Clone)]
pub enum ResolutionState {
    /// Resolution in progress; the property does not exist yet
    Pending,
    /// Resolution finished
    Resolved(PropertyHandle),
    /// Resolution aborted with an error
    Failed(String),
}

impl ResolutionState {
    /// Check whether the state is still pending
    pub fn is_pending(&self) -> bool {
        matches!(self, ResolutionState::Pending)
    }
}

/// One resolution slot
#[derive(Debug, Clone)]
pub struct PropertySlot {
    key: String,
    state: ResolutionState,
}

impl PropertySlot {
    /// Definition key of the resolved path
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current state
    pub fn state(&self) -> &ResolutionState {
        &self.state
    }
}

/// Arena of resolution slots for one generation run
#[derive(Debug, Clone, Default)]
pub struct PropertySlots {
    slots: Vec<PropertySlot>,
}

impl PropertySlots {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a pending slot
    pub fn reserve(&mut self, key: impl Into<String>) -> SlotId {
        self.slots.push(PropertySlot {
            key: key.into(),
            state: ResolutionState::Pending,
        });
        SlotId(self.slots.len() - 1)
    }

    /// Store the finished property
    pub fn resolve(&mut self, id: SlotId, property: PropertyHandle) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            slot.state = ResolutionState::Resolved(property);
        }
    }

    /// Record a failed resolution
    pub fn fail(&mut self, id: SlotId, message: impl Into<String>) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            slot.state = ResolutionState::Failed(message.into());
        }
    }

    /// Look up a slot
    pub fn slot(&self, id: SlotId) -> Option<&PropertySlot> {
        self.slots.get(id.0)
    }

    /// Resolved property of a slot
    ///
    /// Reading a pending or failed slot is an error, never a panic.
    pub fn get(&self, id: SlotId) -> Result<&PropertyHandle> {
        let slot = self
            .slot(id)
            .ok_or_else(|| Error::schema(format!("Unknown resolution slot {}", id.0)))?;
        match &slot.state {
            ResolutionState::Resolved(property) => Ok(property),
            ResolutionState::Pending => Err(Error::schema(format!(
                "Reference '{}' read before its resolution finished",
                slot.key
            ))),
            ResolutionState::Failed(message) => Err(Error::schema(format!(
                "Reference '{}' failed to resolve: {}",
                slot.key, message
            ))),
        }
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots still pending
    pub fn pending(&self) -> usize {
        self.slots.iter().filter(|s| s.state.is_pending()).count()
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.slots.truncate(len);
    }
}

/// String transform applied by generated code when a value is assigned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decorator {
    /// Wrap an object value in its generated class
    ObjectInstantiation {
        /// Class to instantiate
        class: ClassRef,
    },
    /// Apply item decorators to every array element
    ArrayItems(Vec<Decorator>),
    /// Replace the value by the output of a transforming filter
    Filter {
        /// Filter token
        token: String,
    },
}

impl Decorator {
    /// Decorate a value expression
    pub fn decorate(&self, expression: &str) -> String {
        match self {
            Decorator::ObjectInstantiation { class } => format!("{}({})", class.fqcn(), expression),
            Decorator::Filter { token } => format!("{}({})", token, expression),
            Decorator::ArrayItems(inner) => {
                let item = inner
                    .iter()
                    .fold("item".to_string(), |expr, decorator| decorator.decorate(&expr));
                format!("map({}, |item| {})", expression, item)
            }
        }
    }
}

/// A typed member of a generated class
#[derive(Debug, Clone)]
pub struct Property {
    name: String,
    attribute_name: String,
    types: Vec<JsonType>,
    validators: Vec<Validator>,
    decorators: Vec<Decorator>,
    nested_schema: Option<ClassRef>,
    required: bool,
    description: Option<String>,
    default: Option<Value>,
    format: Option<String>,
}

impl Property {
    /// Create an untyped property
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            attribute_name: crate::names::attribute_name(&name),
            name,
            types: Vec::new(),
            validators: Vec::new(),
            decorators: Vec::new(),
            nested_schema: None,
            required: false,
            description: None,
            default: None,
            format: None,
        }
    }

    /// Set the declared types
    pub fn with_types(mut self, types: Vec<JsonType>) -> Self {
        self.types = types;
        self
    }

    /// JSON property name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier used in generated code
    pub fn attribute_name(&self) -> &str {
        &self.attribute_name
    }

    /// Declared types; empty when untyped
    pub fn types(&self) -> &[JsonType] {
        &self.types
    }

    /// Validators in execution order
    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    /// Add a validator at its priority position
    pub fn add_validator(&mut self, validator: Validator) {
        insert_ordered(&mut self.validators, validator);
    }

    /// Stored decorators
    pub fn decorators(&self) -> &[Decorator] {
        &self.decorators
    }

    /// Add a decorator
    pub fn add_decorator(&mut self, decorator: Decorator) {
        if !self.decorators.contains(&decorator) {
            self.decorators.push(decorator);
        }
    }

    /// Generated class of an object-typed property
    pub fn nested_schema(&self) -> Option<&ClassRef> {
        self.nested_schema.as_ref()
    }

    /// Attach the generated class
    pub fn set_nested_schema(&mut self, class: ClassRef) {
        self.nested_schema = Some(class);
    }

    /// Whether a value must be present
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Mark as required
    pub fn set_required(&mut self, required: bool) {
        self.required = required;
    }

    /// Description annotation
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Set the description
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    /// Default value
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Set the default value
    pub fn set_default(&mut self, default: Value) {
        self.default = Some(default);
    }

    /// `format` annotation (not enforced)
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// Set the format annotation
    pub fn set_format(&mut self, format: impl Into<String>) {
        self.format = Some(format.into());
    }

    /// Drop every validator
    pub fn clear_validators(&mut self) {
        self.validators.clear();
    }

    /// Drop required-field and, for object branches, nested-composition checks
    pub fn strip_branch_scoped(&mut self) {
        let object = self.types.contains(&JsonType::Object);
        self.validators.retain(|v| match v.kind {
            ValidatorKind::Required => false,
            ValidatorKind::Composition(_) | ValidatorKind::Conditional(_) => !object,
            _ => true,
        });
    }

    /// First composition validator, if any
    pub fn composition(&self) -> Option<&super::validator::Composition> {
        self.validators.iter().find_map(|v| match &v.kind {
            ValidatorKind::Composition(c) => Some(c),
            _ => None,
        })
    }

    /// Decorators including the derived per-item decorators of arrays
    pub fn effective_decorators(&self, slots: &PropertySlots) -> Vec<Decorator> {
        let mut decorators = self.decorators.clone();
        for validator in &self.validators {
            if let ValidatorKind::Items(item) = &validator.kind {
                let inner = item.effective_decorators(slots);
                if !inner.is_empty() {
                    decorators.push(Decorator::ArrayItems(inner));
                }
            }
        }
        decorators
    }

    /// Externally visible type
    pub fn type_hint(&self, slots: &PropertySlots) -> TypeHint {
        self.type_hint_at(slots, 0)
    }

    fn type_hint_at(&self, slots: &PropertySlots, depth: usize) -> TypeHint {
        if depth > MAX_HINT_DEPTH {
            return TypeHint::Any;
        }
        if let Some(class) = self.nested_schema.as_ref().filter(|_| !self.types.is_empty()) {
            return TypeHint::Object(class.fqcn());
        }

        match self.types.as_slice() {
            [] => self.composition_hint(slots, depth).unwrap_or(TypeHint::Any),
            [JsonType::Array] => {
                let item = self
                    .validators
                    .iter()
                    .find_map(|v| match &v.kind {
                        ValidatorKind::Items(item) => Some(item.type_hint_at(slots, depth + 1)),
                        _ => None,
                    })
                    .unwrap_or(TypeHint::Any);
                TypeHint::Array(Box::new(item))
            }
            [JsonType::Object] => self.composition_hint(slots, depth).unwrap_or(TypeHint::Any),
            types => TypeHint::union(types.iter().map(JsonType::hint)),
        }
    }

    /// Union of branch hints, or scalar branches plus the merged class
    fn composition_hint(&self, slots: &PropertySlots, depth: usize) -> Option<TypeHint> {
        let composition = self.composition()?;
        if composition.combinator == super::validator::Combinator::Not {
            return None;
        }
        let hints = match &composition.merged {
            Some(merged) => composition
                .branches
                .iter()
                .filter(|branch| branch.nested_schema(slots).is_none())
                .map(|branch| branch.type_hint_at(slots, depth + 1))
                .chain(std::iter::once(merged.type_hint_at(slots, depth + 1)))
                .collect::<Vec<_>>(),
            None => composition
                .branches
                .iter()
                .map(|branch| branch.type_hint_at(slots, depth + 1))
                .collect(),
        };
        Some(TypeHint::union(hints))
    }
}

/// Forwarding handle onto a resolution slot
///
/// The use-site carries its own name, required flag and validators; every
/// other read forwards to the property stored in the slot.
#[derive(Debug, Clone)]
pub struct PropertyProxy {
    name: String,
    attribute_name: String,
    required: bool,
    validators: Vec<Validator>,
    description: Option<String>,
    validators_cleared: bool,
    branch_scoped_stripped: bool,
    key: String,
    slot: SlotId,
}

impl PropertyProxy {
    /// Create a proxy for a use site
    pub fn new(name: impl Into<String>, key: impl Into<String>, slot: SlotId) -> Self {
        let name = name.into();
        Self {
            attribute_name: crate::names::attribute_name(&name),
            name,
            required: false,
            validators: Vec::new(),
            description: None,
            validators_cleared: false,
            branch_scoped_stripped: false,
            key: key.into(),
            slot,
        }
    }

    /// Definition key this proxy points at
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Slot this proxy points at
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// Current state of the target slot
    pub fn state<'a>(&self, slots: &'a PropertySlots) -> Option<&'a ResolutionState> {
        slots.slot(self.slot).map(PropertySlot::state)
    }

    /// Use-site validators
    pub fn local_validators(&self) -> &[Validator] {
        &self.validators
    }
}

/// A property either owned inline or reached through a proxy
#[derive(Debug, Clone)]
pub enum PropertyHandle {
    /// Property built in place
    Owned(Property),
    /// Property produced by the reference resolver
    Proxy(PropertyProxy),
}

impl From<Property> for PropertyHandle {
    fn from(property: Property) -> Self {
        PropertyHandle::Owned(property)
    }
}

impl From<PropertyProxy> for PropertyHandle {
    fn from(proxy: PropertyProxy) -> Self {
        PropertyHandle::Proxy(proxy)
    }
}

impl PropertyHandle {
    /// JSON property name at the use site
    pub fn name(&self) -> &str {
        match self {
            PropertyHandle::Owned(p) => p.name(),
            PropertyHandle::Proxy(p) => &p.name,
        }
    }

    /// Identifier used in generated code
    pub fn attribute_name(&self) -> &str {
        match self {
            PropertyHandle::Owned(p) => p.attribute_name(),
            PropertyHandle::Proxy(p) => &p.attribute_name,
        }
    }

    /// Whether a value must be present at the use site
    pub fn is_required(&self) -> bool {
        match self {
            PropertyHandle::Owned(p) => p.is_required(),
            PropertyHandle::Proxy(p) => p.required,
        }
    }

    /// Mark as required at the use site
    pub fn set_required(&mut self, required: bool) {
        match self {
            PropertyHandle::Owned(p) => p.set_required(required),
            PropertyHandle::Proxy(p) => p.required = required,
        }
    }

    /// Set the use-site description
    pub fn set_description(&mut self, description: impl Into<String>) {
        match self {
            PropertyHandle::Owned(p) => p.set_description(description),
            PropertyHandle::Proxy(p) => p.description = Some(description.into()),
        }
    }

    /// Add a validator at the use site
    pub fn add_validator(&mut self, validator: Validator) {
        match self {
            PropertyHandle::Owned(p) => p.add_validator(validator),
            PropertyHandle::Proxy(p) => insert_ordered(&mut p.validators, validator),
        }
    }

    /// Check whether this handle is a proxy
    pub fn is_proxy(&self) -> bool {
        matches!(self, PropertyHandle::Proxy(_))
    }

    /// The property this handle stands for, following proxy chains
    pub fn resolve<'a>(&'a self, slots: &'a PropertySlots) -> Result<&'a Property> {
        let mut current = self;
        for _ in 0..MAX_PROXY_HOPS {
            match current {
                PropertyHandle::Owned(property) => return Ok(property),
                PropertyHandle::Proxy(proxy) => current = slots.get(proxy.slot)?,
            }
        }
        Err(Error::schema(format!(
            "Circular reference chain through '{}'",
            self.name()
        )))
    }

    /// Description at the use site, else of the target
    pub fn description<'a>(&'a self, slots: &'a PropertySlots) -> Option<&'a str> {
        match self {
            PropertyHandle::Owned(p) => p.description(),
            PropertyHandle::Proxy(p) => p
                .description
                .as_deref()
                .or_else(|| self.resolve(slots).ok().and_then(Property::description)),
        }
    }

    /// Use-site validators merged with the target's, in execution order
    pub fn validators<'a>(&'a self, slots: &'a PropertySlots) -> Result<Vec<&'a Validator>> {
        match self {
            PropertyHandle::Owned(p) => Ok(p.validators().iter().collect()),
            PropertyHandle::Proxy(proxy) => {
                let mut validators: Vec<&Validator> = proxy.validators.iter().collect();
                if !proxy.validators_cleared {
                    let target = self.resolve(slots)?;
                    let nested = target.nested_schema().is_some();
                    validators.extend(target.validators().iter().filter(|v| {
                        !proxy.branch_scoped_stripped
                            || match v.kind {
                                ValidatorKind::Required => false,
                                ValidatorKind::Composition(_) | ValidatorKind::Conditional(_) => {
                                    !nested
                                }
                                _ => true,
                            }
                    }));
                }
                validators.sort_by_key(|v| v.priority);
                Ok(validators)
            }
        }
    }

    /// Drop every validator, local and forwarded
    pub fn clear_validators(&mut self) {
        match self {
            PropertyHandle::Owned(p) => p.clear_validators(),
            PropertyHandle::Proxy(p) => {
                p.validators.clear();
                p.validators_cleared = true;
            }
        }
    }

    /// Strip branch-scoped validators for use inside a combinator
    pub fn strip_branch_scoped(&mut self) {
        match self {
            PropertyHandle::Owned(p) => p.strip_branch_scoped(),
            PropertyHandle::Proxy(p) => {
                p.validators.retain(|v| !matches!(v.kind, ValidatorKind::Required));
                p.branch_scoped_stripped = true;
            }
        }
    }

    /// Copy with validators cleared and required reset, used for merged classes
    pub fn detached(&self) -> PropertyHandle {
        let mut copy = self.clone();
        copy.clear_validators();
        copy.set_required(false);
        copy
    }

    /// Generated class of the target, if resolved and object-typed
    pub fn nested_schema<'a>(&'a self, slots: &'a PropertySlots) -> Option<&'a ClassRef> {
        self.resolve(slots).ok().and_then(Property::nested_schema)
    }

    /// Declared types of the target
    pub fn types<'a>(&'a self, slots: &'a PropertySlots) -> &'a [JsonType] {
        self.resolve(slots).map(Property::types).unwrap_or(&[])
    }

    /// Default value of the target
    pub fn default_value<'a>(&'a self, slots: &'a PropertySlots) -> Option<&'a Value> {
        self.resolve(slots).ok().and_then(Property::default_value)
    }

    /// Decorators of the target
    pub fn effective_decorators(&self, slots: &PropertySlots) -> Vec<Decorator> {
        self.resolve(slots)
            .map(|p| p.effective_decorators(slots))
            .unwrap_or_default()
    }

    /// Externally visible type; unresolved proxies report `Any`
    pub fn type_hint(&self, slots: &PropertySlots) -> TypeHint {
        self.type_hint_at(slots, 0)
    }

    fn type_hint_at(&self, slots: &PropertySlots, depth: usize) -> TypeHint {
        match self.resolve(slots) {
            Ok(property) => property.type_hint_at(slots, depth),
            Err(_) => TypeHint::Any,
        }
    }
}
