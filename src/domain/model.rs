//! An in-memory tree of subsystems and the placement graph over its features.
//!
//! The [`Model`] owns every subsystem. Subsystems form a forest: each has at
//! most one parent and an ordered list of children. A subsystem with a
//! [`FeatureKind`] is a *feature* and may be placed.
//!
//! Placements are stored in [`PlacementSlot`]s. A slot is owned by the
//! feature it places or by one of that feature's ancestors (the lowest
//! common ancestor of the feature and everything its placement reads). The
//! placed feature holds only a non-owning [`SlotRef`] to it.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
};

use petgraph::graphmap::DiGraphMap;

use crate::domain::{
    Config, FeatureId, FeatureKind, Placement, PlacementIndex, PlacementType, SubsystemId,
    expr::PlacementRep,
    path::{FeaturePath, InvalidNameError, Name},
    placement::{PlacementSlot, SlotRef},
};

mod copy;
mod placing;

pub use copy::CopyMap;

/// Errors raised by structural operations on the subsystem tree.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ModelError {
    /// The subsystem does not exist (or has been removed).
    #[error("subsystem {0} not found")]
    NotFound(SubsystemId),

    /// A sibling with the same name already exists.
    #[error("a subsystem named '{0}' already exists at this level")]
    DuplicateName(Name),

    /// The name is not a valid subsystem name.
    #[error(transparent)]
    InvalidName(#[from] InvalidNameError),
}

/// Errors raised by placement operations.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PlacementError {
    /// The placement of an unplaced feature was queried.
    #[error("feature {0} has no placement")]
    NoPlacement(FeatureId),

    /// The value is neither of the required type nor convertible to it.
    #[error(
        "no compatible placement for {feature}: {kind} requires {required}, got {}",
        describe(.found)
    )]
    Incompatible {
        /// The feature being placed.
        feature: FeatureId,
        /// Kind name of that feature.
        kind: &'static str,
        /// The type it requires.
        required: PlacementType,
        /// The type offered, `None` for an empty placement.
        found: Option<PlacementType>,
    },

    /// `place` was called on a feature that is already placed.
    #[error("feature {0} is already placed")]
    AlreadyPlaced(FeatureId),

    /// `replace` was called on a feature that is not placed.
    #[error("feature {0} is not placed")]
    NotPlaced(FeatureId),

    /// Installing the placement would make the dependency graph cyclic.
    #[error("placing {feature} in terms of {dependency} would create a circular dependency")]
    Cycle {
        /// The feature being placed.
        feature: FeatureId,
        /// The dependency closing the cycle.
        dependency: FeatureId,
    },

    /// The placement reads a feature in a different top-level tree.
    #[error("{referenced} is not in the same tree as {feature}")]
    OutsideTree {
        /// The feature being placed.
        feature: FeatureId,
        /// The unreachable feature.
        referenced: FeatureId,
    },

    /// The feature does not exist (or has been removed).
    #[error("feature {0} not found")]
    UnknownFeature(FeatureId),
}

fn describe(found: &Option<PlacementType>) -> String {
    found.map_or_else(|| "an empty placement".to_string(), |ty| ty.to_string())
}

#[derive(Debug, Clone)]
struct Subsystem {
    name: Name,
    parent: Option<SubsystemId>,
    children: Vec<SubsystemId>,
    kind: Option<Arc<dyn FeatureKind>>,

    /// Where this feature's placement lives, if placed.
    placement: Option<SlotRef>,

    /// Slots owned by this subsystem, keyed by the feature each one places.
    slots: BTreeMap<FeatureId, PlacementSlot>,
}

impl Subsystem {
    fn new(name: Name, parent: Option<SubsystemId>, kind: Option<Arc<dyn FeatureKind>>) -> Self {
        Self {
            name,
            parent,
            children: Vec::new(),
            kind,
            placement: None,
            slots: BTreeMap::new(),
        }
    }
}

/// A forest of subsystems plus the placement graph over its features.
#[derive(Debug, Clone, Default)]
pub struct Model {
    config: Config,

    subsystems: HashMap<SubsystemId, Subsystem>,

    /// Top-level subsystems, in insertion order.
    roots: Vec<SubsystemId>,

    /// Placement dependency graph. Nodes are features, edges point from a
    /// placed feature to each feature its placement reads.
    graph: DiGraphMap<FeatureId, ()>,
}

impl Model {
    /// Creates an empty model with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty model with the given configuration.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The model-building configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Adds a plain (non-feature) subsystem.
    ///
    /// # Errors
    ///
    /// Fails if `parent` does not exist, `name` is invalid, or a sibling
    /// already has that name.
    pub fn add_subsystem(
        &mut self,
        parent: Option<SubsystemId>,
        name: &str,
    ) -> Result<SubsystemId, ModelError> {
        self.insert(parent, Name::try_from(name)?, None)
    }

    /// Adds a feature of the given kind, along with the kind's sub-features.
    ///
    /// # Errors
    ///
    /// Fails if `parent` does not exist, `name` is invalid, or a sibling
    /// already has that name.
    pub fn add_feature(
        &mut self,
        parent: Option<SubsystemId>,
        name: &str,
        kind: impl FeatureKind + 'static,
    ) -> Result<FeatureId, ModelError> {
        self.add_feature_of_kind(parent, name, Arc::new(kind))
    }

    /// Adds a feature whose kind is already shared.
    ///
    /// # Errors
    ///
    /// As for [`Model::add_feature`].
    pub fn add_feature_of_kind(
        &mut self,
        parent: Option<SubsystemId>,
        name: &str,
        kind: Arc<dyn FeatureKind>,
    ) -> Result<FeatureId, ModelError> {
        let sub_features = kind.sub_features();
        let id = self.insert(parent, Name::try_from(name)?, Some(kind))?;
        for (sub_name, sub_kind) in sub_features {
            self.add_feature_of_kind(Some(id), sub_name, sub_kind)?;
        }
        Ok(FeatureId::from_subsystem(id))
    }

    fn insert(
        &mut self,
        parent: Option<SubsystemId>,
        name: Name,
        kind: Option<Arc<dyn FeatureKind>>,
    ) -> Result<SubsystemId, ModelError> {
        if let Some(parent) = parent {
            if !self.subsystems.contains_key(&parent) {
                return Err(ModelError::NotFound(parent));
            }
        }
        if self.child_named(parent, &name).is_some() {
            return Err(ModelError::DuplicateName(name));
        }

        let id = SubsystemId::new();
        let is_feature = kind.is_some();
        self.subsystems
            .insert(id, Subsystem::new(name, parent, kind));
        match parent {
            Some(parent) => self.node_mut(parent).children.push(id),
            None => self.roots.push(id),
        }
        if is_feature {
            self.graph.add_node(FeatureId::from_subsystem(id));
        }
        Ok(id)
    }

    /// Whether the subsystem exists.
    #[must_use]
    pub fn contains(&self, id: impl Into<SubsystemId>) -> bool {
        self.subsystems.contains_key(&id.into())
    }

    /// The name of a subsystem.
    #[must_use]
    pub fn name(&self, id: impl Into<SubsystemId>) -> Option<&Name> {
        self.subsystems.get(&id.into()).map(|node| &node.name)
    }

    /// The parent of a subsystem, `None` for top-level (or unknown)
    /// subsystems.
    #[must_use]
    pub fn parent(&self, id: impl Into<SubsystemId>) -> Option<SubsystemId> {
        self.subsystems.get(&id.into()).and_then(|node| node.parent)
    }

    /// The children of a subsystem, in insertion order.
    pub fn children(&self, id: impl Into<SubsystemId>) -> impl Iterator<Item = SubsystemId> + '_ {
        self.subsystems
            .get(&id.into())
            .into_iter()
            .flat_map(|node| node.children.iter().copied())
    }

    /// The top-level subsystems, in insertion order.
    pub fn top_level(&self) -> impl Iterator<Item = SubsystemId> + '_ {
        self.roots.iter().copied()
    }

    /// The child of `parent` (or the top-level subsystem, for `None`) with the
    /// given name.
    #[must_use]
    pub fn child_named(&self, parent: Option<SubsystemId>, name: &str) -> Option<SubsystemId> {
        let mut candidates: Box<dyn Iterator<Item = SubsystemId> + '_> = match parent {
            Some(parent) => Box::new(self.children(parent)),
            None => Box::new(self.top_level()),
        };
        candidates.find(|id| self.subsystems[id].name.as_str() == name)
    }

    /// Iterates over the proper ancestors of a subsystem, nearest first.
    pub fn ancestors(&self, id: impl Into<SubsystemId>) -> impl Iterator<Item = SubsystemId> + '_ {
        std::iter::successors(self.parent(id), move |&id| self.parent(id))
    }

    /// Whether `ancestor` is `id` itself or one of its ancestors.
    #[must_use]
    pub fn is_ancestor_or_self(
        &self,
        ancestor: impl Into<SubsystemId>,
        id: impl Into<SubsystemId>,
    ) -> bool {
        let ancestor = ancestor.into();
        let id = id.into();
        id == ancestor || self.ancestors(id).any(|a| a == ancestor)
    }

    /// The top-level subsystem containing `id`.
    #[must_use]
    pub fn root_of(&self, id: impl Into<SubsystemId>) -> Option<SubsystemId> {
        let id = id.into();
        if !self.contains(id) {
            return None;
        }
        Some(self.ancestors(id).last().unwrap_or(id))
    }

    /// The lowest subsystem that is an ancestor-or-self of both `a` and `b`,
    /// or `None` if they are in different trees.
    #[must_use]
    pub fn common_ancestor(
        &self,
        a: impl Into<SubsystemId>,
        b: impl Into<SubsystemId>,
    ) -> Option<SubsystemId> {
        let a = a.into();
        let b = b.into();
        if !self.contains(a) || !self.contains(b) {
            return None;
        }
        std::iter::once(a)
            .chain(self.ancestors(a))
            .find(|&candidate| self.is_ancestor_or_self(candidate, b))
    }

    /// Every subsystem in the subtree rooted at `root`, parents before
    /// children.
    #[must_use]
    pub fn subtree(&self, root: impl Into<SubsystemId>) -> Vec<SubsystemId> {
        let root = root.into();
        let mut order = Vec::new();
        if !self.contains(root) {
            return order;
        }
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.subsystems[&id].children.iter().rev().copied());
        }
        order
    }

    /// The path of a subsystem from its top-level ancestor.
    #[must_use]
    pub fn path_of(&self, id: impl Into<SubsystemId>) -> Option<FeaturePath> {
        let id = id.into();
        let name = self.name(id)?.clone();
        Some(match self.parent(id) {
            Some(parent) => self.path_of(parent)?.join(name),
            None => FeaturePath::root(name),
        })
    }

    /// Resolves a path to a subsystem.
    #[must_use]
    pub fn find(&self, path: &FeaturePath) -> Option<SubsystemId> {
        path.segments()
            .try_fold(None, |parent, name| {
                self.child_named(parent, name).map(Some)
            })
            .flatten()
    }

    /// Narrows a subsystem id to a feature id, if the subsystem is a feature.
    #[must_use]
    pub fn feature_id(&self, id: SubsystemId) -> Option<FeatureId> {
        self.subsystems
            .get(&id)
            .and_then(|node| node.kind.as_ref())
            .map(|_| FeatureId::from_subsystem(id))
    }

    /// A handle on a feature.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError::UnknownFeature`] if the feature no longer
    /// exists.
    pub fn feature(&self, id: FeatureId) -> Result<Feature<'_>, PlacementError> {
        let kind = self
            .subsystems
            .get(&id.subsystem())
            .and_then(|node| node.kind.as_deref())
            .ok_or(PlacementError::UnknownFeature(id))?;
        Ok(Feature {
            model: self,
            id,
            kind,
        })
    }

    /// The kind of a feature, downcast to a concrete kind type.
    ///
    /// Returns `None` if the feature does not exist or is of another kind.
    #[must_use]
    pub fn kind_as<K: FeatureKind + 'static>(&self, id: FeatureId) -> Option<&K> {
        self.feature(id).ok()?.kind.as_any().downcast_ref::<K>()
    }

    /// Every feature in the model, in no particular order.
    pub fn features(&self) -> impl Iterator<Item = FeatureId> + '_ {
        self.graph.nodes()
    }

    fn node(&self, id: SubsystemId) -> &Subsystem {
        self.subsystems
            .get(&id)
            .unwrap_or_else(|| panic!("subsystem {id} not found"))
    }

    fn node_mut(&mut self, id: SubsystemId) -> &mut Subsystem {
        self.subsystems
            .get_mut(&id)
            .unwrap_or_else(|| panic!("subsystem {id} not found"))
    }
}

/// A lightweight handle on one feature of a [`Model`].
#[derive(Clone, Copy)]
pub struct Feature<'a> {
    model: &'a Model,
    id: FeatureId,
    kind: &'a dyn FeatureKind,
}

impl<'a> Feature<'a> {
    /// The feature's id.
    #[must_use]
    pub const fn id(&self) -> FeatureId {
        self.id
    }

    /// The feature's name.
    #[must_use]
    pub fn name(&self) -> &'a Name {
        &self.model.node(self.id.subsystem()).name
    }

    /// The feature's kind.
    #[must_use]
    pub const fn kind(&self) -> &'a dyn FeatureKind {
        self.kind
    }

    /// The placement type this feature requires.
    #[must_use]
    pub fn required_placement_type(&self) -> PlacementType {
        self.kind.required_placement_type()
    }

    /// The child feature with the given name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<Self> {
        let child = self.model.child_named(Some(self.id.subsystem()), name)?;
        self.model.feature(self.model.feature_id(child)?).ok()
    }

    /// A reference to this feature's placement, or one of its elements.
    #[must_use]
    pub fn reference(&self, index: PlacementIndex) -> Option<PlacementRep> {
        self.kind.create_feature_reference(self.id, index)
    }

    /// Whether the feature is placed.
    #[must_use]
    pub fn has_placement(&self) -> bool {
        self.model.has_placement(self.id)
    }

    /// The feature's placement.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError::NoPlacement`] if the feature is unplaced.
    pub fn placement(&self) -> Result<&'a Placement, PlacementError> {
        self.model.placement(self.id)
    }
}

impl fmt::Debug for Feature<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feature")
            .field("id", &self.id)
            .field("name", self.name())
            .field("kind", &self.kind.type_name())
            .finish()
    }
}
