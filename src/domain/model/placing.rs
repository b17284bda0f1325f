//! Placement lifecycle: validation, slot ownership and the dependency graph.

use std::collections::BTreeSet;

use petgraph::{
    Direction,
    algo::{has_path_connecting, is_cyclic_directed, tarjan_scc},
};

use super::{Model, PlacementError};
use crate::domain::{
    CycleCheck, FeatureId, Placement, PlacementIndex, PlacementType, SubsystemId,
    placement::{PlacementSlot, SlotRef},
};

/// A placement that passed validation, with the slot owner it resolves to.
struct Accepted {
    placement: Placement,
    owner: SubsystemId,
    dependencies: BTreeSet<FeatureId>,
}

impl Model {
    /// Whether the feature is placed. Unknown features are unplaced.
    #[must_use]
    pub fn has_placement(&self, feature: FeatureId) -> bool {
        self.subsystems
            .get(&feature.subsystem())
            .is_some_and(|node| node.placement.is_some())
    }

    /// The slot holding the feature's placement.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError::NoPlacement`] if the feature is unplaced.
    /// This is a precondition violation: check [`Model::has_placement`]
    /// first.
    ///
    /// # Panics
    ///
    /// Panics if the feature's slot reference points at an owner that does not
    /// hold its slot, which would mean the model's bookkeeping is corrupt.
    pub fn placement_slot(&self, feature: FeatureId) -> Result<&PlacementSlot, PlacementError> {
        let slot_ref = self
            .subsystems
            .get(&feature.subsystem())
            .ok_or(PlacementError::UnknownFeature(feature))?
            .placement
            .ok_or(PlacementError::NoPlacement(feature))?;
        let slot = self
            .node(slot_ref.owner)
            .slots
            .get(&feature)
            .unwrap_or_else(|| panic!("slot for {feature} missing from its owner"));
        Ok(slot)
    }

    /// The feature's placement.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError::NoPlacement`] if the feature is unplaced.
    pub fn placement(&self, feature: FeatureId) -> Result<&Placement, PlacementError> {
        self.placement_slot(feature).map(PlacementSlot::placement)
    }

    /// The subsystem owning the feature's placement slot, if placed.
    #[must_use]
    pub fn slot_owner(&self, feature: FeatureId) -> Option<SubsystemId> {
        self.subsystems
            .get(&feature.subsystem())?
            .placement
            .map(|slot_ref| slot_ref.owner)
    }

    /// Places an unplaced feature.
    ///
    /// The value is used as-is if it has the required type, otherwise it is
    /// put through the feature kind's conversion. Nothing is modified if the
    /// placement is rejected.
    ///
    /// # Errors
    ///
    /// - [`PlacementError::AlreadyPlaced`] if the feature is placed
    /// - [`PlacementError::Incompatible`] if the value cannot be used
    /// - [`PlacementError::OutsideTree`] if the value reads a feature in
    ///   another tree
    /// - [`PlacementError::Cycle`] if the value would make the dependency
    ///   graph cyclic
    pub fn place(&mut self, feature: FeatureId, placement: Placement) -> Result<(), PlacementError> {
        self.place_underived(feature, placement)?;
        self.post_process(feature);
        Ok(())
    }

    /// Places a feature without deriving placements for its sub-features.
    pub(super) fn place_underived(
        &mut self,
        feature: FeatureId,
        placement: Placement,
    ) -> Result<(), PlacementError> {
        if self.has_placement(feature) {
            return Err(PlacementError::AlreadyPlaced(feature));
        }
        let accepted = self.accept(feature, &placement)?;
        self.install(feature, accepted);
        tracing::debug!("placed feature {feature}");
        Ok(())
    }

    /// Replaces the placement of a placed feature, returning the old value.
    ///
    /// The new value is validated exactly as in [`Model::place`]; the old
    /// value is released only once the new one has been accepted, so a
    /// rejected replacement leaves the feature as it was.
    ///
    /// # Errors
    ///
    /// [`PlacementError::NotPlaced`] if the feature is unplaced, otherwise as
    /// for [`Model::place`].
    pub fn replace(
        &mut self,
        feature: FeatureId,
        placement: Placement,
    ) -> Result<Placement, PlacementError> {
        let Some(old_owner) = self.slot_owner(feature) else {
            return Err(PlacementError::NotPlaced(feature));
        };
        let accepted = self.accept(feature, &placement)?;

        self.clear_edges(feature);
        for &dependency in &accepted.dependencies {
            self.graph.add_edge(feature, dependency, ());
        }

        let old = if accepted.owner == old_owner {
            self.node_mut(old_owner)
                .slots
                .get_mut(&feature)
                .unwrap_or_else(|| panic!("slot for {feature} missing from its owner"))
                .replace(accepted.placement)
        } else {
            self.node_mut(accepted.owner)
                .slots
                .insert(feature, PlacementSlot::new(feature, accepted.placement));
            self.node_mut(feature.subsystem()).placement = Some(SlotRef {
                owner: accepted.owner,
            });
            self.node_mut(old_owner)
                .slots
                .remove(&feature)
                .unwrap_or_else(|| panic!("slot for {feature} missing from its owner"))
                .into_placement()
        };

        tracing::debug!("replaced placement of feature {feature}");
        self.post_process(feature);
        Ok(old)
    }

    /// Removes the feature's placement, if any.
    ///
    /// Returns `true` if a placement was removed. Removing the placement of
    /// an unplaced (or unknown) feature does nothing.
    pub fn remove_placement(&mut self, feature: FeatureId) -> bool {
        let Some(owner) = self.slot_owner(feature) else {
            return false;
        };
        self.node_mut(owner).slots.remove(&feature);
        self.clear_placement_slot(feature);
        tracing::debug!("removed placement of feature {feature}");
        true
    }

    /// Forgets the feature's reference to its placement slot, without
    /// touching the slot itself.
    ///
    /// Called on behalf of a slot's owner when it destroys the slot, since the
    /// owner and the placed feature can differ.
    pub(crate) fn clear_placement_slot(&mut self, feature: FeatureId) {
        if let Some(node) = self.subsystems.get_mut(&feature.subsystem()) {
            node.placement = None;
        }
        self.clear_edges(feature);
    }

    /// Whether the feature is placed and its placement reads `other`.
    ///
    /// Only the feature's own placement is considered, not the placements of
    /// the features it reads.
    #[must_use]
    pub fn depends_on(&self, feature: FeatureId, other: FeatureId) -> bool {
        self.placement(feature)
            .is_ok_and(|placement| placement.depends_on(other))
    }

    /// Whether `other` can be reached from `feature` by following placement
    /// dependencies.
    #[must_use]
    pub fn depends_on_transitively(&self, feature: FeatureId, other: FeatureId) -> bool {
        feature != other
            && self.graph.contains_node(feature)
            && self.graph.contains_node(other)
            && has_path_connecting(&self.graph, feature, other, None)
    }

    /// The features whose placements read `feature`.
    pub fn dependants(&self, feature: FeatureId) -> impl Iterator<Item = FeatureId> + '_ {
        self.graph
            .contains_node(feature)
            .then(|| self.graph.neighbors_directed(feature, Direction::Incoming))
            .into_iter()
            .flatten()
    }

    /// Uses a feature as a placement of the given category.
    ///
    /// Returns the empty placement if the feature's kind defines no such
    /// adaptation, or the feature does not exist.
    #[must_use]
    pub fn feature_as_placement(&self, feature: FeatureId, category: PlacementType) -> Placement {
        self.feature(feature)
            .ok()
            .and_then(|handle| handle.kind().use_feature_as(&handle, category))
            .into()
    }

    /// Whether `source` could serve as the placement of `target`.
    #[must_use]
    pub fn can_place_on_feature_like(&self, target: FeatureId, source: FeatureId) -> bool {
        match (self.feature(target), self.feature(source)) {
            (Ok(target), Ok(source)) => target.kind().can_place_on_feature_like(&source),
            _ => false,
        }
    }

    /// Places `target` in terms of the feature `source`.
    ///
    /// The source is first adapted to the target's required type; failing
    /// that, a reference to the whole source goes through the target's
    /// conversion.
    ///
    /// # Errors
    ///
    /// As for [`Model::place`].
    pub fn place_on_feature(
        &mut self,
        target: FeatureId,
        source: FeatureId,
    ) -> Result<(), PlacementError> {
        let placement = self.placement_from_feature(target, source)?;
        self.place(target, placement)
    }

    fn placement_from_feature(
        &self,
        target: FeatureId,
        source: FeatureId,
    ) -> Result<Placement, PlacementError> {
        let required = self.feature(target)?.required_placement_type();
        let source = self.feature(source)?;

        let adapted = self.feature_as_placement(source.id(), required);
        if !adapted.is_empty() {
            return Ok(adapted);
        }
        Ok(source.reference(PlacementIndex::Whole).into())
    }

    /// Whether the dependency graph contains a cycle.
    ///
    /// Only possible when cycle checking is deferred.
    #[must_use]
    pub fn has_cycles(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// All dependency cycles, each as a sorted set of features.
    #[must_use]
    pub fn cycles(&self) -> Vec<Vec<FeatureId>> {
        let mut cycles: Vec<Vec<FeatureId>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&node| self.graph.contains_edge(node, node))
            })
            .map(|mut component| {
                component.sort();
                component
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Validates a proposed placement without modifying the model.
    fn accept(&self, feature: FeatureId, placement: &Placement) -> Result<Accepted, PlacementError> {
        let handle = self.feature(feature)?;
        let kind = handle.kind();

        let accepted = if kind.is_required_placement_type(placement) {
            placement.clone()
        } else {
            kind.convert_to_required_placement_type(placement)
        };
        if !kind.is_required_placement_type(&accepted) {
            return Err(PlacementError::Incompatible {
                feature,
                kind: kind.type_name(),
                required: kind.required_placement_type(),
                found: placement.placement_type(),
            });
        }

        let dependencies = accepted.dependencies();
        let owner = self.resolve_owner(feature, &dependencies)?;

        if self.config.cycle_check == CycleCheck::Eager {
            if let Some(&dependency) = dependencies.iter().find(|&&dependency| {
                dependency == feature || self.depends_on_transitively(dependency, feature)
            }) {
                return Err(PlacementError::Cycle {
                    feature,
                    dependency,
                });
            }
        }

        Ok(Accepted {
            placement: accepted,
            owner,
            dependencies,
        })
    }

    /// The lowest common ancestor of `feature` and everything it reads.
    fn resolve_owner(
        &self,
        feature: FeatureId,
        dependencies: &BTreeSet<FeatureId>,
    ) -> Result<SubsystemId, PlacementError> {
        dependencies
            .iter()
            .try_fold(feature.subsystem(), |owner, &dependency| {
                if self.feature_id(dependency.subsystem()).is_none() {
                    return Err(PlacementError::UnknownFeature(dependency));
                }
                self.common_ancestor(owner, dependency)
                    .ok_or(PlacementError::OutsideTree {
                        feature,
                        referenced: dependency,
                    })
            })
    }

    fn install(&mut self, feature: FeatureId, accepted: Accepted) {
        for &dependency in &accepted.dependencies {
            self.graph.add_edge(feature, dependency, ());
        }
        self.node_mut(accepted.owner)
            .slots
            .insert(feature, PlacementSlot::new(feature, accepted.placement));
        self.node_mut(feature.subsystem()).placement = Some(SlotRef {
            owner: accepted.owner,
        });
    }

    fn clear_edges(&mut self, feature: FeatureId) {
        if !self.graph.contains_node(feature) {
            return;
        }
        let dependencies: Vec<_> = self.graph.neighbors(feature).collect();
        for dependency in dependencies {
            self.graph.remove_edge(feature, dependency);
        }
    }

    /// Applies the follow-up placements the feature's kind asks for.
    fn post_process(&mut self, feature: FeatureId) {
        if !self.config.derive_subfeature_placements {
            return;
        }
        let Ok(handle) = self.feature(feature) else {
            return;
        };
        let follow_ups = handle.kind().post_process_new_placement(&handle);

        for (target, placement) in follow_ups {
            // Deriving a feature the new placement already reads would close a cycle.
            if self.has_placement(target) || self.depends_on_transitively(feature, target) {
                continue;
            }
            if let Err(e) = self.place(target, placement) {
                tracing::warn!("could not derive placement of {target} from {feature}: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Config, ModelError,
        expr::{BinaryOp, IDENTITY, UnaryOp, Vec3},
        kinds::{Direction, Frame, ORIENTATION, ORIGIN, RealParameter, Station, Vec3Parameter},
    };

    fn reference(model: &Model, feature: FeatureId) -> Placement {
        model
            .feature(feature)
            .unwrap()
            .reference(PlacementIndex::Whole)
            .unwrap()
            .into()
    }

    fn offset(from: Placement, by: Vec3) -> Placement {
        from.combine(BinaryOp::Add, Placement::vec3(by).unwrap())
    }

    fn child(model: &Model, feature: FeatureId, name: &str) -> FeatureId {
        model.feature(feature).unwrap().child(name).unwrap().id()
    }

    #[test]
    fn placement_reads_back() {
        let mut model = Model::new();
        let root = model.add_subsystem(None, "root").unwrap();
        let a = model.add_feature(Some(root), "a", Station).unwrap();
        let value = Placement::station([1.0, 2.0, 3.0]).unwrap();

        model.place(a, value.clone()).unwrap();

        assert!(model.has_placement(a));
        assert_eq!(model.placement(a), Ok(&value));
        assert_eq!(model.slot_owner(a), Some(a.subsystem()));
        assert_eq!(model.placement_slot(a).unwrap().user(), a);
    }

    #[test]
    fn rejected_placement_changes_nothing() {
        let mut model = Model::new();
        let d = model.add_feature(None, "d", Direction).unwrap();

        let err = model.place(d, Placement::real(2.0).unwrap()).unwrap_err();
        assert_eq!(
            err,
            PlacementError::Incompatible {
                feature: d,
                kind: "Direction",
                required: PlacementType::Direction,
                found: Some(PlacementType::Real),
            }
        );
        assert!(!model.has_placement(d));
        assert_eq!(model.placement(d), Err(PlacementError::NoPlacement(d)));
        assert!(model.node(d.subsystem()).slots.is_empty());
    }

    #[test]
    fn empty_placement_is_incompatible() {
        let mut model = Model::new();
        let r = model.add_feature(None, "r", RealParameter).unwrap();
        assert!(matches!(
            model.place(r, Placement::empty()),
            Err(PlacementError::Incompatible { found: None, .. })
        ));
    }

    #[test]
    fn placing_twice_is_refused() {
        let mut model = Model::new();
        let a = model.add_feature(None, "a", Station).unwrap();
        let first = Placement::station([0.0; 3]).unwrap();
        model.place(a, first.clone()).unwrap();

        assert_eq!(
            model.place(a, Placement::station([1.0; 3]).unwrap()),
            Err(PlacementError::AlreadyPlaced(a))
        );
        assert_eq!(model.placement(a), Ok(&first));
    }

    #[test]
    fn replace_requires_a_placement() {
        let mut model = Model::new();
        let a = model.add_feature(None, "a", Station).unwrap();
        assert_eq!(
            model.replace(a, Placement::station([0.0; 3]).unwrap()),
            Err(PlacementError::NotPlaced(a))
        );
    }

    #[test]
    fn conversion_is_applied_on_place() {
        let mut model = Model::new();
        let root = model.add_subsystem(None, "root").unwrap();
        let s = model.add_feature(Some(root), "s", Station).unwrap();
        let v = model.add_feature(Some(root), "v", Vec3Parameter).unwrap();

        model
            .place(s, Placement::frame(IDENTITY, [0.0, 0.0, 1.0]).unwrap())
            .unwrap();
        assert_eq!(
            model.placement(s).unwrap().placement_type(),
            Some(PlacementType::Station)
        );

        model.place(v, reference(&model, s)).unwrap();
        assert_eq!(
            model.placement(v).unwrap().placement_type(),
            Some(PlacementType::Vec3)
        );
        assert!(model.depends_on(v, s));
    }

    #[test]
    fn failed_replace_keeps_old_value() {
        let mut model = Model::new();
        let root = model.add_subsystem(None, "root").unwrap();
        let a = model.add_feature(Some(root), "a", Station).unwrap();
        let b = model.add_feature(Some(root), "b", Station).unwrap();
        let original = Placement::station([0.0; 3]).unwrap();
        model.place(a, original.clone()).unwrap();
        model.place(b, offset(reference(&model, a), [1.0, 0.0, 0.0])).unwrap();

        let err = model.replace(a, reference(&model, b)).unwrap_err();
        assert_eq!(
            err,
            PlacementError::Cycle {
                feature: a,
                dependency: b
            }
        );
        assert_eq!(model.placement(a), Ok(&original));
        assert_eq!(model.slot_owner(a), Some(a.subsystem()));
        assert!(model.depends_on(b, a));
        assert!(!model.depends_on(a, b));
    }

    #[test]
    fn replace_moves_the_slot_to_the_new_owner() {
        let mut model = Model::new();
        let root = model.add_subsystem(None, "root").unwrap();
        let left = model.add_subsystem(Some(root), "left").unwrap();
        let right = model.add_subsystem(Some(root), "right").unwrap();
        let a = model.add_feature(Some(left), "a", Station).unwrap();
        let c = model.add_feature(Some(left), "c", Station).unwrap();
        let b = model.add_feature(Some(right), "b", Station).unwrap();
        for feature in [b, c] {
            model.place(feature, Placement::station([0.0; 3]).unwrap()).unwrap();
        }

        let first = Placement::station([5.0; 3]).unwrap();
        model.place(a, first.clone()).unwrap();

        let near = offset(reference(&model, c), [1.0, 0.0, 0.0]);
        assert_eq!(model.replace(a, near.clone()), Ok(first));
        assert_eq!(model.slot_owner(a), Some(left));
        assert!(!model.node(a.subsystem()).slots.contains_key(&a));

        let far = offset(reference(&model, b), [1.0, 0.0, 0.0]);
        assert_eq!(model.replace(a, far.clone()), Ok(near));
        assert_eq!(model.slot_owner(a), Some(root));
        assert!(!model.node(left).slots.contains_key(&a));
        assert_eq!(model.placement(a), Ok(&far));
        assert!(model.depends_on(a, b));
        assert!(!model.depends_on(a, c));
        assert_eq!(model.dependants(c).count(), 0);
    }

    #[test]
    fn removal_is_idempotent() {
        let mut model = Model::new();
        let root = model.add_subsystem(None, "root").unwrap();
        let a = model.add_feature(Some(root), "a", Station).unwrap();
        let b = model.add_feature(Some(root), "b", Station).unwrap();
        model.place(a, Placement::station([0.0; 3]).unwrap()).unwrap();
        model.place(b, reference(&model, a)).unwrap();

        assert!(model.remove_placement(b));
        assert!(!model.remove_placement(b));
        assert!(!model.has_placement(b));
        assert!(model.node(root).slots.is_empty());
        assert_eq!(model.dependants(a).count(), 0);
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let mut model = Model::new();
        let a = model.add_feature(None, "a", Station).unwrap();
        assert_eq!(
            model.place(a, offset(reference(&model, a), [1.0, 0.0, 0.0])),
            Err(PlacementError::Cycle {
                feature: a,
                dependency: a
            })
        );
        assert!(!model.has_placement(a));
    }

    #[test]
    fn indirect_cycle_is_refused() {
        let mut model = Model::new();
        let root = model.add_subsystem(None, "root").unwrap();
        let a = model.add_feature(Some(root), "a", Station).unwrap();
        let b = model.add_feature(Some(root), "b", Station).unwrap();
        let c = model.add_feature(Some(root), "c", Station).unwrap();
        model.place(a, Placement::station([0.0; 3]).unwrap()).unwrap();
        model.place(b, offset(reference(&model, a), [1.0, 0.0, 0.0])).unwrap();
        model.place(c, offset(reference(&model, b), [1.0, 0.0, 0.0])).unwrap();

        assert!(model.depends_on_transitively(c, a));
        assert!(!model.depends_on(c, a));
        assert_eq!(
            model.replace(a, reference(&model, c)),
            Err(PlacementError::Cycle {
                feature: a,
                dependency: c
            })
        );
        assert!(!model.has_cycles());
    }

    #[test]
    fn references_across_trees_are_refused() {
        let mut model = Model::new();
        let a = model.add_feature(None, "a", Station).unwrap();
        let b = model.add_feature(None, "b", Station).unwrap();
        model.place(b, Placement::station([0.0; 3]).unwrap()).unwrap();

        assert_eq!(
            model.place(a, reference(&model, b)),
            Err(PlacementError::OutsideTree {
                feature: a,
                referenced: b
            })
        );
    }

    #[test]
    fn removed_feature_is_unknown() {
        let mut model = Model::new();
        let root = model.add_subsystem(None, "root").unwrap();
        let a = model.add_feature(Some(root), "a", Station).unwrap();
        model.remove_subsystem(a.subsystem());

        assert!(!model.has_placement(a));
        assert!(!model.remove_placement(a));
        assert_eq!(
            model.place(a, Placement::station([0.0; 3]).unwrap()),
            Err(PlacementError::UnknownFeature(a))
        );
    }

    #[test]
    fn frame_used_as_station_reads_its_origin() {
        let mut model = Model::new();
        let root = model.add_subsystem(None, "root").unwrap();
        let frame = model.add_feature(Some(root), "frame", Frame).unwrap();
        let s = model.add_feature(Some(root), "s", Station).unwrap();
        let r = model.add_feature(Some(root), "r", RealParameter).unwrap();
        let origin = child(&model, frame, ORIGIN);

        assert_eq!(
            model.feature_as_placement(frame, PlacementType::Station),
            reference(&model, origin)
        );
        assert!(model.feature_as_placement(frame, PlacementType::Real).is_empty());
        assert!(model.can_place_on_feature_like(s, frame));
        assert!(!model.can_place_on_feature_like(r, frame));

        model.place_on_feature(s, frame).unwrap();
        assert!(model.depends_on(s, origin));
        assert!(!model.depends_on(s, frame));
        assert_eq!(model.slot_owner(s), Some(root));

        assert!(matches!(
            model.place_on_feature(r, frame),
            Err(PlacementError::Incompatible { .. })
        ));
    }

    #[test]
    fn placing_a_frame_derives_its_sub_features() {
        let mut model = Model::new();
        let frame = model.add_feature(None, "frame", Frame).unwrap();
        let origin = child(&model, frame, ORIGIN);
        let orientation = child(&model, frame, ORIENTATION);

        model
            .place(frame, Placement::frame(IDENTITY, [0.0, 1.0, 0.0]).unwrap())
            .unwrap();

        assert!(model.depends_on(origin, frame));
        assert!(model.depends_on(orientation, frame));
        assert_eq!(model.slot_owner(origin), Some(frame.subsystem()));
        assert_eq!(
            model.placement(orientation).unwrap().placement_type(),
            Some(PlacementType::Orientation)
        );
    }

    #[test]
    fn frame_placed_on_its_origin_keeps_the_origin() {
        let mut model = Model::new();
        let frame = model.add_feature(None, "frame", Frame).unwrap();
        let origin = child(&model, frame, ORIGIN);
        let orientation = child(&model, frame, ORIENTATION);
        let value = Placement::station([1.0, 0.0, 0.0]).unwrap();
        model.place(origin, value.clone()).unwrap();

        model.place(frame, reference(&model, origin)).unwrap();

        assert!(model.depends_on(frame, origin));
        assert_eq!(model.placement(origin), Ok(&value));
        assert!(model.depends_on(orientation, frame));
        assert!(!model.has_cycles());
    }

    #[test]
    fn frame_placed_through_its_origin_keeps_the_origin() {
        let mut model = Model::with_config(Config {
            cycle_check: CycleCheck::Deferred,
            ..Config::default()
        });
        let root = model.add_subsystem(None, "root").unwrap();
        let frame = model.add_feature(Some(root), "frame", Frame).unwrap();
        let s = model.add_feature(Some(root), "s", Station).unwrap();
        let origin = child(&model, frame, ORIGIN);
        let orientation = child(&model, frame, ORIENTATION);
        model.place(s, reference(&model, origin)).unwrap();

        model
            .place(frame, reference(&model, s).apply(UnaryOp::FrameFromStation))
            .unwrap();

        assert!(model.depends_on_transitively(frame, origin));
        assert!(!model.has_placement(origin));
        assert!(model.depends_on(orientation, frame));
        assert!(!model.has_cycles());
        assert!(model.cycles().is_empty());
    }

    #[test]
    fn derivation_can_be_disabled() {
        let mut model = Model::with_config(Config {
            derive_subfeature_placements: false,
            ..Config::default()
        });
        let frame = model.add_feature(None, "frame", Frame).unwrap();
        model
            .place(frame, Placement::frame(IDENTITY, [0.0; 3]).unwrap())
            .unwrap();
        assert!(!model.has_placement(child(&model, frame, ORIGIN)));
    }

    #[test]
    fn deferred_mode_reports_cycles() {
        let mut model = Model::with_config(Config {
            cycle_check: CycleCheck::Deferred,
            ..Config::default()
        });
        let root = model.add_subsystem(None, "root").unwrap();
        let a = model.add_feature(Some(root), "a", Vec3Parameter).unwrap();
        let b = model.add_feature(Some(root), "b", Vec3Parameter).unwrap();
        let c = model.add_feature(Some(root), "c", Vec3Parameter).unwrap();

        model.place(a, reference(&model, b)).unwrap();
        model.place(b, reference(&model, a)).unwrap();
        model.place(c, reference(&model, c)).unwrap();

        assert!(model.has_cycles());
        let mut expected = vec![vec![a, b], vec![c]];
        for cycle in &mut expected {
            cycle.sort();
        }
        expected.sort();
        assert_eq!(model.cycles(), expected);

        model.remove_placement(a);
        model.remove_placement(c);
        assert!(!model.has_cycles());
        assert!(model.cycles().is_empty());
    }

    #[test]
    fn duplicate_feature_names_do_not_place() {
        let mut model = Model::new();
        model.add_feature(None, "a", Station).unwrap();
        assert!(matches!(
            model.add_feature(None, "a", Station),
            Err(ModelError::DuplicateName(_))
        ));
    }
}
