//! Structural operations that move slots between owners: subtree copies
//! (with placement fixup) and subtree removal.

use std::collections::{HashMap, HashSet};

use tracing::instrument;

use super::{Model, ModelError, PlacementError, Subsystem};
use crate::domain::{
    FeatureId, Name, Placement, SubsystemId,
    placement::{PlacementSlot, SlotRef},
};

/// Correspondence between a copied subtree and its copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyMap {
    old_root: SubsystemId,
    new_root: SubsystemId,
    ids: HashMap<SubsystemId, SubsystemId>,
}

impl CopyMap {
    /// Root of the subtree that was copied.
    #[must_use]
    pub const fn old_root(&self) -> SubsystemId {
        self.old_root
    }

    /// Root of the copy.
    #[must_use]
    pub const fn new_root(&self) -> SubsystemId {
        self.new_root
    }

    /// The copy of `old`, if `old` was inside the copied subtree.
    #[must_use]
    pub fn get(&self, old: impl Into<SubsystemId>) -> Option<SubsystemId> {
        self.ids.get(&old.into()).copied()
    }

    /// The copy of the feature `old`, if it was inside the copied subtree.
    #[must_use]
    pub fn feature(&self, old: FeatureId) -> Option<FeatureId> {
        self.get(old).map(FeatureId::from_subsystem)
    }

    /// Maps features inside the copied subtree to their copies and leaves
    /// every other feature unchanged.
    #[must_use]
    pub fn remap(&self, feature: FeatureId) -> FeatureId {
        self.feature(feature).unwrap_or(feature)
    }
}

impl Model {
    /// Copies the subtree rooted at `root` under `new_parent` (or to the top
    /// level), naming the copy `new_name`.
    ///
    /// Every copied feature's placement is rebound with
    /// [`Model::fix_feature_placement`], so the copy reproduces the ownership
    /// and dependency structure of the original under the old → new
    /// correspondence.
    ///
    /// # Errors
    ///
    /// Fails if `root` or `new_parent` does not exist, `new_name` is invalid,
    /// or a sibling of the copy already has that name.
    #[instrument(level = "debug", skip(self))]
    pub fn copy_subtree(
        &mut self,
        root: SubsystemId,
        new_parent: Option<SubsystemId>,
        new_name: &str,
    ) -> Result<CopyMap, ModelError> {
        if !self.contains(root) {
            return Err(ModelError::NotFound(root));
        }
        let new_name = Name::try_from(new_name)?;

        let originals = self.subtree(root);
        let new_root = self.insert(new_parent, new_name, self.node(root).kind.clone())?;

        let mut ids = HashMap::with_capacity(originals.len());
        ids.insert(root, new_root);
        for &old in &originals[1..] {
            let original = self.node(old);
            let parent = original
                .parent
                .and_then(|parent| ids.get(&parent).copied())
                .unwrap_or_else(|| panic!("parent of {old} copied after its child"));
            let copy = Subsystem::new(original.name.clone(), Some(parent), original.kind.clone());
            let is_feature = copy.kind.is_some();

            let new = SubsystemId::new();
            self.subsystems.insert(new, copy);
            self.node_mut(parent).children.push(new);
            if is_feature {
                self.graph.add_node(FeatureId::from_subsystem(new));
            }
            ids.insert(old, new);
        }

        let map = CopyMap {
            old_root: root,
            new_root,
            ids,
        };

        for old in originals {
            let Some(original) = self.feature_id(old) else {
                continue;
            };
            if let Err(e) = self.fix_feature_placement(original, &map) {
                tracing::warn!("copy of {original} left unplaced: {e}");
            }
        }

        Ok(map)
    }

    /// Rebinds the placement of the copy of `original` after a subtree copy.
    ///
    /// If the original's slot was owned inside the copied subtree, the copy
    /// gets a slot owned by the corresponding subsystem of the new subtree,
    /// with every reference into the copied subtree remapped. If the slot was
    /// owned outside, the remapped placement is validated as in
    /// [`Model::place`] when `copy_external_placements` is set, and the copy
    /// is otherwise left unplaced. No sub-feature placements are derived, so
    /// every copied feature mirrors its own original.
    ///
    /// Returns whether the copy ended up placed.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError::UnknownFeature`] if `original` was not part
    /// of the copy, [`PlacementError::AlreadyPlaced`] if its copy is already
    /// placed, or the validation error for an externally owned placement that
    /// could not be re-placed.
    pub fn fix_feature_placement(
        &mut self,
        original: FeatureId,
        map: &CopyMap,
    ) -> Result<bool, PlacementError> {
        let copy = map
            .feature(original)
            .ok_or(PlacementError::UnknownFeature(original))?;
        if self.has_placement(copy) {
            return Err(PlacementError::AlreadyPlaced(copy));
        }
        let Some(old_owner) = self.slot_owner(original) else {
            return Ok(false);
        };
        let placement = self.placement(original)?;
        let remapped: Placement = placement
            .rep()
            .map(|rep| rep.remap_features(&|feature| map.remap(feature)))
            .into();

        if let Some(new_owner) = map.get(old_owner) {
            let slot = PlacementSlot::new(copy, remapped);
            for dependency in slot.placement().dependencies() {
                self.graph.add_edge(copy, dependency, ());
            }
            self.node_mut(new_owner).slots.insert(copy, slot);
            self.node_mut(copy.subsystem()).placement = Some(SlotRef { owner: new_owner });
            tracing::debug!("rebound placement of {copy} to owner {new_owner}");
            return Ok(true);
        }

        if !self.config.copy_external_placements {
            tracing::debug!("placement of {original} is owned outside the copy; {copy} left unplaced");
            return Ok(false);
        }
        // Sub-features get their own copied placements.
        self.place_underived(copy, remapped)?;
        Ok(true)
    }

    /// Removes the subtree rooted at `id`.
    ///
    /// Slots owned by removed subsystems are destroyed, and every feature
    /// they placed is notified. Placements of surviving features that read a
    /// removed feature would dangle, so they are removed as well.
    ///
    /// Returns `false` if the subsystem did not exist.
    #[instrument(level = "debug", skip(self))]
    pub fn remove_subsystem(&mut self, id: SubsystemId) -> bool {
        if !self.contains(id) {
            return false;
        }
        let removed = self.subtree(id);
        let removed_set: HashSet<_> = removed.iter().copied().collect();
        let removed_features: Vec<FeatureId> = removed
            .iter()
            .filter_map(|&sub| self.feature_id(sub))
            .collect();

        // Surviving placements that read a removed feature.
        let dangling: HashSet<FeatureId> = removed_features
            .iter()
            .flat_map(|&feature| self.dependants(feature))
            .filter(|dependant| !removed_set.contains(&dependant.subsystem()))
            .collect();
        for dependant in dangling {
            tracing::warn!("removing placement of {dependant}: it reads a removed feature");
            self.remove_placement(dependant);
        }

        // Removed features whose slot lives on a surviving ancestor.
        for &feature in &removed_features {
            if self
                .slot_owner(feature)
                .is_some_and(|owner| !removed_set.contains(&owner))
            {
                self.remove_placement(feature);
            }
        }

        // Slots owned inside the removed subtree.
        for &sub in &removed {
            let users: Vec<FeatureId> = self.node(sub).slots.keys().copied().collect();
            self.node_mut(sub).slots.clear();
            for user in users {
                self.clear_placement_slot(user);
            }
        }

        match self.parent(id) {
            Some(parent) => self.node_mut(parent).children.retain(|&child| child != id),
            None => self.roots.retain(|&root| root != id),
        }
        for sub in removed {
            self.subsystems.remove(&sub);
            self.graph.remove_node(FeatureId::from_subsystem(sub));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Config, PlacementIndex,
        expr::{BinaryOp, IDENTITY, UnaryOp},
        kinds::{Frame, ORIENTATION, ORIGIN, Station},
    };

    fn reference(model: &Model, feature: FeatureId) -> Placement {
        model
            .feature(feature)
            .unwrap()
            .reference(PlacementIndex::Whole)
            .unwrap()
            .into()
    }

    fn offset(model: &Model, from: FeatureId) -> Placement {
        reference(model, from).combine(BinaryOp::Add, Placement::vec3([1.0, 0.0, 0.0]).unwrap())
    }

    fn origin_of(model: &Model, frame: FeatureId) -> FeatureId {
        model.feature(frame).unwrap().child(ORIGIN).unwrap().id()
    }

    /// `arm` holding a placed frame `pivot` and a station `tip` on it.
    fn arm(model: &mut Model, parent: Option<SubsystemId>) -> (SubsystemId, FeatureId, FeatureId) {
        let arm = model.add_subsystem(parent, "arm").unwrap();
        let pivot = model.add_feature(Some(arm), "pivot", Frame).unwrap();
        let tip = model.add_feature(Some(arm), "tip", Station).unwrap();
        model
            .place(pivot, Placement::frame(IDENTITY, [0.0, 0.0, 1.0]).unwrap())
            .unwrap();
        model.place_on_feature(tip, pivot).unwrap();
        (arm, pivot, tip)
    }

    #[test]
    fn copy_mirrors_internal_placements() {
        let mut model = Model::new();
        let (arm, pivot, tip) = arm(&mut model, None);
        let origin = origin_of(&model, pivot);

        let map = model.copy_subtree(arm, None, "arm2").unwrap();
        assert_eq!(map.old_root(), arm);
        let new_arm = map.new_root();
        let new_pivot = map.feature(pivot).unwrap();
        let new_tip = map.feature(tip).unwrap();
        let new_origin = map.feature(origin).unwrap();
        assert_eq!(model.path_of(new_origin).unwrap().to_string(), "arm2/pivot/origin");

        assert_eq!(model.slot_owner(new_tip), Some(new_arm));
        assert!(model.depends_on(new_tip, new_origin));
        assert!(!model.depends_on(new_tip, origin));
        assert_eq!(model.slot_owner(new_origin), Some(new_pivot.subsystem()));
        assert!(model.depends_on(new_origin, new_pivot));
        assert_eq!(model.placement(new_pivot), model.placement(pivot));

        // The original is untouched.
        assert_eq!(model.slot_owner(tip), Some(arm));
        assert!(model.depends_on(tip, origin));
        assert_eq!(model.dependants(origin).collect::<Vec<_>>(), [tip]);
    }

    #[test]
    fn external_placements_are_re_placed() {
        let mut model = Model::new();
        let robot = model.add_subsystem(None, "robot").unwrap();
        let anchor = model.add_feature(Some(robot), "anchor", Station).unwrap();
        model.place(anchor, Placement::station([0.0; 3]).unwrap()).unwrap();
        let group = model.add_subsystem(Some(robot), "group").unwrap();
        let p = model.add_feature(Some(group), "p", Station).unwrap();
        model.place(p, offset(&model, anchor)).unwrap();
        assert_eq!(model.slot_owner(p), Some(robot));

        let map = model.copy_subtree(group, Some(robot), "group2").unwrap();
        let new_p = map.feature(p).unwrap();
        assert!(model.depends_on(new_p, anchor));
        assert_eq!(model.slot_owner(new_p), Some(robot));
    }

    #[test]
    fn external_frame_copy_keeps_its_origin_placement() {
        let mut model = Model::new();
        let robot = model.add_subsystem(None, "robot").unwrap();
        let anchor = model.add_feature(Some(robot), "anchor", Station).unwrap();
        model.place(anchor, Placement::station([0.0; 3]).unwrap()).unwrap();
        let group = model.add_subsystem(Some(robot), "group").unwrap();
        let f = model.add_feature(Some(group), "f", Frame).unwrap();
        let origin = origin_of(&model, f);
        let fixed = Placement::station([5.0, 5.0, 5.0]).unwrap();
        model.place(origin, fixed.clone()).unwrap();
        model
            .place(f, reference(&model, anchor).apply(UnaryOp::FrameFromStation))
            .unwrap();
        assert!(!model.depends_on(origin, f));

        let map = model.copy_subtree(group, Some(robot), "group2").unwrap();
        let new_f = map.feature(f).unwrap();
        let new_origin = map.feature(origin).unwrap();

        assert_eq!(model.slot_owner(new_f), Some(robot));
        assert!(model.depends_on(new_f, anchor));
        assert!(!model.depends_on(new_origin, new_f));
        assert_eq!(model.placement(new_origin), Ok(&fixed));
        let orientation = model.feature(f).unwrap().child(ORIENTATION).unwrap().id();
        assert!(model.depends_on(orientation, f));
        assert!(model.depends_on(map.feature(orientation).unwrap(), new_f));
    }

    #[test]
    fn fixup_of_placed_copy_is_refused() {
        let mut model = Model::new();
        let (arm, pivot, _) = arm(&mut model, None);
        let map = model.copy_subtree(arm, None, "arm2").unwrap();

        assert_eq!(
            model.fix_feature_placement(pivot, &map),
            Err(PlacementError::AlreadyPlaced(map.feature(pivot).unwrap()))
        );
    }

    #[test]
    fn external_placements_can_be_left_unplaced() {
        let mut model = Model::with_config(Config {
            copy_external_placements: false,
            ..Config::default()
        });
        let robot = model.add_subsystem(None, "robot").unwrap();
        let anchor = model.add_feature(Some(robot), "anchor", Station).unwrap();
        model.place(anchor, Placement::station([0.0; 3]).unwrap()).unwrap();
        let p = model.add_feature(Some(robot), "p", Station).unwrap();
        model.place(p, offset(&model, anchor)).unwrap();

        let map = model.copy_subtree(p.subsystem(), Some(robot), "q").unwrap();
        assert!(!model.has_placement(map.feature(p).unwrap()));
        assert!(model.has_placement(p));
    }

    #[test]
    fn fixup_of_uncopied_feature_is_refused() {
        let mut model = Model::new();
        let (arm, _, _) = arm(&mut model, None);
        let other = model.add_feature(None, "other", Station).unwrap();
        let map = model.copy_subtree(arm, None, "arm2").unwrap();

        assert_eq!(
            model.fix_feature_placement(other, &map),
            Err(PlacementError::UnknownFeature(other))
        );
    }

    #[test]
    fn copy_needs_a_free_name() {
        let mut model = Model::new();
        let (arm, _, _) = arm(&mut model, None);
        assert!(matches!(
            model.copy_subtree(arm, None, "arm"),
            Err(ModelError::DuplicateName(_))
        ));
    }

    #[test]
    fn removing_a_dependency_unplaces_its_users() {
        let mut model = Model::new();
        let root = model.add_subsystem(None, "root").unwrap();
        let a = model.add_feature(Some(root), "a", Station).unwrap();
        let b = model.add_feature(Some(root), "b", Station).unwrap();
        model.place(a, Placement::station([0.0; 3]).unwrap()).unwrap();
        model.place(b, offset(&model, a)).unwrap();

        assert!(model.remove_subsystem(a.subsystem()));

        assert!(!model.contains(a));
        assert!(!model.has_placement(b));
        assert!(model.node(root).slots.is_empty());
        assert_eq!(model.children(root).collect::<Vec<_>>(), [b.subsystem()]);
        assert_eq!(model.features().count(), 1);
    }

    #[test]
    fn removing_a_subtree_releases_slots_held_by_ancestors() {
        let mut model = Model::new();
        let root = model.add_subsystem(None, "root").unwrap();
        let anchor = model.add_feature(Some(root), "anchor", Station).unwrap();
        model.place(anchor, Placement::station([0.0; 3]).unwrap()).unwrap();
        let (arm, _, tip) = arm(&mut model, Some(root));
        model.replace(tip, offset(&model, anchor)).unwrap();
        assert_eq!(model.slot_owner(tip), Some(root));

        assert!(model.remove_subsystem(arm));

        assert!(model.node(root).slots.is_empty());
        assert_eq!(model.dependants(anchor).count(), 0);
        assert_eq!(model.features().collect::<Vec<_>>(), [anchor]);
        assert!(model.has_placement(anchor));
    }

    #[test]
    fn removing_top_level_and_unknown_subsystems() {
        let mut model = Model::new();
        let (arm, _, _) = arm(&mut model, None);
        assert!(model.remove_subsystem(arm));
        assert!(!model.remove_subsystem(arm));
        assert_eq!(model.top_level().count(), 0);
        assert!(!model.has_cycles());
    }
}
