//! Feature models and their compilation into a single feature expression.
//!
//! A model is a tree of features connected by groups, plus cross-tree
//! constraints. It is stored as an arena: features and groups are addressed
//! by [`FeatureId`] and [`GroupId`], and parent/child links are indices.
//!
//! Compilation is bottom-up. A feature's expression is its own variable
//! conjoined with one expression per child group, each built from the
//! children's compiled subtree expressions:
//!
//! | Group | Expression over children `c_i` |
//! |-------|--------------------------------|
//! | Mandatory | `c` |
//! | Optional | `c \|\| !c` |
//! | Or | `c_1 \|\| ... \|\| c_n` |
//! | Alternative | `c_1 \|\| ... \|\| c_n` and `!c_i \|\| !c_j` for every pair |
//! | Cardinality `[l..u]` | at least `l` and at most `u` of the `c_i` |
//!
//! ```
//! use fts_rs::feature_model::{FeatureModelBuilder, GroupType};
//!
//! let mut builder = FeatureModelBuilder::new();
//! let root = builder.set_root_feature("R").unwrap();
//! let g = builder.add_group(root, GroupType::Mandatory).unwrap();
//! builder.add_feature(g, "A").unwrap();
//! let g = builder.add_group(root, GroupType::Optional).unwrap();
//! builder.add_feature(g, "B").unwrap();
//! let model = builder.build().unwrap();
//!
//! assert_eq!(model.expression().to_string(), "(R && A && (B || !B))");
//! assert_eq!(model.number_of_solutions().unwrap(), 2u32.into());
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use itertools::Itertools;
use log::{debug, info};
use num_bigint::BigUint;

use crate::configuration::{Configuration, ConfigurationSet};
use crate::error::{DefinitionError, FeatureModelError, SolverError};
use crate::fexpr::{FExpression, Feature};
use crate::solver::{ConstraintId, Solver, SolverConfig, SolverFacade, SolverType};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureId(usize);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(usize);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum GroupType {
    Mandatory,
    Optional,
    Or,
    Alternative,
    /// Between `lower` and `upper` children selected, `upper = None` is unbounded.
    Cardinality { lower: usize, upper: Option<usize> },
}

impl GroupType {
    fn name(&self) -> &'static str {
        match self {
            GroupType::Mandatory => "mandatory",
            GroupType::Optional => "optional",
            GroupType::Or => "or",
            GroupType::Alternative => "alternative",
            GroupType::Cardinality { .. } => "cardinality",
        }
    }
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupType::Cardinality { lower, upper: Some(upper) } => write!(f, "[{}..{}]", lower, upper),
            GroupType::Cardinality { lower, upper: None } => write!(f, "[{}..*]", lower),
            other => f.write_str(other.name()),
        }
    }
}

/// A cross-tree constraint, scoped to the subtree of its least common ancestor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrossTreeConstraint {
    Exclusion {
        lca: FeatureId,
        first: FeatureId,
        second: FeatureId,
    },
    Requirement {
        lca: FeatureId,
        feature: FeatureId,
        dependency: FeatureId,
    },
}

impl CrossTreeConstraint {
    pub fn lca(&self) -> FeatureId {
        match self {
            CrossTreeConstraint::Exclusion { lca, .. } | CrossTreeConstraint::Requirement { lca, .. } => *lca,
        }
    }
}

#[derive(Debug, Clone)]
struct FeatureNode {
    feature: Feature,
    parent: Option<GroupId>,
    groups: Vec<GroupId>,
}

#[derive(Debug, Clone)]
struct GroupNode {
    kind: GroupType,
    parent: FeatureId,
    children: Vec<FeatureId>,
}

/// The feature tree without a solver, shared by the builder and the model.
#[derive(Debug, Clone, Default)]
struct Tree {
    features: Vec<FeatureNode>,
    groups: Vec<GroupNode>,
    by_name: HashMap<Feature, FeatureId>,
}

impl Tree {
    fn parent(&self, id: FeatureId) -> Option<FeatureId> {
        self.features[id.0].parent.map(|g| self.groups[g.0].parent)
    }

    /// `id`, its parent, and so on up to the root.
    fn ancestors(&self, id: FeatureId) -> Vec<FeatureId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(p) = self.parent(current) {
            chain.push(p);
            current = p;
        }
        chain
    }

    fn is_in_subtree(&self, id: FeatureId, root: FeatureId) -> bool {
        self.ancestors(id).contains(&root)
    }

    fn lookup(&self, name: &str) -> Result<FeatureId, DefinitionError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| DefinitionError::UnknownFeature(name.to_string()))
    }

    fn var(&self, id: FeatureId) -> FExpression {
        FExpression::feature_expr(self.features[id.0].feature.clone())
    }

    fn check_group(&self, group: &GroupNode) -> Result<(), DefinitionError> {
        let n = group.children.len();
        let parent = self.features[group.parent.0].feature.to_string();
        match group.kind {
            GroupType::Mandatory | GroupType::Optional if n != 1 => Err(DefinitionError::GroupArity {
                kind: group.kind.name(),
                parent,
                children: n,
            }),
            GroupType::Or | GroupType::Alternative if n == 0 => Err(DefinitionError::EmptyGroup {
                kind: group.kind.name(),
                parent,
            }),
            GroupType::Cardinality { lower, upper } if lower > n || upper.is_some_and(|u| u < lower) => {
                Err(DefinitionError::InvalidCardinality {
                    parent,
                    lower,
                    upper,
                    children: n,
                })
            }
            _ => Ok(()),
        }
    }

    fn compile_feature(&self, id: FeatureId) -> FExpression {
        let node = &self.features[id.0];
        let mut operands = vec![self.var(id)];
        for &g in &node.groups {
            operands.push(self.compile_group(&self.groups[g.0]));
        }
        match operands.len() {
            1 => self.var(id),
            _ => FExpression::all(operands),
        }
    }

    fn compile_group(&self, group: &GroupNode) -> FExpression {
        let children: Vec<FExpression> = group.children.iter().map(|&c| self.compile_feature(c)).collect();
        match group.kind {
            GroupType::Mandatory => children[0].clone(),
            GroupType::Optional => children[0].or(&children[0].not()),
            GroupType::Or => FExpression::any(children),
            GroupType::Alternative => {
                let mut exactly_one = vec![FExpression::any(children.iter().cloned())];
                for (a, b) in children.iter().tuple_combinations() {
                    exactly_one.push(a.not().or(&b.not()));
                }
                FExpression::all(exactly_one)
            }
            GroupType::Cardinality { lower, upper } => cardinality(&children, lower, upper),
        }
    }

    fn compile_constraint(&self, constraint: &CrossTreeConstraint) -> FExpression {
        match *constraint {
            CrossTreeConstraint::Exclusion { first, second, .. } => {
                let (f1, f2) = (self.var(first), self.var(second));
                f1.or(&f2).and(&f1.not().or(&f2.not()))
            }
            CrossTreeConstraint::Requirement { feature, dependency, .. } => {
                self.var(feature).not().or(&self.var(dependency))
            }
        }
    }
}

/// At least `lower` and at most `upper` of `children` hold.
///
/// At least `l` of `n` is "every subset of size `n - l + 1` has a true
/// member"; at most `u` is "every subset of size `u + 1` has a false member".
fn cardinality(children: &[FExpression], lower: usize, upper: Option<usize>) -> FExpression {
    let n = children.len();
    let mut clauses = Vec::new();
    if lower > 0 {
        for subset in children.iter().combinations(n - lower + 1) {
            clauses.push(FExpression::any(subset.into_iter().cloned()));
        }
    }
    if let Some(upper) = upper.filter(|&u| u < n) {
        for subset in children.iter().combinations(upper + 1) {
            clauses.push(FExpression::any(subset.into_iter().map(|c| c.not())));
        }
    }
    FExpression::all(clauses)
}

/// Builds a [`FeatureModel`], validating names and constraint scopes as it goes.
#[derive(Debug, Default)]
pub struct FeatureModelBuilder {
    tree: Tree,
    root: Option<FeatureId>,
    constraints: Vec<CrossTreeConstraint>,
    solver_type: SolverType,
    solver_config: SolverConfig,
}

impl FeatureModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_solver(mut self, solver_type: SolverType) -> Self {
        self.solver_type = solver_type;
        self
    }

    pub fn with_solver_config(mut self, config: SolverConfig) -> Self {
        self.solver_config = config;
        self
    }

    fn new_feature(&mut self, name: &str, parent: Option<GroupId>) -> Result<FeatureId, DefinitionError> {
        let feature = Feature::new(name);
        if self.tree.by_name.contains_key(&feature) {
            return Err(DefinitionError::DuplicateFeature(name.to_string()));
        }
        let id = FeatureId(self.tree.features.len());
        self.tree.features.push(FeatureNode {
            feature: feature.clone(),
            parent,
            groups: Vec::new(),
        });
        self.tree.by_name.insert(feature, id);
        Ok(id)
    }

    pub fn set_root_feature(&mut self, name: &str) -> Result<FeatureId, DefinitionError> {
        if let Some(root) = self.root {
            let existing = self.tree.features[root.0].feature.to_string();
            return Err(DefinitionError::RootAlreadySet(existing));
        }
        let id = self.new_feature(name, None)?;
        self.root = Some(id);
        Ok(id)
    }

    pub fn add_group(&mut self, parent: FeatureId, kind: GroupType) -> Result<GroupId, DefinitionError> {
        if parent.0 >= self.tree.features.len() {
            return Err(DefinitionError::UnknownFeature(format!("{:?}", parent)));
        }
        let id = GroupId(self.tree.groups.len());
        self.tree.groups.push(GroupNode {
            kind,
            parent,
            children: Vec::new(),
        });
        self.tree.features[parent.0].groups.push(id);
        Ok(id)
    }

    pub fn add_feature(&mut self, group: GroupId, name: &str) -> Result<FeatureId, DefinitionError> {
        if group.0 >= self.tree.groups.len() {
            return Err(DefinitionError::UnknownFeature(name.to_string()));
        }
        let id = self.new_feature(name, Some(group))?;
        self.tree.groups[group.0].children.push(id);
        Ok(id)
    }

    pub fn add_features<'n>(
        &mut self,
        group: GroupId,
        names: impl IntoIterator<Item = &'n str>,
    ) -> Result<Vec<FeatureId>, DefinitionError> {
        names.into_iter().map(|name| self.add_feature(group, name)).collect()
    }

    fn scoped(&self, lca: &str, features: [&str; 2]) -> Result<(FeatureId, [FeatureId; 2]), DefinitionError> {
        let lca_id = self.tree.lookup(lca)?;
        let mut ids = [lca_id; 2];
        for (slot, name) in ids.iter_mut().zip(features) {
            let id = self.tree.lookup(name)?;
            if !self.tree.is_in_subtree(id, lca_id) {
                return Err(DefinitionError::OutOfScope {
                    feature: name.to_string(),
                    lca: lca.to_string(),
                });
            }
            *slot = id;
        }
        Ok((lca_id, ids))
    }

    /// `first` and `second` exclude each other. Both must be in the subtree of `lca`.
    pub fn add_exclusion_constraint(&mut self, lca: &str, first: &str, second: &str) -> Result<(), DefinitionError> {
        let (lca, [first, second]) = self.scoped(lca, [first, second])?;
        self.constraints.push(CrossTreeConstraint::Exclusion { lca, first, second });
        Ok(())
    }

    /// `feature` requires `dependency`. Both must be in the subtree of `lca`.
    pub fn add_requirement_constraint(
        &mut self,
        lca: &str,
        feature: &str,
        dependency: &str,
    ) -> Result<(), DefinitionError> {
        let (lca, [feature, dependency]) = self.scoped(lca, [feature, dependency])?;
        self.constraints.push(CrossTreeConstraint::Requirement { lca, feature, dependency });
        Ok(())
    }

    /// Validate the tree, compile it and bind the formula to a solver.
    pub fn build(self) -> Result<FeatureModel, FeatureModelError> {
        let root = self.root.ok_or(DefinitionError::MissingRoot)?;
        for group in &self.tree.groups {
            self.tree.check_group(group)?;
        }

        let mut expression = self.tree.compile_feature(root);
        for constraint in &self.constraints {
            expression.and_with(self.tree.compile_constraint(constraint));
        }
        debug!("compiled feature model: {}", expression);

        let solver = Solver::with_config(self.solver_type, &expression, self.solver_config)?;
        info!(
            "Built feature model with {} features, {} groups, {} constraints ({:?} solver)",
            self.tree.features.len(),
            self.tree.groups.len(),
            self.constraints.len(),
            self.solver_type
        );

        Ok(FeatureModel {
            tree: self.tree,
            root,
            constraints: self.constraints,
            expression,
            solver,
        })
    }
}

/// A compiled feature model bound to a solver.
#[derive(Debug)]
pub struct FeatureModel {
    tree: Tree,
    root: FeatureId,
    constraints: Vec<CrossTreeConstraint>,
    expression: FExpression,
    solver: Solver,
}

impl FeatureModel {
    pub fn root_id(&self) -> FeatureId {
        self.root
    }

    pub fn root_feature(&self) -> &Feature {
        self.name(self.root)
    }

    pub fn feature(&self, name: &str) -> Option<&Feature> {
        self.feature_id(name).map(|id| self.name(id))
    }

    pub fn feature_id(&self, name: &str) -> Option<FeatureId> {
        self.tree.by_name.get(name).copied()
    }

    pub fn name(&self, id: FeatureId) -> &Feature {
        &self.tree.features[id.0].feature
    }

    /// All features, in insertion order.
    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.tree.features.iter().map(|n| &n.feature)
    }

    pub fn len(&self) -> usize {
        self.tree.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.features.is_empty()
    }

    /// The parent feature, `None` for the root.
    pub fn parent(&self, id: FeatureId) -> Option<FeatureId> {
        self.tree.parent(id)
    }

    pub fn groups(&self, id: FeatureId) -> &[GroupId] {
        &self.tree.features[id.0].groups
    }

    pub fn group_type(&self, group: GroupId) -> GroupType {
        self.tree.groups[group.0].kind
    }

    pub fn group_children(&self, group: GroupId) -> &[FeatureId] {
        &self.tree.groups[group.0].children
    }

    /// Children of `id` across all its groups.
    pub fn children(&self, id: FeatureId) -> Vec<FeatureId> {
        self.groups(id)
            .iter()
            .flat_map(|&g| self.group_children(g).iter().copied())
            .collect()
    }

    /// All cross-tree constraints.
    pub fn own_constraints(&self) -> &[CrossTreeConstraint] {
        &self.constraints
    }

    /// Cross-tree constraints scoped to `id`.
    pub fn constraints_of(&self, id: FeatureId) -> impl Iterator<Item = &CrossTreeConstraint> {
        self.constraints.iter().filter(move |c| c.lca() == id)
    }

    /// The compiled formula.
    pub fn expression(&self) -> &FExpression {
        &self.expression
    }

    pub fn solver(&self) -> &Solver {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut Solver {
        &mut self.solver
    }

    pub fn add_solver_constraint(&mut self, constraint: &FExpression) -> Result<ConstraintId, SolverError> {
        self.solver.add_constraint(constraint)
    }

    pub fn remove_solver_constraint(&mut self, id: ConstraintId) -> Result<(), SolverError> {
        self.solver.remove_constraint(id)
    }

    pub fn is_satisfiable(&self) -> Result<bool, SolverError> {
        self.solver.is_satisfiable()
    }

    pub fn solutions(&self) -> Result<Box<dyn Iterator<Item = Configuration> + '_>, SolverError> {
        self.solver.solutions()
    }

    pub fn number_of_solutions(&self) -> Result<BigUint, SolverError> {
        self.solver.number_of_solutions()
    }

    pub fn reset_solver(&mut self) -> Result<(), SolverError> {
        self.solver.reset()
    }

    /// The products of this model that also satisfy `constraint`.
    pub fn configurations(&mut self, constraint: FExpression) -> ConfigurationSet<'_> {
        ConfigurationSet::new(&mut self.solver, constraint)
    }

    /// Least common ancestor of `ids` in the feature tree, the root for an empty set.
    pub fn lca(&self, ids: impl IntoIterator<Item = FeatureId>) -> FeatureId {
        let mut chains = ids.into_iter().map(|id| self.tree.ancestors(id));
        let Some(first) = chains.next() else {
            return self.root;
        };
        let others: Vec<Vec<FeatureId>> = chains.collect();
        first
            .into_iter()
            .find(|candidate| others.iter().all(|chain| chain.contains(candidate)))
            .unwrap_or(self.root)
    }

    /// Scope of the disjunction of `expressions`.
    ///
    /// The disjunction is put in CNF. A positive literal contributes its
    /// feature, a negated one the feature's parent. The result is the tree
    /// LCA of those features, or the root when the CNF is constant.
    pub fn lca_of_disjunction(&self, expressions: &[FExpression]) -> Result<FeatureId, DefinitionError> {
        let cnf = FExpression::any(expressions.iter().cloned()).to_cnf();
        if cnf.features().is_empty() {
            return Ok(self.root);
        }

        let clauses = match &cnf {
            FExpression::And(clauses) => clauses.as_slice(),
            other => std::slice::from_ref(other),
        };
        let mut scope = BTreeSet::new();
        for clause in clauses {
            let literals = match clause {
                FExpression::Or(literals) => literals.as_slice(),
                other => std::slice::from_ref(other),
            };
            for literal in literals {
                let (name, negated) = match literal {
                    FExpression::Variable(f) => (f, false),
                    FExpression::Not(inner) => match inner.as_ref() {
                        FExpression::Variable(f) => (f, true),
                        _ => continue,
                    },
                    _ => continue,
                };
                let id = self.tree.lookup(name.name())?;
                let id = if negated { self.parent(id).unwrap_or(id) } else { id };
                scope.insert(id);
            }
        }
        Ok(self.lca(scope))
    }

    fn features_failing(&mut self, value: bool) -> Result<Vec<Feature>, SolverError> {
        let mut result = Vec::new();
        for i in 0..self.tree.features.len() {
            let feature = self.tree.features[i].feature.clone();
            let var = FExpression::feature_expr(feature.clone());
            let literal = if value { var } else { var.not() };
            let id = self.solver.add_constraint(&literal)?;
            let sat = self.solver.is_satisfiable();
            self.solver.remove_constraint(id)?;
            if !sat? {
                result.push(feature);
            }
        }
        Ok(result)
    }

    /// Features selected in every product.
    pub fn core_features(&mut self) -> Result<Vec<Feature>, SolverError> {
        self.features_failing(false)
    }

    /// Features selected in no product.
    pub fn dead_features(&mut self) -> Result<Vec<Feature>, SolverError> {
        self.features_failing(true)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn names(features: &[Feature]) -> Vec<&str> {
        features.iter().map(|f| f.name()).collect()
    }

    /// Phone
    /// ├── Calls (mandatory)
    /// ├── GPS (optional)
    /// ├── Screen (alternative: Basic, Color, HighRes)
    /// └── Media (or: Camera, MP3)
    fn phone(solver: SolverType) -> FeatureModelBuilder {
        let mut b = FeatureModelBuilder::new().with_solver(solver);
        let root = b.set_root_feature("Phone").unwrap();
        let g = b.add_group(root, GroupType::Mandatory).unwrap();
        b.add_feature(g, "Calls").unwrap();
        let g = b.add_group(root, GroupType::Optional).unwrap();
        b.add_feature(g, "GPS").unwrap();
        let g = b.add_group(root, GroupType::Mandatory).unwrap();
        let screen = b.add_feature(g, "Screen").unwrap();
        let g = b.add_group(screen, GroupType::Alternative).unwrap();
        b.add_features(g, ["Basic", "Color", "HighRes"]).unwrap();
        let g = b.add_group(root, GroupType::Optional).unwrap();
        let media = b.add_feature(g, "Media").unwrap();
        let g = b.add_group(media, GroupType::Or).unwrap();
        b.add_features(g, ["Camera", "MP3"]).unwrap();
        b
    }

    #[test]
    fn test_optional_children_double_solutions() {
        for solver in [SolverType::Sat, SolverType::Bdd] {
            let mut b = FeatureModelBuilder::new().with_solver(solver);
            let root = b.set_root_feature("R").unwrap();
            for i in 0..4 {
                let g = b.add_group(root, GroupType::Optional).unwrap();
                b.add_feature(g, &format!("F{}", i)).unwrap();
            }
            let model = b.build().unwrap();
            assert_eq!(model.number_of_solutions().unwrap(), BigUint::from(16u32));
        }
    }

    #[test]
    fn test_wide_model_solutions_are_lazy() {
        let mut b = FeatureModelBuilder::new().with_solver(SolverType::Bdd);
        let root = b.set_root_feature("R").unwrap();
        for i in 0..130 {
            let g = b.add_group(root, GroupType::Optional).unwrap();
            b.add_feature(g, &format!("F{}", i)).unwrap();
        }
        let model = b.build().unwrap();
        assert_eq!(model.number_of_solutions().unwrap(), BigUint::from(1u32) << 130usize);

        let first: Vec<Configuration> = model.solutions().unwrap().take(2).collect();
        assert_eq!(first.len(), 2);
        assert_ne!(first[0], first[1]);
        for c in &first {
            assert_eq!(c.len(), 131);
            assert!(c.is_selected(&Feature::new("R")));
        }
    }

    #[test]
    fn test_alternative_is_exactly_one() {
        let mut b = FeatureModelBuilder::new();
        let root = b.set_root_feature("R").unwrap();
        let g = b.add_group(root, GroupType::Alternative).unwrap();
        b.add_features(g, ["A", "B", "C"]).unwrap();
        let model = b.build().unwrap();
        assert_eq!(model.number_of_solutions().unwrap(), BigUint::from(3u32));
        for c in model.solutions().unwrap() {
            assert!(c.is_selected(&Feature::new("R")));
            assert_eq!(c.selected().count(), 2);
        }
    }

    #[test]
    fn test_cardinality_group() {
        let mut b = FeatureModelBuilder::new().with_solver(SolverType::Bdd);
        let root = b.set_root_feature("R").unwrap();
        let g = b
            .add_group(root, GroupType::Cardinality { lower: 1, upper: Some(2) })
            .unwrap();
        b.add_features(g, ["A", "B", "C"]).unwrap();
        let model = b.build().unwrap();
        // 3 singletons + 3 pairs
        assert_eq!(model.number_of_solutions().unwrap(), BigUint::from(6u32));
    }

    #[test]
    fn test_cardinality_unbounded_matches_or() {
        let mut b = FeatureModelBuilder::new();
        let root = b.set_root_feature("R").unwrap();
        let g = b.add_group(root, GroupType::Cardinality { lower: 1, upper: None }).unwrap();
        b.add_features(g, ["A", "B", "C"]).unwrap();
        assert_eq!(b.build().unwrap().number_of_solutions().unwrap(), BigUint::from(7u32));
    }

    #[test]
    fn test_cross_tree_constraints() {
        for solver in [SolverType::Sat, SolverType::Bdd] {
            let mut b = phone(solver);
            b.add_requirement_constraint("Phone", "Camera", "HighRes").unwrap();
            b.add_exclusion_constraint("Phone", "GPS", "Basic").unwrap();
            let model = b.build().unwrap();
            assert_eq!(model.own_constraints().len(), 2);
            assert!(model.is_satisfiable().unwrap());
            assert_eq!(model.constraints_of(model.root_id()).count(), 2);
            for c in model.solutions().unwrap() {
                if c.is_selected(&Feature::new("Camera")) {
                    assert!(c.is_selected(&Feature::new("HighRes")));
                }
                assert_ne!(c.is_selected(&Feature::new("GPS")), c.is_selected(&Feature::new("Basic")));
            }
        }
    }

    #[test]
    fn test_core_and_dead_features() {
        let mut b = phone(SolverType::Sat);
        b.add_exclusion_constraint("Phone", "GPS", "Basic").unwrap();
        b.add_requirement_constraint("Phone", "Basic", "GPS").unwrap();
        b.add_requirement_constraint("Phone", "GPS", "HighRes").unwrap();
        let mut model = b.build().unwrap();
        // Basic would need GPS, which excludes it, so GPS is forced and pulls HighRes in
        assert_eq!(names(&model.core_features().unwrap()), vec!["Phone", "Calls", "GPS", "Screen", "HighRes"]);
        assert_eq!(names(&model.dead_features().unwrap()), vec!["Basic", "Color"]);
        assert!(model.is_satisfiable().unwrap());
    }

    #[test]
    fn test_definition_errors() {
        let mut b = FeatureModelBuilder::new();
        assert!(matches!(
            FeatureModelBuilder::new().build(),
            Err(FeatureModelError::Definition(DefinitionError::MissingRoot))
        ));

        let root = b.set_root_feature("R").unwrap();
        assert!(matches!(b.set_root_feature("S"), Err(DefinitionError::RootAlreadySet(_))));
        let g = b.add_group(root, GroupType::Mandatory).unwrap();
        b.add_features(g, ["A", "B"]).unwrap();
        assert_eq!(
            b.add_feature(g, "A"),
            Err(DefinitionError::DuplicateFeature("A".to_string()))
        );
        assert_eq!(
            b.add_exclusion_constraint("R", "A", "Z"),
            Err(DefinitionError::UnknownFeature("Z".to_string()))
        );
        assert!(matches!(
            b.add_exclusion_constraint("A", "A", "B"),
            Err(DefinitionError::OutOfScope { .. })
        ));
        assert!(matches!(
            b.build(),
            Err(FeatureModelError::Definition(DefinitionError::GroupArity { children: 2, .. }))
        ));
    }

    #[test]
    fn test_invalid_cardinality() {
        let mut b = FeatureModelBuilder::new();
        let root = b.set_root_feature("R").unwrap();
        let g = b.add_group(root, GroupType::Cardinality { lower: 2, upper: Some(1) }).unwrap();
        b.add_features(g, ["A", "B"]).unwrap();
        assert!(matches!(
            b.build(),
            Err(FeatureModelError::Definition(DefinitionError::InvalidCardinality { .. }))
        ));
    }

    #[test]
    fn test_tree_navigation() {
        let model = phone(SolverType::Sat).build().unwrap();
        let screen = model.feature_id("Screen").unwrap();
        let color = model.feature_id("Color").unwrap();
        assert_eq!(model.parent(color), Some(screen));
        assert_eq!(model.parent(model.root_id()), None);
        assert_eq!(model.children(screen).len(), 3);
        assert_eq!(model.group_type(model.groups(screen)[0]), GroupType::Alternative);
        assert_eq!(model.root_feature().name(), "Phone");
        assert!(model.feature("Colour").is_none());
        assert_eq!(model.len(), 10);
    }

    #[test]
    fn test_lca() {
        let model = phone(SolverType::Sat).build().unwrap();
        let id = |n: &str| model.feature_id(n).unwrap();
        assert_eq!(model.lca([id("Basic"), id("Color")]), id("Screen"));
        assert_eq!(model.lca([id("Basic"), id("Camera")]), id("Phone"));
        assert_eq!(model.lca([id("Basic")]), id("Basic"));
        assert_eq!(model.lca([]), id("Phone"));
    }

    #[test]
    fn test_lca_of_disjunction() {
        let model = phone(SolverType::Sat).build().unwrap();
        let id = |n: &str| model.feature_id(n).unwrap();
        let var = |n: &str| FExpression::feature_expr(n);

        assert_eq!(model.lca_of_disjunction(&[var("Basic"), var("Color")]).unwrap(), id("Screen"));
        // !Camera scopes to its parent Media
        assert_eq!(model.lca_of_disjunction(&[var("Camera").not(), var("MP3")]).unwrap(), id("Media"));
        assert_eq!(model.lca_of_disjunction(&[var("GPS"), var("GPS").not()]).unwrap(), id("Phone"));
        assert_eq!(model.lca_of_disjunction(&[]).unwrap(), id("Phone"));
        assert!(model.lca_of_disjunction(&[var("Nope")]).is_err());
    }

    #[test]
    fn test_configuration_set() {
        let mut model = phone(SolverType::Bdd).build().unwrap();
        let total = model.number_of_solutions().unwrap();
        let mut with_gps = model.configurations(FExpression::feature_expr("GPS"));
        let half = with_gps.size().unwrap();
        assert_eq!(half * 2u32, total);
        assert_eq!(model.number_of_solutions().unwrap(), total);
    }
}
