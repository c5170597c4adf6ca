//! The phase-driven orchestration state machine. Grounded on
//! `conda/core/solve.py`'s `Solver.solve_final_state` and the private
//! helpers it calls in sequence (`_collect_all_metadata`, `_remove_specs`,
//! `_find_inconsistent_packages`, `_add_specs`, `_run_sat`,
//! `_post_sat_handling`) — renamed here to plain phase methods on
//! [`SolveEngine`] since there is no longer a mutable `self` dumping
//! ground to dispatch through.

use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};
use solver_pool::Resolver;
use solver_types::{GenericVirtualPackage, MatchSpec, PackageRecord};

use crate::config::SolverConfig;
use crate::error::SolveError;
use crate::graph::PrefixGraph;
use crate::modifiers::{Command, DepsModifier, UpdateModifier};
use crate::policy;
use crate::state::SolverState;
use crate::transaction::TransactionDiff;

/// The prefix/plan bundle `solve_for_transaction` hands back.
#[derive(Debug, Clone)]
pub struct PrefixSetup {
    pub prefix: String,
    pub unlink_precs: Vec<PackageRecord>,
    pub link_precs: Vec<PackageRecord>,
    pub specs_to_remove: Vec<MatchSpec>,
    pub specs_to_add: Vec<MatchSpec>,
    pub neutered_specs: Vec<MatchSpec>,
}

/// Non-fatal, informational output alongside a successful solve.
#[derive(Debug, Clone, Default)]
pub struct SolveReport {
    /// Requested specs that did not advance even though a newer candidate
    /// exists in the index, and the installed dependents holding them back.
    pub constricting: Vec<(MatchSpec, Vec<String>)>,
}

/// All per-call flags `solve_final_state` accepts.
#[derive(Debug, Clone, Copy)]
pub struct SolveOptions {
    pub command: Command,
    pub update_modifier: UpdateModifier,
    pub deps_modifier: DepsModifier,
    pub prune: bool,
    pub ignore_pinned: bool,
    pub force_remove: bool,
    pub force_reinstall: bool,
    pub should_retry_solve: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        SolveOptions {
            command: Command::Install,
            update_modifier: UpdateModifier::default(),
            deps_modifier: DepsModifier::default(),
            prune: false,
            ignore_pinned: false,
            force_remove: false,
            force_reinstall: false,
            should_retry_solve: false,
        }
    }
}

/// The orchestration engine. Owns a resolver backend and an immutable
/// configuration; holds no other state between calls.
pub struct SolveEngine<R> {
    resolver: R,
    config: SolverConfig,
}

impl<R: Resolver> SolveEngine<R> {
    pub fn new(resolver: R, config: SolverConfig) -> Self {
        SolveEngine { resolver, config }
    }

    /// Phases 1-7. Returns the solved, topologically ordered record set.
    #[tracing::instrument(level = "debug", skip_all, fields(specs_to_add = state.specs_to_add.len(), specs_to_remove = state.specs_to_remove.len()))]
    pub fn solve_final_state(
        &self,
        state: &mut SolverState,
        virtual_packages: &[GenericVirtualPackage],
        options: SolveOptions,
    ) -> Result<Vec<PackageRecord>, SolveError> {
        if let Some(shortcut) = self.phase1_short_circuit(state, &options)? {
            return Ok(shortcut);
        }

        self.phase2_collect_metadata(state, virtual_packages);
        self.phase3_removal(state)?;
        self.phase4_inconsistency_repair(state);
        self.phase5_assemble_specs(state, &options)?;
        self.phase6_run_sat(state, &options)?;
        self.phase7_post_solve(state, virtual_packages, &options)
    }

    /// `solve_final_state` plus a diff against the prefix's current records.
    pub fn solve_for_diff(
        &self,
        state: &mut SolverState,
        virtual_packages: &[GenericVirtualPackage],
        options: SolveOptions,
    ) -> Result<(Vec<PackageRecord>, Vec<PackageRecord>), SolveError> {
        let previous = state.prefix_records.clone();
        let specs_to_add: Vec<MatchSpec> = state.specs_to_add.iter().cloned().collect();
        let final_state = self.solve_final_state(state, virtual_packages, options)?;
        let diff = TransactionDiff::compute(
            previous,
            final_state,
            &specs_to_add,
            options.force_reinstall,
            &self.config,
        )?;
        Ok((diff.unlink, diff.link))
    }

    /// `solve_for_diff` wrapped into the `PrefixSetup` bundle callers hand
    /// to an installer.
    pub fn solve_for_transaction(
        &self,
        prefix: impl Into<String>,
        state: &mut SolverState,
        virtual_packages: &[GenericVirtualPackage],
        options: SolveOptions,
    ) -> Result<PrefixSetup, SolveError> {
        let (unlink_precs, link_precs) = self.solve_for_diff(state, virtual_packages, options)?;
        Ok(PrefixSetup {
            prefix: prefix.into(),
            unlink_precs,
            link_precs,
            specs_to_remove: state.specs_to_remove.iter().cloned().collect(),
            specs_to_add: state.specs_to_add.iter().cloned().collect(),
            neutered_specs: state.neutered_specs.values().cloned().collect(),
        })
    }

    /// `solve_for_transaction` plus the non-fatal [`SolveReport`] diagnostics
    /// (`conda/core/solve.py`'s `determine_constricting_specs`), computed
    /// against the same post-solve `state`.
    pub fn solve_for_transaction_with_report(
        &self,
        prefix: impl Into<String>,
        state: &mut SolverState,
        virtual_packages: &[GenericVirtualPackage],
        options: SolveOptions,
    ) -> Result<(PrefixSetup, SolveReport), SolveError> {
        let setup = self.solve_for_transaction(prefix, state, virtual_packages, options)?;
        let report = SolveReport {
            constricting: self.constricting_specs(state, &options),
        };
        Ok((setup, report))
    }

    /// Requested specs that hold at their previously installed version even
    /// though the index carries something newer, paired with the installed
    /// dependents whose own constraints prevented the advance. Only
    /// meaningful after an `UPDATE_SPECS` solve; empty otherwise, matching
    /// the original's guard around `determine_constricting_specs`.
    fn constricting_specs(
        &self,
        state: &SolverState,
        options: &SolveOptions,
    ) -> Vec<(MatchSpec, Vec<String>)> {
        if options.update_modifier != UpdateModifier::UpdateSpecs {
            return Vec::new();
        }

        let mut constricting = Vec::new();
        for spec in &state.specs_to_add {
            let Some(name) = spec.name_str() else { continue };
            let name = name.to_ascii_lowercase();
            let Some(before) = state.installed(&name) else { continue };
            let Some(after) = state
                .solution_precs
                .iter()
                .find(|r| r.name.as_normalized() == name)
            else {
                continue;
            };
            if before.record_id() != after.record_id() {
                // The spec did advance; nothing held it back.
                continue;
            }
            let newer_exists = self
                .resolver
                .find_matches(spec)
                .iter()
                .any(|candidate| candidate.version > after.version);
            if !newer_exists {
                continue;
            }

            let holders: Vec<String> = state
                .solution_precs
                .iter()
                .filter(|r| r.name.as_normalized() != name)
                .filter(|r| {
                    r.depends.iter().any(|dep| {
                        solver_types::package_name_from_expression(dep).eq_ignore_ascii_case(&name)
                    })
                })
                .map(ToString::to_string)
                .collect();
            constricting.push((spec.clone(), holders));
        }
        constricting
    }

    // ---- Phase 1: short circuits -----------------------------------

    fn phase1_short_circuit(
        &self,
        state: &SolverState,
        options: &SolveOptions,
    ) -> Result<Option<Vec<PackageRecord>>, SolveError> {
        if !state.specs_to_remove.is_empty() && options.force_remove {
            if !state.specs_to_add.is_empty() {
                return Err(SolveError::NotImplemented(
                    "force_remove with simultaneous specs_to_add".to_owned(),
                ));
            }
            let mut graph = PrefixGraph::new(state.prefix_records.clone());
            for spec in &state.specs_to_remove {
                graph.remove_matching(spec);
            }
            return Ok(Some(graph.topological_order()));
        }

        if options.update_modifier == UpdateModifier::SpecsSatisfiedSkipSolve
            && state.specs_to_remove.is_empty()
            && !options.prune
        {
            let satisfied = state
                .specs_to_add
                .iter()
                .all(|spec| state.prefix_records.iter().any(|r| spec.matches(r)));
            if satisfied {
                return Ok(Some(state.prefix_records.clone()));
            }
        }

        Ok(None)
    }

    // ---- Phase 2: metadata collection ------------------------------

    fn phase2_collect_metadata(
        &self,
        state: &mut SolverState,
        virtual_packages: &[GenericVirtualPackage],
    ) {
        let history_empty = state.history.specs().next().is_none();

        for spec in state.history.specs().cloned().collect::<Vec<_>>() {
            if let Some(name) = spec.name_str() {
                state.specs_map.insert(name.to_ascii_lowercase(), spec.clone());
            }
        }

        for &name in policy::STICKY_PACKAGES {
            if state.installed(name).is_some() {
                state
                    .specs_map
                    .entry(name.to_ascii_lowercase())
                    .or_insert_with(|| MatchSpec::name(name));
            }
        }

        for vp in virtual_packages {
            let name = vp.name.as_normalized();
            state.specs_map.entry(name.clone()).or_insert_with(|| MatchSpec::name(name));
        }

        for record in state.prefix_records.clone() {
            let name = record.name.as_normalized();
            let should_add = history_empty
                || self.config.is_aggressive_update(&name)
                || record.subdir.eq_ignore_ascii_case(&self.config.foreign_install_subdir);
            if should_add {
                state.specs_map.entry(name.clone()).or_insert_with(|| MatchSpec::name(name.as_str()));
            }
        }
    }

    // ---- Phase 3: removal -------------------------------------------

    fn phase3_removal(&self, state: &mut SolverState) -> Result<(), SolveError> {
        if state.specs_to_remove.is_empty() {
            return Ok(());
        }

        let mut graph = PrefixGraph::new(state.solution_precs.clone());
        let mut unmatched = Vec::new();
        let mut removed = Vec::new();

        for spec in state.specs_to_remove.clone() {
            let removed_for_spec = graph.remove_spec(&spec);
            if removed_for_spec.is_empty() {
                unmatched.push(spec);
            } else {
                removed.extend(removed_for_spec);
            }
        }

        if !unmatched.is_empty() {
            return Err(SolveError::PackagesNotFound(unmatched));
        }

        let removed_track_features: HashSet<String> =
            removed.iter().flat_map(|r| r.track_features.iter().cloned()).collect();

        if !removed_track_features.is_empty() {
            let feature_specs: Vec<MatchSpec> = graph
                .records()
                .filter(|r| r.features.iter().any(|f| removed_track_features.contains(f)))
                .map(policy::to_match_spec)
                .collect();
            for spec in feature_specs {
                removed.extend(graph.remove_spec(&spec));
            }
        }

        state.solution_precs = graph.topological_order();

        for record in &removed {
            let name = record.name.as_normalized();
            let keep_feature_stripped = !record.features.is_empty()
                && record.features.iter().any(|f| removed_track_features.contains(f))
                && state.history.contains(&name);
            if keep_feature_stripped {
                state
                    .specs_map
                    .insert(name, policy::to_match_spec(record).without_features());
            } else {
                state.specs_map.shift_remove(&name);
            }
        }

        Ok(())
    }

    // ---- Phase 4: inconsistency repair -------------------------------

    fn phase4_inconsistency_repair(&self, state: &mut SolverState) {
        if state.solution_precs.is_empty() {
            return;
        }
        let specs: Vec<MatchSpec> = state.specs_map.values().cloned().collect();
        let (ok, bad) = self.resolver.bad_installed(&state.solution_precs, &specs);
        if bad.is_empty() {
            return;
        }

        state.solution_precs = ok;
        for record in bad {
            let name = record.name.as_normalized();
            let original_spec = state.specs_map.get(&name).cloned();
            state
                .add_back_map
                .insert(name.clone(), (record.clone(), original_spec));
            let floated = MatchSpec::name_with_target(name.as_str(), record.record_id().to_string());
            state.specs_map.insert(name, floated);
        }

        if let Some((_, Some(python_spec))) = state.add_back_map.get("python") {
            if python_spec.version.is_some() {
                state.specs_map.insert("python".to_owned(), python_spec.clone());
            }
        }
    }

    // ---- Phase 5: spec assembly (policy layer) -----------------------

    fn phase5_assemble_specs(
        &self,
        state: &mut SolverState,
        options: &SolveOptions,
    ) -> Result<(), SolveError> {
        let history_nonempty = state.history.specs().next().is_some();
        let freeze_installed = options.update_modifier == UpdateModifier::FreezeInstalled;
        let specs_to_add: Vec<MatchSpec> = state.specs_to_add.iter().cloned().collect();
        let explicit_pool: IndexMap<String, Vec<PackageRecord>> = self
            .resolver
            .get_package_pool(&specs_to_add)
            .into_iter()
            .collect();

        let names: Vec<String> = state.specs_map.keys().cloned().collect();
        for name in names {
            let matches: Vec<&PackageRecord> = state
                .solution_precs
                .iter()
                .filter(|r| r.name.as_normalized() == name)
                .collect();
            if matches.len() > 1 {
                return Err(SolveError::InternalInvariantViolated(format!(
                    "multiple installed records match spec slot `{name}`"
                )));
            }
            let Some(record) = matches.into_iter().next() else {
                continue;
            };

            let new_spec = if policy::is_unmanageable(record, &self.config) {
                policy::to_match_spec(record)
            } else if self.config.is_aggressive_update(&name) {
                MatchSpec::name(name.as_str())
            } else if policy::should_freeze(
                record,
                &name,
                history_nonempty,
                freeze_installed,
                &state.conflict_specs,
                &explicit_pool,
            ) {
                policy::to_match_spec(record)
            } else if let Some(history_spec) = state.history.get(&name) {
                let mut spec = history_spec.clone();
                spec.target = Some(record.record_id().to_string());
                spec
            } else {
                MatchSpec::name_with_target(name.as_str(), record.record_id().to_string())
            };
            state.specs_map.insert(name, new_spec);
        }

        self.apply_pinned_overlay(state, options)?;

        match options.update_modifier {
            UpdateModifier::FreezeInstalled => {
                for record in state.prefix_records.clone() {
                    let name = record.name.as_normalized();
                    if state.specs_map.contains_key(&name) {
                        continue;
                    }
                    let mut spec = policy::to_match_spec(&record);
                    if state.conflict_specs.contains(&name) {
                        spec.optional = true;
                        spec.target = Some(record.record_id().to_string());
                    }
                    state.specs_map.insert(name, spec);
                }
            }
            UpdateModifier::UpdateAll => {
                let names: Vec<String> = if history_nonempty {
                    state.history.specs().filter_map(|s| s.name_str().map(str::to_owned)).collect()
                } else {
                    state.prefix_records.iter().map(|r| r.name.as_normalized()).collect()
                };
                let pinned: IndexMap<String, MatchSpec> = state
                    .specs_map
                    .iter()
                    .filter(|(name, _)| state.pinned_specs.get(name).is_some())
                    .map(|(n, s)| (n.clone(), s.clone()))
                    .collect();
                state.specs_map.clear();
                for name in names {
                    state.specs_map.insert(name.clone(), MatchSpec::name(name.as_str()));
                }
                for (name, spec) in pinned {
                    state.specs_map.insert(name, spec);
                }
            }
            UpdateModifier::UpdateSpecs => {
                for spec in &specs_to_add {
                    let Some(name) = spec.name_str().map(str::to_owned) else { continue };
                    let candidates = self.resolver.groups(&solver_types::PackageName::from(name.as_str()));
                    if let Some(best) = candidates.first() {
                        state
                            .specs_map
                            .insert(name, MatchSpec::to_match_spec_for(best));
                    }
                }
                let current: Vec<MatchSpec> = state.specs_map.values().cloned().collect();
                let conflicts = self.resolver.get_conflicting_specs(&current, &specs_to_add);
                for spec in conflicts {
                    if let Some(name) = spec.name_str() {
                        let pinned = state.pinned_specs.get(name).is_some();
                        let in_history = state.history.contains(name);
                        if !pinned && !in_history {
                            state.specs_map.insert(name.to_ascii_lowercase(), MatchSpec::name(name));
                        }
                    }
                }
            }
            UpdateModifier::None | UpdateModifier::SpecsSatisfiedSkipSolve | UpdateModifier::UpdateDeps => {}
        }

        self.apply_python_abi_rule(state);

        for spec in &state.specs_to_add {
            if let Some(name) = spec.name_str() {
                state.specs_map.insert(name.to_ascii_lowercase(), spec.clone());
            }
        }

        self.apply_self_rule(state);

        Ok(())
    }

    fn apply_pinned_overlay(
        &self,
        state: &mut SolverState,
        options: &SolveOptions,
    ) -> Result<(), SolveError> {
        if options.ignore_pinned || self.config.ignore_pinned {
            return Ok(());
        }
        let explicit_pool: IndexMap<String, Vec<PackageRecord>> = self
            .resolver
            .get_package_pool(&state.specs_to_add.iter().cloned().collect::<Vec<_>>())
            .into_iter()
            .collect();
        let user_requested: HashSet<String> = state
            .specs_to_add
            .iter()
            .filter_map(|s| s.name_str().map(str::to_ascii_lowercase))
            .collect();

        for pinned in state.pinned_specs.specs().cloned().collect::<Vec<_>>() {
            let Some(name) = pinned.name_str().map(str::to_ascii_lowercase) else { continue };
            if user_requested.contains(&name) {
                continue;
            }
            if !explicit_pool.contains_key(&name) {
                continue;
            }
            let mut pinned_nonoptional = pinned.clone();
            pinned_nonoptional.optional = false;
            if let Some(existing) = state.specs_map.get(&name) {
                match existing.merge(&pinned_nonoptional) {
                    Ok(merged) => {
                        state.specs_map.insert(name, merged);
                    }
                    Err(_) => {
                        tracing::warn!(%name, "pinned spec conflicts with explicit pool, skipping");
                    }
                }
            } else {
                state.specs_map.insert(name, pinned_nonoptional);
            }
        }
        Ok(())
    }

    fn apply_python_abi_rule(&self, state: &mut SolverState) {
        let Some(python) = state.installed("python") else { return };
        let requested = state.specs_to_add.iter().any(|s| s.name_str() == Some("python"));
        if requested {
            return;
        }
        let Some(major_minor) = python.version.major_minor() else { return };
        if let Ok(pinned) = format!("python {major_minor}.*").parse::<MatchSpec>() {
            let conflicts_with_request = state
                .specs_to_add
                .iter()
                .any(|s| s.name_str() == Some("python") && s.merge(&pinned).is_err());
            if !conflicts_with_request {
                state.specs_map.insert("python".to_owned(), pinned);
            }
        }
    }

    fn apply_self_rule(&self, state: &mut SolverState) {
        let Some(self_name) = self.config.self_package.clone() else { return };
        let Some(installed) = state.installed(&self_name) else { return };
        let key = self_name.to_ascii_lowercase();
        let requested_explicit_version = state.specs_to_add.iter().any(|s| {
            s.name_str().map(str::to_ascii_lowercase).as_deref() == Some(key.as_str())
                && s.version.is_some()
        });
        if requested_explicit_version {
            return;
        }
        let floor = format!("{} >={}", self_name, installed.version.as_str());
        if let Ok(spec) = floor.parse::<MatchSpec>() {
            state.specs_map.insert(key, spec);
        }
    }

    // ---- Phase 6: SAT invocation loop --------------------------------

    fn phase6_run_sat(&self, state: &mut SolverState, options: &SolveOptions) -> Result<(), SolveError> {
        let mut final_environment_specs: IndexSet<MatchSpec> =
            state.specs_map.values().cloned().collect();
        for record in &state.solution_precs {
            for feature in &record.track_features {
                // Unnamed, optional: a preference signal over whichever
                // records carry this track_feature, not a hard requirement
                // on a literal package named after the feature string.
                final_environment_specs.insert(MatchSpec {
                    track_features: Some(vec![feature.clone()]),
                    optional: true,
                    ..MatchSpec::default()
                });
            }
        }

        for spec in state.specs_map.values() {
            if self.resolver.find_matches(spec).is_empty() {
                return Err(SolveError::PackagesNotFound(vec![spec.clone()]));
            }
        }

        let specs_to_add: Vec<MatchSpec> = state.specs_to_add.iter().cloned().collect();

        loop {
            let env_specs: Vec<MatchSpec> = final_environment_specs.iter().cloned().collect();
            let conflicts = self.resolver.get_conflicting_specs(&env_specs, &specs_to_add);
            if conflicts.is_empty() {
                break;
            }

            let pinned_unresolvable = conflicts.iter().any(|c| {
                c.name_str()
                    .map(|name| state.pinned_specs.get(name).is_some())
                    .unwrap_or(false)
            });
            if pinned_unresolvable {
                return Err(SolveError::SpecsConfigurationConflict {
                    user_specs: specs_to_add.clone(),
                    pinned_specs: state.pinned_specs.specs().cloned().collect(),
                    prefix: String::new(),
                });
            }

            let mut modified = false;
            for conflict in &conflicts {
                let Some(name) = conflict.name_str().map(str::to_ascii_lowercase) else { continue };
                if let Some(existing) = final_environment_specs.iter().find(|s| {
                    s.name_str().map(str::to_ascii_lowercase) == Some(name.clone())
                }) {
                    let existing = existing.clone();
                    if existing.target.is_some() && !existing.optional {
                        final_environment_specs.shift_remove(&existing);
                        let relaxed = MatchSpec::name(name.as_str());
                        final_environment_specs.insert(relaxed.clone());
                        state.specs_map.insert(name.clone(), relaxed);
                        state.conflict_specs.insert(name);
                        modified = true;
                    }
                }
            }

            if !modified {
                break;
            }
        }

        let env_specs: Vec<MatchSpec> = final_environment_specs.iter().cloned().collect();
        let history_specs: Vec<MatchSpec> = state.history.specs().cloned().collect();
        let solution = self
            .resolver
            .solve(&env_specs, &specs_to_add, &history_specs, options.should_retry_solve)?;
        state.solution_precs = solution;

        state.neutered_specs.clear();
        for (name, spec) in &state.specs_map {
            if let Some(history_spec) = state.history.get(name) {
                if spec.strictness() < history_spec.strictness() {
                    state.neutered_specs.insert(name.clone(), spec.clone());
                }
            }
        }

        for (name, (record, original_spec)) in state.add_back_map.clone() {
            if original_spec.is_none() {
                state.solution_precs.retain(|r| r.name.as_normalized() != name);
                state.solution_precs.push(record);
            }
        }

        Ok(())
    }

    // ---- Phase 7: post-solve refinement --------------------------------

    fn phase7_post_solve(
        &self,
        state: &mut SolverState,
        virtual_packages: &[GenericVirtualPackage],
        options: &SolveOptions,
    ) -> Result<Vec<PackageRecord>, SolveError> {
        match options.deps_modifier {
            DepsModifier::NoDeps => {
                let removed_names: HashSet<String> = state
                    .specs_to_remove
                    .iter()
                    .filter_map(|s| s.name_str().map(str::to_ascii_lowercase))
                    .collect();
                let mut base: Vec<PackageRecord> = state
                    .prefix_records
                    .iter()
                    .filter(|r| !removed_names.contains(&r.name.as_normalized()))
                    .cloned()
                    .collect();
                let requested_names: HashSet<String> = state
                    .specs_to_add
                    .iter()
                    .filter_map(|s| s.name_str().map(str::to_ascii_lowercase))
                    .collect();
                for record in &state.solution_precs {
                    if requested_names.contains(&record.name.as_normalized()) {
                        base.retain(|r| r.name.as_normalized() != record.name.as_normalized());
                        base.push(record.clone());
                    }
                }
                state.solution_precs = base;
            }
            DepsModifier::OnlyDeps if options.update_modifier != UpdateModifier::UpdateDeps => {
                let mut graph = PrefixGraph::new(state.solution_precs.clone());
                let specs_to_add: Vec<MatchSpec> = state.specs_to_add.iter().cloned().collect();
                let removed_nodes = graph.remove_youngest_descendant_nodes_with_specs(&specs_to_add);

                let removed_names: HashSet<String> = state
                    .specs_to_remove
                    .iter()
                    .filter_map(|s| s.name_str().map(str::to_ascii_lowercase))
                    .collect();
                let mut add_back = Vec::new();
                for node in &removed_nodes {
                    let name = node.name.as_normalized();
                    if removed_names.contains(&name) {
                        continue;
                    }
                    if let Some(prior) = state.installed(&name) {
                        add_back.push(prior.clone());
                    }
                }

                for node in &removed_nodes {
                    for dep in &node.depends {
                        let dep_name = solver_types::package_name_from_expression(dep);
                        if !state.specs_map.contains_key(&dep_name.to_ascii_lowercase()) {
                            if let Ok(spec) = dep_name.parse::<MatchSpec>() {
                                state.specs_to_add.insert(spec);
                            }
                        }
                    }
                }

                let mut solution = graph.topological_order();
                solution.extend(add_back);
                let combined = PrefixGraph::new(solution);
                state.solution_precs = combined.topological_order();
            }
            DepsModifier::UpdateDeps | DepsModifier::UpdateDepsOnlyDeps => {}
            _ => {}
        }

        if options.update_modifier == UpdateModifier::UpdateDeps {
            let graph = PrefixGraph::new(state.solution_precs.clone());
            let mut update_names: HashSet<String> = HashSet::new();
            for spec in &state.specs_to_add {
                if let Some(name) = spec.name_str() {
                    if let Some(idx) = graph.node_by_name(name) {
                        for ancestor in graph.all_ancestors(idx) {
                            update_names.insert(ancestor.name.as_normalized());
                        }
                    }
                }
            }
            let mut new_specs_to_add: IndexSet<MatchSpec> = state.specs_to_add.clone();
            for name in update_names {
                if state.pinned_specs.get(&name).is_some() {
                    continue;
                }
                new_specs_to_add.insert(MatchSpec::name(name.as_str()));
            }

            let mut recursive_state = SolverState::new(
                state.prefix_records.clone(),
                state.history.clone(),
                state.pinned_specs.clone(),
                new_specs_to_add,
                state.specs_to_remove.clone(),
            );
            let mut recursive_options = *options;
            recursive_options.update_modifier = UpdateModifier::UpdateSpecs;
            recursive_options.prune = false;
            if options.deps_modifier == DepsModifier::UpdateDepsOnlyDeps {
                recursive_options.deps_modifier = DepsModifier::OnlyDeps;
            }
            let result =
                self.solve_final_state(&mut recursive_state, virtual_packages, recursive_options)?;
            *state = recursive_state;
            return Ok(result);
        }

        if options.prune {
            let mut graph = PrefixGraph::new(state.solution_precs.clone());
            let final_specs: Vec<MatchSpec> = state.specs_map.values().cloned().collect();
            graph.prune(&final_specs);
            state.solution_precs = graph.topological_order();
        } else {
            let graph = PrefixGraph::new(state.solution_precs.clone());
            state.solution_precs = graph.topological_order();
        }

        Ok(state.solution_precs.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use indexmap::IndexSet;
    use solver_pool::ResolvoResolver;
    use solver_types::{HistoryMap, Index, MatchSpec, PinnedSpecs};

    use crate::test_support::record_full;

    use super::*;

    fn engine_over(records: Vec<PackageRecord>) -> SolveEngine<ResolvoResolver> {
        let mut index = Index::new();
        for record in records {
            index.insert(record);
        }
        let resolver = ResolvoResolver::new(index, Vec::new());
        SolveEngine::new(resolver, SolverConfig::conda_defaults(vec![], vec![]))
    }

    fn add(names: &[&str]) -> IndexSet<MatchSpec> {
        names.iter().map(|n| n.parse().unwrap()).collect()
    }

    fn names_of(records: &[PackageRecord]) -> HashSet<String> {
        records.iter().map(|r| r.name.as_normalized()).collect()
    }

    /// S1 + universal property 1: a clean solve with no add/remove and no
    /// modifiers returns exactly the current prefix records.
    #[test]
    fn idempotent_on_empty_request() {
        let python = record_full("python", "3.9.0", 0, vec![]);
        let engine = engine_over(vec![python.clone()]);
        let mut state = SolverState::new(
            vec![python.clone()],
            HistoryMap::new(),
            PinnedSpecs::new(),
            IndexSet::new(),
            IndexSet::new(),
        );
        let result = engine
            .solve_final_state(&mut state, &[], SolveOptions::default())
            .unwrap();
        assert_eq!(names_of(&result), names_of(&[python]));
    }

    /// S1: installing flask pulls in its transitive deps and keeps python
    /// untouched.
    #[test]
    fn trivial_install_pulls_in_transitive_deps() {
        let python = record_full("python", "3.9.0", 0, vec![]);
        let flask = record_full("flask", "2.0.0", 0, vec!["werkzeug", "jinja2", "python >=3.7"]);
        let werkzeug = record_full("werkzeug", "1.0.0", 0, vec![]);
        let jinja2 = record_full("jinja2", "3.0.0", 0, vec![]);
        let engine = engine_over(vec![
            python.clone(),
            flask.clone(),
            werkzeug.clone(),
            jinja2.clone(),
        ]);
        let mut state = SolverState::new(
            vec![python.clone()],
            HistoryMap::new(),
            PinnedSpecs::new(),
            add(&["flask"]),
            IndexSet::new(),
        );
        let result = engine
            .solve_final_state(&mut state, &[], SolveOptions::default())
            .unwrap();
        let names = names_of(&result);
        assert!(names.contains("python"));
        assert!(names.contains("flask"));
        assert!(names.contains("werkzeug"));
        assert!(names.contains("jinja2"));
        let kept_python = result.iter().find(|r| r.name.as_normalized() == "python").unwrap();
        assert_eq!(kept_python.version.as_str(), "3.9.0");
    }

    /// S2: force-removing a leaf leaves dependents broken but present.
    #[test]
    fn force_remove_leaf_drops_only_the_named_spec() {
        let a = record_full("a", "1.0.0", 0, vec![]);
        let b = record_full("b", "1.0.0", 0, vec!["a"]);
        let engine = engine_over(vec![a.clone(), b.clone()]);
        let mut state = SolverState::new(
            vec![a, b.clone()],
            HistoryMap::new(),
            PinnedSpecs::new(),
            IndexSet::new(),
            add(&["a"]),
        );
        let options = SolveOptions {
            force_remove: true,
            ..SolveOptions::default()
        };
        let result = engine.solve_final_state(&mut state, &[], options).unwrap();
        assert_eq!(names_of(&result), names_of(&[b]));
    }

    /// S3: removing `a` without force cascades to its dependent `b`.
    #[test]
    fn cascade_remove_drops_dependents() {
        let a = record_full("a", "1.0.0", 0, vec![]);
        let b = record_full("b", "1.0.0", 0, vec!["a"]);
        let engine = engine_over(vec![a.clone(), b]);
        let mut state = SolverState::new(
            vec![a],
            HistoryMap::new(),
            PinnedSpecs::new(),
            IndexSet::new(),
            add(&["a"]),
        );
        let result = engine
            .solve_final_state(&mut state, &[], SolveOptions::default())
            .unwrap();
        assert!(result.is_empty());
    }

    /// S4: freezing installed packages keeps them exactly in place while
    /// still satisfying a new request on top.
    #[test]
    fn freeze_installed_keeps_numpy_pinned_while_adding_pandas() {
        let numpy = record_full("numpy", "1.20.0", 0, vec![]);
        let python = record_full("python", "3.9.0", 0, vec![]);
        let pandas = record_full("pandas", "1.3.0", 0, vec!["numpy >=1.17", "python"]);
        let engine = engine_over(vec![numpy.clone(), python.clone(), pandas]);
        let mut state = SolverState::new(
            vec![numpy.clone(), python.clone()],
            HistoryMap::new(),
            PinnedSpecs::new(),
            add(&["pandas"]),
            IndexSet::new(),
        );
        let options = SolveOptions {
            update_modifier: UpdateModifier::FreezeInstalled,
            ..SolveOptions::default()
        };
        let result = engine.solve_final_state(&mut state, &[], options).unwrap();
        let kept_numpy = result.iter().find(|r| r.name.as_normalized() == "numpy").unwrap();
        assert_eq!(kept_numpy.version.as_str(), "1.20.0");
        assert!(names_of(&result).contains("pandas"));
    }

    /// Universal property 4: at most one record per package name, even
    /// after a nontrivial install.
    #[test]
    fn solution_has_unique_names() {
        let python = record_full("python", "3.9.0", 0, vec![]);
        let flask = record_full("flask", "2.0.0", 0, vec!["werkzeug"]);
        let werkzeug = record_full("werkzeug", "1.0.0", 0, vec![]);
        let engine = engine_over(vec![python.clone(), flask, werkzeug]);
        let mut state = SolverState::new(
            vec![python],
            HistoryMap::new(),
            PinnedSpecs::new(),
            add(&["flask"]),
            IndexSet::new(),
        );
        let result = engine
            .solve_final_state(&mut state, &[], SolveOptions::default())
            .unwrap();
        let mut seen = HashSet::new();
        for record in &result {
            assert!(seen.insert(record.name.as_normalized()), "duplicate name in solution");
        }
    }

    /// Universal property 6: every record appears after its dependencies.
    #[test]
    fn solution_is_topologically_ordered() {
        let python = record_full("python", "3.9.0", 0, vec![]);
        let flask = record_full("flask", "2.0.0", 0, vec!["werkzeug", "python"]);
        let werkzeug = record_full("werkzeug", "1.0.0", 0, vec![]);
        let engine = engine_over(vec![python.clone(), flask, werkzeug]);
        let mut state = SolverState::new(
            vec![python],
            HistoryMap::new(),
            PinnedSpecs::new(),
            add(&["flask"]),
            IndexSet::new(),
        );
        let result = engine
            .solve_final_state(&mut state, &[], SolveOptions::default())
            .unwrap();
        let position = |name: &str| result.iter().position(|r| r.name.as_normalized() == name).unwrap();
        assert!(position("python") < position("flask"));
        assert!(position("werkzeug") < position("flask"));
    }

    /// S6 / phase 6: a pinned spec that conflicts with an explicit request
    /// surfaces as a configuration conflict rather than silently dropping
    /// the pin.
    #[test]
    fn pinned_conflict_with_explicit_request_fails() {
        let python_39 = record_full("python", "3.9.0", 0, vec![]);
        let python_311 = record_full("python", "3.11.0", 0, vec![]);
        let somepkg = record_full("somepkg", "1.0.0", 0, vec!["python >=3.10"]);
        let engine = engine_over(vec![python_39.clone(), python_311, somepkg]);
        let pinned = PinnedSpecs::from_specs(vec!["python ==3.9.0".parse().unwrap()]);
        let mut state = SolverState::new(
            vec![python_39],
            HistoryMap::new(),
            pinned,
            add(&["somepkg"]),
            IndexSet::new(),
        );
        let result = engine.solve_final_state(&mut state, &[], SolveOptions::default());
        assert!(result.is_err());
    }

    /// Phase 7 `NO_DEPS`: installing with `no_deps` set does not pull in
    /// the requested package's dependencies.
    #[test]
    fn no_deps_modifier_skips_transitive_dependencies() {
        let flask = record_full("flask", "2.0.0", 0, vec!["werkzeug"]);
        let werkzeug = record_full("werkzeug", "1.0.0", 0, vec![]);
        let engine = engine_over(vec![flask, werkzeug]);
        let mut state = SolverState::new(
            vec![],
            HistoryMap::new(),
            PinnedSpecs::new(),
            add(&["flask"]),
            IndexSet::new(),
        );
        let options = SolveOptions {
            deps_modifier: DepsModifier::NoDeps,
            ..SolveOptions::default()
        };
        let result = engine.solve_final_state(&mut state, &[], options).unwrap();
        assert_eq!(names_of(&result), names_of(&[record_full("flask", "2.0.0", 0, vec![])]));
    }

    /// Supplemented diagnostics: an `UPDATE_SPECS` solve that leaves a
    /// requested package at its installed version, because an installed
    /// dependent's own constraint rules out the newer candidate, is
    /// reported as constricting rather than silently ignored.
    #[test]
    fn constricting_spec_names_the_holding_dependent() {
        let oldpkg_old = record_full("oldpkg", "1.0.0", 0, vec![]);
        let oldpkg_new = record_full("oldpkg", "2.0.0", 0, vec![]);
        let dependent = record_full("dependent", "1.0.0", 0, vec!["oldpkg <2.0"]);
        let engine = engine_over(vec![oldpkg_old.clone(), oldpkg_new, dependent.clone()]);
        let mut state = SolverState::new(
            vec![oldpkg_old.clone(), dependent],
            HistoryMap::new(),
            PinnedSpecs::new(),
            add(&["oldpkg"]),
            IndexSet::new(),
        );
        let options = SolveOptions {
            update_modifier: UpdateModifier::UpdateSpecs,
            ..SolveOptions::default()
        };
        let (_setup, report) = engine
            .solve_for_transaction_with_report("prefix", &mut state, &[], options)
            .unwrap();
        assert_eq!(report.constricting.len(), 1);
        let (spec, holders) = &report.constricting[0];
        assert_eq!(spec.name_str(), Some("oldpkg"));
        assert!(holders.iter().any(|h| h.starts_with("dependent-")));
    }
}
