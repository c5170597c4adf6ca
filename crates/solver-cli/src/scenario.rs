//! The JSON scenario format `solver-cli solve` reads. Not part of the
//! orchestration engine itself — this is the demonstration harness's own
//! input shape, analogous to `rattler-bin::commands::create::Opt` reading
//! CLI flags instead of a file (a scenario file is used here since there
//! is no real channel/index fetcher to plug in; that stays out of scope).

use std::str::FromStr;

use serde::Deserialize;

use solver_engine::{
    Command, DepsModifier, SolveEngine, SolveOptions, SolverConfig, SolverState, UpdateModifier,
};
use solver_pool::ResolvoResolver;
use solver_types::{
    parse_pinned_file, GenericVirtualPackage, HistoryMap, Index, MatchSpec, PackageName,
    PackageRecord, PinnedSpecs, Version,
};

/// One JSON scenario: a prefix's current state, a candidate index, and the
/// request to solve for.
#[derive(Debug, Deserialize)]
pub struct ScenarioFile {
    /// Path of the prefix being solved for, carried through only for the
    /// printed report.
    #[serde(default = "default_prefix")]
    prefix: String,
    /// Records currently installed in the prefix.
    #[serde(default)]
    prefix_records: Vec<PackageRecord>,
    /// Every candidate record available to the solve, across all channels.
    index: Vec<PackageRecord>,
    /// Platform-provided virtual packages, e.g. `{"name": "__glibc", "version": "2.17"}`.
    #[serde(default)]
    virtual_packages: Vec<VirtualPackageEntry>,
    /// The user's request history, one match spec string per prior request.
    #[serde(default)]
    history: Vec<String>,
    /// Pinned spec lines, in `conda-meta/pinned` file syntax.
    #[serde(default)]
    pinned: Vec<String>,
    /// Specs this solve should add.
    #[serde(default)]
    specs_to_add: Vec<String>,
    /// Specs this solve should remove.
    #[serde(default)]
    specs_to_remove: Vec<String>,
    #[serde(default)]
    update_modifier: String,
    #[serde(default)]
    deps_modifier: String,
    #[serde(default)]
    prune: bool,
    #[serde(default)]
    ignore_pinned: bool,
    #[serde(default)]
    force_remove: bool,
    #[serde(default)]
    force_reinstall: bool,
}

#[derive(Debug, Deserialize)]
struct VirtualPackageEntry {
    name: String,
    version: String,
    #[serde(default = "default_build_string")]
    build_string: String,
}

fn default_prefix() -> String {
    "<scenario>".to_owned()
}

fn default_build_string() -> String {
    "0".to_owned()
}

impl ScenarioFile {
    pub fn solve(self) -> anyhow::Result<(solver_engine::PrefixSetup, solver_engine::SolveReport)> {
        let mut index = Index::new();
        for record in self.index {
            index.insert(record);
        }

        let virtual_packages = self
            .virtual_packages
            .into_iter()
            .map(|vp| {
                Ok(GenericVirtualPackage {
                    name: PackageName::from(vp.name.as_str()),
                    version: Version::from_str(&vp.version)
                        .map_err(|err| anyhow::anyhow!("virtual package `{}`: {err}", vp.name))?,
                    build_string: vp.build_string,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut history = HistoryMap::new();
        for raw in &self.history {
            history.record(parse_spec(raw)?);
        }

        let pinned = if self.pinned.is_empty() {
            PinnedSpecs::new()
        } else {
            parse_pinned_file(&self.pinned.join("\n"))
                .map_err(|err| anyhow::anyhow!("parsing pinned specs: {err}"))?
        };

        let specs_to_add = self
            .specs_to_add
            .iter()
            .map(|s| parse_spec(s))
            .collect::<anyhow::Result<indexmap::IndexSet<MatchSpec>>>()?;
        let specs_to_remove = self
            .specs_to_remove
            .iter()
            .map(|s| parse_spec(s))
            .collect::<anyhow::Result<indexmap::IndexSet<MatchSpec>>>()?;

        let mut state = SolverState::new(
            self.prefix_records,
            history,
            pinned,
            specs_to_add,
            specs_to_remove,
        );

        let options = SolveOptions {
            command: Command::Install,
            update_modifier: parse_update_modifier(&self.update_modifier)?,
            deps_modifier: parse_deps_modifier(&self.deps_modifier)?,
            prune: self.prune,
            ignore_pinned: self.ignore_pinned,
            force_remove: self.force_remove,
            force_reinstall: self.force_reinstall,
            should_retry_solve: false,
        };

        let config = SolverConfig::conda_defaults(vec![], vec![]);
        let resolver = ResolvoResolver::new(index, virtual_packages.clone());
        let engine = SolveEngine::new(resolver, config);

        engine
            .solve_for_transaction_with_report(self.prefix, &mut state, &virtual_packages, options)
            .map_err(anyhow::Error::from)
    }
}

fn parse_spec(raw: &str) -> anyhow::Result<MatchSpec> {
    MatchSpec::from_str(raw).map_err(|err| anyhow::anyhow!("parsing spec `{raw}`: {err}"))
}

fn parse_update_modifier(raw: &str) -> anyhow::Result<UpdateModifier> {
    Ok(match raw {
        "" | "none" | "None" => UpdateModifier::None,
        "specs_satisfied_skip_solve" | "SpecsSatisfiedSkipSolve" => {
            UpdateModifier::SpecsSatisfiedSkipSolve
        }
        "freeze_installed" | "FreezeInstalled" => UpdateModifier::FreezeInstalled,
        "update_specs" | "UpdateSpecs" => UpdateModifier::UpdateSpecs,
        "update_all" | "UpdateAll" => UpdateModifier::UpdateAll,
        "update_deps" | "UpdateDeps" => UpdateModifier::UpdateDeps,
        other => anyhow::bail!("unknown update_modifier `{other}`"),
    })
}

fn parse_deps_modifier(raw: &str) -> anyhow::Result<DepsModifier> {
    Ok(match raw {
        "" | "not_set" | "NotSet" => DepsModifier::NotSet,
        "no_deps" | "NoDeps" => DepsModifier::NoDeps,
        "only_deps" | "OnlyDeps" => DepsModifier::OnlyDeps,
        "update_deps" | "UpdateDeps" => DepsModifier::UpdateDeps,
        "update_deps_only_deps" | "UpdateDepsOnlyDeps" => DepsModifier::UpdateDepsOnlyDeps,
        "freeze_installed" | "FreezeInstalled" => DepsModifier::FreezeInstalled,
        other => anyhow::bail!("unknown deps_modifier `{other}`"),
    })
}
