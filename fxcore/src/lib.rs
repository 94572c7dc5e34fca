//! Region interface inference.
//!
//! Given a function's CFG, debug metadata, and a configured candidate
//! region, decide which variables would have to cross the region's
//! boundary if it were extracted into a standalone function: which ones
//! come in as arguments, which must travel back out, and under what
//! source-level type. Results are emitted as XML region descriptors for
//! the source-rewriting consumer.
//!
//! The pipeline per function is: resolve the configured [`RegionSpec`]
//! against the block set, compute the predecessor/successor closures,
//! build the provenance index, classify storage locations, render types,
//! and assemble a [`RegionDescriptor`].
use std::path::{Path, PathBuf};

use fxir::{
    debug::DebugInfo,
    module::{Function, Module},
    types::TypeRegistry,
};
use log::{debug, info, warn};
use thiserror::Error;

pub mod classify;
pub mod config;
pub mod descriptor;
pub mod literals;
pub mod provenance;
pub mod region;
pub mod typestr;

pub use classify::{Classification, RegionScope};
pub use config::{ExtractConfig, RegionSpec};
pub use descriptor::{RegionDescriptor, VariableDescriptor};
pub use provenance::FunctionIndex;
pub use region::{Area, Region, RegionClosures};
pub use typestr::{VarFlags, VarType};

/// Errors surfaced by the driver; per-function analysis misses are not
/// errors, they are logged and skipped.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read or write a file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed region configuration: {0}")]
    Config(#[from] toml::de::Error),
}

/// Analyze one function against its configured region spec.
///
/// `None` means the spec doesn't resolve against this function's current
/// block set, or the resolved region carries no line metadata to anchor
/// an area on. Both are expected outcomes, not errors.
pub fn analyze_function<O: DebugInfo>(
    module: &Module,
    oracle: &O,
    registry: &TypeRegistry,
    func: &Function,
    spec: &RegionSpec,
) -> Option<RegionDescriptor> {
    let region = region::resolve(func, spec)?;
    let Some(region_area) = Area::of_blocks(func, &region.blocks) else {
        warn!(
            "function `{}`: resolved region carries no line metadata; skipping",
            func.name
        );
        return None;
    };
    let func_area = Area::of_function(func);
    let closures = region::closures(func, &region);
    let index = FunctionIndex::build(module, func);
    let scope = RegionScope {
        region: &region,
        closures: &closures,
        region_area,
        func_area,
    };

    let classes = classify::classify(module, registry, oracle, func, &index, &scope);

    let mut variables = Vec::new();
    for (id, class) in &classes {
        if !class.input && !class.output {
            continue;
        }
        let Some(name) = oracle.name_of(*id) else {
            debug!("storage {id} crosses the boundary but has no name; skipping");
            continue;
        };
        let name = name.to_string();

        let rendered = match oracle.type_of(*id) {
            Some(ty) => typestr::reconstruct(registry, ty, &name),
            None => {
                warn!("variable `{name}` has no type metadata; rendering void");
                VarType {
                    text: "void".into(),
                    flags: VarFlags::empty(),
                    dims: Default::default(),
                }
            }
        };

        let mut flags = rendered.flags;
        if let Some(storage) = module.storage(*id) {
            if storage.is_static() {
                flags |= VarFlags::STATIC;
            }
            if storage.is_const_global() {
                flags |= VarFlags::CONST;
            }
        }

        if class.input {
            variables.push(VariableDescriptor {
                name: name.clone(),
                type_text: rendered.text.clone(),
                flags: flags - VarFlags::OUTPUT,
            });
        }
        if class.output {
            variables.push(VariableDescriptor {
                name,
                type_text: rendered.text,
                flags: flags | VarFlags::OUTPUT,
            });
        }
    }

    let return_type = match func.return_type {
        Some(ty) => typestr::reconstruct(registry, ty, "").text,
        None => "void".to_string(),
    };

    let entry_tag = func
        .body
        .get(&region.entry)
        .map(|bb| descriptor::sanitize_tag(&bb.name))
        .unwrap_or_else(|| "region".to_string());
    let exit_tag = region
        .blocks
        .iter()
        .next_back()
        .and_then(|label| func.body.get(label))
        .map(|bb| descriptor::sanitize_tag(&bb.name))
        .unwrap_or_else(|| "region".to_string());

    let desc = RegionDescriptor {
        function: func.name.clone(),
        return_type,
        function_area: func_area,
        region_area,
        toplevel: region.is_toplevel(func),
        exit_lines: region::exit_lines(func, &region),
        variables,
        entry_tag,
        exit_tag,
    };
    info!(
        "function `{}`: region [{}, {}] with {} interface variable(s), {} exit line(s)",
        func.name,
        desc.region_area.start,
        desc.region_area.end,
        desc.variables.len(),
        desc.exit_lines.len()
    );
    Some(desc)
}

/// Analyze every configured function of `module`, skipping misses.
pub fn analyze_module(
    module: &Module,
    registry: &TypeRegistry,
    config: &ExtractConfig,
) -> Vec<RegionDescriptor> {
    let mut descriptors = Vec::new();
    for (name, spec) in &config.regions {
        let Some(func) = module.functions.get(name) else {
            debug!("configured function `{name}` is not defined in this module");
            continue;
        };
        if let Some(desc) = analyze_function(module, module, registry, func, spec) {
            descriptors.push(desc);
        }
    }
    descriptors
}

/// Analyze every configured function and write one XML file per resolved
/// region into `out_dir`.
pub fn analyze_and_write(
    module: &Module,
    registry: &TypeRegistry,
    config: &ExtractConfig,
    out_dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>, Error> {
    let out_dir = out_dir.as_ref();
    let mut written = Vec::new();
    for desc in analyze_module(module, registry, config) {
        written.push(desc.write_to(out_dir)?);
    }
    Ok(written)
}
