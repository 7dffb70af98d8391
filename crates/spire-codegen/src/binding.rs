//! Parameter binding layout.
//!
//! Every module instance a shader uses becomes a [`ModuleParameterSet`].
//! Ordinary parameters are packed into the set's constant buffer with std140
//! rules; textures, samplers and buffers get slots in one registry per
//! resource kind. Slots the user chose with a `Binding` attribute are
//! registered first and never moved; the remaining resources then take the
//! lowest free slot of their kind, in definition order.

use std::collections::{BTreeMap, HashMap};

use spire_ir::layout::{self, LayoutError};
use spire_ir::{
    BindableResourceType, DiagnosticKind, DiagnosticSink, ModuleParameterInstance,
    ModuleParameterSet,
};

use crate::shader_ir::ShaderIr;
use crate::types::TypeTranslator;

/// Explicit binding values must lie in `0..MAX_BINDING_VALUE`.
pub const MAX_BINDING_VALUE: i32 = 128;

/// Slots claimed in one resource kind, plus the next slot to try.
#[derive(Default)]
struct Registry {
    used: HashMap<i32, usize>,
    next: i32,
}

fn registry_index(kind: BindableResourceType) -> Option<usize> {
    BindableResourceType::REGISTRIES
        .iter()
        .position(|k| *k == kind)
}

/// Builds the parameter sets of `shader`, keyed by binding name.
///
/// Collisions and out-of-range values are reported to `sink`; allocation
/// carries on so the rest of the shader can still be lowered.
pub fn generate_parameter_binding_info(
    shader: &ShaderIr,
    types: &TypeTranslator,
    sink: &mut DiagnosticSink,
) -> BTreeMap<String, ModuleParameterSet> {
    let modules = &shader.module_instances;

    let mut used_sets: HashMap<i32, usize> = HashMap::new();
    for (i, module) in modules.iter().enumerate() {
        let Some(binding) = module.binding_index else {
            continue;
        };
        if let Some(&existing) = used_sets.get(&binding) {
            let other = &modules[existing];
            sink.diagnose(
                &module.using_position,
                DiagnosticKind::BindingAlreadyOccupiedByModule {
                    binding,
                    module: other.binding_name.clone(),
                },
            );
            sink.diagnose(
                &other.using_position,
                DiagnosticKind::SeeUsingOf(other.module_name.clone()),
            );
        }
        used_sets.insert(binding, i);
    }

    for (i, module) in modules.iter().enumerate() {
        if module.binding_index.is_none() && shader.module_has_params(i) {
            sink.diagnose(
                &module.using_position,
                DiagnosticKind::TopLevelModuleUsedWithoutSpecifyingBinding(
                    module.module_name.clone(),
                ),
            );
        }
    }

    let mut order: Vec<usize> = (0..modules.len()).collect();
    order.sort_by_key(|&i| modules[i].binding_index.unwrap_or(-1));
    let mut sets = BTreeMap::new();
    for i in order {
        let module = &modules[i];
        let descriptor_set_id = module.binding_index.unwrap_or(-1);
        sets.entry(module.binding_name.clone())
            .or_insert_with(|| ModuleParameterSet {
                binding_name: module.binding_name.clone(),
                descriptor_set_id,
                uniform_buffer_legacy_binding_point: descriptor_set_id,
                ..ModuleParameterSet::default()
            });
    }

    let mut registries: [Registry; 4] = Default::default();

    // Buffer offsets and explicit slots.
    for (index, def) in shader.definitions.iter().enumerate() {
        if !def.is_param() {
            continue;
        }
        let binding_name = &modules[def.module].binding_name;
        let Some(set) = sets.get_mut(binding_name) else {
            panic!("internal error: no parameter set for binding '{binding_name}'");
        };
        let ty = types.translate(&def.ty);
        let kind = ty.bindable_resource_type();
        let mut param = ModuleParameterInstance {
            key: def.unique_name.clone(),
            name: def.original_name.clone(),
            ty,
            buffer_offset: None,
            binding_points: Vec::new(),
        };
        match registry_index(kind) {
            None => {
                let offset = match layout::place(&mut set.buffer_size, &param.ty) {
                    Ok(placement) => placement.offset,
                    Err(LayoutError::NotInBuffer) => set.buffer_size,
                    Err(LayoutError::Overflow) => {
                        sink.diagnose(
                            &def.position,
                            DiagnosticKind::BufferTooLarge(def.original_name.clone()),
                        );
                        set.buffer_size
                    }
                };
                param.buffer_offset = Some(offset);
            }
            Some(r) => {
                if let Some(attr) = def.attributes.get("Binding") {
                    let registry = &mut registries[r];
                    let value = match attr.value.trim().parse::<i32>() {
                        Ok(value) => value,
                        Err(_) => {
                            sink.diagnose(&def.position, DiagnosticKind::InvalidBindingValue(-1));
                            set.parameters.push(param);
                            continue;
                        }
                    };
                    if let Some(&other) = registry.used.get(&value) {
                        let other = &shader.definitions[other];
                        sink.diagnose(
                            &def.position,
                            DiagnosticKind::BindingAlreadyOccupiedByComponent {
                                binding: value,
                                component: other.original_name.clone(),
                            },
                        );
                        sink.diagnose(
                            &other.position,
                            DiagnosticKind::SeeDefinitionOf(other.original_name.clone()),
                        );
                    }
                    if !(0..MAX_BINDING_VALUE).contains(&value) {
                        sink.diagnose(&def.position, DiagnosticKind::InvalidBindingValue(value));
                    }
                    registry.used.insert(value, index);
                    param.binding_points.push(value);
                }
            }
        }
        set.parameters.push(param);
    }

    // Fill the gaps.
    for def in &shader.definitions {
        if !def.is_param() {
            continue;
        }
        let module = &modules[def.module];
        let Some(param) = sets
            .get_mut(&module.binding_name)
            .and_then(|set| set.parameter_mut(&def.unique_name))
        else {
            continue;
        };
        let kind = param.ty.bindable_resource_type();
        let Some(r) = registry_index(kind) else {
            continue;
        };
        if !param.binding_points.is_empty() {
            continue;
        }
        let registry = &mut registries[r];
        while registry.used.contains_key(&registry.next) {
            registry.next += 1;
        }
        let slot = registry.next;
        param.binding_points.push(slot);
        log::debug!(
            "bound {kind} '{}' of '{}' to slot {slot}",
            def.original_name,
            module.binding_name
        );
        let limit = kind.max_bindings();
        if slot >= limit as i32 {
            sink.diagnose(
                &def.position,
                DiagnosticKind::BindingExceedsLimit {
                    binding: slot,
                    component: def.original_name.clone(),
                    limit,
                },
            );
            sink.diagnose(
                &def.position,
                DiagnosticKind::SeeModuleBeingUsedIn {
                    module: module.module_name.clone(),
                    binding: module.binding_name.clone(),
                },
            );
        }
        registry.next += 1;
    }

    sets
}
