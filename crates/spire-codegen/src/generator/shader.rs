//! Shader lowering: parameter sets, world records and per-world code.

use std::collections::{BTreeMap, BTreeSet};

use spire_ir::{
    IlFunction, IlParameter, IlShader, IlStage, IlType, IlWorld, InstKind, ObjectDefinition,
    Operand, ParameterQualifier,
};

use super::CodeGenerator;
use crate::binding::generate_parameter_binding_info;
use crate::naming::escape_code_name;
use crate::shader_ir::{ComponentBody, ComponentDefinitionIr, ShaderIr, UNIFORM_WORLD};

impl<'a> CodeGenerator<'a> {
    /// Lowers one checked shader into `IlProgram::shaders`.
    pub fn process_shader(&mut self, shader: &'a ShaderIr) {
        let program = self.program;
        let name = escape_code_name(&shader.name);
        log::debug!("lowering shader '{name}'");

        let mut compiled = IlShader {
            name: name.clone(),
            position: shader.position.clone(),
            ..IlShader::default()
        };
        compiled.module_param_sets = generate_parameter_binding_info(shader, &self.types, self.sink);
        for stage in &shader.pipeline.stages {
            compiled.stages.insert(
                stage.name.clone(),
                IlStage {
                    name: stage.name.clone(),
                    stage_type: stage.stage_type.clone(),
                    position: stage.position.clone(),
                    attributes: stage.attributes.clone(),
                },
            );
        }

        self.types.clear_mappings();
        for world in &shader.pipeline.worlds {
            let mut il_world = IlWorld::new(world.name.clone(), world.position.clone());
            il_world.is_abstract = world.is_abstract;
            il_world.attributes = world.attributes.clone();
            compiled.worlds.push(il_world);
        }

        let mut world_components: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (index, def) in shader.definitions.iter().enumerate() {
            world_components.entry(def.world.as_str()).or_default().push(index);
        }

        // Abstract worlds expose every component in their record.
        for world in compiled.worlds.iter_mut().filter(|w| w.is_abstract) {
            for &index in world_components.get(world.name.as_str()).into_iter().flatten() {
                let def = &shader.definitions[index];
                world.output_type.add_if_not_exists(self.object_definition(def));
            }
        }

        for world in &mut compiled.worlds {
            for &index in world_components.get(world.name.as_str()).into_iter().flatten() {
                let def = &shader.definitions[index];
                if def.is_input() {
                    world.inputs.push(self.object_definition(def));
                }
            }
        }

        // An import moves a component out of the operator's source world,
        // so that world has to record it. Outputs are recorded by their own
        // world.
        for (index, def) in shader.definitions.iter().enumerate() {
            for import in shader.import_expressions(program, index) {
                let node = &program.exprs[import];
                let spire_parser::ast::ExprKind::Import {
                    operator,
                    component,
                    ..
                } = &node.kind
                else {
                    continue;
                };
                let Some(import_op) = shader.pipeline.import_operator(operator) else {
                    panic!("internal error: unknown import operator '{operator}'");
                };
                let ty = node
                    .ty
                    .as_ref()
                    .or_else(|| shader.definition_by_unique_name(component).map(|d| &d.ty))
                    .map(|ty| self.types.translate(ty))
                    .unwrap_or(IlType::VOID);
                if let Some(source) = compiled.world_mut(&import_op.source_world) {
                    source.output_type.add_if_not_exists(ObjectDefinition {
                        name: component.clone(),
                        ty,
                        attributes: def.attributes.clone(),
                        position: node.position.clone(),
                        binding: None,
                    });
                }
            }
            if def.is_output {
                let entry = self.object_definition(def);
                if let Some(world) = compiled.world_mut(&def.world) {
                    world.output_type.add_if_not_exists(entry);
                }
            }
        }

        self.shader = Some(shader);
        self.compiled = Some(compiled);

        let functions: Vec<usize> = (0..shader.definitions.len())
            .filter(|&i| shader.definitions[i].is_component_function())
            .collect();
        for index in shader.sort_by_dependency(&functions) {
            self.lower_component_function(index);
        }

        self.variables.push_scope();
        for &index in world_components.get(UNIFORM_WORLD).into_iter().flatten() {
            let def = &shader.definitions[index];
            let operand = self.module_param(def);
            self.variables.add(def.unique_name.clone(), operand);
        }
        for world in &shader.pipeline.worlds {
            if world.is_abstract {
                continue;
            }
            log::debug!("lowering world '{}' of shader '{name}'", world.name);
            let components = world_components
                .get(world.name.as_str())
                .map(|c| shader.sort_by_dependency(c))
                .unwrap_or_default();
            self.world = Some(world.name.clone());
            let saved_targets = std::mem::take(&mut self.call_targets);
            self.writer.push_node();
            self.variables.push_scope();
            for index in components {
                if !shader.definitions[index].is_component_function() {
                    self.visit_component(index);
                }
            }
            self.variables.pop_scope();
            let code = self.writer.pop_node();
            let called = std::mem::replace(&mut self.call_targets, saved_targets);
            let referenced = self.referenced_function_closure(called);
            if let Some(il_world) = self
                .compiled
                .as_mut()
                .and_then(|s| s.world_mut(&world.name))
            {
                il_world.code = code;
                il_world.referenced_functions = referenced;
            }
            self.world = None;
        }
        self.variables.pop_scope();

        self.shader = None;
        if let Some(compiled) = self.compiled.take() {
            self.il.shaders.insert(name, compiled);
        }
    }

    fn object_definition(&self, def: &ComponentDefinitionIr) -> ObjectDefinition {
        ObjectDefinition {
            name: def.unique_name.clone(),
            ty: self.types.translate(&def.ty),
            attributes: def.attributes.clone(),
            position: def.position.clone(),
            binding: None,
        }
    }

    fn module_param(&self, def: &ComponentDefinitionIr) -> Operand {
        let (Some(shader), Some(compiled)) = (self.shader, self.compiled.as_ref()) else {
            panic!("internal error: module parameter outside of a shader");
        };
        let binding = &shader.module_instances[def.module].binding_name;
        match compiled
            .module_param_sets
            .get(binding)
            .and_then(|set| set.parameter(&def.unique_name))
        {
            Some(param) => param.operand(binding),
            None => panic!(
                "internal error: parameter '{}' missing from set '{binding}'",
                def.unique_name
            ),
        }
    }

    /// `Module.component`, escaped.
    pub(super) fn component_function_name(&self, index: usize) -> String {
        let Some(shader) = self.shader else {
            panic!("internal error: component function outside of a shader");
        };
        let def = &shader.definitions[index];
        let module = &shader.module_instances[def.module].module_name;
        escape_code_name(&format!("{module}.{}", def.original_name))
    }

    /// Every function reachable from `roots` through recorded calls.
    fn referenced_function_closure(&self, roots: BTreeSet<String>) -> BTreeSet<String> {
        let mut work: Vec<String> = roots.iter().cloned().collect();
        let mut all = roots;
        while let Some(name) = work.pop() {
            let Some(function) = self.il.functions.get(&name) else {
                continue;
            };
            for callee in &function.referenced_functions {
                if all.insert(callee.clone()) {
                    work.push(callee.clone());
                }
            }
        }
        all
    }

    /// Lowers a component with parameters into an IL function. The values
    /// of its non-function dependencies are passed in ahead of its own
    /// parameters.
    fn lower_component_function(&mut self, index: usize) {
        let Some(shader) = self.shader else {
            panic!("internal error: component function outside of a shader");
        };
        let program = self.program;
        let def = &shader.definitions[index];
        let name = self.component_function_name(index);
        if self.il.functions.contains_key(&name) {
            return;
        }
        log::debug!("lowering component function '{name}'");

        let closure = shader.dependency_closure(index);
        let mut function = IlFunction {
            name: name.clone(),
            parameters: Vec::new(),
            return_type: self.types.translate(&def.ty),
            code: Default::default(),
            referenced_functions: BTreeSet::new(),
        };
        for &dep in &closure {
            if shader.definitions[dep].is_component_function() {
                function
                    .referenced_functions
                    .insert(self.component_function_name(dep));
            }
        }
        self.il.functions.insert(name.clone(), function.clone());

        let saved_component = self.component.replace(index);
        let saved_targets = std::mem::take(&mut self.call_targets);
        self.variables.push_scope();
        self.writer.push_node();
        let mut id = 0u32;
        for &dep in &closure {
            let dep = &shader.definitions[dep];
            if dep.is_component_function() {
                continue;
            }
            let ty = self.types.translate(&dep.ty);
            let arg = self.function_parameter(
                &mut function,
                format!("p{id}_{}", dep.original_name),
                ty,
                ParameterQualifier::In,
                id,
            );
            self.variables.add(dep.unique_name.clone(), arg);
            id += 1;
        }
        for &param in &def.params {
            let decl = &program.decls[param];
            let ty = self.decl_type(param);
            let arg = self.function_parameter(
                &mut function,
                format!("p{id}_{}", decl.name),
                ty,
                decl.modifiers.qualifier(),
                id,
            );
            self.variables.add(decl.name.clone(), arg);
            id += 1;
        }
        match def.body {
            ComponentBody::Expression(expr) => {
                let value = self.lower_expr(expr);
                self.writer.ret(&mut self.il.instructions, Some(value));
            }
            ComponentBody::Block(stmt) => self.lower_stmt(stmt),
            ComponentBody::Input | ComponentBody::Param => {}
        }
        function.code = self.writer.pop_node();
        self.variables.pop_scope();
        let called = std::mem::replace(&mut self.call_targets, saved_targets);
        function.referenced_functions.extend(called);
        self.component = saved_component;
        self.il.functions.insert(name, function);
    }

    fn function_parameter(
        &mut self,
        function: &mut IlFunction,
        name: String,
        ty: IlType,
        qualifier: ParameterQualifier,
        id: u32,
    ) -> Operand {
        let name = escape_code_name(&name);
        function.parameters.push(IlParameter {
            name: name.clone(),
            ty: ty.clone(),
            qualifier,
        });
        self.writer
            .fetch_arg(&mut self.il.instructions, ty, id + 1, qualifier, name)
    }

    /// Computes one component in the current world and binds its value.
    fn visit_component(&mut self, index: usize) {
        let Some(shader) = self.shader else {
            panic!("internal error: component outside of a shader");
        };
        let def = &shader.definitions[index];
        let ty = self.types.translate(&def.ty);
        self.component = Some(index);
        let value = match def.body {
            ComponentBody::Input => {
                let value = self.emit(
                    InstKind::LoadInput {
                        component: def.unique_name.clone(),
                    },
                    ty,
                );
                self.variables.add(def.unique_name.clone(), value);
                self.component = None;
                return;
            }
            ComponentBody::Param => {
                let value = self.module_param(def);
                self.variables.add(def.unique_name.clone(), value);
                self.component = None;
                return;
            }
            ComponentBody::Expression(expr) => {
                let value = self.lower_expr(expr);
                self.export_if_recorded(&def.unique_name, value.clone());
                value
            }
            ComponentBody::Block(stmt) => {
                self.return_register = None;
                self.lower_stmt(stmt);
                self.return_register.take().unwrap_or(Operand::Undefined)
            }
        };
        if let Operand::Inst(handle) = value {
            self.il.instructions[handle].name = Some(escape_code_name(&def.original_name));
        }
        if let Some(world) = self
            .compiled
            .as_mut()
            .and_then(|s| s.world_mut(&def.world))
        {
            world.components.insert(def.unique_name.clone(), value.clone());
        }
        self.variables.add(def.unique_name.clone(), value);
        self.component = None;
    }
}
