//! Checked description of one shader, as handed over by the semantic checker.
//!
//! The syntax tree only says what the user wrote. A [`ShaderIr`] adds what
//! checking resolved: which pipeline the shader runs on, which module
//! instances it uses, and one [`ComponentDefinitionIr`] per component and
//! world with its dependency edges. Bodies stay in the [`Program`] and are
//! referenced by handle.

use std::collections::{BTreeMap, HashMap, HashSet};

use spire_ir::{Attributes, CodePosition, IlType};
use spire_parser::Program;
use spire_parser::ast::{DeclId, ExprId, ExprKind, StmtId, walk_expr, walk_stmt_exprs};

/// Pseudo-world holding the shader's module parameters.
pub const UNIFORM_WORLD: &str = "<uniform>";

#[derive(Clone, Debug)]
pub struct WorldDecl {
    pub name: String,
    pub position: CodePosition,
    pub is_abstract: bool,
    pub attributes: Attributes,
}

/// `import[source -> dest]` operator. Its body reads the imported value
/// through `project(...)`, and `type_param` names the imported value's type
/// inside the body.
#[derive(Clone, Debug)]
pub struct ImportOperatorDef {
    pub name: String,
    pub position: CodePosition,
    pub source_world: String,
    pub dest_world: String,
    pub type_param: String,
    /// Parameter names, bound to the import arguments in order.
    pub params: Vec<String>,
    pub body: StmtId,
}

#[derive(Clone, Debug)]
pub struct StageDecl {
    pub name: String,
    pub stage_type: String,
    pub position: CodePosition,
    pub attributes: Attributes,
}

#[derive(Clone, Debug, Default)]
pub struct PipelineIr {
    pub name: String,
    /// Worlds in declaration order.
    pub worlds: Vec<WorldDecl>,
    pub import_operators: Vec<ImportOperatorDef>,
    pub stages: Vec<StageDecl>,
}

impl PipelineIr {
    pub fn world(&self, name: &str) -> Option<&WorldDecl> {
        self.worlds.iter().find(|w| w.name == name)
    }

    pub fn import_operator(&self, name: &str) -> Option<&ImportOperatorDef> {
        self.import_operators.iter().find(|op| op.name == name)
    }
}

/// A module used by the shader, bound to a parameter set.
#[derive(Clone, Debug)]
pub struct ModuleInstanceIr {
    pub module_name: String,
    pub binding_name: String,
    /// Descriptor set index from the `using` site, if the user gave one.
    pub binding_index: Option<i32>,
    pub using_position: CodePosition,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentBody {
    /// Read from the world's input record.
    Input,
    /// A module parameter; lives in the `<uniform>` world.
    Param,
    Expression(ExprId),
    /// Computed by a block whose `return` statements produce the value.
    Block(StmtId),
}

/// One component in one world.
#[derive(Clone, Debug)]
pub struct ComponentDefinitionIr {
    /// Unique across the shader; what `Var`/`Member` component references
    /// name.
    pub unique_name: String,
    pub original_name: String,
    /// Key shared by the definitions of one component in different worlds;
    /// what `Callee::Component` names.
    pub component: String,
    /// Index into [`ShaderIr::module_instances`].
    pub module: usize,
    pub world: String,
    pub ty: IlType,
    pub position: CodePosition,
    pub attributes: Attributes,
    pub is_output: bool,
    /// Components with parameters are lowered as functions.
    pub is_function: bool,
    /// Parameter declarations of a component function.
    pub params: Vec<DeclId>,
    pub body: ComponentBody,
    /// Indices into [`ShaderIr::definitions`] this definition references.
    pub dependencies: Vec<usize>,
}

impl ComponentDefinitionIr {
    pub fn is_input(&self) -> bool {
        self.body == ComponentBody::Input
    }

    pub fn is_param(&self) -> bool {
        self.body == ComponentBody::Param
    }

    pub fn is_component_function(&self) -> bool {
        self.is_function
    }
}

#[derive(Clone, Debug, Default)]
pub struct ShaderIr {
    pub name: String,
    pub position: CodePosition,
    pub pipeline: PipelineIr,
    pub module_instances: Vec<ModuleInstanceIr>,
    pub definitions: Vec<ComponentDefinitionIr>,
    /// Component key to world name to definition index.
    pub definitions_by_component: HashMap<String, BTreeMap<String, usize>>,
}

impl ShaderIr {
    pub fn new(name: impl Into<String>, position: CodePosition, pipeline: PipelineIr) -> Self {
        Self {
            name: name.into(),
            position,
            pipeline,
            ..Self::default()
        }
    }

    pub fn add_module_instance(&mut self, instance: ModuleInstanceIr) -> usize {
        self.module_instances.push(instance);
        self.module_instances.len() - 1
    }

    pub fn add_definition(&mut self, definition: ComponentDefinitionIr) -> usize {
        let index = self.definitions.len();
        self.definitions_by_component
            .entry(definition.component.clone())
            .or_default()
            .insert(definition.world.clone(), index);
        self.definitions.push(definition);
        index
    }

    pub fn definition_by_unique_name(&self, unique_name: &str) -> Option<&ComponentDefinitionIr> {
        self.definitions.iter().find(|d| d.unique_name == unique_name)
    }

    /// Whether any parameter component belongs to module instance `module`.
    pub fn module_has_params(&self, module: usize) -> bool {
        self.definitions
            .iter()
            .any(|d| d.module == module && d.is_param())
    }

    /// Every definition `index` depends on, directly or not, dependencies
    /// before dependents. `index` itself is not included.
    pub fn dependency_closure(&self, index: usize) -> Vec<usize> {
        let mut order = Vec::new();
        let mut visited = HashSet::from([index]);
        // (node, next dependency to look at)
        let mut stack = vec![(index, 0usize)];
        while let Some((node, next)) = stack.pop() {
            match self.definitions[node].dependencies.get(next) {
                Some(&dep) => {
                    stack.push((node, next + 1));
                    if visited.insert(dep) {
                        stack.push((dep, 0));
                    }
                }
                None => {
                    if node != index {
                        order.push(node);
                    }
                }
            }
        }
        order
    }

    /// Orders `indices` so every definition follows the ones it depends on.
    ///
    /// Stable: independent definitions keep their relative order. Members of
    /// a dependency cycle are appended in their original order.
    pub fn sort_by_dependency(&self, indices: &[usize]) -> Vec<usize> {
        let members: HashSet<usize> = indices.iter().copied().collect();
        let mut placed = HashSet::new();
        let mut sorted = Vec::with_capacity(indices.len());
        loop {
            let before = sorted.len();
            for &i in indices {
                if placed.contains(&i) {
                    continue;
                }
                let ready = self.definitions[i]
                    .dependencies
                    .iter()
                    .all(|d| *d == i || !members.contains(d) || placed.contains(d));
                if ready {
                    placed.insert(i);
                    sorted.push(i);
                }
            }
            if sorted.len() == before {
                break;
            }
        }
        if sorted.len() < indices.len() {
            log::warn!("dependency cycle among components of shader '{}'", self.name);
            sorted.extend(indices.iter().filter(|i| !placed.contains(i)));
        }
        sorted
    }

    /// Import expressions inside the body of definition `index`, in source
    /// order.
    pub fn import_expressions(&self, program: &Program, index: usize) -> Vec<ExprId> {
        let mut found = Vec::new();
        let mut collect = |e: ExprId| {
            if matches!(program.exprs[e].kind, ExprKind::Import { .. }) {
                found.push(e);
            }
        };
        match self.definitions[index].body {
            ComponentBody::Expression(e) => walk_expr(program, e, &mut collect),
            ComponentBody::Block(s) => walk_stmt_exprs(program, s, &mut collect),
            ComponentBody::Input | ComponentBody::Param => {}
        }
        found
    }
}
