use crate::traverse::scan;
use crate::tree::{Kind, NodeId, Tree};

use super::is_context;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentifierUsage {
    pub is_defined: bool,
    pub is_modified: bool,
    pub is_referenced: bool,
    pub is_exported: bool,
}

/// Syntactic role of one `Identifier` node, derived from its parents chain.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentifierInfo {
    /// Property name of a non-computed member access.
    pub is_accessor: bool,
    pub is_property_key: bool,
    pub is_variable_declaration: bool,
    pub is_function_declaration: bool,
    pub is_function_expression: bool,
    pub is_function_parameter: bool,
    pub is_clause_parameter: bool,
    pub is_import_specifier: bool,
    pub is_function_call: bool,
    pub is_assignment_left: bool,
    pub is_assignment_value: bool,
    pub is_update_expression: bool,
    pub is_delete_expression: bool,
    pub is_class_declaration: bool,
    pub is_method_definition: bool,
    pub is_meta_property: bool,
    pub is_label: bool,
    pub usage: IdentifierUsage,
}

impl IdentifierInfo {
    /// Whether the identifier names a variable binding, either declaring it
    /// or using it.
    pub const fn is_variable(&self) -> bool {
        self.usage.is_defined || self.usage.is_referenced
    }
}

/// Where a binding pattern ends up once the pattern wrappers around an
/// identifier have been climbed.
struct Binding {
    /// Index in `parents` of the node owning the outermost pattern.
    owner: usize,
    field: Option<&'static str>,
}

fn climb_pattern(tree: &Tree, node: NodeId, parents: &[NodeId]) -> Binding {
    let mut child = node;
    let mut index = 0;
    while let Some(&parent) = parents.get(index) {
        let field = tree.field_of(parent, child);
        let through = match tree.kind(parent) {
            Kind::ArrayPattern | Kind::ObjectPattern | Kind::RestElement => true,
            Kind::AssignmentPattern => field == Some("left"),
            Kind::Property => {
                field == Some("value")
                    && parents
                        .get(index + 1)
                        .is_some_and(|p| tree.is(*p, Kind::ObjectPattern))
            }
            _ => false,
        };
        if !through {
            return Binding {
                owner: index,
                field,
            };
        }
        child = parent;
        index += 1;
    }
    Binding {
        owner: index,
        field: None,
    }
}

pub fn classify(tree: &Tree, node: NodeId, parents: &[NodeId]) -> IdentifierInfo {
    let mut info = IdentifierInfo::default();
    let Some(&parent) = parents.first() else {
        info.usage.is_referenced = tree.is(node, Kind::Identifier);
        return info;
    };
    let field = tree.field_of(parent, node);
    let parent_kind = tree.kind(parent);
    let computed = tree.flag(parent, "computed");

    // positions that never name a variable
    let mut is_name_only = false;
    match parent_kind {
        Kind::LabeledStatement | Kind::BreakStatement | Kind::ContinueStatement => {
            info.is_label = true;
            is_name_only = true;
        }
        Kind::MetaProperty => {
            info.is_meta_property = true;
            is_name_only = true;
        }
        Kind::MemberExpression if field == Some("property") && !computed => {
            info.is_accessor = true;
            is_name_only = true;
        }
        Kind::Property | Kind::PropertyDefinition if field == Some("key") && !computed => {
            info.is_property_key = true;
            is_name_only = true;
        }
        Kind::MethodDefinition if field == Some("key") => {
            info.is_method_definition = true;
            if !computed {
                info.is_property_key = true;
                is_name_only = true;
            }
        }
        Kind::ImportSpecifier | Kind::ImportDefaultSpecifier | Kind::ImportNamespaceSpecifier => {
            info.is_import_specifier = true;
            if field == Some("local") {
                info.usage.is_defined = true;
            }
            is_name_only = !info.usage.is_defined;
        }
        Kind::ExportSpecifier => {
            let reexport = parents
                .get(1)
                .and_then(|p| tree.child(*p, "source"))
                .is_some();
            if field == Some("local") && !reexport {
                info.usage.is_exported = true;
            } else {
                is_name_only = true;
            }
        }
        Kind::ExportAllDeclaration => is_name_only = true,
        Kind::FunctionDeclaration if field == Some("id") => {
            info.is_function_declaration = true;
            info.usage.is_defined = true;
        }
        Kind::FunctionExpression if field == Some("id") => {
            info.is_function_expression = true;
            info.usage.is_defined = true;
        }
        Kind::ClassDeclaration | Kind::ClassExpression if field == Some("id") => {
            info.is_class_declaration = true;
            info.usage.is_defined = true;
        }
        Kind::CallExpression | Kind::NewExpression if field == Some("callee") => {
            info.is_function_call = true;
        }
        Kind::AssignmentExpression if field == Some("right") => {
            info.is_assignment_value = true;
        }
        Kind::UpdateExpression => info.is_update_expression = true,
        Kind::UnaryExpression if tree.str(parent, "operator") == Some("delete") => {
            info.is_delete_expression = true;
        }
        _ => {}
    }

    if is_name_only {
        return info;
    }

    let binding = climb_pattern(tree, node, parents);
    if let Some(&owner) = parents.get(binding.owner) {
        match (tree.kind(owner), binding.field) {
            (Kind::VariableDeclarator, Some("id")) => {
                info.is_variable_declaration = true;
                info.usage.is_defined = true;
            }
            (kind, Some("params")) if kind.is_function() => {
                info.is_function_parameter = true;
                info.usage.is_defined = true;
            }
            (Kind::CatchClause, Some("param")) => {
                info.is_clause_parameter = true;
                info.usage.is_defined = true;
            }
            (Kind::AssignmentExpression, Some("left"))
            | (Kind::ForInStatement | Kind::ForOfStatement, Some("left")) => {
                info.is_assignment_left = true;
            }
            _ => {}
        }
    }

    info.usage.is_modified =
        info.is_assignment_left || info.is_update_expression || info.is_delete_expression;
    info.usage.is_referenced = !info.usage.is_defined;
    if info.usage.is_defined && !info.usage.is_exported {
        info.usage.is_exported = is_exported_definition(tree, &info, parents, binding.owner);
    }
    info
}

/// `export var x`, `export function f() {}` and `export class C {}`.
fn is_exported_definition(
    tree: &Tree,
    info: &IdentifierInfo,
    parents: &[NodeId],
    owner: usize,
) -> bool {
    let declaration = if info.is_variable_declaration {
        owner + 1
    } else if info.is_function_declaration || info.is_class_declaration {
        0
    } else {
        return false;
    };
    parents.get(declaration + 1).is_some_and(|p| {
        matches!(
            tree.kind(*p),
            Kind::ExportNamedDeclaration | Kind::ExportDefaultDeclaration
        )
    })
}

/// The node that opens the scope a definition belongs to.
fn defining_scope(tree: &Tree, node: NodeId, parents: &[NodeId]) -> Option<NodeId> {
    let info = classify(tree, node, parents);
    if info.is_function_parameter || info.is_function_expression {
        return climb_owner(tree, node, parents);
    }
    if info.is_class_declaration {
        let class = *parents.first()?;
        if tree.is(class, Kind::ClassExpression) {
            return Some(class);
        }
        return block_scope(tree, &parents[1..]);
    }
    if info.is_clause_parameter {
        return climb_owner(tree, node, parents);
    }
    if info.is_function_declaration {
        return parents[1..].iter().copied().find(|p| {
            tree.kind(*p).is_block() || is_context(tree, *p)
        });
    }
    if info.is_import_specifier {
        return parents.last().copied();
    }
    if info.is_variable_declaration {
        let owner = climb_pattern(tree, node, parents).owner;
        let declaration = *parents.get(owner + 1)?;
        if tree.str(declaration, "kind") == Some("var") {
            return parents[owner..]
                .iter()
                .copied()
                .find(|p| is_context(tree, *p));
        }
        return block_scope(tree, &parents[owner + 1..]);
    }
    None
}

fn climb_owner(tree: &Tree, node: NodeId, parents: &[NodeId]) -> Option<NodeId> {
    let binding = climb_pattern(tree, node, parents);
    parents.get(binding.owner).copied()
}

/// Nearest node a `let`, `const` or `class` binding is scoped to.
fn block_scope(tree: &Tree, parents: &[NodeId]) -> Option<NodeId> {
    parents.iter().copied().find(|p| {
        let kind = tree.kind(*p);
        kind.is_block() || kind.is_loop() || kind.is_function() || kind == Kind::SwitchStatement
    })
}

/// Finds the identifier that declares the variable `node` refers to. Among
/// all declarations of the same name whose scope encloses `node`, the one
/// with the closest scope wins. Returns `None` for free names.
pub fn get_defining_identifier(tree: &Tree, node: NodeId, parents: &[NodeId]) -> Option<NodeId> {
    let name = tree.name(node)?;
    let root = parents.last().copied().unwrap_or(node);

    let chain: Vec<NodeId> = std::iter::once(node).chain(parents.iter().copied()).collect();
    let mut best: Option<(usize, NodeId)> = None;
    scan(tree, root, &[], |candidate, candidate_parents| {
        if tree.is(candidate, Kind::Identifier) && tree.name(candidate) == Some(name) {
            let info = classify(tree, candidate, candidate_parents);
            if info.usage.is_defined {
                let index = defining_scope(tree, candidate, candidate_parents)
                    .and_then(|scope| chain.iter().position(|c| *c == scope));
                if let Some(index) = index {
                    if best.is_none_or(|(current, _)| index < current) {
                        best = Some((index, candidate));
                    }
                }
            }
        }
        true
    });
    best.map(|(_, id)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    /// Classifies every identifier called `name` in `code`.
    fn classify_all(code: &str, name: &str, module: bool) -> Vec<IdentifierInfo> {
        let tree = parse(code, module).unwrap();
        let mut out = Vec::new();
        scan(&tree, tree.root(), &[], |node, parents| {
            if tree.is_identifier(node, name) {
                out.push(classify(&tree, node, parents));
            }
            true
        });
        out
    }

    fn one(code: &str, name: &str) -> IdentifierInfo {
        let all = classify_all(code, name, false);
        assert_eq!(all.len(), 1, "{}", code);
        all[0]
    }

    fn defined() -> IdentifierUsage {
        IdentifierUsage {
            is_defined: true,
            ..IdentifierUsage::default()
        }
    }

    fn referenced() -> IdentifierUsage {
        IdentifierUsage {
            is_referenced: true,
            ..IdentifierUsage::default()
        }
    }

    #[test]
    fn test_variable_declaration() {
        let info = one("var x = 1;", "x");
        assert_eq!(
            info,
            IdentifierInfo {
                is_variable_declaration: true,
                usage: defined(),
                ..IdentifierInfo::default()
            }
        );
    }

    #[test]
    fn test_member_access() {
        assert_eq!(
            one("x.y;", "x"),
            IdentifierInfo {
                usage: referenced(),
                ..IdentifierInfo::default()
            }
        );
        assert_eq!(
            one("x.y;", "y"),
            IdentifierInfo {
                is_accessor: true,
                ..IdentifierInfo::default()
            }
        );
        assert!(one("o[y];", "y").usage.is_referenced);
    }

    #[test]
    fn test_property_key() {
        assert_eq!(
            one("({x: 1});", "x"),
            IdentifierInfo {
                is_property_key: true,
                ..IdentifierInfo::default()
            }
        );
        assert!(one("({[x]: 1});", "x").usage.is_referenced);
    }

    #[test]
    fn test_function_name_and_parameter() {
        assert_eq!(
            one("function f(x){}", "f"),
            IdentifierInfo {
                is_function_declaration: true,
                usage: defined(),
                ..IdentifierInfo::default()
            }
        );
        assert_eq!(
            one("function f(x){}", "x"),
            IdentifierInfo {
                is_function_parameter: true,
                usage: defined(),
                ..IdentifierInfo::default()
            }
        );
        assert!(one("function f({a: x = 1}){}", "x").is_function_parameter);
        assert!(one("(function g(){});", "g").is_function_expression);
    }

    #[test]
    fn test_catch_parameter() {
        assert_eq!(
            one("try{}catch(x){}", "x"),
            IdentifierInfo {
                is_clause_parameter: true,
                usage: defined(),
                ..IdentifierInfo::default()
            }
        );
    }

    #[test]
    fn test_import_specifier() {
        let infos = classify_all("import {x} from \"m\";", "x", true);
        assert_eq!(infos.len(), 2);
        let imported = infos[0];
        let local = infos[1];
        assert_eq!(
            imported,
            IdentifierInfo {
                is_import_specifier: true,
                ..IdentifierInfo::default()
            }
        );
        assert_eq!(
            local,
            IdentifierInfo {
                is_import_specifier: true,
                usage: defined(),
                ..IdentifierInfo::default()
            }
        );
    }

    #[test]
    fn test_update_expression() {
        assert_eq!(
            one("x++;", "x"),
            IdentifierInfo {
                is_update_expression: true,
                usage: IdentifierUsage {
                    is_modified: true,
                    is_referenced: true,
                    ..IdentifierUsage::default()
                },
                ..IdentifierInfo::default()
            }
        );
    }

    #[test]
    fn test_class_name() {
        assert_eq!(
            one("class X{}", "X"),
            IdentifierInfo {
                is_class_declaration: true,
                usage: defined(),
                ..IdentifierInfo::default()
            }
        );
        assert!(one("class A { x() {} }", "x").is_method_definition);
    }

    #[test]
    fn test_label() {
        let infos = classify_all("x: for(;;) break x;", "x", false);
        assert_eq!(infos.len(), 2);
        for info in infos {
            assert_eq!(
                info,
                IdentifierInfo {
                    is_label: true,
                    ..IdentifierInfo::default()
                }
            );
        }
    }

    #[test]
    fn test_assignment_roles() {
        let left = one("x = y;", "x");
        assert!(left.is_assignment_left && left.usage.is_modified && left.usage.is_referenced);
        assert!(one("x = y;", "y").is_assignment_value);
        assert!(one("[x] = y;", "x").is_assignment_left);
        assert!(one("for (x in o) {}", "x").usage.is_modified);
        assert!(one("f(x);", "f").is_function_call);
        assert!(one("delete x;", "x").is_delete_expression);
        assert!(one("new.target;", "target").is_meta_property);
    }

    #[test]
    fn test_exported_definitions() {
        let infos = classify_all("export var x = 1; export { y as x2 }; var y;", "x", true);
        assert!(infos[0].usage.is_exported);
        assert!(classify_all("export function x() {}", "x", true)[0].usage.is_exported);
        assert!(classify_all("var y; export { y };", "y", true)[1].usage.is_exported);
    }

    fn defining(code: &str, name: &str, nth_use: usize) -> Option<(Kind, Vec<Kind>)> {
        let tree = parse(code, false).unwrap();
        let mut uses = Vec::new();
        scan(&tree, tree.root(), &[], |node, parents| {
            if tree.is_identifier(node, name) && classify(&tree, node, parents).usage.is_referenced {
                uses.push((node, parents.to_vec()));
            }
            true
        });
        let (node, parents) = &uses[nth_use];
        let def = get_defining_identifier(&tree, *node, parents)?;
        let mut chain = None;
        scan(&tree, tree.root(), &[], |candidate, candidate_parents| {
            if candidate == def {
                chain = Some(candidate_parents.iter().map(|p| tree.kind(*p)).collect());
            }
            true
        });
        Some((tree.kind(def), chain.unwrap()))
    }

    #[test]
    fn test_defining_identifier_prefers_closest_scope() {
        let code = "var a = 1; function f(a) { return a; } a;";
        let (_, inner) = defining(code, "a", 0).unwrap();
        assert_eq!(inner[0], Kind::FunctionDeclaration);
        let (_, outer) = defining(code, "a", 1).unwrap();
        assert_eq!(outer[0], Kind::VariableDeclarator);
    }

    #[test]
    fn test_defining_identifier_block_scope_and_free_names() {
        let code = "let b = 1; { let b = 2; b; } b; c;";
        let (_, inner) = defining(code, "b", 0).unwrap();
        assert_eq!(inner[2], Kind::BlockStatement);
        let (_, outer) = defining(code, "b", 1).unwrap();
        assert_eq!(outer[2], Kind::Program);
        assert!(defining(code, "c", 0).is_none());
    }
}
