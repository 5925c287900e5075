/// AST visitor trait for traversing `OpenSCAD` syntax trees.
///
/// Implement this trait to walk the AST without modifying it. Each method
/// defaults to the matching `walk_*` function, which recurses into children
/// in source order; overrides can call `walk_*` themselves to keep the
/// default traversal.
use crate::ast::{
    Argument, Assignment, Expr, ExprKind, Instantiation, InstantiationKind, ListCompElement,
    ListCompElementKind, Parameter, SourceFile, Statement, StatementKind,
};

/// A visitor that traverses the AST by reference.
pub trait Visitor {
    fn visit_file(&mut self, file: &SourceFile) {
        walk_file(self, file);
    }

    fn visit_statement(&mut self, stmt: &Statement) {
        walk_statement(self, stmt);
    }

    fn visit_instantiation(&mut self, inst: &Instantiation) {
        walk_instantiation(self, inst);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }

    fn visit_list_comp_element(&mut self, element: &ListCompElement) {
        walk_list_comp_element(self, element);
    }

    fn visit_parameter(&mut self, param: &Parameter) {
        walk_parameter(self, param);
    }

    fn visit_argument(&mut self, arg: &Argument) {
        self.visit_expr(&arg.value);
    }

    fn visit_assignment(&mut self, assignment: &Assignment) {
        self.visit_expr(&assignment.value);
    }
}

pub fn walk_file<V: Visitor + ?Sized>(visitor: &mut V, file: &SourceFile) {
    for stmt in &file.statements {
        visitor.visit_statement(stmt);
    }
}

pub fn walk_statement<V: Visitor + ?Sized>(visitor: &mut V, stmt: &Statement) {
    match &stmt.kind {
        StatementKind::Use { .. }
        | StatementKind::Include { .. }
        | StatementKind::CommentLine { .. }
        | StatementKind::CommentBlock { .. } => {}
        StatementKind::Assignment { value, .. } => visitor.visit_expr(value),
        StatementKind::ModuleDeclaration {
            parameters, body, ..
        } => {
            for param in parameters {
                visitor.visit_parameter(param);
            }
            for child in body {
                visitor.visit_instantiation(child);
            }
        }
        StatementKind::FunctionDeclaration {
            parameters, body, ..
        } => {
            for param in parameters {
                visitor.visit_parameter(param);
            }
            visitor.visit_expr(body);
        }
        StatementKind::Instantiation { instantiation } => {
            visitor.visit_instantiation(instantiation);
        }
    }
}

pub fn walk_instantiation<V: Visitor + ?Sized>(visitor: &mut V, inst: &Instantiation) {
    match &inst.kind {
        InstantiationKind::Call {
            arguments,
            children,
            ..
        } => {
            for arg in arguments {
                visitor.visit_argument(arg);
            }
            for child in children {
                visitor.visit_instantiation(child);
            }
        }
        InstantiationKind::For {
            assignments,
            children,
        }
        | InstantiationKind::IntersectionFor {
            assignments,
            children,
        }
        | InstantiationKind::Let {
            assignments,
            children,
        } => {
            for assignment in assignments {
                visitor.visit_assignment(assignment);
            }
            for child in children {
                visitor.visit_instantiation(child);
            }
        }
        InstantiationKind::CFor {
            init,
            condition,
            update,
            children,
        }
        | InstantiationKind::IntersectionCFor {
            init,
            condition,
            update,
            children,
        } => {
            for assignment in init {
                visitor.visit_assignment(assignment);
            }
            visitor.visit_expr(condition);
            for assignment in update {
                visitor.visit_assignment(assignment);
            }
            for child in children {
                visitor.visit_instantiation(child);
            }
        }
        InstantiationKind::Echo {
            arguments,
            children,
        }
        | InstantiationKind::Assert {
            arguments,
            children,
        } => {
            for arg in arguments {
                visitor.visit_argument(arg);
            }
            for child in children {
                visitor.visit_instantiation(child);
            }
        }
        InstantiationKind::If {
            condition,
            children,
        } => {
            visitor.visit_expr(condition);
            for child in children {
                visitor.visit_instantiation(child);
            }
        }
        InstantiationKind::IfElse {
            condition,
            then_children,
            else_children,
        } => {
            visitor.visit_expr(condition);
            for child in then_children {
                visitor.visit_instantiation(child);
            }
            for child in else_children {
                visitor.visit_instantiation(child);
            }
        }
        InstantiationKind::ShowOnly { child }
        | InstantiationKind::Highlight { child }
        | InstantiationKind::Background { child }
        | InstantiationKind::Disable { child } => visitor.visit_instantiation(child),
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(visitor: &mut V, expr: &Expr) {
    match &expr.kind {
        ExprKind::Number { .. }
        | ExprKind::String { .. }
        | ExprKind::Boolean { .. }
        | ExprKind::Undef
        | ExprKind::Identifier { .. } => {}
        ExprKind::UnaryOp { operand, .. } => visitor.visit_expr(operand),
        ExprKind::BinaryOp { left, right, .. } => {
            visitor.visit_expr(left);
            visitor.visit_expr(right);
        }
        ExprKind::Ternary {
            condition,
            then_expr,
            else_expr,
        } => {
            visitor.visit_expr(condition);
            visitor.visit_expr(then_expr);
            visitor.visit_expr(else_expr);
        }
        ExprKind::Call { callee, arguments } => {
            visitor.visit_expr(callee);
            for arg in arguments {
                visitor.visit_argument(arg);
            }
        }
        ExprKind::Index { object, index } => {
            visitor.visit_expr(object);
            visitor.visit_expr(index);
        }
        ExprKind::Member { object, .. } => visitor.visit_expr(object),
        ExprKind::Vector { elements } => {
            for element in elements {
                visitor.visit_expr(element);
            }
        }
        ExprKind::ListComprehension { elements } => {
            for element in elements {
                visitor.visit_list_comp_element(element);
            }
        }
        ExprKind::Range { start, step, end } => {
            visitor.visit_expr(start);
            if let Some(step) = step {
                visitor.visit_expr(step);
            }
            visitor.visit_expr(end);
        }
        ExprKind::Let { assignments, body } => {
            for assignment in assignments {
                visitor.visit_assignment(assignment);
            }
            visitor.visit_expr(body);
        }
        ExprKind::Echo { arguments, body } | ExprKind::Assert { arguments, body } => {
            for arg in arguments {
                visitor.visit_argument(arg);
            }
            if let Some(body) = body {
                visitor.visit_expr(body);
            }
        }
        ExprKind::FunctionLiteral { parameters, body } => {
            for param in parameters {
                visitor.visit_parameter(param);
            }
            visitor.visit_expr(body);
        }
    }
}

pub fn walk_list_comp_element<V: Visitor + ?Sized>(visitor: &mut V, element: &ListCompElement) {
    match &element.kind {
        ListCompElementKind::Expr { expr } => visitor.visit_expr(expr),
        ListCompElementKind::For { assignments, body }
        | ListCompElementKind::Let { assignments, body } => {
            for assignment in assignments {
                visitor.visit_assignment(assignment);
            }
            visitor.visit_list_comp_element(body);
        }
        ListCompElementKind::CFor {
            init,
            condition,
            update,
            body,
        } => {
            for assignment in init {
                visitor.visit_assignment(assignment);
            }
            visitor.visit_expr(condition);
            for assignment in update {
                visitor.visit_assignment(assignment);
            }
            visitor.visit_list_comp_element(body);
        }
        ListCompElementKind::If { condition, body } => {
            visitor.visit_expr(condition);
            visitor.visit_list_comp_element(body);
        }
        ListCompElementKind::IfElse {
            condition,
            then_body,
            else_body,
        } => {
            visitor.visit_expr(condition);
            visitor.visit_list_comp_element(then_body);
            visitor.visit_list_comp_element(else_body);
        }
        ListCompElementKind::Each { body } => visitor.visit_list_comp_element(body),
    }
}

pub fn walk_parameter<V: Visitor + ?Sized>(visitor: &mut V, param: &Parameter) {
    if let Some(default) = &param.default {
        visitor.visit_expr(default);
    }
}
