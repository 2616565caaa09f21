//! Bytecode compiler
//!
//! Lowers a parsed [`SourceUnit`] to [`CompiledBlock`]s and wraps them in
//! [`Object`]s ready to be installed in the tree.
//!
//! Compilation runs in two passes. The first reserves an id for every
//! contract and function in textual order (a contract before its nested
//! functions) and records call signatures, so bodies may call functions
//! declared later in the same unit. The second pass compiles the bodies.
//!
//! Calls are bound in this order:
//!
//! 1. a function nested in the same contract
//! 2. a top-level function of the same unit
//! 3. a top-level function already installed in the tree
//! 4. a host builtin, looked up by name when the call executes

use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::ast::{
    BinaryOp, ContractDecl, Expr, ExprKind, FunctionDecl, Item, Pos, SourceUnit, Stmt, UnaryOp,
};
use crate::bytecode::{CompiledBlock, Op, Param, SlotId};
use crate::error::{CompileError, CompileResult};
use crate::parser::MAX_NESTING;
use crate::tree::{
    CompiledRoot, ContractInfo, FieldType, FunctionInfo, Object, ObjectId, ObjectKind,
    ObjectTree, TxField,
};
use crate::value::Value;

/// Tag marking a transaction field as optional
pub const OPTIONAL_TAG: &str = "optional";

#[derive(Debug, Clone, Copy)]
struct Signature {
    id: ObjectId,
    arity: usize,
}

struct ContractPlan<'u> {
    decl: &'u ContractDecl,
    id: ObjectId,
    functions: HashMap<String, Signature>,
    function_ids: Vec<ObjectId>,
}

struct Scope<'a> {
    contract: Option<&'a HashMap<String, Signature>>,
    unit: &'a HashMap<String, Signature>,
    tree: &'a ObjectTree,
}

/// Compile a parsed unit against the currently installed `tree`.
///
/// `reserve` hands out fresh object ids.
pub(crate) fn compile_unit(
    unit: &SourceUnit,
    tree: &ObjectTree,
    reserve: &mut dyn FnMut() -> ObjectId,
) -> CompileResult<CompiledRoot> {
    // Pass 1: reserve ids and collect signatures
    let mut top_names = HashSet::new();
    let mut contracts = Vec::new();
    let mut functions = Vec::new();
    let mut unit_functions = HashMap::new();

    for item in &unit.items {
        match item {
            Item::Contract(decl) => {
                if !top_names.insert(decl.name.clone()) {
                    return Err(CompileError::DuplicateName {
                        name: decl.name.clone(),
                    });
                }
                let id = reserve();
                let mut plan = ContractPlan {
                    decl,
                    id,
                    functions: HashMap::new(),
                    function_ids: Vec::new(),
                };
                for func in &decl.functions {
                    let func_id = reserve();
                    let signature = Signature {
                        id: func_id,
                        arity: func.params.len(),
                    };
                    if plan.functions.insert(func.name.clone(), signature).is_some() {
                        return Err(CompileError::DuplicateName {
                            name: format!("{}.{}", decl.name, func.name),
                        });
                    }
                    plan.function_ids.push(func_id);
                }
                contracts.push(plan);
            }
            Item::Function(decl) => {
                if !top_names.insert(decl.name.clone()) {
                    return Err(CompileError::DuplicateName {
                        name: decl.name.clone(),
                    });
                }
                let signature = Signature {
                    id: reserve(),
                    arity: decl.params.len(),
                };
                unit_functions.insert(decl.name.clone(), signature);
                functions.push((decl, signature.id));
            }
        }
    }

    // Pass 2: compile bodies
    let mut objects = Vec::new();

    for plan in &contracts {
        let scope = Scope {
            contract: Some(&plan.functions),
            unit: &unit_functions,
            tree,
        };

        let mut children = IndexMap::new();
        for (decl, id) in plan.decl.functions.iter().zip(&plan.function_ids) {
            let qualified = format!("{}.{}", plan.decl.name, decl.name);
            let block = FunctionCompiler::compile(&scope, decl, qualified, Some(plan.id))?;
            let object = Arc::new(Object {
                id: *id,
                name: decl.name.clone(),
                owner: Some(plan.id),
                kind: ObjectKind::Function(FunctionInfo {
                    block: Arc::new(block),
                }),
            });
            children.insert(decl.name.clone(), Arc::clone(&object));
            objects.push(object);
        }

        let tx_fields = tx_fields(plan.decl)?;
        debug!(
            contract = %plan.decl.name,
            id = plan.id,
            fields = tx_fields.len(),
            functions = children.len(),
            "Compiled contract"
        );
        objects.push(Arc::new(Object {
            id: plan.id,
            name: plan.decl.name.clone(),
            owner: None,
            kind: ObjectKind::Contract(Arc::new(ContractInfo {
                tx_fields,
                functions: children,
            })),
        }));
    }

    let scope = Scope {
        contract: None,
        unit: &unit_functions,
        tree,
    };
    for (decl, id) in functions {
        let block = FunctionCompiler::compile(&scope, decl, decl.name.clone(), None)?;
        debug!(function = %decl.name, id, "Compiled function");
        objects.push(Arc::new(Object {
            id,
            name: decl.name.clone(),
            owner: None,
            kind: ObjectKind::Function(FunctionInfo {
                block: Arc::new(block),
            }),
        }));
    }

    Ok(CompiledRoot::new(objects))
}

fn tx_fields(decl: &ContractDecl) -> CompileResult<Vec<TxField>> {
    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(decl.fields.len());
    for field in &decl.fields {
        let ty = FieldType::from_name(&field.ty).ok_or_else(|| {
            CompileError::syntax(
                field.pos.line,
                field.pos.column,
                format!("unknown field type `{}`", field.ty),
            )
        })?;
        if !seen.insert(field.name.as_str()) {
            return Err(CompileError::DuplicateName {
                name: format!("{}.{}", decl.name, field.name),
            });
        }
        fields.push(TxField {
            name: field.name.clone(),
            ty,
            optional: field.tag.as_deref() == Some(OPTIONAL_TAG),
        });
    }
    Ok(fields)
}

struct FunctionCompiler<'s, 'a> {
    scope: &'s Scope<'a>,
    block: CompiledBlock,
    locals: HashMap<String, SlotId>,
    depth: usize,
}

impl<'s, 'a> FunctionCompiler<'s, 'a> {
    fn compile(
        scope: &'s Scope<'a>,
        decl: &FunctionDecl,
        qualified: String,
        owner: Option<ObjectId>,
    ) -> CompileResult<CompiledBlock> {
        let mut compiler = Self {
            scope,
            block: CompiledBlock::new(qualified, owner),
            locals: HashMap::new(),
            depth: 0,
        };

        for param in &decl.params {
            compiler.declare(&param.name, param.pos)?;
            compiler.block.params.push(Param {
                name: param.name.clone(),
                ty: param.ty,
            });
        }
        compiler.block.result = decl.result;

        compiler.statements(&decl.body)?;
        compiler.literal(Value::Nil)?;
        compiler.block.emit(Op::Return);

        Ok(compiler.block)
    }

    fn declare(&mut self, name: &str, pos: Pos) -> CompileResult<SlotId> {
        if self.locals.contains_key(name) {
            return Err(CompileError::syntax(
                pos.line,
                pos.column,
                format!("`{}` is already declared", name),
            ));
        }
        let slot = SlotId::try_from(self.locals.len()).map_err(|_| CompileError::TooLarge {
            what: "local variable count",
            size: self.locals.len() + 1,
            limit: SlotId::MAX as usize,
        })?;
        self.locals.insert(name.to_string(), slot);
        self.block.local_count = slot + 1;
        Ok(slot)
    }

    fn literal(&mut self, value: Value) -> CompileResult<()> {
        let idx = self.block.add_literal(value).ok_or(CompileError::TooLarge {
            what: "literal table",
            size: self.block.literals.len() + 1,
            limit: u16::MAX as usize,
        })?;
        self.block.emit(Op::Literal(idx));
        Ok(())
    }

    fn name(&mut self, name: &str) -> CompileResult<u16> {
        let len = self.block.names.len();
        self.block.add_name(name).ok_or(CompileError::TooLarge {
            what: "name table",
            size: len + 1,
            limit: u16::MAX as usize,
        })
    }

    fn here(&self) -> CompileResult<u32> {
        u32::try_from(self.block.offset()).map_err(|_| CompileError::TooLarge {
            what: "function body",
            size: self.block.offset(),
            limit: u32::MAX as usize,
        })
    }

    fn emit_jump(&mut self, op: Op) -> usize {
        let at = self.block.offset();
        self.block.emit(op);
        at
    }

    fn patch_here(&mut self, at: usize) -> CompileResult<()> {
        let target = self.here()?;
        self.block.patch_jump(at, target);
        Ok(())
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn statements(&mut self, stmts: &[Stmt]) -> CompileResult<()> {
        for stmt in stmts {
            self.statement(stmt)?;
        }
        Ok(())
    }

    fn statement(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match stmt {
            Stmt::Var(decls) => {
                for decl in decls {
                    let slot = self.declare(&decl.name, decl.pos)?;
                    self.literal(decl.ty.zero())?;
                    self.block.emit(Op::StoreLocal(slot));
                }
            }
            Stmt::Assign { name, value, pos } => {
                let slot = *self.locals.get(name).ok_or_else(|| {
                    CompileError::syntax(
                        pos.line,
                        pos.column,
                        format!("assignment to undeclared variable `{}`", name),
                    )
                })?;
                self.expr(value)?;
                self.block.emit(Op::StoreLocal(slot));
            }
            Stmt::AssignExtend { name, value } => {
                self.expr(value)?;
                let idx = self.name(name)?;
                self.block.emit(Op::StoreExtend(idx));
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond)?;
                let skip_then = self.emit_jump(Op::JumpIfFalse(0));
                self.statements(then)?;
                if otherwise.is_empty() {
                    self.patch_here(skip_then)?;
                } else {
                    let skip_else = self.emit_jump(Op::Jump(0));
                    self.patch_here(skip_then)?;
                    self.statements(otherwise)?;
                    self.patch_here(skip_else)?;
                }
            }
            Stmt::While { cond, body } => {
                let start = self.here()?;
                self.expr(cond)?;
                let exit = self.emit_jump(Op::JumpIfFalse(0));
                self.statements(body)?;
                self.block.emit(Op::Jump(start));
                self.patch_here(exit)?;
            }
            Stmt::Return(value) => {
                match value {
                    Some(expr) => self.expr(expr)?,
                    None => self.literal(Value::Nil)?,
                }
                self.block.emit(Op::Return);
            }
            Stmt::Raise(expr) => {
                self.expr(expr)?;
                self.block.emit(Op::Raise);
            }
            Stmt::Expr(expr) => {
                self.expr(expr)?;
                self.block.emit(Op::Pop);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn expr(&mut self, expr: &Expr) -> CompileResult<()> {
        if self.depth >= MAX_NESTING {
            return Err(CompileError::TooLarge {
                what: "expression nesting",
                size: self.depth + 1,
                limit: MAX_NESTING,
            });
        }
        self.depth += 1;
        let result = self.expr_kind(expr);
        self.depth -= 1;
        result
    }

    fn expr_kind(&mut self, expr: &Expr) -> CompileResult<()> {
        match &expr.kind {
            ExprKind::Literal(value) => self.literal(value.clone())?,

            ExprKind::Name(name) => match self.locals.get(name) {
                Some(slot) => self.block.emit(Op::LoadLocal(*slot)),
                None => {
                    let idx = self.name(name)?;
                    self.block.emit(Op::LoadHost(idx));
                }
            },

            ExprKind::Extend(name) => {
                let idx = self.name(name)?;
                self.block.emit(Op::LoadExtend(idx));
            }

            ExprKind::Call { name, args } => {
                let argc = u8::try_from(args.len()).map_err(|_| CompileError::TooLarge {
                    what: "argument list",
                    size: args.len(),
                    limit: u8::MAX as usize,
                })?;
                let target = self.resolve_call(name, args.len())?;
                for arg in args {
                    self.expr(arg)?;
                }
                match target {
                    Some(object) => self.block.emit(Op::Call { object, argc }),
                    None => {
                        let idx = self.name(name)?;
                        self.block.emit(Op::CallHost { name: idx, argc });
                    }
                }
            }

            ExprKind::Unary { op, operand } => {
                self.expr(operand)?;
                self.block.emit(match op {
                    UnaryOp::Neg => Op::Neg,
                    UnaryOp::Not => Op::Not,
                });
            }

            ExprKind::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                self.expr(left)?;
                self.block.emit(Op::Dup);
                let short = self.emit_jump(Op::JumpIfFalse(0));
                self.block.emit(Op::Pop);
                self.expr(right)?;
                self.patch_here(short)?;
            }

            ExprKind::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => {
                self.expr(left)?;
                self.block.emit(Op::Dup);
                let rhs = self.emit_jump(Op::JumpIfFalse(0));
                let short = self.emit_jump(Op::Jump(0));
                self.patch_here(rhs)?;
                self.block.emit(Op::Pop);
                self.expr(right)?;
                self.patch_here(short)?;
            }

            ExprKind::Binary { op, left, right } => {
                let code = strict_binary_op(*op).ok_or_else(|| {
                    CompileError::syntax(expr.pos.line, expr.pos.column, "unsupported operator")
                })?;
                self.expr(left)?;
                self.expr(right)?;
                self.block.emit(code);
            }
        }
        Ok(())
    }

    /// Bind a call to a compiled function, or `None` for a host builtin.
    fn resolve_call(&self, name: &str, argc: usize) -> CompileResult<Option<ObjectId>> {
        let bound = self
            .scope
            .contract
            .and_then(|functions| functions.get(name).copied())
            .or_else(|| self.scope.unit.get(name).copied())
            .or_else(|| {
                self.scope.tree.top_level_function(name).and_then(|object| {
                    object.as_function().map(|info| Signature {
                        id: object.id,
                        arity: info.block.arity(),
                    })
                })
            });

        match bound {
            Some(signature) if signature.arity != argc => Err(CompileError::ArgumentCount {
                name: name.to_string(),
                expected: signature.arity,
                found: argc,
            }),
            Some(signature) => Ok(Some(signature.id)),
            None => Ok(None),
        }
    }
}

/// Instruction for an operator that evaluates both operands.
fn strict_binary_op(op: BinaryOp) -> Option<Op> {
    Some(match op {
        BinaryOp::Add => Op::Add,
        BinaryOp::Sub => Op::Sub,
        BinaryOp::Mul => Op::Mul,
        BinaryOp::Div => Op::Div,
        BinaryOp::Rem => Op::Rem,
        BinaryOp::Eq => Op::Eq,
        BinaryOp::Ne => Op::Ne,
        BinaryOp::Lt => Op::Lt,
        BinaryOp::Le => Op::Le,
        BinaryOp::Gt => Op::Gt,
        BinaryOp::Ge => Op::Ge,
        BinaryOp::And | BinaryOp::Or => return None,
    })
}
