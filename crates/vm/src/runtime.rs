//! Bytecode executor
//!
//! Stack-based interpreter for [`CompiledBlock`]s.
//!
//! A [`Runtime`] captures the object tree and builtin snapshots current at
//! its creation and never observes later installs. It is owned by a single
//! caller; concurrent executions each use their own runtime over shared
//! immutable snapshots.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

use crate::bytecode::{CompiledBlock, Op};
use crate::error::{RuntimeError, RuntimeResult};
use crate::extend::{Builtin, Builtins, HostContext};
use crate::tree::{CompiledRoot, Object, ObjectId, ObjectTree};
use crate::value::{ExtendMap, Value};
use crate::vm::VmLimits;

struct Frame {
    block: Arc<CompiledBlock>,
    ip: usize,
    locals: Vec<Value>,
    base: usize,
}

impl Frame {
    fn enter(block: Arc<CompiledBlock>, args: Vec<Value>, base: usize) -> RuntimeResult<Self> {
        if args.len() != block.params.len() {
            return Err(RuntimeError::ArgumentCount {
                name: block.name.clone(),
                expected: block.params.len().to_string(),
                found: args.len(),
            });
        }
        for (param, arg) in block.params.iter().zip(&args) {
            if !param.ty.accepts(arg) {
                return Err(RuntimeError::TypeMismatch {
                    op: format!("argument {} of {}", param.name, block.name),
                    expected: param.ty.name().to_string(),
                    found: arg.type_name().to_string(),
                });
            }
        }

        let mut locals = args;
        locals.resize(usize::from(block.local_count).max(locals.len()), Value::Nil);
        Ok(Self {
            block,
            ip: 0,
            locals,
            base,
        })
    }
}

/// Execution context for one caller.
pub struct Runtime {
    tree: Arc<ObjectTree>,
    builtins: Arc<Builtins>,
    attached: HashMap<ObjectId, Arc<Object>>,
    limits: VmLimits,
    last_steps: u64,
}

impl Runtime {
    pub(crate) fn new(tree: Arc<ObjectTree>, builtins: Arc<Builtins>, limits: VmLimits) -> Self {
        Self {
            tree,
            builtins,
            attached: HashMap::new(),
            limits,
            last_steps: 0,
        }
    }

    /// Make the objects of an uninstalled root callable from this runtime.
    ///
    /// Attached objects take precedence over tree objects with the same id.
    pub fn attach(&mut self, root: &CompiledRoot) {
        for object in root.objects() {
            self.attached.insert(object.id, Arc::clone(object));
        }
    }

    /// The tree snapshot this runtime executes against.
    pub fn tree(&self) -> &Arc<ObjectTree> {
        &self.tree
    }

    /// Limits applied to every run.
    pub fn limits(&self) -> &VmLimits {
        &self.limits
    }

    /// Instructions executed by the most recent run.
    pub fn steps(&self) -> u64 {
        self.last_steps
    }

    /// Resolve an object id against attached roots, then the tree.
    pub fn object(&self, id: ObjectId) -> Option<&Arc<Object>> {
        self.attached.get(&id).or_else(|| self.tree.get(id))
    }

    /// Execute `body` with `params`, reading and writing `extend`.
    ///
    /// Returns the function's result, or nothing if it declares none.
    pub fn run(
        &mut self,
        body: &Arc<CompiledBlock>,
        params: Vec<Value>,
        extend: &mut ExtendMap,
    ) -> RuntimeResult<Vec<Value>> {
        let contract = body
            .owner
            .and_then(|id| self.object(id))
            .filter(|o| o.as_contract().is_some())
            .cloned();
        self.run_in(body, params, extend, contract.as_deref())
    }

    /// Execute `body` on behalf of `contract`.
    pub(crate) fn run_in(
        &mut self,
        body: &Arc<CompiledBlock>,
        params: Vec<Value>,
        extend: &mut ExtendMap,
        contract: Option<&Object>,
    ) -> RuntimeResult<Vec<Value>> {
        let mut steps = 0;
        let result = self.execute(body, params, extend, contract, &mut steps);
        self.last_steps = steps;
        result
    }

    fn execute(
        &self,
        body: &Arc<CompiledBlock>,
        params: Vec<Value>,
        extend: &mut ExtendMap,
        contract: Option<&Object>,
        steps: &mut u64,
    ) -> RuntimeResult<Vec<Value>> {
        let mut stack: Vec<Value> = Vec::with_capacity(32);
        let mut frames = vec![Frame::enter(Arc::clone(body), params, 0)?];

        loop {
            let frame = frames
                .last_mut()
                .ok_or(RuntimeError::Malformed("no active frame"))?;
            let op = *frame
                .block
                .ops
                .get(frame.ip)
                .ok_or(RuntimeError::Malformed("execution ran past end of function"))?;
            frame.ip += 1;

            *steps += 1;
            if *steps > self.limits.max_steps {
                return Err(RuntimeError::StepLimitExceeded(self.limits.max_steps));
            }

            match op {
                Op::Literal(idx) => {
                    let value = frame
                        .block
                        .literals
                        .get(usize::from(idx))
                        .cloned()
                        .ok_or(RuntimeError::Malformed("literal index out of range"))?;
                    stack.push(value);
                }

                Op::LoadLocal(slot) => {
                    let value = frame
                        .locals
                        .get(usize::from(slot))
                        .cloned()
                        .ok_or(RuntimeError::Malformed("local slot out of range"))?;
                    stack.push(value);
                }

                Op::StoreLocal(slot) => {
                    let value = pop(&mut stack)?;
                    let local = frame
                        .locals
                        .get_mut(usize::from(slot))
                        .ok_or(RuntimeError::Malformed("local slot out of range"))?;
                    *local = value;
                }

                Op::LoadExtend(idx) => {
                    let key = name_at(&frame.block, idx)?;
                    stack.push(extend.get(key).cloned().unwrap_or_default());
                }

                Op::StoreExtend(idx) => {
                    let value = pop(&mut stack)?;
                    let key = name_at(&frame.block, idx)?;
                    extend.insert(key.to_string(), value);
                }

                Op::LoadHost(idx) => {
                    let name = name_at(&frame.block, idx)?;
                    match self.builtins.get(name) {
                        Some(Builtin::Value(value)) => stack.push(value.clone()),
                        Some(_) => {
                            return Err(RuntimeError::TypeMismatch {
                                op: format!("read of {}", name),
                                expected: "value".to_string(),
                                found: "function".to_string(),
                            })
                        }
                        None => return Err(RuntimeError::UnresolvedName(name.to_string())),
                    }
                }

                Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Rem => {
                    let b = pop(&mut stack)?;
                    let a = pop(&mut stack)?;
                    stack.push(arithmetic(op, a, b)?);
                }

                Op::Lt | Op::Le | Op::Gt | Op::Ge => {
                    let b = pop(&mut stack)?;
                    let a = pop(&mut stack)?;
                    stack.push(Value::Bool(compare(op, &a, &b)?));
                }

                Op::Eq => {
                    let b = pop(&mut stack)?;
                    let a = pop(&mut stack)?;
                    stack.push(Value::Bool(a == b));
                }

                Op::Ne => {
                    let b = pop(&mut stack)?;
                    let a = pop(&mut stack)?;
                    stack.push(Value::Bool(a != b));
                }

                Op::Neg => match pop(&mut stack)? {
                    Value::Int(v) => {
                        stack.push(Value::Int(v.checked_neg().ok_or(RuntimeError::Overflow("-"))?))
                    }
                    other => return Err(mismatch("-", "int", &other)),
                },

                Op::Not => match pop(&mut stack)? {
                    Value::Bool(b) => stack.push(Value::Bool(!b)),
                    other => return Err(mismatch("!", "bool", &other)),
                },

                Op::Jump(target) => frame.ip = target as usize,

                Op::JumpIfFalse(target) => match pop(&mut stack)? {
                    Value::Bool(false) => frame.ip = target as usize,
                    Value::Bool(true) => {}
                    other => return Err(mismatch("condition", "bool", &other)),
                },

                Op::Call { object, argc } => {
                    let args = pop_args(&mut stack, argc)?;
                    let callee = self
                        .object(object)
                        .ok_or_else(|| RuntimeError::UnresolvedName(format!("object #{}", object)))?;
                    let info = callee.as_function().ok_or_else(|| RuntimeError::TypeMismatch {
                        op: format!("call of {}", callee.name),
                        expected: "function".to_string(),
                        found: callee.kind.name().to_string(),
                    })?;

                    if frames.len() >= self.limits.max_call_depth {
                        return Err(RuntimeError::CallDepthExceeded(self.limits.max_call_depth));
                    }
                    trace!(function = %info.block.name, depth = frames.len(), "call");
                    frames.push(Frame::enter(Arc::clone(&info.block), args, stack.len())?);
                }

                Op::CallHost { name, argc } => {
                    let name = name_at(&frame.block, name)?;
                    let args = pop_args(&mut stack, argc)?;
                    let result = self.call_host(name, &args, extend, contract)?;
                    stack.push(result);
                }

                Op::Return => {
                    let value = pop(&mut stack)?;
                    let finished = frames
                        .pop()
                        .ok_or(RuntimeError::Malformed("return without frame"))?;
                    stack.truncate(finished.base);

                    if let Some(ty) = finished.block.result {
                        if !ty.accepts(&value) {
                            return Err(RuntimeError::TypeMismatch {
                                op: format!("return from {}", finished.block.name),
                                expected: ty.name().to_string(),
                                found: value.type_name().to_string(),
                            });
                        }
                    }

                    if frames.is_empty() {
                        return Ok(match finished.block.result {
                            Some(_) => vec![value],
                            None => Vec::new(),
                        });
                    }
                    stack.push(value);
                }

                Op::Raise => {
                    let value = pop(&mut stack)?;
                    return Err(RuntimeError::Raised(value.to_string()));
                }

                Op::Dup => {
                    let top = stack
                        .last()
                        .cloned()
                        .ok_or(RuntimeError::Malformed("stack underflow"))?;
                    stack.push(top);
                }

                Op::Pop => {
                    pop(&mut stack)?;
                }
            }
        }
    }

    fn call_host(
        &self,
        name: &str,
        args: &[Value],
        extend: &mut ExtendMap,
        contract: Option<&Object>,
    ) -> RuntimeResult<Value> {
        let check = |arity: &crate::extend::Arity| {
            if arity.accepts(args.len()) {
                Ok(())
            } else {
                Err(RuntimeError::ArgumentCount {
                    name: name.to_string(),
                    expected: arity.to_string(),
                    found: args.len(),
                })
            }
        };

        let host_error = |source| RuntimeError::Host {
            name: name.to_string(),
            source,
        };

        match self.builtins.get(name) {
            Some(Builtin::Function { arity, func }) => {
                check(arity)?;
                func(args).map_err(host_error)
            }
            Some(Builtin::Contextual { arity, func }) => {
                check(arity)?;
                let mut ctx = HostContext { extend, contract };
                func(&mut ctx, args).map_err(host_error)
            }
            Some(Builtin::Value(_)) => Err(RuntimeError::TypeMismatch {
                op: format!("call of {}", name),
                expected: "function".to_string(),
                found: "value".to_string(),
            }),
            None => Err(RuntimeError::UnresolvedName(name.to_string())),
        }
    }
}

fn pop(stack: &mut Vec<Value>) -> RuntimeResult<Value> {
    stack.pop().ok_or(RuntimeError::Malformed("stack underflow"))
}

fn pop_args(stack: &mut Vec<Value>, argc: u8) -> RuntimeResult<Vec<Value>> {
    let argc = usize::from(argc);
    if stack.len() < argc {
        return Err(RuntimeError::Malformed("stack underflow"));
    }
    Ok(stack.split_off(stack.len() - argc))
}

fn name_at(block: &CompiledBlock, idx: u16) -> RuntimeResult<&str> {
    block
        .names
        .get(usize::from(idx))
        .map(String::as_str)
        .ok_or(RuntimeError::Malformed("name index out of range"))
}

fn mismatch(op: &str, expected: &str, found: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        op: op.to_string(),
        expected: expected.to_string(),
        found: found.type_name().to_string(),
    }
}

fn symbol(op: Op) -> &'static str {
    match op {
        Op::Add => "+",
        Op::Sub => "-",
        Op::Mul => "*",
        Op::Div => "/",
        Op::Rem => "%",
        Op::Lt => "<",
        Op::Le => "<=",
        Op::Gt => ">",
        Op::Ge => ">=",
        _ => "operator",
    }
}

fn arithmetic(op: Op, a: Value, b: Value) -> RuntimeResult<Value> {
    let sym = symbol(op);
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => {
            let result = match op {
                Op::Add => x.checked_add(y),
                Op::Sub => x.checked_sub(y),
                Op::Mul => x.checked_mul(y),
                Op::Div | Op::Rem if y == 0 => return Err(RuntimeError::DivisionByZero),
                Op::Div => x.checked_div(y),
                Op::Rem => x.checked_rem(y),
                _ => return Err(RuntimeError::Malformed("not an arithmetic instruction")),
            };
            result.map(Value::Int).ok_or(RuntimeError::Overflow(sym))
        }
        (Value::Str(mut x), Value::Str(y)) if op == Op::Add => {
            x.push_str(&y);
            Ok(Value::Str(x))
        }
        (Value::Bytes(mut x), Value::Bytes(y)) if op == Op::Add => {
            x.extend_from_slice(&y);
            Ok(Value::Bytes(x))
        }
        (Value::Int(_), other) => Err(mismatch(sym, "int", &other)),
        (Value::Str(_), other) if op == Op::Add => Err(mismatch(sym, "string", &other)),
        (Value::Bytes(_), other) if op == Op::Add => Err(mismatch(sym, "bytes", &other)),
        (other, _) => Err(mismatch(sym, "int", &other)),
    }
}

fn compare(op: Op, a: &Value, b: &Value) -> RuntimeResult<bool> {
    let ordering = match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        (Value::Int(_), other) => return Err(mismatch(symbol(op), "int", other)),
        (Value::Str(_), other) => return Err(mismatch(symbol(op), "string", other)),
        (other, _) => return Err(mismatch(symbol(op), "int or string", other)),
    };
    Ok(match op {
        Op::Lt => ordering.is_lt(),
        Op::Le => ordering.is_le(),
        Op::Gt => ordering.is_gt(),
        Op::Ge => ordering.is_ge(),
        _ => return Err(RuntimeError::Malformed("not a comparison instruction")),
    })
}
