//! The dispatch loop: fetch, decode, execute, repeat, against a growable
//! call stack of [`Frame`]s backed by one [`Arena`].
//!
//! Arithmetic wraps on overflow for `iadd`/`isub`/`imul`, truncates for
//! `idiv`, and immediate pushes (`sipush`/`bipush`) are zero-extended. The
//! call stack has no parent pointer between frames; `Vec<Frame>` push/pop
//! order already encodes that relation (see `frame.rs`).

use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::Instant;

use crate::arena::Arena;
use crate::constant::Constant;
use crate::error::EngineError;
use crate::frame::Frame;
use crate::module::Module;
use crate::opcode::OpCode;
use crate::symbol::{
    FunctionSymbol, BUILTIN_INTEGER_TO_STRING_INDEX, BUILTIN_PRINTLN_INDEX, BUILTIN_TICK_INDEX,
};

/// Run a loaded module to completion, starting at `main`, with `println`
/// writing to the process's standard output.
pub fn run(module: &Module) -> Result<(), EngineError> {
    run_with_output(module, &mut io::stdout())
}

/// Same as [`run`], but `println` writes to `out` instead of stdout — the
/// hook tests use to assert on a program's printed output.
pub fn run_with_output<W: Write>(module: &Module, out: &mut W) -> Result<(), EngineError> {
    let mut arena = Arena::new();
    let mut stack: Vec<Frame> = Vec::new();
    stack.push(Frame::create(&mut arena, module.main())?);

    loop {
        let ip = stack.last().expect("call stack is never empty mid-dispatch").ip();
        let bytecode = stack.last().unwrap().bytecode();

        if ip >= bytecode.len() {
            // A function body that falls off its own end without an
            // explicit return/ireturn. Treated the same as an explicit
            // `return` with no value.
            pop_frame(&mut arena, &mut stack);
            if stack.is_empty() {
                return Ok(());
            }
            continue;
        }

        let opcode_byte = bytecode[ip];
        let opcode = OpCode::from_byte(opcode_byte).ok_or(EngineError::UnknownOpcode(opcode_byte))?;
        let mut next_ip = ip + 1;

        match opcode {
            OpCode::IConst0 => push_top(&mut stack, &mut arena, 0),
            OpCode::IConst1 => push_top(&mut stack, &mut arena, 1),
            OpCode::IConst2 => push_top(&mut stack, &mut arena, 2),
            OpCode::IConst3 => push_top(&mut stack, &mut arena, 3),
            OpCode::IConst4 => push_top(&mut stack, &mut arena, 4),
            OpCode::IConst5 => push_top(&mut stack, &mut arena, 5),

            OpCode::BiPush => {
                let value = bytecode[next_ip] as i32;
                next_ip += 1;
                push_top(&mut stack, &mut arena, value);
            }
            OpCode::SiPush => {
                // Both bytes are zero-extended, not sign-extended.
                let hi = bytecode[next_ip] as i32;
                let lo = bytecode[next_ip + 1] as i32;
                next_ip += 2;
                push_top(&mut stack, &mut arena, (hi << 8) | lo);
            }
            OpCode::Ldc => {
                let index = bytecode[next_ip] as usize;
                next_ip += 1;
                let value = module
                    .constants
                    .get(index)
                    .and_then(Constant::as_number)
                    .expect("ldc always targets a number constant");
                push_top(&mut stack, &mut arena, value);
            }

            OpCode::ILoad => {
                let index = bytecode[next_ip] as usize;
                next_ip += 1;
                load_local(&mut stack, &mut arena, index);
            }
            OpCode::ILoad0 => load_local(&mut stack, &mut arena, 0),
            OpCode::ILoad1 => load_local(&mut stack, &mut arena, 1),
            OpCode::ILoad2 => load_local(&mut stack, &mut arena, 2),
            OpCode::ILoad3 => load_local(&mut stack, &mut arena, 3),

            OpCode::IStore => {
                let index = bytecode[next_ip] as usize;
                next_ip += 1;
                store_local(&mut stack, &mut arena, index);
            }
            OpCode::IStore0 => store_local(&mut stack, &mut arena, 0),
            OpCode::IStore1 => store_local(&mut stack, &mut arena, 1),
            OpCode::IStore2 => store_local(&mut stack, &mut arena, 2),
            OpCode::IStore3 => store_local(&mut stack, &mut arena, 3),

            OpCode::IAdd => binary_op(&mut stack, &mut arena, i32::wrapping_add),
            OpCode::ISub => binary_op(&mut stack, &mut arena, i32::wrapping_sub),
            OpCode::IMul => binary_op(&mut stack, &mut arena, i32::wrapping_mul),
            OpCode::IDiv => binary_op(&mut stack, &mut arena, |a, b| a / b),

            OpCode::IInc => {
                let index = bytecode[next_ip] as usize;
                let delta = bytecode[next_ip + 1] as i8 as i32;
                next_ip += 2;
                let frame = stack.last_mut().unwrap();
                let v = frame.get_local(&arena, index);
                frame.set_local(&mut arena, index, v + delta);
            }

            OpCode::IfEq => {
                let target = read_u16(bytecode, next_ip);
                next_ip += 2;
                let v = stack.last_mut().unwrap().pop(&arena);
                if v == 0 {
                    next_ip = target;
                }
            }
            OpCode::IfNe => {
                let target = read_u16(bytecode, next_ip);
                next_ip += 2;
                let v = stack.last_mut().unwrap().pop(&arena);
                if v != 0 {
                    next_ip = target;
                }
            }
            OpCode::IfICmpLt => next_ip = compare_jump(&mut stack, &mut arena, bytecode, next_ip, |a, b| a < b),
            OpCode::IfICmpGe => next_ip = compare_jump(&mut stack, &mut arena, bytecode, next_ip, |a, b| a >= b),
            OpCode::IfICmpGt => next_ip = compare_jump(&mut stack, &mut arena, bytecode, next_ip, |a, b| a > b),
            OpCode::IfICmpLe => next_ip = compare_jump(&mut stack, &mut arena, bytecode, next_ip, |a, b| a <= b),

            OpCode::Goto => {
                next_ip = read_u16(bytecode, next_ip);
            }

            OpCode::IReturn => {
                let value = stack.last_mut().unwrap().pop(&arena);
                pop_frame(&mut arena, &mut stack);
                if stack.is_empty() {
                    return Ok(());
                }
                push_top(&mut stack, &mut arena, value);
                continue;
            }
            OpCode::Return => {
                pop_frame(&mut arena, &mut stack);
                if stack.is_empty() {
                    return Ok(());
                }
                continue;
            }

            OpCode::InvokeStatic => {
                let const_index = read_u16(bytecode, next_ip);
                next_ip += 2;
                stack.last_mut().unwrap().set_ip(next_ip);
                invoke(module, &mut arena, &mut stack, const_index, out)?;
                continue;
            }
        }

        stack.last_mut().unwrap().set_ip(next_ip);
    }
}

fn push_top(stack: &mut [Frame], arena: &mut Arena, value: i32) {
    stack.last_mut().unwrap().push(arena, value);
}

fn load_local(stack: &mut [Frame], arena: &mut Arena, index: usize) {
    let frame = stack.last_mut().unwrap();
    let v = frame.get_local(arena, index);
    frame.push(arena, v);
}

fn binary_op(stack: &mut [Frame], arena: &mut Arena, op: impl Fn(i32, i32) -> i32) {
    let frame = stack.last_mut().unwrap();
    let b = frame.pop(arena);
    let a = frame.pop(arena);
    frame.push(arena, op(a, b));
}

fn compare_jump(
    stack: &mut [Frame],
    arena: &mut Arena,
    bytecode: &[u8],
    pos: usize,
    cmp: impl Fn(i32, i32) -> bool,
) -> usize {
    let target = read_u16(bytecode, pos);
    let frame = stack.last_mut().unwrap();
    let b = frame.pop(arena);
    let a = frame.pop(arena);
    if cmp(a, b) {
        target
    } else {
        pos + 2
    }
}

fn store_local(stack: &mut [Frame], arena: &mut Arena, index: usize) {
    let frame = stack.last_mut().unwrap();
    let v = frame.pop(arena);
    frame.set_local(arena, index, v);
}

fn pop_frame(arena: &mut Arena, stack: &mut Vec<Frame>) {
    let frame = stack.pop().expect("pop_frame called with an empty call stack");
    frame.destroy(arena);
}

fn read_u16(bytecode: &[u8], pos: usize) -> usize {
    ((bytecode[pos] as usize) << 8) | bytecode[pos + 1] as usize
}

/// Moment the engine first ran `tick`, lazily pinned on first use. `tick`
/// reports milliseconds elapsed since this moment rather than since the
/// Unix epoch, so the returned value stays small and never needs truncating
/// through a 32-bit cast.
fn process_start() -> Instant {
    static START: OnceLock<Instant> = OnceLock::new();
    *START.get_or_init(Instant::now)
}

/// Dispatch an `invokestatic` to pool index `const_index`: either run a
/// built-in directly against the caller's operand stack, or allocate a new
/// frame, move its arguments into locals, and push it.
fn invoke<'m, W: Write>(
    module: &'m Module,
    arena: &mut Arena,
    stack: &mut Vec<Frame<'m>>,
    const_index: usize,
    out: &mut W,
) -> Result<(), EngineError> {
    let function = module
        .constants
        .get(const_index)
        .and_then(Constant::as_function)
        .ok_or_else(|| EngineError::MissingFunctionBody(format!("const #{const_index}")))?;

    if function.is_builtin() {
        return run_builtin(function, const_index, arena, stack, out);
    }

    let num_params = module.types[function.function_type].num_params();
    let mut args = vec![0i32; num_params];
    {
        let caller = stack.last_mut().expect("invokestatic always has a caller frame");
        for slot in args.iter_mut().rev() {
            *slot = caller.pop(arena);
        }
    }

    let mut callee = Frame::create(arena, function)?;
    for (i, value) in args.into_iter().enumerate() {
        callee.set_local(arena, i, value);
    }
    stack.push(callee);
    Ok(())
}

/// Execute one of the three fixed-index system built-ins directly against
/// the calling frame's operand stack — no frame is created.
fn run_builtin<W: Write>(
    function: &FunctionSymbol,
    const_index: usize,
    arena: &mut Arena,
    stack: &mut [Frame],
    out: &mut W,
) -> Result<(), EngineError> {
    let caller = stack.last_mut().expect("invokestatic always has a caller frame");
    match const_index {
        BUILTIN_PRINTLN_INDEX => {
            let value = caller.pop(arena);
            let _ = writeln!(out, "{value}");
            Ok(())
        }
        BUILTIN_TICK_INDEX => {
            caller.push(arena, process_start().elapsed().as_millis() as i32);
            Ok(())
        }
        BUILTIN_INTEGER_TO_STRING_INDEX => {
            // Present in the constant pool at a fixed index but never
            // invoked by the canonical call sequences; consume its one
            // argument and produce no string result.
            let _ = caller.pop(arena);
            Ok(())
        }
        _ => Err(EngineError::MissingFunctionBody(function.name.clone())),
    }
}
