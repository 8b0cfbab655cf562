//! Execution tests: generate modules and run them via wasmi.
//!
//! Covers what structural inspection cannot: stubs really forward to the
//! host, calls through the table reach the right function, and the layout
//! globals and static data are visible at runtime.

use std::path::Path;
use std::rc::Rc;

use ascl_codegen::lower::lower_const;
use ascl_codegen::{generate, Flags, GenOutput, Ir, IrAbi, IrFn, IrOp, IrSgmt, TypeKind};
use ascl_types::ast::{Expr, Value};
use ascl_types::meta::Meta;
use ascl_types::{CompileErrors, SrcPos};
use wasm_encoder::Instruction;
use wasmi::{Engine, Linker, Module, Store};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn gen_bytes(ir: &Ir) -> Vec<u8> {
    let flags = Flags {
        test: true,
        ..Flags::default()
    };
    match generate(ir, &flags, Path::new("exec.src"), &CompileErrors::empty()) {
        Ok(GenOutput::TestOnly { bytes }) => bytes,
        other => panic!("unexpected generate result: {other:?}"),
    }
}

/// Host state: every value passed to `env.emit`.
#[derive(Default)]
struct HostState {
    emitted: Vec<i64>,
}

fn instantiate(wasm: &[u8]) -> (Store<HostState>, wasmi::Instance) {
    let engine = Engine::default();
    let module = Module::new(&engine, wasm).expect("failed to parse wasm module");
    let mut store = Store::new(&engine, HostState::default());
    let mut linker = <Linker<HostState>>::new(&engine);

    linker
        .func_wrap(
            "env",
            "emit",
            |mut caller: wasmi::Caller<'_, HostState>, v: i64| {
                caller.data_mut().emitted.push(v);
            },
        )
        .unwrap();
    linker
        .func_wrap(
            "env",
            "block_no",
            |_: wasmi::Caller<'_, HostState>| -> i64 { 4_242 },
        )
        .unwrap();

    let instance = linker
        .instantiate(&mut store, &module)
        .expect("failed to instantiate")
        .start(&mut store)
        .expect("failed to start instance");
    (store, instance)
}

fn wasm(instr: Instruction<'static>) -> IrOp {
    IrOp::Wasm(instr)
}

// ══════════════════════════════════════════════════════════════════════════════
// Tests
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn exported_function_runs() {
    let mut ir = Ir::new();
    ir.fns.push(
        IrFn::new("add", vec![TypeKind::Int32, TypeKind::Int32], TypeKind::Int32)
            .exported()
            .with_body(vec![
                wasm(Instruction::LocalGet(0)),
                wasm(Instruction::LocalGet(1)),
                wasm(Instruction::I32Add),
            ]),
    );

    let (mut store, instance) = instantiate(&gen_bytes(&ir));
    let add = instance
        .get_typed_func::<(i32, i32), i32>(&store, "add")
        .unwrap();
    assert_eq!(add.call(&mut store, (2, 40)).unwrap(), 42);
}

#[test]
fn declared_locals_follow_params() {
    // square(x: int64) { var t: int64; t = x * x; return t }
    let mut ir = Ir::new();
    ir.fns.push(
        IrFn::new("square", vec![TypeKind::Int64], TypeKind::Int64)
            .exported()
            .with_body(vec![
                IrOp::Local(TypeKind::Int64),
                IrOp::Nop,
                wasm(Instruction::LocalGet(0)),
                wasm(Instruction::LocalGet(0)),
                wasm(Instruction::I64Mul),
                wasm(Instruction::LocalSet(1)),
                wasm(Instruction::LocalGet(1)),
            ]),
    );

    let (mut store, instance) = instantiate(&gen_bytes(&ir));
    let square = instance
        .get_typed_func::<i64, i64>(&store, "square")
        .unwrap();
    assert_eq!(square.call(&mut store, 3_000_000_000).unwrap(), 9_000_000_000_000_000_000);
}

#[test]
fn stubs_forward_to_host() {
    let mut ir = Ir::new();
    ir.abis.push(IrAbi::new("emit", "env", "emit", vec![TypeKind::Uint64], TypeKind::Void));
    ir.abis.push(IrAbi::new("block", "env", "block_no", vec![], TypeKind::Int64));
    ir.fns.push(
        IrFn::new("notify", vec![], TypeKind::Void)
            .exported()
            .with_body(vec![
                IrOp::Call("block".into()),
                wasm(Instruction::I64Const(1)),
                wasm(Instruction::I64Add),
                IrOp::Call("emit".into()),
            ]),
    );

    let (mut store, instance) = instantiate(&gen_bytes(&ir));
    let notify = instance.get_typed_func::<(), ()>(&store, "notify").unwrap();
    notify.call(&mut store, ()).unwrap();
    notify.call(&mut store, ()).unwrap();
    assert_eq!(store.data().emitted, vec![4_243, 4_243]);
}

#[test]
fn indirect_calls_go_through_table() {
    let mut ir = Ir::new();
    ir.fns.push(
        IrFn::new("double", vec![TypeKind::Int32], TypeKind::Int32).with_body(vec![
            wasm(Instruction::LocalGet(0)),
            wasm(Instruction::LocalGet(0)),
            wasm(Instruction::I32Add),
        ]),
    );
    ir.fns.push(
        IrFn::new("negate", vec![TypeKind::Int32], TypeKind::Int32).with_body(vec![
            wasm(Instruction::I32Const(0)),
            wasm(Instruction::LocalGet(0)),
            wasm(Instruction::I32Sub),
        ]),
    );
    // apply(f, x) = f(x)
    ir.fns.push(
        IrFn::new("apply", vec![TypeKind::Int32, TypeKind::Int32], TypeKind::Int32)
            .exported()
            .with_body(vec![
                wasm(Instruction::LocalGet(1)),
                wasm(Instruction::LocalGet(0)),
                IrOp::CallIndirect {
                    params: vec![TypeKind::Int32],
                    result: TypeKind::Int32,
                },
            ]),
    );
    ir.fns.push(
        IrFn::new("run", vec![], TypeKind::Int32)
            .exported()
            .with_body(vec![
                wasm(Instruction::I32Const(21)),
                IrOp::FnRef("double".into()),
                IrOp::CallIndirect {
                    params: vec![TypeKind::Int32],
                    result: TypeKind::Int32,
                },
            ]),
    );

    let (mut store, instance) = instantiate(&gen_bytes(&ir));
    let apply = instance
        .get_typed_func::<(i32, i32), i32>(&store, "apply")
        .unwrap();
    assert_eq!(apply.call(&mut store, (0, 5)).unwrap(), 10);
    assert_eq!(apply.call(&mut store, (1, 5)).unwrap(), -5);
    // out of bounds slot traps
    assert!(apply.call(&mut store, (4, 5)).is_err());

    let run = instance.get_typed_func::<(), i32>(&store, "run").unwrap();
    assert_eq!(run.call(&mut store, ()).unwrap(), 42);
}

#[test]
fn layout_globals_are_readable_and_mutable() {
    let mut ir = Ir::new();
    ir.fns.push(
        IrFn::new("heap", vec![], TypeKind::Int32)
            .exported()
            .with_body(vec![IrOp::GlobalGet("heap$offset".into())]),
    );
    ir.fns.push(
        IrFn::new("bump", vec![TypeKind::Int32], TypeKind::Int32)
            .exported()
            .with_body(vec![
                IrOp::GlobalGet("stack$offset".into()),
                wasm(Instruction::LocalGet(0)),
                wasm(Instruction::I32Sub),
                IrOp::GlobalSet("stack$offset".into()),
                IrOp::GlobalGet("stack$offset".into()),
            ]),
    );

    let (mut store, instance) = instantiate(&gen_bytes(&ir));
    let heap = instance.get_typed_func::<(), i32>(&store, "heap").unwrap();
    assert_eq!(heap.call(&mut store, ()).unwrap(), 65_536);
    let bump = instance.get_typed_func::<i32, i32>(&store, "bump").unwrap();
    assert_eq!(bump.call(&mut store, 35).unwrap(), 65_500);
    assert_eq!(bump.call(&mut store, 500).unwrap(), 65_000);
}

#[test]
fn string_constants_are_in_memory() {
    let mut sgmt = IrSgmt::starting_at(65_536);
    let lit = Expr::lit(Value::Str("aergo".into()), SrcPos::default())
        .with_meta(Rc::new(Meta::new(TypeKind::String)));
    let addr_instr = lower_const(&lit, &mut sgmt).unwrap().expect("address constant");

    let mut ir = Ir::new();
    ir.sgmt = sgmt;
    ir.fns.push(
        IrFn::new("name", vec![], TypeKind::String)
            .exported()
            .with_body(vec![IrOp::Wasm(addr_instr)]),
    );

    let (mut store, instance) = instantiate(&gen_bytes(&ir));
    let name = instance.get_typed_func::<(), i32>(&store, "name").unwrap();
    let addr = name.call(&mut store, ()).unwrap();
    assert_eq!(addr, 65_536);

    let memory = instance.get_memory(&store, "memory").unwrap();
    let mut buf = [0u8; 6];
    memory.read(&store, addr as usize, &mut buf).unwrap();
    assert_eq!(&buf, b"aergo\0");
}
