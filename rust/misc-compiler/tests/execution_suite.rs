//! End-to-end tests: generate code for typed trees and run it on the emulator.

use misc_compiler::compiler::builder::TreeBuilder;
use misc_compiler::compiler::code::Assembly;
use misc_compiler::compiler::runtime::NULL_LIST_EXIT;
use misc_compiler::compiler::tree::{Expr, Program, Stmt};
use misc_compiler::compiler::types::Type;
use misc_compiler::generate;
use misc_vm::{Exit, Machine, MachineConfig};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn build(b: &TreeBuilder, program: &Program) -> Assembly {
    init_tracing();
    generate(program, b.symbols()).expect("generation failed")
}

fn execute_with(asm: &Assembly, input: &str, config: MachineConfig) -> (Exit, String) {
    let mut machine = Machine::new(config);
    machine.push_input(input);
    machine.load(&asm.instructions);
    let exit = machine.run().unwrap_or_else(|e| panic!("machine fault: {}\n{}", e, asm.listing()));
    (exit, machine.take_output())
}

fn execute(asm: &Assembly, input: &str) -> (Exit, String) {
    execute_with(asm, input, MachineConfig::default())
}

/// `printInt(e)` as a statement.
fn print(b: &TreeBuilder, e: Expr) -> Stmt {
    b.exec(b.call(b.predef("printInt"), vec![e]))
}

/// `printChar(' ')` as a statement.
fn space(b: &TreeBuilder) -> Stmt {
    b.exec(b.call(b.predef("printChar"), vec![b.int(' ' as i32)]))
}

// ============================================================================
// Functions and calls
// ============================================================================

#[test]
fn factorial_of_five() {
    let mut b = TreeBuilder::new();
    let sig = b.fun("fact", &[("n", Type::Int)], Type::Int);
    let (fact, n) = (sig.sym, sig.param(0));
    let recurse = b.call(b.ident(fact), vec![b.sub(b.ident(n), b.int(1))]);
    let body = b.if_(b.le(b.ident(n), b.int(1)), b.int(1), b.mul(b.ident(n), recurse));
    let decl = b.define(sig, body);
    let main = b.call(b.predef("printInt"), vec![b.call(b.ident(fact), vec![b.int(5)])]);
    let program = b.program(vec![decl], main);

    let (exit, out) = execute(&build(&b, &program), "");
    assert_eq!(exit.status, 0);
    assert_eq!(out, "120");
}

#[test]
fn arguments_arrive_in_declaration_order() {
    let mut b = TreeBuilder::new();
    let sig = b.fun("f", &[("a", Type::Int), ("b", Type::Int), ("c", Type::Int)], Type::Int);
    let f = sig.sym;
    // a * 100 + b * 10 + c
    let body = b.add(
        b.add(b.mul(b.ident(sig.param(0)), b.int(100)), b.mul(b.ident(sig.param(1)), b.int(10))),
        b.ident(sig.param(2)),
    );
    let decl = b.define(sig, body);
    let main = b.call(b.predef("printInt"), vec![b.call(b.ident(f), vec![b.int(1), b.int(2), b.int(3)])]);
    let program = b.program(vec![decl], main);

    assert_eq!(execute(&build(&b, &program), "").1, "123");
}

#[test]
fn live_registers_survive_a_hungry_call() {
    let mut b = TreeBuilder::new();
    let sig = b.fun("hungry", &[("x", Type::Int)], Type::Int);
    let (hungry, x) = (sig.sym, sig.param(0));
    // (x+1)*(x+2) + (x+3)*(x+4)
    let body = b.add(
        b.mul(b.add(b.ident(x), b.int(1)), b.add(b.ident(x), b.int(2))),
        b.mul(b.add(b.ident(x), b.int(3)), b.add(b.ident(x), b.int(4))),
    );
    let decl = b.define(sig, body);
    // 1 + (2 + (3 + hungry(4))): r1..r3 are live across the call
    let call = b.call(b.ident(hungry), vec![b.int(4)]);
    let sum = b.add(b.int(1), b.add(b.int(2), b.add(b.int(3), call)));
    let main = b.call(b.predef("printInt"), vec![sum]);
    let program = b.program(vec![decl], main);

    assert_eq!(execute(&build(&b, &program), "").1, "92");
}

#[test]
fn locals_inside_functions_and_blocks() {
    let mut b = TreeBuilder::new();
    let sig = b.fun("g", &[("p", Type::Int)], Type::Int);
    let (g, p) = (sig.sym, sig.param(0));
    let (t, t_decl) = b.var("t", b.mul(b.ident(p), b.int(2)));
    let (u, u_decl) = b.var("u", b.add(b.ident(t), b.int(1)));
    // p is still addressable after two locals were pushed
    let body = b.block(vec![t_decl, u_decl], b.add(b.ident(u), b.ident(p)));
    let decl = b.define(sig, body);
    let main = b.call(b.predef("printInt"), vec![b.call(b.ident(g), vec![b.int(10)])]);
    let program = b.program(vec![decl], main);

    assert_eq!(execute(&build(&b, &program), "").1, "31");
}

#[test]
fn forward_and_mutual_recursion() {
    let mut b = TreeBuilder::new();
    let even = b.fun("isEven", &[("n", Type::Int)], Type::Int);
    let odd = b.fun("isOdd", &[("m", Type::Int)], Type::Int);
    let (even_sym, odd_sym) = (even.sym, odd.sym);
    let (n, m) = (even.param(0), odd.param(0));

    let even_body = b.if_(
        b.eq(b.ident(n), b.int(0)),
        b.int(1),
        b.call(b.ident(odd_sym), vec![b.sub(b.ident(n), b.int(1))]),
    );
    let odd_body = b.if_(
        b.eq(b.ident(m), b.int(0)),
        b.int(0),
        b.call(b.ident(even_sym), vec![b.sub(b.ident(m), b.int(1))]),
    );
    let even_decl = b.define(even, even_body);
    let odd_decl = b.define(odd, odd_body);
    let main = b.block(
        vec![
            print(&b, b.call(b.ident(even_sym), vec![b.int(10)])),
            print(&b, b.call(b.ident(odd_sym), vec![b.int(7)])),
            print(&b, b.call(b.ident(even_sym), vec![b.int(7)])),
        ],
        b.unit(),
    );
    let program = b.program(vec![even_decl, odd_decl], main);

    assert_eq!(execute(&build(&b, &program), "").1, "110");
}

// ============================================================================
// Control flow
// ============================================================================

#[test]
fn if_runs_exactly_one_branch() {
    let b = TreeBuilder::new();
    let printer = |v: i32| b.call(b.predef("printInt"), vec![b.int(v)]);
    let main = b.block(
        vec![
            b.exec(b.if_(b.lt(b.int(1), b.int(2)), printer(1), printer(2))),
            b.exec(b.if_(b.gt(b.int(1), b.int(2)), printer(3), printer(4))),
            b.exec(b.if_(b.int(0), printer(5), printer(6))),
            b.exec(b.if_(b.int(-3), printer(7), printer(8))),
        ],
        b.unit(),
    );
    let program = b.program(vec![], main);
    assert_eq!(execute(&build(&b, &program), "").1, "1467");
}

#[test]
fn every_comparison_operator() {
    let b = TreeBuilder::new();
    let mut stmts = Vec::new();
    for (l, r) in [(1, 2), (2, 2), (3, 2)] {
        let ops: [fn(&TreeBuilder, Expr, Expr) -> Expr; 6] =
            [TreeBuilder::eq, TreeBuilder::ne, TreeBuilder::lt, TreeBuilder::le, TreeBuilder::gt, TreeBuilder::ge];
        for cmp in ops {
            // a comparison used as data materializes to 0 or 1
            stmts.push(print(&b, cmp(&b, b.int(l), b.int(r))));
        }
        stmts.push(space(&b));
    }
    let program = b.program(vec![], b.block(stmts, b.unit()));
    assert_eq!(execute(&build(&b, &program), "").1, "011100 100101 010011 ");
}

#[test]
fn desugared_boolean_operators() {
    let b = TreeBuilder::new();
    let t = || b.lt(b.int(1), b.int(2));
    let f = || b.gt(b.int(1), b.int(2));
    let main = b.block(
        vec![
            print(&b, b.and(t(), t())),
            print(&b, b.and(t(), f())),
            print(&b, b.and(f(), t())),
            print(&b, b.or(f(), f())),
            print(&b, b.or(f(), t())),
            print(&b, b.or(t(), f())),
            print(&b, b.not(t())),
            print(&b, b.not(f())),
        ],
        b.unit(),
    );
    let program = b.program(vec![], main);
    assert_eq!(execute(&build(&b, &program), "").1, "10001101");
}

#[test]
fn while_counts_and_exits_when_false() {
    let mut b = TreeBuilder::new();
    let (i, i_decl) = b.var("i", b.int(0));
    let (s, s_decl) = b.var("s", b.int(0));
    let step = b.block(
        vec![
            b.exec(b.assign(s, b.add(b.ident(s), b.ident(i)))),
            b.exec(b.assign(i, b.add(b.ident(i), b.int(1)))),
        ],
        b.unit(),
    );
    let main = b.block(
        vec![i_decl, s_decl, b.while_(b.lt(b.ident(i), b.int(5)), step), print(&b, b.ident(s)), space(&b)],
        b.call(b.predef("printInt"), vec![b.ident(i)]),
    );
    let program = b.program(vec![], main);
    assert_eq!(execute(&build(&b, &program), "").1, "10 5");
}

#[test]
fn while_with_false_condition_never_runs_body() {
    let b = TreeBuilder::new();
    let body = b.call(b.predef("printInt"), vec![b.int(9)]);
    let main = b.block(vec![b.while_(b.gt(b.int(0), b.int(1)), body)], b.int(0));
    let program = b.program(vec![], main);
    assert_eq!(execute(&build(&b, &program), "").1, "");
}

#[test]
fn while_condition_is_reevaluated_before_each_iteration() {
    let b = TreeBuilder::new();
    let cond = b.ne(b.call(b.predef("readInt"), vec![]), b.int(0));
    let body = b.call(b.predef("printChar"), vec![b.int('*' as i32)]);
    let program = b.program(vec![], b.block(vec![b.while_(cond, body)], b.unit()));
    assert_eq!(execute(&build(&b, &program), "4 -1 7 0 5").1, "***");
}

// ============================================================================
// Lists
// ============================================================================

#[test]
fn head_tail_walk_a_list() {
    let mut b = TreeBuilder::new();
    let (l, l_decl) = b.var("l", b.list(vec![b.int(1), b.int(2), b.int(3)]));
    let advance = || b.exec(b.assign(l, b.tail(b.ident(l))));
    let main = b.block(
        vec![
            l_decl,
            print(&b, b.head(b.ident(l))),
            advance(),
            print(&b, b.head(b.ident(l))),
            advance(),
            print(&b, b.head(b.ident(l))),
            advance(),
            print(&b, b.is_empty(b.ident(l))),
        ],
        b.unit(),
    );
    let program = b.program(vec![], main);
    assert_eq!(execute(&build(&b, &program), "").1, "1231");
}

#[test]
fn is_empty_is_an_integer() {
    let b = TreeBuilder::new();
    let main = b.block(
        vec![
            print(&b, b.is_empty(b.nil())),
            print(&b, b.is_empty(b.cons(b.int(1), b.nil()))),
            print(&b, b.add(b.is_empty(b.nil()), b.int(41))),
        ],
        b.unit(),
    );
    let program = b.program(vec![], main);
    assert_eq!(execute(&build(&b, &program), "").1, "1042");
}

#[test]
fn head_of_empty_list_exits_with_null_status() {
    let b = TreeBuilder::new();
    let program = b.program(vec![], b.call(b.predef("printInt"), vec![b.head(b.nil())]));
    let (exit, out) = execute(&build(&b, &program), "");
    assert_eq!(exit.status, NULL_LIST_EXIT);
    assert_eq!(out, "");

    let b = TreeBuilder::new();
    let program = b.program(vec![], b.tail(b.tail(b.list(vec![b.int(1)]))));
    assert_eq!(execute(&build(&b, &program), "").0.status, NULL_LIST_EXIT);
}

#[test]
fn nested_lists_do_not_alias() {
    let mut b = TreeBuilder::new();
    // (1 :: []) :: (2 :: []) :: []
    let value = b.list(vec![b.cons(b.int(1), b.nil()), b.cons(b.int(2), b.nil())]);
    let (l, l_decl) = b.var("l", value);
    let main = b.block(
        vec![
            l_decl,
            print(&b, b.head(b.head(b.ident(l)))),
            print(&b, b.head(b.head(b.tail(b.ident(l))))),
            print(&b, b.is_empty(b.tail(b.head(b.ident(l))))),
        ],
        b.unit(),
    );
    let program = b.program(vec![], main);
    assert_eq!(execute(&build(&b, &program), "").1, "121");
}

#[test]
fn list_built_by_recursion_is_summed() {
    let mut b = TreeBuilder::new();
    // range(n) = if (n == 0) [] else n :: range(n - 1)
    let range = b.fun("range", &[("n", Type::Int)], Type::list(Type::Int));
    let (range_sym, n) = (range.sym, range.param(0));
    let range_body = b.if_(
        b.eq(b.ident(n), b.int(0)),
        b.nil(),
        b.cons(b.ident(n), b.call(b.ident(range_sym), vec![b.sub(b.ident(n), b.int(1))])),
    );
    let range_decl = b.define(range, range_body);
    // sum(xs) = if (isEmpty(xs)) 0 else head(xs) + sum(tail(xs))
    let sum = b.fun("sum", &[("xs", Type::list(Type::Int))], Type::Int);
    let (sum_sym, xs) = (sum.sym, sum.param(0));
    let sum_body = b.if_(
        b.is_empty(b.ident(xs)),
        b.int(0),
        b.add(b.head(b.ident(xs)), b.call(b.ident(sum_sym), vec![b.tail(b.ident(xs))])),
    );
    let sum_decl = b.define(sum, sum_body);
    let main = b.call(
        b.predef("printInt"),
        vec![b.call(b.ident(sum_sym), vec![b.call(b.ident(range_sym), vec![b.int(100)])])],
    );
    let program = b.program(vec![range_decl, sum_decl], main);
    assert_eq!(execute(&build(&b, &program), "").1, "5050");
}

#[test]
fn garbage_cells_are_collected() {
    let mut b = TreeBuilder::new();
    let (i, i_decl) = b.var("i", b.int(0));
    let (keep, keep_decl) = b.var("keep", b.list(vec![b.int(7), b.int(8)]));
    let (_, junk_decl) = b.var("junk", b.cons(b.ident(i), b.nil()));
    let body = b.block(vec![junk_decl, b.exec(b.assign(i, b.add(b.ident(i), b.int(1))))], b.unit());
    let main = b.block(
        vec![
            i_decl,
            keep_decl,
            b.while_(b.lt(b.ident(i), b.int(5000)), body),
            print(&b, b.head(b.tail(b.ident(keep)))),
        ],
        b.ident(i),
    );
    let program = b.program(vec![], main);
    let asm = build(&b, &program);
    // 16 KiB of memory leaves an 8 KiB heap: about a thousand cells
    let config = MachineConfig { memory_size: 16 * 1024, ..MachineConfig::default() };
    let (exit, out) = execute_with(&asm, "", config);
    assert_eq!(exit.status, 0);
    assert_eq!(out, "8");
}

// ============================================================================
// Constants and I/O
// ============================================================================

#[test]
fn wide_constants_survive_store_and_reload() {
    let mut b = TreeBuilder::new();
    let values = [100, 40000, -40000, 32767, -32767, 32768, -32768, i32::MAX, i32::MIN, 65536, -65537];
    let mut stmts = Vec::new();
    for v in values {
        let (x, decl) = b.var("x", b.int(v));
        stmts.push(decl);
        stmts.push(print(&b, b.ident(x)));
        stmts.push(space(&b));
    }
    let program = b.program(vec![], b.block(stmts, b.unit()));
    let expected: String = values.iter().map(|v| format!("{} ", v)).collect();
    assert_eq!(execute(&build(&b, &program), "").1, expected);
}

#[test]
fn reads_from_input() {
    let b = TreeBuilder::new();
    let main = b.block(
        vec![
            print(&b, b.add(b.call(b.predef("readInt"), vec![]), b.int(1))),
            b.exec(b.call(b.predef("printChar"), vec![b.call(b.predef("readChar"), vec![])])),
            print(&b, b.call(b.predef("readChar"), vec![])),
        ],
        b.unit(),
    );
    let program = b.program(vec![], main);
    assert_eq!(execute(&build(&b, &program), "41z").1, "42z-1");
}

#[test]
fn main_expression_value_is_discarded() {
    let b = TreeBuilder::new();
    let program = b.program(vec![], b.add(b.int(2), b.int(3)));
    let (exit, out) = execute(&build(&b, &program), "");
    assert_eq!((exit.status, out.as_str()), (0, ""));
}
