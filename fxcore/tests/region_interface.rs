use std::collections::BTreeSet;

use fxcore::{RegionSpec, analyze_function, region};
use fxir::{
    block::Label,
    builder::FunctionBuilder,
    consts::AnyConst,
    instr::Operand,
    module::Module,
    types::{TypeDesc, TypeRegistry},
};

fn blocks_spec(labels: &[&str]) -> RegionSpec {
    RegionSpec::Blocks {
        blocks: labels.iter().map(|l| l.to_string()).collect(),
    }
}

/// The canonical loop shape:
///
/// ```c
///  1  int grayscale(int width, int *data) {
///  2      int sum = 0;
///  3      int i;
///  4      for (i = 0; i < width; i++)
///  5          sum += data[i];
///  8      return sum;
///     }
/// ```
fn build_grayscale(module: &mut Module, reg: &TypeRegistry) -> String {
    let int = reg.search_or_insert(TypeDesc::Basic("int".into()));
    let pint = reg.search_or_insert(TypeDesc::Pointer(int));

    let mut fb = FunctionBuilder::new(module, "grayscale", 1)
        .param("width", int)
        .param("data", pint)
        .returns(int)
        .first_line(2);
    let width = fb.param_slot("width", int, 1);
    let data = fb.param_slot("data", pint, 1);
    let sum = fb.slot("sum", int, 2);
    let i = fb.slot("i", int, 3);

    fb.block("entry").expect("entry opens");
    fb.line(2)
        .store(Operand::Storage(sum), Operand::Imm(AnyConst::int(0)));
    fb.line(4)
        .store(Operand::Storage(i), Operand::Imm(AnyConst::int(0)));
    let cond = fb.new_label();
    fb.jump(cond);

    fb.block_at(cond, "for.cond").expect("cond opens");
    fb.line(4);
    let iv = fb.load(Operand::Storage(i));
    let wv = fb.load(Operand::Storage(width));
    let cmp = fb.compute(vec![Operand::Reg(iv), Operand::Reg(wv)]);
    let body = fb.new_label();
    let end = fb.new_label();
    fb.cbranch(Operand::Reg(cmp), body, end);

    fb.block_at(body, "for.body").expect("body opens");
    fb.line(5);
    let base = fb.load(Operand::Storage(data));
    let idx = fb.load(Operand::Storage(i));
    let addr = fb.compute(vec![Operand::Reg(base), Operand::Reg(idx)]);
    let elem = fb.load(Operand::Reg(addr));
    let acc = fb.load(Operand::Storage(sum));
    let next = fb.compute(vec![Operand::Reg(acc), Operand::Reg(elem)]);
    fb.store(Operand::Storage(sum), Operand::Reg(next));
    let inc = fb.new_label();
    fb.jump(inc);

    fb.block_at(inc, "for.inc").expect("inc opens");
    fb.line(4);
    let iv2 = fb.load(Operand::Storage(i));
    let bump = fb.compute(vec![Operand::Reg(iv2), Operand::Imm(AnyConst::int(1))]);
    fb.store(Operand::Storage(i), Operand::Reg(bump));
    fb.jump(cond);

    fb.block_at(end, "for.end").expect("end opens");
    fb.line(8);
    let ret = fb.load(Operand::Storage(sum));
    fb.ret(Some(Operand::Reg(ret)));

    fb.finish().expect("grayscale validates")
}

#[test]
fn closures_partition_the_function_around_the_region() {
    let reg = TypeRegistry::new();
    let mut module = Module::new();
    let name = build_grayscale(&mut module, &reg);
    let func = &module.functions[&name];

    let spec = blocks_spec(&["for.cond", "for.body", "for.inc"]);
    let region = region::resolve(func, &spec).expect("region resolves");
    assert_eq!(region.entry, Label(1));
    assert!(!region.starts_at_function_entry());
    assert!(!region.is_toplevel(func));

    let closures = region::closures(func, &region);
    assert_eq!(closures.predecessors, BTreeSet::from([Label::NIL]));
    assert_eq!(closures.successors, BTreeSet::from([Label(3)]));

    // Region and closures are pairwise disjoint and cover the function.
    assert!(closures.predecessors.is_disjoint(&closures.successors));
    assert!(closures.predecessors.is_disjoint(&region.blocks));
    assert!(closures.successors.is_disjoint(&region.blocks));
    let mut all: BTreeSet<Label> = region.blocks.clone();
    all.extend(&closures.predecessors);
    all.extend(&closures.successors);
    assert_eq!(all, func.body.keys().copied().collect::<BTreeSet<_>>());
}

#[test]
fn stale_block_labels_do_not_resolve() {
    let reg = TypeRegistry::new();
    let mut module = Module::new();
    let name = build_grayscale(&mut module, &reg);
    let func = &module.functions[&name];

    assert!(region::resolve(func, &blocks_spec(&["for.cond", "bogus"])).is_none());
    assert!(region::resolve(func, &RegionSpec::Lines { lines: [90, 99] }).is_none());
}

#[test]
fn whole_body_region_is_toplevel_and_entered_at_the_function_entry() {
    let reg = TypeRegistry::new();
    let mut module = Module::new();
    let name = build_grayscale(&mut module, &reg);
    let func = &module.functions[&name];

    let spec = blocks_spec(&["entry", "for.cond", "for.body", "for.inc", "for.end"]);
    let region = region::resolve(func, &spec).expect("region resolves");
    assert!(region.starts_at_function_entry());
    assert!(region.is_toplevel(func));

    let closures = region::closures(func, &region);
    assert!(closures.predecessors.is_empty());
    assert!(closures.successors.is_empty());
}

#[test]
fn loop_interface_is_inputs_only() {
    let reg = TypeRegistry::new();
    let mut module = Module::new();
    let name = build_grayscale(&mut module, &reg);
    let func = &module.functions[&name];

    let spec = blocks_spec(&["for.cond", "for.body", "for.inc"]);
    let desc = analyze_function(&module, &module, &reg, func, &spec).expect("region resolves");

    assert_eq!(desc.function, "grayscale");
    assert_eq!(desc.return_type, "int");
    assert_eq!((desc.function_area.start, desc.function_area.end), (2, 8));
    assert_eq!((desc.region_area.start, desc.region_area.end), (4, 5));
    assert!(!desc.toplevel);
    assert_eq!(desc.exit_lines, BTreeSet::from([4]));
    assert_eq!(desc.entry_tag, "forcond");
    assert_eq!(desc.exit_tag, "forinc");
    assert_eq!(desc.file_name(), "grayscale_forcond_forinc.xml");

    let names: Vec<&str> = desc.variables.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, ["width", "data", "sum", "i"]);
    assert!(desc.variables.iter().all(|v| !v.is_output()));
    let data = &desc.variables[1];
    assert_eq!(data.type_text, "int *");
}

/// Locals declared inside the region:
///
/// ```c
///  1  void produce(void) {
///  2      int pre = 7;
///  4      { int arr[4]; int *p; int *w;
///  5        int t = pre + pre; p = &pre; *w = 9; arr[0] = 1;
///  6      }
///  8      use(t, arr, p, w);
///     }
/// ```
fn build_produce(module: &mut Module, reg: &TypeRegistry) -> String {
    let int = reg.search_or_insert(TypeDesc::Basic("int".into()));
    let pint = reg.search_or_insert(TypeDesc::Pointer(int));
    let arr4 = reg.search_or_insert(TypeDesc::Array { elem: int, len: 4 });

    let mut fb = FunctionBuilder::new(module, "produce", 1).first_line(2);
    let pre = fb.slot("pre", int, 2);
    let arr = fb.slot("arr", arr4, 4);
    let ptr = fb.slot("p", pint, 4);
    let wild = fb.slot("w", pint, 4);
    let t = fb.slot("t", int, 5);

    fb.block("entry").expect("entry opens");
    fb.line(2)
        .store(Operand::Storage(pre), Operand::Imm(AnyConst::int(7)));
    let work = fb.new_label();
    fb.line(3);
    fb.jump(work);

    fb.block_at(work, "work").expect("work opens");
    fb.line(4);
    let slot0 = fb.compute(vec![Operand::Storage(arr), Operand::Imm(AnyConst::int(0))]);
    fb.store(Operand::Reg(slot0), Operand::Imm(AnyConst::int(1)));
    fb.line(5);
    let pv = fb.load(Operand::Storage(pre));
    let dbl = fb.compute(vec![Operand::Reg(pv), Operand::Reg(pv)]);
    fb.store(Operand::Storage(t), Operand::Reg(dbl));
    fb.store(Operand::Storage(ptr), Operand::Storage(pre));
    let wv = fb.load(Operand::Storage(wild));
    fb.store(Operand::Reg(wv), Operand::Imm(AnyConst::int(9)));
    fb.line(6);
    let after = fb.new_label();
    fb.jump(after);

    fb.block_at(after, "after").expect("after opens");
    fb.line(8);
    let tv = fb.load(Operand::Storage(t));
    let a2 = fb.compute(vec![Operand::Storage(arr), Operand::Reg(tv)]);
    let _av = fb.load(Operand::Reg(a2));
    let _p2 = fb.load(Operand::Storage(ptr));
    let _w2 = fb.load(Operand::Storage(wild));
    fb.ret(None);

    fb.finish().expect("produce validates")
}

#[test]
fn region_locals_split_into_outputs_and_excluded() {
    let reg = TypeRegistry::new();
    let mut module = Module::new();
    let name = build_produce(&mut module, &reg);
    let func = &module.functions[&name];

    let desc = analyze_function(&module, &module, &reg, func, &blocks_spec(&["work"]))
        .expect("region resolves");
    assert_eq!(desc.return_type, "void");
    assert_eq!((desc.region_area.start, desc.region_area.end), (4, 6));

    let summary: Vec<(&str, bool)> = desc
        .variables
        .iter()
        .map(|v| (v.name.as_str(), v.is_output()))
        .collect();
    // `pre` crosses inward; the scalar `t` and the overwritten pointer `p`
    // must travel back. The array and the written-through pointer reach
    // the rest of the function through memory and stay off the interface.
    assert_eq!(summary, [("pre", false), ("p", true), ("t", true)]);

    let p = &desc.variables[1];
    assert_eq!(p.type_text, "int *");
    let t = &desc.variables[2];
    assert_eq!(t.type_text, "int");
}
