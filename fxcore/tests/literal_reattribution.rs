use std::collections::BTreeSet;

use fxcore::{FunctionIndex, RegionSpec, VarFlags, analyze_function};
use fxir::{
    builder::FunctionBuilder,
    consts::AnyConst,
    instr::Operand,
    module::Module,
    storage::Storage,
    types::{TypeDesc, TypeRegistry},
};

/// Folded constants on both sides of the boundary:
///
/// ```c
///  1  int clamp(void) {
///  2      const int x = 1000;
///  3      const int y = 1000;
///  4      static const int lim = 777;
///  5      { const int z = 42; r = 1000 + 777; }
///  8      return 42 + 5;
///     }
/// ```
///
/// Every read of the constants is folded to an immediate, so nothing in
/// the region mentions their storage. The literal pass reattributes the
/// immediates; `x` and `y` are *both* reported for the occurrence of
/// `1000` since value equality cannot tell them apart.
fn build_clamp(module: &mut Module, reg: &TypeRegistry) -> String {
    let int = reg.search_or_insert(TypeDesc::Basic("int".into()));

    let lim = module.alloc_storage(
        Storage::global("lim", int, Some(4))
            .constant(Some(AnyConst::int(777)))
            .internal(),
    );
    let _ = lim;

    let mut fb = FunctionBuilder::new(module, "clamp", 1)
        .returns(int)
        .first_line(2);
    let x = fb.slot("x", int, 2);
    let y = fb.slot("y", int, 3);
    let z = fb.slot("z", int, 5);
    let r = fb.slot("r", int, 5);

    fb.block("entry").expect("entry opens");
    fb.line(2)
        .store(Operand::Storage(x), Operand::Imm(AnyConst::int(1000)));
    fb.line(3)
        .store(Operand::Storage(y), Operand::Imm(AnyConst::int(1000)));
    let work = fb.new_label();
    fb.jump(work);

    fb.block_at(work, "work").expect("work opens");
    fb.line(5)
        .store(Operand::Storage(z), Operand::Imm(AnyConst::int(42)));
    let v = fb.compute(vec![
        Operand::Imm(AnyConst::int(1000)),
        Operand::Imm(AnyConst::int(777)),
    ]);
    fb.store(Operand::Storage(r), Operand::Reg(v));
    fb.line(6);
    let after = fb.new_label();
    fb.jump(after);

    fb.block_at(after, "after").expect("after opens");
    fb.line(8);
    let rv = fb.load(Operand::Storage(r));
    let out = fb.compute(vec![
        Operand::Reg(rv),
        Operand::Imm(AnyConst::int(42)),
        Operand::Imm(AnyConst::int(5)),
    ]);
    fb.ret(Some(Operand::Reg(out)));

    fb.finish().expect("clamp validates")
}

#[test]
fn equal_literals_report_every_bound_candidate() {
    let reg = TypeRegistry::new();
    let mut module = Module::new();
    let name = build_clamp(&mut module, &reg);
    let func = &module.functions[&name];

    // One binding per folded constant: x, y, z, and the static lim.
    let index = FunctionIndex::build(&module, func);
    assert!(!index.literals.is_empty());
    assert_eq!(index.literals.len(), 4);

    let spec = RegionSpec::Lines { lines: [5, 6] };
    let desc = analyze_function(&module, &module, &reg, func, &spec).expect("region resolves");
    assert_eq!((desc.region_area.start, desc.region_area.end), (5, 6));

    let summary: Vec<(&str, bool)> = desc
        .variables
        .iter()
        .map(|v| (v.name.as_str(), v.is_output()))
        .collect();
    assert_eq!(
        summary,
        [
            ("lim", false),
            ("x", false),
            ("y", false),
            ("z", true),
            ("r", true),
        ]
    );

    let lim = &desc.variables[0];
    assert!(lim.flags.contains(VarFlags::STATIC));
    assert!(lim.flags.contains(VarFlags::CONST));
    let z = desc
        .variables
        .iter()
        .find(|v| v.name == "z")
        .expect("z crosses outward");
    assert!(z.is_output());
}

#[test]
fn literals_with_no_binding_stay_silent() {
    let reg = TypeRegistry::new();
    let mut module = Module::new();
    let name = build_clamp(&mut module, &reg);
    let func = &module.functions[&name];

    let spec = RegionSpec::Lines { lines: [5, 6] };
    let desc = analyze_function(&module, &module, &reg, func, &spec).expect("region resolves");

    // `5` after the region and the folded arithmetic constants bind to no
    // declaration and must not invent variables.
    let names: BTreeSet<&str> = desc.variables.iter().map(|v| v.name.as_str()).collect();
    assert!(!names.contains("5"));
    assert_eq!(names.len(), 5);
}
