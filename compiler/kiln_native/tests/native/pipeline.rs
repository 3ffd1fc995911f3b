//! Stage sequencing, cache reuse and failure propagation.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;

use kiln_ir::prelude::{self, applied};
use kiln_ir::{PrimitiveKind, Term};
use kiln_native::messages::{HostMessage, MessageLevel};
use kiln_native::toolchain::{ProcessStatus, ToolchainStage};
use kiln_native::{
    ArtifactRegistry, DebugFlags, EvalError, Import, RuntimeValue, ToolchainError, TypeError,
};

use crate::common::{Harness, Program};

fn bool_ty() -> Term {
    Term::ind(prelude::BOOL)
}

fn int_ty() -> Term {
    Term::constant(prelude::PRIM_INT)
}

fn returning_false() -> Program {
    Program::returning(RuntimeValue::Immediate(1))
}

// ── Cache ──

#[test]
fn second_request_reuses_the_artifact() {
    let h = Harness::new();
    let first = h.eval("Top.answer", &returning_false(), &bool_ty()).unwrap();
    let second = h.eval("Top.answer", &returning_false(), &bool_ty()).unwrap();

    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(first.term, Term::construct(prelude::BOOL, 1));
    assert_eq!(second.term, first.term);
    assert_eq!(second.symbol, first.symbol);
    assert_eq!(h.counters.compiles(), 1);
    assert_eq!(h.counters.toolchain_calls(), 2);
    assert_eq!(h.counters.loads(), 1);
    assert_eq!(h.counters.invocations(), 2);
}

#[test]
fn cache_hit_ignores_the_new_program() {
    let h = Harness::new();
    h.eval("Top.x", &returning_false(), &bool_ty()).unwrap();
    let again = h
        .eval("Top.x", &Program::returning(RuntimeValue::Immediate(0)), &bool_ty())
        .unwrap();
    // Identifiers are assumed immutable once built.
    assert_eq!(again.term, Term::construct(prelude::BOOL, 1));
}

#[test]
fn colliding_identifiers_get_distinct_symbols() {
    let h = Harness::new();
    let dotted = h.eval("a.b", &returning_false(), &bool_ty()).unwrap();
    let underscored = h
        .eval("a_b", &Program::returning(RuntimeValue::Immediate(0)), &bool_ty())
        .unwrap();

    assert_eq!(dotted.symbol, "a_b");
    assert_eq!(underscored.symbol, "a_b0");
    assert!(!underscored.cached);
    assert_eq!(underscored.term, Term::construct(prelude::BOOL, 0));
    assert_eq!(h.evaluator.registry().len(), 2);
}

#[test]
fn prefix_is_part_of_the_symbol_and_file_names() {
    let h = Harness::with_options(|options| options.with_prefix("kiln_").with_extension("_v"));
    let eval = h.eval("Top.fact", &returning_false(), &bool_ty()).unwrap();

    assert_eq!(eval.symbol, "kiln_Top_fact");
    assert!(h.dir.path().join("kiln_Top_fact_v.c").exists());
    assert!(h.dir.path().join("kiln_Top_fact_v.h").exists());
    assert!(h.dir.path().join("kiln_Top_fact_v.o").exists());
}

#[test]
fn run_cached_requires_a_registered_identifier() {
    let h = Harness::new();
    let err = h
        .evaluator
        .run_cached(&h.env, "Top.later", &bool_ty())
        .unwrap_err();
    assert!(matches!(err, EvalError::NotFound { ref id } if id == "Top.later"));

    h.eval("Top.later", &returning_false(), &bool_ty()).unwrap();
    let eval = h
        .evaluator
        .run_cached(&h.env, "Top.later", &bool_ty())
        .unwrap();
    assert!(eval.cached);
    assert_eq!(eval.term, Term::construct(prelude::BOOL, 1));
    assert_eq!(h.counters.compiles(), 1);
}

#[test]
fn evaluators_sharing_a_registry_share_artifacts() {
    let registry = Arc::new(ArtifactRegistry::new());
    let first = Harness::sharing(Arc::clone(&registry));
    let second = Harness::sharing(Arc::clone(&registry));

    first.eval("Top.shared", &returning_false(), &bool_ty()).unwrap();
    let eval = second
        .eval("Top.shared", &returning_false(), &bool_ty())
        .unwrap();

    assert!(eval.cached);
    assert_eq!(second.counters.compiles(), 0);
    assert!(registry.contains("Top.shared"));
}

#[test]
fn concurrent_requests_build_once() {
    let h = Harness::new();
    let program = returning_false();
    let ty = bool_ty();
    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| h.eval("Top.race", &program, &ty).unwrap()))
            .collect();
        handles.into_iter().map(|t| t.join().unwrap()).collect()
    });

    assert_eq!(h.counters.compiles(), 1);
    assert_eq!(h.counters.links(), 1);
    assert_eq!(results.iter().filter(|eval| !eval.cached).count(), 1);
    assert!(results.iter().all(|eval| eval.symbol == "Top_race"));
}

#[test]
fn evaluators_sharing_a_registry_build_once() {
    let registry = Arc::new(ArtifactRegistry::new());
    let slow = Duration::from_millis(100);
    let first = Harness::sharing_slow(Arc::clone(&registry), slow);
    let second = Harness::sharing_slow(Arc::clone(&registry), slow);
    let program = returning_false();
    let ty = bool_ty();

    let (a, b) = thread::scope(|s| {
        let a = s.spawn(|| first.eval("Top.x", &program, &ty).unwrap());
        let b = s.spawn(|| second.eval("Top.x", &program, &ty).unwrap());
        (a.join().unwrap(), b.join().unwrap())
    });

    assert_eq!(first.counters.links() + second.counters.links(), 1);
    assert_eq!(first.counters.compiles() + second.counters.compiles(), 1);
    assert_eq!(a.symbol, "Top_x");
    assert_eq!(b.symbol, "Top_x");
    assert_eq!(u8::from(a.cached) + u8::from(b.cached), 1);
    assert_eq!(registry.len(), 1);
}

// ── Failures ──

#[test]
fn unreadable_type_fails_before_any_build() {
    let h = Harness::new();
    let fun = Term::arrow(Term::ind(prelude::NAT), &Term::ind(prelude::NAT));
    let err = h.eval("Top.f", &returning_false(), &fun).unwrap_err();

    assert!(matches!(err, EvalError::Type(TypeError::NotReifyable { .. })));
    assert_eq!(h.counters.compiles(), 0);
    assert_eq!(h.counters.toolchain_calls(), 0);
    assert!(h.evaluator.registry().is_empty());
}

#[test]
fn array_results_fail_before_any_build() {
    let h = Harness::new();
    let ty = Term::app(Term::constant(prelude::PRIM_ARRAY), vec![bool_ty()]);
    let err = h.eval("Top.arr", &returning_false(), &ty).unwrap_err();

    assert!(matches!(
        err,
        EvalError::Type(TypeError::UnsupportedPrimitive {
            kind: PrimitiveKind::Array,
            ..
        })
    ));
    assert_eq!(h.counters.compiles(), 0);
    assert_eq!(h.counters.toolchain_calls(), 0);
    assert!(h.evaluator.registry().is_empty());

    let err = h.evaluator.run_cached(&h.env, "Top.arr", &ty).unwrap_err();
    assert!(matches!(err, EvalError::Type(_)));
}

#[test]
fn compile_failure_keeps_diagnostics() {
    let h = Harness::new();
    let program = returning_false()
        .with_diagnostic("warning: unused variable `n`")
        .rejected("unsupported fixpoint");
    let err = h.eval("Top.bad", &program, &bool_ty()).unwrap_err();

    assert_eq!(err.to_string(), "compilation failed: unsupported fixpoint");
    assert_eq!(
        err.diagnostics().unwrap().lines().to_vec(),
        vec!["warning: unused variable `n`".to_string()]
    );
    assert_eq!(h.counters.toolchain_calls(), 0);
    assert!(!h.evaluator.registry().contains("Top.bad"));
}

#[test]
fn successful_builds_return_diagnostics_once() {
    let h = Harness::new();
    let program = returning_false().with_diagnostic("note: inlined 3 calls");
    let built = h.eval("Top.noisy", &program, &bool_ty()).unwrap();
    let reused = h.eval("Top.noisy", &program, &bool_ty()).unwrap();

    assert_eq!(built.diagnostics.to_string(), "note: inlined 3 calls");
    assert!(reused.diagnostics.is_empty());
}

#[test]
fn link_failure_registers_nothing() {
    let h = Harness::with_failing_link();
    let program = returning_false().with_diagnostic("warning: primitive `add` is external");
    let err = h.eval("Top.unlinked", &program, &bool_ty()).unwrap_err();

    assert_eq!(
        err.diagnostics().unwrap().lines().to_vec(),
        vec!["warning: primitive `add` is external".to_string()]
    );
    let EvalError::Toolchain(ToolchainError::Failed {
        stage,
        status,
        stderr,
        ..
    }) = err.root()
    else {
        panic!("expected a link failure, got {err:?}");
    };
    assert_eq!(*stage, ToolchainStage::Link);
    assert_eq!(*status, ProcessStatus::Code(1));
    assert!(stderr.contains("prim_add"));
    assert_eq!(h.counters.loads(), 0);
    assert!(h.evaluator.registry().is_empty());
}

#[test]
fn failed_build_leaves_its_symbol_reserved() {
    let h = Harness::new();
    h.eval("Top.retry", &returning_false().rejected("boom"), &bool_ty())
        .unwrap_err();
    let eval = h.eval("Top.retry", &returning_false(), &bool_ty()).unwrap();
    assert_eq!(eval.symbol, "Top_retry0");
}

#[test]
fn ill_formed_result_is_reported() {
    let h = Harness::new();
    let program = Program::returning(RuntimeValue::Immediate(7));
    let err = h.eval("Top.wrong", &program, &bool_ty()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "immediate with ordinal 7 at type `bool`: the type has only 2 constructors without fields"
    );
    // The artifact itself built fine and stays registered.
    assert!(h.evaluator.registry().contains("Top.wrong"));
}

// ── Host channel ──

#[test]
fn messages_from_generated_code_are_collected() {
    let h = Harness::new();
    let program = returning_false()
        .posting(MessageLevel::Info, "starting")
        .posting(MessageLevel::Notice, "slow path taken");
    let eval = h.eval("Top.chatty", &program, &bool_ty()).unwrap();

    assert_eq!(
        eval.messages,
        vec![
            HostMessage {
                level: MessageLevel::Info,
                text: "starting".to_string(),
            },
            HostMessage {
                level: MessageLevel::Notice,
                text: "slow path taken".to_string(),
            },
        ]
    );

    // Each run starts with an empty channel.
    let again = h.eval("Top.chatty", &program, &bool_ty()).unwrap();
    assert_eq!(again.messages.len(), 2);
}

#[test]
fn fatal_error_fails_the_request() {
    let h = Harness::new();
    let program = returning_false().raising("array index out of bounds");
    let err = h.eval("Top.crash", &program, &bool_ty()).unwrap_err();
    assert!(
        matches!(err, EvalError::Fatal { ref message } if message == "array index out of bounds")
    );
}

#[test]
fn failures_after_a_fresh_build_keep_its_diagnostics() {
    let h = Harness::new();
    let crashing = returning_false()
        .with_diagnostic("note: bounds checks kept")
        .raising("array index out of bounds");
    let err = h.eval("Top.crash", &crashing, &bool_ty()).unwrap_err();
    assert!(matches!(err.root(), EvalError::Fatal { .. }));
    assert_eq!(err.to_string(), "native code raised a fatal error: array index out of bounds");
    assert_eq!(err.diagnostics().unwrap().to_string(), "note: bounds checks kept");

    let wrong = Program::returning(RuntimeValue::Immediate(7)).with_diagnostic("note: inlined");
    let err = h.eval("Top.wrong", &wrong, &bool_ty()).unwrap_err();
    assert!(matches!(err.root(), EvalError::IllFormedValue(_)));
    assert_eq!(err.diagnostics().unwrap().to_string(), "note: inlined");

    // A cache hit built nothing, so it reports no diagnostics.
    let err = h.eval("Top.wrong", &wrong, &bool_ty()).unwrap_err();
    assert!(matches!(err, EvalError::IllFormedValue(_)));
    assert!(err.diagnostics().is_none());
}

// ── Timing ──

#[test]
fn elapsed_time_only_when_timing() {
    let plain = Harness::new();
    let eval = plain.eval("Top.t", &returning_false(), &bool_ty()).unwrap();
    assert_eq!(eval.elapsed, None);

    let timed = Harness::with_options(|options| options.with_flags(DebugFlags::TIMING));
    let eval = timed.eval("Top.t", &returning_false(), &bool_ty()).unwrap();
    assert!(eval.elapsed.is_some());
}

// ── Emitted files ──

#[test]
fn emitted_files_start_with_includes() {
    let h = Harness::new();
    let imports = [
        Import::Library("stdio.h".to_string()),
        Import::Absolute(h.dir.path().join("prims.h")),
    ];
    let program = Program::returning(RuntimeValue::Immediate(5));
    h.eval_with_imports("Top.five", &program, &int_ty(), &imports)
        .unwrap();

    let source = h.read("Top_five.c");
    let mut lines = source.lines();
    assert_eq!(lines.next(), Some("#include <gc_stack.h>"));
    assert_eq!(lines.next(), Some("#include <stdio.h>"));
    assert_eq!(lines.next(), Some("#include \"prims.h\""));
    assert_eq!(lines.next(), Some("#include \"Top_five.h\""));
    assert_eq!(lines.next(), Some(""));
    assert_eq!(lines.next(), Some("/* names: Top_five */"));

    let header = h.read("Top_five.h");
    assert!(header.starts_with("#include <gc_stack.h>\n#include <stdio.h>\n#include \"prims.h\"\n\n"));
    assert!(header.contains("value Top_five(void);"));
}

#[test]
fn compile_only_writes_under_the_configured_stem() {
    let h = Harness::with_options(|options| {
        options
            .with_file_stem("main")
            .with_convention(kiln_native::CallingConvention::Cps)
    });
    let emitted = h
        .evaluator
        .compile_only(&returning_false(), &[])
        .unwrap();

    assert_eq!(emitted.source, h.dir.path().join("main.c"));
    assert_eq!(emitted.imports, vec![Import::Library("gc.h".to_string())]);
    assert!(h.read("main.c").starts_with("#include <gc.h>\n#include \"main.h\"\n"));
    assert_eq!(h.counters.toolchain_calls(), 0);
}

#[test]
fn glue_and_ffi_files_are_prefixed() {
    let h = Harness::with_options(|options| options.with_file_stem("lib").with_extension("_x"));
    let glue = h
        .evaluator
        .generate_glue(&vec!["tree".to_string(), "color".to_string()], &[])
        .unwrap();
    let ffi = h.evaluator.generate_ffi(&returning_false(), &[]).unwrap();

    assert_eq!(glue.source, h.dir.path().join("glue.lib_x.c"));
    assert_eq!(glue.header, h.dir.path().join("glue.lib_x.h"));
    assert_eq!(ffi.source, h.dir.path().join("ffi.lib_x.c"));
    assert!(h.read("glue.lib_x.c").contains("value make_tree(void);"));
    assert!(h.read("ffi.lib_x.c").contains("#include \"ffi.lib_x.h\""));
}

#[test]
fn build_imports_become_link_inputs() {
    let h = Harness::new();
    let imports = [Import::Build("helpers.h".to_string())];
    let eval = h
        .eval_with_imports("Top.uses", &returning_false(), &bool_ty(), &imports)
        .unwrap();
    assert_eq!(eval.term, Term::construct(prelude::BOOL, 1));
    assert!(h.read("Top_uses.c").contains("#include \"helpers.h\""));
}

#[test]
fn parameterized_result_through_the_pipeline() {
    let h = Harness::new();
    let ty = applied(prelude::OPTION, vec![int_ty()]);
    let program = Program::returning(RuntimeValue::block(0, vec![RuntimeValue::Immediate(42)]));
    let eval = h.eval("Top.some", &program, &ty).unwrap();
    assert_eq!(eval.term, prelude::option(&int_ty(), Some(Term::Int(42))));
}
